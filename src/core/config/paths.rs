use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub project_root: PathBuf,
    pub user_data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub db_path: PathBuf,
    pub model_cache_dir: PathBuf,
    pub docs_dir: PathBuf,
    pub frontend_dir: PathBuf,
}

impl AppPaths {
    pub fn new() -> Self {
        let project_root = discover_project_root();
        let user_data_dir = discover_user_data_dir(&project_root);
        Self::from_dirs(project_root, user_data_dir)
    }

    /// Lays out every derived path under the given root and data directories.
    pub fn from_dirs(project_root: PathBuf, user_data_dir: PathBuf) -> Self {
        let log_dir = user_data_dir.join("logs");
        let db_path = user_data_dir.join("course_store.db");
        let model_cache_dir = user_data_dir.join("models");
        let docs_dir = project_root.join("docs");
        let frontend_dir = project_root.join("frontend");

        for dir in [&user_data_dir, &log_dir] {
            let _ = fs::create_dir_all(dir);
        }

        AppPaths {
            project_root,
            user_data_dir,
            log_dir,
            db_path,
            model_cache_dir,
            docs_dir,
            frontend_dir,
        }
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}

fn discover_project_root() -> PathBuf {
    if let Ok(root) = env::var("COURSE_RAG_ROOT") {
        return PathBuf::from(root);
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cwd = env::current_dir().unwrap_or_else(|_| manifest_dir.clone());

    // Running from a subdirectory (e.g. `backend/`) still finds the shared docs folder
    for candidate in [cwd.clone(), cwd.join(".."), manifest_dir] {
        if candidate.join("docs").is_dir() || candidate.join("config.yml").exists() {
            return candidate;
        }
    }

    cwd
}

fn discover_user_data_dir(project_root: &Path) -> PathBuf {
    if let Ok(dir) = env::var("COURSE_RAG_DATA_DIR") {
        return PathBuf::from(dir);
    }

    project_root.join("data")
}
