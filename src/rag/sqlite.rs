//! SQLite-backed course store.
//!
//! In-process vector store using SQLite for records and
//! brute-force cosine similarity for search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::embedding::Embedder;
use super::models::{Course, CourseChunk, Lesson};
use super::store::{
    ChunkMetadata, CollectionCounts, CourseMetadata, CourseStore, SearchHit, SearchResults,
};
use crate::core::config::RagSettings;
use crate::core::errors::ApiError;
use crate::vector_math::{
    cosine_similarity, deserialize_embedding, rank_descending_by_cosine, serialize_embedding,
};

const EMBED_BATCH_SIZE: usize = 64;

pub struct SqliteCourseStore {
    pool: SqlitePool,
    embedder: Arc<dyn Embedder>,
    max_results: usize,
    course_match_threshold: f32,
    db_path: PathBuf,
}

impl SqliteCourseStore {
    pub async fn open(
        db_path: &Path,
        embedder: Arc<dyn Embedder>,
        settings: &RagSettings,
    ) -> Result<Self, ApiError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::internal)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(ApiError::internal)?;

        let store = Self {
            pool,
            embedder,
            max_results: settings.max_results,
            course_match_threshold: settings.course_match_threshold,
            db_path: db_path.to_path_buf(),
        };
        store.init_schema().await?;
        store.ensure_embedding_model().await?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    async fn init_schema(&self) -> Result<(), ApiError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_catalog (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                instructor TEXT,
                course_link TEXT,
                lessons_json TEXT NOT NULL DEFAULT '[]',
                lesson_count INTEGER NOT NULL DEFAULT 0,
                embedding BLOB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS course_content (
                id TEXT PRIMARY KEY,
                document TEXT NOT NULL,
                course_title TEXT NOT NULL,
                lesson_number INTEGER,
                chunk_index INTEGER NOT NULL,
                embedding BLOB
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_content_course
             ON course_content(course_title, lesson_number)",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS store_meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    /// Vectors from another model are incomparable, so a model change wipes
    /// both collections before the new name is recorded.
    async fn ensure_embedding_model(&self) -> Result<(), ApiError> {
        let current = self.embedder.model_name();
        let stored: Option<String> =
            sqlx::query_scalar("SELECT value FROM store_meta WHERE key = 'embedding_model'")
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;

        if stored.as_deref() == Some(current) {
            return Ok(());
        }

        if let Some(previous) = stored {
            tracing::warn!(
                previous = %previous,
                current = %current,
                "Embedding model changed, clearing vector store"
            );
            self.clear_all_data().await?;
        }

        sqlx::query(
            "INSERT OR REPLACE INTO store_meta (key, value, updated_at)
             VALUES ('embedding_model', ?1, STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(current)
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn embed_all(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ApiError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            vectors.extend(self.embedder.embed(batch).await?);
        }
        if vectors.len() != texts.len() {
            return Err(ApiError::Internal(format!(
                "Embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }

    async fn try_search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> Result<SearchResults, ApiError> {
        let course_title = match course_name {
            Some(name) => match self.resolve_course_name(name).await? {
                Some(title) => Some(title),
                None => {
                    return Ok(SearchResults::empty(format!(
                        "No course found matching '{}'",
                        name
                    )))
                }
            },
            None => None,
        };

        let rows = sqlx::query(
            "SELECT document, course_title, lesson_number, chunk_index, embedding
             FROM course_content
             WHERE (?1 IS NULL OR course_title = ?1)
               AND (?2 IS NULL OR lesson_number = ?2)",
        )
        .bind(course_title.as_deref())
        .bind(lesson_number)
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        if rows.is_empty() {
            return Ok(SearchResults::default());
        }

        let query_embedding = self.embedder.embed_one(query).await?;

        let mut hits: Vec<SearchHit> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let score = cosine_similarity(&query_embedding, &deserialize_embedding(&blob));
                let chunk_index: i64 = row.get("chunk_index");
                SearchHit {
                    document: row.get("document"),
                    metadata: ChunkMetadata {
                        course_title: row.get("course_title"),
                        lesson_number: row.get("lesson_number"),
                        chunk_index: chunk_index.max(0) as usize,
                    },
                    distance: 1.0 - score,
                }
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(limit.unwrap_or(self.max_results).max(1));

        Ok(SearchResults { hits, error: None })
    }

    fn row_to_metadata(row: &sqlx::sqlite::SqliteRow) -> CourseMetadata {
        let lessons_json: String = row.get("lessons_json");
        let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json).unwrap_or_default();
        let lesson_count: i64 = row.get("lesson_count");

        CourseMetadata {
            title: row.get("id"),
            instructor: row.get("instructor"),
            course_link: row.get("course_link"),
            lessons,
            lesson_count: lesson_count.max(0) as usize,
        }
    }
}

fn chunk_id(chunk: &CourseChunk) -> String {
    format!(
        "{}_{}",
        chunk.course_title.replace(' ', "_"),
        chunk.chunk_index
    )
}

#[async_trait]
impl CourseStore for SqliteCourseStore {
    async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<i64>,
        limit: Option<usize>,
    ) -> SearchResults {
        match self
            .try_search(query, course_name, lesson_number, limit)
            .await
        {
            Ok(results) => results,
            Err(err) => {
                tracing::warn!(error = %err, "Course content search failed");
                SearchResults::empty(format!("Search error: {}", err.detail()))
            }
        }
    }

    async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>, ApiError> {
        let needle = course_name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let rows = sqlx::query("SELECT id, embedding FROM course_catalog ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        if rows.is_empty() {
            return Ok(None);
        }

        let titles: Vec<String> = rows.iter().map(|row| row.get("id")).collect();

        if let Some(title) = titles.iter().find(|t| t.to_lowercase() == needle) {
            return Ok(Some(title.clone()));
        }

        if let Some(title) = titles.iter().find(|t| {
            let lowered = t.to_lowercase();
            lowered.contains(&needle) || needle.contains(&lowered)
        }) {
            return Ok(Some(title.clone()));
        }

        let query_embedding = self.embedder.embed_one(course_name).await?;
        let candidates: Vec<Vec<f32>> = rows
            .iter()
            .map(|row| {
                let blob: Option<Vec<u8>> = row.get("embedding");
                blob.map(|b| deserialize_embedding(&b)).unwrap_or_default()
            })
            .collect();

        let best = rank_descending_by_cosine(&query_embedding, &candidates)
            .into_iter()
            .next()
            .filter(|(_, score)| *score >= self.course_match_threshold);

        if let Some((idx, score)) = best {
            tracing::debug!(query = %course_name, title = %titles[idx], score, "Resolved course by similarity");
            return Ok(Some(titles[idx].clone()));
        }

        Ok(None)
    }

    async fn add_course_metadata(&self, course: &Course) -> Result<(), ApiError> {
        let embedding = self.embedder.embed_one(&course.title).await?;
        let lessons_json = serde_json::to_string(&course.lessons).map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR REPLACE INTO course_catalog
                (id, document, instructor, course_link, lessons_json, lesson_count, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&course.title)
        .bind(&course.title)
        .bind(course.instructor.as_deref())
        .bind(course.course_link.as_deref())
        .bind(&lessons_json)
        .bind(course.lessons.len() as i64)
        .bind(serialize_embedding(&embedding))
        .execute(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(())
    }

    async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<(), ApiError> {
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let embeddings = self.embed_all(&texts).await?;

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        for (chunk, embedding) in chunks.iter().zip(&embeddings) {
            sqlx::query(
                "INSERT OR REPLACE INTO course_content
                    (id, document, course_title, lesson_number, chunk_index, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(chunk_id(chunk))
            .bind(&chunk.content)
            .bind(&chunk.course_title)
            .bind(chunk.lesson_number)
            .bind(chunk.chunk_index as i64)
            .bind(serialize_embedding(embedding))
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        }

        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn clear_all_data(&self) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;
        sqlx::query("DELETE FROM course_content")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        sqlx::query("DELETE FROM course_catalog")
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        tx.commit().await.map_err(ApiError::internal)?;
        Ok(())
    }

    async fn existing_course_titles(&self) -> Result<Vec<String>, ApiError> {
        sqlx::query_scalar("SELECT id FROM course_catalog ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(ApiError::internal)
    }

    async fn course_count(&self) -> Result<usize, ApiError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_catalog")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(count as usize)
    }

    async fn course_metadata(&self, title: &str) -> Result<Option<CourseMetadata>, ApiError> {
        let row = sqlx::query(
            "SELECT id, instructor, course_link, lessons_json, lesson_count
             FROM course_catalog
             WHERE id = ?1",
        )
        .bind(title)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.as_ref().map(Self::row_to_metadata))
    }

    async fn all_courses_metadata(&self) -> Result<Vec<CourseMetadata>, ApiError> {
        let rows = sqlx::query(
            "SELECT id, instructor, course_link, lessons_json, lesson_count
             FROM course_catalog
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(rows.iter().map(Self::row_to_metadata).collect())
    }

    async fn course_link(&self, title: &str) -> Result<Option<String>, ApiError> {
        let link: Option<Option<String>> =
            sqlx::query_scalar("SELECT course_link FROM course_catalog WHERE id = ?1")
                .bind(title)
                .fetch_optional(&self.pool)
                .await
                .map_err(ApiError::internal)?;
        Ok(link.flatten())
    }

    async fn lesson_link(
        &self,
        title: &str,
        lesson_number: i64,
    ) -> Result<Option<String>, ApiError> {
        Ok(self.course_metadata(title).await?.and_then(|course| {
            course
                .lessons
                .into_iter()
                .find(|lesson| lesson.lesson_number == lesson_number)
                .and_then(|lesson| lesson.lesson_link)
        }))
    }

    async fn collection_counts(&self) -> Result<CollectionCounts, ApiError> {
        let chunks: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM course_content")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(CollectionCounts {
            courses: self.course_count().await?,
            chunks: chunks as usize,
        })
    }
}
