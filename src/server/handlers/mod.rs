pub mod courses;
pub mod health;
pub mod query;
pub mod sessions;
