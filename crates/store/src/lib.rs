pub mod batch_helpers;
pub mod cache_entries;
pub mod connection;
pub mod dead_letters;
pub mod file_states;
pub mod jobs;
pub mod schema;
pub mod snapshots;

pub use connection::{DbError, RepoDb, Result, default_cache_dir, default_data_dir};
pub use schema::{
  DEFAULT_VECTOR_DIM, dead_letter_entries_schema, embedding_cache_entries_schema, file_states_schema, jobs_schema,
  repository_snapshots_schema,
};
