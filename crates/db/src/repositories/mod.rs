//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod project_repo;
pub mod result_repo;
pub mod schema_repo;
pub mod task_repo;

pub use project_repo::ProjectRepo;
pub use result_repo::ResultRepo;
pub use schema_repo::SchemaRepo;
pub use task_repo::TaskRepo;
