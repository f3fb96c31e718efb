//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Store-level repositories take `&mut PgConnection` so they compose inside
//! a caller's transaction; [`DeploymentWindowRepo`] owns the transactions
//! and takes `&PgPool`.

pub mod deployment_window_repo;
pub mod policy_repo;
pub mod resource_mapping_repo;
pub mod time_window_repo;
pub mod user_directory_repo;

pub use deployment_window_repo::DeploymentWindowRepo;
pub use policy_repo::PolicyRepo;
pub use resource_mapping_repo::ResourceMappingRepo;
pub use time_window_repo::TimeWindowRepo;
pub use user_directory_repo::UserDirectoryRepo;
