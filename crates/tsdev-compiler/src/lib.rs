pub mod backend;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod glob;
pub mod paths;

pub use backend::TranspileBackend;
pub use cache::{BuildGroup, BuildSet, CompiledFile};
pub use config::ProjectConfig;
pub use coordinator::CompileCoordinator;
pub use error::CompileError;
pub use paths::{AbsPath, GroupRoot, SourcePath};
