//! Infrastructure layer: configuration, storage and multi-step workflows.

pub mod config;
pub mod legacy_sync;
pub mod store;
pub mod workflows;

pub use config::{AppConfig, ConfigError};
pub use legacy_sync::{LegacyChapterSync, ModuleMirrorSync};
pub use store::{InMemoryLearningStore, LearningStore, PostgresLearningStore, StoreError, StoreResult};
pub use workflows::{Actor, LearningWorkflows};
