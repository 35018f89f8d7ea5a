mod backup;
mod document;
mod filter;
mod memory;
mod mongo;

use async_trait::async_trait;
use bson::Document;

use crate::error::Result;
use crate::models::{CriteriaConfig, Program, ProgramPatch};

pub use backup::{backup_file_name, BackupInfo, BackupManager, DEFAULT_BACKUP_PREFIX};
pub use document::{LinesText, ProgramDocument};
pub use filter::{ProgramFilter, TextPattern};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Persistence boundary for program documents and the criteria configuration.
///
/// Single-document writes are atomic; nothing spanning several documents is.
#[async_trait]
pub trait ProgramStore: Send + Sync {
    /// Programs matching `filter`, in store order.
    async fn find(&self, filter: &ProgramFilter) -> Result<Vec<Program>>;

    async fn get(&self, id: &str) -> Result<Option<Program>>;

    /// Insert a new program; the store assigns the id.
    async fn insert(&self, program: Program) -> Result<Program>;

    /// Returns `false` when no program has this id.
    async fn update(&self, id: &str, patch: &ProgramPatch) -> Result<bool>;

    /// Apply the same patch to every listed program; returns how many matched.
    async fn update_many(&self, ids: &[String], patch: &ProgramPatch) -> Result<u64>;

    /// Returns `false` when no program has this id.
    async fn delete(&self, id: &str) -> Result<bool>;

    async fn count(&self) -> Result<u64>;

    /// Every document as stored, including fields no model knows about.
    async fn export_documents(&self) -> Result<Vec<Document>>;

    /// Bulk load raw documents, keeping their ids.
    async fn import_documents(&self, documents: Vec<Document>) -> Result<usize>;

    /// Remove every program.
    async fn clear(&self) -> Result<()>;

    async fn criteria_config(&self) -> Result<Option<CriteriaConfig>>;

    async fn save_criteria_config(&self, config: &CriteriaConfig) -> Result<()>;

    fn collection_name(&self) -> &str;
}
