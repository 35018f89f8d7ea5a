use std::path::{Path, PathBuf};

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::error::{AppError, Result};

use super::document::{program_from_document, restore_object_id};
use super::ProgramStore;

pub const DEFAULT_BACKUP_PREFIX: &str = "backup";

/// `<prefix>_<collection>_<ISO timestamp with ':' and '.' replaced by '-'>.json`
pub fn backup_file_name(prefix: &str, collection: &str, at: DateTime<Utc>) -> String {
    let timestamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("{}_{}_{}.json", prefix, collection, timestamp)
}

#[derive(Debug, Clone)]
pub struct BackupInfo {
    pub filename: String,
    pub path: PathBuf,
    pub created: DateTime<Utc>,
    pub size: u64,
}

/// JSON-array dumps of the program collection. Documents are written as
/// relaxed extended JSON, exactly as stored.
pub struct BackupManager {
    dir: PathBuf,
}

impl BackupManager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns `None` when the collection is empty and nothing was written.
    pub async fn backup(&self, store: &dyn ProgramStore, prefix: &str) -> Result<Option<PathBuf>> {
        let collection = store.collection_name().to_string();
        let documents = store.export_documents().await?;

        if documents.is_empty() {
            info!("Collection '{}' is empty. No backup created.", collection);
            return Ok(None);
        }

        let count = documents.len();
        let values: Vec<serde_json::Value> = documents
            .into_iter()
            .map(|document| Bson::Document(document).into_relaxed_extjson())
            .collect();
        let content = serde_json::to_string_pretty(&values)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self
            .dir
            .join(backup_file_name(prefix, &collection, Utc::now()));
        tokio::fs::write(&path, content).await?;

        info!(
            "Backup successful: '{}' -> '{}' ({} documents)",
            collection,
            path.display(),
            count
        );
        Ok(Some(path))
    }

    /// Load a JSON array of program documents from disk. Every entry must
    /// read back as a program, so a bad file is refused before anything in
    /// the store is touched.
    pub async fn read_documents(path: &Path) -> Result<Vec<Document>> {
        if !tokio::fs::try_exists(path).await? {
            return Err(AppError::Backup(format!(
                "File '{}' does not exist",
                path.display()
            )));
        }
        let content = tokio::fs::read_to_string(path).await?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        if values.is_empty() {
            return Err(AppError::Backup(format!(
                "File '{}' contains no documents",
                path.display()
            )));
        }

        values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let mut document = match Bson::try_from(value) {
                    Ok(Bson::Document(document)) => document,
                    Ok(other) => {
                        return Err(AppError::Backup(format!(
                            "Entry {} is not a document: {}",
                            i, other
                        )))
                    }
                    Err(e) => {
                        return Err(AppError::Backup(format!(
                            "Entry {} is not valid extended JSON: {}",
                            i, e
                        )))
                    }
                };
                restore_object_id(&mut document);
                program_from_document(document.clone()).map_err(|e| {
                    AppError::Backup(format!("Entry {} is not a readable program: {}", i, e))
                })?;
                Ok(document)
            })
            .collect()
    }

    /// Load `path` into the store. Refuses to touch a non-empty collection
    /// unless `overwrite` is set, in which case the collection is emptied first.
    pub async fn restore(
        &self,
        store: &dyn ProgramStore,
        path: &Path,
        overwrite: bool,
    ) -> Result<usize> {
        let documents = Self::read_documents(path).await?;

        let existing = store.count().await?;
        if existing > 0 {
            if !overwrite {
                return Err(AppError::Backup(format!(
                    "Collection '{}' already has {} documents. Use overwrite to replace it.",
                    store.collection_name(),
                    existing
                )));
            }
            warn!(
                "Dropping {} documents from '{}' for restoration",
                existing,
                store.collection_name()
            );
            store.clear().await?;
        }

        let inserted = store.import_documents(documents).await?;
        info!(
            "Restoration successful: '{}' -> '{}' ({} documents)",
            path.display(),
            store.collection_name(),
            inserted
        );
        Ok(inserted)
    }

    /// Backups whose name starts with `prefix`, newest first.
    pub async fn list(&self, prefix: &str) -> Result<Vec<BackupInfo>> {
        if !tokio::fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let filename = entry.file_name().to_string_lossy().to_string();
            if !filename.starts_with(prefix) || !filename.ends_with(".json") {
                continue;
            }
            let metadata = entry.metadata().await?;
            let created = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            backups.push(BackupInfo {
                filename,
                path: entry.path(),
                created,
                size: metadata.len(),
            });
        }

        backups.sort_by(|a, b| b.created.cmp(&a.created).then(b.filename.cmp(&a.filename)));
        Ok(backups)
    }
}
