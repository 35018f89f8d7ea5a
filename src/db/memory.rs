use async_trait::async_trait;
use bson::{oid::ObjectId, Document};
use tokio::sync::RwLock;

use crate::error::Result;
use crate::models::{CriteriaConfig, Program, ProgramPatch};

use super::document::{document_from_program, program_from_document};
use super::{ProgramFilter, ProgramStore};

/// In-process store with the same query semantics as the MongoDB backend.
/// Insertion order is store order. Programs are kept in normalized form, so
/// exported documents only carry the modelled fields.
pub struct MemoryStore {
    programs: RwLock<Vec<Program>>,
    criteria: RwLock<Option<CriteriaConfig>>,
    collection: String,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            programs: RwLock::new(Vec::new()),
            criteria: RwLock::new(None),
            collection: "programas".to_string(),
        }
    }

    pub fn with_programs(programs: Vec<Program>) -> Self {
        Self {
            programs: RwLock::new(programs.into_iter().map(with_id).collect()),
            ..Self::new()
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn with_id(mut program: Program) -> Program {
    if program.id.is_empty() {
        program.id = ObjectId::new().to_hex();
    }
    program
}

#[async_trait]
impl ProgramStore for MemoryStore {
    async fn find(&self, filter: &ProgramFilter) -> Result<Vec<Program>> {
        let programs = self.programs.read().await;
        Ok(programs
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Program>> {
        let programs = self.programs.read().await;
        Ok(programs.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, mut program: Program) -> Result<Program> {
        program.id = ObjectId::new().to_hex();
        self.programs.write().await.push(program.clone());
        Ok(program)
    }

    async fn update(&self, id: &str, patch: &ProgramPatch) -> Result<bool> {
        let mut programs = self.programs.write().await;
        match programs.iter_mut().find(|p| p.id == id) {
            Some(program) => {
                program.apply(patch);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_many(&self, ids: &[String], patch: &ProgramPatch) -> Result<u64> {
        let mut programs = self.programs.write().await;
        let mut matched = 0;
        for program in programs.iter_mut().filter(|p| ids.contains(&p.id)) {
            program.apply(patch);
            matched += 1;
        }
        Ok(matched)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut programs = self.programs.write().await;
        let before = programs.len();
        programs.retain(|p| p.id != id);
        Ok(programs.len() != before)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.programs.read().await.len() as u64)
    }

    async fn export_documents(&self) -> Result<Vec<Document>> {
        let programs = self.programs.read().await;
        programs.iter().map(document_from_program).collect()
    }

    async fn import_documents(&self, documents: Vec<Document>) -> Result<usize> {
        let programs = documents
            .into_iter()
            .map(|document| program_from_document(document).map(with_id))
            .collect::<Result<Vec<_>>>()?;
        let inserted = programs.len();
        self.programs.write().await.extend(programs);
        Ok(inserted)
    }

    async fn clear(&self) -> Result<()> {
        self.programs.write().await.clear();
        Ok(())
    }

    async fn criteria_config(&self) -> Result<Option<CriteriaConfig>> {
        Ok(self.criteria.read().await.clone())
    }

    async fn save_criteria_config(&self, config: &CriteriaConfig) -> Result<()> {
        *self.criteria.write().await = Some(config.clone());
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}
