//! MongoDB-backed program store.

use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, Document};
use futures::TryStreamExt;
use mongodb::{Client, Collection, IndexModel};
use tracing::{error, info};

use crate::error::Result;
use crate::models::{join_lines, CriteriaConfig, Program, ProgramPatch, Status, CRITERIA_CONFIG_TYPE};

use super::document::{document_from_program, id_bson, program_from_document};
use super::{ProgramFilter, ProgramStore, TextPattern};

const CRITERIA_COLLECTION: &str = "criteria_config";

/// Research lines live in the text column or, on older documents, the array.
const LINE_FIELDS: [&str; 2] = ["linea_investigacion", "lineas_investigacion"];

/// Fields searched by the free-text term.
const TEXT_FIELDS: [&str; 6] = [
    "universidad",
    "programa",
    "linea_investigacion",
    "lineas_investigacion",
    "resumen",
    "ciudad",
];

#[derive(Clone)]
pub struct MongoStore {
    programs: Collection<Document>,
    criteria: Collection<Document>,
    collection: String,
}

impl MongoStore {
    pub async fn connect(uri: &str, db_name: &str, collection: &str) -> Result<Self> {
        info!("Connecting to MongoDB database '{}'", db_name);

        // Fail fast instead of hanging on an unreachable server
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri).await?;
        let database = client.database(db_name);
        database.run_command(doc! { "ping": 1 }).await?;

        let store = Self {
            programs: database.collection(collection),
            criteria: database.collection(CRITERIA_COLLECTION),
            collection: collection.to_string(),
        };
        store.apply_indexes().await?;

        info!("Connected to MongoDB, using collection '{}'", collection);
        Ok(store)
    }

    async fn apply_indexes(&self) -> Result<()> {
        let by_university = IndexModel::builder()
            .keys(doc! { "universidad": 1, "ciudad": 1 })
            .build();
        self.programs.create_index(by_university).await?;
        Ok(())
    }
}

fn id_filter(id: &str) -> Document {
    doc! { "_id": id_bson(id) }
}

fn regex(pattern: &TextPattern) -> Document {
    doc! { "$regex": pattern.source(), "$options": "i" }
}

fn field_clause(field: &str, value: impl Into<Bson>) -> Document {
    let mut clause = Document::new();
    clause.insert(field, value.into());
    clause
}

pub(crate) fn filter_document(filter: &ProgramFilter) -> Document {
    let mut clauses: Vec<Document> = Vec::new();

    if let Some(text) = &filter.text {
        let alternatives: Vec<Document> = TEXT_FIELDS
            .iter()
            .map(|field| field_clause(field, regex(text)))
            .collect();
        clauses.push(doc! { "$or": alternatives });
    }

    let patterns = [
        ("universidad", &filter.universidad),
        ("ciudad", &filter.ciudad),
        ("programa", &filter.programa),
    ];
    for (field, pattern) in patterns {
        if let Some(pattern) = pattern {
            clauses.push(field_clause(field, regex(pattern)));
        }
    }

    if let Some(linea) = &filter.linea {
        let alternatives: Vec<Document> = LINE_FIELDS
            .iter()
            .map(|field| field_clause(field, regex(linea)))
            .collect();
        clauses.push(doc! { "$or": alternatives });
    }

    let thresholds = [
        ("calificacion.valor", filter.min_calificacion),
        ("stats.innovacion", filter.min_innovacion),
        ("stats.aplicabilidad", filter.min_aplicabilidad),
    ];
    for (field, min) in thresholds {
        if let Some(min) = min {
            clauses.push(field_clause(field, doc! { "$gte": i32::from(min) }));
        }
    }

    if let Some(status) = filter.status {
        if status == Status::Pendiente {
            // `null` also matches documents without the field
            clauses.push(doc! { "status": { "$in": ["pendiente", Bson::Null] } });
        } else {
            clauses.push(doc! { "status": status.as_str() });
        }
    }

    if let Some((universidad, ciudad)) = &filter.university {
        clauses.push(doc! { "universidad": universidad.as_str(), "ciudad": ciudad.as_str() });
    }

    match clauses.len() {
        0 => Document::new(),
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    }
}

pub(crate) fn set_document(patch: &ProgramPatch) -> Result<Document> {
    let mut set = Document::new();
    if let Some(programa) = &patch.programa {
        set.insert("programa", programa.as_str());
    }
    if let Some(url) = &patch.url {
        set.insert("url", url.as_str());
    }
    if let Some(lineas) = &patch.lineas_investigacion {
        set.insert("linea_investigacion", join_lines(lineas));
    }
    if let Some(resumen) = &patch.resumen {
        set.insert("resumen", resumen.as_str());
    }
    if let Some(status) = patch.status {
        set.insert("status", status.as_str());
    }
    if let Some(calificacion) = &patch.calificacion {
        set.insert("calificacion", bson::to_bson(calificacion)?);
    }
    if let Some(criterios) = &patch.criterios {
        set.insert("criterios", bson::to_bson(criterios)?);
    }
    if let Some(favorite) = patch.favorite {
        set.insert("favorite", favorite);
    }
    if let Some(coords) = &patch.coords {
        set.insert("coords", bson::to_bson(coords)?);
    }
    if let Some(stats) = &patch.stats {
        set.insert("stats", bson::to_bson(stats)?);
    }
    if let Some(metrics) = &patch.ciudad_metrics {
        set.insert("ciudad_metrics", bson::to_bson(metrics)?);
    }
    Ok(set)
}

#[async_trait]
impl ProgramStore for MongoStore {
    async fn find(&self, filter: &ProgramFilter) -> Result<Vec<Program>> {
        let cursor = self.programs.find(filter_document(filter)).await?;
        let documents: Vec<Document> = cursor.try_collect().await?;

        documents
            .into_iter()
            .map(|document| {
                let id = document.get("_id").cloned().unwrap_or(Bson::Null);
                program_from_document(document).inspect_err(|e| {
                    error!("Unreadable program document {}: {}", id, e);
                })
            })
            .collect()
    }

    async fn get(&self, id: &str) -> Result<Option<Program>> {
        self.programs
            .find_one(id_filter(id))
            .await?
            .map(program_from_document)
            .transpose()
    }

    async fn insert(&self, mut program: Program) -> Result<Program> {
        program.id = ObjectId::new().to_hex();
        self.programs
            .insert_one(document_from_program(&program)?)
            .await?;
        Ok(program)
    }

    async fn update(&self, id: &str, patch: &ProgramPatch) -> Result<bool> {
        let set = set_document(patch)?;
        if set.is_empty() {
            return Ok(self.get(id).await?.is_some());
        }
        let result = self
            .programs
            .update_one(id_filter(id), doc! { "$set": set })
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn update_many(&self, ids: &[String], patch: &ProgramPatch) -> Result<u64> {
        let set = set_document(patch)?;
        if ids.is_empty() || set.is_empty() {
            return Ok(0);
        }
        let ids: Vec<Bson> = ids.iter().map(|id| id_bson(id)).collect();
        let result = self
            .programs
            .update_many(doc! { "_id": { "$in": ids } }, doc! { "$set": set })
            .await?;
        Ok(result.matched_count)
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = self.programs.delete_one(id_filter(id)).await?;
        Ok(result.deleted_count > 0)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.programs.count_documents(doc! {}).await?)
    }

    async fn export_documents(&self) -> Result<Vec<Document>> {
        let cursor = self.programs.find(doc! {}).await?;
        Ok(cursor.try_collect().await?)
    }

    async fn import_documents(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }
        let result = self.programs.insert_many(documents).await?;
        Ok(result.inserted_ids.len())
    }

    async fn clear(&self) -> Result<()> {
        let result = self.programs.delete_many(doc! {}).await?;
        info!(
            "Removed {} documents from '{}'",
            result.deleted_count, self.collection
        );
        Ok(())
    }

    async fn criteria_config(&self) -> Result<Option<CriteriaConfig>> {
        let found = self
            .criteria
            .find_one(doc! { "type": CRITERIA_CONFIG_TYPE })
            .await?;
        match found {
            Some(mut document) => {
                document.remove("_id");
                Ok(Some(bson::from_document(document)?))
            }
            None => Ok(None),
        }
    }

    async fn save_criteria_config(&self, config: &CriteriaConfig) -> Result<()> {
        let document = bson::to_document(config)?;
        self.criteria
            .replace_one(doc! { "type": CRITERIA_CONFIG_TYPE }, document)
            .upsert(true)
            .await?;
        Ok(())
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Calificacion, Stats};

    #[test]
    fn empty_filter_is_empty_document() {
        assert!(filter_document(&ProgramFilter::all()).is_empty());
    }

    #[test]
    fn text_and_fields_are_combined_with_and() {
        let filter = ProgramFilter {
            text: Some(TextPattern::new("robot").unwrap()),
            universidad: Some(TextPattern::new("Sevilla").unwrap()),
            min_calificacion: Some(4),
            ..Default::default()
        };
        let document = filter_document(&filter);
        let clauses = document.get_array("$and").unwrap();
        assert_eq!(clauses.len(), 3);

        let text = clauses[0].as_document().unwrap().get_array("$or").unwrap();
        assert_eq!(text.len(), 6);
        assert_eq!(
            clauses[2].as_document().unwrap(),
            &doc! { "calificacion.valor": { "$gte": 4 } }
        );
    }

    #[test]
    fn line_searches_cover_the_legacy_array() {
        let filter = ProgramFilter {
            linea: Some(TextPattern::new("astro").unwrap()),
            ..Default::default()
        };
        let pattern = doc! { "$regex": "astro", "$options": "i" };
        assert_eq!(
            filter_document(&filter),
            doc! { "$or": [
                { "linea_investigacion": pattern.clone() },
                { "lineas_investigacion": pattern }
            ] }
        );

        let filter = ProgramFilter {
            text: Some(TextPattern::new("astro").unwrap()),
            ..Default::default()
        };
        let document = filter_document(&filter);
        let fields: Vec<&str> = document
            .get_array("$or")
            .unwrap()
            .iter()
            .filter_map(|clause| clause.as_document()?.keys().next().map(String::as_str))
            .collect();
        assert!(fields.contains(&"lineas_investigacion"));
        assert!(fields.contains(&"linea_investigacion"));
    }

    #[test]
    fn pendiente_matches_missing_status() {
        let filter = ProgramFilter {
            status: Some(Status::Pendiente),
            ..Default::default()
        };
        assert_eq!(
            filter_document(&filter),
            doc! { "status": { "$in": ["pendiente", Bson::Null] } }
        );
    }

    #[test]
    fn object_ids_round_trip_through_documents() {
        let program = Program {
            id: ObjectId::new().to_hex(),
            universidad: "Universidad de Oviedo".into(),
            ciudad: "Oviedo".into(),
            programa: "Química".into(),
            url: String::new(),
            lineas_investigacion: vec!["Catálisis".into()],
            resumen: None,
            status: Status::Aplicando,
            calificacion: Some(Calificacion::new(5).unwrap()),
            criterios: None,
            favorite: true,
            coords: None,
            stats: Some(Stats::default()),
            ciudad_metrics: None,
        };
        let document = document_from_program(&program).unwrap();
        assert!(matches!(document.get("_id"), Some(Bson::ObjectId(_))));
        assert_eq!(document.get_str("linea_investigacion").unwrap(), "Catálisis");

        let back = program_from_document(document).unwrap();
        assert_eq!(back.id, program.id);
        assert_eq!(back.status, Status::Aplicando);
        assert_eq!(back.stats, program.stats);
    }

    #[test]
    fn set_document_uses_stored_field_names() {
        let patch = ProgramPatch {
            lineas_investigacion: Some(vec!["A".into(), "B".into()]),
            status: Some(Status::Considerando),
            ..Default::default()
        };
        let set = set_document(&patch).unwrap();
        assert_eq!(set.get_str("linea_investigacion").unwrap(), "A\n\nB");
        assert_eq!(set.get_str("status").unwrap(), "considerando");
        assert_eq!(set.len(), 2);
    }
}
