use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::aggregate::{build_analysis, build_universities};
use crate::ai::{OpenAiClient, TextGenerator};
use crate::config::Config;
use crate::db::{MemoryStore, MongoStore, ProgramFilter, ProgramStore};
use crate::enrich::{EnrichmentReport, Enricher};
use crate::error::{AppError, Result};
use crate::models::{
    AnalysisResponse, Calificacion, CriteriaConfig, Criterios, NewProgram, NewUniversity, Program,
    ProgramPatch, Status, UniversitiesResponse, UniversityPlaceholder, UniversityTree,
    CRITERIA_CONFIG_TYPE,
};
use crate::search::{SearchParams, SearchResult};
use crate::services::{Geocoder, NominatimGeocoder};

const PROGRAM_NOT_FOUND: &str = "Programa no encontrado";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriosResponse {
    pub criterios: Option<Criterios>,
    pub has_criterios: bool,
}

/// Collection-level counters for `GET /api/programas/stats`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub total: usize,
    pub universidades: usize,
    pub ciudades: usize,
    pub por_status: BTreeMap<String, usize>,
    pub calificados: usize,
    pub sin_calificar: usize,
    pub con_resumen: usize,
    pub con_coords: usize,
    pub con_stats: usize,
    pub con_ciudad_metrics: usize,
    /// Programs carrying coords, stats and a summary.
    pub enriquecidos: usize,
}

/// Program service shared by the HTTP API and the CLI.
pub struct App {
    store: Arc<dyn ProgramStore>,
    generator: Option<Arc<dyn TextGenerator>>,
    geocoder: Option<Arc<dyn Geocoder>>,
    enrich_workers: usize,
}

impl App {
    pub fn new(store: Arc<dyn ProgramStore>) -> Self {
        Self {
            store,
            generator: None,
            geocoder: None,
            enrich_workers: 1,
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_enrich_workers(mut self, workers: usize) -> Self {
        self.enrich_workers = workers.max(1);
        self
    }

    /// Wire the store and outbound clients described by `config`. With
    /// `memory` the programs live in process and are lost on exit.
    pub async fn from_config(config: &Config, memory: bool) -> Result<Self> {
        let store: Arc<dyn ProgramStore> = if memory {
            info!("Using in-memory program store");
            Arc::new(MemoryStore::new())
        } else {
            Arc::new(
                MongoStore::connect(
                    &config.mongodb_uri,
                    &config.database_name(),
                    &config.collection,
                )
                .await?,
            )
        };

        let mut app = App::new(store)
            .with_geocoder(Arc::new(NominatimGeocoder::new(&config.geocoding_url)?))
            .with_enrich_workers(config.enrich_workers);

        match &config.openai_api_key {
            Some(key) => {
                app = app.with_generator(Arc::new(OpenAiClient::new(
                    key.clone(),
                    &config.openai_base_url,
                    &config.openai_model,
                )));
            }
            None => debug!("OPENAI_API_KEY not set; enrichment disabled"),
        }

        Ok(app)
    }

    pub fn store(&self) -> Arc<dyn ProgramStore> {
        Arc::clone(&self.store)
    }

    pub async fn list_programs(&self) -> Result<Vec<Program>> {
        self.store.find(&ProgramFilter::all()).await
    }

    pub async fn get_program(&self, id: &str) -> Result<Program> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| AppError::not_found(PROGRAM_NOT_FOUND))
    }

    /// Insert a program. A sibling at the same (universidad, ciudad) donates
    /// a snapshot of its enrichment fields.
    pub async fn create_program(&self, input: NewProgram) -> Result<Program> {
        let mut program = input.into_program()?;

        let siblings = self
            .store
            .find(&ProgramFilter::university(&program.universidad, &program.ciudad))
            .await?;
        if let Some(sibling) = siblings.first() {
            debug!(
                "Inheriting enrichment from {} for new program in {}",
                sibling.id, program.universidad
            );
            program.stats = sibling.stats;
            program.ciudad_metrics = sibling.ciudad_metrics.clone();
            program.coords = sibling.coords;
        }

        let program = self.store.insert(program).await?;
        info!("Created program {} ({})", program.id, program.programa);
        Ok(program)
    }

    /// Partial update from an arbitrary JSON object; returns the new state.
    pub async fn update_program(
        &self,
        id: &str,
        body: serde_json::Map<String, serde_json::Value>,
    ) -> Result<Program> {
        let patch = ProgramPatch::from_json(body)?;
        if !self.store.update(id, &patch).await? {
            return Err(AppError::not_found(PROGRAM_NOT_FOUND));
        }
        self.get_program(id).await
    }

    pub async fn set_status(&self, id: &str, status: Option<&str>) -> Result<Status> {
        let status: Status = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::validation("Status is required"))?
            .parse()?;

        if !self.store.update(id, &ProgramPatch::status(status)).await? {
            return Err(AppError::not_found(PROGRAM_NOT_FOUND));
        }
        Ok(status)
    }

    pub async fn set_calificacion(
        &self,
        id: &str,
        calificacion: Option<Calificacion>,
    ) -> Result<Calificacion> {
        let calificacion =
            calificacion.ok_or_else(|| AppError::validation("Calificación requerida"))?;
        calificacion.validate()?;

        if !self
            .store
            .update(id, &ProgramPatch::calificacion(calificacion.clone()))
            .await?
        {
            return Err(AppError::not_found(PROGRAM_NOT_FOUND));
        }
        Ok(calificacion)
    }

    pub async fn delete_program(&self, id: &str) -> Result<()> {
        if !self.store.delete(id).await? {
            return Err(AppError::not_found(PROGRAM_NOT_FOUND));
        }
        info!("Deleted program {}", id);
        Ok(())
    }

    pub async fn criterios(&self, id: &str) -> Result<CriteriosResponse> {
        let program = self.get_program(id).await?;
        let has_criterios = program
            .criterios
            .as_ref()
            .is_some_and(|c| c.values().any(|v| *v > 0.0));
        Ok(CriteriosResponse {
            criterios: program.criterios,
            has_criterios,
        })
    }

    pub async fn universities(&self) -> Result<UniversitiesResponse> {
        let programs = self.list_programs().await?;
        Ok(UniversitiesResponse::new(build_universities(&programs)))
    }

    /// Echo a placeholder university; nothing is persisted.
    pub fn add_university(&self, input: NewUniversity) -> Result<UniversityPlaceholder> {
        let required = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        match (required(input.nombre), required(input.ciudad)) {
            (Some(nombre), Some(ciudad)) => Ok(UniversityPlaceholder {
                nombre,
                ciudad,
                programas: Vec::new(),
            }),
            _ => Err(AppError::validation("Nombre y ciudad son requeridos")),
        }
    }

    pub async fn analysis(&self) -> Result<AnalysisResponse> {
        let programs = self.list_programs().await?;
        Ok(AnalysisResponse {
            universidades: build_analysis(&programs),
        })
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchResult> {
        let filter = params.to_filter()?;
        let programs = self.store.find(&filter).await?;
        debug!("Search matched {} programs", programs.len());

        Ok(SearchResult {
            total: programs.len(),
            programas_doctorado: UniversityTree {
                universidades: build_universities(&programs),
            },
            termino_busqueda: params.termino(),
        })
    }

    pub async fn enrich(&self) -> Result<EnrichmentReport> {
        let generator = self
            .generator
            .clone()
            .ok_or_else(|| AppError::Config("OPENAI_API_KEY is required for enrichment".into()))?;
        let geocoder = self
            .geocoder
            .clone()
            .ok_or_else(|| AppError::Config("No geocoder configured".into()))?;

        Enricher::new(self.store(), generator, geocoder)
            .with_workers(self.enrich_workers)
            .run()
            .await
    }

    pub async fn collection_stats(&self) -> Result<CollectionStats> {
        let programs = self.list_programs().await?;

        let mut por_status: BTreeMap<String, usize> = Status::ALL
            .iter()
            .map(|s| (s.to_string(), 0))
            .collect();
        for program in &programs {
            *por_status.entry(program.status.to_string()).or_default() += 1;
        }

        let universidades: HashSet<&str> =
            programs.iter().map(|p| p.universidad.as_str()).collect();
        let ciudades: HashSet<&str> = programs.iter().map(|p| p.ciudad.as_str()).collect();
        let calificados = programs
            .iter()
            .filter(|p| p.calificacion.as_ref().is_some_and(|c| c.valor >= 1))
            .count();

        Ok(CollectionStats {
            total: programs.len(),
            universidades: universidades.len(),
            ciudades: ciudades.len(),
            por_status,
            calificados,
            sin_calificar: programs.len() - calificados,
            con_resumen: programs.iter().filter(|p| p.has_resumen()).count(),
            con_coords: programs.iter().filter(|p| p.coords.is_some()).count(),
            con_stats: programs.iter().filter(|p| p.stats.is_some()).count(),
            con_ciudad_metrics: programs.iter().filter(|p| p.ciudad_metrics.is_some()).count(),
            enriquecidos: programs
                .iter()
                .filter(|p| p.coords.is_some() && p.stats.is_some() && p.has_resumen())
                .count(),
        })
    }

    /// The stored criteria configuration, or the built-in default.
    pub async fn criteria_config(&self) -> Result<CriteriaConfig> {
        Ok(self.store.criteria_config().await?.unwrap_or_default())
    }

    pub async fn save_criteria_config(&self, mut config: CriteriaConfig) -> Result<CriteriaConfig> {
        config.validate()?;
        config.config_type = CRITERIA_CONFIG_TYPE.to_string();
        config.last_updated = Utc::now();
        self.store.save_criteria_config(&config).await?;
        info!("Criteria configuration saved (version {})", config.version);
        Ok(config)
    }

    /// Store the default criteria configuration. Returns `false` when one
    /// already exists and `force` is not set.
    pub async fn init_criteria(&self, force: bool) -> Result<bool> {
        if self.store.criteria_config().await?.is_some() && !force {
            info!("Criteria configuration already exists; use --force to replace it");
            return Ok(false);
        }
        self.save_criteria_config(CriteriaConfig::default()).await?;
        Ok(true)
    }

    /// Give every program without criterios an all-zero map over the
    /// configured criteria keys. Returns how many programs changed.
    pub async fn init_criterios(&self) -> Result<u64> {
        let config = self.criteria_config().await?;
        let ids: Vec<String> = self
            .list_programs()
            .await?
            .into_iter()
            .filter(|p| p.criterios.is_none())
            .map(|p| p.id)
            .collect();

        if ids.is_empty() {
            return Ok(0);
        }

        let patch = ProgramPatch {
            criterios: Some(config.empty_scores()),
            ..Default::default()
        };
        let updated = self.store.update_many(&ids, &patch).await?;
        info!("Initialised criterios on {} programs", updated);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Coords, Stats};

    fn app() -> App {
        App::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn new_program_inherits_sibling_enrichment() {
        let app = app();
        let first = app
            .create_program(NewProgram::new("Universidad de Cádiz", "Cádiz", "Oceanografía"))
            .await
            .unwrap();
        let patch = ProgramPatch {
            coords: Some(Coords { lat: 36.5, lon: -6.3 }),
            stats: Some(Stats::default()),
            ..Default::default()
        };
        app.store().update(&first.id, &patch).await.unwrap();

        let second = app
            .create_program(NewProgram::new("Universidad de Cádiz", "Cádiz", "Química"))
            .await
            .unwrap();
        assert_eq!(second.coords, Some(Coords { lat: 36.5, lon: -6.3 }));
        assert_eq!(second.stats, Some(Stats::default()));

        let other = app
            .create_program(NewProgram::new("Universidad de Cádiz", "Jerez", "Enología"))
            .await
            .unwrap();
        assert!(other.coords.is_none());
    }

    #[tokio::test]
    async fn status_requires_a_known_value() {
        let app = app();
        let program = app
            .create_program(NewProgram::new("UCM", "Madrid", "Filosofía"))
            .await
            .unwrap();
        assert!(matches!(
            app.set_status(&program.id, None).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            app.set_status(&program.id, Some("archivado")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            app.set_status("missing", Some("aplicando")).await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(
            app.set_status(&program.id, Some("aplicando")).await.unwrap(),
            Status::Aplicando
        );
    }

    #[tokio::test]
    async fn criterios_reports_presence() {
        let app = app();
        let program = app
            .create_program(NewProgram::new("UCM", "Madrid", "Filosofía"))
            .await
            .unwrap();
        assert!(!app.criterios(&program.id).await.unwrap().has_criterios);

        assert_eq!(app.init_criterios().await.unwrap(), 1);
        let zeroed = app.criterios(&program.id).await.unwrap();
        assert!(zeroed.criterios.is_some());
        assert!(!zeroed.has_criterios);

        let mut body = serde_json::Map::new();
        body.insert("criterios".into(), serde_json::json!({"relevancia": 4}));
        app.update_program(&program.id, body).await.unwrap();
        assert!(app.criterios(&program.id).await.unwrap().has_criterios);
    }

    #[tokio::test]
    async fn enrich_without_key_is_a_config_error() {
        assert!(matches!(app().enrich().await, Err(AppError::Config(_))));
    }

    #[tokio::test]
    async fn init_criteria_respects_force() {
        let app = app();
        assert!(app.init_criteria(false).await.unwrap());
        assert!(!app.init_criteria(false).await.unwrap());
        assert!(app.init_criteria(true).await.unwrap());
    }

    #[tokio::test]
    async fn collection_stats_count_statuses() {
        let app = app();
        app.create_program(NewProgram::new("UCM", "Madrid", "A")).await.unwrap();
        let b = app.create_program(NewProgram::new("UPM", "Madrid", "B")).await.unwrap();
        app.set_status(&b.id, Some("interesado")).await.unwrap();

        let stats = app.collection_stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.universidades, 2);
        assert_eq!(stats.ciudades, 1);
        assert_eq!(stats.por_status["pendiente"], 1);
        assert_eq!(stats.por_status["interesado"], 1);
        assert_eq!(stats.sin_calificar, 2);
    }
}
