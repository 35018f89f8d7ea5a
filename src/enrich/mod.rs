//! Batch enrichment: coordinates, city metrics, summaries and stats, written
//! back onto every program of each university.

mod metrics;

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::aggregate::group_by_university;
use crate::ai::{prompts, TextGenerator};
use crate::db::{ProgramFilter, ProgramStore};
use crate::error::Result;
use crate::models::{Program, ProgramPatch, Stats};
use crate::services::Geocoder;

pub use metrics::{city_metrics, parse_stats, Metric, MetricSpec, MetricValue, METRICS};

pub const FALLBACK_SUMMARY: &str = "No se pudo generar un resumen.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentReport {
    pub message: String,
    /// Programs that received a new summary.
    pub updated: usize,
    pub universities: usize,
}

pub struct Enricher {
    store: Arc<dyn ProgramStore>,
    generator: Arc<dyn TextGenerator>,
    geocoder: Arc<dyn Geocoder>,
    workers: usize,
}

impl Enricher {
    pub fn new(
        store: Arc<dyn ProgramStore>,
        generator: Arc<dyn TextGenerator>,
        geocoder: Arc<dyn Geocoder>,
    ) -> Self {
        Self {
            store,
            generator,
            geocoder,
            workers: 1,
        }
    }

    /// Universities processed concurrently; 1 is strictly sequential.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub async fn run(&self) -> Result<EnrichmentReport> {
        let programs = self.store.find(&ProgramFilter::all()).await?;
        let groups: Vec<Vec<Program>> = group_by_university(&programs)
            .into_iter()
            .map(|group| group.into_iter().cloned().collect())
            .collect();
        let universities = groups.len();

        info!(
            "Enriching {} programs across {} universities ({} workers)",
            programs.len(),
            universities,
            self.workers
        );

        let updated: usize = stream::iter(groups)
            .map(|group| async move { self.enrich_university(group).await })
            .buffer_unordered(self.workers)
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .sum();

        info!("Enrichment finished: {} summaries written", updated);

        Ok(EnrichmentReport {
            message: "Data enrichment completed".to_string(),
            updated,
            universities,
        })
    }

    /// Never fails; individual errors are logged and skipped.
    async fn enrich_university(&self, group: Vec<Program>) -> usize {
        let Some(first) = group.first() else {
            return 0;
        };
        let universidad = first.universidad.clone();
        let ciudad = first.ciudad.trim().to_string();

        let coords = if ciudad.is_empty() || group.iter().any(|p| p.coords.is_some()) {
            None
        } else {
            let coords = self.geocoder.locate(&ciudad).await;
            debug!("Coordinates for {}: {:?}", ciudad, coords);
            coords
        };

        let ciudad_metrics = if ciudad.is_empty() {
            None
        } else {
            info!("Getting metrics for {}...", ciudad);
            Some(city_metrics(self.generator.as_ref(), &ciudad).await)
        };

        let mut updated = 0;
        for program in &group {
            if program.has_resumen() || program.lineas_investigacion.is_empty() {
                continue;
            }
            let resumen = match self
                .generator
                .generate(&prompts::summary(&program.linea_investigacion()))
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!("Error generating summary for {}: {}", program.id, e);
                    FALLBACK_SUMMARY.to_string()
                }
            };
            let patch = ProgramPatch {
                resumen: Some(resumen),
                ..Default::default()
            };
            match self.store.update(&program.id, &patch).await {
                Ok(true) => updated += 1,
                Ok(false) => warn!("Program {} vanished during enrichment", program.id),
                Err(e) => error!("Failed to store summary for {}: {}", program.id, e),
            }
        }

        let stats = match self
            .generator
            .generate(&prompts::stats(&universidad, &group))
            .await
        {
            Ok(reply) => parse_stats(&reply),
            Err(e) => {
                warn!("Error generating stats for {}: {}", universidad, e);
                Stats::default()
            }
        };

        let ids: Vec<String> = group.iter().map(|p| p.id.clone()).collect();
        let patch = ProgramPatch {
            coords,
            stats: Some(stats),
            ciudad_metrics,
            ..Default::default()
        };
        match self.store.update_many(&ids, &patch).await {
            Ok(matched) => debug!("Updated {} programs of {}", matched, universidad),
            Err(e) => error!("Failed to update programs of {}: {}", universidad, e),
        }

        updated
    }
}
