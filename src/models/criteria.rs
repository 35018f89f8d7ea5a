use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

use super::program::Criterios;

pub const CRITERIA_CONFIG_TYPE: &str = "criteria_config";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Criterion {
    pub id: u32,
    pub key: String,
    pub label: String,
    pub description: String,
    /// Level number ("1".."5") to its human-readable description.
    pub levels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriteriaConfig {
    #[serde(rename = "type", default = "config_type")]
    pub config_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(rename = "lastUpdated", default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    pub criteria: Vec<Criterion>,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn config_type() -> String {
    CRITERIA_CONFIG_TYPE.to_string()
}

/// Criterion as exposed by `GET /api/criteria`, keyed by its `key`.
#[derive(Debug, Clone, Serialize)]
pub struct CriterionView {
    pub id: u32,
    pub label: String,
    pub description: String,
    pub levels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CriteriaView {
    pub criteria: BTreeMap<String, CriterionView>,
    #[serde(rename = "lastUpdated")]
    pub last_updated: DateTime<Utc>,
    pub version: String,
}

impl CriteriaConfig {
    pub fn validate(&self) -> Result<()> {
        if self.criteria.len() != 5 {
            return Err(AppError::validation(format!(
                "Se esperaban 5 criterios, recibidos {}",
                self.criteria.len()
            )));
        }
        for criterion in &self.criteria {
            if criterion.key.trim().is_empty() || criterion.label.trim().is_empty() {
                return Err(AppError::validation(format!(
                    "El criterio {} no tiene clave o etiqueta",
                    criterion.id
                )));
            }
            let complete = (1..=5).all(|level| criterion.levels.contains_key(&level.to_string()));
            if !complete || criterion.levels.len() != 5 {
                return Err(AppError::validation(format!(
                    "El criterio '{}' debe describir exactamente los niveles 1 a 5",
                    criterion.key
                )));
            }
        }
        Ok(())
    }

    pub fn view(&self) -> CriteriaView {
        CriteriaView {
            criteria: self
                .criteria
                .iter()
                .map(|c| {
                    (
                        c.key.clone(),
                        CriterionView {
                            id: c.id,
                            label: c.label.clone(),
                            description: c.description.clone(),
                            levels: c.levels.clone(),
                        },
                    )
                })
                .collect(),
            last_updated: self.last_updated,
            version: self.version.clone(),
        }
    }

    /// An all-zero score map over this configuration's keys.
    pub fn empty_scores(&self) -> Criterios {
        self.criteria.iter().map(|c| (c.key.clone(), 0.0)).collect()
    }
}

fn criterion(id: u32, key: &str, label: &str, description: &str, levels: [&str; 5]) -> Criterion {
    Criterion {
        id,
        key: key.to_string(),
        label: label.to_string(),
        description: description.to_string(),
        levels: levels
            .iter()
            .enumerate()
            .map(|(i, text)| ((i + 1).to_string(), text.to_string()))
            .collect(),
    }
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            config_type: config_type(),
            version: default_version(),
            last_updated: Utc::now(),
            criteria: vec![
                criterion(
                    1,
                    "relevancia",
                    "Relevancia Personal y Afinidad Temática",
                    "Evalúa qué tan alineadas están las líneas de investigación con tus intereses académicos o profesionales.",
                    [
                        "Las líneas están en un área general, pero no conectan con tu tema.",
                        "Solo hay una línea lejana a tu interés.",
                        "Una o dos líneas son parcialmente compatibles.",
                        "Una línea muy alineada y otras relacionadas.",
                        "Varias líneas directamente relacionadas con tu tema.",
                    ],
                ),
                criterion(
                    2,
                    "claridad",
                    "Claridad y Especificidad de las Líneas de Investigación",
                    "Evalúa qué tan bien explicadas están las líneas de investigación.",
                    [
                        "Solo hay títulos genéricos.",
                        "Descripciones breves que no aclaran bien los temas.",
                        "Las líneas están explicadas pero sin ejemplos o desglose.",
                        "Hay subtemas o subdivisiones, aunque sin ejemplos concretos.",
                        "Las líneas incluyen subtemas, proyectos pasados o actuales, y vinculación con grupos reales.",
                    ],
                ),
                criterion(
                    3,
                    "entorno",
                    "Entorno del Programa (Cultura, Mentoría y Bienestar Estudiantil)",
                    "Evalúa la experiencia general del estudiante según reseñas y testimonios.",
                    [
                        "Ambiente tóxico o negativo frecuente.",
                        "Apoyo inconsistente; problemas con tutores.",
                        "Entorno funcional pero con experiencias mixtas.",
                        "Opiniones mayormente positivas sobre mentores y comunidad.",
                        "Comunidad activa, apoyo cercano, y bienestar destacado.",
                    ],
                ),
                criterion(
                    4,
                    "infraestructura",
                    "Infraestructura Académica y Recursos",
                    "Evalúa si el programa ofrece recursos físicos y digitales adecuados.",
                    [
                        "No hay imágenes, ni menciones de laboratorios o bibliotecas. Fotos muestran deterioro.",
                        "Hay mención de aulas y bibliotecas, pero sin detalle sobre software o accesibilidad.",
                        "Fotos y reseñas muestran instalaciones razonables y uso de alguna plataforma digital.",
                        "Laboratorios, software académico y bibliotecas digitales disponibles y visibles.",
                        "Infraestructura moderna, especializada, accesible, con coworking, bases de datos remotas, y aulas inteligentes.",
                    ],
                ),
                criterion(
                    5,
                    "actividades",
                    "Enfoque y Flexibilidad de las Actividades Formativas",
                    "Evalúa la existencia de un plan formativo más allá de la tesis, y qué tan flexible es.",
                    [
                        "No hay formación adicional o es rígida.",
                        "Solo actividades fijas (seminarios, publicaciones), sin personalización.",
                        "Algunas opciones de personalización, combinando formación específica y transversal.",
                        "Plan estructurado y flexible con valoración diferenciada según tipo de actividad.",
                        "Itinerario completamente personalizable, con movilidad, cotutelas, proyectos externos, y validación formal.",
                    ],
                ),
            ],
        }
    }
}
