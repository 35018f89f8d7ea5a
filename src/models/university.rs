use serde::{Deserialize, Serialize};

use super::program::{Calificacion, CiudadMetrics, Coords, Criterios, Program, Stats, Status};

/// A program as projected into the university tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramView {
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre: String,
    pub url: String,
    pub lineas_investigacion: Vec<String>,
    pub resumen: Option<String>,
    pub status: Status,
    pub calificacion: Option<Calificacion>,
    pub criterios: Option<Criterios>,
    pub favorite: bool,
    pub stats: Option<Stats>,
    pub ciudad_metrics: Option<CiudadMetrics>,
}

impl ProgramView {
    pub fn from_program(program: &Program) -> Self {
        Self {
            id: program.id.clone(),
            nombre: program.programa.clone(),
            url: program.url.clone(),
            lineas_investigacion: program.lineas_investigacion.clone(),
            resumen: program.resumen.clone(),
            status: program.status,
            calificacion: program.calificacion.clone(),
            criterios: program.criterios.clone(),
            favorite: program.favorite,
            stats: program.stats,
            ciudad_metrics: program.ciudad_metrics.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityView {
    pub nombre: String,
    pub ciudad: String,
    pub coords: Option<Coords>,
    pub stats: Option<Stats>,
    pub ciudad_metrics: Option<CiudadMetrics>,
    pub programas: Vec<ProgramView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityTree {
    pub universidades: Vec<UniversityView>,
}

/// Envelope shared by `/api/universidades` and `/api/busqueda`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversitiesResponse {
    pub programas_doctorado: UniversityTree,
}

impl UniversitiesResponse {
    pub fn new(universidades: Vec<UniversityView>) -> Self {
        Self {
            programas_doctorado: UniversityTree { universidades },
        }
    }
}

/// Placeholder echoed by `POST /api/universidades`; nothing is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUniversity {
    #[serde(default)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub ciudad: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniversityPlaceholder {
    pub nombre: String,
    pub ciudad: String,
    pub programas: Vec<ProgramView>,
}

/// One row of `GET /api/analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniversityAnalysis {
    pub nombre: String,
    pub ciudad: String,
    pub stats: Option<Stats>,
    pub ciudad_metrics: Option<CiudadMetrics>,
    pub coords: Option<Coords>,
    #[serde(rename = "programCount")]
    pub program_count: usize,
}

/// Body of `GET /api/analysis`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResponse {
    pub universidades: Vec<UniversityAnalysis>,
}
