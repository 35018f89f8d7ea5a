use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{AppError, Result};

/// Separator between research lines in the stored free-text form.
pub const LINE_SEPARATOR: &str = "\n\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pendiente,
    Considerando,
    Interesado,
    Aplicando,
    Descartado,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Status::Pendiente,
        Status::Considerando,
        Status::Interesado,
        Status::Aplicando,
        Status::Descartado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pendiente => "pendiente",
            Status::Considerando => "considerando",
            Status::Interesado => "interesado",
            Status::Aplicando => "aplicando",
            Status::Descartado => "descartado",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        Status::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim())
            .ok_or_else(|| AppError::validation(format!("Invalid status: {}", s)))
    }
}

/// Absent and null statuses both read as `pendiente`.
pub(crate) fn status_or_default<'de, D>(deserializer: D) -> std::result::Result<Status, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Status>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Calificacion {
    pub valor: u8,
    #[serde(default = "Utc::now", deserialize_with = "fecha_or_now")]
    pub fecha: DateTime<Utc>,
}

fn fecha_or_now<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<DateTime<Utc>>::deserialize(deserializer)?.unwrap_or_else(Utc::now))
}

impl Calificacion {
    pub fn new(valor: u8) -> Result<Self> {
        let calificacion = Self {
            valor,
            fecha: Utc::now(),
        };
        calificacion.validate()?;
        Ok(calificacion)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=5).contains(&self.valor) {
            return Err(AppError::validation(format!(
                "La calificación debe estar entre 1 y 5 (recibido {})",
                self.valor
            )));
        }
        Ok(())
    }
}

/// Per-program sub-scores keyed by criterion key.
pub type Criterios = BTreeMap<String, f64>;

pub fn validate_criterios(criterios: &Criterios) -> Result<()> {
    for (key, value) in criterios {
        if !(0.0..=5.0).contains(value) {
            return Err(AppError::validation(format!(
                "El criterio '{}' debe estar entre 0 y 5 (recibido {})",
                key, value
            )));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coords {
    pub lat: f64,
    pub lon: f64,
}

/// University-level scores on a 1..=10 scale.
///
/// Stored values are not always integers: hand-edited tables write fractions
/// and sometimes nulls. Fractions are rounded onto the scale and missing
/// values read as the neutral score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StatsRecord")]
pub struct Stats {
    pub innovacion: u8,
    pub interdisciplinariedad: u8,
    pub impacto: u8,
    pub internacional: u8,
    pub aplicabilidad: u8,
}

impl Stats {
    pub const NEUTRAL: u8 = 5;

    /// Round onto the 1..=10 scale; non-finite values read as neutral.
    pub fn score(value: f64) -> u8 {
        if value.is_finite() {
            value.round().clamp(1.0, 10.0) as u8
        } else {
            Self::NEUTRAL
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            innovacion: Self::NEUTRAL,
            interdisciplinariedad: Self::NEUTRAL,
            impacto: Self::NEUTRAL,
            internacional: Self::NEUTRAL,
            aplicabilidad: Self::NEUTRAL,
        }
    }
}

#[derive(Deserialize)]
struct StatsRecord {
    #[serde(default)]
    innovacion: Option<f64>,
    #[serde(default)]
    interdisciplinariedad: Option<f64>,
    #[serde(default)]
    impacto: Option<f64>,
    #[serde(default)]
    internacional: Option<f64>,
    #[serde(default)]
    aplicabilidad: Option<f64>,
}

impl From<StatsRecord> for Stats {
    fn from(record: StatsRecord) -> Self {
        let score = |value: Option<f64>| value.map_or(Stats::NEUTRAL, Stats::score);
        Stats {
            innovacion: score(record.innovacion),
            interdisciplinariedad: score(record.interdisciplinariedad),
            impacto: score(record.impacto),
            internacional: score(record.internacional),
            aplicabilidad: score(record.aplicabilidad),
        }
    }
}

/// City-level indicators. Missing or null values read as the same defaults
/// enrichment falls back to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "CiudadMetricsRecord")]
pub struct CiudadMetrics {
    pub costo_vida: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub costo_vida_comentario: Option<String>,
    pub distancia_a_madrid_km: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capital_referencia: Option<String>,
    pub calidad_servicio_medico: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calidad_servicio_medico_comentario: Option<String>,
    pub calidad_transporte: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calidad_transporte_comentario: Option<String>,
    pub calidad_aire: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calidad_aire_comentario: Option<String>,
}

impl CiudadMetrics {
    pub const DEFAULT_COSTO_VIDA: u32 = 70;
    pub const DEFAULT_DISTANCIA_KM: u32 = 300;
    pub const DEFAULT_SERVICIO_MEDICO: u32 = 8;
    pub const DEFAULT_TRANSPORTE: u32 = 7;
    pub const DEFAULT_AIRE: u32 = 7;
}

#[derive(Deserialize)]
struct CiudadMetricsRecord {
    #[serde(default)]
    costo_vida: Option<f64>,
    #[serde(default)]
    costo_vida_comentario: Option<String>,
    #[serde(default)]
    distancia_a_madrid_km: Option<f64>,
    #[serde(default)]
    capital_referencia: Option<String>,
    #[serde(default)]
    calidad_servicio_medico: Option<f64>,
    #[serde(default)]
    calidad_servicio_medico_comentario: Option<String>,
    #[serde(default)]
    calidad_transporte: Option<f64>,
    #[serde(default)]
    calidad_transporte_comentario: Option<String>,
    #[serde(default)]
    calidad_aire: Option<f64>,
    #[serde(default)]
    calidad_aire_comentario: Option<String>,
}

fn metric_or(value: Option<f64>, default: u32) -> u32 {
    match value {
        Some(v) if v.is_finite() => v.round().clamp(0.0, f64::from(u32::MAX)) as u32,
        _ => default,
    }
}

impl From<CiudadMetricsRecord> for CiudadMetrics {
    fn from(record: CiudadMetricsRecord) -> Self {
        CiudadMetrics {
            costo_vida: metric_or(record.costo_vida, Self::DEFAULT_COSTO_VIDA),
            costo_vida_comentario: record.costo_vida_comentario,
            distancia_a_madrid_km: metric_or(record.distancia_a_madrid_km, Self::DEFAULT_DISTANCIA_KM),
            capital_referencia: record.capital_referencia,
            calidad_servicio_medico: metric_or(
                record.calidad_servicio_medico,
                Self::DEFAULT_SERVICIO_MEDICO,
            ),
            calidad_servicio_medico_comentario: record.calidad_servicio_medico_comentario,
            calidad_transporte: metric_or(record.calidad_transporte, Self::DEFAULT_TRANSPORTE),
            calidad_transporte_comentario: record.calidad_transporte_comentario,
            calidad_aire: metric_or(record.calidad_aire, Self::DEFAULT_AIRE),
            calidad_aire_comentario: record.calidad_aire_comentario,
        }
    }
}

/// A doctoral program in its canonical, normalized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub universidad: String,
    #[serde(default)]
    pub ciudad: String,
    #[serde(default, alias = "nombre")]
    pub programa: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub lineas_investigacion: Vec<String>,
    #[serde(default)]
    pub resumen: Option<String>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: Status,
    #[serde(default)]
    pub calificacion: Option<Calificacion>,
    #[serde(default)]
    pub criterios: Option<Criterios>,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub stats: Option<Stats>,
    #[serde(default)]
    pub ciudad_metrics: Option<CiudadMetrics>,
}

impl Program {
    pub fn has_resumen(&self) -> bool {
        self.resumen
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// Research lines in their stored free-text form.
    pub fn linea_investigacion(&self) -> String {
        join_lines(&self.lineas_investigacion)
    }

    /// Grouping key, or `None` when university or city is missing.
    pub fn university_key(&self) -> Option<(&str, &str)> {
        let universidad = self.universidad.trim();
        let ciudad = self.ciudad.trim();
        if universidad.is_empty() || ciudad.is_empty() {
            None
        } else {
            Some((self.universidad.as_str(), self.ciudad.as_str()))
        }
    }

    pub fn apply(&mut self, patch: &ProgramPatch) {
        if let Some(programa) = &patch.programa {
            self.programa = programa.clone();
        }
        if let Some(url) = &patch.url {
            self.url = url.clone();
        }
        if let Some(lineas) = &patch.lineas_investigacion {
            self.lineas_investigacion = lineas.clone();
        }
        if let Some(resumen) = &patch.resumen {
            self.resumen = Some(resumen.clone());
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(calificacion) = &patch.calificacion {
            self.calificacion = Some(calificacion.clone());
        }
        if let Some(criterios) = &patch.criterios {
            self.criterios = Some(criterios.clone());
        }
        if let Some(favorite) = patch.favorite {
            self.favorite = favorite;
        }
        if let Some(coords) = patch.coords {
            self.coords = Some(coords);
        }
        if let Some(stats) = patch.stats {
            self.stats = Some(stats);
        }
        if let Some(metrics) = &patch.ciudad_metrics {
            self.ciudad_metrics = Some(metrics.clone());
        }
    }
}

/// Split the free-text research lines at the paragraph separator.
pub fn split_lines(text: &str) -> Vec<String> {
    text.split(LINE_SEPARATOR)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn join_lines(lines: &[String]) -> String {
    lines.join(LINE_SEPARATOR)
}

/// Research lines arrive either as one separated string or as an array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinesInput {
    Text(String),
    List(Vec<String>),
}

impl LinesInput {
    pub fn into_lines(self) -> Vec<String> {
        match self {
            LinesInput::Text(text) => split_lines(&text),
            LinesInput::List(lines) => lines
                .into_iter()
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }
}

/// Body of `POST /api/programas`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProgram {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub universidad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciudad: Option<String>,
    #[serde(default, alias = "nombre", skip_serializing_if = "Option::is_none")]
    pub programa: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linea_investigacion: Option<LinesInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineas_investigacion: Option<LinesInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calificacion: Option<Calificacion>,
}

impl NewProgram {
    pub fn new(universidad: &str, ciudad: &str, programa: &str) -> Self {
        Self {
            universidad: Some(universidad.to_string()),
            ciudad: Some(ciudad.to_string()),
            programa: Some(programa.to_string()),
            ..Default::default()
        }
    }

    pub fn with_lines(mut self, text: &str) -> Self {
        self.linea_investigacion = Some(LinesInput::Text(text.to_string()));
        self
    }

    /// Validate required fields and build the program to insert; the id is
    /// left empty for the store to assign.
    pub fn into_program(self) -> Result<Program> {
        let required = |value: Option<String>| value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let (Some(universidad), Some(ciudad), Some(programa)) = (
            required(self.universidad),
            required(self.ciudad),
            required(self.programa),
        ) else {
            return Err(AppError::validation(
                "Universidad, ciudad y programa son requeridos",
            ));
        };

        if let Some(calificacion) = &self.calificacion {
            calificacion.validate()?;
        }

        let lineas_investigacion = self
            .linea_investigacion
            .or(self.lineas_investigacion)
            .map(LinesInput::into_lines)
            .unwrap_or_default();

        Ok(Program {
            id: String::new(),
            universidad,
            ciudad,
            programa,
            url: self.url.unwrap_or_default(),
            lineas_investigacion,
            resumen: None,
            status: self.status.unwrap_or_default(),
            calificacion: self.calificacion,
            criterios: None,
            favorite: false,
            coords: None,
            stats: None,
            ciudad_metrics: None,
        })
    }
}

/// Fields that a partial update may never touch.
pub const RESTRICTED_FIELDS: [&str; 3] = ["_id", "universidad", "ciudad"];

/// Canonical field name and the older spelling clients may still send.
pub const FIELD_ALIASES: [(&str, &str); 2] = [
    ("programa", "nombre"),
    ("linea_investigacion", "lineas_investigacion"),
];

/// When a body carries both spellings of a field, keep the canonical one.
pub fn drop_shadowed_aliases(body: &mut serde_json::Map<String, serde_json::Value>) {
    for (canonical, alias) in FIELD_ALIASES {
        if body.contains_key(canonical) && body.remove(alias).is_some() {
            tracing::debug!("Ignoring '{}' in favour of '{}'", alias, canonical);
        }
    }
}

/// A partial update. `None` means "leave unchanged".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgramPatch {
    #[serde(default, alias = "nombre")]
    pub programa: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, rename = "linea_investigacion", alias = "lineas_investigacion", deserialize_with = "lines_patch")]
    pub lineas_investigacion: Option<Vec<String>>,
    #[serde(default)]
    pub resumen: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub calificacion: Option<Calificacion>,
    #[serde(default)]
    pub criterios: Option<Criterios>,
    #[serde(default)]
    pub favorite: Option<bool>,
    #[serde(default)]
    pub coords: Option<Coords>,
    #[serde(default)]
    pub stats: Option<Stats>,
    #[serde(default)]
    pub ciudad_metrics: Option<CiudadMetrics>,
}

fn lines_patch<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LinesInput>::deserialize(deserializer)?.map(LinesInput::into_lines))
}

impl ProgramPatch {
    /// Build a patch from an arbitrary JSON object, silently dropping the
    /// restricted fields.
    pub fn from_json(mut body: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        for field in RESTRICTED_FIELDS {
            if body.remove(field).is_some() {
                tracing::debug!("Ignoring restricted field '{}' in update payload", field);
            }
        }
        drop_shadowed_aliases(&mut body);

        let patch: ProgramPatch = serde_json::from_value(serde_json::Value::Object(body))
            .map_err(|e| AppError::validation(format!("Datos de actualización inválidos: {}", e)))?;

        if patch.is_empty() {
            return Err(AppError::validation("No hay campos válidos para actualizar"));
        }
        patch.validate()?;
        Ok(patch)
    }

    pub fn is_empty(&self) -> bool {
        *self == ProgramPatch::default()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(calificacion) = &self.calificacion {
            calificacion.validate()?;
        }
        if let Some(criterios) = &self.criterios {
            validate_criterios(criterios)?;
        }
        Ok(())
    }

    pub fn status(status: Status) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn calificacion(calificacion: Calificacion) -> Self {
        Self {
            calificacion: Some(calificacion),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parses_only_the_five_states() {
        for status in Status::ALL {
            assert_eq!(status.as_str().parse::<Status>().unwrap(), status);
        }
        assert!("archivado".parse::<Status>().is_err());
    }

    #[test]
    fn missing_and_null_status_read_as_pendiente() {
        let missing: Program = serde_json::from_value(json!({"_id": "a"})).unwrap();
        let null: Program = serde_json::from_value(json!({"_id": "b", "status": null})).unwrap();
        assert_eq!(missing.status, Status::Pendiente);
        assert_eq!(null.status, Status::Pendiente);
    }

    #[test]
    fn fractional_and_null_scores_are_normalized() {
        let stats: Stats = serde_json::from_value(json!({
            "innovacion": 7.5,
            "interdisciplinariedad": 6,
            "impacto": null,
            "internacional": 0.2,
            "aplicabilidad": 14
        }))
        .unwrap();
        assert_eq!(
            stats,
            Stats {
                innovacion: 8,
                interdisciplinariedad: 6,
                impacto: 5,
                internacional: 1,
                aplicabilidad: 10,
            }
        );

        let metrics: CiudadMetrics = serde_json::from_value(json!({
            "costo_vida": null,
            "costo_vida_comentario": "Sin datos",
            "distancia_a_madrid_km": 394.6,
            "calidad_aire": 6
        }))
        .unwrap();
        assert_eq!(metrics.costo_vida, CiudadMetrics::DEFAULT_COSTO_VIDA);
        assert_eq!(metrics.costo_vida_comentario.as_deref(), Some("Sin datos"));
        assert_eq!(metrics.distancia_a_madrid_km, 395);
        assert_eq!(metrics.calidad_servicio_medico, CiudadMetrics::DEFAULT_SERVICIO_MEDICO);
        assert_eq!(metrics.calidad_transporte, CiudadMetrics::DEFAULT_TRANSPORTE);
        assert_eq!(metrics.calidad_aire, 6);
    }

    #[test]
    fn null_rating_date_reads_as_now() {
        let calificacion: Calificacion =
            serde_json::from_value(json!({"valor": 4, "fecha": null})).unwrap();
        assert_eq!(calificacion.valor, 4);
    }

    #[test]
    fn lines_are_split_at_blank_lines() {
        let lines = split_lines("Robótica\n\nVisión artificial\n\n\n\n  IA  ");
        assert_eq!(lines, vec!["Robótica", "Visión artificial", "IA"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn new_program_requires_three_fields() {
        let err = NewProgram {
            universidad: Some("Universidad de Sevilla".into()),
            ciudad: Some("  ".into()),
            programa: Some("Biología".into()),
            ..Default::default()
        }
        .into_program()
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn new_program_defaults() {
        let program = NewProgram::new("Universidad de Sevilla", "Sevilla", "Biología")
            .into_program()
            .unwrap();
        assert_eq!(program.status, Status::Pendiente);
        assert!(program.calificacion.is_none());
        assert!(program.lineas_investigacion.is_empty());
    }

    #[test]
    fn patch_strips_restricted_fields() {
        let body = json!({"_id": "x", "universidad": "Otra", "ciudad": "Otra", "status": "aplicando"});
        let patch = ProgramPatch::from_json(body.as_object().cloned().unwrap()).unwrap();
        assert_eq!(patch, ProgramPatch::status(Status::Aplicando));
    }

    #[test]
    fn patch_only_restricted_fields_is_rejected() {
        let body = json!({"universidad": "Otra"});
        let err = ProgramPatch::from_json(body.as_object().cloned().unwrap()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn patch_accepts_both_line_forms() {
        let text = json!({"linea_investigacion": "A\n\nB"});
        let list = json!({"lineas_investigacion": ["A", "B"]});
        let a = ProgramPatch::from_json(text.as_object().cloned().unwrap()).unwrap();
        let b = ProgramPatch::from_json(list.as_object().cloned().unwrap()).unwrap();
        assert_eq!(a.lineas_investigacion, Some(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(a, b);
    }

    #[test]
    fn patch_prefers_canonical_spelling_over_alias() {
        let body = json!({
            "programa": "Historia",
            "nombre": "Historia antigua",
            "linea_investigacion": "A\n\nB",
            "lineas_investigacion": ["C"],
        });
        let patch = ProgramPatch::from_json(body.as_object().cloned().unwrap()).unwrap();
        assert_eq!(patch.programa.as_deref(), Some("Historia"));
        assert_eq!(patch.lineas_investigacion, Some(vec!["A".to_string(), "B".to_string()]));
    }

    #[test]
    fn patch_rejects_out_of_range_scores() {
        let body = json!({"calificacion": {"valor": 6, "fecha": "2024-05-01T10:00:00.000Z"}});
        assert!(ProgramPatch::from_json(body.as_object().cloned().unwrap()).is_err());

        let body = json!({"criterios": {"relevancia": 7}});
        assert!(ProgramPatch::from_json(body.as_object().cloned().unwrap()).is_err());
    }
}
