use serde::{Deserialize, Serialize};

use crate::db::{ProgramFilter, TextPattern};
use crate::error::{AppError, Result};
use crate::models::{Status, UniversityTree};

pub const ALL_TERM: &str = "todos";

/// Query string of `GET /api/busqueda`. Everything arrives as text; empty
/// values are treated as absent.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchParams {
    pub texto: Option<String>,
    pub universidad: Option<String>,
    pub ciudad: Option<String>,
    pub programa: Option<String>,
    pub linea: Option<String>,
    pub calificacion: Option<String>,
    pub innovacion: Option<String>,
    pub aplicabilidad: Option<String>,
    pub status: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn pattern(value: &Option<String>) -> Result<Option<TextPattern>> {
    present(value).map(TextPattern::new).transpose()
}

/// Leading integer of `value`, the way the dashboard's `parseInt` reads it:
/// `"4.5"` is 4 and `"7 estrellas"` is 7.
fn integer_prefix(value: &str) -> Option<i64> {
    let digits_start = usize::from(value.starts_with(['-', '+']));
    let digits_end = value[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(value.len(), |i| digits_start + i);
    if digits_end == digits_start {
        return None;
    }
    // Saturate absurdly long inputs instead of failing.
    Some(value[..digits_end].parse::<i64>().unwrap_or(if value.starts_with('-') {
        i64::MIN
    } else {
        i64::MAX
    }))
}

/// Scores are small, so any threshold outside 0..=255 is clamped: below zero
/// keeps every scored program, above the scale keeps none.
fn threshold(name: &str, value: &Option<String>) -> Result<Option<u8>> {
    present(value)
        .map(|v| {
            integer_prefix(v)
                .map(|n| n.clamp(0, i64::from(u8::MAX)) as u8)
                .ok_or_else(|| {
                    AppError::validation(format!("El parámetro '{}' debe ser numérico: {}", name, v))
                })
        })
        .transpose()
}

impl SearchParams {
    /// Term echoed back in the response.
    pub fn termino(&self) -> String {
        present(&self.texto).unwrap_or(ALL_TERM).to_string()
    }

    pub fn to_filter(&self) -> Result<ProgramFilter> {
        Ok(ProgramFilter {
            text: pattern(&self.texto)?,
            universidad: pattern(&self.universidad)?,
            ciudad: pattern(&self.ciudad)?,
            programa: pattern(&self.programa)?,
            linea: pattern(&self.linea)?,
            min_calificacion: threshold("calificacion", &self.calificacion)?,
            min_innovacion: threshold("innovacion", &self.innovacion)?,
            min_aplicabilidad: threshold("aplicabilidad", &self.aplicabilidad)?,
            status: present(&self.status).map(str::parse::<Status>).transpose()?,
            university: None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub programas_doctorado: UniversityTree,
    pub total: usize,
    pub termino_busqueda: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_params_match_everything() {
        let params = SearchParams {
            texto: Some("  ".into()),
            ..Default::default()
        };
        let filter = params.to_filter().unwrap();
        assert!(filter.text.is_none());
        assert_eq!(params.termino(), "todos");
    }

    #[test]
    fn thresholds_must_be_numeric() {
        let params = SearchParams {
            calificacion: Some("alta".into()),
            ..Default::default()
        };
        assert!(matches!(params.to_filter(), Err(AppError::Validation(_))));
    }

    #[test]
    fn thresholds_read_the_leading_integer() {
        let params = SearchParams {
            calificacion: Some("4.5".into()),
            innovacion: Some("-1".into()),
            aplicabilidad: Some("300".into()),
            ..Default::default()
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(filter.min_calificacion, Some(4));
        assert_eq!(filter.min_innovacion, Some(0));
        assert_eq!(filter.min_aplicabilidad, Some(255));

        assert_eq!(integer_prefix("7 estrellas"), Some(7));
        assert_eq!(integer_prefix("+3"), Some(3));
        assert_eq!(integer_prefix("-"), None);
        assert_eq!(integer_prefix(".5"), None);
    }

    #[test]
    fn invalid_regex_is_rejected() {
        let params = SearchParams {
            programa: Some("[abc".into()),
            ..Default::default()
        };
        assert!(matches!(params.to_filter(), Err(AppError::Pattern(_))));
    }

    #[test]
    fn populated_params_build_filter() {
        let params = SearchParams {
            texto: Some("robótica".into()),
            universidad: Some("Sevilla".into()),
            calificacion: Some("4".into()),
            status: Some("interesado".into()),
            ..Default::default()
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(filter.text.unwrap().source(), "robótica");
        assert_eq!(filter.min_calificacion, Some(4));
        assert_eq!(filter.status, Some(Status::Interesado));
        assert_eq!(params.termino(), "robótica");
    }
}
