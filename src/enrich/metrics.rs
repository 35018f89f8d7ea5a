use regex::Regex;

use crate::ai::{prompts, ChatPrompt, TextGenerator};
use crate::error::Result;
use crate::models::{CiudadMetrics, Stats};
use crate::services::Country;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    CostoVida,
    DistanciaCapital,
    ServicioMedico,
    Transporte,
    Aire,
}

/// How a city metric is read out of a free-text reply.
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub metric: Metric,
    pub pattern: &'static str,
    pub default: u32,
    /// Whether the reply text is stored next to the value.
    pub keeps_comment: bool,
}

pub const METRICS: [MetricSpec; 5] = [
    MetricSpec {
        metric: Metric::CostoVida,
        pattern: r"\b([0-9]{1,3})\b",
        default: CiudadMetrics::DEFAULT_COSTO_VIDA,
        keeps_comment: true,
    },
    MetricSpec {
        metric: Metric::DistanciaCapital,
        pattern: r"\b([0-9]{1,4})\b",
        default: CiudadMetrics::DEFAULT_DISTANCIA_KM,
        keeps_comment: false,
    },
    MetricSpec {
        metric: Metric::ServicioMedico,
        pattern: r"\b([0-9]|10)\b",
        default: CiudadMetrics::DEFAULT_SERVICIO_MEDICO,
        keeps_comment: true,
    },
    MetricSpec {
        metric: Metric::Transporte,
        pattern: r"\b([0-9]|10)\b",
        default: CiudadMetrics::DEFAULT_TRANSPORTE,
        keeps_comment: true,
    },
    MetricSpec {
        metric: Metric::Aire,
        pattern: r"\b([0-9]|10)\b",
        default: CiudadMetrics::DEFAULT_AIRE,
        keeps_comment: true,
    },
];

#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    pub value: u32,
    pub comment: Option<String>,
}

impl MetricSpec {
    pub fn prompt(&self, ciudad: &str, country: Country) -> ChatPrompt {
        match self.metric {
            Metric::CostoVida => prompts::costo_vida(ciudad, country),
            Metric::DistanciaCapital => prompts::distancia(ciudad, country.capital()),
            Metric::ServicioMedico => prompts::servicio_medico(ciudad, country),
            Metric::Transporte => prompts::transporte(ciudad),
            Metric::Aire => prompts::aire(ciudad),
        }
    }

    /// First number in `reply` matching the pattern.
    pub fn extract(&self, reply: &str) -> Option<u32> {
        let regex = Regex::new(self.pattern).ok()?;
        regex
            .captures(reply)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }

    /// A failed call yields the default with no comment.
    pub fn resolve(&self, reply: Result<String>) -> MetricValue {
        match reply {
            Ok(text) => MetricValue {
                value: self.extract(&text).unwrap_or(self.default),
                comment: self.keeps_comment.then_some(text),
            },
            Err(e) => {
                tracing::warn!("{:?} generation failed, using default {}: {}", self.metric, self.default, e);
                MetricValue {
                    value: self.default,
                    comment: None,
                }
            }
        }
    }
}

/// Query every city metric in turn.
pub async fn city_metrics(generator: &dyn TextGenerator, ciudad: &str) -> CiudadMetrics {
    let country = Country::guess(ciudad);

    let mut values = Vec::with_capacity(METRICS.len());
    for spec in &METRICS {
        let reply = generator.generate(&spec.prompt(ciudad, country)).await;
        values.push((spec.metric, spec.resolve(reply)));
    }

    let mut metrics = CiudadMetrics {
        costo_vida: 0,
        costo_vida_comentario: None,
        distancia_a_madrid_km: 0,
        capital_referencia: Some(country.capital().to_string()),
        calidad_servicio_medico: 0,
        calidad_servicio_medico_comentario: None,
        calidad_transporte: 0,
        calidad_transporte_comentario: None,
        calidad_aire: 0,
        calidad_aire_comentario: None,
    };
    for (metric, MetricValue { value, comment }) in values {
        match metric {
            Metric::CostoVida => {
                metrics.costo_vida = value;
                metrics.costo_vida_comentario = comment;
            }
            Metric::DistanciaCapital => metrics.distancia_a_madrid_km = value,
            Metric::ServicioMedico => {
                metrics.calidad_servicio_medico = value;
                metrics.calidad_servicio_medico_comentario = comment;
            }
            Metric::Transporte => {
                metrics.calidad_transporte = value;
                metrics.calidad_transporte_comentario = comment;
            }
            Metric::Aire => {
                metrics.calidad_aire = value;
                metrics.calidad_aire_comentario = comment;
            }
        }
    }
    metrics
}

#[derive(serde::Deserialize)]
struct RawStats {
    innovacion: f64,
    interdisciplinariedad: f64,
    impacto: f64,
    internacional: f64,
    aplicabilidad: f64,
}

/// Parse the strict-JSON stats reply; anything else yields all fives.
pub fn parse_stats(reply: &str) -> Stats {
    let trimmed = reply.trim();
    // Tolerate a fenced code block around the object.
    let body = match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    };
    match serde_json::from_str::<RawStats>(body) {
        Ok(raw) => Stats {
            innovacion: Stats::score(raw.innovacion),
            interdisciplinariedad: Stats::score(raw.interdisciplinariedad),
            impacto: Stats::score(raw.impacto),
            internacional: Stats::score(raw.internacional),
            aplicabilidad: Stats::score(raw.aplicabilidad),
        },
        Err(e) => {
            tracing::warn!("Error parsing stats JSON: {}", e);
            Stats::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn spec(metric: Metric) -> MetricSpec {
        METRICS.into_iter().find(|s| s.metric == metric).unwrap()
    }

    #[test]
    fn extracts_first_number() {
        let aire = spec(Metric::Aire);
        assert_eq!(aire.extract("Un 6. La ciudad tiene buena calidad"), Some(6));
        assert_eq!(aire.extract("10 sin duda"), Some(10));
        assert_eq!(aire.extract("sin datos"), None);
        assert_eq!(spec(Metric::DistanciaCapital).extract("Unos 395 km"), Some(395));
    }

    #[test]
    fn unmatched_reply_keeps_comment() {
        let value = spec(Metric::Transporte).resolve(Ok("Bastante buena".into()));
        assert_eq!(value.value, 7);
        assert_eq!(value.comment.as_deref(), Some("Bastante buena"));
    }

    #[test]
    fn failed_call_uses_default_without_comment() {
        let value = spec(Metric::ServicioMedico).resolve(Err(AppError::OpenAiApi("down".into())));
        assert_eq!(
            value,
            MetricValue {
                value: 8,
                comment: None
            }
        );
    }

    #[test]
    fn distance_never_stores_comment() {
        let value = spec(Metric::DistanciaCapital).resolve(Ok("412".into()));
        assert_eq!(value.value, 412);
        assert!(value.comment.is_none());
    }

    #[test]
    fn stats_are_parsed_and_clamped() {
        let stats = parse_stats(
            r#"{"innovacion": 8, "interdisciplinariedad": 7.6, "impacto": 12, "internacional": 0, "aplicabilidad": 6}"#,
        );
        assert_eq!(stats.innovacion, 8);
        assert_eq!(stats.interdisciplinariedad, 8);
        assert_eq!(stats.impacto, 10);
        assert_eq!(stats.internacional, 1);
        assert_eq!(parse_stats("no es json"), Stats::default());
    }
}
