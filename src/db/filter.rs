use regex::{Regex, RegexBuilder};

use crate::error::Result;
use crate::models::{Program, Status};

/// A case-insensitive pattern, kept both as source (for the database) and
/// compiled (for in-process matching and up-front validation).
#[derive(Debug, Clone)]
pub struct TextPattern {
    source: String,
    regex: Regex,
}

impl TextPattern {
    pub fn new(source: &str) -> Result<Self> {
        let regex = RegexBuilder::new(source).case_insensitive(true).build()?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

/// Store query. Every populated field is AND-ed; `text` is OR-ed across the
/// searchable text fields. An empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub text: Option<TextPattern>,
    pub universidad: Option<TextPattern>,
    pub ciudad: Option<TextPattern>,
    pub programa: Option<TextPattern>,
    pub linea: Option<TextPattern>,
    pub min_calificacion: Option<u8>,
    pub min_innovacion: Option<u8>,
    pub min_aplicabilidad: Option<u8>,
    pub status: Option<Status>,
    /// Exact (universidad, ciudad) match.
    pub university: Option<(String, String)>,
}

impl ProgramFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn university(universidad: &str, ciudad: &str) -> Self {
        Self {
            university: Some((universidad.to_string(), ciudad.to_string())),
            ..Default::default()
        }
    }

    pub fn matches(&self, program: &Program) -> bool {
        let resumen = program.resumen.as_deref().unwrap_or_default();
        let linea = program.linea_investigacion();

        if let Some(text) = &self.text {
            let any = [
                program.universidad.as_str(),
                program.programa.as_str(),
                linea.as_str(),
                resumen,
                program.ciudad.as_str(),
            ]
            .iter()
            .any(|field| text.is_match(field));
            if !any {
                return false;
            }
        }

        let field_checks = [
            (&self.universidad, program.universidad.as_str()),
            (&self.ciudad, program.ciudad.as_str()),
            (&self.programa, program.programa.as_str()),
            (&self.linea, linea.as_str()),
        ];
        for (pattern, value) in field_checks {
            if let Some(pattern) = pattern {
                if !pattern.is_match(value) {
                    return false;
                }
            }
        }

        if let Some(min) = self.min_calificacion {
            if !program.calificacion.as_ref().is_some_and(|c| c.valor >= min) {
                return false;
            }
        }
        if let Some(min) = self.min_innovacion {
            if !program.stats.is_some_and(|s| s.innovacion >= min) {
                return false;
            }
        }
        if let Some(min) = self.min_aplicabilidad {
            if !program.stats.is_some_and(|s| s.aplicabilidad >= min) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if program.status != status {
                return false;
            }
        }
        if let Some((universidad, ciudad)) = &self.university {
            if &program.universidad != universidad || &program.ciudad != ciudad {
                return false;
            }
        }

        true
    }
}
