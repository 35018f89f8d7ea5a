//! Storage-side shape of a program document.
//!
//! Documents written by older tooling carry research lines either as a
//! `linea_investigacion` string or a `lineas_investigacion` array, and name the
//! program `programa` or `nombre`. Everything is normalized here, once, so the
//! rest of the crate only sees [`Program`].

use bson::{oid::ObjectId, Bson, Document};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;
use crate::models::{
    status_or_default, Calificacion, CiudadMetrics, Coords, Criterios, LinesInput, Program, Stats,
    Status,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgramDocument {
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "hex_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(default)]
    pub universidad: Option<String>,
    #[serde(default)]
    pub ciudad: Option<String>,
    #[serde(default)]
    pub programa: Option<String>,
    #[serde(default, skip_serializing)]
    pub nombre: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linea_investigacion: Option<LinesText>,
    #[serde(default, skip_serializing)]
    pub lineas_investigacion: Option<LinesInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumen: Option<String>,
    #[serde(default, deserialize_with = "status_or_default")]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calificacion: Option<Calificacion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
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

/// Ids in JSON dumps are either plain hex strings or extended JSON.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Hex(String),
    Extended {
        #[serde(rename = "$oid")]
        oid: String,
    },
}

fn hex_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<RawId>::deserialize(deserializer)?.map(|id| match id {
        RawId::Hex(hex) => hex,
        RawId::Extended { oid } => oid,
    }))
}

/// `linea_investigacion` is written as a string but some imports stored an array there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinesText {
    Text(String),
    List(Vec<String>),
}

impl From<LinesText> for LinesInput {
    fn from(value: LinesText) -> Self {
        match value {
            LinesText::Text(text) => LinesInput::Text(text),
            LinesText::List(lines) => LinesInput::List(lines),
        }
    }
}

impl From<ProgramDocument> for Program {
    fn from(doc: ProgramDocument) -> Self {
        let lineas_investigacion = doc
            .linea_investigacion
            .map(LinesInput::from)
            .or(doc.lineas_investigacion)
            .map(LinesInput::into_lines)
            .unwrap_or_default();

        Program {
            id: doc.id.unwrap_or_default(),
            universidad: doc.universidad.unwrap_or_default(),
            ciudad: doc.ciudad.unwrap_or_default(),
            programa: doc.programa.or(doc.nombre).unwrap_or_default(),
            url: doc.url.unwrap_or_default(),
            lineas_investigacion,
            resumen: doc.resumen,
            status: doc.status,
            calificacion: doc.calificacion,
            criterios: doc.criterios,
            favorite: doc.favorite,
            coords: doc.coords,
            stats: doc.stats,
            ciudad_metrics: doc.ciudad_metrics,
        }
    }
}

impl From<&Program> for ProgramDocument {
    fn from(program: &Program) -> Self {
        ProgramDocument {
            id: Some(program.id.clone()).filter(|id| !id.is_empty()),
            universidad: Some(program.universidad.clone()),
            ciudad: Some(program.ciudad.clone()),
            programa: Some(program.programa.clone()),
            nombre: None,
            url: Some(program.url.clone()),
            linea_investigacion: Some(LinesText::Text(program.linea_investigacion())),
            lineas_investigacion: None,
            resumen: program.resumen.clone(),
            status: program.status,
            calificacion: program.calificacion.clone(),
            criterios: program.criterios.clone(),
            favorite: program.favorite,
            coords: program.coords,
            stats: program.stats,
            ciudad_metrics: program.ciudad_metrics.clone(),
        }
    }
}

/// Hex ids become ObjectIds; anything else is kept as a plain string id.
pub(crate) fn id_bson(id: &str) -> Bson {
    ObjectId::parse_str(id)
        .map(Bson::ObjectId)
        .unwrap_or_else(|_| Bson::String(id.to_string()))
}

/// JSON dumps carry ObjectIds as hex strings; store them as ObjectIds again.
pub(crate) fn restore_object_id(document: &mut Document) {
    if let Some(Bson::String(id)) = document.get("_id") {
        let id = id_bson(id);
        document.insert("_id", id);
    }
}

pub(crate) fn program_from_document(mut document: Document) -> Result<Program> {
    let id = match document.remove("_id") {
        Some(Bson::ObjectId(oid)) => Some(oid.to_hex()),
        Some(Bson::String(id)) => Some(id),
        Some(other) => Some(other.to_string()),
        None => None,
    };
    let mut parsed: ProgramDocument = bson::from_document(document)?;
    parsed.id = id;
    Ok(parsed.into())
}

pub(crate) fn document_from_program(program: &Program) -> Result<Document> {
    let mut document = bson::to_document(&ProgramDocument::from(program))?;
    document.remove("_id");
    if !program.id.is_empty() {
        document.insert("_id", id_bson(&program.id));
    }
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use serde_json::json;

    #[test]
    fn legacy_array_form_is_normalized() {
        let doc: ProgramDocument = serde_json::from_value(json!({
            "_id": "65f0c0ffee0000000000abcd",
            "universidad": "Universidade de Coimbra",
            "ciudad": "Coimbra",
            "nombre": "Doutoramento em Física",
            "lineas_investigacion": ["Física nuclear", " ", "Astrofísica"],
        }))
        .unwrap();

        let program = Program::from(doc);
        assert_eq!(program.programa, "Doutoramento em Física");
        assert_eq!(program.lineas_investigacion, vec!["Física nuclear", "Astrofísica"]);
        assert_eq!(program.status, Status::Pendiente);
    }

    #[test]
    fn stored_form_keeps_the_text_column() {
        let doc: ProgramDocument = serde_json::from_value(json!({
            "_id": "65f0c0ffee0000000000abcd",
            "universidad": "Universidad de Granada",
            "ciudad": "Granada",
            "programa": "Historia",
            "linea_investigacion": "Medieval\n\nModerna",
            "status": "interesado",
        }))
        .unwrap();
        let program = Program::from(doc);

        let stored = serde_json::to_value(ProgramDocument::from(&program)).unwrap();
        assert_eq!(stored["linea_investigacion"], "Medieval\n\nModerna");
        assert_eq!(stored["status"], "interesado");
        assert!(stored.get("lineas_investigacion").is_none());
        assert!(stored.get("calificacion").is_none());
    }

    #[test]
    fn extended_json_ids_are_read_as_hex() {
        let doc: ProgramDocument = serde_json::from_value(json!({
            "_id": {"$oid": "65f0c0ffee0000000000abcd"},
            "universidad": "Universidad de León",
            "ciudad": "León",
            "programa": "Veterinaria",
        }))
        .unwrap();
        assert_eq!(doc.id.as_deref(), Some("65f0c0ffee0000000000abcd"));
    }

    #[test]
    fn fractional_stats_and_partial_metrics_are_readable() {
        let document = doc! {
            "_id": ObjectId::new(),
            "universidad": "Universidad de Valladolid",
            "ciudad": "Valladolid",
            "programa": "Enología",
            "stats": {
                "innovacion": 7.5,
                "interdisciplinariedad": 6,
                "impacto": 8.2,
                "internacional": 4,
                "aplicabilidad": 9
            },
            "ciudad_metrics": {
                "costo_vida": Bson::Null,
                "distancia_a_madrid_km": 193,
                "calidad_aire": 7.0
            }
        };

        let program = program_from_document(document).unwrap();
        let stats = program.stats.unwrap();
        assert_eq!(stats.innovacion, 8);
        assert_eq!(stats.impacto, 8);
        let metrics = program.ciudad_metrics.clone().unwrap();
        assert_eq!(metrics.costo_vida, CiudadMetrics::DEFAULT_COSTO_VIDA);
        assert_eq!(metrics.distancia_a_madrid_km, 193);
        assert_eq!(metrics.calidad_aire, 7);

        let stored = document_from_program(&program).unwrap();
        let again = program_from_document(stored).unwrap();
        assert_eq!(again, program);
    }

    #[test]
    fn hex_string_ids_are_restored_as_object_ids() {
        let hex = "65f0c0ffee0000000000abcd";
        let mut document = doc! { "_id": hex, "universidad": "Universidad de Cádiz" };
        restore_object_id(&mut document);
        assert_eq!(document.get_object_id("_id").unwrap().to_hex(), hex);

        let mut legacy = doc! { "_id": "programa-17" };
        restore_object_id(&mut legacy);
        assert_eq!(legacy.get_str("_id").unwrap(), "programa-17");
    }
}
