use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::app::{CollectionStats, CriteriosResponse};
use crate::enrich::EnrichmentReport;
use crate::error::{AppError, Result};
use crate::models::{
    drop_shadowed_aliases, AnalysisResponse, Calificacion, CriteriaConfig, CriteriaView,
    NewProgram, NewUniversity, Program, UniversitiesResponse, UniversityPlaceholder,
};
use crate::search::{SearchParams, SearchResult};

use super::AppState;

/// Bodies are taken as raw JSON so shape errors surface as `{message}` 400s.
fn parse_body<T: DeserializeOwned>(body: Value) -> Result<T> {
    serde_json::from_value(body)
        .map_err(|e| AppError::validation(format!("Cuerpo de la petición inválido: {}", e)))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

pub async fn list_programs(State(state): State<AppState>) -> Result<Json<Vec<Program>>> {
    Ok(Json(state.app.list_programs().await?))
}

pub async fn get_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Program>> {
    Ok(Json(state.app.get_program(&id).await?))
}

pub async fn create_program(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Program>)> {
    let Value::Object(mut fields) = body else {
        return Err(AppError::validation("Se esperaba un objeto JSON"));
    };
    drop_shadowed_aliases(&mut fields);
    let input: NewProgram = parse_body(Value::Object(fields))?;
    let program = state.app.create_program(input).await?;
    Ok((StatusCode::CREATED, Json(program)))
}

pub async fn update_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Program>> {
    let Value::Object(fields) = body else {
        return Err(AppError::validation("Se esperaba un objeto JSON"));
    };
    Ok(Json(state.app.update_program(&id, fields).await?))
}

pub async fn delete_program(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state.app.delete_program(&id).await?;
    Ok(Json(MessageResponse {
        message: "Programa deleted successfully".to_string(),
    }))
}

pub async fn get_criterios(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CriteriosResponse>> {
    Ok(Json(state.app.criterios(&id).await?))
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    #[serde(default)]
    status: Option<String>,
}

pub async fn update_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let body: StatusBody = parse_body(body)?;
    let status = state.app.set_status(&id, body.status.as_deref()).await?;
    Ok(Json(json!({
        "message": "Status updated successfully",
        "status": status,
    })))
}

#[derive(Debug, Deserialize)]
struct CalificacionInput {
    #[serde(default)]
    valor: Option<i64>,
    #[serde(default)]
    fecha: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CalificacionBody {
    #[serde(default)]
    calificacion: Option<CalificacionInput>,
}

impl CalificacionInput {
    fn into_calificacion(self) -> Result<Option<Calificacion>> {
        let Some(valor) = self.valor else {
            return Ok(None);
        };
        let valor = u8::try_from(valor).map_err(|_| {
            AppError::validation(format!("La calificación debe estar entre 1 y 5 (recibido {})", valor))
        })?;
        Ok(Some(Calificacion {
            valor,
            fecha: self.fecha.unwrap_or_else(Utc::now),
        }))
    }
}

pub async fn update_calificacion(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let body: CalificacionBody = parse_body(body)?;
    let calificacion = match body.calificacion {
        Some(input) => input.into_calificacion()?,
        None => None,
    };
    let calificacion = state.app.set_calificacion(&id, calificacion).await?;
    Ok(Json(json!({
        "message": "Calificación actualizada correctamente",
        "calificacion": calificacion,
    })))
}

pub async fn list_universities(State(state): State<AppState>) -> Result<Json<UniversitiesResponse>> {
    Ok(Json(state.app.universities().await?))
}

pub async fn add_university(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<UniversityPlaceholder>)> {
    let input: NewUniversity = parse_body(body)?;
    let placeholder = state.app.add_university(input)?;
    Ok((StatusCode::CREATED, Json(placeholder)))
}

pub async fn analysis(State(state): State<AppState>) -> Result<Json<AnalysisResponse>> {
    Ok(Json(state.app.analysis().await?))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResult>> {
    Ok(Json(state.app.search(&params).await?))
}

pub async fn enrich(State(state): State<AppState>) -> Result<Json<EnrichmentReport>> {
    Ok(Json(state.app.enrich().await?))
}

pub async fn collection_stats(State(state): State<AppState>) -> Result<Json<CollectionStats>> {
    Ok(Json(state.app.collection_stats().await?))
}

pub async fn get_criteria(State(state): State<AppState>) -> Result<Json<CriteriaView>> {
    Ok(Json(state.app.criteria_config().await?.view()))
}

pub async fn save_criteria(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<CriteriaView>> {
    let config: CriteriaConfig = parse_body(body)?;
    Ok(Json(state.app.save_criteria_config(config).await?.view()))
}
