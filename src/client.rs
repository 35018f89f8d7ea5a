use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::enrich::EnrichmentReport;
use crate::error::{AppError, Result};
use crate::models::{
    NewProgram, Program, Status, TableFilter, UniversitiesResponse, UniversityView,
};
use crate::search::{SearchParams, SearchResult};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Dashboard-side cache of the program list and university tree. Every
/// write goes through the API and is followed by a full refetch.
pub struct DashboardClient {
    client: Client,
    base_url: Url,
    programs: Vec<Program>,
    universities: Vec<UniversityView>,
}

impl DashboardClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: Url::parse(base_url)?,
            programs: Vec::new(),
            universities: Vec::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn read<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.message,
            Err(_) => status.to_string(),
        };
        Err(match status {
            StatusCode::BAD_REQUEST => AppError::Validation(message),
            StatusCode::NOT_FOUND => AppError::NotFound(message),
            _ => AppError::Other(anyhow::anyhow!("Server returned {}: {}", status, message)),
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.client.get(self.endpoint(path)?).send().await?;
        Self::read(response).await
    }

    /// Reload both cached views from the server.
    pub async fn refresh(&mut self) -> Result<()> {
        let programs: Vec<Program> = self.get("/api/programas").await?;
        let tree: UniversitiesResponse = self.get("/api/universidades").await?;

        let mut universities = tree.programas_doctorado.universidades;
        universities.sort_by(|a, b| a.nombre.cmp(&b.nombre));

        tracing::debug!(
            "Refreshed {} programs in {} universities",
            programs.len(),
            universities.len()
        );
        self.programs = programs;
        self.universities = universities;
        Ok(())
    }

    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// Universities sorted by name.
    pub fn universities(&self) -> &[UniversityView] {
        &self.universities
    }

    pub fn filter(&self, filter: &TableFilter) -> Vec<&Program> {
        self.programs.iter().filter(|p| filter.matches(p)).collect()
    }

    pub async fn create_program(&mut self, input: &NewProgram) -> Result<Program> {
        let response = self
            .client
            .post(self.endpoint("/api/programas")?)
            .json(input)
            .send()
            .await?;
        let program = Self::read(response).await?;
        self.refresh().await?;
        Ok(program)
    }

    pub async fn update_program(&mut self, id: &str, fields: &Value) -> Result<Program> {
        let response = self
            .client
            .put(self.endpoint(&format!("/api/programas/{}", id))?)
            .json(fields)
            .send()
            .await?;
        let program = Self::read(response).await?;
        self.refresh().await?;
        Ok(program)
    }

    pub async fn set_status(&mut self, id: &str, status: Status) -> Result<()> {
        let response = self
            .client
            .patch(self.endpoint(&format!("/api/programas/{}/status", id))?)
            .json(&json!({ "status": status }))
            .send()
            .await?;
        Self::read::<Value>(response).await?;
        self.refresh().await
    }

    pub async fn rate(&mut self, id: &str, valor: u8) -> Result<()> {
        let body = json!({
            "calificacion": {
                "valor": valor,
                "fecha": chrono::Utc::now(),
            }
        });
        let response = self
            .client
            .put(self.endpoint(&format!("/api/programas/{}/calificacion", id))?)
            .json(&body)
            .send()
            .await?;
        Self::read::<Value>(response).await?;
        self.refresh().await
    }

    pub async fn delete_program(&mut self, id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.endpoint(&format!("/api/programas/{}", id))?)
            .send()
            .await?;
        Self::read::<Value>(response).await?;
        self.refresh().await
    }

    /// Search does not touch the cache.
    pub async fn search(&self, params: &SearchParams) -> Result<SearchResult> {
        let response = self
            .client
            .get(self.endpoint("/api/busqueda")?)
            .query(params)
            .send()
            .await?;
        Self::read(response).await
    }

    pub async fn enrich(&mut self) -> Result<EnrichmentReport> {
        let response = self
            .client
            .post(self.endpoint("/api/enrich")?)
            .timeout(Duration::from_secs(3600))
            .send()
            .await?;
        let report = Self::read(response).await?;
        self.refresh().await?;
        Ok(report)
    }
}
