use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;

use crate::domain::{GeneId, TranscriptId};
use crate::error::HarvestError;

pub const DEFAULT_SERVER: &str = "https://rest.ensembl.org";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GeneLookup {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub seq_region_name: Option<String>,
    #[serde(default)]
    pub start: Option<u64>,
    #[serde(default)]
    pub end: Option<u64>,
    #[serde(default)]
    pub strand: Option<i64>,
    #[serde(default)]
    pub canonical_transcript: Option<String>,
    #[serde(default, rename = "Transcript")]
    pub transcripts: Vec<TranscriptLookup>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptLookup {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "Translation")]
    pub translation: Option<TranslationRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranslationRef {
    pub id: String,
}

impl GeneLookup {
    pub fn first_translation_id(&self) -> Option<&str> {
        self.transcripts
            .iter()
            .find_map(|transcript| transcript.translation.as_ref())
            .map(|translation| translation.id.as_str())
    }
}

pub trait EnsemblClient: Send + Sync {
    fn lookup_gene(&self, id: &GeneId) -> Result<GeneLookup, HarvestError>;
    fn genomic_sequence(&self, id: &GeneId) -> Result<String, HarvestError>;
    fn transcript_sequence(&self, id: &TranscriptId) -> Result<String, HarvestError>;
    fn protein_sequence(&self, protein_id: &str) -> Result<String, HarvestError>;
}

#[derive(Clone)]
pub struct EnsemblHttpClient {
    client: Client,
    base_url: String,
}

impl EnsemblHttpClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, HarvestError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("kira-gh/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| HarvestError::EnsemblHttp(err.to_string()))?,
        );
        let mut builder = Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|err| HarvestError::EnsemblHttp(err.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn get(
        &self,
        path: &str,
        query: &[(&str, &str)],
        content_type: &'static str,
    ) -> Result<reqwest::blocking::Response, HarvestError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "ensembl request");
        let response = self
            .client
            .get(&url)
            .query(query)
            .header(CONTENT_TYPE, HeaderValue::from_static(content_type))
            .send()
            .map_err(|err| HarvestError::EnsemblHttp(err.to_string()))?;
        Self::handle_status(response)
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, HarvestError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Ensembl request failed".to_string());
        Err(HarvestError::EnsemblStatus { status, message })
    }

    fn get_text(&self, path: &str, query: &[(&str, &str)]) -> Result<String, HarvestError> {
        self.get(path, query, "text/plain")?
            .text()
            .map_err(|err| HarvestError::EnsemblHttp(err.to_string()))
    }
}

impl EnsemblClient for EnsemblHttpClient {
    fn lookup_gene(&self, id: &GeneId) -> Result<GeneLookup, HarvestError> {
        let path = format!("/lookup/id/{}", id.as_str());
        self.get(&path, &[("expand", "1")], "application/json")?
            .json()
            .map_err(|err| HarvestError::EnsemblParse(err.to_string()))
    }

    fn genomic_sequence(&self, id: &GeneId) -> Result<String, HarvestError> {
        let path = format!("/sequence/id/{}", id.as_str());
        self.get_text(&path, &[("type", "genomic")])
    }

    fn transcript_sequence(&self, id: &TranscriptId) -> Result<String, HarvestError> {
        let path = format!("/sequence/id/{}", id.as_str());
        self.get_text(&path, &[])
    }

    fn protein_sequence(&self, protein_id: &str) -> Result<String, HarvestError> {
        let path = format!("/sequence/id/{}", protein_id.trim());
        self.get_text(&path, &[("type", "protein")])
    }
}
