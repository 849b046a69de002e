//! HTTP embedding endpoints: Ollama and OpenAI-compatible servers.
//!
//! Each request carries an explicit timeout and gets at most one retry, and
//! only for failures that can plausibly clear up (connection problems,
//! timeouts, 429 and 5xx).

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Embedder;
use crate::error::EmbeddingError;

const MAX_ATTEMPTS: usize = 2;
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Blocking JSON client shared by both endpoint kinds.
struct JsonEndpoint {
    client: Client,
    url: String,
    bearer: Option<String>,
}

impl JsonEndpoint {
    fn new(url: String, bearer: Option<String>, timeout: Duration) -> Result<Self, EmbeddingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Client {
                endpoint: url.clone(),
                message: e.to_string(),
            })?;
        Ok(Self { client, url, bearer })
    }

    fn post<B, R>(&self, body: &B) -> Result<R, EmbeddingError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        with_retry(MAX_ATTEMPTS, RETRY_BACKOFF, || self.post_once(body))
    }

    fn post_once<B, R>(&self, body: &B) -> Result<R, EmbeddingError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| self.transport_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(EmbeddingError::Status {
                endpoint: self.url.clone(),
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        response.json::<R>().map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                EmbeddingError::Malformed(format!("{}: {}", self.url, e))
            }
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout {
                endpoint: self.url.clone(),
            }
        } else {
            EmbeddingError::Request {
                endpoint: self.url.clone(),
                message: err.to_string(),
            }
        }
    }
}

/// Run `op`, repeating transient failures up to `attempts` times in total.
pub fn with_retry<T, F>(attempts: usize, backoff: Duration, mut op: F) -> Result<T, EmbeddingError>
where
    F: FnMut() -> Result<T, EmbeddingError>,
{
    let mut attempt = 1;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < attempts => {
                warn!(attempt, error = %err, "embedding call failed, retrying");
                thread::sleep(backoff);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

fn check_count(expected: usize, got: usize) -> Result<(), EmbeddingError> {
    if expected == got {
        Ok(())
    } else {
        Err(EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected, got
        )))
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OllamaResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama `/api/embed`.
pub struct OllamaEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    id: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, EmbeddingError> {
        let url = format!("{}/api/embed", base_url.trim_end_matches('/'));
        Ok(Self {
            endpoint: JsonEndpoint::new(url, None, timeout)?,
            model: model.to_string(),
            id: format!("ollama:{}", model),
        })
    }
}

impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "ollama embed");
        let response: OllamaResponse = self.endpoint.post(&EmbedRequest {
            model: &self.model,
            input: texts,
        })?;
        check_count(texts.len(), response.embeddings.len())?;
        Ok(response.embeddings)
    }
}

#[derive(Deserialize)]
struct OpenAiResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Deserialize)]
struct OpenAiEmbedding {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Any server speaking the OpenAI `/embeddings` API.
pub struct OpenAiCompatibleEmbedder {
    endpoint: JsonEndpoint,
    model: String,
    id: String,
}

impl OpenAiCompatibleEmbedder {
    pub fn new(
        base_url: &str,
        model: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let url = format!("{}/embeddings", base_url.trim_end_matches('/'));
        Ok(Self {
            endpoint: JsonEndpoint::new(url, api_key, timeout)?,
            model: model.to_string(),
            id: format!("openai:{}", model),
        })
    }
}

impl Embedder for OpenAiCompatibleEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, count = texts.len(), "openai-compatible embed");
        let mut response: OpenAiResponse = self.endpoint.post(&EmbedRequest {
            model: &self.model,
            input: texts,
        })?;
        check_count(texts.len(), response.data.len())?;
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }
}
