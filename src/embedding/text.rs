//! Text-embedding service clients.
//!
//! The pipeline only needs "strings in, one vector per string out"; the
//! [`TextEmbedder`] trait is that seam. [`OpenAiEmbedder`] talks to an
//! OpenAI-compatible `/embeddings` endpoint.

use crate::error::{ConfigError, ServiceError};
use crate::remote::{JsonClient, ServiceConfig};

/// Turns strings into vectors of a fixed, model-determined dimension.
pub trait TextEmbedder {
    /// Embed each document; the output has one vector per input, in order.
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    /// Embed a single query string.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.embed_documents(&[text.to_string()])?
            .pop()
            .ok_or_else(|| ServiceError::Parse {
                service: "embeddings",
                message: "empty embedding response for query".into(),
            })
    }
}

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";

/// Inputs per request; large vocabularies are sent in chunks.
const BATCH_SIZE: usize = 256;

/// Client for an OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: JsonClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &ServiceConfig, model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: JsonClient::new("embeddings", config)?,
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        let json = self.client.post("embeddings", &body)?;
        parse_embeddings(&json, texts.len())
    }
}

impl TextEmbedder for OpenAiEmbedder {
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_batch(chunk)?);
        }
        tracing::debug!(model = %self.model, count = out.len(), "embedded documents");
        Ok(out)
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("model", &self.model)
            .finish()
    }
}

/// Extract `data[*].embedding`, ordered by each item's `index`.
fn parse_embeddings(json: &serde_json::Value, expected: usize) -> Result<Vec<Vec<f32>>, ServiceError> {
    let parse_err = |message: String| ServiceError::Parse {
        service: "embeddings",
        message,
    };

    let data = json["data"]
        .as_array()
        .ok_or_else(|| parse_err("missing 'data' array".into()))?;
    if data.len() != expected {
        return Err(parse_err(format!(
            "expected {expected} embeddings, got {}",
            data.len()
        )));
    }

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for (pos, item) in data.iter().enumerate() {
        let index = item["index"].as_u64().map(|i| i as usize).unwrap_or(pos);
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| parse_err(format!("item {pos} has no 'embedding' array")))?
            .iter()
            .map(|x| x.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| parse_err(format!("item {pos} has a non-numeric component")))?;
        let slot = slots
            .get_mut(index)
            .ok_or_else(|| parse_err(format!("index {index} out of range")))?;
        *slot = Some(vector);
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(i, v)| v.ok_or_else(|| parse_err(format!("no embedding for input {i}"))))
        .collect()
}
