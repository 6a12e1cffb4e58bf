//! Chat-completion client and the prompts used to answer analyst questions.
//!
//! The language model is used **only** for:
//! - Generating the final answer from assembled graph context
//! - Producing an ungrounded baseline answer for comparison
//! - Translating questions into SPARQL (see [`crate::graph_query::QueryTranslator`])
//!
//! Entity selection and context assembly are embedding-based and do NOT use
//! the LLM.

use serde::{Deserialize, Serialize};

use crate::context::NO_CONTEXT;
use crate::error::{ConfigError, ServiceError};
use crate::remote::{JsonClient, ServiceConfig};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A chat message for a single completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Anything that completes a conversation with one assistant reply.
pub trait ChatModel {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String, ServiceError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// Requests are sent with temperature 0 so repeated questions produce the
/// same answer as far as the service allows.
pub struct OpenAiChat {
    client: JsonClient,
    model: String,
}

impl OpenAiChat {
    pub fn new(config: &ServiceConfig, model: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            client: JsonClient::new("chat", config)?,
            model: model.into(),
        })
    }

    /// Get the model name being used.
    pub fn model(&self) -> &str {
        &self.model
    }
}

impl ChatModel for OpenAiChat {
    fn chat(&self, messages: &[ChatMessage]) -> Result<String, ServiceError> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": 0,
            "messages": messages,
        });
        let json = self.client.post("chat/completions", &body)?;
        let reply = parse_completion(&json)?;
        tracing::debug!(model = %self.model, chars = reply.len(), "chat completion received");
        Ok(reply)
    }
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("model", &self.model)
            .finish()
    }
}

fn parse_completion(json: &serde_json::Value) -> Result<String, ServiceError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ServiceError::Parse {
            service: "chat",
            message: "missing 'choices[0].message.content' field".into(),
        })
}

const ANALYST_SYSTEM_PROMPT: &str = "\
You are an AI assistant designed to support a security analyst in monitoring, \
detecting, and mitigating DDoS and DoS attacks. Your primary goal is to enhance \
the analyst's cyber situation awareness by providing concise, context-aware insights.

# Instructions
- Answer exclusively based on the information provided in the context; do not use \
your own pre-existing knowledge or external sources.
- If the context is exactly NO_CONTEXT, say that no relevant graph context was found \
for the question and do not invent facts.
- Prioritize clear and concise answers that directly assist the analyst.
- Focus on practical insights that improve the analyst's decision-making.";

/// Messages asking for an answer grounded in `context`.
///
/// An empty or blank context is replaced by [`NO_CONTEXT`].
pub fn grounded_prompt(question: &str, context: &str) -> Vec<ChatMessage> {
    let context = if context.trim().is_empty() {
        NO_CONTEXT
    } else {
        context
    };
    vec![
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(format!("Context:\n{context}\n\nQuestion:\n{question}")),
    ]
}

/// The bare question, for an ungrounded comparison answer.
pub fn baseline_prompt(question: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::user(question)]
}
