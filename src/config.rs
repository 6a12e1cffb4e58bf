//! Pipeline configuration: TOML file, then environment, then CLI flags.
//!
//! Every stage reads the same [`PipelineConfig`]. Paths are optional in the
//! type and checked with [`PathsConfig::require`] by the stage that needs
//! them, so a missing path fails before any work is done.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::align::Projection;
use crate::context::MatchMode;
use crate::corpus::SplitRatios;
use crate::embedding::kge::TrainingConfig;
use crate::embedding::text::DEFAULT_EMBEDDING_MODEL;
use crate::error::ConfigError;
use crate::llm::DEFAULT_CHAT_MODEL;
use crate::remote::ServiceConfig;
use crate::retrieve::DEFAULT_TOP_K;

/// Artifact locations shared by the stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Turtle ontology read by `prepare`.
    pub turtle: Option<PathBuf>,
    /// Split corpus written by `prepare`, read by everything after.
    pub corpus: Option<PathBuf>,
    /// Trained KGE model.
    pub model: Option<PathBuf>,
    /// Aligned entity embeddings, used for retrieval.
    pub entity_embeddings: Option<PathBuf>,
    /// Aligned relation embeddings.
    pub relation_embeddings: Option<PathBuf>,
}

impl PathsConfig {
    /// The path, or `MissingPath` naming its environment variable.
    pub fn require<'a>(path: &'a Option<PathBuf>, key: &str) -> Result<&'a Path, ConfigError> {
        path.as_deref().ok_or_else(|| ConfigError::MissingPath { key: key.into() })
    }

    pub fn turtle(&self) -> Result<&Path, ConfigError> {
        Self::require(&self.turtle, "KB_TURTLE_FILE_PATH")
    }

    pub fn corpus(&self) -> Result<&Path, ConfigError> {
        Self::require(&self.corpus, "KB_CORPUS_FILE_PATH")
    }

    pub fn model(&self) -> Result<&Path, ConfigError> {
        Self::require(&self.model, "MODEL_PATH")
    }

    pub fn entity_embeddings(&self) -> Result<&Path, ConfigError> {
        Self::require(&self.entity_embeddings, "ENTITY_EMBEDDINGS_PATH")
    }

    pub fn relation_embeddings(&self) -> Result<&Path, ConfigError> {
        Self::require(&self.relation_embeddings, "RELATION_EMBEDDINGS_PATH")
    }
}

/// How the corpus is partitioned.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    #[serde(flatten)]
    pub ratios: SplitRatios,
    /// Fixed shuffle seed. Unseeded splits differ between runs.
    pub seed: Option<u64>,
}

/// Question-answering knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub match_mode: MatchMode,
    pub projection: Projection,
    /// Also ask the chat model without context, for comparison.
    pub with_baseline: bool,
    /// Translate questions to SPARQL and query the graph before embedding retrieval.
    pub graph_query: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            match_mode: MatchMode::default(),
            projection: Projection::default(),
            with_baseline: false,
            graph_query: false,
        }
    }
}

/// External model names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub chat: String,
    pub text_embedding: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: DEFAULT_CHAT_MODEL.into(),
            text_embedding: DEFAULT_EMBEDDING_MODEL.into(),
        }
    }
}

/// Full configuration for every stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub paths: PathsConfig,
    pub split: SplitConfig,
    pub training: TrainingConfig,
    pub retrieval: RetrievalConfig,
    pub service: ServiceConfig,
    pub models: ModelsConfig,
}

fn parse_env<T>(key: &str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let parsed = value.trim().parse::<T>();
    parsed.map_err(|e| ConfigError::InvalidValue {
        key: key.into(),
        message: e.to_string(),
        value,
    })
}

impl PipelineConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ConfigFile {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Defaults, or the given file, with the process environment applied on top.
    pub fn resolve(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match file {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Override fields from environment-style variables returned by `lookup`.
    ///
    /// Empty values are ignored. Unparseable numbers are an error.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let paths = [
            ("KB_TURTLE_FILE_PATH", &mut self.paths.turtle),
            ("KB_CORPUS_FILE_PATH", &mut self.paths.corpus),
            ("MODEL_PATH", &mut self.paths.model),
            ("ENTITY_EMBEDDINGS_PATH", &mut self.paths.entity_embeddings),
            ("RELATION_EMBEDDINGS_PATH", &mut self.paths.relation_embeddings),
        ];
        for (key, slot) in paths {
            if let Some(v) = get(key) {
                *slot = Some(PathBuf::from(v));
            }
        }

        let t = &mut self.training;
        if let Some(v) = get("EMBEDDING_DIM") {
            t.embedding_dim = parse_env("EMBEDDING_DIM", v)?;
        }
        if let Some(v) = get("NUM_EPOCHS") {
            t.epochs = parse_env("NUM_EPOCHS", v)?;
        }
        if let Some(v) = get("LEARNING_RATE") {
            t.learning_rate = parse_env("LEARNING_RATE", v)?;
        }
        if let Some(v) = get("NUM_NEGS_PER_POS") {
            t.negatives_per_positive = parse_env("NUM_NEGS_PER_POS", v)?;
        }
        if let Some(v) = get("BATCH_SIZE") {
            t.batch_size = parse_env("BATCH_SIZE", v)?;
        }
        if let Some(v) = get("MODEL") {
            t.model = v.parse()?;
        }
        if let Some(v) = get("OPTIMIZER") {
            t.optimizer = v.parse()?;
        }

        if let Some(v) = get("TOP_K") {
            self.retrieval.top_k = parse_env("TOP_K", v)?;
        }
        if let Some(v) = get("TRAIN_RATIO") {
            self.split.ratios.train = parse_env("TRAIN_RATIO", v)?;
        }
        if let Some(v) = get("VALID_RATIO") {
            self.split.ratios.valid = parse_env("VALID_RATIO", v)?;
        }
        if let Some(v) = get("SPLIT_SEED") {
            self.split.seed = Some(parse_env("SPLIT_SEED", v)?);
        }

        if let Some(v) = get("OPENAI_API_TOKEN") {
            self.service.api_key = Some(v);
        }
        if let Some(v) = get("OPENAI_BASE_URL") {
            self.service.base_url = v;
        }
        if let Some(v) = get("SERVICE_TIMEOUT_SECS") {
            self.service.timeout_secs = parse_env("SERVICE_TIMEOUT_SECS", v)?;
        }
        if let Some(v) = get("CHAT_MODEL") {
            self.models.chat = v;
        }
        if let Some(v) = get("TEXT_EMBEDDING_MODEL") {
            self.models.text_embedding = v;
        }
        Ok(())
    }

    /// Check values that every stage relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.split.ratios.validate()?;
        self.training.validate()?;
        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TOP_K".into(),
                value: "0".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::embedding::kge::{ModelFamily, OptimizerKind};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_hyperparameters() {
        let config = PipelineConfig::default();
        assert_eq!(config.training.embedding_dim, 1536);
        assert_eq!(config.training.epochs, 100);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.training.model, ModelFamily::TransE);
        assert_eq!(config.training.optimizer, OptimizerKind::Adagrad);
        assert_eq!(config.retrieval.top_k, 5);
        assert_eq!(config.models.chat, "gpt-4o-mini");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_fields() {
        let mut config = PipelineConfig::default();
        config
            .apply_env(env(&[
                ("KB_CORPUS_FILE_PATH", "/data/kb.json"),
                ("EMBEDDING_DIM", "64"),
                ("LEARNING_RATE", "0.5"),
                ("MODEL", "distmult"),
                ("OPTIMIZER", "sgd"),
                ("TOP_K", " 3 "),
                ("SPLIT_SEED", "7"),
                ("OPENAI_API_TOKEN", "sk-test"),
                ("MODEL_PATH", ""),
            ]))
            .unwrap();
        assert_eq!(config.paths.corpus().unwrap(), Path::new("/data/kb.json"));
        assert_eq!(config.training.embedding_dim, 64);
        assert_eq!(config.training.learning_rate, 0.5);
        assert_eq!(config.training.model, ModelFamily::DistMult);
        assert_eq!(config.training.optimizer, OptimizerKind::Sgd);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.split.seed, Some(7));
        assert_eq!(config.service.api_key.as_deref(), Some("sk-test"));
        assert!(config.paths.model.is_none());
    }

    #[test]
    fn non_numeric_value_names_the_key() {
        let mut config = PipelineConfig::default();
        let err = config.apply_env(env(&[("NUM_EPOCHS", "many")])).unwrap_err();
        match err {
            ConfigError::InvalidValue { key, value, .. } => {
                assert_eq!(key, "NUM_EPOCHS");
                assert_eq!(value, "many");
            }
            other => panic!("expected InvalidValue, got {other:?}"),
        }
    }

    #[test]
    fn unknown_model_is_rejected() {
        let mut config = PipelineConfig::default();
        assert!(matches!(
            config.apply_env(env(&[("MODEL", "RotatE")])),
            Err(ConfigError::UnknownModel { .. })
        ));
    }

    #[test]
    fn missing_path_reports_variable() {
        let config = PipelineConfig::default();
        assert!(matches!(
            config.paths.entity_embeddings(),
            Err(ConfigError::MissingPath { key }) if key == "ENTITY_EMBEDDINGS_PATH"
        ));
    }

    #[test]
    fn toml_file_then_env() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("secgraph.toml");
        std::fs::write(
            &path,
            r#"
[paths]
corpus = "kb.json"
model = "model.bin"

[split]
train = 0.7
valid = 0.2
seed = 11

[training]
model = "DistMult"
epochs = 5

[retrieval]
top_k = 8
match_mode = "full_uri"
projection = "with_intercept"
"#,
        )
        .unwrap();

        let mut config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.split.ratios.train, 0.7);
        assert_eq!(config.split.seed, Some(11));
        assert_eq!(config.training.model, ModelFamily::DistMult);
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.embedding_dim, 1536);
        assert_eq!(config.retrieval.match_mode, MatchMode::FullUri);
        assert_eq!(config.retrieval.projection, Projection::WithIntercept);

        config.apply_env(env(&[("NUM_EPOCHS", "9")])).unwrap();
        assert_eq!(config.training.epochs, 9);
        assert_eq!(config.paths.model.as_deref(), Some(Path::new("model.bin")));
    }

    #[test]
    fn malformed_toml_is_a_config_file_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[training\nepochs = ").unwrap();
        assert!(matches!(
            PipelineConfig::load(&path),
            Err(ConfigError::ConfigFile { .. })
        ));
    }

    #[test]
    fn zero_top_k_fails_validation() {
        let mut config = PipelineConfig::default();
        config.retrieval.top_k = 0;
        assert!(config.validate().is_err());
    }
}
