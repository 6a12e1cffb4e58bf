//! Rich diagnostic error types for the secgraph pipeline.
//!
//! Each pipeline stage defines its own error type with miette `#[diagnostic]`
//! derives, so a failing stage reports an error code, help text, and the
//! underlying cause instead of a bare message.

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the secgraph pipeline.
///
/// Each variant wraps a stage-specific error, preserving the full diagnostic
/// chain (error codes, help text, sources) through to the user.
#[derive(Debug, Error, Diagnostic)]
pub enum SecGraphError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Alignment(#[from] AlignmentError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Eval(#[from] EvalError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("required path is not configured: {key}")]
    #[diagnostic(
        code(secgraph::config::missing_path),
        help(
            "Set the {key} environment variable, add it to the config file, \
             or pass the matching command-line flag."
        )
    )]
    MissingPath { key: String },

    #[error("invalid value for {key}: \"{value}\" ({message})")]
    #[diagnostic(
        code(secgraph::config::invalid_value),
        help("Check the type of {key}. Numeric parameters must parse as numbers.")
    )]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("invalid split ratios: train={train}, valid={valid}")]
    #[diagnostic(
        code(secgraph::config::invalid_ratios),
        help(
            "Both ratios must be finite and non-negative, and train + valid \
             must not exceed 1.0. The test split takes the remainder."
        )
    )]
    InvalidRatios { train: f64, valid: f64 },

    #[error("unknown embedding model family: \"{name}\"")]
    #[diagnostic(
        code(secgraph::config::unknown_model),
        help("Supported model families: {supported}.")
    )]
    UnknownModel { name: String, supported: String },

    #[error("unknown optimizer: \"{name}\"")]
    #[diagnostic(
        code(secgraph::config::unknown_optimizer),
        help("Supported optimizers: {supported}.")
    )]
    UnknownOptimizer { name: String, supported: String },

    #[error("invalid training parameter: {message}")]
    #[diagnostic(
        code(secgraph::config::training_param),
        help("Embedding dimension, epochs and batch size must be > 0; learning rate must be positive.")
    )]
    InvalidTrainingParam { message: String },

    #[error("no API key configured for {service}")]
    #[diagnostic(
        code(secgraph::config::missing_api_key),
        help("Set OPENAI_API_TOKEN or the `api_key` field of the [service] config section.")
    )]
    MissingApiKey { service: String },

    #[error("failed to load config file {path}: {message}")]
    #[diagnostic(
        code(secgraph::config::file),
        help("The config file must be valid TOML matching the PipelineConfig layout.")
    )]
    ConfigFile { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Data errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum DataError {
    #[error("I/O error on {path}: {source}")]
    #[diagnostic(
        code(secgraph::data::io),
        help(
            "A filesystem operation failed. Check that the file exists, \
             has correct permissions, and that the disk is not full."
        )
    )]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact {path}: {message}")]
    #[diagnostic(
        code(secgraph::data::parse),
        help(
            "The file could not be deserialized. It may have been produced by \
             an incompatible version; re-run the stage that writes it."
        )
    )]
    Parse { path: String, message: String },

    #[error("RDF parse error: {message}")]
    #[diagnostic(
        code(secgraph::data::rdf),
        help("The ontology must be valid Turtle. Check prefixes and statement terminators.")
    )]
    Rdf { message: String },

    #[error("triple has an empty {position}")]
    #[diagnostic(
        code(secgraph::data::empty_term),
        help("Every subject, predicate and object must be a non-empty string.")
    )]
    EmptyTerm { position: &'static str },

    #[error("corpus is empty: {origin}")]
    #[diagnostic(
        code(secgraph::data::empty_corpus),
        help(
            "No triples were found. Refusing to continue, since every later \
             stage would silently succeed on nothing."
        )
    )]
    EmptyCorpus { origin: String },

    #[error("vector for \"{key}\" has dimension {actual}, expected {expected}")]
    #[diagnostic(
        code(secgraph::data::dim_mismatch),
        help("All vectors in one embedding space must share the same dimension.")
    )]
    DimensionMismatch {
        key: String,
        expected: usize,
        actual: usize,
    },

    #[error("serialization error: {message}")]
    #[diagnostic(
        code(secgraph::data::serde),
        help("Failed to encode an artifact before writing it.")
    )]
    Serialization { message: String },
}

// ---------------------------------------------------------------------------
// Training errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum TrainError {
    #[error("cannot train on an empty corpus")]
    #[diagnostic(
        code(secgraph::train::empty_corpus),
        help("Run `secgraph prepare` first and check that it produced triples.")
    )]
    EmptyCorpus,

    #[error("training diverged at epoch {epoch}: loss is {loss}")]
    #[diagnostic(
        code(secgraph::train::diverged),
        help("Lower the learning rate or switch to the adagrad optimizer.")
    )]
    Diverged { epoch: usize, loss: f32 },
}

// ---------------------------------------------------------------------------
// Alignment errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum AlignmentError {
    #[error(
        "no shared keys between source ({source_len} keys) and target ({target_len} keys) spaces"
    )]
    #[diagnostic(
        code(secgraph::align::empty_intersection),
        help(
            "Alignment needs at least one key embedded by both models. Check that \
             the text embeddings were computed for the same vocabulary as the KGE model."
        )
    )]
    EmptyIntersection {
        source_len: usize,
        target_len: usize,
    },

    #[error("{space} space: vector for \"{key}\" contains NaN or infinite values")]
    #[diagnostic(
        code(secgraph::align::non_finite),
        help("Retrain the model or re-embed the key; the regression cannot fit non-finite data.")
    )]
    NonFinite { space: &'static str, key: String },

    #[error("least-squares solver failed: {message}")]
    #[diagnostic(
        code(secgraph::align::solver),
        help("The SVD solve did not converge. Inspect the input spaces for extreme values.")
    )]
    Solver { message: String },
}

// ---------------------------------------------------------------------------
// External service errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ServiceError {
    #[error("{service} unreachable at {url} after {attempts} attempt(s): {message}")]
    #[diagnostic(
        code(secgraph::service::transport),
        help("Check network connectivity and the configured base URL.")
    )]
    Transport {
        service: &'static str,
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("{service} returned HTTP {status}: {message}")]
    #[diagnostic(
        code(secgraph::service::status),
        help("Check the API key, the model name, and the service quota.")
    )]
    Status {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("unexpected response from {service}: {message}")]
    #[diagnostic(
        code(secgraph::service::parse),
        help("The service answered with a payload this client does not understand.")
    )]
    Parse {
        service: &'static str,
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Graph query errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("graph store error: {message}")]
    #[diagnostic(
        code(secgraph::graph::store),
        help("The in-memory RDF store could not be created or populated.")
    )]
    Store { message: String },

    #[error("graph query failed: {message}")]
    #[diagnostic(
        code(secgraph::graph::query),
        help(
            "The query was rejected. Only SELECT queries returning ?subject ?predicate \
             ?object or ?uri bindings are supported."
        )
    )]
    Query { message: String },
}

// ---------------------------------------------------------------------------
// Evaluation errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum EvalError {
    #[error("failed to load evaluation cases from {path}: {message}")]
    #[diagnostic(
        code(secgraph::eval::cases),
        help(
            "The case file must be TOML with one array of tables per group, each \
             entry holding head, relation, tail and target (head|tail|both)."
        )
    )]
    CaseFile { path: String, message: String },
}

/// Convenience alias for functions returning secgraph results.
pub type SecGraphResult<T> = std::result::Result<T, SecGraphError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alignment_error_converts_to_top_level() {
        let err = AlignmentError::EmptyIntersection {
            source_len: 3,
            target_len: 4,
        };
        let top: SecGraphError = err.into();
        assert!(matches!(
            top,
            SecGraphError::Alignment(AlignmentError::EmptyIntersection { .. })
        ));
    }

    #[test]
    fn service_error_stays_distinguishable() {
        let err = ServiceError::Status {
            service: "chat",
            status: 503,
            message: "overloaded".into(),
        };
        let top: SecGraphError = err.into();
        assert!(matches!(top, SecGraphError::Service(ServiceError::Status { status: 503, .. })));
    }

    #[test]
    fn error_display_messages_are_descriptive() {
        let err = ConfigError::InvalidRatios {
            train: 0.9,
            valid: 0.3,
        };
        let msg = format!("{err}");
        assert!(msg.contains("0.9"));
        assert!(msg.contains("0.3"));
    }
}
