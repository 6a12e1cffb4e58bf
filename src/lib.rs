// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # secgraph
//!
//! Graph-grounded question answering over a network-security knowledge base.
//! A knowledge-graph embedding model is trained on the ontology, its vectors
//! are linearly aligned into a text-embedding space, and analyst questions
//! are answered from the triples around the most similar entities.
//!
//! ## Architecture
//!
//! - **Corpus** (`corpus`): Turtle loading, train/valid/test split, vocabulary
//! - **Embeddings** (`embedding`): TransE/DistMult training, text-embedding clients
//! - **Alignment** (`align`): least-squares map from KGE space to text space
//! - **Retrieval** (`retrieve`, `context`): cosine top-K and triple context assembly
//! - **Generation** (`llm`, `graph_query`): chat completion, SPARQL translation
//! - **Pipeline** (`pipeline`): offline stages and the online answer flow
//!
//! ## Library usage
//!
//! ```no_run
//! use secgraph::align::{Projection, align};
//! use secgraph::embedding::EmbeddingSpace;
//! use secgraph::retrieve::retrieve;
//!
//! let kge = EmbeddingSpace::load("model_entities.json".as_ref()).unwrap();
//! let text = EmbeddingSpace::load("text_entities.json".as_ref()).unwrap();
//! let aligned = align(&kge, &text, Projection::LinearOnly).unwrap();
//! let query = text.get("http://example.org/network#Router1").unwrap();
//! for hit in retrieve(query, &aligned.space, 5) {
//!     println!("{} {:.4}", hit.key, hit.score);
//! }
//! ```

pub mod align;
pub mod artifact;
pub mod config;
pub mod context;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod evaluate;
pub mod graph_query;
pub mod llm;
pub mod pipeline;
pub mod remote;
pub mod retrieve;
pub mod uri;
