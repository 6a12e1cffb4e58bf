//! End-to-end question answering plus the offline stages that feed it.
//!
//! Online, [`AnswerPipeline::answer`] runs sequentially:
//!
//! 1. graph query (when configured): translate the question to SPARQL and
//!    use the rows as context; any failure falls back to step 2
//! 2. embed the question and retrieve the top-K aligned entities
//! 3. assemble the triples that mention those entities
//! 4. generate an answer grounded in that context
//!
//! The offline stages live in [`stages`].

pub mod stages;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::context::{ContextGroup, MatchMode, assemble_scored, render_prompt_context};
use crate::corpus::TripleCorpus;
use crate::embedding::EmbeddingSpace;
use crate::embedding::text::TextEmbedder;
use crate::error::SecGraphResult;
use crate::graph_query::{GraphQuery, QueryTranslator, SparqlGraph, context_from_rows};
use crate::llm::{ChatModel, baseline_prompt, grounded_prompt};
use crate::retrieve::{DEFAULT_TOP_K, Retriever, Scored};

/// Everything produced while answering one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// Entities retrieved by embedding similarity, best first.
    pub retrieved: Vec<Scored>,
    /// The context the answer was grounded in.
    pub context: Vec<ContextGroup>,
    /// The graph query that produced the context, when one was used.
    pub graph_query: Option<String>,
    /// Ungrounded answer, when requested.
    pub baseline: Option<String>,
}

/// Online question-answering pipeline.
pub struct AnswerPipeline {
    corpus: TripleCorpus,
    entities: EmbeddingSpace,
    embedder: Box<dyn TextEmbedder>,
    chat: Box<dyn ChatModel>,
    graph: Option<Box<dyn GraphQuery>>,
    top_k: usize,
    match_mode: MatchMode,
    with_baseline: bool,
}

impl AnswerPipeline {
    pub fn new(
        corpus: TripleCorpus,
        entities: EmbeddingSpace,
        embedder: Box<dyn TextEmbedder>,
        chat: Box<dyn ChatModel>,
    ) -> Self {
        Self {
            corpus,
            entities,
            embedder,
            chat,
            graph: None,
            top_k: DEFAULT_TOP_K,
            match_mode: MatchMode::default(),
            with_baseline: false,
        }
    }

    /// Build from persisted artifacts.
    ///
    /// Loads the corpus and the aligned entity embeddings; with
    /// `retrieval.graph_query` set, also builds a SPARQL store from the
    /// Turtle file when configured, or from the corpus otherwise.
    pub fn from_config(
        config: &PipelineConfig,
        embedder: Box<dyn TextEmbedder>,
        chat: Box<dyn ChatModel>,
    ) -> SecGraphResult<Self> {
        let corpus_path = config.paths.corpus()?;
        let entities_path = config.paths.entity_embeddings()?;

        let corpus = TripleCorpus::load(corpus_path)?;
        let entities = EmbeddingSpace::load(entities_path)?;

        let mut pipeline = Self::new(corpus, entities, embedder, chat)
            .with_top_k(config.retrieval.top_k)
            .with_match_mode(config.retrieval.match_mode)
            .with_baseline(config.retrieval.with_baseline);

        if config.retrieval.graph_query {
            let graph = match &config.paths.turtle {
                Some(path) => SparqlGraph::open_turtle(path)?,
                None => SparqlGraph::from_corpus(&pipeline.corpus)?,
            };
            pipeline = pipeline.with_graph(Box::new(graph));
        }
        Ok(pipeline)
    }

    pub fn with_graph(mut self, graph: Box<dyn GraphQuery>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    pub fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    pub fn with_baseline(mut self, enabled: bool) -> Self {
        self.with_baseline = enabled;
        self
    }

    pub fn corpus(&self) -> &TripleCorpus {
        &self.corpus
    }

    /// Top-K entities for a question, without generating an answer.
    pub fn retrieve(&self, question: &str) -> SecGraphResult<Vec<Scored>> {
        let retriever = Retriever::new(self.embedder.as_ref(), &self.entities);
        Ok(retriever.retrieve_text(question, self.top_k)?)
    }

    /// Context from the graph store, or `None` to fall back to retrieval.
    fn graph_context(&self, question: &str) -> Option<(String, Vec<ContextGroup>)> {
        let graph = self.graph.as_ref()?;
        let query = match QueryTranslator::new(self.chat.as_ref()).translate(question) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!(error = %e, "question translation failed, using embedding retrieval");
                return None;
            }
        };
        let rows = match graph.query(&query) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, %query, "graph query failed, using embedding retrieval");
                return None;
            }
        };
        let groups = context_from_rows(&rows, &self.corpus, self.match_mode);
        if groups.iter().all(ContextGroup::is_empty) {
            tracing::info!(%query, rows = rows.len(), "graph query found nothing, using embedding retrieval");
            return None;
        }
        Some((query, groups))
    }

    /// Answer a question grounded in the knowledge graph.
    pub fn answer(&self, question: &str) -> SecGraphResult<Answer> {
        let (graph_query, retrieved, context) = match self.graph_context(question) {
            Some((query, groups)) => (Some(query), Vec::new(), groups),
            None => {
                let retrieved = self.retrieve(question)?;
                let groups = assemble_scored(&retrieved, &self.corpus, self.match_mode);
                (None, retrieved, groups)
            }
        };

        let prompt_context = render_prompt_context(&context);
        let text = self.chat.chat(&grounded_prompt(question, &prompt_context))?;

        let baseline = if self.with_baseline {
            Some(self.chat.chat(&baseline_prompt(question))?)
        } else {
            None
        };

        tracing::info!(
            retrieved = retrieved.len(),
            groups = context.len(),
            triples = context.iter().map(|g| g.triples.len()).sum::<usize>(),
            graph = graph_query.is_some(),
            "question answered"
        );

        Ok(Answer {
            text,
            retrieved,
            context,
            graph_query,
            baseline,
        })
    }
}

impl std::fmt::Debug for AnswerPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerPipeline")
            .field("triples", &self.corpus.len())
            .field("entities", &self.entities.len())
            .field("graph", &self.graph.is_some())
            .field("top_k", &self.top_k)
            .field("match_mode", &self.match_mode)
            .field("with_baseline", &self.with_baseline)
            .finish()
    }
}
