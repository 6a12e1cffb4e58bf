//! Offline stages: prepare, train, align, evaluate.
//!
//! Each stage is a pure function over typed artifacts plus a thin wrapper
//! that resolves paths from [`PipelineConfig`], reads inputs, and writes
//! outputs. All required paths are checked before any work starts.

use crate::align::{Alignment, Projection, align};
use crate::artifact;
use crate::config::PipelineConfig;
use crate::corpus::turtle::load_turtle;
use crate::corpus::{TripleCorpus, split};
use crate::embedding::EmbeddingSpace;
use crate::embedding::kge::{KgeModel, TrainedModel, train};
use crate::embedding::text::TextEmbedder;
use crate::error::{SecGraphResult, ServiceError};
use crate::evaluate::{CaseGroups, EvalReport, evaluate_groups};

/// Parse the Turtle ontology, split it, and write the corpus.
pub fn prepare_stage(config: &PipelineConfig) -> SecGraphResult<TripleCorpus> {
    let turtle = config.paths.turtle()?;
    let out = config.paths.corpus()?;
    config.split.ratios.validate()?;

    let triples = load_turtle(turtle)?;
    let corpus = split(triples, config.split.ratios, config.split.seed)?;
    corpus.save(out)?;
    Ok(corpus)
}

/// Train the KGE model on the corpus and write it.
pub fn train_stage(config: &PipelineConfig) -> SecGraphResult<TrainedModel> {
    let corpus_path = config.paths.corpus()?;
    let out = config.paths.model()?;
    config.training.validate()?;

    let corpus = TripleCorpus::load(corpus_path)?;
    let model = train(&corpus, &config.training)?;
    model.save(out)?;
    Ok(model)
}

/// Embed each label with the text model, keeping label order.
pub fn text_space<E: TextEmbedder + ?Sized>(labels: &[String], embedder: &E) -> SecGraphResult<EmbeddingSpace> {
    let vectors = embedder.embed_documents(labels)?;
    if vectors.len() != labels.len() {
        return Err(ServiceError::Parse {
            service: "embeddings",
            message: format!("expected {} embeddings, got {}", labels.len(), vectors.len()),
        }
        .into());
    }
    Ok(EmbeddingSpace::from_pairs(labels.iter().cloned().zip(vectors))?)
}

/// Entity and relation alignments of one model.
#[derive(Debug, Clone)]
pub struct AlignedModel {
    pub entities: Alignment,
    pub relations: Alignment,
}

/// Align both of a model's embedding spaces to the text-embedding space.
pub fn align_model<M, E>(model: &M, embedder: &E, projection: Projection) -> SecGraphResult<AlignedModel>
where
    M: KgeModel + ?Sized,
    E: TextEmbedder + ?Sized,
{
    let vocab = model.vocabulary();
    let entity_text = text_space(vocab.entities.labels(), embedder)?;
    let relation_text = text_space(vocab.relations.labels(), embedder)?;

    let entities = align(&model.entity_embeddings(), &entity_text, projection)?;
    let relations = align(&model.relation_embeddings(), &relation_text, projection)?;
    Ok(AlignedModel {
        entities,
        relations,
    })
}

/// Align the trained model and write both aligned spaces.
///
/// Nothing is written unless both alignments succeed, and the two files
/// land together or not at all.
pub fn align_stage<E: TextEmbedder + ?Sized>(config: &PipelineConfig, embedder: &E) -> SecGraphResult<AlignedModel> {
    let model_path = config.paths.model()?;
    let entities_out = config.paths.entity_embeddings()?;
    let relations_out = config.paths.relation_embeddings()?;

    let model = TrainedModel::load(model_path)?;
    let aligned = align_model(&model, embedder, config.retrieval.projection)?;

    let entities_json = artifact::encode_json(entities_out, &aligned.entities.space)?;
    let relations_json = artifact::encode_json(relations_out, &aligned.relations.space)?;
    artifact::write_all_atomic(&[
        (entities_out, entities_json.as_slice()),
        (relations_out, relations_json.as_slice()),
    ])?;
    tracing::info!(
        entities = %entities_out.display(),
        relations = %relations_out.display(),
        "aligned embedding spaces saved"
    );
    Ok(aligned)
}

/// Evaluate the trained model on already loaded case groups.
pub fn evaluate_stage(config: &PipelineConfig, groups: &CaseGroups) -> SecGraphResult<Vec<EvalReport>> {
    let model_path = config.paths.model()?;
    let model = TrainedModel::load(model_path)?;
    Ok(evaluate_groups(&model, groups))
}
