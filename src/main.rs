//! secgraph CLI: graph-grounded question answering for security analysts.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};

use secgraph::align::Projection;
use secgraph::config::PipelineConfig;
use secgraph::context::{MatchMode, format_context, format_similarity_results};
use secgraph::embedding::kge::{ModelFamily, OptimizerKind};
use secgraph::embedding::text::OpenAiEmbedder;
use secgraph::evaluate::load_cases;
use secgraph::llm::OpenAiChat;
use secgraph::pipeline::AnswerPipeline;
use secgraph::pipeline::stages::{align_stage, evaluate_stage, prepare_stage, train_stage};

#[derive(Parser)]
#[command(name = "secgraph", version, about = "Graph-grounded question answering over a security knowledge base")]
struct Cli {
    /// TOML config file. Environment variables and flags override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Turtle ontology (KB_TURTLE_FILE_PATH).
    #[arg(long, global = true)]
    turtle: Option<PathBuf>,

    /// Split corpus artifact (KB_CORPUS_FILE_PATH).
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Trained model artifact (MODEL_PATH).
    #[arg(long, global = true)]
    model_path: Option<PathBuf>,

    /// Aligned entity embeddings (ENTITY_EMBEDDINGS_PATH).
    #[arg(long, global = true)]
    entity_embeddings: Option<PathBuf>,

    /// Aligned relation embeddings (RELATION_EMBEDDINGS_PATH).
    #[arg(long, global = true)]
    relation_embeddings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the Turtle ontology and write the train/valid/test corpus.
    Prepare {
        #[arg(long)]
        train_ratio: Option<f64>,
        #[arg(long)]
        valid_ratio: Option<f64>,
        /// Fixed shuffle seed for a reproducible split.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Train the knowledge-graph embedding model.
    Train {
        /// Model family (TransE, DistMult).
        #[arg(long)]
        model: Option<ModelFamily>,
        /// Optimizer (SGD, Adagrad).
        #[arg(long)]
        optimizer: Option<OptimizerKind>,
        #[arg(long)]
        dim: Option<usize>,
        #[arg(long)]
        epochs: Option<usize>,
        #[arg(long)]
        learning_rate: Option<f32>,
        #[arg(long)]
        batch_size: Option<usize>,
        #[arg(long)]
        negatives: Option<usize>,
    },

    /// Align the trained embeddings to the text-embedding space.
    Align {
        /// Add the fitted intercept when projecting.
        #[arg(long)]
        with_intercept: bool,
    },

    /// Answer a question from the knowledge graph.
    Ask {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        /// Match entities to triples by full URI instead of display name.
        #[arg(long)]
        full_uri: bool,
        /// Also print an answer generated without graph context.
        #[arg(long)]
        baseline: bool,
        /// Try a translated SPARQL query before embedding retrieval.
        #[arg(long)]
        graph: bool,
        /// Print the full answer record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show the entities and triples retrieved for a question.
    Retrieve {
        question: String,
        #[arg(long)]
        top_k: Option<usize>,
        #[arg(long)]
        full_uri: bool,
    },

    /// Rank known statements with the trained model (Hits@k, MRR).
    Evaluate {
        /// TOML file of named case groups.
        cases: PathBuf,
        /// Write one results_<group>.txt per group here.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the resolved configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(3)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set (e.g., in tests)

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = PipelineConfig::resolve(cli.config.as_deref())?;
    let paths = &mut config.paths;
    for (flag, slot) in [
        (cli.turtle, &mut paths.turtle),
        (cli.corpus, &mut paths.corpus),
        (cli.model_path, &mut paths.model),
        (cli.entity_embeddings, &mut paths.entity_embeddings),
        (cli.relation_embeddings, &mut paths.relation_embeddings),
    ] {
        if flag.is_some() {
            *slot = flag;
        }
    }

    match cli.command {
        Commands::Prepare {
            train_ratio,
            valid_ratio,
            seed,
        } => {
            if let Some(r) = train_ratio {
                config.split.ratios.train = r;
            }
            if let Some(r) = valid_ratio {
                config.split.ratios.valid = r;
            }
            config.split.seed = seed.or(config.split.seed);

            let corpus = prepare_stage(&config)?;
            println!(
                "Prepared {} triples (train {}, valid {}, test {})",
                corpus.len(),
                corpus.train.len(),
                corpus.valid.len(),
                corpus.test.len()
            );
        }

        Commands::Train {
            model,
            optimizer,
            dim,
            epochs,
            learning_rate,
            batch_size,
            negatives,
        } => {
            let t = &mut config.training;
            t.model = model.unwrap_or(t.model);
            t.optimizer = optimizer.unwrap_or(t.optimizer);
            t.embedding_dim = dim.unwrap_or(t.embedding_dim);
            t.epochs = epochs.unwrap_or(t.epochs);
            t.learning_rate = learning_rate.unwrap_or(t.learning_rate);
            t.batch_size = batch_size.unwrap_or(t.batch_size);
            t.negatives_per_positive = negatives.unwrap_or(t.negatives_per_positive);

            let model = train_stage(&config)?;
            println!("Trained {} model, final loss {:.6}", config.training.model, model.final_loss());
        }

        Commands::Align { with_intercept } => {
            if with_intercept {
                config.retrieval.projection = Projection::WithIntercept;
            }
            let embedder = OpenAiEmbedder::new(&config.service, &config.models.text_embedding)?;
            let aligned = align_stage(&config, &embedder)?;
            for (name, alignment) in [("entities", &aligned.entities), ("relations", &aligned.relations)] {
                println!(
                    "Aligned {} {name} ({} -> {} dims); {} only in model, {} only in text space",
                    alignment.coverage.aligned,
                    alignment.map.source_dim(),
                    alignment.map.target_dim(),
                    alignment.coverage.source_only.len(),
                    alignment.coverage.target_only.len()
                );
            }
        }

        Commands::Ask {
            question,
            top_k,
            full_uri,
            baseline,
            graph,
            json,
        } => {
            let r = &mut config.retrieval;
            r.top_k = top_k.unwrap_or(r.top_k);
            if full_uri {
                r.match_mode = MatchMode::FullUri;
            }
            r.with_baseline |= baseline;
            r.graph_query |= graph;
            config.validate()?;

            let embedder = OpenAiEmbedder::new(&config.service, &config.models.text_embedding)?;
            let chat = OpenAiChat::new(&config.service, &config.models.chat)?;
            let pipeline = AnswerPipeline::from_config(&config, Box::new(embedder), Box::new(chat))?;
            let answer = pipeline.answer(&question)?;

            if json {
                println!("{}", serde_json::to_string_pretty(&answer).into_diagnostic()?);
            } else {
                println!("{}\n", answer.text);
                if let Some(query) = &answer.graph_query {
                    println!("Graph query:\n{query}\n");
                } else {
                    println!("{}\n", format_similarity_results(&answer.retrieved));
                }
                println!("{}", format_context(&answer.context));
                if let Some(baseline) = &answer.baseline {
                    println!("\nWithout graph context:\n{baseline}");
                }
            }
        }

        Commands::Retrieve {
            question,
            top_k,
            full_uri,
        } => {
            config.retrieval.top_k = top_k.unwrap_or(config.retrieval.top_k);
            if full_uri {
                config.retrieval.match_mode = MatchMode::FullUri;
            }
            config.validate()?;

            let embedder = OpenAiEmbedder::new(&config.service, &config.models.text_embedding)?;
            let chat = OpenAiChat::new(&config.service, &config.models.chat)?;
            let pipeline = AnswerPipeline::from_config(&config, Box::new(embedder), Box::new(chat))?;
            let hits = pipeline.retrieve(&question)?;
            let groups = secgraph::context::assemble_scored(&hits, pipeline.corpus(), config.retrieval.match_mode);
            println!("{}\n", format_similarity_results(&hits));
            println!("{}", format_context(&groups));
        }

        Commands::Evaluate { cases, out_dir } => {
            let groups = load_cases(&cases)?;
            let reports = evaluate_stage(&config, &groups)?;
            for report in &reports {
                let text = report.render(groups.get(&report.group).map(Vec::as_slice).unwrap_or(&[]));
                match &out_dir {
                    Some(dir) => {
                        std::fs::create_dir_all(dir).into_diagnostic()?;
                        let path = dir.join(format!("results_{}.txt", report.group));
                        std::fs::write(&path, text).into_diagnostic()?;
                        println!("{} results saved to {}", report.group, path.display());
                    }
                    None => println!("{text}"),
                }
            }
        }

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config).into_diagnostic()?);
        }
    }

    Ok(())
}
