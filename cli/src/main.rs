//! `qsim` command-line entry point.
//!
//! Loads a question corpus, builds the similarity index, and prints results
//! as JSON on stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use qsim_engine::{EmbeddingProviderType, EngineConfig, FindOptions, SimilarityEngine};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qsim")]
#[command(about = "Find similar and duplicate questions in a question corpus")]
#[command(version)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Corpus file to load (replaces the configured search paths)
    #[arg(long, global = true)]
    corpus: Option<PathBuf>,

    /// Embedding provider to use
    #[arg(long, value_enum, global = true)]
    provider: Option<ProviderArg>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the corpus for questions similar to QUESTION
    Search {
        /// The question to check
        question: String,

        /// Minimum cosine similarity
        #[arg(long)]
        threshold: Option<f32>,

        /// Maximum number of results
        #[arg(long)]
        top_k: Option<usize>,

        /// Keep exact matches in the result list
        #[arg(long)]
        include_exact: bool,
    },

    /// Print index statistics
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderArg {
    Hashing,
    OpenAi,
}

impl From<ProviderArg> for EmbeddingProviderType {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Hashing => EmbeddingProviderType::Hashing,
            ProviderArg::OpenAi => EmbeddingProviderType::OpenAI,
        }
    }
}

impl Cli {
    /// Resolve the engine configuration from the config file and overrides.
    fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };

        if let Some(corpus) = &self.corpus {
            config.corpus_paths = vec![corpus.clone()];
        }
        if let Some(provider) = self.provider {
            config.embedding.provider = provider.into();
        }

        Ok(config)
    }
}

fn find_options(
    config: &EngineConfig,
    threshold: Option<f32>,
    top_k: Option<usize>,
    include_exact: bool,
) -> FindOptions {
    let mut options = FindOptions::from(&config.search);
    if let Some(threshold) = threshold {
        options = options.with_threshold(threshold);
    }
    if let Some(top_k) = top_k {
        options = options.with_top_k(top_k);
    }
    if include_exact {
        options = options.with_exclude_exact(false);
    }
    options
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.engine_config()?;
    let engine = SimilarityEngine::from_config(&config).await;

    match cli.command {
        Command::Search {
            question,
            threshold,
            top_k,
            include_exact,
        } => {
            let options = find_options(&config, threshold, top_k, include_exact);
            let result = engine.find_similar(&question, options).await;
            if let Some(reason) = result.degraded {
                tracing::warn!("Search degraded: {reason:?}");
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Stats => {
            let stats = engine.stats().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "qsim",
            "search",
            "What is 2+2?",
            "--threshold",
            "0.5",
            "--top-k",
            "3",
            "--include-exact",
            "--provider",
            "open-ai",
        ])
        .unwrap();

        assert_eq!(cli.provider, Some(ProviderArg::OpenAi));
        match cli.command {
            Command::Search {
                question,
                threshold,
                top_k,
                include_exact,
            } => {
                assert_eq!(question, "What is 2+2?");
                assert_eq!(threshold, Some(0.5));
                assert_eq!(top_k, Some(3));
                assert!(include_exact);
            }
            Command::Stats => panic!("expected search"),
        }
    }

    #[test]
    fn test_overrides_apply_to_config() {
        let cli = Cli::try_parse_from([
            "qsim",
            "--corpus",
            "bank.json",
            "--provider",
            "hashing",
            "stats",
        ])
        .unwrap();

        let config = cli.engine_config().unwrap();
        assert_eq!(config.corpus_paths, vec![PathBuf::from("bank.json")]);
        assert_eq!(config.embedding.provider, EmbeddingProviderType::Hashing);
    }

    #[test]
    fn test_find_options_defaults_from_config() {
        let config = EngineConfig::default();

        let options = find_options(&config, None, None, false);
        assert_eq!(options, FindOptions::from(&config.search));

        let options = find_options(&config, Some(0.3), Some(2), true);
        assert_eq!(options.threshold, 0.3);
        assert_eq!(options.top_k, 2);
        assert!(!options.exclude_exact);
    }
}
