//! Configuration conversion utilities for CLI arguments

use crate::cli::main_impl::Cli;
use crate::{
    config::{ClassifierConfig, LoadFailurePolicy},
    models::ArtifactSource,
    utils::{ExecutionProviderManager, NumericValidator},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to a `ClassifierConfig`
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Build the classifier configuration
    ///
    /// `MRI_CLASSIFY_*` environment variables seed the configuration; flags
    /// given on the command line take precedence.
    pub(crate) fn from_cli(cli: &Cli) -> Result<ClassifierConfig> {
        let base = ClassifierConfig::from_env().context("Invalid MRI_CLASSIFY_* environment")?;
        Self::apply(cli, base)
    }

    pub(crate) fn apply(cli: &Cli, base: ClassifierConfig) -> Result<ClassifierConfig> {
        let mut builder = base.into_builder();

        if let Some(dir) = &cli.model_dir {
            builder = builder.model_dir(ArtifactSource::parse(dir));
        }
        if let Some(model) = &cli.model {
            builder = builder.model(ArtifactSource::parse(model));
        }
        if let Some(labels) = &cli.labels {
            builder = builder.labels(ArtifactSource::parse(labels));
        }
        if let Some(provider) = &cli.execution_provider {
            let (backend_type, execution_provider) =
                ExecutionProviderManager::parse_provider_string(provider)
                    .context("Invalid execution provider format")?;
            builder = builder
                .backend_type(backend_type)
                .execution_provider(execution_provider);
        }
        if cli.threads > 0 {
            builder = builder.num_threads(cli.threads);
        }
        if let Some(path) = &cli.prediction_log {
            builder = builder.prediction_log(path.clone());
        }
        if let Some(dir) = &cli.cache_dir {
            builder = builder.artifact_cache_dir(dir.clone());
        }
        if cli.sticky_load_failures {
            builder = builder.load_failure_policy(LoadFailurePolicy::Sticky);
        }

        builder.build().context("Invalid configuration")
    }

    /// Validate CLI arguments for consistency
    pub(crate) fn validate_cli(cli: &Cli) -> Result<()> {
        if let Some(provider) = &cli.execution_provider {
            ExecutionProviderManager::parse_provider_string(provider)
                .context("Invalid execution provider format")?;
        }

        NumericValidator::validate_thread_count(cli.threads).context("Invalid --threads")?;
        NumericValidator::validate_concurrency(cli.jobs).context("Invalid --jobs")?;

        if let Some(pattern) = &cli.pattern {
            glob::Pattern::new(pattern)
                .with_context(|| format!("Invalid --pattern '{}'", pattern))?;
        }

        if cli.input.len() > 1 && cli.input.iter().any(|input| input == "-") {
            anyhow::bail!("stdin (-) cannot be combined with other inputs");
        }

        Ok(())
    }
}
