use std::fmt;

use thiserror::Error;

use crate::{
    configuration::StructuringFailurePolicy,
    dal::context_store::{ContextStore, StoreError},
    domain::{context::Context, source::SourceDescriptor, structured::normalize},
};

use super::{BrowserSession, PageExtractor, Structurer, StructuringError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("structuring failed for source `{source_name}`: {source}")]
    Structuring {
        source_name: String,
        #[source]
        source: StructuringError,
    },
    #[error("could not persist source `{source_name}`: {source}")]
    Store {
        source_name: String,
        #[source]
        source: StoreError,
    },
}

/// Where a single source ended up in one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    /// Already flagged as scraped by an earlier run.
    Skipped,
    /// Nothing usable came out of the page. Retried on the next run.
    ExtractFailed(String),
    /// Only produced with [`StructuringFailurePolicy::SkipSource`].
    StructuringFailed(String),
    /// Result stored and flagged. `parsed` is false for a raw-output fallback.
    Saved { parsed: bool },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub outcomes: Vec<(String, SourceOutcome)>,
}

impl RunSummary {
    fn count(&self, f: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| f(o)).count()
    }

    pub fn saved(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Saved { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| {
            matches!(
                o,
                SourceOutcome::ExtractFailed(_) | SourceOutcome::StructuringFailed(_)
            )
        })
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} saved, {} skipped, {} failed",
            self.saved(),
            self.skipped(),
            self.failed()
        )
    }
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sources: Vec<SourceDescriptor>,
    pub on_structuring_failure: StructuringFailurePolicy,
}

pub struct Pipeline<T> {
    config: PipelineConfig,
    structurer: T,
    store: ContextStore,
}

impl<T: Structurer> Pipeline<T> {
    pub fn new(config: PipelineConfig, structurer: T, store: ContextStore) -> Self {
        Pipeline {
            config,
            structurer,
            store,
        }
    }

    /// Processes every source once, in list order.
    ///
    /// With [`StructuringFailurePolicy::AbortRun`] a structuring failure
    /// returns early and the remaining sources are left for the next run.
    /// Extraction failures never stop the run.
    pub async fn run<S: BrowserSession>(
        &self,
        extractor: &mut PageExtractor<S>,
        context: &mut Context,
    ) -> Result<RunSummary, PipelineError> {
        let mut summary = RunSummary::default();

        for source in &self.config.sources {
            log::info!("--- Processing source: {} ---", source.name);
            let outcome = self.process_source(extractor, context, source).await?;
            summary.outcomes.push((source.name.clone(), outcome));
        }

        log::info!("Run finished: {}", summary);
        Ok(summary)
    }

    /// Like [`Pipeline::run`], then closes the browser session whatever the
    /// run returned. A failed close is logged and does not mask the run result.
    pub async fn run_and_close<S: BrowserSession>(
        &self,
        extractor: &mut PageExtractor<S>,
        context: &mut Context,
    ) -> Result<RunSummary, PipelineError> {
        let outcome = self.run(extractor, context).await;
        if let Err(e) = extractor.close().await {
            log::error!("Failed to close browser session: {}", e);
        }
        outcome
    }

    pub async fn process_source<S: BrowserSession>(
        &self,
        extractor: &mut PageExtractor<S>,
        context: &mut Context,
        source: &SourceDescriptor,
    ) -> Result<SourceOutcome, PipelineError> {
        if context.was_scraped(&source.name) {
            log::info!(
                "'{}' ({}) was already scraped, skipping",
                source.name,
                source.url
            );
            return Ok(SourceOutcome::Skipped);
        }

        let text = match extractor.extract(source).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                log::error!(
                    "No content extracted for '{}' on {}, not marking as scraped",
                    source.name,
                    source.url
                );
                return Ok(SourceOutcome::ExtractFailed("empty content".to_string()));
            }
            Err(e) => {
                log::error!(
                    "Extraction failed for '{}' on {}: {}. Not marking as scraped",
                    source.name,
                    source.url,
                    e
                );
                return Ok(SourceOutcome::ExtractFailed(e.to_string()));
            }
        };

        log::info!("Text extraction complete, structuring '{}'", source.name);
        let raw = match self.structurer.structure(&text).await {
            Ok(raw) => raw,
            Err(e) => match self.config.on_structuring_failure {
                StructuringFailurePolicy::AbortRun => {
                    return Err(PipelineError::Structuring {
                        source_name: source.name.clone(),
                        source: e,
                    })
                }
                StructuringFailurePolicy::SkipSource => {
                    log::error!("Structuring failed for '{}': {}", source.name, e);
                    return Ok(SourceOutcome::StructuringFailed(e.to_string()));
                }
            },
        };
        log::debug!("Structuring output for '{}':\n{}", source.name, raw);

        let result = normalize(&raw);
        let parsed = result.is_parsed();
        if !parsed {
            log::warn!(
                "Structuring output for '{}' is not json, storing it as raw_output",
                source.name
            );
        }

        context.complete(&source.name, result.into_value());
        self.store.save(context).map_err(|e| PipelineError::Store {
            source_name: source.name.clone(),
            source: e,
        })?;
        log::info!("Saved '{}' to {}", source.name, self.store.path().display());

        Ok(SourceOutcome::Saved { parsed })
    }
}
