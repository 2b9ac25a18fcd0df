//! Interface to the external legality engine.
//!
//! The engine is a black box: it synthesizes records from textual build
//! specifications and judges existing records. Calls may be slow, so the
//! core always runs them on the blocking pool behind a timeout (see
//! [`OracleRunner`]).

use std::sync::Arc;
use std::time::Duration;

use crate::record::EntityContext;
use crate::record::Language;
use crate::record::TradeRecord;
use crate::showdown::BuildSpec;

/// Category a single legality check belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckCategory {
    Encounter,
    Memory,
    Moves,
    Trainer,
    Ribbon,
    Misc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub category: CheckCategory,
    pub valid: bool,
    pub comment: String,
}

impl CheckResult {
    pub fn pass(category: CheckCategory) -> Self {
        Self {
            category,
            valid: true,
            comment: String::new(),
        }
    }

    pub fn fail(category: CheckCategory, comment: impl Into<String>) -> Self {
        Self {
            category,
            valid: false,
            comment: comment.into(),
        }
    }
}

/// Outcome of analyzing one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegalityReport {
    pub results: Vec<CheckResult>,
    /// Context of the matched original encounter.
    pub encounter_context: EntityContext,
}

impl LegalityReport {
    pub fn valid(&self) -> bool {
        self.results.iter().all(|r| r.valid)
    }

    pub fn has_failure_in(&self, category: CheckCategory) -> bool {
        self.results
            .iter()
            .any(|r| !r.valid && r.category == category)
    }

    /// Human readable list of failed checks.
    pub fn summary(&self) -> String {
        let lines: Vec<String> = self
            .results
            .iter()
            .filter(|r| !r.valid)
            .map(|r| format!("Invalid: {:?}: {}", r.category, r.comment))
            .collect();
        if lines.is_empty() {
            "Legal!".to_string()
        } else {
            lines.join("\n")
        }
    }
}

/// Trainer data the engine stamps onto generated records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainerProfile {
    pub name: String,
    pub tid16: u16,
    pub sid16: u16,
    pub language: Language,
}

/// Result of asking the engine to synthesize a record.
#[derive(Debug, Clone)]
pub enum Legalization<R> {
    Generated(R),
    /// The engine produced nothing valid. `attempt` is its best effort, if any.
    Failed { attempt: Option<R> },
    Timeout,
    VersionMismatch,
}

pub trait LegalityOracle<R: TradeRecord>: Send + Sync + 'static {
    /// Resolve a species name (any supported language) to its national id.
    fn species_id(&self, name: &str) -> Option<u16>;

    /// English species name, used in messages.
    fn species_name(&self, species: u16) -> String;

    fn legalize(&self, spec: &BuildSpec, trainer: &TrainerProfile) -> Legalization<R>;

    fn analyze(&self, record: &R) -> LegalityReport;

    /// Suggestion explaining why `spec` could not be legalized.
    fn legalization_hint(
        &self,
        _spec: &BuildSpec,
        _trainer: &TrainerProfile,
        _attempt: Option<&R>,
    ) -> Option<String> {
        None
    }

    /// Guess the language a build specification was written in.
    fn detect_language(&self, _text: &str) -> Option<Language> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleCallError {
    #[error("legality engine did not answer within {0:?}")]
    Timeout(Duration),
    #[error("legality engine crashed: {0}")]
    Crashed(String),
}

/// Runs oracle calls on the blocking pool, bounded by the generation timeout.
pub struct OracleRunner<R: TradeRecord> {
    oracle: Arc<dyn LegalityOracle<R>>,
    timeout: Duration,
}

impl<R: TradeRecord> Clone for OracleRunner<R> {
    fn clone(&self) -> Self {
        Self {
            oracle: Arc::clone(&self.oracle),
            timeout: self.timeout,
        }
    }
}

impl<R: TradeRecord> OracleRunner<R> {
    pub fn new(oracle: Arc<dyn LegalityOracle<R>>, timeout: Duration) -> Self {
        Self { oracle, timeout }
    }

    pub fn oracle(&self) -> &dyn LegalityOracle<R> {
        self.oracle.as_ref()
    }

    pub async fn legalize(
        &self,
        spec: BuildSpec,
        trainer: TrainerProfile,
    ) -> Result<(Legalization<R>, BuildSpec, TrainerProfile), OracleCallError> {
        self.run(move |oracle| {
            let outcome = oracle.legalize(&spec, &trainer);
            (outcome, spec, trainer)
        })
        .await
    }

    pub async fn analyze(&self, record: R) -> Result<(LegalityReport, R), OracleCallError> {
        self.run(move |oracle| (oracle.analyze(&record), record))
            .await
    }

    /// Legalization hint for a failed request. A slow or crashing engine
    /// simply yields no hint.
    pub async fn hint(
        &self,
        spec: BuildSpec,
        trainer: TrainerProfile,
        attempt: Option<R>,
    ) -> Option<String> {
        self.run(move |oracle| oracle.legalization_hint(&spec, &trainer, attempt.as_ref()))
            .await
            .ok()
            .flatten()
    }

    async fn run<T, F>(&self, call: F) -> Result<T, OracleCallError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn LegalityOracle<R>) -> T + Send + 'static,
    {
        let oracle = Arc::clone(&self.oracle);
        let task = tokio::task::spawn_blocking(move || call(oracle.as_ref()));
        match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join_err)) => Err(OracleCallError::Crashed(panic_message(join_err))),
            Err(_) => Err(OracleCallError::Timeout(self.timeout)),
        }
    }
}

pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "task panicked".to_string()
    }
}
