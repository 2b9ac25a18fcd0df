//! Batch submissions: several build specifications traded in one session.
//!
//! Every unit runs through the unit pipeline as its own task. Failed units
//! are collected into a report; the successful ones are queued together as a
//! single entry.

use std::sync::Arc;

use futures::future::join_all;
use linktrade_utils_string::strip_code_fence;
use linktrade_utils_string::truncate_with_ellipsis;
use tracing::error;
use tracing::info;

use crate::admission::AdmissionController;
use crate::admission::Requester;
use crate::admission::SubmissionHandle;
use crate::admission::UnitFailure;
use crate::error::Rejection;
use crate::oracle::panic_message;
use crate::queue::BatchInfo;
use crate::queue::QueueRequest;
use crate::queue::QueueTicket;
use crate::queue::TradePayload;
use crate::record::TradeRecord;

const BATCH_SEPARATORS: [&str; 2] = ["---", "—-"];
const MAX_BLOCK_CHARS: usize = 1024;

/// Split a bundle into trimmed, non-empty units.
pub fn split_bundle(bundle: &str) -> Vec<String> {
    let mut units = vec![bundle.to_string()];
    for separator in BATCH_SEPARATORS {
        units = units
            .iter()
            .flat_map(|unit| unit.split(separator))
            .map(str::to_string)
            .collect();
    }
    units
        .into_iter()
        .map(|unit| unit.trim().to_string())
        .filter(|unit| !unit.is_empty())
        .collect()
}

/// Why one unit of a batch produced no record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    /// 1-based position in the bundle.
    pub index: usize,
    pub species: String,
    pub message: String,
    pub hint: Option<String>,
    pub preview: String,
}

impl BatchError {
    fn from_failure(index: usize, failure: UnitFailure) -> Self {
        Self {
            index,
            message: failure.message(),
            hint: failure.hint().map(str::to_string),
            species: failure.species,
            preview: failure.preview,
        }
    }

    fn crash(index: usize, unit: String, detail: String) -> Self {
        Self {
            index,
            species: "Crash".to_string(),
            message: "A fatal error occurred while parsing this set.".to_string(),
            hint: Some(detail),
            preview: unit,
        }
    }

    fn render(&self) -> String {
        let preview = if self.preview.is_empty() {
            "No data".to_string()
        } else {
            self.preview.lines().take(2).collect::<Vec<_>>().join(" | ")
        };
        let mut body = format!("Error: {}", self.message);
        if let Some(hint) = self.hint.as_deref().filter(|h| !h.is_empty()) {
            body.push_str(&format!("\nHint: {hint}"));
        }
        body.push_str(&format!("\nSet Preview: {preview}"));
        format!(
            "Trade #{} - {}\n{}",
            self.index,
            self.species,
            truncate_with_ellipsis(&body, MAX_BLOCK_CHARS)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Number of units in the bundle.
    pub total: usize,
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} out of {} trades failed to process.",
            self.errors.len(),
            self.total
        );
        for err in &self.errors {
            out.push_str("\n\n");
            out.push_str(&err.render());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAccepted {
    pub ticket: QueueTicket,
    /// Present when some units failed.
    pub report: Option<BatchReport>,
}

pub struct BatchAssembler<R: TradeRecord> {
    controller: Arc<AdmissionController<R>>,
}

impl<R: TradeRecord> BatchAssembler<R> {
    pub fn new(controller: Arc<AdmissionController<R>>) -> Self {
        Self { controller }
    }

    pub async fn submit_batch(
        &self,
        requester: Requester,
        code: Option<u32>,
        bundle: &str,
    ) -> Result<BatchAccepted, Rejection> {
        let controller = &self.controller;
        controller.make_room_for(requester.id).await?;

        let units = split_bundle(&strip_code_fence(bundle));
        if units.len() < 2 {
            return Err(Rejection::BatchTooSmall);
        }
        let max = controller
            .config()
            .trade
            .batch_ceiling()
            .ok_or(Rejection::BatchDisabled)?;
        if units.len() > max {
            return Err(Rejection::BatchTooLarge { max });
        }
        let total = units.len();

        let tasks: Vec<_> = units
            .iter()
            .map(|unit| {
                let pipeline = Arc::clone(controller.pipeline());
                let unit = unit.clone();
                tokio::spawn(async move { pipeline.prepare(&unit, false).await })
            })
            .collect();

        // join_all keeps submission order, so results line up with `units`.
        let mut records = Vec::new();
        let mut ignore_auto_ot = false;
        let mut errors = Vec::new();
        for (i, (outcome, unit)) in join_all(tasks).await.into_iter().zip(units).enumerate() {
            let index = i + 1;
            match outcome {
                Ok(Ok(prepared)) => {
                    ignore_auto_ot |= prepared.ignore_auto_ot;
                    records.push(prepared.record);
                }
                Ok(Err(failure)) => errors.push(BatchError::from_failure(index, failure)),
                Err(join_err) => {
                    let detail = panic_message(join_err);
                    error!(unit = index, input = %unit, detail = %detail, "batch unit crashed");
                    errors.push(BatchError::crash(index, unit, detail));
                }
            }
        }

        let report = BatchReport { total, errors };
        if records.is_empty() {
            return Err(Rejection::BatchFailed {
                report: report.render(),
            });
        }
        info!(
            requester = requester.id,
            accepted = records.len(),
            failed = report.errors.len(),
            "batch assembled"
        );

        let code = code.unwrap_or_else(|| controller.codes().code_for(requester.id));
        let mut request = QueueRequest::new(
            requester.id,
            code,
            requester.display_name,
            TradePayload::Batch(records),
        );
        request.significance = requester.significance;
        request.batch = Some(BatchInfo { index: 1, total });
        request.flags.is_batch = true;
        request.flags.ignore_auto_ot = ignore_auto_ot;
        let ticket = controller.enqueue(request).await?;

        Ok(BatchAccepted {
            ticket,
            report: (!report.errors.is_empty()).then_some(report),
        })
    }

    pub fn spawn_batch(
        self: &Arc<Self>,
        requester: Requester,
        code: Option<u32>,
        bundle: String,
    ) -> SubmissionHandle<BatchAccepted> {
        let assembler = Arc::clone(self);
        SubmissionHandle::spawn(async move { assembler.submit_batch(requester, code, &bundle).await })
    }
}
