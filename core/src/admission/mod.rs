//! Admission of trade requests into the queue.
//!
//! A request is admitted only after the requester's previous entry has been
//! resolved, the record passed the tradeability, legality and trust gates,
//! and the queue store accepted it in a single check-and-insert.

mod handle;
mod prepare;

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;
use tracing::info;

pub use handle::SubmissionHandle;
pub use prepare::PreparedUnit;
pub use prepare::UnitFailure;
pub(crate) use prepare::UnitPipeline;

use crate::config::TradeConfig;
use crate::error::Rejection;
use crate::oracle::CheckCategory;
use crate::oracle::LegalityOracle;
use crate::oracle::LegalityReport;
use crate::oracle::OracleRunner;
use crate::queue::BatchInfo;
use crate::queue::ClearResult;
use crate::queue::EnqueueError;
use crate::queue::QueueRequest;
use crate::queue::QueueTicket;
use crate::queue::RequesterId;
use crate::queue::Significance;
use crate::queue::TradePayload;
use crate::queue::TradeQueue;
use crate::record::TradeRecord;
use crate::spam::AdNameFilter;
use crate::trade_codes::TradeCodeBook;

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: RequesterId,
    pub display_name: String,
    pub significance: Significance,
}

impl Requester {
    pub fn new(id: RequesterId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            significance: Significance::Regular,
        }
    }
}

/// Everything about a request besides the record itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionTicket {
    pub requester: Requester,
    pub code: u32,
    pub batch: Option<BatchInfo>,
    pub is_hidden: bool,
    pub ignore_auto_ot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionContent {
    /// A textual build specification.
    Text(String),
    /// A stored record file.
    Attachment(Bytes),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleSubmission {
    pub requester: Requester,
    /// Allocated from the code book when absent.
    pub code: Option<u32>,
    pub content: SubmissionContent,
    pub is_hidden: bool,
    pub ignore_auto_ot: bool,
}

pub struct AdmissionController<R: TradeRecord> {
    queue: Arc<TradeQueue<R>>,
    runner: OracleRunner<R>,
    pipeline: Arc<UnitPipeline<R>>,
    codes: Arc<TradeCodeBook>,
    config: TradeConfig,
    spam: Option<AdNameFilter>,
}

impl<R: TradeRecord> AdmissionController<R> {
    pub fn new(oracle: Arc<dyn LegalityOracle<R>>, config: TradeConfig) -> Self {
        let queue = Arc::new(TradeQueue::new(config.queue.capacity));
        Self::with_queue(oracle, config, queue)
    }

    /// Controller admitting into an existing queue store.
    pub fn with_queue(
        oracle: Arc<dyn LegalityOracle<R>>,
        config: TradeConfig,
        queue: Arc<TradeQueue<R>>,
    ) -> Self {
        let runner = OracleRunner::new(oracle, config.legality.timeout());
        let spam = config.trade.enable_spam_check.then(AdNameFilter::new);
        let pipeline = Arc::new(UnitPipeline::new(
            runner.clone(),
            config.legality.clone(),
            config.trade.default_held_item,
            spam.clone(),
        ));
        Self {
            queue,
            runner,
            pipeline,
            codes: Arc::new(TradeCodeBook::new(&config.trade)),
            config,
            spam,
        }
    }

    pub fn queue(&self) -> &Arc<TradeQueue<R>> {
        &self.queue
    }

    pub fn codes(&self) -> &TradeCodeBook {
        &self.codes
    }

    pub fn config(&self) -> &TradeConfig {
        &self.config
    }

    pub fn runner(&self) -> &OracleRunner<R> {
        &self.runner
    }

    pub(crate) fn pipeline(&self) -> &Arc<UnitPipeline<R>> {
        &self.pipeline
    }

    pub async fn clear_existing(&self, requester: RequesterId) -> ClearResult {
        self.queue.clear(requester).await
    }

    /// Drop the requester's queued entry so a new one can take its place.
    /// Fails when the worker is already handling it.
    pub(crate) async fn make_room_for(&self, requester: RequesterId) -> Result<(), Rejection> {
        match self.clear_existing(requester).await {
            ClearResult::Cleared => {
                debug!(requester, "replaced queued request");
                Ok(())
            }
            ClearResult::NotInQueue => Ok(()),
            ClearResult::CurrentlyProcessing => Err(Rejection::DuplicateRequester),
        }
    }

    /// Validate a single text or attachment submission and admit it.
    pub async fn submit_single(&self, submission: SingleSubmission) -> Result<QueueTicket, Rejection> {
        let SingleSubmission {
            requester,
            code,
            content,
            is_hidden,
            mut ignore_auto_ot,
        } = submission;
        self.make_room_for(requester.id).await?;

        let record = match content {
            SubmissionContent::Text(text) => {
                let unit = self
                    .pipeline
                    .prepare(&text, true)
                    .await
                    .map_err(|failure| failure.rejection)?;
                ignore_auto_ot |= unit.ignore_auto_ot;
                unit.record
            }
            SubmissionContent::Attachment(data) => {
                let record = R::decode(&data).ok_or(Rejection::Undecodable)?;
                if let Some(filter) = &self.spam
                    && let Some(matched) = filter.find_ad(record.core())
                {
                    return Err(Rejection::DisallowedContent { matched });
                }
                record
            }
        };

        let code = code.unwrap_or_else(|| self.codes.code_for(requester.id));
        let ticket = AdmissionTicket {
            requester,
            code,
            batch: None,
            is_hidden,
            ignore_auto_ot,
        };
        self.add_trade_to_queue(record, ticket).await
    }

    pub fn spawn_single(self: &Arc<Self>, submission: SingleSubmission) -> SubmissionHandle<QueueTicket> {
        let controller = Arc::clone(self);
        SubmissionHandle::spawn(async move { controller.submit_single(submission).await })
    }

    /// Run the tradeability, legality and trust gates on `record` and
    /// enqueue it.
    pub async fn add_trade_to_queue(
        &self,
        record: R,
        ticket: AdmissionTicket,
    ) -> Result<QueueTicket, Rejection> {
        if !record.can_be_traded() {
            return Err(Rejection::NotTradeable);
        }
        let species = self.runner.oracle().species_name(record.species());
        let on_oracle_error = |err| Rejection::from_oracle(err, &species);

        let (report, record) = self.runner.analyze(record).await.map_err(on_oracle_error)?;
        let (report, record) = if report.valid() {
            (report, record)
        } else {
            if !report.has_failure_in(CheckCategory::Memory) {
                return Err(invalid(&species, &report));
            }
            match self.recover_handler_memory(&record).await.map_err(on_oracle_error)? {
                Some(recovered) => recovered,
                None => return Err(invalid(&species, &report)),
            }
        };

        let core = record.core();
        let is_non_native = report.encounter_context != core.context || core.from_go;
        if is_non_native && self.config.legality.disallow_non_natives {
            return Err(Rejection::NonNative { species });
        }
        if self.config.legality.disallow_tracked && core.has_tracker() {
            return Err(Rejection::Tracked { species });
        }

        let AdmissionTicket {
            requester,
            code,
            batch,
            is_hidden,
            ignore_auto_ot,
        } = ticket;
        let mut request = QueueRequest::new(
            requester.id,
            code,
            requester.display_name,
            TradePayload::Single(record),
        );
        request.significance = requester.significance;
        request.flags.is_batch = batch.is_some();
        request.batch = batch;
        request.flags.is_hidden = is_hidden;
        request.flags.ignore_auto_ot = ignore_auto_ot;
        request.flags.is_non_native = is_non_native;
        self.enqueue(request).await
    }

    /// Records traded in before a handler memory existed fail the memory
    /// checks. Stamp the original trainer as current handler and retry.
    async fn recover_handler_memory(
        &self,
        record: &R,
    ) -> Result<Option<(LegalityReport, R)>, crate::oracle::OracleCallError> {
        let mut clone = record.clone();
        let language = clone.core().language;
        {
            let core = clone.core_mut();
            core.handling_trainer = core.original_trainer.clone();
        }
        if let Some(handling) = clone.handling_language_mut() {
            handling.set_handling_trainer_language(language);
        }
        clone.core_mut().current_handler = 1;

        let (report, clone) = self.runner.analyze(clone).await?;
        if report.valid() {
            info!(species = record.species(), "recovered record by assigning handler memory");
            Ok(Some((report, clone)))
        } else {
            Ok(None)
        }
    }

    /// Queue store insert, translating store errors into rejections.
    pub(crate) async fn enqueue(&self, request: QueueRequest<R>) -> Result<QueueTicket, Rejection> {
        self.queue.try_enqueue(request).await.map_err(|err| match err {
            EnqueueError::AlreadyQueued(_) => Rejection::DuplicateRequester,
            EnqueueError::Full { capacity } => Rejection::QueueFull { capacity },
        })
    }
}

fn invalid(species: &str, report: &LegalityReport) -> Rejection {
    Rejection::PostLegalityInvalid {
        species: species.to_string(),
        report: report.summary(),
    }
}
