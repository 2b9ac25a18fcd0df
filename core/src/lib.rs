//! Admission and pool management for a link-trade bot.
//!
//! Root of the `linktrade-core` library crate.

pub mod admission;
pub mod batch;
pub mod config;
pub mod error;
pub mod oracle;
pub mod pool;
pub mod queue;
pub mod record;
pub mod showdown;
pub mod spam;
pub mod trade_codes;

pub use admission::AdmissionController;
pub use admission::AdmissionTicket;
pub use admission::Requester;
pub use admission::SingleSubmission;
pub use admission::SubmissionContent;
pub use admission::SubmissionHandle;
pub use batch::BatchAccepted;
pub use batch::BatchAssembler;
pub use batch::BatchError;
pub use batch::BatchReport;
pub use config::TradeConfig;
pub use error::PoolError;
pub use error::Rejection;
pub use oracle::LegalityOracle;
pub use pool::PokemonPool;
pub use queue::ClearResult;
pub use queue::QueueTicket;
pub use queue::TradeQueue;
pub use record::TradeRecord;
