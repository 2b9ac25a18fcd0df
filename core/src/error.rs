use thiserror::Error;

use crate::oracle::OracleCallError;

/// Why a submission was not admitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Unable to parse the build specification: {reason}")]
    ParseFailure { reason: String },
    #[error("That {species} set took too long to generate.")]
    OracleTimeout { species: String },
    #[error("Legality engine and generation plugin versions do not match.")]
    OracleVersionMismatch,
    #[error("Unable to create a legal {species} from that set.{}", hint_suffix(.hint))]
    OracleGenerationFailure {
        species: String,
        hint: Option<String>,
    },
    #[error("{species} is not legal. {report}")]
    PostLegalityInvalid { species: String, report: String },
    #[error("Provided record cannot be traded.")]
    NotTradeable,
    #[error("{species} is not native to this game.")]
    NonNative { species: String },
    #[error("{species} carries a HOME tracker.")]
    Tracked { species: String },
    #[error("Detected advertisement in the trainer or nickname ({matched}), which is not allowed.")]
    DisallowedContent { matched: String },
    #[error("You are already in the queue.")]
    DuplicateRequester,
    #[error("The queue is full ({capacity} entries).")]
    QueueFull { capacity: usize },
    #[error("Batch trades require at least two sets.")]
    BatchTooSmall,
    #[error("You can only trade up to {max} records in a batch.")]
    BatchTooLarge { max: usize },
    #[error("Batch trades are currently disabled.")]
    BatchDisabled,
    #[error("{report}")]
    BatchFailed { report: String },
    #[error("Attachment is not a valid record for this game.")]
    Undecodable,
    #[error("A fatal error occurred while processing the request: {detail}")]
    Fatal { detail: String },
}

fn hint_suffix(hint: &Option<String>) -> String {
    match hint {
        Some(hint) => format!(" Hint: {hint}"),
        None => String::new(),
    }
}

impl Rejection {
    /// Map a failed oracle call for `species` onto the rejection taxonomy.
    pub(crate) fn from_oracle(err: OracleCallError, species: &str) -> Self {
        match err {
            OracleCallError::Timeout(_) => Rejection::OracleTimeout {
                species: species.to_string(),
            },
            OracleCallError::Crashed(detail) => Rejection::Fatal { detail },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("the pool holds no records")]
    CorpusEmpty,
    #[error("the pool holds no record eligible for surprise trades")]
    CorpusExhausted,
}
