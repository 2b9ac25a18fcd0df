use tokio::task::JoinHandle;
use tracing::error;

use crate::error::Rejection;
use crate::oracle::panic_message;

/// A submission running as its own task.
#[derive(Debug)]
pub struct SubmissionHandle<T> {
    task: JoinHandle<Result<T, Rejection>>,
}

impl<T: Send + 'static> SubmissionHandle<T> {
    pub(crate) fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = Result<T, Rejection>> + Send + 'static,
    {
        Self {
            task: tokio::spawn(future),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the submission. A crash inside the task becomes
    /// [`Rejection::Fatal`].
    pub async fn outcome(self) -> Result<T, Rejection> {
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                let detail = panic_message(err);
                error!(detail = %detail, "submission task crashed");
                Err(Rejection::Fatal { detail })
            }
        }
    }
}
