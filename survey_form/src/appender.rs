// Committing one response to the shared dataset with optimistic concurrency.

use log::{debug, info, warn};
use std::error::Error;
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use crate::record::{Dataset, DatasetErrors, ResponseRecord};
use crate::store::{DatasetStore, Fetched, StoreFailure};

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of fetch/write rounds, including the first one.
    pub max_attempts: u32,
    /// The pause before attempt n is (n - 1) * backoff.
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const DEFAULT_POLICY: RetryPolicy = RetryPolicy {
        max_attempts: 5,
        backoff: Duration::from_millis(200),
    };

    /// The pause before the given attempt (counted from 1). Saturates instead of
    /// overflowing on very large backoffs.
    pub fn pause_before(&self, attempt: u32) -> Duration {
        self.backoff
            .checked_mul(attempt.saturating_sub(1))
            .unwrap_or(Duration::MAX)
    }

    /// Retries without pausing. Mostly useful for tests and in-memory stores.
    pub fn immediate(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::DEFAULT_POLICY
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AppendOutcome {
    /// The dataset did not exist and was created with this record as its only row.
    Created,
    /// The record was added to the existing dataset, which now has `rows` rows.
    Appended { rows: usize },
    /// The record was already in the dataset: an earlier write went through even
    /// though it was not acknowledged.
    AlreadyPresent,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct AppendReport {
    pub outcome: AppendOutcome,
    pub attempts: u32,
}

/// The dataset before and after appending a record, without writing anything.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Preview {
    /// None if the dataset does not exist yet.
    pub before: Option<String>,
    pub after: String,
}

/// Errors that prevent a record from being committed.
///
/// In all cases, the record is left untouched for the caller to export it by other means.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AppendError {
    /// Other writers kept changing the dataset.
    PersistenceConflict { attempts: u32 },
    /// The store could not be reached, or refused the request.
    PersistenceUnavailable { attempts: u32, message: String },
    /// The current dataset cannot be read. It is left as is.
    MalformedDataset(DatasetErrors),
}

impl Error for AppendError {}

impl Display for AppendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppendError::PersistenceConflict { attempts } => write!(
                f,
                "the dataset was modified concurrently, gave up after {} attempts",
                attempts
            ),
            AppendError::PersistenceUnavailable { attempts, message } => write!(
                f,
                "the dataset store is unavailable after {} attempts: {}",
                attempts, message
            ),
            AppendError::MalformedDataset(e) => write!(f, "the current dataset is malformed: {}", e),
        }
    }
}

// What made an attempt fail, for the final error.
enum LastFailure {
    Conflict,
    Unavailable(String),
}

/// Appends records to the dataset of a store.
///
/// Each attempt reads the current content and its version, adds the record, and writes
/// the result back on the condition that the version did not change. A failed condition
/// starts a new attempt from a fresh read. The dataset is only created when the store
/// reports it as missing; a read that failed for any other reason is retried.
pub struct DurableAppender<S: DatasetStore> {
    store: S,
    policy: RetryPolicy,
}

impl<S: DatasetStore> DurableAppender<S> {
    pub fn new(store: S, policy: RetryPolicy) -> DurableAppender<S> {
        DurableAppender { store, policy }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn append(&self, record: &ResponseRecord) -> Result<AppendReport, AppendError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_failure = LastFailure::Conflict;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                let pause = self.policy.pause_before(attempt);
                if !pause.is_zero() {
                    thread::sleep(pause);
                }
            }
            debug!(
                "append: response {} attempt {}/{} on {}",
                record.response_id(),
                attempt,
                max_attempts,
                self.store.describe()
            );

            let res = match self.store.fetch() {
                Ok(Fetched::Missing) => {
                    let content = record.to_csv().map_err(AppendError::MalformedDataset)?;
                    self.store.create(&content).map(|_| AppendOutcome::Created)
                }
                Ok(Fetched::Found { content, version }) => {
                    let mut dataset =
                        Dataset::parse(&content).map_err(AppendError::MalformedDataset)?;
                    if dataset.contains_response(record.response_id()) {
                        info!(
                            "append: response {} is already in the dataset",
                            record.response_id()
                        );
                        return Ok(AppendReport {
                            outcome: AppendOutcome::AlreadyPresent,
                            attempts: attempt,
                        });
                    }
                    dataset.append(record);
                    let rows = dataset.len();
                    let updated = dataset.to_csv().map_err(AppendError::MalformedDataset)?;
                    self.store
                        .update(&updated, &version)
                        .map(|_| AppendOutcome::Appended { rows })
                }
                Err(e) => Err(e),
            };

            match res {
                Ok(outcome) => {
                    info!(
                        "append: response {} committed to {} ({:?}, attempt {})",
                        record.response_id(),
                        self.store.describe(),
                        outcome,
                        attempt
                    );
                    return Ok(AppendReport {
                        outcome,
                        attempts: attempt,
                    });
                }
                Err(StoreFailure::Stale) => {
                    warn!("append: attempt {}: the dataset changed, retrying", attempt);
                    last_failure = LastFailure::Conflict;
                }
                Err(StoreFailure::Vanished) => {
                    // Fetch again: only a store that reports the dataset as missing
                    // leads to a creation.
                    warn!(
                        "append: attempt {}: the dataset disappeared during the write, retrying",
                        attempt
                    );
                    last_failure = LastFailure::Conflict;
                }
                Err(StoreFailure::Unavailable(message)) => {
                    warn!("append: attempt {}: store unavailable: {}", attempt, message);
                    last_failure = LastFailure::Unavailable(message);
                }
                Err(StoreFailure::Rejected(message)) => {
                    warn!("append: attempt {}: store rejected the write: {}", attempt, message);
                    return Err(AppendError::PersistenceUnavailable {
                        attempts: attempt,
                        message,
                    });
                }
            }
        }
        Err(match last_failure {
            LastFailure::Conflict => AppendError::PersistenceConflict {
                attempts: max_attempts,
            },
            LastFailure::Unavailable(message) => AppendError::PersistenceUnavailable {
                attempts: max_attempts,
                message,
            },
        })
    }

    /// Computes what [DurableAppender::append] would write, with a single read.
    pub fn preview(&self, record: &ResponseRecord) -> Result<Preview, AppendError> {
        let fetched = self
            .store
            .fetch()
            .map_err(|e| AppendError::PersistenceUnavailable {
                attempts: 1,
                message: e.to_string(),
            })?;
        match fetched {
            Fetched::Missing => Ok(Preview {
                before: None,
                after: record.to_csv().map_err(AppendError::MalformedDataset)?,
            }),
            Fetched::Found { content, .. } => {
                let mut dataset =
                    Dataset::parse(&content).map_err(AppendError::MalformedDataset)?;
                if !dataset.contains_response(record.response_id()) {
                    dataset.append(record);
                }
                let after = dataset.to_csv().map_err(AppendError::MalformedDataset)?;
                Ok(Preview {
                    before: Some(content),
                    after,
                })
            }
        }
    }
}
