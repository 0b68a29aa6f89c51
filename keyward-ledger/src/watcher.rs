// SPDX-FileCopyrightText: © 2026 PrivKey LLC
// SPDX-License-Identifier: AGPL-3.0-or-later

#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::LedgerClient;
use crate::error::{LedgerError, Result};
use crate::manager::TransactionStateManager;
use crate::state::TransactionStatus;

#[derive(Debug, Clone, Copy)]
pub struct WatcherConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Executed or sealed.
    Finished(TransactionStatus),
    Failed(String),
    /// No final status before the timeout.
    Expired,
}

impl WatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, WatchOutcome::Finished(_))
    }

    /// The final status of transaction `id`, or `TransactionFailed` when it
    /// failed or expired.
    pub fn into_result(self, id: &str) -> Result<TransactionStatus> {
        let message = match self {
            WatchOutcome::Finished(status) => return Ok(status),
            WatchOutcome::Failed(message) => message,
            WatchOutcome::Expired => "no final status before the watch timed out".to_string(),
        };
        Err(LedgerError::TransactionFailed {
            id: id.to_string(),
            message,
        })
    }
}

/// Polls one transaction until execution finishes and reports once.
pub struct Watcher {
    client: Arc<dyn LedgerClient>,
    manager: Option<TransactionStateManager>,
    config: WatcherConfig,
}

impl Watcher {
    pub fn new(client: Arc<dyn LedgerClient>, config: WatcherConfig) -> Self {
        Self {
            client,
            manager: None,
            config,
        }
    }

    /// Also feeds every observed status into `manager`.
    pub fn with_manager(mut self, manager: TransactionStateManager) -> Self {
        self.manager = Some(manager);
        self
    }

    /// Must be called inside a tokio runtime. `callback` runs at most once;
    /// it does not run if the handle is dropped first.
    pub fn watch<F>(self, id: &str, callback: F) -> WatchHandle
    where
        F: FnOnce(WatchOutcome) + Send + 'static,
    {
        let id = id.to_string();
        let task = tokio::spawn(async move {
            let outcome = self.run(&id).await;
            info!(id = %id, outcome = ?outcome, "watch finished");
            callback(outcome);
        });
        WatchHandle { task: Some(task) }
    }

    /// Polls `id` to completion on the current task.
    pub async fn wait(self, id: &str) -> Result<TransactionStatus> {
        self.run(id).await.into_result(id)
    }

    async fn run(&self, id: &str) -> WatchOutcome {
        match tokio::time::timeout(self.config.timeout, self.poll_until_finished(id)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(id, "transaction watch expired");
                WatchOutcome::Expired
            }
        }
    }

    async fn poll_until_finished(&self, id: &str) -> WatchOutcome {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let result = match self.client.get_transaction_status(id).await {
                Ok(result) => result,
                Err(e) if e.is_transient() => {
                    debug!(id, error = %e, "status poll failed, retrying");
                    continue;
                }
                Err(e) => {
                    warn!(id, error = %e, "status poll rejected");
                    return WatchOutcome::Failed(e.to_string());
                }
            };
            if let Some(manager) = &self.manager {
                manager.apply_result(id, &result);
            }
            match result.status {
                TransactionStatus::Pending => {}
                TransactionStatus::Error => {
                    return WatchOutcome::Failed(
                        result
                            .error_message
                            .unwrap_or_else(|| "transaction failed".to_string()),
                    )
                }
                status => return WatchOutcome::Finished(status),
            }
        }
    }
}

/// Cancels the watch when dropped.
#[must_use = "the watch is cancelled when the handle is dropped"]
pub struct WatchHandle {
    task: Option<JoinHandle<()>>,
}

impl WatchHandle {
    pub fn cancel(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Waits for the callback to have run, or for cancellation.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use crate::state::TransactionResult;
    use parking_lot::Mutex;

    fn watcher(ledger: Arc<MemoryLedger>, timeout: Duration) -> Watcher {
        Watcher::new(
            ledger,
            WatcherConfig {
                poll_interval: Duration::from_secs(1),
                timeout,
            },
        )
    }

    fn recorder() -> (Arc<Mutex<Vec<WatchOutcome>>>, impl FnOnce(WatchOutcome) + Send) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        (seen, move |o| sink.lock().push(o))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_after_transient_failures() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.script(
            "tx",
            vec![
                TransactionResult::new(TransactionStatus::Pending),
                TransactionResult::new(TransactionStatus::Executed),
            ],
        );
        ledger.fail_status_queries(3);
        let (seen, callback) = recorder();

        let handle = watcher(ledger.clone(), Duration::from_secs(60)).watch("tx", callback);
        handle.join().await;

        assert_eq!(
            *seen.lock(),
            vec![WatchOutcome::Finished(TransactionStatus::Executed)]
        );
        let calls = ledger.status_calls();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(ledger.status_calls(), calls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_status_reports_message() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.script("tx", vec![TransactionResult::error("out of gas")]);
        let (seen, callback) = recorder();
        watcher(ledger, Duration::from_secs(60))
            .watch("tx", callback)
            .join()
            .await;
        assert_eq!(*seen.lock(), vec![WatchOutcome::Failed("out of gas".into())]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_query_fails_without_retrying() {
        let ledger = Arc::new(MemoryLedger::new());
        let (seen, callback) = recorder();
        watcher(ledger.clone(), Duration::from_secs(60))
            .watch("never-submitted", callback)
            .join()
            .await;
        assert_eq!(
            *seen.lock(),
            vec![WatchOutcome::Failed(
                "Transaction not found: never-submitted".into()
            )]
        );
        assert_eq!(ledger.status_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_reports_failure_with_id() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.script("tx", vec![TransactionResult::error("out of gas")]);
        ledger.script(
            "ok",
            vec![
                TransactionResult::new(TransactionStatus::Pending),
                TransactionResult::new(TransactionStatus::Sealed),
            ],
        );

        let err = watcher(ledger.clone(), Duration::from_secs(60))
            .wait("tx")
            .await
            .unwrap_err();
        match err {
            LedgerError::TransactionFailed { id, message } => {
                assert_eq!(id, "tx");
                assert_eq!(message, "out of gas");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(
            watcher(ledger, Duration::from_secs(60)).wait("ok").await.unwrap(),
            TransactionStatus::Sealed
        );
    }

    #[test]
    fn test_expired_outcome_is_failure() {
        assert!(matches!(
            WatchOutcome::Expired.into_result("tx"),
            Err(LedgerError::TransactionFailed { .. })
        ));
        assert_eq!(
            WatchOutcome::Finished(TransactionStatus::Executed).into_result("tx").unwrap(),
            TransactionStatus::Executed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_expires() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.script("tx", vec![TransactionResult::new(TransactionStatus::Pending)]);
        let (seen, callback) = recorder();
        watcher(ledger, Duration::from_secs(5))
            .watch("tx", callback)
            .join()
            .await;
        assert_eq!(*seen.lock(), vec![WatchOutcome::Expired]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_fires() {
        let ledger = Arc::new(MemoryLedger::new());
        ledger.script(
            "tx",
            vec![
                TransactionResult::new(TransactionStatus::Pending),
                TransactionResult::new(TransactionStatus::Pending),
                TransactionResult::new(TransactionStatus::Sealed),
            ],
        );
        let (seen, callback) = recorder();
        let handle = watcher(ledger, Duration::from_secs(60)).watch("tx", callback);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(seen.lock().is_empty());
    }
}
