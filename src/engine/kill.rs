// src/engine/kill.rs

//! Build-scoped cooperative cancellation.
//!
//! A [`KillSwitch`] is shared between the orchestrator and whoever may want
//! to stop a build (a Ctrl-C handler, a transport). Each build opens a
//! [`BuildGuard`] which carries the [`KillToken`] threaded through discovery
//! and evaluation. The token moves one way: running, then cancelled.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info};

use crate::errors::{DicyError, Result};
use crate::exec::ProcessRegistry;

/// Cancellation token checked at kill checkpoints.
#[derive(Debug, Clone)]
pub struct KillToken {
    rx: Option<watch::Receiver<Option<String>>>,
}

impl KillToken {
    /// A token not attached to any build; it is never cancelled.
    pub fn never() -> Self {
        Self { rx: None }
    }

    fn reason(&self) -> Option<String> {
        self.rx.as_ref().and_then(|rx| rx.borrow().clone())
    }

    pub fn is_cancelled(&self) -> bool {
        self.reason().is_some()
    }

    /// Kill checkpoint: `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        match self.reason() {
            Some(reason) => Err(DicyError::Cancelled(reason)),
            None => Ok(()),
        }
    }

    /// Resolves with the cancellation message once the build is killed.
    /// Never resolves for a build that finishes normally.
    pub async fn cancelled(&self) -> String {
        let reason = match &self.rx {
            Some(rx) => {
                let mut rx = rx.clone();
                match rx.wait_for(Option::is_some).await {
                    Ok(value) => value.clone(),
                    Err(_) => None,
                }
            }
            None => None,
        };
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

#[derive(Debug)]
struct ActiveBuild {
    cancel: watch::Sender<Option<String>>,
    finished: watch::Receiver<bool>,
}

/// Process-wide handle for the in-flight build.
#[derive(Debug, Clone, Default)]
pub struct KillSwitch {
    current: Arc<Mutex<Option<ActiveBuild>>>,
    processes: ProcessRegistry,
}

impl KillSwitch {
    pub fn new(processes: ProcessRegistry) -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            processes,
        }
    }

    pub fn processes(&self) -> &ProcessRegistry {
        &self.processes
    }

    pub fn is_running(&self) -> bool {
        self.current.lock().map(|c| c.is_some()).unwrap_or(false)
    }

    /// Open a build. Fails if one is already in flight.
    pub fn begin(&self) -> Result<BuildGuard> {
        let mut current = self
            .current
            .lock()
            .map_err(|_| DicyError::Other(anyhow::anyhow!("kill switch lock poisoned")))?;
        if current.is_some() {
            return Err(DicyError::BuildInProgress);
        }

        let (cancel, token_rx) = watch::channel(None);
        let (finished_tx, finished) = watch::channel(false);
        *current = Some(ActiveBuild { cancel, finished });

        Ok(BuildGuard {
            token: KillToken { rx: Some(token_rx) },
            finished: finished_tx,
            current: Arc::clone(&self.current),
        })
    }

    /// Request cancellation of the running build and wait for it to wind
    /// down. Idempotent: later calls wait on the same completion and keep the
    /// first message. Returns at once when no build is running.
    pub async fn kill(&self, message: &str) {
        let finished = {
            let Ok(current) = self.current.lock() else {
                return;
            };
            let Some(build) = current.as_ref() else {
                debug!("kill requested with no build in progress");
                return;
            };
            let first = build.cancel.send_if_modified(|reason| {
                if reason.is_none() {
                    *reason = Some(message.to_string());
                    true
                } else {
                    false
                }
            });
            if first {
                info!(reason = %message, "build cancellation requested");
            }
            build.finished.clone()
        };

        self.processes.terminate_all();

        let mut finished = finished;
        let _ = finished.wait_for(|done| *done).await;
    }
}

/// Marks the lifetime of one build. Dropping it closes the build and wakes
/// every pending `kill`.
#[derive(Debug)]
pub struct BuildGuard {
    token: KillToken,
    finished: watch::Sender<bool>,
    current: Arc<Mutex<Option<ActiveBuild>>>,
}

impl BuildGuard {
    pub fn token(&self) -> &KillToken {
        &self.token
    }
}

impl Drop for BuildGuard {
    fn drop(&mut self) {
        if let Ok(mut current) = self.current.lock() {
            *current = None;
        }
        self.finished.send_replace(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn second_build_is_rejected() {
        let switch = KillSwitch::default();
        let guard = switch.begin().unwrap();
        assert!(matches!(switch.begin(), Err(DicyError::BuildInProgress)));
        drop(guard);
        assert!(switch.begin().is_ok());
    }

    #[tokio::test]
    async fn kill_without_build_returns_immediately() {
        let switch = KillSwitch::default();
        tokio::time::timeout(Duration::from_secs(1), switch.kill("stop"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn kill_is_idempotent_and_waits_for_the_build() {
        let switch = KillSwitch::default();
        let guard = switch.begin().unwrap();
        let token = guard.token().clone();

        let first = tokio::spawn({
            let s = switch.clone();
            async move { s.kill("first").await }
        });
        assert_eq!(token.cancelled().await, "first");

        let second = tokio::spawn({
            let s = switch.clone();
            async move { s.kill("second").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());
        match token.check() {
            Err(DicyError::Cancelled(reason)) => assert_eq!(reason, "first"),
            other => panic!("expected cancellation, got {other:?}"),
        }

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await.unwrap();
            second.await.unwrap();
        })
        .await
        .unwrap();
        assert!(!switch.is_running());
    }

    #[tokio::test]
    async fn detached_token_is_never_cancelled() {
        let token = KillToken::never();
        assert!(token.check().is_ok());
        let waited = tokio::time::timeout(Duration::from_millis(20), token.cancelled()).await;
        assert!(waited.is_err());
    }
}
