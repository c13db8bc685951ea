//! Periodic refresh loop with cooperative cancellation.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

pub struct Poller;

impl Poller {
    /// Runs `tick` immediately and then every `interval` until cancelled.
    ///
    /// A tick that is still running when the handle is cancelled is dropped
    /// at its next await point.
    pub fn spawn<F, Fut>(name: &'static str, interval: Duration, mut tick: F) -> PollHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let child = token.child_token();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            log::info!("Starting {} poller every {:?}", name, interval);

            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = child.cancelled() => break,
                            _ = tick() => {}
                        }
                    }
                }
            }
            log::info!("{} poller stopped", name);
        });

        PollHandle {
            token,
            task: Some(task),
        }
    }
}

/// Owns a running poller. Dropping it stops the loop.
pub struct PollHandle {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancels and waits for the loop to exit.
    pub async fn stop(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Poller task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
