//! Relay supervisor
//!
//! Runs the serving loop on its own task and restarts it once if it fails or
//! panics. A second abnormal exit is returned to the caller as fatal. A clean
//! return (graceful shutdown) ends supervision.

use std::future::Future;

use anyhow::anyhow;

/// Restarts allowed after the first abnormal exit
pub const MAX_RESTARTS: u32 = 1;

pub struct Supervisor {
    max_restarts: u32,
}

impl Supervisor {
    pub fn new(max_restarts: u32) -> Self {
        Self { max_restarts }
    }

    /// Run `make_attempt(n)` for attempt `n = 0, 1, ...` until it returns `Ok`
    /// or the restart budget is spent.
    pub async fn run<F, Fut>(&self, mut make_attempt: F) -> anyhow::Result<()>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut attempt = 0;
        loop {
            let failure = match tokio::spawn(make_attempt(attempt)).await {
                Ok(Ok(())) => {
                    tracing::info!("Relay stopped");
                    return Ok(());
                }
                Ok(Err(e)) => anyhow!("relay failed: {e:#}"),
                Err(join_error) if join_error.is_panic() => {
                    anyhow!("relay panicked: {}", panic_message(join_error.into_panic()))
                }
                Err(join_error) => anyhow!("relay task aborted: {join_error}"),
            };

            if attempt >= self.max_restarts {
                tracing::error!("{}; restart budget exhausted", failure);
                return Err(failure);
            }

            attempt += 1;
            tracing::error!("{}; restarting (attempt {})", failure, attempt);
        }
    }
}

impl Default for Supervisor {
    fn default() -> Self {
        Self::new(MAX_RESTARTS)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
