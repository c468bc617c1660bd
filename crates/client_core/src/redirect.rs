//! Delayed navigation after a game ends, owned by the session so teardown can
//! suppress it.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RedirectTimer {
    task: Option<JoinHandle<()>>,
    armed: bool,
}

impl RedirectTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms the timer. Fires at most once per timer: later calls are ignored
    /// whether the first one is pending, fired or cancelled. Must be called
    /// from within a tokio runtime.
    pub fn schedule<F>(&mut self, delay: Duration, on_fire: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        if self.armed {
            debug!("redirect already scheduled; ignoring");
            return false;
        }
        self.armed = true;
        debug!(delay_ms = delay.as_millis() as u64, "redirect scheduled");
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        }));
        true
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            if !task.is_finished() {
                debug!("redirect cancelled");
            }
            task.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for RedirectTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
#[path = "tests/redirect_tests.rs"]
mod tests;
