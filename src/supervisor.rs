//! Restart supervision for probe tasks.
//!
//! A [`Supervisor`] owns one probe task's lifecycle: launch it, wait for
//! it to exit, relaunch after the policy's delay. The production policy
//! relaunches forever with a fixed delay and no backoff; a capped policy
//! exists so tests can drive the loop to completion without spawning
//! real subprocesses.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub delay: Duration,
    pub max_restarts: Option<u32>,
}

impl RestartPolicy {
    /// Relaunch after `delay`, forever.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            max_restarts: None,
        }
    }

    /// Relaunch after `delay` at most `max_restarts` times, then stop.
    pub fn capped(delay: Duration, max_restarts: u32) -> Self {
        Self {
            delay,
            max_restarts: Some(max_restarts),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Running,
}

pub struct Supervisor {
    name: String,
    policy: RestartPolicy,
}

impl Supervisor {
    pub fn new(name: impl Into<String>, policy: RestartPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
        }
    }

    /// Drive `task` through Idle → Running → Idle until the policy's
    /// restart cap is reached, which an uncapped policy never is. A clean
    /// exit and a failure are treated the same: the task was supposed to
    /// run forever, so either way it gets relaunched.
    ///
    /// Returns the number of restarts performed.
    pub async fn run<F, Fut>(&self, mut task: F) -> u32
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let mut state;
        let mut restarts = 0u32;

        loop {
            state = State::Running;
            debug!(name = %self.name, ?state, "launching supervised task");

            match task().await {
                Ok(()) => warn!(name = %self.name, "supervised task exited"),
                Err(e) => warn!(name = %self.name, "supervised task failed: {e:#}"),
            }

            state = State::Idle;
            if let Some(max) = self.policy.max_restarts {
                if restarts >= max {
                    debug!(name = %self.name, restarts, "restart cap reached");
                    return restarts;
                }
            }
            restarts += 1;

            debug!(name = %self.name, ?state, delay = ?self.policy.delay, "relaunching after delay");
            sleep(self.policy.delay).await;
        }
    }
}
