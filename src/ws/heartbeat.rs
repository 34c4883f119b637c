//! Application-level heartbeat for a single socket session.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at, sleep_until};

use super::config::ConnectionConfig;

/// What the heartbeat wants the session to do next.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatEvent {
    /// Send the ping payload, then call [`HeartbeatMonitor::ping_sent`]
    Ping,
    /// The reply to the last ping is overdue; the session must be closed
    TimedOut,
}

/// Tracks liveness of one open socket.
///
/// The monitor owns both of its timers, the ping interval and the reply deadline, and is
/// created per session. Dropping or stopping it disarms both, so a timer belonging to a
/// superseded session cannot fire against a newer one.
#[derive(Debug)]
pub struct HeartbeatMonitor {
    ticker: Interval,
    deadline: Option<Instant>,
    timeout: Duration,
    expect_pong: bool,
    ping: String,
    pong: String,
    stopped: bool,
}

impl HeartbeatMonitor {
    /// Start the monitor. The first ping is due one full interval from now.
    ///
    /// `config` must have passed [`ConnectionConfig::validate`]. An interval too long for
    /// the clock to represent starts the monitor stopped, since no ping could ever fall due.
    #[must_use]
    pub fn start(config: &ConnectionConfig) -> Self {
        let period = config.heartbeat_interval();
        let now = Instant::now();
        let first = now.checked_add(period);
        let mut ticker = interval_at(first.unwrap_or(now), period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Self {
            ticker,
            deadline: None,
            timeout: config.heartbeat_timeout(),
            expect_pong: config.expect_pong(),
            ping: config.ping_payload().to_owned(),
            pong: config.pong_payload().to_owned(),
            stopped: first.is_none(),
        }
    }

    /// Wait for the next heartbeat event.
    ///
    /// Cancel safe. Never resolves once the monitor is stopped.
    pub async fn next_event(&mut self) -> HeartbeatEvent {
        if self.stopped {
            return std::future::pending().await;
        }

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;

                    () = sleep_until(deadline) => {
                        self.deadline = None;
                        HeartbeatEvent::TimedOut
                    }
                    _ = self.ticker.tick() => HeartbeatEvent::Ping,
                }
            }
            None => {
                self.ticker.tick().await;
                HeartbeatEvent::Ping
            }
        }
    }

    /// Record that a ping went out. Rearms the reply deadline when replies are expected,
    /// replacing any deadline left over from an earlier ping. A timeout past the end of the
    /// clock leaves no deadline.
    pub fn ping_sent(&mut self) {
        if self.expect_pong && !self.stopped {
            self.deadline = Instant::now().checked_add(self.timeout);
        }
    }

    /// Whether `text` is the heartbeat reply and should be consumed rather than forwarded.
    #[must_use]
    pub fn is_pong(&self, text: &str) -> bool {
        self.expect_pong && text == self.pong
    }

    /// Disarm the pending reply deadline. The ping interval keeps running.
    pub fn pong_received(&mut self) {
        self.deadline = None;
    }

    /// Disarm both timers for good.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.deadline = None;
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    #[must_use]
    pub fn ping_payload(&self) -> &str {
        &self.ping
    }
}
