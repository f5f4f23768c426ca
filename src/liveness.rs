//! WebSocket liveness monitor: an idle timer that probes a silent
//! connection with PING frames and declares it dead after a bounded number
//! of unanswered PONGs.
//!
//! Grounded on the `PingPong` struct in
//! `original_source/include/DeviceHive/websocket.hpp`. Driven externally by
//! the WebSocket service's `tokio::select!` loop rather than a free-running
//! timer task, so all liveness state stays confined to the same actor as
//! the rest of the service (§5 of the concurrency model).

use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    pub idle_timeout: Duration,
    pub pong_timeout: Duration,
    pub retry_limit: u32,
    pub enabled: bool,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        LivenessConfig {
            idle_timeout: Duration::from_secs(10),
            pong_timeout: Duration::from_secs(5),
            retry_limit: 3,
            enabled: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    IdleWait,
    WaitPong { attempt: u32 },
    Failed,
}

/// What the caller should do when the deadline in [`LivenessMonitor::deadline`]
/// elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LivenessEvent {
    /// Send a PING frame; the monitor has already re-armed its deadline.
    SendPing,
    /// The peer is dead: report a timeout once and force-close the connection.
    Failed,
}

pub struct LivenessMonitor {
    config: LivenessConfig,
    state: State,
    deadline: Instant,
}

impl LivenessMonitor {
    pub fn new(config: LivenessConfig) -> Self {
        let deadline = Instant::now() + config.idle_timeout;
        LivenessMonitor { config, state: State::IdleWait, deadline }
    }

    /// The instant the caller's select loop should wait on. When disabled,
    /// returns a deadline far enough in the future to never fire in
    /// practice — callers should still prefer branching on `is_enabled`.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn has_failed(&self) -> bool {
        self.state == State::Failed
    }

    /// Any inbound frame — text, binary, PING, or PONG — counts as evidence
    /// the peer is alive.
    pub fn on_inbound_frame(&mut self) {
        if self.state == State::Failed {
            return;
        }
        self.state = State::IdleWait;
        self.deadline = Instant::now() + self.config.idle_timeout;
    }

    /// Called when `deadline()` elapses. Advances the state machine and
    /// reports what the caller should do.
    pub fn on_deadline_elapsed(&mut self) -> LivenessEvent {
        match self.state {
            State::IdleWait => {
                self.state = State::WaitPong { attempt: 1 };
                self.deadline = Instant::now() + self.config.pong_timeout;
                LivenessEvent::SendPing
            }
            State::WaitPong { attempt } if attempt < self.config.retry_limit => {
                self.state = State::WaitPong { attempt: attempt + 1 };
                self.deadline = Instant::now() + self.config.pong_timeout;
                LivenessEvent::SendPing
            }
            State::WaitPong { .. } => {
                self.state = State::Failed;
                LivenessEvent::Failed
            }
            State::Failed => LivenessEvent::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> LivenessConfig {
        LivenessConfig {
            idle_timeout: Duration::from_millis(100),
            pong_timeout: Duration::from_millis(50),
            retry_limit: 2,
            enabled: true,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn inbound_frame_resets_to_idle_wait_without_failure() {
        let mut monitor = LivenessMonitor::new(test_config());
        tokio::time::advance(Duration::from_millis(50)).await;
        monitor.on_inbound_frame();
        tokio::time::advance(Duration::from_millis(90)).await;
        assert!(Instant::now() < monitor.deadline());
        assert!(!monitor.has_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn idle_timeout_then_retries_then_fails() {
        let mut monitor = LivenessMonitor::new(test_config());

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(monitor.on_deadline_elapsed(), LivenessEvent::SendPing);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(monitor.on_deadline_elapsed(), LivenessEvent::SendPing);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert_eq!(monitor.on_deadline_elapsed(), LivenessEvent::Failed);
        assert!(monitor.has_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn pong_before_deadline_prevents_failure() {
        let mut monitor = LivenessMonitor::new(test_config());
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(monitor.on_deadline_elapsed(), LivenessEvent::SendPing);

        // PONG arrives before the retry deadline — back to idle-wait.
        tokio::time::advance(Duration::from_millis(20)).await;
        monitor.on_inbound_frame();
        assert!(!monitor.has_failed());
    }
}
