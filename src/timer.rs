//! The sender's single retransmission timer.
//!
//! Go-Back-N keeps one timer per window, not per packet: it tracks the
//! oldest unacknowledged packet and, when it fires, the whole window is
//! resent.  The engines never touch a clock; they return a
//! [`TimerCommand`] and the session loop applies it to a
//! [`RetransmitTimer`].

use std::time::Duration;

use tokio::time::Instant;

/// What the session loop should do with the timer after an engine step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerCommand {
    /// (Re)start the timer with a full timeout.
    Start,
    /// Leave the timer exactly as it is, running or not.
    Keep,
    /// Disarm the timer.
    Stop,
}

/// A deadline that is either armed or disarmed.
#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    rto: Duration,
    deadline: Option<Instant>,
}

impl RetransmitTimer {
    /// Create a disarmed timer that will run for `rto` once started.
    pub fn new(rto: Duration) -> Self {
        Self {
            rto,
            deadline: None,
        }
    }

    pub fn apply(&mut self, cmd: TimerCommand) {
        match cmd {
            TimerCommand::Start => self.arm(),
            TimerCommand::Keep => {}
            TimerCommand::Stop => self.disarm(),
        }
    }

    pub fn arm(&mut self) {
        self.deadline = Some(Instant::now() + self.rto);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Time left before the timer fires.
    ///
    /// `None` when disarmed; `Some(Duration::ZERO)` once the deadline has
    /// passed.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disarmed() {
        let t = RetransmitTimer::new(Duration::from_secs(1));
        assert!(!t.is_armed());
        assert_eq!(t.remaining(), None);
    }

    #[test]
    fn start_keep_stop() {
        let mut t = RetransmitTimer::new(Duration::from_secs(3600));
        t.apply(TimerCommand::Start);
        assert!(t.is_armed());
        let first = t.remaining().unwrap();
        assert!(first > Duration::from_secs(3500));

        t.apply(TimerCommand::Keep);
        assert!(t.is_armed());
        assert!(t.remaining().unwrap() <= first);

        t.apply(TimerCommand::Stop);
        assert!(!t.is_armed());
    }

    #[test]
    fn keep_leaves_disarmed_timer_alone() {
        let mut t = RetransmitTimer::new(Duration::from_secs(1));
        t.apply(TimerCommand::Keep);
        assert!(!t.is_armed());
    }

    #[test]
    fn expired_timer_reports_zero() {
        let mut t = RetransmitTimer::new(Duration::from_nanos(1));
        t.arm();
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(t.remaining(), Some(Duration::ZERO));
    }
}
