//! Cancellable one-shot and repeating callbacks on a single timeline.
//!
//! Nothing here runs on its own: the owner pumps the timeline with elapsed
//! time and dispatches each due token itself, so every callback executes on
//! the same thread that mutates game state.

use std::time::Duration;

/// Identifies a scheduled callback. At most one entry per token is pending;
/// scheduling a token again replaces the earlier entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// Timed-challenge one-second countdown
    Countdown,
    /// Metronome beat
    Metronome,
    /// End of the metronome's visual pulse
    MetronomePulse,
    /// Feedback overlay expiry
    Feedback,
    /// Pause between a finished round and the next one
    NextRound,
}

/// What a repeating entry does about intervals that passed without a pump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missed {
    /// Fire once for every interval that elapsed
    Replay,
    /// Fire once, then resume on the next interval boundary after the pump
    Skip,
}

pub trait Scheduler {
    /// Current position of the timeline
    fn now(&self) -> Duration;
    fn schedule_once(&mut self, token: TimerToken, delay: Duration);
    fn schedule_repeating(&mut self, token: TimerToken, interval: Duration, missed: Missed);
    fn cancel(&mut self, token: TimerToken);
    fn is_pending(&self, token: TimerToken) -> bool;
    /// Remove and return the earliest entry due at or before `deadline`,
    /// moving the clock to its due time. Repeating entries are re-armed.
    fn pop_due(&mut self, deadline: Duration) -> Option<TimerToken>;
    /// Move the clock forward to `deadline` once nothing more is due.
    fn advance_to(&mut self, deadline: Duration);
}

/// One scheduled entry: at this time, fire this token.
#[derive(Debug)]
struct ScheduledEvent {
    due: Duration,
    seq: u64,
    token: TimerToken,
    repeat: Option<(Duration, Missed)>,
}

/// Deterministic scheduler driven by elapsed time
#[derive(Debug, Default)]
pub struct Timeline {
    now: Duration,
    next_seq: u64,
    events: Vec<ScheduledEvent>,
}

/// Repeating entries never fire more often than this
const MIN_INTERVAL: Duration = Duration::from_millis(1);

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, token: TimerToken, delay: Duration, repeat: Option<(Duration, Missed)>) {
        self.cancel(token);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(ScheduledEvent {
            due: self.now + delay,
            seq,
            token,
            repeat,
        });
    }
}

impl Scheduler for Timeline {
    fn now(&self) -> Duration {
        self.now
    }

    fn schedule_once(&mut self, token: TimerToken, delay: Duration) {
        self.insert(token, delay, None);
    }

    fn schedule_repeating(&mut self, token: TimerToken, interval: Duration, missed: Missed) {
        let interval = interval.max(MIN_INTERVAL);
        self.insert(token, interval, Some((interval, missed)));
    }

    fn cancel(&mut self, token: TimerToken) {
        self.events.retain(|e| e.token != token);
    }

    fn is_pending(&self, token: TimerToken) -> bool {
        self.events.iter().any(|e| e.token == token)
    }

    fn pop_due(&mut self, deadline: Duration) -> Option<TimerToken> {
        let idx = self
            .events
            .iter()
            .enumerate()
            .filter(|(_, e)| e.due <= deadline)
            .min_by_key(|(_, e)| (e.due, e.seq))
            .map(|(i, _)| i)?;

        let due = self.events[idx].due;
        self.now = self.now.max(due);
        let token = self.events[idx].token;

        match self.events[idx].repeat {
            Some((interval, missed)) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let event = &mut self.events[idx];
                event.due = match missed {
                    Missed::Replay => due + interval,
                    Missed::Skip => next_boundary_after(due, interval, deadline),
                };
                event.seq = seq;
            }
            None => {
                self.events.swap_remove(idx);
            }
        }
        Some(token)
    }

    fn advance_to(&mut self, deadline: Duration) {
        self.now = self.now.max(deadline);
    }
}

/// First `due + k * interval` (k >= 1) strictly after `deadline`
fn next_boundary_after(due: Duration, interval: Duration, deadline: Duration) -> Duration {
    let step = interval.as_nanos();
    let steps = deadline.saturating_sub(due).as_nanos() / step + 1;
    let next = due.as_nanos() + steps * step;
    Duration::from_nanos(u64::try_from(next).unwrap_or(u64::MAX))
}
