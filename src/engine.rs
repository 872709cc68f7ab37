//! Round & scoring engine.
//!
//! One `Engine` owns the state of one game session. Every mutation goes
//! through `submit_answer`, the session controls, or `advance`, which pumps
//! the owned scheduler and dispatches due timers. Delayed continuations are
//! stored in `pending` instead of captured in closures, so dropping or
//! stopping the engine leaves nothing behind that could fire later.

use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;

use crate::generator::generate_notes;
use crate::note::{
    AnswerResult, Clef, ClefType, Difficulty, GameMode, MetronomeSpeed, MusicNote, NoteName,
    RoundLength,
};
use crate::scheduler::{Missed, Scheduler, TimerToken};

pub const TIMED_CHALLENGE_SECS: u32 = 60;
const COUNTDOWN_TICK: Duration = Duration::from_secs(1);
const FEEDBACK_DELAY: Duration = Duration::from_millis(400);
const STREAK_END_FEEDBACK: Duration = Duration::from_millis(1000);
const PRACTICE_ROUND_GAP: Duration = Duration::from_millis(500);
const STREAK_ROUND_GAP: Duration = Duration::from_millis(300);
const METRONOME_PULSE: Duration = Duration::from_millis(100);

/// Sound output used by the engine. Implementations swallow their own failures.
pub trait AudioSink {
    fn play_note(&self, note: NoteName, octave: u8);
    fn play_metronome_tick(&self);
}

impl<T: AudioSink + ?Sized> AudioSink for &T {
    fn play_note(&self, note: NoteName, octave: u8) {
        (**self).play_note(note, octave)
    }

    fn play_metronome_tick(&self) {
        (**self).play_metronome_tick()
    }
}

/// Receives every evaluated answer, fire-and-forget.
pub trait AnswerRecorder {
    fn record_answer(&mut self, note: NoteName, correct: bool);
}

impl<T: AnswerRecorder + ?Sized> AnswerRecorder for &mut T {
    fn record_answer(&mut self, note: NoteName, correct: bool) {
        (**self).record_answer(note, correct)
    }
}

/// Everything chosen before a session starts
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    pub mode: GameMode,
    pub difficulty: Difficulty,
    pub clef: ClefType,
    pub round_length: RoundLength,
    /// `None` = any note
    pub allowed_notes: Option<Vec<NoteName>>,
    pub metronome_enabled: bool,
    pub metronome_speed: MetronomeSpeed,
}

impl SessionConfig {
    /// An empty filter means no filter.
    fn normalized(mut self) -> Self {
        if self.allowed_notes.as_ref().is_some_and(|n| n.is_empty()) {
            self.allowed_notes = None;
        }
        self
    }

    fn notes_per_round(&self) -> usize {
        match self.mode {
            GameMode::TimedChallenge => 1,
            GameMode::Practice | GameMode::Streak => self.round_length.count(),
        }
    }

    fn round_gap(&self) -> Duration {
        match self.mode {
            GameMode::Practice => PRACTICE_ROUND_GAP,
            GameMode::Streak => STREAK_ROUND_GAP,
            GameMode::TimedChallenge => Duration::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    RoundInProgress,
    AnswerFeedback,
    GameOver,
}

/// What happens when the feedback overlay clears
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTransition {
    /// Move to the next note; start the round gap if the round is done
    Advance,
    /// Replace the round (timed challenge)
    NewRound,
    /// Same note again
    Retry,
    /// Hide the overlay but keep the outcome (streak lost)
    Hold,
}

/// Read-only view of the session, handed to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub mode: GameMode,
    pub notes: Vec<MusicNote>,
    pub current_index: usize,
    pub clef: Clef,
    pub phase: Phase,
    pub feedback_visible: bool,
    pub last_result: AnswerResult,
    pub correct_count: u32,
    pub total_attempts: u32,
    pub current_streak: u32,
    pub best_streak: u32,
    pub time_remaining: u32,
    pub game_over: bool,
    pub metronome_pulse: bool,
}

impl Snapshot {
    pub fn current_note(&self) -> Option<&MusicNote> {
        self.notes.get(self.current_index)
    }

    /// Percentage of correct attempts, 0 before the first answer
    pub fn accuracy(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.correct_count as f64 / self.total_attempts as f64 * 100.0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&Snapshot)>;

pub struct Engine<S: Scheduler, A: AudioSink, R: AnswerRecorder> {
    config: SessionConfig,
    scheduler: S,
    audio: A,
    recorder: R,
    rng: SmallRng,

    notes: Vec<MusicNote>,
    current_index: usize,
    clef: Clef,
    last_result: AnswerResult,
    feedback_visible: bool,
    pending: Option<PendingTransition>,

    correct_count: u32,
    total_attempts: u32,
    current_streak: u32,
    best_streak: u32,
    time_remaining: u32,
    game_over: bool,
    metronome_pulse: bool,

    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl<S: Scheduler, A: AudioSink, R: AnswerRecorder> Engine<S, A, R> {
    /// Create an idle engine; nothing is generated until `start_session`.
    pub fn new(config: SessionConfig, scheduler: S, audio: A, recorder: R) -> Self {
        Self::with_rng(config, scheduler, audio, recorder, SmallRng::from_entropy())
    }

    pub fn with_rng(
        config: SessionConfig,
        scheduler: S,
        audio: A,
        recorder: R,
        rng: SmallRng,
    ) -> Self {
        Self {
            config: config.normalized(),
            scheduler,
            audio,
            recorder,
            rng,
            notes: Vec::new(),
            current_index: 0,
            clef: Clef::Treble,
            last_result: AnswerResult::Pending,
            feedback_visible: false,
            pending: None,
            correct_count: 0,
            total_attempts: 0,
            current_streak: 0,
            best_streak: 0,
            time_remaining: TIMED_CHALLENGE_SECS,
            game_over: false,
            metronome_pulse: false,
            listeners: Vec::new(),
            next_subscription: 0,
        }
    }

    // ---- session controls ----

    /// Start (or restart) a session with `config`: clears every counter,
    /// generates the first round, arms the countdown for the timed
    /// challenge and starts the metronome when enabled.
    pub fn start_session(&mut self, config: SessionConfig) {
        self.cancel_timers();
        self.config = config.normalized();

        self.correct_count = 0;
        self.total_attempts = 0;
        self.current_streak = 0;
        self.best_streak = 0;
        self.time_remaining = TIMED_CHALLENGE_SECS;
        self.game_over = false;
        self.feedback_visible = false;
        self.pending = None;

        self.generate_round();

        if self.config.mode == GameMode::TimedChallenge {
            self.scheduler
                .schedule_repeating(TimerToken::Countdown, COUNTDOWN_TICK, Missed::Replay);
        }
        self.start_metronome_if_needed();

        log::info!(
            "session started: {} / {} / {:?} clef",
            self.config.mode.display_name(),
            self.config.difficulty.display_name(),
            self.clef
        );
        self.notify();
    }

    /// Start over with the current configuration
    pub fn reset_game(&mut self) {
        let config = self.config.clone();
        self.start_session(config);
    }

    /// Cancel every pending callback. Call when the session view goes away.
    pub fn stop_all_timers(&mut self) {
        self.cancel_timers();
        self.notify();
    }

    /// Turn the metronome on/off or change its tempo without touching scoring.
    /// A running metronome keeps its beat unless the tempo changes.
    pub fn set_metronome(&mut self, enabled: bool, speed: MetronomeSpeed) {
        let restart = enabled
            && (speed != self.config.metronome_speed
                || !self.scheduler.is_pending(TimerToken::Metronome));
        self.config.metronome_enabled = enabled;
        self.config.metronome_speed = speed;
        if restart {
            self.start_metronome_if_needed();
        } else if !enabled {
            self.stop_metronome();
        }
        self.notify();
    }

    // ---- input ----

    /// Evaluate an answer for the current note.
    ///
    /// Returns `None` (and changes nothing) when there is no interactive
    /// note: game over, feedback showing, or between rounds.
    pub fn submit_answer(&mut self, answer: NoteName) -> Option<AnswerResult> {
        if self.game_over || self.feedback_visible || self.pending.is_some() {
            return None;
        }
        let (expected, position) = {
            let current = self.current_note()?;
            (current.name, current.position)
        };

        self.total_attempts += 1;
        let correct = expected == answer;
        self.audio
            .play_note(answer, self.clef.octave_for_position(position));
        self.recorder.record_answer(expected, correct);

        let result = if correct {
            self.correct_count += 1;
            self.last_result = AnswerResult::Correct;
            match self.config.mode {
                GameMode::Practice => self.show_feedback(PendingTransition::Advance),
                GameMode::TimedChallenge => self.show_feedback(PendingTransition::NewRound),
                GameMode::Streak => {
                    self.current_streak += 1;
                    self.best_streak = self.best_streak.max(self.current_streak);
                    self.show_feedback(PendingTransition::Advance);
                }
            }
            AnswerResult::Correct
        } else {
            self.last_result = AnswerResult::Incorrect;
            match self.config.mode {
                GameMode::Practice | GameMode::TimedChallenge => {
                    self.show_feedback(PendingTransition::Retry)
                }
                GameMode::Streak => self.end_streak(),
            }
            AnswerResult::Incorrect
        };

        log::debug!("answer {} for {}: {:?}", answer, expected, result);
        self.notify();
        Some(result)
    }

    /// Let `elapsed` pass on the session clock, firing every callback that
    /// falls due, in time order.
    pub fn advance(&mut self, elapsed: Duration) {
        let deadline = self.scheduler.now() + elapsed;
        while let Some(token) = self.scheduler.pop_due(deadline) {
            self.fire(token);
            self.notify();
        }
        self.scheduler.advance_to(deadline);
    }

    // ---- observation ----

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            mode: self.config.mode,
            notes: self.notes.clone(),
            current_index: self.current_index,
            clef: self.clef,
            phase: self.phase(),
            feedback_visible: self.feedback_visible,
            last_result: self.last_result,
            correct_count: self.correct_count,
            total_attempts: self.total_attempts,
            current_streak: self.current_streak,
            best_streak: self.best_streak,
            time_remaining: self.time_remaining,
            game_over: self.game_over,
            metronome_pulse: self.metronome_pulse,
        }
    }

    pub fn phase(&self) -> Phase {
        if self.game_over {
            Phase::GameOver
        } else if self.feedback_visible {
            Phase::AnswerFeedback
        } else {
            Phase::RoundInProgress
        }
    }

    pub fn current_note(&self) -> Option<&MusicNote> {
        self.notes.get(self.current_index)
    }

    #[cfg(test)]
    pub fn pending(&self) -> Option<PendingTransition> {
        self.pending
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    #[cfg(test)]
    pub fn audio(&self) -> &A {
        &self.audio
    }

    #[cfg(test)]
    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Call `listener` with a fresh snapshot after every mutation
    pub fn subscribe(&mut self, listener: impl FnMut(&Snapshot) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.listeners.retain(|(sid, _)| *sid != id);
    }

    // ---- internals ----

    fn notify(&mut self) {
        if self.listeners.is_empty() {
            return;
        }
        let snapshot = self.snapshot();
        for (_, listener) in &mut self.listeners {
            listener(&snapshot);
        }
    }

    fn generate_round(&mut self) {
        self.clef = self.config.clef.resolve(&mut self.rng);
        self.notes = generate_notes(
            &mut self.rng,
            self.config.notes_per_round(),
            self.config.difficulty,
            self.clef,
            self.config.allowed_notes.as_deref(),
        );
        self.current_index = 0;
        self.last_result = AnswerResult::Pending;
    }

    fn is_round_complete(&self) -> bool {
        self.current_index >= self.notes.len()
    }

    fn show_feedback(&mut self, next: PendingTransition) {
        self.feedback_visible = true;
        self.pending = Some(next);
        self.scheduler
            .schedule_once(TimerToken::Feedback, FEEDBACK_DELAY);
    }

    fn end_streak(&mut self) {
        self.game_over = true;
        self.scheduler.cancel(TimerToken::Countdown);
        self.scheduler.cancel(TimerToken::NextRound);
        self.stop_metronome();

        self.feedback_visible = true;
        self.pending = Some(PendingTransition::Hold);
        self.scheduler
            .schedule_once(TimerToken::Feedback, STREAK_END_FEEDBACK);
        log::info!("streak over at {} (best {})", self.current_streak, self.best_streak);
    }

    fn end_timed_challenge(&mut self) {
        self.scheduler.cancel(TimerToken::Countdown);
        self.scheduler.cancel(TimerToken::NextRound);
        self.game_over = true;
        self.stop_metronome();
        log::info!("time up: {} correct of {}", self.correct_count, self.total_attempts);
    }

    fn fire(&mut self, token: TimerToken) {
        match token {
            TimerToken::Countdown => self.on_countdown_tick(),
            TimerToken::Metronome => self.metronome_beat(),
            TimerToken::MetronomePulse => self.metronome_pulse = false,
            TimerToken::Feedback => self.on_feedback_expired(),
            TimerToken::NextRound => {
                if !self.game_over {
                    self.generate_round();
                }
            }
        }
    }

    fn on_countdown_tick(&mut self) {
        if self.game_over {
            self.scheduler.cancel(TimerToken::Countdown);
            return;
        }
        self.time_remaining = self.time_remaining.saturating_sub(1);
        if self.time_remaining == 0 {
            self.end_timed_challenge();
        }
    }

    fn on_feedback_expired(&mut self) {
        let next = self.pending.take();
        self.feedback_visible = false;
        if next == Some(PendingTransition::Hold) {
            return;
        }
        self.last_result = AnswerResult::Pending;
        if self.game_over {
            return;
        }

        match next {
            Some(PendingTransition::Advance) => {
                self.current_index += 1;
                if self.is_round_complete() {
                    self.scheduler
                        .schedule_once(TimerToken::NextRound, self.config.round_gap());
                }
            }
            Some(PendingTransition::NewRound) => self.generate_round(),
            Some(PendingTransition::Retry) | Some(PendingTransition::Hold) | None => {}
        }
    }

    fn start_metronome_if_needed(&mut self) {
        if !self.config.metronome_enabled {
            return;
        }
        self.stop_metronome();
        self.metronome_beat();
        self.scheduler.schedule_repeating(
            TimerToken::Metronome,
            self.config.metronome_speed.interval(),
            Missed::Skip,
        );
    }

    fn stop_metronome(&mut self) {
        self.scheduler.cancel(TimerToken::Metronome);
        self.scheduler.cancel(TimerToken::MetronomePulse);
        self.metronome_pulse = false;
    }

    fn metronome_beat(&mut self) {
        self.audio.play_metronome_tick();
        self.metronome_pulse = true;
        self.scheduler
            .schedule_once(TimerToken::MetronomePulse, METRONOME_PULSE);
    }

    fn cancel_timers(&mut self) {
        self.scheduler.cancel(TimerToken::Countdown);
        self.scheduler.cancel(TimerToken::Feedback);
        self.scheduler.cancel(TimerToken::NextRound);
        self.stop_metronome();
        self.pending = None;
    }
}
