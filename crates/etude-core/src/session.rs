use crate::ipc::Event;
use crate::timing::TimingScheduler;
use etude_domain_eval::{MatchDecision, MatchEngine, PracticeStats};
use etude_ports::pitch::NoteObservation;
use etude_ports::score::ScorePositionProvider;
use etude_ports::types::{PositionIndex, Timestamp};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Playing,
    Paused,
    /// Transient: reported when the score is exhausted, followed by `Idle`.
    Complete,
}

/// Owns the score cursor, the live deadline and the session lifecycle.
///
/// Every mutation returns the events it produced, in order. Observations and
/// deadlines are ignored unless the session is `Playing`.
pub struct SessionController {
    provider: Box<dyn ScorePositionProvider>,
    matcher: MatchEngine,
    timing: TimingScheduler,
    stats: PracticeStats,
    state: SessionState,
    tempo_bpm: f64,
}

impl SessionController {
    pub fn new(provider: Box<dyn ScorePositionProvider>, tempo_bpm: f64) -> Self {
        Self {
            provider,
            matcher: MatchEngine::new(),
            timing: TimingScheduler::new(),
            stats: PracticeStats::default(),
            state: SessionState::Idle,
            tempo_bpm,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> PracticeStats {
        self.stats
    }

    pub fn tempo_bpm(&self) -> f64 {
        self.tempo_bpm
    }

    /// Takes effect from the next deadline scheduled.
    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo_bpm = bpm;
    }

    pub fn position(&self) -> Option<PositionIndex> {
        self.provider.position_index()
    }

    pub fn position_count(&self) -> usize {
        self.provider.position_count()
    }

    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        self.timing.remaining(now)
    }

    /// Swaps the score. Any running attempt is abandoned.
    pub fn replace_provider(&mut self, provider: Box<dyn ScorePositionProvider>) -> Vec<Event> {
        let mut events = Vec::new();
        self.timing.cancel();
        self.provider = provider;
        self.provider.reset();
        self.matcher.enter_position(self.provider.position_index());
        self.stats.reset();
        self.set_state(SessionState::Idle, &mut events);
        events.push(Event::CursorMoved {
            position: self.provider.position_index(),
        });
        events
    }

    pub fn start(&mut self, now: Timestamp) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Idle {
            log::debug!("start ignored while {:?}", self.state);
            return events;
        }

        self.provider.reset();
        self.stats.reset();
        self.set_state(SessionState::Playing, &mut events);
        events.push(self.stats_event());
        if self.provider.is_end_reached() {
            self.complete(&mut events);
        } else {
            self.enter_position(now, &mut events);
        }
        events
    }

    /// Pauses without advancing. No-op unless `Playing`.
    pub fn stop(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Playing {
            log::debug!("stop ignored while {:?}", self.state);
            return events;
        }
        self.timing.cancel();
        self.set_state(SessionState::Paused, &mut events);
        events
    }

    /// Continues at the same position with a full-length deadline.
    pub fn resume(&mut self, now: Timestamp) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Paused {
            log::debug!("resume ignored while {:?}", self.state);
            return events;
        }
        self.set_state(SessionState::Playing, &mut events);
        self.schedule_current(now);
        events
    }

    pub fn reset(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        self.timing.cancel();
        self.provider.reset();
        self.matcher.enter_position(self.provider.position_index());
        self.set_state(SessionState::Idle, &mut events);
        events.push(Event::CursorMoved {
            position: self.provider.position_index(),
        });
        events
    }

    /// Applies one analysis result. `None` means nothing audible passed the gate.
    pub fn observe(&mut self, observation: Option<&NoteObservation>, now: Timestamp) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Playing {
            return events;
        }
        let Some(observation) = observation else {
            self.matcher.release();
            return events;
        };
        let Some(position) = self.provider.position_index() else {
            return events;
        };

        let before = self.matcher.mismatches();
        let expected = self.provider.expected_notes_at_cursor();
        match self.matcher.evaluate(observation, &expected) {
            MatchDecision::Hit { note } => {
                log::debug!("position {}: hit {}", position, note);
                self.timing.cancel();
                self.stats.record_hit();
                events.push(Event::PositionHit { position });
                events.push(self.stats_event());
                self.advance_position(now, &mut events);
            }
            MatchDecision::Miss { mismatches } if mismatches > before => {
                self.stats.record_mismatch();
                events.push(Event::NoteMismatched {
                    position,
                    note: *observation,
                });
            }
            MatchDecision::Miss { .. } | MatchDecision::NoDecision => {}
        }
        events
    }

    /// Handles expiry of the live deadline, if due.
    pub fn poll_deadline(&mut self, now: Timestamp) -> Vec<Event> {
        let mut events = Vec::new();
        if self.state != SessionState::Playing {
            return events;
        }
        let Some(deadline) = self.timing.poll(now) else {
            return events;
        };

        if self.provider.expected_notes_at_cursor().is_empty() {
            log::debug!("rest at position {} elapsed", deadline.for_position);
        } else {
            log::debug!("position {} missed", deadline.for_position);
            self.stats.record_miss();
            events.push(Event::PositionMissed {
                position: deadline.for_position,
            });
            events.push(self.stats_event());
        }
        self.advance_position(now, &mut events);
        events
    }

    /// The only path that moves the cursor during an attempt.
    fn advance_position(&mut self, now: Timestamp, events: &mut Vec<Event>) {
        self.timing.cancel();
        self.provider.advance();
        if self.provider.is_end_reached() {
            events.push(Event::CursorMoved { position: None });
            self.complete(events);
        } else {
            self.enter_position(now, events);
        }
    }

    fn enter_position(&mut self, now: Timestamp, events: &mut Vec<Event>) {
        let position = self.provider.position_index();
        self.matcher.enter_position(position);
        self.schedule_current(now);
        events.push(Event::CursorMoved { position });
    }

    fn schedule_current(&mut self, now: Timestamp) {
        let Some(position) = self.provider.position_index() else {
            return;
        };
        let duration = self.provider.duration_of_current_position(self.tempo_bpm);
        self.timing.schedule(now, duration, position);
    }

    fn complete(&mut self, events: &mut Vec<Event>) {
        self.timing.cancel();
        log::info!(
            "score complete: {} hit, {} missed, {} wrong notes",
            self.stats.hit,
            self.stats.missed,
            self.stats.mismatched
        );
        events.push(Event::ScoreCompleted);
        self.set_state(SessionState::Complete, events);
        self.set_state(SessionState::Idle, events);
    }

    fn set_state(&mut self, state: SessionState, events: &mut Vec<Event>) {
        if self.state == state {
            return;
        }
        log::info!("session {:?} -> {:?}", self.state, state);
        self.state = state;
        events.push(Event::SessionStateChanged { state });
    }

    fn stats_event(&self) -> Event {
        Event::StatsUpdated {
            hit: self.stats.hit,
            missed: self.stats.missed,
            mismatched: self.stats.mismatched,
            accuracy: self.stats.accuracy(),
        }
    }
}
