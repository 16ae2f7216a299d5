use etude_core::{Command, EngineContext, Event, SessionState};
use etude_domain_score::{PracticeScore, ScoreCursor, ScorePosition};
use etude_ports::audio::{AudioError, AudioFrame, FrameSource};
use etude_ports::pitch::{Accidental, ExpectedNote, Letter, NoteObservation, PitchClass};
use etude_ports::storage::SettingsDto;
use pretty_assertions::assert_eq;
use std::time::Duration;

struct NoAudio;

impl FrameSource for NoAudio {
    fn latest_frame(&mut self, _window_size: usize) -> Result<Option<AudioFrame>, AudioError> {
        Ok(None)
    }
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

fn heard(letter: Letter, accidental: Accidental, octave: i32) -> NoteObservation {
    NoteObservation {
        pitch_class: PitchClass { letter, accidental },
        octave,
        cents_offset: 0.0,
        frequency_hz: 0.0,
    }
}

fn quarter(letter: Letter, accidental: Accidental, octave: i32) -> ScorePosition {
    ScorePosition::new(
        vec![ExpectedNote::new(letter, accidental, octave)],
        Some(0.25),
    )
}

fn engine_with(positions: Vec<ScorePosition>) -> EngineContext {
    let cursor = ScoreCursor::new(PracticeScore::from_positions(positions));
    EngineContext::new(SettingsDto::default(), Box::new(cursor), Box::new(NoAudio))
        .expect("default settings are valid")
}

fn c4_e4() -> EngineContext {
    engine_with(vec![
        quarter(Letter::C, Accidental::Natural, 4),
        quarter(Letter::E, Accidental::Natural, 4),
    ])
}

fn start(engine: &mut EngineContext, now: Duration) -> Vec<Event> {
    engine.handle_command(Command::Start, now).expect("start");
    engine.drain_events()
}

fn scoring_events(events: Vec<Event>) -> Vec<Event> {
    events
        .into_iter()
        .filter(|event| {
            matches!(
                event,
                Event::PositionHit { .. }
                    | Event::PositionMissed { .. }
                    | Event::ScoreCompleted
                    | Event::SessionStateChanged { .. }
            )
        })
        .collect()
}

#[test]
fn hit_then_timeout_completes_the_score() {
    let mut engine = c4_e4();
    let events = start(&mut engine, ms(0));
    assert!(events.contains(&Event::SessionStateChanged {
        state: SessionState::Playing
    }));
    assert_eq!(engine.remaining(ms(0)), Some(ms(1000)));

    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(200));
    assert_eq!(
        scoring_events(engine.drain_events()),
        vec![Event::PositionHit { position: 0 }]
    );
    assert_eq!(engine.position(), Some(1));
    assert_eq!(engine.remaining(ms(200)), Some(ms(1000)));

    engine.poll_deadline(ms(1199));
    assert!(scoring_events(engine.drain_events()).is_empty());

    engine.poll_deadline(ms(1200));
    assert_eq!(
        scoring_events(engine.drain_events()),
        vec![
            Event::PositionMissed { position: 1 },
            Event::ScoreCompleted,
            Event::SessionStateChanged {
                state: SessionState::Complete
            },
            Event::SessionStateChanged {
                state: SessionState::Idle
            },
        ]
    );
    assert_eq!(engine.state(), SessionState::Idle);
    assert_eq!(engine.stats().hit, 1);
    assert_eq!(engine.stats().missed, 1);
}

#[test]
fn quarter_at_sixty_bpm_times_out_after_one_second() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));

    engine.poll_deadline(ms(999));
    assert!(scoring_events(engine.drain_events()).is_empty());

    engine.poll_deadline(ms(1000));
    assert_eq!(
        scoring_events(engine.drain_events()),
        vec![Event::PositionMissed { position: 0 }]
    );
    assert_eq!(engine.position(), Some(1));
}

#[test]
fn flat_spelling_is_hit_by_sharp_pitch() {
    let mut engine = engine_with(vec![quarter(Letter::D, Accidental::Flat, 4)]);
    start(&mut engine, ms(0));

    engine.observe(Some(heard(Letter::C, Accidental::Sharp, 4)), ms(100));

    let events = scoring_events(engine.drain_events());
    assert_eq!(events[0], Event::PositionHit { position: 0 });
    assert!(events.contains(&Event::ScoreCompleted));
}

#[test]
fn wrong_octave_does_not_advance() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));

    engine.observe(Some(heard(Letter::C, Accidental::Natural, 5)), ms(100));

    let events = engine.drain_events();
    assert!(events.iter().any(|event| matches!(
        event,
        Event::NoteMismatched { position: 0, .. }
    )));
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::PositionHit { .. })));
    assert_eq!(engine.position(), Some(0));
}

#[test]
fn held_correct_note_advances_only_once() {
    let mut engine = engine_with(vec![
        quarter(Letter::A, Accidental::Natural, 4),
        quarter(Letter::A, Accidental::Natural, 4),
        quarter(Letter::B, Accidental::Natural, 4),
    ]);
    start(&mut engine, ms(0));
    let a4 = heard(Letter::A, Accidental::Natural, 4);

    engine.observe(Some(a4), ms(100));
    assert_eq!(engine.position(), Some(1));

    // the repeated A4 satisfies the second position, nothing more
    engine.observe(Some(a4), ms(116));
    engine.observe(Some(a4), ms(132));
    assert_eq!(engine.position(), Some(2));
    assert_eq!(engine.stats().hit, 2);
}

#[test]
fn pause_cancels_and_resume_schedules_a_full_deadline() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));

    engine.handle_command(Command::Stop, ms(400)).expect("stop");
    assert_eq!(engine.state(), SessionState::Paused);
    assert_eq!(engine.remaining(ms(400)), None);

    engine.poll_deadline(ms(5000));
    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(5000));
    assert_eq!(scoring_events(engine.drain_events()), vec![
        Event::SessionStateChanged {
            state: SessionState::Paused
        }
    ]);
    assert_eq!(engine.position(), Some(0));

    engine.handle_command(Command::Resume, ms(6000)).expect("resume");
    assert_eq!(engine.remaining(ms(6000)), Some(ms(1000)));

    engine.poll_deadline(ms(6999));
    assert!(!engine
        .drain_events()
        .iter()
        .any(|event| matches!(event, Event::PositionMissed { .. })));
    engine.poll_deadline(ms(7000));
    assert!(engine
        .drain_events()
        .contains(&Event::PositionMissed { position: 0 }));
}

#[test]
fn stop_is_idempotent_outside_playing() {
    let mut engine = c4_e4();
    engine.handle_command(Command::Stop, ms(0)).expect("stop");
    assert_eq!(engine.state(), SessionState::Idle);
    assert!(engine.drain_events().is_empty());

    start(&mut engine, ms(0));
    engine.handle_command(Command::Stop, ms(10)).expect("stop");
    engine.handle_command(Command::Stop, ms(20)).expect("stop");
    let changes = scoring_events(engine.drain_events());
    assert_eq!(
        changes,
        vec![Event::SessionStateChanged {
            state: SessionState::Paused
        }]
    );
}

#[test]
fn reset_from_paused_rewinds_to_idle() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));
    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(100));
    engine.handle_command(Command::Stop, ms(200)).expect("stop");
    engine.drain_events();

    engine.handle_command(Command::Reset, ms(300)).expect("reset");

    assert_eq!(engine.state(), SessionState::Idle);
    assert_eq!(engine.position(), Some(0));
    assert_eq!(engine.remaining(ms(300)), None);
    assert!(engine.drain_events().contains(&Event::CursorMoved { position: Some(0) }));
}

#[test]
fn reset_while_playing_cancels_the_deadline() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));

    engine.handle_command(Command::Reset, ms(100)).expect("reset");
    engine.poll_deadline(ms(5000));

    assert_eq!(engine.state(), SessionState::Idle);
    assert!(!engine
        .drain_events()
        .iter()
        .any(|event| matches!(event, Event::PositionMissed { .. })));
}

#[test]
fn observations_are_ignored_when_idle() {
    let mut engine = c4_e4();
    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(100));

    let events = engine.drain_events();
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::PositionHit { .. })));
    assert_eq!(engine.position(), Some(0));
}

#[test]
fn start_is_ignored_while_playing() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));
    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(100));

    let events = start(&mut engine, ms(150));

    assert!(events.is_empty());
    assert_eq!(engine.position(), Some(1));
}

#[test]
fn rests_elapse_without_a_miss() {
    let mut engine = engine_with(vec![
        ScorePosition::rest(Some(0.25)),
        quarter(Letter::G, Accidental::Natural, 4),
    ]);
    start(&mut engine, ms(0));

    engine.poll_deadline(ms(1000));

    let events = engine.drain_events();
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::PositionMissed { .. })));
    assert_eq!(engine.position(), Some(1));
    assert_eq!(engine.stats().missed, 0);
}

#[test]
fn empty_score_completes_on_start() {
    let mut engine = engine_with(Vec::new());

    let events = scoring_events(start(&mut engine, ms(0)));

    assert_eq!(
        events,
        vec![
            Event::SessionStateChanged {
                state: SessionState::Playing
            },
            Event::ScoreCompleted,
            Event::SessionStateChanged {
                state: SessionState::Complete
            },
            Event::SessionStateChanged {
                state: SessionState::Idle
            },
        ]
    );
}

#[test]
fn tempo_change_applies_to_the_next_position() {
    let mut engine = c4_e4();
    start(&mut engine, ms(0));

    engine
        .handle_command(Command::SetTempo { bpm: 120.0 }, ms(0))
        .expect("tempo");
    assert_eq!(engine.remaining(ms(0)), Some(ms(1000)));

    engine.observe(Some(heard(Letter::C, Accidental::Natural, 4)), ms(100));
    assert_eq!(engine.remaining(ms(100)), Some(ms(500)));
}

#[test]
fn invalid_tempo_is_rejected() {
    let mut engine = c4_e4();
    assert!(engine
        .handle_command(Command::SetTempo { bpm: 0.0 }, ms(0))
        .is_err());
    assert!(engine
        .handle_command(Command::SetTempo { bpm: f64::NAN }, ms(0))
        .is_err());
    assert_eq!(engine.settings().tempo_bpm, 60.0);
}

#[test]
fn out_of_range_tempo_is_rejected_and_start_still_works() {
    let mut engine = c4_e4();
    assert!(engine
        .handle_command(Command::SetTempo { bpm: 1e-20 }, ms(0))
        .is_err());
    assert!(engine
        .handle_command(Command::SetTempo { bpm: 5000.0 }, ms(0))
        .is_err());
    assert_eq!(engine.settings().tempo_bpm, 60.0);

    engine.handle_command(Command::Start, ms(0)).expect("start");
    assert_eq!(engine.remaining(ms(0)), Some(ms(1000)));
}

#[test]
fn text_score_can_be_loaded() {
    let mut engine = c4_e4();
    engine
        .handle_command(
            Command::LoadScore {
                source: etude_core::ScoreSource::Text("G4 A4 B4".to_string()),
            },
            ms(0),
        )
        .expect("load");

    let events = engine.drain_events();
    assert!(events.contains(&Event::ScoreLoaded {
        title: None,
        positions: 3
    }));
    start(&mut engine, ms(0));
    engine.observe(Some(heard(Letter::G, Accidental::Natural, 4)), ms(50));
    assert_eq!(engine.position(), Some(1));
}
