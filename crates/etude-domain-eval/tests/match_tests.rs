use etude_domain_eval::{MatchDecision, MatchEngine, PracticeStats};
use etude_ports::pitch::{Accidental, ExpectedNote, Letter, NoteObservation, PitchClass};
use pretty_assertions::assert_eq;

fn heard(letter: Letter, accidental: Accidental, octave: i32) -> NoteObservation {
    NoteObservation {
        pitch_class: PitchClass { letter, accidental },
        octave,
        cents_offset: 0.0,
        frequency_hz: 0.0,
    }
}

fn expect(letter: Letter, accidental: Accidental, octave: i32) -> ExpectedNote {
    ExpectedNote::new(letter, accidental, octave)
}

#[test]
fn exact_note_is_a_hit() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));

    let decision = engine.evaluate(
        &heard(Letter::C, Accidental::Natural, 4),
        &[expect(Letter::C, Accidental::Natural, 4)],
    );

    assert_eq!(
        decision,
        MatchDecision::Hit {
            note: expect(Letter::C, Accidental::Natural, 4)
        }
    );
    assert!(engine.is_satisfied());
}

#[test]
fn flat_spelling_matches_sounding_sharp() {
    let pairs = [
        (Letter::D, Letter::C),
        (Letter::E, Letter::D),
        (Letter::G, Letter::F),
        (Letter::A, Letter::G),
        (Letter::B, Letter::A),
    ];
    for (flat, sharp) in pairs {
        let mut engine = MatchEngine::new();
        engine.enter_position(Some(0));
        let decision = engine.evaluate(
            &heard(sharp, Accidental::Sharp, 4),
            &[expect(flat, Accidental::Flat, 4)],
        );
        assert!(
            matches!(decision, MatchDecision::Hit { .. }),
            "{:?} flat should match {:?} sharp",
            flat,
            sharp
        );
    }
}

#[test]
fn cb_and_fb_are_never_matched() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));

    let decision = engine.evaluate(
        &heard(Letter::B, Accidental::Natural, 3),
        &[expect(Letter::C, Accidental::Flat, 4)],
    );
    assert_eq!(decision, MatchDecision::Miss { mismatches: 1 });

    let decision = engine.evaluate(
        &heard(Letter::E, Accidental::Natural, 4),
        &[expect(Letter::F, Accidental::Flat, 4)],
    );
    assert_eq!(decision, MatchDecision::Miss { mismatches: 2 });
}

#[test]
fn wrong_octave_is_a_miss() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));

    let decision = engine.evaluate(
        &heard(Letter::C, Accidental::Natural, 5),
        &[expect(Letter::C, Accidental::Natural, 4)],
    );

    assert_eq!(decision, MatchDecision::Miss { mismatches: 1 });
    assert!(!engine.is_satisfied());
}

#[test]
fn sustained_wrong_note_counts_once() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));
    let expected = [expect(Letter::C, Accidental::Natural, 4)];
    let wrong = heard(Letter::D, Accidental::Natural, 4);

    assert_eq!(engine.evaluate(&wrong, &expected), MatchDecision::Miss { mismatches: 1 });
    assert_eq!(engine.evaluate(&wrong, &expected), MatchDecision::Miss { mismatches: 1 });
    assert_eq!(
        engine.evaluate(&heard(Letter::E, Accidental::Natural, 4), &expected),
        MatchDecision::Miss { mismatches: 2 }
    );

    engine.release();
    assert_eq!(
        engine.evaluate(&heard(Letter::E, Accidental::Natural, 4), &expected),
        MatchDecision::Miss { mismatches: 3 }
    );
}

#[test]
fn any_chord_member_satisfies_the_position() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(3));
    let chord = [
        expect(Letter::C, Accidental::Natural, 4),
        expect(Letter::E, Accidental::Natural, 4),
        expect(Letter::G, Accidental::Natural, 4),
    ];

    let decision = engine.evaluate(&heard(Letter::G, Accidental::Natural, 4), &chord);

    assert_eq!(
        decision,
        MatchDecision::Hit {
            note: expect(Letter::G, Accidental::Natural, 4)
        }
    );
    assert_eq!(engine.position(), Some(3));
}

#[test]
fn hit_is_terminal_until_next_position() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));
    let expected = [expect(Letter::A, Accidental::Natural, 4)];
    let note = heard(Letter::A, Accidental::Natural, 4);

    assert!(matches!(engine.evaluate(&note, &expected), MatchDecision::Hit { .. }));
    assert_eq!(engine.evaluate(&note, &expected), MatchDecision::NoDecision);
    assert_eq!(
        engine.evaluate(&heard(Letter::B, Accidental::Natural, 4), &expected),
        MatchDecision::NoDecision
    );

    engine.enter_position(Some(1));
    assert!(matches!(engine.evaluate(&note, &expected), MatchDecision::Hit { .. }));
}

#[test]
fn empty_expected_set_gives_no_decision() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));

    let decision = engine.evaluate(&heard(Letter::C, Accidental::Natural, 4), &[]);

    assert_eq!(decision, MatchDecision::NoDecision);
    assert_eq!(engine.mismatches(), 0);
}

#[test]
fn entering_a_position_clears_mismatches() {
    let mut engine = MatchEngine::new();
    engine.enter_position(Some(0));
    let expected = [expect(Letter::D, Accidental::Natural, 4)];

    engine.evaluate(&heard(Letter::E, Accidental::Natural, 4), &expected);
    engine.evaluate(&heard(Letter::F, Accidental::Natural, 4), &expected);
    assert_eq!(engine.mismatches(), 2);

    engine.enter_position(Some(1));
    assert_eq!(engine.mismatches(), 0);
}

#[test]
fn stats_accuracy_counts_judged_positions() {
    let mut stats = PracticeStats::default();
    assert_eq!(stats.accuracy(), 0.0);

    stats.record_hit();
    stats.record_hit();
    stats.record_hit();
    stats.record_miss();
    stats.record_mismatch();

    assert_eq!(stats.accuracy(), 0.75);
    assert_eq!(
        stats,
        PracticeStats {
            hit: 3,
            missed: 1,
            mismatched: 1,
        }
    );

    stats.reset();
    assert_eq!(stats, PracticeStats::default());
}
