use etude_domain_score::{parse_pitch_text, PitchTextError, PracticeScore};
use etude_ports::pitch::{Accidental, ExpectedNote, Letter};
use pretty_assertions::assert_eq;

#[test]
fn descriptive_form_is_parsed() {
    let note = parse_pitch_text("Key: C#, octave: 4").expect("note");
    assert_eq!(note, ExpectedNote::new(Letter::C, Accidental::Sharp, 4));

    let note = parse_pitch_text("key: Bb octave: -1").expect("note");
    assert_eq!(note, ExpectedNote::new(Letter::B, Accidental::Flat, -1));
}

#[test]
fn compact_form_is_parsed() {
    assert_eq!(
        parse_pitch_text("Db4").expect("note"),
        ExpectedNote::new(Letter::D, Accidental::Flat, 4)
    );
    assert_eq!(
        parse_pitch_text(" G5 ").expect("note"),
        ExpectedNote::new(Letter::G, Accidental::Natural, 5)
    );
}

#[test]
fn malformed_text_is_rejected() {
    assert!(matches!(parse_pitch_text("H4"), Err(PitchTextError::UnknownLetter(_))));
    assert!(matches!(parse_pitch_text("C"), Err(PitchTextError::Malformed(_))));
    assert!(matches!(parse_pitch_text(""), Err(PitchTextError::Malformed(_))));
    assert!(matches!(parse_pitch_text("Key: C#"), Err(PitchTextError::Malformed(_))));
}

#[test]
fn text_scores_build_positions() {
    let score = PracticeScore::from_text("C4 E4+G4/8 r/2 Bb3").expect("score");

    assert_eq!(score.len(), 4);
    assert_eq!(score.positions[0].length, Some(0.25));
    assert_eq!(score.positions[1].notes.len(), 2);
    assert_eq!(score.positions[1].length, Some(0.125));
    assert!(score.positions[2].is_rest());
    assert_eq!(score.positions[2].length, Some(0.5));
    assert_eq!(
        score.positions[3].notes,
        vec![ExpectedNote::new(Letter::B, Accidental::Flat, 3)]
    );
}

#[test]
fn malformed_chord_members_are_dropped() {
    let score = PracticeScore::from_text("C4+X9").expect("score");
    assert_eq!(
        score.positions[0].notes,
        vec![ExpectedNote::new(Letter::C, Accidental::Natural, 4)]
    );

    assert!(PracticeScore::from_text("X9").is_err());
    assert!(PracticeScore::from_text("C4/0").is_err());
}
