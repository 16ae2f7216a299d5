use etude_domain_score::{PracticeScore, ScoreCursor, ScorePosition};
use etude_ports::pitch::{Accidental, ExpectedNote, Letter};
use etude_ports::score::ScorePositionProvider;
use std::time::Duration;

fn two_note_score() -> ScoreCursor {
    ScoreCursor::new(PracticeScore::from_positions(vec![
        ScorePosition::new(
            vec![ExpectedNote::new(Letter::C, Accidental::Natural, 4)],
            Some(0.25),
        ),
        ScorePosition::new(
            vec![ExpectedNote::new(Letter::E, Accidental::Natural, 4)],
            Some(0.5),
        ),
    ]))
}

#[test]
fn quarter_note_at_sixty_bpm_lasts_one_second() {
    let cursor = two_note_score();
    assert_eq!(cursor.duration_of_current_position(60.0), Duration::from_millis(1000));
    assert_eq!(cursor.duration_of_current_position(120.0), Duration::from_millis(500));
}

#[test]
fn missing_length_defaults_to_a_quarter_note() {
    let cursor = ScoreCursor::new(PracticeScore::from_positions(vec![ScorePosition::new(
        vec![ExpectedNote::new(Letter::A, Accidental::Natural, 4)],
        None,
    )]));
    let duration = cursor.duration_of_current_position(90.0);
    assert!((duration.as_secs_f64() - 60.0 / 90.0).abs() < 1e-6);
}

#[test]
fn advance_stops_at_the_end() {
    let mut cursor = two_note_score();
    assert_eq!(cursor.position_index(), Some(0));
    assert_eq!(cursor.position_count(), 2);

    cursor.advance();
    assert_eq!(cursor.position_index(), Some(1));
    assert_eq!(cursor.duration_of_current_position(60.0), Duration::from_millis(2000));

    cursor.advance();
    assert!(cursor.is_end_reached());
    assert_eq!(cursor.position_index(), None);
    assert!(cursor.expected_notes_at_cursor().is_empty());

    cursor.advance();
    assert!(cursor.is_end_reached());
}

#[test]
fn reset_returns_to_the_first_position() {
    let mut cursor = two_note_score();
    cursor.advance();
    cursor.advance();
    cursor.reset();

    assert_eq!(cursor.position_index(), Some(0));
    assert_eq!(
        cursor.expected_notes_at_cursor(),
        vec![ExpectedNote::new(Letter::C, Accidental::Natural, 4)]
    );
}
