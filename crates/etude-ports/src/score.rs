use crate::pitch::ExpectedNote;
use crate::types::PositionIndex;
use std::time::Duration;

/// Narrow view of a traversable score.
///
/// Implementations own the cursor; the engine only reads the notes under it
/// and asks it to move.
pub trait ScorePositionProvider: Send {
    /// Notes sounding at the cursor. Empty for rests and at end-of-score.
    fn expected_notes_at_cursor(&self) -> Vec<ExpectedNote>;

    /// Moves to the next position. No-op once the end is reached.
    fn advance(&mut self);

    /// Rewinds to the first position.
    fn reset(&mut self);

    /// How long the current position lasts at `tempo_bpm`.
    /// Positions without a usable length count as one quarter note.
    fn duration_of_current_position(&self, tempo_bpm: f64) -> Duration;

    fn is_end_reached(&self) -> bool;

    /// `None` once the end is reached.
    fn position_index(&self) -> Option<PositionIndex>;

    fn position_count(&self) -> usize;
}

/// Milliseconds in one quarter note at `tempo_bpm`.
pub fn quarter_note_ms(tempo_bpm: f64) -> f64 {
    60_000.0 / tempo_bpm
}

/// Duration of a note whose length is given as a fraction of a whole note
/// (quarter = 0.25). Saturates at `Duration::MAX` instead of overflowing.
pub fn whole_note_fraction_to_duration(length: f64, tempo_bpm: f64) -> Duration {
    let ms = length * 4.0 * quarter_note_ms(tempo_bpm);
    let ms = if ms.is_finite() && ms > 0.0 {
        ms
    } else {
        quarter_note_ms(tempo_bpm)
    };
    ms_to_duration(ms)
}

fn ms_to_duration(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(ms / 1000.0).unwrap_or(Duration::MAX)
}
