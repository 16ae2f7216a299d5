use crate::model::{PracticeScore, QUARTER};
use etude_ports::pitch::ExpectedNote;
use etude_ports::score::{whole_note_fraction_to_duration, ScorePositionProvider};
use etude_ports::types::PositionIndex;
use std::time::Duration;

/// In-memory cursor over a [`PracticeScore`].
#[derive(Clone, Debug)]
pub struct ScoreCursor {
    score: PracticeScore,
    index: usize,
}

impl ScoreCursor {
    pub fn new(score: PracticeScore) -> Self {
        Self { score, index: 0 }
    }

    pub fn score(&self) -> &PracticeScore {
        &self.score
    }
}

impl ScorePositionProvider for ScoreCursor {
    fn expected_notes_at_cursor(&self) -> Vec<ExpectedNote> {
        self.score
            .positions
            .get(self.index)
            .map(|position| position.notes.clone())
            .unwrap_or_default()
    }

    fn advance(&mut self) {
        if self.index < self.score.positions.len() {
            self.index += 1;
        }
    }

    fn reset(&mut self) {
        self.index = 0;
    }

    fn duration_of_current_position(&self, tempo_bpm: f64) -> Duration {
        let length = self
            .score
            .positions
            .get(self.index)
            .and_then(|position| position.length)
            .filter(|length| length.is_finite() && *length > 0.0)
            .unwrap_or(QUARTER);
        whole_note_fraction_to_duration(length, tempo_bpm)
    }

    fn is_end_reached(&self) -> bool {
        self.index >= self.score.positions.len()
    }

    fn position_index(&self) -> Option<PositionIndex> {
        (!self.is_end_reached()).then_some(self.index)
    }

    fn position_count(&self) -> usize {
        self.score.positions.len()
    }
}
