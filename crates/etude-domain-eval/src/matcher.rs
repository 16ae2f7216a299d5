use etude_ports::pitch::{ExpectedNote, NoteObservation, PitchClass};
use etude_ports::types::PositionIndex;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchDecision {
    Hit { note: ExpectedNote },
    /// Wrong note heard. `mismatches` counts distinct wrong notes at this
    /// position so far; a sustained wrong note counts once.
    Miss { mismatches: u32 },
    NoDecision,
}

#[derive(Debug, Default)]
struct PositionState {
    index: Option<PositionIndex>,
    satisfied: bool,
    mismatches: u32,
    last_wrong: Option<(PitchClass, i32)>,
}

/// Decides whether an observed pitch satisfies the notes expected at a
/// position.
///
/// Any expected note matching pitch class and octave is a hit; chords need
/// only one member. Flat spellings compare equal to the sharp they sound as.
/// After a hit the engine answers `NoDecision` until the next position is
/// entered.
#[derive(Debug, Default)]
pub struct MatchEngine {
    state: PositionState,
}

impl MatchEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts judging a new position and clears the hit flag.
    pub fn enter_position(&mut self, index: Option<PositionIndex>) {
        self.state = PositionState {
            index,
            ..PositionState::default()
        };
    }

    pub fn evaluate(
        &mut self,
        observation: &NoteObservation,
        expected: &[ExpectedNote],
    ) -> MatchDecision {
        if expected.is_empty() || self.state.satisfied {
            return MatchDecision::NoDecision;
        }

        let observed = observation.pitch_class.normalized();
        let matched = expected.iter().find(|note| {
            note.pitch_class.normalized() == observed && note.octave == observation.octave
        });

        match matched {
            Some(note) => {
                self.state.satisfied = true;
                MatchDecision::Hit { note: *note }
            }
            None => {
                let wrong = (observed, observation.octave);
                if self.state.last_wrong != Some(wrong) {
                    self.state.last_wrong = Some(wrong);
                    self.state.mismatches = self.state.mismatches.saturating_add(1);
                    log::debug!(
                        "position {:?}: heard {}, expected {:?}",
                        self.state.index,
                        observation,
                        expected
                    );
                }
                MatchDecision::Miss {
                    mismatches: self.state.mismatches,
                }
            }
        }
    }

    /// Nothing audible. The next wrong note counts again even if it repeats
    /// the previous one.
    pub fn release(&mut self) {
        self.state.last_wrong = None;
    }

    pub fn position(&self) -> Option<PositionIndex> {
        self.state.index
    }

    pub fn is_satisfied(&self) -> bool {
        self.state.satisfied
    }

    pub fn mismatches(&self) -> u32 {
        self.state.mismatches
    }
}
