use crate::pitch_text::{parse_pitch_text, PitchTextError};
use etude_ports::pitch::ExpectedNote;
use serde::{Deserialize, Serialize};

/// Whole-note fraction of a quarter note.
pub const QUARTER: f64 = 0.25;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreMeta {
    pub title: Option<String>,
    pub origin: ScoreOrigin,
    /// Tempo marked in the source, if any. Sessions may still override it.
    pub tempo_bpm: Option<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreOrigin {
    MusicXml,
    Text,
    Internal,
}

/// Everything sounding at one onset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScorePosition {
    /// Empty for a rest.
    pub notes: Vec<ExpectedNote>,
    /// Length as a fraction of a whole note (quarter = 0.25).
    pub length: Option<f64>,
    pub measure_index: Option<u32>,
}

impl ScorePosition {
    pub fn new(notes: Vec<ExpectedNote>, length: Option<f64>) -> Self {
        Self {
            notes,
            length,
            measure_index: None,
        }
    }

    pub fn rest(length: Option<f64>) -> Self {
        Self::new(Vec::new(), length)
    }

    pub fn is_rest(&self) -> bool {
        self.notes.is_empty()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PracticeScore {
    pub meta: ScoreMeta,
    pub positions: Vec<ScorePosition>,
}

impl PracticeScore {
    pub fn new(meta: ScoreMeta, positions: Vec<ScorePosition>) -> Self {
        Self { meta, positions }
    }

    pub fn from_positions(positions: Vec<ScorePosition>) -> Self {
        Self::new(
            ScoreMeta {
                title: None,
                origin: ScoreOrigin::Internal,
                tempo_bpm: None,
            },
            positions,
        )
    }

    /// Builds a score from a compact text line.
    ///
    /// Positions are separated by whitespace, chord members by `+`, `r` is a
    /// rest and an optional `/n` suffix sets the length to 1/n of a whole
    /// note: `"C4 E4+G4/8 r/2 Bb3"`. Chord members that cannot be parsed are
    /// dropped with a warning; a position token that is entirely malformed is
    /// an error.
    pub fn from_text(text: &str) -> Result<Self, PitchTextError> {
        let mut positions = Vec::new();
        for token in text.split_whitespace() {
            positions.push(parse_position_token(token)?);
        }
        Ok(Self::new(
            ScoreMeta {
                title: None,
                origin: ScoreOrigin::Text,
                tempo_bpm: None,
            },
            positions,
        ))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

fn parse_position_token(token: &str) -> Result<ScorePosition, PitchTextError> {
    let (body, length) = match token.split_once('/') {
        Some((body, denom)) => {
            let denom = denom
                .parse::<u32>()
                .ok()
                .filter(|d| *d > 0)
                .ok_or_else(|| PitchTextError::Malformed(token.to_string()))?;
            (body, Some(1.0 / denom as f64))
        }
        None => (token, Some(QUARTER)),
    };

    if body.eq_ignore_ascii_case("r") {
        return Ok(ScorePosition::rest(length));
    }

    let mut notes = Vec::new();
    for member in body.split('+') {
        match parse_pitch_text(member) {
            Ok(note) => notes.push(note),
            Err(err) => log::warn!("skipping chord member {:?}: {}", member, err),
        }
    }
    if notes.is_empty() {
        return Err(PitchTextError::Malformed(token.to_string()));
    }
    Ok(ScorePosition::new(notes, length))
}
