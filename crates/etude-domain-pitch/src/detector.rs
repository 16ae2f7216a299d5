use crate::estimator::PitchEstimator;
use crate::mapper::NoteMapper;
use etude_ports::audio::AudioFrame;
use etude_ports::pitch::{NoteObservation, PitchObservation};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchGate {
    pub confidence_threshold: f32,
    pub loudness_threshold: f32,
}

impl PitchGate {
    /// Both measurements must be strictly above their thresholds.
    pub fn passes(&self, pitch: &PitchObservation) -> bool {
        pitch.confidence > self.confidence_threshold && pitch.loudness > self.loudness_threshold
    }
}

impl Default for PitchGate {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            loudness_threshold: 0.01,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub pitch: PitchObservation,
    pub note: Option<NoteObservation>,
}

/// Estimator, gate and mapper chained for one analysis tick.
pub struct NoteDetector {
    estimator: PitchEstimator,
    mapper: NoteMapper,
    gate: PitchGate,
}

impl NoteDetector {
    pub fn new(window_size: usize, mapper: NoteMapper, gate: PitchGate) -> Self {
        Self {
            estimator: PitchEstimator::new(window_size),
            mapper,
            gate,
        }
    }

    pub fn detect(&mut self, frame: &AudioFrame) -> Detection {
        let pitch = self.estimator.estimate(frame);
        let note = if self.gate.passes(&pitch) {
            self.mapper.map(pitch.frequency_hz)
        } else {
            None
        };
        Detection { pitch, note }
    }

    pub fn set_gate(&mut self, gate: PitchGate) {
        self.gate = gate;
    }

    pub fn gate(&self) -> PitchGate {
        self.gate
    }

    pub fn mapper(&self) -> &NoteMapper {
        &self.mapper
    }

    pub fn window_size(&self) -> usize {
        self.estimator.window_size()
    }
}
