use etude_ports::pitch::{Accidental, Letter, NoteObservation, PitchClass, CHROMATIC};

pub const DEFAULT_REFERENCE_PITCH_HZ: f32 = 440.0;
const A4_MIDI: i32 = 69;

/// Maps frequencies onto the nearest equal-tempered pitch.
#[derive(Clone, Copy, Debug)]
pub struct NoteMapper {
    reference_hz: f64,
}

impl NoteMapper {
    pub fn new(reference_hz: f32) -> Self {
        Self {
            reference_hz: reference_hz as f64,
        }
    }

    pub fn reference_hz(&self) -> f32 {
        self.reference_hz as f32
    }

    /// Nearest tempered pitch, or `None` for non-positive input and pitches
    /// below MIDI note 0.
    pub fn map(&self, frequency_hz: f32) -> Option<NoteObservation> {
        let frequency = frequency_hz as f64;
        if !frequency.is_finite() || frequency <= 0.0 || self.reference_hz <= 0.0 {
            return None;
        }

        let note_number = 12.0 * (frequency / self.reference_hz).log2();
        let midi = note_number.round() as i64 + A4_MIDI as i64;
        if midi < 0 || midi > i32::MAX as i64 {
            return None;
        }
        let midi = midi as i32;

        let pitch_class = CHROMATIC[midi.rem_euclid(12) as usize];
        let octave = midi.div_euclid(12) - 1;
        let desired = self.midi_frequency(midi);
        let cents_offset = 1200.0 * (frequency / desired).log2();

        Some(NoteObservation {
            pitch_class,
            octave,
            cents_offset: cents_offset as f32,
            frequency_hz,
        })
    }

    /// Tempered frequency of a spelled pitch.
    pub fn frequency_of(&self, letter: Letter, accidental: Accidental, octave: i32) -> f32 {
        let midi = midi_number(PitchClass { letter, accidental }, octave);
        self.midi_frequency(midi) as f32
    }

    fn midi_frequency(&self, midi: i32) -> f64 {
        self.reference_hz * 2f64.powf((midi - A4_MIDI) as f64 / 12.0)
    }
}

impl Default for NoteMapper {
    fn default() -> Self {
        Self::new(DEFAULT_REFERENCE_PITCH_HZ)
    }
}

/// MIDI note number of a spelled pitch (C4 = 60).
pub fn midi_number(pitch_class: PitchClass, octave: i32) -> i32 {
    (octave + 1) * 12 + pitch_class.letter.semitone() + pitch_class.accidental.semitone_shift()
}
