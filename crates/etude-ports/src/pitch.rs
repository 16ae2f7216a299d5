use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Letter {
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Accidental {
    Natural,
    Sharp,
    /// Only appears in score spellings; detected notes are always sharps.
    Flat,
}

/// Letter plus accidental, independent of octave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PitchClass {
    pub letter: Letter,
    pub accidental: Accidental,
}

/// Twelve-tone table indexed by `midi % 12`.
pub const CHROMATIC: [PitchClass; 12] = [
    PitchClass::natural(Letter::C),
    PitchClass::sharp(Letter::C),
    PitchClass::natural(Letter::D),
    PitchClass::sharp(Letter::D),
    PitchClass::natural(Letter::E),
    PitchClass::natural(Letter::F),
    PitchClass::sharp(Letter::F),
    PitchClass::natural(Letter::G),
    PitchClass::sharp(Letter::G),
    PitchClass::natural(Letter::A),
    PitchClass::sharp(Letter::A),
    PitchClass::natural(Letter::B),
];

impl Letter {
    pub const ALL: [Letter; 7] = [
        Letter::C,
        Letter::D,
        Letter::E,
        Letter::F,
        Letter::G,
        Letter::A,
        Letter::B,
    ];

    /// Semitones above C within the same octave.
    pub fn semitone(self) -> i32 {
        match self {
            Letter::C => 0,
            Letter::D => 2,
            Letter::E => 4,
            Letter::F => 5,
            Letter::G => 7,
            Letter::A => 9,
            Letter::B => 11,
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'C' => Some(Letter::C),
            'D' => Some(Letter::D),
            'E' => Some(Letter::E),
            'F' => Some(Letter::F),
            'G' => Some(Letter::G),
            'A' => Some(Letter::A),
            'B' => Some(Letter::B),
            _ => None,
        }
    }

    fn previous(self) -> Self {
        match self {
            Letter::C => Letter::B,
            Letter::D => Letter::C,
            Letter::E => Letter::D,
            Letter::F => Letter::E,
            Letter::G => Letter::F,
            Letter::A => Letter::G,
            Letter::B => Letter::A,
        }
    }
}

impl Accidental {
    pub fn semitone_shift(self) -> i32 {
        match self {
            Accidental::Natural => 0,
            Accidental::Sharp => 1,
            Accidental::Flat => -1,
        }
    }
}

impl PitchClass {
    pub const fn natural(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Natural,
        }
    }

    pub const fn sharp(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Sharp,
        }
    }

    pub const fn flat(letter: Letter) -> Self {
        Self {
            letter,
            accidental: Accidental::Flat,
        }
    }

    /// Rewrites Db, Eb, Gb, Ab and Bb as their sharp equivalents. Every other
    /// spelling (including Cb and Fb) is returned unchanged.
    pub fn normalized(self) -> Self {
        match (self.letter, self.accidental) {
            (Letter::D | Letter::E | Letter::G | Letter::A | Letter::B, Accidental::Flat) => {
                PitchClass::sharp(self.letter.previous())
            }
            _ => self,
        }
    }
}

impl fmt::Display for Letter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = match self {
            Letter::C => 'C',
            Letter::D => 'D',
            Letter::E => 'E',
            Letter::F => 'F',
            Letter::G => 'G',
            Letter::A => 'A',
            Letter::B => 'B',
        };
        write!(f, "{}", c)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.accidental {
            Accidental::Natural => write!(f, "{}", self.letter),
            Accidental::Sharp => write!(f, "{}#", self.letter),
            Accidental::Flat => write!(f, "{}b", self.letter),
        }
    }
}

/// Raw estimator output for one analysis window.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PitchObservation {
    pub frequency_hz: f32,
    pub confidence: f32,
    pub loudness: f32,
}

impl PitchObservation {
    pub const SILENT: PitchObservation = PitchObservation {
        frequency_hz: 0.0,
        confidence: 0.0,
        loudness: 0.0,
    };
}

/// A detected tempered pitch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NoteObservation {
    pub pitch_class: PitchClass,
    pub octave: i32,
    pub cents_offset: f32,
    pub frequency_hz: f32,
}

/// A note the score expects at the cursor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpectedNote {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl ExpectedNote {
    pub fn new(letter: Letter, accidental: Accidental, octave: i32) -> Self {
        Self {
            pitch_class: PitchClass { letter, accidental },
            octave,
        }
    }
}

impl fmt::Display for NoteObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}

impl fmt::Display for ExpectedNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class, self.octave)
    }
}
