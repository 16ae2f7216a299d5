use crate::session::SessionState;
use etude_ports::pitch::NoteObservation;
use etude_ports::storage::SettingsDto;
use etude_ports::types::{AudioInputDevice, DeviceId, PositionIndex};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ScoreSource {
    MusicXmlFile(String),
    /// Compact note text, e.g. `"C4 E4+G4/8 r/2"`.
    Text(String),
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Command {
    ListAudioInputs,
    SelectAudioInput { device_id: DeviceId },
    LoadScore { source: ScoreSource },
    Start,
    Stop,
    Resume,
    Reset,
    SetTempo { bpm: f64 },
    SetThresholds { confidence: f32, loudness: f32 },
    ExportDiagnostics { path: String },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum Event {
    AudioInputsUpdated { devices: Vec<AudioInputDevice> },
    SettingsUpdated { settings: SettingsDto },
    ScoreLoaded { title: Option<String>, positions: usize },
    SessionStateChanged { state: SessionState },
    /// `None` when the gate rejects the window or the pitch is unmappable.
    NoteDetected { note: Option<NoteObservation> },
    CursorMoved { position: Option<PositionIndex> },
    PositionHit { position: PositionIndex },
    PositionMissed { position: PositionIndex },
    NoteMismatched { position: PositionIndex, note: NoteObservation },
    StatsUpdated { hit: u32, missed: u32, mismatched: u32, accuracy: f32 },
    ScoreCompleted,
}
