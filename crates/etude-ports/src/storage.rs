use crate::types::*;
use serde::{Deserialize, Serialize};

fn default_confidence_threshold() -> f32 {
    0.8
}

fn default_loudness_threshold() -> f32 {
    0.01
}

fn default_tempo_bpm() -> f64 {
    60.0
}

fn default_analysis_window_size() -> usize {
    2048
}

fn default_reference_pitch_hz() -> f32 {
    440.0
}

fn default_sample_rate_hz() -> u32 {
    48_000
}

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(String),
    #[error("serialization error: {0}")]
    Serde(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsDto {
    pub selected_audio_in: Option<DeviceId>,
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: u32,
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,
    #[serde(default = "default_loudness_threshold")]
    pub loudness_threshold: f32,
    #[serde(default = "default_tempo_bpm")]
    pub tempo_bpm: f64,
    #[serde(default = "default_analysis_window_size")]
    pub analysis_window_size: usize,
    #[serde(default = "default_reference_pitch_hz")]
    pub reference_pitch_hz: f32,
}

impl Default for SettingsDto {
    fn default() -> Self {
        Self {
            selected_audio_in: None,
            sample_rate_hz: default_sample_rate_hz(),
            confidence_threshold: default_confidence_threshold(),
            loudness_threshold: default_loudness_threshold(),
            tempo_bpm: default_tempo_bpm(),
            analysis_window_size: default_analysis_window_size(),
            reference_pitch_hz: default_reference_pitch_hz(),
        }
    }
}

pub trait StoragePort: Send + Sync {
    fn load_settings(&self) -> Result<SettingsDto, StorageError>;
    fn save_settings(&self, s: &SettingsDto) -> Result<(), StorageError>;
}
