use etude_domain_pitch::PitchGate;
use etude_ports::storage::SettingsDto;

const MIN_WINDOW_SIZE: usize = 64;
pub const MIN_TEMPO_BPM: f64 = 1.0;
pub const MAX_TEMPO_BPM: f64 = 1000.0;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("analysis window must be a power of two >= 64, got {0}")]
    WindowSize(usize),
    #[error("tempo must be between 1 and 1000 BPM, got {0}")]
    Tempo(f64),
    #[error("{name} threshold must be finite and non-negative, got {value}")]
    Threshold { name: &'static str, value: f32 },
    #[error("reference pitch must be positive and finite, got {0}")]
    ReferencePitch(f32),
    #[error("sample rate must be positive")]
    SampleRate,
}

/// Validated runtime settings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    pub window_size: usize,
    pub tempo_bpm: f64,
    pub gate: PitchGate,
    pub reference_pitch_hz: f32,
    pub sample_rate_hz: u32,
}

impl EngineConfig {
    pub fn from_settings(settings: &SettingsDto) -> Result<Self, ConfigError> {
        let window_size = settings.analysis_window_size;
        if window_size < MIN_WINDOW_SIZE || !window_size.is_power_of_two() {
            return Err(ConfigError::WindowSize(window_size));
        }
        if settings.sample_rate_hz == 0 {
            return Err(ConfigError::SampleRate);
        }
        let reference = settings.reference_pitch_hz;
        if !reference.is_finite() || reference <= 0.0 {
            return Err(ConfigError::ReferencePitch(reference));
        }

        Ok(Self {
            window_size,
            tempo_bpm: validate_tempo(settings.tempo_bpm)?,
            gate: validate_gate(settings.confidence_threshold, settings.loudness_threshold)?,
            reference_pitch_hz: reference,
            sample_rate_hz: settings.sample_rate_hz,
        })
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            window_size: 2048,
            tempo_bpm: 60.0,
            gate: PitchGate::default(),
            reference_pitch_hz: 440.0,
            sample_rate_hz: 48_000,
        }
    }
}

pub fn validate_tempo(bpm: f64) -> Result<f64, ConfigError> {
    if (MIN_TEMPO_BPM..=MAX_TEMPO_BPM).contains(&bpm) {
        Ok(bpm)
    } else {
        Err(ConfigError::Tempo(bpm))
    }
}

pub fn validate_gate(confidence: f32, loudness: f32) -> Result<PitchGate, ConfigError> {
    for (name, value) in [("confidence", confidence), ("loudness", loudness)] {
        if !value.is_finite() || value < 0.0 {
            return Err(ConfigError::Threshold { name, value });
        }
    }
    Ok(PitchGate {
        confidence_threshold: confidence,
        loudness_threshold: loudness,
    })
}
