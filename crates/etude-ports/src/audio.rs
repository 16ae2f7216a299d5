use crate::types::*;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum AudioError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("unsupported config: {0}")]
    UnsupportedConfig(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// One analysis window of mono samples.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioFrame {
    pub samples: Vec<f32>,
    pub sample_rate_hz: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Yields the most recent analysis window on demand.
///
/// `Ok(None)` means no audio is available yet; the engine treats it the same
/// as silence.
pub trait FrameSource: Send {
    fn latest_frame(&mut self, window_size: usize) -> Result<Option<AudioFrame>, AudioError>;
}

/// Capture callback: called from the backend's audio thread, must be realtime-safe.
/// Receives mono samples.
pub trait AudioCaptureCallback: Send + Sync + 'static {
    fn capture(&self, sample_time_start: SampleTime, samples: &[f32]);
}

pub trait AudioStreamHandle: Send {
    fn close(self: Box<Self>);
}

pub trait AudioInputPort: Send + Sync {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError>;

    fn open_input(
        &self,
        device_id: &DeviceId,
        config: AudioConfig,
        cb: Arc<dyn AudioCaptureCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError>;
}
