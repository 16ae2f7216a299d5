use etude_domain_pitch::NoteMapper;
use etude_ports::audio::{AudioError, AudioFrame, FrameSource};
use etude_ports::pitch::{Accidental, Letter};
use parking_lot::Mutex;
use std::f32::consts::TAU;
use std::sync::Arc;

/// Frame source that renders a sine at a chosen pitch.
///
/// Clones share state, so one clone can be handed to the engine while
/// another selects what it hears. Each frame continues the phase of the
/// previous one.
#[derive(Clone)]
pub struct SyntheticToneSource {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug)]
struct Inner {
    sample_rate_hz: u32,
    mapper: NoteMapper,
    frequency_hz: Option<f32>,
    amplitude: f32,
    noise_level: f32,
    phase: f32,
    rng_state: u32,
}

impl SyntheticToneSource {
    pub fn new(sample_rate_hz: u32) -> Self {
        Self::with_mapper(sample_rate_hz, NoteMapper::default())
    }

    /// Uses `mapper` to turn spelled pitches into frequencies, so a source
    /// built with the engine's reference pitch stays in tune with it.
    pub fn with_mapper(sample_rate_hz: u32, mapper: NoteMapper) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                sample_rate_hz,
                mapper,
                frequency_hz: None,
                amplitude: 0.5,
                noise_level: 0.0,
                phase: 0.0,
                rng_state: 0x9E37_79B9,
            })),
        }
    }

    pub fn inject(&self, letter: Letter, accidental: Accidental, octave: i32) {
        let mut inner = self.inner.lock();
        let hz = inner.mapper.frequency_of(letter, accidental, octave);
        inner.frequency_hz = Some(hz);
    }

    pub fn inject_frequency(&self, frequency_hz: f32) {
        self.inner.lock().frequency_hz = Some(frequency_hz);
    }

    pub fn silence(&self) {
        self.inner.lock().frequency_hz = None;
    }

    pub fn set_amplitude(&self, amplitude: f32) {
        self.inner.lock().amplitude = amplitude.clamp(0.0, 1.0);
    }

    /// Peak level of uniform white noise mixed into every frame.
    pub fn set_noise_level(&self, level: f32) {
        self.inner.lock().noise_level = level.max(0.0);
    }

    pub fn frequency_hz(&self) -> Option<f32> {
        self.inner.lock().frequency_hz
    }

    pub fn sample_rate_hz(&self) -> u32 {
        self.inner.lock().sample_rate_hz
    }
}

impl Inner {
    fn render(&mut self, window_size: usize) -> Vec<f32> {
        let mut samples = Vec::with_capacity(window_size);
        let step = self
            .frequency_hz
            .map(|hz| TAU * hz / self.sample_rate_hz as f32);

        for _ in 0..window_size {
            let mut value = 0.0;
            if let Some(step) = step {
                value += self.amplitude * self.phase.sin();
                self.phase += step;
                if self.phase >= TAU {
                    self.phase -= TAU;
                }
            }
            if self.noise_level > 0.0 {
                value += self.noise_level * self.next_noise();
            }
            samples.push(value);
        }
        samples
    }

    /// xorshift32 mapped to [-1, 1).
    fn next_noise(&mut self) -> f32 {
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng_state = x;
        (x as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl FrameSource for SyntheticToneSource {
    fn latest_frame(&mut self, window_size: usize) -> Result<Option<AudioFrame>, AudioError> {
        let mut inner = self.inner.lock();
        let samples = inner.render(window_size);
        Ok(Some(AudioFrame::new(samples, inner.sample_rate_hz)))
    }
}
