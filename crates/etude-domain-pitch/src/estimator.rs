//! Fundamental frequency estimation using the McLeod Pitch Method.
//!
//! The normalized square difference function (NSDF) is built from an
//! FFT-based autocorrelation. Key maxima are the highest points between
//! positive-going and negative-going zero crossings. The first key maximum
//! within `peak_cutoff` of the global best is taken as the pitch period, then
//! refined by parabolic interpolation. The NSDF value at that peak is the
//! confidence: 1.0 for a perfectly periodic window, falling towards 0.0 as
//! the window becomes noisy.

use etude_ports::audio::AudioFrame;
use etude_ports::pitch::PitchObservation;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_PEAK_CUTOFF: f32 = 0.9;

const MIN_WINDOW_SIZE: usize = 8;
const ENERGY_FLOOR: f32 = 1e-10;

pub struct PitchEstimator {
    window_size: usize,
    fft_size: usize,
    peak_cutoff: f32,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    centered: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    nsdf: Vec<f32>,
    key_maxima: Vec<(usize, f32)>,
}

impl PitchEstimator {
    pub fn new(window_size: usize) -> Self {
        Self::with_peak_cutoff(window_size, DEFAULT_PEAK_CUTOFF)
    }

    pub fn with_peak_cutoff(window_size: usize, peak_cutoff: f32) -> Self {
        let window_size = window_size.max(MIN_WINDOW_SIZE);
        let fft_size = autocorr_fft_size(window_size);
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_size);
        let inverse = planner.plan_fft_inverse(fft_size);
        Self {
            window_size,
            fft_size,
            peak_cutoff: peak_cutoff.clamp(0.0, 1.0),
            forward,
            inverse,
            centered: vec![0.0; window_size],
            spectrum: vec![Complex::new(0.0, 0.0); fft_size],
            nsdf: vec![0.0; window_size],
            key_maxima: Vec::with_capacity(64),
        }
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Analyzes one frame. Never fails: frames without a discernible period
    /// come back with zero frequency and zero confidence.
    pub fn estimate(&mut self, frame: &AudioFrame) -> PitchObservation {
        let loudness = rms(&frame.samples);
        if frame.samples.len() < MIN_WINDOW_SIZE || frame.sample_rate_hz == 0 {
            return PitchObservation {
                loudness,
                ..PitchObservation::SILENT
            };
        }
        if frame.samples.len() != self.window_size {
            *self = Self::with_peak_cutoff(frame.samples.len(), self.peak_cutoff);
        }

        if !self.compute_nsdf(&frame.samples) {
            return PitchObservation {
                loudness,
                ..PitchObservation::SILENT
            };
        }

        self.collect_key_maxima();
        let Some((lag, clarity)) = self.select_period() else {
            return PitchObservation {
                loudness,
                ..PitchObservation::SILENT
            };
        };

        let frequency_hz = frame.sample_rate_hz as f32 / lag;
        if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
            return PitchObservation {
                loudness,
                ..PitchObservation::SILENT
            };
        }

        PitchObservation {
            frequency_hz,
            confidence: clarity.clamp(0.0, 1.0),
            loudness,
        }
    }

    /// Fills `self.nsdf`. Returns false when the window carries no energy.
    fn compute_nsdf(&mut self, samples: &[f32]) -> bool {
        let n = self.window_size;
        let mean = samples.iter().sum::<f32>() / n as f32;
        for (dst, &src) in self.centered.iter_mut().zip(samples) {
            *dst = if src.is_finite() { src - mean } else { 0.0 };
        }

        for (idx, bin) in self.spectrum.iter_mut().enumerate() {
            let re = self.centered.get(idx).copied().unwrap_or(0.0);
            *bin = Complex::new(re, 0.0);
        }
        self.forward.process(&mut self.spectrum);
        for bin in self.spectrum.iter_mut() {
            *bin = Complex::new(bin.norm_sqr(), 0.0);
        }
        self.inverse.process(&mut self.spectrum);

        let scale = 1.0 / self.fft_size as f32;
        let r0 = self.spectrum[0].re * scale;
        if r0 <= ENERGY_FLOOR {
            self.nsdf.iter_mut().for_each(|v| *v = 0.0);
            return false;
        }

        // m'(tau) by incremental subtraction
        let mut m = 2.0 * r0;
        self.nsdf[0] = 1.0;
        for tau in 1..n {
            let head = self.centered[tau - 1];
            let tail = self.centered[n - tau];
            m -= head * head + tail * tail;
            let r = self.spectrum[tau].re * scale;
            self.nsdf[tau] = if m > ENERGY_FLOOR { 2.0 * r / m } else { 0.0 };
        }
        true
    }

    fn collect_key_maxima(&mut self) {
        self.key_maxima.clear();
        let n = self.nsdf.len();

        // Skip the lobe around lag 0.
        let mut tau = 1;
        while tau < n && self.nsdf[tau] > 0.0 {
            tau += 1;
        }

        let mut current: Option<(usize, f32)> = None;
        while tau < n {
            let value = self.nsdf[tau];
            let prev = self.nsdf[tau - 1];
            if prev <= 0.0 && value > 0.0 {
                current = Some((tau, value));
            } else if prev > 0.0 && value <= 0.0 {
                if let Some(peak) = current.take() {
                    self.key_maxima.push(peak);
                }
            } else if value > 0.0 {
                if let Some((_, best)) = current {
                    if value > best {
                        current = Some((tau, value));
                    }
                }
            }
            tau += 1;
        }

        // A lobe still open at the end of the window counts if it peaked inside it.
        if let Some((idx, value)) = current {
            if idx + 1 < n {
                self.key_maxima.push((idx, value));
            }
        }
    }

    fn select_period(&self) -> Option<(f32, f32)> {
        let highest = self
            .key_maxima
            .iter()
            .map(|(_, value)| *value)
            .fold(f32::NEG_INFINITY, f32::max);
        if !highest.is_finite() || highest <= 0.0 {
            return None;
        }

        let threshold = self.peak_cutoff * highest;
        let &(tau, _) = self
            .key_maxima
            .iter()
            .find(|(_, value)| *value >= threshold)?;

        Some(parabolic_peak(&self.nsdf, tau))
    }
}

impl Default for PitchEstimator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

/// Root-mean-square amplitude.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples
        .iter()
        .filter(|s| s.is_finite())
        .map(|s| s * s)
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// FFT length that avoids circular wrap for lags up to the full window.
fn autocorr_fft_size(window_size: usize) -> usize {
    (2 * window_size).next_power_of_two()
}

/// Interpolated (lag, value) of the peak at `tau`.
fn parabolic_peak(values: &[f32], tau: usize) -> (f32, f32) {
    if tau == 0 || tau + 1 >= values.len() {
        return (tau as f32, values[tau]);
    }
    let a = values[tau - 1];
    let b = values[tau];
    let c = values[tau + 1];
    let denom = a - 2.0 * b + c;
    if denom.abs() <= f32::EPSILON {
        return (tau as f32, b);
    }
    let shift = (0.5 * (a - c) / denom).clamp(-0.5, 0.5);
    let value = b - 0.25 * (a - c) * shift;
    (tau as f32 + shift, value)
}
