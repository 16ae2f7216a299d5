use etude_ports::audio::{AudioCaptureCallback, AudioError, AudioFrame, FrameSource};
use etude_ports::types::SampleTime;
use parking_lot::Mutex;
use rtrb::{Consumer, Producer, RingBuffer};
use std::collections::VecDeque;

/// Creates a capture callback and the frame source that reads from it.
///
/// `capacity` is in samples and should cover several analysis windows so a
/// slow tick does not drop audio.
pub fn capture_ring(sample_rate_hz: u32, capacity: usize) -> (RingCapture, RingFrameSource) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        RingCapture {
            producer: Mutex::new(producer),
        },
        RingFrameSource {
            consumer,
            window: VecDeque::with_capacity(capacity),
            sample_rate_hz,
        },
    )
}

/// Audio-thread half: pushes captured samples, dropping them when the ring is
/// full or contended.
pub struct RingCapture {
    producer: Mutex<Producer<f32>>,
}

impl AudioCaptureCallback for RingCapture {
    fn capture(&self, _sample_time_start: SampleTime, samples: &[f32]) {
        let Some(mut producer) = self.producer.try_lock() else {
            return;
        };
        for &sample in samples {
            if producer.push(sample).is_err() {
                break;
            }
        }
    }
}

/// Core-thread half: keeps a sliding window of the newest samples.
pub struct RingFrameSource {
    consumer: Consumer<f32>,
    window: VecDeque<f32>,
    sample_rate_hz: u32,
}

impl RingFrameSource {
    pub fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    fn drain(&mut self, window_size: usize) {
        while let Ok(sample) = self.consumer.pop() {
            self.window.push_back(sample);
            if self.window.len() > window_size {
                self.window.pop_front();
            }
        }
        while self.window.len() > window_size {
            self.window.pop_front();
        }
    }
}

impl FrameSource for RingFrameSource {
    /// The newest `window_size` samples, or `None` until that many have
    /// arrived. Repeats the previous window if nothing new was captured.
    fn latest_frame(&mut self, window_size: usize) -> Result<Option<AudioFrame>, AudioError> {
        if self.consumer.is_abandoned() && self.consumer.is_empty() && self.window.is_empty() {
            return Err(AudioError::DeviceUnavailable(
                "capture stream closed".to_string(),
            ));
        }
        self.drain(window_size);
        if self.window.len() < window_size {
            return Ok(None);
        }
        Ok(Some(AudioFrame::new(
            self.window.iter().copied().collect(),
            self.sample_rate_hz,
        )))
    }
}
