use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, SizedSample, StreamConfig, SupportedStreamConfigRange};
use etude_ports::audio::{AudioCaptureCallback, AudioError, AudioInputPort, AudioStreamHandle};
use etude_ports::types::{AudioConfig, AudioInputDevice, DeviceId};
use std::sync::{mpsc, Arc};
use std::thread;

pub struct CpalAudioInputPort {
    host: cpal::Host,
}

struct SelectedStreamConfig {
    config: StreamConfig,
    sample_format: SampleFormat,
}

impl CpalAudioInputPort {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn with_host(host: cpal::Host) -> Self {
        Self { host }
    }

    fn list_devices_from_host(
        host: &cpal::Host,
    ) -> Result<Vec<(DeviceId, cpal::Device)>, AudioError> {
        let host_id = format!("{:?}", host.id());
        let devices = host
            .input_devices()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        Ok(devices
            .enumerate()
            .map(|(index, device)| {
                let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
                (DeviceId(format!("cpal:{}:{}:{}", host_id, index, name)), device)
            })
            .collect())
    }

    fn select_stream_config(
        device: &cpal::Device,
        desired: AudioConfig,
    ) -> Result<SelectedStreamConfig, AudioError> {
        let mut supported = device
            .supported_input_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let chosen = select_supported_config(&mut supported, desired)?;
        let sample_format = chosen.sample_format();
        let mut config = chosen.config();
        config.buffer_size = match desired.buffer_size_frames {
            Some(frames) => BufferSize::Fixed(frames),
            None => BufferSize::Default,
        };

        Ok(SelectedStreamConfig {
            config,
            sample_format,
        })
    }
}

impl Default for CpalAudioInputPort {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CpalAudioStreamHandle {
    stop_tx: mpsc::Sender<()>,
    join_handle: Option<thread::JoinHandle<()>>,
}

impl AudioStreamHandle for CpalAudioStreamHandle {
    fn close(mut self: Box<Self>) {
        let _ = self.stop_tx.send(());
        if let Some(handle) = self.join_handle.take() {
            let _ = handle.join();
        }
    }
}

impl AudioInputPort for CpalAudioInputPort {
    fn list_inputs(&self) -> Result<Vec<AudioInputDevice>, AudioError> {
        let mut results = Vec::new();
        for (id, device) in Self::list_devices_from_host(&self.host)? {
            let name = device.name().unwrap_or_else(|_| "Unknown Input".to_string());
            let default_config = match device.default_input_config() {
                Ok(config) => config,
                Err(err) => {
                    log::debug!("skipping input {}: {}", name, err);
                    continue;
                }
            };

            results.push(AudioInputDevice {
                id,
                name,
                default_config: AudioConfig {
                    sample_rate_hz: default_config.sample_rate().0,
                    channels: default_config.channels(),
                    buffer_size_frames: None,
                },
            });
        }
        Ok(results)
    }

    /// Opens the device on a dedicated thread that owns the cpal stream.
    /// Samples reach `cb` downmixed to mono.
    fn open_input(
        &self,
        device_id: &DeviceId,
        config: AudioConfig,
        cb: Arc<dyn AudioCaptureCallback>,
    ) -> Result<Box<dyn AudioStreamHandle>, AudioError> {
        let device_id = device_id.clone();
        let host_id = self.host.id();
        let desired = config;
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);
        let (stop_tx, stop_rx) = mpsc::channel();

        let join_handle = thread::spawn(move || {
            let host = match host_for(host_id) {
                Ok(host) => host,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };
            let devices = match Self::list_devices_from_host(&host) {
                Ok(list) => list,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let Some((_, device)) = devices.into_iter().find(|(id, _)| id == &device_id) else {
                let _ = ready_tx.send(Err(AudioError::DeviceNotFound(device_id.to_string())));
                return;
            };

            let stream_config = match Self::select_stream_config(&device, desired) {
                Ok(config) => config,
                Err(err) => {
                    let _ = ready_tx.send(Err(err));
                    return;
                }
            };

            let stream = match stream_config.sample_format {
                SampleFormat::F32 => {
                    build_capture_stream::<f32>(&device, &stream_config.config, cb, |s| s)
                }
                SampleFormat::I16 => {
                    build_capture_stream::<i16>(&device, &stream_config.config, cb, i16_to_f32)
                }
                SampleFormat::U16 => {
                    build_capture_stream::<u16>(&device, &stream_config.config, cb, u16_to_f32)
                }
                _ => Err(cpal::BuildStreamError::StreamConfigNotSupported),
            };

            let stream = match stream {
                Ok(stream) => stream,
                Err(err) => {
                    let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                    return;
                }
            };

            if let Err(err) = stream.play() {
                let _ = ready_tx.send(Err(AudioError::Backend(err.to_string())));
                return;
            }

            let _ = ready_tx.send(Ok(()));
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx
            .recv()
            .map_err(|e| AudioError::Backend(e.to_string()))?
        {
            Ok(()) => Ok(Box::new(CpalAudioStreamHandle {
                stop_tx,
                join_handle: Some(join_handle),
            })),
            Err(err) => Err(err),
        }
    }
}

/// Reopens the port's host on the stream thread, so ids listed by
/// `list_inputs` resolve against the same backend.
fn host_for(host_id: cpal::HostId) -> Result<cpal::Host, AudioError> {
    cpal::host_from_id(host_id).map_err(|e| AudioError::Backend(e.to_string()))
}

fn build_capture_stream<T: SizedSample + 'static>(
    device: &cpal::Device,
    config: &StreamConfig,
    cb: Arc<dyn AudioCaptureCallback>,
    convert: fn(T) -> f32,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    let channels = config.channels as usize;
    let mut mono: Vec<f32> = Vec::with_capacity(8192);
    let mut sample_time: u64 = 0;

    device.build_input_stream(
        config,
        move |data: &[T], _info: &cpal::InputCallbackInfo| {
            downmix_into(data, channels, convert, &mut mono);
            cb.capture(sample_time, &mono);
            sample_time = sample_time.saturating_add(mono.len() as u64);
        },
        |err| log::warn!("cpal input stream error: {}", err),
        None,
    )
}

fn select_supported_config(
    supported: &mut dyn Iterator<Item = SupportedStreamConfigRange>,
    desired: AudioConfig,
) -> Result<cpal::SupportedStreamConfig, AudioError> {
    let mut best: Option<cpal::SupportedStreamConfig> = None;
    let mut best_score: i32 = -1;

    for config_range in supported {
        let min = config_range.min_sample_rate().0;
        let max = config_range.max_sample_rate().0;
        if desired.sample_rate_hz < min || desired.sample_rate_hz > max {
            continue;
        }

        // prefer the requested channel count, then float samples
        let mut score = match config_range.sample_format() {
            SampleFormat::F32 => 3,
            SampleFormat::I16 => 2,
            SampleFormat::U16 => 1,
            _ => continue,
        };
        if config_range.channels() == desired.channels {
            score += 10;
        }

        if score > best_score {
            best = Some(config_range.with_sample_rate(SampleRate(desired.sample_rate_hz)));
            best_score = score;
        }
    }

    best.ok_or_else(|| {
        AudioError::UnsupportedConfig(format!(
            "no input config at {} Hz",
            desired.sample_rate_hz
        ))
    })
}

/// Averages interleaved frames into `out`, replacing its contents.
fn downmix_into<T: Copy>(data: &[T], channels: usize, convert: fn(T) -> f32, out: &mut Vec<f32>) {
    out.clear();
    if channels == 0 {
        return;
    }
    let scale = 1.0 / channels as f32;
    for frame in data.chunks_exact(channels) {
        let sum: f32 = frame.iter().map(|&s| convert(s)).sum();
        out.push(sum * scale);
    }
}

fn i16_to_f32(value: i16) -> f32 {
    value as f32 / i16::MAX as f32
}

fn u16_to_f32(value: u16) -> f32 {
    (value as f32 / u16::MAX as f32) * 2.0 - 1.0
}
