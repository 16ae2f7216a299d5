use crate::config::{validate_gate, validate_tempo, ConfigError, EngineConfig};
use crate::diagnostics::{export_diagnostics, DiagnosticsSnapshot};
use crate::frame_source::capture_ring;
use crate::ipc::{Command, Event, ScoreSource};
use crate::session::{SessionController, SessionState};
use etude_domain_eval::PracticeStats;
use etude_domain_pitch::{NoteDetector, NoteMapper};
use etude_domain_score::{
    import_musicxml_path, MusicXmlImportError, PitchTextError, PracticeScore, ScoreCursor,
};
use etude_ports::audio::{
    AudioCaptureCallback, AudioError, AudioInputPort, AudioStreamHandle, FrameSource,
};
use etude_ports::pitch::{NoteObservation, PitchClass};
use etude_ports::score::ScorePositionProvider;
use etude_ports::storage::{SettingsDto, StorageError, StoragePort};
use etude_ports::types::{AudioConfig, DeviceId, PositionIndex, Timestamp};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const RECENT_NOTES: usize = 32;
/// Ring capacity in analysis windows.
const CAPTURE_WINDOWS: usize = 8;

#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    #[error("audio error: {0}")]
    Audio(#[from] AudioError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("score import failed: {0}")]
    MusicXml(#[from] MusicXmlImportError),
    #[error("score text rejected: {0}")]
    PitchText(#[from] PitchTextError),
    #[error("no audio input backend configured")]
    NoAudioInput,
}

/// Explicitly owned runtime for one practice session.
///
/// The owner drives it with `tick` and `handle_command`, passing timestamps
/// measured from a fixed origin, and collects output with `drain_events`.
pub struct EngineContext {
    config: EngineConfig,
    settings: SettingsDto,
    detector: NoteDetector,
    frames: Box<dyn FrameSource>,
    session: SessionController,
    audio_port: Option<Box<dyn AudioInputPort>>,
    storage: Option<Box<dyn StoragePort>>,
    capture: Option<Box<dyn AudioStreamHandle>>,
    events: VecDeque<Event>,
    recent_notes: VecDeque<NoteObservation>,
    last_detected: Option<(PitchClass, i32)>,
    source_failing: bool,
}

impl EngineContext {
    pub fn new(
        settings: SettingsDto,
        provider: Box<dyn ScorePositionProvider>,
        frames: Box<dyn FrameSource>,
    ) -> Result<Self, EngineError> {
        let config = EngineConfig::from_settings(&settings)?;
        let detector = NoteDetector::new(
            config.window_size,
            NoteMapper::new(config.reference_pitch_hz),
            config.gate,
        );

        Ok(Self {
            config,
            settings,
            detector,
            frames,
            session: SessionController::new(provider, config.tempo_bpm),
            audio_port: None,
            storage: None,
            capture: None,
            events: VecDeque::new(),
            recent_notes: VecDeque::with_capacity(RECENT_NOTES),
            last_detected: None,
            source_failing: false,
        })
    }

    pub fn with_audio_input(mut self, port: Box<dyn AudioInputPort>) -> Self {
        self.audio_port = Some(port);
        self
    }

    pub fn with_storage(mut self, storage: Box<dyn StoragePort>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn handle_command(&mut self, cmd: Command, now: Timestamp) -> Result<(), EngineError> {
        match cmd {
            Command::ListAudioInputs => {
                let devices = match self.audio_port.as_ref() {
                    Some(port) => port.list_inputs()?,
                    None => Vec::new(),
                };
                self.events.push_back(Event::AudioInputsUpdated { devices });
            }
            Command::SelectAudioInput { device_id } => {
                self.open_audio_input(device_id)?;
            }
            Command::LoadScore { source } => {
                self.load_score(source)?;
            }
            Command::Start => {
                let events = self.session.start(now);
                self.events.extend(events);
            }
            Command::Stop => {
                let events = self.session.stop();
                self.events.extend(events);
            }
            Command::Resume => {
                let events = self.session.resume(now);
                self.events.extend(events);
            }
            Command::Reset => {
                let events = self.session.reset();
                self.events.extend(events);
            }
            Command::SetTempo { bpm } => {
                let bpm = validate_tempo(bpm)?;
                self.config.tempo_bpm = bpm;
                self.session.set_tempo(bpm);
                self.settings.tempo_bpm = bpm;
                self.emit_settings();
                self.save_settings();
            }
            Command::SetThresholds {
                confidence,
                loudness,
            } => {
                let gate = validate_gate(confidence, loudness)?;
                self.config.gate = gate;
                self.detector.set_gate(gate);
                self.settings.confidence_threshold = confidence;
                self.settings.loudness_threshold = loudness;
                self.emit_settings();
                self.save_settings();
            }
            Command::ExportDiagnostics { path } => {
                let audio_inputs = match self.audio_port.as_ref() {
                    Some(port) => port.list_inputs()?,
                    None => Vec::new(),
                };
                export_diagnostics(
                    Path::new(&path),
                    DiagnosticsSnapshot {
                        settings: &self.settings,
                        audio_inputs,
                        recent_notes: self.recent_notes.iter().copied().collect(),
                        stats: self.session.stats(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// One analysis step followed by one deadline step. A hit found by the
    /// analysis step wins over a deadline due at the same `now`.
    pub fn tick(&mut self, now: Timestamp) {
        if self.session.state() == SessionState::Playing {
            let note = self.analyze();
            self.observe(note, now);
        }
        self.poll_deadline(now);
    }

    /// Applies an observation without checking the deadline.
    pub fn observe(&mut self, observation: Option<NoteObservation>, now: Timestamp) {
        let identity = observation.map(|note| (note.pitch_class, note.octave));
        if identity != self.last_detected {
            self.last_detected = identity;
            self.events.push_back(Event::NoteDetected { note: observation });
            if let Some(note) = observation {
                if self.recent_notes.len() >= RECENT_NOTES {
                    self.recent_notes.pop_front();
                }
                self.recent_notes.push_back(note);
            }
        }

        let events = self.session.observe(observation.as_ref(), now);
        self.events.extend(events);
    }

    /// Processes deadline expiry without running analysis.
    pub fn poll_deadline(&mut self, now: Timestamp) {
        let events = self.session.poll_deadline(now);
        self.events.extend(events);
    }

    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn stats(&self) -> PracticeStats {
        self.session.stats()
    }

    pub fn position(&self) -> Option<PositionIndex> {
        self.session.position()
    }

    pub fn remaining(&self, now: Timestamp) -> Option<Duration> {
        self.session.remaining(now)
    }

    pub fn settings(&self) -> &SettingsDto {
        &self.settings
    }

    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Closes the capture stream. The context stays usable with its current
    /// frame source.
    pub fn dispose(&mut self) {
        if let Some(stream) = self.capture.take() {
            stream.close();
        }
    }

    fn analyze(&mut self) -> Option<NoteObservation> {
        match self.frames.latest_frame(self.config.window_size) {
            Ok(frame) => {
                self.source_failing = false;
                frame.and_then(|frame| self.detector.detect(&frame).note)
            }
            Err(err) => {
                if !self.source_failing {
                    log::warn!("frame source failed, treating as silence: {}", err);
                    self.source_failing = true;
                }
                None
            }
        }
    }

    fn open_audio_input(&mut self, device_id: DeviceId) -> Result<(), EngineError> {
        let port = self.audio_port.as_ref().ok_or(EngineError::NoAudioInput)?;
        let device = port
            .list_inputs()?
            .into_iter()
            .find(|device| device.id == device_id)
            .ok_or_else(|| AudioError::DeviceNotFound(device_id.to_string()))?;

        if let Some(stream) = self.capture.take() {
            stream.close();
        }

        let sample_rate_hz = device.default_config.sample_rate_hz;
        let (capture, source) =
            capture_ring(sample_rate_hz, self.config.window_size * CAPTURE_WINDOWS);
        let config = AudioConfig {
            sample_rate_hz,
            channels: device.default_config.channels,
            buffer_size_frames: None,
        };
        let stream = port.open_input(
            &device_id,
            config,
            Arc::new(capture) as Arc<dyn AudioCaptureCallback>,
        )?;
        log::info!("capturing from {} at {} Hz", device.name, sample_rate_hz);

        self.capture = Some(stream);
        self.frames = Box::new(source);
        self.config.sample_rate_hz = sample_rate_hz;
        self.settings.sample_rate_hz = sample_rate_hz;
        self.settings.selected_audio_in = Some(device_id);
        self.emit_settings();
        self.save_settings();
        Ok(())
    }

    fn load_score(&mut self, source: ScoreSource) -> Result<(), EngineError> {
        let score = match source {
            ScoreSource::MusicXmlFile(path) => import_musicxml_path(Path::new(&path))?,
            ScoreSource::Text(text) => PracticeScore::from_text(&text)?,
        };
        let title = score.meta.title.clone();
        let positions = score.len();
        log::info!("loaded score {:?} with {} positions", title, positions);

        let events = self.session.replace_provider(Box::new(ScoreCursor::new(score)));
        self.events.push_back(Event::ScoreLoaded { title, positions });
        self.events.extend(events);
        Ok(())
    }

    fn emit_settings(&mut self) {
        self.events.push_back(Event::SettingsUpdated {
            settings: self.settings.clone(),
        });
    }

    fn save_settings(&self) {
        if let Some(storage) = self.storage.as_ref() {
            if let Err(err) = storage.save_settings(&self.settings) {
                log::warn!("settings not saved: {}", err);
            }
        }
    }
}
