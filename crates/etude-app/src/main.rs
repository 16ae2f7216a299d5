use anyhow::{anyhow, Context};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command as Cli};
use etude_core::{validate_tempo, Command, EngineContext, Event};
use etude_domain_pitch::NoteMapper;
use etude_domain_score::{import_musicxml_path, PracticeScore, ScoreCursor};
use etude_infra_audio_cpal::CpalAudioInputPort;
use etude_infra_audio_synthetic::SyntheticToneSource;
use etude_infra_storage_fs::FsStorage;
use etude_ports::audio::AudioInputPort;
use etude_ports::storage::{SettingsDto, StoragePort};
use etude_ports::types::{DeviceId, PositionIndex};
use parking_lot::Mutex;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const TICK_INTERVAL: Duration = Duration::from_millis(16);

fn cli() -> Cli {
    Cli::new("etude")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Listens to a microphone and follows a score note by note")
        .arg(
            Arg::new("score")
                .short('s')
                .long("score")
                .value_name("FILE")
                .help("MusicXML score (.xml, .musicxml or .mxl)")
                .conflicts_with("notes"),
        )
        .arg(
            Arg::new("notes")
                .short('n')
                .long("notes")
                .value_name("TEXT")
                .help("Inline score, e.g. \"C4 E4+G4/8 r/2 Bb3\""),
        )
        .arg(
            Arg::new("tempo")
                .short('t')
                .long("tempo")
                .value_name("BPM")
                .value_parser(value_parser!(f64))
                .help("Tempo override; defaults to the score marking, then settings"),
        )
        .arg(
            Arg::new("device")
                .short('d')
                .long("device")
                .value_name("ID")
                .help("Input device id as printed by --list-devices"),
        )
        .arg(
            Arg::new("list-devices")
                .long("list-devices")
                .action(ArgAction::SetTrue)
                .help("Print available input devices and exit"),
        )
        .arg(
            Arg::new("synthetic")
                .long("synthetic")
                .action(ArgAction::SetTrue)
                .help("Play the score with a synthetic tone instead of a microphone"),
        )
        .arg(
            Arg::new("skip-every")
                .long("skip-every")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .requires("synthetic")
                .help("With --synthetic, stay silent on every Nth position"),
        )
        .arg(
            Arg::new("settings-dir")
                .long("settings-dir")
                .value_name("DIR")
                .help("Directory holding settings.json"),
        )
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let matches = cli().get_matches();

    if matches.get_flag("list-devices") {
        for device in CpalAudioInputPort::new().list_inputs()? {
            println!(
                "{}\t{}\t{} Hz, {} ch",
                device.id,
                device.name,
                device.default_config.sample_rate_hz,
                device.default_config.channels
            );
        }
        return Ok(());
    }

    let storage = match matches.get_one::<String>("settings-dir") {
        Some(dir) => FsStorage::new(PathBuf::from(dir)),
        None => FsStorage::default(),
    };
    let mut settings = storage.load_settings().unwrap_or_else(|err| {
        log::warn!("ignoring unreadable settings: {}", err);
        SettingsDto::default()
    });

    let score = load_score(&matches)?;
    if let Some(bpm) = matches.get_one::<f64>("tempo") {
        settings.tempo_bpm = *bpm;
    } else if let Some(marked) = score.meta.tempo_bpm {
        match validate_tempo(marked) {
            Ok(bpm) => settings.tempo_bpm = bpm,
            Err(err) => log::warn!("ignoring score tempo: {}", err),
        }
    }

    // Silent until a device is selected; the performer drives it with --synthetic.
    let tone = SyntheticToneSource::with_mapper(
        settings.sample_rate_hz,
        NoteMapper::new(settings.reference_pitch_hz),
    );
    let synthetic = matches.get_flag("synthetic");
    let performer = synthetic.then(|| SyntheticPerformer {
        tone: tone.clone(),
        score: score.clone(),
        skip_every: matches.get_one::<usize>("skip-every").copied(),
        last_position: None,
    });

    let mut engine = EngineContext::new(
        settings.clone(),
        Box::new(ScoreCursor::new(score)),
        Box::new(tone),
    )
    .context("invalid settings")?
    .with_storage(Box::new(storage));

    let origin = Instant::now();
    if !synthetic {
        let port = CpalAudioInputPort::new();
        let device_id = choose_device(&port, &matches, &settings)?;
        engine = engine.with_audio_input(Box::new(port));
        engine
            .handle_command(Command::SelectAudioInput { device_id }, origin.elapsed())
            .context("opening audio input")?;
    }
    engine.handle_command(Command::Start, origin.elapsed())?;

    let engine = Arc::new(Mutex::new(engine));
    spawn_command_reader(engine.clone(), origin);

    let ticker = {
        let engine = engine.clone();
        thread::spawn(move || run_loop(engine, origin, performer))
    };
    let result = ticker
        .join()
        .map_err(|_| anyhow!("tick loop panicked"))?;

    engine.lock().dispose();
    result
}

fn load_score(matches: &ArgMatches) -> anyhow::Result<PracticeScore> {
    if let Some(path) = matches.get_one::<String>("score") {
        return import_musicxml_path(Path::new(path))
            .with_context(|| format!("importing {}", path));
    }
    if let Some(text) = matches.get_one::<String>("notes") {
        return PracticeScore::from_text(text).context("parsing --notes");
    }
    Err(anyhow!("either --score or --notes is required"))
}

fn choose_device(
    port: &CpalAudioInputPort,
    matches: &ArgMatches,
    settings: &SettingsDto,
) -> anyhow::Result<DeviceId> {
    if let Some(id) = matches.get_one::<String>("device") {
        return Ok(DeviceId(id.clone()));
    }
    let devices = port.list_inputs()?;
    if let Some(saved) = settings.selected_audio_in.as_ref() {
        if devices.iter().any(|device| &device.id == saved) {
            return Ok(saved.clone());
        }
        log::warn!("saved input {} is gone, using the first available", saved);
    }
    devices
        .into_iter()
        .next()
        .map(|device| device.id)
        .ok_or_else(|| anyhow!("no audio input devices found"))
}

/// Prints every engine event as one JSON line until the score completes.
fn run_loop(
    engine: Arc<Mutex<EngineContext>>,
    origin: Instant,
    mut performer: Option<SyntheticPerformer>,
) -> anyhow::Result<()> {
    loop {
        let events = {
            let mut engine = engine.lock();
            if let Some(performer) = performer.as_mut() {
                performer.follow(engine.position());
            }
            engine.tick(origin.elapsed());
            engine.drain_events()
        };

        let mut completed = false;
        for event in events {
            completed |= matches!(event, Event::ScoreCompleted);
            println!("{}", serde_json::to_string(&event)?);
        }
        if completed {
            return Ok(());
        }

        thread::sleep(TICK_INTERVAL);
    }
}

/// Accepts JSON commands on stdin, one per line.
fn spawn_command_reader(engine: Arc<Mutex<EngineContext>>, origin: Instant) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if line.trim().is_empty() {
                continue;
            }
            let command = match serde_json::from_str::<Command>(&line) {
                Ok(command) => command,
                Err(err) => {
                    log::warn!("bad command {:?}: {}", line, err);
                    continue;
                }
            };
            if let Err(err) = engine.lock().handle_command(command, origin.elapsed()) {
                log::warn!("command failed: {}", err);
            }
        }
    });
}

/// Plays the first note of whatever position the cursor is on.
struct SyntheticPerformer {
    tone: SyntheticToneSource,
    score: PracticeScore,
    skip_every: Option<usize>,
    last_position: Option<PositionIndex>,
}

impl SyntheticPerformer {
    fn follow(&mut self, position: Option<PositionIndex>) {
        if position == self.last_position {
            return;
        }
        self.last_position = position;

        let skipped = match (position, self.skip_every) {
            (Some(index), Some(n)) if n > 0 => (index + 1) % n == 0,
            _ => false,
        };
        let note = position
            .filter(|_| !skipped)
            .and_then(|index| self.score.positions.get(index))
            .and_then(|position| position.notes.first().copied());

        match note {
            Some(note) => self.tone.inject(
                note.pitch_class.letter,
                note.pitch_class.accidental,
                note.octave,
            ),
            None => self.tone.silence(),
        }
    }
}
