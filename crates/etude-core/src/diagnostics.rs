use etude_domain_eval::PracticeStats;
use etude_ports::pitch::NoteObservation;
use etude_ports::storage::{SettingsDto, StorageError};
use etude_ports::types::AudioInputDevice;
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct AppVersion {
    name: String,
    version: String,
}

#[derive(Serialize)]
struct PlatformInfo {
    os: String,
    arch: String,
}

#[derive(Serialize)]
struct DeviceSnapshot {
    audio_inputs: Vec<AudioInputDevice>,
}

#[derive(Serialize)]
struct RecentNotes {
    notes: Vec<NoteObservation>,
}

/// Everything a bug report needs, written as one JSON file per concern.
pub struct DiagnosticsSnapshot<'a> {
    pub settings: &'a SettingsDto,
    pub audio_inputs: Vec<AudioInputDevice>,
    pub recent_notes: Vec<NoteObservation>,
    pub stats: PracticeStats,
}

pub fn export_diagnostics(dir: &Path, snapshot: DiagnosticsSnapshot<'_>) -> Result<(), StorageError> {
    fs::create_dir_all(dir).map_err(|e| StorageError::Io(e.to_string()))?;

    let app_version = AppVersion {
        name: "Etude".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    let platform = PlatformInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
    };

    write_json(&dir.join("app_version.json"), &app_version)?;
    write_json(&dir.join("platform.json"), &platform)?;
    write_json(&dir.join("settings.json"), snapshot.settings)?;
    write_json(
        &dir.join("device_snapshot.json"),
        &DeviceSnapshot {
            audio_inputs: snapshot.audio_inputs,
        },
    )?;
    write_json(
        &dir.join("recent_notes.json"),
        &RecentNotes {
            notes: snapshot.recent_notes,
        },
    )?;
    write_json(&dir.join("stats.json"), &snapshot.stats)?;

    Ok(())
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let data = serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
    fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
}
