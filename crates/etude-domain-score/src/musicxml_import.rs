use crate::model::{PracticeScore, ScoreMeta, ScorePosition, ScoreOrigin};
use etude_ports::pitch::{Accidental, ExpectedNote, Letter};
use roxmltree::Document;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::path::Path;
use zip::ZipArchive;

type Tick = i64;

const PPQ: Tick = 480;
const WHOLE_NOTE_TICKS: Tick = PPQ * 4;

#[derive(thiserror::Error, Debug)]
pub enum MusicXmlImportError {
    #[error("io error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("unsupported feature: {0}")]
    Unsupported(String),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
enum PitchError {
    #[error("unknown step {0:?}")]
    Step(String),
    #[error("missing octave")]
    Octave,
    #[error("unsupported alter {0:?}")]
    Alter(String),
}

#[derive(Clone, Debug)]
struct NoteOnset {
    tick: Tick,
    end_tick: Tick,
    note: ExpectedNote,
    measure_index: u32,
}

#[derive(Clone, Copy, Debug)]
struct RestOnset {
    tick: Tick,
    end_tick: Tick,
    measure_index: u32,
}

type TieKey = (ExpectedNote, Option<u8>);

pub fn import_musicxml_path(path: &Path) -> Result<PracticeScore, MusicXmlImportError> {
    let data = read_musicxml_file(path)?;
    import_musicxml_str(&data)
}

/// Flattens every part, voice and staff into one sequence of onsets.
///
/// Chord members and notes from other voices that start together share a
/// position. A position lasts until the next onset. Rests only become
/// positions when nothing else is sounding. Grace notes and tied
/// continuations never start a position. Notes whose pitch cannot be
/// expressed as letter, single accidental and octave are skipped.
pub fn import_musicxml_str(xml: &str) -> Result<PracticeScore, MusicXmlImportError> {
    let doc = Document::parse(xml).map_err(|e| MusicXmlImportError::Parse(e.to_string()))?;
    if !doc.root_element().has_tag_name("score-partwise") {
        return Err(MusicXmlImportError::Unsupported(format!(
            "root element <{}>",
            doc.root_element().tag_name().name()
        )));
    }

    let title = doc
        .descendants()
        .find(|node| node.has_tag_name("work-title") || node.has_tag_name("movement-title"))
        .and_then(|node| node.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    let tempo_bpm = doc
        .descendants()
        .filter(|node| node.has_tag_name("sound"))
        .filter_map(|node| node.attribute("tempo"))
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .find(|bpm| bpm.is_finite() && *bpm > 0.0);

    let mut notes: Vec<NoteOnset> = Vec::new();
    let mut rests: Vec<RestOnset> = Vec::new();

    for part in doc.descendants().filter(|node| node.has_tag_name("part")) {
        let mut current_tick: Tick = 0;
        let mut divisions: i64 = 1;
        let mut time_beats: i64 = 4;
        let mut time_beat_type: i64 = 4;
        let mut measure_index: u32 = 0;
        let mut active_ties: HashMap<TieKey, usize> = HashMap::new();

        for measure in part
            .children()
            .filter(|node| node.is_element() && node.has_tag_name("measure"))
        {
            let measure_is_implicit = measure
                .attribute("implicit")
                .is_some_and(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "yes" | "true"));
            let measure_start = current_tick.max(0);
            let mut cursor = measure_start;
            let mut measure_end = measure_start;
            let mut last_note_start_tick: Option<Tick> = None;
            let mut expected_end_tick =
                expected_measure_end(measure_start, time_beats, time_beat_type);

            for element in measure.children().filter(|node| node.is_element()) {
                if element.has_tag_name("attributes") {
                    if let Some(text) = element
                        .children()
                        .find(|node| node.has_tag_name("divisions"))
                        .and_then(|node| node.text())
                    {
                        divisions = text.trim().parse::<i64>().unwrap_or(1).max(1);
                    }
                    if let Some((beats, beat_type)) = parse_time_signature(&element) {
                        time_beats = beats;
                        time_beat_type = beat_type;
                        expected_end_tick =
                            expected_measure_end(measure_start, time_beats, time_beat_type);
                    }
                } else if element.has_tag_name("backup") {
                    let duration = duration_ticks(&element, divisions).max(0);
                    cursor = cursor.saturating_sub(duration).max(measure_start);
                    last_note_start_tick = None;
                } else if element.has_tag_name("forward") {
                    let duration = duration_ticks(&element, divisions).max(0);
                    cursor = cursor.saturating_add(duration);
                    measure_end = measure_end.max(cursor);
                    last_note_start_tick = None;
                } else if element.has_tag_name("note") {
                    let is_chord = element.children().any(|node| node.has_tag_name("chord"));
                    let is_rest = element.children().any(|node| node.has_tag_name("rest"));
                    let is_grace = element.children().any(|node| node.has_tag_name("grace"));
                    if is_grace {
                        continue;
                    }

                    let mut raw_duration = duration_ticks(&element, divisions);
                    let mut duration_missing = raw_duration == 0;
                    if duration_missing {
                        if let Some(inferred) = infer_note_duration_ticks(&element) {
                            raw_duration = inferred;
                            duration_missing = false;
                        }
                    }
                    let base_tick = if is_chord {
                        last_note_start_tick.unwrap_or(cursor)
                    } else {
                        cursor
                    };
                    let mut duration = raw_duration.max(0);
                    let max_len = expected_end_tick.map(|end_tick| (end_tick - base_tick).max(0));
                    if let Some(max_len) = max_len {
                        duration = duration.min(max_len);
                    }
                    let end_tick = base_tick.saturating_add(duration.max(1));

                    if is_rest {
                        rests.push(RestOnset {
                            tick: base_tick,
                            end_tick,
                            measure_index,
                        });
                    } else {
                        match parse_pitch(&element) {
                            Ok(Some(note)) => {
                                let key = (note, parse_staff(&element));
                                let (tie_start, tie_stop) = parse_ties(&element);
                                let continued = if tie_stop {
                                    active_ties.get(&key).copied()
                                } else {
                                    None
                                };

                                if let Some(idx) = continued {
                                    notes[idx].end_tick = notes[idx].end_tick.max(end_tick);
                                    if !tie_start {
                                        active_ties.remove(&key);
                                    }
                                } else {
                                    notes.push(NoteOnset {
                                        tick: base_tick,
                                        end_tick,
                                        note,
                                        measure_index,
                                    });
                                    if tie_start {
                                        active_ties.insert(key, notes.len() - 1);
                                    }
                                }
                            }
                            Ok(None) => {
                                log::warn!(
                                    "measure {}: note without <pitch> skipped",
                                    measure_index + 1
                                );
                            }
                            Err(err) => {
                                log::warn!("measure {}: note skipped, {}", measure_index + 1, err);
                            }
                        }
                    }

                    if !is_chord {
                        last_note_start_tick = if is_rest { None } else { Some(base_tick) };
                        let mut advance = duration;
                        if advance == 0 && duration_missing {
                            advance = 1;
                        }
                        cursor = cursor.saturating_add(advance);
                        measure_end = measure_end.max(cursor);
                    }
                }
            }

            if let Some(end_tick) = expected_end_tick {
                if !measure_is_implicit {
                    measure_end = measure_end.max(end_tick);
                }
            }

            current_tick = measure_end;
            measure_index = measure_index.saturating_add(1);
        }
    }

    Ok(PracticeScore::new(
        ScoreMeta {
            title,
            origin: ScoreOrigin::MusicXml,
            tempo_bpm,
        },
        build_positions(&notes, &rests),
    ))
}

fn build_positions(notes: &[NoteOnset], rests: &[RestOnset]) -> Vec<ScorePosition> {
    let mut grouped: BTreeMap<Tick, (Vec<ExpectedNote>, u32)> = BTreeMap::new();
    for onset in notes {
        let entry = grouped
            .entry(onset.tick)
            .or_insert_with(|| (Vec::new(), onset.measure_index));
        if !entry.0.contains(&onset.note) {
            entry.0.push(onset.note);
        }
    }

    for rest in rests {
        let covered = notes
            .iter()
            .any(|note| note.tick <= rest.tick && rest.tick < note.end_tick);
        if !covered {
            grouped
                .entry(rest.tick)
                .or_insert_with(|| (Vec::new(), rest.measure_index));
        }
    }

    let score_end = notes
        .iter()
        .map(|note| note.end_tick)
        .chain(rests.iter().map(|rest| rest.end_tick))
        .max()
        .unwrap_or(0);

    let ticks: Vec<Tick> = grouped.keys().copied().collect();
    grouped
        .into_iter()
        .enumerate()
        .map(|(idx, (tick, (notes, measure_index)))| {
            let next = ticks.get(idx + 1).copied().unwrap_or(score_end);
            let length_ticks = next - tick;
            let length =
                (length_ticks > 0).then(|| length_ticks as f64 / WHOLE_NOTE_TICKS as f64);
            ScorePosition {
                notes,
                length,
                measure_index: Some(measure_index),
            }
        })
        .collect()
}

fn parse_pitch(node: &roxmltree::Node) -> Result<Option<ExpectedNote>, PitchError> {
    let Some(pitch) = node.children().find(|child| child.has_tag_name("pitch")) else {
        return Ok(None);
    };
    let step = pitch
        .children()
        .find(|child| child.has_tag_name("step"))
        .and_then(|child| child.text())
        .unwrap_or("")
        .trim();
    let letter = match step {
        "C" => Letter::C,
        "D" => Letter::D,
        "E" => Letter::E,
        "F" => Letter::F,
        "G" => Letter::G,
        "A" => Letter::A,
        "B" => Letter::B,
        other => return Err(PitchError::Step(other.to_string())),
    };
    let octave = pitch
        .children()
        .find(|child| child.has_tag_name("octave"))
        .and_then(|child| child.text())
        .and_then(|text| text.trim().parse::<i32>().ok())
        .ok_or(PitchError::Octave)?;
    let alter_text = pitch
        .children()
        .find(|child| child.has_tag_name("alter"))
        .and_then(|child| child.text())
        .map(str::trim)
        .unwrap_or("0");
    let accidental = match alter_text.parse::<f64>() {
        Ok(alter) if alter == 0.0 => Accidental::Natural,
        Ok(alter) if alter == 1.0 => Accidental::Sharp,
        Ok(alter) if alter == -1.0 => Accidental::Flat,
        _ => return Err(PitchError::Alter(alter_text.to_string())),
    };

    Ok(Some(ExpectedNote::new(letter, accidental, octave)))
}

fn parse_staff(node: &roxmltree::Node) -> Option<u8> {
    node.children()
        .find(|child| child.has_tag_name("staff"))
        .and_then(|child| child.text())
        .and_then(|text| text.trim().parse::<u8>().ok())
}

fn parse_time_signature(attributes: &roxmltree::Node) -> Option<(i64, i64)> {
    let time_node = attributes
        .children()
        .find(|node| node.has_tag_name("time"))?;
    let beats = time_node
        .children()
        .find(|node| node.has_tag_name("beats"))
        .and_then(|node| node.text())
        .and_then(parse_beats)?;
    let beat_type = time_node
        .children()
        .find(|node| node.has_tag_name("beat-type"))
        .and_then(|node| node.text())
        .and_then(|t| t.trim().parse::<i64>().ok())?;
    (beats > 0 && beat_type > 0).then_some((beats, beat_type))
}

fn expected_measure_end(measure_start: Tick, beats: i64, beat_type: i64) -> Option<Tick> {
    let len = measure_length_ticks(beats, beat_type);
    (len > 0).then(|| measure_start.saturating_add(len))
}

fn duration_ticks(node: &roxmltree::Node, divisions: i64) -> Tick {
    let duration = node
        .children()
        .find(|child| child.has_tag_name("duration"))
        .and_then(|child| child.text())
        .and_then(|text| text.trim().parse::<i64>().ok())
        .unwrap_or(0);

    if divisions <= 0 {
        return 0;
    }
    let ticks = (duration.saturating_mul(PPQ) + divisions / 2) / divisions;
    if duration > 0 && ticks == 0 {
        1
    } else {
        ticks
    }
}

fn infer_note_duration_ticks(node: &roxmltree::Node) -> Option<Tick> {
    let note_type = node
        .children()
        .find(|child| child.has_tag_name("type"))
        .and_then(|child| child.text())?
        .trim()
        .to_ascii_lowercase();

    let mut dur = match note_type.as_str() {
        "breve" => PPQ * 8,
        "whole" => PPQ * 4,
        "half" => PPQ * 2,
        "quarter" => PPQ,
        "eighth" => PPQ / 2,
        "16th" => PPQ / 4,
        "32nd" => PPQ / 8,
        "64th" => PPQ / 16,
        "128th" => PPQ / 32,
        _ => return None,
    };

    let dots = node
        .children()
        .filter(|child| child.has_tag_name("dot"))
        .count();
    let mut add = dur / 2;
    for _ in 0..dots {
        if add <= 0 {
            break;
        }
        dur = dur.saturating_add(add);
        add /= 2;
    }

    if let Some(time_mod) = node
        .children()
        .find(|child| child.is_element() && child.has_tag_name("time-modification"))
    {
        let actual = child_number(&time_mod, "actual-notes");
        let normal = child_number(&time_mod, "normal-notes");
        if actual > 0 && normal > 0 {
            dur = (dur.saturating_mul(normal) + actual / 2) / actual;
        }
    }

    Some(dur.max(1))
}

fn child_number(node: &roxmltree::Node, tag: &str) -> Tick {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .and_then(|text| text.trim().parse::<Tick>().ok())
        .unwrap_or(0)
}

fn parse_beats(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if !text.contains('+') {
        return text.parse::<i64>().ok();
    }
    let mut sum = 0i64;
    let mut any = false;
    for part in text.split('+') {
        if let Ok(value) = part.trim().parse::<i64>() {
            sum = sum.saturating_add(value);
            any = true;
        }
    }
    any.then_some(sum)
}

fn measure_length_ticks(beats: i64, beat_type: i64) -> Tick {
    if beats <= 0 || beat_type <= 0 {
        return 0;
    }
    WHOLE_NOTE_TICKS.saturating_mul(beats).div_euclid(beat_type)
}

fn parse_ties(node: &roxmltree::Node) -> (bool, bool) {
    let mut tie_start = false;
    let mut tie_stop = false;

    for child in node.children().filter(|n| n.is_element()) {
        if child.has_tag_name("tie") || child.has_tag_name("tied") {
            match child.attribute("type").unwrap_or("").trim() {
                "start" => tie_start = true,
                "stop" => tie_stop = true,
                _ => {}
            }
        }
        if child.has_tag_name("notations") {
            for tied in child
                .descendants()
                .filter(|n| n.is_element() && n.has_tag_name("tied"))
            {
                match tied.attribute("type").unwrap_or("").trim() {
                    "start" => tie_start = true,
                    "stop" => tie_stop = true,
                    _ => {}
                }
            }
        }
    }

    (tie_start, tie_stop)
}

fn read_musicxml_file(path: &Path) -> Result<String, MusicXmlImportError> {
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("");
    if ext.eq_ignore_ascii_case("mxl") {
        return read_mxl_archive(path);
    }
    std::fs::read_to_string(path).map_err(|e| MusicXmlImportError::Io(e.to_string()))
}

fn read_mxl_archive(path: &Path) -> Result<String, MusicXmlImportError> {
    let data = std::fs::read(path).map_err(|e| MusicXmlImportError::Io(e.to_string()))?;
    let mut archive = ZipArchive::new(std::io::Cursor::new(data))
        .map_err(|e| MusicXmlImportError::Parse(e.to_string()))?;

    let rootfile_path = match archive.by_name("META-INF/container.xml") {
        Ok(mut container) => {
            let mut xml = String::new();
            container
                .read_to_string(&mut xml)
                .map_err(|e| MusicXmlImportError::Io(e.to_string()))?;
            Document::parse(&xml).ok().and_then(|doc| {
                doc.descendants()
                    .find(|node| node.has_tag_name("rootfile"))
                    .and_then(|node| node.attribute("full-path"))
                    .map(str::to_string)
            })
        }
        Err(_) => None,
    };

    if let Some(full_path) = rootfile_path {
        if let Ok(mut rootfile) = archive.by_name(&full_path) {
            let mut xml = String::new();
            rootfile
                .read_to_string(&mut xml)
                .map_err(|e| MusicXmlImportError::Io(e.to_string()))?;
            return Ok(xml);
        }
    }

    for idx in 0..archive.len() {
        let mut file = archive
            .by_index(idx)
            .map_err(|e| MusicXmlImportError::Parse(e.to_string()))?;
        let name = file.name().to_string();
        if name.ends_with(".xml") && !name.starts_with("META-INF/") {
            let mut xml = String::new();
            file.read_to_string(&mut xml)
                .map_err(|e| MusicXmlImportError::Io(e.to_string()))?;
            return Ok(xml);
        }
    }

    Err(MusicXmlImportError::Unsupported(
        "mxl archive missing MusicXML payload".to_string(),
    ))
}
