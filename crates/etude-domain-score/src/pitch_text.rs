//! Parsing of human-readable pitch descriptions.
//!
//! Score libraries do not always expose structured pitch fields. This module
//! accepts the two text forms seen in practice, the descriptive
//! `"Key: C#, octave: 4"` and the compact `"C#4"` / `"Db4"`. It normalizes
//! them into [`ExpectedNote`] so nothing downstream sees the strings.

use etude_ports::pitch::{Accidental, ExpectedNote, Letter};

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PitchTextError {
    #[error("malformed pitch text: {0}")]
    Malformed(String),
    #[error("unknown pitch letter in: {0}")]
    UnknownLetter(String),
}

pub fn parse_pitch_text(text: &str) -> Result<ExpectedNote, PitchTextError> {
    let trimmed = text.trim();
    if find_label(trimmed, "key:").is_some() {
        parse_descriptive(trimmed)
    } else {
        parse_compact(trimmed)
    }
}

fn parse_descriptive(text: &str) -> Result<ExpectedNote, PitchTextError> {
    let malformed = || PitchTextError::Malformed(text.to_string());

    let key_start = find_label(text, "key:").ok_or_else(malformed)?;
    let after_key = text[key_start..].trim_start();
    let (letter, accidental, _) = parse_spelling(after_key, text)?;

    let octave_start = find_label(after_key, "octave:").ok_or_else(malformed)?;
    let after_octave = after_key[octave_start..].trim_start();
    let digits_end = after_octave
        .char_indices()
        .find(|(idx, c)| !(c.is_ascii_digit() || (*idx == 0 && *c == '-')))
        .map(|(idx, _)| idx)
        .unwrap_or(after_octave.len());
    let octave = after_octave[..digits_end]
        .parse::<i32>()
        .map_err(|_| malformed())?;

    Ok(ExpectedNote::new(letter, accidental, octave))
}

fn parse_compact(text: &str) -> Result<ExpectedNote, PitchTextError> {
    let (letter, accidental, rest) = parse_spelling(text, text)?;
    let octave = rest
        .parse::<i32>()
        .map_err(|_| PitchTextError::Malformed(text.to_string()))?;
    Ok(ExpectedNote::new(letter, accidental, octave))
}

/// Reads `[A-G][#b]?` and returns the remainder.
fn parse_spelling<'a>(
    text: &'a str,
    original: &str,
) -> Result<(Letter, Accidental, &'a str), PitchTextError> {
    let mut chars = text.chars();
    let first = chars
        .next()
        .ok_or_else(|| PitchTextError::Malformed(original.to_string()))?;
    let letter =
        Letter::from_char(first).ok_or_else(|| PitchTextError::UnknownLetter(original.to_string()))?;

    let rest = &text[first.len_utf8()..];
    let (accidental, rest) = match rest.chars().next() {
        Some('#') => (Accidental::Sharp, &rest[1..]),
        Some('b') => (Accidental::Flat, &rest[1..]),
        _ => (Accidental::Natural, rest),
    };
    Ok((letter, accidental, rest))
}

/// Byte offset just past `label`, matched case-insensitively.
fn find_label(text: &str, label: &str) -> Option<usize> {
    text.to_ascii_lowercase()
        .find(label)
        .map(|idx| idx + label.len())
}
