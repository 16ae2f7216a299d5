use etude_domain_pitch::{NoteDetector, NoteMapper, PitchEstimator, PitchGate};
use etude_infra_audio_synthetic::SyntheticToneSource;
use etude_ports::audio::FrameSource;
use etude_ports::pitch::{Accidental, Letter, PitchClass};
use pretty_assertions::assert_eq;

const WINDOW: usize = 2048;

fn detector() -> NoteDetector {
    NoteDetector::new(WINDOW, NoteMapper::default(), PitchGate::default())
}

#[test]
fn injected_note_is_detected() {
    let mut source = SyntheticToneSource::new(44_100);
    source.inject(Letter::F, Accidental::Sharp, 3);

    let frame = source.latest_frame(WINDOW).expect("frame").expect("samples");
    let note = detector().detect(&frame).note.expect("note");

    assert_eq!(note.pitch_class, PitchClass::sharp(Letter::F));
    assert_eq!(note.octave, 3);
}

#[test]
fn flat_injection_sounds_as_the_sharp() {
    let mut source = SyntheticToneSource::new(48_000);
    source.inject(Letter::B, Accidental::Flat, 4);

    let frame = source.latest_frame(WINDOW).expect("frame").expect("samples");
    let note = detector().detect(&frame).note.expect("note");

    assert_eq!(note.pitch_class, PitchClass::sharp(Letter::A));
    assert_eq!(note.octave, 4);
}

#[test]
fn silence_renders_zeros() {
    let mut source = SyntheticToneSource::new(48_000);
    source.inject(Letter::C, Accidental::Natural, 4);
    source.silence();

    let frame = source.latest_frame(256).expect("frame").expect("samples");

    assert_eq!(frame.len(), 256);
    assert!(frame.samples.iter().all(|s| *s == 0.0));
    assert_eq!(detector().detect(&frame).note, None);
}

#[test]
fn consecutive_frames_continue_the_phase() {
    let mut source = SyntheticToneSource::new(48_000);
    source.inject_frequency(1000.0);

    let first = source.latest_frame(100).expect("frame").expect("samples");
    let second = source.latest_frame(100).expect("frame").expect("samples");

    let mut reference = SyntheticToneSource::new(48_000);
    reference.inject_frequency(1000.0);
    let joined = reference.latest_frame(200).expect("frame").expect("samples");

    for (i, sample) in first.samples.iter().chain(second.samples.iter()).enumerate() {
        assert!((sample - joined.samples[i]).abs() < 1e-4, "sample {}", i);
    }
}

#[test]
fn clones_share_the_selected_pitch() {
    let source = SyntheticToneSource::new(48_000);
    let control = source.clone();

    control.inject(Letter::A, Accidental::Natural, 4);

    assert_eq!(source.frequency_hz(), Some(440.0));
}

#[test]
fn noise_reduces_confidence() {
    let mut clean = SyntheticToneSource::new(44_100);
    clean.inject(Letter::A, Accidental::Natural, 3);
    let mut noisy = SyntheticToneSource::new(44_100);
    noisy.inject(Letter::A, Accidental::Natural, 3);
    noisy.set_noise_level(0.5);

    let mut estimator = PitchEstimator::new(WINDOW);
    let clean_frame = clean.latest_frame(WINDOW).expect("frame").expect("samples");
    let noisy_frame = noisy.latest_frame(WINDOW).expect("frame").expect("samples");

    let clean_confidence = estimator.estimate(&clean_frame).confidence;
    let noisy_confidence = estimator.estimate(&noisy_frame).confidence;
    assert!(noisy_confidence < clean_confidence);
}
