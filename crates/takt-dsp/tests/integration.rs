//! Integration tests for the full onset analysis chain.

use takt_dsp::{
    AudioBlock, Framer, OnsetStrength, PeakPicker, PowerSpectrum, WindowKind,
};
use takt_flow::{Node, NodeExt, Step};

/// Drive the detector analysis chain over hop-sized blocks of `signal`
/// and return the hop indices at which a knock was detected.
fn detect(signal: &[f32], sr: u32, win: usize, hop: usize, picker: PeakPicker) -> Vec<usize> {
    let mut chain = Framer::new(win, hop, 1)
        .pipe(PowerSpectrum::new(win, sr, 1, WindowKind::HalfHann, true))
        .pipe(OnsetStrength::new(1.0))
        .pipe(picker);
    chain.start().unwrap();

    let mut hits = Vec::new();
    for (index, block) in signal.chunks(hop).enumerate() {
        if block.len() < hop {
            break;
        }
        let step = chain.send(AudioBlock::new(block.to_vec(), 1)).unwrap();
        if let Step::Yield(true) = step {
            hits.push(index);
        }
    }
    chain.close().unwrap();
    hits
}

#[test]
fn impulse_is_detected_with_the_picker_delay() {
    let sr = 44100;
    let hop = 512;
    let win = 2048;
    let picker = PeakPicker::new(3, 3, 3, 3, 3, 1e-6);
    let delay = picker.delay();

    let mut signal = vec![0.0f32; hop * 40];
    let impulse_hop = 10;
    signal[impulse_hop * hop] = 1.0;

    let hits = detect(&signal, sr, win, hop, picker);
    assert_eq!(hits.len(), 1, "expected exactly one detection: {:?}", hits);
    let expected = impulse_hop + delay;
    assert!(
        hits[0].abs_diff(expected) <= 1,
        "detection at hop {}, expected about {}",
        hits[0],
        expected
    );
}

#[test]
fn silence_produces_no_detections() {
    let picker = PeakPicker::new(3, 3, 3, 3, 3, 1e-6);
    let signal = vec![0.0f32; 512 * 30];
    assert!(detect(&signal, 44100, 2048, 512, picker).is_empty());
}

#[test]
fn two_separated_knocks_both_detected() {
    let sr = 44100;
    let hop = 512;
    let picker = PeakPicker::new(3, 3, 3, 3, 3, 1e-6);

    let mut signal = vec![0.0f32; hop * 60];
    signal[10 * hop] = 1.0;
    signal[40 * hop] = 0.8;

    let hits = detect(&signal, sr, 2048, hop, picker);
    assert_eq!(hits.len(), 2, "detections: {:?}", hits);
}
