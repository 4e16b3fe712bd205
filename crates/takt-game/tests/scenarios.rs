//! End-to-end judgement scenarios, driven through the playfield's knock
//! routing with synthetic detector events (no audio devices involved).

use takt_audio::{Detector, KnockEvent, Mixer};
use takt_config::{DetectorSettings, PlayfieldSettings};
use takt_flow::{BoxNode, Node};
use takt_game::{Event, NoteSpec, Playfield, build_events};
use takt_render::Renderer;
use takt_track::{Beatmap, PerformanceGrade};

struct Sim {
    events: Vec<Box<dyn Event>>,
    router: BoxNode<KnockEvent, ()>,
}

fn sim(tempo: f64, specs: Vec<NoteSpec>) -> Sim {
    let beatmap = Beatmap {
        tempo,
        ..Beatmap::default()
    };
    let events = build_events(&beatmap, specs);

    let (mixer, _mixer_node) = Mixer::new(44100, 512, 1, 0.0);
    let (detector, _detector_node) = Detector::new(44100, 512, 1, &DetectorSettings::default());
    let (renderer, _renderer_node) = Renderer::new(80, 60.0, 0.0);
    let field = Playfield::new(mixer, detector, renderer, 0.0, PlayfieldSettings::default());

    let mut router: BoxNode<KnockEvent, ()> = Box::new(field.knock_router());
    router.start().unwrap();
    for event in &events {
        event.register(&field);
    }
    Sim { events, router }
}

impl Sim {
    fn knock(&mut self, time: f64, strength: f32) {
        self.router
            .send(KnockEvent {
                time,
                strength,
                detected: true,
            })
            .unwrap();
    }

    fn advance(&mut self, time: f64) {
        self.router
            .send(KnockEvent {
                time,
                strength: 0.0,
                detected: false,
            })
            .unwrap();
    }

    fn progress(&self) -> f64 {
        let targets = self.events.iter().filter(|e| e.is_target()).count();
        if targets == 0 {
            return 1.0;
        }
        self.events
            .iter()
            .filter(|e| e.is_target() && e.is_finished())
            .count() as f64
            / targets as f64
    }
}

fn soft(beat: f64) -> NoteSpec {
    NoteSpec::Soft {
        beat,
        speed: None,
        volume: None,
    }
}

fn incr(beat: f64) -> NoteSpec {
    NoteSpec::Incr {
        beat,
        group: None,
        speed: None,
        volume: None,
    }
}

#[test]
fn perfect_soft() {
    // One soft note at beat 4, tempo 120 → target time 2.000 s.
    let mut sim = sim(120.0, vec![soft(4.0)]);
    sim.knock(2.0, 0.2);

    let note = &sim.events[0];
    assert!(note.is_finished());
    assert_eq!(note.score(), 16);
    assert_eq!(note.full_score(), 16);
    assert_eq!(
        note.performances()[0].grade,
        PerformanceGrade::Perfect
    );
    assert_eq!(sim.progress(), 1.0);
}

#[test]
fn late_hit_grades_down() {
    // 3.5 tolerances late lands in the bad band of the ladder.
    let mut sim = sim(120.0, vec![soft(4.0)]);
    sim.knock(2.0 + 3.5 * 0.02, 0.2);

    let note = &sim.events[0];
    assert_eq!(note.performances()[0].grade, PerformanceGrade::LateBad);
    assert_eq!(note.score(), 2);
}

#[test]
fn slightly_late_is_still_good() {
    let mut sim = sim(120.0, vec![soft(4.0)]);
    sim.knock(2.0 + 2.5 * 0.02, 0.2);
    let note = &sim.events[0];
    assert_eq!(note.performances()[0].grade, PerformanceGrade::LateGood);
    assert_eq!(note.score(), 8);
}

#[test]
fn wrong_key_loud_scores_half() {
    // A loud note answered with a quiet knock: perfect timing, wrong key.
    let mut sim = sim(
        60.0,
        vec![NoteSpec::Loud {
            beat: 2.0,
            speed: None,
            volume: None,
        }],
    );
    sim.knock(2.0, 0.3);

    let note = &sim.events[0];
    assert_eq!(
        note.performances()[0].grade,
        PerformanceGrade::PerfectWrong
    );
    assert_eq!(note.score(), 8);
}

#[test]
fn missed_note_settles_as_miss() {
    let mut sim = sim(120.0, vec![soft(4.0)]);
    // Let the judgement window close without a knock.
    sim.advance(2.5);

    let note = &sim.events[0];
    assert!(note.is_finished());
    assert_eq!(note.score(), 0);
    assert_eq!(note.performances()[0].grade, PerformanceGrade::Miss);
    assert_eq!(sim.progress(), 1.0);
}

#[test]
fn incr_cluster_accepts_rising_strengths() {
    // Three ungrouped incr notes within a beat of each other join one
    // group; rising strengths all pass the watermark.
    let mut sim = sim(60.0, vec![incr(1.0), incr(1.5), incr(2.0)]);
    sim.knock(1.0, 0.3);
    sim.knock(1.5, 0.5);
    sim.knock(2.0, 0.7);

    for event in &sim.events {
        assert!(event.is_finished());
        assert_eq!(event.score(), 16, "every note should judge correct");
    }
}

#[test]
fn incr_cluster_rejects_weakening_strength() {
    // The third knock undercuts the 0.5 watermark (margin −0.1): wrong key.
    let mut sim = sim(60.0, vec![incr(1.0), incr(1.5), incr(2.0)]);
    sim.knock(1.0, 0.3);
    sim.knock(1.5, 0.5);
    sim.knock(2.0, 0.35);

    assert_eq!(sim.events[0].score(), 16);
    assert_eq!(sim.events[1].score(), 16);
    assert_eq!(sim.events[2].score(), 8, "weak knock is wrong-key");
    assert_eq!(
        sim.events[2].performances()[0].grade,
        PerformanceGrade::PerfectWrong
    );
}

#[test]
fn roll_overshoot_bends_the_score() {
    // Roll of 4 rocks over 2 beats; six knocks overshoot by two.
    let mut sim = sim(
        60.0,
        vec![NoteSpec::Roll {
            beat: 1.0,
            length: 2.0,
            density: 2.0,
            speed: None,
            volume: None,
        }],
    );
    for i in 0..6 {
        sim.knock(1.0 + 0.2 * f64::from(i), 1.0);
    }
    sim.advance(3.0);

    let roll = &sim.events[0];
    assert!(roll.is_finished());
    assert_eq!(roll.full_score(), 8);
    assert_eq!(roll.score(), 4, "(2·4 − 6) rocks at 2 points each");
}

#[test]
fn roll_exact_count_scores_full() {
    let mut sim = sim(
        60.0,
        vec![NoteSpec::Roll {
            beat: 1.0,
            length: 2.0,
            density: 2.0,
            speed: None,
            volume: None,
        }],
    );
    for time in [1.0, 1.5, 2.0, 2.5] {
        sim.knock(time, 1.0);
    }
    sim.advance(3.0);
    assert_eq!(sim.events[0].score(), 8);
}

#[test]
fn incomplete_spin_scores_zero_after_the_window() {
    // Capacity 10, charged to 7.3 when the window closes: strict
    // completion pays nothing.
    let mut sim = sim(
        60.0,
        vec![NoteSpec::Spin {
            beat: 1.0,
            length: 5.0,
            density: 2.0,
            speed: None,
            volume: None,
        }],
    );
    for i in 0..7 {
        sim.knock(1.0 + 0.1 * f64::from(i), 1.0);
    }
    sim.knock(1.8, 0.3);

    // Mid-flight the score is proportional to the charge.
    assert!(!sim.events[0].is_finished());
    assert_eq!(sim.events[0].score(), 11); // ⌊16 · 7.3 / 10⌋

    sim.advance(6.2);
    let spin = &sim.events[0];
    assert!(spin.is_finished());
    assert_eq!(spin.score(), 0);
}

#[test]
fn completed_spin_scores_full() {
    let mut sim = sim(
        60.0,
        vec![NoteSpec::Spin {
            beat: 1.0,
            length: 2.0,
            density: 2.0,
            speed: None,
            volume: None,
        }],
    );
    for i in 0..4 {
        sim.knock(1.0 + 0.2 * f64::from(i), 1.0);
    }
    let spin = &sim.events[0];
    assert!(spin.is_finished());
    assert_eq!(spin.score(), spin.full_score());
}

#[test]
fn targets_activate_one_at_a_time() {
    // Two overlapping soft notes: a single knock settles only the first.
    let mut sim = sim(120.0, vec![soft(4.0), soft(4.1)]);
    sim.knock(2.0, 0.2);
    assert!(sim.events[0].is_finished());
    assert!(!sim.events[1].is_finished());

    // The second becomes active and takes the next knock.
    sim.knock(2.05, 0.2);
    assert!(sim.events[1].is_finished());
}

#[test]
fn knocks_outside_any_window_are_ignored() {
    let mut sim = sim(120.0, vec![soft(4.0)]);
    sim.knock(0.5, 0.9);
    assert!(!sim.events[0].is_finished());
    sim.knock(2.0, 0.2);
    assert_eq!(sim.events[0].score(), 16);
}
