use std::sync::mpsc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use rand::rngs::StdRng;
use rand::SeedableRng;

use ringcheck::controller::{SessionController, StartOutcome};
use ringcheck::difficulty::{Difficulty, Level};
use ringcheck::protocol::{SkillCheckOver, StartSkillCheck};
use ringcheck::runtime::{FixedTicker, RingEvent, Runner, TestEventSource};
use ringcheck::sweep::{period_ms, BASE_PERIOD_MS};

fn start(command: &StartSkillCheck, seed: u64) -> SessionController<StdRng> {
    match SessionController::start_command(command, StdRng::seed_from_u64(seed), 0) {
        StartOutcome::Started(controller) => *controller,
        StartOutcome::Rejected { error, .. } => panic!("valid config rejected: {}", error),
    }
}

// Headless integration using the internal runtime + controller without a TTY.
// Verifies that a minimal session completes via Runner/TestEventSource.
#[test]
fn headless_single_stage_hit_completes() {
    let command = StartSkillCheck::single(Difficulty::named(Level::Easy));
    let mut controller = start(&command, 5);

    let stage = controller.active_stage().unwrap().clone();
    let hit_ms = (stage.zone_center_deg() / 360.0 * period_ms(stage.speed_multiplier)) as u64;

    // Channel for the test event source
    let (tx, rx) = mpsc::channel();
    let es = TestEventSource::new(rx);
    let ticker = FixedTicker::new(Duration::from_millis(5));
    let runner = Runner::new(es, ticker);

    // Producer: the assigned keypress, timed to land inside the zone
    tx.send(RingEvent::Key(KeyEvent::new(
        KeyCode::Char('e'),
        KeyModifiers::NONE,
    )))
    .unwrap();

    // Act: drive a tiny event loop until a terminal reply (or bounded steps)
    let mut reply = None;
    let mut now = 0u64;
    for _ in 0..100u32 {
        match runner.step() {
            RingEvent::Tick => {
                now += 5;
                reply = controller.on_tick(now);
            }
            RingEvent::Resize => {}
            RingEvent::Key(key) => {
                if let KeyCode::Char(c) = key.code {
                    reply = controller.on_key(&c.to_string(), hit_ms);
                }
            }
        }
        if reply.is_some() {
            break;
        }
    }

    assert_eq!(reply, Some(SkillCheckOver { success: true }));
    assert_eq!(controller.result(), Some(true));
}

#[test]
fn headless_session_fails_by_timeout() {
    let command = StartSkillCheck::single(Difficulty::named(Level::Medium));
    let mut controller = start(&command, 6);

    let (_tx, rx) = std::sync::mpsc::channel();
    let es = TestEventSource::new(rx);
    let ticker = FixedTicker::new(Duration::from_millis(1));
    let runner = Runner::new(es, ticker);

    // No keypress: tick a simulated clock past one revolution at 1.5x
    let mut reply = None;
    let mut now = 0u64;
    for _ in 0..200u32 {
        if let RingEvent::Tick = runner.step() {
            now += 20;
            reply = controller.on_tick(now);
        }
        if reply.is_some() {
            break;
        }
    }

    assert_eq!(reply, Some(SkillCheckOver { success: false }));
    assert!((now as f64) >= BASE_PERIOD_MS / 1.5);
}

#[test]
fn headless_chain_advances_and_completes() {
    let command = StartSkillCheck::chain(vec![
        Difficulty::named(Level::Easy),
        Difficulty::named(Level::Medium),
        Difficulty::named(Level::Hard),
    ])
    .with_inputs(vec!["w".into(), "a".into(), "s".into(), "d".into()]);
    let mut controller = start(&command, 7);

    let mut now = 0u64;
    let mut reply = None;
    let mut stages_seen = Vec::new();

    while let Some(stage) = controller.active_stage().cloned() {
        stages_seen.push(stage.index);
        let offset = (stage.zone_center_deg() / 360.0 * period_ms(stage.speed_multiplier)) as u64;
        now += offset;
        reply = controller.on_key(&stage.assigned_key, now);
        if reply.is_some() {
            break;
        }
    }

    assert_eq!(stages_seen, vec![0, 1, 2]);
    assert_eq!(reply, Some(SkillCheckOver { success: true }));
    assert_eq!(controller.attempts().len(), 3);
}

#[test]
fn new_start_supersedes_the_old_session_silently() {
    let command = StartSkillCheck::single(Difficulty::named(Level::Easy));
    let mut old = start(&command, 8);
    assert!(old.active_stage().is_some());
    assert_eq!(old.result(), None);

    // Host issues a fresh startSkillCheck: the running session is torn down
    // before the new one is built, and emits no result of its own.
    let replacement = start(&command, 9);
    drop(old);

    assert_eq!(replacement.active_stage().unwrap().index, 0);
    assert!(replacement.has_listener());
}
