//! Phoneme timeline integration tests
//!
//! Lessons are loaded from real files; the ticker runs on paused time.

use std::sync::Arc;
use std::time::Duration;

use phonix_gateway::events::{Event, EventBus, run_dispatcher};
use phonix_gateway::timeline::{
    PhonemeTimeline, PlaybackState, TriggerMode, read_lesson, spawn_ticker, total_duration,
};
use phonix_gateway::{BroadcastHub, Role};
use tokio::sync::Mutex;
use tokio_test::{assert_err, assert_ok};

mod common;
use common::{DeliveryLog, RecordingSink, TWO_PHONEME_LESSON, lesson_file};

fn ids(phonemes: &[phonix_gateway::timeline::Phoneme]) -> Vec<&str> {
    phonemes.iter().map(|p| p.id.as_str()).collect()
}

#[test]
fn lesson_file_round_trip() {
    let file = lesson_file(TWO_PHONEME_LESSON);
    let phonemes = assert_ok!(read_lesson(file.path()));
    assert_eq!(phonemes.len(), 2);
    assert_eq!(phonemes[1].haptic_pattern, vec![100]);
    assert!((total_duration(&phonemes) - 2.0).abs() < f64::EPSILON);
}

#[test]
fn invalid_lesson_leaves_timeline_untouched() {
    let good = lesson_file(TWO_PHONEME_LESSON);
    let bad = lesson_file(r#"{"phonemes": [{"id": "x", "type": "vowel", "start": -1.0, "duration": 1.0}]}"#);

    let mut timeline = PhonemeTimeline::default();
    assert_ok!(timeline.load_file(good.path()));
    timeline.start(0.5);

    assert_err!(timeline.load_file(bad.path()));
    assert_eq!(timeline.phonemes().len(), 2);
    assert_eq!(timeline.state(), PlaybackState::Playing);
}

#[test]
fn every_tick_walks_through_the_lesson() {
    let file = lesson_file(TWO_PHONEME_LESSON);
    let mut timeline = PhonemeTimeline::new(TriggerMode::EveryTick);
    assert_ok!(timeline.load_file(file.path()));

    timeline.start(0.0);
    assert_eq!(ids(&timeline.tick(0.5)), vec!["ah"]);
    assert_eq!(ids(&timeline.tick(0.0)), vec!["ah"]);
    assert_eq!(ids(&timeline.tick(0.5)), vec!["t"]);
    assert!(timeline.tick(1.0).is_empty());

    let progress = timeline.progress();
    assert!((progress.progress - 1.0).abs() < f64::EPSILON);
}

#[test]
fn once_mode_fires_each_activation_once() {
    let file = lesson_file(TWO_PHONEME_LESSON);
    let mut timeline = PhonemeTimeline::new(TriggerMode::Once);
    assert_ok!(timeline.load_file(file.path()));

    timeline.start(0.0);
    assert_eq!(ids(&timeline.tick(0.25)), vec!["ah"]);
    assert!(timeline.tick(0.25).is_empty());
    assert_eq!(ids(&timeline.tick(0.5)), vec!["t"]);
    assert!(timeline.tick(0.25).is_empty());

    // Rewinding re-arms everything
    timeline.stop();
    timeline.start(0.0);
    assert_eq!(ids(&timeline.tick(0.1)), vec!["ah"]);
}

#[test]
fn transport_controls() {
    let file = lesson_file(TWO_PHONEME_LESSON);
    let mut timeline = PhonemeTimeline::default();
    assert_ok!(timeline.load_file(file.path()));

    timeline.resume();
    assert_eq!(timeline.state(), PlaybackState::Stopped);

    timeline.start(1.5);
    timeline.pause();
    assert!(timeline.tick(1.0).is_empty());
    assert!((timeline.offset() - 1.5).abs() < f64::EPSILON);

    timeline.resume();
    assert_eq!(timeline.state(), PlaybackState::Playing);
    let current = timeline.progress().current_phoneme.unwrap();
    assert_eq!(current.id, "t");

    timeline.stop();
    timeline.stop();
    assert_eq!(timeline.state(), PlaybackState::Stopped);
    assert!(timeline.offset().abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn ticker_feeds_haptic_feedback_to_the_hub() {
    let file = lesson_file(TWO_PHONEME_LESSON);
    let mut timeline = PhonemeTimeline::new(TriggerMode::Once);
    assert_ok!(timeline.load_file(file.path()));
    let timeline = Arc::new(Mutex::new(timeline));

    let hub = Arc::new(BroadcastHub::new());
    let phone = Arc::new(RecordingSink::new("phone", Arc::new(DeliveryLog::default())));
    hub.connect(Role::Source, phone.clone(), None).await.unwrap();

    let (bus, rx) = EventBus::new(64);
    let dispatcher = tokio::spawn(run_dispatcher(rx, Arc::clone(&hub)));
    let ticker = spawn_ticker(Arc::clone(&timeline), bus, Duration::from_millis(50));

    timeline.lock().await.start(0.0);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    ticker.abort();
    let _ = ticker.await;
    dispatcher.await.unwrap();

    let events = phone.events.lock().unwrap().clone();
    let feedback: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            Event::HapticFeedback(f) => Some(f),
            _ => None,
        })
        .collect();
    assert_eq!(feedback.len(), 2);
    assert_eq!(feedback[0].phoneme_id.as_deref(), Some("ah"));
    assert_eq!(feedback[0].pattern, vec![200]);
    // Confidence 0.5 softens the default pattern
    assert_eq!(feedback[1].phoneme_id.as_deref(), Some("t"));
    assert_eq!(feedback[1].pattern, vec![50]);
}
