//! Drives a shared timeline at a fixed interval and publishes its triggers

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::SharedTimeline;
use super::lesson::Phoneme;
use crate::events::{Event, EventBus, HapticFeedback, Target, unix_timestamp};
use crate::hub::scaled_pattern;

/// Default ticker period
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

/// Haptic feedback event for a triggered phoneme
#[must_use]
pub fn feedback_for(phoneme: &Phoneme) -> Event {
    Event::HapticFeedback(HapticFeedback {
        phoneme_id: Some(phoneme.id.clone()),
        category: phoneme.category,
        pattern: scaled_pattern(&phoneme.haptic_pattern, phoneme.confidence),
        confidence: phoneme.confidence,
        timestamp: unix_timestamp(),
    })
}

/// Spawn the ticker; it runs until the bus closes or the handle is aborted
#[must_use]
pub fn spawn_ticker(timeline: SharedTimeline, bus: EventBus, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let triggered = timeline.lock().await.advance();

            for phoneme in &triggered {
                tracing::trace!(phoneme = %phoneme.id, category = phoneme.category.as_str(), "phoneme triggered");
                if bus.publish(Target::All, feedback_for(phoneme)).await.is_err() {
                    tracing::debug!("event bus closed, timeline ticker exiting");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::{PhonemeCategory, PhonemeTimeline, TriggerMode};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[test]
    fn low_confidence_phoneme_is_softened() {
        let mut phoneme = Phoneme::new("a", PhonemeCategory::Vowel, 0.0, 1.0);
        phoneme.haptic_pattern = vec![120, 40];
        phoneme.confidence = 0.4;
        let Event::HapticFeedback(feedback) = feedback_for(&phoneme) else {
            panic!("expected haptic feedback");
        };
        assert_eq!(feedback.pattern, vec![60, 20]);
        assert_eq!(feedback.phoneme_id.as_deref(), Some("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_publishes_active_phonemes() {
        let mut timeline = PhonemeTimeline::new(TriggerMode::Once);
        timeline
            .load(vec![
                Phoneme::new("a", PhonemeCategory::Vowel, 0.0, 0.2),
                Phoneme::new("b", PhonemeCategory::Buzz, 0.2, 0.2),
            ])
            .unwrap();
        timeline.start(0.0);
        let shared = Arc::new(Mutex::new(timeline));

        let (bus, mut rx) = EventBus::new(16);
        let handle = spawn_ticker(Arc::clone(&shared), bus, TICK_INTERVAL);

        let mut seen = Vec::new();
        while seen.len() < 2 {
            let dispatch = rx.recv().await.unwrap();
            assert_eq!(dispatch.target, Target::All);
            if let Event::HapticFeedback(f) = dispatch.event {
                seen.push(f.phoneme_id.unwrap());
            }
        }
        handle.abort();
        assert_eq!(seen, vec!["a", "b"]);
    }
}
