//! Interaction controller integration tests
//!
//! Drive the controller through its handle with fake collaborators

use std::sync::atomic::Ordering;
use std::time::Duration;

use gourmet_assistant::ai::parse_suggestion;
use gourmet_assistant::interaction::{InteractionState, Status};
use gourmet_assistant::{Error, InteractionView};

mod common;
use common::{FakeScreen, Harness, Listen, noodle_history, noodles};

const WAIT: Duration = Duration::from_secs(5);

async fn wait_for_state(harness: &Harness, state: InteractionState) -> InteractionView {
    tokio::time::timeout(WAIT, harness.handle.wait_until(|v| v.state == state))
        .await
        .expect("timed out waiting for state")
        .unwrap()
}

/// Let spawned work run to completion
async fn drain() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_noodles_order_end_to_end() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    harness.handle.replace_history(noodle_history()).unwrap();
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();

    let view = wait_for_state(&harness, InteractionState::Confirming).await;
    assert_eq!(view.status, Status::AwaitingConfirmation);
    assert_eq!(view.suggestion, Some(noodles()));
    assert_eq!(view.history_len, 2);

    let calls = harness.ai.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].command, "I want noodles");
    assert_eq!(calls[0].history_len, 2);
    assert_eq!(calls[0].location, harness.options.location);

    // The spoken response is played before confirmation is offered
    assert_eq!(
        harness.audio.played(),
        vec![format!("audio:{}", noodles().spoken_response)]
    );

    harness.handle.primary_action().unwrap();
    let view = wait_for_state(&harness, InteractionState::OrderPlaced).await;
    assert_eq!(view.status, Status::Ordered);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    assert_eq!(harness.handle.view().state, InteractionState::OrderPlaced);

    let view = wait_for_state(&harness, InteractionState::Idle).await;
    assert_eq!(view.status, Status::Ready);
    assert!(view.suggestion.is_none());

    assert_eq!(
        harness.ai.spoken().last().map(String::as_str),
        Some("Order placed for Beef Noodles from Lanzhou Noodle House. Bon appétit!")
    );
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_processing_discards_late_decision() {
    let harness = Harness::start([Listen::Say("something spicy".to_string())]);

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Processing).await;

    harness.handle.primary_action().unwrap();
    let view = wait_for_state(&harness, InteractionState::Idle).await;
    assert_eq!(view.status, Status::Ready);

    // The network call finishes after the user gave up
    harness.decisions.resolve(noodles());
    drain().await;
    harness.handle.settle().await.unwrap();

    let view = harness.handle.view();
    assert_eq!(view.state, InteractionState::Idle);
    assert!(view.suggestion.is_none());
    assert!(harness.audio.played().is_empty());
    assert!(harness.ai.spoken().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_suggestion_is_being_spoken() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    let release_speech = harness.ai.hold_next_speech();
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();
    tokio::time::timeout(WAIT, harness.handle.wait_until(|v| v.suggestion.is_some()))
        .await
        .unwrap()
        .unwrap();

    harness.handle.cancel().unwrap();
    wait_for_state(&harness, InteractionState::Idle).await;

    release_speech.send(()).unwrap();
    drain().await;
    harness.handle.settle().await.unwrap();

    assert_eq!(harness.handle.view().state, InteractionState::Idle);
    assert!(harness.audio.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_recording_stops_capture() {
    let harness = Harness::start([Listen::Hang]);

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Recording).await;
    drain().await;

    harness.handle.primary_action().unwrap();
    let view = wait_for_state(&harness, InteractionState::Idle).await;
    drain().await;

    assert_eq!(view.status, Status::Ready);
    assert_eq!(harness.capture.stopped.load(Ordering::SeqCst), 1);
    assert!(harness.ai.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_start_cancel_sequences_end_idle() {
    let sequences: [&[bool]; 4] = [
        &[true],
        &[true, true, true],
        &[false, true, false, true, true],
        &[true, false, false, true, true, true, false],
    ];

    for sequence in sequences {
        let harness = Harness::start([]);

        // true = main control, false = cancel control
        for &primary in sequence {
            if primary {
                harness.handle.primary_action().unwrap();
            } else {
                harness.handle.cancel().unwrap();
            }
            harness.handle.settle().await.unwrap();
        }
        harness.handle.cancel().unwrap();
        harness.handle.settle().await.unwrap();
        drain().await;

        let view = harness.handle.view();
        assert_eq!(view.state, InteractionState::Idle, "sequence {sequence:?}");
        assert!(view.suggestion.is_none());
    }
}

#[tokio::test(start_paused = true)]
async fn test_incomplete_decision_returns_to_idle_with_error() {
    let harness = Harness::start([Listen::Say("surprise me".to_string())]);

    let error = parse_suggestion(r#"{"suggestedMeal":"Dumplings","restaurant":"Corner Shop"}"#)
        .unwrap_err();
    assert!(matches!(error, Error::Decision(_)));
    harness.decisions.reject(error);

    harness.handle.primary_action().unwrap();
    let view = tokio::time::timeout(
        WAIT,
        harness
            .handle
            .wait_until(|v| v.state == InteractionState::Idle && v.status == Status::Error),
    )
    .await
    .unwrap()
    .unwrap();
    drain().await;

    // Recording, Processing, Idle: never Confirming
    assert_eq!(view.epoch, 3);
    assert!(view.suggestion.is_none());
    assert!(harness.ai.spoken().is_empty());
    assert!(harness.audio.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_capture_failure_returns_to_ready() {
    let harness = Harness::start([
        Listen::Fail("not-allowed".to_string()),
        Listen::Silence,
        Listen::Say("   ".to_string()),
    ]);

    for round in 1..=3 {
        harness.handle.primary_action().unwrap();

        // Each round is one start and one failure
        let view = tokio::time::timeout(
            WAIT,
            harness.handle.wait_until(|v| v.epoch == 2 * round),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(view.state, InteractionState::Idle);
        assert_eq!(view.status, Status::Ready);
    }

    assert_eq!(harness.capture.listens.load(Ordering::SeqCst), 3);
    assert!(harness.ai.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_control_in_confirming_clears_suggestion() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Confirming).await;

    harness.handle.cancel().unwrap();
    let view = wait_for_state(&harness, InteractionState::Idle).await;

    assert!(view.suggestion.is_none());
    assert_eq!(view.status, Status::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_primary_action_ignored_while_order_placed() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Confirming).await;
    harness.handle.primary_action().unwrap();
    let placed = wait_for_state(&harness, InteractionState::OrderPlaced).await;

    harness.handle.primary_action().unwrap();
    harness.handle.cancel().unwrap();
    harness.handle.settle().await.unwrap();

    let view = harness.handle.view();
    assert_eq!(view.state, InteractionState::OrderPlaced);
    assert_eq!(view.epoch, placed.epoch);
}

#[tokio::test(start_paused = true)]
async fn test_order_placed_times_out_while_confirmation_speech_stalls() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Confirming).await;

    // Synthesis of the confirmation line never returns
    let _stalled = harness.ai.hold_next_speech();
    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::OrderPlaced).await;

    let view = wait_for_state(&harness, InteractionState::Idle).await;
    assert_eq!(view.status, Status::Ready);
    assert!(view.suggestion.is_none());
    assert_eq!(harness.audio.played().len(), 1);

    // And the assistant is usable again
    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Recording).await;
}

#[tokio::test(start_paused = true)]
async fn test_stalled_suggestion_speech_still_offers_confirmation() {
    let harness = Harness::start([Listen::Say("I want noodles".to_string())]);
    let _stalled = harness.ai.hold_next_speech();
    harness.decisions.resolve(noodles());

    harness.handle.primary_action().unwrap();
    wait_for_state(&harness, InteractionState::Processing).await;

    tokio::time::sleep(Duration::from_secs(60)).await;
    harness.handle.settle().await.unwrap();

    let view = harness.handle.view();
    assert_eq!(view.state, InteractionState::Confirming);
    assert_eq!(view.suggestion, Some(noodles()));
    assert!(harness.audio.played().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_scan_replaces_history_and_speaks_welcome() {
    let harness = Harness::with_screen(FakeScreen::working(), noodle_history());

    harness.handle.scan_history().unwrap();
    let view = tokio::time::timeout(WAIT, harness.handle.wait_until(|v| v.history_len == 2))
        .await
        .unwrap()
        .unwrap();
    drain().await;

    assert_eq!(view.status, Status::Ready);
    assert_eq!(harness.ai.extractions.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.ai.spoken(),
        vec![harness.options.welcome_message.clone().unwrap()]
    );
    assert_eq!(harness.audio.played().len(), 1);
    assert_eq!(harness.handle.history().await.unwrap(), noodle_history());
}

#[tokio::test(start_paused = true)]
async fn test_failed_scan_keeps_history() {
    let harness = Harness::with_screen(FakeScreen::broken(), noodle_history());
    harness.handle.replace_history(noodle_history()[..1].to_vec()).unwrap();

    harness.handle.scan_history().unwrap();
    drain().await;
    harness.handle.settle().await.unwrap();

    let view = harness.handle.view();
    assert_eq!(view.status, Status::Ready);
    assert_eq!(view.history_len, 1);
    assert_eq!(harness.ai.extractions.load(Ordering::SeqCst), 0);
    assert!(harness.ai.spoken().is_empty());
}

#[tokio::test]
async fn test_scan_without_screen_is_skipped() {
    let harness = Harness::start([]);

    harness.handle.scan_history().unwrap();
    harness.handle.settle().await.unwrap();

    assert_eq!(harness.handle.view().status, Status::Ready);
    assert_eq!(harness.ai.extractions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_handle_errors_after_shutdown() {
    let harness = Harness::start([]);

    harness.handle.shutdown().unwrap();
    tokio::time::timeout(WAIT, async {
        while harness.handle.primary_action().is_ok() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(matches!(harness.handle.settle().await, Err(Error::Interaction(_))));
}
