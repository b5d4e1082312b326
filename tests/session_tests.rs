// Room session runtime: recorder role, transcript authoring and speech faults
//
// Time is paused so throttle and restart timers advance only when the
// test says so.

mod common;

use common::{eventually, Harness};
use loqa_rooms::recorder::{RecorderState, TranscriptMode};
use loqa_rooms::speech::{SpeechErrorKind, SpeechEvent};
use loqa_rooms::{ParticipantId, RoomMessage, SignalingError};
use std::time::Duration;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

async fn wait_for_interim(harness: &Harness, expected: &str) {
    for _ in 0..1000 {
        if harness.handle.transcript().await.unwrap().interim == expected {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("interim never became {:?}", expected);
}

#[tokio::test(start_paused = true)]
async fn test_start_recording_claims_role_and_starts_speech() {
    let harness = Harness::start("client_me");

    harness.handle.start_recording().await.unwrap();

    let status = harness.handle.status().await.unwrap();
    assert!(status.is_recording);
    assert_eq!(
        status.recorder,
        RecorderState::ActiveOwnedBy(ParticipantId::new("client_me"))
    );
    assert_eq!(status.transcript_mode, TranscriptMode::Authoring);
    assert_eq!(harness.speech.starts(), 1);
    assert_eq!(harness.recording_states(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn test_start_rejected_while_someone_else_records() {
    let harness = Harness::start("client_me");
    harness.receive(
        "client_x",
        RoomMessage::RecordingState {
            active: true,
            owner_id: Some(ParticipantId::new("client_x")),
            sender_id: None,
        },
    );

    let owner = RecorderState::ActiveOwnedBy(ParticipantId::new("client_x"));
    for _ in 0..1000 {
        if harness.handle.status().await.unwrap().recorder == owner {
            break;
        }
        tokio::task::yield_now().await;
    }

    let result = harness.handle.start_recording().await;
    assert!(matches!(result, Err(SignalingError::RecorderBusy(owner)) if owner.as_str() == "client_x"));
}

#[tokio::test(start_paused = true)]
async fn test_transcript_broadcasts_are_throttled_with_trailing_edge() {
    let harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();

    // t=0: sent immediately
    harness.speech.interim("a").await;
    wait_for_interim(&harness, "a").await;
    assert_eq!(harness.transcript_updates().len(), 1);

    // t=100: held, flush timer armed for t=300
    tokio::time::advance(ms(100)).await;
    harness.speech.interim("ab").await;
    wait_for_interim(&harness, "ab").await;

    // t=150: replaces the held payload
    tokio::time::advance(ms(50)).await;
    harness.speech.interim("abc").await;
    wait_for_interim(&harness, "abc").await;
    assert_eq!(harness.transcript_updates().len(), 1);

    // t=300: latest content goes out
    tokio::time::advance(ms(150)).await;
    eventually("flushed broadcast", || harness.transcript_updates().len() == 2).await;
    assert_eq!(harness.transcript_updates()[1].1, "abc");

    // t=400: more than one interval since the last immediate send
    tokio::time::advance(ms(100)).await;
    harness.speech.interim("abcd").await;
    eventually("immediate broadcast", || harness.transcript_updates().len() == 3).await;
    assert_eq!(harness.transcript_updates()[2].1, "abcd");
}

#[tokio::test(start_paused = true)]
async fn test_stop_folds_interim_and_persists_remaining_text() {
    let harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();

    harness
        .speech
        .emit(SpeechEvent::Result {
            final_text: "hello".into(),
            interim: "wor".into(),
        })
        .await;
    wait_for_interim(&harness, "wor").await;
    eventually("first record", || harness.store.texts().len() == 1).await;

    harness.handle.stop_recording().await.unwrap();
    eventually("second record", || harness.store.texts().len() == 2).await;

    assert_eq!(harness.store.texts(), vec!["hello", "wor"]);
    let last = harness.transcript_updates().pop().unwrap();
    assert_eq!(last, ("hello wor ".to_string(), String::new()));
    assert_eq!(harness.recording_states(), vec![true, false]);
    assert_eq!(harness.speech.stops(), 1);

    let records = harness.store.records();
    assert_eq!(records[0].room, "test-room");
    assert_eq!(records[0].client_id, "client_me");
    assert_eq!(records[0].language, "en-US");

    let status = harness.handle.status().await.unwrap();
    assert!(!status.is_recording);
    assert_eq!(status.recorder, RecorderState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_stop_without_role_is_rejected() {
    let harness = Harness::start("client_me");
    let result = harness.handle.stop_recording().await;
    assert!(matches!(result, Err(SignalingError::NotRecorder(_))));
    assert!(harness.recording_states().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_denial_stops_capture_and_names_the_owner() {
    let harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();
    harness.speech.interim("mine").await;
    wait_for_interim(&harness, "mine").await;

    harness.receive(
        "relay",
        RoomMessage::RecordingDenied {
            owner_id: ParticipantId::new("client_x"),
        },
    );
    eventually("speech stopped", || !harness.speech.is_running()).await;

    let status = harness.handle.status().await.unwrap();
    assert!(!status.is_recording);
    assert_eq!(
        status.recorder,
        RecorderState::ActiveOwnedBy(ParticipantId::new("client_x"))
    );
    assert_eq!(
        status.status_message.as_deref(),
        Some("Recording is active by client_x")
    );
    // Nothing extra is announced when yielding
    assert_eq!(harness.recording_states(), vec![true]);
    assert!(harness.store.texts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_fatal_speech_error_releases_role() {
    let harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();

    harness
        .speech
        .emit(SpeechEvent::Error(SpeechErrorKind::NotAllowed))
        .await;
    eventually("role released", || harness.recording_states() == vec![true, false]).await;

    let status = harness.handle.status().await.unwrap();
    assert!(!status.is_recording);
    assert_eq!(status.recorder, RecorderState::Idle);
    assert_eq!(
        status.status_message.as_deref(),
        Some("Speech recognition failed: not-allowed")
    );
    assert_eq!(harness.speech.starts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_recoverable_error_restarts_with_backoff() {
    let harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();

    harness
        .speech
        .emit(SpeechEvent::Error(SpeechErrorKind::NoSpeech))
        .await;
    eventually("engine stopped", || !harness.speech.is_running()).await;

    tokio::time::advance(ms(499)).await;
    tokio::task::yield_now().await;
    assert_eq!(harness.speech.starts(), 1);

    tokio::time::advance(ms(1)).await;
    eventually("first restart", || harness.speech.starts() == 2).await;

    // A second fault without results in between waits twice as long
    harness.speech.emit(SpeechEvent::End).await;
    eventually("engine stopped again", || !harness.speech.is_running()).await;
    tokio::time::advance(ms(999)).await;
    tokio::task::yield_now().await;
    assert_eq!(harness.speech.starts(), 2);
    tokio::time::advance(ms(1)).await;
    eventually("second restart", || harness.speech.starts() == 3).await;

    let status = harness.handle.status().await.unwrap();
    assert!(status.is_recording);
    assert_eq!(harness.recording_states(), vec![true]);
}

#[tokio::test(start_paused = true)]
async fn test_failed_engine_start_gives_up_the_role() {
    let harness = Harness::start("client_me");
    harness.speech.fail_next_start();

    harness.handle.start_recording().await.unwrap();

    let status = harness.handle.status().await.unwrap();
    assert!(!status.is_recording);
    assert_eq!(status.recorder, RecorderState::Idle);
    assert!(status
        .status_message
        .unwrap()
        .starts_with("Speech recognition unavailable"));
    assert_eq!(harness.recording_states(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn test_remote_transcript_is_displayed() {
    let harness = Harness::start("client_me");
    harness.receive(
        "client_x",
        RoomMessage::TranscriptUpdate {
            sender_id: None,
            committed: "their words ".into(),
            interim: "and m".into(),
            language: "de-DE".into(),
        },
    );

    wait_for_interim(&harness, "and m").await;
    let transcript = harness.handle.transcript().await.unwrap();
    assert_eq!(transcript.committed, "their words ");
    assert_eq!(transcript.language, "de-DE");
    assert_eq!(transcript.mode, TranscriptMode::Displaying);
    assert_eq!(transcript.author, Some(ParticipantId::new("client_x")));
}

#[tokio::test(start_paused = true)]
async fn test_store_failure_surfaces_as_status_message() {
    let harness = Harness::start("client_me");
    harness.store.set_failing();
    harness.handle.start_recording().await.unwrap();

    harness
        .speech
        .emit(SpeechEvent::Result {
            final_text: "lost words".into(),
            interim: String::new(),
        })
        .await;

    let mut message = None;
    for _ in 0..1000 {
        message = harness.handle.status().await.unwrap().status_message;
        if message.is_some() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(
        message.as_deref(),
        Some("Failed to save transcript: backend returned 500")
    );
    // Recording carries on
    assert!(harness.handle.status().await.unwrap().is_recording);
}

#[tokio::test(start_paused = true)]
async fn test_leave_releases_role_and_closes_handle() {
    let mut harness = Harness::start("client_me");
    harness.handle.start_recording().await.unwrap();

    harness.handle.leave().await.unwrap();
    (&mut harness.task).await.unwrap();

    assert_eq!(harness.recording_states(), vec![true, false]);
    assert!(harness.handle.is_closed());
    assert!(matches!(
        harness.handle.status().await,
        Err(SignalingError::SessionClosed)
    ));
}
