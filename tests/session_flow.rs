//! End-to-end session tests over a scripted transport.

mod mock_transport;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_test::assert_ok;

use live_transcript::audio::CaptureQueue;
use live_transcript::core::realtime::{LiveEvent, RealtimeError, TurnCompleteInfo};
use live_transcript::core::resume::prompt_builder_fn;
use live_transcript::core::session::{
    ControlCommand, EngineConfig, LiveSession, SessionError, SessionEvent, TranscriptSegment,
};
use live_transcript::core::transcript::{HistoryTurn, Role};

use mock_transport::{scripted, scripted_with_turn_gate, wait_until, within};

/// Lead of zero: text is released only once its audio has been read.
fn exact_sync() -> EngineConfig {
    EngineConfig {
        playback_lead: Duration::ZERO,
        ..Default::default()
    }
}

async fn next(events: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
    within("session event", events.recv())
        .await
        .expect("event channel open")
}

fn model_segment(text: &str) -> SessionEvent {
    SessionEvent::Transcript(TranscriptSegment {
        role: Role::Model,
        text: text.to_string(),
        is_final: false,
    })
}

#[tokio::test(start_paused = true)]
async fn test_interruption_recovery_end_to_end() {
    let (transport, script) = scripted(true);
    let session = Arc::new(LiveSession::builder(transport.clone()).config(exact_sync()).build());
    let playback = session.playback();
    let mut events = session.subscribe();
    let capture = Arc::new(CaptureQueue::default());
    let (control_tx, control_rx) = mpsc::channel(8);

    let runner = {
        let session = session.clone();
        let capture = capture.clone();
        tokio::spawn(async move { session.run(capture, control_rx).await })
    };

    // Outbound audio reaches the transport.
    capture.push(vec![7u8; 320]);
    wait_until("captured audio sent", || transport.audio.lock().len() == 1).await;

    // Two chunks anchored at 0 and 150.
    script.model_text("Once upon a time.");
    script.model_audio(150);
    script.model_text("There was a bear.");
    script.model_audio(150);
    wait_until("model audio buffered", || playback.total_received() == 300).await;
    assert_eq!(playback.read(120).len(), 120);

    assert_eq!(next(&mut events).await, model_segment("Once upon a time."));

    script.user_text("wait", false);
    script.push(LiveEvent::Interrupted);

    assert_eq!(
        next(&mut events).await,
        SessionEvent::Transcript(TranscriptSegment {
            role: Role::User,
            text: "wait".to_string(),
            is_final: false,
        })
    );
    assert_eq!(
        next(&mut events).await,
        SessionEvent::Interrupted {
            heard_text: "Once upon a time.".to_string(),
            interruption_count: 1,
        }
    );
    let prompt = match next(&mut events).await {
        SessionEvent::ResumeInjected { prompt } => prompt,
        other => panic!("expected resume injection, got {other:?}"),
    };
    assert!(prompt.contains("There was a bear."));
    assert!(prompt.contains("wait"));
    assert_eq!(transport.turns(), vec![prompt]);

    let stats = playback.stats();
    assert_eq!(stats.total_received, 300);
    assert_eq!(stats.total_played, 120);
    assert_eq!(stats.queued, 0);

    // Leftovers of the interrupted turn are dropped until it closes.
    script.model_audio(100);
    script.model_text("stale words");
    script.push(LiveEvent::TurnComplete(TurnCompleteInfo::default()));
    script.model_audio(50);
    wait_until("fresh audio buffered", || playback.total_received() == 350).await;

    control_tx
        .send(ControlCommand::Text("hello".to_string()))
        .await
        .unwrap();
    wait_until("text turn sent", || transport.turns().len() == 2).await;
    assert_eq!(transport.turns()[1], "hello");

    control_tx.send(ControlCommand::Quit).await.unwrap();
    let summary = assert_ok!(within("session end", runner).await.unwrap());

    assert_eq!(summary.interruption_count, 1);
    assert_eq!(
        summary.history,
        vec![
            HistoryTurn::new(Role::Model, "Once upon a time."),
            HistoryTurn::new(Role::User, "wait"),
        ]
    );
    assert!(transport.stream_ended.load(Ordering::SeqCst));
    assert!(transport.closed.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_clean_turn_released_with_playback_and_recorded() {
    let (transport, script) = scripted(true);
    let session = Arc::new(LiveSession::builder(transport.clone()).config(exact_sync()).build());
    let playback = session.playback();
    let mut events = session.subscribe();
    let (_control_tx, control_rx) = mpsc::channel(8);

    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run(Arc::new(CaptureQueue::default()), control_rx).await })
    };

    script.user_text("Tell me a story", true);
    script.model_audio(100);
    script.model_text("Here it goes.");
    script.model_audio(100);
    wait_until("model audio buffered", || playback.total_received() == 200).await;

    match next(&mut events).await {
        SessionEvent::Transcript(segment) => {
            assert_eq!(segment.role, Role::User);
            assert!(segment.is_final);
        }
        other => panic!("expected user transcript, got {other:?}"),
    }

    // Marker 100 is not released while only 50 bytes have played.
    playback.read(50);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());

    playback.read(50);
    assert_eq!(next(&mut events).await, model_segment("Here it goes."));

    script.push(LiveEvent::TurnComplete(TurnCompleteInfo::default()));
    drop(script);

    let summary = within("session end", runner).await.unwrap().unwrap();
    assert_eq!(summary.interruption_count, 0);
    assert_eq!(
        summary.history,
        vec![
            HistoryTurn::new(Role::User, "Tell me a story"),
            HistoryTurn::new(Role::Model, "Here it goes."),
        ]
    );
    assert!(transport.turns().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_custom_prompt_builder_is_sent_verbatim() {
    let (transport, script) = scripted(true);
    let builder = prompt_builder_fn(|heard, user, history| {
        format!("heard={heard} user={user} turns={}", history.len())
    });
    let session = Arc::new(
        LiveSession::builder(transport.clone())
            .config(exact_sync())
            .prompt_builder(builder)
            .build(),
    );
    let playback = session.playback();
    let (_control_tx, control_rx) = mpsc::channel(8);

    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run(Arc::new(CaptureQueue::default()), control_rx).await })
    };

    script.user_text("What is Rust?", true);
    script.model_text("Rust is a language.");
    script.model_audio(200);
    script.model_text("It has no garbage collector.");
    script.model_audio(200);
    wait_until("model audio buffered", || playback.total_received() == 400).await;
    playback.read(100);

    script.push(LiveEvent::Interrupted);
    wait_until("resume injected", || !transport.turns().is_empty()).await;

    assert_eq!(
        transport.turns(),
        vec!["heard=Rust is a language. user= turns=1".to_string()]
    );

    session.shutdown();
    let summary = within("session end", runner).await.unwrap().unwrap();
    assert_eq!(summary.interruption_count, 1);
}

#[tokio::test(start_paused = true)]
async fn test_transport_error_ends_session() {
    let (transport, script) = scripted(true);
    let session = LiveSession::builder(transport.clone()).build();
    let (_control_tx, control_rx) = mpsc::channel(8);

    script.fail(RealtimeError::ConnectionClosed("going away".to_string()));

    let result = within(
        "session end",
        session.run(Arc::new(CaptureQueue::default()), control_rx),
    )
    .await;

    assert!(matches!(
        result,
        Err(SessionError::Transport(RealtimeError::ConnectionClosed(_)))
    ));
    assert!(transport.closed.load(Ordering::SeqCst));
    assert!(session.cancellation_token().is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_closing_control_channel_quits() {
    let (transport, _script) = scripted(true);
    let session = LiveSession::builder(transport.clone()).build();
    let (control_tx, control_rx) = mpsc::channel(8);
    drop(control_tx);

    let summary = within(
        "session end",
        session.run(Arc::new(CaptureQueue::default()), control_rx),
    )
    .await
    .unwrap();

    assert_eq!(summary.interruption_count, 0);
    assert!(summary.history.is_empty());
    assert!(transport.stream_ended.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_resume_injection_in_flight() {
    let (transport, script) = scripted_with_turn_gate(true);
    let session = Arc::new(LiveSession::builder(transport.clone()).config(exact_sync()).build());
    let playback = session.playback();
    let (_control_tx, control_rx) = mpsc::channel(8);

    let runner = {
        let session = session.clone();
        tokio::spawn(async move { session.run(Arc::new(CaptureQueue::default()), control_rx).await })
    };

    script.model_text("First sentence.");
    script.model_audio(200);
    script.model_text("Second sentence.");
    script.model_audio(200);
    wait_until("model audio buffered", || playback.total_received() == 400).await;
    playback.read(100);

    script.push(LiveEvent::Interrupted);
    wait_until("resume send started", || transport.turn_started.load(Ordering::SeqCst)).await;

    session.shutdown();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!runner.is_finished());
    assert!(transport.turns().is_empty());
    assert!(!transport.closed.load(Ordering::SeqCst));

    transport.release_turns();
    let summary = within("session end", runner).await.unwrap().unwrap();

    assert_eq!(summary.interruption_count, 1);
    assert_eq!(transport.turns().len(), 1);
    assert!(transport.turns()[0].contains("Second sentence."));
    assert_eq!(transport.calls(), vec!["turn", "stream_end", "close"]);
}
