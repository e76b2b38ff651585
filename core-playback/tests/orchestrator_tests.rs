//! End-to-end tests for the load orchestrator
//!
//! These tests drive a real orchestrator with scripted connections and verify:
//! - Fallback order and failure recording
//! - Sound cache reuse
//! - Single playback and current sound events
//! - Restartable `play` calls
//! - Controls, volume and position sampling

mod support;

use bridge_traits::device::DeviceHintProvider;
use core_playback::{
    LoadOrchestrator, LoadOutcome, PlaybackError, SoundLocator, SoundOptions, SoundState,
    SoundUrl, UrlInput,
};
use core_runtime::events::{AudioEvent, CoreEvent, ServiceEvent};
use mockall::mock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use support::{config, eventually, names_until, next_event, wait_for, MockConnection, Outcome};

mock! {
    pub Hints {}
    impl DeviceHintProvider for Hints {
        fn is_mobile(&self) -> bool;
        fn force_single_audio_element(&self) -> bool;
    }
}

fn orchestrator(names: &[&str], connections: &[&Arc<MockConnection>]) -> LoadOrchestrator {
    let config = config(names).build().unwrap();
    build(config, connections)
}

fn build(
    config: core_runtime::config::CoreConfig,
    connections: &[&Arc<MockConnection>],
) -> LoadOrchestrator {
    let mut builder = LoadOrchestrator::builder(config);
    for connection in connections {
        builder = builder.connection(Arc::clone(*connection) as Arc<dyn core_playback::Connection>);
    }
    builder.build().unwrap()
}

fn url(orchestrator: &LoadOrchestrator, path: &str) -> SoundUrl {
    SoundUrl::parse(path, &orchestrator.settings().base().unwrap()).unwrap()
}

fn attempt_pairs(outcome: &LoadOutcome) -> Vec<(String, String)> {
    outcome
        .failures()
        .iter()
        .map(|f| {
            let path = f.url.trim_start_matches("http://localhost").to_string();
            (f.connection.clone(), path)
        })
        .collect()
}

fn pair(connection: &str, path: &str) -> (String, String) {
    (connection.to_string(), path.to_string())
}

// ============================================================================
// Loading
// ============================================================================

#[tokio::test]
async fn test_falls_back_past_failing_url() {
    let native = MockConnection::new("NativeAudio")
        .script("/bad.mp3", Outcome::Error("404 not found".into()))
        .shared();
    let web = MockConnection::new("WebAudio")
        .script("/bad.mp3", Outcome::Error("decode failed".into()))
        .shared();
    let orchestrator = orchestrator(&["NativeAudio", "WebAudio"], &[&native, &web]);

    let outcome = orchestrator
        .load(vec!["/bad.mp3", "/good.mp3"], SoundOptions::default())
        .await
        .unwrap();

    let sound = outcome.sound().expect("sound should be ready");
    assert_eq!(sound.url().path(), "/good.mp3");
    assert_eq!(sound.connection(), "NativeAudio");
    assert_eq!(outcome.failures().len(), 2);
    assert!(web.attempts().iter().all(|path| path != "/good.mp3"));

    let errors = orchestrator
        .error_cache()
        .errors_for(&url(&orchestrator, "/bad.mp3"));
    assert_eq!(errors.len(), 2);
    assert_eq!(errors[0].connection, "NativeAudio");
    assert_eq!(errors[0].message, "404 not found");
    assert_eq!(errors[1].connection, "WebAudio");
    assert!(!orchestrator
        .error_cache()
        .has_errors(&url(&orchestrator, "/good.mp3")));
}

#[tokio::test]
async fn test_second_load_hits_cache() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let first = orchestrator
        .load("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    let second = orchestrator
        .load("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(native.attempts(), vec!["/a.mp3"]);
    assert_eq!(orchestrator.sound_cache().len(), 1);

    let found = orchestrator.find_loaded("/a.mp3").await.unwrap();
    assert_eq!(found, Some(first));
    assert_eq!(orchestrator.find_loaded("/b.mp3").await.unwrap(), None);
}

#[tokio::test]
async fn test_cache_hit_on_any_candidate() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let cached = orchestrator
        .load("/b.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    let outcome = orchestrator
        .load(vec!["/a.mp3", "/b.mp3"], SoundOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.sound(), Some(&cached));
    assert_eq!(native.attempts(), vec!["/b.mp3"]);
}

#[tokio::test]
async fn test_exhausted_load_prefers_native_message() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Error("404 not found".into()))
        .shared();
    let web = MockConnection::new("WebAudio")
        .with_fallback(Outcome::Error("decode failed".into()))
        .shared();
    let orchestrator = orchestrator(&["WebAudio", "NativeAudio"], &[&native, &web]);
    let mut events = orchestrator.events();

    let outcome = orchestrator
        .load("/x.mp3", SoundOptions::default())
        .await
        .unwrap();

    let LoadOutcome::Failed(failure) = &outcome else {
        panic!("expected a failed load, got {outcome:?}");
    };
    assert_eq!(failure.message.as_deref(), Some("404 not found"));
    assert_eq!(
        attempt_pairs(&outcome),
        vec![pair("WebAudio", "/x.mp3"), pair("NativeAudio", "/x.mp3")]
    );

    match wait_for(&mut events, "audio-load-error").await {
        CoreEvent::Service(ServiceEvent::LoadError {
            urls,
            failures,
            message,
        }) => {
            assert_eq!(urls.len(), 1);
            assert!(urls[0].ends_with("/x.mp3"));
            assert_eq!(failures.len(), 2);
            assert_eq!(message.as_deref(), Some("404 not found"));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(orchestrator.sound_cache().is_empty());
}

#[tokio::test]
async fn test_create_error_counts_as_failed_attempt() {
    let native = MockConnection::new("NativeAudio")
        .script("/a.mp3", Outcome::CreateError("connection reset".into()))
        .shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let outcome = orchestrator
        .load(vec!["/a.mp3", "/b.mp3"], SoundOptions::default())
        .await
        .unwrap();

    assert_eq!(outcome.sound().map(|s| s.url().path().to_string()), Some("/b.mp3".into()));
    let record = orchestrator
        .error_cache()
        .find(&url(&orchestrator, "/a.mp3"), "NativeAudio")
        .unwrap();
    assert!(record.message.contains("connection reset"));
}

#[tokio::test]
async fn test_error_after_ready_fails_attempt() {
    let native = MockConnection::new("NativeAudio")
        .script("/a.mp3", Outcome::ReadyThenError("stream dropped".into()))
        .shared();
    let web = MockConnection::new("WebAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio", "WebAudio"], &[&native, &web]);

    let outcome = orchestrator
        .load("/a.mp3", SoundOptions::default())
        .await
        .unwrap();

    let sound = outcome.sound().expect("sound should be ready");
    assert_eq!(sound.connection(), "WebAudio");
    assert_eq!(attempt_pairs(&outcome), vec![pair("NativeAudio", "/a.mp3")]);
    assert_eq!(
        orchestrator
            .error_cache()
            .find(&url(&orchestrator, "/a.mp3"), "NativeAudio")
            .map(|r| r.message),
        Some("stream dropped".to_string())
    );
    assert!(native.calls().contains(&"teardown:/a.mp3".to_string()));
    assert_eq!(orchestrator.sound_cache().len(), 1);
}

#[tokio::test]
async fn test_errored_sound_is_evicted_and_reloaded() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let first = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    assert_eq!(orchestrator.current_sound(), Some(first.clone()));

    first.reporter().errored("stream dropped");

    assert!(first.is_torn_down());
    assert!(orchestrator.sound_cache().is_empty());
    assert_eq!(orchestrator.current_sound(), None);
    assert!(native.calls().contains(&"teardown:/a.mp3".to_string()));

    let second = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert_ne!(first, second);
    assert_eq!(native.attempts(), vec!["/a.mp3", "/a.mp3"]);
    assert_eq!(second.state(), SoundState::Playing);
    assert_eq!(orchestrator.current_sound(), Some(second));
    assert_eq!(orchestrator.sound_cache().len(), 1);
}

#[tokio::test]
async fn test_standard_attempt_order() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Error("no".into()))
        .shared();
    let web = MockConnection::new("WebAudio")
        .with_fallback(Outcome::Error("no".into()))
        .shared();
    let orchestrator = orchestrator(&["WebAudio", "NativeAudio"], &[&native, &web]);

    let outcome = orchestrator
        .load(vec!["/u1.mp3", "/u2.mp3"], SoundOptions::default())
        .await
        .unwrap();

    assert_eq!(
        attempt_pairs(&outcome),
        vec![
            pair("WebAudio", "/u1.mp3"),
            pair("NativeAudio", "/u1.mp3"),
            pair("WebAudio", "/u2.mp3"),
            pair("NativeAudio", "/u2.mp3"),
        ]
    );
    assert!(native.tokens().iter().all(Option::is_none));
}

#[tokio::test]
async fn test_mobile_attempt_order_and_shared_audio() {
    let mut hints = MockHints::new();
    hints.expect_is_mobile().return_const(true);
    hints.expect_force_single_audio_element().return_const(false);

    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Error("no".into()))
        .shared();
    let web = MockConnection::new("WebAudio")
        .with_fallback(Outcome::Error("no".into()))
        .shared();
    let config = config(&["WebAudio", "NativeAudio"])
        .device_hints(Arc::new(hints))
        .build()
        .unwrap();
    let orchestrator = build(config, &[&native, &web]);
    assert!(orchestrator.is_mobile_device());

    let outcome = orchestrator
        .load(vec!["/u1.mp3", "/u2.mp3"], SoundOptions::default())
        .await
        .unwrap();

    assert_eq!(
        attempt_pairs(&outcome),
        vec![
            pair("NativeAudio", "/u1.mp3"),
            pair("NativeAudio", "/u2.mp3"),
            pair("WebAudio", "/u1.mp3"),
            pair("WebAudio", "/u2.mp3"),
        ]
    );
    let token = Some(orchestrator.shared_audio_token());
    assert!(native.tokens().iter().chain(web.tokens().iter()).all(|t| *t == token));
}

#[tokio::test]
async fn test_preferred_connections_restrict_attempts() {
    let native = MockConnection::new("NativeAudio").shared();
    let web = MockConnection::new("WebAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio", "WebAudio"], &[&native, &web]);

    let sound = orchestrator
        .load(
            "/a.mp3",
            SoundOptions::default().with_connections(["WebAudio"]),
        )
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert_eq!(sound.connection(), "WebAudio");
    assert!(native.attempts().is_empty());
}

#[tokio::test]
async fn test_unplayable_urls_fail_without_attempts() {
    let native = MockConnection::new("NativeAudio").with_extensions(&["mp3"]).shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let outcome = orchestrator
        .load("/a.flac", SoundOptions::default())
        .await
        .unwrap();

    assert!(outcome.is_failed());
    assert!(outcome.failures().is_empty());
    assert!(native.attempts().is_empty());
}

#[tokio::test]
async fn test_metadata_attached_on_success() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let mut metadata = serde_json::Map::new();
    metadata.insert("title".into(), "Night Drive".into());
    let sound = orchestrator
        .load("/a.mp3", SoundOptions::default().with_metadata(metadata.clone()))
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert_eq!(sound.metadata(), metadata);
}

// ============================================================================
// Request Errors
// ============================================================================

#[tokio::test]
async fn test_resolution_errors_propagate() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let err = orchestrator
        .load(Vec::<String>::new(), SoundOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::Resolution(_)));

    let rejected = UrlInput::deferred(async { Err::<Vec<SoundLocator>, _>("playlist offline") });
    let err = orchestrator
        .load(rejected, SoundOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::Resolution(message) if message.contains("playlist offline")));
    assert!(native.attempts().is_empty());
}

#[tokio::test]
async fn test_deferred_input_loads() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);
    let mut events = orchestrator.events();

    let deferred =
        UrlInput::deferred(async { Ok::<_, String>(vec![SoundLocator::new("/later.mp3")]) });
    let outcome = orchestrator
        .load(deferred, SoundOptions::default())
        .await
        .unwrap();
    assert!(outcome.is_ready());

    match next_event(&mut events).await {
        CoreEvent::Service(ServiceEvent::NewLoadRequest { urls, .. }) => assert!(urls.is_none()),
        other => panic!("unexpected event {other:?}"),
    }
    match next_event(&mut events).await {
        CoreEvent::Service(ServiceEvent::PreLoad { urls }) => {
            assert_eq!(urls, vec!["http://localhost/later.mp3".to_string()]);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_no_connections() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&[], &[&native]);

    assert!(orchestrator.available_connections().is_empty());
    let err = orchestrator
        .load("/a.mp3", SoundOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, PlaybackError::NoConnections));
}

#[tokio::test]
async fn test_controls_require_current_sound() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    assert!(orchestrator.pause().unwrap_err().is_precondition());
    assert!(orchestrator.stop().unwrap_err().is_precondition());
    assert!(orchestrator.toggle_pause().unwrap_err().is_precondition());
    assert!(orchestrator
        .fast_forward(Duration::from_secs(1))
        .unwrap_err()
        .is_precondition());
    assert!(orchestrator
        .rewind(Duration::from_secs(1))
        .unwrap_err()
        .is_precondition());
    assert!(orchestrator
        .set_position(Duration::ZERO)
        .unwrap_err()
        .is_precondition());

    assert!(!orchestrator.is_playing());
    assert_eq!(orchestrator.position(), None);
    assert_eq!(orchestrator.duration(), None);
}

// ============================================================================
// Playback
// ============================================================================

#[tokio::test]
async fn test_play_makes_sound_current() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);
    let mut events = orchestrator.events();

    let sound = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert_eq!(sound.state(), SoundState::Playing);
    assert_eq!(orchestrator.current_sound(), Some(sound.clone()));
    assert!(orchestrator.is_playing());
    assert!(!orchestrator.is_loading());

    assert_eq!(
        names_until(&mut events, "played").await,
        vec![
            "new-load-request",
            "pre-load",
            "load-success",
            "current-sound-changed",
            "played",
        ]
    );
}

#[tokio::test]
async fn test_new_play_interrupts_current_sound() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);
    let mut events = orchestrator.events();

    let a = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    wait_for(&mut events, "played").await;

    let b = orchestrator
        .play("/b.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();

    assert!(!a.is_playing());
    assert!(b.is_playing());

    let mut seen = Vec::new();
    loop {
        let event = next_event(&mut events).await;
        let done = matches!(&event, CoreEvent::Audio(AudioEvent::Played { sound }) if sound.id == b.id().to_string());
        seen.push(event);
        if done {
            break;
        }
    }

    let interrupted: Vec<usize> = seen
        .iter()
        .enumerate()
        .filter(|(_, e)| e.name() == "current-sound-interrupted")
        .map(|(i, _)| i)
        .collect();
    assert_eq!(interrupted.len(), 1);
    assert_eq!(
        seen[interrupted[0]].sound().map(|s| s.id.clone()),
        Some(a.id().to_string())
    );

    let changed = seen
        .iter()
        .position(|e| e.name() == "current-sound-changed")
        .unwrap();
    assert!(interrupted[0] < changed);
    match &seen[changed] {
        CoreEvent::Service(ServiceEvent::CurrentSoundChanged { sound, previous }) => {
            assert_eq!(sound.id, b.id().to_string());
            assert_eq!(previous.as_ref().map(|p| p.id.clone()), Some(a.id().to_string()));
        }
        other => panic!("unexpected event {other:?}"),
    }

    let b_paused = seen[interrupted[0]..changed].iter().any(|e| {
        e.name() == "paused" && e.sound().map(|s| s.id.clone()) == Some(b.id().to_string())
    });
    assert!(!b_paused);
}

#[tokio::test]
async fn test_direct_play_switches_current_sound() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);
    let mut events = orchestrator.events();

    let a = orchestrator
        .load("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    let b = orchestrator
        .load("/b.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    assert!(orchestrator.current_sound().is_none());

    a.play();
    assert_eq!(orchestrator.current_sound(), Some(a.clone()));
    wait_for(&mut events, "played").await;

    b.play();

    assert!(!a.is_playing());
    assert_eq!(orchestrator.current_sound(), Some(b.clone()));
    assert_eq!(
        names_until(&mut events, "played").await,
        vec![
            "paused",
            "current-sound-interrupted",
            "current-sound-changed",
            "played",
        ]
    );
}

#[tokio::test]
async fn test_at_most_one_sound_plays() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let mut sounds = Vec::new();
    for path in ["/a.mp3", "/b.mp3", "/c.mp3"] {
        sounds.push(
            orchestrator
                .load(path, SoundOptions::default())
                .await
                .unwrap()
                .into_sound()
                .unwrap(),
        );
    }

    let violated = Arc::new(AtomicBool::new(false));
    for sound in &sounds {
        let others: Vec<_> = sounds
            .iter()
            .filter(|other| *other != sound)
            .map(|other| other.downgrade())
            .collect();
        let violated = Arc::clone(&violated);
        sound.on(core_playback::SoundEventKind::Played, move |_, _| {
            let playing = others
                .iter()
                .filter_map(|other| other.upgrade())
                .any(|other| other.is_playing());
            if playing {
                violated.store(true, Ordering::SeqCst);
            }
        });
    }

    sounds[0].play();
    orchestrator
        .play("/b.mp3", SoundOptions::default())
        .await
        .unwrap();
    sounds[2].play();
    sounds[0].play();

    assert!(!violated.load(Ordering::SeqCst));
    let playing: Vec<_> = sounds.iter().filter(|s| s.is_playing()).collect();
    assert_eq!(playing, vec![&sounds[0]]);
}

#[tokio::test]
async fn test_newer_play_cancels_pending_play() {
    let native = MockConnection::new("NativeAudio")
        .script("/slow.mp3", Outcome::Pending)
        .shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);
    let mut events = orchestrator.events();

    let first = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.play("/slow.mp3", SoundOptions::default()).await }
    });
    assert!(eventually(|| native.pending().len() == 1).await);

    let second = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap();
    assert!(second.is_ready());

    let first = first.await.unwrap().unwrap();
    assert!(first.is_cancelled());

    assert!(native.calls().contains(&"teardown:/slow.mp3".to_string()));
    assert!(!native.pending()[0].is_alive());
    assert!(orchestrator.error_cache().is_empty());
    assert!(!orchestrator
        .sound_cache()
        .contains(&url(&orchestrator, "/slow.mp3")));

    let names = names_until(&mut events, "played").await;
    assert!(!names.contains(&"audio-load-error"));
    assert_eq!(
        orchestrator.current_sound().map(|s| s.url().path().to_string()),
        Some("/a.mp3".to_string())
    );
}

#[tokio::test]
async fn test_play_from_position() {
    let native = MockConnection::new("NativeAudio").shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    orchestrator
        .play(
            "/a.mp3",
            SoundOptions::default().starting_at(Duration::from_secs(2)),
        )
        .await
        .unwrap();

    assert!(native.calls().contains(&"play:/a.mp3".to_string()));
    assert!(orchestrator.is_playing());
}

// ============================================================================
// Controls
// ============================================================================

#[tokio::test]
async fn test_controls_drive_current_sound() {
    let native = MockConnection::new("NativeAudio").shared();
    let config = config(&["NativeAudio"])
        .position_interval(Duration::from_secs(60))
        .build()
        .unwrap();
    let orchestrator = build(config, &[&native]);
    let mut events = orchestrator.events();
    let sound = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    sound.reporter().duration_changed(Some(Duration::from_secs(3)));
    assert_eq!(orchestrator.duration(), Some(Duration::from_secs(3)));

    orchestrator.toggle_pause().unwrap();
    assert!(!orchestrator.is_playing());
    orchestrator.toggle_pause().unwrap();
    assert!(orchestrator.is_playing());
    wait_for(&mut events, "paused").await;
    wait_for(&mut events, "played").await;

    orchestrator.fast_forward(Duration::from_secs(5)).unwrap();
    assert_eq!(orchestrator.position(), Some(Duration::from_secs(3)));
    assert!(native.calls().contains(&"seek=3000:/a.mp3".to_string()));

    match next_event(&mut events).await {
        CoreEvent::Audio(AudioEvent::WillFastForward { from_ms, to_ms, .. }) => {
            assert_eq!((from_ms, to_ms), (0, 3000));
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(next_event(&mut events).await.name(), "position-will-change");

    orchestrator.rewind(Duration::from_secs(1)).unwrap();
    assert_eq!(orchestrator.position(), Some(Duration::from_secs(2)));
    assert_eq!(next_event(&mut events).await.name(), "will-rewind");

    orchestrator.set_position(Duration::from_millis(500)).unwrap();
    assert_eq!(orchestrator.position(), Some(Duration::from_millis(500)));

    orchestrator.stop().unwrap();
    assert!(!orchestrator.is_playing());
    assert!(native.calls().contains(&"stop:/a.mp3".to_string()));
}

#[tokio::test]
async fn test_volume_and_mute() {
    let native = MockConnection::new("NativeAudio").shared();
    let config = config(&["NativeAudio"]).initial_volume(80).build().unwrap();
    let orchestrator = build(config, &[&native]);

    let sound = orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap()
        .into_sound()
        .unwrap();
    assert_eq!(sound.volume(), 80);

    let mut events = orchestrator.events();
    orchestrator.set_volume(40).unwrap();
    assert_eq!(sound.volume(), 40);
    match wait_for(&mut events, "volume-change").await {
        CoreEvent::Service(ServiceEvent::VolumeChange { volume }) => assert_eq!(volume, 40),
        other => panic!("unexpected event {other:?}"),
    }

    assert!(matches!(
        orchestrator.set_volume(150),
        Err(PlaybackError::InvalidVolume(150))
    ));
    assert_eq!(orchestrator.volume(), 40);

    assert_eq!(orchestrator.toggle_mute(), 0);
    assert!(orchestrator.is_muted());
    assert_eq!(sound.volume(), 0);

    assert_eq!(orchestrator.toggle_mute(), 40);
    assert!(!orchestrator.is_muted());
    assert_eq!(sound.volume(), 40);
}

#[tokio::test]
async fn test_unmute_from_zero_restores_initial_volume() {
    let native = MockConnection::new("NativeAudio").shared();
    let config = config(&["NativeAudio"]).initial_volume(60).build().unwrap();
    let orchestrator = build(config, &[&native]);

    orchestrator.set_volume(0).unwrap();
    assert_eq!(orchestrator.toggle_mute(), 60);
}

// ============================================================================
// Position Sampling
// ============================================================================

#[tokio::test]
async fn test_poller_samples_current_sound() {
    let native = MockConnection::new("NativeAudio").shared();
    let config = config(&["NativeAudio"])
        .position_interval(Duration::from_millis(20))
        .build()
        .unwrap();
    let orchestrator = build(config, &[&native]);
    assert_eq!(orchestrator.position_poll_interval(), Duration::from_millis(20));

    orchestrator
        .play("/a.mp3", SoundOptions::default())
        .await
        .unwrap();

    native.set_position(Some(Duration::from_millis(1500)));
    assert!(eventually(|| orchestrator.position() == Some(Duration::from_millis(1500))).await);

    // Failed samples keep the last position and do not stop the poller.
    native.set_position(None);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(orchestrator.position(), Some(Duration::from_millis(1500)));

    native.set_position(Some(Duration::from_millis(2000)));
    assert!(eventually(|| orchestrator.position() == Some(Duration::from_millis(2000))).await);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test]
async fn test_loads_are_bounded() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Delayed(Duration::from_millis(30)))
        .shared();
    let config = config(&["NativeAudio"]).max_concurrent_loads(1).build().unwrap();
    let orchestrator = build(config, &[&native]);

    let (a, b) = tokio::join!(
        orchestrator.load("/a.mp3", SoundOptions::default()),
        orchestrator.load("/b.mp3", SoundOptions::default()),
    );

    assert!(a.unwrap().is_ready());
    assert!(b.unwrap().is_ready());
    assert_eq!(native.max_in_flight(), 1);
    assert_eq!(native.attempts(), vec!["/a.mp3", "/b.mp3"]);
    assert!(!orchestrator.is_loading());
}

#[tokio::test]
async fn test_loads_run_concurrently_under_bound() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Delayed(Duration::from_millis(30)))
        .shared();
    let config = config(&["NativeAudio"]).max_concurrent_loads(2).build().unwrap();
    let orchestrator = build(config, &[&native]);

    let (a, b) = tokio::join!(
        orchestrator.load("/a.mp3", SoundOptions::default()),
        orchestrator.load("/b.mp3", SoundOptions::default()),
    );

    assert!(a.unwrap().is_ready());
    assert!(b.unwrap().is_ready());
    assert_eq!(native.max_in_flight(), 2);
}

#[tokio::test]
async fn test_is_loading_while_attempt_pending() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Pending)
        .shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let load = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.load("/a.mp3", SoundOptions::default()).await }
    });
    assert!(eventually(|| native.pending().len() == 1).await);
    assert!(orchestrator.is_loading());

    native.pending()[0].ready();
    let outcome = load.await.unwrap().unwrap();
    assert!(outcome.is_ready());
    assert!(!orchestrator.is_loading());
}

#[tokio::test]
async fn test_first_report_wins() {
    let native = MockConnection::new("NativeAudio")
        .with_fallback(Outcome::Pending)
        .shared();
    let orchestrator = orchestrator(&["NativeAudio"], &[&native]);

    let load = tokio::spawn({
        let orchestrator = orchestrator.clone();
        async move { orchestrator.load("/a.mp3", SoundOptions::default()).await }
    });
    assert!(eventually(|| native.pending().len() == 1).await);

    let reporter = native.pending()[0].clone();
    reporter.errored("stalled");
    reporter.ready();

    let outcome = load.await.unwrap().unwrap();
    assert!(outcome.is_failed());
    assert_eq!(
        orchestrator
            .error_cache()
            .find(&url(&orchestrator, "/a.mp3"), "NativeAudio")
            .map(|r| r.message),
        Some("stalled".to_string())
    );
}
