use super::*;
use crate::camera::{CameraSessionManager, Facing};
use crate::compositor::StaticDecorations;
use crate::config::PosecamConfig;
use crate::detector::{detect, Environment, StaticCodecProbe};
use crate::error::{CameraAccessError, CompositeError, CompositionWarning, PosecamError};
use crate::events::{EventBus, PosecamEvent};
use crate::media::{MediaElement, MediaKind};
use crate::playback::{InteractionGate, PlaybackReliability};
use crate::preload::PreloadCache;
use crate::sim::{SimCameraSource, SimMediaBackend, SimScript, SimStage, StageCall};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::sleep;

const CHROME_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

struct Rig {
    sequencer: Arc<CaptureSequencer>,
    session: SessionHandle,
    backend: SimMediaBackend,
    camera: CameraSessionManager,
    cache: Arc<PreloadCache>,
    stage: Arc<SimStage>,
    events: broadcast::Receiver<PosecamEvent>,
}

fn rig(script: SimScript) -> Rig {
    let mut config = PosecamConfig::default();
    config.compositor.output_resolution = (144, 192);
    config.system.rng_seed = Some(11);

    let env = Environment::new(CHROME_UA, Arc::new(StaticCodecProbe::permissive()));
    let profile = Arc::new(detect(&env, &config.assets));
    let backend = SimMediaBackend::with_default_script(script);
    let session = SessionHandle::new(Facing::Front);
    let event_bus = Arc::new(EventBus::new(128));
    let events = event_bus.subscribe();
    let stage = Arc::new(SimStage::new());

    let camera = CameraSessionManager::new(
        config.camera.clone(),
        Arc::new(SimCameraSource::new().with_frame_size(90, 120)),
        session.clone(),
        Arc::clone(&event_bus),
    );
    let cache = Arc::new(PreloadCache::new(
        Arc::clone(&profile),
        Arc::new(backend.clone()),
        config.preload.clone(),
        session.clone(),
        Arc::clone(&event_bus),
        config.system.rng_seed,
    ));
    let playback = PlaybackReliability::new(
        config.playback.clone(),
        Arc::new(InteractionGate::new()),
    );

    let sequencer = CaptureSequencer::builder()
        .with_config(config.capture.clone())
        .with_compositor_config(config.compositor.clone())
        .with_profile(profile)
        .with_session(session.clone())
        .with_cache(Arc::clone(&cache))
        .with_backend(Arc::new(backend.clone()))
        .with_playback(playback)
        .with_decorations(Arc::new(StaticDecorations::default()))
        .with_stage(stage.clone())
        .with_event_bus(event_bus)
        .with_rng_seed(config.system.rng_seed)
        .build()
        .unwrap();

    Rig {
        sequencer: Arc::new(sequencer),
        session,
        backend,
        camera,
        cache,
        stage,
        events,
    }
}

/// Camera started, critical assets loaded and the idle overlay playing
async fn ready_rig(script: SimScript) -> Rig {
    let rig = rig(script);
    rig.camera.start(Facing::Front).await.unwrap();
    rig.cache.load_critical().await;

    if let Some(idle) = rig.cache.checkout("idle", MediaKind::Idle) {
        idle.present();
        let _ = idle.load().await;
        let _ = idle.play().await;
        rig.session.lock().idle_overlay = Some(idle);
    }
    rig
}

fn drain(events: &mut broadcast::Receiver<PosecamEvent>) -> Vec<PosecamEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_builder_requires_collaborators() {
    let result = CaptureSequencer::builder()
        .with_config(PosecamConfig::default().capture)
        .build();
    assert!(matches!(result, Err(PosecamError::Component { .. })));
}

#[tokio::test(start_paused = true)]
async fn test_capture_produces_image_and_returns_to_idle() {
    let mut rig = ready_rig(SimScript::default()).await;
    drain(&mut rig.events);

    let result = rig.sequencer.capture().await.unwrap().unwrap();

    assert_eq!(result.capture_count, 1);
    assert_eq!((result.image.width, result.image.height), (144, 192));
    assert_eq!(&result.image.bytes[..2], &[0xFF, 0xD8]);
    assert!(result.warnings.contains(&CompositionWarning::LogoUnavailable));
    assert!(!result.warnings.contains(&CompositionWarning::OverlayUnavailable));

    assert_eq!(rig.session.phase(), Phase::Idle);
    assert_eq!(rig.session.capture_count(), 1);
    assert_eq!(rig.session.captured_image(), Some(result.image.clone()));

    let events = drain(&mut rig.events);
    assert!(matches!(
        events.first(),
        Some(PosecamEvent::PoseSelected { from_cache: true, .. })
    ));
    assert!(matches!(
        events.last(),
        Some(PosecamEvent::CaptureCompleted { capture_count: 1, .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_countdown_values_over_time() {
    let rig = ready_rig(SimScript::default()).await;
    let sequencer = Arc::clone(&rig.sequencer);
    let task = tokio::spawn(async move { sequencer.capture().await });

    // the cached pose starts after its 50ms load, then the countdown begins
    sleep(Duration::from_millis(50)).await;
    let mut observed = Vec::new();
    for _ in 0..4 {
        sleep(Duration::from_millis(500)).await;
        observed.push(rig.stage.countdown());
        let pose = rig.session.active_pose_overlay();
        if observed.len() < 4 {
            assert!(pose.is_some_and(|p| !p.is_paused()));
        }
        sleep(Duration::from_millis(500)).await;
    }

    assert_eq!(observed, vec![Some(3), Some(2), Some(1), None]);
    assert!(task.await.unwrap().unwrap().is_some());

    let ticks: Vec<_> = rig
        .stage
        .calls()
        .into_iter()
        .filter(|(_, call)| matches!(call, StageCall::Countdown(_)))
        .collect();
    assert_eq!(ticks.len(), 4);
    for pair in ticks.windows(2) {
        assert_eq!(pair[1].0 - pair[0].0, Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_capture_while_capturing_is_noop() {
    let rig = ready_rig(SimScript::default()).await;
    let sequencer = Arc::clone(&rig.sequencer);
    let first = tokio::spawn(async move { sequencer.capture().await });

    sleep(Duration::from_millis(10)).await;
    let phase = rig.session.phase();
    assert_ne!(phase, Phase::Idle);
    let pose_id = rig.session.active_pose_overlay().unwrap().id();
    assert_eq!(rig.backend.elements_of(MediaKind::Pose).len(), 1);
    let created = rig.backend.created_count();

    assert!(rig.sequencer.capture().await.unwrap().is_none());

    assert_eq!(rig.session.phase(), phase);
    assert_eq!(rig.session.active_pose_overlay().unwrap().id(), pose_id);
    assert_eq!(rig.backend.elements_of(MediaKind::Pose).len(), 1);
    assert_eq!(rig.backend.created_count(), created);
    assert_eq!(rig.session.capture_count(), 0);

    assert!(first.await.unwrap().unwrap().is_some());
    assert_eq!(rig.session.capture_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_resumes_paused_pose() {
    let mut rig = ready_rig(SimScript::default()).await;
    drain(&mut rig.events);
    let sequencer = Arc::clone(&rig.sequencer);
    let task = tokio::spawn(async move { sequencer.capture().await });

    // first tick at 50ms, second at 1050ms
    sleep(Duration::from_millis(600)).await;
    assert_eq!(rig.stage.countdown(), Some(3));
    let pose = rig.session.active_pose_overlay().unwrap();
    pose.pause();
    assert!(pose.is_paused());

    sleep(Duration::from_millis(500)).await;
    assert_eq!(rig.stage.countdown(), Some(2));
    assert!(!pose.is_paused());

    task.await.unwrap().unwrap();
    let ticks: Vec<bool> = drain(&mut rig.events)
        .into_iter()
        .filter_map(|e| match e {
            PosecamEvent::CountdownTick {
                value: Some(_),
                overlay_playing,
            } => Some(overlay_playing),
            _ => None,
        })
        .collect();
    assert_eq!(ticks, vec![true, true, true]);
}

#[tokio::test(start_paused = true)]
async fn test_capture_without_camera_stream_fails_fast() {
    let rig = rig(SimScript::default());

    let err = rig.sequencer.capture().await.unwrap_err();

    assert!(matches!(
        err,
        PosecamError::Camera(CameraAccessError::NoActiveStream)
    ));
    assert_eq!(rig.session.phase(), Phase::Idle);
    assert_eq!(rig.session.capture_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_total_video_failure_still_completes() {
    let rig = ready_rig(SimScript::failing()).await;
    assert!(rig.session.idle_overlay().is_none());
    assert!(rig.cache.loaded_ids().is_empty());

    let result = rig.sequencer.capture().await.unwrap().unwrap();

    assert!(result.warnings.contains(&CompositionWarning::OverlayUnavailable));
    assert_eq!(result.pose_id, rig.session.priority_pose_id());
    assert_eq!(rig.session.phase(), Phase::Idle);
    assert!(rig.backend.elements_of(MediaKind::Pose).is_empty());

    // the abandoned pose attach settles later without side effects
    sleep(Duration::from_secs(10)).await;
    assert!(rig.backend.elements_of(MediaKind::Pose).is_empty());
    assert_eq!(rig.session.phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_lost_camera_frame_still_cleans_up() {
    let rig = ready_rig(SimScript::default()).await;
    let sequencer = Arc::clone(&rig.sequencer);
    let task = tokio::spawn(async move { sequencer.capture().await });

    sleep(Duration::from_millis(1500)).await;
    let stream = rig.session.active_stream().unwrap();
    rig.camera.stop(&stream);

    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(
        err,
        PosecamError::Composite(CompositeError::NoCameraFrame)
    ));
    assert_eq!(rig.session.phase(), Phase::Idle);
    // counted even though no image was produced
    assert_eq!(rig.session.capture_count(), 1);
    assert!(rig.session.captured_image().is_none());
    assert!(rig.session.active_pose_overlay().is_none());
    assert!(rig.backend.elements_of(MediaKind::Pose).is_empty());
    assert!(rig.session.idle_overlay().unwrap().is_visible());
}

#[tokio::test(start_paused = true)]
async fn test_idle_hidden_during_capture_and_restored_after() {
    let rig = ready_rig(SimScript::default()).await;
    let idle = rig.session.idle_overlay().unwrap();
    let sequencer = Arc::clone(&rig.sequencer);
    let task = tokio::spawn(async move { sequencer.capture().await });

    sleep(Duration::from_millis(1000)).await;
    assert!(!idle.is_visible());
    assert_eq!(rig.backend.elements_of(MediaKind::Pose).len(), 1);

    task.await.unwrap().unwrap();
    assert!(idle.is_visible());
    assert!(!idle.is_paused());
    assert!(rig.backend.elements_of(MediaKind::Pose).is_empty());
    // templates stay cached
    assert_eq!(rig.backend.elements_of(MediaKind::Template).len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pose_chosen_among_loaded_poses() {
    let mut rig = ready_rig(SimScript::default()).await;
    rig.cache.load_remaining().await;
    let loaded = rig.session.loaded_pose_ids();
    assert_eq!(loaded.len(), 5);

    for _ in 0..3 {
        let result = rig.sequencer.capture().await.unwrap().unwrap();
        assert!(loaded.contains(result.pose_id.as_ref().unwrap()));
    }

    let selected = drain(&mut rig.events)
        .into_iter()
        .filter(|e| matches!(e, PosecamEvent::PoseSelected { from_cache: true, .. }))
        .count();
    assert_eq!(selected, 3);
    assert_eq!(rig.session.capture_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_shutter_failure_does_not_block_capture() {
    let rig = ready_rig(SimScript::default()).await;
    rig.stage.fail_shutter(true);

    let result = rig.sequencer.capture().await.unwrap();

    assert!(result.is_some());
    let calls = rig.stage.calls();
    assert!(calls.iter().any(|(_, c)| *c == StageCall::Shutter));
    assert!(calls
        .iter()
        .any(|(_, c)| *c == StageCall::Flash(Duration::from_millis(300))));
}

#[test]
fn test_phase_sequence() {
    let mut phase = Phase::Idle;
    let mut seen = vec![phase];
    for _ in 0..5 {
        phase = phase.next();
        seen.push(phase);
    }
    assert_eq!(
        seen,
        vec![
            Phase::Idle,
            Phase::PlayingPose,
            Phase::Counting,
            Phase::Capturing,
            Phase::Cleanup,
            Phase::Idle
        ]
    );
}
