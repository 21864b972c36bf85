//! Background upkeep between captures.
//!
//! Two independent timers: a short one that repairs a stalled idle overlay
//! and prunes leaked media elements, and a long one that asks the backend to
//! reclaim decoder resources. Neither touches anything while a capture runs.

use crate::capture::SessionHandle;
use crate::config::MaintenanceConfig;
use crate::events::{EventBus, PosecamEvent};
use crate::media::{self, MediaBackend, MediaHandle, MediaKind, NetworkState, ReadyState};
use crate::playback::{PlaybackOutcome, PlaybackReliability};
use crate::preload::PreloadCache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cumulative maintenance counters
#[derive(Debug, Default)]
pub struct MaintenanceStats {
    short_ticks: AtomicU64,
    long_ticks: AtomicU64,
    skipped: AtomicU64,
    repairs: AtomicU64,
    pruned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MaintenanceSnapshot {
    pub short_ticks: u64,
    pub long_ticks: u64,
    pub skipped: u64,
    pub repairs: u64,
    pub pruned: u64,
}

impl MaintenanceStats {
    pub fn snapshot(&self) -> MaintenanceSnapshot {
        MaintenanceSnapshot {
            short_ticks: self.short_ticks.load(Ordering::Relaxed),
            long_ticks: self.long_ticks.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            repairs: self.repairs.load(Ordering::Relaxed),
            pruned: self.pruned.load(Ordering::Relaxed),
        }
    }
}

/// What one short tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShortTickReport {
    pub skipped: bool,
    pub repaired: bool,
    pub pruned: usize,
}

/// Whether an overlay needs a reload to get going again
pub fn is_stalled(element: &MediaHandle) -> bool {
    element.has_error()
        || element.network_state() == NetworkState::NoSource
        || element.ready_state() == ReadyState::HaveNothing
        || (element.is_paused() && !element.is_ended())
}

pub struct Maintenance {
    config: MaintenanceConfig,
    session: SessionHandle,
    cache: Arc<PreloadCache>,
    backend: Arc<dyn MediaBackend>,
    playback: PlaybackReliability,
    event_bus: Arc<EventBus>,
    stats: MaintenanceStats,
}

impl Maintenance {
    pub fn new(
        config: MaintenanceConfig,
        session: SessionHandle,
        cache: Arc<PreloadCache>,
        backend: Arc<dyn MediaBackend>,
        playback: PlaybackReliability,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            config,
            session,
            cache,
            backend,
            playback,
            event_bus,
            stats: MaintenanceStats::default(),
        }
    }

    pub fn stats(&self) -> MaintenanceSnapshot {
        self.stats.snapshot()
    }

    fn can_run(&self) -> bool {
        self.session.is_idle() && self.cache.is_ready_for_capture()
    }

    /// Stall check on the idle overlay, then the orphan sweep
    pub async fn tick_short(&self) -> ShortTickReport {
        self.stats.short_ticks.fetch_add(1, Ordering::Relaxed);
        if !self.can_run() {
            debug!("Capture in progress or assets loading, skipping maintenance");
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return ShortTickReport {
                skipped: true,
                ..ShortTickReport::default()
            };
        }

        let repaired = match self.session.idle_overlay() {
            Some(idle) if self.playback.is_deferred(idle.id()) => {
                debug!("Idle overlay {} waiting for user interaction", idle.id());
                false
            }
            Some(idle) if is_stalled(&idle) => self.repair_idle(&idle).await,
            _ => false,
        };

        // a capture may have started while the repair was in flight
        let pruned = if self.can_run() { self.sweep_orphans() } else { 0 };

        ShortTickReport {
            skipped: false,
            repaired,
            pruned,
        }
    }

    async fn repair_idle(&self, idle: &MediaHandle) -> bool {
        warn!(
            "Idle overlay {} stalled (ready={:?}, network={:?}, error={}), reloading",
            idle.id(),
            idle.ready_state(),
            idle.network_state(),
            idle.has_error()
        );

        match self.playback.attach(idle, MediaKind::Idle).await {
            PlaybackOutcome::Playing | PlaybackOutcome::Deferred => {
                self.stats.repairs.fetch_add(1, Ordering::Relaxed);
                let _ = self.event_bus.publish(PosecamEvent::IdleRepaired);
                info!("Idle overlay {} repaired", idle.id());
                true
            }
            outcome => {
                warn!("Idle overlay repair did not succeed: {:?}", outcome);
                false
            }
        }
    }

    /// Remove elements nobody owns any more: detached or errored, and not the
    /// camera preview, the idle overlay, the current pose or a cached template
    fn sweep_orphans(&self) -> usize {
        let (preview, idle, current) = {
            let session = self.session.lock();
            (
                session.active_stream.as_ref().map(|s| s.preview_id()),
                session.idle_overlay.as_ref().map(|e| e.id()),
                session.active_pose_overlay.as_ref().map(|e| e.id()),
            )
        };

        let orphans: Vec<MediaHandle> = self
            .backend
            .elements()
            .into_iter()
            .filter(|element| {
                let id = Some(element.id());
                element.kind() != MediaKind::Template
                    && id != preview
                    && id != idle
                    && id != current
                    && (!element.is_presented() || element.has_error())
            })
            .collect();

        for orphan in &orphans {
            media::teardown(self.backend.as_ref(), orphan);
        }

        if !orphans.is_empty() {
            info!("Pruned {} orphaned media elements", orphans.len());
            self.stats
                .pruned
                .fetch_add(orphans.len() as u64, Ordering::Relaxed);
            let _ = self.event_bus.publish(PosecamEvent::ElementsPruned {
                count: orphans.len(),
            });
        }
        orphans.len()
    }

    /// Resource-reclaim hint and counter report; returns false when skipped
    pub fn tick_long(&self) -> bool {
        self.stats.long_ticks.fetch_add(1, Ordering::Relaxed);
        if !self.can_run() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        self.backend.reclaim_resources();
        let stats = self.stats.snapshot();
        info!(
            "Maintenance: {} captures, {} idle repairs, {} elements pruned",
            self.session.capture_count(),
            stats.repairs,
            stats.pruned
        );
        true
    }

    /// Run both timers until the token is cancelled
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        info!(
            "Starting maintenance (stall check every {:?}, reclaim every {:?})",
            self.config.stall_check_interval(),
            self.config.reclaim_interval()
        );

        tokio::spawn(async move {
            let mut short = interval(self.config.stall_check_interval());
            let mut long = interval(self.config.reclaim_interval());
            short.set_missed_tick_behavior(MissedTickBehavior::Delay);
            long.set_missed_tick_behavior(MissedTickBehavior::Delay);
            short.tick().await;
            long.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        info!("Maintenance stopped");
                        break;
                    }
                    _ = short.tick() => {
                        self.tick_short().await;
                    }
                    _ = long.tick() => {
                        self.tick_long();
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Facing;
    use crate::capture::Phase;
    use crate::config::PosecamConfig;
    use crate::detector::{detect, Environment, StaticCodecProbe};
    use crate::media::MediaElement;
    use crate::playback::{Interaction, InteractionGate};
    use crate::sim::{SimMediaBackend, SimScript};
    use std::time::Duration;
    use tokio::time::sleep;

    const CHROME_UA: &str = "Mozilla/5.0 (X11; Linux x86_64) Chrome/120.0.0.0 Safari/537.36";

    struct Rig {
        maintenance: Arc<Maintenance>,
        session: SessionHandle,
        cache: Arc<PreloadCache>,
        backend: SimMediaBackend,
        event_bus: Arc<EventBus>,
    }

    fn rig() -> Rig {
        let config = PosecamConfig::default();
        let env = Environment::new(CHROME_UA, Arc::new(StaticCodecProbe::permissive()));
        let profile = Arc::new(detect(&env, &config.assets));
        let backend = SimMediaBackend::new();
        let session = SessionHandle::new(Facing::Front);
        let event_bus = Arc::new(EventBus::new(64));
        let cache = Arc::new(PreloadCache::new(
            profile,
            Arc::new(backend.clone()),
            config.preload.clone(),
            session.clone(),
            Arc::clone(&event_bus),
            Some(3),
        ));
        let playback = PlaybackReliability::new(
            config.playback.clone(),
            Arc::new(InteractionGate::new()),
        );
        let maintenance = Arc::new(Maintenance::new(
            config.maintenance.clone(),
            session.clone(),
            Arc::clone(&cache),
            Arc::new(backend.clone()),
            playback,
            Arc::clone(&event_bus),
        ));

        Rig {
            maintenance,
            session,
            cache,
            backend,
            event_bus,
        }
    }

    async fn with_idle(rig: &Rig) -> MediaHandle {
        rig.cache.load_critical().await;
        let idle = rig.cache.checkout("idle", MediaKind::Idle).unwrap();
        idle.present();
        idle.load().await.unwrap();
        idle.play().await.unwrap();
        rig.session.lock().idle_overlay = Some(Arc::clone(&idle));
        idle
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_before_critical_load() {
        let rig = rig();
        let report = rig.maintenance.tick_short().await;
        assert!(report.skipped);
        assert!(!rig.maintenance.tick_long());
        assert_eq!(rig.backend.reclaim_count(), 0);
        assert_eq!(rig.maintenance.stats().skipped, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_while_capturing() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        rig.backend.element(idle.id()).unwrap().stall();
        rig.session.lock().phase = Phase::Counting;

        let report = rig.maintenance.tick_short().await;

        assert!(report.skipped);
        assert!(idle.is_paused());
        assert!(!rig.maintenance.tick_long());
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_idle_is_left_alone() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        let attempts = rig.backend.element(idle.id()).unwrap().load_attempts();

        let report = rig.maintenance.tick_short().await;

        assert!(!report.skipped);
        assert!(!report.repaired);
        assert_eq!(
            rig.backend.element(idle.id()).unwrap().load_attempts(),
            attempts
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_idle_is_reloaded_and_replayed() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        let mut events = rig.event_bus.subscribe();
        rig.backend.element(idle.id()).unwrap().stall();
        assert!(is_stalled(&idle));

        let report = rig.maintenance.tick_short().await;

        assert!(report.repaired);
        assert!(!idle.is_paused());
        assert!(!is_stalled(&idle));
        assert_eq!(rig.maintenance.stats().repairs, 1);
        assert!(matches!(events.try_recv(), Ok(PosecamEvent::IdleRepaired)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocked_autoplay_is_not_reloaded_every_tick() {
        let rig = rig();
        rig.backend
            .set_default_script(SimScript::autoplay_blocked(u32::MAX));
        rig.cache.load_critical().await;
        let idle = rig.cache.checkout("idle", MediaKind::Idle).unwrap();
        idle.present();
        rig.session.lock().idle_overlay = Some(Arc::clone(&idle));

        let playback = &rig.maintenance.playback;
        assert_eq!(
            playback.attach(&idle, MediaKind::Idle).await,
            PlaybackOutcome::Deferred
        );
        assert_eq!(playback.gate().armed(), 1);
        let element = rig.backend.element(idle.id()).unwrap();
        let loads = element.load_attempts();
        let plays = element.play_attempts();

        for _ in 0..10 {
            let report = rig.maintenance.tick_short().await;
            assert!(!report.skipped);
            assert!(!report.repaired);
        }

        assert_eq!(playback.gate().armed(), 1);
        assert_eq!(element.load_attempts(), loads);
        assert_eq!(element.play_attempts(), plays);
        assert_eq!(rig.maintenance.stats().repairs, 0);

        // a touch that still does not unlock playback lets the next tick retry once
        playback.gate().interact(Interaction::Touch);
        sleep(Duration::from_millis(1)).await;
        assert_eq!(playback.gate().armed(), 0);
        assert!(!playback.is_deferred(idle.id()));

        assert!(rig.maintenance.tick_short().await.repaired);
        assert!(!rig.maintenance.tick_short().await.repaired);
        assert_eq!(playback.gate().armed(), 1);
        assert_eq!(element.load_attempts(), loads + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errored_idle_is_repaired() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        rig.backend.element(idle.id()).unwrap().fail();

        assert!(rig.maintenance.tick_short().await.repaired);
        assert!(!idle.has_error());
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphan_sweep_spares_owned_elements() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        let template = rig.cache.entry("idle").unwrap().handle;

        let detached = rig.cache.checkout("idle", MediaKind::Pose).unwrap();
        let errored = rig.cache.checkout("idle", MediaKind::Pose).unwrap();
        errored.present();
        rig.backend.element(errored.id()).unwrap().fail();
        let current = rig.cache.checkout("idle", MediaKind::Pose).unwrap();
        rig.session.lock().active_pose_overlay = Some(Arc::clone(&current));
        let before = rig.backend.element_count();

        let report = rig.maintenance.tick_short().await;

        assert_eq!(report.pruned, 2);
        assert_eq!(rig.backend.element_count(), before - 2);
        assert!(rig.backend.element(detached.id()).is_none());
        assert!(rig.backend.element(errored.id()).is_none());
        assert!(rig.backend.element(current.id()).is_some());
        assert!(rig.backend.element(idle.id()).is_some());
        assert!(rig.backend.element(template.id()).is_some());
        assert_eq!(rig.maintenance.stats().pruned, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_tick_hints_reclaim() {
        let rig = rig();
        with_idle(&rig).await;

        assert!(rig.maintenance.tick_long());
        assert_eq!(rig.backend.reclaim_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loops_run_until_cancelled() {
        let rig = rig();
        let idle = with_idle(&rig).await;
        let token = CancellationToken::new();
        let handle = Arc::clone(&rig.maintenance).spawn(token.clone());

        rig.backend.element(idle.id()).unwrap().stall();
        sleep(Duration::from_secs(61)).await;
        assert!(!idle.is_paused());
        assert_eq!(rig.maintenance.stats().repairs, 1);
        assert_eq!(rig.backend.reclaim_count(), 0);

        sleep(Duration::from_secs(240)).await;
        assert_eq!(rig.backend.reclaim_count(), 1);
        assert_eq!(rig.maintenance.stats().short_ticks, 5);

        token.cancel();
        handle.await.unwrap();
    }
}
