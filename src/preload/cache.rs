use crate::capture::SessionHandle;
use crate::config::PreloadConfig;
use crate::detector::{AssetProfile, AssetSource};
use crate::error::AssetLoadError;
use crate::events::{EventBus, PosecamEvent};
use crate::media::{self, MediaBackend, MediaHandle, MediaKind};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

/// A loaded, ready-to-play template
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub asset_id: String,
    pub handle: MediaHandle,
    pub loaded_at: DateTime<Utc>,
}

/// Result of the critical (idle + one pose) load
#[derive(Debug, Clone)]
pub struct CriticalLoad {
    pub idle: Option<MediaHandle>,
    pub priority_pose: Option<String>,
    pub pose_loaded: bool,
}

/// Result of the background load
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failed: Vec<(String, AssetLoadError)>,
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// Asset-id keyed cache of loaded overlay templates.
///
/// Templates are never presented; callers get independent instances via
/// [`checkout`](PreloadCache::checkout).
pub struct PreloadCache {
    profile: Arc<AssetProfile>,
    backend: Arc<dyn MediaBackend>,
    config: PreloadConfig,
    session: SessionHandle,
    event_bus: Arc<EventBus>,
    slots: Mutex<HashMap<String, Slot>>,
    ready: AtomicBool,
    rng: Mutex<StdRng>,
}

impl PreloadCache {
    pub fn new(
        profile: Arc<AssetProfile>,
        backend: Arc<dyn MediaBackend>,
        config: PreloadConfig,
        session: SessionHandle,
        event_bus: Arc<EventBus>,
        rng_seed: Option<u64>,
    ) -> Self {
        let rng = match rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            profile,
            backend,
            config,
            session,
            event_bus,
            slots: Mutex::new(HashMap::new()),
            ready: AtomicBool::new(false),
            rng: Mutex::new(rng),
        }
    }

    /// Load `asset_id` once; concurrent and later callers share the result
    pub async fn preload(&self, asset_id: &str) -> Result<MediaHandle, AssetLoadError> {
        let source = self
            .profile
            .source(asset_id)
            .ok_or_else(|| AssetLoadError::UnknownAsset {
                asset_id: asset_id.to_string(),
            })?;

        let slot = {
            let mut slots = self.slots.lock();
            Arc::clone(slots.entry(asset_id.to_string()).or_default())
        };

        let entry = slot.get_or_try_init(|| self.load_entry(source)).await?;
        Ok(Arc::clone(&entry.handle))
    }

    async fn load_entry(&self, source: AssetSource) -> Result<CacheEntry, AssetLoadError> {
        let handle = self.backend.create_element(&source, MediaKind::Template);
        let load_timeout = self.config.load_timeout();
        debug!("Loading {} from {}", source.asset_id, source.path.display());

        let result = match timeout(load_timeout, handle.load()).await {
            Ok(result) => result,
            Err(_) => Err(AssetLoadError::Timeout {
                asset_id: source.asset_id.clone(),
                timeout: load_timeout,
            }),
        };

        match result {
            Ok(()) => {
                info!("Preloaded {}", source.asset_id);
                let _ = self.event_bus.publish(PosecamEvent::AssetLoaded {
                    asset_id: source.asset_id.clone(),
                });
                Ok(CacheEntry {
                    asset_id: source.asset_id,
                    handle,
                    loaded_at: Utc::now(),
                })
            }
            Err(e) => {
                warn!("Failed to preload {}: {}", source.asset_id, e);
                media::teardown(self.backend.as_ref(), &handle);
                let _ = self.event_bus.publish(PosecamEvent::AssetFailed {
                    asset_id: source.asset_id,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Load the idle overlay and one randomly chosen pose in parallel.
    ///
    /// The cache is ready for the first capture once both have settled,
    /// whether or not they succeeded.
    pub async fn load_critical(&self) -> CriticalLoad {
        let priority_pose = self
            .profile
            .pose_asset_ids
            .choose(&mut *self.rng.lock())
            .cloned();
        self.session.lock().priority_pose_id = priority_pose.clone();
        info!(
            "Critical load: {} + {}",
            self.profile.idle_asset_id,
            priority_pose.as_deref().unwrap_or("no pose")
        );

        let idle_id = self.profile.idle_asset_id.clone();
        let pose = async {
            match &priority_pose {
                Some(id) => Some(self.preload(id).await),
                None => None,
            }
        };
        let (idle, pose) = tokio::join!(self.preload(&idle_id), pose);

        let pose_loaded = matches!(pose, Some(Ok(_)));
        if let (true, Some(id)) = (pose_loaded, &priority_pose) {
            self.session.lock().loaded_pose_ids.insert(id.clone());
        }

        self.ready.store(true, Ordering::Release);
        let _ = self.event_bus.publish(PosecamEvent::CriticalLoadComplete {
            priority_pose: priority_pose.clone(),
        });

        CriticalLoad {
            idle: idle.ok(),
            priority_pose,
            pose_loaded,
        }
    }

    /// Load every other pose one at a time, skipping failures
    pub async fn load_remaining(&self) -> LoadReport {
        let priority = self.session.priority_pose_id();
        let remaining: Vec<String> = self
            .profile
            .pose_asset_ids
            .iter()
            .filter(|id| priority.as_ref() != Some(*id))
            .cloned()
            .collect();

        let mut report = LoadReport::default();
        for (i, asset_id) in remaining.into_iter().enumerate() {
            if i > 0 {
                sleep(self.config.inter_load_delay()).await;
            }

            match self.preload(&asset_id).await {
                Ok(_) => {
                    self.session.lock().loaded_pose_ids.insert(asset_id.clone());
                    report.loaded.push(asset_id);
                }
                Err(e) => {
                    warn!("Skipping pose {}: {}", asset_id, e);
                    report.failed.push((asset_id, e));
                }
            }
        }

        info!(
            "Background load complete: {} loaded, {} failed",
            report.loaded.len(),
            report.failed.len()
        );
        let _ = self.event_bus.publish(PosecamEvent::BackgroundLoadComplete {
            loaded: report.loaded.len(),
            failed: report.failed.len(),
        });
        report
    }

    /// An independent playable instance of a cached asset
    pub fn checkout(&self, asset_id: &str, kind: MediaKind) -> Option<MediaHandle> {
        self.entry(asset_id).map(|entry| entry.handle.duplicate(kind))
    }

    pub fn entry(&self, asset_id: &str) -> Option<CacheEntry> {
        self.slots
            .lock()
            .get(asset_id)
            .and_then(|slot| slot.get().cloned())
    }

    pub fn is_ready_for_capture(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Ids with a loaded template, sorted
    pub fn loaded_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .slots
            .lock()
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Tear down every template and forget all entries
    pub fn clear(&self) {
        let slots: Vec<Slot> = self.slots.lock().drain().map(|(_, slot)| slot).collect();
        for entry in slots.iter().filter_map(|slot| slot.get()) {
            media::teardown(self.backend.as_ref(), &entry.handle);
        }
        self.ready.store(false, Ordering::Release);
        self.session.lock().loaded_pose_ids.clear();
        debug!("Preload cache cleared ({} slots)", slots.len());
    }
}
