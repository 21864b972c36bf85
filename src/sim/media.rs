use crate::detector::AssetSource;
use crate::error::{AssetLoadError, PlaybackPolicyError};
use crate::media::{
    ElementId, Frame, MediaBackend, MediaElement, MediaHandle, MediaKind, NetworkState, ReadyState,
};
use async_trait::async_trait;
use image::Rgba;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

static NEXT_ELEMENT_ID: AtomicU64 = AtomicU64::new(1);

/// Scripted behaviour for the elements of one asset
#[derive(Debug, Clone)]
pub struct SimScript {
    /// Time a load takes to settle
    pub load_delay: Duration,
    /// Number of leading load attempts, per element, that fail
    pub load_failures: u32,
    /// Loads never settle
    pub never_loads: bool,
    /// Number of leading play attempts, per element, refused by autoplay policy
    pub autoplay_rejections: u32,
    pub frame_size: (u32, u32),
    pub frame_color: [u8; 4],
}

impl Default for SimScript {
    fn default() -> Self {
        Self {
            load_delay: Duration::from_millis(50),
            load_failures: 0,
            never_loads: false,
            autoplay_rejections: 0,
            frame_size: (360, 480),
            frame_color: [200, 40, 160, 128],
        }
    }
}

impl SimScript {
    pub fn failing() -> Self {
        Self {
            load_failures: u32::MAX,
            ..Self::default()
        }
    }

    pub fn hanging() -> Self {
        Self {
            never_loads: true,
            ..Self::default()
        }
    }

    pub fn autoplay_blocked(rejections: u32) -> Self {
        Self {
            autoplay_rejections: rejections,
            ..Self::default()
        }
    }
}

#[derive(Debug)]
struct ElementState {
    source: Option<String>,
    presented: bool,
    visible: bool,
    paused: bool,
    ended: bool,
    error: bool,
    ready: ReadyState,
    network: NetworkState,
    load_attempts: u32,
    play_attempts: u32,
}

/// In-process video element
pub struct SimMediaElement {
    id: ElementId,
    kind: MediaKind,
    asset: AssetSource,
    script: SimScript,
    state: Mutex<ElementState>,
    backend: Weak<BackendInner>,
}

impl SimMediaElement {
    fn new(asset: &AssetSource, kind: MediaKind, script: SimScript, backend: Weak<BackendInner>) -> Self {
        Self {
            id: ElementId(NEXT_ELEMENT_ID.fetch_add(1, Ordering::Relaxed)),
            kind,
            asset: asset.clone(),
            script,
            state: Mutex::new(ElementState {
                source: Some(asset.path.to_string_lossy().to_string()),
                presented: false,
                visible: true,
                paused: true,
                ended: false,
                error: false,
                ready: ReadyState::HaveNothing,
                network: NetworkState::Empty,
                load_attempts: 0,
                play_attempts: 0,
            }),
            backend,
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset.asset_id
    }

    pub fn load_attempts(&self) -> u32 {
        self.state.lock().load_attempts
    }

    pub fn play_attempts(&self) -> u32 {
        self.state.lock().play_attempts
    }

    /// Simulate a decoder stall: data dropped and playback halted
    pub fn stall(&self) {
        let mut state = self.state.lock();
        state.ready = ReadyState::HaveNothing;
        state.paused = true;
    }

    /// Simulate a media error
    pub fn fail(&self) {
        let mut state = self.state.lock();
        state.error = true;
        state.paused = true;
    }
}

impl fmt::Debug for SimMediaElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimMediaElement")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("asset", &self.asset.asset_id)
            .finish()
    }
}

#[async_trait]
impl MediaElement for SimMediaElement {
    fn id(&self) -> ElementId {
        self.id
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn source(&self) -> Option<String> {
        self.state.lock().source.clone()
    }

    async fn load(&self) -> Result<(), AssetLoadError> {
        let attempt = {
            let mut state = self.state.lock();
            state.load_attempts += 1;
            if state.source.is_none() {
                state.network = NetworkState::NoSource;
                state.error = true;
                return Err(AssetLoadError::Decode {
                    asset_id: self.asset.asset_id.clone(),
                    details: "no source".to_string(),
                });
            }
            state.error = false;
            state.ready = ReadyState::HaveNothing;
            state.network = NetworkState::Loading;
            state.load_attempts
        };

        if self.script.never_loads {
            std::future::pending::<()>().await;
        }
        sleep(self.script.load_delay).await;

        let mut state = self.state.lock();
        if attempt <= self.script.load_failures {
            state.error = true;
            state.network = NetworkState::Idle;
            return Err(AssetLoadError::Network {
                asset_id: self.asset.asset_id.clone(),
                details: format!("simulated failure on attempt {}", attempt),
            });
        }

        state.ready = ReadyState::HaveEnoughData;
        state.network = NetworkState::Idle;
        Ok(())
    }

    async fn play(&self) -> Result<(), PlaybackPolicyError> {
        let mut state = self.state.lock();
        state.play_attempts += 1;

        if state.source.is_none() || state.ready < ReadyState::HaveFutureData {
            return Err(PlaybackPolicyError::NotSupported {
                details: "no playable data".to_string(),
            });
        }
        if state.play_attempts <= self.script.autoplay_rejections {
            return Err(PlaybackPolicyError::AutoplayRejected {
                details: "user gesture required".to_string(),
            });
        }

        state.paused = false;
        state.ended = false;
        Ok(())
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn rewind(&self) {
        self.state.lock().ended = false;
    }

    fn release_source(&self) {
        let mut state = self.state.lock();
        state.source = None;
        state.ready = ReadyState::HaveNothing;
        state.network = NetworkState::Empty;
    }

    fn present(&self) {
        self.state.lock().presented = true;
    }

    fn detach(&self) {
        let mut state = self.state.lock();
        state.presented = false;
        state.paused = true;
    }

    fn is_presented(&self) -> bool {
        self.state.lock().presented
    }

    fn set_visible(&self, visible: bool) {
        self.state.lock().visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    fn is_ended(&self) -> bool {
        self.state.lock().ended
    }

    fn has_error(&self) -> bool {
        self.state.lock().error
    }

    fn ready_state(&self) -> ReadyState {
        self.state.lock().ready
    }

    fn network_state(&self) -> NetworkState {
        self.state.lock().network
    }

    fn current_frame(&self) -> Option<Frame> {
        let state = self.state.lock();
        if state.source.is_none() || state.ready < ReadyState::HaveCurrentData {
            return None;
        }
        let (w, h) = self.script.frame_size;
        Some(Frame::from_pixel(w, h, Rgba(self.script.frame_color)))
    }

    fn duplicate(&self, kind: MediaKind) -> MediaHandle {
        match self.backend.upgrade() {
            Some(inner) => inner.create(&self.asset, kind),
            None => Arc::new(SimMediaElement::new(
                &self.asset,
                kind,
                self.script.clone(),
                Weak::new(),
            )),
        }
    }
}

struct BackendInner {
    this: Weak<BackendInner>,
    elements: Mutex<Vec<Arc<SimMediaElement>>>,
    scripts: Mutex<HashMap<String, SimScript>>,
    default_script: Mutex<SimScript>,
    created: AtomicUsize,
    reclaims: AtomicUsize,
}

impl BackendInner {
    fn create(&self, source: &AssetSource, kind: MediaKind) -> MediaHandle {
        let script = self
            .scripts
            .lock()
            .get(&source.asset_id)
            .cloned()
            .unwrap_or_else(|| self.default_script.lock().clone());

        let element = Arc::new(SimMediaElement::new(source, kind, script, self.this.clone()));
        self.elements.lock().push(Arc::clone(&element));
        self.created.fetch_add(1, Ordering::Relaxed);
        debug!("Created {:?} element {} for {}", kind, element.id, source.asset_id);
        element
    }
}

/// In-process host document
#[derive(Clone)]
pub struct SimMediaBackend {
    inner: Arc<BackendInner>,
}

impl SimMediaBackend {
    pub fn new() -> Self {
        Self::with_default_script(SimScript::default())
    }

    pub fn with_default_script(script: SimScript) -> Self {
        Self {
            inner: Arc::new_cyclic(|this| BackendInner {
                this: this.clone(),
                elements: Mutex::new(Vec::new()),
                scripts: Mutex::new(HashMap::new()),
                default_script: Mutex::new(script),
                created: AtomicUsize::new(0),
                reclaims: AtomicUsize::new(0),
            }),
        }
    }

    /// Script applied to elements created for `asset_id` from now on
    pub fn set_script(&self, asset_id: &str, script: SimScript) {
        self.inner
            .scripts
            .lock()
            .insert(asset_id.to_string(), script);
    }

    pub fn set_default_script(&self, script: SimScript) {
        *self.inner.default_script.lock() = script;
    }

    pub fn element(&self, id: ElementId) -> Option<Arc<SimMediaElement>> {
        self.inner
            .elements
            .lock()
            .iter()
            .find(|e| e.id == id)
            .cloned()
    }

    pub fn elements_of(&self, kind: MediaKind) -> Vec<Arc<SimMediaElement>> {
        self.inner
            .elements
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }

    pub fn element_count(&self) -> usize {
        self.inner.elements.lock().len()
    }

    /// Total elements ever created
    pub fn created_count(&self) -> usize {
        self.inner.created.load(Ordering::Relaxed)
    }

    pub fn reclaim_count(&self) -> usize {
        self.inner.reclaims.load(Ordering::Relaxed)
    }
}

impl Default for SimMediaBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaBackend for SimMediaBackend {
    fn create_element(&self, source: &AssetSource, kind: MediaKind) -> MediaHandle {
        self.inner.create(source, kind)
    }

    fn elements(&self) -> Vec<MediaHandle> {
        self.inner
            .elements
            .lock()
            .iter()
            .map(|e| Arc::clone(e) as MediaHandle)
            .collect()
    }

    fn remove_element(&self, id: ElementId) {
        self.inner.elements.lock().retain(|e| e.id != id);
    }

    fn reclaim_resources(&self) {
        self.inner.reclaims.fetch_add(1, Ordering::Relaxed);
    }
}
