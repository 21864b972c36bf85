//! Media element seam.
//!
//! The capture core never touches a concrete player. Overlay videos are
//! reached through [`MediaElement`], and the host document (the set of live
//! elements, element creation, decoder reclaim) through [`MediaBackend`].

use crate::detector::AssetSource;
use crate::error::{AssetLoadError, PlaybackPolicyError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A decoded RGBA frame
pub type Frame = image::RgbaImage;

/// Shared handle to a media element
pub type MediaHandle = Arc<dyn MediaElement>;

/// Identity of a media element within its backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub u64);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "media#{}", self.0)
    }
}

/// Role of a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    /// Looping ambient overlay shown between captures
    Idle,
    /// Transient overlay shown during one capture
    Pose,
    /// Preloaded template owned by the cache, never presented
    Template,
}

/// How much media data is buffered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ReadyState {
    HaveNothing,
    HaveMetadata,
    HaveCurrentData,
    HaveFutureData,
    HaveEnoughData,
}

/// Fetch state of the element's source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkState {
    Empty,
    Idle,
    Loading,
    NoSource,
}

/// A playable video element
#[async_trait]
pub trait MediaElement: Send + Sync + fmt::Debug {
    fn id(&self) -> ElementId;

    fn kind(&self) -> MediaKind;

    /// Source path, `None` once released
    fn source(&self) -> Option<String>;

    /// (Re)load the source; resolves once enough data arrived to play through
    async fn load(&self) -> Result<(), AssetLoadError>;

    async fn play(&self) -> Result<(), PlaybackPolicyError>;

    fn pause(&self);

    /// Seek back to the first frame
    fn rewind(&self);

    /// Drop the source so the decoder can be reclaimed
    fn release_source(&self);

    /// Attach to the presentation surface
    fn present(&self);

    /// Remove from the presentation surface
    fn detach(&self);

    fn is_presented(&self) -> bool;

    fn set_visible(&self, visible: bool);

    fn is_visible(&self) -> bool;

    fn is_paused(&self) -> bool;

    fn is_ended(&self) -> bool;

    fn has_error(&self) -> bool;

    fn ready_state(&self) -> ReadyState;

    fn network_state(&self) -> NetworkState;

    /// The currently decoded frame, if any
    fn current_frame(&self) -> Option<Frame>;

    /// An independent playable instance of the same source
    fn duplicate(&self, kind: MediaKind) -> MediaHandle;
}

/// The host document: creates elements and knows every element it holds
pub trait MediaBackend: Send + Sync {
    fn create_element(&self, source: &AssetSource, kind: MediaKind) -> MediaHandle;

    /// Every element currently known to the document
    fn elements(&self) -> Vec<MediaHandle>;

    /// Forget an element entirely
    fn remove_element(&self, id: ElementId);

    /// Hint that unused decoder resources may be reclaimed
    fn reclaim_resources(&self) {}
}

/// Pause, rewind, release and detach an overlay, then drop it from the document
pub fn teardown(backend: &dyn MediaBackend, element: &MediaHandle) {
    element.pause();
    element.rewind();
    element.release_source();
    element.detach();
    backend.remove_element(element.id());
}
