use super::gate::InteractionGate;
use super::retry::{RetryCounter, RetryDecision, RetryPolicy};
use crate::config::PlaybackConfig;
use crate::media::{ElementId, MediaHandle, MediaKind};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

/// How an attach call settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Playback started
    Playing,
    /// Autoplay refused; playback will start on the next user interaction
    Deferred,
    /// The source could not be loaded
    Failed,
    /// The element was detached before playback could start
    Abandoned,
    /// The caller's deadline passed first; the attempt continues in the background
    TimedOut,
}

impl PlaybackOutcome {
    /// Whether waiting on this element any longer is pointless
    pub fn is_settled(&self) -> bool {
        !matches!(self, PlaybackOutcome::TimedOut)
    }
}

/// Load/play with retries and an interaction-gated autoplay fallback
#[derive(Debug, Clone)]
pub struct PlaybackReliability {
    config: PlaybackConfig,
    gate: Arc<InteractionGate>,
    // elements with an armed interaction listener
    deferred: Arc<Mutex<HashSet<ElementId>>>,
}

impl PlaybackReliability {
    pub fn new(config: PlaybackConfig, gate: Arc<InteractionGate>) -> Self {
        Self {
            config,
            gate,
            deferred: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn gate(&self) -> &Arc<InteractionGate> {
        &self.gate
    }

    /// Whether `id` is already waiting for the next user interaction
    pub fn is_deferred(&self, id: ElementId) -> bool {
        self.deferred.lock().contains(&id)
    }

    /// Load and start `handle` with the configured retry budget
    pub async fn attach(&self, handle: &MediaHandle, kind: MediaKind) -> PlaybackOutcome {
        self.attach_with_retries(handle, kind, self.config.max_retries)
            .await
    }

    /// Load and start `handle`.
    ///
    /// Load errors are retried with the load backoff; play rejections with the
    /// play backoff, after which a one-shot interaction listener is armed.
    pub async fn attach_with_retries(
        &self,
        handle: &MediaHandle,
        kind: MediaKind,
        max_retries: u32,
    ) -> PlaybackOutcome {
        let mut load_retry = RetryCounter::new(RetryPolicy::fixed(
            max_retries,
            self.config.load_retry_delay(),
        ));

        loop {
            match handle.load().await {
                Ok(()) => break,
                Err(e) => match load_retry.record_failure() {
                    RetryDecision::RetryAfter(delay) => {
                        warn!(
                            "{:?} overlay {} failed to load ({}), retry {}/{} in {:?}",
                            kind,
                            handle.id(),
                            e,
                            load_retry.failures(),
                            max_retries,
                            delay
                        );
                        sleep(delay).await;
                    }
                    RetryDecision::GiveUp { attempts } => {
                        error!(
                            "{:?} overlay {} failed to load after {} attempts: {}",
                            kind,
                            handle.id(),
                            attempts,
                            e
                        );
                        return PlaybackOutcome::Failed;
                    }
                },
            }
        }

        let mut play_retry = RetryCounter::new(RetryPolicy::fixed(
            max_retries,
            self.config.play_retry_delay(),
        ));

        loop {
            if !handle.is_presented() {
                debug!("{} detached before playback, not starting", handle.id());
                return PlaybackOutcome::Abandoned;
            }

            match handle.play().await {
                Ok(()) => {
                    debug!("{:?} overlay {} playing", kind, handle.id());
                    return PlaybackOutcome::Playing;
                }
                Err(e) => match play_retry.record_failure() {
                    RetryDecision::RetryAfter(delay) => {
                        debug!(
                            "Play of {} rejected ({}), retry {}/{} in {:?}",
                            handle.id(),
                            e,
                            play_retry.failures(),
                            max_retries,
                            delay
                        );
                        sleep(delay).await;
                    }
                    RetryDecision::GiveUp { attempts } => {
                        info!(
                            "Play of {} rejected {} times, waiting for user interaction",
                            handle.id(),
                            attempts
                        );
                        self.arm_interaction_fallback(Arc::clone(handle));
                        return PlaybackOutcome::Deferred;
                    }
                },
            }
        }
    }

    /// Like [`attach`](Self::attach), invoking `on_failure` when the source never loads
    pub async fn attach_or_else<F>(
        &self,
        handle: &MediaHandle,
        kind: MediaKind,
        on_failure: F,
    ) -> PlaybackOutcome
    where
        F: FnOnce(&MediaHandle),
    {
        let outcome = self.attach(handle, kind).await;
        if outcome == PlaybackOutcome::Failed {
            on_failure(handle);
        }
        outcome
    }

    /// Attach in the background and wait at most `deadline` for it to settle.
    ///
    /// The attempt keeps running past the deadline, so a late start still shows.
    pub async fn attach_with_deadline(
        &self,
        handle: MediaHandle,
        kind: MediaKind,
        deadline: Duration,
    ) -> PlaybackOutcome {
        let this = self.clone();
        let task = tokio::spawn(async move { this.attach(&handle, kind).await });

        match timeout(deadline, task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                error!("Playback task for {:?} overlay failed: {}", kind, e);
                PlaybackOutcome::Failed
            }
            Err(_) => {
                warn!(
                    "{:?} overlay did not start within {:?}, continuing without it",
                    kind, deadline
                );
                PlaybackOutcome::TimedOut
            }
        }
    }

    /// At most one listener per element; a second rejection reuses the armed one
    fn arm_interaction_fallback(&self, handle: MediaHandle) {
        let id = handle.id();
        if !self.deferred.lock().insert(id) {
            debug!("{} already waiting for user interaction", id);
            return;
        }

        let mut listener = self.gate.subscribe();
        let deferred = Arc::clone(&self.deferred);

        tokio::spawn(async move {
            let changed = listener.changed().await;
            deferred.lock().remove(&id);
            if changed.is_err() {
                return;
            }

            if !handle.is_presented() {
                debug!("{} detached before interaction, not starting", handle.id());
                return;
            }

            match handle.play().await {
                Ok(()) => info!("{} started after user interaction", handle.id()),
                Err(e) => warn!("{} still refused after user interaction: {}", handle.id(), e),
            }
        });
    }
}
