//! Signal intake and debouncing.
//!
//! Bursty, overlapping change signals (SPA navigation, DOM mutation,
//! player mutation) collapse into single evaluations through two
//! independent single-slot timers. A slot holds at most one pending
//! deadline; every new signal replaces it — last signal wins, nothing
//! queues.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Change signals an embedder feeds into a running reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSignal {
    /// The host single-page app finished a navigation.
    NavigationFinished,
    /// The host page refreshed its data in place.
    PageDataUpdated,
    /// The primary content container mutated. Deep subtree churn must
    /// be reported with `direct_child: false` and is ignored, which
    /// bounds observer cost.
    ContentMutation { direct_child: bool },
    /// The player container mutated — the only way ad start/stop is
    /// noticed, since the host emits no direct event for it.
    PlayerMutation,
    /// The user activated the add-control.
    AddControlActivated,
    /// The page is unloading: cancel pending timers and stop.
    Shutdown,
}

/// Clonable intake handle for a running reconciler.
///
/// Sends never block; signals sent after the reconciler stopped are
/// silently dropped (the page is gone, there is nothing to update).
#[derive(Clone)]
pub struct ReconcilerHandle {
    tx: mpsc::UnboundedSender<PageSignal>,
}

impl ReconcilerHandle {
    pub(crate) fn new(tx: mpsc::UnboundedSender<PageSignal>) -> Self {
        Self { tx }
    }

    pub fn signal(&self, signal: PageSignal) {
        if self.tx.send(signal).is_err() {
            tracing::trace!(?signal, "Reconciler stopped, dropping signal");
        }
    }

    pub fn navigation_finished(&self) {
        self.signal(PageSignal::NavigationFinished);
    }

    pub fn page_data_updated(&self) {
        self.signal(PageSignal::PageDataUpdated);
    }

    pub fn content_mutation(&self, direct_child: bool) {
        self.signal(PageSignal::ContentMutation { direct_child });
    }

    pub fn player_mutation(&self) {
        self.signal(PageSignal::PlayerMutation);
    }

    pub fn add_control_activated(&self) {
        self.signal(PageSignal::AddControlActivated);
    }

    pub fn shutdown(&self) {
        self.signal(PageSignal::Shutdown);
    }
}

/// A single-slot debounce timer.
#[derive(Debug)]
pub(crate) struct DebounceSlot {
    window: Duration,
    deadline: Option<Instant>,
}

impl DebounceSlot {
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            deadline: None,
        }
    }

    /// Arm the slot (or push an armed slot further out) to one full
    /// quiet window from now.
    pub(crate) fn bump(&mut self) {
        self.deadline = Some(Instant::now() + self.window);
    }

    /// Disarm. Must be called after the slot fires, or it fires again
    /// immediately.
    pub(crate) fn clear(&mut self) {
        self.deadline = None;
    }

    /// Resolves when the pending deadline passes; pends forever while
    /// the slot is disarmed.
    pub(crate) async fn fired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{advance, timeout};

    #[tokio::test(start_paused = true)]
    async fn disarmed_slot_never_fires() {
        let slot = DebounceSlot::new(Duration::from_millis(200));
        let result = timeout(Duration::from_secs(10), slot.fired()).await;
        assert!(result.is_err(), "disarmed slot must pend forever");
    }

    #[tokio::test(start_paused = true)]
    async fn armed_slot_fires_after_its_window() {
        let mut slot = DebounceSlot::new(Duration::from_millis(200));
        slot.bump();

        // Not yet at 199ms...
        advance(Duration::from_millis(199)).await;
        assert!(
            timeout(Duration::from_millis(0), slot.fired()).await.is_err(),
            "must not fire before the window closes"
        );

        // ...but at 200ms.
        advance(Duration::from_millis(1)).await;
        assert!(timeout(Duration::from_millis(0), slot.fired()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn each_bump_replaces_the_deadline() {
        let mut slot = DebounceSlot::new(Duration::from_millis(200));
        slot.bump();

        advance(Duration::from_millis(150)).await;
        slot.bump(); // replaces, does not queue

        // The original deadline (t=200) passes without firing.
        advance(Duration::from_millis(100)).await;
        assert!(timeout(Duration::from_millis(0), slot.fired()).await.is_err());

        // The replacement deadline (t=350) does fire.
        advance(Duration::from_millis(100)).await;
        assert!(timeout(Duration::from_millis(0), slot.fired()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_disarms_a_pending_deadline() {
        let mut slot = DebounceSlot::new(Duration::from_millis(200));
        slot.bump();
        slot.clear();

        advance(Duration::from_secs(1)).await;
        assert!(timeout(Duration::from_millis(0), slot.fired()).await.is_err());
    }
}
