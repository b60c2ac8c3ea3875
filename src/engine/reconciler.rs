//! The reconciliation engine.
//!
//! One reconciler runs per page view. It multiplexes four event
//! sources in a single `tokio::select!` loop: raw page signals from
//! the embedder, the store's change feed, completions of spawned
//! membership lookups, and the two debounce deadlines. All decisions
//! happen on this loop; only storage reads and the metadata fetch run
//! as background tasks.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::affordance;
use crate::lookup;
use crate::page::{resolve_channel_id, PageEffects, PageView};
use crate::store::{Store, StoreEvent, DEFAULT_DETAILS_TTL_HOURS};

use super::signals::{DebounceSlot, PageSignal, ReconcilerHandle};
use super::state::{apply, evaluate, suppress_distractions, FilterState};

// ============================================================================
// Configuration
// ============================================================================

/// Tunables for one reconciler instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Quiet window for the placement/navigation pass.
    pub placement_debounce: Duration,
    /// Quiet window for the filtering pass.
    pub filter_debounce: Duration,
    /// How long activation feedback stays on the add-control before it
    /// retires itself.
    pub feedback_linger: Duration,
    /// Freshness window for cached channel details, in hours.
    pub details_ttl_hours: i64,
    /// Metadata lookup base URL; `None` means the real site.
    pub lookup_base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placement_debounce: Duration::from_millis(500),
            filter_debounce: Duration::from_millis(200),
            feedback_linger: Duration::from_secs(1),
            details_ttl_hours: DEFAULT_DETAILS_TTL_HOURS,
            lookup_base_url: None,
        }
    }
}

// ============================================================================
// Reconciler
// ============================================================================

/// Completion of a spawned membership lookup.
enum EvalEvent {
    MembershipResolved {
        generation: u64,
        channel: String,
        member: bool,
    },
}

/// The per-page reconciliation engine.
///
/// Holds its own in-memory copies of the mode flag and the last applied
/// [`FilterState`], reconciling them against store notifications —
/// never against a shared memory location.
pub struct Reconciler {
    store: Store,
    page: Arc<dyn PageView>,
    effects: Arc<dyn PageEffects>,
    client: reqwest::Client,
    config: EngineConfig,

    /// Local copy of the mode flag, updated on `ModeChanged`.
    mode_enabled: bool,
    /// Last applied state; the idempotence guard compares against this.
    last_state: Option<FilterState>,
    /// Membership verdict for the most recently evaluated channel.
    /// Invalidated by `ListChanged` so a cross-context edit is never
    /// swallowed.
    membership: Option<(String, bool)>,

    /// Generation of the newest evaluation. A lookup that completes
    /// under an older generation lost the race and is discarded.
    eval_generation: u64,
    eval_handle: Option<JoinHandle<()>>,
    add_handle: Option<JoinHandle<()>>,
}

impl Reconciler {
    pub fn new(
        store: Store,
        page: Arc<dyn PageView>,
        effects: Arc<dyn PageEffects>,
        client: reqwest::Client,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            page,
            effects,
            client,
            config,
            mode_enabled: false,
            last_state: None,
            membership: None,
            eval_generation: 0,
            eval_handle: None,
            add_handle: None,
        }
    }

    /// Spawn the reconciler onto the current runtime. Returns the
    /// intake handle for the embedder's callbacks and the join handle
    /// of the loop task.
    pub fn spawn(self) -> (ReconcilerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = ReconcilerHandle::new(tx);
        let join = tokio::spawn(self.run(rx));
        (handle, join)
    }

    async fn run(mut self, mut signals: mpsc::UnboundedReceiver<PageSignal>) {
        let mut store_events = self.store.subscribe();
        let (eval_tx, mut eval_rx) = mpsc::unbounded_channel::<EvalEvent>();
        let mut placement = DebounceSlot::new(self.config.placement_debounce);
        let mut filter = DebounceSlot::new(self.config.filter_debounce);

        self.mode_enabled = self.store.mode_enabled().await;
        // The one-shot startup evaluation rides the normal debounce, so
        // a page still churning at load collapses into it.
        placement.bump();

        loop {
            tokio::select! {
                biased;

                maybe_signal = signals.recv() => {
                    let Some(signal) = maybe_signal else { break };
                    tracing::trace!(?signal, "Page signal");
                    match signal {
                        PageSignal::NavigationFinished | PageSignal::PageDataUpdated => {
                            placement.bump();
                        }
                        PageSignal::ContentMutation { direct_child: true } => placement.bump(),
                        // Deep subtree churn is intentionally ignored.
                        PageSignal::ContentMutation { direct_child: false } => {}
                        PageSignal::PlayerMutation => {
                            if self.mode_enabled {
                                filter.bump();
                            }
                        }
                        PageSignal::AddControlActivated => self.start_add(),
                        PageSignal::Shutdown => break,
                    }
                }

                event = store_events.recv() => match event {
                    Ok(StoreEvent::ModeChanged(enabled)) => {
                        tracing::debug!(enabled, "Mode flag changed");
                        self.mode_enabled = enabled;
                        filter.bump();
                    }
                    Ok(StoreEvent::ListChanged) => {
                        self.invalidate_membership();
                        filter.bump();
                    }
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Store change feed lagged, resynchronizing");
                        self.mode_enabled = self.store.mode_enabled().await;
                        self.invalidate_membership();
                        filter.bump();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },

                Some(event) = eval_rx.recv() => {
                    let EvalEvent::MembershipResolved { generation, channel, member } = event;
                    self.finish_evaluation(generation, channel, member);
                }

                _ = placement.fired() => {
                    placement.clear();
                    let snapshot = self.page.snapshot();
                    affordance::sync_control(&snapshot, &self.store, self.effects.as_ref()).await;
                    // The placement pass feeds the shorter filtering window.
                    filter.bump();
                }

                _ = filter.fired() => {
                    filter.clear();
                    self.start_evaluation(&eval_tx);
                }
            }
        }

        // Page unload: pending work is aborted by Drop; leave no
        // control behind.
        self.effects.remove_add_control();
        tracing::debug!("Reconciler stopped");
    }

    /// Begin one reconciliation cycle.
    ///
    /// Paths that need no storage read (mode off, ad playing, cached
    /// membership) transition inline. Otherwise the membership lookup
    /// runs as a generation-tagged background task so a newer cycle can
    /// supersede it; the superseded task is also aborted outright.
    fn start_evaluation(&mut self, eval_tx: &mpsc::UnboundedSender<EvalEvent>) {
        if let Some(handle) = self.eval_handle.take() {
            handle.abort();
        }
        self.eval_generation = self.eval_generation.wrapping_add(1);
        let generation = self.eval_generation;

        let snapshot = self.page.snapshot();
        if self.mode_enabled {
            suppress_distractions(snapshot.kind(), self.effects.as_ref());
        }

        // Decisions that need no identity (mode off, ad playing)
        // resolve without touching storage.
        if let Some(target) = evaluate(self.mode_enabled, snapshot.ad_playing, None) {
            self.transition(target);
            return;
        }

        let Some(channel) = resolve_channel_id(&snapshot) else {
            // No identity, no opinion: keep the previous visible state.
            return;
        };

        if let Some((cached_channel, member)) = &self.membership {
            if *cached_channel == channel {
                let member = *member;
                self.transition(member.into());
                return;
            }
        }

        let store = self.store.clone();
        let tx = eval_tx.clone();
        self.eval_handle = Some(tokio::spawn(async move {
            let member = store.is_member(&channel).await;
            let _ = tx.send(EvalEvent::MembershipResolved {
                generation,
                channel,
                member,
            });
        }));
    }

    /// Drop everything decided against the pre-change list: the cached
    /// verdict, and any lookup still in flight (its result would carry
    /// a current generation but a stale read, re-poisoning the cache).
    fn invalidate_membership(&mut self) {
        self.membership = None;
        if let Some(handle) = self.eval_handle.take() {
            handle.abort();
        }
        self.eval_generation = self.eval_generation.wrapping_add(1);
    }

    fn finish_evaluation(&mut self, generation: u64, channel: String, member: bool) {
        if generation != self.eval_generation {
            tracing::debug!(channel = %channel, "Discarding superseded membership verdict");
            return;
        }
        self.membership = Some((channel, member));
        self.transition(member.into());
    }

    /// Apply effects only when the target differs from the memoized
    /// state — the idempotence guard against redundant DOM writes,
    /// observer feedback loops, and visible flicker.
    fn transition(&mut self, target: FilterState) {
        if self.last_state == Some(target) {
            return;
        }
        tracing::debug!(from = ?self.last_state, to = ?target, "Filter state transition");
        apply(target, self.effects.as_ref());
        self.last_state = Some(target);
    }

    /// Add-control activation: resolve display metadata, append to the
    /// list, flash feedback, and retire the control shortly after. The
    /// control is single-use per page view; a later placement pass
    /// re-creates it if still applicable.
    ///
    /// The channel is re-resolved from the current snapshot — safe
    /// because every placement pass removes stale controls first, so a
    /// live control always belongs to the current page.
    fn start_add(&mut self) {
        let snapshot = self.page.snapshot();
        let Some(channel) = resolve_channel_id(&snapshot) else {
            self.effects.remove_add_control();
            return;
        };

        if let Some(handle) = self.add_handle.take() {
            handle.abort();
        }
        let store = self.store.clone();
        let client = self.client.clone();
        let effects = Arc::clone(&self.effects);
        let base_url = self.config.lookup_base_url.clone();
        let ttl = self.config.details_ttl_hours;
        let linger = self.config.feedback_linger;
        self.add_handle = Some(tokio::spawn(async move {
            match lookup::resolve_and_add(&client, &store, &channel, base_url.as_deref(), Some(ttl))
                .await
            {
                Ok(_) => {
                    effects.set_add_control_label(affordance::ADDED_FEEDBACK);
                    tokio::time::sleep(linger).await;
                    effects.remove_add_control();
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Failed to add channel from page control");
                    effects.remove_add_control();
                }
            }
        }));
    }
}

/// Abort in-flight tasks when the reconciler goes away, so no orphaned
/// lookup outlives the page.
impl Drop for Reconciler {
    fn drop(&mut self) {
        if let Some(handle) = self.eval_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.add_handle.take() {
            handle.abort();
        }
    }
}
