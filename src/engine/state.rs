//! The filtering state machine.
//!
//! The decision is a pure projection of `(mode flag, ad playing,
//! membership)`; effect application is a thin layer behind it, gated by
//! the caller's memoized previous state. Keeping the projection pure is
//! what makes the machine testable without a page.

use crate::page::{PageEffects, PageKind};

/// Visual treatment currently applied to the page.
///
/// Derived, never persisted — recomputed on every debounced evaluation
/// cycle for the life of the page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Filtering is off; the page is untouched.
    Disabled,
    /// An ad is playing; the page is untouched so host ad mechanics are
    /// never interfered with.
    AdActive,
    /// The current channel is on the study list.
    Allowed,
    /// The current channel is not on the study list.
    Blocked,
}

impl From<bool> for FilterState {
    /// Membership verdict to state, for the resolved-identity arm of
    /// the transition function.
    fn from(member: bool) -> Self {
        if member {
            FilterState::Allowed
        } else {
            FilterState::Blocked
        }
    }
}

/// Text of the blocked-channel notice.
pub const BLOCK_NOTICE: &str =
    "This channel is not in your study list. Add it to the list, or turn off study mode, to watch.";

/// The transition function, evaluated once per debounced cycle.
///
/// `membership` is `None` when no channel identity resolved; the
/// machine then has no opinion and returns `None`, meaning the caller
/// keeps the previous visible state.
pub fn evaluate(mode_enabled: bool, ad_playing: bool, membership: Option<bool>) -> Option<FilterState> {
    if !mode_enabled {
        return Some(FilterState::Disabled);
    }
    if ad_playing {
        return Some(FilterState::AdActive);
    }
    membership.map(|member| {
        if member {
            FilterState::Allowed
        } else {
            FilterState::Blocked
        }
    })
}

/// Apply the visual effects for a target state.
///
/// Callers gate on the memoized previous state; each individual
/// application is idempotent regardless.
pub(crate) fn apply(target: FilterState, effects: &dyn PageEffects) {
    match target {
        // Ad-active clears exactly like the clean states: ads are never
        // blurred or paused.
        FilterState::Disabled | FilterState::Allowed | FilterState::AdActive => {
            effects.clear_block_notice();
            effects.release_player();
            // Suppression may have left the player paused; the clean
            // path actively resumes.
            effects.unlock_playback();
            effects.restore_side_panels();
            effects.restore_page_body();
        }
        FilterState::Blocked => {
            effects.suppress_player();
            effects.lock_playback();
            effects.show_block_notice(BLOCK_NOTICE);
        }
    }
}

/// Hide distraction surfaces: the whole body on short-form paths, the
/// secondary/related panels elsewhere.
///
/// Runs on every cycle while the mode flag is set and is deliberately
/// not memoized — re-hiding a hidden element is a no-op.
pub(crate) fn suppress_distractions(kind: PageKind, effects: &dyn PageEffects) {
    if kind == PageKind::Shorts {
        effects.hide_page_body();
    } else {
        effects.hide_side_panels();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;

    /// Records effect invocations by name, in order.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
        fn push(&self, name: &str) {
            self.calls.lock().unwrap().push(name.to_string());
        }
    }

    impl PageEffects for Recorder {
        fn suppress_player(&self) {
            self.push("suppress_player");
        }
        fn release_player(&self) {
            self.push("release_player");
        }
        fn lock_playback(&self) {
            self.push("lock_playback");
        }
        fn unlock_playback(&self) {
            self.push("unlock_playback");
        }
        fn show_block_notice(&self, message: &str) {
            self.push(&format!("show_block_notice:{message}"));
        }
        fn clear_block_notice(&self) {
            self.push("clear_block_notice");
        }
        fn hide_page_body(&self) {
            self.push("hide_page_body");
        }
        fn restore_page_body(&self) {
            self.push("restore_page_body");
        }
        fn hide_side_panels(&self) {
            self.push("hide_side_panels");
        }
        fn restore_side_panels(&self) {
            self.push("restore_side_panels");
        }
        fn place_add_control(&self, channel_id: &str) {
            self.push(&format!("place_add_control:{channel_id}"));
        }
        fn remove_add_control(&self) {
            self.push("remove_add_control");
        }
        fn set_add_control_label(&self, text: &str) {
            self.push(&format!("set_add_control_label:{text}"));
        }
    }

    #[test]
    fn disabled_wins_over_everything() {
        assert_eq!(evaluate(false, false, None), Some(FilterState::Disabled));
        assert_eq!(evaluate(false, true, Some(false)), Some(FilterState::Disabled));
        assert_eq!(evaluate(false, false, Some(true)), Some(FilterState::Disabled));
    }

    #[test]
    fn ad_wins_over_membership() {
        assert_eq!(evaluate(true, true, Some(false)), Some(FilterState::AdActive));
        assert_eq!(evaluate(true, true, Some(true)), Some(FilterState::AdActive));
        assert_eq!(evaluate(true, true, None), Some(FilterState::AdActive));
    }

    #[test]
    fn unresolved_identity_has_no_opinion() {
        assert_eq!(evaluate(true, false, None), None);
    }

    #[test]
    fn membership_decides_the_rest() {
        assert_eq!(evaluate(true, false, Some(true)), Some(FilterState::Allowed));
        assert_eq!(evaluate(true, false, Some(false)), Some(FilterState::Blocked));
    }

    #[test]
    fn blocked_applies_suppression_and_notice() {
        let fx = Recorder::default();
        apply(FilterState::Blocked, &fx);
        let calls = fx.calls();
        assert!(calls.contains(&"suppress_player".to_string()));
        assert!(calls.contains(&"lock_playback".to_string()));
        assert!(calls.contains(&format!("show_block_notice:{BLOCK_NOTICE}")));
        // The blocked path never touches the panels or body.
        assert!(!calls.iter().any(|c| c.contains("panels") || c.contains("body")));
    }

    #[test]
    fn clean_states_clear_everything_and_resume() {
        for state in [FilterState::Disabled, FilterState::Allowed, FilterState::AdActive] {
            let fx = Recorder::default();
            apply(state, &fx);
            let calls = fx.calls();
            assert!(calls.contains(&"clear_block_notice".to_string()), "{state:?}");
            assert!(calls.contains(&"release_player".to_string()), "{state:?}");
            assert!(calls.contains(&"unlock_playback".to_string()), "{state:?}");
            assert!(calls.contains(&"restore_side_panels".to_string()), "{state:?}");
            assert!(calls.contains(&"restore_page_body".to_string()), "{state:?}");
            assert!(!calls.contains(&"suppress_player".to_string()), "{state:?}");
        }
    }

    #[test]
    fn distraction_pass_hides_body_only_on_shorts() {
        let fx = Recorder::default();
        suppress_distractions(PageKind::Shorts, &fx);
        assert_eq!(fx.calls(), vec!["hide_page_body"]);

        let fx = Recorder::default();
        suppress_distractions(PageKind::Watch, &fx);
        assert_eq!(fx.calls(), vec!["hide_side_panels"]);

        let fx = Recorder::default();
        suppress_distractions(PageKind::Other, &fx);
        assert_eq!(fx.calls(), vec!["hide_side_panels"]);
    }

    proptest! {
        /// Blocked is reachable only through the exact conjunction:
        /// mode on, no ad, identity resolved, identity absent from the
        /// list. Allowed is its complement with a resolved identity.
        #[test]
        fn blocked_and_allowed_require_their_exact_inputs(
            mode in any::<bool>(),
            ad in any::<bool>(),
            membership in proptest::option::of(any::<bool>()),
        ) {
            let target = evaluate(mode, ad, membership);
            prop_assert_eq!(
                target == Some(FilterState::Blocked),
                mode && !ad && membership == Some(false)
            );
            prop_assert_eq!(
                target == Some(FilterState::Allowed),
                mode && !ad && membership == Some(true)
            );
            // The machine is silent exactly when it lacks an identity.
            prop_assert_eq!(target.is_none(), mode && !ad && membership.is_none());
        }
    }
}
