//! Host-page model.
//!
//! The engine never touches a real DOM. It observes the page through
//! [`PageView`] snapshots and decorates it through [`PageEffects`]; an
//! embedder (extension bridge, webdriver harness, test double) supplies
//! both. Everything above these seams is synchronous and deterministic.

use std::fmt;

/// An immutable observation of the current page, taken at one instant.
///
/// Snapshots are cheap to build and carry only what the engine needs:
/// the URL path, the channel identifier the page advertises in its
/// metadata (if any), the targets of in-page channel links, and whether
/// the player is showing ad UI.
#[derive(Debug, Clone, Default)]
pub struct PageSnapshot {
    /// URL path of the current page, e.g. `/watch?v=...` or `/channel/UC123`.
    pub path: String,
    /// Channel identifier from the page's metadata element, when present.
    /// Authoritative on content pages.
    pub meta_channel_id: Option<String>,
    /// Targets (href values) of in-page hyperlinks, in document order.
    /// Only entries containing a canonical channel path are consulted.
    pub anchor_targets: Vec<String>,
    /// Whether the player is currently showing ad UI.
    pub ad_playing: bool,
}

impl PageSnapshot {
    pub fn kind(&self) -> PageKind {
        PageKind::from_path(&self.path)
    }
}

/// Coarse classification of the current page by URL path shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    /// A single-video content page (`/watch…`).
    Watch,
    /// A channel landing page (`/channel/…`).
    Channel,
    /// A short-form video page (path contains `/shorts/`).
    Shorts,
    Other,
}

impl PageKind {
    pub fn from_path(path: &str) -> Self {
        if path.contains("/shorts/") {
            PageKind::Shorts
        } else if path.starts_with("/watch") {
            PageKind::Watch
        } else if path.starts_with("/channel/") {
            PageKind::Channel
        } else {
            PageKind::Other
        }
    }

    /// Pages on which the add-control may appear.
    pub fn accepts_add_control(self) -> bool {
        matches!(self, PageKind::Watch | PageKind::Channel)
    }
}

impl fmt::Display for PageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PageKind::Watch => "watch",
            PageKind::Channel => "channel",
            PageKind::Shorts => "shorts",
            PageKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Resolves the channel identity of the current page, if it has one.
///
/// Resolution order, first match wins (each step a fallback for the
/// previous):
/// 1. the metadata channel id (authoritative on content pages);
/// 2. a `/channel/<id>` segment in the URL path;
/// 3. the first in-page anchor whose target contains `/channel/<id>`
///    (covers handle-based URLs that expose no direct identifier).
///
/// Returns `None` when nothing matches. `None` means "no opinion" —
/// callers must skip any decision that needs an identity rather than
/// substitute a default.
pub fn resolve_channel_id(snapshot: &PageSnapshot) -> Option<String> {
    if let Some(meta) = &snapshot.meta_channel_id {
        let trimmed = meta.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }

    if let Some(id) = channel_id_in(&snapshot.path) {
        return Some(id);
    }

    snapshot
        .anchor_targets
        .iter()
        .find_map(|target| channel_id_in(target))
}

/// Extracts the identifier from the first `/channel/<id>` segment in
/// `text`, where `<id>` is a non-empty run of `[A-Za-z0-9_-]`.
fn channel_id_in(text: &str) -> Option<String> {
    const MARKER: &str = "/channel/";
    let start = text.find(MARKER)? + MARKER.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    if end == 0 {
        return None;
    }
    Some(rest[..end].to_string())
}

// ============================================================================
// Seams
// ============================================================================

/// Read side of the host-page seam.
pub trait PageView: Send + Sync {
    /// Take a snapshot of the page as it is right now. Must not block
    /// and must not fail; an embedder that cannot read a field reports
    /// the empty/false default.
    fn snapshot(&self) -> PageSnapshot;
}

/// Write side of the host-page seam.
///
/// Every method must be idempotent per call (hiding a hidden element,
/// removing an absent overlay, and re-placing an existing control are
/// all no-ops) and must never fail — a missing target element means
/// there is nothing to do.
pub trait PageEffects: Send + Sync {
    /// Blur the player region and disable pointer interaction with it.
    fn suppress_player(&self);
    /// Clear the blur and pointer lock.
    fn release_player(&self);

    /// Pause playback now and install a guard that re-pauses on every
    /// subsequent play attempt. Installing over an existing guard
    /// replaces it — guards never stack.
    fn lock_playback(&self);
    /// Drop the pause guard and, if a play control exists, press it to
    /// resume. Suppression may have left the player paused, so the
    /// clean path actively resumes.
    fn unlock_playback(&self);

    /// Insert a centered, fixed-position, high-z-order notice with the
    /// given text. Replaces any notice already present.
    fn show_block_notice(&self, message: &str);
    fn clear_block_notice(&self);

    fn hide_page_body(&self);
    fn restore_page_body(&self);

    /// Hide the secondary/related-content panels.
    fn hide_side_panels(&self);
    fn restore_side_panels(&self);

    /// Ensure exactly one add-control exists, offering to add the given
    /// channel. A second call while a control exists replaces it.
    fn place_add_control(&self, channel_id: &str);
    fn remove_add_control(&self);
    /// Swap the label of an existing control (activation feedback).
    /// No-op when no control is present.
    fn set_add_control_label(&self, text: &str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn snapshot(path: &str) -> PageSnapshot {
        PageSnapshot {
            path: path.to_string(),
            ..PageSnapshot::default()
        }
    }

    #[test]
    fn meta_id_wins_over_path_and_anchors() {
        let snap = PageSnapshot {
            path: "/channel/UCpath".to_string(),
            meta_channel_id: Some("UCmeta".to_string()),
            anchor_targets: vec!["https://example.com/channel/UCanchor".to_string()],
            ..PageSnapshot::default()
        };
        assert_eq!(resolve_channel_id(&snap).as_deref(), Some("UCmeta"));
    }

    #[test]
    fn blank_meta_id_falls_through_to_path() {
        let snap = PageSnapshot {
            path: "/channel/UCpath".to_string(),
            meta_channel_id: Some("   ".to_string()),
            ..PageSnapshot::default()
        };
        assert_eq!(resolve_channel_id(&snap).as_deref(), Some("UCpath"));
    }

    #[test]
    fn path_id_stops_at_first_non_id_character() {
        let snap = snapshot("/channel/UC123-ab_c/videos");
        assert_eq!(resolve_channel_id(&snap).as_deref(), Some("UC123-ab_c"));
    }

    #[test]
    fn first_matching_anchor_wins() {
        let snap = PageSnapshot {
            path: "/@somehandle".to_string(),
            anchor_targets: vec![
                "/about".to_string(),
                "https://example.com/channel/UCfirst".to_string(),
                "/channel/UCsecond".to_string(),
            ],
            ..PageSnapshot::default()
        };
        assert_eq!(resolve_channel_id(&snap).as_deref(), Some("UCfirst"));
    }

    #[test]
    fn no_identity_resolves_to_none() {
        let snap = PageSnapshot {
            path: "/feed/subscriptions".to_string(),
            anchor_targets: vec!["/playlist?list=PL1".to_string()],
            ..PageSnapshot::default()
        };
        assert_eq!(resolve_channel_id(&snap), None);
    }

    #[test]
    fn empty_channel_segment_is_not_an_identity() {
        assert_eq!(resolve_channel_id(&snapshot("/channel/")), None);
        assert_eq!(resolve_channel_id(&snapshot("/channel//videos")), None);
    }

    #[test]
    fn page_kinds_from_paths() {
        assert_eq!(PageKind::from_path("/watch?v=abc"), PageKind::Watch);
        assert_eq!(PageKind::from_path("/channel/UC123"), PageKind::Channel);
        assert_eq!(PageKind::from_path("/shorts/xyz"), PageKind::Shorts);
        assert_eq!(PageKind::from_path("/feed/trending"), PageKind::Other);
        // Shorts classification wins even for odd nesting.
        assert_eq!(PageKind::from_path("/foo/shorts/xyz"), PageKind::Shorts);
    }

    #[test]
    fn add_control_pages() {
        assert!(PageKind::Watch.accepts_add_control());
        assert!(PageKind::Channel.accepts_add_control());
        assert!(!PageKind::Shorts.accepts_add_control());
        assert!(!PageKind::Other.accepts_add_control());
    }

    proptest! {
        /// Any identifier made of the canonical charset survives a
        /// round-trip through a channel path.
        #[test]
        fn path_roundtrip(id in "[A-Za-z0-9_-]{1,24}") {
            let snap = snapshot(&format!("/channel/{id}"));
            prop_assert_eq!(resolve_channel_id(&snap), Some(id));
        }

        /// The resolver never panics on arbitrary path input.
        #[test]
        fn resolver_total_on_arbitrary_paths(path in ".{0,64}") {
            let _ = resolve_channel_id(&snapshot(&path));
        }
    }
}
