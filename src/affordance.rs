//! Add-control placement.
//!
//! The control offering "add this channel to the study list" exists
//! independently of the filtering state: it appears on content and
//! channel pages whose resolved channel is not yet a member, whether or
//! not the mode flag is set.

use crate::page::{resolve_channel_id, PageEffects, PageSnapshot};
use crate::store::Store;

/// Feedback flashed on the control after a successful add.
pub const ADDED_FEEDBACK: &str = "Added!";

/// Reconcile the add-control with the current page.
///
/// Any existing control is removed first — a control must not survive a
/// page change or a cross-context edit that just added its channel.
/// It is then re-created iff the page kind admits one, an identity
/// resolves, and that identity is not already a member.
pub async fn sync_control(snapshot: &PageSnapshot, store: &Store, effects: &dyn PageEffects) {
    effects.remove_add_control();

    if !snapshot.kind().accepts_add_control() {
        return;
    }
    let Some(channel) = resolve_channel_id(snapshot) else {
        return;
    };
    if store.is_member(&channel).await {
        return;
    }
    effects.place_add_control(&channel);
}
