//! Host page layouts for the in-memory document.
//!
//! The simulated host rebuilds its whole document whenever the detail view
//! opens or closes, the way a real dashboard re-renders its dialog. Each
//! layout nests the entity id differently so every lookup strategy gets
//! exercised.

use serde_json::json;

use quicktimer_app::document::{InMemoryDocument, NodeId};
use quicktimer_domain::entity::Entity;

const ROOT_TAG: &str = "home-assistant";
const MAIN_TAG: &str = "home-assistant-main";

/// Where the detail view puts the entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoreInfoLayout {
    /// On the dialog itself.
    #[default]
    Dialog,
    /// On the content element's state object.
    Content,
    /// On the history section only.
    History,
}

impl MoreInfoLayout {
    /// Rebuild `document` with the detail view open on `entity`.
    ///
    /// Returns the info section the panel is expected to mount on.
    pub fn open(self, document: &InMemoryDocument, entity: &Entity) -> NodeId {
        let root = document.set_root(ROOT_TAG);
        document.append_child(root, MAIN_TAG);
        let dialog = document.append_child(root, "ha-more-info-dialog");
        let frame = document.append_child(dialog, "ha-dialog");
        let info = document.append_child(frame, "ha-more-info-info");
        let content = document.append_child(info, "more-info-content");
        let history = document.append_child(info, "ha-more-info-history");

        let entity_id = json!(entity.entity_id.as_str());
        match self {
            Self::Dialog => document.set_property(dialog, "entityId", entity_id),
            Self::Content => document.set_property(
                content,
                "stateObj",
                json!({"entity_id": entity_id, "state": entity.state.as_str()}),
            ),
            Self::History => document.set_property(history, "entityId", entity_id),
        }
        info
    }
}

/// Rebuild `document` with no detail view.
pub fn close_more_info(document: &InMemoryDocument) {
    let root = document.set_root(ROOT_TAG);
    document.append_child(root, MAIN_TAG);
}
