//! Mount-point lookup against the host's current document.
//!
//! Each strategy encodes one assumption about how the host nests its detail
//! view. They are tried in order and the first hit wins.

use tracing::debug;

use quicktimer_domain::id::EntityId;

use crate::ports::HostDocument;

const DIALOG_TAG: &str = "ha-more-info-dialog";
const INFO_TAG: &str = "ha-more-info-info";
const CONTENT_TAG: &str = "more-info-content";
const HISTORY_TAGS: [&str; 2] = ["ha-more-info-history", "ha-more-info-logbook"];

/// One structural assumption about the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocateStrategy {
    /// The dialog carries the entity id; the info section inside it is the mount.
    Dialog,
    /// The content element carries the entity's state object.
    Content,
    /// The history or logbook section carries the entity id.
    History,
}

impl LocateStrategy {
    /// Lookup order.
    pub const ALL: [Self; 3] = [Self::Dialog, Self::Content, Self::History];

    fn try_locate<D: HostDocument>(self, doc: &D, root: &D::Node) -> Option<Located<D::Node>> {
        let (mount, entity_id) = match self {
            Self::Dialog => {
                let dialog = find_path(doc, root, &|n| has_tag(doc, n, DIALOG_TAG))?.pop()?;
                let entity_id = ["entityId", "_entityId"]
                    .into_iter()
                    .find_map(|name| entity_property(doc, &dialog, name))?;
                let mount = find_path(doc, &dialog, &|n| has_tag(doc, n, INFO_TAG))?.pop()?;
                (mount, entity_id)
            }
            Self::Content => {
                let path = find_path(doc, root, &|n| {
                    has_tag(doc, n, CONTENT_TAG)
                        && entity_property(doc, n, "stateObj.entity_id").is_some()
                })?;
                let target = path.last()?;
                let entity_id = entity_property(doc, target, "stateObj.entity_id")?;
                (info_ancestor_or_parent(doc, &path)?, entity_id)
            }
            Self::History => {
                let path = find_path(doc, root, &|n| {
                    HISTORY_TAGS.iter().any(|tag| has_tag(doc, n, tag))
                        && entity_property(doc, n, "entityId").is_some()
                })?;
                let target = path.last()?;
                let entity_id = entity_property(doc, target, "entityId")?;
                (info_ancestor_or_parent(doc, &path)?, entity_id)
            }
        };
        Some(Located {
            mount,
            entity_id,
            strategy: self,
        })
    }
}

/// A resolved mount point and the entity it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct Located<N> {
    pub mount: N,
    pub entity_id: EntityId,
    pub strategy: LocateStrategy,
}

/// Run every strategy in order against `doc`.
pub fn locate<D: HostDocument>(doc: &D) -> Option<Located<D::Node>> {
    let Some(root) = doc.root() else {
        debug!("host document has no root yet");
        return None;
    };
    let found = LocateStrategy::ALL
        .into_iter()
        .find_map(|strategy| strategy.try_locate(doc, &root));
    if found.is_none() {
        debug!("no strategy found a detail view");
    }
    found
}

fn has_tag<D: HostDocument>(doc: &D, node: &D::Node, tag: &str) -> bool {
    doc.tag_name(node).as_deref() == Some(tag)
}

/// Pre-order search; the returned path runs from `node` to the match.
fn find_path<D: HostDocument>(
    doc: &D,
    node: &D::Node,
    matches: &dyn Fn(&D::Node) -> bool,
) -> Option<Vec<D::Node>> {
    if matches(node) {
        return Some(vec![node.clone()]);
    }
    doc.children(node).iter().find_map(|child| {
        find_path(doc, child, matches).map(|mut path| {
            path.insert(0, node.clone());
            path
        })
    })
}

/// Dotted property lookup that must end in a valid entity id.
fn entity_property<D: HostDocument>(doc: &D, node: &D::Node, path: &str) -> Option<EntityId> {
    let mut segments = path.split('.');
    let mut value = doc.property(node, segments.next()?)?;
    for segment in segments {
        value = value.get(segment)?.clone();
    }
    EntityId::new(value.as_str()?).ok()
}

/// Nearest `ha-more-info-info` above the match, else its parent.
fn info_ancestor_or_parent<D: HostDocument>(doc: &D, path: &[D::Node]) -> Option<D::Node> {
    let ancestors = path.get(..path.len().checked_sub(1)?)?;
    ancestors
        .iter()
        .rev()
        .find(|node| has_tag(doc, node, INFO_TAG))
        .or_else(|| ancestors.last())
        .cloned()
}
