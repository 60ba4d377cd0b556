//! Object Tree
//!
//! Snapshot of the HAL's object graph, built by walking the owned-objects
//! relation down from the system object. Every reload rebuilds the whole
//! tree; there is no incremental diffing.
//!
//! The walk assumes the ownership relation is acyclic, which the HAL
//! guarantees for its own objects.

use chrono::{DateTime, Utc};
use halscope_hal::class::class_name;
use halscope_hal::properties::ObjectProperty;
use halscope_hal::{AudioObjectId, ClassId, Hal, PropertySet, SYSTEM_OBJECT};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::listing::object_class;

/// One audio object and the objects it owns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioNode {
    pub id: AudioObjectId,
    pub class: ClassId,
    pub class_name: String,
    pub name: String,
    pub children: Vec<AudioNode>,
}

impl AudioNode {
    fn build(hal: &dyn Hal, id: AudioObjectId) -> Self {
        let class = object_class(hal, id);
        let children = owned_objects(hal, id)
            .into_iter()
            .map(|child| AudioNode::build(hal, child))
            .collect();

        Self {
            id,
            class,
            class_name: class_name(class).to_string(),
            name: display_name(hal, id),
            children,
        }
    }

    pub fn find(&self, id: AudioObjectId) -> Option<&AudioNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }

    fn collect<'a>(&'a self, depth: usize, out: &mut Vec<(usize, &'a AudioNode)>) {
        out.push((depth, self));
        for child in &self.children {
            child.collect(depth + 1, out);
        }
    }
}

/// Name of `object`, or a placeholder when it has none
pub fn display_name(hal: &dyn Hal, object: AudioObjectId) -> String {
    match ObjectProperty::Name.on(hal, object).string_value(None) {
        Ok(name) if !name.is_empty() => name,
        Ok(_) => untitled(object),
        Err(e) => {
            trace!("No name for @{}: {}", object, e);
            untitled(object)
        }
    }
}

fn untitled(object: AudioObjectId) -> String {
    format!("<untitled @{}>", object)
}

fn owned_objects(hal: &dyn Hal, object: AudioObjectId) -> Vec<AudioObjectId> {
    let owned = ObjectProperty::OwnedObjects.on(hal, object);
    if !owned.exists() {
        return Vec::new();
    }
    match owned.get_array::<u32>() {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Could not read objects owned by @{}: {}", object, e);
            Vec::new()
        }
    }
}

/// Captured object graph rooted at the system object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectTree {
    root: AudioNode,
    captured_at: DateTime<Utc>,
}

#[allow(clippy::len_without_is_empty)]
impl ObjectTree {
    pub fn load(hal: &dyn Hal) -> Self {
        let tree = Self {
            root: AudioNode::build(hal, SYSTEM_OBJECT),
            captured_at: Utc::now(),
        };
        debug!("Object tree loaded: {} objects", tree.len());
        tree
    }

    /// Rebuild the whole tree from the HAL
    pub fn reload(&mut self, hal: &dyn Hal) {
        *self = Self::load(hal);
    }

    pub fn root(&self) -> &AudioNode {
        &self.root
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn find(&self, id: AudioObjectId) -> Option<&AudioNode> {
        self.root.find(id)
    }

    /// Every node depth-first, paired with its depth below the root
    pub fn flatten(&self) -> Vec<(usize, &AudioNode)> {
        let mut out = Vec::new();
        self.root.collect(0, &mut out);
        out
    }

    /// Number of nodes, root included, so never zero
    pub fn len(&self) -> usize {
        self.flatten().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halscope_hal::class;
    use halscope_hal::sim::SimulatedHal;
    use halscope_hal::{fourcc, PropertyAddress};

    #[test]
    fn test_tree_follows_ownership() {
        let hal = SimulatedHal::demo();
        let tree = ObjectTree::load(&hal);

        let root = tree.root();
        assert_eq!(root.id, SYSTEM_OBJECT);
        assert_eq!(root.class, class::SYSTEM);
        assert_eq!(root.children.iter().map(|c| c.id).collect::<Vec<_>>(), vec![2]);

        let device = tree.find(40).unwrap();
        assert_eq!(device.name, "Built-in Output");
        assert_eq!(device.class_name, "Device");
        let children: Vec<AudioObjectId> = device.children.iter().map(|c| c.id).collect();
        assert_eq!(children, vec![41, 50, 51, 52, 53, 54]);
    }

    #[test]
    fn test_flatten_is_depth_first() {
        let hal = SimulatedHal::demo();
        let tree = ObjectTree::load(&hal);
        let flat: Vec<(usize, AudioObjectId)> =
            tree.flatten().iter().map(|(d, n)| (*d, n.id)).collect();

        assert_eq!(flat[0], (0, SYSTEM_OBJECT));
        assert_eq!(flat[1], (1, 2));
        assert_eq!(flat[2], (2, 40));
        assert_eq!(flat[3], (3, 41));
        assert_eq!(tree.len(), hal.object_count());
    }

    #[test]
    fn test_bare_system_still_has_root() {
        let hal = SimulatedHal::new();
        let tree = ObjectTree::load(&hal);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.root().id, SYSTEM_OBJECT);
        assert!(tree.root().children.is_empty());
        assert_eq!(tree.root().name, "<untitled @1>");
    }

    #[test]
    fn test_missing_name_uses_placeholder() {
        let hal = SimulatedHal::demo();
        hal.remove_property(54, PropertyAddress::any(fourcc(b"lnam")));
        hal.set_string(53, PropertyAddress::any(fourcc(b"lnam")), "");

        let tree = ObjectTree::load(&hal);
        assert_eq!(tree.find(54).unwrap().name, "<untitled @54>");
        assert_eq!(tree.find(53).unwrap().name, "<untitled @53>");
    }

    #[test]
    fn test_missing_class_falls_back_to_object() {
        let hal = SimulatedHal::demo();
        hal.remove_property(41, PropertyAddress::any(fourcc(b"clas")));

        let tree = ObjectTree::load(&hal);
        let stream = tree.find(41).unwrap();
        assert_eq!(stream.class, class::OBJECT);
        assert_eq!(stream.class_name, "Object");
    }

    #[test]
    fn test_reload_picks_up_new_objects() {
        let hal = SimulatedHal::demo();
        let mut tree = ObjectTree::load(&hal);
        assert!(tree.find(60).is_none());
        let before = tree.captured_at();

        hal.add_object(60, class::STREAM, 40, "Mic Stream");
        tree.reload(&hal);
        assert_eq!(tree.find(60).unwrap().name, "Mic Stream");
        assert!(tree.captured_at() >= before);
    }

    #[test]
    fn test_tree_serializes() {
        let hal = SimulatedHal::demo();
        let tree = ObjectTree::load(&hal);
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"Built-in Output\""));
        assert!(json.contains("captured_at"));
    }
}
