//! Child boxes of a container, keyed by type code.

use std::sync::Arc;

use super::{FourCc, Mp4Box};

/// One entry of a [`Children`] map.
///
/// The first child of a given type is stored as `Single`; a second child of
/// the same type promotes the slot to `Many`, keeping parse order.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize), serde(untagged))]
pub enum Slot {
    Single(Arc<Mp4Box>),
    Many(Vec<Arc<Mp4Box>>),
}

impl Slot {
    pub fn as_slice(&self) -> &[Arc<Mp4Box>] {
        match self {
            Slot::Single(b) => std::slice::from_ref(b),
            Slot::Many(v) => v,
        }
    }

    pub fn is_many(&self) -> bool {
        matches!(self, Slot::Many(_))
    }
}

/// Ordered multiset of child boxes keyed by type code.
///
/// Slots appear in the order their type was first seen.
#[derive(Debug, Clone, Default)]
pub struct Children {
    slots: Vec<(FourCc, Slot)>,
}

impl Children {
    /// Attach a child, appending to an existing slot of the same type.
    pub(crate) fn insert(&mut self, child: Arc<Mp4Box>) {
        let box_type = child.box_type;
        let Some((_, slot)) = self.slots.iter_mut().find(|(t, _)| *t == box_type) else {
            self.slots.push((box_type, Slot::Single(child)));
            return;
        };

        *slot = match std::mem::replace(slot, Slot::Many(Vec::new())) {
            Slot::Single(first) => Slot::Many(vec![first, child]),
            Slot::Many(mut boxes) => {
                boxes.push(child);
                Slot::Many(boxes)
            }
        };
    }

    /// The slot holding every child of `box_type`.
    pub fn slot(&self, box_type: FourCc) -> Option<&Slot> {
        self.slots
            .iter()
            .find(|(t, _)| *t == box_type)
            .map(|(_, slot)| slot)
    }

    /// First child of `box_type`.
    pub fn get(&self, box_type: FourCc) -> Option<&Arc<Mp4Box>> {
        self.get_all(box_type).first()
    }

    /// All children of `box_type` in parse order.
    pub fn get_all(&self, box_type: FourCc) -> &[Arc<Mp4Box>] {
        self.slot(box_type).map(Slot::as_slice).unwrap_or(&[])
    }

    /// Iterate over slots in first-seen order.
    pub fn slots(&self) -> impl Iterator<Item = (FourCc, &Slot)> {
        self.slots.iter().map(|(t, slot)| (*t, slot))
    }

    /// Iterate over every child box.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Mp4Box>> {
        self.slots.iter().flat_map(|(_, slot)| slot.as_slice())
    }

    /// Number of distinct type codes.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(feature = "serialize")]
impl serde::Serialize for Children {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (box_type, slot) in &self.slots {
            map.serialize_entry(box_type.as_str(), slot)?;
        }
        map.end()
    }
}
