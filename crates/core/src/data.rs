use std::sync::Arc;

use crate::graph::PinType;
use crate::mesh::Mesh;
use crate::volume::Volume;

/// Value carried by a slot. `Empty` is the explicit "no output" state a node
/// holds before its first refresh, after a failed refresh, or while disabled.
#[derive(Debug, Clone, Default)]
pub enum SlotData {
    #[default]
    Empty,
    Volume(Arc<Volume>),
    Mesh(Arc<Mesh>),
}

impl SlotData {
    pub fn is_empty(&self) -> bool {
        matches!(self, SlotData::Empty)
    }

    pub fn pin_type(&self) -> Option<PinType> {
        match self {
            SlotData::Empty => None,
            SlotData::Volume(_) => Some(PinType::Volume),
            SlotData::Mesh(_) => Some(PinType::Mesh),
        }
    }

    pub fn as_volume(&self) -> Option<&Arc<Volume>> {
        match self {
            SlotData::Volume(volume) => Some(volume),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            SlotData::Mesh(mesh) => Some(mesh),
            _ => None,
        }
    }
}

impl From<Volume> for SlotData {
    fn from(volume: Volume) -> Self {
        SlotData::Volume(Arc::new(volume))
    }
}

impl From<Mesh> for SlotData {
    fn from(mesh: Mesh) -> Self {
        SlotData::Mesh(Arc::new(mesh))
    }
}

impl PartialEq for SlotData {
    /// Slots compare by identity of the shared payload, not by content.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (SlotData::Empty, SlotData::Empty) => true,
            (SlotData::Volume(a), SlotData::Volume(b)) => Arc::ptr_eq(a, b),
            (SlotData::Mesh(a), SlotData::Mesh(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}
