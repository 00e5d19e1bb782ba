//! Colour picking: a registry mapping 24-bit picking colours to pickable
//! objects, with events delivered through channels.

use crossbeam_channel::Sender;
use glam::{DVec2, DVec3};
use rustc_hash::FxHashMap;

use crate::{Arena, Handle};

/// Largest id representable as a picking colour.
pub const MAX_PICK_ID: u32 = 0x00FF_FFFF;

pub type PickableHandle = Handle<Pickable>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PickableKind {
    /// The planet surface.
    Terrain,
    /// An application object identified by the caller.
    Entity(u64),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PickEventKind {
    Click,
    DoubleClick,
    MouseMove,
    MouseEnter,
    MouseLeave,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PickEvent {
    pub id: u32,
    pub kind: PickableKind,
    pub event: PickEventKind,
    pub pixel: DVec2,
    /// World position under the pixel, when known.
    pub position: Option<DVec3>,
}

#[derive(Debug)]
pub struct Pickable {
    pub id: u32,
    pub kind: PickableKind,
    sink: Option<Sender<PickEvent>>,
}

pub fn id_to_color(id: u32) -> [u8; 3] {
    [(id >> 16) as u8, (id >> 8) as u8, id as u8]
}

pub fn color_to_id(color: [u8; 3]) -> u32 {
    (color[0] as u32) << 16 | (color[1] as u32) << 8 | color[2] as u32
}

/// Id 0 (black) is the background and never assigned.
#[derive(Debug)]
pub struct PickingRegistry {
    pickables: Arena<Pickable>,
    by_id: FxHashMap<u32, PickableHandle>,
    next_id: u32,
}

impl Default for PickingRegistry {
    fn default() -> Self {
        Self {
            pickables: Arena::new(),
            by_id: FxHashMap::default(),
            next_id: 1,
        }
    }
}

impl PickingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pickable; `None` once all colours are taken.
    pub fn register(
        &mut self,
        kind: PickableKind,
        sink: Option<Sender<PickEvent>>,
    ) -> Option<PickableHandle> {
        if self.by_id.len() >= MAX_PICK_ID as usize {
            return None;
        }
        while self.by_id.contains_key(&self.next_id) {
            self.advance();
        }
        let id = self.next_id;
        self.advance();
        let handle = self.pickables.insert(Pickable { id, kind, sink });
        self.by_id.insert(id, handle);
        Some(handle)
    }

    fn advance(&mut self) {
        self.next_id = if self.next_id >= MAX_PICK_ID {
            1
        } else {
            self.next_id + 1
        };
    }

    pub fn unregister(&mut self, handle: PickableHandle) -> Option<Pickable> {
        let pickable = self.pickables.remove(handle)?;
        self.by_id.remove(&pickable.id);
        Some(pickable)
    }

    pub fn get(&self, handle: PickableHandle) -> Option<&Pickable> {
        self.pickables.get(handle)
    }

    pub fn color_of(&self, handle: PickableHandle) -> Option<[u8; 3]> {
        self.pickables.get(handle).map(|p| id_to_color(p.id))
    }

    pub fn handle_for_color(&self, color: [u8; 3]) -> Option<PickableHandle> {
        self.by_id.get(&color_to_id(color)).copied()
    }

    pub fn resolve_color(&self, color: [u8; 3]) -> Option<&Pickable> {
        let handle = self.by_id.get(&color_to_id(color))?;
        self.pickables.get(*handle)
    }

    pub fn find_kind(&self, kind: PickableKind) -> Option<PickableHandle> {
        self.pickables
            .iter()
            .find(|(_, p)| p.kind == kind)
            .map(|(h, _)| h)
    }

    /// Deliver an event to a pickable. Returns whether it was delivered.
    ///
    /// A sink whose receiver is gone is dropped.
    pub fn dispatch(
        &mut self,
        handle: PickableHandle,
        event: PickEventKind,
        pixel: DVec2,
        position: Option<DVec3>,
    ) -> bool {
        let Some(pickable) = self.pickables.get_mut(handle) else {
            return false;
        };
        let Some(sink) = &pickable.sink else {
            return false;
        };
        let message = PickEvent {
            id: pickable.id,
            kind: pickable.kind,
            event,
            pixel,
            position,
        };
        if sink.send(message).is_err() {
            tracing::debug!(id = pickable.id, "pick receiver disconnected");
            pickable.sink = None;
            return false;
        }
        true
    }

    /// Keep only the pickables for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&Pickable) -> bool) {
        let doomed: Vec<PickableHandle> = self
            .pickables
            .iter()
            .filter(|(_, p)| !keep(p))
            .map(|(h, _)| h)
            .collect();
        for handle in doomed {
            self.unregister(handle);
        }
    }

    pub fn len(&self) -> usize {
        self.pickables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pickables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_roundtrip_and_background() {
        assert_eq!(color_to_id(id_to_color(0x12_34_56)), 0x12_34_56);
        let mut registry = PickingRegistry::new();
        let h = registry.register(PickableKind::Entity(7), None).unwrap();
        assert_eq!(registry.color_of(h), Some([0, 0, 1]));
        assert!(registry.resolve_color([0, 0, 0]).is_none());
        assert_eq!(registry.resolve_color([0, 0, 1]).unwrap().kind, PickableKind::Entity(7));
    }

    #[test]
    fn test_ids_are_not_reused_while_live() {
        let mut registry = PickingRegistry::new();
        let a = registry.register(PickableKind::Entity(1), None).unwrap();
        let b = registry.register(PickableKind::Entity(2), None).unwrap();
        registry.unregister(a);
        let c = registry.register(PickableKind::Entity(3), None).unwrap();
        assert_ne!(registry.get(b).unwrap().id, registry.get(c).unwrap().id);
        assert!(registry.get(a).is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_dispatch_delivers_through_sink() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut registry = PickingRegistry::new();
        let h = registry.register(PickableKind::Terrain, Some(tx)).unwrap();
        assert!(registry.dispatch(h, PickEventKind::Click, DVec2::new(3.0, 4.0), None));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind, PickableKind::Terrain);
        assert_eq!(event.event, PickEventKind::Click);

        drop(rx);
        assert!(!registry.dispatch(h, PickEventKind::Click, DVec2::ZERO, None));
        assert!(registry.get(h).unwrap().sink.is_none());
    }

    #[test]
    fn test_retain() {
        let mut registry = PickingRegistry::new();
        for i in 0..5 {
            registry.register(PickableKind::Entity(i), None);
        }
        registry.retain(|p| matches!(p.kind, PickableKind::Entity(i) if i % 2 == 0));
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.find_kind(PickableKind::Entity(1)), None);
    }
}
