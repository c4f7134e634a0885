use std::any::Any;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entities::gc_object::GcObject;
use crate::entities::identity::EntityId;
use crate::net::cursor::ByteCursor;
use crate::scripting::ScriptFault;
use crate::world::vector::Vector3;
use crate::world::zone::TickContext;

/// Capability set shared by every networked object.
///
/// Implementors embed a [`GcObject`] and delegate the tree and identity
/// plumbing to it. `tick` runs with the entity's own write lock held, so it
/// must reach the rest of the zone through the [`TickContext`] only.
pub trait Entity: std::fmt::Debug + Send + Sync + 'static {
    fn object(&self) -> &GcObject;
    fn object_mut(&mut self) -> &mut GcObject;

    fn tick(&mut self, _ctx: &mut TickContext<'_>) -> Result<(), ScriptFault> {
        Ok(())
    }

    /// Positions a world-placed entity. Nodes without a location ignore it.
    fn place(&mut self, _position: Option<Vector3>, _rotation: Option<f32>) {}

    fn write_full_object(&self, cursor: &mut ByteCursor) {
        self.write_full_object_at(cursor, 0);
    }

    #[doc(hidden)]
    fn write_full_object_at(&self, cursor: &mut ByteCursor, depth: usize) {
        self.object().write_full_object_at(cursor, depth);
    }

    /// Extra state sent right after the full object on spawn.
    fn write_init(&self, _cursor: &mut ByteCursor) {}

    /// Kind-specific update payload. Must be decodable on its own.
    fn write_update(&self, _cursor: &mut ByteCursor) {}

    fn write_synch(&self, cursor: &mut ByteCursor) {
        cursor.write_u8(0x00);
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn id(&self) -> EntityId {
        self.object().identity.id
    }
}

pub type SharedEntity = Arc<RwLock<dyn Entity>>;

pub fn share<E: Entity>(entity: E) -> SharedEntity {
    Arc::new(RwLock::new(entity))
}

/// Depth-first, parent before children. Each node is read-locked only
/// while `visit` runs on it.
pub fn walk(entity: &SharedEntity, visit: &mut dyn FnMut(&SharedEntity, &dyn Entity)) {
    let children = {
        let guard = entity.read();
        visit(entity, &*guard);
        guard.object().children().to_vec()
    };
    for child in &children {
        walk(child, visit);
    }
}

/// Every node of the subtree, root first.
pub fn subtree(entity: &SharedEntity) -> Vec<SharedEntity> {
    let mut nodes = Vec::new();
    walk(entity, &mut |node, _| nodes.push(Arc::clone(node)));
    nodes
}

pub fn downcast_ref<E: Entity>(entity: &dyn Entity) -> Option<&E> {
    entity.as_any().downcast_ref::<E>()
}

pub fn downcast_mut<E: Entity>(entity: &mut dyn Entity) -> Option<&mut E> {
    entity.as_any_mut().downcast_mut::<E>()
}

/// A node with no behaviour of its own: containers, metrics, manipulators.
#[derive(Debug)]
pub struct GenericObject {
    object: GcObject,
}

impl GenericObject {
    pub fn new(object: GcObject) -> Self {
        Self { object }
    }

    pub fn of_type(native_type: &str) -> Self {
        Self::new(GcObject::new(native_type))
    }
}

impl Entity for GenericObject {
    fn object(&self) -> &GcObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut GcObject {
        &mut self.object
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
