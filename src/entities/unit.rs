use std::any::Any;

use crate::entities::entity::{share, Entity, SharedEntity};
use crate::entities::gc_object::GcObject;
use crate::entities::update::{entity_update_fragment, UPDATE_POSITION};
use crate::net::cursor::ByteCursor;
use crate::scripting::ScriptFault;
use crate::world::vector::Vector3;
use crate::world::zone::TickContext;

pub const UNIT_BEHAVIOR_TYPE: &str = "UnitBehavior";
pub const DEFAULT_MOVE_SPEED: f32 = 4.0;

/// A world unit. `hp` and `level` mirror into the property list so the
/// full object always carries the current values.
#[derive(Debug)]
pub struct Unit {
    object: GcObject,
    hp: u32,
    level: u8,
    pub position: Vector3,
    pub rotation: f32,
}

impl Unit {
    pub fn new(native_type: &str, name: &str) -> Self {
        let mut unit = Self {
            object: GcObject::named(native_type, name),
            hp: 0,
            level: 1,
            position: Vector3::ZERO,
            rotation: 0.0,
        };
        unit.object.set_property("hp", unit.hp);
        unit.object.set_property("level", unit.level);
        unit
    }

    /// Unit with a movement behaviour child.
    pub fn with_behavior(native_type: &str, name: &str) -> Self {
        let mut unit = Self::new(native_type, name);
        unit.object.add_child(share(UnitBehavior::new()));
        unit
    }

    pub fn hp(&self) -> u32 {
        self.hp
    }

    pub fn set_hp(&mut self, hp: u32) {
        self.hp = hp;
        self.object.set_property("hp", hp);
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    pub fn set_level(&mut self, level: u8) {
        self.level = level;
        self.object.set_property("level", level);
    }

    pub fn behavior(&self) -> Option<SharedEntity> {
        self.object.child_by_native_type(UNIT_BEHAVIOR_TYPE)
    }
}

impl Entity for Unit {
    fn object(&self) -> &GcObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut GcObject {
        &mut self.object
    }

    fn place(&mut self, position: Option<Vector3>, rotation: Option<f32>) {
        if let Some(position) = position {
            self.position = position;
        }
        if let Some(rotation) = rotation {
            self.rotation = rotation;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Movement state of a unit. Steps toward its move target every tick and
/// broadcasts the new position on the client-entity channel.
#[derive(Debug)]
pub struct UnitBehavior {
    object: GcObject,
    pub position: Vector3,
    pub rotation: f32,
    pub speed: f32,
    target: Option<Vector3>,
    dirty: bool,
}

impl UnitBehavior {
    pub fn new() -> Self {
        Self {
            object: GcObject::new(UNIT_BEHAVIOR_TYPE),
            position: Vector3::ZERO,
            rotation: 0.0,
            speed: DEFAULT_MOVE_SPEED,
            target: None,
            dirty: false,
        }
    }

    pub fn target(&self) -> Option<Vector3> {
        self.target
    }

    pub fn move_to(&mut self, target: Vector3) {
        self.target = Some(target);
    }

    /// Jumps straight to `position`; the next tick reports it.
    pub fn warp(&mut self, position: Vector3) {
        self.position = position;
        self.target = None;
        self.dirty = true;
    }

    fn write_position(&self, cursor: &mut ByteCursor) {
        for coordinate in self.position.to_fixed() {
            cursor.write_u32(coordinate);
        }
    }
}

impl Default for UnitBehavior {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for UnitBehavior {
    fn object(&self) -> &GcObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut GcObject {
        &mut self.object
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ScriptFault> {
        if let Some(target) = self.target {
            self.position = self.position.step_toward(target, self.speed);
            if self.position == target {
                self.target = None;
            }
            self.dirty = true;
        }
        if self.dirty {
            self.dirty = false;
            ctx.broadcast(entity_update_fragment(&*self, UPDATE_POSITION));
        }
        Ok(())
    }

    fn write_init(&self, cursor: &mut ByteCursor) {
        self.write_position(cursor);
    }

    fn write_update(&self, cursor: &mut ByteCursor) {
        self.write_position(cursor);
    }

    fn place(&mut self, position: Option<Vector3>, rotation: Option<f32>) {
        if let Some(position) = position {
            self.position = position;
        }
        if let Some(rotation) = rotation {
            self.rotation = rotation;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::entity::downcast_ref;
    use crate::entities::property::PropertyValue;
    use crate::net::cursor::Endian;

    #[test]
    fn setters_mirror_properties() {
        let mut unit = Unit::new("Unit", "Goblin");
        unit.set_hp(100);
        unit.set_level(3);
        assert_eq!(unit.object().property("hp"), Some(&PropertyValue::U32(100)));
        assert_eq!(unit.object().property("level"), Some(&PropertyValue::U8(3)));
        assert_eq!(unit.object().properties().len(), 2);
    }

    #[test]
    fn with_behavior_adds_child() {
        let unit = Unit::with_behavior("Unit", "Goblin");
        let behavior = unit.behavior().unwrap();
        let guard = behavior.read();
        assert!(downcast_ref::<UnitBehavior>(&*guard).is_some());
    }

    #[test]
    fn update_payload_is_fixed_point_le() {
        let mut behavior = UnitBehavior::new();
        behavior.warp(Vector3::new(1.0, 2.0, 0.0));
        let mut cursor = ByteCursor::with_capacity(Endian::Little, 12);
        behavior.write_update(&mut cursor);
        assert_eq!(
            cursor.data(),
            &[0x00, 0x01, 0, 0, 0x00, 0x02, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn warp_clears_target() {
        let mut behavior = UnitBehavior::new();
        behavior.move_to(Vector3::new(10.0, 0.0, 0.0));
        behavior.warp(Vector3::new(1.0, 1.0, 0.0));
        assert_eq!(behavior.target(), None);
    }
}
