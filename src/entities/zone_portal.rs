use std::any::Any;

use crate::entities::entity::Entity;
use crate::entities::gc_object::GcObject;
use crate::net::cursor::ByteCursor;
use crate::world::vector::Vector3;

/// Exit to `target_zone`. The client draws the footprint from the init
/// payload and asks to enter the target zone itself.
#[derive(Debug)]
pub struct ZonePortal {
    object: GcObject,
    pub position: Vector3,
    pub width: u16,
    pub height: u16,
    target_zone: String,
}

impl ZonePortal {
    pub fn new(name: &str, target_zone: &str) -> Self {
        let mut object = GcObject::named("ZonePortal", name);
        object.set_property("target_zone", target_zone);
        Self {
            object,
            position: Vector3::ZERO,
            width: 1,
            height: 1,
            target_zone: target_zone.to_string(),
        }
    }

    pub fn target_zone(&self) -> &str {
        &self.target_zone
    }

    pub fn set_target_zone(&mut self, target_zone: &str) {
        self.target_zone = target_zone.to_string();
        self.object.set_property("target_zone", target_zone);
    }
}

impl Entity for ZonePortal {
    fn object(&self) -> &GcObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut GcObject {
        &mut self.object
    }

    fn write_init(&self, cursor: &mut ByteCursor) {
        cursor.write_u16(self.width);
        cursor.write_u16(self.height);
        cursor.write_cstring(&self.target_zone);
    }

    fn place(&mut self, position: Option<Vector3>, _rotation: Option<f32>) {
        if let Some(position) = position {
            self.position = position;
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
