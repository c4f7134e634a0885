use std::any::Any;

use crate::entities::entity::Entity;
use crate::entities::gc_object::GcObject;
use crate::scripting::ScriptFault;
use crate::world::vector::Vector3;
use crate::world::zone::TickContext;

/// Named non-player unit. When a script is attached it runs once per tick
/// through the zone's script host.
#[derive(Debug)]
pub struct Npc {
    object: GcObject,
    level: u32,
    pub position: Vector3,
    script: Option<String>,
}

impl Npc {
    pub fn new(name: &str, level: u32) -> Self {
        let mut object = GcObject::named("NPC", name);
        object.set_property("level", level);
        Self {
            object,
            level,
            position: Vector3::ZERO,
            script: None,
        }
    }

    pub fn with_script(mut self, script: &str) -> Self {
        self.script = Some(script.to_string());
        self
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level;
        self.object.set_property("level", level);
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }
}

impl Entity for Npc {
    fn object(&self) -> &GcObject {
        &self.object
    }

    fn object_mut(&mut self) -> &mut GcObject {
        &mut self.object
    }

    fn tick(&mut self, ctx: &mut TickContext<'_>) -> Result<(), ScriptFault> {
        match self.script.as_deref() {
            Some(script) => ctx.run_script(self.object.identity.id, script),
            None => Ok(()),
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::property::PropertyValue;

    #[test]
    fn level_is_a_u32_property() {
        let mut npc = Npc::new("Elder", 5);
        npc.set_level(6);
        assert_eq!(npc.level(), 6);
        assert_eq!(npc.object().property("level"), Some(&PropertyValue::U32(6)));
        assert_eq!(npc.object().gc_type, "npc");
    }

    #[test]
    fn script_is_optional() {
        assert_eq!(Npc::new("Elder", 1).script(), None);
        assert_eq!(Npc::new("Elder", 1).with_script("elder").script(), Some("elder"));
    }
}
