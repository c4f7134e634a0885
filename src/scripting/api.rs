use std::sync::Arc;

use crate::entities::entity::{share, Entity, SharedEntity};
use crate::entities::identity::{ConnectionId, EntityId, OwnerId};
use crate::entities::unit::Unit;
use crate::scripting::value::{ScriptValue, ValueHint};
use crate::scripting::ScriptFault;
use crate::world::player::Player;
use crate::world::vector::Vector3;
use crate::world::zone::{TickContext, Zone};

enum Backend<'a, 'z> {
    /// No zone or entity lock is held; calls apply immediately.
    Direct(&'a Zone),
    /// Inside an entity tick; mutations are queued until that entity's
    /// lock is released.
    Deferred(&'a mut TickContext<'z>),
}

/// The zone operations a script host may use.
pub struct ZoneApi<'a, 'z> {
    backend: Backend<'a, 'z>,
}

impl<'a, 'z> ZoneApi<'a, 'z> {
    pub fn direct(zone: &'a Zone) -> Self {
        Self {
            backend: Backend::Direct(zone),
        }
    }

    pub fn deferred(ctx: &'a mut TickContext<'z>) -> Self {
        Self {
            backend: Backend::Deferred(ctx),
        }
    }

    pub fn zone_name(&self) -> &str {
        match &self.backend {
            Backend::Direct(zone) => zone.name(),
            Backend::Deferred(ctx) => ctx.zone_name(),
        }
    }

    pub fn spawn(&mut self, entity: SharedEntity) {
        match &mut self.backend {
            Backend::Direct(zone) => {
                if let Err(err) = zone.spawn(entity) {
                    tracing::error!("spawn in {} failed: {}", zone.name(), err);
                }
            }
            Backend::Deferred(ctx) => ctx.spawn(entity),
        }
    }

    pub fn add_entity(&mut self, owner: Option<OwnerId>, entity: SharedEntity) {
        match &mut self.backend {
            Backend::Direct(zone) => {
                if let Err(err) = zone.add_entity(owner, entity) {
                    tracing::error!("add entity to {} failed: {}", zone.name(), err);
                }
            }
            Backend::Deferred(ctx) => ctx.add_entity(owner, entity),
        }
    }

    pub fn remove_player(&mut self, connection: ConnectionId) {
        match &mut self.backend {
            Backend::Direct(zone) => {
                zone.remove_player(connection);
            }
            Backend::Deferred(ctx) => ctx.remove_player(connection),
        }
    }

    pub fn find_entity_by_id(&self, id: EntityId) -> Option<SharedEntity> {
        match &self.backend {
            Backend::Direct(zone) => zone.find_entity_by_id(id),
            Backend::Deferred(ctx) => ctx.find_entity_by_id(id),
        }
    }

    pub fn entities(&self) -> Vec<SharedEntity> {
        match &self.backend {
            Backend::Direct(zone) => zone.entities(),
            Backend::Deferred(ctx) => ctx.entities(),
        }
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        match &self.backend {
            Backend::Direct(zone) => zone.players(),
            Backend::Deferred(ctx) => ctx.players().to_vec(),
        }
    }

    /// Sets a property from a script value, narrowed to the wire set first.
    pub fn set_property(
        &mut self,
        id: EntityId,
        name: &str,
        value: ScriptValue,
        hint: ValueHint,
    ) -> Result<(), ScriptFault> {
        let value = value
            .into_property_value(hint)
            .map_err(|err| ScriptFault::Failed {
                script: format!("set_property {}", name),
                message: err.to_string(),
            })?;
        match &mut self.backend {
            Backend::Direct(zone) => {
                let entity = zone.find_entity_by_id(id).ok_or_else(|| ScriptFault::Failed {
                    script: format!("set_property {}", name),
                    message: format!("no entity {}", id),
                })?;
                entity.write().object_mut().set_property(name, value);
            }
            Backend::Deferred(ctx) => ctx.set_property(id, name, value),
        }
        Ok(())
    }

    /// A unit with a movement behaviour, stamped with the zone's protocol
    /// version. Not yet part of the zone.
    pub fn new_unit(&self, native_type: &str, name: &str) -> SharedEntity {
        let version = match &self.backend {
            Backend::Direct(zone) => zone.version(),
            Backend::Deferred(ctx) => ctx.version(),
        };
        let mut unit = Unit::with_behavior(native_type, name);
        unit.object_mut().version = version;
        if let Some(behavior) = unit.behavior() {
            behavior.write().object_mut().version = version;
        }
        share(unit)
    }

    pub fn vector3(&self, x: f32, y: f32, z: f32) -> Vector3 {
        Vector3::new(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::gc_object::LEGACY_VERSION;
    use crate::entities::identity::{IdAllocator, ZoneId};
    use crate::entities::property::PropertyValue;
    use crate::scripting::NoScripts;

    fn zone() -> Zone {
        Zone::new(
            ZoneId(1),
            "town",
            LEGACY_VERSION,
            Arc::new(IdAllocator::new()),
            Arc::new(NoScripts),
        )
    }

    #[test]
    fn direct_spawn_and_lookup() {
        let zone = zone();
        let mut api = ZoneApi::direct(&zone);
        let unit = api.new_unit("Unit", "Goblin");
        assert_eq!(unit.read().object().version, LEGACY_VERSION);
        api.spawn(Arc::clone(&unit));
        let id = unit.read().id();
        assert!(api.find_entity_by_id(id).is_some());
        assert_eq!(api.entities().len(), 1);
        assert_eq!(api.zone_name(), "town");
    }

    #[test]
    fn direct_set_property_narrows() {
        let zone = zone();
        let mut api = ZoneApi::direct(&zone);
        let unit = api.new_unit("Unit", "Goblin");
        api.spawn(Arc::clone(&unit));
        let id = unit.read().id();

        api.set_property(id, "hp", ScriptValue::Number(55), ValueHint::U16)
            .unwrap();
        assert_eq!(unit.read().object().property("hp"), Some(&PropertyValue::U16(55)));

        let err = api
            .set_property(id, "hp", ScriptValue::List(Vec::new()), ValueHint::Auto)
            .unwrap_err();
        assert!(matches!(err, ScriptFault::Failed { .. }));
        assert!(api
            .set_property(EntityId(999), "hp", ScriptValue::Number(1), ValueHint::Auto)
            .is_err());
    }
}
