pub mod api;
pub mod value;

use crate::entities::identity::EntityId;

pub use api::ZoneApi;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptFault {
    #[error("script '{script}' failed: {message}")]
    Failed { script: String, message: String },
    #[error("entity {entity} panicked during tick: {message}")]
    Panicked { entity: EntityId, message: String },
}

/// Gameplay logic authored as data. Hosts only reach the world through the
/// [`ZoneApi`] they are handed.
pub trait ScriptHost: Send + Sync {
    fn run_zone_init(&self, zone: &str, api: &mut ZoneApi<'_, '_>) -> Result<(), ScriptFault>;

    fn run_entity_tick(
        &self,
        entity: EntityId,
        script: &str,
        api: &mut ZoneApi<'_, '_>,
    ) -> Result<(), ScriptFault>;
}

/// Host with no scripts loaded. Every hook succeeds without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScripts;

impl ScriptHost for NoScripts {
    fn run_zone_init(&self, _zone: &str, _api: &mut ZoneApi<'_, '_>) -> Result<(), ScriptFault> {
        Ok(())
    }

    fn run_entity_tick(
        &self,
        _entity: EntityId,
        _script: &str,
        _api: &mut ZoneApi<'_, '_>,
    ) -> Result<(), ScriptFault> {
        Ok(())
    }
}
