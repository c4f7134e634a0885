use std::collections::BTreeMap;
use std::sync::Arc;

use crate::entities::identity::{IdAllocator, ZoneId};
use crate::entities::unit::UNIT_BEHAVIOR_TYPE;
use crate::net::type_hash::{TypeHashRegistry, DEFAULT_REGISTRY_CAPACITY};
use crate::scripting::ScriptHost;
use crate::world::player::PlayerRegistry;
use crate::world::zone::Zone;
use crate::world::zone_config::WorldData;

/// Names whose hashes show up in nearly every full object.
const WELL_KNOWN_NAMES: &[&str] = &[
    "Unit",
    UNIT_BEHAVIOR_TYPE,
    "ZonePortal",
    "NPC",
    "hp",
    "level",
    "name",
    "target_zone",
];

/// Process-scoped world: zones, players, the id counter and the hash memo.
/// Built once at server start and shared by the server and the game loop.
pub struct WorldState {
    zones: BTreeMap<String, Arc<Zone>>,
    default_zone: String,
    players: PlayerRegistry,
    ids: Arc<IdAllocator>,
    hashes: TypeHashRegistry,
    version: u8,
    data: Arc<dyn WorldData>,
    scripts: Arc<dyn ScriptHost>,
    next_zone: u32,
}

impl WorldState {
    pub fn new(
        version: u8,
        default_zone: &str,
        data: Arc<dyn WorldData>,
        scripts: Arc<dyn ScriptHost>,
    ) -> Self {
        Self {
            zones: BTreeMap::new(),
            default_zone: default_zone.to_ascii_lowercase(),
            players: PlayerRegistry::new(),
            ids: Arc::new(IdAllocator::new()),
            hashes: TypeHashRegistry::with_names(
                DEFAULT_REGISTRY_CAPACITY,
                WELL_KNOWN_NAMES.iter().copied(),
            ),
            version,
            data,
            scripts,
            next_zone: 1,
        }
    }

    /// Creates an empty zone without running its init.
    pub fn add_zone(&mut self, name: &str) -> Arc<Zone> {
        let key = name.to_ascii_lowercase();
        if let Some(zone) = self.zones.get(&key) {
            return Arc::clone(zone);
        }
        let id = ZoneId(self.next_zone);
        self.next_zone += 1;
        let zone = Arc::new(Zone::new(
            id,
            name,
            self.version,
            Arc::clone(&self.ids),
            Arc::clone(&self.scripts),
        ));
        self.zones.insert(key, Arc::clone(&zone));
        zone
    }

    /// Creates and initialises each named zone. A zone whose configuration
    /// cannot be loaded is logged and left out; the others still load.
    /// Returns the number of zones that loaded.
    pub fn load_zones<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) -> usize {
        let mut loaded = 0;
        for name in names {
            let zone = self.add_zone(name);
            match zone.init(self.data.as_ref()) {
                Ok(()) => {
                    loaded += 1;
                    tracing::info!(
                        "zone {} loaded with {} entities",
                        zone.name(),
                        zone.entity_count()
                    );
                }
                Err(err) => {
                    tracing::error!("zone {} failed to load: {}", name, err);
                    self.zones.remove(&name.to_ascii_lowercase());
                }
            }
        }
        loaded
    }

    pub fn zone(&self, name: &str) -> Option<Arc<Zone>> {
        self.zones.get(&name.to_ascii_lowercase()).cloned()
    }

    pub fn default_zone(&self) -> Option<Arc<Zone>> {
        self.zone(&self.default_zone)
    }

    pub fn zones(&self) -> Vec<Arc<Zone>> {
        self.zones.values().cloned().collect()
    }

    pub fn players(&self) -> &PlayerRegistry {
        &self.players
    }

    pub fn ids(&self) -> &Arc<IdAllocator> {
        &self.ids
    }

    pub fn hashes(&self) -> &TypeHashRegistry {
        &self.hashes
    }

    pub fn version(&self) -> u8 {
        self.version
    }
}

impl std::fmt::Debug for WorldState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldState")
            .field("zones", &self.zones.keys().collect::<Vec<_>>())
            .field("default_zone", &self.default_zone)
            .field("players", &self.players.len())
            .field("version", &self.version)
            .finish()
    }
}
