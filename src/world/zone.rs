use std::collections::{BTreeMap, HashMap};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::entities::entity::{share, subtree, Entity, SharedEntity};
use crate::entities::identity::{ConnectionId, EntityId, IdAllocator, IdExhausted, OwnerId, ZoneId};
use crate::entities::npc::Npc;
use crate::entities::property::PropertyValue;
use crate::entities::unit::UNIT_BEHAVIOR_TYPE;
use crate::entities::update::{init_fragment, remove_fragment, spawn_fragment};
use crate::entities::zone_portal::ZonePortal;
use crate::net::cursor::ByteCursor;
use crate::scripting::{ScriptFault, ScriptHost, ZoneApi};
use crate::telemetry::logging;
use crate::world::player::Player;
use crate::world::vector::Vector3;
use crate::world::zone_config::{PathMap, WorldData, ZoneConfig, ZoneConfigError};

#[derive(Default)]
struct ZoneState {
    /// Top-level entities; these are what gets ticked and spawned.
    roots: BTreeMap<EntityId, SharedEntity>,
    /// Every node of every root's subtree.
    lookup: HashMap<EntityId, SharedEntity>,
    players: BTreeMap<ConnectionId, Arc<Player>>,
}

/// One world partition.
///
/// Lock order: the zone lock may be taken before an entity lock, never the
/// other way round. Entity ticks hold their own write lock and therefore go
/// through [`TickContext`], which reads a snapshot and defers writes.
pub struct Zone {
    id: ZoneId,
    name: String,
    version: u8,
    ids: Arc<IdAllocator>,
    scripts: Arc<dyn ScriptHost>,
    state: RwLock<ZoneState>,
    config: RwLock<Option<ZoneConfig>>,
    path_map: RwLock<Option<PathMap>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ticked: usize,
    pub faults: usize,
}

impl Zone {
    pub fn new(
        id: ZoneId,
        name: &str,
        version: u8,
        ids: Arc<IdAllocator>,
        scripts: Arc<dyn ScriptHost>,
    ) -> Self {
        Self {
            id,
            name: name.to_string(),
            version,
            ids,
            scripts,
            state: RwLock::new(ZoneState::default()),
            config: RwLock::new(None),
            path_map: RwLock::new(None),
        }
    }

    pub fn id(&self) -> ZoneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn config(&self) -> Option<ZoneConfig> {
        self.config.read().clone()
    }

    pub fn path_map(&self) -> Option<PathMap> {
        self.path_map.read().clone()
    }

    pub fn spawn_point(&self) -> Vector3 {
        self.config
            .read()
            .as_ref()
            .map(|config| config.spawn_point)
            .unwrap_or_default()
    }

    /// Binds the subtree to this zone, assigns missing ids, stamps `owner`
    /// on every node when given, then registers it. Adding an id that is
    /// already registered changes nothing in the maps.
    pub fn add_entity(
        &self,
        owner: Option<OwnerId>,
        entity: SharedEntity,
    ) -> Result<EntityId, IdExhausted> {
        let mut nodes = Vec::new();
        self.bind(&entity, owner, &mut nodes)?;
        let root_id = nodes[0].0;

        let mut state = self.state.write();
        if state.lookup.contains_key(&root_id) {
            return Ok(root_id);
        }
        state.roots.insert(root_id, entity);
        for (id, node) in nodes {
            state.lookup.entry(id).or_insert(node);
        }
        Ok(root_id)
    }

    fn bind(
        &self,
        entity: &SharedEntity,
        owner: Option<OwnerId>,
        nodes: &mut Vec<(EntityId, SharedEntity)>,
    ) -> Result<(), IdExhausted> {
        let children = {
            let mut guard = entity.write();
            let object = guard.object_mut();
            if let Some(previous) = object.identity.zone.filter(|zone| *zone != self.id) {
                tracing::warn!(
                    "{} '{}' still bound to zone {:?} while joining {}",
                    object.native_type,
                    object.name,
                    previous,
                    self.name
                );
            }
            object.identity.zone = Some(self.id);
            let fresh = !object.identity.id.is_assigned();
            let id = object.identity.ensure_id(&self.ids)?;
            if let Some(owner) = owner {
                object.identity.owner = Some(owner);
            }
            if fresh && logging::options().log_ids {
                tracing::trace!("id {} -> {} '{}'", id, object.native_type, object.name);
            }
            nodes.push((id, Arc::clone(entity)));
            object.children().to_vec()
        };
        for child in &children {
            self.bind(child, owner, nodes)?;
        }
        Ok(())
    }

    pub fn add_player(self: &Arc<Self>, player: Arc<Player>) {
        player.set_zone(Some(self));
        self.state.write().players.insert(player.connection(), player);
    }

    /// Removes the player and every root it owns, with their subtrees.
    pub fn remove_player(&self, connection: ConnectionId) -> Option<Arc<Player>> {
        let (player, removed) = {
            let mut state = self.state.write();
            let player = state.players.remove(&connection);
            let owned: Vec<EntityId> = state
                .roots
                .iter()
                .filter(|(_, root)| root.read().object().identity.is_owned_by(connection))
                .map(|(id, _)| *id)
                .collect();
            for id in &owned {
                if let Some(root) = state.roots.remove(id) {
                    self.unindex(&mut state, &root);
                }
            }
            (player, owned)
        };

        if let Some(player) = &player {
            player.set_zone(None);
            player.set_spawned(false);
            tracing::info!(
                "player {} left zone {} ({} entities removed)",
                player.name(),
                self.name,
                removed.len()
            );
        }
        for id in removed {
            self.send_to_all(&remove_fragment(id));
        }
        player
    }

    /// Removes a root and its subtree.
    pub fn remove_entity(&self, id: EntityId) -> bool {
        {
            let mut state = self.state.write();
            let Some(root) = state.roots.remove(&id) else {
                return false;
            };
            self.unindex(&mut state, &root);
        }
        self.send_to_all(&remove_fragment(id));
        true
    }

    pub fn clear_entities(&self) {
        let mut state = self.state.write();
        let roots = std::mem::take(&mut state.roots);
        for root in roots.values() {
            self.unindex(&mut state, root);
        }
        state.lookup.clear();
    }

    /// Drops every node of the subtree from the lookup table, clearing the
    /// zone back-reference first.
    fn unindex(&self, state: &mut ZoneState, root: &SharedEntity) {
        for node in subtree(root) {
            let mut guard = node.write();
            let identity = &mut guard.object_mut().identity;
            if identity.zone == Some(self.id) {
                identity.zone = None;
            }
            state.lookup.remove(&identity.id);
        }
    }

    pub fn find_entity_by_id(&self, id: EntityId) -> Option<SharedEntity> {
        self.state.read().lookup.get(&id).cloned()
    }

    pub fn entities(&self) -> Vec<SharedEntity> {
        self.state.read().roots.values().cloned().collect()
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.state.read().players.values().cloned().collect()
    }

    pub fn player(&self, connection: ConnectionId) -> Option<Arc<Player>> {
        self.state.read().players.get(&connection).cloned()
    }

    pub fn entity_count(&self) -> usize {
        self.state.read().lookup.len()
    }

    /// Full-object encoding of a registered entity, under the zone read
    /// lock so the subtree cannot change mid-write.
    pub fn write_full_object(&self, id: EntityId, cursor: &mut ByteCursor) -> bool {
        let state = self.state.read();
        let Some(entity) = state.lookup.get(&id) else {
            return false;
        };
        entity.read().write_full_object(cursor);
        true
    }

    /// Create and init fragment for every root, in id order.
    pub fn spawn_fragments(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let state = self.state.read();
        state
            .roots
            .values()
            .map(|root| {
                let guard = root.read();
                (spawn_fragment(&*guard), init_fragment(&*guard))
            })
            .collect()
    }

    pub fn send_to_all(&self, fragment: &[u8]) {
        for player in self.state.read().players.values() {
            player.send_client_entity(fragment.to_vec());
        }
    }

    /// Adds an unowned entity and announces it to the zone.
    pub fn spawn(&self, entity: SharedEntity) -> Result<EntityId, IdExhausted> {
        self.spawn_owned(None, entity)
    }

    /// Adds the entity under `owner` and announces it to the zone.
    pub fn spawn_owned(
        &self,
        owner: Option<OwnerId>,
        entity: SharedEntity,
    ) -> Result<EntityId, IdExhausted> {
        let id = self.add_entity(owner, Arc::clone(&entity))?;
        let (create, init) = {
            let guard = entity.read();
            tracing::info!(
                "spawning entity '{}' in zone '{}'",
                guard.object().gc_type,
                self.name
            );
            (spawn_fragment(&*guard), init_fragment(&*guard))
        };
        self.send_to_all(&create);
        self.send_to_all(&init);
        Ok(id)
    }

    /// Places the entity and its movement behaviour, then spawns it.
    pub fn spawn_init(
        &self,
        entity: SharedEntity,
        position: Option<Vector3>,
        rotation: Option<f32>,
    ) -> Result<EntityId, IdExhausted> {
        place(&entity, position, rotation);
        self.spawn(entity)
    }

    /// Loads configuration and path map, spawns configured portals and NPCs,
    /// then runs the zone's init script. Script faults are logged; a missing
    /// configuration fails this zone only.
    pub fn init(&self, data: &dyn WorldData) -> Result<(), ZoneConfigError> {
        tracing::info!("initialising zone {}", self.name);
        match data.path_map(&self.name) {
            Ok(map) => *self.path_map.write() = map,
            Err(err) => tracing::warn!("path map for {} not loaded: {}", self.name, err),
        }

        let config = data.zone_config(&self.name)?;
        for portal in &config.portals {
            let mut entity = ZonePortal::new(&portal.name, &portal.target_zone);
            entity.object_mut().version = self.version;
            entity.width = portal.width;
            entity.height = portal.height;
            self.spawn_logged(share(entity), Some(portal.position));
        }
        for npc in &config.npcs {
            let mut entity = Npc::new(&npc.name, npc.level);
            if let Some(script) = &npc.script {
                entity = entity.with_script(script);
            }
            entity.object_mut().version = self.version;
            self.spawn_logged(share(entity), Some(npc.position));
        }
        *self.config.write() = Some(config);

        let mut api = ZoneApi::direct(self);
        if let Err(fault) = self.scripts.run_zone_init(&self.name, &mut api) {
            tracing::error!("failed to execute zone init script {}: {}", self.name, fault);
        }
        Ok(())
    }

    fn spawn_logged(&self, entity: SharedEntity, position: Option<Vector3>) {
        if let Err(err) = self.spawn_init(entity, position, None) {
            tracing::error!("spawn in {} failed: {}", self.name, err);
        }
    }

    /// Ticks every node of every root once. Each node runs under its own
    /// write lock; its deferred effects are applied after the lock is
    /// released. Faults and panics are logged and do not stop the tick.
    pub fn tick(&self) -> TickReport {
        let snapshot = {
            let state = self.state.read();
            TickSnapshot {
                roots: state.roots.values().cloned().collect(),
                lookup: state.lookup.clone(),
                players: state.players.values().cloned().collect(),
            }
        };

        let mut report = TickReport::default();
        for root in &snapshot.roots {
            for node in subtree(root) {
                let mut ctx = TickContext::new(self, &snapshot);
                let result = {
                    let mut guard = node.write();
                    if guard.object().identity.zone != Some(self.id) {
                        continue;
                    }
                    ctx.current = guard.id();
                    catch_unwind(AssertUnwindSafe(|| guard.tick(&mut ctx)))
                };
                report.ticked += 1;
                let fault = match result {
                    Ok(Ok(())) => None,
                    Ok(Err(fault)) => Some(fault),
                    Err(payload) => Some(ScriptFault::Panicked {
                        entity: ctx.current,
                        message: panic_message(payload.as_ref()),
                    }),
                };
                if let Some(fault) = fault {
                    report.faults += 1;
                    tracing::warn!("tick fault in zone {}: {}", self.name, fault);
                }
                let effects = ctx.into_effects();
                self.apply(effects);
            }
        }
        report
    }

    fn apply(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Spawn(entity) => {
                    if let Err(err) = self.spawn(entity) {
                        tracing::error!("deferred spawn in {} failed: {}", self.name, err);
                    }
                }
                Effect::AddEntity(owner, entity) => {
                    if let Err(err) = self.add_entity(owner, entity) {
                        tracing::error!("deferred add in {} failed: {}", self.name, err);
                    }
                }
                Effect::RemoveEntity(id) => {
                    self.remove_entity(id);
                }
                Effect::RemovePlayer(connection) => {
                    self.remove_player(connection);
                }
                Effect::SetProperty { id, name, value } => {
                    if let Some(entity) = self.find_entity_by_id(id) {
                        entity.write().object_mut().set_property(&name, value);
                    }
                }
            }
        }
    }
}

/// Positions an entity and its `UnitBehavior` child, if any.
pub fn place(entity: &SharedEntity, position: Option<Vector3>, rotation: Option<f32>) {
    let behavior = {
        let mut guard = entity.write();
        guard.place(position, rotation);
        guard.object().child_by_native_type(UNIT_BEHAVIOR_TYPE)
    };
    if let Some(behavior) = behavior {
        behavior.write().place(position, rotation);
    }
}

impl std::fmt::Debug for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Zone")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("roots", &state.roots.len())
            .field("players", &state.players.len())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

struct TickSnapshot {
    roots: Vec<SharedEntity>,
    lookup: HashMap<EntityId, SharedEntity>,
    players: Vec<Arc<Player>>,
}

enum Effect {
    Spawn(SharedEntity),
    AddEntity(Option<OwnerId>, SharedEntity),
    RemoveEntity(EntityId),
    RemovePlayer(ConnectionId),
    SetProperty {
        id: EntityId,
        name: String,
        value: PropertyValue,
    },
}

/// What an entity may touch while it ticks. Reads come from the snapshot
/// taken at the start of the zone tick; writes to the zone are queued.
/// Fragments go straight to player queues.
pub struct TickContext<'z> {
    zone: &'z Zone,
    snapshot: &'z TickSnapshot,
    current: EntityId,
    effects: Vec<Effect>,
}

impl<'z> TickContext<'z> {
    fn new(zone: &'z Zone, snapshot: &'z TickSnapshot) -> Self {
        Self {
            zone,
            snapshot,
            current: EntityId::UNASSIGNED,
            effects: Vec::new(),
        }
    }

    pub fn zone_name(&self) -> &str {
        self.zone.name()
    }

    pub fn version(&self) -> u8 {
        self.zone.version()
    }

    /// Entity being ticked.
    pub fn current(&self) -> EntityId {
        self.current
    }

    pub fn broadcast(&self, fragment: Vec<u8>) {
        for player in &self.snapshot.players {
            player.send_client_entity(fragment.clone());
        }
    }

    pub fn send_to(&self, connection: ConnectionId, fragment: Vec<u8>) {
        if let Some(player) = self
            .snapshot
            .players
            .iter()
            .find(|player| player.connection() == connection)
        {
            player.send_client_entity(fragment);
        }
    }

    pub fn players(&self) -> &[Arc<Player>] {
        &self.snapshot.players
    }

    /// Never lock the returned handle of the entity being ticked.
    pub fn find_entity_by_id(&self, id: EntityId) -> Option<SharedEntity> {
        self.snapshot.lookup.get(&id).cloned()
    }

    pub fn entities(&self) -> Vec<SharedEntity> {
        self.snapshot.roots.clone()
    }

    pub fn spawn(&mut self, entity: SharedEntity) {
        self.effects.push(Effect::Spawn(entity));
    }

    pub fn add_entity(&mut self, owner: Option<OwnerId>, entity: SharedEntity) {
        self.effects.push(Effect::AddEntity(owner, entity));
    }

    pub fn remove_entity(&mut self, id: EntityId) {
        self.effects.push(Effect::RemoveEntity(id));
    }

    pub fn remove_player(&mut self, connection: ConnectionId) {
        self.effects.push(Effect::RemovePlayer(connection));
    }

    pub fn set_property(&mut self, id: EntityId, name: &str, value: PropertyValue) {
        self.effects.push(Effect::SetProperty {
            id,
            name: name.to_string(),
            value,
        });
    }

    pub fn run_script(&mut self, entity: EntityId, script: &str) -> Result<(), ScriptFault> {
        let scripts = Arc::clone(&self.zone.scripts);
        let mut api = ZoneApi::deferred(self);
        scripts.run_entity_tick(entity, script, &mut api)
    }

    fn into_effects(self) -> Vec<Effect> {
        self.effects
    }
}
