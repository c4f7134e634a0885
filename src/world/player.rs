use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::entities::identity::{ConnectionId, EntityId};
use crate::net::connection::{FrameSink, OutgoingFrame};
use crate::net::frame::{ClientEntityStream, CHANNEL_CLIENT_ENTITY};
use crate::world::queue::{MessageQueue, QueueChannel, QueuedMessage};
use crate::world::zone::Zone;

/// A connected client.
pub struct Player {
    connection: ConnectionId,
    name: String,
    spawned: AtomicBool,
    stream: Mutex<ClientEntityStream>,
    queue: MessageQueue,
    sink: Arc<dyn FrameSink>,
    zone: Mutex<Weak<Zone>>,
    avatar: Mutex<Option<EntityId>>,
}

impl Player {
    pub fn new(connection: ConnectionId, name: &str, sink: Arc<dyn FrameSink>) -> Self {
        Self {
            connection,
            name: name.to_string(),
            spawned: AtomicBool::new(false),
            stream: Mutex::new(ClientEntityStream::new()),
            queue: MessageQueue::new(),
            sink,
            zone: Mutex::new(Weak::new()),
            avatar: Mutex::new(None),
        }
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_spawned(&self) -> bool {
        self.spawned.load(Ordering::Acquire)
    }

    /// Becoming spawned discards anything queued before; the caller sends
    /// a full snapshot next.
    pub fn set_spawned(&self, spawned: bool) {
        if spawned && !self.is_spawned() {
            let dropped = self.queue.clear(QueueChannel::ClientEntity);
            if dropped > 0 {
                tracing::trace!("dropped {} fragments queued before {} spawned", dropped, self.name);
            }
        }
        self.spawned.store(spawned, Ordering::Release);
    }

    pub fn zone(&self) -> Option<Arc<Zone>> {
        self.zone.lock().upgrade()
    }

    pub fn set_zone(&self, zone: Option<&Arc<Zone>>) {
        *self.zone.lock() = zone.map(Arc::downgrade).unwrap_or_default();
    }

    pub fn avatar(&self) -> Option<EntityId> {
        *self.avatar.lock()
    }

    pub fn set_avatar(&self, avatar: Option<EntityId>) {
        *self.avatar.lock() = avatar;
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn send_client_entity(&self, fragment: Vec<u8>) {
        self.queue
            .enqueue(QueueChannel::ClientEntity, QueuedMessage::new(fragment));
    }

    /// Sends a frame outside the tick batch.
    pub fn send_frame(&self, frame: OutgoingFrame) {
        if let Err(err) = self.sink.send(frame) {
            tracing::debug!("send to {} failed: {}", self.name, err);
        }
    }

    pub fn disconnect(&self) {
        self.sink.close();
    }

    pub fn begin_stream(&self) {
        self.stream.lock().begin();
    }

    /// Closes this tick's stream window and hands the batch to the
    /// transport. Returns the number of body bytes handed over.
    pub fn end_stream(&self) -> usize {
        if !self.is_spawned() {
            let dropped = self.queue.clear(QueueChannel::ClientEntity);
            if dropped > 0 {
                tracing::trace!("dropped {} fragments for unspawned {}", dropped, self.name);
            }
            self.stream.lock().end();
            return 0;
        }

        let body = {
            let mut stream = self.stream.lock();
            for message in self.queue.drain(QueueChannel::ClientEntity) {
                stream.push(&message.data);
            }
            stream.end()
        };
        let Some(body) = body else {
            return 0;
        };
        let len = body.len();
        if let Err(err) = self.sink.send(OutgoingFrame {
            channel: CHANNEL_CLIENT_ENTITY,
            body,
        }) {
            tracing::debug!("flush to {} failed: {}", self.name, err);
            return 0;
        }
        len
    }
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("connection", &self.connection)
            .field("name", &self.name)
            .field("spawned", &self.is_spawned())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub players: usize,
    pub frames: usize,
    pub bytes: usize,
}

/// Every connected player, process-wide.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: RwLock<BTreeMap<ConnectionId, Arc<Player>>>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuses a player whose connection id is already registered.
    pub fn register(&self, player: Arc<Player>) -> bool {
        let mut players = self.players.write();
        if players.contains_key(&player.connection()) {
            tracing::warn!(
                "conn {} already registered, refusing {}",
                player.connection(),
                player.name()
            );
            return false;
        }
        tracing::info!("player {} joined on conn {}", player.name(), player.connection());
        players.insert(player.connection(), player);
        true
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.players.read().contains_key(&connection)
    }

    pub fn get(&self, connection: ConnectionId) -> Option<Arc<Player>> {
        self.players.read().get(&connection).cloned()
    }

    pub fn players(&self) -> Vec<Arc<Player>> {
        self.players.read().values().cloned().collect()
    }

    pub fn by_name(&self, name: &str) -> Option<Arc<Player>> {
        self.players
            .read()
            .values()
            .find(|player| player.name().eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.players.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the player and everything it owns from its zone, then
    /// forgets it.
    pub fn on_disconnect(&self, connection: ConnectionId) -> Option<Arc<Player>> {
        let player = self.players.write().remove(&connection)?;
        if let Some(zone) = player.zone() {
            zone.remove_player(connection);
        }
        tracing::info!("player {} left (conn {})", player.name(), connection);
        Some(player)
    }

    pub fn before_tick(&self) {
        for player in self.players() {
            player.begin_stream();
        }
    }

    pub fn after_tick(&self) -> FlushReport {
        let players = self.players();
        let mut report = FlushReport {
            players: players.len(),
            ..FlushReport::default()
        };
        for player in players {
            let sent = player.end_stream();
            if sent > 0 {
                report.frames += 1;
                report.bytes += sent;
            }
        }
        report
    }
}
