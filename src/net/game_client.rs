use std::sync::Arc;

use crate::entities::entity::{downcast_mut, downcast_ref};
use crate::entities::identity::{EntityId, IdExhausted};
use crate::entities::unit::{Unit, UnitBehavior};
use crate::net::connection::OutgoingFrame;
use crate::net::cursor::WireError;
use crate::net::frame::InboundFrame;
use crate::scripting::ZoneApi;
use crate::world::player::Player;
use crate::world::state::WorldState;
use crate::world::vector::Vector3;
use crate::world::zone::place;

pub const KIND_HELLO: u8 = 0x00;
pub const KIND_ENTER_ZONE: u8 = 0x01;
pub const KIND_READY: u8 = 0x02;
pub const KIND_MOVE: u8 = 0x03;
pub const KIND_PING: u8 = 0x04;

/// Outbound channel for ping replies; sent outside the tick batch.
pub const CHANNEL_PONG: u8 = 0x04;

pub const AVATAR_TYPE: &str = "Unit";

#[derive(Debug, thiserror::Error)]
pub enum GameClientError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("expected hello, got kind {0:#04x}")]
    ExpectedHello(u8),
    #[error("unknown zone '{0}'")]
    UnknownZone(String),
    #[error("zone '{0}' is full")]
    ZoneFull(String),
    #[error("player is not in a zone")]
    NotInZone,
    #[error("player has no avatar")]
    NoAvatar,
    #[error(transparent)]
    IdExhausted(#[from] IdExhausted),
}

impl GameClientError {
    /// Malformed input ends the session; everything else is reported and
    /// the connection stays up.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Wire(_) | Self::ExpectedHello(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientPacketOutcome {
    EnteredZone { zone: String, avatar: EntityId },
    Ready { objects: usize },
    MoveTarget(Vector3),
    Pong,
    Ignored(u8),
}

/// First frame of a session: `[0x00][cstring name]`.
pub fn parse_hello(mut frame: InboundFrame) -> Result<String, GameClientError> {
    if frame.kind != KIND_HELLO {
        return Err(GameClientError::ExpectedHello(frame.kind));
    }
    Ok(frame.payload.read_cstring()?)
}

pub fn handle_client_packet(
    world: &WorldState,
    player: &Arc<Player>,
    mut frame: InboundFrame,
) -> Result<ClientPacketOutcome, GameClientError> {
    match frame.kind {
        KIND_ENTER_ZONE => {
            let zone = frame.payload.read_cstring()?;
            enter_zone(world, player, &zone)
        }
        KIND_READY => ready(player),
        KIND_MOVE => {
            let x = frame.payload.read_u32()?;
            let y = frame.payload.read_u32()?;
            let target = Vector3::from_fixed([x, y, 0]);
            move_avatar(player, target)?;
            Ok(ClientPacketOutcome::MoveTarget(target))
        }
        KIND_PING => {
            player.send_frame(OutgoingFrame {
                channel: CHANNEL_PONG,
                body: frame.payload.data().to_vec(),
            });
            Ok(ClientPacketOutcome::Pong)
        }
        kind => {
            tracing::debug!(
                "ignoring frame kind {:#04x} from {} ({} bytes)",
                kind,
                player.name(),
                frame.payload.len()
            );
            Ok(ClientPacketOutcome::Ignored(kind))
        }
    }
}

/// Moves the player into `zone_name` and gives it a fresh avatar at the
/// zone's spawn point. Leaving the previous zone removes the old avatar.
fn enter_zone(
    world: &WorldState,
    player: &Arc<Player>,
    zone_name: &str,
) -> Result<ClientPacketOutcome, GameClientError> {
    let zone = world
        .zone(zone_name)
        .ok_or_else(|| GameClientError::UnknownZone(zone_name.to_string()))?;
    if let Some(max) = zone.config().and_then(|config| config.max_players) {
        if zone.player(player.connection()).is_none() && zone.players().len() >= max {
            return Err(GameClientError::ZoneFull(zone.name().to_string()));
        }
    }
    if let Some(previous) = player.zone() {
        previous.remove_player(player.connection());
    }

    zone.add_player(Arc::clone(player));
    let avatar = ZoneApi::direct(&zone).new_unit(AVATAR_TYPE, player.name());
    place(&avatar, Some(zone.spawn_point()), None);
    let id = zone.spawn_owned(Some(player.connection()), avatar)?;
    player.set_avatar(Some(id));
    tracing::info!("{} entered zone {} as {}", player.name(), zone.name(), id);
    Ok(ClientPacketOutcome::EnteredZone {
        zone: zone.name().to_string(),
        avatar: id,
    })
}

/// The client has loaded the zone: start streaming and send every object.
/// Anything queued before this point is superseded by the snapshot.
fn ready(player: &Arc<Player>) -> Result<ClientPacketOutcome, GameClientError> {
    let zone = player.zone().ok_or(GameClientError::NotInZone)?;
    player.set_spawned(true);
    let fragments = zone.spawn_fragments();
    let objects = fragments.len();
    for (create, init) in fragments {
        player.send_client_entity(create);
        player.send_client_entity(init);
    }
    Ok(ClientPacketOutcome::Ready { objects })
}

fn move_avatar(player: &Player, target: Vector3) -> Result<(), GameClientError> {
    let zone = player.zone().ok_or(GameClientError::NotInZone)?;
    let avatar = player
        .avatar()
        .and_then(|id| zone.find_entity_by_id(id))
        .ok_or(GameClientError::NoAvatar)?;
    let behavior = {
        let guard = avatar.read();
        downcast_ref::<Unit>(&*guard).and_then(Unit::behavior)
    }
    .ok_or(GameClientError::NoAvatar)?;
    let mut guard = behavior.write();
    let behavior = downcast_mut::<UnitBehavior>(&mut *guard).ok_or(GameClientError::NoAvatar)?;
    behavior.move_to(target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::identity::ConnectionId;
    use crate::net::connection::testing::RecordingSink;
    use crate::net::cursor::{ByteCursor, Endian};
    use crate::entities::update::{OP_CREATE, OP_INIT};
    use crate::net::frame::{STREAM_BEGIN, STREAM_END};
    use crate::net::type_hash::type_hash;
    use crate::scripting::NoScripts;
    use crate::world::queue::QueueChannel;
    use crate::world::zone_config::FileWorldData;

    fn frame(kind: u8, build: impl FnOnce(&mut ByteCursor)) -> InboundFrame {
        let mut payload = ByteCursor::with_capacity(Endian::Little, 16);
        build(&mut payload);
        InboundFrame { kind, payload }
    }

    fn setup() -> (WorldState, Arc<Player>, Arc<RecordingSink>) {
        let mut world = WorldState::new(
            0x2d,
            "town",
            Arc::new(FileWorldData::new("unused")),
            Arc::new(NoScripts),
        );
        world.add_zone("town");
        world.add_zone("dungeon00");
        let sink = Arc::new(RecordingSink::default());
        let player = Arc::new(Player::new(ConnectionId(7), "Alice", sink.clone()));
        world.players().register(Arc::clone(&player));
        (world, player, sink)
    }

    #[test]
    fn hello_carries_the_name() {
        let hello = frame(KIND_HELLO, |c| c.write_cstring("Alice"));
        assert_eq!(parse_hello(hello).unwrap(), "Alice");
        let wrong = frame(KIND_READY, |_| {});
        assert!(parse_hello(wrong).unwrap_err().is_fatal());
    }

    #[test]
    fn enter_zone_spawns_owned_avatar() {
        let (world, player, _) = setup();
        let enter = frame(KIND_ENTER_ZONE, |c| c.write_cstring("Town"));
        let outcome = handle_client_packet(&world, &player, enter).unwrap();
        let ClientPacketOutcome::EnteredZone { zone, avatar } = outcome else {
            panic!("unexpected outcome {outcome:?}");
        };
        assert_eq!(zone, "town");
        assert_eq!(player.avatar(), Some(avatar));

        let town = world.zone("town").unwrap();
        let entity = town.find_entity_by_id(avatar).unwrap();
        let guard = entity.read();
        assert_eq!(guard.object().identity.owner, Some(ConnectionId(7)));
        assert_eq!(guard.object().version, 0x2d);
        assert_eq!(guard.object().name, "Alice");
    }

    #[test]
    fn switching_zones_drops_old_avatar() {
        let (world, player, _) = setup();
        handle_client_packet(&world, &player, frame(KIND_ENTER_ZONE, |c| c.write_cstring("town")))
            .unwrap();
        handle_client_packet(
            &world,
            &player,
            frame(KIND_ENTER_ZONE, |c| c.write_cstring("dungeon00")),
        )
        .unwrap();
        assert_eq!(world.zone("town").unwrap().entity_count(), 0);
        assert!(world.zone("town").unwrap().player(ConnectionId(7)).is_none());
        assert_eq!(world.zone("dungeon00").unwrap().entities().len(), 1);
    }

    #[test]
    fn ready_queues_every_object() {
        let (world, player, _) = setup();
        assert!(matches!(
            handle_client_packet(&world, &player, frame(KIND_READY, |_| {})),
            Err(GameClientError::NotInZone)
        ));
        handle_client_packet(&world, &player, frame(KIND_ENTER_ZONE, |c| c.write_cstring("town")))
            .unwrap();
        assert_eq!(player.queue().len(QueueChannel::ClientEntity), 2);
        let outcome = handle_client_packet(&world, &player, frame(KIND_READY, |_| {})).unwrap();
        assert_eq!(outcome, ClientPacketOutcome::Ready { objects: 1 });
        assert!(player.is_spawned());
        let queued = player.queue().drain(QueueChannel::ClientEntity);
        let opcodes: Vec<u8> = queued.iter().map(|m| m.opcode).collect();
        assert_eq!(opcodes, vec![OP_CREATE, OP_INIT]);
        let unit_hash = type_hash("Unit").to_le_bytes();
        assert_eq!(&queued[0].data[2..6], &unit_hash);
        let avatar = player.avatar().unwrap().0.to_le_bytes();
        assert_eq!(&queued[1].data[1..3], &avatar);
    }

    #[test]
    fn ready_before_tick_creates_avatar_once() {
        let (world, player, sink) = setup();
        handle_client_packet(&world, &player, frame(KIND_ENTER_ZONE, |c| c.write_cstring("town")))
            .unwrap();
        handle_client_packet(&world, &player, frame(KIND_READY, |_| {})).unwrap();
        world.players().before_tick();
        world.players().after_tick();

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        let body = &sent[0].body;
        let mut expected = vec![STREAM_BEGIN];
        let zone = world.zone("town").unwrap();
        for (create, init) in zone.spawn_fragments() {
            expected.extend_from_slice(&create);
            expected.extend_from_slice(&init);
        }
        expected.push(STREAM_END);
        assert_eq!(body, &expected);
    }

    #[test]
    fn move_sets_behavior_target() {
        let (world, player, _) = setup();
        handle_client_packet(&world, &player, frame(KIND_ENTER_ZONE, |c| c.write_cstring("town")))
            .unwrap();
        let outcome = handle_client_packet(
            &world,
            &player,
            frame(KIND_MOVE, |c| {
                c.write_u32(0x0a00);
                c.write_u32(0xffff_fb00);
            }),
        )
        .unwrap();
        assert_eq!(
            outcome,
            ClientPacketOutcome::MoveTarget(Vector3::new(10.0, -5.0, 0.0))
        );
        let zone = world.zone("town").unwrap();
        let avatar = zone.find_entity_by_id(player.avatar().unwrap()).unwrap();
        let behavior = downcast_ref::<Unit>(&*avatar.read())
            .and_then(Unit::behavior)
            .unwrap();
        let guard = behavior.read();
        let behavior = downcast_ref::<UnitBehavior>(&*guard).unwrap();
        assert_eq!(behavior.target(), Some(Vector3::new(10.0, -5.0, 0.0)));
    }

    #[test]
    fn truncated_move_is_fatal() {
        let (world, player, _) = setup();
        let err = handle_client_packet(&world, &player, frame(KIND_MOVE, |c| c.write_u16(1)))
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn ping_echoes_outside_the_batch() {
        let (world, player, sink) = setup();
        let outcome =
            handle_client_packet(&world, &player, frame(KIND_PING, |c| c.write_u32(99))).unwrap();
        assert_eq!(outcome, ClientPacketOutcome::Pong);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel, CHANNEL_PONG);
        assert_eq!(sent[0].body, vec![99, 0, 0, 0]);
    }

    #[test]
    fn unknown_kind_is_ignored() {
        let (world, player, _) = setup();
        let outcome = handle_client_packet(&world, &player, frame(0x7f, |_| {})).unwrap();
        assert_eq!(outcome, ClientPacketOutcome::Ignored(0x7f));
    }
}
