//! Client-entity channel fragments.
//!
//! Each fragment is self-contained: it starts with its opcode and carries
//! the entity id it applies to, so any number of them can be concatenated
//! into one stream window.

use crate::entities::entity::Entity;
use crate::entities::identity::EntityId;
use crate::net::cursor::{ByteCursor, Endian};

pub const OP_CREATE: u8 = 0x01;
pub const OP_REMOVE: u8 = 0x05;
pub const OP_INIT: u8 = 0x32;
pub const OP_UPDATE: u8 = 0x35;

pub const UPDATE_POSITION: u8 = 0x01;

/// `[0x01][full object][init payload]`
pub fn spawn_fragment(entity: &dyn Entity) -> Vec<u8> {
    let mut cursor = ByteCursor::with_capacity(Endian::Little, 256);
    cursor.write_u8(OP_CREATE);
    entity.write_full_object(&mut cursor);
    entity.write_init(&mut cursor);
    cursor.into_inner()
}

/// `[0x32][u16 id][synch payload]`, sent once the client has built the
/// object to bring its dynamic state in line.
pub fn init_fragment(entity: &dyn Entity) -> Vec<u8> {
    let mut cursor = ByteCursor::with_capacity(Endian::Little, 16);
    cursor.write_u8(OP_INIT);
    cursor.write_u16(entity.id().0);
    entity.write_synch(&mut cursor);
    cursor.into_inner()
}

/// `[0x35][u16 id][u8 code][payload]`
pub fn update_fragment(id: EntityId, code: u8, payload: &[u8]) -> Vec<u8> {
    let mut cursor = ByteCursor::with_capacity(Endian::Little, 4 + payload.len());
    cursor.write_u8(OP_UPDATE);
    cursor.write_u16(id.0);
    cursor.write_u8(code);
    cursor.write_bytes(payload);
    cursor.into_inner()
}

/// Update fragment built from the entity's own `write_update`.
pub fn entity_update_fragment(entity: &dyn Entity, code: u8) -> Vec<u8> {
    let mut payload = ByteCursor::with_capacity(Endian::Little, 32);
    entity.write_update(&mut payload);
    update_fragment(entity.id(), code, payload.data())
}

/// `[0x05][u16 id]`
pub fn remove_fragment(id: EntityId) -> Vec<u8> {
    let mut cursor = ByteCursor::with_capacity(Endian::Little, 3);
    cursor.write_u8(OP_REMOVE);
    cursor.write_u16(id.0);
    cursor.into_inner()
}
