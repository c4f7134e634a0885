pub mod entity;
pub mod gc_object;
pub mod identity;
pub mod npc;
pub mod property;
pub mod unit;
pub mod update;
pub mod zone_portal;
