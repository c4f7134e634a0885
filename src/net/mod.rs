pub mod connection;
pub mod cursor;
pub mod frame;
pub mod game_client;
pub mod server;
pub mod type_hash;
