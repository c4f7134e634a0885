pub mod game_loop;
pub mod player;
pub mod queue;
pub mod state;
pub mod time;
pub mod vector;
pub mod zone;
pub mod zone_config;
