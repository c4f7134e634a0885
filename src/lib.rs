pub mod admin;
mod config;
pub mod entities;
pub mod net;
pub mod scripting;
pub mod telemetry;
pub mod world;

use std::sync::Arc;
use std::time::Duration;

pub use config::{AppConfig, NetworkConfig};
pub use net::server::{bind_game_listener, serve_game, GameServerConfig, ServerControl, ServerExit};

use scripting::NoScripts;
use world::game_loop::GameLoop;
use world::state::WorldState;
use world::time::GameClock;
use world::zone_config::FileWorldData;

pub fn run(args: &[String]) -> Result<(), String> {
    loop {
        let config = AppConfig::from_args(args)?;
        telemetry::logging::init(&config.logging)?;

        let mut world = WorldState::new(
            config.protocol_version,
            &config.default_zone,
            Arc::new(FileWorldData::new(config.data_dir.clone())),
            Arc::new(NoScripts),
        );
        let loaded = world.load_zones(config.zones.iter().map(String::as_str));
        tracing::info!(
            "{} of {} zones loaded from {}",
            loaded,
            config.zones.len(),
            config.data_dir.display()
        );
        if world.default_zone().is_none() {
            tracing::warn!("default zone '{}' is not loaded", config.default_zone);
        }
        let world = Arc::new(world);
        let control = Arc::new(ServerControl::new());

        let game_config = GameServerConfig {
            bind_addr: config.network.game_bind_addr.clone(),
            max_frame: config.network.max_frame,
            ..GameServerConfig::default()
        };
        let listener = bind_game_listener(&game_config)?;
        let game_handle = {
            let world = Arc::clone(&world);
            let control = Arc::clone(&control);
            std::thread::spawn(move || serve_game(listener, game_config, world, control))
        };
        {
            let world = Arc::clone(&world);
            let control = Arc::clone(&control);
            std::thread::spawn(move || {
                admin::commands::run_console(std::io::stdin().lock(), world, control)
            });
        }

        let clock = GameClock::new(Duration::from_millis(config.tick_millis));
        let mut game_loop = GameLoop::new(Arc::clone(&world), clock);
        game_loop.run(&control);

        match game_handle.join() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                tracing::error!("game server error: {}", err);
                control.request_shutdown();
            }
            Err(_) => tracing::error!("game server thread panicked"),
        }
        for player in world.players().players() {
            player.disconnect();
            world.players().on_disconnect(player.connection());
        }

        match control.exit_reason() {
            ServerExit::Shutdown => return Ok(()),
            ServerExit::Restart => {
                tracing::info!("restart requested, relaunching");
            }
        }
    }
}
