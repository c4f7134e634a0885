use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crate::net::server::ServerControl;
use crate::world::player::FlushReport;
use crate::world::state::WorldState;
use crate::world::time::{FrameBudget, GameClock, GameTick};
use crate::world::zone::TickReport;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub tick: GameTick,
    pub zones: usize,
    pub entities: TickReport,
    pub flush: FlushReport,
}

/// Fixed-rate driver. Each frame opens every player's stream, ticks all
/// zones, then flushes every player.
#[derive(Debug)]
pub struct GameLoop {
    world: Arc<WorldState>,
    clock: GameClock,
}

impl GameLoop {
    pub fn new(world: Arc<WorldState>, clock: GameClock) -> Self {
        Self { world, clock }
    }

    pub fn clock(&self) -> &GameClock {
        &self.clock
    }

    /// Runs exactly one frame.
    pub fn step(&mut self) -> FrameReport {
        let players = self.world.players();
        players.before_tick();

        let zones = self.world.zones();
        let mut entities = TickReport::default();
        thread::scope(|scope| {
            let handles: Vec<_> = zones
                .iter()
                .map(|zone| (zone.name(), scope.spawn(move || zone.tick())))
                .collect();
            for (name, handle) in handles {
                match handle.join() {
                    Ok(report) => {
                        entities.ticked += report.ticked;
                        entities.faults += report.faults;
                    }
                    Err(_) => tracing::error!("zone {} tick thread panicked", name),
                }
            }
        });

        let flush = players.after_tick();
        let tick = self.clock.advance();
        if flush.frames > 0 {
            tracing::trace!(
                "tick {}: flushed {} frames ({} bytes)",
                tick,
                flush.frames,
                flush.bytes
            );
        }
        FrameReport {
            tick,
            zones: zones.len(),
            entities,
            flush,
        }
    }

    /// Steps until the server is asked to stop. Frames that run over their
    /// budget are logged and the next one starts immediately.
    pub fn run(&mut self, control: &ServerControl) {
        tracing::info!(
            "game loop running at {}ms per tick",
            self.clock.tick_length().as_millis()
        );
        while control.is_running() {
            let started = Instant::now();
            let report = self.step();
            match self.clock.frame_budget(started, Instant::now()) {
                FrameBudget::Remaining(rest) => thread::sleep(rest),
                FrameBudget::Overrun(over) => tracing::debug!(
                    "tick {} overran by {}ms",
                    report.tick,
                    over.as_millis()
                ),
            }
        }
        tracing::info!("game loop stopped at tick {}", self.clock.now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::entities::entity::{downcast_mut, downcast_ref, share, GenericObject};
    use crate::entities::identity::ConnectionId;
    use crate::entities::unit::{Unit, UnitBehavior};
    use crate::net::connection::testing::RecordingSink;
    use crate::net::frame::{CHANNEL_CLIENT_ENTITY, STREAM_BEGIN, STREAM_END};
    use crate::scripting::NoScripts;
    use crate::world::player::Player;
    use crate::world::vector::Vector3;
    use crate::world::zone::Zone;
    use crate::world::zone_config::FileWorldData;

    fn world() -> (Arc<WorldState>, Arc<Zone>) {
        let mut world = WorldState::new(
            0x2d,
            "town",
            Arc::new(FileWorldData::new("unused")),
            Arc::new(NoScripts),
        );
        let zone = world.add_zone("town");
        (Arc::new(world), zone)
    }

    #[test]
    fn step_advances_clock_without_players() {
        let (world, zone) = world();
        zone.add_entity(None, share(GenericObject::of_type("Unit")))
            .unwrap();
        let mut game = GameLoop::new(world, GameClock::new(Duration::from_millis(33)));
        let report = game.step();
        assert_eq!(report.tick, GameTick(1));
        assert_eq!(report.zones, 1);
        assert_eq!(report.entities.ticked, 1);
        assert_eq!(report.flush.frames, 0);
        assert_eq!(game.clock().now(), GameTick(1));
    }

    #[test]
    fn moving_unit_reaches_spawned_player_as_one_frame() {
        let (world, zone) = world();
        let sink = Arc::new(RecordingSink::default());
        let player = Arc::new(Player::new(ConnectionId(1), "Alice", sink.clone()));
        world.players().register(Arc::clone(&player));
        zone.add_player(Arc::clone(&player));
        player.set_spawned(true);

        let unit = share(Unit::with_behavior("Unit", "Goblin"));
        zone.add_entity(None, Arc::clone(&unit)).unwrap();
        let behavior = downcast_ref::<Unit>(&*unit.read())
            .and_then(Unit::behavior)
            .unwrap();
        {
            let mut guard = behavior.write();
            let behavior = downcast_mut::<UnitBehavior>(&mut *guard).unwrap();
            behavior.speed = 1.0;
            behavior.move_to(Vector3::new(1.0, 0.0, 0.0));
        }

        let mut game = GameLoop::new(Arc::clone(&world), GameClock::default());
        let report = game.step();
        assert_eq!(report.entities.ticked, 2);
        assert_eq!(report.flush.frames, 1);

        let frames = sink.sent();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].channel, CHANNEL_CLIENT_ENTITY);
        assert_eq!(frames[0].body.first(), Some(&STREAM_BEGIN));
        assert_eq!(frames[0].body.last(), Some(&STREAM_END));

        // Target reached on the first step, so nothing is left to report.
        assert_eq!(game.step().flush.frames, 0);
        assert_eq!(sink.sent().len(), 1);
    }

    #[test]
    fn run_returns_once_shutdown_is_requested() {
        let (world, _zone) = world();
        let control = Arc::new(ServerControl::new());
        let stopper = Arc::clone(&control);
        let handle = thread::spawn(move || {
            let mut game = GameLoop::new(world, GameClock::new(Duration::from_millis(5)));
            game.run(&stopper);
            game.clock().now()
        });
        thread::sleep(Duration::from_millis(40));
        control.request_shutdown();
        let ticks = handle.join().unwrap();
        assert!(ticks.0 >= 1);
    }
}
