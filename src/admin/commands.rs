use std::io::BufRead;
use std::sync::Arc;

use crate::entities::identity::{ConnectionId, EntityId};
use crate::net::server::ServerControl;
use crate::scripting::value::{parse_value, ValueHint};
use crate::scripting::ZoneApi;
use crate::world::state::WorldState;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Online,
    Zones,
    Kick {
        target: String,
    },
    Hash {
        name: String,
    },
    SetProperty {
        entity: EntityId,
        name: String,
        value: String,
        hint: ValueHint,
    },
    Restart,
    Shutdown,
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminOutcome {
    Lines(Vec<String>),
    Log(String),
    Restart,
    Shutdown,
}

/// Parses one console line. The leading `!` is optional; blank lines are
/// `None`.
pub fn parse_admin_command(line: &str) -> Result<Option<AdminCommand>, String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('!').unwrap_or(trimmed);
    let mut parts = trimmed.split_whitespace();
    let Some(command) = parts.next() else {
        return Ok(None);
    };
    let command = command.to_ascii_lowercase();
    let parsed = match command.as_str() {
        "online" | "who" => AdminCommand::Online,
        "zones" => AdminCommand::Zones,
        "kick" => AdminCommand::Kick {
            target: required(parts.next(), "kick target")?.to_string(),
        },
        "hash" => AdminCommand::Hash {
            name: required(parts.next(), "hash name")?.to_string(),
        },
        "set" => {
            let raw_id = required(parts.next(), "entity id")?;
            let entity = raw_id
                .parse::<u16>()
                .map(EntityId)
                .map_err(|_| format!("admin command expected entity id, got '{raw_id}'"))?;
            let name = required(parts.next(), "property name")?.to_string();
            let value = required(parts.next(), "property value")?.to_string();
            let hint = match parts.next() {
                Some(raw) => ValueHint::parse(raw)
                    .ok_or_else(|| format!("admin command unknown value hint '{raw}'"))?,
                None => ValueHint::Auto,
            };
            AdminCommand::SetProperty {
                entity,
                name,
                value,
                hint,
            }
        }
        "restart" => AdminCommand::Restart,
        "shutdown" | "quit" => AdminCommand::Shutdown,
        _ => AdminCommand::Unknown(command),
    };
    Ok(Some(parsed))
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, String> {
    value.ok_or_else(|| format!("admin command missing {what}"))
}

pub fn execute_admin_command(world: &WorldState, command: AdminCommand) -> AdminOutcome {
    match command {
        AdminCommand::Online => {
            let mut names: Vec<String> = world
                .players()
                .players()
                .iter()
                .map(|player| {
                    let zone = player
                        .zone()
                        .map(|zone| zone.name().to_string())
                        .unwrap_or_else(|| "-".to_string());
                    format!("{} (conn {}, zone {})", player.name(), player.connection(), zone)
                })
                .collect();
            names.sort_by_key(|name| name.to_ascii_lowercase());
            AdminOutcome::Lines(names)
        }
        AdminCommand::Zones => AdminOutcome::Lines(
            world
                .zones()
                .iter()
                .map(|zone| {
                    format!(
                        "{}: {} players, {} entities",
                        zone.name(),
                        zone.players().len(),
                        zone.entity_count()
                    )
                })
                .collect(),
        ),
        AdminCommand::Kick { target } => {
            let player = target
                .parse::<u16>()
                .ok()
                .and_then(|id| world.players().get(ConnectionId(id)))
                .or_else(|| world.players().by_name(&target));
            match player {
                Some(player) => {
                    player.disconnect();
                    world.players().on_disconnect(player.connection());
                    AdminOutcome::Log(format!("kicked {}", player.name()))
                }
                None => AdminOutcome::Log(format!("no player '{}'", target)),
            }
        }
        AdminCommand::Hash { name } => match parse_hash(&name) {
            Some(hash) => AdminOutcome::Log(format!(
                "{hash:#010x} {}",
                world.hashes().describe(hash)
            )),
            None => {
                let hash = world.hashes().hash(&name);
                AdminOutcome::Log(format!("{hash:#010x} {name}"))
            }
        },
        AdminCommand::SetProperty {
            entity,
            name,
            value,
            hint,
        } => {
            let value = match parse_value(&value) {
                Ok(value) => value,
                Err(err) => return AdminOutcome::Log(format!("bad value: {}", err)),
            };
            let Some(zone) = world
                .zones()
                .into_iter()
                .find(|zone| zone.find_entity_by_id(entity).is_some())
            else {
                return AdminOutcome::Log(format!("no entity {}", entity));
            };
            match ZoneApi::direct(&zone).set_property(entity, &name, value, hint) {
                Ok(()) => AdminOutcome::Log(format!("{}.{} set", entity, name)),
                Err(fault) => AdminOutcome::Log(fault.to_string()),
            }
        }
        AdminCommand::Restart => AdminOutcome::Restart,
        AdminCommand::Shutdown => AdminOutcome::Shutdown,
        AdminCommand::Unknown(name) => {
            AdminOutcome::Log(format!("unknown admin command '{}'", name))
        }
    }
}

/// `0x508c4594` or `#508c4594` looks up a hash instead of computing one.
fn parse_hash(raw: &str) -> Option<u32> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .or_else(|| raw.strip_prefix('#'))?;
    u32::from_str_radix(digits, 16).ok()
}

/// Reads commands line by line until end of input or until a restart or
/// shutdown has been requested.
pub fn run_console<R: BufRead>(input: R, world: Arc<WorldState>, control: Arc<ServerControl>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!("console read failed: {}", err);
                return;
            }
        };
        if !control.is_running() {
            return;
        }
        let command = match parse_admin_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };
        match execute_admin_command(&world, command) {
            AdminOutcome::Lines(lines) => {
                for line in lines {
                    println!("{}", line);
                }
            }
            AdminOutcome::Log(message) => println!("{}", message),
            AdminOutcome::Restart => {
                tracing::info!("restart requested from console");
                control.request_restart();
                return;
            }
            AdminOutcome::Shutdown => {
                tracing::info!("shutdown requested from console");
                control.request_shutdown();
                return;
            }
        }
    }
}
