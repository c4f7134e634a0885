use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::entities::identity::ConnectionId;
use crate::net::connection::ConnectionWriter;
use crate::net::frame::{read_frame, FrameError, DEFAULT_MAX_FRAME};
use crate::net::game_client::{handle_client_packet, parse_hello};
use crate::world::player::Player;
use crate::world::state::WorldState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerExit {
    Shutdown,
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerSignal {
    Running = 0,
    Shutdown = 1,
    Restart = 2,
}

#[derive(Debug)]
pub struct ServerControl {
    signal: AtomicU8,
}

impl ServerControl {
    pub fn new() -> Self {
        Self {
            signal: AtomicU8::new(ServerSignal::Running as u8),
        }
    }

    pub fn request_shutdown(&self) {
        self.signal.store(ServerSignal::Shutdown as u8, Ordering::SeqCst);
    }

    pub fn request_restart(&self) {
        self.signal.store(ServerSignal::Restart as u8, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        matches!(self.current_signal(), ServerSignal::Running)
    }

    pub fn exit_reason(&self) -> ServerExit {
        match self.current_signal() {
            ServerSignal::Restart => ServerExit::Restart,
            _ => ServerExit::Shutdown,
        }
    }

    fn current_signal(&self) -> ServerSignal {
        match self.signal.load(Ordering::SeqCst) {
            2 => ServerSignal::Restart,
            1 => ServerSignal::Shutdown,
            _ => ServerSignal::Running,
        }
    }
}

impl Default for ServerControl {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct GameServerConfig {
    pub bind_addr: String,
    pub max_frame: usize,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for GameServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:2603".to_string(),
            max_frame: DEFAULT_MAX_FRAME,
            read_timeout: Duration::from_secs(15 * 60),
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// Hands out connection ids. 0 is never issued and ids still held by a
/// registered player are skipped after wraparound.
#[derive(Debug)]
struct ConnectionIds {
    next: AtomicU16,
}

impl ConnectionIds {
    fn new() -> Self {
        Self {
            next: AtomicU16::new(1),
        }
    }

    /// `None` once every id is in use.
    fn allocate(&self, in_use: impl Fn(ConnectionId) -> bool) -> Option<ConnectionId> {
        for _ in 0..=u16::MAX {
            let id = ConnectionId(self.next.fetch_add(1, Ordering::Relaxed));
            if id.0 != 0 && !in_use(id) {
                return Some(id);
            }
        }
        None
    }
}

pub fn bind_game_listener(config: &GameServerConfig) -> Result<TcpListener, String> {
    let listener = TcpListener::bind(&config.bind_addr)
        .map_err(|err| format!("bind {} failed: {}", config.bind_addr, err))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("game listener nonblocking failed: {}", err))?;
    tracing::info!("game server listening on {}", config.bind_addr);
    Ok(listener)
}

/// Accepts until `control` stops running. One reader thread per
/// connection; each connection's writes go through its own writer thread.
pub fn serve_game(
    listener: TcpListener,
    config: GameServerConfig,
    world: Arc<WorldState>,
    control: Arc<ServerControl>,
) -> Result<(), String> {
    let ids = ConnectionIds::new();
    while control.is_running() {
        match listener.accept() {
            Ok((stream, addr)) => {
                let Some(connection) = ids.allocate(|id| world.players().contains(id)) else {
                    tracing::warn!("no free connection id, refusing {}", addr);
                    continue;
                };
                tracing::info!("game connection {} from {}", connection, addr);
                let config = config.clone();
                let world = Arc::clone(&world);
                let spawned = thread::Builder::new()
                    .name(format!("conn-{}-reader", connection))
                    .spawn(move || {
                        if let Err(err) = handle_game_connection(stream, connection, &config, &world)
                        {
                            tracing::warn!("game connection {} error: {}", connection, err);
                        }
                    });
                if let Err(err) = spawned {
                    tracing::error!("spawn reader for {} failed: {}", connection, err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(err) => {
                tracing::error!("game accept error: {}", err);
            }
        }
    }
    tracing::info!("game server stopped accepting");
    Ok(())
}

fn handle_game_connection(
    stream: TcpStream,
    connection: ConnectionId,
    config: &GameServerConfig,
    world: &WorldState,
) -> Result<(), String> {
    stream
        .set_nonblocking(false)
        .map_err(|err| format!("game stream nonblocking reset failed: {}", err))?;
    stream
        .set_read_timeout(Some(config.read_timeout))
        .map_err(|err| format!("read timeout set failed: {}", err))?;
    stream
        .set_write_timeout(Some(config.write_timeout))
        .map_err(|err| format!("write timeout set failed: {}", err))?;
    stream
        .set_nodelay(true)
        .map_err(|err| format!("nodelay set failed: {}", err))?;

    let clone = |what: &str| {
        stream
            .try_clone()
            .map_err(|err| format!("clone {} stream failed: {}", what, err))
    };
    let (writer, _writer_thread) = ConnectionWriter::spawn(connection, clone("writer")?)?;
    let writer = writer.with_socket(clone("control")?);
    let mut reader = BufReader::new(stream);

    let name = match read_frame(&mut reader, config.max_frame) {
        Ok(frame) => parse_hello(frame).map_err(|err| format!("bad hello: {}", err))?,
        Err(FrameError::Closed) => return Ok(()),
        Err(err) => return Err(format!("read hello failed: {}", err)),
    };
    let player = Arc::new(Player::new(connection, &name, Arc::new(writer)));
    if !world.players().register(Arc::clone(&player)) {
        player.disconnect();
        return Err(format!("connection id {} already in use", connection));
    }
    tracing::info!("{} logged in on connection {}", name, connection);

    let result = session(&mut reader, config, world, &player);
    world.players().on_disconnect(connection);
    result
}

fn session(
    reader: &mut BufReader<TcpStream>,
    config: &GameServerConfig,
    world: &WorldState,
    player: &Arc<Player>,
) -> Result<(), String> {
    loop {
        let frame = match read_frame(reader, config.max_frame) {
            Ok(frame) => frame,
            Err(FrameError::Closed) => return Ok(()),
            Err(err) => return Err(format!("read from {} failed: {}", player.name(), err)),
        };
        let kind = frame.kind;
        match handle_client_packet(world, player, frame) {
            Ok(outcome) => tracing::trace!("{} kind {:#04x}: {:?}", player.name(), kind, outcome),
            Err(err) if err.is_fatal() => {
                return Err(format!(
                    "malformed kind {:#04x} from {}: {}",
                    kind,
                    player.name(),
                    err
                ));
            }
            Err(err) => tracing::warn!("{} kind {:#04x} rejected: {}", player.name(), kind, err),
        }
    }
}
