use std::io::Write;
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::entities::identity::ConnectionId;
use crate::net::frame::compress_frame;
use crate::telemetry::logging;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingFrame {
    pub channel: u8,
    pub body: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("connection {0} writer is closed")]
    Closed(ConnectionId),
}

/// Destination of flushed frames. `send` must not block on socket I/O.
pub trait FrameSink: Send + Sync {
    fn send(&self, frame: OutgoingFrame) -> Result<(), TransportError>;

    /// Drops the underlying connection so its reader notices and cleans up.
    fn close(&self) {}
}

/// Hands frames to a dedicated writer thread that compresses and writes
/// them in order.
#[derive(Debug, Clone)]
pub struct ConnectionWriter {
    connection: ConnectionId,
    sender: Sender<OutgoingFrame>,
    socket: Option<Arc<TcpStream>>,
}

impl ConnectionWriter {
    pub fn spawn<W: Write + Send + 'static>(
        connection: ConnectionId,
        stream: W,
    ) -> Result<(Self, JoinHandle<()>), String> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = std::thread::Builder::new()
            .name(format!("conn-{}-writer", connection))
            .spawn(move || write_loop(connection, stream, receiver))
            .map_err(|err| format!("spawn writer for {} failed: {}", connection, err))?;
        Ok((
            Self {
                connection,
                sender,
                socket: None,
            },
            handle,
        ))
    }

    /// Socket to shut down on `close`.
    pub fn with_socket(mut self, socket: TcpStream) -> Self {
        self.socket = Some(Arc::new(socket));
        self
    }

    pub fn connection(&self) -> ConnectionId {
        self.connection
    }
}

impl FrameSink for ConnectionWriter {
    fn send(&self, frame: OutgoingFrame) -> Result<(), TransportError> {
        self.sender
            .send(frame)
            .map_err(|_| TransportError::Closed(self.connection))
    }

    fn close(&self) {
        if let Some(socket) = &self.socket {
            if let Err(err) = socket.shutdown(Shutdown::Both) {
                tracing::debug!("shutdown conn {} failed: {}", self.connection, err);
            }
        }
    }
}

fn write_loop<W: Write>(connection: ConnectionId, mut stream: W, receiver: Receiver<OutgoingFrame>) {
    for frame in receiver {
        if logging::options().log_sent_channels {
            tracing::debug!(
                "sent conn={} channel={:#04x} {}",
                connection,
                frame.channel,
                logging::hex_line(&frame.body)
            );
        }
        let bytes = match compress_frame(frame.channel, &frame.body) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::error!("compress for conn {} failed: {}", connection, err);
                continue;
            }
        };
        if let Err(err) = stream.write_all(&bytes).and_then(|_| stream.flush()) {
            tracing::debug!("write to conn {} failed: {}", connection, err);
            break;
        }
    }
    tracing::trace!("writer for conn {} stopped", connection);
}
