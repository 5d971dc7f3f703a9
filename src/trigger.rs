//! Trigger delivery over a Unix socket.
//!
//! A running `snipcycle run` owns the store and the dispatcher on its main
//! thread. The listener thread here accepts length-prefixed JSON requests,
//! forwards them to the owner as [`CoreEvent`]s and answers immediately, so
//! whoever fires a trigger (a desktop shortcut running `snipcycle trigger`)
//! never waits for the paste to happen.

use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::hotkey::HotkeySpec;

/// Requests are tiny; anything larger is garbage
const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// How long a connected client may take to send its request
const READ_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRequest {
    /// The hotkey was pressed
    Trigger,
    /// Re-read the config file now
    Reload,
    /// Health check
    Ping,
    /// Stop the owner loop
    Shutdown,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum TriggerResponse {
    /// Request queued for the owner
    Accepted,
    Pong,
    Error(String),
}

/// Events delivered to the owner thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreEvent {
    Trigger,
    Reload,
    Shutdown,
}

impl TriggerRequest {
    fn event(self) -> Option<CoreEvent> {
        match self {
            TriggerRequest::Trigger => Some(CoreEvent::Trigger),
            TriggerRequest::Reload => Some(CoreEvent::Reload),
            TriggerRequest::Shutdown => Some(CoreEvent::Shutdown),
            TriggerRequest::Ping => None,
        }
    }
}

/// Where triggers come from, as seen by the owner.
///
/// The owner registers the configured hotkey at startup and whenever it
/// changes, and unregisters it at shutdown.
pub trait TriggerSource {
    fn register(&mut self, hotkey: &HotkeySpec) -> Result<()>;
    fn unregister(&mut self);
    fn registered(&self) -> Option<&HotkeySpec>;
}

/// Client side, used by `snipcycle trigger`, `stop` and `status`
pub struct TriggerClient {
    stream: UnixStream,
}

impl TriggerClient {
    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to snipcycle at {}", path.display()))?;
        stream
            .set_read_timeout(Some(READ_TIMEOUT))
            .context("Failed to set socket timeout")?;
        Ok(Self { stream })
    }

    /// Send a request and wait for the acknowledgement
    pub fn request(&mut self, req: TriggerRequest) -> Result<TriggerResponse> {
        write_message(&mut self.stream, &req)?;
        read_message(&mut self.stream)
    }
}

/// Send one request to the daemon listening at `path`
pub fn send_request(path: &Path, req: TriggerRequest) -> Result<TriggerResponse> {
    TriggerClient::connect_to(path)?.request(req)
}

/// Listening socket owned by the daemon
pub struct TriggerServer {
    listener: UnixListener,
    socket_path: PathBuf,
    hotkey: Option<HotkeySpec>,
}

impl TriggerServer {
    /// Bind to `socket_path`, replacing a socket left behind by a dead daemon.
    ///
    /// Fails if another daemon still answers on it.
    pub fn bind_to(socket_path: PathBuf) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create socket directory: {}", parent.display())
            })?;
        }

        if socket_path.exists() {
            if UnixStream::connect(&socket_path).is_ok() {
                bail!(
                    "snipcycle is already running (socket {})",
                    socket_path.display()
                );
            }
            debug!(path = %socket_path.display(), "Removing stale socket");
            std::fs::remove_file(&socket_path).with_context(|| {
                format!("Failed to remove stale socket: {}", socket_path.display())
            })?;
        }

        let listener = UnixListener::bind(&socket_path)
            .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o700))
                .context("Failed to set socket permissions")?;
        }

        Ok(Self {
            listener,
            socket_path,
            hotkey: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.socket_path
    }

    /// Serve requests on a background thread, forwarding events to `events`.
    ///
    /// The thread ends once the owner drops its receiver.
    pub fn spawn_listener(&self, events: Sender<CoreEvent>) -> Result<JoinHandle<()>> {
        let listener = self
            .listener
            .try_clone()
            .context("Failed to clone trigger socket")?;

        thread::Builder::new()
            .name("trigger-listener".into())
            .spawn(move || serve(listener, events))
            .context("Failed to spawn trigger listener thread")
    }
}

impl TriggerSource for TriggerServer {
    fn register(&mut self, hotkey: &HotkeySpec) -> Result<()> {
        info!(
            hotkey = %hotkey,
            socket = %self.socket_path.display(),
            "Hotkey registered; bind it to `snipcycle trigger` in your desktop shortcuts"
        );
        self.hotkey = Some(hotkey.clone());
        Ok(())
    }

    fn unregister(&mut self) {
        if let Some(hotkey) = self.hotkey.take() {
            info!(hotkey = %hotkey, "Hotkey unregistered");
        }
    }

    fn registered(&self) -> Option<&HotkeySpec> {
        self.hotkey.as_ref()
    }
}

impl Drop for TriggerServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn serve(listener: UnixListener, events: Sender<CoreEvent>) {
    for stream in listener.incoming() {
        let mut stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!(error = %e, "Failed to accept trigger connection");
                continue;
            }
        };

        match handle_connection(&mut stream, &events) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Owner gone, trigger listener exiting");
                return;
            }
            // Liveness probes connect and hang up without a request
            Err(e) => debug!(error = %format!("{:#}", e), "Dropped trigger connection"),
        }
    }
}

/// Answer one request. Returns false once the owner is no longer listening.
fn handle_connection(stream: &mut UnixStream, events: &Sender<CoreEvent>) -> Result<bool> {
    stream
        .set_read_timeout(Some(READ_TIMEOUT))
        .context("Failed to set socket timeout")?;
    let req: TriggerRequest = read_message(stream)?;
    debug!(request = ?req, "Trigger request");

    let (response, owner_alive) = match req.event() {
        None => (TriggerResponse::Pong, true),
        Some(event) => match events.send(event) {
            Ok(()) => (TriggerResponse::Accepted, true),
            Err(_) => (TriggerResponse::Error("snipcycle is shutting down".into()), false),
        },
    };
    write_message(stream, &response)?;
    Ok(owner_alive)
}

/// Write length-prefixed message to stream
fn write_message<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;

    // Length prefix is u32 little-endian
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .context("Failed to write message length")?;
    stream
        .write_all(&json)
        .context("Failed to write message payload")?;
    stream.flush().context("Failed to flush stream")?;

    Ok(())
}

/// Read length-prefixed message from stream
fn read_message<R: Read, T: DeserializeOwned>(stream: &mut R) -> Result<T> {
    let mut len_bytes = [0u8; 4];
    stream
        .read_exact(&mut len_bytes)
        .context("Failed to read message length")?;
    let len = u32::from_le_bytes(len_bytes) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!(
            "Message too large: {} bytes (max {})",
            len,
            MAX_MESSAGE_SIZE
        ));
    }

    let mut buffer = vec![0u8; len];
    stream
        .read_exact(&mut buffer)
        .context("Failed to read message payload")?;

    serde_json::from_slice(&buffer).context("Failed to deserialize message")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use tempfile::TempDir;

    #[test]
    fn test_message_framing() {
        let (mut a, mut b) = UnixStream::pair().unwrap();
        write_message(&mut a, &TriggerRequest::Reload).unwrap();
        let got: TriggerRequest = read_message(&mut b).unwrap();
        assert_eq!(got, TriggerRequest::Reload);

        write_message(&mut b, &TriggerResponse::Error("nope".into())).unwrap();
        let got: TriggerResponse = read_message(&mut a).unwrap();
        assert_eq!(got, TriggerResponse::Error("nope".into()));
    }

    #[test]
    fn test_oversized_message_rejected() {
        let mut bytes = ((MAX_MESSAGE_SIZE + 1) as u32).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"{}");
        let result: Result<TriggerRequest> = read_message(&mut bytes.as_slice());
        assert!(result.unwrap_err().to_string().contains("too large"));
    }

    #[test]
    fn test_requests_reach_owner_queue() {
        let temp_dir = TempDir::new().unwrap();
        let socket = temp_dir.path().join("trigger.sock");
        let server = TriggerServer::bind_to(socket.clone()).unwrap();
        let (tx, rx) = mpsc::channel();
        let _listener = server.spawn_listener(tx).unwrap();

        assert_eq!(
            send_request(&socket, TriggerRequest::Ping).unwrap(),
            TriggerResponse::Pong
        );
        assert_eq!(
            send_request(&socket, TriggerRequest::Trigger).unwrap(),
            TriggerResponse::Accepted
        );
        assert_eq!(
            send_request(&socket, TriggerRequest::Shutdown).unwrap(),
            TriggerResponse::Accepted
        );

        // Ping never reaches the owner
        assert_eq!(rx.recv().unwrap(), CoreEvent::Trigger);
        assert_eq!(rx.recv().unwrap(), CoreEvent::Shutdown);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_second_daemon_refused_and_socket_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let socket = temp_dir.path().join("trigger.sock");
        let server = TriggerServer::bind_to(socket.clone()).unwrap();

        let err = TriggerServer::bind_to(socket.clone()).err().unwrap();
        assert!(err.to_string().contains("already running"));

        drop(server);
        assert!(!socket.exists());
    }

    #[test]
    fn test_stale_socket_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        let socket = temp_dir.path().join("trigger.sock");
        {
            // Bound then dropped without cleanup, like a crashed daemon
            let listener = UnixListener::bind(&socket).unwrap();
            drop(listener);
        }
        assert!(socket.exists());
        assert!(TriggerServer::bind_to(socket).is_ok());
    }

    #[test]
    fn test_register_tracks_hotkey() {
        let temp_dir = TempDir::new().unwrap();
        let mut server = TriggerServer::bind_to(temp_dir.path().join("t.sock")).unwrap();
        let hotkey: HotkeySpec = "ctrl+shift+v".parse().unwrap();

        server.register(&hotkey).unwrap();
        assert_eq!(server.registered(), Some(&hotkey));
        server.unregister();
        assert!(server.registered().is_none());
    }
}
