//! Push channel: a typed invalidation hub and the TCP stream that feeds it.
//!
//! Frames carry an event name and optional data. Only the name matters here;
//! subscribers receive a data-less [`Invalidation`] and refetch on their own.
//!
//! ```text
//! backend ──TCP, one JSON frame per line──▶ PushStream ──dispatch()──▶ PushHub
//!                                                                      │
//!                                    Receiver<Invalidation> ◀──────────┘
//! ```

use dispatch_protocol::{parse_push_frame, SocketEvent, MAX_FRAME_BYTES};
use std::collections::HashMap;
use std::io::{ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, Weak};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::backoff::ReconnectBackoff;
use crate::error::{DispatchError, Result};

const READ_CHUNK_SIZE: usize = 4096;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// How often a blocked reader wakes up to check for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// "Something named `event` changed on the server." Carries no data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Invalidation {
    pub event: SocketEvent,
}

type Subscribers = HashMap<SocketEvent, Vec<(u64, Sender<Invalidation>)>>;

#[derive(Default)]
struct HubInner {
    subscribers: Mutex<Subscribers>,
    next_id: AtomicU64,
}

/// Fan-out of push events to any number of receivers. Clones share the same
/// subscriber table.
#[derive(Clone, Default)]
pub struct PushHub {
    inner: Arc<HubInner>,
}

impl std::fmt::Debug for PushHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<SocketEvent, usize> = self
            .inner
            .subscribers
            .lock()
            .map(|subscribers| {
                subscribers
                    .iter()
                    .map(|(event, senders)| (*event, senders.len()))
                    .collect()
            })
            .unwrap_or_default();
        f.debug_struct("PushHub").field("subscribers", &counts).finish()
    }
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `event`. Signals arrive on the receiver until the
    /// returned handle is dropped.
    pub fn subscribe(&self, event: SocketEvent) -> (PushSubscription, Receiver<Invalidation>) {
        let (sender, receiver) = mpsc::channel();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(event)
            .or_default()
            .push((id, sender));
        let subscription = PushSubscription {
            id,
            event,
            hub: Arc::downgrade(&self.inner),
        };
        (subscription, receiver)
    }

    /// Signals every subscriber of `event`; returns how many were reached.
    pub fn dispatch(&self, event: SocketEvent) -> usize {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(senders) = subscribers.get_mut(&event) else {
            return 0;
        };
        senders.retain(|(_, sender)| sender.send(Invalidation { event }).is_ok());
        senders.len()
    }

    /// Dispatches by wire name. Names outside the registry are ignored.
    pub fn dispatch_name(&self, name: &str) -> usize {
        match name.parse::<SocketEvent>() {
            Ok(event) => self.dispatch(event),
            Err(_) => {
                debug!(event = %name, "Ignoring unknown push event");
                0
            }
        }
    }

    pub fn subscriber_count(&self, event: SocketEvent) -> usize {
        self.inner
            .subscribers
            .lock()
            .map(|subscribers| subscribers.get(&event).map_or(0, Vec::len))
            .unwrap_or(0)
    }
}

pub struct PushSubscription {
    id: u64,
    event: SocketEvent,
    hub: Weak<HubInner>,
}

impl PushSubscription {
    pub fn event(&self) -> SocketEvent {
        self.event
    }
}

impl Drop for PushSubscription {
    fn drop(&mut self) {
        let Some(inner) = self.hub.upgrade() else {
            return;
        };
        if let Ok(mut subscribers) = inner.subscribers.lock() {
            if let Some(senders) = subscribers.get_mut(&self.event) {
                senders.retain(|(id, _)| *id != self.id);
                if senders.is_empty() {
                    subscribers.remove(&self.event);
                }
            }
        };
    }
}

/// Background reader for the backend's push endpoint.
///
/// Connects on a dedicated thread, dispatches every frame's event name into
/// the hub, and reconnects with backoff until [`PushStream::shutdown`].
pub struct PushStream {
    addr: String,
    stop: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PushStream {
    pub fn connect(addr: impl Into<String>, hub: PushHub, backoff: ReconnectBackoff) -> Result<Self> {
        let addr = addr.into();
        let stop = Arc::new(AtomicBool::new(false));
        let connected = Arc::new(AtomicBool::new(false));

        let worker = Worker {
            addr: addr.clone(),
            hub,
            backoff,
            stop: Arc::clone(&stop),
            connected: Arc::clone(&connected),
        };
        let handle = thread::Builder::new()
            .name("dispatch-push".to_string())
            .spawn(move || worker.run())
            .map_err(|source| DispatchError::Io {
                context: "spawning push reader".to_string(),
                source,
            })?;

        Ok(Self {
            addr,
            stop,
            connected,
            handle: Some(handle),
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Stops the reader and waits for it to exit.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!(addr = %self.addr, "Push reader thread panicked");
            }
        }
    }
}

impl Drop for PushStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Worker {
    addr: String,
    hub: PushHub,
    backoff: ReconnectBackoff,
    stop: Arc<AtomicBool>,
    connected: Arc<AtomicBool>,
}

impl Worker {
    fn run(mut self) {
        while !self.stopped() {
            match open(&self.addr) {
                Ok(mut stream) => {
                    info!(addr = %self.addr, "Push channel connected");
                    self.backoff.reset();
                    self.connected.store(true, Ordering::SeqCst);
                    let result = self.read_frames(&mut stream);
                    self.connected.store(false, Ordering::SeqCst);
                    match result {
                        Ok(()) if self.stopped() => break,
                        Ok(()) => info!(addr = %self.addr, "Push channel closed by server"),
                        Err(err) => warn!(addr = %self.addr, error = %err, "Push channel dropped"),
                    }
                }
                Err(err) => {
                    debug!(
                        addr = %self.addr,
                        failures = self.backoff.failures(),
                        error = %err,
                        "Push channel connect failed"
                    );
                }
            }

            let delay = self.backoff.next_delay();
            self.sleep(delay);
        }
        debug!(addr = %self.addr, "Push reader stopped");
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Sleeps up to `delay`, waking early on shutdown.
    fn sleep(&self, delay: Duration) {
        let deadline = Instant::now() + delay;
        while !self.stopped() {
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Reads newline-delimited frames until EOF, an error, or shutdown.
    fn read_frames(&self, stream: &mut TcpStream) -> Result<()> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        while !self.stopped() {
            let n = match stream.read(&mut chunk) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    continue;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(DispatchError::Io {
                        context: format!("reading push channel {}", self.addr),
                        source,
                    })
                }
            };
            buffer.extend_from_slice(&chunk[..n]);

            while let Some(index) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=index).collect();
                self.handle_line(&line[..index]);
            }
            if buffer.len() > MAX_FRAME_BYTES {
                return Err(DispatchError::Push(format!(
                    "frame exceeded {} bytes without a newline",
                    MAX_FRAME_BYTES
                )));
            }
        }
        Ok(())
    }

    fn handle_line(&self, line: &[u8]) {
        if line.iter().all(u8::is_ascii_whitespace) {
            return;
        }
        match parse_push_frame(line) {
            Ok(frame) => {
                let reached = self.hub.dispatch_name(&frame.event);
                debug!(event = %frame.event, reached, "Push event");
            }
            Err(err) => warn!(code = %err.code, error = %err.message, "Skipping bad push frame"),
        }
    }
}

fn open(addr: &str) -> Result<TcpStream> {
    let io_err = |source| DispatchError::Io {
        context: format!("connecting to push channel {}", addr),
        source,
    };
    let socket_addr = addr
        .to_socket_addrs()
        .map_err(io_err)?
        .next()
        .ok_or_else(|| DispatchError::Push(format!("{} did not resolve", addr)))?;
    let stream = TcpStream::connect_timeout(&socket_addr, CONNECT_TIMEOUT).map_err(io_err)?;
    stream.set_read_timeout(Some(POLL_INTERVAL)).map_err(io_err)?;
    Ok(stream)
}
