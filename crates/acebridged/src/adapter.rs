//! SHDR Adapter - TCP server that streams observations to MTConnect agents.
//!
//! Values are written through the [`Transport`] trait in batches. A batch is
//! staged until `end_batch`, then committed and broadcast as a single frame,
//! so an agent sees either all of a batch or none of it.

use acebridge_common::shdr;
use acebridge_common::{ObservationSet, ObservationValue};
use chrono::Utc;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Frames buffered per agent before it is considered lagging
const FRAME_BUFFER: usize = 64;

/// Adapter startup errors
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Failed to bind adapter on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Batch publishing interface used by the polling loop
pub trait Transport: Send {
    fn begin_batch(&mut self);
    fn set_value(&mut self, name: &str, value: ObservationValue);
    fn end_batch(&mut self);
}

#[derive(Debug)]
struct DataItem {
    name: &'static str,
    value: ObservationValue,
}

#[derive(Debug, Default)]
struct Registry {
    items: Vec<DataItem>,
    /// Staged (index, value) pairs of the open batch
    pending: Option<Vec<(usize, ObservationValue)>>,
}

impl Registry {
    fn index_of(&self, name: &str) -> Option<usize> {
        self.items.iter().position(|item| item.name == name)
    }

    /// Apply staged values, returning the indices that actually changed
    fn commit(&mut self, staged: Vec<(usize, ObservationValue)>) -> Vec<usize> {
        let mut changed = Vec::new();
        for (index, value) in staged {
            let item = &mut self.items[index];
            if item.value != value {
                item.value = value;
                if !changed.contains(&index) {
                    changed.push(index);
                }
            }
        }
        changed.sort_unstable();
        changed
    }

    fn frame_for(&self, indices: &[usize]) -> Option<String> {
        shdr::frame(
            Utc::now(),
            indices
                .iter()
                .map(|&i| (self.items[i].name, &self.items[i].value)),
        )
    }

    fn snapshot(&self) -> Option<String> {
        shdr::frame(
            Utc::now(),
            self.items.iter().map(|item| (item.name, &item.value)),
        )
    }
}

struct Shared {
    registry: Mutex<Registry>,
    frames: broadcast::Sender<String>,
    heartbeat: Duration,
}

impl Shared {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot and subscribe atomically with respect to commits
    fn attach(&self) -> (Option<String>, broadcast::Receiver<String>) {
        let registry = self.registry();
        (registry.snapshot(), self.frames.subscribe())
    }

    /// Replace a lagging receiver and return a snapshot consistent with it
    fn resync(&self, frames: &mut broadcast::Receiver<String>) -> Option<String> {
        let (snapshot, fresh) = self.attach();
        *frames = fresh;
        snapshot
    }
}

/// A bound, not yet serving, adapter
pub struct Adapter {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Adapter {
    /// Bind the agent-facing listener with a fixed set of data items
    pub async fn bind(
        addr: &str,
        observations: &ObservationSet,
        heartbeat: Duration,
    ) -> Result<Self, AdapterError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| AdapterError::Bind {
                addr: addr.to_string(),
                source,
            })?;

        let items = observations
            .iter()
            .map(|o| DataItem {
                name: o.name,
                value: o.value.clone(),
            })
            .collect();

        let (frames, _) = broadcast::channel(FRAME_BUFFER);

        Ok(Self {
            listener,
            shared: Arc::new(Shared {
                registry: Mutex::new(Registry {
                    items,
                    pending: None,
                }),
                frames,
                heartbeat,
            }),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Handle for publishing values
    pub fn handle(&self) -> AdapterHandle {
        AdapterHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Start accepting agent connections in the background
    pub fn start(self) -> JoinHandle<()> {
        if let Ok(addr) = self.listener.local_addr() {
            info!("SHDR adapter listening on {}", addr);
        }
        tokio::spawn(accept_loop(self.listener, self.shared))
    }
}

async fn accept_loop(listener: TcpListener, shared: Arc<Shared>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                info!("Agent connected from {}", peer);
                let shared = Arc::clone(&shared);
                tokio::spawn(async move {
                    if let Err(e) = serve_agent(stream, shared).await {
                        warn!("Agent {} connection error: {}", peer, e);
                    }
                    info!("Agent {} disconnected", peer);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Stream frames to one agent and answer its heartbeats
async fn serve_agent(stream: TcpStream, shared: Arc<Shared>) -> std::io::Result<()> {
    let (snapshot, mut frames) = shared.attach();
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    if let Some(snapshot) = snapshot {
        writer.write_all(snapshot.as_bytes()).await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) if shdr::is_ping(&line) => {
                        writer.write_all(shdr::pong(shared.heartbeat).as_bytes()).await?;
                    }
                    Some(line) => debug!("Ignoring agent line: {}", line.trim_end()),
                    None => break,
                }
            }
            frame = frames.recv() => {
                match frame {
                    Ok(frame) => writer.write_all(frame.as_bytes()).await?,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("Agent lagged by {} frames, resending snapshot", missed);
                        if let Some(snapshot) = shared.resync(&mut frames) {
                            writer.write_all(snapshot.as_bytes()).await?;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    Ok(())
}

/// Publishing side of the adapter
#[derive(Clone)]
pub struct AdapterHandle {
    shared: Arc<Shared>,
}

impl AdapterHandle {
    /// Number of agents currently subscribed
    pub fn agent_count(&self) -> usize {
        self.shared.frames.receiver_count()
    }

    /// Committed value of a data item
    pub fn value(&self, name: &str) -> Option<ObservationValue> {
        let registry = self.shared.registry();
        let index = registry.index_of(name)?;
        Some(registry.items[index].value.clone())
    }

    fn commit(&self, registry: &mut Registry, staged: Vec<(usize, ObservationValue)>) {
        let changed = registry.commit(staged);
        if let Some(frame) = registry.frame_for(&changed) {
            // Err only means no agent is connected
            let _ = self.shared.frames.send(frame);
        }
    }
}

impl Transport for AdapterHandle {
    fn begin_batch(&mut self) {
        let mut registry = self.shared.registry();
        if registry.pending.is_some() {
            warn!("Batch already open, discarding staged values");
        }
        registry.pending = Some(Vec::new());
    }

    fn set_value(&mut self, name: &str, value: ObservationValue) {
        let mut registry = self.shared.registry();
        let Some(index) = registry.index_of(name) else {
            warn!("Ignoring unknown data item: {}", name);
            return;
        };

        if let Some(pending) = registry.pending.as_mut() {
            pending.push((index, value));
            return;
        }
        self.commit(&mut registry, vec![(index, value)]);
    }

    fn end_batch(&mut self) {
        let mut registry = self.shared.registry();
        match registry.pending.take() {
            Some(staged) => self.commit(&mut registry, staged),
            None => warn!("end_batch called without begin_batch"),
        }
    }
}
