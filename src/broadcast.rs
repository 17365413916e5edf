// Copyright 2025 coScene
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

// Connection registry and live fan-out
//
// Every open connection has a bounded outbound queue. Live frames go only to
// connections in the viewer group; server events go to everyone. Delivery is
// best effort: a full queue drops the message for that connection only.

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};

use crate::protocol::ServerEvent;
use crate::session::SessionId;

/// Message queued for one connection
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(Bytes),
    Event(ServerEvent),
}

struct Peer {
    tx: mpsc::Sender<Outbound>,
    live_viewer: bool,
}

pub struct Broadcaster {
    peers: DashMap<SessionId, Peer>,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            peers: DashMap::new(),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Register a connection and return the receiving end of its outbound queue
    pub fn connect(&self, id: &str) -> mpsc::Receiver<Outbound> {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        self.peers.insert(
            id.to_string(),
            Peer {
                tx,
                live_viewer: false,
            },
        );
        debug!("Connection '{}' registered ({} total)", id, self.peers.len());
        rx
    }

    pub fn disconnect(&self, id: &str) {
        if self.peers.remove(id).is_some() {
            debug!("Connection '{}' removed ({} left)", id, self.peers.len());
        }
    }

    /// Add a connection to the live viewer group
    pub fn subscribe(&self, id: &str) -> bool {
        match self.peers.get_mut(id) {
            Some(mut peer) => {
                peer.live_viewer = true;
                info!("Connection '{}' joined live view", id);
                true
            }
            None => false,
        }
    }

    pub fn is_live_viewer(&self, id: &str) -> bool {
        self.peers.get(id).map(|p| p.live_viewer).unwrap_or(false)
    }

    /// Send a frame to every live viewer; returns how many queues accepted it
    pub fn broadcast(&self, frame: Bytes) -> usize {
        let mut delivered = 0;
        for peer in self.peers.iter().filter(|p| p.live_viewer) {
            if Self::offer(peer.key(), &peer.tx, Outbound::Frame(frame.clone())) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Send a server event to every connection
    pub fn notify(&self, event: ServerEvent) -> usize {
        let mut delivered = 0;
        for peer in self.peers.iter() {
            if Self::offer(peer.key(), &peer.tx, Outbound::Event(event.clone())) {
                delivered += 1;
            }
        }
        delivered
    }

    fn offer(id: &str, tx: &mpsc::Sender<Outbound>, msg: Outbound) -> bool {
        match tx.try_send(msg) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                trace!("Outbound queue full for '{}', message dropped", id);
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Connections that are not live viewers, i.e. the ones that may record
    pub fn recording_candidates(&self) -> Vec<SessionId> {
        self.peers
            .iter()
            .filter(|p| !p.live_viewer)
            .map(|p| p.key().clone())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.peers.len()
    }

    pub fn viewer_count(&self) -> usize {
        self.peers.iter().filter(|p| p.live_viewer).count()
    }
}
