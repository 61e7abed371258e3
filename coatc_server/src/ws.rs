/*
 * Copyright © 2025, United States Government, as represented by the Administrator of
 * the National Aeronautics and Space Administration. All rights reserved.
 *
 * The “ODIN” software is licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License. You may obtain a copy
 * of the License at http://www.apache.org/licenses/LICENSE-2.0.
 *
 * Unless required by applicable law or agreed to in writing, software distributed under
 * the License is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
 * either express or implied. See the License for the specific language governing permissions
 * and limitations under the License.
 */
#![allow(unused)]

//! the change-broadcast hub. One task owns the client map and is fed hub
//! commands over a channel; each connected client has a bounded outbound
//! queue drained by its own writer task. A client whose queue is full is
//! disconnected - the producers are never slowed down.

use std::{collections::HashMap, sync::{Arc,atomic::{AtomicU64,Ordering}}, time::Duration};
use axum::extract::ws::{Message,WebSocket};
use futures::{SinkExt,StreamExt};
use serde::{Serialize,Deserialize};
use serde_json::{json,Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug,info,warn};

use coatc_adsb::tracker::Tracker;
use coatc_common::events::{Broadcaster,Envelope};

const HUB_QUEUE_SIZE: usize = 1024;
const WRITE_DEADLINE: Duration = Duration::from_secs(10);

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// per-client visibility filters, updated via `filter_update`
#[derive(Debug,Clone,Default,Serialize,Deserialize)]
#[serde(default)]
pub struct ClientFilters {
    pub min_altitude: Option<f64>,
    pub max_altitude: Option<f64>,
    pub phases: Option<Vec<String>>,
    pub search: Option<String>,
}

impl ClientFilters {
    /// server-side event filtering. Only aircraft body events are filtered;
    /// removals and the other families always pass.
    pub fn passes (&self, event: &Envelope) -> bool {
        match event.msg_type.as_str() {
            "aircraft_added" | "aircraft_update" => self.aircraft_passes( &event.data),
            _ => true,
        }
    }

    fn aircraft_passes (&self, ac: &Value) -> bool {
        let altitude = ac.pointer( "/adsb/alt_baro").and_then(Value::as_f64).unwrap_or(0.0);
        if let Some(min) = self.min_altitude {
            if altitude < min { return false }
        }
        if let Some(max) = self.max_altitude {
            if altitude > max { return false }
        }

        if let Some(phases) = &self.phases {
            let current = ac.pointer( "/phase/current").and_then(Value::as_str).unwrap_or("");
            if !phases.iter().any(|p| p == current) { return false }
        }

        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            if !needle.is_empty() {
                let mut haystacks = Vec::with_capacity(3);
                for key in ["hex", "flight", "tail_number"] {
                    if let Some(s) = ac.get(key).and_then(Value::as_str) {
                        haystacks.push( s.to_lowercase());
                    }
                }
                if !haystacks.iter().any(|h| h.contains( &needle)) { return false }
            }
        }

        true
    }
}

enum HubCmd {
    Register { id: u64, queue: mpsc::Sender<String> },
    Deregister { id: u64 },
    Broadcast { event: Envelope },
    SetFilters { id: u64, filters: ClientFilters },
    BulkRequest { id: u64, filters: ClientFilters },
}

struct ClientState {
    queue: mpsc::Sender<String>,
    filters: ClientFilters,
}

/// handle to the hub task; cheap to clone, implements `Broadcaster`
#[derive(Clone)]
pub struct WsHub {
    cmd_tx: mpsc::Sender<HubCmd>,
}

impl WsHub {
    /// spawn the hub task. The tracker is consulted for bulk snapshots.
    pub fn spawn (tracker: Arc<Tracker>) -> (WsHub, JoinHandle<()>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel( HUB_QUEUE_SIZE);

        let task = tokio::spawn( async move {
            let mut clients: HashMap<u64,ClientState> = HashMap::new();

            while let Some(cmd) = cmd_rx.recv().await {
                match cmd {
                    HubCmd::Register { id, queue } => {
                        debug!("ws client {id} registered");
                        clients.insert( id, ClientState{ queue, filters: ClientFilters::default() });
                    }
                    HubCmd::Deregister { id } => {
                        debug!("ws client {id} deregistered");
                        clients.remove( &id);
                    }
                    HubCmd::SetFilters { id, filters } => {
                        if let Some(client) = clients.get_mut( &id) {
                            client.filters = filters;
                        }
                    }
                    HubCmd::Broadcast { event } => {
                        let mut dropped: Vec<u64> = Vec::new();
                        for (id, client) in &clients {
                            if !client.filters.passes( &event) {
                                continue;
                            }
                            let Ok(payload) = serde_json::to_string( &event) else { continue };
                            if client.queue.try_send( payload).is_err() {
                                // full or closed either way: drop the client, never the producer
                                warn!("ws client {id} cannot keep up, disconnecting");
                                dropped.push( *id);
                            }
                        }
                        for id in dropped {
                            clients.remove( &id);
                        }
                    }
                    HubCmd::BulkRequest { id, filters } => {
                        let aircraft: Vec<Value> = tracker.get_all().iter()
                            .filter_map(|ac| serde_json::to_value(ac).ok())
                            .filter(|v| filters.aircraft_passes(v))
                            .collect();
                        let response = Envelope::new( "aircraft_bulk_response", json!({
                            "timestamp": coatc_common::datetime::utc_now(),
                            "count": aircraft.len(),
                            "aircraft": aircraft,
                        }));
                        let failed = match (clients.get( &id), serde_json::to_string( &response)) {
                            (Some(client), Ok(payload)) => client.queue.try_send( payload).is_err(),
                            _ => false,
                        };
                        if failed {
                            warn!("ws client {id} cannot keep up, disconnecting");
                            clients.remove( &id);
                        }
                    }
                }
            }
        });

        (WsHub{ cmd_tx }, task)
    }

    async fn send (&self, cmd: HubCmd) {
        let _ = self.cmd_tx.send(cmd).await;
    }
}

impl Broadcaster for WsHub {
    fn broadcast (&self, event: Envelope) {
        // producers never block; if the hub itself is saturated the event is dropped
        if self.cmd_tx.try_send( HubCmd::Broadcast{ event }).is_err() {
            warn!("hub command queue full, dropping event");
        }
    }
}

/// serve one upgraded websocket connection: a writer task drains the bounded
/// queue with a per-message deadline, the reader dispatches client requests
pub async fn serve_client (socket: WebSocket, hub: WsHub, queue_size: usize) {
    let id = NEXT_CLIENT_ID.fetch_add( 1, Ordering::Relaxed);
    let (queue_tx, mut queue_rx) = mpsc::channel::<String>( queue_size);
    hub.send( HubCmd::Register{ id, queue: queue_tx }).await;

    let (mut ws_tx, mut ws_rx) = socket.split();

    let writer = tokio::spawn( async move {
        while let Some(payload) = queue_rx.recv().await {
            let send = ws_tx.send( Message::Text(payload));
            match tokio::time::timeout( WRITE_DEADLINE, send).await {
                Ok(Ok(())) => {}
                _ => break, // write failed or deadline blown - connection is done
            }
        }
    });

    while let Some(Ok(msg)) = ws_rx.next().await {
        let Message::Text(text) = msg else { continue };
        let Ok(envelope) = serde_json::from_str::<Envelope>( &text) else {
            debug!("ws client {id} sent unparsable message");
            continue;
        };
        match envelope.msg_type.as_str() {
            "filter_update" => {
                let filters = parse_filters( &envelope.data);
                hub.send( HubCmd::SetFilters{ id, filters }).await;
            }
            "aircraft_bulk_request" => {
                let filters = parse_filters( &envelope.data);
                hub.send( HubCmd::BulkRequest{ id, filters }).await;
            }
            other => debug!("ws client {id} sent unknown message type {other}"),
        }
    }

    hub.send( HubCmd::Deregister{ id }).await;
    writer.abort();
}

fn parse_filters (data: &Value) -> ClientFilters {
    data.get( "filters")
        .or( Some(data))
        .and_then(|v| serde_json::from_value( v.clone()).ok())
        .unwrap_or_default()
}
