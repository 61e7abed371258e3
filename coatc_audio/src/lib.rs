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

//! the voice path: one upstream connection per ATC frequency, decoded to
//! canonical PCM (signed 16 bit little endian) and fanned out to any number
//! of listeners plus the transcription branch.

use std::{collections::HashMap, sync::{Arc,RwLock}, time::Duration};
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};

use coatc_common::datetime::{deserialize_duration,serialize_duration};

pub mod fanout;
pub mod upstream;
pub mod wav;
pub mod chunker;
pub mod errors;

use fanout::FanoutBuffer;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum FrequencyStatus {
    Connecting,
    Active,
    Error,
}

/// one monitored ATC channel
#[derive(Debug,Clone,Serialize)]
pub struct Frequency {
    pub id: String,
    pub airport: String,
    pub name: String,
    pub frequency_mhz: f64,
    pub url: String,
    pub status: FrequencyStatus,
    #[serde(skip_serializing_if="Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub bitrate: Option<u32>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub format: Option<String>,
    pub stream_url: String,
    #[serde(skip_serializing_if="Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    pub order: i32,
    pub transcribe_audio: bool,
}

/// one frequency entry of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct FrequencyConfig {
    pub id: String,
    pub airport: String,
    pub name: String,
    pub frequency_mhz: f64,
    pub url: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub transcribe_audio: bool,
}

/// audio section of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub connect_timeout: Duration,
    pub max_connect_retries: u32,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub retry_initial_delay: Duration,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub reconnect_interval: Duration,

    pub ffmpeg_path: String,
    pub ffmpeg_sample_rate: u32,
    pub ffmpeg_channels: u32,

    pub fanout_capacity: usize,
}

impl Default for AudioConfig {
    fn default () -> Self {
        AudioConfig {
            connect_timeout: Duration::from_secs(30),
            max_connect_retries: 3,
            retry_initial_delay: Duration::from_secs(1),
            reconnect_interval: Duration::from_secs(10),
            ffmpeg_path: "ffmpeg".to_string(),
            ffmpeg_sample_rate: 24_000,
            ffmpeg_channels: 1,
            fanout_capacity: fanout::DEFAULT_CAPACITY,
        }
    }
}

struct FrequencyEntry {
    frequency: Frequency,
    fanout: Arc<FanoutBuffer>,
}

/// registry of configured frequencies and their fanout buffers. Frequencies
/// are created at startup and never destroyed while the process runs.
pub struct FrequencyManager {
    entries: RwLock<HashMap<String,FrequencyEntry>>,
    order: Vec<String>,
}

impl FrequencyManager {
    pub fn new (configs: &[FrequencyConfig], fanout_capacity: usize) -> Self {
        let mut entries = HashMap::with_capacity( configs.len());
        let mut ordered: Vec<(i32,String)> = Vec::with_capacity( configs.len());

        for cfg in configs {
            let frequency = Frequency {
                id: cfg.id.clone(),
                airport: cfg.airport.clone(),
                name: cfg.name.clone(),
                frequency_mhz: cfg.frequency_mhz,
                url: cfg.url.clone(),
                status: FrequencyStatus::Connecting,
                last_error: None,
                bitrate: None,
                format: None,
                stream_url: format!("/api/v1/stream/{}", cfg.id),
                last_active: None,
                order: cfg.order,
                transcribe_audio: cfg.transcribe_audio,
            };
            let fanout = FanoutBuffer::with_capacity( fanout_capacity, fanout::DEFAULT_READ_TIMEOUT);
            ordered.push( (cfg.order, cfg.id.clone()));
            entries.insert( cfg.id.clone(), FrequencyEntry{ frequency, fanout });
        }

        ordered.sort();
        FrequencyManager {
            entries: RwLock::new(entries),
            order: ordered.into_iter().map(|(_,id)| id).collect(),
        }
    }

    /// all frequencies in display order
    pub fn get_all (&self) -> Vec<Frequency> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        self.order.iter().filter_map(|id| entries.get(id).map(|e| e.frequency.clone())).collect()
    }

    pub fn get (&self, id: &str) -> Option<Frequency> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).get(id).map(|e| e.frequency.clone())
    }

    pub fn fanout (&self, id: &str) -> Option<Arc<FanoutBuffer>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).get(id).map(|e| e.fanout.clone())
    }

    /// ids of frequencies with transcription enabled
    pub fn transcribe_enabled (&self) -> Vec<Frequency> {
        self.get_all().into_iter().filter(|f| f.transcribe_audio).collect()
    }

    pub fn set_status (&self, id: &str, status: FrequencyStatus, last_error: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            entry.frequency.status = status;
            entry.frequency.last_error = last_error;
            if status == FrequencyStatus::Active {
                entry.frequency.last_active = Some( coatc_common::datetime::utc_now());
            }
        }
    }

    pub fn set_stream_metadata (&self, id: &str, bitrate: Option<u32>, format: Option<String>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = entries.get_mut(id) {
            entry.frequency.bitrate = bitrate;
            entry.frequency.format = format;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configs () -> Vec<FrequencyConfig> {
        vec![
            FrequencyConfig { id: "twr".into(), airport: "CYYZ".into(), name: "Tower".into(),
                frequency_mhz: 118.7, url: "http://example/twr".into(), order: 2, transcribe_audio: true },
            FrequencyConfig { id: "gnd".into(), airport: "CYYZ".into(), name: "Ground".into(),
                frequency_mhz: 121.9, url: "http://example/gnd".into(), order: 1, transcribe_audio: false },
        ]
    }

    #[test]
    fn test_registry_order_and_lookup() {
        let mgr = FrequencyManager::new( &configs(), 1024);
        let all = mgr.get_all();
        assert_eq!( all.len(), 2);
        assert_eq!( all[0].id, "gnd", "display order follows the order field");
        assert_eq!( all[1].id, "twr");
        assert_eq!( mgr.get("twr").unwrap().stream_url, "/api/v1/stream/twr");
        assert!( mgr.get("nope").is_none());
    }

    #[test]
    fn test_transcribe_enabled_filter() {
        let mgr = FrequencyManager::new( &configs(), 1024);
        let enabled = mgr.transcribe_enabled();
        assert_eq!( enabled.len(), 1);
        assert_eq!( enabled[0].id, "twr");
    }

    #[test]
    fn test_status_transitions() {
        let mgr = FrequencyManager::new( &configs(), 1024);
        assert_eq!( mgr.get("twr").unwrap().status, FrequencyStatus::Connecting);

        mgr.set_status( "twr", FrequencyStatus::Active, None);
        let f = mgr.get("twr").unwrap();
        assert_eq!( f.status, FrequencyStatus::Active);
        assert!( f.last_active.is_some());

        mgr.set_status( "twr", FrequencyStatus::Error, Some("connection reset".into()));
        let f = mgr.get("twr").unwrap();
        assert_eq!( f.status, FrequencyStatus::Error);
        assert_eq!( f.last_error.as_deref(), Some("connection reset"));
    }
}
