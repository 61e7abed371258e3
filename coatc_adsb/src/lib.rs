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

//! the surveillance path: source client, aircraft table with per-aircraft
//! flight phase state machine, change detection and future position
//! prediction. The tracker task is the only writer of the aircraft table -
//! everything else reads cloned snapshots.

use std::{collections::VecDeque, fmt, sync::Arc, time::Duration};
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};

use coatc_common::{
    collections::push_to_ringbuffer,
    datetime::{deserialize_duration,serialize_duration},
    geo::{GeoPos,PredictedPosition},
};

pub mod client;
pub mod phase;
pub mod tracker;
pub mod change_detector;
pub mod errors;

use crate::errors::Result;

/// where a raw record came from
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize,Default)]
#[serde(rename_all="lowercase")]
pub enum SourceType {
    #[default]
    Local,
    External,
}

/// flight phase labels as shown on frequency strips
#[derive(Debug,Clone,Copy,PartialEq,Eq,Hash,Serialize,Deserialize)]
pub enum Phase {
    #[serde(rename="NEW")] New,
    #[serde(rename="TAX")] Tax,
    #[serde(rename="T/O")] Takeoff,
    #[serde(rename="DEP")] Departure,
    #[serde(rename="CRZ")] Cruise,
    #[serde(rename="ARR")] Arrival,
    #[serde(rename="APP")] Approach,
    #[serde(rename="T/D")] Touchdown,
}

impl fmt::Display for Phase {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::New => "NEW", Phase::Tax => "TAX", Phase::Takeoff => "T/O", Phase::Departure => "DEP",
            Phase::Cruise => "CRZ", Phase::Arrival => "ARR", Phase::Approach => "APP", Phase::Touchdown => "T/D",
        };
        f.write_str(s)
    }
}

/// gap-driven visibility status. Transitions within one continuous gap are
/// monotonic: active -> stale -> signal_lost -> (purged)
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="snake_case")]
pub enum AircraftStatus {
    Active,
    Stale,
    SignalLost,
}

impl fmt::Display for AircraftStatus {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AircraftStatus::Active => "active",
            AircraftStatus::Stale => "stale",
            AircraftStatus::SignalLost => "signal_lost",
        };
        f.write_str(s)
    }
}

/// one appended phase transition
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct PhaseChange {
    pub phase: Phase,
    pub entered_at: DateTime<Utc>,
}

/// current phase plus its bounded, append-only history
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct PhaseData {
    pub current: Phase,
    pub history: VecDeque<PhaseChange>,
}

impl PhaseData {
    pub fn new (entered_at: DateTime<Utc>, max_history: usize) -> Self {
        let mut history = VecDeque::with_capacity(max_history);
        history.push_back( PhaseChange{ phase: Phase::New, entered_at });
        PhaseData { current: Phase::New, history }
    }

    pub fn last_transition (&self) -> Option<&PhaseChange> { self.history.back() }

    pub fn push (&mut self, phase: Phase, entered_at: DateTime<Utc>, max_history: usize) {
        self.current = phase;
        push_to_ringbuffer( &mut self.history, PhaseChange{ phase, entered_at }, max_history);
    }
}

/// last observed kinematics (sensor validated)
#[derive(Debug,Clone,PartialEq,Serialize,Deserialize)]
pub struct AdsbData {
    pub lat: f64,
    pub lon: f64,
    pub alt_baro: f64,       // ft
    pub gs: f64,             // kt
    pub tas: f64,            // kt
    pub track: f64,          // deg
    pub track_rate: f64,     // deg/s
    pub mag_heading: f64,    // deg
    pub true_heading: f64,   // deg
    pub baro_rate: f64,      // ft/min
    #[serde(skip_serializing_if="Option::is_none")]
    pub squawk: Option<String>,
}

impl AdsbData {
    /// the heading used for geometry checks - true heading if reported,
    /// else track, else magnetic heading
    pub fn effective_heading (&self) -> f64 {
        if self.true_heading != 0.0 { self.true_heading }
        else if self.track != 0.0 { self.track }
        else { self.mag_heading }
    }

    /// TAS with GS fallback, the speed used for phase thresholds
    pub fn effective_speed (&self) -> f64 {
        if self.tas != 0.0 { self.tas } else { self.gs }
    }
}

/// one trail sample
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct TrailPoint {
    pub lat: f64,
    pub lon: f64,
    pub alt_baro: f64,
    pub timestamp: DateTime<Utc>,
}

/// the tracked state of one airframe, keyed by its immutable ICAO hex
#[derive(Debug,Clone,Serialize)]
pub struct Aircraft {
    pub hex: String,
    #[serde(skip_serializing_if="Option::is_none")]
    pub flight: Option<String>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub tail_number: Option<String>,
    pub adsb: Option<AdsbData>,
    pub on_ground: bool,
    #[serde(skip_serializing_if="Option::is_none")]
    pub distance_nm: Option<f64>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub bearing_from_station: Option<f64>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub bearing_to_station: Option<f64>,
    pub status: AircraftStatus,
    pub phase: PhaseData,
    #[serde(skip_serializing_if="Option::is_none")]
    pub takeoff_time: Option<DateTime<Utc>>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub source_type: SourceType,
    pub future_positions: Vec<PredictedPosition>,

    // the trail is served by its own endpoint, not carried in events
    #[serde(skip)]
    pub trail: VecDeque<TrailPoint>,
    // pending cruise classification window (DEP -> CRZ hold)
    #[serde(skip)]
    pub cruise_since: Option<DateTime<Utc>>,
}

impl Aircraft {
    pub fn new (hex: String, now: DateTime<Utc>, max_phase_history: usize) -> Self {
        let tail_number = coatc_common::registration::icao_to_tail( &hex).ok();
        Aircraft {
            hex,
            flight: None,
            tail_number,
            adsb: None,
            on_ground: true,
            distance_nm: None,
            bearing_from_station: None,
            bearing_to_station: None,
            status: AircraftStatus::Active,
            phase: PhaseData::new( now, max_phase_history),
            takeoff_time: None,
            first_seen: now,
            last_seen: now,
            source_type: SourceType::Local,
            future_positions: Vec::new(),
            trail: VecDeque::new(),
            cruise_since: None,
        }
    }
}

/// tracker section of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct AdsbConfig {
    pub source_type: SourceType,
    pub local_source_url: String,
    pub external_source_url: String, // templated with {lat} {lon} {radius}
    #[serde(default)]
    pub api_host: String,
    #[serde(default)]
    pub api_key: String,
    pub search_radius_nm: f64,

    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub fetch_interval: Duration,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub fetch_timeout: Duration,

    pub stale_secs: u64,
    pub signal_lost_secs: u64,
    pub purge_secs: u64,

    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub trail_window: Duration,
    pub max_phase_history: usize,

    #[serde(default)]
    pub runways_path: Option<String>,
}

impl Default for AdsbConfig {
    fn default () -> Self {
        AdsbConfig {
            source_type: SourceType::Local,
            local_source_url: "http://localhost:8080/data/aircraft.json".to_string(),
            external_source_url: "https://adsbexchange-com1.p.rapidapi.com/v2/lat/{lat}/lon/{lon}/dist/{radius}/".to_string(),
            api_host: String::new(),
            api_key: String::new(),
            search_radius_nm: 50.0,
            fetch_interval: Duration::from_secs(1),
            fetch_timeout: Duration::from_secs(5),
            stale_secs: 60,
            signal_lost_secs: 300,
            purge_secs: 600,
            trail_window: Duration::from_secs(600),
            max_phase_history: 50,
            runways_path: None,
        }
    }
}
