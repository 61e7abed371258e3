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

//! the HTTP/websocket facade over the fusion pipeline, plus the `coatc`
//! binary that wires everything together.

use std::sync::{Arc,RwLock};
use chrono::{DateTime,Utc};

use coatc_adsb::tracker::Tracker;
use coatc_audio::FrequencyManager;
use coatc_common::geo::GeoPos;
use coatc_storage::clearances::ClearanceStorage;
use coatc_storage::transcriptions::TranscriptionStorage;
use coatc_weather::service::WeatherService;

pub mod config;
pub mod routes;
pub mod ws;
pub mod errors;

use config::CoatcConfig;
use ws::WsHub;

/// shared state behind every route handler
pub struct AppState {
    pub config: CoatcConfig,
    pub station: Arc<RwLock<GeoPos>>,
    pub tracker: Arc<Tracker>,
    pub frequencies: Arc<FrequencyManager>,
    pub weather: Arc<WeatherService>,
    pub transcriptions: TranscriptionStorage,
    pub clearances: ClearanceStorage,
    pub hub: WsHub,
    pub started_at: DateTime<Utc>,
}
