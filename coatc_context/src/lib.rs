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

//! assembles the prompt-ready airspace picture: tracker snapshot, weather
//! bundle, runway list and recent communications. Pure assembly over the
//! live components; nothing here owns a task.

use std::time::Duration;
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};

use coatc_adsb::Aircraft;
use coatc_weather::WeatherBundle;

pub mod aggregator;
pub mod template;
pub mod errors;

/// what to include when assembling a context
#[derive(Debug,Clone,Copy)]
pub struct FormattingOptions {
    pub include_weather: bool,
    pub include_runways: bool,
    pub include_transcription_history: bool,
    pub max_aircraft: usize,
}

impl Default for FormattingOptions {
    fn default () -> Self {
        FormattingOptions {
            include_weather: true,
            include_runways: true,
            include_transcription_history: true,
            max_aircraft: 30,
        }
    }
}

#[derive(Debug,Clone,Serialize)]
pub struct AirportInfo {
    pub code: String,
    pub name: String,
    pub coordinates: Vec<f64>, // [lat, lon]
    pub elevation_ft: i32,
}

#[derive(Debug,Clone,Serialize)]
pub struct RunwayInfo {
    pub name: String,
    pub active: bool,
    pub operations: Vec<String>,
}

/// one line of recent radio traffic for the prompt
#[derive(Debug,Clone,Serialize)]
pub struct TranscriptionSummary {
    pub timestamp: DateTime<Utc>,
    pub frequency: String,
    pub content: String,
    pub speaker: String,
    #[serde(skip_serializing_if="Option::is_none")]
    pub callsign: Option<String>,
}

/// the assembled bundle handed to template rendering
#[derive(Debug,Clone,Serialize)]
pub struct TemplateContext {
    pub timestamp: DateTime<Utc>,
    pub airport: AirportInfo,
    pub aircraft: Vec<Aircraft>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub weather: Option<WeatherBundle>,
    pub runways: Vec<RunwayInfo>,
    pub transcription_history: Vec<TranscriptionSummary>,
}

/// context aggregation section of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub max_context_aircraft: usize,
    pub transcription_history_secs: u64,
}

impl Default for ContextConfig {
    fn default () -> Self {
        ContextConfig {
            max_context_aircraft: 30,
            transcription_history_secs: 60,
        }
    }
}
