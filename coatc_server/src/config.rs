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

//! the root config aggregating every subsystem section, loaded once from a
//! RON file at startup. Read-only afterwards except the station override.

use std::path::Path;
use serde::{Serialize,Deserialize};

use coatc_adsb::AdsbConfig;
use coatc_adsb::phase::FlightPhasesConfig;
use coatc_audio::{AudioConfig,FrequencyConfig};
use coatc_common::config::load_config;
use coatc_common::geo::GeoPos;
use coatc_context::ContextConfig;
use coatc_transcription::{PostProcessingConfig,TranscriptionConfig};
use coatc_weather::WeatherConfig;

use crate::errors::Result;

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct StationConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub airport_code: String,
    #[serde(default)]
    pub elevation_ft: i32,
}

impl StationConfig {
    pub fn position (&self) -> GeoPos {
        GeoPos::new( self.latitude, self.longitude)
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub static_files_dir: String,
    pub ws_client_queue_size: usize,
}

impl Default for ServerConfig {
    fn default () -> Self {
        ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_allowed_origins: vec![ "*".to_string()],
            static_files_dir: "www".to_string(),
            ws_client_queue_size: 256,
        }
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

impl Default for StorageConfig {
    fn default () -> Self {
        StorageConfig { db_path: "coatc.db".to_string() }
    }
}

#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct CoatcConfig {
    pub station: StationConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub adsb: AdsbConfig,
    #[serde(default)]
    pub flight_phases: FlightPhasesConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub frequencies: Vec<FrequencyConfig>,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub post_processing: PostProcessingConfig,
    #[serde(default)]
    pub weather: WeatherConfig,
    #[serde(default)]
    pub context: ContextConfig,
}

impl CoatcConfig {
    pub fn load (path: &Path) -> Result<Self> {
        Ok( load_config(path)?)
    }

    /// the config view served by the diagnostics endpoint - secrets stripped
    pub fn sanitized (&self) -> CoatcConfig {
        let mut cfg = self.clone();
        if !cfg.adsb.api_key.is_empty() { cfg.adsb.api_key = "[REDACTED]".to_string() }
        if !cfg.transcription.api_key.is_empty() { cfg.transcription.api_key = "[REDACTED]".to_string() }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_strips_secrets() {
        let cfg = CoatcConfig {
            station: StationConfig { latitude: 43.6777, longitude: -79.6248, airport_code: "CYYZ".into(), elevation_ft: 569 },
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            adsb: AdsbConfig { api_key: "secret-a".into(), ..Default::default() },
            flight_phases: Default::default(),
            audio: Default::default(),
            frequencies: vec![],
            transcription: TranscriptionConfig { api_key: "secret-b".into(), ..Default::default() },
            post_processing: Default::default(),
            weather: Default::default(),
            context: Default::default(),
        };

        let view = cfg.sanitized();
        assert_eq!( view.adsb.api_key, "[REDACTED]");
        assert_eq!( view.transcription.api_key, "[REDACTED]");
        // and the original is untouched
        assert_eq!( cfg.adsb.api_key, "secret-a");
    }
}
