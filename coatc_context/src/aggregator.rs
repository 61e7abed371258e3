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

use std::{path::Path,sync::Arc};
use chrono::Duration as ChronoDuration;
use tracing::{debug,warn};

use coatc_adsb::{Aircraft,AircraftStatus,tracker::Tracker};
use coatc_adsb::phase::{FlightPhasesConfig,RunwayData};
use coatc_audio::FrequencyManager;
use coatc_common::datetime::utc_now;
use coatc_storage::transcriptions::TranscriptionStorage;
use coatc_transcription::TemplateRenderer;
use coatc_weather::service::WeatherService;

use crate::{AirportInfo,ContextConfig,FormattingOptions,RunwayInfo,TemplateContext,TranscriptionSummary};
use crate::errors::Result;
use crate::template::render_template_file;

/// station identity for the prompt header
#[derive(Debug,Clone)]
pub struct StationInfo {
    pub airport_code: String,
    pub elevation_ft: i32,
}

/// collects and formats airspace data for template rendering
pub struct DataAggregator {
    tracker: Arc<Tracker>,
    weather: Arc<WeatherService>,
    transcription_storage: TranscriptionStorage,
    frequencies: Arc<FrequencyManager>,
    runways: Option<RunwayData>,
    station_info: StationInfo,
    airport_range_nm: f64,
    config: ContextConfig,
}

impl DataAggregator {
    pub fn new (
        tracker: Arc<Tracker>,
        weather: Arc<WeatherService>,
        transcription_storage: TranscriptionStorage,
        frequencies: Arc<FrequencyManager>,
        runways: Option<RunwayData>,
        station_info: StationInfo,
        airport_range_nm: f64,
        config: ContextConfig,
    ) -> Self {
        DataAggregator {
            tracker, weather, transcription_storage, frequencies,
            runways, station_info, airport_range_nm, config,
        }
    }

    /// assemble the current airspace picture
    pub fn get_template_context (&self, opts: FormattingOptions) -> TemplateContext {
        let max_aircraft = if opts.max_aircraft > 0 { opts.max_aircraft } else { self.config.max_context_aircraft };

        let mut context = TemplateContext {
            timestamp: utc_now(),
            airport: self.airport_info(),
            aircraft: self.aircraft_context( max_aircraft),
            weather: None,
            runways: Vec::new(),
            transcription_history: Vec::new(),
        };

        if opts.include_weather {
            context.weather = self.weather.get_weather();
        }
        if opts.include_runways {
            context.runways = self.runway_info();
        }
        if opts.include_transcription_history {
            context.transcription_history = self.recent_communications();
        }

        debug!("aggregated template context: {} aircraft, {} runways, {} communications",
               context.aircraft.len(), context.runways.len(), context.transcription_history.len());
        context
    }

    /// active aircraft within the airport range, plus all airborne traffic,
    /// in snapshot (hex) order, capped
    fn aircraft_context (&self, max_aircraft: usize) -> Vec<Aircraft> {
        let mut aircraft: Vec<Aircraft> = self.tracker.get_all().into_iter()
            .filter(|ac| ac.status == AircraftStatus::Active)
            .filter(|ac| {
                match ac.distance_nm {
                    Some(d) => d <= self.airport_range_nm || !ac.on_ground,
                    None => false, // no position yet
                }
            })
            .collect();

        if aircraft.len() > max_aircraft {
            aircraft.truncate( max_aircraft);
        }
        aircraft
    }

    fn airport_info (&self) -> AirportInfo {
        let station = self.tracker.station();
        AirportInfo {
            code: self.station_info.airport_code.clone(),
            name: format!("Airport {}", self.station_info.airport_code),
            coordinates: vec![ station.lat, station.lon],
            elevation_ft: self.station_info.elevation_ft,
        }
    }

    fn runway_info (&self) -> Vec<RunwayInfo> {
        match &self.runways {
            Some(data) => data.runway_ids().into_iter().map(|name| RunwayInfo {
                name,
                active: true,
                operations: vec![ "departure".to_string(), "arrival".to_string()],
            }).collect(),
            None => Vec::new(),
        }
    }

    /// processed transmissions of the recent history window, oldest first
    fn recent_communications (&self) -> Vec<TranscriptionSummary> {
        let end = utc_now();
        let start = end - ChronoDuration::seconds( self.config.transcription_history_secs as i64);

        let records = match self.transcription_storage.get_by_time_range( start, end, 100, 0) {
            Ok(records) => records,
            Err(e) => {
                warn!("recent communications query failed: {e}");
                return Vec::new();
            }
        };

        records.into_iter()
            .filter(|r| r.is_processed)
            .map(|r| {
                let frequency = self.frequencies.get( &r.frequency_id)
                    .map(|f| f.name).unwrap_or( r.frequency_id.clone());
                TranscriptionSummary {
                    timestamp: r.created_at,
                    frequency,
                    content: r.content_processed.unwrap_or( r.content),
                    speaker: r.speaker_type.map(|s| s.as_str().to_string()).unwrap_or_default(),
                    callsign: r.callsign,
                }
            })
            .collect()
    }
}

impl TemplateRenderer for DataAggregator {
    fn render_post_processor_template (&self, template_path: &str) -> std::result::Result<String,String> {
        let context = self.get_template_context( FormattingOptions {
            include_weather: true,
            include_runways: true,
            include_transcription_history: true,
            max_aircraft: self.config.max_context_aircraft,
        });
        render_template_file( Path::new(template_path), &context).map_err(|e| e.to_string())
    }
}
