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

//! the tracker owns the aircraft table. One tick: fetch, merge (the only
//! place sensor validation runs), flying/phase classification, status aging,
//! trail retention, prediction, snapshot + diff. Everything outside the tick
//! loop reads cloned snapshots.

use std::sync::{Arc,Mutex,RwLock};
use chrono::{DateTime,Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug,error,info,warn};

use coatc_common::clean_flight_id;
use coatc_common::datetime::{elapsed_secs_since,utc_now};
use coatc_common::events::{Broadcaster,Envelope};
use coatc_common::geo::{self,GeoPos,PredictionInput};

use crate::{AdsbConfig,AdsbData,Aircraft,AircraftStatus,Phase,PhaseChange,TrailPoint};
use crate::change_detector::{AircraftChange,ChangeDetector,ChangeType};
use crate::client::{is_hex_code,AdsbClient,AdsbTarget,RawAircraftData};
use crate::phase::{self,FlightPhasesConfig,PhaseObservation,RunwayData};
use crate::errors::Result;

/// a phase transition observed during one tick
#[derive(Debug,Clone,Serialize)]
pub struct PhaseEvent {
    pub hex: String,
    #[serde(skip_serializing_if="Option::is_none")]
    pub flight: Option<String>,
    pub phase: Phase,
    pub entered_at: DateTime<Utc>,
}

/// a status transition observed during one tick
#[derive(Debug,Clone,Serialize)]
pub struct StatusEvent {
    pub hex: String,
    pub status: AircraftStatus,
}

/// everything one tick produced for the broadcast bus
#[derive(Debug,Default)]
pub struct TickEvents {
    pub changes: Vec<AircraftChange>,
    pub phase_events: Vec<PhaseEvent>,
    pub status_events: Vec<StatusEvent>,
}

pub struct Tracker {
    config: AdsbConfig,
    phase_config: FlightPhasesConfig,
    station: Arc<RwLock<GeoPos>>,
    runways: Option<RunwayData>,

    aircraft: DashMap<String,Aircraft>,
    change_detector: Mutex<ChangeDetector>,
    last_fetch: RwLock<Option<DateTime<Utc>>>,
}

impl Tracker {
    pub fn new (config: AdsbConfig, phase_config: FlightPhasesConfig, station: Arc<RwLock<GeoPos>>, runways: Option<RunwayData>) -> Self {
        Tracker {
            config,
            phase_config,
            station,
            runways,
            aircraft: DashMap::new(),
            change_detector: Mutex::new( ChangeDetector::new()),
            last_fetch: RwLock::new(None),
        }
    }

    pub fn station (&self) -> GeoPos {
        *self.station.read().unwrap_or_else(|e| e.into_inner())
    }

    /// timestamp of the last successful fetch (health endpoint)
    pub fn last_fetch (&self) -> Option<DateTime<Utc>> {
        *self.last_fetch.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn aircraft_count (&self) -> usize {
        self.aircraft.len()
    }

    /// cloned snapshot of the whole table, ordered by hex for stable output
    pub fn get_all (&self) -> Vec<Aircraft> {
        let mut list: Vec<Aircraft> = self.aircraft.iter().map(|e| e.value().clone()).collect();
        list.sort_by(|a,b| a.hex.cmp(&b.hex));
        list
    }

    pub fn get_by_hex (&self, hex: &str) -> Option<Aircraft> {
        self.aircraft.get( &hex.to_lowercase()).map(|e| e.value().clone())
    }

    /// trail slice no older than `window`
    pub fn get_tracks (&self, hex: &str, window: std::time::Duration) -> Option<Vec<TrailPoint>> {
        let cutoff = utc_now() - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::seconds(0));
        self.aircraft.get( &hex.to_lowercase()).map(|e| {
            e.value().trail.iter().filter(|p| p.timestamp >= cutoff).cloned().collect()
        })
    }

    /// one polling cycle. `data` is None when the fetch failed - the tick is
    /// then a no-op for freshness but still runs status aging.
    pub fn step (&self, data: Option<&RawAircraftData>, now: DateTime<Utc>) -> TickEvents {
        let mut events = TickEvents::default();
        let station = self.station();

        if let Some(data) = data {
            *self.last_fetch.write().unwrap_or_else(|e| e.into_inner()) = Some(now);
            for target in &data.aircraft {
                self.merge_record( target, station, now, &mut events);
            }
        }

        self.age_and_maintain( station, now, &mut events);

        let snapshot = self.get_all();
        events.changes = self.change_detector.lock().unwrap_or_else(|e| e.into_inner()).detect( &snapshot);

        events
    }

    /// upsert one raw record. This is the only place sensor validation runs.
    fn merge_record (&self, target: &AdsbTarget, station: GeoPos, now: DateTime<Utc>, events: &mut TickEvents) {
        let hex = target.hex.trim().to_lowercase();
        if !is_hex_code( &hex) {
            debug!("skipping record with malformed hex {:?}", target.hex);
            return;
        }

        let mut entry = self.aircraft.entry( hex.clone())
            .or_insert_with(|| Aircraft::new( hex.clone(), now, self.config.max_phase_history));
        let ac = entry.value_mut();

        ac.source_type = target.source_type;
        if let Some(flight) = &target.flight {
            let cleaned = clean_flight_id(flight);
            if !cleaned.is_empty() {
                ac.flight = Some(cleaned);
            }
        }

        let prev = ac.adsb.clone();
        let (prev_tas, prev_gs, prev_alt) = prev.as_ref()
            .map(|p| (p.tas, p.gs, p.alt_baro)).unwrap_or( (0.0, 0.0, 0.0));

        // position: new fix, else carry the previous one
        let pos = match (target.lat, target.lon) {
            (Some(lat), Some(lon)) => Some( GeoPos::new( lat, lon)),
            _ => prev.as_ref().map(|p| GeoPos::new( p.lat, p.lon)),
        };
        let Some(pos) = pos else {
            // no position at all yet - the observation still counts for freshness
            ac.last_seen = now;
            if ac.status != AircraftStatus::Active {
                ac.status = AircraftStatus::Active;
                events.status_events.push( StatusEvent{ hex: ac.hex.clone(), status: ac.status });
            }
            return;
        };

        let cur_tas = target.tas.unwrap_or(0.0);
        let cur_gs = target.gs.unwrap_or(0.0);
        let cur_alt = target.alt_baro.map(|v| v.0).unwrap_or(0.0);

        let (tas, gs, alt) = phase::validate_sensor_data(
            cur_tas, cur_gs, cur_alt, prev_tas, prev_gs, prev_alt,
            pos, station, &self.phase_config);

        let adsb = AdsbData {
            lat: pos.lat,
            lon: pos.lon,
            alt_baro: alt,
            gs,
            tas,
            track: target.track.unwrap_or(0.0),
            track_rate: target.track_rate.unwrap_or(0.0),
            mag_heading: target.mag_heading.unwrap_or(0.0),
            true_heading: target.true_heading.unwrap_or(0.0),
            baro_rate: target.baro_rate.unwrap_or(0.0),
            squawk: target.squawk.clone().or_else(|| prev.as_ref().and_then(|p| p.squawk.clone())),
        };

        let flying = phase::is_flying( tas, gs, alt, &self.phase_config);
        ac.on_ground = !flying;

        let distance_nm = geo::distance_to_station_nm( pos.lat, pos.lon, &station);
        ac.distance_nm = Some(distance_nm);
        ac.bearing_from_station = Some( geo::bearing_deg( station.lat, station.lon, pos.lat, pos.lon));
        ac.bearing_to_station = Some( geo::bearing_deg( pos.lat, pos.lon, station.lat, station.lon));

        let heading = adsb.effective_heading();
        let speed = adsb.effective_speed();
        let vs = adsb.baro_rate;

        // pending cruise hold window (DEP -> CRZ)
        if ac.phase.current == Phase::Departure && flying && vs.abs() <= self.phase_config.climb_cruise_fpm {
            if ac.cruise_since.is_none() {
                ac.cruise_since = Some(now);
            }
        } else {
            ac.cruise_since = None;
        }

        let obs = PhaseObservation {
            pos,
            altitude_ft: alt,
            speed_kts: speed,
            gs_kts: gs,
            vertical_rate_fpm: vs,
            heading_deg: heading,
            flying,
            on_ground: ac.on_ground,
            distance_nm,
            cruise_since: ac.cruise_since,
            now,
        };

        if let Some(next) = phase::next_phase( ac.phase.current, &obs, self.runways.as_ref(), station, &self.phase_config) {
            let dwell_ok = ac.phase.last_transition()
                .map(|last| (now - last.entered_at).num_seconds() >= self.phase_config.min_phase_dwell_secs as i64)
                .unwrap_or(true);
            if next != ac.phase.current && dwell_ok {
                ac.phase.push( next, now, self.config.max_phase_history);
                if next == Phase::Departure && ac.takeoff_time.is_none() {
                    ac.takeoff_time = Some(now);
                }
                events.phase_events.push( PhaseEvent {
                    hex: ac.hex.clone(),
                    flight: ac.flight.clone(),
                    phase: next,
                    entered_at: now,
                });
            }
        }

        ac.adsb = Some(adsb);

        if ac.status != AircraftStatus::Active {
            events.status_events.push( StatusEvent{ hex: ac.hex.clone(), status: AircraftStatus::Active });
        }
        ac.status = AircraftStatus::Active;
        ac.last_seen = now;

        // trail sample for this fix
        ac.trail.push_back( TrailPoint{ lat: pos.lat, lon: pos.lon, alt_baro: alt, timestamp: now });
    }

    /// second pass over the whole table: status aging, trail retention window,
    /// prediction refresh, purge
    fn age_and_maintain (&self, station: GeoPos, now: DateTime<Utc>, events: &mut TickEvents) {
        let trail_cutoff = now - chrono::Duration::from_std( self.config.trail_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(0));
        let mut purged: Vec<String> = Vec::new();

        for mut entry in self.aircraft.iter_mut() {
            let ac = entry.value_mut();
            let gap = elapsed_secs_since( now, ac.last_seen);

            if gap >= self.config.purge_secs as f64 {
                purged.push( ac.hex.clone());
                continue;
            }

            let status = if gap >= self.config.signal_lost_secs as f64 {
                AircraftStatus::SignalLost
            } else if gap >= self.config.stale_secs as f64 {
                AircraftStatus::Stale
            } else {
                AircraftStatus::Active
            };
            if status != ac.status {
                ac.status = status;
                events.status_events.push( StatusEvent{ hex: ac.hex.clone(), status });
            }

            while let Some(front) = ac.trail.front() {
                if front.timestamp < trail_cutoff { ac.trail.pop_front(); } else { break }
            }

            ac.future_positions = match &ac.adsb {
                Some(adsb) if !ac.on_ground => {
                    let input = PredictionInput {
                        lat: adsb.lat,
                        lon: adsb.lon,
                        alt_baro_ft: adsb.alt_baro,
                        true_heading_deg: adsb.effective_heading(),
                        mag_heading_deg: adsb.mag_heading,
                        speed_kts: adsb.effective_speed(),
                        vertical_rate_fpm: adsb.baro_rate,
                    };
                    geo::predict_future_positions( &input, &station, now)
                }
                _ => Vec::new(),
            };
        }

        for hex in purged {
            debug!("purging aircraft {hex}");
            self.aircraft.remove( &hex);
        }
    }
}

/// spawn the timer driven tick loop. Fetch failures are logged and aged
/// through; the loop only ends when aborted.
pub fn spawn_tracker_loop (
    tracker: Arc<Tracker>,
    client: AdsbClient,
    broadcaster: Arc<dyn Broadcaster>,
    interval: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn( async move {
        let mut ticker = tokio::time::interval( interval);
        ticker.set_missed_tick_behavior( tokio::time::MissedTickBehavior::Delay);
        info!("tracker loop started, interval {:?}", interval);

        loop {
            ticker.tick().await;
            let now = utc_now();

            let data = match client.fetch_data( tracker.station()).await {
                Ok(data) => Some(data),
                Err(e) => {
                    warn!("surveillance fetch failed: {e}");
                    None
                }
            };

            let events = tracker.step( data.as_ref(), now);
            publish_tick_events( broadcaster.as_ref(), &events);
        }
    })
}

/// turn one tick's deltas into bus messages, aircraft events first so
/// per-hex ordering (added -> updated* -> removed) holds for subscribers
pub fn publish_tick_events (broadcaster: &dyn Broadcaster, events: &TickEvents) {
    for change in &events.changes {
        let (msg_type, data) = match change.change_type {
            ChangeType::Added   => ("aircraft_added", serde_json::to_value( change.aircraft.as_ref()).unwrap_or_default()),
            ChangeType::Updated => ("aircraft_update", serde_json::to_value( change.aircraft.as_ref()).unwrap_or_default()),
            ChangeType::Removed => ("aircraft_removed", json!({ "hex": change.hex })),
        };
        broadcaster.broadcast( Envelope::new( msg_type, data));
    }
    for pe in &events.phase_events {
        broadcaster.broadcast( Envelope::of( "phase_change", pe));
    }
    for se in &events.status_events {
        broadcaster.broadcast( Envelope::of( "status_update", se));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AdsbTarget;
    use chrono::TimeZone;

    fn test_tracker () -> Tracker {
        let station = Arc::new( RwLock::new( GeoPos::new( 43.6777, -79.6248)));
        let mut config = AdsbConfig::default();
        config.stale_secs = 60;
        config.signal_lost_secs = 300;
        config.purge_secs = 600;
        Tracker::new( config, FlightPhasesConfig::default(), station, None)
    }

    fn target (hex: &str, lat: f64, lon: f64, alt: f64, gs: f64, tas: f64) -> AdsbTarget {
        AdsbTarget {
            hex: hex.to_string(),
            lat: Some(lat), lon: Some(lon),
            alt_baro: Some( crate::client::FlexNum(alt)),
            gs: Some(gs), tas: Some(tas),
            ..Default::default()
        }
    }

    fn data (targets: Vec<AdsbTarget>) -> RawAircraftData {
        RawAircraftData { now: 0.0, messages: 0, aircraft: targets }
    }

    fn t (secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_status_aging_boundaries() {
        let tracker = test_tracker();
        tracker.step( Some( &data( vec![ target("c06abc", 43.9, -79.2, 35_000.0, 450.0, 460.0)])), t(0));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::Active);

        // exactly at stale_secs: stale (inclusive lower bound)
        tracker.step( None, t(60));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::Stale);

        // exactly at signal_lost_secs
        tracker.step( None, t(300));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::SignalLost);

        // at purge_secs the entry is gone and a removed event is emitted
        let events = tracker.step( None, t(600));
        assert!( tracker.get_by_hex("c06abc").is_none());
        assert!( events.changes.iter().any(|c| c.change_type == ChangeType::Removed && c.hex == "c06abc"));
    }

    #[test]
    fn test_status_monotonic_within_gap() {
        let tracker = test_tracker();
        tracker.step( Some( &data( vec![ target("c06abc", 43.9, -79.2, 35_000.0, 450.0, 460.0)])), t(0));

        tracker.step( None, t(90));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::Stale);

        // a later tick with no new observation must never move it back toward active
        tracker.step( None, t(120));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::Stale);

        // a fresh observation reactivates
        let events = tracker.step( Some( &data( vec![ target("c06abc", 43.91, -79.21, 35_000.0, 450.0, 460.0)])), t(130));
        assert_eq!( tracker.get_by_hex("c06abc").unwrap().status, AircraftStatus::Active);
        assert!( events.status_events.iter().any(|e| e.status == AircraftStatus::Active));
    }

    #[test]
    fn test_sensor_dropout_keeps_state() {
        let tracker = test_tracker();
        tracker.step( Some( &data( vec![ target("abc123", 43.9, -79.2, 11_000.0, 310.0, 300.0)])), t(0));

        // all three values drop to zero at once - receiver artifact
        let events = tracker.step( Some( &data( vec![ target("abc123", 43.91, -79.21, 0.0, 0.0, 0.0)])), t(1));
        let ac = tracker.get_by_hex("abc123").unwrap();
        let adsb = ac.adsb.unwrap();
        assert_eq!( adsb.alt_baro, 11_000.0);
        assert_eq!( adsb.tas, 300.0);
        assert_eq!( adsb.gs, 310.0);
        assert!( !ac.on_ground, "a masked dropout must not flip the aircraft to on-ground");
    }

    #[test]
    fn test_trail_window_retention() {
        let tracker = test_tracker(); // trail_window default 600s
        for i in 0..20 {
            let now = t( i * 60);
            tracker.step( Some( &data( vec![ target("abc123", 43.9 + i as f64 * 0.01, -79.2, 35_000.0, 450.0, 450.0)])), now);
        }
        let tracks = tracker.aircraft.get("abc123").unwrap().trail.clone();
        // samples older than 600s before the last tick are pruned
        let oldest = tracks.front().unwrap().timestamp;
        assert!( t(19 * 60) - oldest <= chrono::Duration::seconds(600));
        assert!( tracks.len() <= 11);
    }

    #[test]
    fn test_prediction_refresh() {
        let tracker = test_tracker();
        let mut tg = target("abc123", 43.9, -79.2, 35_000.0, 450.0, 450.0);
        tg.true_heading = Some(90.0);
        tracker.step( Some( &data( vec![tg])), t(0));

        let ac = tracker.get_by_hex("abc123").unwrap();
        assert_eq!( ac.future_positions.len(), 5);
        assert!( ac.future_positions[0].lon > -79.2);
        assert!( (ac.future_positions[0].lat - 43.9).abs() < 1e-9);
    }

    #[test]
    fn test_parse_skips_bad_record_without_poisoning_batch() {
        let tracker = test_tracker();
        let good = target("c06abc", 43.9, -79.2, 35_000.0, 450.0, 450.0);
        let bad = target("nothex!", 43.9, -79.2, 35_000.0, 450.0, 450.0);
        tracker.step( Some( &data( vec![ bad, good])), t(0));
        assert_eq!( tracker.aircraft_count(), 1);
        assert!( tracker.get_by_hex("c06abc").is_some());
    }

    #[test]
    fn test_hex_never_mutates_and_tail_derived() {
        let tracker = test_tracker();
        tracker.step( Some( &data( vec![ target("A00001", 43.9, -79.2, 5000.0, 200.0, 210.0)])), t(0));
        let ac = tracker.get_by_hex("a00001").unwrap();
        assert_eq!( ac.hex, "a00001");
        assert_eq!( ac.tail_number.as_deref(), Some("N1"));
    }
}
