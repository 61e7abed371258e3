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

//! scripted full-flight scenario: a departure off 06L, cruise, and the return
//! approach must walk the whole phase ladder in order.

use std::sync::{Arc,RwLock};
use chrono::{DateTime,TimeZone,Utc};
use coatc_adsb::{AdsbConfig,Phase};
use coatc_adsb::client::{AdsbTarget,FlexNum,RawAircraftData};
use coatc_adsb::phase::{FlightPhasesConfig,RunwayData};
use coatc_adsb::tracker::Tracker;
use coatc_common::geo::GeoPos;

const HEX: &str = "c0ffee";

fn runways () -> RunwayData {
    let doc = r#"{
        "airport": "CYYZ",
        "runway_thresholds": {
            "06L-24R": {
                "06L": {"latitude": 43.6580, "longitude": -79.6500},
                "24R": {"latitude": 43.6780, "longitude": -79.6000}
            }
        }
    }"#;
    serde_json::from_str(doc).unwrap()
}

fn tracker () -> Tracker {
    let station = Arc::new( RwLock::new( GeoPos::new( 43.6777, -79.6248)));
    Tracker::new( AdsbConfig::default(), FlightPhasesConfig::default(), station, Some( runways()))
}

fn t (secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

#[allow(clippy::too_many_arguments)]
fn obs (lat: f64, lon: f64, alt: f64, gs: f64, heading: f64, baro_rate: f64) -> RawAircraftData {
    let target = AdsbTarget {
        hex: HEX.to_string(),
        flight: Some( "ACA123".to_string()),
        lat: Some(lat),
        lon: Some(lon),
        alt_baro: Some( FlexNum(alt)),
        gs: Some(gs),
        true_heading: Some(heading),
        baro_rate: Some(baro_rate),
        ..Default::default()
    };
    RawAircraftData { now: 0.0, messages: 0, aircraft: vec![target] }
}

#[test]
fn test_full_flight_phase_ladder() {
    let tracker = tracker();

    // parked at the 06L threshold
    tracker.step( Some( &obs( 43.6580, -79.6500, 0.0, 0.0, 61.0, 0.0)), t(0));
    assert_eq!( phase( &tracker), Phase::New);

    // taxiing out
    tracker.step( Some( &obs( 43.6585, -79.6490, 0.0, 15.0, 61.0, 0.0)), t(30));
    assert_eq!( phase( &tracker), Phase::Tax);

    // takeoff roll, aligned with the 061 runway heading
    tracker.step( Some( &obs( 43.6600, -79.6450, 0.0, 90.0, 61.0, 0.0)), t(60));
    assert_eq!( phase( &tracker), Phase::Takeoff);

    // airborne past the departure end, climbing away from the field
    tracker.step( Some( &obs( 43.6850, -79.5800, 800.0, 160.0, 62.0, 2000.0)), t(90));
    assert_eq!( phase( &tracker), Phase::Departure);
    assert!( tracker.get_by_hex(HEX).unwrap().takeoff_time.is_some());

    // leveling off - the cruise hold window starts here
    tracker.step( Some( &obs( 43.90, -79.00, 30_000.0, 450.0, 62.0, 400.0)), t(480));
    assert_eq!( phase( &tracker), Phase::Departure);

    // held level long enough: cruise
    tracker.step( Some( &obs( 44.00, -78.80, 35_000.0, 450.0, 62.0, 0.0)), t(600));
    assert_eq!( phase( &tracker), Phase::Cruise);

    // descending back inside the arrival range
    tracker.step( Some( &obs( 43.95, -79.25, 8000.0, 280.0, 241.0, -1500.0)), t(1800));
    assert_eq!( phase( &tracker), Phase::Arrival);

    // lined up 6NM out on the 24R threshold course
    tracker.step( Some( &obs( 43.6295, -79.7209, 3000.0, 160.0, 61.0, -700.0)), t(1860));
    assert_eq!( phase( &tracker), Phase::Approach);

    // rollout
    tracker.step( Some( &obs( 43.6780, -79.6000, 0.0, 120.0, 61.0, 0.0)), t(1920));
    assert_eq!( phase( &tracker), Phase::Touchdown);

    // the full ladder, in order, append-only
    let history: Vec<Phase> = tracker.get_by_hex(HEX).unwrap()
        .phase.history.iter().map(|c| c.phase).collect();
    assert_eq!( history, vec![
        Phase::New, Phase::Tax, Phase::Takeoff, Phase::Departure,
        Phase::Cruise, Phase::Arrival, Phase::Approach, Phase::Touchdown,
    ]);

    // entered_at timestamps are non-decreasing
    let times: Vec<DateTime<Utc>> = tracker.get_by_hex(HEX).unwrap()
        .phase.history.iter().map(|c| c.entered_at).collect();
    assert!( times.windows(2).all(|w| w[0] <= w[1]));
}

fn phase (tracker: &Tracker) -> Phase {
    tracker.get_by_hex(HEX).unwrap().phase.current
}

#[test]
fn test_phase_dwell_hysteresis() {
    let tracker = tracker();

    tracker.step( Some( &obs( 43.6580, -79.6500, 0.0, 0.0, 61.0, 0.0)), t(0));
    // a qualifying taxi observation right after the NEW entry is suppressed
    tracker.step( Some( &obs( 43.6581, -79.6499, 0.0, 12.0, 61.0, 0.0)), t(10));
    assert_eq!( phase( &tracker), Phase::New);

    // once the dwell time has passed the same observation transitions
    tracker.step( Some( &obs( 43.6583, -79.6495, 0.0, 12.0, 61.0, 0.0)), t(30));
    assert_eq!( phase( &tracker), Phase::Tax);
}
