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

//! great-circle math and the short-horizon position predictor.
//! All functions are pure - the station reference is passed in, there is no
//! module level state.

use std::f64::consts::PI;
use chrono::{DateTime,Duration as ChronoDuration,Utc};
use serde::{Serialize,Deserialize};

use crate::angle::{angular_diff,normalize_360};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;
pub const METERS_PER_NM: f64 = 1852.0;
pub const FEET_PER_NM: f64 = 6076.12;
pub const FEET_PER_METER: f64 = 3.28084;
pub const METERS_PER_FOOT: f64 = 0.3048;
pub const FPM_TO_MPS: f64 = 0.00508;

/// range around the station within which predicted speeds are scaled
pub const SPEED_ADJUST_RANGE_NM: f64 = 10.0;
/// maximum predicted speed scaling (25%)
pub const SPEED_ADJUST_PERCENT: f64 = 0.25;

/// a bare geodetic position in degrees
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct GeoPos {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPos {
    pub fn new (lat: f64, lon: f64) -> Self { GeoPos{ lat, lon } }
}

/// distance in meters between two lat/lon points (spherical Earth, R = 6371km)
pub fn haversine_m (lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lon1_rad = lon1.to_radians();
    let lat2_rad = lat2.to_radians();
    let lon2_rad = lon2.to_radians();

    let dlat = lat2_rad - lat1_rad;
    let dlon = lon2_rad - lon1_rad;

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2( (1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// initial bearing from point 1 to point 2 in [0,360) degrees (0 = North, 90 = East)
pub fn bearing_deg (lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lon1_rad = lon1.to_radians();
    let lat2_rad = lat2.to_radians();
    let lon2_rad = lon2.to_radians();

    let y = (lon2_rad - lon1_rad).sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * (lon2_rad - lon1_rad).cos();

    normalize_360( y.atan2(x).to_degrees())
}

/// bearing to the target relative to the observer's heading, in [0,360) degrees.
/// This is the aviation "clock position".
pub fn relative_bearing_deg (lat1: f64, lon1: f64, heading1: f64, lat2: f64, lon2: f64) -> f64 {
    let absolute = bearing_deg( lat1, lon1, lat2, lon2);
    normalize_360( absolute - heading1)
}

#[inline] pub fn meters_to_nm (m: f64) -> f64 { m / METERS_PER_NM }
#[inline] pub fn nm_to_meters (nm: f64) -> f64 { nm * METERS_PER_NM }
#[inline] pub fn feet_to_meters (ft: f64) -> f64 { ft * METERS_PER_FOOT }
#[inline] pub fn meters_to_feet (m: f64) -> f64 { m * FEET_PER_METER }
#[inline] pub fn fpm_to_mps (fpm: f64) -> f64 { fpm * FPM_TO_MPS }

/// distance in NM from a position to the station
pub fn distance_to_station_nm (lat: f64, lon: f64, station: &GeoPos) -> f64 {
    meters_to_nm( haversine_m( lat, lon, station.lat, station.lon))
}

/// parse a "lat,lon" string (used by the station override endpoint)
pub fn parse_coordinates (s: &str) -> Result<GeoPos,String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 2 {
        return Err( "invalid coordinate format, expected 'lat,lon'".to_string());
    }
    let lat: f64 = parts[0].trim().parse().map_err(|e| format!("invalid latitude: {e}"))?;
    let lon: f64 = parts[1].trim().parse().map_err(|e| format!("invalid longitude: {e}"))?;
    Ok( GeoPos{ lat, lon })
}

/* #region prediction *********************************************************************************/

/// the current-state inputs for dead reckoning
#[derive(Debug,Clone,Copy)]
pub struct PredictionInput {
    pub lat: f64,
    pub lon: f64,
    pub alt_baro_ft: f64,
    pub true_heading_deg: f64,
    pub mag_heading_deg: f64,
    pub speed_kts: f64,
    pub vertical_rate_fpm: f64,
}

#[derive(Debug,Clone,Copy,PartialEq,Serialize,Deserialize)]
pub struct PredictedPosition {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub speed_true: f64,
    pub speed_gs: f64,
    pub true_heading: f64,
    pub mag_heading: f64,
    pub timestamp: DateTime<Utc>,
}

/// constant-heading dead reckoning at 1 minute steps for the next 5 minutes.
/// Position is advanced at the reported speed; the *reported* speed of each
/// sample is scaled by up to 25% inside SPEED_ADJUST_RANGE_NM of the station,
/// down when approaching (heading within 90 deg of the bearing to the station)
/// and up when departing. Predicted altitude applies the vertical rate and is
/// clamped at -100 ft on approach so a descent through field elevation stays
/// renderable.
pub fn predict_future_positions (input: &PredictionInput, station: &GeoPos, now: DateTime<Utc>) -> Vec<PredictedPosition> {
    let mut predictions = Vec::with_capacity(5);

    let heading_rad = input.true_heading_deg.to_radians();
    let speed_km_per_min = input.speed_kts * 1.852 / 60.0;

    // ~111 km per degree of latitude, scaled by cos(lat) for longitude
    let lat_km_per_degree = 111.0;
    let lon_km_per_degree = 111.0 * (input.lat.to_radians()).cos();

    let bearing_to_station = bearing_deg( input.lat, input.lon, station.lat, station.lon);
    let approaching = angular_diff( input.true_heading_deg, bearing_to_station) < 90.0;

    for i in 0..5 {
        let minutes_ahead = (i + 1) as f64;

        let lat_change = (speed_km_per_min * minutes_ahead * heading_rad.cos()) / lat_km_per_degree;
        let lon_change = (speed_km_per_min * minutes_ahead * heading_rad.sin()) / lon_km_per_degree;

        let new_lat = input.lat + lat_change;
        let new_lon = input.lon + lon_change;

        let mut adjusted_speed = input.speed_kts;
        let predicted_distance_nm = distance_to_station_nm( new_lat, new_lon, station);
        if predicted_distance_nm < SPEED_ADJUST_RANGE_NM {
            let factor = (SPEED_ADJUST_RANGE_NM - predicted_distance_nm) / SPEED_ADJUST_RANGE_NM;
            adjusted_speed = if approaching {
                input.speed_kts * (1.0 - SPEED_ADJUST_PERCENT * factor)
            } else {
                input.speed_kts * (1.0 + SPEED_ADJUST_PERCENT * factor)
            };
        }

        let mut new_altitude = input.alt_baro_ft + input.vertical_rate_fpm * minutes_ahead;
        if approaching && new_altitude < -100.0 {
            new_altitude = -100.0;
        }

        predictions.push( PredictedPosition {
            lat: new_lat,
            lon: new_lon,
            altitude: new_altitude,
            speed_true: adjusted_speed,
            speed_gs: adjusted_speed,
            true_heading: input.true_heading_deg,
            mag_heading: input.mag_heading_deg,
            timestamp: now + ChronoDuration::minutes( (i + 1) as i64),
        });
    }

    predictions
}

/* #endregion prediction */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_known_distance() {
        // CYYZ threshold 05 to threshold 23 is about 3.3km
        let d = haversine_m( 43.6777, -79.6248, 43.6777, -79.6248);
        assert_eq!( d, 0.0);

        // one degree of latitude at the equator ~ 111.2 km
        let d = haversine_m( 0.0, 0.0, 1.0, 0.0);
        assert!( (d - 111_195.0).abs() < 100.0);
    }

    #[test]
    fn test_bearing_cardinal() {
        assert!( (bearing_deg( 0.0, 0.0, 1.0, 0.0) - 0.0).abs() < 1e-9); // north
        assert!( (bearing_deg( 0.0, 0.0, 0.0, 1.0) - 90.0).abs() < 1e-9); // east
        assert!( (bearing_deg( 0.0, 0.0, -1.0, 0.0) - 180.0).abs() < 1e-9); // south
        assert!( (bearing_deg( 0.0, 0.0, 0.0, -1.0) - 270.0).abs() < 1e-9); // west
    }

    #[test]
    fn test_relative_bearing() {
        // target due east, own heading north -> 3 o'clock
        let rb = relative_bearing_deg( 0.0, 0.0, 0.0, 0.0, 1.0);
        assert!( (rb - 90.0).abs() < 1e-9);

        // same target, own heading east -> dead ahead
        let rb = relative_bearing_deg( 0.0, 0.0, 90.0, 0.0, 1.0);
        assert!( rb.abs() < 1e-9);
    }

    #[test]
    fn test_conversions() {
        assert_eq!( nm_to_meters(1.0), 1852.0);
        assert_eq!( feet_to_meters(1.0), 0.3048);
        assert!( (fpm_to_mps(1000.0) - 5.08).abs() < 1e-9);
    }

    #[test]
    fn test_parse_coordinates() {
        let p = parse_coordinates( "43.6777, -79.6248").unwrap();
        assert_eq!( p.lat, 43.6777);
        assert_eq!( p.lon, -79.6248);
        assert!( parse_coordinates("43.6777").is_err());
        assert!( parse_coordinates("a,b").is_err());
    }
}
