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

//! diffs successive tracker snapshots into added/updated/removed events.
//! Any field difference counts - downstream consumers decide what matters.

use std::collections::HashMap;
use serde::Serialize;

use crate::Aircraft;

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
#[serde(rename_all="lowercase")]
pub enum ChangeType {
    Added,
    Updated,
    Removed,
}

#[derive(Debug,Clone,Serialize)]
pub struct AircraftChange {
    #[serde(rename="type")]
    pub change_type: ChangeType,
    pub hex: String,
    // removed entries carry no body
    #[serde(skip_serializing_if="Option::is_none")]
    pub aircraft: Option<Aircraft>,
}

/// holds the previous snapshot map between polling cycles
pub struct ChangeDetector {
    previous: HashMap<String,Aircraft>,
}

impl ChangeDetector {
    pub fn new () -> Self {
        ChangeDetector { previous: HashMap::new() }
    }

    pub fn detect (&mut self, current: &[Aircraft]) -> Vec<AircraftChange> {
        let mut changes = Vec::new();
        let mut current_map: HashMap<String,Aircraft> = HashMap::with_capacity( current.len());

        for ac in current {
            current_map.insert( ac.hex.clone(), ac.clone());
        }

        for (hex, cur) in &current_map {
            match self.previous.get(hex) {
                Some(prev) => {
                    if has_any_changes( prev, cur) {
                        changes.push( AircraftChange{ change_type: ChangeType::Updated, hex: hex.clone(), aircraft: Some(cur.clone()) });
                    }
                }
                None => {
                    changes.push( AircraftChange{ change_type: ChangeType::Added, hex: hex.clone(), aircraft: Some(cur.clone()) });
                }
            }
        }

        for hex in self.previous.keys() {
            if !current_map.contains_key(hex) {
                changes.push( AircraftChange{ change_type: ChangeType::Removed, hex: hex.clone(), aircraft: None });
            }
        }

        self.previous = current_map;
        changes
    }
}

fn has_any_changes (previous: &Aircraft, current: &Aircraft) -> bool {
    match (&previous.adsb, &current.adsb) {
        (Some(p), Some(c)) => {
            if p.lat != c.lat || p.lon != c.lon { return true }
            if p.alt_baro != c.alt_baro { return true }
            if p.track != c.track { return true }
            if p.gs != c.gs { return true }
            if p.tas != c.tas { return true }
            if p.baro_rate != c.baro_rate { return true }
            if p.mag_heading != c.mag_heading { return true }
            if p.true_heading != c.true_heading { return true }
        }
        (None, None) => {}
        _ => return true, // kinematics appeared or disappeared
    }

    if previous.flight != current.flight { return true }
    if previous.status != current.status { return true }
    if previous.on_ground != current.on_ground { return true }
    if previous.phase != current.phase { return true }
    if previous.distance_nm != current.distance_nm { return true }

    // last_seen differs on every observation, driving the realtime update cadence
    if previous.last_seen != current.last_seen { return true }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone,Utc};

    fn aircraft (hex: &str) -> Aircraft {
        Aircraft::new( hex.to_string(), Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap(), 10)
    }

    #[test]
    fn test_added_updated_removed_sequence() {
        let mut cd = ChangeDetector::new();

        let a = aircraft("c06abc");
        let changes = cd.detect( &[a.clone()]);
        assert_eq!( changes.len(), 1);
        assert_eq!( changes[0].change_type, ChangeType::Added);
        assert_eq!( changes[0].hex, "c06abc");

        let mut a2 = a.clone();
        a2.last_seen = a.last_seen + chrono::Duration::seconds(1);
        let changes = cd.detect( &[a2.clone()]);
        assert_eq!( changes.len(), 1);
        assert_eq!( changes[0].change_type, ChangeType::Updated);

        let changes = cd.detect( &[]);
        assert_eq!( changes.len(), 1);
        assert_eq!( changes[0].change_type, ChangeType::Removed);
        assert!( changes[0].aircraft.is_none(), "removed events carry no body");
    }

    #[test]
    fn test_idempotent_on_identical_snapshot() {
        let mut cd = ChangeDetector::new();
        let a = aircraft("abc123");

        let first = cd.detect( &[a.clone()]);
        assert_eq!( first.len(), 1);

        // same snapshot again: no events
        let second = cd.detect( &[a.clone()]);
        assert!( second.is_empty(), "detect(X); detect(X) must emit nothing the second time");
    }

    #[test]
    fn test_status_change_is_an_update() {
        let mut cd = ChangeDetector::new();
        let a = aircraft("abc123");
        cd.detect( &[a.clone()]);

        let mut a2 = a.clone();
        a2.status = crate::AircraftStatus::Stale;
        let changes = cd.detect( &[a2]);
        assert_eq!( changes.len(), 1);
        assert_eq!( changes[0].change_type, ChangeType::Updated);
    }
}
