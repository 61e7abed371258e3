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

use std::time::Duration;
use chrono::{DateTime,Utc};
use serde::{Deserialize,Deserializer,Serializer};
use parse_duration::parse;

#[inline] pub fn millis (n: u64) -> Duration { Duration::from_millis(n) }
#[inline] pub fn secs (n: u64) -> Duration { Duration::from_secs(n) }
#[inline] pub fn secs_f64 (n: f64) -> Duration { Duration::from_secs_f64(n) }
#[inline] pub fn minutes (n: u64) -> Duration { Duration::from_secs( n * 60) }
#[inline] pub fn hours (n: u64) -> Duration { Duration::from_secs( n * 3600) }

/// this should be used wherever we might have to use sim clock instead of wall clock
#[inline]
pub fn utc_now () -> DateTime<Utc> {
    Utc::now()
}

/// seconds elapsed since `dt` as f64 (0 if dt is in the future - the clock
/// going backwards must not age anything)
pub fn elapsed_secs_since (now: DateTime<Utc>, dt: DateTime<Utc>) -> f64 {
    let d = (now - dt).num_milliseconds() as f64 / 1000.0;
    if d < 0.0 { 0.0 } else { d }
}

//--- support for serde (config durations are human readable strings like "30s" or "5min")

pub fn deserialize_duration<'a,D> (deserializer: D) -> Result<Duration,D::Error> where D: Deserializer<'a> {
    String::deserialize(deserializer).and_then( |string| {
        parse( string.as_str()).map_err( |e| serde::de::Error::custom( format!("{e:?}")))
    })
}

pub fn serialize_duration<S: Serializer> (dur: &Duration, s: S) -> Result<S::Ok,S::Error> {
    s.serialize_str( &format!("{dur:?}"))
}
