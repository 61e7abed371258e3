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

//! periodic METAR/TAF/NOTAM pull with a TTL cache. Vendor payloads are
//! treated as opaque JSON - we cache and serve, we do not interpret.

use std::{fmt,sync::RwLock,time::Duration};
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};
use serde_json::Value;

use coatc_common::datetime::{deserialize_duration,serialize_duration};

pub mod client;
pub mod service;
pub mod errors;

/// which vendor document a fetch concerns
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum WeatherKind {
    Metar,
    Taf,
    Notams,
}

impl fmt::Display for WeatherKind {
    fn fmt (&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self { WeatherKind::Metar => "metar", WeatherKind::Taf => "taf", WeatherKind::Notams => "notams" };
        f.write_str(s)
    }
}

/// the whole cached bundle, swapped atomically on refresh
#[derive(Debug,Clone,Serialize,Default)]
pub struct WeatherBundle {
    #[serde(skip_serializing_if="Option::is_none")]
    pub metar: Option<Value>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub taf: Option<Value>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub notams: Option<Value>,
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if="Vec::is_empty")]
    pub fetch_errors: Vec<String>,
}

#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_base_url: String,
    pub airport_code: String,

    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub refresh_interval: Duration,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub request_timeout: Duration,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub cache_expiry: Duration,

    pub max_retries: u32,
    pub fetch_metar: bool,
    pub fetch_taf: bool,
    pub fetch_notams: bool,
}

impl Default for WeatherConfig {
    fn default () -> Self {
        WeatherConfig {
            api_base_url: "https://node.windy.com/airports".to_string(),
            airport_code: "CYYZ".to_string(),
            refresh_interval: Duration::from_secs(600),
            request_timeout: Duration::from_secs(10),
            cache_expiry: Duration::from_secs(900),
            max_retries: 2,
            fetch_metar: true,
            fetch_taf: true,
            fetch_notams: true,
        }
    }
}

/// TTL cache readers see the whole bundle atomically
pub struct WeatherCache {
    data: RwLock<(Option<WeatherBundle>, Option<DateTime<Utc>>)>, // bundle, expires_at
}

impl WeatherCache {
    pub fn new () -> Self {
        WeatherCache { data: RwLock::new( (None, None)) }
    }

    pub fn get (&self) -> Option<WeatherBundle> {
        self.data.read().unwrap_or_else(|e| e.into_inner()).0.clone()
    }

    pub fn is_expired (&self, now: DateTime<Utc>) -> bool {
        match self.data.read().unwrap_or_else(|e| e.into_inner()).1 {
            Some(expires_at) => now > expires_at,
            None => true,
        }
    }

    pub fn set (&self, bundle: WeatherBundle, expiry: Duration, now: DateTime<Utc>) {
        let expires_at = now + chrono::Duration::from_std(expiry).unwrap_or_else(|_| chrono::Duration::seconds(0));
        *self.data.write().unwrap_or_else(|e| e.into_inner()) = (Some(bundle), Some(expires_at));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_cache_ttl() {
        let cache = WeatherCache::new();
        let t0 = Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap();
        assert!( cache.is_expired(t0));
        assert!( cache.get().is_none());

        cache.set( WeatherBundle::default(), Duration::from_secs(900), t0);
        assert!( !cache.is_expired( t0 + chrono::Duration::seconds(899)));
        assert!( cache.is_expired( t0 + chrono::Duration::seconds(901)));
        assert!( cache.get().is_some());
    }
}
