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
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info,warn,error};

use crate::{WeatherConfig,WeatherKind};
use crate::errors::{Result,WeatherError};

/// result of one kind's fetch attempt chain
pub struct FetchResult {
    pub kind: WeatherKind,
    pub data: Result<Value>,
}

/// HTTP client against the weather vendor: `GET {base}/{metar|taf|notams}/{airport}`
pub struct WeatherClient {
    config: WeatherConfig,
    http_client: reqwest::Client,
}

impl WeatherClient {
    pub fn new (config: WeatherConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout( config.request_timeout)
            .build()?;
        Ok( WeatherClient { config, http_client })
    }

    pub async fn fetch (&self, kind: WeatherKind) -> Result<Value> {
        let url = format!("{}/{}/{}", self.config.api_base_url, kind, self.config.airport_code);
        self.fetch_with_retry( &url, kind).await
    }

    /// exponential backoff 500ms * 2^(attempt-1), up to max_retries+1 attempts
    async fn fetch_with_retry (&self, url: &str, kind: WeatherKind) -> Result<Value> {
        let attempts = self.config.max_retries + 1;
        let mut last_error = String::new();

        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis( 500u64 * (1u64 << (attempt - 1)));
                info!("retrying {kind} fetch, attempt {} of {attempts}, backoff {backoff:?}", attempt + 1);
                sleep(backoff).await;
            }

            let resp = match self.http_client.get(url).send().await {
                Ok(resp) => resp,
                Err(e) => {
                    warn!("{kind} request failed (attempt {}): {e}", attempt + 1);
                    last_error = e.to_string();
                    continue;
                }
            };

            if resp.status() != reqwest::StatusCode::OK {
                warn!("{kind} returned status {} (attempt {})", resp.status(), attempt + 1);
                last_error = format!("unexpected status code {}", resp.status().as_u16());
                continue;
            }

            match resp.json::<Value>().await {
                Ok(data) => return Ok(data),
                Err(e) => {
                    warn!("{kind} body decode failed (attempt {}): {e}", attempt + 1);
                    last_error = e.to_string();
                    continue;
                }
            }
        }

        error!("all {attempts} attempts to fetch {kind} failed: {last_error}");
        Err( WeatherError::RetriesExhausted { kind: kind.to_string(), attempts, last_error })
    }

    /// fetch all enabled kinds concurrently
    pub async fn fetch_all (&self) -> Vec<FetchResult> {
        let mut results = Vec::with_capacity(3);

        let metar = async {
            if self.config.fetch_metar { Some( FetchResult{ kind: WeatherKind::Metar, data: self.fetch(WeatherKind::Metar).await }) } else { None }
        };
        let taf = async {
            if self.config.fetch_taf { Some( FetchResult{ kind: WeatherKind::Taf, data: self.fetch(WeatherKind::Taf).await }) } else { None }
        };
        let notams = async {
            if self.config.fetch_notams { Some( FetchResult{ kind: WeatherKind::Notams, data: self.fetch(WeatherKind::Notams).await }) } else { None }
        };

        let (m, t, n) = tokio::join!( metar, taf, notams);
        results.extend( m);
        results.extend( t);
        results.extend( n);
        results
    }
}
