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

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info,warn};

use coatc_common::datetime::utc_now;

use crate::{WeatherBundle,WeatherCache,WeatherConfig,WeatherKind};
use crate::client::WeatherClient;
use crate::errors::Result;

/// owns the cache and the refresh loop
pub struct WeatherService {
    config: WeatherConfig,
    cache: Arc<WeatherCache>,
}

impl WeatherService {
    pub fn new (config: WeatherConfig) -> Self {
        WeatherService { config, cache: Arc::new( WeatherCache::new()) }
    }

    /// current bundle (None until the first successful refresh)
    pub fn get_weather (&self) -> Option<WeatherBundle> {
        self.cache.get()
    }

    pub fn is_expired (&self) -> bool {
        self.cache.is_expired( utc_now())
    }

    /// spawn the periodic refresh task; the first refresh runs immediately
    pub fn spawn_refresh_loop (&self) -> Result<JoinHandle<()>> {
        let client = WeatherClient::new( self.config.clone())?;
        let cache = self.cache.clone();
        let config = self.config.clone();

        Ok( tokio::spawn( async move {
            let mut ticker = tokio::time::interval( config.refresh_interval);
            ticker.set_missed_tick_behavior( tokio::time::MissedTickBehavior::Delay);
            info!("weather refresh loop started, interval {:?}", config.refresh_interval);

            loop {
                ticker.tick().await;
                let bundle = refresh_once( &client, &cache).await;
                if let Some(bundle) = bundle {
                    cache.set( bundle, config.cache_expiry, utc_now());
                }
            }
        }))
    }
}

/// fetch all enabled kinds and build the replacement bundle. Partial failures
/// are recorded next to the data that did arrive; the previous bundle's value
/// for a failed kind is carried over so readers never lose the last good data.
async fn refresh_once (client: &WeatherClient, cache: &WeatherCache) -> Option<WeatherBundle> {
    let results = client.fetch_all().await;
    if results.is_empty() {
        return None; // nothing enabled
    }

    let previous = cache.get().unwrap_or_default();
    let mut bundle = WeatherBundle {
        metar: previous.metar,
        taf: previous.taf,
        notams: previous.notams,
        last_updated: Some( utc_now()),
        fetch_errors: Vec::new(),
    };

    for result in results {
        match result.data {
            Ok(data) => match result.kind {
                WeatherKind::Metar => bundle.metar = Some(data),
                WeatherKind::Taf => bundle.taf = Some(data),
                WeatherKind::Notams => bundle.notams = Some(data),
            },
            Err(e) => {
                warn!("weather fetch failed for {}: {e}", result.kind);
                bundle.fetch_errors.push( format!("{}: {e}", result.kind));
            }
        }
    }

    Some(bundle)
}
