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

//! the co-atc service binary: load config, open storage, spawn the engine
//! tasks and serve the HTTP/websocket facade until interrupted. Fatal init
//! failures (config, database, bind) exit non-zero; everything after startup
//! is handled by the per-task retry policies.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc,RwLock};
use std::time::Duration;

use anyhow::Context;
use structopt::StructOpt;
use tracing::{error,info,warn};
use tracing_subscriber::EnvFilter;

use coatc_adsb::client::AdsbClient;
use coatc_adsb::phase::RunwayData;
use coatc_adsb::tracker::{spawn_tracker_loop,Tracker};
use coatc_audio::FrequencyManager;
use coatc_audio::upstream::spawn_upstream_loop;
use coatc_common::events::Broadcaster;
use coatc_context::aggregator::{DataAggregator,StationInfo};
use coatc_server::AppState;
use coatc_server::config::CoatcConfig;
use coatc_server::routes::build_router;
use coatc_server::ws::WsHub;
use coatc_storage::Database;
use coatc_storage::clearances::ClearanceStorage;
use coatc_storage::transcriptions::TranscriptionStorage;
use coatc_transcription::llm::LlmClient;
use coatc_transcription::post_processor::{spawn_post_processor_loop,PostProcessor};
use coatc_transcription::realtime::spawn_transcription_loop;
use coatc_weather::service::WeatherService;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(StructOpt)]
#[structopt(name="coatc", about="airspace situational awareness service")]
struct Opt {
    /// path to the RON config file
    #[structopt(short, long, parse(from_os_str), default_value="coatc.ron")]
    config: PathBuf,
}

#[tokio::main]
async fn main () -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter( EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let opt = Opt::from_args();
    let config = CoatcConfig::load( &opt.config)
        .with_context(|| format!("loading config from {}", opt.config.display()))?;
    info!("starting co-atc for {}", config.station.airport_code);

    //--- storage
    let db = Database::open( std::path::Path::new( &config.storage.db_path))
        .with_context(|| format!("opening database {}", config.storage.db_path))?;
    let transcription_storage = TranscriptionStorage::new( db.clone());
    let clearance_storage = ClearanceStorage::new( db);

    //--- station (config value plus live override)
    let station = Arc::new( RwLock::new( config.station.position()));

    //--- runway geometry (optional data file)
    let runways = match &config.adsb.runways_path {
        Some(path) => match RunwayData::load( std::path::Path::new(path)) {
            Ok(data) => {
                info!("loaded runway data for {} ({} runways)", data.airport, data.runway_ids().len());
                Some(data)
            }
            Err(e) => {
                warn!("runway data unavailable ({e}), phase detection runs without geometry");
                None
            }
        },
        None => None,
    };

    //--- tracker and the broadcast hub
    let tracker = Arc::new( Tracker::new(
        config.adsb.clone(), config.flight_phases.clone(), station.clone(), runways.clone()));
    let (hub, hub_task) = WsHub::spawn( tracker.clone());
    let broadcaster: Arc<dyn Broadcaster> = Arc::new( hub.clone());

    let mut tasks = vec![hub_task];

    let adsb_client = AdsbClient::new( config.adsb.clone())
        .context( "building surveillance client")?;
    tasks.push( spawn_tracker_loop(
        tracker.clone(), adsb_client, broadcaster.clone(), config.adsb.fetch_interval));

    //--- audio fan-out, one upstream per frequency
    let frequencies = Arc::new( FrequencyManager::new( &config.frequencies, config.audio.fanout_capacity));
    for freq in frequencies.get_all() {
        tasks.push( spawn_upstream_loop(
            frequencies.clone(), config.audio.clone(), freq.id.clone(), freq.url.clone()));
    }

    //--- weather cache
    let weather = Arc::new( WeatherService::new( config.weather.clone()));
    tasks.push( weather.spawn_refresh_loop().context( "starting weather refresh loop")?);

    //--- transcription per enabled frequency
    for freq in frequencies.transcribe_enabled() {
        tasks.push( spawn_transcription_loop(
            config.transcription.clone(),
            frequencies.clone(),
            transcription_storage.clone(),
            broadcaster.clone(),
            freq.id.clone(),
            config.audio.ffmpeg_sample_rate,
            config.audio.ffmpeg_channels,
        ));
    }

    //--- post-processing with the context aggregator as template renderer
    let aggregator = Arc::new( DataAggregator::new(
        tracker.clone(),
        weather.clone(),
        transcription_storage.clone(),
        frequencies.clone(),
        runways,
        StationInfo {
            airport_code: config.station.airport_code.clone(),
            elevation_ft: config.station.elevation_ft,
        },
        config.flight_phases.airport_range_nm,
        config.context.clone(),
    ));
    let llm = Arc::new( LlmClient::new(
        &config.post_processing.api_base_url,
        &config.transcription.api_key,
        &config.post_processing.model,
        config.post_processing.request_timeout,
    ).context( "building language model client")?);
    let frequency_names: HashMap<String,String> = config.frequencies.iter()
        .map(|f| (f.id.clone(), f.name.clone())).collect();
    let post_processor = Arc::new( PostProcessor::new(
        transcription_storage.clone(),
        clearance_storage.clone(),
        llm,
        aggregator,
        broadcaster.clone(),
        config.post_processing.clone(),
        frequency_names,
    ));
    tasks.push( spawn_post_processor_loop( post_processor));

    //--- the HTTP facade
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let state = Arc::new( AppState {
        config,
        station,
        tracker,
        frequencies,
        weather,
        transcriptions: transcription_storage,
        clearances: clearance_storage,
        hub,
        started_at: coatc_common::datetime::utc_now(),
    });

    let listener = tokio::net::TcpListener::bind( &bind_addr).await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!("listening on {bind_addr}");

    axum::serve( listener, build_router(state))
        .with_graceful_shutdown( shutdown_signal())
        .await
        .context( "server error")?;

    //--- bounded shutdown: no task may hold the process hostage
    info!("shutting down {} tasks", tasks.len());
    for task in &tasks {
        task.abort();
    }
    let join_all = futures::future::join_all(tasks);
    if tokio::time::timeout( SHUTDOWN_GRACE, join_all).await.is_err() {
        error!("tasks did not stop within {SHUTDOWN_GRACE:?}");
    }
    info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal () {
    let _ = tokio::signal::ctrl_c().await;
    info!("interrupt received, shutting down");
}
