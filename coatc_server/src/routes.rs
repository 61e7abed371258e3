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

//! the inbound HTTP surface: JSON snapshots, the WAV audio stream, the
//! websocket upgrade and the diagnostics endpoints. Validation failures are
//! 4xx; nothing here leaks stack traces into payloads.

use std::{collections::HashMap, sync::Arc, time::Duration};
use axum::{
    Router,
    body::Body,
    extract::{Path as AxumPath, Query, State, ws::WebSocketUpgrade},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures::stream;
use serde_json::json;
use tower_http::cors::{Any,CorsLayer};
use tower_http::services::ServeDir;
use tracing::{debug,info,warn};

use coatc_audio::wav::WavReader;
use coatc_common::datetime::utc_now;
use coatc_common::geo::{GeoPos,parse_coordinates};
use coatc_storage::models::{ClearanceStatus,SpeakerType};

use crate::AppState;
use crate::ws::serve_client;

pub fn build_router (state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route( "/aircraft", get(get_all_aircraft))
        .route( "/aircraft/:hex", get(get_aircraft_by_hex))
        .route( "/aircraft/:hex/tracks", get(get_aircraft_tracks))
        .route( "/frequencies", get(get_all_frequencies))
        .route( "/frequencies/:id", get(get_frequency_by_id))
        .route( "/stream/:id", get(stream_audio).head(stream_audio_head))
        .route( "/ws", get(ws_upgrade))
        .route( "/transcriptions", get(get_transcriptions))
        .route( "/transcriptions/frequency/:id", get(get_transcriptions_by_frequency))
        .route( "/transcriptions/time-range", get(get_transcriptions_by_time_range))
        .route( "/transcriptions/speaker/:speaker", get(get_transcriptions_by_speaker))
        .route( "/transcriptions/callsign/:callsign", get(get_transcriptions_by_callsign))
        .route( "/clearances", get(get_recent_clearances))
        .route( "/clearances/callsign/:callsign", get(get_clearances_by_callsign))
        .route( "/clearances/type/:type", get(get_clearances_by_type))
        .route( "/wx", get(get_weather))
        .route( "/station", get(get_station).post(set_station_override))
        .route( "/health", get(get_health))
        .route( "/config", get(get_config));

    let cors = if state.config.server.cors_allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = state.config.server.cors_allowed_origins.iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin( tower_http::cors::AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
    };

    Router::new()
        .nest( "/api/v1", api)
        .fallback_service( ServeDir::new( state.config.server.static_files_dir.clone()))
        .layer(cors)
        .with_state( state)
}

/* #region aircraft ***********************************************************************************/

async fn get_all_aircraft (State(state): State<Arc<AppState>>) -> Response {
    let aircraft = state.tracker.get_all();
    Json( json!({
        "timestamp": utc_now(),
        "count": aircraft.len(),
        "aircraft": aircraft,
    })).into_response()
}

async fn get_aircraft_by_hex (State(state): State<Arc<AppState>>, AxumPath(hex): AxumPath<String>) -> Response {
    match state.tracker.get_by_hex( &hex) {
        Some(aircraft) => Json(aircraft).into_response(),
        None => error_response( StatusCode::NOT_FOUND, "aircraft not found"),
    }
}

async fn get_aircraft_tracks (
    State(state): State<Arc<AppState>>,
    AxumPath(hex): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    let window = match params.get("window_secs").map(|s| s.parse::<u64>()) {
        Some(Ok(secs)) => Duration::from_secs(secs),
        Some(Err(_)) => return error_response( StatusCode::BAD_REQUEST, "invalid window_secs"),
        None => state.config.adsb.trail_window,
    };
    match state.tracker.get_tracks( &hex, window) {
        Some(tracks) => Json( json!({ "hex": hex, "count": tracks.len(), "tracks": tracks })).into_response(),
        None => error_response( StatusCode::NOT_FOUND, "aircraft not found"),
    }
}

/* #endregion aircraft */

/* #region frequencies and streaming ******************************************************************/

async fn get_all_frequencies (State(state): State<Arc<AppState>>) -> Response {
    let frequencies = state.frequencies.get_all();
    Json( json!({
        "timestamp": utc_now(),
        "count": frequencies.len(),
        "frequencies": frequencies,
    })).into_response()
}

async fn get_frequency_by_id (State(state): State<Arc<AppState>>, AxumPath(id): AxumPath<String>) -> Response {
    match state.frequencies.get( &id) {
        Some(frequency) => Json(frequency).into_response(),
        None => error_response( StatusCode::NOT_FOUND, "frequency not found"),
    }
}

/// long-lived response carrying WAV framed PCM from the fanout buffer.
/// One HTTP connection is one fanout reader, identified by the client
/// supplied `id` query parameter.
async fn stream_audio (
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    let Some(fanout) = state.frequencies.fanout( &id) else {
        return error_response( StatusCode::NOT_FOUND, "frequency not found");
    };

    let reader_id = match params.get("id") {
        Some(client_id) if !client_id.is_empty() => format!("listener-{id}-{client_id}"),
        _ => return error_response( StatusCode::BAD_REQUEST, "missing listener id"),
    };

    debug!("starting audio stream for {id}, reader {reader_id}");
    let reader = fanout.create_reader( &reader_id);
    let mut wav = WavReader::new( reader, state.config.audio.ffmpeg_sample_rate, state.config.audio.ffmpeg_channels as u16);

    let body_stream = stream::unfold( wav, |mut wav| async move {
        let chunk = wav.next_chunk( 8192).await;
        if chunk.is_empty() {
            None // end of stream - the listener reconnects
        } else {
            Some( (Ok::<_,std::io::Error>( bytes::Bytes::from(chunk)), wav))
        }
    });

    Response::builder()
        .status( StatusCode::OK)
        .header( header::CONTENT_TYPE, "audio/wav")
        .header( header::CACHE_CONTROL, "no-cache, no-store")
        .body( Body::from_stream( body_stream))
        .unwrap_or_else(|_| error_response( StatusCode::INTERNAL_SERVER_ERROR, "stream setup failed"))
}

/// HEAD probe used by players to sniff the content type
async fn stream_audio_head (State(state): State<Arc<AppState>>, AxumPath(id): AxumPath<String>) -> Response {
    if state.frequencies.get( &id).is_none() {
        return error_response( StatusCode::NOT_FOUND, "frequency not found");
    }
    Response::builder()
        .status( StatusCode::OK)
        .header( header::CONTENT_TYPE, "audio/wav")
        .body( Body::empty())
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn ws_upgrade (State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    let queue_size = state.config.server.ws_client_queue_size;
    ws.on_upgrade( move |socket| serve_client( socket, hub, queue_size))
}

/* #endregion frequencies and streaming */

/* #region transcriptions and clearances **************************************************************/

fn limit_param (params: &HashMap<String,String>, default: usize) -> usize {
    params.get("limit").and_then(|s| s.parse().ok()).unwrap_or(default)
}

async fn get_transcriptions (State(state): State<Arc<AppState>>, Query(params): Query<HashMap<String,String>>) -> Response {
    let limit = limit_param( &params, 100);
    let offset = params.get("offset").and_then(|s| s.parse().ok()).unwrap_or(0);
    match state.transcriptions.get_recent( limit, offset) {
        Ok(records) => Json( json!({ "count": records.len(), "transcriptions": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_transcriptions_by_frequency (
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    match state.transcriptions.get_by_frequency( &id, limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "transcriptions": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_transcriptions_by_time_range (
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    let (Some(start), Some(end)) = (params.get("start"), params.get("end")) else {
        return error_response( StatusCode::BAD_REQUEST, "start and end are required");
    };
    let (Ok(start), Ok(end)) = (start.parse::<chrono::DateTime<chrono::Utc>>(), end.parse::<chrono::DateTime<chrono::Utc>>()) else {
        return error_response( StatusCode::BAD_REQUEST, "start/end must be RFC 3339 timestamps");
    };
    let offset = params.get("offset").and_then(|s| s.parse().ok()).unwrap_or(0);
    match state.transcriptions.get_by_time_range( start, end, limit_param( &params, 100), offset) {
        Ok(records) => Json( json!({ "count": records.len(), "transcriptions": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_transcriptions_by_speaker (
    State(state): State<Arc<AppState>>,
    AxumPath(speaker): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    let speaker = SpeakerType::from_str( &speaker.to_uppercase());
    match state.transcriptions.get_by_speaker( speaker, limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "transcriptions": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_transcriptions_by_callsign (
    State(state): State<Arc<AppState>>,
    AxumPath(callsign): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    match state.transcriptions.get_by_callsign( &callsign, limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "transcriptions": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_recent_clearances (State(state): State<Arc<AppState>>, Query(params): Query<HashMap<String,String>>) -> Response {
    match state.clearances.get_recent( limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "clearances": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_clearances_by_callsign (
    State(state): State<Arc<AppState>>,
    AxumPath(callsign): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    match state.clearances.get_by_callsign( &callsign, limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "clearances": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

async fn get_clearances_by_type (
    State(state): State<Arc<AppState>>,
    AxumPath(clearance_type): AxumPath<String>,
    Query(params): Query<HashMap<String,String>>,
) -> Response {
    let clearance_type = coatc_storage::models::ClearanceType::from_str( &clearance_type);
    match state.clearances.get_by_type( clearance_type, limit_param( &params, 100)) {
        Ok(records) => Json( json!({ "count": records.len(), "clearances": records })).into_response(),
        Err(e) => storage_error(e),
    }
}

/* #endregion transcriptions and clearances */

/* #region weather, station, diagnostics **************************************************************/

async fn get_weather (State(state): State<Arc<AppState>>) -> Response {
    match state.weather.get_weather() {
        Some(bundle) => Json(bundle).into_response(),
        None => Json( json!({ "last_updated": null, "fetch_errors": ["no weather data yet"] })).into_response(),
    }
}

async fn get_station (State(state): State<Arc<AppState>>) -> Response {
    let pos = *state.station.read().unwrap_or_else(|e| e.into_inner());
    Json( json!({
        "airport_code": state.config.station.airport_code,
        "latitude": pos.lat,
        "longitude": pos.lon,
        "elevation_ft": state.config.station.elevation_ft,
        "overridden": pos != state.config.station.position(),
    })).into_response()
}

/// accepts `{"latitude":..,"longitude":..}` or `{"coordinates":"lat,lon"}`
async fn set_station_override (State(state): State<Arc<AppState>>, Json(body): Json<serde_json::Value>) -> Response {
    let pos = if let (Some(lat), Some(lon)) = (body.get("latitude").and_then(|v| v.as_f64()),
                                               body.get("longitude").and_then(|v| v.as_f64())) {
        GeoPos::new( lat, lon)
    } else if let Some(coords) = body.get("coordinates").and_then(|v| v.as_str()) {
        match parse_coordinates(coords) {
            Ok(pos) => pos,
            Err(e) => return error_response( StatusCode::BAD_REQUEST, &e),
        }
    } else {
        return error_response( StatusCode::BAD_REQUEST, "latitude/longitude or coordinates required");
    };

    if !(-90.0..=90.0).contains( &pos.lat) || !(-180.0..=180.0).contains( &pos.lon) {
        return error_response( StatusCode::BAD_REQUEST, "coordinates out of range");
    }

    info!("station override set to {},{}", pos.lat, pos.lon);
    *state.station.write().unwrap_or_else(|e| e.into_inner()) = pos;
    Json( json!({ "latitude": pos.lat, "longitude": pos.lon })).into_response()
}

async fn get_health (State(state): State<Arc<AppState>>) -> Response {
    let last_fetch = state.tracker.last_fetch();
    let fetch_age_secs = last_fetch.map(|t| (utc_now() - t).num_seconds());

    let frequencies: Vec<_> = state.frequencies.get_all().into_iter()
        .map(|f| json!({ "id": f.id, "status": f.status, "last_error": f.last_error }))
        .collect();

    Json( json!({
        "status": "ok",
        "started_at": state.started_at,
        "aircraft_count": state.tracker.aircraft_count(),
        "surveillance_fetch_age_secs": fetch_age_secs,
        "weather_expired": state.weather.is_expired(),
        "frequencies": frequencies,
    })).into_response()
}

async fn get_config (State(state): State<Arc<AppState>>) -> Response {
    Json( state.config.sanitized()).into_response()
}

/* #endregion weather, station, diagnostics */

fn error_response (status: StatusCode, message: &str) -> Response {
    (status, Json( json!({ "error": message }))).into_response()
}

fn storage_error (e: coatc_storage::errors::StorageError) -> Response {
    warn!("storage query failed: {e}");
    error_response( StatusCode::INTERNAL_SERVER_ERROR, "storage query failed")
}
