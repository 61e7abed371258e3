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

//! per-frequency upstream task: connect to the station's audio URL, decode
//! through ffmpeg into canonical s16le PCM, and feed the fanout buffer.
//! Connect failures back off exponentially; after the retry budget the
//! frequency enters `error` status and the whole cycle restarts after the
//! reconnect interval.

use std::{process::Stdio, sync::Arc, time::Duration};
use futures::StreamExt;
use tokio::io::{AsyncReadExt,AsyncWriteExt};
use tokio::process::{Child,Command};
use tokio::task::JoinHandle;
use tracing::{debug,info,warn,error};

use coatc_common::datetime::utc_now;

use crate::{AudioConfig,FrequencyManager,FrequencyStatus};
use crate::fanout::FanoutBuffer;
use crate::errors::{AudioError,Result};

/// stream metadata from the upstream response headers
#[derive(Debug,Clone,Default)]
pub struct StreamMetadata {
    pub content_type: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub bitrate: Option<u32>,
    pub format: Option<String>,
}

/// append a timestamp cache breaker so intermediaries never serve a stale stream
fn add_cache_breaker (url: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}nocache={}", utc_now().timestamp_nanos_opt().unwrap_or(0))
}

fn extract_metadata (headers: &reqwest::header::HeaderMap) -> StreamMetadata {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);

    let content_type = get("content-type");
    let format = content_type.as_deref().map(|ct| match ct {
        "audio/mpeg" => "mp3",
        "audio/aac" => "aac",
        "audio/ogg" => "ogg",
        _ => "unknown",
    }.to_string());

    StreamMetadata {
        content_type,
        name: get("icy-name"),
        description: get("icy-description"),
        genre: get("icy-genre"),
        bitrate: get("icy-br").and_then(|s| s.trim().parse().ok()),
        format,
    }
}

pub struct UpstreamReader {
    config: AudioConfig,
    http_client: reqwest::Client,
}

impl UpstreamReader {
    pub fn new (config: AudioConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .connect_timeout( config.connect_timeout)
            .pool_idle_timeout( Duration::from_secs(90))
            .build()?;
        Ok( UpstreamReader { config, http_client })
    }

    /// open the upstream stream, retrying with exponential backoff
    async fn connect (&self, url: &str) -> Result<reqwest::Response> {
        let url = add_cache_breaker(url);
        let mut delay = self.config.retry_initial_delay;
        let mut last_err: Option<AudioError> = None;

        for attempt in 0..self.config.max_connect_retries {
            if attempt > 0 {
                warn!("retrying audio stream connect ({} of {}): {url}", attempt + 1, self.config.max_connect_retries);
                tokio::time::sleep(delay).await;
                delay *= 2;
            }

            let result = self.http_client.get( &url)
                .header( "Accept", "*/*")
                .header( "Connection", "keep-alive")
                .header( "User-Agent", "Co-ATC/1.0")
                .send().await;

            match result {
                Ok(resp) if resp.status() == reqwest::StatusCode::OK => {
                    debug!("connected to audio stream {url}");
                    return Ok(resp);
                }
                Ok(resp) => {
                    last_err = Some( AudioError::StatusError( resp.status().as_u16()));
                }
                Err(e) => {
                    last_err = Some( AudioError::TransportError(e));
                }
            }
        }

        Err( last_err.unwrap_or( AudioError::OpFailedError( "no connect attempt made".to_string())))
    }

    fn spawn_transcoder (&self) -> Result<Child> {
        Command::new( &self.config.ffmpeg_path)
            .args([ "-hide_banner", "-loglevel", "error", "-i", "pipe:0",
                    "-f", "s16le", "-acodec", "pcm_s16le",
                    "-ar", &self.config.ffmpeg_sample_rate.to_string(),
                    "-ac", &self.config.ffmpeg_channels.to_string(),
                    "pipe:1" ])
            .stdin( Stdio::piped())
            .stdout( Stdio::piped())
            .stderr( Stdio::null())
            .kill_on_drop( true)
            .spawn()
            .map_err(|e| AudioError::OpFailedError( format!("failed to start transcoder: {e}")))
    }

    /// run one connection: upstream body -> transcoder stdin, transcoder
    /// stdout -> fanout. Returns when either side of the pipeline ends.
    async fn pump (&self, resp: reqwest::Response, fanout: &FanoutBuffer) -> Result<()> {
        let mut child = self.spawn_transcoder()?;
        let mut stdin = child.stdin.take()
            .ok_or_else(|| AudioError::OpFailedError( "transcoder stdin unavailable".to_string()))?;
        let mut stdout = child.stdout.take()
            .ok_or_else(|| AudioError::OpFailedError( "transcoder stdout unavailable".to_string()))?;

        // feed the compressed upstream into the transcoder
        let feed_task = tokio::spawn( async move {
            let mut stream = resp.bytes_stream();
            while let Some(chunk) = stream.next().await {
                match chunk {
                    Ok(bytes) => {
                        if stdin.write_all( &bytes).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        debug!("upstream body ended: {e}");
                        break;
                    }
                }
            }
            // dropping stdin closes the transcoder's input
        });

        // drain decoded PCM into the fanout buffer
        let mut buf = vec![0u8; 4096];
        let result = loop {
            match stdout.read( &mut buf).await {
                Ok(0) => break Ok(()), // transcoder ended
                Ok(n) => {
                    if let Err(e) = fanout.write( &buf[..n]) {
                        break Err(e);
                    }
                }
                Err(e) => break Err( AudioError::IOError(e)),
            }
        };

        feed_task.abort();
        let _ = child.kill().await;
        result
    }
}

/// spawn the forever-reconnecting upstream task for one frequency
pub fn spawn_upstream_loop (
    manager: Arc<FrequencyManager>,
    config: AudioConfig,
    frequency_id: String,
    url: String,
) -> JoinHandle<()> {
    tokio::spawn( async move {
        let reader = match UpstreamReader::new( config.clone()) {
            Ok(r) => r,
            Err(e) => {
                error!("upstream reader init failed for {frequency_id}: {e}");
                manager.set_status( &frequency_id, FrequencyStatus::Error, Some( e.to_string()));
                return;
            }
        };

        let Some(fanout) = manager.fanout( &frequency_id) else {
            error!("no fanout buffer for frequency {frequency_id}");
            return;
        };

        loop {
            manager.set_status( &frequency_id, FrequencyStatus::Connecting, None);

            match reader.connect( &url).await {
                Ok(resp) => {
                    let meta = extract_metadata( resp.headers());
                    manager.set_stream_metadata( &frequency_id, meta.bitrate, meta.format.clone());
                    manager.set_status( &frequency_id, FrequencyStatus::Active, None);
                    info!("frequency {frequency_id} active ({:?} {:?})", meta.format, meta.bitrate);

                    match reader.pump( resp, &fanout).await {
                        Ok(()) => warn!("audio pipeline for {frequency_id} ended, reconnecting"),
                        Err(e) => {
                            warn!("audio pipeline for {frequency_id} failed: {e}");
                            manager.set_status( &frequency_id, FrequencyStatus::Error, Some( e.to_string()));
                        }
                    }
                }
                Err(e) => {
                    warn!("connect to {frequency_id} upstream failed: {e}");
                    manager.set_status( &frequency_id, FrequencyStatus::Error, Some( e.to_string()));
                }
            }

            tokio::time::sleep( config.reconnect_interval).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_breaker() {
        let url = add_cache_breaker( "http://example.com/stream");
        assert!( url.starts_with( "http://example.com/stream?nocache="));
        let url = add_cache_breaker( "http://example.com/stream?id=1");
        assert!( url.contains( "&nocache="));
    }

    #[test]
    fn test_metadata_extraction() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert( "content-type", "audio/mpeg".parse().unwrap());
        headers.insert( "icy-name", "Tower 118.7".parse().unwrap());
        headers.insert( "icy-br", "64".parse().unwrap());

        let meta = extract_metadata( &headers);
        assert_eq!( meta.format.as_deref(), Some("mp3"));
        assert_eq!( meta.name.as_deref(), Some("Tower 118.7"));
        assert_eq!( meta.bitrate, Some(64));
    }
}
