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

//! realtime speech-to-text websocket session, one per transcribe-enabled
//! frequency. PCM from the fanout buffer is chunked, base64 encoded and
//! appended to the vendor's audio buffer; the vendor's VAD turns come back
//! as delta (interim) and completed (final) transcription events. Finals are
//! persisted unprocessed and broadcast; the post-processor enriches them
//! later.

use std::{sync::Arc, time::Duration};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::{SinkExt,StreamExt,stream::{SplitSink,SplitStream}};
use serde::{Serialize,Deserialize};
use serde_json::json;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async,MaybeTlsStream,WebSocketStream,
    tungstenite::{client::IntoClientRequest,http::header::AUTHORIZATION,http::HeaderValue,protocol::Message}};
use tracing::{debug,info,warn,error};

use coatc_audio::FrequencyManager;
use coatc_audio::chunker::AudioChunker;
use coatc_common::datetime::utc_now;
use coatc_common::events::{Broadcaster,Envelope};
use coatc_storage::transcriptions::TranscriptionStorage;

use crate::{TranscriptionConfig,TranscriptionEvent};
use crate::errors::{Result,TranscriptionError};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/* #region websocket messages *************************************************************************/

// out: {"type":"transcription_session.update","session":{...}}
// out: {"type":"input_audio_buffer.append","audio":"<base64 pcm16>"}
// in:  {"type":"conversation.item.input_audio_transcription.delta","delta":"..."}
// in:  {"type":"conversation.item.input_audio_transcription.completed","transcript":"..."}

#[derive(Serialize,Debug)]
#[serde(tag="type")]
pub enum ClientEvent {
    #[serde(rename="transcription_session.update")]
    SessionUpdate { session: SessionUpdate },

    #[serde(rename="input_audio_buffer.append")]
    AudioAppend { audio: String },
}

#[derive(Serialize,Debug)]
pub struct SessionUpdate {
    pub input_audio_format: String,
    pub input_audio_transcription: InputAudioTranscription,
    #[serde(skip_serializing_if="Option::is_none")]
    pub turn_detection: Option<TurnDetection>,
    #[serde(skip_serializing_if="Option::is_none")]
    pub input_audio_noise_reduction: Option<NoiseReduction>,
}

#[derive(Serialize,Debug)]
pub struct InputAudioTranscription {
    pub model: String,
    #[serde(skip_serializing_if="String::is_empty")]
    pub language: String,
    #[serde(skip_serializing_if="String::is_empty")]
    pub prompt: String,
}

#[derive(Serialize,Debug)]
pub struct TurnDetection {
    #[serde(rename="type")]
    pub detection_type: String,
    pub threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,
}

#[derive(Serialize,Debug)]
pub struct NoiseReduction {
    #[serde(rename="type")]
    pub reduction_type: String,
}

#[derive(Deserialize,Debug)]
#[serde(tag="type")]
pub enum ServerEvent {
    #[serde(rename="conversation.item.input_audio_transcription.delta")]
    TranscriptionDelta {
        #[serde(default)]
        delta: String,
    },

    #[serde(rename="conversation.item.input_audio_transcription.completed")]
    TranscriptionCompleted {
        #[serde(default)]
        transcript: String,
    },

    #[serde(rename="error")]
    Error { error: serde_json::Value },

    #[serde(other)]
    Ignored,
}

impl ServerEvent {
    /// map a vendor event onto our event model, dropping the housekeeping ones
    pub fn into_transcription_event (self) -> Option<TranscriptionEvent> {
        match self {
            ServerEvent::TranscriptionDelta { delta } if !delta.is_empty() => {
                Some( TranscriptionEvent::Delta{ text: delta, timestamp: utc_now() })
            }
            ServerEvent::TranscriptionCompleted { transcript } if !transcript.trim().is_empty() => {
                Some( TranscriptionEvent::Completed{ text: transcript.trim().to_string(), timestamp: utc_now() })
            }
            _ => None,
        }
    }
}

/* #endregion websocket messages */

fn session_update (config: &TranscriptionConfig) -> SessionUpdate {
    let turn_detection = if config.turn_detection_type.is_empty() || config.turn_detection_type == "none" {
        None
    } else {
        Some( TurnDetection {
            detection_type: config.turn_detection_type.clone(),
            threshold: config.vad_threshold,
            prefix_padding_ms: config.prefix_padding_ms,
            silence_duration_ms: config.silence_duration_ms,
        })
    };

    SessionUpdate {
        input_audio_format: "pcm16".to_string(),
        input_audio_transcription: InputAudioTranscription {
            model: config.model.clone(),
            language: config.language.clone(),
            prompt: config.prompt.clone(),
        },
        turn_detection,
        input_audio_noise_reduction: if config.noise_reduction.is_empty() { None } else {
            Some( NoiseReduction{ reduction_type: config.noise_reduction.clone() })
        },
    }
}

async fn connect (config: &TranscriptionConfig) -> Result<WsStream> {
    let mut request = config.realtime_url.as_str().into_client_request()?;
    let headers = request.headers_mut();
    let auth_val = format!("Bearer {}", config.api_key);
    headers.append( AUTHORIZATION, HeaderValue::from_str( auth_val.as_str())
        .map_err(|e| TranscriptionError::OpFailedError( e.to_string()))?);
    headers.append( "OpenAI-Beta", HeaderValue::from_static( "realtime=v1"));

    let (mut ws, _) = connect_async(request).await?;

    let update = ClientEvent::SessionUpdate { session: session_update(config) };
    let json = serde_json::to_string( &update).map_err(|e| TranscriptionError::ParseError( e.to_string()))?;
    ws.send( Message::Text(json)).await?;

    Ok(ws)
}

async fn send_audio_chunk (tx: &mut SplitSink<WsStream,Message>, chunk: &[u8]) -> Result<()> {
    let event = ClientEvent::AudioAppend { audio: BASE64.encode(chunk) };
    let json = serde_json::to_string( &event).map_err(|e| TranscriptionError::ParseError( e.to_string()))?;
    Ok( tx.send( Message::Text(json)).await?)
}

/// handle one final transcript: persist unprocessed, then broadcast
fn persist_and_broadcast (
    storage: &TranscriptionStorage,
    broadcaster: &dyn Broadcaster,
    frequency_id: &str,
    event: TranscriptionEvent,
) {
    match event {
        TranscriptionEvent::Completed { text, timestamp } => {
            match storage.insert( frequency_id, &text, timestamp) {
                Ok(id) => {
                    broadcaster.broadcast( Envelope::new( "transcription", json!({
                        "id": id,
                        "frequency_id": frequency_id,
                        "text": text,
                        "timestamp": timestamp,
                        "is_complete": true,
                        "is_processed": false,
                    })));
                }
                Err(e) => error!("failed to persist transcription on {frequency_id}: {e}"),
            }
        }
        TranscriptionEvent::Delta { text, timestamp } => {
            // interim text is broadcast for live display, never persisted
            broadcaster.broadcast( Envelope::new( "transcription", json!({
                "frequency_id": frequency_id,
                "text": text,
                "timestamp": timestamp,
                "is_complete": false,
            })));
        }
    }
}

/// run one connected session until the websocket drops. The audio pump and
/// the event reader run concurrently; either side ending tears the session
/// down for the caller's backoff loop.
async fn run_session (
    config: &TranscriptionConfig,
    manager: &FrequencyManager,
    storage: &TranscriptionStorage,
    broadcaster: &dyn Broadcaster,
    frequency_id: &str,
    sample_rate: u32,
    channels: u32,
) -> Result<()> {
    let ws = connect(config).await?;
    let (mut ws_tx, mut ws_rx) = ws.split();
    info!("transcription session open for {frequency_id}");

    let fanout = manager.fanout(frequency_id)
        .ok_or_else(|| TranscriptionError::OpFailedError( format!("no fanout buffer for {frequency_id}")))?;
    let reader = fanout.create_reader( &format!("transcription-{frequency_id}"));
    let mut chunker = AudioChunker::new( sample_rate, channels, config.chunk_ms);

    // audio pump: fanout -> chunker -> base64 append messages
    let pump = async {
        let mut buf = vec![0u8; 8192];
        loop {
            let n = reader.read( &mut buf).await;
            if n == 0 {
                // idle stream; keep waiting, the upstream reconnects on its own
                continue;
            }
            for chunk in chunker.push( &buf[..n]) {
                send_audio_chunk( &mut ws_tx, &chunk).await?;
            }
        }
        #[allow(unreachable_code)]
        Ok::<(),TranscriptionError>(())
    };

    // event reader: vendor events -> persistence + broadcast
    let events = async {
        while let Some(msg) = ws_rx.next().await {
            let msg = msg?;
            let Message::Text(text) = msg else { continue };
            match serde_json::from_str::<ServerEvent>( &text) {
                Ok( ServerEvent::Error{ error }) => {
                    return Err( TranscriptionError::VendorError( error.to_string()));
                }
                Ok(event) => {
                    if let Some(te) = event.into_transcription_event() {
                        persist_and_broadcast( storage, broadcaster, frequency_id, te);
                    }
                }
                Err(e) => debug!("ignoring unparsable realtime event: {e}"),
            }
        }
        Err( TranscriptionError::OpFailedError( "websocket closed".to_string()))
    };

    tokio::select! {
        r = pump => r,
        r = events => r,
    }
}

/// spawn the forever-reconnecting transcription task for one frequency.
/// Exponential backoff between the configured bounds; the attempt counter
/// resets after every successful session. Audio fanout to listeners is
/// unaffected while this retries.
pub fn spawn_transcription_loop (
    config: TranscriptionConfig,
    manager: Arc<FrequencyManager>,
    storage: TranscriptionStorage,
    broadcaster: Arc<dyn Broadcaster>,
    frequency_id: String,
    sample_rate: u32,
    channels: u32,
) -> JoinHandle<()> {
    tokio::spawn( async move {
        let mut attempts = 0u32;
        let mut backoff = Duration::from_millis( config.retry_initial_backoff_ms);
        let max_backoff = Duration::from_millis( config.retry_max_backoff_ms);

        loop {
            match run_session( &config, &manager, &storage, broadcaster.as_ref(), &frequency_id, sample_rate, channels).await {
                Ok(()) => {
                    attempts = 0;
                    backoff = Duration::from_millis( config.retry_initial_backoff_ms);
                }
                Err(e) => {
                    attempts += 1;
                    if attempts > config.retry_max_attempts {
                        error!("transcription for {frequency_id} gave up after {} attempts: {e}", attempts - 1);
                        return;
                    }
                    warn!("transcription session for {frequency_id} failed (attempt {attempts}): {e}, retrying in {backoff:?}");
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min( max_backoff);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_update_wire_shape() {
        let config = TranscriptionConfig {
            model: "gpt-4o-transcribe".into(),
            language: "en".into(),
            vad_threshold: 0.6,
            ..Default::default()
        };
        let update = ClientEvent::SessionUpdate { session: session_update( &config) };
        let v: serde_json::Value = serde_json::from_str( &serde_json::to_string(&update).unwrap()).unwrap();

        assert_eq!( v["type"], "transcription_session.update");
        assert_eq!( v["session"]["input_audio_format"], "pcm16");
        assert_eq!( v["session"]["input_audio_transcription"]["model"], "gpt-4o-transcribe");
        assert_eq!( v["session"]["turn_detection"]["type"], "server_vad");
        assert_eq!( v["session"]["turn_detection"]["threshold"], 0.6);
    }

    #[test]
    fn test_turn_detection_omitted_when_none() {
        let config = TranscriptionConfig { turn_detection_type: "none".into(), ..Default::default() };
        let update = ClientEvent::SessionUpdate { session: session_update( &config) };
        let v: serde_json::Value = serde_json::from_str( &serde_json::to_string(&update).unwrap()).unwrap();
        assert!( v["session"].get("turn_detection").is_none());
    }

    #[test]
    fn test_server_event_mapping() {
        let e: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.delta","delta":"air canada"}"#).unwrap();
        assert!( matches!( e.into_transcription_event(), Some(TranscriptionEvent::Delta{..})));

        let e: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":" cleared to land "}"#).unwrap();
        match e.into_transcription_event() {
            Some( TranscriptionEvent::Completed{ text, .. }) => assert_eq!( text, "cleared to land"),
            other => panic!("expected completed event, got {other:?}"),
        }

        // housekeeping events map to nothing
        let e: ServerEvent = serde_json::from_str( r#"{"type":"input_audio_buffer.committed"}"#).unwrap();
        assert!( e.into_transcription_event().is_none());

        // an empty final is dropped, not persisted
        let e: ServerEvent = serde_json::from_str(
            r#"{"type":"conversation.item.input_audio_transcription.completed","transcript":"  "}"#).unwrap();
        assert!( e.into_transcription_event().is_none());
    }

    #[test]
    fn test_audio_append_is_base64() {
        let event = ClientEvent::AudioAppend { audio: BASE64.encode( [0u8, 1, 2, 3]) };
        let v: serde_json::Value = serde_json::from_str( &serde_json::to_string(&event).unwrap()).unwrap();
        assert_eq!( v["type"], "input_audio_buffer.append");
        assert_eq!( v["audio"], "AAECAw==");
    }
}
