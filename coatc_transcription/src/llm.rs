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

//! language model client for post-processing. One POST per batch:
//! `{model, messages: [{role: system}, {role: user}]}` answered by a JSON
//! array of enriched transcription rows (possibly wrapped in a markdown code
//! fence, which is stripped before parsing).

use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};
use tracing::{debug,warn};

use coatc_storage::models::ExtractedClearance;

use crate::errors::{Result,TranscriptionError};

/// one row of the batch exchanged with the model. Context rows arrive with
/// the processed fields filled; new rows arrive blank and come back enriched.
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct BatchItem {
    pub id: i64,
    pub content: String,
    #[serde(default)]
    pub content_processed: String,
    #[serde(default)]
    pub speaker_type: String,
    #[serde(default)]
    pub callsign: String,
    #[serde(default)]
    pub clearances: Vec<ExtractedClearance>,
    pub timestamp: DateTime<Utc>,
}

/// the model seam the post-processor depends on
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn post_process_batch (&self, system_prompt: &str, user_input: &str) -> Result<Vec<BatchItem>>;
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

pub struct LlmClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl LlmClient {
    pub fn new (base_url: &str, api_key: &str, model: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok( LlmClient {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for LlmClient {
    async fn post_process_batch (&self, system_prompt: &str, user_input: &str) -> Result<Vec<BatchItem>> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage{ role: "system", content: system_prompt },
                ChatMessage{ role: "user", content: user_input },
            ],
        };

        let resp = self.http_client.post( format!("{}/chat/completions", self.base_url))
            .bearer_auth( &self.api_key)
            .json( &request)
            .send().await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err( TranscriptionError::StatusError( resp.status().as_u16()));
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat.choices.first().map(|c| c.message.content.as_str()).unwrap_or("");
        if content.trim().is_empty() {
            return Err( TranscriptionError::VendorError( "empty completion".to_string()));
        }

        parse_batch_response(content)
    }
}

/// parse the model's reply: a JSON array of batch rows, tolerating a
/// surrounding markdown code fence
pub fn parse_batch_response (content: &str) -> Result<Vec<BatchItem>> {
    let stripped = strip_code_fences( content);
    serde_json::from_str( stripped)
        .map_err(|e| TranscriptionError::ParseError( format!("batch response: {e}")))
}

fn strip_code_fences (s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else { return s };
    // drop the info string ("json") up to the first newline, and the closing fence
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROW: &str = r#"{"id": 7, "content": "raw", "content_processed": "ACA123 cleared to land",
        "speaker_type": "ATC", "callsign": "ACA123",
        "clearances": [{"callsign": "ACA123", "type": "landing", "text": "cleared to land 24R", "runway": "24R"}],
        "timestamp": "2025-06-01T12:00:00Z"}"#;

    #[test]
    fn test_parse_plain_array() {
        let items = parse_batch_response( &format!("[{ROW}]")).unwrap();
        assert_eq!( items.len(), 1);
        assert_eq!( items[0].id, 7);
        assert_eq!( items[0].callsign, "ACA123");
        assert_eq!( items[0].clearances.len(), 1);
        assert_eq!( items[0].clearances[0].runway.as_deref(), Some("24R"));
    }

    #[test]
    fn test_parse_fenced_array() {
        let fenced = format!("```json\n[{ROW}]\n```");
        let items = parse_batch_response( &fenced).unwrap();
        assert_eq!( items.len(), 1);
    }

    #[test]
    fn test_parse_rejects_non_array() {
        assert!( parse_batch_response( "not json").is_err());
        assert!( parse_batch_response( r#"{"id": 1}"#).is_err());
    }

    #[test]
    fn test_blank_new_row_roundtrip() {
        // new rows are marshalled with blank processed fields
        let item = BatchItem {
            id: 3,
            content: "speedbird niner heavy".into(),
            content_processed: String::new(),
            speaker_type: String::new(),
            callsign: String::new(),
            clearances: vec![],
            timestamp: "2025-06-01T12:00:00Z".parse().unwrap(),
        };
        let v: serde_json::Value = serde_json::from_str( &serde_json::to_string(&item).unwrap()).unwrap();
        assert_eq!( v["content_processed"], "");
        assert_eq!( v["clearances"].as_array().unwrap().len(), 0);
    }
}
