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

//! the transcription path: realtime speech-to-text per transcribe-enabled
//! frequency, and the batched post-processor that turns raw transcripts into
//! cleaned, classified records with extracted clearances.

use std::time::Duration;
use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize};

use coatc_common::datetime::{deserialize_duration,serialize_duration};

pub mod realtime;
pub mod post_processor;
pub mod llm;
pub mod errors;

/// interim or final text from the speech-to-text session
#[derive(Debug,Clone,PartialEq)]
pub enum TranscriptionEvent {
    Delta { text: String, timestamp: DateTime<Utc> },
    Completed { text: String, timestamp: DateTime<Utc> },
}

/// realtime speech-to-text section of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub api_key: String,
    pub realtime_url: String,
    pub model: String,
    pub language: String,
    pub prompt: String,
    pub noise_reduction: String,

    pub turn_detection_type: String,
    pub vad_threshold: f64,
    pub prefix_padding_ms: u32,
    pub silence_duration_ms: u32,

    pub chunk_ms: u32,

    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
}

impl Default for TranscriptionConfig {
    fn default () -> Self {
        TranscriptionConfig {
            api_key: String::new(),
            realtime_url: "wss://api.openai.com/v1/realtime?intent=transcription".to_string(),
            model: "gpt-4o-transcribe".to_string(),
            language: "en".to_string(),
            prompt: String::new(),
            noise_reduction: "near_field".to_string(),
            turn_detection_type: "server_vad".to_string(),
            vad_threshold: 0.5,
            prefix_padding_ms: 300,
            silence_duration_ms: 500,
            chunk_ms: 100,
            retry_max_attempts: 10,
            retry_initial_backoff_ms: 1000,
            retry_max_backoff_ms: 30_000,
        }
    }
}

/// post-processing section of the config file
#[derive(Debug,Clone,Serialize,Deserialize)]
#[serde(default)]
pub struct PostProcessingConfig {
    pub enabled: bool,
    pub model: String,
    pub api_base_url: String,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub interval: Duration,
    pub batch_size: usize,
    pub context_transcriptions: usize,
    pub system_prompt_path: String,
    #[serde(deserialize_with="deserialize_duration", serialize_with="serialize_duration")]
    pub request_timeout: Duration,
}

impl Default for PostProcessingConfig {
    fn default () -> Self {
        PostProcessingConfig {
            enabled: true,
            model: "gpt-4.1-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            interval: Duration::from_secs(10),
            batch_size: 10,
            context_transcriptions: 5,
            system_prompt_path: "templates/post_processor.tmpl".to_string(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// renders the post-processor system prompt with current airspace data.
/// Injected so the post-processor carries no back pointer into the tracker
/// or weather services.
pub trait TemplateRenderer: Send + Sync {
    fn render_post_processor_template (&self, template_path: &str) -> std::result::Result<String,String>;
}
