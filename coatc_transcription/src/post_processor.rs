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

//! timer driven batch enrichment of raw transcriptions. Unprocessed rows are
//! leased by `is_processed = 0`, submitted to the language model together
//! with recent processed context, and written back enriched. Any batch level
//! failure writes sentinel processed text instead of leaving the rows for an
//! unbounded retry: observability over silent resubmission.

use std::{collections::HashMap, sync::Arc};
use chrono::Utc;
use serde_json::json;
use tokio::task::JoinHandle;
use tracing::{debug,info,warn,error};

use coatc_common::datetime::utc_now;
use coatc_common::events::{Broadcaster,Envelope};
use coatc_storage::clearances::ClearanceStorage;
use coatc_storage::models::{ClearanceRecord,ClearanceStatus,SpeakerType,TranscriptionRecord};
use coatc_storage::transcriptions::TranscriptionStorage;

use crate::{PostProcessingConfig,TemplateRenderer};
use crate::llm::{BatchItem,LanguageModel};
use crate::errors::{Result,TranscriptionError};

pub const SENTINEL_TEMPLATE_FAILED: &str = "[TEMPLATE_RENDER_FAILED]";
pub const SENTINEL_PROCESSING_FAILED: &str = "[PROCESSING_FAILED]";
pub const SENTINEL_NO_RESULTS: &str = "[NO_RESULTS_FROM_API]";

pub struct PostProcessor {
    transcription_storage: TranscriptionStorage,
    clearance_storage: ClearanceStorage,
    model: Arc<dyn LanguageModel>,
    template_renderer: Arc<dyn TemplateRenderer>,
    broadcaster: Arc<dyn Broadcaster>,
    config: PostProcessingConfig,
    frequency_names: HashMap<String,String>,
}

impl PostProcessor {
    pub fn new (
        transcription_storage: TranscriptionStorage,
        clearance_storage: ClearanceStorage,
        model: Arc<dyn LanguageModel>,
        template_renderer: Arc<dyn TemplateRenderer>,
        broadcaster: Arc<dyn Broadcaster>,
        config: PostProcessingConfig,
        frequency_names: HashMap<String,String>,
    ) -> Self {
        PostProcessor {
            transcription_storage,
            clearance_storage,
            model,
            template_renderer,
            broadcaster,
            config,
            frequency_names,
        }
    }

    fn frequency_name (&self, frequency_id: &str) -> String {
        self.frequency_names.get(frequency_id).cloned().unwrap_or_else(|| frequency_id.to_string())
    }

    /// write the whole batch with a sentinel so the rows never re-lease
    fn mark_batch_failed (&self, records: &[TranscriptionRecord], sentinel: &str) {
        for record in records {
            if let Err(e) = self.transcription_storage.update_processed( record.id, sentinel, SpeakerType::Unknown, "") {
                error!("failed to mark transcription {} as failed: {e}", record.id);
            }
        }
    }

    /// one timer tick. Returns the number of rows it finalized.
    pub async fn process_next_batch (&self) -> Result<usize> {
        let records = self.transcription_storage.get_unprocessed( self.config.batch_size)?;
        if records.is_empty() {
            return Ok(0);
        }
        debug!("post-processing batch of {}", records.len());

        // all rows of a batch are treated as one frequency (the oldest row's)
        let frequency_id = records[0].frequency_id.clone();
        let frequency_name = self.frequency_name( &frequency_id);

        let context_records = if self.config.context_transcriptions > 0 {
            self.transcription_storage
                .get_last_processed( &frequency_id, self.config.context_transcriptions)
                .unwrap_or_else(|e| { warn!("context fetch failed: {e}"); Vec::new() })
        } else {
            Vec::new()
        };

        let mut batch: Vec<BatchItem> = Vec::with_capacity( context_records.len() + records.len());
        for record in &context_records {
            batch.push( BatchItem {
                id: record.id,
                content: record.content.clone(),
                content_processed: record.content_processed.clone().unwrap_or_default(),
                speaker_type: record.speaker_type.map(|s| s.as_str().to_string()).unwrap_or_default(),
                callsign: record.callsign.clone().unwrap_or_default(),
                clearances: Vec::new(),
                timestamp: record.created_at,
            });
        }
        for record in &records {
            batch.push( BatchItem {
                id: record.id,
                content: record.content.clone(),
                content_processed: String::new(),
                speaker_type: String::new(),
                callsign: String::new(),
                clearances: Vec::new(),
                timestamp: record.created_at,
            });
        }

        // chronological order within the frequency is part of the contract
        batch.sort_by_key(|item| item.timestamp);

        let batch_json = serde_json::to_string_pretty( &batch)
            .map_err(|e| TranscriptionError::ParseError( e.to_string()))?;

        let system_prompt = match self.template_renderer.render_post_processor_template( &self.config.system_prompt_path) {
            Ok(prompt) => prompt,
            Err(e) => {
                error!("system prompt template render failed: {e}");
                self.mark_batch_failed( &records, SENTINEL_TEMPLATE_FAILED);
                return Err( TranscriptionError::TemplateError(e));
            }
        };

        let user_input = format!("Radio Frequency:\n{frequency_name}\n\nTransmissions Log:\n{batch_json}");

        let results = match self.model.post_process_batch( &system_prompt, &user_input).await {
            Ok(results) => results,
            Err(e) => {
                error!("post-processing batch failed: {e}");
                self.mark_batch_failed( &records, SENTINEL_PROCESSING_FAILED);
                return Err(e);
            }
        };

        if results.is_empty() {
            warn!("no results from language model, marking batch failed");
            self.mark_batch_failed( &records, SENTINEL_NO_RESULTS);
            return Ok(0);
        }

        let mut finalized = 0;
        for result in results {
            // the model answered but left the row blank: leave it for the next tick
            if result.content_processed.is_empty() {
                warn!("model returned empty processed content for {}", result.id);
                continue;
            }

            // context rows come back too - they are already done
            if context_records.iter().any(|c| c.id == result.id) {
                continue;
            }
            let Some(record) = records.iter().find(|r| r.id == result.id) else {
                warn!("model returned unknown row id {}", result.id);
                continue;
            };

            let speaker = SpeakerType::from_str( &result.speaker_type);
            if let Err(e) = self.transcription_storage.update_processed(
                result.id, &result.content_processed, speaker, &result.callsign)
            {
                error!("failed to update transcription {}: {e}", result.id);
                continue;
            }
            finalized += 1;

            if speaker == SpeakerType::Atc && !result.clearances.is_empty() {
                self.store_clearances( &result);
            }

            self.broadcaster.broadcast( Envelope::new( "transcription_update", json!({
                "id": record.id,
                "frequency_id": record.frequency_id,
                "text": record.content,
                "timestamp": record.created_at,
                "is_complete": true,
                "is_processed": true,
                "content_processed": result.content_processed,
                "speaker_type": speaker.as_str(),
                "callsign": result.callsign,
            })));
        }

        Ok(finalized)
    }

    fn store_clearances (&self, result: &BatchItem) {
        for clearance in &result.clearances {
            let mut record = ClearanceRecord {
                id: 0,
                transcription_id: result.id,
                callsign: clearance.callsign.clone(),
                clearance_type: clearance.clearance_type,
                clearance_text: clearance.text.clone(),
                runway: clearance.runway.clone(),
                timestamp: result.timestamp,
                status: ClearanceStatus::Issued,
                created_at: utc_now(),
            };

            match self.clearance_storage.insert( &record) {
                Ok(id) => {
                    record.id = id;
                    info!("stored {} clearance for {} (runway {:?})",
                          record.clearance_type.as_str(), record.callsign, record.runway);
                    self.broadcaster.broadcast( Envelope::new( "clearance_issued", json!({
                        "id": record.id,
                        "callsign": record.callsign,
                        "clearance_type": record.clearance_type,
                        "clearance_text": record.clearance_text,
                        "runway": record.runway,
                        "timestamp": record.timestamp,
                        "status": record.status,
                    })));
                }
                Err(e) => error!("failed to store clearance for {}: {e}", clearance.callsign),
            }
        }
    }
}

/// spawn the post-processing timer loop
pub fn spawn_post_processor_loop (processor: Arc<PostProcessor>) -> JoinHandle<()> {
    tokio::spawn( async move {
        if !processor.config.enabled {
            info!("post-processing is disabled, not starting");
            return;
        }
        info!("post-processing loop started, interval {:?}, batch size {}",
              processor.config.interval, processor.config.batch_size);

        let mut ticker = tokio::time::interval( processor.config.interval);
        ticker.set_missed_tick_behavior( tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = processor.process_next_batch().await {
                error!("post-processing tick failed: {e}");
            }
        }
    })
}
