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

use std::collections::HashMap;
use std::sync::{Arc,Mutex};
use async_trait::async_trait;
use chrono::{TimeZone,Utc};

use coatc_common::events::{Broadcaster,Envelope};
use coatc_storage::Database;
use coatc_storage::clearances::ClearanceStorage;
use coatc_storage::models::SpeakerType;
use coatc_storage::transcriptions::TranscriptionStorage;
use coatc_transcription::{PostProcessingConfig,TemplateRenderer};
use coatc_transcription::errors::{Result,TranscriptionError};
use coatc_transcription::llm::{BatchItem,LanguageModel};
use coatc_transcription::post_processor::{PostProcessor,SENTINEL_PROCESSING_FAILED};

struct RecordingBroadcaster {
    events: Mutex<Vec<Envelope>>,
}

impl RecordingBroadcaster {
    fn new () -> Arc<Self> { Arc::new( RecordingBroadcaster{ events: Mutex::new( Vec::new()) }) }
    fn types (&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.msg_type.clone()).collect()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast (&self, event: Envelope) {
        self.events.lock().unwrap().push(event);
    }
}

struct FixedRenderer;

impl TemplateRenderer for FixedRenderer {
    fn render_post_processor_template (&self, _path: &str) -> std::result::Result<String,String> {
        Ok( "You are an ATC transcription cleaner.".to_string())
    }
}

/// answers every new row as ATC with one landing clearance
struct EnrichingModel;

#[async_trait]
impl LanguageModel for EnrichingModel {
    async fn post_process_batch (&self, _system: &str, user: &str) -> Result<Vec<BatchItem>> {
        // parse the submitted log back out and enrich the blank rows
        let log = user.split( "Transmissions Log:\n").nth(1).unwrap();
        let mut items: Vec<BatchItem> = serde_json::from_str(log).unwrap();
        for item in items.iter_mut() {
            if item.content_processed.is_empty() {
                item.content_processed = format!("CLEAN: {}", item.content);
                item.speaker_type = "ATC".to_string();
                item.callsign = "ACA123".to_string();
                item.clearances = serde_json::from_str( r#"[{
                    "callsign": "ACA123", "type": "landing",
                    "text": "cleared to land 24R", "runway": "24R"
                }]"#).unwrap();
            }
        }
        Ok(items)
    }
}

struct FailingModel;

#[async_trait]
impl LanguageModel for FailingModel {
    async fn post_process_batch (&self, _system: &str, _user: &str) -> Result<Vec<BatchItem>> {
        Err( TranscriptionError::StatusError(500))
    }
}

fn setup (model: Arc<dyn LanguageModel>) -> (TranscriptionStorage, ClearanceStorage, Arc<RecordingBroadcaster>, PostProcessor) {
    let db = Database::open_memory().unwrap();
    let ts = TranscriptionStorage::new( db.clone());
    let cs = ClearanceStorage::new( db);
    let broadcaster = RecordingBroadcaster::new();

    let mut names = HashMap::new();
    names.insert( "twr".to_string(), "Tower 118.7".to_string());

    let processor = PostProcessor::new(
        ts.clone(), cs.clone(), model,
        Arc::new( FixedRenderer),
        broadcaster.clone(),
        PostProcessingConfig::default(),
        names,
    );
    (ts, cs, broadcaster, processor)
}

fn t (secs: i64) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
}

#[tokio::test]
async fn test_happy_path_enrichment() {
    let (ts, cs, broadcaster, processor) = setup( Arc::new( EnrichingModel));

    let id1 = ts.insert( "twr", "air canada one two three cleared to land two four right", t(0)).unwrap();
    let id2 = ts.insert( "twr", "roger cleared to land", t(5)).unwrap();

    let n = processor.process_next_batch().await.unwrap();
    assert_eq!( n, 2);

    let rec = ts.get_by_id(id1).unwrap().unwrap();
    assert!( rec.is_processed);
    assert!( rec.content_processed.unwrap().starts_with("CLEAN:"));
    assert_eq!( rec.speaker_type, Some(SpeakerType::Atc));
    assert_eq!( rec.callsign.as_deref(), Some("ACA123"));

    // clearances landed and were broadcast along with the row updates
    assert_eq!( cs.get_by_callsign( "ACA123", 10).unwrap().len(), 2);
    let types = broadcaster.types();
    assert_eq!( types.iter().filter(|t| *t == "transcription_update").count(), 2);
    assert_eq!( types.iter().filter(|t| *t == "clearance_issued").count(), 2);

    // within the batch, updates preserve chronological order
    let update_ids: Vec<i64> = broadcaster.events.lock().unwrap().iter()
        .filter(|e| e.msg_type == "transcription_update")
        .map(|e| e.data["id"].as_i64().unwrap())
        .collect();
    assert_eq!( update_ids, vec![id1, id2]);
}

#[tokio::test]
async fn test_poison_pill_on_vendor_failure() {
    let (ts, cs, broadcaster, processor) = setup( Arc::new( FailingModel));

    let id1 = ts.insert( "twr", "first", t(0)).unwrap();
    let id2 = ts.insert( "twr", "second", t(1)).unwrap();

    assert!( processor.process_next_batch().await.is_err());

    // every row ends processed with the sentinel, speaker UNKNOWN
    for id in [id1, id2] {
        let rec = ts.get_by_id(id).unwrap().unwrap();
        assert!( rec.is_processed);
        assert_eq!( rec.content_processed.as_deref(), Some(SENTINEL_PROCESSING_FAILED));
        assert_eq!( rec.speaker_type, Some(SpeakerType::Unknown));
    }

    // nothing was broadcast and no clearances were invented
    assert!( broadcaster.types().is_empty());
    assert!( cs.get_recent(10).unwrap().is_empty());

    // the next tick sees only new rows
    let id3 = ts.insert( "twr", "third", t(10)).unwrap();
    let unprocessed = ts.get_unprocessed(10).unwrap();
    assert_eq!( unprocessed.len(), 1);
    assert_eq!( unprocessed[0].id, id3);
}

#[tokio::test]
async fn test_idempotent_under_duplicate_delivery() {
    let (ts, cs, _broadcaster, processor) = setup( Arc::new( EnrichingModel));

    ts.insert( "twr", "cleared for takeoff", t(0)).unwrap();
    assert_eq!( processor.process_next_batch().await.unwrap(), 1);
    let clearances_after_first = cs.get_recent(10).unwrap().len();

    // re-running with everything already processed is a no-op
    assert_eq!( processor.process_next_batch().await.unwrap(), 0);
    assert_eq!( cs.get_recent(10).unwrap().len(), clearances_after_first);
}

#[tokio::test]
async fn test_empty_batch_is_noop() {
    let (_ts, _cs, broadcaster, processor) = setup( Arc::new( FailingModel));
    // no rows: the failing model is never consulted
    assert_eq!( processor.process_next_batch().await.unwrap(), 0);
    assert!( broadcaster.types().is_empty());
}
