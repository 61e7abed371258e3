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

use chrono::{DateTime,Utc};
use rusqlite::{params,Row};

use crate::{Database,errors::Result,models::{SpeakerType,TranscriptionRecord}};

const COLS: &str = "id, frequency_id, content, content_processed, speaker_type, callsign, is_processed, created_at";

/// transcription table access. `is_processed = 0` is the post-processor's
/// batch lease; rows are only ever updated to set the processed columns.
#[derive(Clone)]
pub struct TranscriptionStorage {
    db: Database,
}

impl TranscriptionStorage {
    pub fn new (db: Database) -> Self {
        TranscriptionStorage { db }
    }

    /// append a freshly transcribed transmission; returns the assigned id
    pub fn insert (&self, frequency_id: &str, content: &str, created_at: DateTime<Utc>) -> Result<i64> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO transcriptions (frequency_id, content, is_processed, created_at) VALUES (?1, ?2, 0, ?3)",
            params![ frequency_id, content, created_at.to_rfc3339()],
        )?;
        Ok( conn.last_insert_rowid())
    }

    /// the oldest unprocessed rows, up to `limit`
    pub fn get_unprocessed (&self, limit: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE is_processed = 0 ORDER BY created_at ASC LIMIT ?1"))?;
        let rows = stmt.query_map( params![ limit as i64], scan_row)?;
        collect(rows)
    }

    /// the most recent `limit` already-processed rows on one frequency (context window)
    pub fn get_last_processed (&self, frequency_id: &str, limit: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE frequency_id = ?1 AND is_processed = 1
             ORDER BY created_at DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ frequency_id, limit as i64], scan_row)?;
        collect(rows)
    }

    /// set the processed columns and mark the row done, in one statement
    pub fn update_processed (&self, id: i64, content_processed: &str, speaker_type: SpeakerType, callsign: &str) -> Result<()> {
        let conn = self.db.lock();
        conn.execute(
            "UPDATE transcriptions SET content_processed = ?1, speaker_type = ?2, callsign = ?3, is_processed = 1 WHERE id = ?4",
            params![ content_processed, speaker_type.as_str(), callsign, id],
        )?;
        Ok(())
    }

    pub fn get_by_id (&self, id: i64) -> Result<Option<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!("SELECT {COLS} FROM transcriptions WHERE id = ?1"))?;
        let mut rows = stmt.query_map( params![id], scan_row)?;
        match rows.next() {
            Some(row) => Ok( Some(row?)),
            None => Ok(None),
        }
    }

    pub fn get_recent (&self, limit: usize, offset: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions ORDER BY created_at DESC LIMIT ?1 OFFSET ?2"))?;
        let rows = stmt.query_map( params![ limit as i64, offset as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_frequency (&self, frequency_id: &str, limit: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE frequency_id = ?1 ORDER BY created_at DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ frequency_id, limit as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_time_range (&self, start: DateTime<Utc>, end: DateTime<Utc>, limit: usize, offset: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE created_at BETWEEN ?1 AND ?2
             ORDER BY created_at ASC LIMIT ?3 OFFSET ?4"))?;
        let rows = stmt.query_map( params![ start.to_rfc3339(), end.to_rfc3339(), limit as i64, offset as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_speaker (&self, speaker_type: SpeakerType, limit: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE speaker_type = ?1 ORDER BY created_at DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ speaker_type.as_str(), limit as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_callsign (&self, callsign: &str, limit: usize) -> Result<Vec<TranscriptionRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM transcriptions WHERE callsign = ?1 ORDER BY created_at DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ callsign, limit as i64], scan_row)?;
        collect(rows)
    }
}

fn scan_row (row: &Row) -> rusqlite::Result<TranscriptionRecord> {
    let speaker: Option<String> = row.get(4)?;
    let created_at: String = row.get(7)?;
    Ok( TranscriptionRecord {
        id: row.get(0)?,
        frequency_id: row.get(1)?,
        content: row.get(2)?,
        content_processed: row.get(3)?,
        speaker_type: speaker.map(|s| SpeakerType::from_str(&s)),
        callsign: row.get(5)?,
        is_processed: row.get::<_,i64>(6)? != 0,
        created_at: DateTime::parse_from_rfc3339( &created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure( 7, rusqlite::types::Type::Text, Box::new(e)))?,
    })
}

fn collect (rows: impl Iterator<Item=rusqlite::Result<TranscriptionRecord>>) -> Result<Vec<TranscriptionRecord>> {
    let mut records = Vec::new();
    for row in rows {
        records.push( row?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t (secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms( 2025, 6, 1, 12, 0, 0).unwrap() + chrono::Duration::seconds(secs)
    }

    #[test]
    fn test_insert_and_lease_order() {
        let store = TranscriptionStorage::new( Database::open_memory().unwrap());
        let id1 = store.insert( "twr", "cleared for takeoff", t(0)).unwrap();
        let id2 = store.insert( "twr", "contact departure", t(10)).unwrap();
        store.insert( "gnd", "taxi via alpha", t(5)).unwrap();

        let unprocessed = store.get_unprocessed(10).unwrap();
        assert_eq!( unprocessed.len(), 3);
        // oldest first across frequencies
        assert_eq!( unprocessed[0].id, id1);
        assert_eq!( unprocessed[1].content, "taxi via alpha");
        assert_eq!( unprocessed[2].id, id2);
        assert!( unprocessed.iter().all(|r| !r.is_processed));
    }

    #[test]
    fn test_processed_gate() {
        let store = TranscriptionStorage::new( Database::open_memory().unwrap());
        let id = store.insert( "twr", "air canada one two three cleared to land", t(0)).unwrap();

        store.update_processed( id, "ACA123 cleared to land 24R", SpeakerType::Atc, "ACA123").unwrap();

        // the lease no longer returns it - the processed gate is what makes
        // duplicate post-processing runs idempotent
        assert!( store.get_unprocessed(10).unwrap().is_empty());

        let rec = store.get_by_id(id).unwrap().unwrap();
        assert!( rec.is_processed);
        assert_eq!( rec.content_processed.as_deref(), Some("ACA123 cleared to land 24R"));
        assert_eq!( rec.speaker_type, Some(SpeakerType::Atc));
        assert_eq!( rec.callsign.as_deref(), Some("ACA123"));
    }

    #[test]
    fn test_sentinel_still_counts_as_processed() {
        let store = TranscriptionStorage::new( Database::open_memory().unwrap());
        let id = store.insert( "twr", "unreadable", t(0)).unwrap();
        store.update_processed( id, "[PROCESSING_FAILED]", SpeakerType::Unknown, "").unwrap();
        assert!( store.get_unprocessed(10).unwrap().is_empty(), "sentinel rows must not be re-leased");
    }

    #[test]
    fn test_context_window_query() {
        let store = TranscriptionStorage::new( Database::open_memory().unwrap());
        for i in 0..5 {
            let id = store.insert( "twr", &format!("msg {i}"), t(i)).unwrap();
            store.update_processed( id, &format!("processed {i}"), SpeakerType::Pilot, "N1").unwrap();
        }
        store.insert( "twr", "fresh", t(10)).unwrap();

        let ctx = store.get_last_processed( "twr", 3).unwrap();
        assert_eq!( ctx.len(), 3);
        assert_eq!( ctx[0].content, "msg 4"); // most recent first
        assert!( ctx.iter().all(|r| r.is_processed));
    }

    #[test]
    fn test_indexed_lookups() {
        let store = TranscriptionStorage::new( Database::open_memory().unwrap());
        let id = store.insert( "twr", "x", t(0)).unwrap();
        store.update_processed( id, "y", SpeakerType::Atc, "WJA55").unwrap();

        assert_eq!( store.get_by_speaker( SpeakerType::Atc, 10).unwrap().len(), 1);
        assert_eq!( store.get_by_callsign( "WJA55", 10).unwrap().len(), 1);
        assert_eq!( store.get_by_frequency( "twr", 10).unwrap().len(), 1);
        assert_eq!( store.get_by_time_range( t(-10), t(10), 10, 0).unwrap().len(), 1);
    }
}
