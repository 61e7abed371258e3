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

use crate::{Database,errors::Result};
use crate::models::{ClearanceRecord,ClearanceStatus,ClearanceType};

const COLS: &str = "id, transcription_id, callsign, clearance_type, clearance_text, runway, timestamp, status, created_at";

/// clearance table access. Append-only except for the status column.
#[derive(Clone)]
pub struct ClearanceStorage {
    db: Database,
}

impl ClearanceStorage {
    pub fn new (db: Database) -> Self {
        ClearanceStorage { db }
    }

    /// insert a new clearance; returns the assigned id
    pub fn insert (&self, record: &ClearanceRecord) -> Result<i64> {
        let conn = self.db.lock();
        conn.execute(
            "INSERT INTO clearances
             (transcription_id, callsign, clearance_type, clearance_text, runway, timestamp, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.transcription_id,
                record.callsign,
                record.clearance_type.as_str(),
                record.clearance_text,
                record.runway,
                record.timestamp.to_rfc3339(),
                record.status.as_str(),
                record.created_at.to_rfc3339(),
            ],
        )?;
        Ok( conn.last_insert_rowid())
    }

    pub fn get_by_callsign (&self, callsign: &str, limit: usize) -> Result<Vec<ClearanceRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM clearances WHERE callsign = ?1 ORDER BY timestamp DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ callsign, limit as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_time_range (&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<ClearanceRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM clearances WHERE timestamp BETWEEN ?1 AND ?2 ORDER BY timestamp DESC"))?;
        let rows = stmt.query_map( params![ start.to_rfc3339(), end.to_rfc3339()], scan_row)?;
        collect(rows)
    }

    pub fn get_by_type (&self, clearance_type: ClearanceType, limit: usize) -> Result<Vec<ClearanceRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM clearances WHERE clearance_type = ?1 ORDER BY timestamp DESC LIMIT ?2"))?;
        let rows = stmt.query_map( params![ clearance_type.as_str(), limit as i64], scan_row)?;
        collect(rows)
    }

    pub fn get_by_transcription (&self, transcription_id: i64) -> Result<Vec<ClearanceRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM clearances WHERE transcription_id = ?1 ORDER BY timestamp ASC"))?;
        let rows = stmt.query_map( params![ transcription_id], scan_row)?;
        collect(rows)
    }

    pub fn get_recent (&self, limit: usize) -> Result<Vec<ClearanceRecord>> {
        let conn = self.db.lock();
        let mut stmt = conn.prepare( &format!(
            "SELECT {COLS} FROM clearances ORDER BY timestamp DESC LIMIT ?1"))?;
        let rows = stmt.query_map( params![ limit as i64], scan_row)?;
        collect(rows)
    }

    /// the one permitted update: compliance monitoring flips the status
    pub fn update_status (&self, id: i64, status: ClearanceStatus) -> Result<()> {
        let conn = self.db.lock();
        conn.execute( "UPDATE clearances SET status = ?1 WHERE id = ?2", params![ status.as_str(), id])?;
        Ok(())
    }
}

fn scan_row (row: &Row) -> rusqlite::Result<ClearanceRecord> {
    let clearance_type: String = row.get(3)?;
    let timestamp: String = row.get(6)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(8)?;

    let parse = |i: usize, s: &str| {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure( i, rusqlite::types::Type::Text, Box::new(e)))
    };

    Ok( ClearanceRecord {
        id: row.get(0)?,
        transcription_id: row.get(1)?,
        callsign: row.get(2)?,
        clearance_type: ClearanceType::from_str( &clearance_type),
        clearance_text: row.get(4)?,
        runway: row.get(5)?,
        timestamp: parse( 6, &timestamp)?,
        status: ClearanceStatus::from_str( &status),
        created_at: parse( 8, &created_at)?,
    })
}

fn collect (rows: impl Iterator<Item=rusqlite::Result<ClearanceRecord>>) -> Result<Vec<ClearanceRecord>> {
    let mut records = Vec::new();
    for row in rows {
        records.push( row?);
    }
    Ok(records)
}
