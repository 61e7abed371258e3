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

//! append-only persistence for transcriptions and extracted clearances.
//! Two update paths exist: setting a transcription's processed columns and
//! setting a clearance's status. All timestamps are RFC 3339 UTC text.

use std::{path::Path,sync::{Arc,Mutex,MutexGuard}};
use rusqlite::Connection;

pub mod models;
pub mod transcriptions;
pub mod clearances;
pub mod errors;

use errors::{Result,StorageError};

/// shared handle to the single SQLite database
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// open or create the database at the given path
    pub fn open (path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        configure( &conn)?;
        init_schema( &conn)?;
        Ok( Database{ conn: Arc::new( Mutex::new(conn)) })
    }

    /// in-memory database (tests)
    pub fn open_memory () -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        configure( &conn)?;
        init_schema( &conn)?;
        Ok( Database{ conn: Arc::new( Mutex::new(conn)) })
    }

    pub(crate) fn lock (&self) -> MutexGuard<'_,Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn configure (conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}

fn init_schema (conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS transcriptions (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             frequency_id TEXT NOT NULL,
             content TEXT NOT NULL,
             content_processed TEXT,
             speaker_type TEXT,
             callsign TEXT,
             is_processed INTEGER NOT NULL DEFAULT 0,
             created_at TEXT NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_transcriptions_freq_created ON transcriptions(frequency_id, created_at);
         CREATE INDEX IF NOT EXISTS idx_transcriptions_speaker ON transcriptions(speaker_type);
         CREATE INDEX IF NOT EXISTS idx_transcriptions_callsign ON transcriptions(callsign);

         CREATE TABLE IF NOT EXISTS clearances (
             id INTEGER PRIMARY KEY AUTOINCREMENT,
             transcription_id INTEGER NOT NULL,
             callsign TEXT NOT NULL,
             clearance_type TEXT NOT NULL,
             clearance_text TEXT NOT NULL,
             runway TEXT,
             timestamp TEXT NOT NULL,
             status TEXT NOT NULL DEFAULT 'issued',
             created_at TEXT NOT NULL,
             FOREIGN KEY (transcription_id) REFERENCES transcriptions(id)
         );
         CREATE INDEX IF NOT EXISTS idx_clearances_callsign ON clearances(callsign);
         CREATE INDEX IF NOT EXISTS idx_clearances_timestamp ON clearances(timestamp);
         CREATE INDEX IF NOT EXISTS idx_clearances_type ON clearances(clearance_type);
         CREATE INDEX IF NOT EXISTS idx_clearances_status ON clearances(status);
         CREATE INDEX IF NOT EXISTS idx_clearances_transcription_id ON clearances(transcription_id);",
    )?;
    Ok(())
}
