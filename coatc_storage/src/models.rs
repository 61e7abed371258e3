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

use chrono::{DateTime,Utc};
use serde::{Serialize,Deserialize,Deserializer};

/// who keyed the transmission
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Default)]
pub enum SpeakerType {
    #[serde(rename="ATC")]
    Atc,
    #[serde(rename="PILOT")]
    Pilot,
    #[default]
    #[serde(rename="UNKNOWN")]
    Unknown,
}

// language model output is lenient input: anything unrecognized is UNKNOWN
impl<'de> Deserialize<'de> for SpeakerType {
    fn deserialize<D> (deserializer: D) -> std::result::Result<Self,D::Error> where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Ok( SpeakerType::from_str( &s))
    }
}

impl SpeakerType {
    pub fn as_str (&self) -> &'static str {
        match self { SpeakerType::Atc => "ATC", SpeakerType::Pilot => "PILOT", SpeakerType::Unknown => "UNKNOWN" }
    }

    pub fn from_str (s: &str) -> Self {
        match s { "ATC" => SpeakerType::Atc, "PILOT" => SpeakerType::Pilot, _ => SpeakerType::Unknown }
    }
}

/// what kind of instruction was extracted
#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize)]
#[serde(rename_all="lowercase")]
pub enum ClearanceType {
    Takeoff,
    Landing,
    Other,
}

impl<'de> Deserialize<'de> for ClearanceType {
    fn deserialize<D> (deserializer: D) -> std::result::Result<Self,D::Error> where D: Deserializer<'de> {
        let s = String::deserialize(deserializer)?;
        Ok( ClearanceType::from_str( &s))
    }
}

impl ClearanceType {
    pub fn as_str (&self) -> &'static str {
        match self { ClearanceType::Takeoff => "takeoff", ClearanceType::Landing => "landing", ClearanceType::Other => "other" }
    }

    pub fn from_str (s: &str) -> Self {
        match s { "takeoff" => ClearanceType::Takeoff, "landing" => ClearanceType::Landing, _ => ClearanceType::Other }
    }
}

#[derive(Debug,Clone,Copy,PartialEq,Eq,Serialize,Deserialize)]
#[serde(rename_all="lowercase")]
pub enum ClearanceStatus {
    Issued,
    Complied,
    Deviation,
}

impl ClearanceStatus {
    pub fn as_str (&self) -> &'static str {
        match self { ClearanceStatus::Issued => "issued", ClearanceStatus::Complied => "complied", ClearanceStatus::Deviation => "deviation" }
    }

    pub fn from_str (s: &str) -> Self {
        match s { "complied" => ClearanceStatus::Complied, "deviation" => ClearanceStatus::Deviation, _ => ClearanceStatus::Issued }
    }
}

/// one stored radio transmission.
/// Invariant: `is_processed == true` exactly when `content_processed` is set,
/// sentinel values included - a failed batch still marks completion so the
/// post-processor never re-leases the row.
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct TranscriptionRecord {
    pub id: i64,
    pub frequency_id: String,
    pub content: String,
    pub content_processed: Option<String>,
    pub speaker_type: Option<SpeakerType>,
    pub callsign: Option<String>,
    pub is_processed: bool,
    pub created_at: DateTime<Utc>,
}

/// one extracted ATC instruction, tied to the transcription it came from
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ClearanceRecord {
    pub id: i64,
    pub transcription_id: i64,
    pub callsign: String,
    pub clearance_type: ClearanceType,
    pub clearance_text: String,
    pub runway: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub status: ClearanceStatus,
    pub created_at: DateTime<Utc>,
}

/// clearance fields as extracted by the language model
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct ExtractedClearance {
    pub callsign: String,
    #[serde(rename="type")]
    pub clearance_type: ClearanceType,
    pub text: String,
    #[serde(default)]
    pub runway: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaker_type_wire_names() {
        assert_eq!( serde_json::to_string( &SpeakerType::Atc).unwrap(), r#""ATC""#);
        let s: SpeakerType = serde_json::from_str( r#""PILOT""#).unwrap();
        assert_eq!( s, SpeakerType::Pilot);
        // anything unrecognized degrades to unknown instead of failing the row
        let s: SpeakerType = serde_json::from_str( r#""GROUND_VEHICLE""#).unwrap();
        assert_eq!( s, SpeakerType::Unknown);
    }

    #[test]
    fn test_clearance_type_fallback() {
        let c: ClearanceType = serde_json::from_str( r#""takeoff""#).unwrap();
        assert_eq!( c, ClearanceType::Takeoff);
        let c: ClearanceType = serde_json::from_str( r#""line_up_and_wait""#).unwrap();
        assert_eq!( c, ClearanceType::Other);
    }
}
