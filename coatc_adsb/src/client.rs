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

//! surveillance source client. Two source shapes are supported: the local
//! receiver JSON document and the external vendor API, whose numeric fields
//! are sometimes quoted as strings. Both normalize into `RawAircraftData`.
//! This layer does not retry - the tracker tick decides what a failed fetch
//! means.

use std::fmt;
use serde::{Deserialize,Deserializer,Serialize,de};
use tracing::{debug,warn};

use coatc_common::geo::GeoPos;
use crate::{AdsbConfig,SourceType};
use crate::errors::{AdsbError,Result,parse_error};

/* #region flexible numerics **************************************************************************/

/// a numeric field that external vendors deliver as either a JSON number or a
/// numeric string. Anything else is a parse error - coercion happens in
/// exactly one place.
#[derive(Debug,Clone,Copy,PartialEq,Serialize,Default)]
#[serde(transparent)]
pub struct FlexNum(pub f64);

impl FlexNum {
    pub fn value (&self) -> f64 { self.0 }
}

impl<'de> Deserialize<'de> for FlexNum {
    fn deserialize<D> (deserializer: D) -> std::result::Result<Self,D::Error> where D: Deserializer<'de> {
        struct FlexNumVisitor;

        impl<'de> de::Visitor<'de> for FlexNumVisitor {
            type Value = FlexNum;

            fn expecting (&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a number or a numeric string")
            }

            fn visit_f64<E: de::Error> (self, v: f64) -> std::result::Result<FlexNum,E> { Ok(FlexNum(v)) }
            fn visit_i64<E: de::Error> (self, v: i64) -> std::result::Result<FlexNum,E> { Ok(FlexNum(v as f64)) }
            fn visit_u64<E: de::Error> (self, v: u64) -> std::result::Result<FlexNum,E> { Ok(FlexNum(v as f64)) }

            fn visit_str<E: de::Error> (self, v: &str) -> std::result::Result<FlexNum,E> {
                v.trim().parse::<f64>().map(FlexNum)
                    .map_err(|_| E::custom( format!("not a numeric string: {v:?}")))
            }
        }

        deserializer.deserialize_any( FlexNumVisitor)
    }
}

/* #endregion flexible numerics */

/* #region raw records ********************************************************************************/

/// one raw record in the local receiver schema
#[derive(Debug,Clone,Serialize,Deserialize,Default)]
pub struct AdsbTarget {
    pub hex: String,
    #[serde(default)] pub flight: Option<String>,
    #[serde(default)] pub lat: Option<f64>,
    #[serde(default)] pub lon: Option<f64>,
    #[serde(default)] pub alt_baro: Option<FlexNum>,
    #[serde(default)] pub gs: Option<f64>,
    #[serde(default)] pub tas: Option<f64>,
    #[serde(default)] pub track: Option<f64>,
    #[serde(default)] pub track_rate: Option<f64>,
    #[serde(default)] pub mag_heading: Option<f64>,
    #[serde(default)] pub true_heading: Option<f64>,
    #[serde(default)] pub baro_rate: Option<f64>,
    #[serde(default)] pub squawk: Option<String>,
    #[serde(skip)] pub source_type: SourceType,
}

/// the local receiver document
#[derive(Debug,Clone,Deserialize)]
pub struct RawAircraftData {
    #[serde(default)] pub now: f64,
    #[serde(default)] pub messages: i64,
    #[serde(default)] pub aircraft: Vec<AdsbTarget>,
}

/// one raw record in the vendor schema - every numeric may be quoted
#[derive(Debug,Clone,Deserialize)]
pub struct ExternalTarget {
    pub hex: String,
    #[serde(default)] pub flight: Option<String>,
    #[serde(default)] pub lat: Option<FlexNum>,
    #[serde(default)] pub lon: Option<FlexNum>,
    #[serde(default)] pub alt_baro: Option<FlexNum>,
    #[serde(default)] pub gs: Option<FlexNum>,
    #[serde(default)] pub tas: Option<FlexNum>,
    #[serde(default)] pub track: Option<FlexNum>,
    #[serde(default)] pub track_rate: Option<FlexNum>,
    #[serde(default)] pub mag_heading: Option<FlexNum>,
    #[serde(default)] pub true_heading: Option<FlexNum>,
    #[serde(default)] pub baro_rate: Option<FlexNum>,
    #[serde(default)] pub squawk: Option<String>,
}

impl ExternalTarget {
    pub fn convert (self) -> AdsbTarget {
        AdsbTarget {
            hex: self.hex,
            flight: self.flight,
            lat: self.lat.map(|v| v.0),
            lon: self.lon.map(|v| v.0),
            alt_baro: self.alt_baro,
            gs: self.gs.map(|v| v.0),
            tas: self.tas.map(|v| v.0),
            track: self.track.map(|v| v.0),
            track_rate: self.track_rate.map(|v| v.0),
            mag_heading: self.mag_heading.map(|v| v.0),
            true_heading: self.true_heading.map(|v| v.0),
            baro_rate: self.baro_rate.map(|v| v.0),
            squawk: self.squawk,
            source_type: SourceType::External,
        }
    }
}

#[derive(Debug,Clone,Deserialize)]
pub struct ExternalApiResponse {
    #[serde(default)] pub ac: Vec<ExternalTarget>,
    #[serde(default)] pub total: Option<i64>,
    #[serde(default)] pub msg: Option<String>,
    #[serde(default)] pub messages: Option<i64>,
}

/* #endregion raw records */

/// fetches raw aircraft records from the configured surveillance source
pub struct AdsbClient {
    http_client: reqwest::Client,
    config: AdsbConfig,
}

impl AdsbClient {
    pub fn new (config: AdsbConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout( config.fetch_timeout)
            .build()?;
        Ok( AdsbClient { http_client, config })
    }

    pub async fn fetch_data (&self, station: GeoPos) -> Result<RawAircraftData> {
        match self.config.source_type {
            SourceType::Local => self.fetch_local().await,
            SourceType::External => self.fetch_external( station).await,
        }
    }

    async fn fetch_local (&self) -> Result<RawAircraftData> {
        let url = self.config.local_source_url.as_str();
        debug!("fetching local ADS-B data from {url}");

        let resp = self.http_client.get(url)
            .header( "Accept", "application/json")
            .send().await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err( AdsbError::StatusError( resp.status().as_u16()));
        }

        let body = resp.text().await?;
        let mut data: RawAircraftData = serde_json::from_str( &body)
            .map_err(|e| parse_error!("local ADS-B document: {e}"))?;
        for ac in data.aircraft.iter_mut() {
            ac.source_type = SourceType::Local;
        }

        debug!("fetched {} local aircraft records", data.aircraft.len());
        Ok(data)
    }

    async fn fetch_external (&self, station: GeoPos) -> Result<RawAircraftData> {
        let url = self.config.external_source_url
            .replace( "{lat}", &format!("{:.4}", station.lat))
            .replace( "{lon}", &format!("{:.4}", station.lon))
            .replace( "{radius}", &format!("{:.0}", self.config.search_radius_nm));

        debug!("fetching external ADS-B data from {url}");

        let resp = self.http_client.get( &url)
            .header( "Accept", "application/json")
            .header( "x-rapidapi-host", self.config.api_host.as_str())
            .header( "x-rapidapi-key", self.config.api_key.as_str())
            .send().await?;
        if resp.status() != reqwest::StatusCode::OK {
            return Err( AdsbError::StatusError( resp.status().as_u16()));
        }

        let body = resp.text().await?;

        // the vendor has been seen answering in either shape - try its own first
        match serde_json::from_str::<ExternalApiResponse>( &body) {
            Ok(ext) => {
                let aircraft: Vec<AdsbTarget> = ext.ac.into_iter().map(|t| t.convert()).collect();
                debug!("fetched {} external aircraft records", aircraft.len());
                Ok( RawAircraftData {
                    now: coatc_common::datetime::utc_now().timestamp() as f64,
                    messages: ext.messages.unwrap_or(0),
                    aircraft,
                })
            }
            Err(e_ext) => {
                let mut data: RawAircraftData = serde_json::from_str( &body).map_err( |e_std| {
                    parse_error!("external ADS-B document: {e_ext} (vendor shape), {e_std} (local shape)")
                })?;
                for ac in data.aircraft.iter_mut() {
                    ac.source_type = SourceType::External;
                }
                Ok(data)
            }
        }
    }
}

lazy_static::lazy_static! {
    static ref HEX_RE: regex::Regex = regex::Regex::new( r"^[0-9a-fA-F]{6}$").unwrap();
    static ref FLIGHT_RE: regex::Regex = regex::Regex::new( r"^[A-Za-z]{2,3}[0-9]{1,4}$").unwrap();
    static ref TAIL_RES: Vec<regex::Regex> = vec![
        regex::Regex::new( r"^N[0-9]{1,5}$").unwrap(),
        regex::Regex::new( r"^N[0-9]{1,4}[A-Za-z]{1,2}$").unwrap(),
        regex::Regex::new( r"^[A-Z]-[A-Z0-9]{4}$").unwrap(),
        regex::Regex::new( r"^[A-Z]{2}-[A-Z0-9]{3,4}$").unwrap(),
    ];
}

/// is this a well formed 24 bit ICAO hex address
pub fn is_hex_code (s: &str) -> bool { HEX_RE.is_match(s) }

/// does this look like an airline flight number (2-3 letters + 1-4 digits)
pub fn is_flight_number (s: &str) -> bool { FLIGHT_RE.is_match(s) }

/// does this look like a registration used as a callsign
pub fn is_tail_number (s: &str) -> bool { TAIL_RES.iter().any(|re| re.is_match(s)) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flexnum_accepts_number_and_numeric_string() {
        let v: FlexNum = serde_json::from_str("36000").unwrap();
        assert_eq!( v.0, 36000.0);
        let v: FlexNum = serde_json::from_str("36000.5").unwrap();
        assert_eq!( v.0, 36000.5);
        let v: FlexNum = serde_json::from_str(r#""36000""#).unwrap();
        assert_eq!( v.0, 36000.0);
        let v: FlexNum = serde_json::from_str(r#""-79.62""#).unwrap();
        assert_eq!( v.0, -79.62);
    }

    #[test]
    fn test_flexnum_rejects_non_numeric() {
        assert!( serde_json::from_str::<FlexNum>(r#""ground""#).is_err());
        assert!( serde_json::from_str::<FlexNum>("true").is_err());
        assert!( serde_json::from_str::<FlexNum>("{}").is_err());
    }

    #[test]
    fn test_local_document_parse() {
        let doc = r#"{
            "now": 1718000000.5,
            "messages": 1234,
            "aircraft": [
                {"hex": "c06abc", "flight": "ACA123 ", "lat": 43.68, "lon": -79.62,
                 "alt_baro": 1200, "gs": 160.2, "tas": 165.0, "track": 62.0,
                 "baro_rate": 1400, "squawk": "5263"}
            ]
        }"#;
        let data: RawAircraftData = serde_json::from_str(doc).unwrap();
        assert_eq!( data.aircraft.len(), 1);
        let ac = &data.aircraft[0];
        assert_eq!( ac.hex, "c06abc");
        assert_eq!( ac.alt_baro.unwrap().0, 1200.0);
        assert_eq!( ac.gs, Some(160.2));
    }

    #[test]
    fn test_external_document_parse_with_quoted_numerics() {
        let doc = r#"{
            "ac": [
                {"hex": "a1b2c3", "flight": "UAL5", "lat": "40.1", "lon": "-80.2",
                 "alt_baro": "35000", "gs": "450", "track": 270}
            ],
            "total": 1,
            "msg": "No error"
        }"#;
        let ext: ExternalApiResponse = serde_json::from_str(doc).unwrap();
        assert_eq!( ext.ac.len(), 1);
        let ac = ext.ac[0].clone().convert();
        assert_eq!( ac.lat, Some(40.1));
        assert_eq!( ac.alt_baro.unwrap().0, 35000.0);
        assert_eq!( ac.track, Some(270.0));
        assert_eq!( ac.source_type, SourceType::External);
    }

    #[test]
    fn test_ident_classifiers() {
        assert!( is_hex_code("c06abc"));
        assert!( !is_hex_code("c06ab"));
        assert!( is_flight_number("ACA123"));
        assert!( !is_flight_number("C-FKWZ"));
        assert!( is_tail_number("N123AB"));
        assert!( is_tail_number("C-FKWZ"));
    }
}
