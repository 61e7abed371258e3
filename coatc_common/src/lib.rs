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

//! common kernel for the coatc workspace: pure geo/math functions, the
//! ICAO↔registration codec, datetime and collection helpers, the cross-crate
//! event seam and RON config loading. No tasks, no I/O other than config.

pub mod angle;
pub mod geo;
pub mod registration;
pub mod datetime;
pub mod collections;
pub mod events;
pub mod config;

/// strip embedded NUL escapes and surrounding whitespace from a reported callsign
pub fn clean_flight_id (flight: &str) -> String {
    flight.replace( "\\x00", "").replace( '\0', "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_flight_id() {
        assert_eq!( clean_flight_id(" ACA123 \\x00"), "ACA123");
        assert_eq!( clean_flight_id("WJA55\0\0"), "WJA55");
    }
}
