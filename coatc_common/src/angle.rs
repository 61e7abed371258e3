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

//! angle normalization helpers. Domain values (headings, tracks, bearings)
//! are kept as plain f64 degrees; these functions pin the ranges.

#[inline]
pub fn normalize_90 (d: f64) -> f64 {
    let x = d % 360.0;

    if x < -90.0 { -180.0 - x }
    else if x > 90.0 { 180.0 - x }
    else { x }
}

#[inline]
pub fn normalize_180 (d: f64) -> f64 {
    let x = d % 360.0;

    if x < -180.0 { 360.0 + x }
    else if x > 180.0 { x - 360.0 }
    else { x }
}

#[inline]
pub fn normalize_360 (d: f64) -> f64 {
    let x = d % 360.0;
    if x < 0.0 { 360.0 + x } else { x }
}

/// absolute angular difference folded into [0,180]
#[inline]
pub fn angular_diff (a: f64, b: f64) -> f64 {
    let mut d = (a - b).abs() % 360.0;
    if d > 180.0 { d = 360.0 - d }
    d
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_360() {
        assert_eq!( normalize_360(-90.0), 270.0);
        assert_eq!( normalize_360(370.0), 10.0);
        assert_eq!( normalize_360(0.0), 0.0);
    }

    #[test]
    fn test_angular_diff() {
        assert_eq!( angular_diff( 350.0, 10.0), 20.0);
        assert_eq!( angular_diff( 10.0, 350.0), 20.0);
        assert_eq!( angular_diff( 180.0, 0.0), 180.0);
    }
}
