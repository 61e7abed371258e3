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

use thiserror::Error;

pub type Result<T> = std::result::Result<T,WeatherError>;

#[derive(Error,Debug)]
pub enum WeatherError {

    #[error("transport error {0}")]
    TransportError( #[from] reqwest::Error),

    #[error("unexpected status code {0}")]
    StatusError(u16),

    #[error("parse error {0}")]
    ParseError( #[from] serde_json::Error),

    #[error("all {attempts} attempts failed for {kind}: {last_error}")]
    RetriesExhausted { kind: String, attempts: u32, last_error: String },
}
