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

//! RON config file loading. Config structs live with the crates they
//! configure; this is just the shared loader.

use std::{fs,path::Path};
use serde::de::DeserializeOwned;
use thiserror::Error;

pub type Result<T> = std::result::Result<T,ConfigError>;

#[derive(Error,Debug)]
pub enum ConfigError {
    #[error("could not read config file {0}: {1}")]
    ReadError(String, #[source] std::io::Error),

    #[error("could not parse config file {0}: {1}")]
    ParseError(String, #[source] ron::error::SpannedError),
}

/// load a RON serialized config struct from the given path
pub fn load_config<T> (path: &Path) -> Result<T> where T: DeserializeOwned {
    let input = fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError( path.display().to_string(), e))?;
    ron::from_str( &input)
        .map_err(|e| ConfigError::ParseError( path.display().to_string(), e))
}
