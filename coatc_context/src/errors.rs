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

pub type Result<T> = std::result::Result<T,ContextError>;

#[derive(Error,Debug)]
pub enum ContextError {

    #[error("template file error {0}: {1}")]
    TemplateFileError(String, #[source] std::io::Error),

    #[error("template render error {0}")]
    TemplateRenderError(String),

    #[error("serialization error {0}")]
    SerializationError( #[from] serde_json::Error),

    #[error("storage error {0}")]
    StorageError( #[from] coatc_storage::errors::StorageError),
}
