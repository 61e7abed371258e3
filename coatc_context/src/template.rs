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

//! plain `{{placeholder}}` substitution over a loaded template file. The
//! prompt templates are text with a handful of data slots; anything fancier
//! belongs in the aggregator, not the template.

use std::{fs,path::Path};

use crate::TemplateContext;
use crate::errors::{ContextError,Result};

/// the placeholders a post-processor template may use
const PLACEHOLDERS: [&str; 6] = ["timestamp", "airport", "aircraft", "weather", "runways", "transcription_history"];

/// render the template at `path` with the given context
pub fn render_template_file (path: &Path, context: &TemplateContext) -> Result<String> {
    let template = fs::read_to_string(path)
        .map_err(|e| ContextError::TemplateFileError( path.display().to_string(), e))?;
    render_template( &template, context)
}

/// substitute every known `{{placeholder}}`; unknown placeholders are a
/// render error so template typos surface instead of producing silent holes
pub fn render_template (template: &str, context: &TemplateContext) -> Result<String> {
    let mut out = template.to_string();

    for name in PLACEHOLDERS {
        let slot = format!("{{{{{name}}}}}");
        if !out.contains( &slot) {
            continue;
        }
        let value = match name {
            "timestamp" => context.timestamp.to_rfc3339(),
            "airport" => serde_json::to_string_pretty( &context.airport)?,
            "aircraft" => serde_json::to_string_pretty( &context.aircraft)?,
            "weather" => match &context.weather {
                Some(w) => serde_json::to_string_pretty(w)?,
                None => "No weather data available".to_string(),
            },
            "runways" => serde_json::to_string_pretty( &context.runways)?,
            "transcription_history" => serde_json::to_string_pretty( &context.transcription_history)?,
            _ => unreachable!(),
        };
        out = out.replace( &slot, &value);
    }

    // anything left in braces is a typo in the template
    if let Some(start) = out.find( "{{") {
        let end = out[start..].find( "}}").map(|e| start + e + 2).unwrap_or( out.len());
        return Err( ContextError::TemplateRenderError(
            format!("unknown placeholder {}", &out[start..end])));
    }

    Ok(out)
}
