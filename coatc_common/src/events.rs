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

//! the event seam between producers (tracker, transcription, post-processor)
//! and the websocket hub. Producers only see the `Broadcaster` trait, the hub
//! implements it - no back pointers, no cycles.

use serde::{Serialize,Deserialize};
use serde_json::{json,Value};

/// the wire envelope for both directions of the websocket: `{type, data}`
#[derive(Debug,Clone,Serialize,Deserialize)]
pub struct Envelope {
    #[serde(rename="type")]
    pub msg_type: String,
    pub data: Value,
}

impl Envelope {
    pub fn new (msg_type: &str, data: Value) -> Self {
        Envelope { msg_type: msg_type.to_string(), data }
    }

    pub fn of<T: Serialize> (msg_type: &str, payload: &T) -> Self {
        Envelope { msg_type: msg_type.to_string(), data: serde_json::to_value(payload).unwrap_or(Value::Null) }
    }
}

/// fire-and-forget event publication. Implementations must not block the caller.
pub trait Broadcaster: Send + Sync {
    fn broadcast (&self, event: Envelope);
}

/// a Broadcaster that drops everything (startup, tests)
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn broadcast (&self, _event: Envelope) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let e = Envelope::new( "status_update", json!({"hex": "c06abc", "status": "stale"}));
        let s = serde_json::to_string(&e).unwrap();
        assert!( s.contains( r#""type":"status_update""#));
        let back: Envelope = serde_json::from_str(&s).unwrap();
        assert_eq!( back.msg_type, "status_update");
        assert_eq!( back.data["hex"], "c06abc");
    }
}
