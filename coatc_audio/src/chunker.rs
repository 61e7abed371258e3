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

//! accumulates decoded PCM and emits fixed-duration chunks for the realtime
//! transcription session.

/// PCM16 chunker: bytes per ms = sample_rate * channels * 2 / 1000
pub struct AudioChunker {
    chunk_size_bytes: usize,
    buffer: Vec<u8>,
}

impl AudioChunker {
    pub fn new (sample_rate: u32, channels: u32, chunk_ms: u32) -> Self {
        let bytes_per_ms = (sample_rate * channels * 2) / 1000;
        AudioChunker {
            chunk_size_bytes: (bytes_per_ms * chunk_ms) as usize,
            buffer: Vec::new(),
        }
    }

    /// feed PCM; returns zero or more complete chunks
    pub fn push (&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.buffer.extend_from_slice(data);

        let mut chunks = Vec::new();
        while self.buffer.len() >= self.chunk_size_bytes {
            let rest = self.buffer.split_off( self.chunk_size_bytes);
            chunks.push( std::mem::replace( &mut self.buffer, rest));
        }
        chunks
    }

    pub fn reset (&mut self) {
        self.buffer.clear();
    }

    pub fn chunk_size_bytes (&self) -> usize {
        self.chunk_size_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_size_math() {
        // 24kHz mono PCM16: 48 bytes/ms
        let c = AudioChunker::new( 24_000, 1, 100);
        assert_eq!( c.chunk_size_bytes(), 4800);
    }

    #[test]
    fn test_accumulation_and_emission() {
        let mut c = AudioChunker::new( 1000, 1, 10); // 2 bytes/ms -> 20 byte chunks

        assert!( c.push( &[0u8; 15]).is_empty());
        let chunks = c.push( &[1u8; 30]); // 45 total -> 2 chunks + 5 left
        assert_eq!( chunks.len(), 2);
        assert_eq!( chunks[0].len(), 20);
        assert_eq!( chunks[1].len(), 20);

        let chunks = c.push( &[2u8; 15]); // 20 total
        assert_eq!( chunks.len(), 1);

        c.reset();
        assert!( c.push( &[3u8; 19]).is_empty());
    }
}
