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

//! synthesized WAV framing for live PCM. The stream has no known length, so
//! the data-size fields carry the maximum value - players treat it as open
//! ended.

use crate::fanout::FanoutReader;

const HEADER_LEN: usize = 44;
const BITS_PER_SAMPLE: u16 = 16;

/// a 44 byte canonical PCM WAV header for an unbounded stream
pub fn streaming_wav_header (sample_rate: u32, channels: u16) -> [u8; HEADER_LEN] {
    let byte_rate = sample_rate * channels as u32 * (BITS_PER_SAMPLE / 8) as u32;
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let data_size: u32 = u32::MAX - 36; // unknown length

    let mut h = [0u8; HEADER_LEN];
    h[0..4].copy_from_slice( b"RIFF");
    h[4..8].copy_from_slice( &(36u32 + data_size).to_le_bytes());
    h[8..12].copy_from_slice( b"WAVE");

    h[12..16].copy_from_slice( b"fmt ");
    h[16..20].copy_from_slice( &16u32.to_le_bytes()); // PCM fmt chunk size
    h[20..22].copy_from_slice( &1u16.to_le_bytes());  // PCM
    h[22..24].copy_from_slice( &channels.to_le_bytes());
    h[24..28].copy_from_slice( &sample_rate.to_le_bytes());
    h[28..32].copy_from_slice( &byte_rate.to_le_bytes());
    h[32..34].copy_from_slice( &block_align.to_le_bytes());
    h[34..36].copy_from_slice( &BITS_PER_SAMPLE.to_le_bytes());

    h[36..40].copy_from_slice( b"data");
    h[40..44].copy_from_slice( &data_size.to_le_bytes());
    h
}

/// wraps a fanout reader into a playable stream by prepending the header
pub struct WavReader {
    reader: FanoutReader,
    header: [u8; HEADER_LEN],
    header_sent: bool,
}

impl WavReader {
    pub fn new (reader: FanoutReader, sample_rate: u32, channels: u16) -> Self {
        WavReader {
            reader,
            header: streaming_wav_header( sample_rate, channels),
            header_sent: false,
        }
    }

    /// next chunk of the playable stream; empty result means end of stream
    pub async fn next_chunk (&mut self, max_len: usize) -> Vec<u8> {
        if !self.header_sent {
            self.header_sent = true;
            return self.header.to_vec();
        }
        let mut buf = vec![0u8; max_len];
        let n = self.reader.read( &mut buf).await;
        buf.truncate(n);
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::fanout::FanoutBuffer;

    #[test]
    fn test_header_fields() {
        let h = streaming_wav_header( 24_000, 1);
        assert_eq!( &h[0..4], b"RIFF");
        assert_eq!( &h[8..12], b"WAVE");
        assert_eq!( &h[12..16], b"fmt ");
        assert_eq!( &h[36..40], b"data");

        assert_eq!( u16::from_le_bytes( [h[20], h[21]]), 1); // PCM
        assert_eq!( u16::from_le_bytes( [h[22], h[23]]), 1); // mono
        assert_eq!( u32::from_le_bytes( [h[24], h[25], h[26], h[27]]), 24_000);
        assert_eq!( u32::from_le_bytes( [h[28], h[29], h[30], h[31]]), 48_000); // byte rate
        assert_eq!( u16::from_le_bytes( [h[32], h[33]]), 2); // block align
        assert_eq!( u16::from_le_bytes( [h[34], h[35]]), 16);

        // unknown stream length: data size pinned at max
        assert_eq!( u32::from_le_bytes( [h[40], h[41], h[42], h[43]]), u32::MAX - 36);
    }

    #[tokio::test]
    async fn test_header_precedes_data() {
        let buf = FanoutBuffer::with_capacity( 1024, Duration::from_millis(50));
        let reader = buf.create_reader("wav");
        buf.write( &[9u8; 8]).unwrap();

        let mut wav = WavReader::new( reader, 24_000, 1);
        let first = wav.next_chunk(4096).await;
        assert_eq!( first.len(), 44);
        assert_eq!( &first[0..4], b"RIFF");

        let second = wav.next_chunk(4096).await;
        assert_eq!( second, vec![9u8; 8]);
    }
}
