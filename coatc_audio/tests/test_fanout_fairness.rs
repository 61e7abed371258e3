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

//! slow-consumer isolation: a reader that stops consuming must neither delay
//! the other readers nor stall the writer - it just loses the overwritten
//! bytes and resumes on current data.

use std::time::Duration;
use coatc_audio::fanout::FanoutBuffer;

const CAPACITY: usize = 64 * 1024;
const TOTAL: usize = 200 * 1024;
const CHUNK: usize = 8 * 1024;

fn pattern (i: usize) -> u8 {
    (i % 251) as u8
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_three_readers_one_stalled() {
    let buf = FanoutBuffer::with_capacity( CAPACITY, Duration::from_secs(5));

    let r1 = buf.create_reader("r1");
    let r2 = buf.create_reader("r2"); // will never read until the end
    let r3 = buf.create_reader("r3");

    let (tx1, mut rx1) = tokio::sync::mpsc::unbounded_channel::<usize>();
    let (tx3, mut rx3) = tokio::sync::mpsc::unbounded_channel::<usize>();

    let consume = |reader: coatc_audio::fanout::FanoutReader, tx: tokio::sync::mpsc::UnboundedSender<usize>| {
        tokio::spawn( async move {
            let mut received: Vec<u8> = Vec::with_capacity(TOTAL);
            let mut chunk = vec![0u8; 16 * 1024];
            while received.len() < TOTAL {
                let n = reader.read( &mut chunk).await;
                if n == 0 { break }
                received.extend_from_slice( &chunk[..n]);
                let _ = tx.send( received.len());
            }
            received
        })
    };

    let h1 = consume( r1, tx1);
    let h3 = consume( r3, tx3);

    // write 200 KiB; after each chunk wait until the live readers caught up so
    // the test is deterministic - the buffer itself never applies backpressure
    let mut written = 0usize;
    while written < TOTAL {
        let chunk: Vec<u8> = (written..written + CHUNK).map(pattern).collect();
        buf.write( &chunk).unwrap();
        written += CHUNK;

        for rx in [&mut rx1, &mut rx3] {
            loop {
                match rx.recv().await {
                    Some(n) if n >= written => break,
                    Some(_) => continue,
                    None => break,
                }
            }
        }
    }

    let received1 = h1.await.unwrap();
    let received3 = h3.await.unwrap();

    // live readers observed every byte written after their start index, in order
    for (name, received) in [("r1", &received1), ("r3", &received3)] {
        assert_eq!( received.len(), TOTAL, "{name} byte count");
        for (i, b) in received.iter().enumerate() {
            assert_eq!( *b, pattern(i), "{name} byte {i}");
        }
    }

    // the stalled reader lost everything but the last buffer's worth; its next
    // read returns discontinuous but current data
    let mut out = vec![0u8; CAPACITY + 1024];
    let n = r2.read( &mut out).await;
    assert!( n > 0 && n <= CAPACITY);
    assert_eq!( out[0], pattern( TOTAL - CAPACITY), "resync lands on the oldest retained byte");
    for i in 0..n {
        assert_eq!( out[i], pattern( TOTAL - CAPACITY + i));
    }
}

#[tokio::test]
async fn test_writer_never_blocks_on_stalled_reader() {
    let buf = FanoutBuffer::with_capacity( 1024, Duration::from_secs(5));
    let _stalled = buf.create_reader("stalled");

    // 100x the capacity with nobody reading: every write returns immediately
    for i in 0..100usize {
        let chunk = vec![(i % 251) as u8; 1024];
        let n = buf.write( &chunk).unwrap();
        assert_eq!( n, 1024);
    }
}
