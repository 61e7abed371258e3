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

//! circular byte buffer with one writer and N independent named readers.
//! The writer never blocks. Late joiners start at the current write position;
//! a reader that lags beyond the buffer capacity is resynchronized to the
//! oldest retained byte and hears a discontinuity. A blocked read wakes on
//! new data, writer close, or the idle timeout (end of stream, prompting the
//! consumer to reconnect).

use std::{collections::HashMap, sync::{Arc,Mutex}, time::Duration};
use tokio::sync::Notify;
use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 64 * 1024;
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

struct ReaderState {
    read_pos: u64, // absolute stream position
    notify: Arc<Notify>,
}

struct Inner {
    buffer: Vec<u8>,
    write_pos: u64, // absolute stream position
    closed: bool,
    readers: HashMap<String,ReaderState>,
}

pub struct FanoutBuffer {
    inner: Mutex<Inner>,
    capacity: usize,
    read_timeout: Duration,
}

impl FanoutBuffer {
    pub fn new () -> Arc<Self> {
        Self::with_capacity( DEFAULT_CAPACITY, DEFAULT_READ_TIMEOUT)
    }

    pub fn with_capacity (capacity: usize, read_timeout: Duration) -> Arc<Self> {
        Arc::new( FanoutBuffer {
            inner: Mutex::new( Inner {
                buffer: vec![0u8; capacity],
                write_pos: 0,
                closed: false,
                readers: HashMap::new(),
            }),
            capacity,
            read_timeout,
        })
    }

    /// non-blocking write; overwrites the oldest data for any lagging reader
    pub fn write (&self, data: &[u8]) -> crate::errors::Result<usize> {
        let notifies: Vec<Arc<Notify>> = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            if inner.closed {
                return Err( crate::errors::AudioError::ClosedError);
            }

            let mut pos = inner.write_pos;
            for &b in data {
                let idx = (pos % self.capacity as u64) as usize;
                inner.buffer[idx] = b;
                pos += 1;
            }
            inner.write_pos = pos;

            inner.readers.values().map(|r| r.notify.clone()).collect()
        };

        for notify in notifies {
            notify.notify_one();
        }
        Ok( data.len())
    }

    /// create (or re-attach to) a named reader starting at the current write
    /// position - late joiners do not hear the past
    pub fn create_reader (self: &Arc<Self>, id: &str) -> FanoutReader {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let write_pos = inner.write_pos;
        inner.readers.entry( id.to_string()).or_insert_with(|| {
            debug!("created fanout reader {id}");
            ReaderState { read_pos: write_pos, notify: Arc::new( Notify::new()) }
        });
        FanoutReader { buffer: self.clone(), id: id.to_string(), detached: false }
    }

    /// idempotent; releases any waiter blocked on this reader
    pub fn remove_reader (&self, id: &str) {
        let notify = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.readers.remove(id).map(|r| r.notify)
        };
        if let Some(notify) = notify {
            debug!("removed fanout reader {id}");
            notify.notify_one();
        }
    }

    pub fn reader_count (&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).readers.len()
    }

    /// close the writer side; all blocked readers wake and see end of stream
    pub fn close (&self) {
        let notifies: Vec<Arc<Notify>> = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            inner.closed = true;
            inner.readers.values().map(|r| r.notify.clone()).collect()
        };
        for notify in notifies {
            notify.notify_one();
        }
    }

    /// one read attempt: copy whatever is available, resync on overrun.
    /// Returns None if the reader should wait (no data), Some(0) on EOF.
    fn try_read (&self, id: &str, buf: &mut [u8]) -> Option<usize> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let write_pos = inner.write_pos;
        let closed = inner.closed;
        let capacity = self.capacity as u64;

        let Some(reader) = inner.readers.get_mut(id) else {
            return Some(0); // removed -> EOF
        };

        let mut available = write_pos - reader.read_pos;
        if available == 0 {
            return if closed { Some(0) } else { None };
        }

        // overwritten while lagging: jump to the oldest byte still present
        if available > capacity {
            reader.read_pos = write_pos - capacity;
            available = capacity;
        }

        let n = (available as usize).min( buf.len());
        let start = reader.read_pos;
        for i in 0..n {
            let idx = ((start + i as u64) % capacity) as usize;
            buf[i] = inner.buffer[idx];
        }
        if let Some(reader) = inner.readers.get_mut(id) {
            reader.read_pos = start + n as u64;
        }
        Some(n)
    }

    fn reader_notify (&self, id: &str) -> Option<Arc<Notify>> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.readers.get(id).map(|r| r.notify.clone())
    }
}

/// handle for one named reader. Dropping it removes the reader.
pub struct FanoutReader {
    buffer: Arc<FanoutBuffer>,
    id: String,
    detached: bool,
}

impl FanoutReader {
    pub fn id (&self) -> &str { &self.id }

    /// read available bytes, waiting up to the buffer's idle timeout.
    /// Returns 0 on end of stream (writer closed, reader removed, or idle
    /// timeout) - the consumer is expected to reconnect.
    pub async fn read (&self, buf: &mut [u8]) -> usize {
        loop {
            match self.buffer.try_read( &self.id, buf) {
                Some(n) => return n,
                None => {
                    let Some(notify) = self.buffer.reader_notify( &self.id) else { return 0 };
                    match tokio::time::timeout( self.buffer.read_timeout, notify.notified()).await {
                        Ok(()) => continue,
                        Err(_) => return 0, // idle timeout -> end of stream
                    }
                }
            }
        }
    }

    /// keep the underlying reader registered after this handle goes away
    pub fn detach (mut self) {
        self.detached = true;
    }
}

impl Drop for FanoutReader {
    fn drop (&mut self) {
        if !self.detached {
            self.buffer.remove_reader( &self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_buffer () -> Arc<FanoutBuffer> {
        FanoutBuffer::with_capacity( 1024, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_late_joiner_starts_at_write_index() {
        let buf = fast_buffer();
        buf.write( &[1u8; 500]).unwrap();

        let reader = buf.create_reader("r1");
        buf.write( &[7u8; 10]).unwrap();

        let mut out = [0u8; 64];
        let n = reader.read( &mut out).await;
        assert_eq!( n, 10, "late joiner must not hear the past");
        assert!( out[..10].iter().all(|b| *b == 7));
    }

    #[tokio::test]
    async fn test_idle_timeout_returns_eof() {
        let buf = fast_buffer();
        let reader = buf.create_reader("r1");
        let mut out = [0u8; 16];
        let n = reader.read( &mut out).await;
        assert_eq!( n, 0, "idle timeout surfaces as end of stream");
    }

    #[tokio::test]
    async fn test_close_releases_blocked_reader() {
        let buf = FanoutBuffer::with_capacity( 1024, Duration::from_secs(30));
        let reader = buf.create_reader("r1");
        let buf2 = buf.clone();

        let handle = tokio::spawn( async move {
            let mut out = [0u8; 16];
            reader.read( &mut out).await
        });
        tokio::time::sleep( Duration::from_millis(20)).await;
        buf2.close();

        let n = handle.await.unwrap();
        assert_eq!( n, 0);
    }

    #[tokio::test]
    async fn test_remove_reader_idempotent() {
        let buf = fast_buffer();
        let reader = buf.create_reader("r1");
        buf.remove_reader("r1");
        buf.remove_reader("r1"); // second removal is a no-op
        assert_eq!( buf.reader_count(), 0);

        let mut out = [0u8; 4];
        assert_eq!( reader.read( &mut out).await, 0, "a removed reader reads end of stream");
    }

    #[tokio::test]
    async fn test_overrun_resyncs_to_oldest_retained() {
        let buf = FanoutBuffer::with_capacity( 16, Duration::from_millis(100));
        let reader = buf.create_reader("r1");

        // write 40 bytes 0..40 into a 16 byte buffer without reading
        let data: Vec<u8> = (0u8..40).collect();
        buf.write( &data).unwrap();

        let mut out = [0u8; 64];
        let n = reader.read( &mut out).await;
        assert_eq!( n, 16, "at most one buffer's worth survives an overrun");
        // the oldest retained byte is 40-16 = 24
        assert_eq!( &out[..16], &(24u8..40).collect::<Vec<u8>>()[..]);
    }
}
