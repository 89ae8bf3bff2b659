// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Packet identifier allocation.
//!
//! Identifiers are 16-bit non-zero values scoped to one endpoint. They
//! disambiguate in-flight QoS 1/2 publishes, subscriptions and
//! unsubscriptions, and must not be reused until the peer acknowledges the
//! packet that holds them.

use std::collections::HashSet;

use crate::mqtt_ep::connection_error::MqttError;

/// Allocates and tracks packet identifiers.
///
/// A monotonically advancing cursor probes forward from the last grant,
/// skipping zero and any identifier still in use. Allocation fails
/// deterministically once 65,534 identifiers are outstanding.
#[derive(Debug, Default)]
pub struct PacketIdAllocator {
    cursor: u16,
    in_use: HashSet<u16>,
}

impl PacketIdAllocator {
    pub fn new() -> Self {
        Self {
            cursor: 0,
            in_use: HashSet::new(),
        }
    }

    /// Acquire a fresh identifier and mark it used.
    pub fn acquire(&mut self) -> Result<u16, MqttError> {
        if self.in_use.len() == usize::from(u16::MAX) - 1 {
            return Err(MqttError::PacketIdExhausted);
        }
        loop {
            self.cursor = self.cursor.wrapping_add(1);
            if self.cursor == 0 {
                self.cursor = 1;
            }
            if self.in_use.insert(self.cursor) {
                return Ok(self.cursor);
            }
        }
    }

    /// Register a caller-chosen identifier. Fails on zero or collision.
    pub fn register(&mut self, packet_id: u16) -> Result<(), MqttError> {
        if packet_id == 0 || !self.in_use.insert(packet_id) {
            return Err(MqttError::PacketIdCollision);
        }
        Ok(())
    }

    /// Return an identifier to the free pool.
    pub fn release(&mut self, packet_id: u16) {
        self.in_use.remove(&packet_id);
    }

    pub fn is_in_use(&self, packet_id: u16) -> bool {
        self.in_use.contains(&packet_id)
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_acquire() {
        let mut alloc = PacketIdAllocator::new();
        assert_eq!(alloc.acquire(), Ok(1));
        assert_eq!(alloc.acquire(), Ok(2));
        assert_eq!(alloc.acquire(), Ok(3));
    }

    #[test]
    fn never_returns_zero_on_wrap() {
        let mut alloc = PacketIdAllocator::new();
        alloc.cursor = u16::MAX;
        assert_eq!(alloc.acquire(), Ok(1));
    }

    #[test]
    fn skips_in_use_ids() {
        let mut alloc = PacketIdAllocator::new();
        alloc.register(1).unwrap();
        alloc.register(2).unwrap();
        assert_eq!(alloc.acquire(), Ok(3));
    }

    #[test]
    fn register_rejects_zero_and_collision() {
        let mut alloc = PacketIdAllocator::new();
        assert_eq!(alloc.register(0), Err(MqttError::PacketIdCollision));
        assert_eq!(alloc.register(5), Ok(()));
        assert_eq!(alloc.register(5), Err(MqttError::PacketIdCollision));
    }

    #[test]
    fn release_allows_reuse() {
        let mut alloc = PacketIdAllocator::new();
        let id = alloc.acquire().unwrap();
        assert!(alloc.is_in_use(id));
        alloc.release(id);
        assert!(!alloc.is_in_use(id));
        assert_eq!(alloc.register(id), Ok(()));
    }

    #[test]
    fn exhaustion_is_deterministic() {
        let mut alloc = PacketIdAllocator::new();
        for _ in 0..u16::MAX as usize - 1 {
            alloc.acquire().unwrap();
        }
        assert_eq!(alloc.acquire(), Err(MqttError::PacketIdExhausted));
        // freeing one identifier makes acquire succeed again
        alloc.release(1);
        assert_eq!(alloc.acquire(), Ok(1));
    }
}
