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

//! Outbound store of unacknowledged frames.
//!
//! A QoS >= 1 PUBLISH lives here from the moment it is sent until the
//! terminal acknowledgment arrives; a PUBREL lives here from the PUBREC
//! that provoked it until PUBCOMP. Entries are kept in insertion order for
//! reconnect replay, with a secondary index from packet identifier to
//! sequence for acknowledgment lookup.

use std::collections::{BTreeMap, HashMap};

use crate::mqtt_ep::packet::PacketType;
use crate::mqtt_ep::send_buffer::Frame;

/// A stored frame extracted for inspection or session persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePacket {
    pub packet_id: u16,
    pub expected_response: PacketType,
    pub bytes: Vec<u8>,
}

#[derive(Debug)]
struct Entry {
    packet_id: u16,
    expected_response: PacketType,
    frame: Frame,
}

/// Sequence-ordered store with a packet-id index.
///
/// The sequence counter only grows, so iterating the primary map yields
/// insertion order. A packet identifier maps to at most one live entry per
/// expected response type; during the QoS 2 handshake the same identifier
/// appears first with an expected PUBREC, then with an expected PUBCOMP.
#[derive(Debug, Default)]
pub(crate) struct Store {
    next_seq: u64,
    by_seq: BTreeMap<u64, Entry>,
    by_packet_id: HashMap<u16, Vec<u64>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, packet_id: u16, expected_response: PacketType, frame: Frame) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.by_seq.insert(
            seq,
            Entry {
                packet_id,
                expected_response,
                frame,
            },
        );
        self.by_packet_id.entry(packet_id).or_default().push(seq);
    }

    /// Erase the entry waiting for `expected_response` on `packet_id`.
    /// The response type is validated at the sequence entry; a stray
    /// acknowledgment of the wrong type removes nothing.
    pub fn erase_response(&mut self, packet_id: u16, expected_response: PacketType) -> bool {
        let Some(seqs) = self.by_packet_id.get_mut(&packet_id) else {
            return false;
        };
        let Some(pos) = seqs.iter().position(|seq| {
            self.by_seq
                .get(seq)
                .is_some_and(|e| e.expected_response == expected_response)
        }) else {
            return false;
        };
        let seq = seqs.remove(pos);
        if seqs.is_empty() {
            self.by_packet_id.remove(&packet_id);
        }
        self.by_seq.remove(&seq);
        true
    }

    /// Erase every entry carrying `packet_id`, whatever response it awaits.
    pub fn erase_packet_id(&mut self, packet_id: u16) -> usize {
        let Some(seqs) = self.by_packet_id.remove(&packet_id) else {
            return 0;
        };
        let count = seqs.len();
        for seq in seqs {
            self.by_seq.remove(&seq);
        }
        count
    }

    pub fn clear(&mut self) {
        self.by_seq.clear();
        self.by_packet_id.clear();
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.by_seq.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_seq.len()
    }

    /// Frames to retransmit after a non-clean reconnect, in insertion
    /// order. PUBLISH entries (those awaiting PUBACK or PUBREC) get the
    /// DUP bit set in place before their frame is handed out; PUBREL
    /// entries are resent verbatim.
    pub fn replay_frames(&mut self) -> Vec<Frame> {
        self.by_seq
            .values_mut()
            .map(|entry| {
                if matches!(
                    entry.expected_response,
                    PacketType::Puback | PacketType::Pubrec
                ) {
                    entry.frame.set_dup();
                }
                entry.frame.clone()
            })
            .collect()
    }

    /// Copy out every stored frame in insertion order.
    pub fn snapshot(&self) -> Vec<StorePacket> {
        self.by_seq
            .values()
            .map(|entry| StorePacket {
                packet_id: entry.packet_id,
                expected_response: entry.expected_response,
                bytes: entry.frame.as_bytes().to_vec(),
            })
            .collect()
    }
}
