//! Binary message envelope carried in WebSocket binary frames.
//!
//! Encoded in protobuf wire format so the node can parse it without any
//! client-specific schema:
//!
//! ```text
//! OutboundMessage { dest = 1 (string, legacy), payload = 2, dests = 3, max_holding_seconds = 4 }
//! InboundMessage  { src = 1, payload = 2 }
//! ```

use crate::wire::{self, WIRE_LEN, WIRE_VARINT};
use crate::DecodeError;

/// A message handed to the node for delivery to one or more addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutboundMessage {
    pub payload: Vec<u8>,
    /// Destination addresses, in caller order.
    pub dests: Vec<String>,
    /// How long the overlay may hold the message for an offline recipient.
    pub max_holding_seconds: u32,
}

impl OutboundMessage {
    pub fn new(dests: Vec<String>, payload: Vec<u8>, max_holding_seconds: u32) -> Self {
        Self {
            payload,
            dests,
            max_holding_seconds,
        }
    }

    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            self.payload.len() + self.dests.iter().map(|d| d.len() + 2).sum::<usize>() + 8,
        );
        if !self.payload.is_empty() {
            wire::put_bytes(&mut buf, 2, &self.payload);
        }
        for dest in &self.dests {
            wire::put_bytes(&mut buf, 3, dest.as_bytes());
        }
        if self.max_holding_seconds != 0 {
            wire::put_uint32(&mut buf, 4, self.max_holding_seconds);
        }
        buf
    }

    /// Decode an envelope. A legacy single `dest` (field 1) is folded into
    /// `dests` ahead of the repeated entries.
    pub fn decode(mut data: &[u8]) -> Result<Self, DecodeError> {
        let mut msg = Self::default();
        let mut legacy_dest = None;
        while !data.is_empty() {
            let (field, wire_type) = wire::get_key(&mut data)?;
            match (field, wire_type) {
                (1, WIRE_LEN) => legacy_dest = Some(wire::get_string(&mut data, 1)?),
                (2, WIRE_LEN) => msg.payload = wire::get_len_delimited(&mut data)?,
                (3, WIRE_LEN) => msg.dests.push(wire::get_string(&mut data, 3)?),
                (4, WIRE_VARINT) => msg.max_holding_seconds = wire::get_varint(&mut data)? as u32,
                _ => wire::skip_field(&mut data, field, wire_type)?,
            }
        }
        if let Some(dest) = legacy_dest.filter(|d| !d.is_empty()) {
            msg.dests.insert(0, dest);
        }
        Ok(msg)
    }
}

/// A message delivered to this client by its serving node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
    /// Address of the sender.
    pub src: String,
    pub payload: Vec<u8>,
}

impl InboundMessage {
    pub fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.src.len() + self.payload.len() + 8);
        if !self.src.is_empty() {
            wire::put_bytes(&mut buf, 1, self.src.as_bytes());
        }
        if !self.payload.is_empty() {
            wire::put_bytes(&mut buf, 2, &self.payload);
        }
        buf
    }

    pub fn decode(mut data: &[u8]) -> Result<Self, DecodeError> {
        let mut msg = Self::default();
        while !data.is_empty() {
            let (field, wire_type) = wire::get_key(&mut data)?;
            match (field, wire_type) {
                (1, WIRE_LEN) => msg.src = wire::get_string(&mut data, 1)?,
                (2, WIRE_LEN) => msg.payload = wire::get_len_delimited(&mut data)?,
                _ => wire::skip_field(&mut data, field, wire_type)?,
            }
        }
        Ok(msg)
    }
}
