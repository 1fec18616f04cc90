/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! STUN (RFC 5389) message serialization and parsing: just enough of the
//! wire format to make a relay's datagrams look like NAT-traversal cover
//! traffic. Not a general STUN implementation — only the message and
//! attribute types this crate actually emits or consumes are recognized.

use crate::error::{RelayError, Result};

pub const MAGIC_COOKIE: u32 = 0x2112_A442;
pub const TRANSACTION_ID_LEN: usize = 12;
const HEADER_LEN: usize = 20;

/// Recognized STUN message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    BindingRequest,
    BindingResponse,
    DataIndication,
}

impl MessageType {
    pub const fn code(self) -> u16 {
        match self {
            MessageType::BindingRequest => 0x0001,
            MessageType::BindingResponse => 0x0101,
            MessageType::DataIndication => 0x0115,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::BindingRequest),
            0x0101 => Some(Self::BindingResponse),
            0x0115 => Some(Self::DataIndication),
            _ => None,
        }
    }
}

/// Recognized STUN attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeType {
    XorMappedAddress,
    Software,
    Fingerprint,
    Data,
}

impl AttributeType {
    pub const fn code(self) -> u16 {
        match self {
            AttributeType::XorMappedAddress => 0x0020,
            AttributeType::Software => 0x8022,
            AttributeType::Fingerprint => 0x8028,
            AttributeType::Data => 0x0013,
        }
    }
}

/// One parsed attribute: a recognized or unrecognized type code plus its
/// raw value bytes (padding already stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub type_code: u16,
    pub value: Vec<u8>,
}

impl Attribute {
    pub fn new(attr_type: AttributeType, value: Vec<u8>) -> Self {
        Self { type_code: attr_type.code(), value }
    }

    fn padded_len(&self) -> usize {
        4 + self.value.len() + pad_to_4(self.value.len())
    }
}

fn pad_to_4(len: usize) -> usize {
    (4 - len % 4) % 4
}

/// A full STUN message: header fields plus zero or more attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StunPacket {
    pub message_type: MessageType,
    pub transaction_id: [u8; TRANSACTION_ID_LEN],
    pub attributes: Vec<Attribute>,
}

impl StunPacket {
    pub fn new(
        message_type: MessageType,
        transaction_id: [u8; TRANSACTION_ID_LEN],
        attributes: Vec<Attribute>,
    ) -> Self {
        Self { message_type, transaction_id, attributes }
    }

    /// Serializes the message to its wire form: 20-byte header followed by
    /// each attribute, always a multiple of 4 bytes, never shorter than 20.
    pub fn serialize(&self) -> Vec<u8> {
        let body_len: usize = self.attributes.iter().map(Attribute::padded_len).sum();

        let mut out = Vec::with_capacity(HEADER_LEN + body_len);
        out.extend_from_slice(&self.message_type.code().to_be_bytes());
        out.extend_from_slice(&(body_len as u16).to_be_bytes());
        out.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        out.extend_from_slice(&self.transaction_id);

        for attr in &self.attributes {
            out.extend_from_slice(&attr.type_code.to_be_bytes());
            out.extend_from_slice(&(attr.value.len() as u16).to_be_bytes());
            out.extend_from_slice(&attr.value);
            out.extend(std::iter::repeat(0u8).take(pad_to_4(attr.value.len())));
        }

        out
    }

    /// Parses a STUN message from `data`. Requires at least 20 bytes, a
    /// known message type, a matching magic cookie, and a header `length`
    /// that the buffer actually has room for; each attribute is bounds
    /// checked individually.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(RelayError::PacketTooShort { expected: HEADER_LEN, got: data.len() });
        }

        let type_code = u16::from_be_bytes([data[0], data[1]]);
        let message_type =
            MessageType::from_code(type_code).ok_or(RelayError::UnknownMessageType(type_code))?;

        let length = u16::from_be_bytes([data[2], data[3]]) as usize;
        if data.len() < HEADER_LEN + length {
            return Err(RelayError::PacketTooShort { expected: HEADER_LEN + length, got: data.len() });
        }

        let magic = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
        if magic != MAGIC_COOKIE {
            return Err(RelayError::InvalidMagicCookie);
        }

        let mut transaction_id = [0u8; TRANSACTION_ID_LEN];
        transaction_id.copy_from_slice(&data[8..20]);

        let mut attributes = Vec::new();
        let mut offset = HEADER_LEN;
        let end = HEADER_LEN + length;
        while offset < end {
            if offset + 4 > data.len() {
                return Err(RelayError::MalformedAttribute);
            }
            let type_code = u16::from_be_bytes([data[offset], data[offset + 1]]);
            let a_len = u16::from_be_bytes([data[offset + 2], data[offset + 3]]) as usize;
            if offset + 4 + a_len > data.len() {
                return Err(RelayError::MalformedAttribute);
            }
            let value = data[offset + 4..offset + 4 + a_len].to_vec();
            attributes.push(Attribute { type_code, value });
            offset += 4 + a_len + pad_to_4(a_len);
        }

        Ok(Self { message_type, transaction_id, attributes })
    }

    /// Returns the first attribute matching `attr_type`, if any.
    pub fn find_attribute(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.type_code == attr_type.code())
    }
}

/// Returns whether `data` carries the STUN magic cookie at bytes 4..8,
/// without otherwise validating the message. Requires at least 8 bytes.
pub fn has_magic_cookie(data: &[u8]) -> bool {
    data.len() >= 8 && u32::from_be_bytes([data[4], data[5], data[6], data[7]]) == MAGIC_COOKIE
}

/// Returns the message type encoded in bytes 0..2 without parsing the rest
/// of the message.
pub fn peek_type(data: &[u8]) -> Option<MessageType> {
    if data.len() < 2 {
        return None;
    }
    MessageType::from_code(u16::from_be_bytes([data[0], data[1]]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_binding_request_known_vector() {
        let packet = StunPacket::new(MessageType::BindingRequest, [0xAB; 12], vec![]);
        let bytes = packet.serialize();
        assert_eq!(bytes.len(), 20);
        assert_eq!(hex::encode(&bytes), "000100002112a442abababababababababababab");
    }

    #[test]
    fn serialize_data_indication_known_vector() {
        let payload = b"Hello WireGuard".to_vec();
        assert_eq!(payload.len(), 15);
        let packet = StunPacket::new(
            MessageType::DataIndication,
            [0; 12],
            vec![Attribute::new(AttributeType::Data, payload.clone())],
        );
        let bytes = packet.serialize();
        assert_eq!(bytes.len(), 40);
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), 20);
        assert_eq!(u16::from_be_bytes([bytes[20], bytes[21]]), AttributeType::Data.code());
        assert_eq!(u16::from_be_bytes([bytes[22], bytes[23]]), 15);
        assert_eq!(&bytes[24..39], payload.as_slice());
        assert_eq!(bytes[39], 0);
    }

    #[test]
    fn parse_is_inverse_of_serialize() {
        let packet = StunPacket::new(
            MessageType::DataIndication,
            [7; 12],
            vec![
                Attribute::new(AttributeType::Data, b"payload".to_vec()),
                Attribute::new(AttributeType::Software, b"wgcloak".to_vec()),
            ],
        );
        let bytes = packet.serialize();
        let parsed = StunPacket::parse(&bytes).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn parse_rejects_short_buffer() {
        let err = StunPacket::parse(&[0u8; 10]).unwrap_err();
        assert_eq!(err, RelayError::PacketTooShort { expected: 20, got: 10 });
    }

    #[test]
    fn parse_rejects_bad_magic_cookie() {
        let mut bytes = StunPacket::new(MessageType::BindingRequest, [0; 12], vec![]).serialize();
        bytes[4] = 0;
        let err = StunPacket::parse(&bytes).unwrap_err();
        assert_eq!(err, RelayError::InvalidMagicCookie);
    }

    #[test]
    fn parse_rejects_unknown_message_type() {
        let mut bytes = StunPacket::new(MessageType::BindingRequest, [0; 12], vec![]).serialize();
        bytes[0] = 0x99;
        bytes[1] = 0x99;
        let err = StunPacket::parse(&bytes).unwrap_err();
        assert_eq!(err, RelayError::UnknownMessageType(0x9999));
    }

    #[test]
    fn attribute_padding_roundtrips_for_every_small_length() {
        for len in 1..=17usize {
            let value = vec![0xCDu8; len];
            let packet = StunPacket::new(
                MessageType::DataIndication,
                [1; 12],
                vec![Attribute::new(AttributeType::Data, value.clone())],
            );
            let bytes = packet.serialize();
            assert_eq!(bytes.len() % 4, 0);
            let parsed = StunPacket::parse(&bytes).unwrap();
            let attr = parsed.find_attribute(AttributeType::Data).unwrap();
            assert_eq!(attr.value, value);
        }
    }

    #[test]
    fn has_magic_cookie_requires_eight_bytes() {
        assert!(!has_magic_cookie(&[0u8; 7]));
        let bytes = StunPacket::new(MessageType::BindingRequest, [0; 12], vec![]).serialize();
        assert!(has_magic_cookie(&bytes));
    }

    #[test]
    fn peek_type_reads_without_full_parse() {
        let bytes = StunPacket::new(MessageType::DataIndication, [0; 12], vec![]).serialize();
        assert_eq!(peek_type(&bytes), Some(MessageType::DataIndication));
        assert_eq!(peek_type(&[0x00]), None);
    }
}
