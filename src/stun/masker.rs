/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! Wraps obfuscated payloads inside synthetic STUN messages and unwraps
//! them on the way back, plus the keepalive/binding-response helpers that
//! make the cover traffic plausible on the wire.

use super::crc32::crc32;
use super::message::{has_magic_cookie, Attribute, AttributeType, MessageType, StunPacket};
use crate::error::{RelayError, Result};
use rand::RngCore;

const FINGERPRINT_XOR: u32 = 0x5354_554E;
const FAST_PATH_HEADER_LEN: usize = 24;

/// Generates random 12-byte STUN transaction IDs and turns obfuscated
/// payloads into `Data Indication` messages (and back), plus the
/// `Binding Request`/`Binding Response` keepalive exchange. Stateless and
/// cheap to construct — held for the lifetime of a relay session.
#[derive(Clone, Default)]
pub struct StunMasker;

impl StunMasker {
    pub fn new() -> Self {
        Self
    }

    /// Wraps a non-empty `payload` in a freshly keyed `Data Indication`.
    pub fn wrap(&self, payload: &[u8]) -> Result<Vec<u8>> {
        if payload.is_empty() {
            return Err(RelayError::PacketTooShort { expected: 1, got: 0 });
        }
        let packet = StunPacket::new(
            MessageType::DataIndication,
            random_transaction_id(),
            vec![Attribute::new(AttributeType::Data, payload.to_vec())],
        );
        Ok(packet.serialize())
    }

    /// Unwraps a `Data Indication`'s `Data` attribute. Returns `Ok(None)`
    /// (not an error) for anything that isn't recognizably a `Data
    /// Indication` — most traffic passing through a STUN-masked relay is
    /// exactly that, and it must be silently dropped rather than logged as
    /// an error. Takes a fast path recognizing the `Data` attribute header
    /// at its fixed offset before falling back to a full parse.
    pub fn unwrap(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        if data.len() < FAST_PATH_HEADER_LEN || !has_magic_cookie(data) {
            return Ok(None);
        }
        if super::message::peek_type(data) != Some(MessageType::DataIndication) {
            return Ok(None);
        }

        if data[20] == 0x00 && data[21] == 0x13 {
            let len = u16::from_be_bytes([data[22], data[23]]) as usize;
            let end = FAST_PATH_HEADER_LEN + len;
            if end > data.len() {
                return Err(RelayError::MalformedAttribute);
            }
            return Ok(Some(data[FAST_PATH_HEADER_LEN..end].to_vec()));
        }

        let packet = StunPacket::parse(data)?;
        match packet.find_attribute(AttributeType::Data) {
            Some(attr) => Ok(Some(attr.value.clone())),
            None => Err(RelayError::MalformedAttribute),
        }
    }

    /// Builds a `Binding Request` keepalive carrying a `FINGERPRINT`
    /// attribute. The fingerprint is computed over the serialization of
    /// the message *without* the fingerprint attribute, then the attribute
    /// is appended and the message is reserialized — reproducing the
    /// upstream project's behavior rather than RFC 5389's stricter
    /// "as if already appended" rule (see DESIGN.md).
    pub fn generate_keepalive(&self) -> Vec<u8> {
        let without_fingerprint =
            StunPacket::new(MessageType::BindingRequest, random_transaction_id(), vec![]);
        let serialized = without_fingerprint.serialize();
        let fingerprint = crc32(&serialized) ^ FINGERPRINT_XOR;

        let mut with_fingerprint = without_fingerprint;
        with_fingerprint
            .attributes
            .push(Attribute::new(AttributeType::Fingerprint, fingerprint.to_be_bytes().to_vec()));
        with_fingerprint.serialize()
    }

    /// Parses `req`; if it is a `Binding Request`, returns a serialized
    /// `Binding Response` echoing its transaction ID with no attributes.
    /// Returns `None` for any other message (including parse failures).
    pub fn handle_binding_request(&self, req: &[u8]) -> Option<Vec<u8>> {
        let packet = StunPacket::parse(req).ok()?;
        if packet.message_type != MessageType::BindingRequest {
            return None;
        }
        Some(StunPacket::new(MessageType::BindingResponse, packet.transaction_id, vec![]).serialize())
    }
}

fn random_transaction_id() -> [u8; super::message::TRANSACTION_ID_LEN] {
    let mut id = [0u8; super::message::TRANSACTION_ID_LEN];
    rand::rng().fill_bytes(&mut id);
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_rejects_empty_payload() {
        let masker = StunMasker::new();
        assert!(masker.wrap(&[]).is_err());
    }

    #[test]
    fn wrap_unwrap_roundtrip() {
        let masker = StunMasker::new();
        let payload = b"obfuscated-wireguard-bytes".to_vec();
        let wrapped = masker.wrap(&payload).unwrap();
        let unwrapped = masker.unwrap(&wrapped).unwrap();
        assert_eq!(unwrapped, Some(payload));
    }

    #[test]
    fn unwrap_non_stun_bytes_is_none_not_error() {
        let masker = StunMasker::new();
        let result = masker.unwrap(b"just some random udp payload that is not stun").unwrap();
        assert_eq!(result, None);
    }

    #[test]
    fn unwrap_rejects_short_buffer_as_none() {
        let masker = StunMasker::new();
        assert_eq!(masker.unwrap(&[1, 2, 3]).unwrap(), None);
    }

    #[test]
    fn unwrap_fast_path_matches_full_parse() {
        let masker = StunMasker::new();
        for len in [1usize, 5, 15, 64] {
            let payload = vec![0x5Au8; len];
            let wrapped = masker.wrap(&payload).unwrap();
            assert_eq!(wrapped[20], 0x00);
            assert_eq!(wrapped[21], 0x13);
            let unwrapped = masker.unwrap(&wrapped).unwrap();
            assert_eq!(unwrapped, Some(payload));
        }
    }

    #[test]
    fn keepalive_carries_valid_fingerprint() {
        let masker = StunMasker::new();
        let keepalive = masker.generate_keepalive();
        let packet = StunPacket::parse(&keepalive).unwrap();
        assert_eq!(packet.message_type, MessageType::BindingRequest);
        let fp = packet.find_attribute(AttributeType::Fingerprint).unwrap();
        assert_eq!(fp.value.len(), 4);

        let without_fp =
            StunPacket::new(MessageType::BindingRequest, packet.transaction_id, vec![]).serialize();
        let expected = crc32(&without_fp) ^ FINGERPRINT_XOR;
        assert_eq!(u32::from_be_bytes(fp.value.clone().try_into().unwrap()), expected);
    }

    #[test]
    fn handle_binding_request_echoes_transaction_id() {
        let masker = StunMasker::new();
        let txid = [0x11u8; 12];
        let req = StunPacket::new(MessageType::BindingRequest, txid, vec![]).serialize();
        let resp = masker.handle_binding_request(&req).unwrap();
        let parsed = StunPacket::parse(&resp).unwrap();
        assert_eq!(parsed.message_type, MessageType::BindingResponse);
        assert_eq!(parsed.transaction_id, txid);
        assert!(parsed.attributes.is_empty());
    }

    #[test]
    fn handle_binding_request_ignores_other_types() {
        let masker = StunMasker::new();
        let data_ind = StunPacket::new(MessageType::DataIndication, [0; 12], vec![]).serialize();
        assert_eq!(masker.handle_binding_request(&data_ind), None);
    }
}
