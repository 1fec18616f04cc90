/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! # Obfuscation engine
//!
//! Generates a length- and key-derived keystream and XORs it into a buffer
//! in place. The keystream is driven by a reflected CRC-8 (polynomial
//! `0x8C`) accumulator seeded fresh for every call, folding the buffer
//! length into the seed so the same key never produces the same stream for
//! two different packet sizes.

use crate::error::{RelayError, Result};

/// WireGuard message type, encoded as a little-endian `u32` in the first
/// four bytes of a plaintext datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireGuardMessageType {
    HandshakeInitiation = 1,
    HandshakeResponse = 2,
    Cookie = 3,
    Data = 4,
}

impl WireGuardMessageType {
    fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::HandshakeInitiation),
            2 => Some(Self::HandshakeResponse),
            3 => Some(Self::Cookie),
            4 => Some(Self::Data),
            _ => None,
        }
    }
}

/// 256-entry table for the reflected CRC-8 (poly `0x8C`) step used by the
/// keystream generator. Built once, at first use.
fn crc8_table() -> &'static [u8; 256] {
    use std::sync::OnceLock;
    static TABLE: OnceLock<[u8; 256]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut table = [0u8; 256];
        let mut i = 0usize;
        while i < 256 {
            table[i] = crc8_step_bitwise(0, i as u8);
            i += 1;
        }
        table
    })
}

/// Eight-round reflected CRC-8 step, computed bit by bit, matching the
/// algorithm in the obfuscation spec exactly. Used both to seed the table
/// and, if ever needed, as a fallback that needs no precomputation.
fn crc8_step_bitwise(mut c: u8, mut x: u8) -> u8 {
    for _ in 0..8 {
        let mix = (c ^ x) & 1;
        c >>= 1;
        if mix != 0 {
            c ^= 0x8C;
        }
        x >>= 1;
    }
    c
}

/// Obfuscation engine: derives a per-call keystream from a fixed key and
/// XORs it over a caller-supplied buffer. Value-like — constructed once
/// from a key and reused for the lifetime of a session.
#[derive(Clone)]
pub struct ObfuscationEngine {
    key: Vec<u8>,
}

impl ObfuscationEngine {
    /// Builds an engine from a key of `1..=255` bytes. Rejects anything
    /// outside that range so every downstream keystream computation can
    /// assume a non-empty, byte-indexable key.
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(RelayError::KeyTooShort(0));
        }
        if key.len() > 255 {
            return Err(RelayError::KeyTooLong(key.len()));
        }
        Ok(Self { key })
    }

    /// XORs the length- and key-derived keystream into `buf` in place.
    /// Applying this twice to a buffer of the same length with the same
    /// key restores the original bytes — the transform is an involution.
    pub fn xor(&self, buf: &mut [u8]) {
        let n = buf.len();
        if n == 0 {
            return;
        }
        let table = crc8_table();
        let k = self.key.len();
        let l = ((n + k) % 256) as u8;
        let mut c: u8 = 0;
        for (i, byte) in buf.iter_mut().enumerate() {
            let kb = self.key[i % k];
            let x = kb.wrapping_add(l);
            c = table[(c ^ x) as usize];
            *byte ^= c;
        }
    }

    /// True iff `buf` does not look like a plaintext WireGuard datagram:
    /// either too short, or the leading little-endian `u32` is not a
    /// recognized message type.
    pub fn is_obfuscated(buf: &[u8]) -> bool {
        if buf.len() < 4 {
            return true;
        }
        let v = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        WireGuardMessageType::from_u32(v).is_none()
    }

    /// Returns the WireGuard message type encoded in `buf`'s first four
    /// bytes, if any.
    pub fn detect_type(buf: &[u8]) -> Option<WireGuardMessageType> {
        if buf.len() < 4 {
            return None;
        }
        let v = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        WireGuardMessageType::from_u32(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(key: &str) -> ObfuscationEngine {
        ObfuscationEngine::new(key.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn rejects_empty_key() {
        assert_eq!(ObfuscationEngine::new(Vec::<u8>::new()), Err(RelayError::KeyTooShort(0)));
    }

    #[test]
    fn rejects_oversize_key() {
        let key = vec![0u8; 256];
        assert_eq!(ObfuscationEngine::new(key), Err(RelayError::KeyTooLong(256)));
    }

    #[test]
    fn accepts_boundary_keys() {
        assert!(ObfuscationEngine::new(vec![1u8]).is_ok());
        assert!(ObfuscationEngine::new(vec![1u8; 255]).is_ok());
    }

    #[test]
    fn xor_is_involution_at_fixed_length() {
        let e = engine("testkey");
        let original = b"hello wireguard packet!".to_vec();
        let mut buf = original.clone();
        e.xor(&mut buf);
        assert_ne!(buf, original);
        e.xor(&mut buf);
        assert_eq!(buf, original);
    }

    #[test]
    fn keystream_depends_on_length() {
        let e = engine("testkey");
        let mut a = vec![0x42u8; 16];
        let mut b = vec![0x42u8; 17];
        e.xor(&mut a);
        e.xor(&mut b);
        // Same key, same leading 16 bytes of plaintext, different total
        // length: the keystream must diverge because L folds in the full
        // buffer length, not just the byte index.
        assert_ne!(&a[..], &b[..16]);
    }

    #[test]
    fn is_obfuscated_detects_short_and_unknown() {
        assert!(ObfuscationEngine::is_obfuscated(&[]));
        assert!(ObfuscationEngine::is_obfuscated(&[1, 2, 3]));
        assert!(ObfuscationEngine::is_obfuscated(&[5, 0, 0, 0]));
        assert!(!ObfuscationEngine::is_obfuscated(&[1, 0, 0, 0]));
    }

    #[test]
    fn detect_type_roundtrip() {
        assert_eq!(
            ObfuscationEngine::detect_type(&[1, 0, 0, 0]),
            Some(WireGuardMessageType::HandshakeInitiation)
        );
        assert_eq!(
            ObfuscationEngine::detect_type(&[4, 0, 0, 0]),
            Some(WireGuardMessageType::Data)
        );
        assert_eq!(ObfuscationEngine::detect_type(&[9, 0, 0, 0]), None);
        assert_eq!(ObfuscationEngine::detect_type(&[1, 0, 0]), None);
    }

    #[test]
    fn crc8_table_matches_bitwise_step() {
        let table = crc8_table();
        for x in 0u8..=255 {
            assert_eq!(table[x as usize], crc8_step_bitwise(0, x));
        }
    }
}
