/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! Error types shared by the obfuscation engine, codec, STUN framing and relay.

use thiserror::Error;

/// Unified error type for the packet-transformation pipeline and the relay
/// that drives it.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum RelayError {
    #[error("obfuscation key too short: got {0} bytes, minimum is 1")]
    KeyTooShort(usize),

    #[error("obfuscation key too long: got {0} bytes, maximum is 255")]
    KeyTooLong(usize),

    #[error("buffer too short: expected at least {expected} bytes, got {got}")]
    PacketTooShort { expected: usize, got: usize },

    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("decoded buffer is not a valid WireGuard packet")]
    InvalidWireGuardPacket,

    #[error("STUN magic cookie mismatch")]
    InvalidMagicCookie,

    #[error("STUN transaction id must be exactly 12 bytes, got {0}")]
    InvalidTransactionId(usize),

    #[error("unrecognized STUN message type 0x{0:04x}")]
    UnknownMessageType(u16),

    #[error("malformed STUN attribute")]
    MalformedAttribute,

    #[error("failed to bind local port: {0}")]
    FailedToBindPort(String),
}

pub type Result<T> = std::result::Result<T, RelayError>;
