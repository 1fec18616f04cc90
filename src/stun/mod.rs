/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! RFC 5389 STUN framing: just enough to serialize/parse the message types
//! this crate uses and to wrap/unwrap obfuscated payloads as cover traffic.

mod crc32;
mod masker;
mod message;

pub use masker::StunMasker;
pub use message::{
    Attribute, AttributeType, MessageType, StunPacket, MAGIC_COOKIE, TRANSACTION_ID_LEN,
};
