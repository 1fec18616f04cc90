/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! # wgcloak
//!
//! A bidirectional UDP relay that sits on loopback between a WireGuard
//! client and a remote peer, obfuscating every datagram with a
//! length-aware keyed stream cipher and, optionally, masking the result as
//! a synthetic STUN message so the flow reads as NAT-traversal traffic to
//! an on-path observer.
//!
//! The library surface is three pure transformers plus the relay that
//! drives them:
//! - [`ObfuscationEngine`] — the keystream primitive.
//! - [`PacketCodec`] — wraps/unwraps a WireGuard datagram around the engine.
//! - [`STUNPacket`]/[`StunMasker`] — RFC 5389 framing and cover-traffic helpers.
//! - [`Relay`] — the stateful socket pump that ties it all together.
//!
//! This crate does not provide cryptographic confidentiality; it is an
//! obfuscator against passive deep packet inspection, not a cipher against
//! a cryptanalyst.

pub mod cli;
pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod relay;
pub mod stun;

pub use codec::PacketCodec;
pub use engine::{ObfuscationEngine, WireGuardMessageType};
pub use error::{RelayError, Result};
pub use relay::{MaskingMode, Relay, RelayConfig};
pub use stun::{StunMasker, StunPacket as STUNPacket};
