/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! # UDP relay
//!
//! Pumps datagrams between a local loopback listener and a remote UDP
//! endpoint, applying the obfuscation codec and, optionally, STUN masking
//! in each direction. The codec and masker are pure; the relay is the only
//! stateful piece, and it carries only socket handles and the most
//! recently seen local peer address.
//!
//! Each socket's receive loop runs on its own thread and is individually
//! supervised: catch panics, log, back off briefly, restart. A single
//! malformed datagram must degrade a loop, never end the process.

use crate::codec::PacketCodec;
use crate::engine::ObfuscationEngine;
use crate::error::{RelayError, Result};
use crate::stun::StunMasker;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::panic;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Whether outgoing traffic is also wrapped as a synthetic STUN message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskingMode {
    None,
    Stun,
}

/// Interval at which a STUN-masked relay emits a keepalive `Binding
/// Request` if no other outbound traffic has flowed.
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
/// Poll granularity for cooperative socket-loop cancellation. Sockets have
/// no native cancel; a short read timeout lets `stop()` be observed
/// promptly without spinning.
const POLL_TIMEOUT: Duration = Duration::from_millis(200);

/// Construction parameters for a [`Relay`].
pub struct RelayConfig {
    /// Local loopback port to bind; `0` picks an ephemeral port.
    pub local_port: u16,
    /// Remote peer, resolved once at [`Relay::start`].
    pub remote_endpoint: String,
    /// Obfuscation key shared with the peer relay.
    pub key: Vec<u8>,
    /// Cap on random padding for non-handshake packets.
    pub max_dummy_data: usize,
    /// Whether outbound datagrams are additionally wrapped as STUN.
    pub masking_mode: MaskingMode,
}

struct Sockets {
    local: UdpSocket,
    remote: UdpSocket,
}

/// A long-lived bidirectional relay between one local loopback client and
/// one remote peer. Value-like from the outside: construct once, `start`,
/// run, `stop`.
pub struct Relay {
    remote_endpoint: String,
    codec: Arc<PacketCodec>,
    masker: Option<Arc<StunMasker>>,
    sockets: Mutex<Option<Arc<Sockets>>>,
    local_peer: Arc<Mutex<Option<SocketAddr>>>,
    listening_port: Arc<Mutex<Option<u16>>>,
    running: Arc<AtomicBool>,
    last_outbound: Arc<Mutex<Instant>>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Relay {
    /// Builds a relay from `config`. Fails only if the key is out of
    /// range; socket binding happens in [`start`](Self::start).
    pub fn new(config: RelayConfig) -> Result<Self> {
        let codec = PacketCodec::new(config.key, config.max_dummy_data)?;
        let masker = match config.masking_mode {
            MaskingMode::None => None,
            MaskingMode::Stun => Some(Arc::new(StunMasker::new())),
        };
        Ok(Self {
            remote_endpoint: config.remote_endpoint,
            codec: Arc::new(codec),
            masker,
            sockets: Mutex::new(None),
            local_peer: Arc::new(Mutex::new(None)),
            listening_port: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            last_outbound: Arc::new(Mutex::new(Instant::now() - KEEPALIVE_INTERVAL)),
            threads: Mutex::new(Vec::new()),
        })
    }

    /// Binds the local loopback listener (port `local_port`, `0` for
    /// ephemeral) and a socket connected to the resolved remote endpoint,
    /// then spawns the supervised receive loops. Returns the bound local
    /// port.
    pub fn start(&self, local_port: u16) -> Result<u16> {
        let local = UdpSocket::bind(("127.0.0.1", local_port))
            .map_err(|e| RelayError::FailedToBindPort(e.to_string()))?;
        local
            .set_read_timeout(Some(POLL_TIMEOUT))
            .map_err(|e| RelayError::FailedToBindPort(e.to_string()))?;

        let remote_addr = self
            .remote_endpoint
            .to_socket_addrs()
            .map_err(|e| RelayError::FailedToBindPort(e.to_string()))?
            .next()
            .ok_or_else(|| {
                RelayError::FailedToBindPort(format!(
                    "could not resolve remote endpoint {}",
                    self.remote_endpoint
                ))
            })?;

        let remote = UdpSocket::bind(("0.0.0.0", 0))
            .map_err(|e| RelayError::FailedToBindPort(e.to_string()))?;
        remote.connect(remote_addr).map_err(|e| RelayError::FailedToBindPort(e.to_string()))?;
        remote
            .set_read_timeout(Some(POLL_TIMEOUT))
            .map_err(|e| RelayError::FailedToBindPort(e.to_string()))?;

        let bound_port =
            local.local_addr().map_err(|e| RelayError::FailedToBindPort(e.to_string()))?.port();

        let sockets = Arc::new(Sockets { local, remote });
        *self.sockets.lock().unwrap() = Some(sockets.clone());
        *self.listening_port.lock().unwrap() = Some(bound_port);
        self.running.store(true, Ordering::SeqCst);

        let mut threads = self.threads.lock().unwrap();
        threads.push(spawn_outbound_loop(
            sockets.clone(),
            self.codec.clone(),
            self.masker.clone(),
            self.local_peer.clone(),
            self.last_outbound.clone(),
            self.running.clone(),
        ));
        threads.push(spawn_inbound_loop(
            sockets.clone(),
            self.codec.clone(),
            self.masker.clone(),
            self.local_peer.clone(),
            self.running.clone(),
        ));
        if self.masker.is_some() {
            threads.push(spawn_keepalive_loop(
                sockets,
                self.masker.clone().unwrap(),
                self.last_outbound.clone(),
                self.running.clone(),
            ));
        }

        Ok(bound_port)
    }

    /// Signals every receive loop to stop and waits for them to exit. Idle
    /// loops observe this within one [`POLL_TIMEOUT`].
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.lock().unwrap().drain(..) {
            let _ = handle.join();
        }
        *self.sockets.lock().unwrap() = None;
        *self.listening_port.lock().unwrap() = None;
    }

    /// The local port this relay is bound to, if running.
    pub fn listening_port(&self) -> Option<u16> {
        *self.listening_port.lock().unwrap()
    }
}

fn spawn_outbound_loop(
    sockets: Arc<Sockets>,
    codec: Arc<PacketCodec>,
    masker: Option<Arc<StunMasker>>,
    local_peer: Arc<Mutex<Option<SocketAddr>>>,
    last_outbound: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; crate::codec::MAX_TOTAL + 64];
        while running.load(Ordering::SeqCst) {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                while running.load(Ordering::SeqCst) {
                    let (n, src) = match sockets.local.recv_from(&mut buf) {
                        Ok(pair) => pair,
                        Err(e) if would_block(&e) => continue,
                        Err(e) => {
                            log_debug(&format!("outbound recv error: {e}"));
                            continue;
                        }
                    };
                    *local_peer.lock().unwrap() = Some(src);
                    process_outbound(&sockets, &codec, masker.as_deref(), &buf[..n], &last_outbound);
                }
            }));
            if let Err(e) = result {
                log_debug(&format!("outbound loop panicked: {}", panic_message(&e)));
                thread::sleep(Duration::from_secs(1));
            }
        }
    })
}

fn process_outbound(
    sockets: &Sockets,
    codec: &PacketCodec,
    masker: Option<&StunMasker>,
    datagram: &[u8],
    last_outbound: &Mutex<Instant>,
) {
    if datagram.is_empty() {
        return;
    }
    let type_ = match ObfuscationEngine::detect_type(datagram) {
        Some(t) => t,
        None => return,
    };
    let obfuscated = match codec.encode(datagram, type_) {
        Ok(b) => b,
        Err(e) => {
            log_debug(&format!("encode failed, dropping datagram: {e}"));
            return;
        }
    };
    let out = match masker {
        Some(m) => match m.wrap(&obfuscated) {
            Ok(b) => b,
            Err(e) => {
                log_debug(&format!("stun wrap failed, dropping datagram: {e}"));
                return;
            }
        },
        None => obfuscated,
    };
    if sockets.remote.send(&out).is_ok() {
        *last_outbound.lock().unwrap() = Instant::now();
    }
}

fn spawn_inbound_loop(
    sockets: Arc<Sockets>,
    codec: Arc<PacketCodec>,
    masker: Option<Arc<StunMasker>>,
    local_peer: Arc<Mutex<Option<SocketAddr>>>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buf = vec![0u8; crate::codec::MAX_TOTAL + 256];
        while running.load(Ordering::SeqCst) {
            let result = panic::catch_unwind(panic::AssertUnwindSafe(|| {
                while running.load(Ordering::SeqCst) {
                    let n = match sockets.remote.recv(&mut buf) {
                        Ok(n) => n,
                        Err(e) if would_block(&e) => continue,
                        Err(e) => {
                            log_debug(&format!("inbound recv error: {e}"));
                            continue;
                        }
                    };
                    process_inbound(&sockets, &codec, masker.as_deref(), &buf[..n], &local_peer);
                }
            }));
            if let Err(e) = result {
                log_debug(&format!("inbound loop panicked: {}", panic_message(&e)));
                thread::sleep(Duration::from_secs(1));
            }
        }
    })
}

fn process_inbound(
    sockets: &Sockets,
    codec: &PacketCodec,
    masker: Option<&StunMasker>,
    datagram: &[u8],
    local_peer: &Mutex<Option<SocketAddr>>,
) {
    let unwrapped = match masker {
        Some(m) => match m.unwrap(datagram) {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                log_debug(&format!("stun unwrap failed, dropping datagram: {e}"));
                return;
            }
        },
        None => datagram.to_vec(),
    };

    let plain = match codec.decode(&unwrapped) {
        Ok(p) => p,
        Err(e) => {
            log_debug(&format!("decode failed, dropping datagram: {e}"));
            return;
        }
    };

    if let Some(peer) = *local_peer.lock().unwrap() {
        let _ = sockets.local.send_to(&plain, peer);
    }
}

fn spawn_keepalive_loop(
    sockets: Arc<Sockets>,
    masker: Arc<StunMasker>,
    last_outbound: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while running.load(Ordering::SeqCst) {
            thread::sleep(POLL_TIMEOUT);
            let idle_for = last_outbound.lock().unwrap().elapsed();
            if idle_for >= KEEPALIVE_INTERVAL {
                let keepalive = masker.generate_keepalive();
                if sockets.remote.send(&keepalive).is_ok() {
                    *last_outbound.lock().unwrap() = Instant::now();
                }
            }
        }
    })
}

fn would_block(e: &std::io::Error) -> bool {
    matches!(e.kind(), std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut)
}

fn panic_message(payload: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(debug_assertions)]
fn log_debug(msg: &str) {
    eprintln!("[wgcloak] {msg}");
}

#[cfg(not(debug_assertions))]
fn log_debug(_msg: &str) {}
