/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 * SPDX-License-Identifier: MIT
 *
 * This module provides configuration parsing and management for the wgcloak application.
 * It defines the configuration structures, parsing logic, and utility functions for
 * loading one or more relay definitions from a line-oriented config file.
 */

use crate::relay::MaskingMode;
use std::env;
use std::fs;
use std::io::BufRead;
use std::path::Path;

/// One relay definition, as parsed from a single config line.
#[derive(Clone)]
pub struct RelayConfigEntry {
    /// Identifier used for logging and `--generate-units` output.
    pub name: String,
    /// Local loopback port to bind; `0` for ephemeral.
    pub local_port: u16,
    /// `host:port` of the remote peer.
    pub remote_endpoint: String,
    /// Whether outbound datagrams are also wrapped as STUN.
    pub masking_mode: MaskingMode,
    /// Obfuscation key, taken as the literal UTF-8 bytes of the config field.
    pub key: Vec<u8>,
    /// Cap on random padding for non-handshake packets.
    pub max_dummy_data: usize,
}

/// Loads relay configuration from `/etc/wgcloak/config`, or from the path
/// named by the `WGCLOAK_CONF` environment variable if the default path
/// does not exist.
pub fn load_config() -> std::io::Result<Vec<RelayConfigEntry>> {
    let default_path = "/etc/wgcloak/config";
    let config_path = match Path::new(default_path).exists() {
        true => default_path.to_string(),
        false => env::var("WGCLOAK_CONF").map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Config not found: {} and WGCLOAK_CONF not set.", default_path),
            )
        })?,
    };

    let file = fs::File::open(&config_path)?;
    let reader = std::io::BufReader::new(file);
    let lines = reader
        .lines()
        .map_while(Result::ok)
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect::<Vec<_>>();
    parse_config(&lines)
}

/// Parses config lines of the form
/// `name:local_port:remote_host:remote_port:mode:key[:max_dummy_data]`
/// into [`RelayConfigEntry`] values. `mode` is `plain` or `stun`
/// (case-insensitive). `max_dummy_data` defaults to 4 when absent.
pub fn parse_config(input: &[String]) -> std::io::Result<Vec<RelayConfigEntry>> {
    let mut entries = Vec::with_capacity(input.len());
    let mut seen_names = std::collections::HashSet::with_capacity(input.len());

    for line in input {
        let mut parts: Vec<&str> = line.split(':').collect();

        let max_dummy_data = if parts.len() >= 7 {
            parts.pop().and_then(|s| s.parse::<usize>().ok()).unwrap_or(4)
        } else {
            4
        };

        if parts.len() < 6 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("malformed config line: {line}"),
            ));
        }

        let name = parts[0].to_string();
        if !seen_names.insert(name.clone()) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("duplicate relay name: {name}"),
            ));
        }

        let local_port = parts[1]
            .parse::<u16>()
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::InvalidData))?;
        let remote_endpoint = format!("{}:{}", parts[2], parts[3]);
        let masking_mode = match parts[4].to_lowercase().as_str() {
            "stun" => MaskingMode::Stun,
            _ => MaskingMode::None,
        };
        let key = parts[5].trim().as_bytes().to_vec();
        if key.is_empty() {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "empty key"));
        }

        entries.push(RelayConfigEntry {
            name,
            local_port,
            remote_endpoint,
            masking_mode,
            key,
            max_dummy_data,
        });
    }
    Ok(entries)
}
