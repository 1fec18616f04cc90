/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Licensed under the MIT License. See LICENSE file in the project root for full license information.
 */

//! Main entry point for the wgcloak application.
//!
//! This module handles command-line argument parsing, configuration loading,
//! and dispatches execution to the appropriate submodules based on user input.

use std::thread;
use wgcloak::cli;
use wgcloak::config;
use wgcloak::relay::{Relay, RelayConfig};

fn run_relay(entry: &config::RelayConfigEntry) -> std::io::Result<()> {
    let relay = Relay::new(RelayConfig {
        local_port: entry.local_port,
        remote_endpoint: entry.remote_endpoint.clone(),
        key: entry.key.clone(),
        max_dummy_data: entry.max_dummy_data,
        masking_mode: entry.masking_mode,
    })
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    let port = relay
        .start(entry.local_port)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    #[cfg(debug_assertions)]
    println!("relay '{}' listening on 127.0.0.1:{port} -> {}", entry.name, entry.remote_endpoint);

    // Park this thread; the relay's own threads do the work. A real
    // deployment would wire this to a shutdown signal (SIGTERM/ctrl-c).
    loop {
        thread::park();
    }
}

fn main() -> std::io::Result<()> {
    let configs = match config::load_config() {
        Ok(configs) => {
            if configs.is_empty() {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    "No valid relay configurations found in the config file",
                ));
            }
            configs
        }
        Err(_) => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "Configuration file not found or invalid",
            ));
        }
    };

    match cli::parse_args() {
        cli::Command::GenerateUnits => {
            if cli::generate_systemd_units(&configs).is_err() {
                return Err(std::io::Error::other("Failed to generate systemd units"));
            }
        }
        cli::Command::Start(name) => {
            let entry = configs
                .iter()
                .find(|c| c.name == name)
                .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "unknown relay"))?;
            run_relay(entry)?;
        }
        cli::Command::Version => {
            println!("wgcloak version {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        cli::Command::RunAll => {
            let mut handles = Vec::new();
            for entry in configs {
                handles.push(thread::spawn(move || {
                    run_relay(&entry).unwrap();
                }));
            }
            for handle in handles {
                handle.join().unwrap();
            }
        }
    }
    Ok(())
}
