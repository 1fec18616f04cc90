/*
 * Copyright (c) 2025 sh0rch <sh0rch@iwl.dev>
 *
 * This file is part of wgcloak.
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */

//! CLI module for wgcloak.
//!
//! This module provides command-line argument parsing and systemd unit file generation
//! for the wgcloak application. It defines the supported CLI commands, parses
//! arguments, and generates systemd unit files for each configured relay.

use crate::config;
use std::fs;

/// Enum representing supported CLI commands for the application.
#[derive(Debug)]
pub enum Command {
    /// Start a single named relay.
    Start(String),
    /// Run every configured relay, one thread each.
    RunAll,
    /// Generate systemd unit files for all configured relays.
    GenerateUnits,
    /// Print version information.
    Version,
}

/// Parses command-line arguments and returns the corresponding [`Command`].
///
/// - `--generate-units`: Generates systemd unit files.
/// - `--version` or `-V`: Prints version information.
/// - `run <name>`: Starts the named relay.
/// - No arguments or unknown arguments: Runs every configured relay.
pub fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().collect();
    if args.len() > 1 {
        match args[1].as_str() {
            "--generate-units" => Command::GenerateUnits,
            "--version" | "-V" => Command::Version,
            "run" if args.len() > 2 => Command::Start(args[2].clone()),
            _ => Command::RunAll,
        }
    } else {
        Command::RunAll
    }
}

/// Generates systemd unit files for each relay configuration and a target
/// unit that wants all of them.
pub fn generate_systemd_units(configs: &[config::RelayConfigEntry]) -> std::io::Result<()> {
    let out_dir = "/tmp/wgcloak";
    fs::create_dir_all(out_dir)?;
    let mut unit_names = Vec::new();
    for relay in configs {
        let unit = format!(
            r#"[Unit]
Description=wgcloak UDP obfuscation relay {name}
After=network.target

[Service]
Type=simple
ExecStart=/usr/bin/wgcloak run {name}
Restart=on-failure

[Install]
WantedBy=multi-user.target
"#,
            name = relay.name
        );
        let filename = format!("{}/wgcloak@{}.service", out_dir, relay.name);
        fs::write(&filename, unit)?;
        println!("Generated {}", filename);
        unit_names.push(format!("wgcloak@{}.service", relay.name));
    }

    let wants = unit_names.join(" ");
    let target = format!(
        r#"[Unit]
Description=wgcloak UDP obfuscation relay (all configured relays)
Requires=multi-user.target
Wants={wants}

[Install]
WantedBy=multi-user.target
"#,
        wants = wants
    );
    let target_filename = format!("{}/wgcloak.target", out_dir);
    fs::write(&target_filename, target)?;
    println!("Generated {}", target_filename);

    println!("\nTo install and activate these units, run:");
    println!("  sudo cp /tmp/wgcloak/wgcloak@*.service /etc/systemd/system/");
    println!("  sudo cp /tmp/wgcloak/wgcloak.target /etc/systemd/system/");
    println!("  sudo systemctl daemon-reload");
    println!("  sudo systemctl enable wgcloak.target");
    println!("  sudo systemctl start wgcloak.target");
    Ok(())
}
