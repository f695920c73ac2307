// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use log::{error, info, warn};

use asciibus::{LogLevel, Master, SerialTransport, Settings, settings, transport};

#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Settings file
    #[arg(long, default_value = settings::DEFAULT_FILE)]
    settings: PathBuf,

    /// Serial port, overrides the one from the settings file
    #[arg(long)]
    port: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the serial ports of this machine
    Ports,
    /// Store the serial port in the settings file
    SetPort { name: String },
    /// Store the log level in the settings file
    SetLogLevel { level: LogLevel },
    /// Read a single register
    GetRegister {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        address: i32,
    },
    /// Write a single register
    SetRegister {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        address: i32,
        #[arg(long, allow_negative_numbers = true)]
        value: i32,
    },
    /// Restart a slave
    HardReset {
        #[arg(long)]
        id: i32,
    },
    /// Broadcast the taken addresses (32 characters, address 32 first)
    ResetSlaves { ids: String },
    /// Read the serial number of a slave
    SerialNumber {
        #[arg(long)]
        id: i32,
    },
    /// Read bytes from the memory window of a slave
    ReadMemory {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        address: i32,
        #[arg(long)]
        size: i32,
    },
    /// Write hex encoded bytes into the memory window of a slave
    WriteMemory {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        address: i32,
        #[arg(long)]
        data: String,
    },
    /// Read the data block of an option
    OptionInfo {
        #[arg(long)]
        id: i32,
        #[arg(long)]
        index: i32,
    },
    /// Find all slaves on the bus
    DetectSlaves,
}

fn main() -> Result<(), asciibus::Error> {
    let cli = Cli::parse();

    let loaded = Settings::load(&cli.settings);
    let mut settings = loaded.as_ref().cloned().unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(settings.log_level.level_filter())
        .parse_default_env()
        .init();
    if let Err(err) = &loaded {
        error!("Failed to load settings from {}: {err}", cli.settings.display());
    }
    match transport::available_ports() {
        Ok(ports) => info!("Available serial ports: {ports:?}"),
        Err(err) => warn!("Failed to list serial ports: {err}"),
    }

    let Cli {
        settings: path,
        port,
        command,
    } = cli;

    let master = |settings: &Settings| {
        let port = port.as_deref().unwrap_or(&settings.serial_port_name);
        Master::new(SerialTransport::open(port))
    };

    let res = match command {
        Command::Ports => {
            println!("{}", serde_json::to_string(&transport::available_ports()?)?);
            return Ok(());
        }
        Command::SetPort { name } => {
            settings.serial_port_name = name;
            return save(&settings, &path);
        }
        Command::SetLogLevel { level } => {
            settings.set_log_level(level);
            return save(&settings, &path);
        }
        Command::GetRegister { id, address } => master(&settings).get_register(id, address),
        Command::SetRegister { id, address, value } => {
            master(&settings).set_register(id, address, value)
        }
        Command::HardReset { id } => master(&settings).hard_reset(id),
        Command::ResetSlaves { ids } => master(&settings).reset_slaves(&ids),
        Command::SerialNumber { id } => master(&settings).serial_number(id),
        Command::ReadMemory { id, address, size } => {
            master(&settings).read_memory(id, address, size)
        }
        Command::WriteMemory { id, address, data } => {
            master(&settings).write_memory(id, address, &data)
        }
        Command::OptionInfo { id, index } => master(&settings).option_info(id, index),
        Command::DetectSlaves => master(&settings).detect_slaves(),
    };
    println!("{}", serde_json::to_string(&res)?);
    Ok(())
}

fn save(settings: &Settings, path: &Path) -> Result<(), asciibus::Error> {
    settings.save(path).inspect_err(|err| {
        error!("Failed to save settings to {}: {err}", path.display());
    })?;
    println!("{}", serde_json::to_string(settings)?);
    Ok(())
}
