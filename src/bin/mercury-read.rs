// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read all values of a meter and print them.

use std::{error::Error, num::NonZeroU16, process::ExitCode, time::Duration};

use clap::Parser;
use mercury_core::{
    AUXILIARY, AccessLevel, Address, BROADCAST, Client, ClientConfig, Command, EnergyArray,
    Measurement, POWER_FACTOR, Password, Session, Tariff,
    transport::{
        Transport,
        serial::{Parity, SerialConfig, SerialTransport},
    },
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Read the values of a Mercury electricity meter", long_about = None)]
struct Cli {
    /// Serial port the RS-485 adapter is attached to
    #[arg(long, default_value = "/dev/ttyUSB0")]
    port: String,

    #[arg(long, default_value_t = 9600)]
    baud_rate: u32,

    /// N, E or O
    #[arg(long, default_value = "N")]
    parity: Parity,

    #[arg(long, default_value_t = 8)]
    data_bits: u8,

    #[arg(long, default_value_t = 1)]
    stop_bits: u8,

    /// Response timeout in milliseconds
    #[arg(long, default_value_t = 1000)]
    timeout: u64,

    /// Network address of the meter, discovered by broadcast if omitted
    #[arg(long)]
    address: Option<Address>,

    /// Access level: 1 (user) or 2 (admin)
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=2))]
    level: u8,

    /// Six digit password, the factory password of the level if omitted
    #[arg(long)]
    password: Option<Password>,

    /// Attempts per request
    #[arg(long, default_value_t = 3)]
    attempts: u8,

    /// Instrument transformer ratio (1-65535)
    #[arg(long, default_value = "1")]
    ratio: NonZeroU16,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let timeout = Duration::from_millis(cli.timeout);
    let transport = SerialTransport::open(&SerialConfig {
        path: cli.port.clone(),
        baud_rate: cli.baud_rate,
        parity: cli.parity,
        data_bits: cli.data_bits,
        stop_bits: cli.stop_bits,
        timeout,
    })?;
    let mut client = Client::with_config(
        transport,
        ClientConfig {
            attempts: cli.attempts,
            timeout,
            transformer_ratio: cli.ratio,
            ..Default::default()
        },
    );

    let address = match cli.address {
        Some(address) => address,
        None => discover(&mut client)?,
    };
    let level = if cli.level == 2 {
        AccessLevel::Admin
    } else {
        AccessLevel::User
    };
    let password = cli.password.unwrap_or(level.default_password());
    let mut session = Session::with_credentials(address, level, password);
    session.open(&mut client)?;

    let mut commands = vec![Command::ReadTime];
    commands.extend(Tariff::ALL.iter().map(|&tariff| Command::ReadEnergy {
        array: EnergyArray::FromReset,
        tariff,
    }));
    commands.extend(
        AUXILIARY
            .iter()
            .chain(&POWER_FACTOR)
            .map(|rule| Command::Read(rule.quantity, rule.phase)),
    );
    for cmd in commands {
        match session.read(&mut client, cmd) {
            Ok(measurement) => print_measurement(&measurement),
            Err(err) => log::warn!("{cmd:?}: {err}"),
        }
    }

    session.close(&mut client)?;
    Ok(())
}

/// Ask all meters for their address. Only one meter may be on the bus.
fn discover<T: Transport>(client: &mut Client<T>) -> Result<Address, Box<dyn Error>> {
    let broadcast = Session::new(BROADCAST);
    match client.execute(&broadcast, Command::ReadNetworkAddress)? {
        Measurement::NetworkAddress(address) => {
            log::info!("Found meter {address}");
            Ok(address)
        }
        other => Err(format!("Unexpected response to address request: {other:?}").into()),
    }
}

fn print_measurement(measurement: &Measurement) {
    match measurement {
        Measurement::Timestamp(time) => {
            let season = if time.winter { "winter" } else { "summer" };
            println!("Time: {} ({season} time)", time.datetime);
        }
        Measurement::Energy(totals) => {
            let registers = [
                ("A+", "kWh", totals.active_import),
                ("A-", "kWh", totals.active_export),
                ("R+", "kvarh", totals.reactive_import),
                ("R-", "kvarh", totals.reactive_export),
            ];
            for (name, unit, value) in registers {
                if let Some(value) = value {
                    println!("Energy {:?} {name}: {value} {unit}", totals.tariff);
                }
            }
        }
        Measurement::Instantaneous(reading) => {
            println!(
                "{:?} {:?}: {} {}",
                reading.quantity,
                reading.phase,
                reading.value,
                reading.quantity.unit()
            );
        }
        Measurement::NetworkAddress(address) => println!("Address: {address}"),
        Measurement::Ack => {}
    }
}
