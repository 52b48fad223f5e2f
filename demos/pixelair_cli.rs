//! CLI application for controlling PixelAir lights.
//!
//! This example demonstrates a command-line interface over the shared
//! client: discovery, state watching, and control commands.
//!
//! Run with: cargo run --example pixelair_cli -- --help

use std::net::Ipv4Addr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pixelair_rs::{
    Brightness, ClientConfig, Command, Effect, HueSaturation, PixelAirClient, Power,
};

#[derive(Parser)]
#[command(name = "pixelair-cli")]
#[command(about = "Control PixelAir smart lights from the command line", long_about = None)]
struct Cli {
    /// IP address of the device (not required for scan/watch commands)
    #[arg(short, long, global = true)]
    ip: Option<Ipv4Addr>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover all PixelAir devices on the network
    Scan {
        /// Discovery window in seconds (default: 10)
        #[arg(short, long, default_value = "10")]
        timeout: u64,
    },

    /// Watch state and availability changes as they arrive
    Watch {
        /// How long to watch, in seconds
        #[arg(short, long, default_value = "60")]
        duration: u64,
    },

    /// Turn the device on
    On,

    /// Turn the device off
    Off,

    /// Set brightness (0-255)
    Brightness {
        level: u8,
    },

    /// Set hue (0-360) and saturation (0-100)
    Color {
        #[arg(value_parser = clap::value_parser!(u16).range(0..=360))]
        hue: u16,
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        saturation: u8,
    },

    /// Set an effect by id (e.g. "auto", "scene:3", "manual:1")
    Effect {
        id: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.command {
        Commands::Scan { timeout } => {
            ClientConfig::default().with_discovery_window(Duration::from_secs(*timeout))
        }
        _ => ClientConfig::default(),
    };

    let client = PixelAirClient::new(config);
    client.acquire().await?;

    let result = run(&cli, &client).await;
    client.release().await;
    result
}

async fn run(cli: &Cli, client: &PixelAirClient) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Scan { .. } => {
            println!("Scanning...");
            let new_devices = client.rescan().await?;
            println!("{} new device(s) this pass", new_devices.len());
            for device in client.devices() {
                println!(
                    "  {} model={} nickname={} {:?}",
                    device.address(),
                    device.model().unwrap_or("?"),
                    device.nickname().unwrap_or("-"),
                    device.availability(),
                );
            }
        }

        Commands::Watch { duration } => {
            let _subscription = client.subscribe(|event| {
                println!("{} -> {:?}", event.address, event.kind);
            });
            println!("Watching for {} seconds...", duration);
            tokio::time::sleep(Duration::from_secs(*duration)).await;
        }

        command => {
            let ip = cli.ip.ok_or("--ip is required for device commands")?;
            let command = match command {
                Commands::On => Command::SetPower(Power::On),
                Commands::Off => Command::SetPower(Power::Off),
                Commands::Brightness { level } => {
                    Command::SetBrightness(Brightness::new(*level))
                }
                Commands::Color { hue, saturation } => Command::SetColor(
                    HueSaturation::create(*hue, *saturation).ok_or("invalid color")?,
                ),
                Commands::Effect { id } => {
                    Command::SetEffect(Effect::parse(id).ok_or("unknown effect id")?)
                }
                Commands::Scan { .. } | Commands::Watch { .. } => unreachable!(),
            };

            // Give discovery a moment to find the device if it is unknown
            if client.device(ip).is_none() {
                tokio::time::sleep(Duration::from_secs(2)).await;
            }

            match client.command(ip, command).await {
                Ok(()) => println!("✓ {} acknowledged", ip),
                Err(e) => eprintln!("✗ {}: {}", ip, e),
            }
        }
    }
    Ok(())
}
