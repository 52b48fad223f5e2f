//! Discover all PixelAir devices on the network and print them.
//!
//! This example demonstrates:
//! - Acquiring the shared client (which runs an initial discovery pass)
//! - Listing the registry with availability and last known state
//!
//! Run with: cargo run --example scan

use std::time::Duration;

use pixelair_rs::{ClientConfig, PixelAirClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for PixelAir devices...");

    let client = PixelAirClient::new(ClientConfig::default());
    client.acquire().await?;

    // Give the initial discovery window time to close
    tokio::time::sleep(Duration::from_secs(11)).await;

    let devices = client.devices();
    if devices.is_empty() {
        println!("No devices found on the network.");
    } else {
        println!("Found {} device(s):", devices.len());
        for device in devices {
            println!(
                "  - {} ({}) model={} nickname={} {:?}",
                device.address(),
                device.mac_address().unwrap_or("unknown mac"),
                device.model().unwrap_or("?"),
                device.nickname().unwrap_or("-"),
                device.availability(),
            );
        }
    }

    client.release().await;
    Ok(())
}
