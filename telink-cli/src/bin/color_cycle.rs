//! Cycles a light through random colors, the quickest way to check that a
//! device pairs and accepts commands.
//!
//! Usage: color_cycle <MAC> <name> <password>

use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use rand::Rng;
use telink_lib::{BtleplugTransport, TelinkLight};

#[derive(Parser, Debug)]
#[command(about = "Random color cycling demo")]
struct Cli {
    mac: String,
    name: String,
    password: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let transport = BtleplugTransport::new().await?;
    let mut light = TelinkLight::new(&cli.mac, &cli.name, &cli.password, Box::new(transport))?;
    light.connect().await?;

    light.set_time().await?;
    light.query_time().await?;
    light.set_state(true).await?;
    light.set_temperature(4600).await?;
    light.set_brightness(100).await?;
    // music mode trades acknowledgements for lower latency
    light.set_music_mode(true);

    let mut rng = rand::thread_rng();
    loop {
        light
            .set_color(rng.gen::<u8>(), rng.gen::<u8>(), rng.gen::<u8>())
            .await?;
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
