//! Connects to a light and prints every report it broadcasts.
//!
//! Usage: cargo run --example watch_reports -- <MAC> <name> <password>

use std::sync::Arc;
use std::time::Duration;

use telink_lib::report::{OnlineStatusReport, ReportHandler, StatusReport};
use telink_lib::{BtleplugTransport, TelinkLight};

struct Watcher;

impl ReportHandler for Watcher {
    fn on_online_status(&self, report: OnlineStatusReport) {
        println!(
            "lamp {} is {} at {}%",
            report.mesh_id,
            if report.on { "on" } else { "off" },
            report.brightness
        );
    }

    fn on_status(&self, report: StatusReport) {
        println!("color R={} G={} B={} W={}", report.r, report.g, report.b, report.w);
    }

    fn on_unhandled(&self, command: u8, frame: &[u8]) {
        println!("unhandled report {command:#04x}: {frame:02x?}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let (Some(mac), Some(name), Some(password)) = (args.next(), args.next(), args.next()) else {
        anyhow::bail!("usage: watch_reports <MAC> <name> <password>");
    };

    let transport = BtleplugTransport::new().await?;
    let mut light = TelinkLight::new(&mac, &name, &password, Box::new(transport))?;
    light.set_report_handler(Arc::new(Watcher));
    light.connect().await?;
    light.query_status().await?;

    loop {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}
