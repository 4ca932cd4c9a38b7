use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use telink_lib::report::{
    AlarmReport, DeviceInfoReport, GroupsReport, OnlineStatusReport, ReportHandler,
    ScenarioReport, StatusReport, TimeReport,
};
use telink_lib::{BtleplugTransport, TelinkLight};

/// Control a Telink BLE mesh light.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Device MAC address (AA:BB:CC:DD:EE:FF)
    mac: String,
    /// Mesh name the device was provisioned with
    name: String,
    /// Mesh password
    password: String,
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Switch the light on
    On,
    /// Switch the light off
    Off,
    /// Set the brightness in percent (0-100)
    Brightness { value: u8 },
    /// Set an RGB color
    Color { r: u8, g: u8, b: u8 },
    /// Set a white temperature in kelvin (2700-6500)
    Temperature { kelvin: u16 },
    /// Start a built-in or custom scenario
    Scenario {
        id: u8,
        #[arg(default_value_t = 7)]
        speed: u8,
    },
    /// Query the lamp state and print incoming reports for a while
    Status,
    /// Query the alarms stored on the device
    Alarms,
    /// Query the group memberships of the device
    Groups,
    /// Set the device clock to the local time
    SyncTime,
    /// Query the device clock
    Time,
    /// Query device information and firmware version
    Info,
}

/// Prints every report the device sends back.
struct PrintReports;

impl ReportHandler for PrintReports {
    fn on_time(&self, report: TimeReport) {
        println!(
            "device time: {:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            report.year, report.month, report.day, report.hour, report.minute, report.second
        );
    }

    fn on_online_status(&self, report: OnlineStatusReport) {
        println!(
            "lamp {}: {} at {}%",
            report.mesh_id,
            if report.on { "on" } else { "off" },
            report.brightness
        );
    }

    fn on_status(&self, report: StatusReport) {
        println!(
            "color: R={} G={} B={} W={} at {}%",
            report.r, report.g, report.b, report.w, report.brightness
        );
    }

    fn on_groups(&self, report: GroupsReport) {
        let groups: Vec<u8> = report.active().collect();
        println!("groups: {groups:?}");
    }

    fn on_alarm(&self, report: AlarmReport) {
        let action = match report.scenario_id {
            Some(id) => format!("scenario {id:#04x}"),
            None => "switch".to_string(),
        };
        println!(
            "alarm {} ({}): {:02}:{:02}:{:02} weekdays {:#09b} -> {}  [{} total]",
            report.alarm_id,
            if report.enabled { "enabled" } else { "disabled" },
            report.hour,
            report.minute,
            report.second,
            report.weekdays.bits(),
            action,
            report.alarm_count
        );
    }

    fn on_scenario(&self, report: ScenarioReport) {
        println!(
            "scenario {} step {}/{}: {:?} speed {}",
            report.scenario_id,
            report.step_index + 1,
            report.step_count,
            report.color,
            report.speed
        );
    }

    fn on_device_info(&self, report: DeviceInfoReport) {
        println!("device info ({:?}): {:02x?}", report.kind, report.content);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let transport = BtleplugTransport::new().await?;
    let mut light = TelinkLight::new(&cli.mac, &cli.name, &cli.password, Box::new(transport))?;
    light.set_report_handler(Arc::new(PrintReports));
    light.connect().await?;
    println!("connected to {}", cli.mac);

    // queries answer asynchronously over notifications
    let mut wait_for_reports = true;
    match cli.action {
        Action::On => {
            light.set_state(true).await?;
            wait_for_reports = false;
        }
        Action::Off => {
            light.set_state(false).await?;
            wait_for_reports = false;
        }
        Action::Brightness { value } => {
            light.set_brightness(value).await?;
            wait_for_reports = false;
        }
        Action::Color { r, g, b } => {
            light.set_color(r, g, b).await?;
            wait_for_reports = false;
        }
        Action::Temperature { kelvin } => {
            light.set_temperature(kelvin).await?;
            wait_for_reports = false;
        }
        Action::Scenario { id, speed } => {
            light.load_scenario(id, speed).await?;
            wait_for_reports = false;
        }
        Action::Status => light.query_status().await?,
        Action::Alarms => light.query_alarm().await?,
        Action::Groups => light.query_groups().await?,
        Action::SyncTime => {
            light.set_time().await?;
            wait_for_reports = false;
        }
        Action::Time => light.query_time().await?,
        Action::Info => {
            light.query_device_info().await?;
            light.query_device_version().await?;
        }
    }

    if wait_for_reports {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    light.disconnect().await?;
    Ok(())
}
