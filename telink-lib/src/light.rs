//! Lighting semantics on top of the mesh session.

use std::sync::{Arc, Mutex, RwLock};

use tracing::debug;

use crate::addr::MacAddress;
use crate::alarm::Alarm;
use crate::color::{Scenario, DEFAULT_STEP_SPEED};
use crate::color::scenario_id;
use crate::command::Command;
use crate::error::TelinkError;
use crate::mesh::TelinkMesh;
use crate::report::{OnlineStatusReport, ReportHandler, StatusReport};
use crate::transport::GattTransport;

#[derive(Debug, Default)]
struct LightState {
    on: bool,
    brightness: u8,
    music_mode: bool,
}

type HostHandler = Arc<RwLock<Option<Arc<dyn ReportHandler>>>>;

/// A Telink mesh light.
///
/// Extends [`TelinkMesh`] with power, color, temperature, scenario and alarm
/// control, and keeps a local mirror of the lamp state fed by status
/// reports. Register host callbacks through
/// [`set_report_handler`](Self::set_report_handler) on this type, not on the
/// inner mesh, so the state mirror stays in the loop.
pub struct TelinkLight {
    mesh: TelinkMesh,
    state: Arc<Mutex<LightState>>,
    host: HostHandler,
}

impl std::fmt::Debug for TelinkLight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelinkLight").finish_non_exhaustive()
    }
}

impl TelinkLight {
    pub fn new(
        address: &str,
        name: &str,
        password: &str,
        transport: Box<dyn GattTransport + Send>,
    ) -> Result<Self, TelinkError> {
        let mesh = TelinkMesh::new(address, name, password, transport)?;
        let state = Arc::new(Mutex::new(LightState::default()));
        let host: HostHandler = Arc::new(RwLock::new(None));
        mesh.set_report_handler(Arc::new(StateMirror {
            state: Arc::clone(&state),
            host: Arc::clone(&host),
        }));
        Ok(Self { mesh, state, host })
    }

    /// Registers host callbacks for decoded reports.
    pub fn set_report_handler(&self, handler: Arc<dyn ReportHandler>) {
        *self.host.write().unwrap() = Some(handler);
    }

    /// The underlying mesh session.
    pub fn mesh(&mut self) -> &mut TelinkMesh {
        &mut self.mesh
    }

    pub fn address(&self) -> MacAddress {
        self.mesh.address()
    }

    pub fn mesh_id(&self) -> u16 {
        self.mesh.mesh_id()
    }

    /// Last known power state, as mirrored from status reports.
    pub fn is_on(&self) -> bool {
        self.state.lock().unwrap().on
    }

    /// Brightness in percent, as last set or reported.
    pub fn brightness(&self) -> u8 {
        self.state.lock().unwrap().brightness
    }

    pub fn music_mode(&self) -> bool {
        self.state.lock().unwrap().music_mode
    }

    pub async fn connect(&mut self) -> Result<(), TelinkError> {
        self.mesh.connect().await
    }

    pub async fn disconnect(&mut self) -> Result<(), TelinkError> {
        self.mesh.disconnect().await
    }

    pub async fn is_connected(&self) -> bool {
        self.mesh.is_connected().await
    }

    pub async fn set_time(&mut self) -> Result<(), TelinkError> {
        self.mesh.set_time().await
    }

    pub async fn query_time(&mut self) -> Result<(), TelinkError> {
        self.mesh.query_time().await
    }

    pub async fn query_groups(&mut self) -> Result<(), TelinkError> {
        self.mesh.query_groups().await
    }

    pub async fn add_group(&mut self, group_id: u8) -> Result<(), TelinkError> {
        self.mesh.add_group(group_id).await
    }

    pub async fn delete_group(&mut self, group_id: u8) -> Result<(), TelinkError> {
        self.mesh.delete_group(group_id).await
    }

    pub async fn set_mesh_id(&mut self, mesh_id: u16) -> Result<(), TelinkError> {
        self.mesh.set_mesh_id(mesh_id).await
    }

    pub async fn query_mesh_id(&mut self) -> Result<(), TelinkError> {
        self.mesh.query_mesh_id().await
    }

    pub async fn query_device_info(&mut self) -> Result<(), TelinkError> {
        self.mesh.query_device_info().await
    }

    pub async fn query_device_version(&mut self) -> Result<(), TelinkError> {
        self.mesh.query_device_version().await
    }

    /// Switches the light on or off.
    pub async fn set_state(&mut self, on: bool) -> Result<(), TelinkError> {
        self.state.lock().unwrap().on = on;
        self.mesh
            .send_packet(Command::LightOnOff, &[on as u8, 0, 0])
            .await
    }

    /// Sets the brightness in percent, clamped to 0..=100.
    pub async fn set_brightness(&mut self, brightness: u8) -> Result<(), TelinkError> {
        let brightness = brightness.min(100);
        self.state.lock().unwrap().brightness = brightness;
        self.mesh
            .send_packet(
                Command::LightAttributes,
                &[brightness, 0, 0, 0, 0, 0, 0, 1],
            )
            .await
    }

    /// Sets an RGB color at the current brightness.
    pub async fn set_color(&mut self, r: u8, g: u8, b: u8) -> Result<(), TelinkError> {
        let (brightness, music_mode) = {
            let state = self.state.lock().unwrap();
            (state.brightness, state.music_mode)
        };
        self.mesh
            .send_packet(
                Command::LightAttributes,
                &[brightness, r, g, b, 0, 0, music_mode as u8, 0],
            )
            .await
    }

    /// Sets a white-point temperature in kelvin (clamped to 2700..=6500) at
    /// the current brightness.
    pub async fn set_temperature(&mut self, kelvin: u16) -> Result<(), TelinkError> {
        let (color, music_mode) = {
            let mut state = self.state.lock().unwrap();
            if state.brightness == 0 {
                state.brightness = 3;
            }
            (
                crate::color::Color::from_kelvin(kelvin, state.brightness),
                state.music_mode,
            )
        };
        let mut payload = color.encode();
        payload[6] = music_mode as u8;
        self.mesh.send_packet(Command::LightAttributes, &payload).await
    }

    /// Toggles music mode: the device applies subsequent color and
    /// brightness changes faster but stops acknowledging them with reports.
    pub fn set_music_mode(&mut self, music_mode: bool) {
        self.state.lock().unwrap().music_mode = music_mode;
    }

    /// Registers scenario `scenario_id` on the device.
    pub async fn add_scenario(&mut self, scenario_id: u8) -> Result<(), TelinkError> {
        self.mesh
            .send_packet(Command::ScenarioEdit, &[0x01, scenario_id])
            .await
    }

    /// Removes scenario `scenario_id` from the device.
    pub async fn delete_scenario(&mut self, scenario_id: u8) -> Result<(), TelinkError> {
        self.mesh
            .send_packet(Command::ScenarioEdit, &[0x00, scenario_id])
            .await
    }

    /// Starts playing a scenario at the given animation speed.
    pub async fn load_scenario(&mut self, scenario_id: u8, speed: u8) -> Result<(), TelinkError> {
        let brightness = self.state.lock().unwrap().brightness;
        self.mesh
            .send_packet(Command::ScenarioLoad, &[scenario_id, speed, brightness])
            .await
    }

    /// Asks the device for the steps of a scenario; answered with one
    /// scenario report per step.
    pub async fn query_scenario(&mut self, scenario_id: u8) -> Result<(), TelinkError> {
        self.mesh
            .send_packet(Command::ScenarioQuery, &[0, 0, scenario_id, 0xFF])
            .await
    }

    /// Asks the light for its color state; answered with a status report.
    pub async fn query_status(&mut self) -> Result<(), TelinkError> {
        self.mesh.send_packet(Command::StatusQuery, &[0x10]).await
    }

    /// Asks the device for its alarms; answered with one alarm report per
    /// alarm.
    pub async fn query_alarm(&mut self) -> Result<(), TelinkError> {
        self.mesh.send_packet(Command::AlarmQuery, &[0x10]).await
    }

    /// Creates or overwrites an alarm.
    pub async fn set_alarm(&mut self, alarm: &Alarm) -> Result<(), TelinkError> {
        self.mesh
            .send_packet(Command::AlarmEdit, &alarm.edit_payload())
            .await
    }

    /// Enables or disables an existing alarm.
    pub async fn set_alarm_enabled(
        &mut self,
        alarm_id: u8,
        enabled: bool,
    ) -> Result<(), TelinkError> {
        let op = if enabled { 0x03 } else { 0x04 };
        self.mesh.send_packet(Command::AlarmEdit, &[op, alarm_id]).await
    }

    /// Deletes an alarm.
    pub async fn delete_alarm(&mut self, alarm_id: u8) -> Result<(), TelinkError> {
        self.mesh
            .send_packet(Command::AlarmEdit, &[0x01, alarm_id])
            .await
    }

    /// Uploads a scenario definition, one frame per step.
    ///
    /// The leading load of the default scenario selects the edit target on
    /// the device.
    pub async fn edit_scenario(
        &mut self,
        scenario_id: u8,
        scenario: &Scenario,
    ) -> Result<(), TelinkError> {
        self.load_scenario(scenario_id::DEFAULT, DEFAULT_STEP_SPEED)
            .await?;
        for index in 0..scenario.len() {
            let mut step = scenario.step_bytes(index);
            step[0] = scenario_id;
            // the trailing two bytes of a step are always zero and are
            // supplied by the frame's payload padding
            self.mesh
                .send_packet(Command::ScenarioEdit, &step[..10])
                .await?;
        }
        Ok(())
    }
}

/// Mesh report handler that refreshes the light state mirror before
/// forwarding to the host's callbacks.
struct StateMirror {
    state: Arc<Mutex<LightState>>,
    host: HostHandler,
}

impl StateMirror {
    fn host(&self) -> Option<Arc<dyn ReportHandler>> {
        self.host.read().unwrap().clone()
    }
}

impl ReportHandler for StateMirror {
    fn on_online_status(&self, report: OnlineStatusReport) {
        {
            let mut state = self.state.lock().unwrap();
            state.brightness = report.brightness;
            state.on = report.on;
        }
        debug!(
            "lamp {} is {}, brightness {}",
            report.mesh_id,
            if report.on { "on" } else { "off" },
            report.brightness
        );
        if let Some(host) = self.host() {
            host.on_online_status(report);
        }
    }

    fn on_status(&self, report: StatusReport) {
        self.state.lock().unwrap().brightness = report.brightness;
        if let Some(host) = self.host() {
            host.on_status(report);
        }
    }

    fn on_time(&self, report: crate::report::TimeReport) {
        if let Some(host) = self.host() {
            host.on_time(report);
        }
    }

    fn on_address(&self, report: crate::report::AddressReport) {
        if let Some(host) = self.host() {
            host.on_address(report);
        }
    }

    fn on_device_info(&self, report: crate::report::DeviceInfoReport) {
        if let Some(host) = self.host() {
            host.on_device_info(report);
        }
    }

    fn on_groups(&self, report: crate::report::GroupsReport) {
        if let Some(host) = self.host() {
            host.on_groups(report);
        }
    }

    fn on_alarm(&self, report: crate::report::AlarmReport) {
        if let Some(host) = self.host() {
            host.on_alarm(report);
        }
    }

    fn on_scenario(&self, report: crate::report::ScenarioReport) {
        if let Some(host) = self.host() {
            host.on_scenario(report);
        }
    }

    fn on_unhandled(&self, command: u8, frame: &[u8]) {
        if let Some(host) = self.host() {
            host.on_unhandled(command, frame);
        }
    }
}
