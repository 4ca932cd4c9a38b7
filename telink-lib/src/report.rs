//! Typed reports decoded from inbound mesh frames, and the callback
//! interface hosts implement to receive them.

use crate::addr::MacAddress;
use crate::alarm::Weekdays;
use crate::color::Color;

/// Device date and time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeReport {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl TimeReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 17 {
            return None;
        }
        Some(Self {
            year: frame[10] as u16 | (frame[11] as u16) << 8,
            month: frame[12],
            day: frame[13],
            hour: frame[14],
            minute: frame[15],
            second: frame[16],
        })
    }
}

/// Mesh id and MAC of a node answering an address query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressReport {
    pub mesh_id: u8,
    pub mac: MacAddress,
}

impl AddressReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 18 {
            return None;
        }
        let mut mac = [0u8; 6];
        mac.copy_from_slice(&frame[12..18]);
        Some(Self {
            mesh_id: frame[10],
            mac: MacAddress::new(mac),
        })
    }
}

/// Discriminates the two device-info report flavours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceInfoKind {
    Info,
    Version,
    Unknown(u8),
}

/// Device info or firmware version. No public documentation exists for the
/// content bytes, so they are surfaced raw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfoReport {
    pub kind: DeviceInfoKind,
    pub content: [u8; 10],
}

impl DeviceInfoReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 20 {
            return None;
        }
        let kind = match frame[19] {
            0 => DeviceInfoKind::Info,
            2 => DeviceInfoKind::Version,
            other => DeviceInfoKind::Unknown(other),
        };
        let mut content = [0u8; 10];
        content.copy_from_slice(&frame[10..20]);
        Some(Self { kind, content })
    }
}

/// Empty slot marker in a group id report.
pub const GROUP_SLOT_EMPTY: u8 = 0xFF;

/// Ten group id slots of the answering node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupsReport {
    pub groups: [u8; 10],
}

impl GroupsReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 20 {
            return None;
        }
        let mut groups = [0u8; 10];
        groups.copy_from_slice(&frame[10..20]);
        Some(Self { groups })
    }

    /// Group ids in occupied slots.
    pub fn active(&self) -> impl Iterator<Item = u8> + '_ {
        self.groups.iter().copied().filter(|&g| g != GROUP_SLOT_EMPTY)
    }
}

/// Unsolicited presence broadcast of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnlineStatusReport {
    pub mesh_id: u8,
    pub brightness: u8,
    pub on: bool,
}

impl OnlineStatusReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 14 {
            return None;
        }
        Some(Self {
            mesh_id: frame[10],
            brightness: frame[12],
            // 0x40 = on, 0x41 = off
            on: frame[13] & 1 == 0,
        })
    }
}

/// Current light color state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    pub brightness: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub w: u8,
}

impl StatusReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 16 {
            return None;
        }
        Some(Self {
            brightness: frame[10],
            r: frame[11],
            g: frame[12],
            b: frame[13],
            w: frame[15],
        })
    }
}

/// One alarm record from an alarm query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlarmReport {
    /// Number of alarms stored on the device.
    pub alarm_count: u8,
    pub alarm_id: u8,
    pub enabled: bool,
    /// Scenario launched by this alarm, when the action byte flags one.
    pub scenario_id: Option<u8>,
    pub weekdays: Weekdays,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl AlarmReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 20 {
            return None;
        }
        // frame[13] is reserved, presumably a per-month mask
        let action = frame[12];
        Some(Self {
            alarm_count: frame[19],
            alarm_id: frame[11],
            enabled: action >> 7 != 0,
            scenario_id: (action & 2 != 0).then_some(frame[18]),
            weekdays: Weekdays::from_bits(frame[14]),
            hour: frame[15],
            minute: frame[16],
            second: frame[17],
        })
    }
}

/// One scenario step from a scenario query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario_id: u8,
    pub step_index: u8,
    pub step_count: u8,
    pub speed: u8,
    pub color: Color,
}

impl ScenarioReport {
    pub fn parse(frame: &[u8]) -> Option<Self> {
        if frame.len() < 19 {
            return None;
        }
        let step_count = frame[12] & 0x0F;
        Some(Self {
            scenario_id: frame[10],
            step_index: frame[12].wrapping_sub(step_count) >> 4,
            step_count,
            speed: frame[11].wrapping_sub(0x10),
            color: Color {
                brightness: frame[13],
                r: frame[14],
                g: frame[15],
                b: frame[16],
                y: frame[17],
                w: frame[18],
            },
        })
    }
}

/// Callbacks a host registers to receive decoded reports.
///
/// All methods default to no-ops; implement the ones of interest. The
/// notification task invokes them sequentially, in delivery order.
pub trait ReportHandler: Send + Sync {
    fn on_time(&self, _report: TimeReport) {}
    fn on_address(&self, _report: AddressReport) {}
    fn on_device_info(&self, _report: DeviceInfoReport) {}
    fn on_groups(&self, _report: GroupsReport) {}
    fn on_online_status(&self, _report: OnlineStatusReport) {}
    fn on_status(&self, _report: StatusReport) {}
    fn on_alarm(&self, _report: AlarmReport) {}
    fn on_scenario(&self, _report: ScenarioReport) {}
    /// Decrypted frame whose command code none of the typed reports claim.
    fn on_unhandled(&self, _command: u8, _frame: &[u8]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(fill: &[(usize, u8)]) -> [u8; 20] {
        let mut frame = [0u8; 20];
        for &(i, v) in fill {
            frame[i] = v;
        }
        frame
    }

    #[test]
    fn time_report_year_is_little_endian() {
        let frame = frame_with(&[(10, 0xE6), (11, 0x07), (12, 8), (13, 2), (14, 13), (15, 37), (16, 59)]);
        let report = TimeReport::parse(&frame).unwrap();
        assert_eq!(report.year, 2022);
        assert_eq!((report.month, report.day), (8, 2));
        assert_eq!((report.hour, report.minute, report.second), (13, 37, 59));
    }

    #[test]
    fn address_report_extracts_mac() {
        let frame = frame_with(&[(10, 0x05), (12, 0xAA), (13, 0xBB), (14, 0xCC), (15, 0xDD), (16, 0xEE), (17, 0xFF)]);
        let report = AddressReport::parse(&frame).unwrap();
        assert_eq!(report.mesh_id, 5);
        assert_eq!(report.mac.bytes(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn device_info_kind_from_discriminator() {
        assert_eq!(
            DeviceInfoReport::parse(&frame_with(&[(19, 0)])).unwrap().kind,
            DeviceInfoKind::Info
        );
        assert_eq!(
            DeviceInfoReport::parse(&frame_with(&[(19, 2)])).unwrap().kind,
            DeviceInfoKind::Version
        );
        assert_eq!(
            DeviceInfoReport::parse(&frame_with(&[(19, 9)])).unwrap().kind,
            DeviceInfoKind::Unknown(9)
        );
    }

    #[test]
    fn groups_report_skips_empty_slots() {
        let mut frame = [0u8; 20];
        frame[10..20].copy_from_slice(&[1, 2, 0xFF, 4, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        let report = GroupsReport::parse(&frame).unwrap();
        assert_eq!(report.active().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn online_status_decodes_power_bit() {
        let on = OnlineStatusReport::parse(&frame_with(&[(10, 3), (12, 80), (13, 0x40)])).unwrap();
        assert!(on.on);
        assert_eq!((on.mesh_id, on.brightness), (3, 80));
        let off = OnlineStatusReport::parse(&frame_with(&[(13, 0x41)])).unwrap();
        assert!(!off.on);
    }

    #[test]
    fn alarm_report_decodes_action_byte() {
        // enabled, scenario-launching alarm
        let frame = frame_with(&[(11, 1), (12, 0x92), (14, 0x7E), (15, 12), (16, 30), (18, 2), (19, 1)]);
        let report = AlarmReport::parse(&frame).unwrap();
        assert!(report.enabled);
        assert_eq!(report.scenario_id, Some(2));
        assert_eq!(report.alarm_count, 1);
        assert!(!report.weekdays.contains_day(0));
        assert!(report.weekdays.contains_day(3));
        assert_eq!((report.hour, report.minute, report.second), (12, 30, 0));

        // disabled on/off alarm carries no scenario
        let frame = frame_with(&[(12, 0x11)]);
        let report = AlarmReport::parse(&frame).unwrap();
        assert!(!report.enabled);
        assert_eq!(report.scenario_id, None);
    }

    #[test]
    fn scenario_report_splits_index_nibble() {
        let frame = frame_with(&[(10, 3), (11, 0x14), (12, 0x12), (13, 100), (14, 0), (15, 0), (16, 255), (17, 0), (18, 0)]);
        let report = ScenarioReport::parse(&frame).unwrap();
        assert_eq!(report.scenario_id, 3);
        assert_eq!(report.step_index, 1);
        assert_eq!(report.step_count, 2);
        assert_eq!(report.speed, 4);
        assert_eq!(report.color.b, 255);
        assert_eq!(report.color.brightness, 100);
    }
}
