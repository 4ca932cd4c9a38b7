use num_enum::{FromPrimitive, IntoPrimitive};

/// Command codes carried in byte 7 of a Telink frame.
///
/// The same code space covers outbound operations and inbound reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum Command {
    ScenarioQuery = 0xC0,
    ScenarioReport = 0xC1,
    GroupReport = 0xD4,
    GroupEdit = 0xD7,
    StatusQuery = 0xDA,
    StatusReport = 0xDB,
    OnlineStatusReport = 0xDC,
    GroupQuery = 0xDD,
    AddressEdit = 0xE0,
    AddressReport = 0xE1,
    TimeSet = 0xE4,
    AlarmEdit = 0xE5,
    AlarmQuery = 0xE6,
    AlarmReport = 0xE7,
    TimeQuery = 0xE8,
    TimeReport = 0xE9,
    DeviceInfoQuery = 0xEA,
    DeviceInfoReport = 0xEB,
    LightOnOff = 0xF0,
    LightAttributes = 0xF1,
    ScenarioLoad = 0xF2,
    ScenarioEdit = 0xF3,

    #[num_enum(catch_all)]
    Unknown(u8),
}
