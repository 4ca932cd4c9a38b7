pub mod addr;
pub mod alarm;
#[cfg(feature = "btleplug")]
pub mod ble;
pub mod color;
pub mod command;
pub mod crypto;
pub mod error;
pub mod frame;
pub mod light;
pub mod mesh;
pub mod report;
pub mod transport;

// Re-export the session types and the value types they take
pub use addr::MacAddress;
pub use alarm::{Alarm, AlarmAction, Weekdays};
#[cfg(feature = "btleplug")]
pub use ble::BtleplugTransport;
pub use color::{scenario_id, Color, Scenario};
pub use command::Command;
pub use error::TelinkError;
pub use light::TelinkLight;
pub use mesh::{TelinkMesh, VENDOR_TELINK};
pub use report::ReportHandler;
pub use transport::{GattCharacteristic, GattTransport};
