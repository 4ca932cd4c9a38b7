//! Inbound notification dispatch: decryption, vendor and addressing checks,
//! mesh-id adoption and typed report delivery.

mod common;

use std::sync::{Arc, Mutex};

use common::*;
use telink_lib::report::{
    AlarmReport, GroupsReport, OnlineStatusReport, ReportHandler, StatusReport, TimeReport,
};
use telink_lib::TelinkLight;

#[derive(Default)]
struct Events {
    online: Vec<OnlineStatusReport>,
    status: Vec<StatusReport>,
    time: Vec<TimeReport>,
    groups: Vec<GroupsReport>,
    alarms: Vec<AlarmReport>,
}

#[derive(Clone, Default)]
struct Collector(Arc<Mutex<Events>>);

impl ReportHandler for Collector {
    fn on_online_status(&self, report: OnlineStatusReport) {
        self.0.lock().unwrap().online.push(report);
    }

    fn on_status(&self, report: StatusReport) {
        self.0.lock().unwrap().status.push(report);
    }

    fn on_time(&self, report: TimeReport) {
        self.0.lock().unwrap().time.push(report);
    }

    fn on_groups(&self, report: GroupsReport) {
        self.0.lock().unwrap().groups.push(report);
    }

    fn on_alarm(&self, report: AlarmReport) {
        self.0.lock().unwrap().alarms.push(report);
    }
}

async fn connected_light() -> (TelinkLight, MockHandle, Collector) {
    let (transport, handle) = MockTransport::new();
    let light = TelinkLight::new(MAC, NAME, PASSWORD, transport).unwrap();
    let collector = Collector::default();
    light.set_report_handler(Arc::new(collector.clone()));
    let mut light = light;
    light.connect().await.unwrap();
    (light, handle, collector)
}

#[tokio::test]
async fn online_status_adopts_mesh_id_and_updates_state() {
    let (light, handle, collector) = connected_light().await;
    assert_eq!(light.mesh_id(), 0);

    let frame = device_frame(0xDC, 0, &[(10, 5), (12, 80), (13, 0x40)]);
    handle.notify(device_encrypt(&handle.session_key(), frame)).await;

    wait_until(|| light.mesh_id() == 5).await;
    assert!(light.is_on());
    assert_eq!(light.brightness(), 80);
    let events = collector.0.lock().unwrap();
    assert_eq!(events.online.len(), 1);
    assert_eq!(events.online[0].mesh_id, 5);

    drop(events);
    // a second report no longer rebinds the id
    let frame = device_frame(0xDC, 0, &[(10, 9), (12, 10), (13, 0x41)]);
    handle.notify(device_encrypt(&handle.session_key(), frame)).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(light.mesh_id(), 5);
}

#[tokio::test]
async fn vendor_mismatch_is_dropped() {
    let (_light, handle, collector) = connected_light().await;
    let key = handle.session_key();

    let mut foreign = device_frame(0xDB, 0, &[(10, 42)]);
    foreign[8] = 0x33;
    foreign[9] = 0x03;
    handle.notify(device_encrypt(&key, foreign)).await;

    // marker frame proves the dispatcher is still alive afterwards
    let marker = device_frame(0xDB, 0, &[(10, 60)]);
    handle.notify(device_encrypt(&key, marker)).await;

    wait_until(|| !collector.0.lock().unwrap().status.is_empty()).await;
    let events = collector.0.lock().unwrap();
    assert_eq!(events.status.len(), 1);
    assert_eq!(events.status[0].brightness, 60);
}

#[tokio::test]
async fn short_and_garbled_frames_are_dropped() {
    let (_light, handle, collector) = connected_light().await;
    let key = handle.session_key();

    handle.notify(vec![0x01, 0x02, 0x03]).await;
    handle.notify(vec![0xFF; 20]).await; // decrypts to garbage, vendor check drops it

    let marker = device_frame(0xE9, 0, &[(10, 0xE6), (11, 0x07), (12, 1), (13, 2), (14, 3), (15, 4), (16, 5)]);
    handle.notify(device_encrypt(&key, marker)).await;

    wait_until(|| !collector.0.lock().unwrap().time.is_empty()).await;
    let events = collector.0.lock().unwrap();
    assert_eq!(events.time.len(), 1);
    assert_eq!(events.time[0].year, 2022);
}

#[tokio::test]
async fn frames_for_other_nodes_are_dropped() {
    let (light, handle, collector) = connected_light().await;
    let key = handle.session_key();

    // bind the session to mesh id 5
    let frame = device_frame(0xDC, 0, &[(10, 5), (12, 80), (13, 0x40)]);
    handle.notify(device_encrypt(&key, frame)).await;
    wait_until(|| light.mesh_id() == 5).await;

    // echoed id 7: someone else's report
    let frame = device_frame(0xDB, 7, &[(10, 11)]);
    handle.notify(device_encrypt(&key, frame)).await;
    // echoed id 0: targeted at the connected node, accepted
    let frame = device_frame(0xDB, 0, &[(10, 22)]);
    handle.notify(device_encrypt(&key, frame)).await;
    // echoed id 5: matches the adopted id, accepted
    let frame = device_frame(0xDB, 5, &[(10, 33)]);
    handle.notify(device_encrypt(&key, frame)).await;

    wait_until(|| collector.0.lock().unwrap().status.len() == 2).await;
    let events = collector.0.lock().unwrap();
    let brightness: Vec<u8> = events.status.iter().map(|s| s.brightness).collect();
    assert_eq!(brightness, vec![22, 33]);
}

#[tokio::test]
async fn group_and_alarm_reports_reach_the_handler() {
    let (_light, handle, collector) = connected_light().await;
    let key = handle.session_key();

    let mut groups = device_frame(0xD4, 0, &[]);
    groups[10..20].copy_from_slice(&[1, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
    handle.notify(device_encrypt(&key, groups)).await;

    let alarm = device_frame(
        0xE7,
        0,
        &[(11, 1), (12, 0x92), (14, 0x7E), (15, 12), (16, 30), (18, 2), (19, 1)],
    );
    handle.notify(device_encrypt(&key, alarm)).await;

    wait_until(|| {
        let events = collector.0.lock().unwrap();
        !events.groups.is_empty() && !events.alarms.is_empty()
    })
    .await;
    let events = collector.0.lock().unwrap();
    assert_eq!(events.groups[0].active().collect::<Vec<_>>(), vec![1, 3]);
    assert_eq!(events.alarms[0].scenario_id, Some(2));
    assert!(events.alarms[0].enabled);
}
