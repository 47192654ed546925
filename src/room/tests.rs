//! End-to-end tests for the Room on simulated devices

use super::*;
use crate::devices::{SimulatedDevices, SimulatedSwitch, TelemetryReading};
use crate::power::PowerState;
use crate::signal::SignalValue;
use std::time::Duration;

const TST: PanelId = PanelId(0x03);
const XPANEL: PanelId = PanelId(0x04);
const STANDBY: Duration = Duration::from_secs(60);
const DEEP_SLEEP: Duration = Duration::from_secs(15 * 60);
const MS: Duration = Duration::from_millis(1);

struct Harness {
    devices: Arc<SimulatedDevices>,
    switch: Arc<SimulatedSwitch>,
    room: Room,
}

async fn make_room_with(devices: SimulatedDevices, switch: SimulatedSwitch) -> Harness {
    let devices = Arc::new(devices);
    let switch = Arc::new(switch);
    let room = Room::initialize(RoomConfig::default(), devices.clone(), switch.clone()).await;
    Harness {
        devices,
        switch,
        room,
    }
}

async fn make_room() -> Harness {
    make_room_with(SimulatedDevices::default(), SimulatedSwitch::new("HD-MD4X2")).await
}

impl Harness {
    async fn online(&self, panel: PanelId, online: bool) {
        self.devices.set_online(panel, online);
        self.room
            .handle_event(DeviceEvent::OnlineStatusChanged { panel, online })
            .await;
    }

    async fn signal(&self, panel: PanelId, join: u32, value: bool) {
        self.room
            .handle_event(DeviceEvent::SignalChanged {
                panel,
                address: Address::boolean(join),
                value,
            })
            .await;
    }

    /// Press and release a join, then wait for any routing it started
    async fn press(&self, panel: PanelId, join: u32) {
        self.signal(panel, join, true).await;
        self.signal(panel, join, false).await;
        self.room.settle().await;
    }

    async fn power(&self, panel: PanelId) -> PowerState {
        self.room.lifecycle(panel).unwrap().state().await.unwrap()
    }

    fn indicators(&self, panel: PanelId) -> (bool, bool, bool) {
        (
            self.devices.bool_value(panel, Address::boolean(31)),
            self.devices.bool_value(panel, Address::boolean(32)),
            self.devices.bool_value(panel, Address::boolean(33)),
        )
    }
}

#[tokio::test(start_paused = true)]
async fn test_select_then_idle_then_wake() {
    let h = make_room().await;
    h.online(TST, true).await;
    h.online(XPANEL, true).await;
    assert_eq!(h.indicators(TST), (false, false, false));

    h.press(TST, 32).await;

    assert_eq!(h.switch.routed(1), Some(3));
    assert_eq!(h.switch.routed(2), Some(4));
    assert_eq!(h.indicators(TST), (false, true, false));
    assert_eq!(h.indicators(XPANEL), (false, true, false));
    assert_eq!(h.power(TST).await, PowerState::Awake);
    assert_eq!(h.devices.brightness(TST), Some(60000));

    tokio::time::sleep(STANDBY + MS).await;
    assert_eq!(h.power(TST).await, PowerState::Standby);
    assert_eq!(h.devices.brightness(TST), Some(20000));
    assert!(h.devices.bool_value(TST, Address::boolean(50)));
    assert!(!h.devices.bool_value(TST, Address::boolean(51)));

    tokio::time::sleep(DEEP_SLEEP).await;
    assert_eq!(h.power(TST).await, PowerState::DeepSleep);
    assert_eq!(h.devices.backlight(TST), Some(false));

    // Any press wakes the panel, even one without a mapped action
    h.press(TST, 99).await;
    assert_eq!(h.power(TST).await, PowerState::Awake);
    assert_eq!(h.devices.brightness(TST), Some(60000));
    assert_eq!(h.devices.backlight(TST), Some(true));
    assert_eq!(h.indicators(TST), (false, true, false));
    assert_eq!(h.switch.history().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_press_on_one_panel_keeps_other_awake_timer() {
    let h = make_room().await;
    h.online(TST, true).await;
    h.online(XPANEL, true).await;

    tokio::time::sleep(STANDBY / 2).await;
    h.press(XPANEL, 31).await;
    tokio::time::sleep(STANDBY / 2 + MS).await;

    // Only the panel that was touched stays awake
    assert_eq!(h.power(TST).await, PowerState::Standby);
    assert_eq!(h.power(XPANEL).await, PowerState::Awake);
    assert_eq!(h.indicators(TST), (true, false, false));
}

#[tokio::test(start_paused = true)]
async fn test_release_after_long_hold_restarts_standby_window() {
    let h = make_room().await;
    h.online(XPANEL, true).await;

    h.signal(XPANEL, 99, true).await;
    tokio::time::sleep(STANDBY - Duration::from_secs(10)).await;
    h.signal(XPANEL, 99, false).await;

    tokio::time::sleep(Duration::from_secs(10) + MS).await;
    assert_eq!(h.power(XPANEL).await, PowerState::Awake);

    tokio::time::sleep(STANDBY).await;
    assert_eq!(h.power(XPANEL).await, PowerState::Standby);

    // A release never wakes a sleeping panel
    h.signal(XPANEL, 99, true).await;
    h.room.sleep(XPANEL);
    h.signal(XPANEL, 99, false).await;
    assert_eq!(h.power(XPANEL).await, PowerState::Standby);
}

#[tokio::test(start_paused = true)]
async fn test_finished_routing_tasks_are_released() {
    let h = make_room().await;
    h.online(TST, true).await;

    for i in 0..200 {
        h.signal(TST, 31 + i % 3, true).await;
        h.signal(TST, 31 + i % 3, false).await;
        tokio::time::sleep(MS).await;
    }

    assert!(h.room.routes.lock().len() <= 1);
    h.room.settle().await;
    assert!(h.room.routes.lock().is_empty());
    assert_eq!(h.indicators(TST), (false, true, false));
}

#[tokio::test(start_paused = true)]
async fn test_power_toggle_press() {
    let h = make_room().await;
    h.online(TST, true).await;

    h.press(TST, 10).await;
    assert_eq!(h.power(TST).await, PowerState::Standby);
    assert_eq!(h.devices.brightness(TST), Some(20000));

    h.press(TST, 10).await;
    assert_eq!(h.power(TST).await, PowerState::Awake);
    assert!(h.switch.history().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_operator_sleep() {
    let h = make_room().await;
    h.online(XPANEL, true).await;

    assert!(h.room.sleep(XPANEL));
    assert_eq!(h.power(XPANEL).await, PowerState::Standby);
    assert!(!h.room.sleep(PanelId(0x42)));
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_replays_selection() {
    let h = make_room().await;
    h.online(TST, true).await;

    h.press(TST, 33).await;
    assert_eq!(h.indicators(XPANEL), (false, false, false));

    h.online(XPANEL, true).await;
    assert_eq!(h.indicators(XPANEL), (false, false, true));
    assert_eq!(h.power(XPANEL).await, PowerState::Awake);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_stops_demotion() {
    let h = make_room().await;
    h.online(TST, true).await;
    h.online(TST, false).await;

    tokio::time::sleep(STANDBY + DEEP_SLEEP + MS).await;
    assert_eq!(h.power(TST).await, PowerState::Awake);

    h.online(TST, true).await;
    tokio::time::sleep(STANDBY + MS).await;
    assert_eq!(h.power(TST).await, PowerState::Standby);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_source_is_a_configuration_error() {
    let h = make_room().await;
    h.online(TST, true).await;
    h.room.select_source("PC").await.unwrap();

    let err = h.room.select_source("Document Camera").await.unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(h.indicators(TST), (true, false, false));
    assert_eq!(h.switch.history(), vec![(1, 1), (2, 2)]);
}

#[tokio::test(start_paused = true)]
async fn test_wireless_panel_without_gateway_is_left_out() {
    let devices = SimulatedDevices::new(false);
    devices.fail_gateway("no response");
    let h = make_room_with(devices, SimulatedSwitch::new("HD-MD4X2")).await;

    assert!(!h.room.gateway().is_available());
    assert_eq!(h.room.failed_panels().len(), 1);
    assert_eq!(h.room.failed_panels()[0].id, TST);
    assert!(h.room.lifecycle(TST).is_none());
    assert!(!h.devices.is_registered(TST));

    // The wired panel is unaffected
    h.online(XPANEL, true).await;
    h.press(XPANEL, 31).await;
    assert_eq!(h.indicators(XPANEL), (true, false, false));

    // Presses from the failed panel are never delivered
    h.press(TST, 32).await;
    assert_eq!(h.switch.history(), vec![(1, 1), (2, 2)]);
}

#[tokio::test(start_paused = true)]
async fn test_switch_unavailable_keeps_previous_indicator() {
    let switch = SimulatedSwitch::new("HD-MD4X2");
    switch.fail_registration("offline");
    let h = make_room_with(SimulatedDevices::default(), switch).await;
    h.online(TST, true).await;

    h.press(TST, 31).await;

    assert_eq!(h.indicators(TST), (false, false, false));
    assert!(h.switch.history().is_empty());
    // The press still counted as activity
    assert_eq!(h.power(TST).await, PowerState::Awake);
}

#[tokio::test(start_paused = true)]
async fn test_telemetry_reaches_battery_panel() {
    let h = make_room().await;
    h.online(TST, true).await;

    for reading in [
        TelemetryReading::AcLine(false),
        TelemetryReading::BatteryLevel(35),
        TelemetryReading::RfSignal(20),
    ] {
        h.room
            .handle_event(DeviceEvent::Telemetry { panel: TST, reading })
            .await;
    }
    h.power(TST).await;

    assert_eq!(
        h.devices.value(TST, Address::numeric(2)),
        Some(SignalValue::Numeric(0))
    );
    assert_eq!(
        h.devices.value(TST, Address::numeric(1)),
        Some(SignalValue::Numeric(1))
    );
}

#[tokio::test(start_paused = true)]
async fn test_clock_is_written_on_connect() {
    let h = make_room().await;
    h.online(XPANEL, true).await;
    h.power(XPANEL).await;
    h.power(XPANEL).await;

    assert!(matches!(
        h.devices.value(XPANEL, Address::string(1)),
        Some(SignalValue::Text(t)) if !t.is_empty()
    ));
    assert!(matches!(
        h.devices.value(XPANEL, Address::string(2)),
        Some(SignalValue::Text(t)) if !t.is_empty()
    ));
}

#[tokio::test(start_paused = true)]
async fn test_status_report() {
    let h = make_room().await;
    h.online(TST, true).await;
    h.press(TST, 31).await;

    let status = h.room.status().await;

    assert_eq!(status.room, "Room");
    assert_eq!(status.gateway, "internal RF gateway");
    assert!(status.switch_registered);
    assert_eq!(status.selected_source.as_deref(), Some("PC"));
    assert_eq!(status.panels.len(), 2);
    assert!(status.panels[0].online);
    assert!(!status.panels[1].online);
    assert!(status.panels.iter().all(|p| p.registration.is_some()));
    assert_ne!(status.panels[0].registration, status.panels[1].registration);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["panels"][0]["power"]["state"], "Awake");
    assert!(json.get("failed_panels").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_detaches_panels() {
    let h = make_room().await;
    h.online(TST, true).await;

    let handle = h.room.lifecycle(TST).unwrap();
    h.room.shutdown().await;

    assert!(handle.snapshot().await.is_none());
    assert!(h.room.lifecycle(TST).is_none());
    assert!(!h.room.bus().is_registered(TST));
    assert!(!h.devices.is_registered(TST));
}
