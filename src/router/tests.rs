//! Tests for the SourceRouter

use super::*;
use crate::config::{FallbackRule, SignalDetectConfig};
use crate::devices::{
    Capabilities, PanelEndpoint, PanelLink, SimulatedDevices, SimulatedSwitch, VideoSync,
};
use crate::signal::PanelId;
use std::time::Duration;

struct Fixture {
    devices: Arc<SimulatedDevices>,
    switch: Arc<SimulatedSwitch>,
    router: Arc<SourceRouter>,
}

async fn make_router(config: RoomConfig, switch: SimulatedSwitch, register: bool) -> Fixture {
    let devices = Arc::new(SimulatedDevices::default());
    let bus = Arc::new(SignalBus::new(devices.clone()));
    for id in [3, 4] {
        let endpoint = PanelEndpoint {
            id: PanelId(id),
            name: format!("panel-{}", id),
            link: PanelLink::Ethernet,
            capabilities: Capabilities::default(),
        };
        bus.register(&endpoint, None).unwrap();
        devices.set_online(PanelId(id), true);
    }

    let switch = Arc::new(switch);
    let router = Arc::new(SourceRouter::new(&config, switch.clone(), bus));
    if register {
        assert!(router.register_switch().await);
    }

    Fixture {
        devices,
        switch,
        router,
    }
}

fn indicators(devices: &SimulatedDevices, panel: u32) -> (bool, bool, bool) {
    (
        devices.bool_value(PanelId(panel), Address::boolean(31)),
        devices.bool_value(PanelId(panel), Address::boolean(32)),
        devices.bool_value(PanelId(panel), Address::boolean(33)),
    )
}

fn hd() -> MatrixInputEvent {
    MatrixInputEvent::Sync(VideoSync::Detected {
        width: 1920,
        height: 1080,
        fps: 60,
    })
}

#[tokio::test]
async fn test_select_source_routes_and_interlocks() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;

    f.router.select_source("Laptop").await.unwrap();

    assert_eq!(f.switch.routed(1), Some(3));
    assert_eq!(f.switch.routed(2), Some(4));
    assert_eq!(indicators(&f.devices, 3), (false, true, false));
    assert_eq!(indicators(&f.devices, 4), (false, true, false));
    assert_eq!(f.router.selected().unwrap().name, "Laptop");
}

#[tokio::test]
async fn test_select_source_is_case_insensitive() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;

    f.router.select_source("mixed").await.unwrap();

    assert_eq!(f.switch.history(), vec![(1, 1), (2, 3)]);
    assert_eq!(indicators(&f.devices, 3), (false, false, true));
}

#[tokio::test]
async fn test_unknown_source_has_no_side_effects() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;
    f.router.select_source("PC").await.unwrap();

    let err = f.router.select_source("Projector").await.unwrap_err();

    assert!(err.is_configuration());
    assert_eq!(f.switch.history(), vec![(1, 1), (2, 2)]);
    assert_eq!(indicators(&f.devices, 3), (true, false, false));
}

#[tokio::test]
async fn test_partial_failure_still_moves_indicator() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;
    f.switch.fail_route(1, 3);

    let err = f.router.select_source("Laptop").await.unwrap_err();

    match err {
        RoomError::Routing {
            source_name,
            failures,
        } => {
            assert_eq!(source_name, "Laptop");
            assert_eq!(failures.len(), 1);
            assert_eq!((failures[0].output, failures[0].input), (1, 3));
        }
        other => panic!("unexpected error: {}", other),
    }

    // No rollback, the second pair was still applied
    assert_eq!(f.switch.routed(2), Some(4));
    assert_eq!(indicators(&f.devices, 4), (false, true, false));
}

#[tokio::test]
async fn test_unregistered_switch_keeps_previous_indicator() {
    let switch = SimulatedSwitch::new("HD-MD4X2");
    switch.fail_registration("no response");
    let f = make_router(RoomConfig::default(), switch, false).await;

    assert!(!f.router.register_switch().await);
    assert!(!f.router.is_switch_registered());

    let err = f.router.select_source("PC").await.unwrap_err();

    match err {
        RoomError::Routing { failures, .. } => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error: {}", other),
    }
    assert!(f.switch.history().is_empty());
    assert_eq!(indicators(&f.devices, 3), (false, false, false));
    assert!(f.router.selected().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_selections_do_not_interleave() {
    let switch = SimulatedSwitch::new("HD-MD4X2").with_delay(Duration::from_millis(50));
    let f = make_router(RoomConfig::default(), switch, true).await;

    let a = {
        let router = f.router.clone();
        tokio::spawn(async move { router.select_source("PC").await })
    };
    let b = {
        let router = f.router.clone();
        tokio::spawn(async move { router.select_source("Laptop").await })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    let history = f.switch.history();
    assert_eq!(history.len(), 4);

    let pc = vec![(1, 1), (2, 2)];
    let laptop = vec![(1, 3), (2, 4)];
    let (first, last) = history.split_at(2);
    assert!(
        (first == pc.as_slice() && last == laptop.as_slice())
            || (first == laptop.as_slice() && last == pc.as_slice()),
        "pairs interleaved: {:?}",
        history
    );

    // Indicator matches whichever selection routed last
    let expected = if last == laptop.as_slice() {
        (false, true, false)
    } else {
        (true, false, false)
    };
    assert_eq!(indicators(&f.devices, 3), expected);
}

#[tokio::test]
async fn test_sync_events_do_not_touch_selection() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;
    f.router.select_source("PC").await.unwrap();

    f.router.on_input_event(3, hd()).await;
    f.router
        .on_input_event(3, MatrixInputEvent::Name("Laptop HDMI".into()))
        .await;
    f.router
        .on_input_event(4, MatrixInputEvent::Sync(VideoSync::NoSignal))
        .await;

    assert_eq!(f.switch.history(), vec![(1, 1), (2, 2)]);
    assert_eq!(indicators(&f.devices, 3), (true, false, false));
    assert_eq!(f.router.selected().unwrap().name, "PC");

    let status = f.router.input_status();
    assert!(status[&3].detected);
    assert!(!status[&4].detected);
}

#[tokio::test]
async fn test_signal_detect_feedback() {
    let mut config = RoomConfig::default();
    config.signal_detect = Some(SignalDetectConfig {
        inputs: vec![3, 4],
        join: 22,
    });
    let f = make_router(config, SimulatedSwitch::new("HD-MD4X2"), true).await;
    let detected = Address::boolean(22);

    f.router.on_input_event(4, hd()).await;
    assert!(f.devices.bool_value(PanelId(3), detected));

    f.router.on_input_event(3, hd()).await;
    f.router
        .on_input_event(4, MatrixInputEvent::Sync(VideoSync::NoSignal))
        .await;
    assert!(f.devices.bool_value(PanelId(3), detected));

    f.router
        .on_input_event(3, MatrixInputEvent::Sync(VideoSync::NoSignal))
        .await;
    assert!(!f.devices.bool_value(PanelId(4), detected));
}

#[tokio::test]
async fn test_fallback_rules_reroute_on_sync() {
    let mut config = RoomConfig::default();
    config.fallback = vec![
        FallbackRule {
            output: 1,
            input: 3,
            alternate: 1,
        },
        FallbackRule {
            output: 2,
            input: 4,
            alternate: 2,
        },
    ];
    let f = make_router(config, SimulatedSwitch::new("HD-MD4X2"), true).await;

    f.router.on_input_event(3, hd()).await;
    assert_eq!(f.switch.routed(1), Some(3));

    f.router
        .on_input_event(3, MatrixInputEvent::Sync(VideoSync::NoSignal))
        .await;
    assert_eq!(f.switch.routed(1), Some(1));
    assert_eq!(f.switch.routed(2), None);

    // Fallback never moves the source indicators
    assert_eq!(indicators(&f.devices, 3), (false, false, false));
}

#[tokio::test]
async fn test_no_fallback_without_rules() {
    let f = make_router(RoomConfig::default(), SimulatedSwitch::new("HD-MD4X2"), true).await;

    f.router.on_input_event(3, hd()).await;
    f.router
        .on_input_event(3, MatrixInputEvent::Sync(VideoSync::NoSignal))
        .await;

    assert!(f.switch.history().is_empty());
}
