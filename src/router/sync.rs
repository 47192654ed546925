//! Switch input telemetry (names and video sync)

use crate::config::FallbackRule;
use crate::devices::{MatrixInputEvent, VideoSync};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Last known state of one switch input
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub detected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

/// Tracks what every switch input last reported
#[derive(Default)]
pub struct InputMonitor {
    inputs: Mutex<HashMap<u32, InputStatus>>,
}

impl InputMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an input event. Returns the new detect state for sync events.
    pub fn record(&self, port: u32, event: &MatrixInputEvent) -> Option<bool> {
        let mut inputs = self.inputs.lock();
        let status = inputs.entry(port).or_default();

        match event {
            MatrixInputEvent::Name(name) => {
                info!("Input {} name: {}", port, name);
                status.name = Some(name.clone());
                None
            }
            MatrixInputEvent::Sync(sync) => {
                status.detected = sync.is_detected();
                status.resolution = match sync {
                    VideoSync::Detected { width, height, fps } => {
                        Some(format!("{}x{}@{}", width, height, fps))
                    }
                    VideoSync::NoSignal => None,
                };
                match &status.resolution {
                    Some(format) => info!("Input {} sync detected: {}", port, format),
                    None => info!("Input {} sync lost", port),
                }
                Some(status.detected)
            }
            MatrixInputEvent::Other { event_id } => {
                debug!("Input {} event {}", port, event_id);
                None
            }
        }
    }

    pub fn any_detected(&self, ports: &[u32]) -> bool {
        let inputs = self.inputs.lock();
        ports
            .iter()
            .any(|p| inputs.get(p).map(|s| s.detected).unwrap_or(false))
    }

    pub fn snapshot(&self) -> BTreeMap<u32, InputStatus> {
        self.inputs
            .lock()
            .iter()
            .map(|(port, status)| (*port, status.clone()))
            .collect()
    }
}

/// Input a fallback rule wants on its output
pub fn fallback_input(rule: &FallbackRule, detected: bool) -> u32 {
    if detected {
        rule.input
    } else {
        rule.alternate
    }
}
