//! Source router - logical sources onto the matrix switch
//!
//! The SourceRouter owns:
//! - The immutable source table and its interlock group
//! - The shared switch handle (one routing operation in flight)
//! - Input sync tracking, signal-detect feedback and the optional fallback policy

mod sources;
mod sync;

pub use sources::{LogicalSource, SourceTable};
pub use sync::{InputMonitor, InputStatus};

#[cfg(test)]
mod tests;

use crate::config::{FallbackRule, RoomConfig, SignalDetectConfig};
use crate::devices::{MatrixInputEvent, MatrixSwitch};
use crate::error::{Result, RoomError, RoutingFailure};
use crate::signal::{Address, InterlockGroup, SignalBus};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Name of the interlock group holding the source indicators
pub const SOURCE_GROUP: &str = "sources";

/// Routes logical sources and mirrors the selection onto every panel
pub struct SourceRouter {
    sources: SourceTable,
    switch: Arc<dyn MatrixSwitch>,
    /// Serializes every routing operation on the switch
    route_lock: Mutex<()>,
    switch_registered: AtomicBool,
    bus: Arc<SignalBus>,
    group: Arc<InterlockGroup>,
    inputs: InputMonitor,
    detect: Option<SignalDetectConfig>,
    fallback: Vec<FallbackRule>,
}

impl SourceRouter {
    pub fn new(config: &RoomConfig, switch: Arc<dyn MatrixSwitch>, bus: Arc<SignalBus>) -> Self {
        let sources = SourceTable::from_config(&config.sources);
        let group = Arc::new(sources.interlock_group(SOURCE_GROUP));

        if !config.fallback.is_empty() {
            info!("Auto-fallback enabled for {} output(s)", config.fallback.len());
        }

        Self {
            sources,
            switch,
            route_lock: Mutex::new(()),
            switch_registered: AtomicBool::new(false),
            bus,
            group,
            inputs: InputMonitor::new(),
            detect: config.signal_detect.clone(),
            fallback: config.fallback.clone(),
        }
    }

    pub fn sources(&self) -> &SourceTable {
        &self.sources
    }

    pub fn group(&self) -> &Arc<InterlockGroup> {
        &self.group
    }

    pub fn switch_name(&self) -> &str {
        self.switch.name()
    }

    pub fn is_switch_registered(&self) -> bool {
        self.switch_registered.load(Ordering::Acquire)
    }

    /// Register the matrix switch (startup, non-fatal)
    pub async fn register_switch(&self) -> bool {
        match self.switch.register().await {
            Ok(id) => {
                self.switch_registered.store(true, Ordering::Release);
                info!("✅ Registered {} ({:?})", self.switch.name(), id);
                true
            }
            Err(e) => {
                warn!("⚠️  Failed to register {}: {} (routing disabled)", self.switch.name(), e);
                false
            }
        }
    }

    /// Source whose indicator is currently asserted
    pub fn selected(&self) -> Option<&LogicalSource> {
        self.group
            .selected()
            .and_then(|address| self.sources.by_address(address))
    }

    /// Route a logical source and update the source indicators
    ///
    /// Unknown names fail with a configuration error and change nothing.
    /// Pair failures do not stop the remaining pairs and do not roll back;
    /// the indicators still move to the requested source and the failures
    /// are returned afterwards. With an unregistered switch nothing is
    /// routed and the previous indicator stays.
    pub async fn select_source(&self, name: &str) -> Result<()> {
        let source = self
            .sources
            .find(name)
            .ok_or_else(|| RoomError::configuration(format!("unknown source '{}'", name)))?;

        let _guard = self.route_lock.lock().await;

        if !self.is_switch_registered() {
            let failures: Vec<RoutingFailure> = source
                .routes
                .iter()
                .map(|pair| RoutingFailure {
                    output: pair.output,
                    input: pair.input,
                    reason: format!("{} is not registered", self.switch.name()),
                })
                .collect();
            warn!("⚠️  Cannot route '{}': {} unavailable", source.name, self.switch.name());
            return Err(RoomError::Routing {
                source_name: source.name.clone(),
                failures,
            });
        }

        info!("Selecting source '{}'", source.name);

        let mut failures = Vec::new();
        for pair in &source.routes {
            match self.switch.route(pair.output, pair.input).await {
                Ok(()) => debug!("Output {} <- input {}", pair.output, pair.input),
                Err(failure) => {
                    warn!("⚠️  Routing '{}': {}", source.name, failure);
                    failures.push(failure);
                }
            }
        }

        self.bus.interlock(&self.group, source.address)?;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(RoomError::Routing {
                source_name: source.name.clone(),
                failures,
            })
        }
    }

    /// Handle an input port event from the switch
    ///
    /// Never changes the selected source or the source indicators.
    pub async fn on_input_event(&self, port: u32, event: MatrixInputEvent) {
        let Some(detected) = self.inputs.record(port, &event) else {
            return;
        };

        if let Some(detect) = &self.detect {
            if detect.inputs.contains(&port) {
                let any = self.inputs.any_detected(&detect.inputs);
                self.bus.broadcast_bool(Address::boolean(detect.join), any);
            }
        }

        for rule in self.fallback.iter().filter(|r| r.input == port) {
            let input = sync::fallback_input(rule, detected);
            let _guard = self.route_lock.lock().await;

            if !self.is_switch_registered() {
                warn!("⚠️  Auto-fallback skipped: {} unavailable", self.switch.name());
                continue;
            }

            info!("Auto-fallback: output {} <- input {}", rule.output, input);
            if let Err(failure) = self.switch.route(rule.output, input).await {
                warn!("⚠️  Auto-fallback failed: {}", failure);
            }
        }
    }

    pub fn input_status(&self) -> BTreeMap<u32, InputStatus> {
        self.inputs.snapshot()
    }
}
