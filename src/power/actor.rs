//! PowerActor - per-panel Awake/Standby/DeepSleep lifecycle
//!
//! One actor per panel owns the power state, the single pending demotion
//! timer and the clock refresh. Commands, timer firings and clock ticks are
//! handled one at a time, commands first:
//! - An activity queued at the instant a timer becomes due always wins
//! - Every (re)arm bumps the generation, a firing from an older generation
//!   is dropped
//! - Disconnect and shutdown cancel the timer inside the loop

use super::commands::{PowerCommand, PowerSnapshot, TimerKind};
use super::effects::PanelEffects;
use super::handle::PowerHandle;
use super::telemetry::{TelemetryState, TelemetryUpdate};
use super::{PowerSettings, PowerState};
use crate::signal::PanelId;
use chrono::{DateTime, Local};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace};

/// Source of the wall-clock time shown on the panel
pub type WallClock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct PendingTimer {
    kind: TimerKind,
    deadline: Instant,
    generation: u64,
}

/// Actor owning one panel's power lifecycle
pub struct PowerActor {
    panel: PanelId,
    effects: Arc<dyn PanelEffects>,
    settings: PowerSettings,

    state: PowerState,
    /// When `state` was entered
    since: Instant,
    online: bool,

    /// At most one demotion timer is pending at a time
    pending: Option<PendingTimer>,
    generation: u64,

    clock: Option<Interval>,
    wall_clock: WallClock,
    /// Last (time, date) text written to the panel
    shown_clock: Option<(String, String)>,

    telemetry: TelemetryState,
    command_rx: mpsc::UnboundedReceiver<PowerCommand>,
}

impl PowerActor {
    /// Spawn the actor for `panel` and return its handle
    ///
    /// The lifecycle starts Awake and offline; nothing is armed until the
    /// first `connect`.
    pub fn spawn(
        panel: PanelId,
        effects: Arc<dyn PanelEffects>,
        settings: PowerSettings,
    ) -> PowerHandle {
        Self::spawn_with_clock(panel, effects, settings, Arc::new(Local::now))
    }

    /// Like [`PowerActor::spawn`], reading the displayed time from `wall_clock`
    pub fn spawn_with_clock(
        panel: PanelId,
        effects: Arc<dyn PanelEffects>,
        settings: PowerSettings,
        wall_clock: WallClock,
    ) -> PowerHandle {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let actor = PowerActor {
            panel,
            effects,
            settings,
            state: PowerState::Awake,
            since: Instant::now(),
            online: false,
            pending: None,
            generation: 0,
            clock: None,
            wall_clock,
            shown_clock: None,
            telemetry: TelemetryState::default(),
            command_rx: cmd_rx,
        };

        tokio::spawn(actor.run());

        info!("PowerActor spawned for {}", panel);

        PowerHandle::new(panel, cmd_tx)
    }

    async fn run(mut self) {
        debug!("PowerActor {} run loop started", self.panel);

        loop {
            let timer = self.pending;

            tokio::select! {
                biased;

                cmd = self.command_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    trace!(?cmd, "Processing power command");

                    if let PowerCommand::Shutdown { ack } = cmd {
                        self.cancel_timer();
                        self.stop_clock();
                        let _ = ack.send(());
                        info!("PowerActor {} received shutdown command", self.panel);
                        break;
                    }
                    self.handle(cmd);
                }

                generation = Self::wait_for(timer) => {
                    self.on_timer(generation);
                }

                _ = Self::tick(&mut self.clock) => {
                    self.refresh_clock();
                }
            }
        }

        debug!("PowerActor {} stopped", self.panel);
    }

    async fn wait_for(timer: Option<PendingTimer>) -> u64 {
        match timer {
            Some(t) => {
                time::sleep_until(t.deadline).await;
                t.generation
            }
            None => std::future::pending().await,
        }
    }

    async fn tick(clock: &mut Option<Interval>) {
        match clock {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    fn handle(&mut self, cmd: PowerCommand) {
        match cmd {
            PowerCommand::Connect => self.connect(),
            PowerCommand::Disconnect => self.disconnect(),
            PowerCommand::Activity => self.activity(),
            PowerCommand::Refresh => self.refresh(),
            PowerCommand::Sleep => self.sleep(),
            PowerCommand::Toggle => {
                if self.state == PowerState::Awake {
                    self.sleep();
                } else {
                    self.activity();
                }
            }
            PowerCommand::Telemetry(reading) => match self.telemetry.apply(reading) {
                TelemetryUpdate::Charge(indicator) => self.effects.charge(indicator),
                TelemetryUpdate::RfWeak(weak) => self.effects.rf_signal(weak),
            },
            PowerCommand::Snapshot { response } => {
                let _ = response.send(self.snapshot());
            }
            PowerCommand::Shutdown { .. } => {}
        }
    }

    fn connect(&mut self) {
        info!("{} online", self.panel);
        self.online = true;
        self.enter(PowerState::Awake);
        self.effects.awake();
        self.arm(TimerKind::Standby);
        self.start_clock();
    }

    fn disconnect(&mut self) {
        info!("{} offline", self.panel);
        self.online = false;
        self.cancel_timer();
        self.stop_clock();
    }

    fn activity(&mut self) {
        if !self.online {
            debug!("Ignoring activity on offline panel {}", self.panel);
            return;
        }
        if self.state != PowerState::Awake {
            self.enter(PowerState::Awake);
            self.effects.awake();
        }
        self.arm(TimerKind::Standby);
    }

    /// Restart the standby window of an awake, online panel
    fn refresh(&mut self) {
        if self.online && self.state == PowerState::Awake {
            self.arm(TimerKind::Standby);
        } else {
            trace!("Refresh ignored on {} ({})", self.panel, self.state);
        }
    }

    fn sleep(&mut self) {
        if !self.online {
            debug!("Ignoring sleep on offline panel {}", self.panel);
            return;
        }
        if self.state == PowerState::Awake {
            self.enter_standby();
        } else {
            debug!("{} already {}", self.panel, self.state);
        }
    }

    fn on_timer(&mut self, generation: u64) {
        let timer = match self.pending {
            Some(t) if t.generation == generation => t,
            _ => {
                debug!("Dropping stale timer (generation {}) on {}", generation, self.panel);
                return;
            }
        };
        self.pending = None;

        match timer.kind {
            TimerKind::Standby => self.enter_standby(),
            TimerKind::DeepSleep => {
                self.enter(PowerState::DeepSleep);
                self.effects.deep_sleep();
            }
        }
    }

    fn enter_standby(&mut self) {
        self.enter(PowerState::Standby);
        self.effects.standby();
        self.arm(TimerKind::DeepSleep);
    }

    fn enter(&mut self, state: PowerState) {
        if self.state != state {
            info!("{}: {} → {}", self.panel, self.state, state);
        }
        self.state = state;
        self.since = Instant::now();
    }

    /// Replace any pending timer with a fresh one of `kind`
    fn arm(&mut self, kind: TimerKind) {
        self.generation += 1;
        let window = match kind {
            TimerKind::Standby => self.settings.standby_window,
            TimerKind::DeepSleep => self.settings.deep_sleep_window,
        };
        self.pending = Some(PendingTimer {
            kind,
            deadline: Instant::now() + window,
            generation: self.generation,
        });
        trace!("{}: {:?} timer armed (generation {})", self.panel, kind, self.generation);
    }

    fn cancel_timer(&mut self) {
        self.generation += 1;
        self.pending = None;
    }

    fn start_clock(&mut self) {
        let mut interval = time::interval(self.settings.clock_period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.clock = Some(interval);
        self.shown_clock = None;
    }

    fn stop_clock(&mut self) {
        self.clock = None;
        self.shown_clock = None;
    }

    /// Write the clock text when it differs from what the panel shows
    fn refresh_clock(&mut self) {
        let now = (self.wall_clock)();
        let text = (
            now.format("%-I:%M %p").to_string(),
            now.format("%A, %B %-d, %Y").to_string(),
        );

        if self.shown_clock.as_ref() != Some(&text) {
            self.effects.clock(&text.0, &text.1);
            self.shown_clock = Some(text);
        }
    }

    fn snapshot(&self) -> PowerSnapshot {
        PowerSnapshot {
            state: self.state,
            online: self.online,
            pending: self.pending.map(|t| t.kind),
            generation: self.generation,
            since: self.since,
            charge: self
                .telemetry
                .has_charge_data()
                .then(|| self.telemetry.charge()),
            rf_weak: self.telemetry.rf_weak(),
        }
    }
}
