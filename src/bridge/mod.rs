//! Reconciliation loop - keeps the hub's view of the receiver in sync
//!
//! One actor task owns the device binding, the volume debounce and the
//! exposed-state mirror. It reacts to:
//!
//! - the ensure-bound timer (bind when no receiver is bound),
//! - the poll timer (refresh state from a discovered receiver; a successful
//!   discovery also polls at once),
//! - hub commands sent through [`LoopHandle`],
//! - results of driver calls, which run as spawned tasks and come back as
//!   device events tagged with the binding generation they started under,
//! - the debounce deadline of a pending volume write.
//!
//! Each event is handled to completion before the next one is taken, so the
//! loop state needs no locking. Driver failures only ever degrade the status
//! line; nothing propagates out of the loop.

mod binding;
mod debounce;
mod exposed;


pub use binding::{
    DeviceBinding, STATUS_CHECK_FAILED, STATUS_DISCOVERING, STATUS_INITIALIZING,
    STATUS_NOT_FOUND, STATUS_SETUP_FAILED,
};
pub use debounce::VolumeDebounce;
pub use exposed::{ExposedState, DEVICE_VOLUME_OFFSET, VOLUME_MAX, VOLUME_MIN};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use crate::config::TimingConfig;
use crate::drivers::{
    DeviceInfo, DriverError, DriverFactory, Features, Power, ReceiverDriver, ReceiverStatus,
};
use crate::hub::{
    CommandOutcome, ControlHub, SourceStatus, SourceUpdate, StatusReporter, SurfaceId,
    VolumeMode, VolumeUpdate,
};
use crate::settings::SharedSettings;

const NOT_CONNECTED: &str = "Yamaha receiver is not connected";
const LOOP_STOPPED: &str = "Reconciliation loop is not running";

/// Timer settings for the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTiming {
    pub bind_interval: Duration,
    pub poll_interval: Duration,
    pub volume_debounce: Duration,
}

impl From<&TimingConfig> for LoopTiming {
    fn from(config: &TimingConfig) -> Self {
        Self {
            bind_interval: config.bind_interval(),
            poll_interval: config.poll_interval(),
            volume_debounce: config.volume_debounce(),
        }
    }
}

impl Default for LoopTiming {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

/// Commands accepted by the loop
#[derive(Debug)]
pub enum LoopCommand {
    SetVolume {
        mode: VolumeMode,
        value: i32,
        reply: oneshot::Sender<CommandOutcome>,
    },
    SetMute {
        muted: bool,
        reply: oneshot::Sender<CommandOutcome>,
    },
    ConvenienceSwitch {
        reply: oneshot::Sender<CommandOutcome>,
    },
    Standby {
        reply: oneshot::Sender<CommandOutcome>,
    },
    /// Drop the current binding and bind again from the current settings
    Rebind,
    /// Remove all surfaces and stop
    Shutdown { done: oneshot::Sender<()> },
}

/// Result of a spawned driver call
#[derive(Debug)]
struct DeviceEvent {
    generation: u64,
    kind: DeviceEventKind,
}

#[derive(Debug)]
enum DeviceEventKind {
    Discovered(Result<String, DriverError>),
    DeviceInfo(Result<DeviceInfo, DriverError>),
    Features(Result<Features, DriverError>),
    Status(Result<ReceiverStatus, DriverError>),
}

impl DeviceEventKind {
    fn name(&self) -> &'static str {
        match self {
            DeviceEventKind::Discovered(_) => "discovery",
            DeviceEventKind::DeviceInfo(_) => "device info",
            DeviceEventKind::Features(_) => "features",
            DeviceEventKind::Status(_) => "status",
        }
    }
}

/// Surface registrations owned by the current binding
#[derive(Debug, Clone, Copy)]
struct Surfaces {
    volume: SurfaceId,
    source: SurfaceId,
}

/// Handle for sending hub commands to the loop (cheap to clone)
#[derive(Clone, Debug)]
pub struct LoopHandle {
    cmd_tx: mpsc::UnboundedSender<LoopCommand>,
}

impl LoopHandle {
    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<CommandOutcome>) -> LoopCommand,
    ) -> CommandOutcome {
        let (reply_tx, reply_rx) = oneshot::channel();
        if self.cmd_tx.send(make(reply_tx)).is_err() {
            return CommandOutcome::Failure(LOOP_STOPPED.to_string());
        }
        reply_rx
            .await
            .unwrap_or_else(|_| CommandOutcome::Failure(LOOP_STOPPED.to_string()))
    }

    /// Set the volume (absolute dB, or a dB step relative to the current value)
    pub async fn set_volume(&self, mode: VolumeMode, value: i32) -> CommandOutcome {
        self.request(|reply| LoopCommand::SetVolume { mode, value, reply })
            .await
    }

    pub async fn set_mute(&self, muted: bool) -> CommandOutcome {
        self.request(|reply| LoopCommand::SetMute { muted, reply }).await
    }

    /// Power on and switch to the configured input
    pub async fn convenience_switch(&self) -> CommandOutcome {
        self.request(|reply| LoopCommand::ConvenienceSwitch { reply })
            .await
    }

    /// Toggle between standby and on
    pub async fn standby(&self) -> CommandOutcome {
        self.request(|reply| LoopCommand::Standby { reply }).await
    }

    /// Fire-and-forget: rebind from the current settings
    pub fn rebind(&self) {
        let _ = self.cmd_tx.send(LoopCommand::Rebind);
    }

    /// Stop the loop and wait until its surfaces are removed
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.cmd_tx.send(LoopCommand::Shutdown { done: done_tx }).is_ok() {
            let _ = done_rx.await;
        }
    }
}

/// The reconciliation actor
pub struct ReconciliationLoop {
    hub: Arc<dyn ControlHub>,
    status: Arc<dyn StatusReporter>,
    factory: DriverFactory,
    settings: SharedSettings,
    timing: LoopTiming,

    binding: DeviceBinding,
    debounce: VolumeDebounce,
    exposed: ExposedState,
    surfaces: Option<Surfaces>,
    poll_in_flight: bool,

    command_rx: mpsc::UnboundedReceiver<LoopCommand>,
    event_tx: mpsc::UnboundedSender<DeviceEvent>,
    event_rx: mpsc::UnboundedReceiver<DeviceEvent>,
}

impl ReconciliationLoop {
    /// Spawn the loop task and return its handle
    pub fn spawn(
        hub: Arc<dyn ControlHub>,
        status: Arc<dyn StatusReporter>,
        factory: DriverFactory,
        settings: SharedSettings,
        timing: LoopTiming,
    ) -> LoopHandle {
        let (cmd_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let actor = ReconciliationLoop {
            hub,
            status,
            factory,
            settings,
            timing,
            binding: DeviceBinding::new(),
            debounce: VolumeDebounce::new(timing.volume_debounce),
            exposed: ExposedState::default(),
            surfaces: None,
            poll_in_flight: false,
            command_rx,
            event_tx,
            event_rx,
        };

        tokio::spawn(actor.run());

        LoopHandle { cmd_tx }
    }

    async fn run(mut self) {
        info!(
            "🎛️  Reconciliation loop started (bind every {:?}, poll every {:?}, debounce {:?})",
            self.timing.bind_interval, self.timing.poll_interval, self.timing.volume_debounce
        );
        self.status.set_status(STATUS_INITIALIZING, false);

        let mut bind_ticker = tokio::time::interval(self.timing.bind_interval);
        bind_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // First poll one full period after start; the bind tick fires at once
        let mut poll_ticker = tokio::time::interval_at(
            Instant::now() + self.timing.poll_interval,
            self.timing.poll_interval,
        );
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let debounce_deadline = self.debounce.deadline();

            tokio::select! {
                _ = bind_ticker.tick() => self.ensure_bound(),
                _ = poll_ticker.tick() => self.poll_status(),
                _ = sleep_until_opt(debounce_deadline) => self.flush_volume(),
                Some(event) = self.event_rx.recv() => self.handle_event(event),
                command = self.command_rx.recv() => {
                    let Some(command) = command else {
                        debug!("All loop handles dropped");
                        self.stop();
                        break;
                    };
                    if !self.handle_command(command) {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation loop stopped");
    }

    // =========================================================================
    // Timers
    // =========================================================================

    fn ensure_bound(&mut self) {
        if !self.binding.is_bound() {
            self.bind();
        }
    }

    /// Replace the binding with a fresh driver built from the current settings
    fn bind(&mut self) {
        self.teardown_surfaces();

        let receiver_url = self.settings.read().receiver_url.clone();
        let driver = (self.factory)(&receiver_url);
        let generation = self.binding.bind(driver.clone());
        self.exposed = ExposedState::default();
        if let Some(target) = self.debounce.target() {
            // The pending write goes to the new driver; show it meanwhile
            self.exposed.set_volume(target);
        }
        self.poll_in_flight = false;

        if receiver_url.is_empty() {
            debug!("🔍 Searching for a Yamaha receiver (binding #{})", generation);
        } else {
            debug!("🔍 Binding Yamaha receiver at {} (binding #{})", receiver_url, generation);
        }
        self.report_status();

        self.spawn_call(generation, driver, |driver| async move {
            DeviceEventKind::Discovered(driver.discover().await)
        });

        self.register_surfaces();
    }

    fn poll_status(&mut self) {
        let Some(driver) = self.binding.driver() else {
            return;
        };
        if self.binding.ip().is_none() {
            trace!("Poll skipped: receiver not discovered yet");
            return;
        }
        if self.poll_in_flight {
            trace!("Poll skipped: previous poll still running");
            return;
        }

        self.poll_in_flight = true;
        self.spawn_call(self.binding.generation(), driver, |driver| async move {
            DeviceEventKind::Status(driver.get_status().await)
        });
    }

    fn flush_volume(&mut self) {
        let Some(target) = self.debounce.take_due(Instant::now()) else {
            return;
        };
        let Some(driver) = self.binding.driver() else {
            warn!("⚠️  Volume change to {} dB dropped: no receiver bound", target);
            return;
        };

        let volume = self.exposed.device_volume(target);
        debug!("🔊 Writing volume {} dB (device {})", target, volume);
        spawn_write("set volume", driver, move |driver| async move {
            driver.set_volume_to(volume).await
        });
    }

    // =========================================================================
    // Driver results
    // =========================================================================

    fn handle_event(&mut self, event: DeviceEvent) {
        if event.generation != self.binding.generation() {
            trace!(
                "Dropping stale {} result (binding #{}, current #{})",
                event.kind.name(),
                event.generation,
                self.binding.generation()
            );
            return;
        }

        match event.kind {
            DeviceEventKind::Discovered(Ok(ip)) => {
                info!("✅ Yamaha receiver found at {}", ip);
                self.binding.set_ip(ip);
                self.report_status();
                self.fetch_enrichment();
                self.poll_status();
            }
            DeviceEventKind::Discovered(Err(e)) => {
                warn!("❌ Receiver discovery failed: {}", e);
                self.binding.clear();
                self.status.set_status(STATUS_SETUP_FAILED, true);
            }
            DeviceEventKind::DeviceInfo(Ok(info)) => {
                debug!("Receiver model: {}", info.model_name);
                self.binding.set_name(info.model_name.clone());
                if self.settings.write().apply_model_name(&info.model_name) {
                    info!("📝 Device name set to 'Yamaha {}'", info.model_name);
                }
                self.report_status();
            }
            DeviceEventKind::DeviceInfo(Err(e)) => {
                debug!("Device info unavailable (ignored): {}", e);
            }
            DeviceEventKind::Features(Ok(features)) => {
                let ids = features.input_ids();
                if self.settings.write().apply_input_ids(&ids) {
                    debug!("Input list updated from receiver: {:?}", ids);
                }
                self.report_status();
            }
            DeviceEventKind::Features(Err(e)) => {
                debug!("Feature list unavailable (ignored): {}", e);
            }
            DeviceEventKind::Status(result) => {
                self.poll_in_flight = false;
                self.apply_poll(result);
            }
        }
    }

    /// Best-effort device info and feature fetches after discovery
    fn fetch_enrichment(&self) {
        let Some(driver) = self.binding.driver() else {
            return;
        };
        let generation = self.binding.generation();

        self.spawn_call(generation, driver.clone(), |driver| async move {
            DeviceEventKind::DeviceInfo(driver.get_device_info().await)
        });
        self.spawn_call(generation, driver, |driver| async move {
            DeviceEventKind::Features(driver.get_features().await)
        });
    }

    fn apply_poll(&mut self, result: Result<ReceiverStatus, DriverError>) {
        match result {
            Ok(status) => {
                if self.debounce.is_pending() {
                    trace!("Volume write pending, polled state not applied");
                    return;
                }
                self.exposed.apply_status(&status);
                self.push_volume(VolumeUpdate {
                    value: Some(self.exposed.volume),
                    is_muted: Some(self.exposed.is_muted),
                });
                self.push_source(self.exposed.source);
                self.report_status();
            }
            Err(e) => {
                warn!("❌ Receiver status poll failed: {}", e);
                self.binding.clear();
                self.status.set_status(STATUS_CHECK_FAILED, true);
            }
        }
    }

    // =========================================================================
    // Hub commands
    // =========================================================================

    /// Returns false when the loop should stop
    fn handle_command(&mut self, command: LoopCommand) -> bool {
        match command {
            LoopCommand::SetVolume { mode, value, reply } => {
                let _ = reply.send(self.set_volume(mode, value));
            }
            LoopCommand::SetMute { muted, reply } => {
                let _ = reply.send(self.set_mute(muted));
            }
            LoopCommand::ConvenienceSwitch { reply } => {
                let _ = reply.send(self.convenience_switch());
            }
            LoopCommand::Standby { reply } => {
                let _ = reply.send(self.standby());
            }
            LoopCommand::Rebind => {
                info!("🔄 Rebinding receiver");
                self.bind();
            }
            LoopCommand::Shutdown { done } => {
                self.stop();
                let _ = done.send(());
                return false;
            }
        }
        true
    }

    fn set_volume(&mut self, mode: VolumeMode, value: i32) -> CommandOutcome {
        let Some(target) = self.exposed.volume_target(mode, value) else {
            debug!("Relative volume change ignored: receiver volume not known yet");
            return CommandOutcome::Success;
        };
        self.exposed.set_volume(target);
        self.push_volume(VolumeUpdate {
            value: Some(target),
            is_muted: None,
        });

        if self.debounce.schedule(target, Instant::now()) {
            trace!("Pending volume write superseded by {} dB", target);
        }
        CommandOutcome::Success
    }

    fn set_mute(&mut self, muted: bool) -> CommandOutcome {
        let Some(driver) = self.binding.driver() else {
            return CommandOutcome::Failure(NOT_CONNECTED.to_string());
        };

        self.exposed.is_muted = muted;
        self.push_volume(VolumeUpdate {
            value: None,
            is_muted: Some(muted),
        });
        spawn_write("mute", driver, move |driver| async move { driver.mute(muted).await });
        CommandOutcome::Success
    }

    fn convenience_switch(&mut self) -> CommandOutcome {
        let Some(driver) = self.binding.driver() else {
            return CommandOutcome::Failure(NOT_CONNECTED.to_string());
        };

        let input = self.settings.read().input.clone();
        self.exposed.source = SourceStatus::Selected;
        self.push_source(SourceStatus::Selected);
        spawn_write("convenience switch", driver, move |driver| async move {
            driver.power(Power::On).await?;
            driver.set_input(&input).await
        });
        CommandOutcome::Success
    }

    fn standby(&mut self) -> CommandOutcome {
        let Some(driver) = self.binding.driver() else {
            return CommandOutcome::Failure(NOT_CONNECTED.to_string());
        };

        let (power, status) = match self.exposed.source {
            SourceStatus::Selected => (Power::Standby, SourceStatus::Standby),
            SourceStatus::Standby => (Power::On, SourceStatus::Selected),
        };
        self.exposed.source = status;
        self.push_source(status);
        spawn_write("power", driver, move |driver| async move { driver.power(power).await });
        CommandOutcome::Success
    }

    // =========================================================================
    // Surfaces and status
    // =========================================================================

    fn register_surfaces(&mut self) {
        let display_name = self.settings.read().device_name.clone();
        let volume = self
            .hub
            .register_volume(self.exposed.volume_surface(&display_name));
        let source = self
            .hub
            .register_source(self.exposed.source_surface(&display_name));
        self.surfaces = Some(Surfaces { volume, source });
    }

    fn teardown_surfaces(&mut self) {
        if let Some(surfaces) = self.surfaces.take() {
            self.hub.destroy(surfaces.volume);
            self.hub.destroy(surfaces.source);
        }
    }

    fn push_volume(&self, update: VolumeUpdate) {
        if let Some(surfaces) = &self.surfaces {
            self.hub.update_volume(surfaces.volume, update);
        }
    }

    fn push_source(&self, status: SourceStatus) {
        if let Some(surfaces) = &self.surfaces {
            self.hub.update_source(surfaces.source, SourceUpdate { status });
        }
    }

    fn report_status(&self) {
        let (text, is_error) = self.binding.status_line();
        self.status.set_status(&text, is_error);
    }

    fn stop(&mut self) {
        if let Some(target) = self.debounce.cancel() {
            debug!("Pending volume write to {} dB discarded on shutdown", target);
        }
        self.teardown_surfaces();
    }

    fn spawn_call<F, Fut>(&self, generation: u64, driver: Arc<dyn ReceiverDriver>, call: F)
    where
        F: FnOnce(Arc<dyn ReceiverDriver>) -> Fut + Send + 'static,
        Fut: Future<Output = DeviceEventKind> + Send + 'static,
    {
        let events = self.event_tx.clone();
        tokio::spawn(async move {
            let kind = call(driver).await;
            let _ = events.send(DeviceEvent { generation, kind });
        });
    }
}

/// Run a device write in the background; the outcome is only logged
fn spawn_write<F, Fut>(action: &'static str, driver: Arc<dyn ReceiverDriver>, write: F)
where
    F: FnOnce(Arc<dyn ReceiverDriver>) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), DriverError>> + Send + 'static,
{
    tokio::spawn(async move {
        match write(driver).await {
            Ok(()) => trace!("Receiver accepted {}", action),
            Err(e) => warn!("⚠️  Receiver {} failed: {}", action, e),
        }
    });
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
