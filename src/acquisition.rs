//! Timer-driven acquisition.
//!
//! An [`Acquisition`] polls every enabled channel once per tick, in ascending
//! channel order, and broadcasts one [`Sample`] per successful reading.
//!
//! ## Tick semantics
//!
//! - A channel whose mode cannot be recognized is skipped for this tick.
//! - Any other error ends the tick immediately and requests a stop; later
//!   channels are not queried.
//! - If at least one sample went out, the sweep counter advances by one.
//! - Every tick that did not fail checks the sample/time limits, so a run of
//!   skipped ticks still ends on its time limit.
//!
//! A stop request (see [`StopHandle`]) is honored between ticks, including one
//! made before [`Acquisition::run`] starts; an exchange already in flight
//! always completes. The request is cleared when the run stops.

use crate::controller::ScpiDmm;
use crate::error::{DmmError, DmmResult};
use crate::limits::SAMPLE_CHANNEL_CAPACITY;
use crate::measurement::Reading;
use crate::transport::ScpiTransport;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// A measurement channel of the meter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    /// Device channel index
    pub index: usize,
    /// Display name
    pub name: String,
    /// Disabled channels are not polled
    pub enabled: bool,
}

impl Channel {
    /// Enabled channel.
    pub fn new(index: usize, name: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            enabled: true,
        }
    }

    /// Builder-style enable switch.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// `count` enabled channels named `P1`, `P2`, ...
    pub fn defaults(count: usize) -> Vec<Channel> {
        (0..count)
            .map(|index| Channel::new(index, format!("P{}", index + 1)))
            .collect()
    }
}

/// A reading tagged with the channel it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Device channel index
    pub channel: usize,
    /// Channel name
    pub channel_name: String,
    /// The reading
    #[serde(flatten)]
    pub reading: Reading,
}

/// Software sample and time limits.
#[derive(Debug, Clone, Default)]
pub struct SwLimits {
    limit_samples: Option<u64>,
    limit_time: Option<Duration>,
    samples_read: u64,
    started_at: Option<Instant>,
}

impl SwLimits {
    /// Limits; `None` disables either one.
    pub fn new(limit_samples: Option<u64>, limit_time: Option<Duration>) -> Self {
        Self {
            limit_samples,
            limit_time,
            ..Self::default()
        }
    }

    /// Reset counters and start the clock.
    pub fn start(&mut self) {
        self.samples_read = 0;
        self.started_at = Some(Instant::now());
    }

    /// Count completed sweeps.
    pub fn update_samples_read(&mut self, count: u64) {
        self.samples_read += count;
    }

    /// Sweeps counted since [`start`](Self::start).
    pub fn samples_read(&self) -> u64 {
        self.samples_read
    }

    /// Whether either limit has been reached.
    pub fn reached(&self) -> bool {
        if let Some(limit) = self.limit_samples {
            if self.samples_read >= limit {
                debug!(samples = self.samples_read, "Sample limit reached");
                return true;
            }
        }
        if let (Some(limit), Some(started)) = (self.limit_time, self.started_at) {
            if started.elapsed() >= limit {
                debug!(elapsed = ?started.elapsed(), "Time limit reached");
                return true;
            }
        }
        false
    }
}

/// Acquisition lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Not acquiring
    Idle,
    /// Ticking
    Polling,
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A [`StopHandle`] asked for it
    Requested,
    /// Sample or time limit reached
    LimitReached,
    /// No one is subscribed to samples any more
    SessionClosed,
}

/// Result of one tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// Keep polling
    Continue,
    /// Stop cleanly
    Stop(StopReason),
    /// Stop because of an error
    Fault(DmmError),
}

/// Summary of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Completed sweeps
    pub sweeps: u64,
    /// Why the run ended
    pub reason: StopReason,
}

/// Requests a running acquisition to stop.
#[derive(Debug, Clone)]
pub struct StopHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    /// Stop before the next tick.
    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }

    /// Whether a stop is pending.
    pub fn is_stop_requested(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Per-run state, created at start and dropped at stop.
#[derive(Debug)]
struct AcquisitionState {
    /// Latest reading per channel, reset every tick
    pending: Vec<Option<Reading>>,
    limits: SwLimits,
}

/// Polling acquisition over one meter.
#[derive(Debug)]
pub struct Acquisition<T> {
    dmm: ScpiDmm<T>,
    channels: Vec<Channel>,
    poll_interval: Duration,
    limits: SwLimits,
    state: RunState,
    run: Option<AcquisitionState>,
    samples: broadcast::Sender<Sample>,
    stop_tx: Arc<watch::Sender<bool>>,
    stop_rx: watch::Receiver<bool>,
}

impl<T: ScpiTransport> Acquisition<T> {
    /// Poll `channels` of `dmm` every `poll_interval`.
    pub fn new(dmm: ScpiDmm<T>, mut channels: Vec<Channel>, poll_interval: Duration) -> Self {
        channels.sort_by_key(|c| c.index);
        let (samples, _) = broadcast::channel(SAMPLE_CHANNEL_CAPACITY);
        let (stop_tx, stop_rx) = watch::channel(false);
        Self {
            dmm,
            channels,
            poll_interval,
            limits: SwLimits::default(),
            state: RunState::Idle,
            run: None,
            samples,
            stop_tx: Arc::new(stop_tx),
            stop_rx,
        }
    }

    /// Sample/time limits applied to each run.
    pub fn with_limits(mut self, limits: SwLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Receive samples.
    pub fn subscribe(&self) -> broadcast::Receiver<Sample> {
        self.samples.subscribe()
    }

    /// Handle for stopping the run from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            tx: Arc::clone(&self.stop_tx),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Channels in polling order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The meter.
    pub fn dmm(&self) -> &ScpiDmm<T> {
        &self.dmm
    }

    /// The meter, mutably.
    pub fn dmm_mut(&mut self) -> &mut ScpiDmm<T> {
        &mut self.dmm
    }

    /// Release the meter.
    pub fn into_dmm(self) -> ScpiDmm<T> {
        self.dmm
    }

    /// Readings of the last tick, one slot per channel in polling order.
    pub fn last_sweep(&self) -> Option<&[Option<Reading>]> {
        self.run.as_ref().map(|run| run.pending.as_slice())
    }

    /// Sweeps completed in the current run.
    pub fn sweeps(&self) -> u64 {
        self.run.as_ref().map_or(0, |run| run.limits.samples_read())
    }

    /// Enter the polling state.
    pub async fn start(&mut self) -> DmmResult<()> {
        if self.state == RunState::Polling {
            return Err(DmmError::InvalidArgument(
                "acquisition already running".to_string(),
            ));
        }
        self.dmm.start_acquisition().await?;

        let mut limits = self.limits.clone();
        limits.start();
        self.run = Some(AcquisitionState {
            pending: vec![None; self.channels.len()],
            limits,
        });
        self.state = RunState::Polling;
        info!(
            model = %self.dmm.profile().display_name(),
            channels = self.channels.len(),
            "Acquisition started"
        );
        Ok(())
    }

    /// Poll every enabled channel once.
    #[instrument(skip_all)]
    pub async fn tick(&mut self) -> TickOutcome {
        let Self {
            dmm,
            channels,
            run,
            samples,
            stop_tx,
            ..
        } = self;
        let Some(run) = run.as_mut() else {
            return TickOutcome::Fault(DmmError::InvalidArgument(
                "acquisition is not running".to_string(),
            ));
        };

        run.pending.iter_mut().for_each(|slot| *slot = None);
        let mut emitted = 0usize;
        let mut outcome = TickOutcome::Continue;

        for (slot, channel) in run.pending.iter_mut().zip(channels.iter()) {
            if !channel.enabled {
                continue;
            }
            match dmm.measure(channel.index).await {
                Ok(None) => debug!(channel = %channel.name, "No sample this tick"),
                Ok(Some(reading)) => {
                    *slot = Some(reading.clone());
                    let sample = Sample {
                        channel: channel.index,
                        channel_name: channel.name.clone(),
                        reading,
                    };
                    if samples.send(sample).is_err() {
                        warn!("No active receivers, stopping acquisition");
                        outcome = TickOutcome::Stop(StopReason::SessionClosed);
                        break;
                    }
                    emitted += 1;
                }
                Err(e) => {
                    error!(
                        channel = %channel.name,
                        class = ?e.class(),
                        error = %e,
                        "Measurement failed"
                    );
                    outcome = TickOutcome::Fault(e);
                    break;
                }
            }
        }

        if emitted > 0 {
            run.limits.update_samples_read(1);
        }
        if matches!(outcome, TickOutcome::Continue) && run.limits.reached() {
            outcome = TickOutcome::Stop(StopReason::LimitReached);
        }

        if !matches!(outcome, TickOutcome::Continue) {
            stop_tx.send_replace(true);
        }
        outcome
    }

    /// Leave the polling state, sending the model's stop command.
    ///
    /// Returns the number of completed sweeps.
    pub async fn stop(&mut self) -> u64 {
        let sweeps = self.sweeps();
        if self.state == RunState::Polling {
            if let Err(e) = self.dmm.stop_acquisition().await {
                warn!(error = %e, "Failed to send stop command");
            }
        }
        self.run = None;
        self.state = RunState::Idle;
        self.stop_tx.send_replace(false);
        self.stop_rx.borrow_and_update();
        info!(sweeps, "Acquisition stopped");
        sweeps
    }

    /// Start, tick every poll interval until stopped, then stop.
    pub async fn run(&mut self) -> DmmResult<RunSummary> {
        self.start().await?;

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let result = loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop_rx.changed() => {}
            }
            if *self.stop_rx.borrow_and_update() {
                break Ok(StopReason::Requested);
            }
            match self.tick().await {
                TickOutcome::Continue => {}
                TickOutcome::Stop(reason) => break Ok(reason),
                TickOutcome::Fault(e) => break Err(e),
            }
        };

        let sweeps = self.stop().await;
        result.map(|reason| RunSummary { sweeps, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::models::AGILENT_34405A;
    use tracing_test::traced_test;

    #[test]
    fn default_channels_are_named_and_enabled() {
        let channels = Channel::defaults(2);
        assert_eq!(channels[0], Channel::new(0, "P1"));
        assert_eq!(channels[1].name, "P2");
        assert!(channels.iter().all(|c| c.enabled));
    }

    #[test]
    fn sample_limit() {
        let mut limits = SwLimits::new(Some(2), None);
        limits.start();
        assert!(!limits.reached());
        limits.update_samples_read(1);
        assert!(!limits.reached());
        limits.update_samples_read(1);
        assert!(limits.reached());
    }

    #[tokio::test(start_paused = true)]
    async fn time_limit() {
        let mut limits = SwLimits::new(None, Some(Duration::from_millis(500)));
        limits.start();
        assert!(!limits.reached());
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(limits.reached());
    }

    #[test]
    fn no_limits_never_reached() {
        let mut limits = SwLimits::default();
        limits.start();
        limits.update_samples_read(1_000);
        assert!(!limits.reached());
    }

    #[tokio::test]
    #[traced_test]
    async fn fault_is_logged_with_its_class() {
        let mut mock = MockTransport::new();
        mock.expect_send("SYST:REM")
            .expect_query("CONF?", "\"VOLT +1.00000E+01,+1.00000E-05\"")
            .expect_query("READ?", "1.0 V");
        let dmm = ScpiDmm::new(mock, &AGILENT_34405A).unwrap();
        let mut acq = Acquisition::new(dmm, Channel::defaults(1), Duration::from_millis(10));
        let _rx = acq.subscribe();

        acq.start().await.unwrap();
        assert!(matches!(
            acq.tick().await,
            TickOutcome::Fault(DmmError::DataFormat(_))
        ));
        assert!(logs_contain("Measurement failed"));
        assert!(logs_contain("class=DataFormat"));
    }
}
