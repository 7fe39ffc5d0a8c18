//! Collection sessions.
//!
//! A [`Session`] is one run over an ordered list of locations. At each
//! location the worker measures all three probes and appends a [`Sample`] when
//! throughput and ping both succeeded. Stopping is cooperative: the stop flag
//! is checked before every location and while waiting between locations.
//!
//! [`CollectionController`] owns at most one session at a time and runs it on
//! a background thread.
//!
//! ```text
//!            start()                      last location done
//!   IDLE ─────────────────> RUNNING ───────────────────────────> IDLE
//!    ^                         │
//!    │     worker observes     │ stop()
//!    └──────── the flag ───── STOPPING
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::model::{Location, Sample, local_now};
use crate::runs::{RunsExhausted, next_run_number};
use crate::sensors::SensorSuite;
use crate::store::SampleStore;

/// Granularity of the interruptible wait between locations.
const WAIT_SLICE: Duration = Duration::from_millis(25);

/// Session loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionConfig {
    /// Pause between two consecutive locations.
    pub location_delay: Duration,
    /// Upper bound a caller should wait for a stopped worker to exit.
    pub stop_timeout: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            location_delay: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One run over an ordered list of locations.
#[derive(Debug)]
pub struct Session {
    run_no: u32,
    locations: Vec<Location>,
    stop: Arc<AtomicBool>,
}

impl Session {
    pub fn new(run_no: u32, locations: Vec<Location>) -> Self {
        Self {
            run_no,
            locations,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn run_no(&self) -> u32 {
        self.run_no
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }

    /// Ask the worker to halt at the next location boundary.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Shared handle on the stop flag, e.g. for a signal handler.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }
}

/// Why a location produced no sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InvalidLocation,
    /// Throughput or ping failed; carries the sensor errors.
    SensorsUnavailable(String),
    WriteFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidLocation => write!(f, "invalid location"),
            Self::SensorsUnavailable(detail) => write!(f, "sensors unavailable: {detail}"),
            Self::WriteFailed(detail) => write!(f, "write failed: {detail}"),
        }
    }
}

/// Outcome of one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub run_no: u32,
    /// Locations with a persisted sample, in visit order.
    pub written: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    /// The stop flag cut the run short.
    pub interrupted: bool,
}

/// Visit every location of `session` in order, persisting one sample each.
///
/// Blocks until the last location is done or the stop flag is observed.
/// Sensor and store failures are logged and recorded in the report; they
/// never end the run.
pub fn run_session(
    session: &Session,
    sensors: &SensorSuite,
    store: &dyn SampleStore,
    delay: Duration,
) -> SessionReport {
    let run_no = session.run_no;
    let mut report = SessionReport {
        run_no,
        ..SessionReport::default()
    };
    info!(
        "run {run_no}: collecting at {} location(s)",
        session.locations.len()
    );

    for (i, location) in session.locations.iter().enumerate() {
        if i > 0 && !wait_unless_stopped(&session.stop, delay) {
            report.interrupted = true;
            break;
        }
        if session.stop_requested() {
            report.interrupted = true;
            break;
        }

        if !location.is_valid() {
            warn!("run {run_no}: invalid location {location:?}, skipping");
            report
                .skipped
                .push((location.name.clone(), SkipReason::InvalidLocation));
            continue;
        }

        let measurement = sensors.measure();
        let (throughput, ping) = match (measurement.throughput, measurement.ping) {
            (Ok(throughput), Ok(ping)) => (throughput, ping),
            (throughput, ping) => {
                let detail = [throughput.err(), ping.err()]
                    .into_iter()
                    .flatten()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; ");
                warn!("run {run_no}: no sample for {}: {detail}", location.name);
                report
                    .skipped
                    .push((location.name.clone(), SkipReason::SensorsUnavailable(detail)));
                continue;
            }
        };

        let sample = Sample::assemble(
            run_no,
            location.clone(),
            local_now(),
            throughput,
            ping,
            measurement.signal.ok(),
        );
        match store.append(&sample) {
            Ok(()) => {
                info!(
                    "run {run_no}: saved {} (down {:.2} Mbps, up {:.2} Mbps, {:.0} ms)",
                    location.name, throughput.download_mbps, throughput.upload_mbps, ping.latency_ms
                );
                report.written.push(location.name.clone());
            }
            Err(e) => {
                error!("run {run_no}: failed to save {}: {e}", location.name);
                report
                    .skipped
                    .push((location.name.clone(), SkipReason::WriteFailed(e.to_string())));
            }
        }
    }

    if report.interrupted {
        info!("run {run_no}: stopped after {} sample(s)", report.written.len());
    } else {
        info!("run {run_no}: finished with {} sample(s)", report.written.len());
    }
    report
}

/// Sleep for `delay` in short slices. Returns `false` as soon as `stop` is set.
fn wait_unless_stopped(stop: &AtomicBool, delay: Duration) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        thread::sleep(WAIT_SLICE.min(deadline - now));
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// Result of [`CollectionController::start`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartStatus {
    Started { run_no: u32 },
    /// A session is active; nothing changed.
    AlreadyRunning { run_no: u32 },
    /// The worker thread could not be spawned.
    Failed { message: String },
}

impl StartStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::AlreadyRunning { .. } => "already running",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn run_no(&self) -> Option<u32> {
        match self {
            Self::Started { run_no } | Self::AlreadyRunning { run_no } => Some(*run_no),
            Self::Failed { .. } => None,
        }
    }
}

impl fmt::Display for StartStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { run_no } => write!(f, "Data collection started (run {run_no})"),
            Self::AlreadyRunning { run_no } => {
                write!(f, "Data collection already running (run {run_no})")
            }
            Self::Failed { message } => write!(f, "Data collection failed to start: {message}"),
        }
    }
}

/// Result of [`CollectionController::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopStatus {
    Stopped { run_no: u32 },
    NothingToStop,
}

impl StopStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Stopped { .. } => "stopped",
            Self::NothingToStop => "nothing to stop",
        }
    }

    pub fn run_no(&self) -> Option<u32> {
        match self {
            Self::Stopped { run_no } => Some(*run_no),
            Self::NothingToStop => None,
        }
    }
}

impl fmt::Display for StopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped { run_no } => write!(f, "Data collection stopped (run {run_no})"),
            Self::NothingToStop => write!(f, "No data collection in progress"),
        }
    }
}

#[derive(Default)]
struct Active {
    session: Option<Arc<Session>>,
    worker: Option<JoinHandle<SessionReport>>,
    /// Highest run number handed out by this controller.
    last_run: u32,
    last_report: Option<SessionReport>,
}

/// Clears the running flag when the worker exits, panicking or not.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Start/stop/status front end over a single background worker.
pub struct CollectionController {
    store: Arc<dyn SampleStore>,
    sensors: Arc<SensorSuite>,
    config: CollectionConfig,
    running: Arc<AtomicBool>,
    inner: Mutex<Active>,
}

impl CollectionController {
    pub fn new(
        store: Arc<dyn SampleStore>,
        sensors: Arc<SensorSuite>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            store,
            sensors,
            config,
            running: Arc::new(AtomicBool::new(false)),
            inner: Mutex::new(Active::default()),
        }
    }

    pub fn store(&self) -> &Arc<dyn SampleStore> {
        &self.store
    }

    pub fn sensors(&self) -> &SensorSuite {
        &self.sensors
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Active> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin a new run over `locations` unless one is already active.
    pub fn start(&self, locations: Vec<Location>) -> StartStatus {
        if self.running.load(Ordering::SeqCst) {
            return already_running(&self.lock());
        }
        // Scanned before locking so status readers never wait on store I/O.
        let from_store = next_run_number(self.store.as_ref());

        let mut active = self.lock();
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return already_running(&active);
        }
        reap(&mut active);

        let last_run = active.last_run;
        let run_no = from_store.and_then(|n| {
            let after_last = last_run.checked_add(1).ok_or(RunsExhausted {
                highest: u64::from(last_run),
            })?;
            Ok(n.max(after_last))
        });
        let run_no = match run_no {
            Ok(n) => n,
            Err(e) => {
                self.running.store(false, Ordering::SeqCst);
                error!("cannot start a run: {e}");
                return StartStatus::Failed {
                    message: e.to_string(),
                };
            }
        };
        let session = Arc::new(Session::new(run_no, locations));

        let spawned = {
            let session = Arc::clone(&session);
            let sensors = Arc::clone(&self.sensors);
            let store = Arc::clone(&self.store);
            let guard = RunningGuard(Arc::clone(&self.running));
            let delay = self.config.location_delay;
            thread::Builder::new()
                .name(format!("wifimon-run-{run_no}"))
                .spawn(move || {
                    let _guard = guard;
                    run_session(&session, &sensors, store.as_ref(), delay)
                })
        };

        match spawned {
            Ok(handle) => {
                active.session = Some(session);
                active.worker = Some(handle);
                active.last_run = run_no;
                StartStatus::Started { run_no }
            }
            Err(e) => {
                // The closure (and its guard) was dropped, so the flag is clear again.
                error!("could not spawn collection worker: {e}");
                StartStatus::Failed {
                    message: e.to_string(),
                }
            }
        }
    }

    /// Request a cooperative stop. Does not wait for the worker.
    pub fn stop(&self) -> StopStatus {
        let active = self.lock();
        match &active.session {
            Some(session) if self.running.load(Ordering::SeqCst) => {
                session.request_stop();
                info!("stop requested for run {}", session.run_no);
                StopStatus::Stopped {
                    run_no: session.run_no,
                }
            }
            _ => StopStatus::NothingToStop,
        }
    }

    /// [`stop`](Self::stop), then wait up to `timeout` for the worker to exit.
    /// The flag is `true` when no worker is left running.
    pub fn stop_and_wait(&self, timeout: Duration) -> (StopStatus, bool) {
        let status = self.stop();
        let deadline = Instant::now() + timeout;
        while self.running.load(Ordering::SeqCst) {
            if Instant::now() >= deadline {
                warn!(
                    "collection worker still busy after {}s; it will stop at the next location",
                    timeout.as_secs()
                );
                return (status, false);
            }
            thread::sleep(Duration::from_millis(10));
        }
        reap(&mut self.lock());
        (status, true)
    }

    pub fn status(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run number of the active session, if any.
    pub fn current_run(&self) -> Option<u32> {
        if !self.status() {
            return None;
        }
        self.lock().session.as_ref().map(|s| s.run_no)
    }

    /// Block until the current worker exits and return its report.
    ///
    /// Returns the previous report when no worker is pending, and `None` if
    /// nothing has run yet or the worker panicked.
    pub fn wait(&self) -> Option<SessionReport> {
        let handle = self.lock().worker.take();
        let Some(handle) = handle else {
            return self.last_report();
        };
        match handle.join() {
            Ok(report) => {
                self.lock().last_report = Some(report.clone());
                Some(report)
            }
            Err(_) => {
                error!("collection worker panicked");
                None
            }
        }
    }

    /// Report of the most recent finished session.
    pub fn last_report(&self) -> Option<SessionReport> {
        let mut active = self.lock();
        if !self.running.load(Ordering::SeqCst) {
            reap(&mut active);
        }
        active.last_report.clone()
    }
}

fn already_running(active: &Active) -> StartStatus {
    let run_no = active
        .session
        .as_ref()
        .map_or(active.last_run, |s| s.run_no);
    info!("start ignored: run {run_no} is still collecting");
    StartStatus::AlreadyRunning { run_no }
}

/// Collect the report of a worker whose running guard has already dropped.
fn reap(active: &mut Active) {
    if let Some(handle) = active.worker.take() {
        match handle.join() {
            Ok(report) => active.last_report = Some(report),
            Err(_) => error!("collection worker panicked"),
        }
    }
}

impl Drop for CollectionController {
    fn drop(&mut self) {
        if let Some(session) = &self.lock().session {
            session.request_stop();
        }
    }
}
