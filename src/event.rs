use anyhow::{Context, Error, Result};
use std::{
    collections::HashMap,
    fs::File,
    io::{self, Read, Seek, SeekFrom},
    os::unix::io::AsRawFd,
    path::Path,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::sysfs;

/// Upper bound on a single `poll(2)` in a detector thread, so it notices a stop
/// request promptly.
const POLL_SLICE: Duration = Duration::from_millis(100);

/// Specifies which signal transitions are reported as events.
///
/// * `NONE` - No edge detection
/// * `RISING` - LOW to HIGH transitions
/// * `FALLING` - HIGH to LOW transitions
/// * `BOTH` - Any transition
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Edge {
    NONE,
    RISING,
    FALLING,
    BOTH,
}

impl Edge {
    /// The value sysfs expects in a GPIO's `edge` attribute.
    pub fn to_str(&self) -> &str {
        match self {
            Edge::NONE => "none",
            Edge::RISING => "rising",
            Edge::FALLING => "falling",
            Edge::BOTH => "both",
        }
    }
}

/// A function run from the detector thread with the channel that saw the edge.
pub type Callback = Arc<dyn Fn(u32) + Send + Sync>;

enum PollOutcome {
    Edge,
    Timeout,
    /// Ready without an edge, as regular files always are.
    Idle,
}

fn poll_edge(file: &File, timeout: Option<Duration>) -> Result<PollOutcome> {
    let mut fds = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLPRI | libc::POLLERR,
        revents: 0,
    };
    let timeout_ms = match timeout {
        Some(d) => d.as_millis().min(i32::MAX as u128) as i32,
        None => -1,
    };

    // SAFETY: `fds` is a valid pollfd borrowed exclusively for the call, and nfds is 1.
    let n = unsafe { libc::poll(&mut fds, 1, timeout_ms) };
    if n < 0 {
        let e = io::Error::last_os_error();
        if e.kind() == io::ErrorKind::Interrupted {
            return Ok(PollOutcome::Timeout);
        }
        return Err(Error::new(e).context("poll on GPIO value failed"));
    }

    if n == 0 {
        Ok(PollOutcome::Timeout)
    } else if fds.revents & libc::POLLPRI != 0 {
        Ok(PollOutcome::Edge)
    } else {
        Ok(PollOutcome::Idle)
    }
}

/// Opens a GPIO `value` file and consumes its current state so the next
/// `poll` only reports new edges.
fn open_value(path: &Path) -> Result<File> {
    let mut file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    rearm(&mut file)?;
    Ok(file)
}

fn rearm(file: &mut File) -> Result<()> {
    let mut buf = String::new();
    file.seek(SeekFrom::Start(0))?;
    file.read_to_string(&mut buf)?;
    Ok(())
}

struct Detector {
    stop: Arc<AtomicBool>,
    detected: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
    handle: Option<JoinHandle<()>>,
}

/// Decides which edges count and reports them: debounce, the "detected" flag
/// and callback dispatch.
struct EdgeDispatch {
    channel: u32,
    bouncetime: Option<Duration>,
    last_edge: Option<Instant>,
    detected: Arc<AtomicBool>,
    callbacks: Arc<Mutex<Vec<Callback>>>,
}

impl EdgeDispatch {
    /// Handles an edge seen at `now`. Returns `false` if it fell inside the
    /// bounce window of the last accepted edge and was dropped.
    fn on_edge(&mut self, now: Instant) -> bool {
        if let (Some(bounce), Some(last)) = (self.bouncetime, self.last_edge) {
            if now.duration_since(last) < bounce {
                return false;
            }
        }
        self.last_edge = Some(now);

        self.detected.store(true, Ordering::Release);
        let callbacks = self
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for callback in callbacks {
            callback(self.channel);
        }

        true
    }
}

struct Watch {
    gpio: u32,
    file: File,
    stop: Arc<AtomicBool>,
    dispatch: EdgeDispatch,
}

impl Watch {
    fn run(mut self) -> Result<()> {
        while !self.stop.load(Ordering::Acquire) {
            match poll_edge(&self.file, Some(POLL_SLICE))? {
                PollOutcome::Timeout => continue,
                PollOutcome::Idle => {
                    thread::sleep(POLL_SLICE);
                    continue;
                }
                PollOutcome::Edge => {}
            }

            rearm(&mut self.file)?;
            self.dispatch.on_edge(Instant::now());
        }

        debug!("edge detection on gpio{} stopped", self.gpio);
        Ok(())
    }
}

/// Tracks the edge detection threads of one [`GPIO`](crate::GPIO) instance,
/// keyed by Linux GPIO number.
#[derive(Default)]
pub struct EventRegistry {
    detectors: HashMap<u32, Detector>,
}

impl EventRegistry {
    pub fn new() -> Self {
        EventRegistry::default()
    }

    pub fn is_detecting(&self, gpio: u32) -> bool {
        self.detectors.contains_key(&gpio)
    }

    /// Blocks until `edge` occurs on `gpio` or `timeout` expires. Returns
    /// `None` on timeout; `None` as the timeout waits forever.
    pub fn blocking_wait_for_edge(
        &self,
        config: &Config,
        gpio: u32,
        edge: Edge,
        timeout: Option<Duration>,
    ) -> Result<Option<()>> {
        if self.is_detecting(gpio) {
            return Err(Error::msg(format!(
                "Conflicting edge detection already enabled for gpio{}",
                gpio
            )));
        }

        sysfs::edge(config, gpio, edge)?;
        let file = open_value(&config.gpio_dir(gpio).join("value"))?;

        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let remaining = deadline.map(|d| d.saturating_duration_since(Instant::now()));
            match poll_edge(&file, remaining)? {
                PollOutcome::Edge => return Ok(Some(())),
                PollOutcome::Timeout | PollOutcome::Idle => {
                    if remaining.map_or(false, |r| r.is_zero()) {
                        return Ok(None);
                    }
                    // regular files never block, so back off instead of spinning
                    thread::sleep(remaining.map_or(POLL_SLICE, |r| r.min(POLL_SLICE)));
                }
            }
        }
    }

    /// Starts a background thread that watches `gpio` for `edge`.
    ///
    /// `channel` is what callbacks receive. With a `bouncetime`, edges closer
    /// than that to the last accepted edge are dropped.
    pub fn add_edge_detect(
        &mut self,
        config: &Config,
        gpio: u32,
        channel: u32,
        edge: Edge,
        callback: Option<Callback>,
        bouncetime: Option<Duration>,
    ) -> Result<()> {
        if self.is_detecting(gpio) {
            return Err(Error::msg(format!(
                "Edge detection already enabled for gpio{}",
                gpio
            )));
        }

        sysfs::edge(config, gpio, edge)?;
        let file = open_value(&config.gpio_dir(gpio).join("value"))?;

        let stop = Arc::new(AtomicBool::new(false));
        let detected = Arc::new(AtomicBool::new(false));
        let callbacks = Arc::new(Mutex::new(callback.into_iter().collect::<Vec<_>>()));

        let watch = Watch {
            gpio,
            file,
            stop: stop.clone(),
            dispatch: EdgeDispatch {
                channel,
                bouncetime,
                last_edge: None,
                detected: detected.clone(),
                callbacks: callbacks.clone(),
            },
        };
        let handle = thread::Builder::new()
            .name(format!("gpio{}-edge", gpio))
            .spawn(move || {
                if let Err(e) = watch.run() {
                    error!("edge detection on gpio{} failed: {:#}", gpio, e);
                }
            })
            .context("Failed to spawn edge detection thread")?;

        debug!("edge detection on gpio{} started ({})", gpio, edge.to_str());
        self.detectors.insert(
            gpio,
            Detector {
                stop,
                detected,
                callbacks,
                handle: Some(handle),
            },
        );

        Ok(())
    }

    /// Registers another callback on a GPIO that already has edge detection.
    pub fn add_edge_callback(&mut self, gpio: u32, callback: Callback) -> Result<()> {
        let detector = self.detectors.get(&gpio).ok_or_else(|| {
            Error::msg(format!(
                "Add event detection using add_event_detect first before adding a callback (gpio{})",
                gpio
            ))
        })?;

        detector
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(callback);
        Ok(())
    }

    /// Returns whether an edge occurred since the last call, clearing the flag.
    pub fn edge_detected(&self, gpio: u32) -> bool {
        match self.detectors.get(&gpio) {
            Some(detector) => detector.detected.swap(false, Ordering::AcqRel),
            None => false,
        }
    }

    pub fn remove_edge_detect(&mut self, config: &Config, gpio: u32) -> Result<()> {
        let mut detector = self.detectors.remove(&gpio).ok_or_else(|| {
            Error::msg(format!("No edge detection enabled for gpio{}", gpio))
        })?;

        detector.stop.store(true, Ordering::Release);
        if let Some(handle) = detector.handle.take() {
            if handle.join().is_err() {
                warn!("edge detection thread for gpio{} panicked", gpio);
            }
        }

        sysfs::edge(config, gpio, Edge::NONE)
    }

    /// Stops edge detection on `gpio` if it is running.
    pub fn cleanup(&mut self, config: &Config, gpio: u32) -> Result<()> {
        if self.is_detecting(gpio) {
            self.remove_edge_detect(config, gpio)?;
        }

        Ok(())
    }
}
