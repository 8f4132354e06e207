//! Gesture recognition: orientation samples in, flip triggers out.
//!
//! A [`GestureMonitor`] attaches to a [`SensorSource`] and runs a
//! [`FlipDetector`] on its own delivery thread. The active sensitivity
//! profile is re-read on every sample, so settings changes take effect
//! without a restart.

pub mod detector;
pub mod sensitivity;

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

pub use detector::{FlipDetector, Orientation};
pub use sensitivity::{ProfileSource, SensitivityError, SensitivityProfile, Thresholds};

/// One accelerometer reading (m/s², monotonic timestamp)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationSample {
    pub timestamp_ms: u64,
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl OrientationSample {
    /// Parse a `t_ms x y z` trace line
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let timestamp_ms = parts.next()?.parse().ok()?;
        let x = parts.next()?.parse().ok()?;
        let y = parts.next()?.parse().ok()?;
        let z = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Self {
            timestamp_ms,
            x,
            y,
            z,
        })
    }
}

/// A completed flip. Produced once, consumed once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub timestamp_ms: u64,
}

/// A provider of orientation samples
pub trait SensorSource: Send + Sync {
    /// Attach and start delivering samples; `None` if no sensor is available
    fn attach(&self) -> Option<mpsc::Receiver<OrientationSample>>;
}

/// In-process sensor fed through [`ChannelSensor::feed`].
#[derive(Clone)]
pub struct ChannelSensor {
    available: bool,
    sender: Arc<Mutex<Option<mpsc::Sender<OrientationSample>>>>,
}

impl ChannelSensor {
    pub fn new() -> Self {
        Self {
            available: true,
            sender: Arc::new(Mutex::new(None)),
        }
    }

    /// A device without an orientation sensor
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Push a sample; returns false if nothing is attached
    pub fn feed(&self, sample: OrientationSample) -> bool {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(sample).is_ok(),
            None => false,
        }
    }

    /// Drop the current attachment, ending delivery
    pub fn close(&self) {
        self.sender.lock().take();
    }
}

impl Default for ChannelSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorSource for ChannelSensor {
    fn attach(&self) -> Option<mpsc::Receiver<OrientationSample>> {
        if !self.available {
            return None;
        }
        let (tx, rx) = mpsc::channel();
        *self.sender.lock() = Some(tx);
        Some(rx)
    }
}

/// Sensor replaying `t_ms x y z` lines from a reader (stdin, trace file).
///
/// The reader is consumed by the first attach.
pub struct LineSensor {
    reader: Mutex<Option<Box<dyn BufRead + Send>>>,
}

impl LineSensor {
    pub fn new(reader: impl BufRead + Send + 'static) -> Self {
        Self {
            reader: Mutex::new(Some(Box::new(reader))),
        }
    }
}

impl SensorSource for LineSensor {
    fn attach(&self) -> Option<mpsc::Receiver<OrientationSample>> {
        let reader = self.reader.lock().take()?;
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for (lineno, line) in reader.lines().enumerate() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        tracing::warn!("Sensor trace read failed: {}", e);
                        break;
                    }
                };
                let trimmed = line.trim();
                if trimmed.is_empty() || trimmed.starts_with('#') {
                    continue;
                }
                match OrientationSample::parse_line(trimmed) {
                    Some(sample) => {
                        if tx.send(sample).is_err() {
                            break;
                        }
                    }
                    None => tracing::warn!("Skipping malformed sample on line {}", lineno + 1),
                }
            }
        });

        Some(rx)
    }
}

/// Callback invoked on the delivery thread for every trigger
pub type TriggerHandler = Arc<dyn Fn(TriggerEvent) + Send + Sync>;

struct Running {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Owns the sensor attachment and the delivery thread
pub struct GestureMonitor {
    sensor: Arc<dyn SensorSource>,
    profiles: Arc<dyn ProfileSource>,
    on_trigger: TriggerHandler,
    running: Option<Running>,
}

impl GestureMonitor {
    pub fn new(
        sensor: Arc<dyn SensorSource>,
        profiles: Arc<dyn ProfileSource>,
        on_trigger: TriggerHandler,
    ) -> Self {
        Self {
            sensor,
            profiles,
            on_trigger,
            running: None,
        }
    }

    /// Attach and start detecting.
    ///
    /// Returns false when no sensor is available. Calling it while already
    /// started returns true without attaching twice.
    pub fn start(&mut self) -> bool {
        if self.running.is_some() {
            return true;
        }

        let Some(samples) = self.sensor.attach() else {
            tracing::warn!("No orientation sensor available");
            return false;
        };

        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let stop = stop.clone();
            let profiles = self.profiles.clone();
            let on_trigger = self.on_trigger.clone();
            std::thread::spawn(move || deliver(samples, profiles, on_trigger, stop))
        };

        tracing::info!("Gesture monitor started");
        self.running = Some(Running { stop, thread });
        true
    }

    /// Detach; safe to call any number of times
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop.store(true, Ordering::SeqCst);
            if running.thread.join().is_err() {
                tracing::error!("Gesture delivery thread panicked");
            }
            tracing::info!("Gesture monitor stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Block until the source runs dry (or `stop` is called elsewhere)
    pub fn join(&mut self) {
        if let Some(running) = self.running.take() {
            if running.thread.join().is_err() {
                tracing::error!("Gesture delivery thread panicked");
            }
        }
    }
}

impl Drop for GestureMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Delivery loop
fn deliver(
    samples: mpsc::Receiver<OrientationSample>,
    profiles: Arc<dyn ProfileSource>,
    on_trigger: TriggerHandler,
    stop: Arc<AtomicBool>,
) {
    let mut detector = FlipDetector::new();

    loop {
        if stop.load(Ordering::SeqCst) {
            break;
        }

        match samples.recv_timeout(Duration::from_millis(100)) {
            Ok(sample) => {
                let profile = profiles.active_profile();
                if let Some(event) = detector.on_sample(&sample, &profile) {
                    on_trigger(event);
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                tracing::debug!("Sensor source closed");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_line() {
        let s = OrientationSample::parse_line("120 0.1 -0.2 9.81").unwrap();
        assert_eq!(s.timestamp_ms, 120);
        assert_eq!(s.z, 9.81);
        assert!(OrientationSample::parse_line("120 0.1 -0.2").is_none());
        assert!(OrientationSample::parse_line("a b c d").is_none());
        assert!(OrientationSample::parse_line("1 2 3 4 5").is_none());
    }

    #[test]
    fn test_unavailable_sensor_does_not_start() {
        let mut monitor = GestureMonitor::new(
            Arc::new(ChannelSensor::unavailable()),
            Arc::new(SensitivityProfile::default()),
            Arc::new(|_| {}),
        );
        assert!(!monitor.start());
        assert!(!monitor.is_running());
        monitor.stop();
    }

    #[test]
    fn test_line_sensor_replays_trace() {
        let trace = "# flip\n0 0 0 9.8\n100 0 0 -9.8\nbad line\n300 0 0 9.8\n";
        let sensor = Arc::new(LineSensor::new(std::io::Cursor::new(trace.to_string())));
        let fired = Arc::new(Mutex::new(Vec::new()));

        let sink = fired.clone();
        let mut monitor = GestureMonitor::new(
            sensor.clone(),
            Arc::new(SensitivityProfile::default()),
            Arc::new(move |e: TriggerEvent| sink.lock().push(e.timestamp_ms)),
        );

        assert!(monitor.start());
        monitor.join();
        assert_eq!(*fired.lock(), vec![300]);

        // The trace is consumed; a second attach finds no sensor
        assert!(sensor.attach().is_none());
    }
}
