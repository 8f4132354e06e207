//! Gesture Integration Tests
//!
//! Detector timing rules and the monitor lifecycle.

use std::io::Cursor;
use std::sync::Arc;

use flipledger::gesture::{
    ChannelSensor, FlipDetector, GestureMonitor, LineSensor, OrientationSample, ProfileSource,
    SensitivityProfile, TriggerEvent, TriggerHandler,
};
use parking_lot::Mutex;

const G: f32 = 9.8;

fn sample(t: u64, z: f32) -> OrientationSample {
    OrientationSample {
        timestamp_ms: t,
        x: 0.0,
        y: 0.0,
        z,
    }
}

fn recorder() -> (TriggerHandler, Arc<Mutex<Vec<TriggerEvent>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let handler: TriggerHandler = Arc::new(move |event| sink.lock().push(event));
    (handler, seen)
}

#[test]
fn test_debounce_between_flips() {
    let profile = SensitivityProfile::standard(50).unwrap();
    let mut det = FlipDetector::new();
    let fired: Vec<u64> = [
        (0, G),
        (100, -G),
        (300, G), // fires
        (400, -G),
        (700, G), // 400 ms after the last trigger: debounced
        (900, -G),
        (1200, G), // fires
    ]
    .iter()
    .filter_map(|(t, z)| det.on_sample(&sample(*t, *z), &profile))
    .map(|e| e.timestamp_ms)
    .collect();

    assert_eq!(fired, vec![300, 1200]);
}

#[test]
fn test_window_is_strict() {
    // custom window of 200 ms: exactly 200 ms does not fire
    let profile = SensitivityProfile::custom(7.0, 200).unwrap();
    let mut det = FlipDetector::new();
    assert!(det.on_sample(&sample(0, -G), &profile).is_none());
    assert!(det.on_sample(&sample(200, G), &profile).is_none());

    let mut det = FlipDetector::new();
    det.on_sample(&sample(0, -G), &profile);
    assert!(det.on_sample(&sample(199, G), &profile).is_some());
}

#[test]
fn test_standard_mapping_is_monotonic() {
    let mut prev = SensitivityProfile::standard(0).unwrap().thresholds();
    for level in 1..=100u8 {
        let t = SensitivityProfile::standard(level).unwrap().thresholds();
        assert!(t.gravity > prev.gravity);
        assert!(t.max_duration_ms < prev.max_duration_ms);
        prev = t;
    }
    assert_eq!(prev.max_duration_ms, 300);
    assert!((prev.gravity - 9.0).abs() < 1e-4);
}

#[test]
fn test_custom_out_of_range_rejected() {
    assert!(SensitivityProfile::custom(0.5, 500).is_err());
    assert!(SensitivityProfile::custom(25.0, 500).is_err());
    assert!(SensitivityProfile::custom(8.0, 10).is_err());
    assert!(SensitivityProfile::custom(8.0, 6000).is_err());
    assert!(SensitivityProfile::custom(20.0, 5000).is_ok());
}

#[test]
fn test_monitor_from_trace() {
    let trace = "# t x y z\n0 0 0 9.8\n100 0 0 -9.8\nnot a sample\n300 0 0 9.8\n";
    let sensor = Arc::new(LineSensor::new(Cursor::new(trace.as_bytes().to_vec())));
    let profiles: Arc<dyn ProfileSource> = Arc::new(SensitivityProfile::default());
    let (handler, seen) = recorder();

    let mut monitor = GestureMonitor::new(sensor, profiles, handler);
    assert!(monitor.start());
    monitor.join();

    assert_eq!(*seen.lock(), vec![TriggerEvent { timestamp_ms: 300 }]);
}

#[test]
fn test_unavailable_sensor_and_double_stop() {
    let (handler, _) = recorder();
    let profiles: Arc<dyn ProfileSource> = Arc::new(SensitivityProfile::default());

    let mut monitor = GestureMonitor::new(Arc::new(ChannelSensor::unavailable()), profiles.clone(), handler.clone());
    assert!(!monitor.start());
    monitor.stop();

    let sensor = ChannelSensor::new();
    let mut monitor = GestureMonitor::new(Arc::new(sensor.clone()), profiles, handler);
    assert!(monitor.start());
    assert!(monitor.start());
    assert!(sensor.feed(sample(0, G)));

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
}

#[test]
fn test_channel_sensor_delivers() {
    let sensor = ChannelSensor::new();
    let (handler, seen) = recorder();
    let profiles: Arc<dyn ProfileSource> = Arc::new(SensitivityProfile::default());
    let mut monitor = GestureMonitor::new(Arc::new(sensor.clone()), profiles, handler);
    assert!(monitor.start());

    for (t, z) in [(0, G), (100, -G), (250, G)] {
        sensor.feed(sample(t, z));
    }
    sensor.close();
    monitor.join();

    assert_eq!(seen.lock().len(), 1);
    // joined monitor can be stopped without effect
    monitor.stop();
}
