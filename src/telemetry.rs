//! ==============================================================================
//! telemetry.rs - synthetic sensor telemetry
//! ==============================================================================
//!
//! purpose:
//!     produces the fake pipeline readings the dashboard charts. there is no
//!     hardware behind this: every value is drawn uniformly from its
//!     configured range and rounded to one decimal.
//!
//! structure:
//!     - TelemetryGenerator: plain state (ranges, interval, window) advanced by
//!       `step()`. no clocks, no timers; tests drive it with a seeded rng and
//!       explicit timestamps.
//!     - classify_*: pure normal/warning/critical checks against thresholds.
//!     - TelemetryFeed: the only side-effecting part. one tokio task per
//!       mounted view, ticking at that view's interval. dropping the feed
//!       aborts the task.
//!
//! relationships:
//!     - configured by: config.rs `[telemetry]`
//!     - reacts to: thresholds.rs (watch channel)
//!     - consumed by: server.rs (`/api/telemetry/stream`)
//!
//! ==============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::TelemetryConfig;
use crate::domain::{HealthStatus, Metric, MetricRange, SensorReading, ThresholdSettings};

/// share of the threshold above which a metric starts to warn
///
/// pressure warns above 150 of 200, temperature above 70 of 80. flow rate
/// has no warning band and only goes critical.
pub fn warning_fraction(metric: Metric) -> Option<f64> {
    match metric {
        Metric::Pressure => Some(0.75),
        Metric::Temperature => Some(0.875),
        Metric::FlowRate | Metric::Vibration | Metric::Humidity => None,
    }
}

/// per-metric generation ranges
///
/// camelCase on the wire like the rest of a frame; `flow_rate` is still
/// accepted so monitor.toml keeps its snake_case keys
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SensorRanges {
    pub pressure: MetricRange,
    pub temperature: MetricRange,
    #[serde(alias = "flow_rate")]
    pub flow_rate: MetricRange,
    pub vibration: MetricRange,
    pub humidity: MetricRange,
}

impl SensorRanges {
    pub fn get(&self, metric: Metric) -> MetricRange {
        match metric {
            Metric::Pressure => self.pressure,
            Metric::Temperature => self.temperature,
            Metric::FlowRate => self.flow_rate,
            Metric::Vibration => self.vibration,
            Metric::Humidity => self.humidity,
        }
    }
}

impl Default for SensorRanges {
    fn default() -> Self {
        Self {
            pressure: MetricRange::new(80.0, 120.0),
            temperature: MetricRange::new(65.0, 85.0),
            flow_rate: MetricRange::new(200.0, 300.0),
            vibration: MetricRange::new(0.5, 2.5),
            humidity: MetricRange::new(40.0, 60.0),
        }
    }
}

pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn draw<R: Rng + ?Sized>(range: MetricRange, rng: &mut R) -> f64 {
    if range.max <= range.min {
        return round1(range.min);
    }
    round1(rng.gen_range(range.min..=range.max))
}

/// one reading, every field drawn independently
pub fn generate_reading<R: Rng + ?Sized>(
    ranges: &SensorRanges,
    rng: &mut R,
    timestamp: u64,
) -> SensorReading {
    SensorReading {
        timestamp,
        pressure: draw(ranges.pressure, rng),
        temperature: draw(ranges.temperature, rng),
        flow_rate: draw(ranges.flow_rate, rng),
        vibration: draw(ranges.vibration, rng),
        humidity: draw(ranges.humidity, rng),
    }
}

/// tick interval in `[min_ms, max_ms)`
pub fn random_interval<R: Rng + ?Sized>(min_ms: u64, max_ms: u64, rng: &mut R) -> Duration {
    let ms = if max_ms > min_ms { rng.gen_range(min_ms..max_ms) } else { min_ms };
    Duration::from_millis(ms)
}

// ==============================================================================
// generator state
// ==============================================================================

#[derive(Clone, Debug)]
pub struct TelemetryGenerator {
    ranges: SensorRanges,
    capacity: usize,
    interval: Duration,
    window: VecDeque<SensorReading>,
}

impl TelemetryGenerator {
    /// new generator with an interval drawn from the configured bounds
    pub fn new<R: Rng + ?Sized>(config: &TelemetryConfig, rng: &mut R) -> Self {
        let interval = random_interval(config.min_interval_ms, config.max_interval_ms, rng);
        Self::with_interval(config.ranges, config.window_size, interval)
    }

    pub fn with_interval(ranges: SensorRanges, capacity: usize, interval: Duration) -> Self {
        let capacity = capacity.max(1);
        Self { ranges, capacity, interval, window: VecDeque::with_capacity(capacity + 1) }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn ranges(&self) -> &SensorRanges {
        &self.ranges
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// oldest first
    pub fn readings(&self) -> impl Iterator<Item = &SensorReading> {
        self.window.iter()
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.window.back()
    }

    /// fill the window so a freshly mounted chart is not empty
    ///
    /// timestamps are spaced half an interval apart, the newest at `now_ms`.
    pub fn backfill<R: Rng + ?Sized>(&mut self, rng: &mut R, now_ms: u64) {
        let spacing = self.interval.as_millis() as u64 / 2;
        self.window.clear();
        for i in 0..self.capacity {
            let age = (self.capacity - 1 - i) as u64 * spacing;
            let reading = generate_reading(&self.ranges, rng, now_ms.saturating_sub(age));
            self.window.push_back(reading);
        }
    }

    /// append one reading and drop the oldest beyond capacity
    pub fn step<R: Rng + ?Sized>(&mut self, rng: &mut R, now_ms: u64) -> SensorReading {
        let reading = generate_reading(&self.ranges, rng, now_ms);
        self.window.push_back(reading);
        while self.window.len() > self.capacity {
            self.window.pop_front();
        }
        reading
    }
}

// ==============================================================================
// classification
// ==============================================================================

/// critical above the threshold, warning above `fraction` of it
pub fn classify_value(value: f64, threshold: f64, fraction: Option<f64>) -> HealthStatus {
    if value > threshold {
        HealthStatus::Critical
    } else if fraction.is_some_and(|f| value > threshold * f) {
        HealthStatus::Warning
    } else {
        HealthStatus::Normal
    }
}

pub fn classify_metric(metric: Metric, value: f64, threshold: f64) -> HealthStatus {
    classify_value(value, threshold, warning_fraction(metric))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub pressure: HealthStatus,
    pub temperature: HealthStatus,
    pub flow_rate: HealthStatus,
    /// worst of the three
    pub overall: HealthStatus,
}

impl Assessment {
    pub fn status(&self, metric: Metric) -> Option<HealthStatus> {
        match metric {
            Metric::Pressure => Some(self.pressure),
            Metric::Temperature => Some(self.temperature),
            Metric::FlowRate => Some(self.flow_rate),
            Metric::Vibration | Metric::Humidity => None,
        }
    }
}

pub fn classify_reading(reading: &SensorReading, thresholds: &ThresholdSettings) -> Assessment {
    let pressure = classify_metric(Metric::Pressure, reading.pressure, thresholds.pressure);
    let temperature = classify_metric(Metric::Temperature, reading.temperature, thresholds.temperature);
    let flow_rate = classify_metric(Metric::FlowRate, reading.flow_rate, thresholds.flow_rate);
    Assessment {
        pressure,
        temperature,
        flow_rate,
        overall: pressure.max(temperature).max(flow_rate),
    }
}

// ==============================================================================
// frames & live feed
// ==============================================================================

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: String,
    #[serde(flatten)]
    pub reading: SensorReading,
}

/// what a mounted view renders on each update
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryFrame {
    pub interval_ms: u64,
    pub ranges: SensorRanges,
    pub thresholds: ThresholdSettings,
    pub readings: Vec<ChartPoint>,
    pub latest: Option<SensorReading>,
    pub assessment: Option<Assessment>,
}

impl TelemetryFrame {
    /// classification is recomputed from `thresholds` every time
    pub fn build(generator: &TelemetryGenerator, thresholds: ThresholdSettings) -> Self {
        let latest = generator.latest().copied();
        Self {
            interval_ms: generator.interval().as_millis() as u64,
            ranges: *generator.ranges(),
            thresholds,
            readings: generator
                .readings()
                .map(|r| ChartPoint { time: r.time_label(), reading: *r })
                .collect(),
            latest,
            assessment: latest.map(|r| classify_reading(&r, &thresholds)),
        }
    }
}

/// a running generator bound to one view
pub struct TelemetryFeed {
    frames: watch::Receiver<TelemetryFrame>,
    interval: Duration,
    task: JoinHandle<()>,
}

impl TelemetryFeed {
    pub fn spawn(config: &TelemetryConfig, thresholds: watch::Receiver<ThresholdSettings>) -> Self {
        Self::spawn_with_rng(config, thresholds, StdRng::from_entropy())
    }

    pub fn spawn_with_rng(
        config: &TelemetryConfig,
        mut thresholds: watch::Receiver<ThresholdSettings>,
        mut rng: StdRng,
    ) -> Self {
        let mut generator = TelemetryGenerator::new(config, &mut rng);
        generator.backfill(&mut rng, now_ms());
        let interval = generator.interval();

        let initial = TelemetryFrame::build(&generator, *thresholds.borrow_and_update());
        let (tx, frames) = watch::channel(initial);

        tracing::debug!(interval_ms = interval.as_millis() as u64, "[TELEMETRY] feed mounted");

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            let mut thresholds_open = true;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        generator.step(&mut rng, now_ms());
                    }
                    changed = thresholds.changed(), if thresholds_open => {
                        if changed.is_err() {
                            thresholds_open = false;
                            continue;
                        }
                    }
                }
                let frame = TelemetryFrame::build(&generator, *thresholds.borrow_and_update());
                if tx.send(frame).is_err() {
                    break;
                }
            }
        });

        Self { frames, interval, task }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn subscribe(&self) -> watch::Receiver<TelemetryFrame> {
        self.frames.clone()
    }

    pub fn current(&self) -> TelemetryFrame {
        self.frames.borrow().clone()
    }
}

impl Drop for TelemetryFeed {
    fn drop(&mut self) {
        tracing::debug!("[TELEMETRY] feed unmounted");
        self.task.abort();
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_750_000_000_000;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn reading(pressure: f64, temperature: f64, flow_rate: f64) -> SensorReading {
        SensorReading { timestamp: NOW, pressure, temperature, flow_rate, vibration: 1.0, humidity: 50.0 }
    }

    fn is_one_decimal(v: f64) -> bool {
        ((v * 10.0).round() - v * 10.0).abs() < 1e-9
    }

    #[test]
    fn test_readings_stay_in_range_with_one_decimal() {
        let ranges = SensorRanges::default();
        let mut rng = rng();
        for _ in 0..500 {
            let r = generate_reading(&ranges, &mut rng, NOW);
            for metric in Metric::ALL {
                let v = r.value(metric);
                assert!(ranges.get(metric).contains(v), "{} = {} out of range", metric, v);
                assert!(is_one_decimal(v), "{} = {} not rounded", metric, v);
            }
        }
    }

    #[test]
    fn test_frame_json_is_camel_case_throughout() {
        let mut gen = TelemetryGenerator::with_interval(SensorRanges::default(), 10, Duration::from_millis(2000));
        gen.step(&mut rng(), NOW);
        let json = serde_json::to_value(TelemetryFrame::build(&gen, ThresholdSettings::default())).unwrap();
        assert_eq!(json["ranges"]["flowRate"]["max"], 300.0);
        assert!(json["ranges"].get("flow_rate").is_none());
        assert_eq!(json["thresholds"]["flowRate"], 300.0);
        assert!(json["readings"][0].get("flowRate").is_some());
        assert!(json.get("intervalMs").is_some());

        // both spellings read back
        let snake: SensorRanges = serde_json::from_str(r#"{"flow_rate":{"min":1.0,"max":2.0}}"#).unwrap();
        let camel: SensorRanges = serde_json::from_str(r#"{"flowRate":{"min":1.0,"max":2.0}}"#).unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake.flow_rate, MetricRange::new(1.0, 2.0));
    }

    #[test]
    fn test_interval_bounds() {
        let mut rng = rng();
        for _ in 0..500 {
            let ms = random_interval(2000, 5000, &mut rng).as_millis();
            assert!((2000..5000).contains(&ms));
        }
        assert_eq!(random_interval(3000, 3000, &mut rng), Duration::from_millis(3000));
    }

    #[test]
    fn test_backfill_staggers_timestamps() {
        let mut gen = TelemetryGenerator::with_interval(SensorRanges::default(), 10, Duration::from_millis(3000));
        gen.backfill(&mut rng(), NOW);
        assert_eq!(gen.len(), 10);
        let stamps: Vec<u64> = gen.readings().map(|r| r.timestamp).collect();
        assert_eq!(stamps.first(), Some(&(NOW - 9 * 1500)));
        assert_eq!(stamps.last(), Some(&NOW));
        assert!(stamps.windows(2).all(|w| w[1] - w[0] == 1500));
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut gen = TelemetryGenerator::with_interval(SensorRanges::default(), 10, Duration::from_millis(2000));
        let mut rng = rng();
        assert!(gen.is_empty());
        for tick in 0..10u64 {
            gen.step(&mut rng, NOW + tick);
        }
        assert_eq!(gen.len(), 10);
        let stamps: Vec<u64> = gen.readings().map(|r| r.timestamp).collect();
        assert_eq!(stamps, (0..10).map(|t| NOW + t).collect::<Vec<_>>());

        for tick in 10..137u64 {
            let r = gen.step(&mut rng, NOW + tick);
            assert!(gen.len() <= 10);
            assert_eq!(gen.latest(), Some(&r));
        }
        let stamps: Vec<u64> = gen.readings().map(|r| r.timestamp).collect();
        assert_eq!(stamps, (127..137).map(|t| NOW + t).collect::<Vec<_>>());
    }

    #[test]
    fn test_classify_value_boundaries() {
        // pressure 200 -> warning above 150, critical above 200
        assert_eq!(classify_metric(Metric::Pressure, 150.0, 200.0), HealthStatus::Normal);
        assert_eq!(classify_metric(Metric::Pressure, 150.1, 200.0), HealthStatus::Warning);
        assert_eq!(classify_metric(Metric::Pressure, 200.0, 200.0), HealthStatus::Warning);
        assert_eq!(classify_metric(Metric::Pressure, 200.1, 200.0), HealthStatus::Critical);
        // temperature 80 -> warning above 70
        assert_eq!(classify_metric(Metric::Temperature, 70.0, 80.0), HealthStatus::Normal);
        assert_eq!(classify_metric(Metric::Temperature, 70.1, 80.0), HealthStatus::Warning);
        assert_eq!(classify_metric(Metric::Temperature, 80.0, 80.0), HealthStatus::Warning);
        assert_eq!(classify_metric(Metric::Temperature, 80.1, 80.0), HealthStatus::Critical);
        // flow rate: no warning band
        assert_eq!(classify_metric(Metric::FlowRate, 299.9, 300.0), HealthStatus::Normal);
        assert_eq!(classify_metric(Metric::FlowRate, 300.1, 300.0), HealthStatus::Critical);
    }

    #[test]
    fn test_classify_reading_takes_worst_field() {
        let t = ThresholdSettings::default();
        let a = classify_reading(&reading(100.0, 50.0, 100.0), &t);
        assert_eq!(a.overall, HealthStatus::Normal);

        let a = classify_reading(&reading(100.0, 75.0, 100.0), &t);
        assert_eq!(a.temperature, HealthStatus::Warning);
        assert_eq!(a.overall, HealthStatus::Warning);

        let a = classify_reading(&reading(100.0, 75.0, 301.0), &t);
        assert_eq!(a.flow_rate, HealthStatus::Critical);
        assert_eq!(a.overall, HealthStatus::Critical);
        assert_eq!(a.status(Metric::Vibration), None);
    }

    #[test]
    fn test_default_settings_reach_every_status() {
        let ranges = SensorRanges::default();
        let thresholds = ThresholdSettings::default();
        let mut rng = rng();
        let mut seen = [0usize; 3];
        for _ in 0..10_000 {
            let a = classify_reading(&generate_reading(&ranges, &mut rng, NOW), &thresholds);
            let slot = match a.overall {
                HealthStatus::Normal => 0,
                HealthStatus::Warning => 1,
                HealthStatus::Critical => 2,
            };
            seen[slot] += 1;
        }
        // temperature 65..=85 against 70/80: roughly a quarter normal
        assert!(seen[0] > 1_500, "normal {:?}", seen);
        assert!(seen[1] > 3_500, "warning {:?}", seen);
        assert!(seen[2] > 1_500, "critical {:?}", seen);
    }

    #[test]
    fn test_frame_reclassifies_with_new_thresholds() {
        let mut gen = TelemetryGenerator::with_interval(SensorRanges::default(), 10, Duration::from_millis(2000));
        gen.step(&mut rng(), NOW);

        let relaxed = TelemetryFrame::build(&gen, ThresholdSettings::new(300.0, 100.0, 350.0));
        let strict = TelemetryFrame::build(&gen, ThresholdSettings::new(100.0, 50.0, 150.0));
        assert_eq!(relaxed.latest, strict.latest);
        assert_eq!(strict.assessment.map(|a| a.overall), Some(HealthStatus::Critical));
        assert_ne!(relaxed.assessment, strict.assessment);
        assert_eq!(strict.readings.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_ticks_and_stops_on_drop() {
        let config = TelemetryConfig::default();
        let (_thresholds_tx, thresholds_rx) = watch::channel(ThresholdSettings::default());
        let feed = TelemetryFeed::spawn_with_rng(&config, thresholds_rx, rng());
        let interval = feed.interval();
        assert!(interval >= Duration::from_millis(2000) && interval < Duration::from_millis(5000));

        let mut frames = feed.subscribe();
        let first = frames.borrow_and_update().clone();
        assert_eq!(first.readings.len(), 10);

        tokio::time::advance(interval + Duration::from_millis(1)).await;
        frames.changed().await.unwrap();
        let second = frames.borrow_and_update().clone();
        assert_eq!(second.readings.len(), 10);
        assert_eq!(second.readings[8], first.readings[9]);

        drop(feed);
        tokio::task::yield_now().await;
        assert!(frames.changed().await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_reacts_to_threshold_change() {
        let config = TelemetryConfig::default();
        let relaxed = ThresholdSettings::new(1000.0, 1000.0, 1000.0);
        let (thresholds_tx, thresholds_rx) = watch::channel(relaxed);
        let feed = TelemetryFeed::spawn_with_rng(&config, thresholds_rx, rng());
        let mut frames = feed.subscribe();
        let before = frames.borrow_and_update().clone();
        assert_eq!(before.assessment.map(|a| a.overall), Some(HealthStatus::Normal));

        thresholds_tx.send_replace(ThresholdSettings::new(100.0, 50.0, 150.0));
        frames.changed().await.unwrap();
        let after = frames.borrow_and_update().clone();
        // same data, new verdict
        assert_eq!(after.latest, before.latest);
        assert_eq!(after.thresholds, ThresholdSettings::new(100.0, 50.0, 150.0));
        assert_eq!(after.assessment.map(|a| a.overall), Some(HealthStatus::Critical));
    }
}
