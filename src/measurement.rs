//! # Measurement Module
//!
//! Wall-clock and memory cost of a unit of work, keyed by (subject image, strategy).
//!
//! [`MetricRecorder`] takes a clock reading and a memory snapshot immediately before
//! and after running an action exactly once. Snapshot failures are reported as
//! [`MeasurementError::Recording`], distinct from the action's own error.
//!
//! Memory is sampled process-wide. When images are processed in parallel the
//! deltas include concurrent work and are approximate.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use indexmap::IndexMap;
use serde::Serialize;

use crate::strategy::StrategyId;

/// Monotonic time source, in seconds from an arbitrary origin.
pub trait Clock: Send + Sync {
    fn now_seconds(&self) -> Result<f64, String>;
}

/// Process memory snapshot source, in megabytes.
pub trait MemoryProbe: Send + Sync {
    fn current_mb(&self) -> Result<f64, String>;
}

/// [`Clock`] backed by `std::time::Instant`.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_seconds(&self) -> Result<f64, String> {
        Ok(self.origin.elapsed().as_secs_f64())
    }
}

/// Resident set size from `/proc/self/statm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcMemoryProbe;

impl MemoryProbe for ProcMemoryProbe {
    fn current_mb(&self) -> Result<f64, String> {
        crate::observability::read_process_memory_mb()
            .map_err(|e| format!("Failed to read process memory: {e}"))
    }
}

/// Always reports 0 MB; memory deltas become uninformative but never fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMemoryProbe;

impl MemoryProbe for NullMemoryProbe {
    fn current_mb(&self) -> Result<f64, String> {
        Ok(0.0)
    }
}

/// The memory probe suited to the current platform.
pub fn platform_memory_probe() -> Arc<dyn MemoryProbe> {
    if cfg!(target_os = "linux") {
        Arc::new(ProcMemoryProbe)
    } else {
        tracing::warn!("Process memory snapshots unavailable on this platform, memory deltas will be 0");
        Arc::new(NullMemoryProbe)
    }
}

/// One measured application of a strategy to one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementSample {
    pub strategy: StrategyId,
    pub subject: PathBuf,
    pub duration_seconds: f64,
    /// May be negative when memory was released during the action.
    pub memory_delta_mb: f64,
}

/// Failure of a measured action.
#[derive(Debug)]
pub enum MeasurementError<E> {
    /// A clock or memory snapshot could not be taken
    Recording(String),
    /// The action itself failed
    Action(E),
}

impl<E: fmt::Display> fmt::Display for MeasurementError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementError::Recording(msg) => write!(f, "[MEASUREMENT] {}", msg),
            MeasurementError::Action(err) => write!(f, "{}", err),
        }
    }
}

impl<E: fmt::Debug + fmt::Display> std::error::Error for MeasurementError<E> {}

#[derive(Clone)]
pub struct MetricRecorder {
    clock: Arc<dyn Clock>,
    memory: Arc<dyn MemoryProbe>,
}

impl MetricRecorder {
    pub fn new(clock: Arc<dyn Clock>, memory: Arc<dyn MemoryProbe>) -> Self {
        Self { clock, memory }
    }

    /// Monotonic clock with the platform memory probe
    pub fn system() -> Self {
        Self::new(Arc::new(MonotonicClock::new()), platform_memory_probe())
    }

    /// Run `action` exactly once between two snapshots.
    pub fn measure<T, E>(
        &self,
        subject: &Path,
        strategy: &StrategyId,
        action: impl FnOnce() -> Result<T, E>,
    ) -> Result<(T, MeasurementSample), MeasurementError<E>> {
        let memory_before = self.memory.current_mb().map_err(MeasurementError::Recording)?;
        let start = self.clock.now_seconds().map_err(MeasurementError::Recording)?;

        let output = action().map_err(MeasurementError::Action)?;

        let end = self.clock.now_seconds().map_err(MeasurementError::Recording)?;
        let memory_after = self.memory.current_mb().map_err(MeasurementError::Recording)?;

        let sample = MeasurementSample {
            strategy: strategy.clone(),
            subject: subject.to_path_buf(),
            duration_seconds: (end - start).max(0.0),
            memory_delta_mb: memory_after - memory_before,
        };

        crate::observability::record_strategy_sample(
            strategy.as_str(),
            sample.duration_seconds,
            sample.memory_delta_mb,
        );
        Ok((output, sample))
    }
}

impl fmt::Debug for MetricRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRecorder").finish_non_exhaustive()
    }
}

/// Samples accumulated over a batch, grouped by strategy in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct MetricSeries {
    samples: IndexMap<StrategyId, Vec<MeasurementSample>>,
}

/// Per-strategy means over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StrategyAverages {
    pub time_seconds: f64,
    pub memory_mb: f64,
    pub samples: usize,
}

impl MetricSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: MeasurementSample) {
        self.samples
            .entry(sample.strategy.clone())
            .or_default()
            .push(sample);
    }

    pub fn extend(&mut self, samples: impl IntoIterator<Item = MeasurementSample>) {
        for sample in samples {
            self.push(sample);
        }
    }

    pub fn samples_for(&self, strategy: &str) -> &[MeasurementSample] {
        self.samples.get(strategy).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn total_samples(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }

    /// Arithmetic means for every strategy with at least one sample.
    pub fn averages(&self) -> IndexMap<StrategyId, StrategyAverages> {
        self.samples
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(id, samples)| {
                let n = samples.len() as f64;
                let time = samples.iter().map(|s| s.duration_seconds).sum::<f64>() / n;
                let memory = samples.iter().map(|s| s.memory_delta_mb).sum::<f64>() / n;
                (
                    id.clone(),
                    StrategyAverages {
                        time_seconds: time,
                        memory_mb: memory,
                        samples: samples.len(),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::{BuiltinStrategy, StrategyCatalogue};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Returns the scripted readings in order.
    struct ScriptedClock(Mutex<Vec<f64>>);

    impl Clock for ScriptedClock {
        fn now_seconds(&self) -> Result<f64, String> {
            let mut readings = self.0.lock().unwrap();
            if readings.is_empty() {
                return Err("clock exhausted".to_string());
            }
            Ok(readings.remove(0))
        }
    }

    struct ScriptedMemory(Mutex<Vec<f64>>);

    impl MemoryProbe for ScriptedMemory {
        fn current_mb(&self) -> Result<f64, String> {
            let mut readings = self.0.lock().unwrap();
            if readings.is_empty() {
                return Err("probe failed".to_string());
            }
            Ok(readings.remove(0))
        }
    }

    fn recorder(times: Vec<f64>, memory: Vec<f64>) -> MetricRecorder {
        MetricRecorder::new(
            Arc::new(ScriptedClock(Mutex::new(times))),
            Arc::new(ScriptedMemory(Mutex::new(memory))),
        )
    }

    fn grayscale_id() -> StrategyId {
        let mut catalogue = StrategyCatalogue::new();
        catalogue.register_builtin(BuiltinStrategy::Grayscale).unwrap()
    }

    #[test]
    fn test_measure_records_duration_and_negative_memory_delta() {
        let id = grayscale_id();
        let rec = recorder(vec![10.0, 10.25], vec![100.0, 98.5]);
        let (value, sample) = rec
            .measure(Path::new("a.png"), &id, || Ok::<_, String>(7))
            .unwrap();
        assert_eq!(value, 7);
        assert!((sample.duration_seconds - 0.25).abs() < 1e-12);
        assert!((sample.memory_delta_mb + 1.5).abs() < 1e-12);
        assert_eq!(sample.subject, PathBuf::from("a.png"));
    }

    #[test]
    fn test_measure_runs_action_exactly_once_and_propagates_error() {
        let id = grayscale_id();
        let calls = AtomicUsize::new(0);
        let rec = recorder(vec![0.0, 1.0], vec![1.0, 1.0]);
        let result = rec.measure(Path::new("a.png"), &id, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>("transform failed")
        });
        assert!(matches!(result, Err(MeasurementError::Action("transform failed"))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_snapshot_failure_is_recording_error() {
        let id = grayscale_id();
        let rec = recorder(vec![0.0, 1.0], vec![]);
        let calls = AtomicUsize::new(0);
        let result = rec.measure(Path::new("a.png"), &id, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(())
        });
        assert!(matches!(result, Err(MeasurementError::Recording(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_series_averages_tolerate_negative_deltas() {
        let id = grayscale_id();
        let mut series = MetricSeries::new();
        for (time, mem) in [(1.0, 2.0), (3.0, -4.0)] {
            series.push(MeasurementSample {
                strategy: id.clone(),
                subject: PathBuf::from("x.png"),
                duration_seconds: time,
                memory_delta_mb: mem,
            });
        }
        let averages = series.averages();
        let avg = averages.get("Grayscale").unwrap();
        assert_eq!(avg.samples, 2);
        assert!((avg.time_seconds - 2.0).abs() < 1e-12);
        assert!((avg.memory_mb + 1.0).abs() < 1e-12);
        assert_eq!(series.total_samples(), 2);
        assert!(series.samples_for("Deskewed").is_empty());
    }

    #[test]
    fn test_null_probe_and_system_recorder() {
        assert_eq!(NullMemoryProbe.current_mb().unwrap(), 0.0);
        let id = grayscale_id();
        let (_, sample) = MetricRecorder::system()
            .measure(Path::new("a.png"), &id, || Ok::<_, String>(()))
            .unwrap();
        assert!(sample.duration_seconds >= 0.0);
    }
}
