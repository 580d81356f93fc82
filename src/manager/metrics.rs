//! Counters and timings for objective installation

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Pipeliner lookups made by installer tasks
pub const INSTALL_ATTEMPTS: &str = "install_attempts";
/// Objectives handed to a pipeliner
pub const INSTALLS: &str = "installs";
/// Objectives failed with NOPIPELINER
pub const NO_PIPELINER: &str = "no_pipeliner";
/// Pipeliner calls that returned an error
pub const DRIVER_FAILURES: &str = "driver_failures";
/// Forwarding objectives parked on a missing next group
pub const PARKED: &str = "parked";
/// Parked forwarding objectives released for installation
pub const RELEASED: &str = "released";

const MAX_SAMPLES: usize = 1000;

/// Named counters and duration samples
#[derive(Debug, Clone)]
pub struct CompositionMetrics {
    counters: Arc<RwLock<HashMap<String, u64>>>,
    durations: Arc<RwLock<HashMap<String, Vec<Duration>>>>,
}

impl Default for CompositionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionMetrics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(HashMap::new())),
            durations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Increment a counter
    pub async fn increment(&self, name: &str) {
        self.add(name, 1).await;
    }

    /// Add `amount` to a counter
    pub async fn add(&self, name: &str, amount: u64) {
        let mut counters = self.counters.write().await;
        *counters.entry(name.to_string()).or_insert(0) += amount;
    }

    /// Record how long an operation took
    pub async fn record_duration(&self, operation: &str, duration: Duration) {
        let mut durations = self.durations.write().await;
        let samples = durations.entry(operation.to_string()).or_default();
        samples.push(duration);
        if samples.len() > MAX_SAMPLES {
            let excess = samples.len() - MAX_SAMPLES;
            samples.drain(0..excess);
        }
    }

    /// Current counter value, zero if never incremented
    pub async fn get_counter(&self, name: &str) -> u64 {
        let counters = self.counters.read().await;
        counters.get(name).copied().unwrap_or(0)
    }

    /// Mean of the retained samples
    pub async fn get_avg_duration(&self, operation: &str) -> Option<Duration> {
        let durations = self.durations.read().await;
        let samples = durations.get(operation).filter(|s| !s.is_empty())?;
        let sum: Duration = samples.iter().sum();
        Some(sum / samples.len() as u32)
    }

    /// Snapshot of all counters
    pub async fn counters(&self) -> HashMap<String, u64> {
        self.counters.read().await.clone()
    }

    /// Clear everything
    pub async fn reset(&self) {
        self.counters.write().await.clear();
        self.durations.write().await.clear();
    }

    /// Start timing `operation`
    pub fn timer(&self, operation: &str) -> MetricsTimer<'_> {
        MetricsTimer {
            metrics: self,
            operation: operation.to_string(),
            start: Instant::now(),
        }
    }
}

/// Measures one operation until [`record`](Self::record) is called
pub struct MetricsTimer<'a> {
    metrics: &'a CompositionMetrics,
    operation: String,
    start: Instant,
}

impl MetricsTimer<'_> {
    /// Record the elapsed time
    pub async fn record(self) {
        let elapsed = self.start.elapsed();
        self.metrics.record_duration(&self.operation, elapsed).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counters() {
        let metrics = CompositionMetrics::new();
        metrics.increment(INSTALLS).await;
        metrics.increment(INSTALLS).await;
        metrics.add(PARKED, 3).await;

        assert_eq!(metrics.get_counter(INSTALLS).await, 2);
        assert_eq!(metrics.get_counter(PARKED).await, 3);
        assert_eq!(metrics.get_counter(NO_PIPELINER).await, 0);

        metrics.reset().await;
        assert!(metrics.counters().await.is_empty());
    }

    #[tokio::test]
    async fn test_durations() {
        let metrics = CompositionMetrics::new();
        metrics.record_duration("install", Duration::from_millis(10)).await;
        metrics.record_duration("install", Duration::from_millis(30)).await;
        assert_eq!(
            metrics.get_avg_duration("install").await,
            Some(Duration::from_millis(20))
        );
        assert_eq!(metrics.get_avg_duration("missing").await, None);
    }

    #[tokio::test]
    async fn test_timer() {
        let metrics = CompositionMetrics::new();
        let timer = metrics.timer("install");
        tokio::time::sleep(Duration::from_millis(5)).await;
        timer.record().await;
        assert!(metrics.get_avg_duration("install").await.unwrap() >= Duration::from_millis(5));
    }
}
