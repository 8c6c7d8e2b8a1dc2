use std::time::Duration;

use hdrhistogram::Histogram;

/// Latency distribution in microseconds. Three significant digits bound the
/// relative error of every reported percentile to 0.1%.
#[derive(Debug)]
pub struct LatencyHistogram {
    hist: Histogram<u64>,
}

impl LatencyHistogram {
    /// Create a new latency histogram.
    ///
    /// # Errors
    ///
    /// Returns an error if the histogram cannot be created.
    pub fn new() -> Result<Self, String> {
        let hist = Histogram::<u64>::new(3)
            .map_err(|err| format!("Failed to create histogram: {}", err))?;
        Ok(Self { hist })
    }

    /// Record one latency sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be recorded.
    pub fn record(&mut self, latency: Duration) -> Result<(), String> {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.hist
            .record(micros.max(1))
            .map_err(|err| format!("Failed to record latency: {}", err))
    }

    /// p50, p95 and p99 in microseconds, zero when empty.
    #[must_use]
    pub fn percentiles(&self) -> (u64, u64, u64) {
        if self.count() == 0 {
            return (0, 0, 0);
        }

        (
            self.hist.value_at_quantile(0.5),
            self.hist.value_at_quantile(0.95),
            self.hist.value_at_quantile(0.99),
        )
    }

    #[must_use]
    pub fn max(&self) -> u64 {
        if self.count() == 0 { 0 } else { self.hist.max() }
    }

    #[must_use]
    pub fn mean(&self) -> u64 {
        if self.count() == 0 {
            return 0;
        }
        self.hist.mean().round() as u64
    }

    #[must_use]
    pub fn count(&self) -> u64 {
        self.hist.len()
    }
}
