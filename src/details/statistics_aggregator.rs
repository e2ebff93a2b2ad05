use crate::{Sample, Statistics};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// Welford's online mean/variance over RTTs in nanoseconds.
#[derive(Default)]
struct Accumulator {
    packets_sent: u64,
    packets_received: u64,
    packets_duplicated: u64,
    packets_timed_out: u64,
    min_rtt: Option<Duration>,
    max_rtt: Option<Duration>,
    mean_nanos: f64,
    m2_nanos: f64,
    rtts: Option<Vec<Duration>>,
}

impl Accumulator {
    #[allow(clippy::cast_precision_loss)]
    fn add_rtt(&mut self, rtt: Duration) {
        self.packets_received += 1;
        self.min_rtt = Some(self.min_rtt.map_or(rtt, |min| min.min(rtt)));
        self.max_rtt = Some(self.max_rtt.map_or(rtt, |max| max.max(rtt)));

        let x = rtt.as_nanos() as f64;
        let n = self.packets_received as f64;
        let delta = x - self.mean_nanos;
        self.mean_nanos += delta / n;
        self.m2_nanos += delta * (x - self.mean_nanos);

        if let Some(rtts) = self.rtts.as_mut() {
            rtts.push(rtt);
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn snapshot(&self) -> Statistics {
        let packet_loss = if self.packets_sent == 0 {
            0.0
        } else {
            (1.0 - self.packets_received as f64 / self.packets_sent as f64) * 100.0
        };
        let std_dev_nanos =
            if self.packets_received == 0 { 0.0 } else { (self.m2_nanos / self.packets_received as f64).sqrt() };

        Statistics {
            packets_sent: self.packets_sent,
            packets_received: self.packets_received,
            packets_duplicated: self.packets_duplicated,
            packets_timed_out: self.packets_timed_out,
            packet_loss,
            min_rtt: self.min_rtt.unwrap_or_default(),
            max_rtt: self.max_rtt.unwrap_or_default(),
            avg_rtt: Duration::from_nanos(self.mean_nanos.round() as u64),
            std_dev_rtt: Duration::from_nanos(std_dev_nanos.round() as u64),
            rtts: self.rtts.clone().unwrap_or_default(),
        }
    }
}

/// Serializes every counter update of a run behind one lock.
pub(crate) struct StatisticsAggregator {
    accumulator: Mutex<Accumulator>,
}

impl StatisticsAggregator {
    pub(crate) fn new(record_rtts: bool) -> Self {
        let accumulator = Accumulator { rtts: record_rtts.then(Vec::new), ..Accumulator::default() };
        StatisticsAggregator { accumulator: Mutex::new(accumulator) }
    }

    fn lock(&self) -> MutexGuard<'_, Accumulator> {
        self.accumulator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn record_sent(&self) {
        self.lock().packets_sent += 1;
    }

    /// Undoes `record_sent` for a request the socket refused.
    pub(crate) fn retract_sent(&self) {
        let mut accumulator = self.lock();
        accumulator.packets_sent = accumulator.packets_sent.saturating_sub(1);
    }

    pub(crate) fn record_sample(&self, sample: &Sample) {
        self.lock().add_rtt(sample.rtt);
    }

    pub(crate) fn record_duplicate(&self) {
        self.lock().packets_duplicated += 1;
    }

    pub(crate) fn record_timeout(&self) {
        self.lock().packets_timed_out += 1;
    }

    #[cfg(test)]
    pub(crate) fn packets_sent(&self) -> u64 {
        self.lock().packets_sent
    }

    pub(crate) fn snapshot(&self) -> Statistics {
        self.lock().snapshot()
    }
}
