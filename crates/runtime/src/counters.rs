use monkey_types::Lane;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

/// Campaign progress. Written only by the driver, read by the ticker.
#[derive(Debug, Default)]
pub struct CampaignCounters {
    total_requests: AtomicU64,
    tests_seen: AtomicU64,
    last_lane: AtomicU64,
    has_lane: AtomicBool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub total_requests: u64,
    pub tests_seen: u64,
    pub last_lane: Option<Lane>,
}

impl CampaignCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, lane: Lane) {
        let previous = self.last_lane();
        if previous.map(|prev| prev.test_index) != Some(lane.test_index) {
            self.tests_seen.fetch_add(1, Ordering::Relaxed);
        }
        self.last_lane.store(pack(lane), Ordering::Relaxed);
        self.has_lane.store(true, Ordering::Release);
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_lane(&self) -> Option<Lane> {
        if !self.has_lane.load(Ordering::Acquire) {
            return None;
        }
        Some(unpack(self.last_lane.load(Ordering::Relaxed)))
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            tests_seen: self.tests_seen.load(Ordering::Relaxed),
            last_lane: self.last_lane(),
        }
    }
}

fn pack(lane: Lane) -> u64 {
    (u64::from(lane.test_index) << 32) | u64::from(lane.request_index)
}

fn unpack(packed: u64) -> Lane {
    Lane {
        test_index: (packed >> 32) as u32,
        request_index: packed as u32,
    }
}

/// Log progress every `every` until the handle is aborted.
pub fn spawn_progress_ticker(counters: Arc<CampaignCounters>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.tick().await;
        loop {
            interval.tick().await;
            let snapshot = counters.snapshot();
            info!(
                requests = snapshot.total_requests,
                tests = snapshot.tests_seen,
                lane = %snapshot.last_lane.map(|lane| lane.to_string()).unwrap_or_else(|| "-".into()),
                "campaign progress"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lane(test_index: u32, request_index: u32) -> Lane {
        Lane {
            test_index,
            request_index,
        }
    }

    #[test]
    fn test_tests_counted_on_index_change() {
        let counters = CampaignCounters::new();
        assert_eq!(counters.snapshot().last_lane, None);

        counters.record_request(lane(0, 0));
        counters.record_request(lane(0, 1));
        counters.record_request(lane(1, 0));
        counters.record_request(lane(0, 0));

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.total_requests, 4);
        assert_eq!(snapshot.tests_seen, 3);
        assert_eq!(snapshot.last_lane, Some(lane(0, 0)));
    }

    #[test]
    fn test_lane_packing_keeps_both_halves() {
        let wide = lane(u32::MAX, 7);
        assert_eq!(unpack(pack(wide)), wide);
    }

    #[tokio::test]
    async fn test_ticker_stops_when_aborted() {
        let counters = Arc::new(CampaignCounters::new());
        let ticker = spawn_progress_ticker(Arc::clone(&counters), Duration::from_millis(5));
        tokio::time::sleep(Duration::from_millis(20)).await;
        ticker.abort();
        assert!(ticker.await.unwrap_err().is_cancelled());
    }
}
