use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const REPORT_PERIOD: Duration = Duration::from_secs(5);
const POLL_PERIOD: Duration = Duration::from_millis(100);

/// Generation statistics, shared between the workers and the monitoring thread
pub struct Stats {
    pub start_time: Instant,
    pub files_target: u64,
    pub files_counter: AtomicU64,
    pub packets_counter: AtomicU64,
    pub bytes_counter: AtomicU64,
    pub early_stop: AtomicBool,
    pub finished: AtomicBool,
}

impl Default for Stats {
    fn default() -> Self {
        Stats::new(0)
    }
}

impl Stats {
    pub fn new(files_target: u64) -> Self {
        Stats {
            start_time: Instant::now(),
            files_target,
            files_counter: AtomicU64::new(0),
            packets_counter: AtomicU64::new(0),
            bytes_counter: AtomicU64::new(0),
            early_stop: AtomicBool::new(false),
            finished: AtomicBool::new(false),
        }
    }

    /// Account for one exported file
    pub fn increase(&self, packets: u64, bytes: u64) {
        self.files_counter.fetch_add(1, Ordering::Relaxed);
        self.packets_counter.fetch_add(packets, Ordering::Relaxed);
        self.bytes_counter.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn should_stop(&self) -> bool {
        self.early_stop.load(Ordering::Relaxed)
    }

    /// Files not started yet are skipped
    pub fn stop_early(&self) {
        self.early_stop.store(true, Ordering::Relaxed);
    }

    pub fn finish(&self) {
        self.finished.store(true, Ordering::Relaxed);
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Relaxed)
    }

    /// Human-readable throughput since the start
    pub fn throughput(&self) -> String {
        let bc = self.bytes_counter.load(Ordering::Relaxed);
        let elapsed = self.start_time.elapsed().as_secs_f64().max(1e-3);
        let throughput = 8. * (bc as f64) / elapsed / 1_000_000.;
        if throughput < 1. {
            format!("{:.2} kbps", throughput * 1000.)
        } else if throughput < 1000. {
            format!("{:.2} Mbps", throughput)
        } else {
            format!("{:.2} Gbps", throughput / 1000.)
        }
    }

    pub fn log_progress(&self) {
        log::info!(
            "{}/{} files, {} packets ({})",
            self.files_counter.load(Ordering::Relaxed),
            self.files_target,
            self.packets_counter.load(Ordering::Relaxed),
            self.throughput()
        );
    }
}

/// Monitoring loop: logs the progression periodically until the generation
/// is finished
pub fn run(stats: Arc<Stats>) {
    let mut last_report = Instant::now();
    while !stats.is_finished() {
        thread::sleep(POLL_PERIOD);
        if last_report.elapsed() >= REPORT_PERIOD {
            stats.log_progress();
            last_report = Instant::now();
        }
    }
}
