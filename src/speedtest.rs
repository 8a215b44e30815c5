//! Rolling latency measurement for a single node.

use crate::config::SpeedTestOptions;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// The cost recorded for a failed probe, and the average of a node nobody has measured yet.
pub const MAX_COST: u64 = u64::MAX;

/// A FIFO of fixed capacity that drops its oldest element to make room for a new one.
#[derive(Debug, Clone)]
pub struct DroppingQueue<T> {
    values: VecDeque<T>,
    capacity: usize,
}

impl<T> DroppingQueue<T> {
    /// a capacity of 0 is raised to 1
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DroppingQueue {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, value: T) {
        if self.values.len() == self.capacity {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    /// the held values, oldest first
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}

type Probe = Arc<dyn Fn() -> BoxFuture<'static, bool> + Send + Sync>;

/// Runs a probe every `interval` and keeps the cost, in milliseconds, of the last
/// `samples` runs.
///
/// Probes are timed independently and may overlap: a hanging probe doesn't hold back
/// the next tick. A failed probe costs [`MAX_COST`].
pub struct SpeedTest {
    probe: Probe,
    interval: Duration,
    samples: usize,
    running: Option<Running>,
}

struct Running {
    samples: Arc<Mutex<DroppingQueue<u64>>>,
    task: JoinHandle<()>,
}

impl SpeedTest {
    pub fn new<F, Fut, E>(probe: F, interval: Duration, samples: usize) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let probe: Probe = Arc::new(move || {
            let run = probe();
            async move {
                match run.await {
                    Ok(()) => true,
                    Err(e) => {
                        debug!(error = %e, "speed test probe failed");
                        false
                    }
                }
            }
            .boxed()
        });
        SpeedTest {
            probe,
            // tokio intervals can't tick every 0ms
            interval: interval.max(Duration::from_millis(1)),
            samples: samples.max(1),
            running: None,
        }
    }

    pub fn with_options<F, Fut, E>(probe: F, options: &SpeedTestOptions) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        SpeedTest::new(probe, options.interval, options.samples)
    }

    /// Start probing; the first probe runs one interval from now.
    ///
    /// # Panics
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        if self.running.is_some() {
            warn!("Attempted to start a speed test, but it had already been started!");
            return;
        }
        let samples = Arc::new(Mutex::new(DroppingQueue::new(self.samples)));
        let task = tokio::spawn(run(
            Arc::clone(&self.probe),
            self.interval,
            Arc::clone(&samples),
        ));
        self.running = Some(Running { samples, task });
    }

    /// Stop probing and forget every sample.
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            // probes still in flight are dropped with the task, and any late sample
            // lands in a queue nobody reads anymore
            running.task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// mean cost of the held samples, or [`MAX_COST`] when there are none
    pub fn average(&self) -> u64 {
        match &self.running {
            Some(running) => mean(&running.samples.lock()),
            None => MAX_COST,
        }
    }
}

impl Drop for SpeedTest {
    fn drop(&mut self) {
        self.stop();
    }
}

fn mean(samples: &DroppingQueue<u64>) -> u64 {
    if samples.is_empty() {
        return MAX_COST;
    }
    let total: u128 = samples.values().map(|&cost| u128::from(cost)).sum();
    (total / samples.len() as u128) as u64
}

async fn run(probe: Probe, interval: Duration, samples: Arc<Mutex<DroppingQueue<u64>>>) {
    let mut ticker = interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut in_flight = FuturesUnordered::new();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let probe = Arc::clone(&probe);
                in_flight.push(async move {
                    let started = Instant::now();
                    if probe().await {
                        u64::try_from(started.elapsed().as_millis()).unwrap_or(MAX_COST)
                    } else {
                        MAX_COST
                    }
                });
            }
            Some(cost) = in_flight.next() => {
                samples.lock().push(cost);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DroppingQueue, SpeedTest, MAX_COST};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::sleep;

    fn sleeping_probe(
        millis: u64,
        calls: Arc<AtomicUsize>,
    ) -> impl Fn() -> futures::future::BoxFuture<'static, Result<(), String>> + Send + Sync {
        use futures::FutureExt;
        move || {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                sleep(Duration::from_millis(millis)).await;
                Ok(())
            }
            .boxed()
        }
    }

    #[test]
    fn queue_keeps_the_last_n_in_insertion_order() {
        let mut queue = DroppingQueue::new(3);
        for value in 1..=4 {
            queue.push(value);
        }
        assert_eq!(queue.values().copied().collect::<Vec<_>>(), vec![2, 3, 4]);

        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn queue_capacity_is_at_least_one() {
        let mut queue = DroppingQueue::new(0);
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.capacity(), 1);
        assert_eq!(queue.values().collect::<Vec<_>>(), vec![&"b"]);
    }

    #[test]
    fn unstarted_test_reports_max_cost() {
        let test = SpeedTest::new(|| async { Ok::<(), String>(()) }, Duration::from_secs(1), 5);
        assert_eq!(test.average(), MAX_COST);
    }

    #[tokio::test(start_paused = true)]
    async fn probes_run_once_per_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(0, calls.clone()), Duration::from_secs(1), 5);
        test.start();

        sleep(Duration::from_millis(500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(1000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn records_probe_duration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(100, calls), Duration::from_secs(1), 3);
        test.start();

        sleep(Duration::from_millis(1150)).await;
        assert_eq!(test.average(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_probe_stays_at_max_cost() {
        let mut test = SpeedTest::new(
            || async { Err::<(), _>("test failed") },
            Duration::from_millis(20),
            5,
        );
        test.start();

        sleep(Duration::from_millis(150)).await;
        assert_eq!(test.average(), MAX_COST);
    }

    #[tokio::test(start_paused = true)]
    async fn average_only_covers_the_sample_window() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        // 50ms, 100ms, 150ms, 200ms
        let probe = move || {
            let delay = 50 * (counter.fetch_add(1, Ordering::SeqCst) as u64 + 1);
            async move {
                sleep(Duration::from_millis(delay)).await;
                Ok::<(), String>(())
            }
        };
        let mut test = SpeedTest::new(probe, Duration::from_secs(1), 2);
        test.start();

        sleep(Duration::from_millis(4500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(test.average(), 175);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_probes_do_not_hold_back_the_next_tick() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(250, calls.clone()), Duration::from_millis(100), 5);
        test.start();

        // the first probe finishes at 350ms, while the fourth tick is still to come
        sleep(Duration::from_millis(360)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(test.average(), 250);
    }

    #[tokio::test(start_paused = true)]
    async fn starting_twice_keeps_a_single_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(0, calls.clone()), Duration::from_millis(100), 5);
        test.start();
        test.start();

        sleep(Duration::from_millis(350)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_the_timer_and_clears_samples() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(10, calls.clone()), Duration::from_secs(1), 5);
        test.start();
        sleep(Duration::from_millis(1050)).await;
        assert_eq!(test.average(), 10);

        test.stop();
        assert_eq!(test.average(), MAX_COST);
        assert!(!test.is_running());

        sleep(Duration::from_secs(3)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // stopping again is harmless, and a restart begins from nothing
        test.stop();
        test.start();
        assert_eq!(test.average(), MAX_COST);
        sleep(Duration::from_millis(1050)).await;
        assert_eq!(test.average(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_interval_still_runs() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut test = SpeedTest::new(sleeping_probe(0, calls.clone()), Duration::ZERO, 5);
        test.start();

        sleep(Duration::from_millis(10)).await;
        assert!(calls.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_tests_rank_by_speed() {
        let mut fast = SpeedTest::new(
            sleeping_probe(15, Arc::new(AtomicUsize::new(0))),
            Duration::from_millis(50),
            3,
        );
        let mut slow = SpeedTest::new(
            sleeping_probe(25, Arc::new(AtomicUsize::new(0))),
            Duration::from_millis(50),
            3,
        );
        fast.start();
        slow.start();

        sleep(Duration::from_millis(200)).await;
        assert!(fast.average() < slow.average());
    }
}
