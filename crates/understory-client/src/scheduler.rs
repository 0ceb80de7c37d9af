//! Visibility-aware background refresh loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Period used when the caller does not pass one.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(120_000);

/// Shortest period the loop will run with.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(1);

/// Whether the hosting surface is currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Publish `visibility`, notifying receivers only when it differs from the
/// current value.
pub fn set_visibility(sender: &watch::Sender<Visibility>, visibility: Visibility) -> bool {
    sender.send_if_modified(|current| {
        if *current == visibility {
            false
        } else {
            *current = visibility;
            true
        }
    })
}

/// Shared "operation in flight" state.
///
/// Cloned handles share one cell; readers always observe the value current
/// at read time.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    loading: Arc<AtomicBool>,
    refreshing: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_load(&self) {
        self.loading.store(true, Ordering::SeqCst);
    }

    pub fn finish_load(&self) {
        self.loading.store(false, Ordering::SeqCst);
    }

    /// Mark a refresh as started. Returns `false` if one already was.
    pub fn begin_refresh(&self) -> bool {
        !self.refreshing.swap(true, Ordering::SeqCst)
    }

    pub fn finish_refresh(&self) {
        self.refreshing.store(false, Ordering::SeqCst);
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::SeqCst)
    }

    /// Either an initial load or a refresh is outstanding.
    pub fn is_busy(&self) -> bool {
        self.is_loading() || self.is_refreshing()
    }

    /// Clear both flags, e.g. after a backend error.
    pub fn reset(&self) {
        self.finish_load();
        self.finish_refresh();
    }
}

/// Target of scheduled refreshes.
#[async_trait::async_trait]
pub trait Refresh: Send + Sync + 'static {
    async fn refresh(&self);
}

/// Handle to the running refresh loop. Dropping it stops the loop.
pub struct RefreshScheduler {
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    /// Spawn the loop.
    ///
    /// Ticks every `period` while visible and skip if `in_flight` is busy at
    /// tick time. `Hidden` stops the timer; `Visible` restarts it and
    /// refreshes once right away unless something is in flight.
    pub fn start<R: Refresh>(
        period: Duration,
        in_flight: InFlight,
        visibility: watch::Receiver<Visibility>,
        target: Arc<R>,
    ) -> Self {
        let period = period.max(MIN_REFRESH_INTERVAL);
        info!("Starting refresh scheduler every {:?}", period);
        let handle = tokio::spawn(run(period, in_flight, visibility, target));
        Self {
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the timer and drop the visibility listener.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Refresh scheduler stopped");
        }
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run<R: Refresh>(
    period: Duration,
    in_flight: InFlight,
    mut visibility: watch::Receiver<Visibility>,
    target: Arc<R>,
) {
    let mut revealed = false;
    loop {
        if *visibility.borrow_and_update() == Visibility::Hidden {
            debug!("Surface hidden, refresh timer stopped");
            loop {
                if visibility.changed().await.is_err() {
                    return;
                }
                if *visibility.borrow_and_update() == Visibility::Visible {
                    break;
                }
            }
            revealed = true;
        }

        if revealed {
            revealed = false;
            if in_flight.is_busy() {
                debug!("Surface visible again, refresh already in flight");
            } else {
                debug!("Surface visible again, refreshing");
                target.refresh().await;
            }
        }

        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Read at tick time, never a copy taken at start.
                    if in_flight.is_busy() {
                        debug!("Skipping scheduled refresh, one is in flight");
                    } else {
                        debug!("Scheduled refresh");
                        target.refresh().await;
                    }
                }
                changed = visibility.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    // Senders only notify on a change, so seeing `Visible`
                    // here means a hide and a reveal landed together.
                    revealed = *visibility.borrow_and_update() == Visibility::Visible;
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingRefresh {
        calls: AtomicUsize,
    }

    impl CountingRefresh {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Refresh for CountingRefresh {
        async fn refresh(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    const PERIOD: Duration = Duration::from_secs(120);

    fn start() -> (
        RefreshScheduler,
        Arc<CountingRefresh>,
        InFlight,
        watch::Sender<Visibility>,
    ) {
        let target = Arc::new(CountingRefresh::default());
        let in_flight = InFlight::new();
        let (vis_tx, vis_rx) = watch::channel(Visibility::Visible);
        let scheduler = RefreshScheduler::start(PERIOD, in_flight.clone(), vis_rx, Arc::clone(&target));
        (scheduler, target, in_flight, vis_tx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_every_period() {
        let (_scheduler, target, _in_flight, _vis) = start();

        tokio::time::sleep(PERIOD / 2).await;
        assert_eq!(target.calls(), 0);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 1);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_read_at_tick_time() {
        let (_scheduler, target, in_flight, _vis) = start();

        // Set after the scheduler was created.
        assert!(in_flight.begin_refresh());
        tokio::time::sleep(PERIOD * 3 + PERIOD / 2).await;
        assert_eq!(target.calls(), 0);

        in_flight.finish_refresh();
        in_flight.begin_load();
        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 0);

        in_flight.finish_load();
        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_stops_and_visible_refreshes_once() {
        let (_scheduler, target, _in_flight, vis) = start();

        vis.send(Visibility::Hidden).unwrap();
        tokio::time::sleep(PERIOD * 5).await;
        assert_eq!(target.calls(), 0);

        vis.send(Visibility::Visible).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.calls(), 1);

        // Timer restarted from the reveal.
        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_visible_skips_immediate_refresh_when_in_flight() {
        let (_scheduler, target, in_flight, vis) = start();

        vis.send(Visibility::Hidden).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        in_flight.begin_load();

        vis.send(Visibility::Visible).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_timer_and_listener() {
        let (mut scheduler, target, _in_flight, vis) = start();
        assert!(scheduler.is_running());

        scheduler.shutdown();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!scheduler.is_running());
        assert_eq!(vis.receiver_count(), 0);

        tokio::time::sleep(PERIOD * 3).await;
        assert_eq!(target.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hide_then_show_before_scheduler_runs_still_refreshes() {
        let (_scheduler, target, _in_flight, vis) = start();

        // Both land before the loop observes either.
        vis.send(Visibility::Hidden).unwrap();
        vis.send(Visibility::Visible).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.calls(), 1);

        tokio::time::sleep(PERIOD).await;
        assert_eq!(target.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_visible_does_not_refresh() {
        let (_scheduler, target, _in_flight, vis) = start();

        assert!(!set_visibility(&vis, Visibility::Visible));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.calls(), 0);

        assert!(set_visibility(&vis, Visibility::Hidden));
        assert!(set_visibility(&vis, Visibility::Visible));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(target.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_period_is_clamped() {
        let target = Arc::new(CountingRefresh::default());
        let (_vis, vis_rx) = watch::channel(Visibility::Visible);
        let scheduler = RefreshScheduler::start(Duration::ZERO, InFlight::new(), vis_rx, Arc::clone(&target));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(scheduler.is_running());
        assert!(target.calls() >= 1);
    }

    #[test]
    fn test_begin_refresh_is_exclusive() {
        let in_flight = InFlight::new();
        assert!(in_flight.begin_refresh());
        assert!(!in_flight.begin_refresh());
        assert!(in_flight.is_busy());
        in_flight.reset();
        assert!(!in_flight.is_busy());
    }
}
