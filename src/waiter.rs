use std::{
    cell::Cell,
    thread,
    time::{Duration, Instant},
};

/// Fixed-interval gate shared by every request in a run.
///
/// The first call passes immediately. Later calls sleep for whatever is left of the interval
/// since the previous call, so time spent parsing or writing files counts toward the delay.
#[derive(Debug, Default)]
pub struct Waiter {
    last: Cell<Option<Instant>>,
    interval: Option<Duration>,
}

impl Waiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            last: Cell::new(None),
            interval: Some(interval).filter(|interval| !interval.is_zero()),
        }
    }

    pub fn wait(&self) {
        if let Some(remaining) = self.remaining(Instant::now()) {
            thread::sleep(remaining);
        }
        self.last.set(Some(Instant::now()));
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        let interval = self.interval?;
        let elapsed = now.saturating_duration_since(self.last.get()?);
        interval.checked_sub(elapsed).filter(|left| !left.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::Waiter;

    #[test]
    fn first_wait_is_free() {
        let waiter = Waiter::new(Duration::from_secs(5));
        let start = Instant::now();
        waiter.wait();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(waiter.last.get().is_some());
    }

    #[test]
    fn remaining_counts_elapsed_time() {
        let waiter = Waiter::new(Duration::from_secs(5));
        let then = Instant::now();
        waiter.last.set(Some(then));

        let left = waiter.remaining(then + Duration::from_secs(2));
        assert_eq!(left, Some(Duration::from_secs(3)));
        assert_eq!(waiter.remaining(then + Duration::from_secs(6)), None);
    }

    #[test]
    fn zero_interval_never_sleeps() {
        let waiter = Waiter::new(Duration::ZERO);
        waiter.last.set(Some(Instant::now()));
        assert_eq!(waiter.remaining(Instant::now()), None);
    }
}
