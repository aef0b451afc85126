//! Single-timer debounce: every `schedule` cancels the pending value and
//! restarts the delay. At most one value is pending, the last one wins.
//!
//! The debouncer does not own a timer. Callers either arm a real timeout and
//! call [`Debouncer::fire`] with the generation returned by `schedule`, or
//! drive it with a clock through [`Debouncer::poll`].

#[derive(Debug, Clone)]
struct Pending<T> {
    value: T,
    due_at_ms: i64,
    generation: u64,
}

#[derive(Debug, Clone)]
pub struct Debouncer<T> {
    delay_ms: u32,
    generation: u64,
    pending: Option<Pending<T>>,
}

impl<T> Debouncer<T> {
    pub fn new(delay_ms: u32) -> Self {
        Self {
            delay_ms,
            generation: 0,
            pending: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending_generation(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.generation)
    }

    pub fn due_at_ms(&self) -> Option<i64> {
        self.pending.as_ref().map(|p| p.due_at_ms)
    }

    /// Replaces whatever was pending. Returns the generation to fire with.
    pub fn schedule(&mut self, value: T, now_ms: i64) -> u64 {
        self.generation += 1;
        self.pending = Some(Pending {
            value,
            due_at_ms: now_ms + i64::from(self.delay_ms),
            generation: self.generation,
        });
        self.generation
    }

    /// Drops the pending value. Returns `true` when something was pending.
    pub fn cancel(&mut self) -> bool {
        self.pending.take().is_some()
    }

    /// Timer path: yields the value only if `generation` is still the pending one.
    pub fn fire(&mut self, generation: u64) -> Option<T> {
        let current = matches!(&self.pending, Some(p) if p.generation == generation);
        self.take_if(current)
    }

    /// Clock path: yields the value once its delay has elapsed.
    pub fn poll(&mut self, now_ms: i64) -> Option<T> {
        let due = matches!(&self.pending, Some(p) if now_ms >= p.due_at_ms);
        self.take_if(due)
    }

    fn take_if(&mut self, ready: bool) -> Option<T> {
        if ready {
            self.pending.take().map(|p| p.value)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_value_wins() {
        let mut d = Debouncer::new(500);
        d.schedule("s", 0);
        d.schedule("st", 100);
        d.schedule("steel", 250);

        assert_eq!(d.poll(600), None);
        assert_eq!(d.poll(750), Some("steel"));
        assert_eq!(d.poll(2000), None);
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut d = Debouncer::new(300);
        let first = d.schedule(1, 0);
        let second = d.schedule(2, 10);

        assert_eq!(d.fire(first), None);
        assert!(d.is_pending());
        assert_eq!(d.fire(second), Some(2));
        assert_eq!(d.fire(second), None);
    }

    #[test]
    fn test_cancel() {
        let mut d = Debouncer::new(300);
        let generation = d.schedule((), 0);
        assert!(d.cancel());
        assert!(!d.cancel());
        assert_eq!(d.fire(generation), None);
        assert_eq!(d.poll(10_000), None);
    }

    #[test]
    fn test_due_at() {
        let mut d = Debouncer::new(1500);
        assert_eq!(d.due_at_ms(), None);
        let generation = d.schedule((), 1000);
        assert_eq!(d.due_at_ms(), Some(2500));
        assert_eq!(d.pending_generation(), Some(generation));
    }
}
