use std::sync::atomic::{AtomicUsize, Ordering};

/// Link counter and ceiling shared by every node spawned from one crawl
///
/// The counter only ever holds granted links, so it stays at or below the
/// ceiling that was in force when each grant was made.
#[derive(Debug)]
pub struct LinkBudget {
    counter: AtomicUsize,
    max: AtomicUsize,
}

impl LinkBudget {
    pub fn new(max: usize) -> Self {
        Self {
            counter: AtomicUsize::new(0),
            max: AtomicUsize::new(max),
        }
    }

    /// Links counted so far
    pub fn count(&self) -> usize {
        self.counter.load(Ordering::Acquire)
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::Acquire)
    }

    pub fn set_max(&self, max: usize) {
        self.max.store(max, Ordering::Release);
    }

    /// True once the counter reached the ceiling
    pub fn exhausted(&self) -> bool {
        self.count() >= self.max()
    }

    pub fn remaining(&self) -> usize {
        self.max().saturating_sub(self.count())
    }

    /// Charges up to `requested` links to the counter
    ///
    /// Only the links that fit under the ceiling are counted; refused links
    /// leave no trace, so raising the ceiling later frees room for them.
    ///
    /// # Returns
    ///
    /// How many of the requested links were granted. Concurrent callers are
    /// granted disjoint shares, so the sum of all grants never exceeds `max`.
    pub fn reserve(&self, requested: usize) -> usize {
        if requested == 0 {
            return 0;
        }
        let mut current = self.counter.load(Ordering::Acquire);
        loop {
            let grant = requested.min(self.max().saturating_sub(current));
            if grant == 0 {
                return 0;
            }
            match self.counter.compare_exchange_weak(
                current,
                current + grant,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return grant,
                Err(actual) => current = actual,
            }
        }
    }

    /// Zeroes the counter, keeping the ceiling
    pub fn reset(&self) {
        self.counter.store(0, Ordering::Release);
    }
}
