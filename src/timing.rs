use std::time::{Duration, Instant};

/// Leading edge throttle: the first event of a window passes, every other
/// event inside the same window is dropped.
#[derive(Debug, Clone)]
pub struct Throttle {
    window: Duration,
    last_fire: Option<Instant>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: None,
        }
    }

    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last_fire {
            Some(last) if now.saturating_duration_since(last) < self.window => false,
            _ => {
                self.last_fire = Some(now);
                true
            }
        }
    }
}

/// One shot deadlines. Scheduling a task that is already pending moves its deadline.
#[derive(Debug)]
pub struct Scheduler<T> {
    pending: Vec<(Instant, T)>,
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
        }
    }
}

impl<T: PartialEq + Clone> Scheduler<T> {
    pub fn schedule(&mut self, task: T, at: Instant) {
        self.cancel(&task);
        self.pending.push((at, task));
    }

    pub fn cancel(&mut self, task: &T) {
        self.pending.retain(|(_, t)| t != task);
    }

    #[cfg(test)]
    pub fn is_pending(&self, task: &T) -> bool {
        self.pending.iter().any(|(_, t)| t == task)
    }

    /// Removes and returns every task whose deadline passed, earliest first.
    pub fn due(&mut self, now: Instant) -> Vec<T> {
        let mut due: Vec<(Instant, T)> = Vec::new();
        self.pending.retain(|(at, t)| {
            if *at <= now {
                due.push((*at, t.clone()));
                false
            } else {
                true
            }
        });
        due.sort_by_key(|(at, _)| *at);
        due.into_iter().map(|(_, t)| t).collect()
    }
}

/// Fires once per period; missed periods collapse into one firing.
#[derive(Debug, Clone)]
pub struct Periodic {
    period: Duration,
    next: Instant,
}

impl Periodic {
    pub fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start + period,
        }
    }

    pub fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        while self.next <= now {
            self.next += self.period;
        }
        true
    }
}
