#[cfg(test)]
#[path = "timer_test.rs"]
mod timer_test;

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Timer behavior flags.
    #[derive(Default, Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct TimerFlags: u8 {
        /// Fire every period instead of once.
        const REPEAT = 0b01;
        /// Also call the callback once from [`Timers::add`].
        const RUN_NOW = 0b10;
    }
}

/// Handle returned by [`Timers::add`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

struct Timer {
    id: TimerId,
    period_ms: u64,
    flags: TimerFlags,
    // 0 until the first poll schedules it
    expire: u64,
    callback: Box<dyn FnMut()>,
}

/// Timer list owned by a [`Manager`](crate::Manager) and polled once per
/// iteration. Times are milliseconds on the caller's clock.
pub struct Timers {
    timers: Vec<Timer>,
    next_id: u64,
    last_poll: u64,
}

impl Default for Timers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Timers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timers")
            .field("len", &self.timers.len())
            .field("last_poll", &self.last_poll)
            .finish()
    }
}

impl Timers {
    pub fn new() -> Self {
        Self {
            timers: Vec::new(),
            next_id: 1,
            last_poll: 0,
        }
    }

    /// Adds a timer firing every `period_ms` (or once, without
    /// [`TimerFlags::REPEAT`]). With [`TimerFlags::RUN_NOW`] the callback is
    /// invoked before this returns.
    pub fn add<F>(&mut self, period_ms: u64, flags: TimerFlags, callback: F) -> TimerId
    where
        F: FnMut() + 'static,
    {
        let id = TimerId(self.next_id);
        self.next_id += 1;

        let mut timer = Timer {
            id,
            period_ms,
            flags,
            expire: 0,
            callback: Box::new(callback),
        };
        if flags.contains(TimerFlags::RUN_NOW) {
            (timer.callback)();
        }
        log::trace!("{id} added, period {period_ms}ms, {flags:?}");
        self.timers.insert(0, timer);
        id
    }

    /// Removes a timer. Returns false if it already fired or was removed.
    pub fn remove(&mut self, id: TimerId) -> bool {
        let before = self.timers.len();
        self.timers.retain(|t| t.id != id);
        before != self.timers.len()
    }

    pub fn contains(&self, id: TimerId) -> bool {
        self.timers.iter().any(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }

    pub fn clear(&mut self) {
        self.timers.clear();
    }

    /// Fires every due timer.
    ///
    /// A timer that fell behind by more than one period is rescheduled from
    /// `now`; otherwise from its previous due time. One-shot timers are
    /// removed after firing. If `now` is earlier than the previous poll, the
    /// clock was rewound and every timer is rescheduled from `now`.
    pub fn poll(&mut self, now: u64) {
        if now < self.last_poll {
            log::debug!("clock went back {}ms", self.last_poll - now);
            for t in &mut self.timers {
                t.expire = 0;
            }
        }
        self.last_poll = now;

        self.timers.retain_mut(|t| {
            if t.expire == 0 {
                t.expire = now.saturating_add(t.period_ms);
            }
            if t.expire > now {
                return true;
            }

            t.expire = if now - t.expire > t.period_ms {
                now.saturating_add(t.period_ms)
            } else {
                t.expire.saturating_add(t.period_ms)
            };
            (t.callback)();
            t.flags.contains(TimerFlags::REPEAT)
        });
    }

    /// Milliseconds until the earliest scheduled timer, if any is scheduled.
    pub(crate) fn next_due_in(&self, now: u64) -> Option<u64> {
        self.timers
            .iter()
            .map(|t| {
                if t.expire == 0 {
                    t.period_ms
                } else {
                    t.expire.saturating_sub(now)
                }
            })
            .min()
    }
}
