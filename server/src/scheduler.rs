//! Second-resolution timer service for delayed and periodic world events.
//!
//! Every tick counts each registered function down by one second. A function
//! whose countdown reaches zero is run on the scheduler's own task and is then
//! either re-armed (repeating) or dropped (one-shot). Callbacks run outside
//! the scheduler's lock, so they may register or cancel other functions.

use std::collections::HashSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{debug, error, info};

/// Identifies a registered function
pub type ScheduleId = u64;

type Callback = Box<dyn FnMut() + Send + 'static>;

struct ScheduledFunction {
    id: ScheduleId,
    callback: Callback,
    repeat: bool,
    interval: u32,
    remaining: u32,
}

#[derive(Default)]
struct SchedulerState {
    next_id: ScheduleId,
    funcs: Vec<ScheduledFunction>,
    /// Ids whose callbacks are currently running outside the lock
    running: HashSet<ScheduleId>,
    /// Ids cancelled while their callback was running
    cancelled: HashSet<ScheduleId>,
}

/// Shared handle to the scheduler. Cloning is cheap.
#[derive(Clone, Default)]
pub struct Scheduler {
    state: Arc<Mutex<SchedulerState>>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register `callback` to run after `seconds` ticks, and again every
    /// `seconds` ticks if `repeat` is set.
    pub fn schedule<F>(&self, seconds: u32, repeat: bool, callback: F) -> ScheduleId
    where
        F: FnMut() + Send + 'static,
    {
        let interval = seconds.max(1);
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.funcs.push(ScheduledFunction {
            id,
            callback: Box::new(callback),
            repeat,
            interval,
            remaining: interval,
        });
        id
    }

    /// Run once after `seconds` ticks.
    pub fn once<F>(&self, seconds: u32, callback: F) -> ScheduleId
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(seconds, false, callback)
    }

    /// Run every `seconds` ticks until cancelled.
    pub fn every<F>(&self, seconds: u32, callback: F) -> ScheduleId
    where
        F: FnMut() + Send + 'static,
    {
        self.schedule(seconds, true, callback)
    }

    /// Deregister a function. Returns false if it was not registered.
    pub fn cancel(&self, id: ScheduleId) -> bool {
        let mut state = self.lock();
        if state.running.contains(&id) {
            state.cancelled.insert(id);
            return true;
        }
        let before = state.funcs.len();
        state.funcs.retain(|f| f.id != id);
        state.funcs.len() != before
    }

    /// Number of registered functions
    pub fn len(&self) -> usize {
        let state = self.lock();
        state.funcs.len() + state.running.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Advance the clock by one second and run whatever came due.
    /// Returns how many callbacks ran.
    pub fn tick(&self) -> usize {
        let mut due = Vec::new();
        {
            let mut state = self.lock();
            let mut i = 0;
            while i < state.funcs.len() {
                let func = &mut state.funcs[i];
                func.remaining = func.remaining.saturating_sub(1);
                if func.remaining == 0 {
                    let func = state.funcs.swap_remove(i);
                    state.running.insert(func.id);
                    due.push(func);
                } else {
                    i += 1;
                }
            }
        }

        let fired = due.len();
        for func in due.iter_mut() {
            let result = catch_unwind(AssertUnwindSafe(|| (func.callback)()));
            if result.is_err() {
                error!("Scheduled function {} panicked", func.id);
            }
        }

        let mut state = self.lock();
        for mut func in due {
            state.running.remove(&func.id);
            let cancelled = state.cancelled.remove(&func.id);
            if func.repeat && !cancelled {
                func.remaining = func.interval;
                state.funcs.push(func);
            }
        }
        fired
    }

    /// Tick once per second, aligned to wall-clock second boundaries, forever.
    pub async fn run(self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let to_boundary = Duration::from_secs(1) - Duration::from_nanos(now.subsec_nanos() as u64);
        tokio::time::sleep(to_boundary).await;

        info!("Scheduler started");
        let mut interval = tokio::time::interval(Duration::from_secs(1));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let fired = self.tick();
            if fired > 0 {
                debug!("Scheduler ran {} functions", fired);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counter() -> (Arc<AtomicU32>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicU32::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_one_shot_fires_once() {
        let scheduler = Scheduler::new();
        let (count, f) = counter();
        scheduler.once(3, f);
        scheduler.tick();
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 0);
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
        for _ in 0..5 {
            scheduler.tick();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_repeat_rearms() {
        let scheduler = Scheduler::new();
        let (count, f) = counter();
        scheduler.every(2, f);
        for _ in 0..6 {
            scheduler.tick();
        }
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert_eq!(scheduler.len(), 1);
    }

    #[test]
    fn test_cancel() {
        let scheduler = Scheduler::new();
        let (count, f) = counter();
        let id = scheduler.every(1, f);
        scheduler.tick();
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_callback_can_schedule_and_cancel_itself() {
        let scheduler = Scheduler::new();
        let (count, f) = counter();
        let inner = scheduler.clone();
        let slot = Arc::new(Mutex::new(None::<ScheduleId>));
        let slot_in = slot.clone();
        let mut f = Some(f);
        let id = scheduler.every(1, move || {
            if let Some(f) = f.take() {
                inner.once(1, f);
            }
            if let Some(me) = *slot_in.lock().unwrap() {
                inner.cancel(me);
            }
        });
        *slot.lock().unwrap() = Some(id);
        scheduler.tick();
        assert_eq!(scheduler.len(), 1);
        scheduler.tick();
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_panicking_callback_is_isolated() {
        let scheduler = Scheduler::new();
        let (count, f) = counter();
        scheduler.once(1, || panic!("boom"));
        scheduler.once(1, f);
        assert_eq!(scheduler.tick(), 2);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
