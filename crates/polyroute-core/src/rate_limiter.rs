//! Per-backend sliding-window rate limiter.
//!
//! Each backend gets an independent window of attempt timestamps. A check
//! prunes timestamps older than the window and admits the attempt iff the
//! number left is below the backend's RPM ceiling.
//!
//! # Algorithm
//!
//! Timestamps are appended monotonically to a `VecDeque<Instant>`, so
//! pruning pops from the front until the oldest entry is inside the window.
//! Memory per backend is bounded by its RPM: a full window rejects instead
//! of growing.
//!
//! The set of backends is fixed at construction, so the outer map is never
//! mutated after that and needs no lock. Each window sits behind its own
//! mutex; [`RateLimiter::try_acquire`] performs check-and-record inside that
//! one critical section so concurrent callers can never admit more than RPM
//! attempts in any trailing window.

use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use polyroute_types::BackendId;

/// Length of the sliding window.
pub const WINDOW: Duration = Duration::from_secs(60);

// ── SlidingWindow ────────────────────────────────────────────────────────

/// Attempt timestamps for one backend, oldest first.
struct SlidingWindow {
    timestamps: VecDeque<Instant>,
    rpm: NonZeroU32,
}

impl SlidingWindow {
    fn new(rpm: NonZeroU32) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(rpm.get() as usize),
            rpm,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.timestamps.front() {
            if now.saturating_duration_since(*oldest) < window {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    fn has_room(&self) -> bool {
        self.timestamps.len() < self.rpm.get() as usize
    }
}

// ── RateLimiter ──────────────────────────────────────────────────────────

/// Sliding-window admission control keyed by backend id.
pub struct RateLimiter {
    windows: HashMap<BackendId, Mutex<SlidingWindow>>,
    window: Duration,
}

impl RateLimiter {
    /// Create a limiter with one window per `(backend, rpm)` pair and the
    /// standard 60 second window.
    pub fn new(backends: impl IntoIterator<Item = (BackendId, NonZeroU32)>) -> Self {
        Self {
            windows: backends
                .into_iter()
                .map(|(id, rpm)| (id, Mutex::new(SlidingWindow::new(rpm))))
                .collect(),
            window: WINDOW,
        }
    }

    /// Override the window length. Tests use this to observe expiry.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// The window length in use.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether an attempt on `backend` would be admitted at `now`.
    ///
    /// Prunes expired timestamps but records nothing. Unknown backends are
    /// never admitted.
    pub fn admit(&self, backend: &BackendId, now: Instant) -> bool {
        let Some(slot) = self.windows.get(backend) else {
            return false;
        };
        let mut w = slot.lock();
        w.prune(now, self.window);
        w.has_room()
    }

    /// Admit and record in one critical section.
    ///
    /// Returns `true` if the attempt may proceed; its timestamp is already
    /// counted against the window whether or not the call later succeeds.
    pub fn try_acquire(&self, backend: &BackendId, now: Instant) -> bool {
        let Some(slot) = self.windows.get(backend) else {
            return false;
        };
        let mut w = slot.lock();
        w.prune(now, self.window);
        if !w.has_room() {
            return false;
        }
        w.timestamps.push_back(now);
        true
    }

    /// Attempts currently counted in `backend`'s window as of `now`.
    pub fn in_window(&self, backend: &BackendId, now: Instant) -> usize {
        self.windows.get(backend).map_or(0, |slot| {
            let mut w = slot.lock();
            w.prune(now, self.window);
            w.timestamps.len()
        })
    }

    /// The RPM ceiling configured for `backend`.
    pub fn rpm(&self, backend: &BackendId) -> Option<NonZeroU32> {
        self.windows.get(backend).map(|slot| slot.lock().rpm)
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("backends", &self.windows.len())
            .field("window", &self.window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn rpm(n: u32) -> NonZeroU32 {
        NonZeroU32::new(n).unwrap()
    }

    fn limiter(pairs: &[(&str, u32)]) -> RateLimiter {
        RateLimiter::new(pairs.iter().map(|(id, n)| (BackendId::from(*id), rpm(*n))))
    }

    #[test]
    fn admits_up_to_rpm_then_denies() {
        let rl = limiter(&[("groq", 3)]);
        let id = BackendId::from("groq");
        let now = Instant::now();
        for _ in 0..3 {
            assert!(rl.try_acquire(&id, now));
        }
        assert!(!rl.try_acquire(&id, now));
        assert!(!rl.admit(&id, now + Duration::from_secs(59)));
        assert_eq!(rl.in_window(&id, now), 3);
    }

    #[test]
    fn admission_resumes_after_window() {
        let rl = limiter(&[("gemini", 1)]);
        let id = BackendId::from("gemini");
        let t0 = Instant::now();
        assert!(rl.try_acquire(&id, t0));
        assert!(!rl.try_acquire(&id, t0 + Duration::from_secs(30)));
        assert!(rl.try_acquire(&id, t0 + WINDOW));
    }

    #[test]
    fn admit_does_not_record() {
        let rl = limiter(&[("groq", 1)]);
        let id = BackendId::from("groq");
        let now = Instant::now();
        assert!(rl.admit(&id, now));
        assert!(rl.admit(&id, now));
        assert_eq!(rl.in_window(&id, now), 0);

        assert!(rl.try_acquire(&id, now));
        assert!(!rl.admit(&id, now));
    }

    #[test]
    fn full_window_never_grows_past_rpm() {
        let rl = limiter(&[("groq", 1)]);
        let id = BackendId::from("groq");
        let now = Instant::now();
        let admitted = (0..1000).filter(|_| rl.try_acquire(&id, now)).count();
        assert_eq!(admitted, 1);
        assert_eq!(rl.in_window(&id, now), 1);
    }

    #[test]
    fn windows_are_independent() {
        let rl = limiter(&[("groq", 1), ("deepseek", 1)]);
        let now = Instant::now();
        assert!(rl.try_acquire(&BackendId::from("groq"), now));
        assert!(rl.try_acquire(&BackendId::from("deepseek"), now));
        assert!(!rl.try_acquire(&BackendId::from("groq"), now));
    }

    #[test]
    fn unknown_backend_is_denied() {
        let rl = limiter(&[("groq", 5)]);
        let id = BackendId::from("openrouter_9");
        assert!(!rl.admit(&id, Instant::now()));
        assert!(!rl.try_acquire(&id, Instant::now()));
        assert_eq!(rl.in_window(&id, Instant::now()), 0);
        assert!(rl.rpm(&id).is_none());
    }

    #[test]
    fn partial_expiry_frees_only_old_slots() {
        let rl = limiter(&[("groq", 2)]).with_window(Duration::from_secs(10));
        let id = BackendId::from("groq");
        let t0 = Instant::now();
        assert!(rl.try_acquire(&id, t0));
        assert!(rl.try_acquire(&id, t0 + Duration::from_secs(5)));
        assert!(!rl.try_acquire(&id, t0 + Duration::from_secs(9)));
        // First slot expires at t0+10, second is still live.
        assert!(rl.try_acquire(&id, t0 + Duration::from_secs(10)));
        assert!(!rl.try_acquire(&id, t0 + Duration::from_secs(11)));
    }

    #[test]
    fn concurrent_acquire_never_exceeds_rpm() {
        let rl = Arc::new(limiter(&[("openrouter_0", 30)]));
        let now = Instant::now();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rl = Arc::clone(&rl);
                std::thread::spawn(move || {
                    let id = BackendId::from("openrouter_0");
                    (0..20).filter(|_| rl.try_acquire(&id, now)).count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(admitted, 30);
    }
}
