//! The inactivity state machine.
//!
//! One engine per wrapped session. While `Armed` it carries a deadline on
//! the monotonic clock; child output pushes the deadline out, the child's
//! bell disarms it, and when the deadline passes with neither, the sink is
//! handed exactly one backstop notification. `Fired` and `Disabled` absorb
//! everything except a session reset, which re-arms from any state.
//!
//! A dedicated watchdog thread sleeps on a condvar until the armed deadline
//! and re-checks the state after every wakeup, so an event that lands
//! between scheduling and expiry (bell, reset, shutdown) always wins over a
//! stale timer.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use claude_ntfy_alert::{Notification, Notifier};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Counting down; fires when `deadline` passes.
    Armed,
    /// The one backstop for this session went out.
    Fired,
    /// Bell seen (or zero timeout); nothing fires until a session reset.
    Disabled,
}

struct Inner {
    state: State,
    /// Meaningful only while `Armed`.
    deadline: Instant,
    closed: bool,
}

/// Single-writer inactivity engine. All transitions happen under one lock;
/// callers from the output pump and the watchdog serialize through it.
pub struct BackstopEngine {
    timeout: Duration,
    sink: Arc<dyn Notifier>,
    inner: Mutex<Inner>,
    cv: Condvar,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl BackstopEngine {
    /// Create the engine and arm it.
    ///
    /// A zero timeout disables the engine permanently: no watchdog thread is
    /// spawned and no event (including session resets) can arm it.
    pub fn start(timeout: Duration, sink: Arc<dyn Notifier>) -> Arc<Self> {
        let state = if timeout.is_zero() {
            State::Disabled
        } else {
            State::Armed
        };
        let engine = Arc::new(Self {
            timeout,
            sink,
            inner: Mutex::new(Inner {
                state,
                deadline: Instant::now() + timeout,
                closed: false,
            }),
            cv: Condvar::new(),
            watchdog: Mutex::new(None),
        });

        if !timeout.is_zero() {
            let for_thread = Arc::clone(&engine);
            match std::thread::Builder::new()
                .name("backstop-timer".into())
                .spawn(move || for_thread.watch())
            {
                Ok(handle) => {
                    *engine.watchdog.lock().expect("watchdog lock poisoned") = Some(handle);
                }
                Err(e) => {
                    // Degraded but harmless: the wrapper stays transparent,
                    // it just cannot fire.
                    tracing::error!("failed to spawn backstop timer thread: {e}");
                }
            }
        }

        engine
    }

    /// The child produced output; push the deadline out.
    pub fn output(&self) {
        let mut inner = self.lock();
        if inner.state == State::Armed {
            inner.deadline = Instant::now() + self.timeout;
        }
    }

    /// The child rang the terminal bell; the user already got a local
    /// notification, so the remote one is cancelled for this session.
    pub fn bell(&self) {
        let mut inner = self.lock();
        if inner.state == State::Armed {
            inner.state = State::Disabled;
            debug!("terminal bell observed, backstop disarmed");
            self.cv.notify_all();
        }
    }

    /// A new interactive turn began: re-arm regardless of current state so
    /// the next idle period is reported again.
    pub fn reset_session(&self) {
        if self.timeout.is_zero() {
            return;
        }
        let mut inner = self.lock();
        inner.state = State::Armed;
        inner.deadline = Instant::now() + self.timeout;
        debug!("session reset, backstop re-armed");
        self.cv.notify_all();
    }

    /// Whether the engine is currently counting down.
    pub fn is_armed(&self) -> bool {
        self.lock().state == State::Armed
    }

    /// Stop the watchdog. Further events are ignored.
    pub fn close(&self) {
        {
            let mut inner = self.lock();
            inner.closed = true;
            self.cv.notify_all();
        }
        let handle = self.watchdog.lock().expect("watchdog lock poisoned").take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("backstop state lock poisoned")
    }

    /// Watchdog body: sleep until the armed deadline, re-check, fire once.
    fn watch(self: Arc<Self>) {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return;
            }
            match inner.state {
                State::Armed => {
                    let now = Instant::now();
                    if now >= inner.deadline {
                        // The state flips before the sink runs, and the lock
                        // drops before the sink runs: a slow sink can never
                        // block the pumps, and re-entry sees `Fired`.
                        inner.state = State::Fired;
                        drop(inner);
                        info!("no child activity before deadline, sending backstop");
                        self.sink.notify(Notification::backstop());
                        inner = self.lock();
                    } else {
                        let remaining = inner.deadline - now;
                        let (guard, _) = self
                            .cv
                            .wait_timeout(inner, remaining)
                            .expect("backstop state lock poisoned");
                        inner = guard;
                    }
                }
                State::Fired | State::Disabled => {
                    // Nothing scheduled; sleep until an event changes that.
                    inner = self.cv.wait(inner).expect("backstop state lock poisoned");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use claude_ntfy_alert::NotificationKind;

    use super::*;

    /// Sink that records every notification with its arrival time.
    struct RecordingSink {
        t0: Instant,
        sent: StdMutex<Vec<(Duration, Notification)>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                t0: Instant::now(),
                sent: StdMutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<(Duration, Notification)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingSink {
        fn notify(&self, notification: Notification) {
            self.sent
                .lock()
                .unwrap()
                .push((self.t0.elapsed(), notification));
        }
    }

    fn sleep_ms(ms: u64) {
        std::thread::sleep(Duration::from_millis(ms));
    }

    #[test]
    fn fires_exactly_once_at_the_deadline() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(200), sink.clone());

        sleep_ms(600);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1, "expected exactly one backstop");
        let (at, notification) = &sent[0];
        assert_eq!(notification.kind, NotificationKind::Backstop);
        assert!(
            *at >= Duration::from_millis(195) && *at <= Duration::from_millis(450),
            "fired at {at:?}, expected ~200ms"
        );
        assert!(!engine.is_armed());

        engine.close();
    }

    #[test]
    fn output_pushes_the_deadline_out() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(200), sink.clone());

        // Output at ~100ms, ~190ms, ~250ms; the final deadline lands around
        // 450ms from start.
        sleep_ms(100);
        engine.output();
        sleep_ms(90);
        engine.output();
        sleep_ms(60);
        engine.output();

        sleep_ms(450);
        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        let (at, _) = &sent[0];
        assert!(
            *at >= Duration::from_millis(440),
            "fired at {at:?}, before the pushed-out deadline"
        );

        engine.close();
    }

    #[test]
    fn bell_disarms_for_the_rest_of_the_session() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(200), sink.clone());

        sleep_ms(50);
        engine.bell();
        assert!(!engine.is_armed());

        // Later output must not re-arm a disarmed session.
        engine.output();
        sleep_ms(500);
        assert!(sink.sent().is_empty());
        assert!(!engine.is_armed());

        engine.close();
    }

    #[test]
    fn zero_timeout_disables_everything() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::ZERO, sink.clone());

        assert!(!engine.is_armed());
        engine.output();
        engine.bell();
        engine.reset_session();
        sleep_ms(150);
        assert!(sink.sent().is_empty());
        assert!(!engine.is_armed());

        engine.close();
    }

    #[test]
    fn fired_state_absorbs_later_events() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(80), sink.clone());

        sleep_ms(250);
        assert_eq!(sink.sent().len(), 1);

        engine.output();
        engine.bell();
        sleep_ms(250);
        assert_eq!(sink.sent().len(), 1, "fired session must stay fired");

        engine.close();
    }

    #[test]
    fn session_reset_rearms_after_fired() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(80), sink.clone());

        sleep_ms(250);
        assert_eq!(sink.sent().len(), 1);

        engine.reset_session();
        assert!(engine.is_armed());
        sleep_ms(250);
        assert_eq!(
            sink.sent().len(),
            2,
            "a reset starts a new session with its own backstop"
        );

        engine.close();
    }

    #[test]
    fn session_reset_rearms_after_bell() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(80), sink.clone());

        engine.bell();
        assert!(!engine.is_armed());

        engine.reset_session();
        sleep_ms(250);
        assert_eq!(sink.sent().len(), 1);

        engine.close();
    }

    #[test]
    fn close_before_deadline_never_fires() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(200), sink.clone());

        sleep_ms(50);
        engine.close();
        sleep_ms(300);
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn steady_output_holds_the_backstop_off_indefinitely() {
        let sink = RecordingSink::new();
        let engine = BackstopEngine::start(Duration::from_millis(120), sink.clone());

        for _ in 0..8 {
            sleep_ms(40);
            engine.output();
        }
        assert!(sink.sent().is_empty());
        assert!(engine.is_armed());

        engine.close();
    }
}
