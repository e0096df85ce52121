use std::time::{Duration, Instant};

/// Inactivity window after the last keystroke before typing ends.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Outbound typing transition produced by the debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypingSignal {
    Start,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Idle,
    Typing,
}

/// Converts raw local composition activity into start/stop transitions.
///
/// A two-state machine with a single pending deadline. The current instant
/// is supplied by the caller on every operation, so the machine owns no
/// timers and tests can advance time at will; the event loop sleeps until
/// [`TypingDebouncer::deadline`] and then calls [`TypingDebouncer::poll`].
///
/// At most one deadline is pending at any time. Every transition replaces
/// it, never adds a second one.
#[derive(Debug)]
pub struct TypingDebouncer {
    state: State,
    deadline: Option<Instant>,
    idle_timeout: Duration,
}

impl TypingDebouncer {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            state: State::Idle,
            deadline: None,
            idle_timeout,
        }
    }

    /// Feed one local composition change.
    ///
    /// Idle and the text became non-empty: returns [`TypingSignal::Start`]
    /// and arms the deadline. While typing, any further change re-arms the
    /// deadline and returns nothing; that includes clearing the field, which
    /// does not emit an immediate stop and instead waits out the timer.
    pub fn on_input(&mut self, now: Instant, text: &str) -> Option<TypingSignal> {
        match self.state {
            State::Idle => {
                if text.is_empty() {
                    return None;
                }
                self.state = State::Typing;
                self.deadline = Some(now + self.idle_timeout);
                Some(TypingSignal::Start)
            }
            State::Typing => {
                self.deadline = Some(now + self.idle_timeout);
                None
            }
        }
    }

    /// Check the pending deadline.
    ///
    /// Returns [`TypingSignal::Stop`] exactly once per completed silence
    /// window, going back to idle.
    pub fn poll(&mut self, now: Instant) -> Option<TypingSignal> {
        match (self.state, self.deadline) {
            (State::Typing, Some(deadline)) if now >= deadline => {
                self.state = State::Idle;
                self.deadline = None;
                Some(TypingSignal::Stop)
            }
            _ => None,
        }
    }

    /// The pending deadline the event loop should sleep until, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_typing(&self) -> bool {
        self.state == State::Typing
    }

    /// Drop any pending deadline without emitting. Teardown path: after
    /// this, an elapsed deadline can never produce a stop signal.
    pub fn cancel(&mut self) {
        self.state = State::Idle;
        self.deadline = None;
    }
}

impl Default for TypingDebouncer {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(start: Instant, ms: u64) -> Instant {
        start + Duration::from_millis(ms)
    }

    #[test]
    fn first_keystroke_starts_typing() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        assert_eq!(debouncer.on_input(t0, "h"), Some(TypingSignal::Start));
        assert!(debouncer.is_typing());
        assert_eq!(debouncer.deadline(), Some(at(t0, 1000)));
    }

    #[test]
    fn further_keystrokes_do_not_restart() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        assert_eq!(debouncer.on_input(t0, "h"), Some(TypingSignal::Start));
        assert_eq!(debouncer.on_input(at(t0, 300), "he"), None);
        assert_eq!(debouncer.on_input(at(t0, 600), "hel"), None);
        // The one deadline moved with the last keystroke.
        assert_eq!(debouncer.deadline(), Some(at(t0, 1600)));
    }

    #[test]
    fn silence_stops_exactly_once() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        debouncer.on_input(t0, "h");
        assert_eq!(debouncer.poll(at(t0, 999)), None);
        assert_eq!(debouncer.poll(at(t0, 1000)), Some(TypingSignal::Stop));
        assert_eq!(debouncer.poll(at(t0, 2000)), None);
        assert_eq!(debouncer.deadline(), None);
    }

    #[test]
    fn keystroke_before_deadline_defers_stop() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        debouncer.on_input(t0, "h");
        debouncer.on_input(at(t0, 900), "he");
        assert_eq!(debouncer.poll(at(t0, 1000)), None);
        assert_eq!(debouncer.poll(at(t0, 1900)), Some(TypingSignal::Stop));
    }

    #[test]
    fn never_two_starts_without_a_stop() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        let mut signals = Vec::new();
        signals.extend(debouncer.on_input(t0, "h"));
        signals.extend(debouncer.on_input(at(t0, 100), "hi"));
        signals.extend(debouncer.poll(at(t0, 1100)));
        signals.extend(debouncer.on_input(at(t0, 1200), "hi!"));
        assert_eq!(
            signals,
            vec![TypingSignal::Start, TypingSignal::Stop, TypingSignal::Start]
        );
    }

    #[test]
    fn clearing_the_field_waits_out_the_timer() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        debouncer.on_input(t0, "h");
        // Emptying the field is just another change: no immediate stop.
        assert_eq!(debouncer.on_input(at(t0, 200), ""), None);
        assert!(debouncer.is_typing());
        assert_eq!(debouncer.poll(at(t0, 1200)), Some(TypingSignal::Stop));
    }

    #[test]
    fn empty_input_while_idle_is_ignored() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        assert_eq!(debouncer.on_input(t0, ""), None);
        assert_eq!(debouncer.deadline(), None);
        assert_eq!(debouncer.poll(at(t0, 5000)), None);
    }

    #[test]
    fn cancel_suppresses_an_elapsed_deadline() {
        let mut debouncer = TypingDebouncer::default();
        let t0 = Instant::now();
        debouncer.on_input(t0, "h");
        debouncer.cancel();
        // The armed deadline has long passed; teardown means silence.
        assert_eq!(debouncer.poll(at(t0, 5000)), None);
        assert!(!debouncer.is_typing());
    }
}
