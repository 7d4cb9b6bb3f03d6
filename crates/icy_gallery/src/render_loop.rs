//! Frame scheduling
//!
//! Scroll and resize signals arrive much faster than frames. They only set a
//! flag; the host's frame callback then runs at most one render pass.

use std::time::{Duration, Instant};

/// Handle of a requested frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameToken(pub u64);

/// Host per-frame callback (requestAnimationFrame, a winit redraw request, an iced subscription ...)
pub trait FrameScheduler {
    /// Ask the host to call back once on the next frame
    fn request_frame(&mut self) -> FrameToken;

    /// Withdraw a pending request
    fn cancel_frame(&mut self, token: FrameToken);
}

/// Single-slot pending work: one render pass and one debounced layout.
#[derive(Debug, Default)]
pub struct RenderLoop {
    pending_frame: Option<FrameToken>,
    render_pending: bool,
    layout_pending: bool,
    relayout_deadline: Option<Instant>,
    disposed: bool,
}

/// What a frame callback has to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameWork {
    pub relayout: bool,
    pub render: bool,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    pub fn is_render_pending(&self) -> bool {
        self.render_pending
    }

    /// Marks a render pass as needed. Repeated calls before the next frame
    /// don't add work.
    pub fn request_render(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.disposed {
            return;
        }
        self.render_pending = true;
        self.ensure_frame(scheduler);
    }

    /// Marks layout as dirty right away (item list replaced, config changed)
    pub fn request_layout(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.disposed {
            return;
        }
        self.layout_pending = true;
        self.relayout_deadline = None;
        self.render_pending = true;
        self.ensure_frame(scheduler);
    }

    /// Container resized: push the relayout deadline out by `debounce`.
    pub fn request_debounced_layout(&mut self, now: Instant, debounce: Duration, scheduler: &mut dyn FrameScheduler) {
        if self.disposed {
            return;
        }
        self.relayout_deadline = Some(now + debounce);
        self.ensure_frame(scheduler);
    }

    fn ensure_frame(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(scheduler.request_frame());
        }
    }

    /// Consumes a frame callback. Returns `None` for stale tokens and for
    /// callbacks arriving after disposal.
    pub fn begin_frame(&mut self, token: FrameToken, now: Instant, scheduler: &mut dyn FrameScheduler) -> Option<FrameWork> {
        if self.disposed || self.pending_frame != Some(token) {
            return None;
        }
        self.pending_frame = None;

        if let Some(deadline) = self.relayout_deadline {
            if now >= deadline {
                self.relayout_deadline = None;
                self.layout_pending = true;
                self.render_pending = true;
            } else {
                // keep ticking until the debounce expires
                self.ensure_frame(scheduler);
            }
        }

        let work = FrameWork {
            relayout: std::mem::take(&mut self.layout_pending),
            render: std::mem::take(&mut self.render_pending),
        };
        Some(work)
    }

    /// Cancels the pending callback. Idempotent.
    pub fn dispose(&mut self, scheduler: &mut dyn FrameScheduler) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(token) = self.pending_frame.take() {
            scheduler.cancel_frame(token);
        }
        self.render_pending = false;
        self.layout_pending = false;
        self.relayout_deadline = None;
    }
}

/// Scheduler that just records requests. Used by the headless simulator and
/// by hosts that drive frames from their own tick.
#[derive(Debug, Default)]
pub struct ManualScheduler {
    next: u64,
    pending: Vec<FrameToken>,
    pub requested: usize,
    pub cancelled: usize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes all due frame tokens
    pub fn take_due(&mut self) -> Vec<FrameToken> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

impl FrameScheduler for ManualScheduler {
    fn request_frame(&mut self) -> FrameToken {
        self.next += 1;
        self.requested += 1;
        let token = FrameToken(self.next);
        self.pending.push(token);
        token
    }

    fn cancel_frame(&mut self, token: FrameToken) {
        self.cancelled += 1;
        self.pending.retain(|t| *t != token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_repeated_requests() {
        let mut sched = ManualScheduler::new();
        let mut rl = RenderLoop::new();
        for _ in 0..10 {
            rl.request_render(&mut sched);
        }
        assert_eq!(sched.requested, 1);
        let token = sched.take_due()[0];
        let work = rl.begin_frame(token, Instant::now(), &mut sched).expect("frame");
        assert!(work.render);
        assert!(!work.relayout);
        assert!(!rl.is_render_pending());
    }

    #[test]
    fn stale_token_is_ignored() {
        let mut sched = ManualScheduler::new();
        let mut rl = RenderLoop::new();
        rl.request_render(&mut sched);
        assert!(rl.begin_frame(FrameToken(999), Instant::now(), &mut sched).is_none());
        assert!(rl.has_pending_frame());
    }

    #[test]
    fn resize_waits_for_debounce() {
        let mut sched = ManualScheduler::new();
        let mut rl = RenderLoop::new();
        let t0 = Instant::now();
        rl.request_debounced_layout(t0, Duration::from_millis(100), &mut sched);
        let token = sched.take_due()[0];
        let work = rl.begin_frame(token, t0 + Duration::from_millis(16), &mut sched).expect("frame");
        assert!(!work.relayout);
        let token = sched.take_due()[0];
        let work = rl.begin_frame(token, t0 + Duration::from_millis(120), &mut sched).expect("frame");
        assert!(work.relayout);
        assert!(work.render);
        assert_eq!(sched.pending_count(), 0);
    }

    #[test]
    fn dispose_cancels_and_is_idempotent() {
        let mut sched = ManualScheduler::new();
        let mut rl = RenderLoop::new();
        rl.request_render(&mut sched);
        let token = sched.pending[0];
        rl.dispose(&mut sched);
        rl.dispose(&mut sched);
        assert_eq!(sched.cancelled, 1);
        assert_eq!(sched.pending_count(), 0);
        assert!(rl.begin_frame(token, Instant::now(), &mut sched).is_none());
        rl.request_render(&mut sched);
        assert_eq!(sched.requested, 1);
    }
}
