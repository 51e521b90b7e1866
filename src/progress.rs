use console::Term;
use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

pub const TICK: Duration = Duration::from_millis(150);

const FRAMES: [char; 4] = ['|', '/', '-', '\\'];
const LABEL: &str = "thinking...";

#[derive(Debug, Default)]
struct SignalState {
    fired: AtomicBool,
    notify: Notify,
}

/// A flag that flips from unset to set exactly once and can be observed
/// from any clone, either by polling or by awaiting [`Signal::fired`].
#[derive(Debug, Clone, Default)]
pub struct Signal(Arc<SignalState>);

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag and wakes every waiter. Returns `true` only for the
    /// call that set it.
    pub fn fire(&self) -> bool {
        let first = !self.0.fired.swap(true, Ordering::SeqCst);
        if first {
            self.0.notify.notify_waiters();
        }
        first
    }

    pub fn is_fired(&self) -> bool {
        self.0.fired.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set.
    pub async fn fired(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Registered before the check so a concurrent `fire` is not missed.
        notified.as_mut().enable();
        if self.is_fired() {
            return;
        }
        notified.await;
    }
}

/// Animated "thinking..." line shown while a request is in flight.
///
/// The task stops on its own once `first_content` fires, or when
/// [`ProgressIndicator::finish`] is called. Either way it erases its line
/// before exiting, and `finish` waits for that to happen.
pub struct ProgressIndicator {
    stop: Signal,
    handle: JoinHandle<()>,
}

impl ProgressIndicator {
    /// Draws on stderr.
    pub fn start(first_content: Signal) -> Self {
        Self::start_with(first_content, Term::stderr())
    }

    pub fn start_with<W>(first_content: Signal, out: W) -> Self
    where
        W: Write + Send + 'static,
    {
        let stop = Signal::new();
        let handle = tokio::spawn(animate(out, stop.clone(), first_content));
        Self { stop, handle }
    }

    /// Stops the animation and waits until its line has been erased.
    pub async fn finish(self) {
        self.stop.fire();
        if let Err(e) = self.handle.await {
            debug!("Progress indicator task ended abnormally: {}", e);
        }
    }
}

async fn animate<W: Write>(mut out: W, stop: Signal, first_content: Signal) {
    let mut frame = 0usize;
    loop {
        if stop.is_fired() || first_content.is_fired() {
            break;
        }
        let _ = write!(out, "\r{} {}", LABEL, FRAMES[frame % FRAMES.len()]);
        let _ = out.flush();
        frame += 1;
        tokio::select! {
            _ = tokio::time::sleep(TICK) => {}
            _ = stop.fired() => {}
            _ = first_content.fired() => {}
        }
    }
    if frame > 0 {
        let blank = " ".repeat(LABEL.len() + 2);
        let _ = write!(out, "\r{}\r", blank);
        let _ = out.flush();
    }
}
