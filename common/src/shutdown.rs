use futures::future::{Future, Shared};
use tokio::sync::watch;

/// Owns the shutdown flag. Dropping every clone of the originating
/// `Shutdown` does not itself trigger a shutdown; only an explicit
/// [`Shutdown::trigger`] call wakes waiters.
#[derive(Debug)]
pub struct Shutdown {
    sender: watch::Sender<bool>,
    signal: ShutdownSignal,
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, receiver) = watch::channel(false);
        Self {
            sender,
            signal: ShutdownSignal { receiver },
        }
    }

    /// A cloneable, awaitable handle that every suspension point in the
    /// system should select against.
    pub fn to_signal(&self) -> ShutdownSignal {
        self.signal.clone()
    }

    /// Sets the flag and wakes every outstanding waiter. Idempotent.
    pub fn trigger(&self) {
        let _ = self.sender.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.sender.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// A cheaply cloneable signal that resolves once [`Shutdown::trigger`] has
/// been called. Every blocking wait in the system (network I/O, dispatcher
/// timers, the download-queue event) should be raced against this.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Waits until the shutdown flag is set.
    pub async fn wait(&mut self) {
        if self.is_triggered() {
            return;
        }
        while self.receiver.changed().await.is_ok() {
            if *self.receiver.borrow() {
                return;
            }
        }
    }
}

/// Adapts [`ShutdownSignal`] into a plain `Future<Output = ()>`, so it can be
/// used with combinators (`futures::select!`, `tokio::select!`) that expect
/// an owned future rather than a `&mut self` method.
pub fn shared_future(mut signal: ShutdownSignal) -> Shared<impl Future<Output = ()>> {
    futures::future::FutureExt::shared(Box::pin(async move { signal.wait().await }))
}
