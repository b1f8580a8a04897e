//! Cancellable one-shot delay used to suppress re-triggering after a trigger fires.

use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::scope::ScopeError;

enum TimerCommand {
    Start { delay: Duration, generation: u64 },
    Cancel,
    Shutdown,
}

/// One-shot timer backed by a dedicated worker thread.
///
/// `on_elapsed` runs on the worker thread, once per [`start`](Self::start) that is neither
/// cancelled nor superseded by a later `start`, and receives the generation passed to that
/// `start` so the receiver can discard callbacks from an older hold cycle.
pub struct HoldTimer {
    tx: Sender<TimerCommand>,
    worker: Option<JoinHandle<()>>,
}

impl HoldTimer {
    pub fn spawn<F>(name: &str, mut on_elapsed: F) -> Result<Self, ScopeError>
    where
        F: FnMut(u64) + Send + 'static,
    {
        let (tx, rx) = channel();
        let worker = thread::Builder::new()
            .name(format!("hold-{name}"))
            .spawn(move || {
                let mut pending: Option<(Instant, u64)> = None;
                loop {
                    let command = match pending {
                        Some((deadline, generation)) => {
                            let now = Instant::now();
                            if now >= deadline {
                                pending = None;
                                on_elapsed(generation);
                                continue;
                            }
                            match rx.recv_timeout(deadline - now) {
                                Ok(command) => command,
                                Err(RecvTimeoutError::Timeout) => continue,
                                Err(RecvTimeoutError::Disconnected) => break,
                            }
                        }
                        None => match rx.recv() {
                            Ok(command) => command,
                            Err(_) => break,
                        },
                    };
                    match command {
                        TimerCommand::Start { delay, generation } => {
                            pending = Some((Instant::now() + delay, generation));
                        }
                        TimerCommand::Cancel => pending = None,
                        TimerCommand::Shutdown => break,
                    }
                }
            })?;
        Ok(Self {
            tx,
            worker: Some(worker),
        })
    }

    /// Arm the timer, replacing any delay that is already running.
    pub fn start(&self, delay: Duration, generation: u64) {
        // The worker only goes away in `drop`, so a failed send has nobody to notify.
        let _ = self.tx.send(TimerCommand::Start { delay, generation });
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(TimerCommand::Cancel);
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        let _ = self.tx.send(TimerCommand::Shutdown);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("hold timer worker panicked");
            }
        }
    }
}
