//! Trailing-edge debouncer
//!
//! Every `schedule` call re-arms the timer and replaces the pending
//! arguments. When the quiet period elapses without another call, the run
//! executes once with the latest arguments and its result is delivered to
//! every caller collapsed into it. Leading-edge execution never happens.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::FormError;

type Waiter = oneshot::Sender<Result<(), FormError>>;

struct State<A> {
    generation: u64,
    timer: Option<JoinHandle<()>>,
    args: Option<A>,
    waiters: Vec<Waiter>,
}

fn lock<A>(state: &Mutex<State<A>>) -> MutexGuard<'_, State<A>> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Re-armable, cancellable trailing-edge timer
pub(crate) struct Debouncer<A> {
    state: Arc<Mutex<State<A>>>,
}

impl<A: Send + 'static> Debouncer<A> {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                generation: 0,
                timer: None,
                args: None,
                waiters: Vec::new(),
            })),
        }
    }

    /// Arm (or re-arm) the timer. Must be called inside a Tokio runtime.
    pub(crate) fn schedule<F, Fut>(&self, args: A, delay: Duration, run: F) -> ValidationHandle
    where
        F: FnOnce(A) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), FormError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut state = lock(&self.state);

        state.generation += 1;
        let generation = state.generation;
        state.args = Some(args);
        state.waiters.push(tx);

        // A timer that already fired has cleared this slot, so only a
        // still-sleeping timer is aborted here.
        if let Some(previous) = state.timer.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.state);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let (args, waiters) = {
                let mut state = lock(&shared);
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                (state.args.take(), std::mem::take(&mut state.waiters))
            };

            let Some(args) = args else {
                return;
            };

            let result = run(args).await;
            for waiter in waiters {
                // Callers may have dropped their handle
                let _ = waiter.send(result.clone());
            }
        }));

        ValidationHandle { rx }
    }

    /// Drop the pending run, if any. Returns whether one was pending.
    pub(crate) fn cancel(&self) -> bool {
        let (timer, waiters) = {
            let mut state = lock(&self.state);
            state.generation += 1;
            state.args = None;
            (state.timer.take(), std::mem::take(&mut state.waiters))
        };

        let pending = timer.is_some();
        if let Some(timer) = timer {
            timer.abort();
        }
        for waiter in waiters {
            let _ = waiter.send(Err(FormError::ValidationCancelled));
        }
        pending
    }

    /// Whether a run is armed and has not fired yet
    pub(crate) fn is_pending(&self) -> bool {
        lock(&self.state).timer.is_some()
    }
}

/// Resolves once the debounced run that absorbed a `validate` call finishes.
///
/// Dropping the handle does not cancel the run.
#[derive(Debug)]
#[must_use = "the validation result is only observable by awaiting the handle"]
pub struct ValidationHandle {
    rx: oneshot::Receiver<Result<(), FormError>>,
}

impl Future for ValidationHandle {
    type Output = Result<(), FormError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(FormError::ValidationAborted)))
    }
}
