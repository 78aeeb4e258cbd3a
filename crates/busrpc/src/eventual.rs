//! # Eventual Results
//!
//! `Eventual<T>` is the handle an eventual method returns; `Completer<T>`
//! is the only way to resolve it. Completing consumes the completer, so a
//! handle resolves exactly once. A completer dropped without completing
//! resolves its handle with `Error::Abandoned`.
//!
//! The handle can be awaited, or observed with `on_complete`, which runs
//! the observer on whichever context completes the call.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::task::Context;
use std::task::Poll;
use std::task::Waker;

use buspack::Fault;

use crate::error::Error;
use crate::error::Result;

type Observer<T> = Box<dyn FnOnce(Result<T>) + Send>;

enum State<T> {
    Waiting { waker: Option<Waker>, observer: Option<Observer<T>> },
    Ready(Result<T>),
    Taken,
}

struct Slot<T> {
    state: Mutex<State<T>>,
}

impl<T> Slot<T> {
    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, result: Result<T>) {
        let mut state = self.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Waiting { observer: Some(observer), .. } => {
                drop(state);
                observer(result);
            }
            State::Waiting { waker, observer: None } => {
                *state = State::Ready(result);
                drop(state);
                if let Some(waker) = waker {
                    waker.wake();
                }
            }
            // Only one completer exists per slot and it is consumed.
            finished => *state = finished,
        }
    }
}

/// A value that will be available later.
#[must_use = "an Eventual does nothing unless awaited or observed"]
pub struct Eventual<T> {
    slot: Arc<Slot<T>>,
}

/// The write side of an `Eventual`.
pub struct Completer<T> {
    slot: Option<Arc<Slot<T>>>,
}

impl<T> std::fmt::Debug for Eventual<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Eventual").field("complete", &self.is_complete()).finish()
    }
}

impl<T> std::fmt::Debug for Completer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completer").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> Eventual<T> {
    /// A handle and the completer that resolves it.
    pub fn pending() -> (Completer<T>, Eventual<T>) {
        let slot = Arc::new(Slot { state: Mutex::new(State::Waiting { waker: None, observer: None }) });
        (Completer { slot: Some(slot.clone()) }, Eventual { slot })
    }

    fn resolved(result: Result<T>) -> Self {
        Eventual { slot: Arc::new(Slot { state: Mutex::new(State::Ready(result)) }) }
    }

    pub fn ready(value: T) -> Self {
        Self::resolved(Ok(value))
    }

    pub fn failed(error: impl Into<Error>) -> Self {
        Self::resolved(Err(error.into()))
    }

    /// Fails with a fault, which the caller sees as `Error::Remote`.
    pub fn fault(fault: Fault) -> Self {
        Self::failed(Error::Remote(fault))
    }

    /// Runs `observer` once with the outcome: now, if it is already known,
    /// or on the completing context otherwise.
    pub fn on_complete(self, observer: impl FnOnce(Result<T>) + Send + 'static) {
        let mut state = self.slot.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => {
                drop(state);
                observer(result);
            }
            State::Waiting { .. } => {
                *state = State::Waiting { waker: None, observer: Some(Box::new(observer)) };
            }
            State::Taken => {}
        }
    }

    /// Transforms the value once it arrives.
    pub fn map<U: Send + 'static>(self, f: impl FnOnce(T) -> U + Send + 'static) -> Eventual<U> {
        let (completer, mapped) = Eventual::pending();
        self.on_complete(move |result| completer.complete(result.map(f)));
        mapped
    }
}

impl<T> Eventual<T> {
    pub fn is_complete(&self) -> bool {
        matches!(*self.slot.lock(), State::Ready(_))
    }
}

impl<T> Future for Eventual<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T>> {
        let mut state = self.slot.lock();
        match std::mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => Poll::Ready(result),
            State::Waiting { observer, .. } => {
                *state = State::Waiting { waker: Some(cx.waker().clone()), observer };
                Poll::Pending
            }
            State::Taken => panic!("`Eventual` polled after completion"),
        }
    }
}

impl<T> Completer<T> {
    pub fn complete(mut self, result: Result<T>) {
        if let Some(slot) = self.slot.take() {
            slot.deliver(result);
        }
    }

    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    pub fn fail(self, error: impl Into<Error>) {
        self.complete(Err(error.into()));
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(slot) = self.slot.take() {
            slot.deliver(Err(Error::Abandoned));
        }
    }
}
