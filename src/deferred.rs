//! Single-assignment futures.
//!
//! A [`Deferred`] is the write end and a [`Promise`] the read end of one asynchronous result.
//! Settling runs every registered continuation synchronously, in registration order, on the
//! thread that settles; continuations registered after settlement run immediately. A promise
//! is also a [`std::future::Future`], so it can be awaited from any executor.

use crate::error::RenderError;
use core::fmt;
use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, Waker};
use parking_lot::Mutex;
use std::sync::Arc;

type Continuation<T> = Box<dyn FnOnce(Result<T, RenderError>) + Send>;

enum Slot<T> {
    Pending {
        continuations: Vec<Continuation<T>>,
        wakers: Vec<Waker>,
    },
    Settled(Result<T, RenderError>),
}

struct Shared<T> {
    slot: Mutex<Slot<T>>,
}

impl<T> Shared<T> {
    fn pending() -> Arc<Shared<T>> {
        Arc::new(Shared {
            slot: Mutex::new(Slot::Pending {
                continuations: Vec::new(),
                wakers: Vec::new(),
            }),
        })
    }
}

/// The write end of a future; settles at most once.
pub struct Deferred<T> {
    shared: Arc<Shared<T>>,
}

/// A read-only view of a [`Deferred`].
pub struct Promise<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Deferred {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + 'static> Default for Deferred<T> {
    fn default() -> Self {
        Deferred::new()
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    pub fn new() -> Deferred<T> {
        Deferred {
            shared: Shared::pending(),
        }
    }

    /// Resolves with a value. Returns false if already settled.
    pub fn resolve(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Rejects with an error. Returns false if already settled.
    pub fn reject(&self, error: RenderError) -> bool {
        self.settle(Err(error))
    }

    /// Settles with a result. Returns false if already settled, in which case nothing happens.
    pub fn settle(&self, result: Result<T, RenderError>) -> bool {
        let (continuations, wakers) = {
            let mut slot = self.shared.slot.lock();
            match &mut *slot {
                Slot::Settled(_) => return false,
                Slot::Pending {
                    continuations,
                    wakers,
                } => {
                    let taken = (
                        std::mem::take(continuations),
                        std::mem::take(wakers),
                    );
                    *slot = Slot::Settled(result.clone());
                    taken
                }
            }
        };

        for waker in wakers {
            waker.wake();
        }
        for continuation in continuations {
            continuation(result.clone());
        }
        true
    }

    /// Returns the read end.
    pub fn promise(&self) -> Promise<T> {
        Promise {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_settled(&self) -> bool {
        self.promise().is_settled()
    }
}

impl<T: Clone + Send + 'static> Promise<T> {
    /// Returns an already resolved promise.
    pub fn resolved(value: T) -> Promise<T> {
        let deferred = Deferred::new();
        deferred.resolve(value);
        deferred.promise()
    }

    /// Returns an already rejected promise.
    pub fn rejected(error: RenderError) -> Promise<T> {
        let deferred = Deferred::new();
        deferred.reject(error);
        deferred.promise()
    }

    /// Registers a continuation for the result.
    ///
    /// Runs immediately if the promise has already settled.
    pub fn then<F>(&self, continuation: F)
    where
        F: FnOnce(Result<T, RenderError>) + Send + 'static,
    {
        let result = {
            let mut slot = self.shared.slot.lock();
            match &mut *slot {
                Slot::Pending { continuations, .. } => {
                    continuations.push(Box::new(continuation));
                    return;
                }
                Slot::Settled(result) => result.clone(),
            }
        };
        continuation(result);
    }

    /// Registers a continuation that only runs on success.
    pub fn done<F>(&self, on_done: F)
    where
        F: FnOnce(T) + Send + 'static,
    {
        self.then(move |result| {
            if let Ok(value) = result {
                on_done(value);
            }
        });
    }

    /// Registers a continuation that only runs on failure.
    pub fn fail<F>(&self, on_fail: F)
    where
        F: FnOnce(RenderError) + Send + 'static,
    {
        self.then(move |result| {
            if let Err(error) = result {
                on_fail(error);
            }
        });
    }

    /// Chains a fallible step onto a successful result.
    pub fn and_then<U, F>(&self, step: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Result<U, RenderError> + Send + 'static,
    {
        let next = Deferred::new();
        let promise = next.promise();
        self.then(move |result| {
            next.settle(result.and_then(step));
        });
        promise
    }

    /// Chains a step that itself returns a promise.
    pub fn and_then_promise<U, F>(&self, step: F) -> Promise<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> Promise<U> + Send + 'static,
    {
        let next = Deferred::new();
        let promise = next.promise();
        self.then(move |result| match result {
            Ok(value) => step(value).then(move |result| {
                next.settle(result);
            }),
            Err(error) => {
                next.reject(error);
            }
        });
        promise
    }

    /// Returns the result if the promise has settled.
    pub fn result(&self) -> Option<Result<T, RenderError>> {
        match &*self.shared.slot.lock() {
            Slot::Pending { .. } => None,
            Slot::Settled(result) => Some(result.clone()),
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.shared.slot.lock(), Slot::Settled(_))
    }

    /// Whether both promises read the same deferred.
    pub fn ptr_eq(&self, other: &Promise<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone> Future for Promise<T> {
    type Output = Result<T, RenderError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut slot = self.shared.slot.lock();
        match &mut *slot {
            Slot::Settled(result) => Poll::Ready(result.clone()),
            Slot::Pending { wakers, .. } => {
                if !wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = match &*self.shared.slot.lock() {
            Slot::Pending { .. } => "pending",
            Slot::Settled(Ok(_)) => "resolved",
            Slot::Settled(Err(_)) => "rejected",
        };
        f.debug_tuple("Promise").field(&state).finish()
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("Deferred")
            .field(&Promise {
                shared: Arc::clone(&self.shared),
            })
            .finish()
    }
}

/// Combines promises into one that resolves with all values, in input order, once every input
/// has resolved.
///
/// Rejects with the first rejection; later results are ignored.
pub fn when<T: Clone + Send + 'static>(promises: Vec<Promise<T>>) -> Promise<Vec<T>> {
    let all = Deferred::new();
    let total = promises.len();
    if total == 0 {
        all.resolve(Vec::new());
        return all.promise();
    }

    let collected: Arc<Mutex<(Vec<Option<T>>, usize)>> =
        Arc::new(Mutex::new(((0..total).map(|_| None).collect(), 0)));

    for (index, promise) in promises.into_iter().enumerate() {
        let all = all.clone();
        let collected = Arc::clone(&collected);
        promise.then(move |result| match result {
            Ok(value) => {
                let values = {
                    let mut collected = collected.lock();
                    collected.0[index] = Some(value);
                    collected.1 += 1;
                    if collected.1 == total {
                        Some(collected.0.drain(..).flatten().collect::<Vec<_>>())
                    } else {
                        None
                    }
                };
                if let Some(values) = values {
                    all.resolve(values);
                }
            }
            Err(error) => {
                all.reject(error);
            }
        });
    }

    all.promise()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn settles_once() {
        let deferred = Deferred::new();
        assert!(deferred.resolve(1), "first resolution should win");
        assert!(!deferred.resolve(2), "second resolution should be ignored");
        assert!(!deferred.reject(RenderError::Superseded), "rejection after resolution is ignored");
        assert_eq!(deferred.promise().result(), Some(Ok(1)));
    }

    #[test]
    fn every_subscriber_sees_the_result() {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let seen = Arc::clone(&seen);
            promise.done(move |value: &'static str| seen.lock().push((i, value)));
        }
        assert!(seen.lock().is_empty(), "continuations should wait for settlement");

        deferred.resolve("ok");
        let late = Arc::clone(&seen);
        promise.done(move |value| late.lock().push((3, value)));

        assert_eq!(
            *seen.lock(),
            vec![(0, "ok"), (1, "ok"), (2, "ok"), (3, "ok")],
            "subscribers should run in registration order, late ones immediately"
        );
    }

    #[test]
    fn chains_and_fails() {
        let deferred = Deferred::new();
        let chained = deferred
            .promise()
            .and_then(|n: u32| Ok(n * 2))
            .and_then(|n| if n > 5 { Err(RenderError::Template("too big".into())) } else { Ok(n) });
        deferred.resolve(4);
        assert_eq!(
            chained.result(),
            Some(Err(RenderError::Template("too big".into())))
        );
    }

    #[test]
    fn when_waits_for_all() {
        let a = Deferred::new();
        let b = Deferred::new();
        let all = when(vec![a.promise(), b.promise()]);

        b.resolve("b");
        assert!(!all.is_settled(), "one input still pending");
        a.resolve("a");
        assert_eq!(all.result(), Some(Ok(vec!["a", "b"])), "values keep input order");
    }

    #[test]
    fn when_fails_fast() {
        let a: Deferred<u8> = Deferred::new();
        let b = Deferred::new();
        let all = when(vec![a.promise(), b.promise()]);

        b.reject(RenderError::Insertion("nope".into()));
        assert_eq!(all.result(), Some(Err(RenderError::Insertion("nope".into()))));
        a.resolve(1);
        assert_eq!(
            all.result(),
            Some(Err(RenderError::Insertion("nope".into()))),
            "late successes do not change the aggregate"
        );
    }

    #[test]
    fn when_of_nothing_resolves() {
        let all = when::<u8>(Vec::new());
        assert_eq!(all.result(), Some(Ok(Vec::new())));
    }

    #[test]
    fn awaits_as_a_future() {
        let deferred = Deferred::new();
        let promise = deferred.promise();
        let resolver = std::thread::spawn(move || {
            deferred.resolve(7u8);
        });
        assert_eq!(block_on(promise), Ok(7));
        resolver.join().unwrap();
    }
}
