//! A single-assignment result cell, and the step-budgeted `await` helper
//! tests use to drive a simulation until a set of futures resolve (§4.G).
//!
//! Everything in this crate runs on one logical thread of control (§5), so
//! this is a plain `Rc<RefCell<..>>` cell rather than anything
//! synchronization-aware: there is no contention to guard against, only the
//! single-assignment invariant, which is a programming error if violated
//! (§7) and so is enforced with `assert!` rather than a `Result`.
use std::cell::RefCell;
use std::rc::Rc;

use crate::sim::Environment;
use crate::wire::WireMessage;
use crate::PaxosError;

type Callback = Box<dyn FnOnce(&WireMessage)>;

struct Inner {
    value: Option<WireMessage>,
    callbacks: Vec<Callback>,
}

/// A future resolved exactly once, by the client process that created it,
/// and observed by whatever test code is awaiting it.
#[derive(Clone)]
pub struct Future {
    inner: Rc<RefCell<Inner>>,
}

impl Future {
    pub fn new() -> Self {
        Future {
            inner: Rc::new(RefCell::new(Inner {
                value: None,
                callbacks: Vec::new(),
            })),
        }
    }

    pub fn has_value(&self) -> bool {
        self.inner.borrow().value.is_some()
    }

    /// Returns a clone of the resolved value. Panics if called before the
    /// future is resolved; callers should check `has_value` or go through
    /// `await_futures` first.
    pub fn value(&self) -> WireMessage {
        self.inner
            .borrow()
            .value
            .clone()
            .expect("Future::value called before the future was resolved")
    }

    /// Calls `fn` immediately if a value is already set, otherwise records
    /// it to fire exactly once when `set_value` is eventually called.
    pub fn subscribe(&self, callback: impl FnOnce(&WireMessage) + 'static) {
        let mut inner = self.inner.borrow_mut();
        if let Some(value) = &inner.value {
            // Borrow is not held across the callback: callbacks may
            // themselves subscribe to other futures.
            let value = value.clone();
            drop(inner);
            callback(&value);
        } else {
            inner.callbacks.push(Box::new(callback));
        }
    }

    /// Sets the value exactly once and fires every previously registered
    /// subscriber. Calling this twice is a programming error (§7).
    pub fn set_value(&self, value: WireMessage) {
        let callbacks = {
            let mut inner = self.inner.borrow_mut();
            assert!(inner.value.is_none(), "Future::set_value called twice");
            inner.value = Some(value);
            std::mem::take(&mut inner.callbacks)
        };
        let value = self.value();
        for callback in callbacks {
            callback(&value);
        }
    }
}

impl Default for Future {
    fn default() -> Self {
        Future::new()
    }
}

/// Default step budget for [`await_futures`], matching the reference
/// harness's `time_limit=100`.
pub const DEFAULT_AWAIT_BUDGET: usize = 100;

/// Steps `env` randomly until every future in `futures` is resolved or
/// `budget` steps have elapsed, whichever comes first.
///
/// Mirrors the reference `await()` helper precisely: the budget-exhausted
/// failure only fires if *none* of the futures resolved, not if some did
/// but not all - a caller awaiting a batch of concurrent requests can still
/// inspect whichever replies did arrive before the budget ran out.
pub fn await_futures(env: &mut Environment, futures: &[Future], budget: usize) -> crate::Result<()> {
    let start_time = env.time();
    while !futures.iter().all(Future::has_value) && env.time() - start_time < budget as u64 {
        env.step_randomly();
    }
    if !futures.iter().any(Future::has_value) {
        return Err(PaxosError::AwaitTimeout { budget });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn reply(value: &str) -> WireMessage {
        WireMessage::ClientReply {
            request_id: 0,
            value: value.to_string(),
            flag: None,
        }
    }

    #[test]
    fn subscriber_fires_immediately_if_already_set() {
        let f = Future::new();
        f.set_value(reply("v"));
        let seen = Rc::new(Cell::new(false));
        let seen2 = seen.clone();
        f.subscribe(move |_| seen2.set(true));
        assert!(seen.get());
    }

    #[test]
    fn subscriber_fires_exactly_once_on_later_set() {
        let f = Future::new();
        let count = Rc::new(Cell::new(0));
        let count2 = count.clone();
        f.subscribe(move |_| count2.set(count2.get() + 1));
        f.set_value(reply("v"));
        assert_eq!(count.get(), 1);
    }

    #[test]
    #[should_panic(expected = "set_value called twice")]
    fn set_value_twice_panics() {
        let f = Future::new();
        f.set_value(reply("a"));
        f.set_value(reply("b"));
    }
}
