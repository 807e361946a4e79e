#![forbid(unsafe_code)]

//! Effect values: deferred side effects that report messages back through a
//! dispatch callback.
//!
//! # Design
//!
//! An [`Effect`] is a boxed `FnOnce` over a [`Dispatch`] callback. The
//! producer describes the side effect; the consumer (a driver such as
//! [`Simulator`](crate::simulator::Simulator)) decides when to run it by
//! calling [`Effect::execute`]. The effect may invoke the callback zero, one,
//! or many times, synchronously before returning or later from an external
//! completion source — the callback is an `Rc` precisely so it can outlive
//! the invocation.
//!
//! Because an effect is `FnOnce`, "invoked at most once" is enforced by the
//! type system rather than a runtime guard.
//!
//! # Invariants
//!
//! 1. [`Effect::map`] preserves the invocation cardinality and timing of the
//!    underlying effect exactly; it only transforms the reported values.
//! 2. [`Effect::batch`] invokes every present member in list order with the
//!    same callback, without waiting for any to complete.
//! 3. An empty (or all-absent) batch performs no callback invocations.

use std::rc::Rc;
use tracing::trace;

/// The reporting callback handed to an effect.
///
/// Shared and clonable so an effect can stash it for later, asynchronous
/// deliveries (timers, completions, long-lived listeners).
pub type Dispatch<Msg> = Rc<dyn Fn(Msg)>;

/// A deferred, possibly-asynchronous side effect.
///
/// Consumed on execution. Producers build effects with [`Effect::new`] and
/// combine them with [`Effect::map`] and [`Effect::batch`].
pub struct Effect<Msg> {
    run: Box<dyn FnOnce(Dispatch<Msg>)>,
}

impl<Msg> std::fmt::Debug for Effect<Msg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Effect")
    }
}

impl<Msg: 'static> Effect<Msg> {
    /// Create an effect from a closure over the dispatch callback.
    pub fn new(run: impl FnOnce(Dispatch<Msg>) + 'static) -> Self {
        Self { run: Box::new(run) }
    }

    /// An effect that does nothing.
    #[must_use]
    pub fn none() -> Self {
        Self::new(|_| {})
    }

    /// Run the effect, handing it the reporting callback.
    pub fn execute(self, dispatch: Dispatch<Msg>) {
        (self.run)(dispatch);
    }

    /// Transform every message this effect reports with `f`.
    ///
    /// The underlying effect runs unchanged; each value it delivers is passed
    /// through `f` before reaching the outer callback, whether the delivery
    /// happens synchronously or later.
    #[must_use]
    pub fn map<Out: 'static>(self, f: impl Fn(Msg) -> Out + 'static) -> Effect<Out> {
        Effect::new(move |dispatch: Dispatch<Out>| {
            let wrapped: Dispatch<Msg> = Rc::new(move |msg| dispatch(f(msg)));
            self.execute(wrapped);
        })
    }

    /// Combine independent effects into one.
    ///
    /// Absent members are skipped. Present members are invoked in list order
    /// with the same callback; completion order of asynchronous members is
    /// up to them. There is no aggregate cancellation.
    #[must_use]
    pub fn batch<I>(effects: I) -> Self
    where
        I: IntoIterator<Item = Option<Effect<Msg>>>,
    {
        let effects: Vec<Effect<Msg>> = effects.into_iter().flatten().collect();
        if effects.is_empty() {
            return Self::none();
        }
        Self::new(move |dispatch| {
            trace!(count = effects.len(), "executing effect batch");
            for effect in effects {
                effect.execute(Rc::clone(&dispatch));
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn collector() -> (Rc<RefCell<Vec<i32>>>, Dispatch<i32>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let dispatch: Dispatch<i32> = Rc::new(move |msg| sink.borrow_mut().push(msg));
        (seen, dispatch)
    }

    #[test]
    fn map_transforms_every_delivery() {
        let effect = Effect::new(|dispatch: Dispatch<i32>| {
            dispatch(1);
            dispatch(2);
            dispatch(3);
        });
        let (seen, dispatch) = collector();
        effect.map(|n| n * 10).execute(dispatch);
        assert_eq!(*seen.borrow(), vec![10, 20, 30]);
    }

    #[test]
    fn map_preserves_zero_deliveries() {
        let effect: Effect<i32> = Effect::none();
        let (seen, dispatch) = collector();
        effect.map(|n| n + 1).execute(dispatch);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn map_forwards_deliveries_made_after_execute_returns() {
        // A long-lived effect stashes its callback and reports later, the way
        // a timer or listener would.
        let stash: Rc<RefCell<Option<Dispatch<i32>>>> = Rc::new(RefCell::new(None));
        let slot = Rc::clone(&stash);
        let effect = Effect::new(move |dispatch: Dispatch<i32>| {
            *slot.borrow_mut() = Some(dispatch);
        });

        let (seen, dispatch) = collector();
        effect.map(|n| n - 1).execute(dispatch);
        assert!(seen.borrow().is_empty());

        let stashed = stash.borrow_mut().take();
        if let Some(deliver) = stashed {
            deliver(8);
        }
        assert_eq!(*seen.borrow(), vec![7]);
    }

    #[test]
    fn batch_of_nothing_is_a_noop() {
        let (seen, dispatch) = collector();
        Effect::batch([]).execute(dispatch);
        assert!(seen.borrow().is_empty());

        let (seen, dispatch) = collector();
        Effect::batch([None, None]).execute(dispatch);
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn batch_invokes_members_in_list_order_with_same_callback() {
        let first = Effect::new(|dispatch: Dispatch<i32>| dispatch(1));
        let second = Effect::new(|dispatch: Dispatch<i32>| {
            dispatch(2);
            dispatch(3);
        });
        let (seen, dispatch) = collector();
        Effect::batch([Some(first), None, Some(second)]).execute(dispatch);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }

    #[test]
    fn nested_batches_flatten_delivery_order() {
        let inner = Effect::batch([
            Some(Effect::new(|d: Dispatch<i32>| d(2))),
            Some(Effect::new(|d: Dispatch<i32>| d(3))),
        ]);
        let outer = Effect::batch([Some(Effect::new(|d: Dispatch<i32>| d(1))), Some(inner)]);
        let (seen, dispatch) = collector();
        outer.execute(dispatch);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
    }
}
