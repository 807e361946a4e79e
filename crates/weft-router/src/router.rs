#![forbid(unsafe_code)]

//! Route sources and the controlled router.
//!
//! # Design
//!
//! A [`RouteSource`] is anything that exposes an ongoing stream of route
//! values as a subscription factory — the browser-history equivalent in a
//! host application, or a [`ControlledRouter`] in tests and in the routing
//! host's continuation machinery.
//!
//! [`ControlledRouter`] is a single-slot broadcast primitive: it remembers
//! the last emitted value and replays it to each new subscriber on start
//! (replay-one), then notifies every registered listener, in registration
//! order, on each emit. One fresh instance is created per keyed mount and
//! discarded with it, so listener registries never leak across mounts.
//!
//! Listener registration happens inside the subscription's effect, which is
//! `FnOnce` — re-registration through the same subscription is
//! unrepresentable, so no idempotence guard is needed.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::trace;
use weft_core::{Dispatch, Disposer, Effect, Subscription};

/// An ongoing source of route values, exposed as a subscription factory.
pub trait RouteSource<Route> {
    fn subscribe(&self) -> Subscription<Route>;
}

struct RouterInner<Route> {
    last: RefCell<Route>,
    listeners: RefCell<Vec<(u64, Dispatch<Route>)>>,
    next_listener: Cell<u64>,
}

impl<Route: Clone + 'static> RouterInner<Route> {
    fn subscription(self: &Rc<Self>) -> Subscription<Route> {
        let id = self.next_listener.get();
        self.next_listener.set(id + 1);

        let register = Rc::clone(self);
        let effect = Effect::new(move |dispatch: Dispatch<Route>| {
            register
                .listeners
                .borrow_mut()
                .push((id, Rc::clone(&dispatch)));
            let last = register.last.borrow().clone();
            dispatch(last);
        });

        let unregister = Rc::clone(self);
        let cancel = Disposer::new(move || {
            unregister
                .listeners
                .borrow_mut()
                .retain(|(listener, _)| *listener != id);
        });

        Subscription { effect, cancel }
    }
}

/// A single-slot broadcast router that can be driven programmatically.
///
/// Cloning yields another handle to the same slot and listener registry.
pub struct ControlledRouter<Route> {
    inner: Rc<RouterInner<Route>>,
}

impl<Route> Clone for ControlledRouter<Route> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<Route: Clone + 'static> ControlledRouter<Route> {
    #[must_use]
    pub fn new(initial: Route) -> Self {
        Self {
            inner: Rc::new(RouterInner {
                last: RefCell::new(initial),
                listeners: RefCell::new(Vec::new()),
                next_listener: Cell::new(0),
            }),
        }
    }

    /// A subscribe-only view of this router, safe to hand to mounted
    /// programs.
    #[must_use]
    pub fn handle(&self) -> RouterHandle<Route> {
        RouterHandle {
            inner: Rc::clone(&self.inner),
        }
    }

    /// An effect that stores `value` as the last-known route and
    /// synchronously notifies every registered listener, in registration
    /// order. The effect reports nothing through its own callback.
    #[must_use]
    pub fn emit<Msg: 'static>(&self, value: Route) -> Effect<Msg> {
        let inner = Rc::clone(&self.inner);
        Effect::new(move |_dispatch| {
            *inner.last.borrow_mut() = value.clone();
            // Snapshot so a listener that subscribes mid-notification does
            // not shift the iteration.
            let listeners: Vec<Dispatch<Route>> = inner
                .listeners
                .borrow()
                .iter()
                .map(|(_, listener)| Rc::clone(listener))
                .collect();
            trace!(listeners = listeners.len(), "broadcasting route value");
            for listener in listeners {
                listener(value.clone());
            }
        })
    }
}

impl<Route: Clone + 'static> RouteSource<Route> for ControlledRouter<Route> {
    fn subscribe(&self) -> Subscription<Route> {
        self.inner.subscription()
    }
}

/// A subscribe-only handle to a [`ControlledRouter`].
pub struct RouterHandle<Route> {
    inner: Rc<RouterInner<Route>>,
}

impl<Route> Clone for RouterHandle<Route> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<Route: Clone + 'static> RouteSource<Route> for RouterHandle<Route> {
    fn subscribe(&self) -> Subscription<Route> {
        self.inner.subscription()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collector() -> (Rc<RefCell<Vec<String>>>, Dispatch<String>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let dispatch: Dispatch<String> = Rc::new(move |msg| sink.borrow_mut().push(msg));
        (seen, dispatch)
    }

    fn emit(router: &ControlledRouter<String>, value: &str) {
        router
            .emit::<()>(value.to_string())
            .execute(Rc::new(|()| {}));
    }

    #[test]
    fn subscriber_immediately_receives_the_last_value() {
        let router = ControlledRouter::new("/".to_string());
        let (seen, dispatch) = collector();
        router.subscribe().effect.execute(dispatch);
        assert_eq!(*seen.borrow(), vec!["/"]);
    }

    #[test]
    fn late_subscriber_sees_the_latest_emit_not_the_initial_value() {
        let router = ControlledRouter::new("/".to_string());
        emit(&router, "/settings");

        let (seen, dispatch) = collector();
        router.handle().subscribe().effect.execute(dispatch);
        assert_eq!(*seen.borrow(), vec!["/settings"]);
    }

    #[test]
    fn listeners_are_notified_in_registration_order() {
        let router = ControlledRouter::new("r0".to_string());
        let order = Rc::new(RefCell::new(Vec::new()));

        for name in ["first", "second"] {
            let order = Rc::clone(&order);
            let dispatch: Dispatch<String> =
                Rc::new(move |route| order.borrow_mut().push(format!("{name}:{route}")));
            router.subscribe().effect.execute(dispatch);
        }
        order.borrow_mut().clear();

        emit(&router, "r1");
        assert_eq!(*order.borrow(), vec!["first:r1", "second:r1"]);
    }

    #[test]
    fn cancel_removes_only_that_listener() {
        let router = ControlledRouter::new("r0".to_string());
        let (kept, kept_dispatch) = collector();
        let (dropped, dropped_dispatch) = collector();

        let keep = router.subscribe();
        keep.effect.execute(kept_dispatch);
        let leave = router.subscribe();
        leave.effect.execute(dropped_dispatch);
        leave.cancel.dispose();

        emit(&router, "r1");
        assert_eq!(*kept.borrow(), vec!["r0", "r1"]);
        assert_eq!(*dropped.borrow(), vec!["r0"]);
    }
}
