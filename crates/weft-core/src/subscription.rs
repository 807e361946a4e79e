#![forbid(unsafe_code)]

//! Subscription reconciliation: keeping long-lived effect sources in sync
//! with the set a program currently declares.
//!
//! # Design
//!
//! A [`Subscription`] is a started, cancelable effect source. Programs do not
//! start or stop subscriptions themselves; they declare the set they want
//! after every state change as a [`SubMap`] (stable key → factory), and
//! [`reconcile`] diffs that declaration against the set already running:
//!
//! - key only in the active set → its disposer runs, the key is dropped;
//! - key only in the declared set → its factory runs exactly once, the new
//!   effect joins the returned batch, the cancel is stored under the key;
//! - key in both → the existing disposer is carried forward untouched, so a
//!   persistent connection or timer survives unrelated state changes.
//!
//! The active map is owned exclusively by the wrapper instance that
//! [`with_subscriptions`] creates — it lives behind an `Rc<RefCell<..>>`
//! captured by the wrapper's closures, never inside the model snapshot.
//!
//! # Invariants
//!
//! 1. Per key, factory and cancel calls strictly alternate, starting with
//!    factory; factory count minus cancel count is always 0 or 1.
//! 2. A disposer runs at most once (it is `FnOnce`).
//! 3. Reconcile order is deterministic: removals in key order, then starts
//!    in key order.

use crate::effect::Effect;
use crate::program::{Change, DoneFn, Program, UpdateFn};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::debug;

/// A nullary stop procedure, invoked at most once.
pub struct Disposer(Box<dyn FnOnce()>);

impl Disposer {
    pub fn new(stop: impl FnOnce() + 'static) -> Self {
        Self(Box::new(stop))
    }

    /// Run the stop procedure, consuming the disposer.
    pub fn dispose(self) {
        (self.0)();
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Disposer")
    }
}

/// A clonable handle to a disposer that must ride inside clonable model
/// snapshots (the routing host keeps its upstream cancel this way).
///
/// The first `dispose` call runs the underlying stop procedure; later calls
/// on any clone are no-ops.
#[derive(Clone)]
pub struct SharedDisposer {
    inner: Rc<RefCell<Option<Disposer>>>,
}

impl SharedDisposer {
    #[must_use]
    pub fn new(disposer: Disposer) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Some(disposer))),
        }
    }

    pub fn dispose(&self) {
        if let Some(disposer) = self.inner.borrow_mut().take() {
            disposer.dispose();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().is_none()
    }
}

impl std::fmt::Debug for SharedDisposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedDisposer")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// A started, cancelable, long-lived effect source.
pub struct Subscription<Msg> {
    /// Delivers ongoing values; may hold its callback indefinitely.
    pub effect: Effect<Msg>,
    /// Stops the source. Must be called exactly once by the sole owner.
    pub cancel: Disposer,
}

impl<Msg: 'static> Subscription<Msg> {
    /// Transform the messages this subscription delivers.
    #[must_use]
    pub fn map<Out: 'static>(self, f: impl Fn(Msg) -> Out + 'static) -> Subscription<Out> {
        Subscription {
            effect: self.effect.map(f),
            cancel: self.cancel,
        }
    }

    /// Merge several subscriptions into one: all effects start together and
    /// the combined cancel stops every member.
    #[must_use]
    pub fn batch(subscriptions: Vec<Subscription<Msg>>) -> Subscription<Msg> {
        let mut effects = Vec::with_capacity(subscriptions.len());
        let mut cancels = Vec::with_capacity(subscriptions.len());
        for subscription in subscriptions {
            effects.push(Some(subscription.effect));
            cancels.push(subscription.cancel);
        }
        Subscription {
            effect: Effect::batch(effects),
            cancel: Disposer::new(move || {
                for cancel in cancels {
                    cancel.dispose();
                }
            }),
        }
    }
}

type SubscriptionFactory<Msg> = Box<dyn FnOnce() -> Subscription<Msg>>;

/// The set of subscriptions a program currently wants, keyed by stable
/// string. Recomputed after every state change.
pub struct SubMap<Msg> {
    entries: BTreeMap<String, SubscriptionFactory<Msg>>,
}

impl<Msg: 'static> SubMap<Msg> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Declare a subscription under `key`. The factory runs only if the key
    /// is not already active.
    #[must_use]
    pub fn with(
        mut self,
        key: impl Into<String>,
        factory: impl FnOnce() -> Subscription<Msg> + 'static,
    ) -> Self {
        self.insert(key, factory);
        self
    }

    pub fn insert(
        &mut self,
        key: impl Into<String>,
        factory: impl FnOnce() -> Subscription<Msg> + 'static,
    ) {
        self.entries.insert(key.into(), Box::new(factory));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<Msg: 'static> Default for SubMap<Msg> {
    fn default() -> Self {
        Self::new()
    }
}

/// Active subscriptions: key → disposer for the running source.
pub type CancelMap = BTreeMap<String, Disposer>;

/// Diff the declared set against the active set.
///
/// Cancels for dropped keys are wrapped as effects in the returned batch
/// (they run when the batch runs); factories for fresh keys run immediately
/// and their effects join the batch. Keys present on both sides keep their
/// existing disposer and produce no new effect.
pub fn reconcile<Msg: 'static>(active: &mut CancelMap, declared: SubMap<Msg>) -> Effect<Msg> {
    let mut declared = declared.entries;
    let mut effects: Vec<Option<Effect<Msg>>> = Vec::new();

    let dropped: Vec<String> = active
        .keys()
        .filter(|key| !declared.contains_key(*key))
        .cloned()
        .collect();
    for key in dropped {
        if let Some(disposer) = active.remove(&key) {
            debug!(key = %key, "stopping subscription");
            effects.push(Some(Effect::new(move |_| disposer.dispose())));
        }
    }

    let fresh: Vec<String> = declared
        .keys()
        .filter(|key| !active.contains_key(*key))
        .cloned()
        .collect();
    for key in fresh {
        if let Some(factory) = declared.remove(&key) {
            debug!(key = %key, "starting subscription");
            let Subscription { effect, cancel } = factory();
            effects.push(Some(effect));
            active.insert(key, cancel);
        }
    }

    Effect::batch(effects)
}

/// Wrap a program with a declarative subscription function.
///
/// On init the declared set is reconciled against an empty active map and
/// the resulting effect is merged with the program's own initial effect; on
/// every update the set is recomputed from the new model and reconciled
/// against the stored active map; on teardown everything still active is
/// cancelled before the inner `done` runs.
pub fn with_subscriptions<Msg, Model, View>(
    program: Program<Msg, Model, View>,
    subscriptions: impl Fn(&Model) -> SubMap<Msg> + 'static,
) -> Program<Msg, Model, View>
where
    Msg: 'static,
    Model: 'static,
    View: 'static,
{
    let Program {
        init,
        update: inner_update,
        view,
        done: inner_done,
    } = program;

    let active: Rc<RefCell<CancelMap>> = Rc::new(RefCell::new(CancelMap::new()));
    let subscriptions = Rc::new(subscriptions);

    let (model, effect) = init;
    let sub_effect = reconcile(&mut active.borrow_mut(), subscriptions(&model));
    let init = (model, Some(Effect::batch([effect, Some(sub_effect)])));

    let update: Rc<UpdateFn<Msg, Model>> = {
        let active = Rc::clone(&active);
        let subscriptions = Rc::clone(&subscriptions);
        Rc::new(move |msg: Msg, model: &Model| -> Change<Msg, Model> {
            let (next, effect) = inner_update(msg, model);
            let sub_effect = reconcile(&mut active.borrow_mut(), subscriptions(&next));
            (next, Some(Effect::batch([effect, Some(sub_effect)])))
        })
    };

    let done: Option<DoneFn<Model>> = Some(Box::new(move |model: &Model| {
        let cancel_all = reconcile(&mut active.borrow_mut(), SubMap::<Msg>::new());
        cancel_all.execute(Rc::new(|_| {}));
        if let Some(done) = inner_done {
            done(model);
        }
    }));

    Program {
        init,
        update,
        view,
        done,
    }
}
