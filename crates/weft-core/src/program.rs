#![forbid(unsafe_code)]

//! Program values: a self-contained state machine bundling an initial state
//! and effect, a pure reducer, a render function, and an optional teardown.
//!
//! # Design
//!
//! A [`Program`] is a value, not a trait object with `&mut self` methods:
//! reducers take the current model by reference and return a fresh snapshot,
//! so composed sibling programs never share writable state. The `update` and
//! `view` closures are `Rc`-shared so wrappers (subscription reconciliation,
//! composition, routing) can destructure a program and re-wrap its parts.
//!
//! # Type erasure
//!
//! Hosts that mount heterogeneous programs — the routing host swaps programs
//! with unrelated model and message types, and positional composition holds a
//! list of them — work with [`DynProgram`]: messages are `Box<dyn Any>`,
//! models are `Rc<dyn Any>`. [`Program::erased`] produces the erased form;
//! the `Rc` model slots are what make shallow state-array copies cheap and
//! slot identity observable.

use crate::effect::{Dispatch, Effect};
use std::any::Any;
use std::rc::Rc;

/// The result of applying a reducer: the next model plus an optional effect.
pub type Change<Msg, Model> = (Model, Option<Effect<Msg>>);

/// Reducer shape shared by [`Program`] and its wrappers.
pub type UpdateFn<Msg, Model> = dyn Fn(Msg, &Model) -> Change<Msg, Model>;

/// Render shape shared by [`Program`] and its wrappers.
pub type ViewFn<Msg, Model, View> = dyn Fn(&Model, Dispatch<Msg>) -> View;

/// Teardown hook; consumed when the program is unmounted.
pub type DoneFn<Model> = Box<dyn FnOnce(&Model)>;

/// A message carried across an erasure boundary.
pub type DynMsg = Box<dyn Any>;

/// A model snapshot carried across an erasure boundary.
pub type SharedModel = Rc<dyn Any>;

/// A program whose message and model types have been erased.
pub type DynProgram<View> = Program<DynMsg, SharedModel, View>;

/// A self-contained state machine.
///
/// Constructed once per mount and discarded on remount or teardown. The
/// fields are public so wrappers can take the program apart; most callers
/// should go through [`Program::new`].
pub struct Program<Msg, Model, View> {
    /// Initial model and startup effect, applied exactly once at mount.
    pub init: Change<Msg, Model>,
    /// Pure reducer.
    pub update: Rc<UpdateFn<Msg, Model>>,
    /// Pure render function.
    pub view: Rc<ViewFn<Msg, Model, View>>,
    /// Optional teardown, run at most once between this program's `init`
    /// and the next program's `init` at the same mount slot.
    pub done: Option<DoneFn<Model>>,
}

impl<Msg: 'static, Model: 'static, View: 'static> Program<Msg, Model, View> {
    /// Build a program from its initial change, reducer, and render function.
    pub fn new(
        init: Change<Msg, Model>,
        update: impl Fn(Msg, &Model) -> Change<Msg, Model> + 'static,
        view: impl Fn(&Model, Dispatch<Msg>) -> View + 'static,
    ) -> Self {
        Self {
            init,
            update: Rc::new(update),
            view: Rc::new(view),
            done: None,
        }
    }

    /// Attach a teardown hook.
    #[must_use]
    pub fn with_done(mut self, done: impl FnOnce(&Model) + 'static) -> Self {
        self.done = Some(Box::new(done));
        self
    }

    /// Erase the message and model types so the program can live in a
    /// heterogeneous host.
    ///
    /// # Panics
    ///
    /// The erased reducer and render function panic if handed a message or
    /// model of the wrong concrete type. Hosts in this workspace only route
    /// a program its own re-tagged messages and its own model slot, so a
    /// mismatch indicates a host bug, not a recoverable condition.
    #[must_use]
    pub fn erased(self) -> DynProgram<View> {
        let Program {
            init,
            update,
            view,
            done,
        } = self;

        let (model, effect) = init;
        let init: Change<DynMsg, SharedModel> =
            (Rc::new(model) as SharedModel, effect.map(box_messages));

        let erased_update: Rc<UpdateFn<DynMsg, SharedModel>> =
            Rc::new(move |msg: DynMsg, model: &SharedModel| {
                let msg = downcast_msg::<Msg>(msg);
                let model = downcast_model::<Model>(model);
                let (next, effect) = update(msg, model);
                (Rc::new(next) as SharedModel, effect.map(box_messages))
            });

        let erased_view: Rc<ViewFn<DynMsg, SharedModel, View>> =
            Rc::new(move |model: &SharedModel, dispatch: Dispatch<DynMsg>| {
                let model = downcast_model::<Model>(model);
                let inner: Dispatch<Msg> = Rc::new(move |msg| dispatch(Box::new(msg)));
                view(model, inner)
            });

        let erased_done = done.map(|done| {
            Box::new(move |model: &SharedModel| {
                done(downcast_model::<Model>(model));
            }) as DoneFn<SharedModel>
        });

        Program {
            init,
            update: erased_update,
            view: erased_view,
            done: erased_done,
        }
    }
}

fn box_messages<Msg: 'static>(effect: Effect<Msg>) -> Effect<DynMsg> {
    effect.map(|msg| Box::new(msg) as DynMsg)
}

fn downcast_msg<Msg: 'static>(msg: DynMsg) -> Msg {
    match msg.downcast::<Msg>() {
        Ok(msg) => *msg,
        Err(_) => panic!("erased program received a message of a foreign type"),
    }
}

fn downcast_model<Model: 'static>(model: &SharedModel) -> &Model {
    model
        .downcast_ref::<Model>()
        .unwrap_or_else(|| panic!("erased program received a model of a foreign type"))
}
