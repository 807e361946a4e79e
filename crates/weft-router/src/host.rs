#![forbid(unsafe_code)]

//! The routing host: mounts, replaces, and tears down sub-programs in
//! response to a stream of route values.
//!
//! # Design
//!
//! [`routed_program`] builds an ordinary [`Program`] whose reducer owns one
//! "active" sub-program slot. Each new route value is classified by the
//! integrator's `get_route_program` into one of three outcomes, modeled as
//! the closed [`RouteProgram`] enum so every consumer matches exhaustively:
//!
//! - **`Program`** — mount it now, tearing down the current one.
//! - **`Pending`** — raise the transitioning flag and issue an effect that
//!   reports the load result back into the reducer.
//! - **`Keyed`** — identity-preserving continuation. If a program with an
//!   equal key is already mounted, the new route is pushed into that mount's
//!   [`ControlledRouter`] instead of remounting, so route-parameter changes
//!   reach the program without discarding its local state. Otherwise a fresh
//!   controlled router is seeded with the route and the factory builds the
//!   program around a subscribe-only handle.
//!
//! [`KeyedProgram`] has private fields: the only way to produce one is
//! [`RouteProgram::keyed`], which keeps the key-continuity bookkeeping
//! honest at compile time.
//!
//! # Transition and teardown ordering
//!
//! A full transition initializes the incoming program, then batches its
//! initial effect with an effect that runs the outgoing program's `done` on
//! its final model — both issued in the same step. The teardown hook for a
//! mount lives in an `Rc<RefCell<Option<..>>>` and is taken exactly once, so
//! overlapping asynchronous loads can never tear the same mount down twice.
//! Host teardown runs the active program's `done`, then cancels the
//! upstream route subscription.

use crate::error::LoadError;
use crate::router::{ControlledRouter, RouteSource, RouterHandle};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, info, warn};
use weft_core::{
    Change, Dispatch, DoneFn, DynMsg, DynProgram, Effect, Program, SharedDisposer, SharedModel,
    Subscription, UpdateFn, ViewFn,
};

/// The outcome of classifying one route value.
pub enum RouteProgram<Route, View> {
    /// Mount this program immediately.
    Program(DynProgram<View>),
    /// The program is obtained asynchronously.
    Pending(PendingProgram<View>),
    /// Reuse the current mount if its key matches; build via the factory
    /// otherwise.
    Keyed(KeyedProgram<Route, View>),
}

impl<Route: Clone + 'static, View: 'static> RouteProgram<Route, View> {
    /// Request an identity-preserving continuation under `key`.
    ///
    /// `make` receives a subscribe-only handle to the mount's controlled
    /// router; the program it builds should subscribe to that handle to
    /// observe later route values with the same key.
    pub fn keyed(
        key: impl Into<String>,
        make: impl FnOnce(RouterHandle<Route>) -> DynProgram<View> + 'static,
    ) -> Self {
        Self::Keyed(KeyedProgram {
            key: key.into(),
            make: Box::new(make),
        })
    }
}

/// A continuation request. Constructible only through
/// [`RouteProgram::keyed`].
pub struct KeyedProgram<Route, View> {
    key: String,
    make: Box<dyn FnOnce(RouterHandle<Route>) -> DynProgram<View>>,
}

impl<Route, View> KeyedProgram<Route, View> {
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// A program that arrives later: an effect that reports the load result.
pub struct PendingProgram<View> {
    load: Effect<Result<DynProgram<View>, LoadError>>,
}

impl<View: 'static> PendingProgram<View> {
    #[must_use]
    pub fn new(load: Effect<Result<DynProgram<View>, LoadError>>) -> Self {
        Self { load }
    }

    /// Build from a closure over the result callback — the usual shape for
    /// wrapping a deferred loader.
    pub fn from_fn(
        load: impl FnOnce(Dispatch<Result<DynProgram<View>, LoadError>>) + 'static,
    ) -> Self {
        Self::new(Effect::new(load))
    }
}

/// Messages driving the routing host's reducer.
pub enum RouteMsg<Route, View> {
    /// A new value arrived from the upstream route source.
    RouteChanged(Route),
    /// A pending load resolved.
    ProgramLoaded(Result<DynProgram<View>, LoadError>),
    /// A message belonging to the mounted sub-program.
    ProgramMsg(DynMsg),
}

/// The active mount: the erased program's parts, with the teardown hook
/// guarded so it runs at most once per mount.
struct Mounted<View> {
    update: Rc<UpdateFn<DynMsg, SharedModel>>,
    view: Rc<ViewFn<DynMsg, SharedModel, View>>,
    done: Rc<RefCell<Option<DoneFn<SharedModel>>>>,
}

impl<View> Clone for Mounted<View> {
    fn clone(&self) -> Self {
        Self {
            update: Rc::clone(&self.update),
            view: Rc::clone(&self.view),
            done: Rc::clone(&self.done),
        }
    }
}

impl<View> Mounted<View> {
    fn take_parts(program: DynProgram<View>) -> (SharedModel, Option<Effect<DynMsg>>, Self) {
        let Program {
            init,
            update,
            view,
            done,
        } = program;
        let (model, effect) = init;
        (
            model,
            effect,
            Self {
                update,
                view,
                done: Rc::new(RefCell::new(done)),
            },
        )
    }
}

/// The routing host's model: one snapshot per reducer application.
pub struct RouteModel<Route, View> {
    router_cancel: SharedDisposer,
    route_emitter: Option<ControlledRouter<Route>>,
    program_key: Option<String>,
    is_transitioning: bool,
    current: Mounted<View>,
    program_model: SharedModel,
}

impl<Route, View> Clone for RouteModel<Route, View> {
    fn clone(&self) -> Self {
        Self {
            router_cancel: self.router_cancel.clone(),
            route_emitter: self.route_emitter.clone(),
            program_key: self.program_key.clone(),
            is_transitioning: self.is_transitioning,
            current: self.current.clone(),
            program_model: Rc::clone(&self.program_model),
        }
    }
}

impl<Route, View> RouteModel<Route, View> {
    /// True while an asynchronous program load is outstanding.
    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        self.is_transitioning
    }

    /// The continuation key of the current mount, if it was keyed.
    #[must_use]
    pub fn program_key(&self) -> Option<&str> {
        self.program_key.as_deref()
    }
}

/// The routing frame handed to the container view.
pub struct RouteFrame {
    pub is_transitioning: bool,
}

/// Configuration for [`routed_program`].
pub struct RoutedConfig<Route, View> {
    router: Box<dyn RouteSource<Route>>,
    initial_program: DynProgram<View>,
    get_route_program: Box<dyn Fn(Route) -> RouteProgram<Route, View>>,
    get_error_program: Option<Box<dyn Fn(&LoadError) -> DynProgram<View>>>,
    on_load_error: Option<Box<dyn Fn(&LoadError)>>,
    container_view: Option<Box<dyn Fn(&RouteFrame, View) -> View>>,
}

impl<Route: Clone + 'static, View: 'static> RoutedConfig<Route, View> {
    pub fn new(
        router: impl RouteSource<Route> + 'static,
        initial_program: DynProgram<View>,
        get_route_program: impl Fn(Route) -> RouteProgram<Route, View> + 'static,
    ) -> Self {
        Self {
            router: Box::new(router),
            initial_program,
            get_route_program: Box::new(get_route_program),
            get_error_program: None,
            on_load_error: None,
            container_view: None,
        }
    }

    /// Mount the program this factory builds when a pending load fails.
    #[must_use]
    pub fn with_error_program(
        mut self,
        get_error_program: impl Fn(&LoadError) -> DynProgram<View> + 'static,
    ) -> Self {
        self.get_error_program = Some(Box::new(get_error_program));
        self
    }

    /// Observe load failures. Called at most once per failed load.
    #[must_use]
    pub fn with_load_observer(mut self, on_load_error: impl Fn(&LoadError) + 'static) -> Self {
        self.on_load_error = Some(Box::new(on_load_error));
        self
    }

    /// Compose the routing frame around the active sub-view.
    #[must_use]
    pub fn with_container_view(
        mut self,
        container_view: impl Fn(&RouteFrame, View) -> View + 'static,
    ) -> Self {
        self.container_view = Some(Box::new(container_view));
        self
    }
}

/// Build the routing host program.
///
/// On mount the host subscribes to the upstream route source and merges the
/// resulting route-change effect with the initial program's own effect. Each
/// route value is classified exactly once; see the module docs for the three
/// outcomes and their semantics.
pub fn routed_program<Route, View>(
    config: RoutedConfig<Route, View>,
) -> Program<RouteMsg<Route, View>, RouteModel<Route, View>, View>
where
    Route: Clone + 'static,
    View: 'static,
{
    let RoutedConfig {
        router,
        initial_program,
        get_route_program,
        get_error_program,
        on_load_error,
        container_view,
    } = config;

    let (program_model, program_effect, current) = Mounted::take_parts(initial_program);
    let Subscription {
        effect: route_effect,
        cancel: router_cancel,
    } = router.subscribe();

    let model = RouteModel {
        router_cancel: SharedDisposer::new(router_cancel),
        route_emitter: None,
        program_key: None,
        is_transitioning: false,
        current,
        program_model,
    };
    let init_effect = Effect::batch([
        Some(route_effect.map(RouteMsg::RouteChanged)),
        program_effect.map(|effect| effect.map(RouteMsg::ProgramMsg)),
    ]);
    let init = (model, Some(init_effect));

    let update = Rc::new(
        move |msg: RouteMsg<Route, View>,
              model: &RouteModel<Route, View>|
              -> Change<RouteMsg<Route, View>, RouteModel<Route, View>> {
            match msg {
                RouteMsg::RouteChanged(route) => match get_route_program(route.clone()) {
                    RouteProgram::Program(program) => {
                        let mut next = model.clone();
                        next.program_key = None;
                        next.route_emitter = None;
                        transition(next, program)
                    }
                    RouteProgram::Keyed(keyed) => {
                        if let Some(emitter) = &model.route_emitter
                            && model.program_key.as_deref() == Some(keyed.key())
                        {
                            debug!(key = keyed.key(), "route continues the current mount");
                            return (model.clone(), Some(emitter.emit(route)));
                        }
                        let emitter = ControlledRouter::new(route);
                        let KeyedProgram { key, make } = keyed;
                        let program = make(emitter.handle());
                        let mut next = model.clone();
                        next.program_key = Some(key);
                        next.route_emitter = Some(emitter);
                        transition(next, program)
                    }
                    RouteProgram::Pending(pending) => {
                        debug!("awaiting route program load");
                        let mut next = model.clone();
                        next.is_transitioning = true;
                        next.program_key = None;
                        next.route_emitter = None;
                        (next, Some(pending.load.map(RouteMsg::ProgramLoaded)))
                    }
                },
                RouteMsg::ProgramLoaded(Ok(program)) => {
                    let mut next = model.clone();
                    next.is_transitioning = false;
                    transition(next, program)
                }
                RouteMsg::ProgramLoaded(Err(error)) => {
                    let mut next = model.clone();
                    next.is_transitioning = false;
                    warn!(error = %error, "route program load failed");
                    if let Some(observer) = &on_load_error {
                        observer(&error);
                    }
                    match &get_error_program {
                        Some(make_error_program) => transition(next, make_error_program(&error)),
                        None => (next, None),
                    }
                }
                RouteMsg::ProgramMsg(msg) => {
                    let (program_model, effect) = (model.current.update)(msg, &model.program_model);
                    let mut next = model.clone();
                    next.program_model = program_model;
                    (next, effect.map(|effect| effect.map(RouteMsg::ProgramMsg)))
                }
            }
        },
    );

    let view = Rc::new(
        move |model: &RouteModel<Route, View>, dispatch: Dispatch<RouteMsg<Route, View>>| {
            let tagged: Dispatch<DynMsg> = Rc::new(move |msg| dispatch(RouteMsg::ProgramMsg(msg)));
            let sub_view = (model.current.view)(&model.program_model, tagged);
            match &container_view {
                Some(container) => container(
                    &RouteFrame {
                        is_transitioning: model.is_transitioning,
                    },
                    sub_view,
                ),
                None => sub_view,
            }
        },
    );

    let done: Option<DoneFn<RouteModel<Route, View>>> =
        Some(Box::new(move |model: &RouteModel<Route, View>| {
            if let Some(done) = model.current.done.borrow_mut().take() {
                done(&model.program_model);
            }
            model.router_cancel.dispose();
        }));

    Program {
        init,
        update,
        view,
        done,
    }
}

/// Replace the active mount: initialize the incoming program and batch its
/// initial effect with the outgoing program's deferred teardown.
fn transition<Route, View>(
    mut model: RouteModel<Route, View>,
    program: DynProgram<View>,
) -> Change<RouteMsg<Route, View>, RouteModel<Route, View>>
where
    Route: Clone + 'static,
    View: 'static,
{
    let (program_model, program_effect, mounted) = Mounted::take_parts(program);
    let previous = std::mem::replace(&mut model.current, mounted);
    let previous_model = std::mem::replace(&mut model.program_model, program_model);
    info!(key = model.program_key.as_deref(), "mounting route program");

    let teardown = previous.done.borrow_mut().take().map(|done| {
        Effect::new(move |_dispatch: Dispatch<RouteMsg<Route, View>>| done(&previous_model))
    });
    let effect = Effect::batch([
        program_effect.map(|effect| effect.map(RouteMsg::ProgramMsg)),
        teardown,
    ]);
    (model, Some(effect))
}
