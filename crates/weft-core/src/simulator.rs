#![forbid(unsafe_code)]

//! Headless, deterministic driver for programs.
//!
//! # Design
//!
//! The simulator is the test-side collaborator that owns a program's
//! lifecycle: apply init, run effects, render, feed messages, tear down.
//! Delivery goes through an explicit single-consumer FIFO queue — a
//! dispatch call only enqueues, and [`Simulator::run_until_idle`] drains one
//! message fully (reduce → effect → render) before touching the next. An
//! effect that dispatches synchronously therefore never re-enters the
//! reducer; its message waits its turn, recursion depth stays flat, and
//! delivery order is auditable.
//!
//! After [`Simulator::shutdown`] the handed-out dispatch function becomes a
//! no-op and the program's teardown has run exactly once.

use crate::effect::{Dispatch, Effect};
use crate::program::{DoneFn, Program, UpdateFn, ViewFn};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::trace;

/// Drives a single program deterministically, without any real I/O.
pub struct Simulator<Msg, Model, View> {
    update: Rc<UpdateFn<Msg, Model>>,
    view: Rc<ViewFn<Msg, Model, View>>,
    done: Option<DoneFn<Model>>,
    model: Model,
    queue: Rc<RefCell<VecDeque<Msg>>>,
    running: Rc<Cell<bool>>,
    last_view: Option<View>,
    renders: usize,
}

impl<Msg: 'static, Model: 'static, View: 'static> Simulator<Msg, Model, View> {
    /// Mount the program: apply its init, execute the initial effect, render,
    /// and drain whatever the initial effect dispatched.
    pub fn start(program: Program<Msg, Model, View>) -> Self {
        let Program {
            init,
            update,
            view,
            done,
        } = program;
        let (model, effect) = init;
        let mut simulator = Self {
            update,
            view,
            done,
            model,
            queue: Rc::new(RefCell::new(VecDeque::new())),
            running: Rc::new(Cell::new(true)),
            last_view: None,
            renders: 0,
        };
        if let Some(effect) = effect {
            effect.execute(simulator.dispatcher());
        }
        simulator.render();
        simulator.run_until_idle();
        simulator
    }

    /// The stable dispatch function handed to effects. Enqueues while the
    /// simulator is running; a no-op after shutdown.
    #[must_use]
    pub fn dispatcher(&self) -> Dispatch<Msg> {
        let queue = Rc::clone(&self.queue);
        let running = Rc::clone(&self.running);
        Rc::new(move |msg| {
            if running.get() {
                queue.borrow_mut().push_back(msg);
            }
        })
    }

    /// Enqueue one message and drain the queue.
    pub fn dispatch(&mut self, msg: Msg) {
        if !self.running.get() {
            return;
        }
        self.queue.borrow_mut().push_back(msg);
        self.run_until_idle();
    }

    /// Drain the queue, processing each message fully before the next.
    ///
    /// Call this after delivering messages through an externally-held
    /// [`Dispatch`] (e.g. a completion source resolved by the test itself).
    pub fn run_until_idle(&mut self) {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(msg) = next else { break };
            let (model, effect) = (self.update)(msg, &self.model);
            self.model = model;
            if let Some(effect) = effect {
                effect.execute(self.dispatcher());
            }
            self.render();
        }
    }

    fn render(&mut self) {
        trace!(renders = self.renders, "rendering");
        self.last_view = Some((self.view)(&self.model, self.dispatcher()));
        self.renders += 1;
    }

    #[must_use]
    pub fn model(&self) -> &Model {
        &self.model
    }

    #[must_use]
    pub fn last_view(&self) -> Option<&View> {
        self.last_view.as_ref()
    }

    /// Number of renders so far (one per processed message, plus the mount).
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.renders
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    /// Stop the program: dispatch becomes a no-op and the teardown hook runs
    /// exactly once. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running.get() {
            return;
        }
        self.running.set(false);
        if let Some(done) = self.done.take() {
            done(&self.model);
        }
    }
}
