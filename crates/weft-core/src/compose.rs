#![forbid(unsafe_code)]

//! Positional program composition: N independent programs behind one facade.
//!
//! # Design
//!
//! [`batch_programs`] combines a fixed-size, stable-order list of erased
//! programs into a single program whose model is the vector of child model
//! slots. Messages carry the target position ([`IndexedMsg`]); an update
//! touches exactly one slot and shallow-copies the vector, so every other
//! slot stays `Rc`-identical to the previous snapshot.
//!
//! Child views are handed to the container as zero-argument thunks: a thunk
//! computes its view only when invoked, so a container doing partial or
//! virtualized rendering never pays for the children it skips.
//!
//! Positional addressing assumes the list never grows or shrinks at runtime;
//! a message addressed past the end is a composition bug and panics.

use crate::effect::{Dispatch, Effect};
use crate::program::{Change, DoneFn, DynMsg, DynProgram, Program, SharedModel, UpdateFn, ViewFn};
use std::rc::Rc;

/// A child message re-tagged with the position of the program it belongs to.
pub struct IndexedMsg {
    pub index: usize,
    pub data: DynMsg,
}

impl std::fmt::Debug for IndexedMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexedMsg")
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

/// A lazily-computed child view.
pub type ViewThunk<View> = Box<dyn Fn() -> View>;

/// Combine an ordered, fixed-size list of programs into one, addressed by
/// position.
///
/// `container_view` receives one thunk per child, in order, and composes
/// whatever subset it chooses to realize.
///
/// # Panics
///
/// The combined reducer panics if a message's `index` is out of range.
pub fn batch_programs<View: 'static>(
    programs: Vec<DynProgram<View>>,
    container_view: impl Fn(Vec<ViewThunk<View>>) -> View + 'static,
) -> Program<IndexedMsg, Vec<SharedModel>, View> {
    let count = programs.len();
    let mut models = Vec::with_capacity(count);
    let mut init_effects: Vec<Option<Effect<IndexedMsg>>> = Vec::with_capacity(count);
    let mut updates: Vec<Rc<UpdateFn<DynMsg, SharedModel>>> = Vec::with_capacity(count);
    let mut views: Vec<Rc<ViewFn<DynMsg, SharedModel, View>>> = Vec::with_capacity(count);
    let mut dones: Vec<Option<DoneFn<SharedModel>>> = Vec::with_capacity(count);

    for (index, program) in programs.into_iter().enumerate() {
        let Program {
            init,
            update,
            view,
            done,
        } = program;
        let (model, effect) = init;
        models.push(model);
        init_effects.push(effect.map(|effect| retag(effect, index)));
        updates.push(update);
        views.push(view);
        dones.push(done);
    }

    let init: Change<IndexedMsg, Vec<SharedModel>> =
        (models, Some(Effect::batch(init_effects)));

    let update = Rc::new(move |msg: IndexedMsg, models: &Vec<SharedModel>| {
        let IndexedMsg { index, data } = msg;
        let child = updates.get(index).unwrap_or_else(|| {
            panic!("message addressed to program {index}, but only {count} are composed")
        });
        let (next, effect) = child(data, &models[index]);
        let mut snapshot = models.clone();
        snapshot[index] = next;
        (snapshot, effect.map(|effect| retag(effect, index)))
    });

    let view = Rc::new(move |models: &Vec<SharedModel>, dispatch: Dispatch<IndexedMsg>| {
        let thunks: Vec<ViewThunk<View>> = views
            .iter()
            .enumerate()
            .map(|(index, child)| {
                let child = Rc::clone(child);
                let model = Rc::clone(&models[index]);
                let dispatch = Rc::clone(&dispatch);
                Box::new(move || {
                    let dispatch = Rc::clone(&dispatch);
                    let tagged: Dispatch<DynMsg> =
                        Rc::new(move |data| dispatch(IndexedMsg { index, data }));
                    child(&model, tagged)
                }) as ViewThunk<View>
            })
            .collect();
        container_view(thunks)
    });

    let done: Option<DoneFn<Vec<SharedModel>>> = Some(Box::new(move |models: &Vec<SharedModel>| {
        for (done, model) in dones.into_iter().zip(models) {
            if let Some(done) = done {
                done(model);
            }
        }
    }));

    Program {
        init,
        update,
        view,
        done,
    }
}

fn retag(effect: Effect<DynMsg>, index: usize) -> Effect<IndexedMsg> {
    effect.map(move |data| IndexedMsg { index, data })
}
