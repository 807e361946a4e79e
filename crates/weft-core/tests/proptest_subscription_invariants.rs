//! Property-based invariant tests for subscription reconciliation.
//!
//! For any sequence of declared key sets, reconciliation must guarantee:
//!
//! 1. Per key, factory and cancel calls strictly alternate, starting with a
//!    factory call.
//! 2. Per key, factory count minus cancel count is always 0 or 1 — never
//!    two live instances, never a dangling cancel.
//! 3. After each step, the active map holds exactly the declared keys.
//! 4. Reconciling the same set twice in a row produces no calls at all on
//!    the second pass.

use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::Rc;
use weft_core::{CancelMap, Disposer, Effect, SubMap, Subscription, reconcile};

const KEYS: [&str; 5] = ["a", "b", "c", "d", "e"];

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Factory(String),
    Cancel(String),
}

type CallLog = Rc<RefCell<Vec<Call>>>;

fn declared_set() -> impl Strategy<Value = BTreeSet<usize>> {
    proptest::collection::btree_set(0..KEYS.len(), 0..=KEYS.len())
}

fn declaration_sequence() -> impl Strategy<Value = Vec<BTreeSet<usize>>> {
    proptest::collection::vec(declared_set(), 1..12)
}

fn declare(log: &CallLog, keys: &BTreeSet<usize>) -> SubMap<()> {
    let mut map = SubMap::new();
    for &index in keys {
        let key = KEYS[index].to_string();
        let factory_log = Rc::clone(log);
        let factory_key = key.clone();
        map.insert(key, move || {
            factory_log
                .borrow_mut()
                .push(Call::Factory(factory_key.clone()));
            let cancel_log = Rc::clone(&factory_log);
            Subscription {
                effect: Effect::none(),
                cancel: Disposer::new(move || {
                    cancel_log.borrow_mut().push(Call::Cancel(factory_key));
                }),
            }
        });
    }
    map
}

fn run(effect: Effect<()>) {
    effect.execute(Rc::new(|()| {}));
}

fn assert_alternation(log: &[Call]) {
    for key in KEYS {
        let mut live = 0i32;
        for call in log {
            match call {
                Call::Factory(k) if k == key => {
                    assert_eq!(live, 0, "second factory call for `{key}` before cancel");
                    live += 1;
                }
                Call::Cancel(k) if k == key => {
                    assert_eq!(live, 1, "cancel for `{key}` without a live subscription");
                    live -= 1;
                }
                _ => {}
            }
        }
        assert!((0..=1).contains(&live));
    }
}

proptest! {
    #[test]
    fn factory_and_cancel_calls_alternate_per_key(sequence in declaration_sequence()) {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let mut active = CancelMap::new();

        for step in &sequence {
            run(reconcile(&mut active, declare(&log, step)));

            let active_keys: BTreeSet<&str> = active.keys().map(String::as_str).collect();
            let declared_keys: BTreeSet<&str> = step.iter().map(|&i| KEYS[i]).collect();
            prop_assert_eq!(active_keys, declared_keys);
        }

        // Final teardown: cancel everything still active.
        run(reconcile(&mut active, SubMap::<()>::new()));
        prop_assert!(active.is_empty());

        assert_alternation(&log.borrow());

        // Everything started was eventually stopped.
        let log = log.borrow();
        let factories = log.iter().filter(|c| matches!(c, Call::Factory(_))).count();
        let cancels = log.iter().filter(|c| matches!(c, Call::Cancel(_))).count();
        prop_assert_eq!(factories, cancels);
    }

    #[test]
    fn repeated_declaration_is_quiescent(step in declared_set()) {
        let log: CallLog = Rc::new(RefCell::new(Vec::new()));
        let mut active = CancelMap::new();

        run(reconcile(&mut active, declare(&log, &step)));
        let calls_after_first = log.borrow().len();

        run(reconcile(&mut active, declare(&log, &step)));
        prop_assert_eq!(log.borrow().len(), calls_after_first);
    }
}
