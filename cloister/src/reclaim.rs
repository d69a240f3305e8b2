//! Deferred teardown.
//!
//! Dropping an object drops its properties and, through its brands, its
//! slot tables. Those can hold the only reference to further objects, so
//! a linked structure would otherwise be freed by recursion as deep as
//! the structure is long. Instead, owned storage released during a drop
//! is pushed onto a per-thread worklist, and the outermost release drains
//! it in a loop. Every drop reached from the loop is one level deep.

use std::cell::{Cell, RefCell};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::slots::SlotTable;
use crate::value::{PropertyKey, Value};

pub(crate) enum Garbage {
    Table(Arc<SlotTable>),
    Properties(IndexMap<PropertyKey, Value>),
}

thread_local! {
    static PENDING: RefCell<Vec<Garbage>> = const { RefCell::new(Vec::new()) };
    static DRAINING: Cell<bool> = const { Cell::new(false) };
}

/// Clears the draining flag even if a drop panics.
struct Draining;

impl Drop for Draining {
    fn drop(&mut self) {
        let _ = DRAINING.try_with(|draining| draining.set(false));
    }
}

/// Queue `garbage` and, unless a drain is already running further up the
/// stack, drop everything queued.
///
/// During thread teardown the thread-locals may already be gone; the
/// garbage is then dropped in place.
pub(crate) fn defer(garbage: Garbage) {
    let _ = PENDING.try_with(|pending| pending.borrow_mut().push(garbage));
    if DRAINING
        .try_with(|draining| draining.replace(true))
        .unwrap_or(true)
    {
        return;
    }
    let _draining = Draining;
    while let Some(next) = PENDING
        .try_with(|pending| pending.borrow_mut().pop())
        .ok()
        .flatten()
    {
        drop(next);
    }
}

/// Garbage queued but not yet dropped on this thread.
#[cfg(test)]
pub(crate) fn pending() -> usize {
    PENDING.with(|pending| pending.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    #[test]
    fn long_property_chain_is_freed_without_recursion() {
        let mut head = Object::new(None);
        for _ in 0..200_000 {
            let node = Object::new(None);
            node.set(PropertyKey::from("next"), Value::Object(head));
            head = node;
        }
        drop(head);
        assert_eq!(pending(), 0);
    }

    #[test]
    fn wide_table_is_drained() {
        let table = Arc::new(SlotTable::new());
        for i in 0..1_000 {
            let object = Object::new(None);
            object.set(PropertyKey::from("i"), Value::Number(i as f64));
            table.set(PropertyKey::from(i.to_string().as_str()), Value::Object(object));
        }
        defer(Garbage::Table(table));
        assert_eq!(pending(), 0);
    }
}
