//! Definition tokens.
//!
//! A [`DefinitionToken`] is minted each time a class definition is
//! evaluated. It is the capability that private accessors resolve
//! against: it owns the class' static [`SlotTable`] and a weak
//! association from registered instances to their per-instance tables.
//!
//! The association is an arena of entries addressed by generation-checked
//! [`Handle`]s. The instance keeps its handle in a brand (see
//! [`crate::object`]); the entry keeps only a [`Weak`] back to the
//! instance, so registration never extends an instance's lifetime.
//! When the instance is dropped its brands release their entries and the
//! tables go with them. Freed slots are reused with a bumped generation,
//! so a stale handle can never reach a newer instance's table.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use log::{debug, trace};
use parking_lot::Mutex;
use parser::ClassId;

use crate::object::{Brand, Object, ObjectRef};
use crate::reclaim::{self, Garbage};
use crate::slots::SlotTable;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TokenId(u64);

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    index: u32,
    generation: u32,
}

/// The target was never registered with this token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotRegistered;

impl std::fmt::Display for NotRegistered {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("not registered")
    }
}

impl std::error::Error for NotRegistered {}

struct Entry {
    generation: u32,
    instance: Weak<Object>,
    table: Option<Arc<SlotTable>>,
}

#[derive(Default)]
struct InstanceArena {
    entries: Vec<Entry>,
    free: Vec<u32>,
    live: usize,
}

impl InstanceArena {
    fn insert(&mut self, instance: &ObjectRef, table: Arc<SlotTable>) -> Handle {
        let instance = Arc::downgrade(instance);
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.instance = instance;
            entry.table = Some(table);
            self.live += 1;
            return Handle {
                index,
                generation: entry.generation,
            };
        }
        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            instance,
            table: Some(table),
        });
        self.live += 1;
        Handle {
            index,
            generation: 0,
        }
    }

    fn resolve(&self, handle: Handle, instance: &ObjectRef) -> Option<Arc<SlotTable>> {
        let entry = self.entries.get(handle.index as usize)?;
        if entry.generation != handle.generation
            || !std::ptr::eq(entry.instance.as_ptr(), Arc::as_ptr(instance))
        {
            return None;
        }
        entry.table.clone()
    }

    fn remove(&mut self, handle: Handle) -> Option<Arc<SlotTable>> {
        let entry = self.entries.get_mut(handle.index as usize)?;
        if entry.generation != handle.generation {
            return None;
        }
        let table = entry.table.take()?;
        entry.instance = Weak::new();
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.live -= 1;
        Some(table)
    }
}

impl Drop for InstanceArena {
    fn drop(&mut self) {
        for entry in self.entries.drain(..) {
            if let Some(table) = entry.table {
                reclaim::defer(Garbage::Table(table));
            }
        }
    }
}

pub struct DefinitionToken {
    id: TokenId,
    site: ClassId,
    name: String,
    static_table: Arc<SlotTable>,
    instances: Mutex<InstanceArena>,
}

impl DefinitionToken {
    /// Mint a token for one evaluation of the class at `site`.
    pub fn new(site: ClassId, name: impl Into<String>) -> Arc<Self> {
        let token = Arc::new(Self {
            id: TokenId(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)),
            site,
            name: name.into(),
            static_table: Arc::new(SlotTable::new()),
            instances: Mutex::new(InstanceArena::default()),
        });
        debug!("minted {} for class {} ({})", token.id, token.name, site);
        token
    }

    pub fn id(&self) -> TokenId {
        self.id
    }

    /// The class definition this token was minted for.
    pub fn site(&self) -> ClassId {
        self.site
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn static_table(&self) -> &Arc<SlotTable> {
        &self.static_table
    }

    /// Give `instance` an empty table, or return the one it already has.
    pub fn register_instance(self: &Arc<Self>, instance: &ObjectRef) -> Arc<SlotTable> {
        let mut brands = instance.brands().lock();
        if let Some(brand) = brands.iter().find(|b| b.token == self.id) {
            if let Some(table) = self.instances.lock().resolve(brand.handle, instance) {
                return table;
            }
        }

        let table = Arc::new(SlotTable::new());
        let handle = self.instances.lock().insert(instance, Arc::clone(&table));
        brands.retain(|b| b.token != self.id);
        brands.push(Brand {
            token: self.id,
            owner: Arc::downgrade(self),
            handle,
        });
        debug!(
            "registered object #{} with {} ({})",
            instance.id(),
            self.id,
            self.name
        );
        table
    }

    pub fn lookup_instance(&self, instance: &ObjectRef) -> Result<Arc<SlotTable>, NotRegistered> {
        let handle = instance.brand_for(self.id).ok_or(NotRegistered)?;
        let table = self
            .instances
            .lock()
            .resolve(handle, instance)
            .ok_or(NotRegistered)?;
        trace!("resolved object #{} against {}", instance.id(), self.id);
        Ok(table)
    }

    /// Number of registered instances that are still alive.
    pub fn live_instances(&self) -> usize {
        self.instances.lock().live
    }

    pub(crate) fn release(&self, handle: Handle) {
        // Dropping the table can drop other instances, which re-enter
        // `release`; the arena lock must already be gone by then.
        let table = self.instances.lock().remove(handle);
        if let Some(table) = table {
            trace!("released entry {} of {}", handle.index, self.id);
            reclaim::defer(Garbage::Table(table));
        }
    }
}

impl std::fmt::Debug for DefinitionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefinitionToken")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("live_instances", &self.live_instances())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{PropertyKey, Value};
    use parser::parse_program;
    use std::thread;

    fn site() -> ClassId {
        let program = parse_program("class A {}").expect("parses");
        program.arena.class_ids().next().expect("one class")
    }

    #[test]
    fn static_table_is_minted_once() {
        let token = DefinitionToken::new(site(), "A");
        let a = Arc::clone(token.static_table());
        let b = Arc::clone(token.static_table());
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn tokens_are_distinct_per_mint() {
        let a = DefinitionToken::new(site(), "A");
        let b = DefinitionToken::new(site(), "A");
        assert_ne!(a.id(), b.id());
        assert!(!Arc::ptr_eq(a.static_table(), b.static_table()));
    }

    #[test]
    fn registration_is_idempotent() {
        let token = DefinitionToken::new(site(), "A");
        let obj = Object::new(None);
        let first = token.register_instance(&obj);
        first.set(PropertyKey::from("x"), Value::Number(1.0));
        let second = token.register_instance(&obj);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(token.live_instances(), 1);
    }

    #[test]
    fn unregistered_lookup_fails() {
        let token = DefinitionToken::new(site(), "A");
        let other = DefinitionToken::new(site(), "B");
        let obj = Object::new(None);
        assert_eq!(token.lookup_instance(&obj).err(), Some(NotRegistered));
        other.register_instance(&obj);
        assert_eq!(token.lookup_instance(&obj).err(), Some(NotRegistered));
        assert!(other.lookup_instance(&obj).is_ok());
    }

    #[test]
    fn instances_have_separate_tables() {
        let token = DefinitionToken::new(site(), "A");
        let a = Object::new(None);
        let b = Object::new(None);
        token.register_instance(&a).set(PropertyKey::from("x"), Value::Number(1.0));
        token.register_instance(&b).set(PropertyKey::from("x"), Value::Number(2.0));
        let read = |o: &ObjectRef| {
            token
                .lookup_instance(o)
                .expect("registered")
                .get(&PropertyKey::from("x"))
        };
        assert_eq!(read(&a), Some(Value::Number(1.0)));
        assert_eq!(read(&b), Some(Value::Number(2.0)));
    }

    #[test]
    fn drop_releases_and_recycles_entries() {
        let token = DefinitionToken::new(site(), "A");
        let a = Object::new(None);
        let table = token.register_instance(&a);
        let weak_table = Arc::downgrade(&table);
        drop(table);
        assert_eq!(token.live_instances(), 1);

        drop(a);
        assert_eq!(token.live_instances(), 0);
        assert!(weak_table.upgrade().is_none());

        let b = Object::new(None);
        token.register_instance(&b);
        assert_eq!(token.live_instances(), 1);
        assert_eq!(token.instances.lock().entries.len(), 1);
    }

    #[test]
    fn stale_handle_does_not_resolve() {
        let token = DefinitionToken::new(site(), "A");
        let a = Object::new(None);
        token.register_instance(&a);
        let stale = a.brand_for(token.id()).expect("branded");
        drop(a);

        let b = Object::new(None);
        token.register_instance(&b);
        let fresh = b.brand_for(token.id()).expect("branded");
        assert_eq!(stale.index, fresh.index);
        assert_ne!(stale.generation, fresh.generation);
        assert!(token.instances.lock().resolve(stale, &b).is_none());
    }

    #[test]
    fn table_holding_a_sibling_instance_is_released() {
        let token = DefinitionToken::new(site(), "A");
        let outer = Object::new(None);
        let inner = Object::new(None);
        token.register_instance(&inner);
        token
            .register_instance(&outer)
            .set(PropertyKey::from("child"), Value::Object(inner));
        assert_eq!(token.live_instances(), 2);
        drop(outer);
        assert_eq!(token.live_instances(), 0);
    }

    #[test]
    fn long_private_chain_is_released_iteratively() {
        let token = DefinitionToken::new(site(), "Node");
        let next = PropertyKey::from("next");
        let mut head = Object::new(None);
        token.register_instance(&head);
        for _ in 0..100_000 {
            let node = Object::new(None);
            token
                .register_instance(&node)
                .set(next.clone(), Value::Object(head));
            head = node;
        }
        assert_eq!(token.live_instances(), 100_001);
        drop(head);
        assert_eq!(token.live_instances(), 0);
    }

    #[test]
    fn token_outlived_by_instance() {
        let obj = Object::new(None);
        {
            let token = DefinitionToken::new(site(), "A");
            token.register_instance(&obj);
        }
        assert_eq!(obj.brands().lock().len(), 1);
        drop(obj);
    }

    #[test]
    fn concurrent_registration_and_drop() {
        let token = DefinitionToken::new(site(), "A");
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let token = Arc::clone(&token);
                thread::spawn(move || {
                    for i in 0..50 {
                        let obj = Object::new(None);
                        let table = token.register_instance(&obj);
                        table.set(PropertyKey::from("i"), Value::Number(i as f64));
                        assert!(token.lookup_instance(&obj).is_ok());
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().expect("worker thread");
        }
        assert_eq!(token.live_instances(), 0);
    }

    #[test]
    fn runtime_types_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefinitionToken>();
        assert_send_sync::<SlotTable>();
        assert_send_sync::<Object>();
        assert_send_sync::<Value>();
    }
}
