//! Heap objects.
//!
//! An [`Object`] has public properties, an optional prototype, and a
//! private list of *brands*: one per [`DefinitionToken`] the object is
//! registered with. A brand records where the token keeps this object's
//! slot table. Brands are not reachable from script code; dropping the
//! object releases every entry they point at. Properties and released
//! tables are freed through [`crate::reclaim`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::reclaim::{self, Garbage};
use crate::token::{DefinitionToken, Handle, TokenId};
use crate::value::{PropertyKey, Value};

pub type ObjectRef = Arc<Object>;

static NEXT_OBJECT: AtomicU64 = AtomicU64::new(1);

pub(crate) struct Brand {
    pub token: TokenId,
    pub owner: Weak<DefinitionToken>,
    pub handle: Handle,
}

pub struct Object {
    id: u64,
    proto: Option<ObjectRef>,
    properties: Mutex<IndexMap<PropertyKey, Value>>,
    brands: Mutex<SmallVec<[Brand; 2]>>,
}

impl Object {
    pub fn new(proto: Option<ObjectRef>) -> ObjectRef {
        Arc::new(Self {
            id: NEXT_OBJECT.fetch_add(1, Ordering::Relaxed),
            proto,
            properties: Mutex::new(IndexMap::new()),
            brands: Mutex::new(SmallVec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn proto(&self) -> Option<&ObjectRef> {
        self.proto.as_ref()
    }

    pub fn get_own(&self, key: &PropertyKey) -> Option<Value> {
        self.properties.lock().get(key).cloned()
    }

    /// Property lookup along the prototype chain.
    pub fn get(&self, key: &PropertyKey) -> Option<Value> {
        let mut current = Some(self);
        while let Some(obj) = current {
            if let Some(value) = obj.get_own(key) {
                return Some(value);
            }
            current = obj.proto.as_deref();
        }
        None
    }

    pub fn set(&self, key: PropertyKey, value: Value) {
        let _previous = self.properties.lock().insert(key, value);
    }

    pub fn has(&self, key: &PropertyKey) -> bool {
        let mut current = Some(self);
        while let Some(obj) = current {
            if obj.properties.lock().contains_key(key) {
                return true;
            }
            current = obj.proto.as_deref();
        }
        false
    }

    /// Delete an own property.
    pub fn delete(&self, key: &PropertyKey) -> bool {
        let removed = self.properties.lock().shift_remove(key);
        removed.is_some()
    }

    pub fn keys(&self) -> Vec<PropertyKey> {
        self.properties.lock().keys().cloned().collect()
    }

    pub(crate) fn brands(&self) -> &Mutex<SmallVec<[Brand; 2]>> {
        &self.brands
    }

    pub(crate) fn brand_for(&self, token: TokenId) -> Option<Handle> {
        self.brands
            .lock()
            .iter()
            .find(|b| b.token == token)
            .map(|b| b.handle)
    }
}

impl Drop for Object {
    fn drop(&mut self) {
        let properties = std::mem::take(self.properties.get_mut());
        if !properties.is_empty() {
            reclaim::defer(Garbage::Properties(properties));
        }
        for brand in self.brands.get_mut().drain(..) {
            if let Some(owner) = brand.owner.upgrade() {
                owner.release(brand.handle);
            }
        }
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field("id", &self.id)
            .field("keys", &self.keys())
            .finish()
    }
}
