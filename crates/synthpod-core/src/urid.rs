//! URI interning (§4.2).
//!
//! A [`UridMap`] assigns every URI a stable 32-bit id the first time it is
//! seen and returns the same id for every subsequent `map()` call with that
//! URI, for the lifetime of the process. Interning is monotonic: ids are
//! never reused or invalidated.
//!
//! Per the design note in §9 ("Global mutable state"), the map is a single
//! process-wide, lock-protected handle distinct from the engine — modules
//! hold a cheap `Arc<UridMap>` rather than each owning their own table.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A 32-bit interned URI. Stable for the lifetime of the process that
/// created it; meaningless across processes without re-interning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Urid(pub u32);

impl Urid {
    /// The reserved "no id" sentinel. Never returned by [`UridMap::map`].
    pub const NONE: Urid = Urid(0);

    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

struct Inner {
    forward: HashMap<String, Urid>,
    backward: Vec<String>,
}

impl Inner {
    fn new() -> Self {
        // Index 0 is reserved as Urid::NONE; backward[0] is never addressed.
        Self {
            forward: HashMap::new(),
            backward: vec![String::new()],
        }
    }
}

/// Process-wide URI interning table.
///
/// Cheap to clone (an `Arc` wrapper); clones share the same underlying
/// table, matching §9's "single, shared, lock-protected handle" guidance.
#[derive(Clone)]
pub struct UridMap {
    inner: Arc<Mutex<Inner>>,
}

impl UridMap {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::new())),
        }
    }

    /// Interns `uri`, returning its stable id. Repeated calls with an equal
    /// `uri` return the same [`Urid`].
    ///
    /// Per §5, the real-time thread treats this as read-mostly and should
    /// avoid mapping new URIs in the hot path; interning is cheap (a
    /// `Mutex` lock plus hash lookup) but not RT-safe in the strict sense
    /// since it may allocate on first sight of a URI.
    pub fn map(&self, uri: &str) -> Urid {
        let mut inner = self.inner.lock().expect("urid map poisoned");
        if let Some(&id) = inner.forward.get(uri) {
            return id;
        }
        let id = Urid(inner.backward.len() as u32);
        inner.backward.push(uri.to_string());
        inner.forward.insert(uri.to_string(), id);
        id
    }

    /// Resolves a previously-interned id back to its URI.
    ///
    /// Returns `None` for [`Urid::NONE`] or any id this map never handed
    /// out (e.g. one interned by a different `UridMap` instance).
    pub fn unmap(&self, urid: Urid) -> Option<String> {
        if urid == Urid::NONE {
            return None;
        }
        let inner = self.inner.lock().expect("urid map poisoned");
        inner.backward.get(urid.0 as usize).cloned()
    }
}

impl Default for UridMap {
    fn default() -> Self {
        Self::new()
    }
}
