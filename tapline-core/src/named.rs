//! Named protocol numbers
//!
//! A [`NamedNumber`] pairs a numeric protocol code with a symbolic name. Each
//! protocol family (EtherType, IP protocol, port) is a marker type
//! implementing [`NumberFamily`], which supplies the well-known constants and
//! the fallback policy for codes nobody registered.
//!
//! [`NamedNumberRegistry`] holds the canonical instance per code. Lookups
//! never fail and never mutate the registry: an unregistered code yields
//! either a provisional unnamed instance (`"-"`) when the family considers it
//! in range, or the family's `Unknown` sentinel.

use parking_lot::RwLock;
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Name given to in-range codes that have no registered name
pub const UNNAMED: &str = "-";

/// Name of the out-of-range sentinel
pub const UNKNOWN: &str = "Unknown";

/// A protocol number family
pub trait NumberFamily: Send + Sync + 'static {
    /// Underlying code type
    type Value: Copy + Eq + Hash + Ord + fmt::Debug + Send + Sync + 'static;

    /// Family name used in diagnostics
    const FAMILY: &'static str;

    /// Sentinel returned for codes outside the family's defined range
    fn unknown() -> NamedNumber<Self>
    where
        Self: Sized;

    /// Whether an unregistered code is still meaningful for this family
    fn is_in_range(value: Self::Value) -> bool;

    /// Constants loaded by [`NamedNumberRegistry::with_defaults`]
    fn well_known() -> Vec<NamedNumber<Self>>
    where
        Self: Sized;

    /// Render a code for display
    fn format_value(value: Self::Value, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// A (code, name) pair belonging to family `F`
pub struct NamedNumber<F: NumberFamily> {
    value: F::Value,
    name: Cow<'static, str>,
    _family: PhantomData<fn() -> F>,
}

impl<F: NumberFamily> NamedNumber<F> {
    /// Build a constant with a static name
    pub const fn constant(value: F::Value, name: &'static str) -> Self {
        Self {
            value,
            name: Cow::Borrowed(name),
            _family: PhantomData,
        }
    }

    /// Build an instance with a runtime name
    pub fn new<S: Into<Cow<'static, str>>>(value: F::Value, name: S) -> Self {
        Self {
            value,
            name: name.into(),
            _family: PhantomData,
        }
    }

    pub fn value(&self) -> F::Value {
        self.value
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// True for the family's out-of-range sentinel
    pub fn is_unknown(&self) -> bool {
        *self == F::unknown()
    }

    /// True for a provisional instance synthesized for an unregistered code
    pub fn is_unnamed(&self) -> bool {
        self.name == UNNAMED
    }
}

impl<F: NumberFamily> Clone for NamedNumber<F> {
    fn clone(&self) -> Self {
        Self {
            value: self.value,
            name: self.name.clone(),
            _family: PhantomData,
        }
    }
}

impl<F: NumberFamily> PartialEq for NamedNumber<F> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.name == other.name
    }
}

impl<F: NumberFamily> Eq for NamedNumber<F> {}

impl<F: NumberFamily> Hash for NamedNumber<F> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
        self.name.hash(state);
    }
}

impl<F: NumberFamily> PartialOrd for NamedNumber<F> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<F: NumberFamily> Ord for NamedNumber<F> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.value
            .cmp(&other.value)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl<F: NumberFamily> fmt::Debug for NamedNumber<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(F::FAMILY)
            .field("value", &self.value)
            .field("name", &self.name)
            .finish()
    }
}

impl<F: NumberFamily> fmt::Display for NamedNumber<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        F::format_value(self.value, f)?;
        write!(f, " ({})", self.name)
    }
}

/// Canonical code-to-name mapping for one family
pub struct NamedNumberRegistry<F: NumberFamily> {
    entries: RwLock<HashMap<F::Value, NamedNumber<F>>>,
}

impl<F: NumberFamily> NamedNumberRegistry<F> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry preloaded with the family's well-known constants
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        {
            let mut entries = registry.entries.write();
            for number in F::well_known() {
                entries.insert(number.value, number);
            }
        }
        registry
    }

    /// Resolve a code. Never fails and never inserts.
    pub fn get_instance(&self, value: F::Value) -> NamedNumber<F> {
        if let Some(number) = self.entries.read().get(&value) {
            return number.clone();
        }
        if F::is_in_range(value) {
            NamedNumber::constant(value, UNNAMED)
        } else {
            F::unknown()
        }
    }

    /// Insert or replace the binding for `number`'s code, returning the
    /// previous binding if there was one
    pub fn register(&self, number: NamedNumber<F>) -> Option<NamedNumber<F>> {
        self.entries.write().insert(number.value, number)
    }

    /// Remove a binding
    pub fn unregister(&self, value: F::Value) -> Option<NamedNumber<F>> {
        self.entries.write().remove(&value)
    }

    pub fn contains(&self, value: F::Value) -> bool {
        self.entries.read().contains_key(&value)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all bindings, ordered by code
    pub fn entries(&self) -> Vec<NamedNumber<F>> {
        let mut all: Vec<_> = self.entries.read().values().cloned().collect();
        all.sort();
        all
    }
}

impl<F: NumberFamily> Default for NamedNumberRegistry<F> {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<F: NumberFamily> fmt::Debug for NamedNumberRegistry<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedNumberRegistry")
            .field("family", &F::FAMILY)
            .field("entries", &self.len())
            .finish()
    }
}
