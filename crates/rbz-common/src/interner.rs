//! String interner for identifier deduplication.
//!
//! Intern strings into a pool and pass around u32 indices (Atoms).
//! Method names, variable names, and class names repeat constantly
//! during a simulation; comparisons become integer comparisons and
//! hash-map keys stay `Copy`.
//!
//! The engine is strictly single-threaded (one evaluation walk at a
//! time), so the interner is a plain mutable pool rather than a
//! sharded concurrent one.

use rustc_hash::FxHashMap;

/// An interned string identifier.
///
/// Atoms are cheap to copy (just a u32) and can be compared with `==`
/// in O(1). To get the actual string, use `Interner::resolve(atom)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom(pub u32);

impl Atom {
    /// A sentinel value representing no atom / empty string.
    pub const NONE: Atom = Atom(0);

    /// Check if this is the empty/none atom.
    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Get the raw index value.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

/// Strings interned at construction so hot identifiers resolve to
/// stable atoms without a lookup race against user code.
const COMMON_STRINGS: &[&str] = &[
    // Conversion protocol names consulted by the call evaluator
    "to_s", "to_str", "to_a", "to_ary", "to_h", "to_hash", "to_i", "to_int", "to_f", "to_c",
    "to_r", // Conventional call names
    "new", "call", "raise", "first", "[]", // Core class names
    "Object", "NilClass", "TrueClass", "FalseClass", "Integer", "Float", "String", "Symbol",
    "Array", "Hash", "Range", "Regexp", "Proc", "Class", "Module", "StandardError", "Comparable",
    // Generic parameter names used by core signatures
    "Elem", "K", "V", "T", "U", "self",
];

/// A string interning pool.
///
/// Index 0 is reserved for the empty string so `Atom::NONE` always
/// resolves to `""`.
pub struct Interner {
    strings: Vec<String>,
    lookup: FxHashMap<String, Atom>,
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Interner {
            strings: Vec::with_capacity(COMMON_STRINGS.len() + 64),
            lookup: FxHashMap::default(),
        };
        interner.intern("");
        for s in COMMON_STRINGS {
            interner.intern(s);
        }
        interner
    }

    /// Intern a string, returning its atom. Repeated calls with the
    /// same string return the same atom.
    pub fn intern(&mut self, s: &str) -> Atom {
        if let Some(&atom) = self.lookup.get(s) {
            return atom;
        }
        let atom = Atom(self.strings.len() as u32);
        self.strings.push(s.to_string());
        self.lookup.insert(s.to_string(), atom);
        atom
    }

    /// Look up an already-interned string without inserting.
    pub fn get(&self, s: &str) -> Option<Atom> {
        self.lookup.get(s).copied()
    }

    /// Resolve an atom back to its string.
    ///
    /// Unknown atoms resolve to the empty string rather than panicking;
    /// the engine never treats a name lookup as fatal.
    pub fn resolve(&self, atom: Atom) -> &str {
        self.strings
            .get(atom.0 as usize)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Number of interned strings (including the reserved empty slot).
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        // Slot 0 is always present.
        false
    }
}
