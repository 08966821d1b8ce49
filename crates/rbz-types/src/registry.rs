//! Class and module registry.
//!
//! Classes are interned into a table and addressed by [`ClassId`]; the
//! core classes the engine reasons about structurally (nil, Array,
//! Hash, ...) are pre-registered at fixed indices so shape checks are
//! integer comparisons.

use rbz_common::{Atom, Interner};
use rustc_hash::FxHashMap;

/// Identifier of a registered class or module.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u32);

impl ClassId {
    pub const OBJECT: ClassId = ClassId(0);
    pub const NIL: ClassId = ClassId(1);
    pub const TRUE: ClassId = ClassId(2);
    pub const FALSE: ClassId = ClassId(3);
    pub const INTEGER: ClassId = ClassId(4);
    pub const FLOAT: ClassId = ClassId(5);
    pub const STRING: ClassId = ClassId(6);
    pub const SYMBOL: ClassId = ClassId(7);
    pub const ARRAY: ClassId = ClassId(8);
    pub const HASH: ClassId = ClassId(9);
    pub const RANGE: ClassId = ClassId(10);
    pub const REGEXP: ClassId = ClassId(11);
    pub const PROC: ClassId = ClassId(12);
    pub const CLASS: ClassId = ClassId(13);
    pub const MODULE: ClassId = ClassId(14);
    pub const STANDARD_ERROR: ClassId = ClassId(15);
}

/// Metadata of one registered class or module.
#[derive(Clone, Debug)]
pub struct ClassInfo {
    pub name: Atom,
    pub superclass: Option<ClassId>,
    /// Declared generic parameter names, positionally matching the
    /// `args` of an instance shape.
    pub type_params: Vec<Atom>,
    /// Classes can be instantiated (`new`); modules cannot.
    pub is_class: bool,
}

pub struct ClassRegistry {
    classes: Vec<ClassInfo>,
    by_name: FxHashMap<Atom, ClassId>,
}

impl ClassRegistry {
    /// Build a registry with the core classes pre-registered at the
    /// `ClassId` constant indices.
    pub fn core(interner: &mut Interner) -> Self {
        let mut registry = ClassRegistry {
            classes: Vec::with_capacity(24),
            by_name: FxHashMap::default(),
        };
        let object = registry.define_in(interner, "Object", None, &[], true);
        debug_assert_eq!(object, ClassId::OBJECT);
        let entries: &[(&str, &[&str])] = &[
            ("NilClass", &[]),
            ("TrueClass", &[]),
            ("FalseClass", &[]),
            ("Integer", &[]),
            ("Float", &[]),
            ("String", &[]),
            ("Symbol", &[]),
            ("Array", &["Elem"]),
            ("Hash", &["K", "V"]),
            ("Range", &["Elem"]),
            ("Regexp", &[]),
            ("Proc", &[]),
            ("Class", &[]),
            ("Module", &[]),
            ("StandardError", &[]),
        ];
        for (name, params) in entries {
            registry.define_in(interner, name, Some(ClassId::OBJECT), params, true);
        }
        registry
    }

    fn define_in(
        &mut self,
        interner: &mut Interner,
        name: &str,
        superclass: Option<ClassId>,
        type_params: &[&str],
        is_class: bool,
    ) -> ClassId {
        let name = interner.intern(name);
        let params = type_params.iter().map(|p| interner.intern(p)).collect();
        self.define(name, superclass, params, is_class)
    }

    /// Register a class or module.
    pub fn define(
        &mut self,
        name: Atom,
        superclass: Option<ClassId>,
        type_params: Vec<Atom>,
        is_class: bool,
    ) -> ClassId {
        if let Some(&existing) = self.by_name.get(&name) {
            return existing;
        }
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassInfo {
            name,
            superclass,
            type_params,
            is_class,
        });
        self.by_name.insert(name, id);
        id
    }

    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.get(id.0 as usize)
    }

    /// Resolve a class by (simple) name.
    pub fn lookup(&self, name: Atom) -> Option<ClassId> {
        self.by_name.get(&name).copied()
    }

    pub fn is_class(&self, id: ClassId) -> bool {
        self.get(id).map(|c| c.is_class).unwrap_or(false)
    }

    pub fn type_params(&self, id: ClassId) -> &[Atom] {
        self.get(id).map(|c| c.type_params.as_slice()).unwrap_or(&[])
    }

    /// The class followed by its superclass chain. Bounded by the
    /// registry size so a malformed cyclic hierarchy cannot loop.
    pub fn ancestors(&self, id: ClassId) -> Ancestors<'_> {
        Ancestors {
            registry: self,
            current: Some(id),
            remaining: self.classes.len() + 1,
        }
    }
}

pub struct Ancestors<'a> {
    registry: &'a ClassRegistry,
    current: Option<ClassId>,
    remaining: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = ClassId;

    fn next(&mut self) -> Option<ClassId> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let id = self.current?;
        self.current = self.registry.get(id).and_then(|c| c.superclass);
        Some(id)
    }
}
