//! Union type values and their candidate shapes.

use crate::registry::ClassId;
use rbz_common::limits::MAX_UNION_SHAPES;
use smallvec::SmallVec;

/// One candidate runtime form a value could take.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// An instance of `class`, with generic bindings positionally
    /// matching the class's declared type parameters (`Array` carries
    /// one `Elem` binding, `Hash` carries `K` and `V`). Missing
    /// bindings mean "unknown".
    Instance { class: ClassId, args: Vec<Ty> },
    /// The class/module object itself.
    Singleton(ClassId),
    /// A proc/lambda value.
    Proc,
    /// Splat marker wrapping the splatted value's type. Only ever
    /// appears in argument lists and multi-assign sources; flattened
    /// away before a `Ty` escapes the call evaluator.
    Splat(Box<Ty>),
}

impl Shape {
    /// The class an instance shape belongs to, if it is one.
    pub fn instance_class(&self) -> Option<ClassId> {
        match self {
            Shape::Instance { class, .. } => Some(*class),
            _ => None,
        }
    }
}

/// An immutable union of candidate shapes: "could be any of these".
///
/// The empty union means "no candidates" and is how zero-match call
/// resolution degrades; callers union it away or fall back to nil.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Ty {
    shapes: SmallVec<[Shape; 2]>,
}

impl Ty {
    // --- constructors ---

    pub fn never() -> Ty {
        Ty::default()
    }

    pub fn from_shape(shape: Shape) -> Ty {
        let mut shapes = SmallVec::new();
        shapes.push(shape);
        Ty { shapes }
    }

    /// A plain instance with no generic bindings.
    pub fn instance(class: ClassId) -> Ty {
        Ty::from_shape(Shape::Instance {
            class,
            args: Vec::new(),
        })
    }

    /// An instance with generic bindings.
    pub fn instance_with(class: ClassId, args: Vec<Ty>) -> Ty {
        Ty::from_shape(Shape::Instance { class, args })
    }

    pub fn singleton(class: ClassId) -> Ty {
        Ty::from_shape(Shape::Singleton(class))
    }

    pub fn proc_value() -> Ty {
        Ty::from_shape(Shape::Proc)
    }

    pub fn splat(inner: Ty) -> Ty {
        Ty::from_shape(Shape::Splat(Box::new(inner)))
    }

    pub fn nil() -> Ty {
        Ty::instance(ClassId::NIL)
    }

    pub fn object() -> Ty {
        Ty::instance(ClassId::OBJECT)
    }

    pub fn boolean() -> Ty {
        Ty::union([Ty::instance(ClassId::TRUE), Ty::instance(ClassId::FALSE)])
    }

    /// `Array[elem]`
    pub fn array_of(elem: Ty) -> Ty {
        Ty::instance_with(ClassId::ARRAY, vec![elem])
    }

    /// `Hash[key, value]`
    pub fn hash_of(key: Ty, value: Ty) -> Ty {
        Ty::instance_with(ClassId::HASH, vec![key, value])
    }

    /// Union construction with flattening and deduplication.
    ///
    /// Duplicate shapes collapse; a union wider than
    /// `MAX_UNION_SHAPES` carries no completion signal and collapses
    /// to the unconstrained `Object` instance.
    pub fn union<I: IntoIterator<Item = Ty>>(parts: I) -> Ty {
        let mut shapes: SmallVec<[Shape; 2]> = SmallVec::new();
        for part in parts {
            for shape in part.shapes {
                if !shapes.contains(&shape) {
                    shapes.push(shape);
                }
            }
        }
        if shapes.len() > MAX_UNION_SHAPES {
            return Ty::object();
        }
        Ty { shapes }
    }

    /// Union of this type with another.
    pub fn or(&self, other: &Ty) -> Ty {
        Ty::union([self.clone(), other.clone()])
    }

    // --- queries ---

    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    pub fn is_never(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Exactly nil and nothing else.
    pub fn is_nil(&self) -> bool {
        self.shapes.len() == 1 && self.shapes[0].instance_class() == Some(ClassId::NIL)
    }

    /// Could this value be nil?
    pub fn nillable(&self) -> bool {
        self.shapes
            .iter()
            .any(|s| s.instance_class() == Some(ClassId::NIL))
    }

    /// The same union with nil candidates removed.
    pub fn nonnillable(&self) -> Ty {
        Ty {
            shapes: self
                .shapes
                .iter()
                .filter(|s| s.instance_class() != Some(ClassId::NIL))
                .cloned()
                .collect(),
        }
    }

    /// Any class/module-object candidates.
    pub fn singleton_classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.shapes.iter().filter_map(|s| match s {
            Shape::Singleton(c) => Some(*c),
            _ => None,
        })
    }

    /// Instance candidates of the given class, yielding their generic
    /// bindings.
    pub fn instances_of(&self, class: ClassId) -> impl Iterator<Item = &[Ty]> + '_ {
        self.shapes.iter().filter_map(move |s| match s {
            Shape::Instance { class: c, args } if *c == class => Some(args.as_slice()),
            _ => None,
        })
    }

    /// Is at least one candidate an array instance?
    pub fn has_array_shape(&self) -> bool {
        self.instances_of(ClassId::ARRAY).next().is_some()
    }

    /// Is at least one candidate a hash instance?
    pub fn has_hash_shape(&self) -> bool {
        self.instances_of(ClassId::HASH).next().is_some()
    }

    /// Union of the element types of every array candidate. `None`
    /// when no candidate is array-shaped.
    pub fn array_element(&self) -> Option<Ty> {
        let mut any = false;
        let mut elems = Vec::new();
        for args in self.instances_of(ClassId::ARRAY) {
            any = true;
            match args.first() {
                Some(e) => elems.push(e.clone()),
                None => elems.push(Ty::object()),
            }
        }
        if any {
            Some(Ty::union(elems))
        } else {
            None
        }
    }

    /// Union of (key, value) bindings of every hash candidate.
    pub fn hash_key_value(&self) -> Option<(Ty, Ty)> {
        let mut any = false;
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for args in self.instances_of(ClassId::HASH) {
            any = true;
            keys.push(args.first().cloned().unwrap_or_else(Ty::object));
            values.push(args.get(1).cloned().unwrap_or_else(Ty::object));
        }
        if any {
            Some((Ty::union(keys), Ty::union(values)))
        } else {
            None
        }
    }
}
