#![allow(dead_code)]

use rbz_common::{Atom, Interner};
use rbz_infer::{ContextSeed, ScopeSnapshot};
use rbz_syntax::{Arg, AssignTarget, Node, NodeArena, NodeId, VarKind};
use rbz_types::{ClassId, ClassRegistry, MethodTable, Shape, Ty};

/// Arena, interner, core registry/table, and a context seed, bundled
/// for test construction.
pub struct Fixture {
    pub arena: NodeArena,
    pub interner: Interner,
    pub registry: ClassRegistry,
    pub table: MethodTable,
    pub seed: ContextSeed,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl Fixture {
    pub fn new() -> Fixture {
        init_tracing();
        let mut interner = Interner::new();
        let registry = ClassRegistry::core(&mut interner);
        let table = MethodTable::core(&mut interner, &registry);
        Fixture {
            arena: NodeArena::new(),
            interner,
            registry,
            table,
            seed: ContextSeed::new(),
        }
    }

    pub fn atom(&mut self, name: &str) -> Atom {
        self.interner.intern(name)
    }

    pub fn node(&mut self, node: Node) -> NodeId {
        self.arena.push(node)
    }

    /// Seed a pre-existing local binding.
    pub fn seed_local(&mut self, name: &str, ty: Ty) {
        let atom = self.atom(name);
        self.seed.locals.push((atom, Some(ty)));
    }

    pub fn int(&mut self) -> NodeId {
        self.node(Node::IntLit)
    }

    pub fn string(&mut self) -> NodeId {
        self.node(Node::StrLit)
    }

    pub fn lvar(&mut self, name: &str) -> NodeId {
        let name = self.atom(name);
        self.node(Node::VarRead {
            kind: VarKind::Local,
            name,
        })
    }

    pub fn const_ref(&mut self, name: &str) -> NodeId {
        let name = self.atom(name);
        self.node(Node::VarRead {
            kind: VarKind::Const,
            name,
        })
    }

    pub fn assign_local(&mut self, name: &str, value: NodeId) -> NodeId {
        let name = self.atom(name);
        self.node(Node::Assign {
            target: AssignTarget::Var(VarKind::Local, name),
            value,
        })
    }

    pub fn stmts(&mut self, items: Vec<NodeId>) -> NodeId {
        self.node(Node::Statements(items))
    }

    pub fn call(&mut self, receiver: Option<NodeId>, name: &str, args: Vec<NodeId>) -> NodeId {
        let name = self.atom(name);
        self.node(Node::Call {
            receiver,
            safe: false,
            name,
            args: args.into_iter().map(Arg::Positional).collect(),
            kwargs: Vec::new(),
            block: None,
        })
    }

    pub fn infer(&mut self, root: NodeId, ancestors: &[NodeId], target: NodeId) -> Ty {
        rbz_infer::infer_type(
            &self.arena,
            root,
            ancestors,
            target,
            &self.seed,
            &self.registry,
            &self.table,
            &mut self.interner,
        )
    }

    pub fn scope_at(&mut self, root: NodeId, ancestors: &[NodeId], target: NodeId) -> ScopeSnapshot {
        rbz_infer::scope_at(
            &self.arena,
            root,
            ancestors,
            target,
            &self.seed,
            &self.registry,
            &self.table,
            &mut self.interner,
        )
    }
}

/// Instance classes of a union, for assertions.
pub fn classes(ty: &Ty) -> Vec<ClassId> {
    ty.shapes().iter().filter_map(Shape::instance_class).collect()
}

pub fn has_class(ty: &Ty, class: ClassId) -> bool {
    classes(ty).contains(&class)
}
