//! Node definitions and the arena that owns them.

use rbz_common::Atom;

/// Index of a node in its [`NodeArena`].
///
/// Node identity for the whole engine: dig paths, target detection and
/// the one-shot resolution all compare `NodeId`s, never structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns every node of one parsed fragment.
#[derive(Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena { nodes: Vec::new() }
    }

    /// Append a node, returning its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    /// Fetch a node. A dangling id yields `None`; the dispatcher treats
    /// that like an unknown node rather than panicking.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Which namespace a variable name lives in.
///
/// Scope frames gate visibility per kind: a method boundary stops
/// locals but lets instance/class/global names through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarKind {
    Local,
    Instance,
    ClassVar,
    Global,
    Const,
}

/// One positional argument or array-literal element.
#[derive(Clone, Debug)]
pub enum Arg {
    Positional(NodeId),
    /// `*expr`
    Splat(NodeId),
}

/// One keyword argument or hash-literal entry.
#[derive(Clone, Debug)]
pub enum KwArg {
    Pair { key: KwKey, value: NodeId },
    /// `**expr`
    DoubleSplat(NodeId),
}

/// A hash/keyword key: a bare label (`k:`) or an arbitrary expression.
#[derive(Clone, Debug)]
pub enum KwKey {
    Label(Atom),
    Expr(NodeId),
}

/// The block attached to a call site.
#[derive(Clone, Debug)]
pub enum BlockArg {
    /// `{ |a, b| ... }` / `do ... end`
    Literal { params: Params, body: Option<NodeId> },
    /// `&expr`
    Pass(NodeId),
    /// `&:sym`
    SymbolPass(Atom),
}

/// Parameter list of a method, lambda, or block.
#[derive(Clone, Debug, Default)]
pub struct Params {
    pub required: Vec<ParamDecl>,
    /// `(a = expr)` — name plus default expression.
    pub optional: Vec<(Atom, NodeId)>,
    /// `*rest`; `Some(None)` is the anonymous `*`.
    pub rest: Option<Option<Atom>>,
    pub post: Vec<ParamDecl>,
    /// `k:` (required, `None` default) or `k: expr`.
    pub keywords: Vec<(Atom, Option<NodeId>)>,
    /// `**kwrest`; `Some(None)` is the anonymous `**`.
    pub kwrest: Option<Option<Atom>>,
    /// `&blk`
    pub block: Option<Atom>,
}

/// One required parameter: a plain name or a destructuring group.
#[derive(Clone, Debug)]
pub enum ParamDecl {
    Name(Atom),
    Destructure(Vec<MlhsItem>),
}

/// One target of a multi-assignment left-hand side.
#[derive(Clone, Debug)]
pub enum MlhsItem {
    Target(VarKind, Atom),
    /// `*rest`; `None` is the bare `*` placeholder.
    Rest(Option<(VarKind, Atom)>),
    /// `(a, b)` nested destructuring.
    Nested(Vec<MlhsItem>),
    /// `expr.attr = ...` — receiver evaluated for effects only.
    AttrField { receiver: NodeId, name: Atom },
    /// `expr[args] = ...` — receiver and args evaluated for effects only.
    IndexField { receiver: NodeId, args: Vec<Arg> },
}

/// Left-hand side of a single assignment.
#[derive(Clone, Debug)]
pub enum AssignTarget {
    Var(VarKind, Atom),
    Attr {
        receiver: NodeId,
        safe: bool,
        name: Atom,
    },
    Index {
        receiver: NodeId,
        args: Vec<Arg>,
    },
}

/// `when tests... then body`
#[derive(Clone, Debug)]
pub struct WhenClause {
    pub tests: Vec<Arg>,
    pub body: Option<NodeId>,
}

/// `in pattern [if guard] then body`
#[derive(Clone, Debug)]
pub struct InClause {
    pub pattern: Pattern,
    pub guard: Option<NodeId>,
    pub body: Option<NodeId>,
}

/// `rescue Classes => var; body`
#[derive(Clone, Debug)]
pub struct RescueClause {
    pub classes: Vec<NodeId>,
    pub var: Option<Atom>,
    pub body: Option<NodeId>,
}

/// Structural pattern of a `case/in` clause.
///
/// Patterns are not arena nodes: they never carry identity of their
/// own, only the expressions embedded in them do ([`Pattern::Value`]
/// holds a `NodeId` so a completion target inside a pin or literal is
/// still reachable).
#[derive(Clone, Debug)]
pub enum Pattern {
    /// `in x` — binds the whole target.
    Bind(Atom),
    /// Literal, constant, or pinned expression; evaluated for effects.
    Value(NodeId),
    /// `lhs | rhs`
    Alt(Box<Pattern>, Box<Pattern>),
    /// `pattern => name`
    Capture { pattern: Box<Pattern>, name: Atom },
    /// `[pre..., *rest, post...]`
    Array {
        pre: Vec<Pattern>,
        rest: Option<Option<Atom>>,
        post: Vec<Pattern>,
    },
    /// `{k: pattern, ..., **rest}` — a `None` sub-pattern is the
    /// shorthand `{k:}` which binds `k`.
    Hash {
        pairs: Vec<(Atom, Option<Pattern>)>,
        rest: Option<Option<Atom>>,
    },
    /// A form the producer could not classify.
    Unknown,
}

/// One syntactic construct.
///
/// Every variant the simulator has an evaluation rule for, plus
/// [`Node::Unknown`] for forward compatibility with constructs this
/// engine does not model yet.
#[derive(Clone, Debug)]
pub enum Node {
    // --- Literals ---
    Nil,
    True,
    False,
    SelfExpr,
    IntLit,
    FloatLit,
    StrLit,
    SymLit,
    RegexpLit,
    RangeLit {
        start: Option<NodeId>,
        end: Option<NodeId>,
    },
    /// `"a#{b}c"` — parts are the embedded expressions.
    StrInterp {
        parts: Vec<NodeId>,
    },
    /// `:"a#{b}"`
    SymInterp {
        parts: Vec<NodeId>,
    },
    /// `/a#{b}/`
    RegexpInterp {
        parts: Vec<NodeId>,
    },
    /// `$~`, `$1`, ... — `String | nil`.
    BackRef,

    // --- Sequencing ---
    Statements(Vec<NodeId>),

    // --- Reads ---
    VarRead {
        kind: VarKind,
        name: Atom,
    },
    /// `parent::Name`
    ConstPath {
        parent: NodeId,
        name: Atom,
    },

    // --- Collections ---
    ArrayLit {
        elements: Vec<Arg>,
    },
    HashLit {
        entries: Vec<KwArg>,
    },

    // --- Assignment ---
    Assign {
        target: AssignTarget,
        value: NodeId,
    },
    /// `x op= v`, desugared by the dispatcher to `x = x op v`.
    OpAssign {
        target: AssignTarget,
        op: Atom,
        value: NodeId,
    },
    OrAssign {
        target: AssignTarget,
        value: NodeId,
    },
    AndAssign {
        target: AssignTarget,
        value: NodeId,
    },
    MultiAssign {
        targets: Vec<MlhsItem>,
        value: NodeId,
    },

    // --- Operators and calls ---
    And {
        lhs: NodeId,
        rhs: NodeId,
    },
    Or {
        lhs: NodeId,
        rhs: NodeId,
    },
    Not(NodeId),
    /// `receiver[args]` — evaluates as a `[]` call.
    Index {
        receiver: NodeId,
        args: Vec<Arg>,
    },
    Call {
        /// `None` means an implicit-self call.
        receiver: Option<NodeId>,
        /// `&.` safe navigation.
        safe: bool,
        name: Atom,
        args: Vec<Arg>,
        kwargs: Vec<KwArg>,
        block: Option<BlockArg>,
    },

    // --- Control flow ---
    If {
        cond: NodeId,
        then_body: Option<NodeId>,
        else_body: Option<NodeId>,
    },
    While {
        cond: NodeId,
        body: Option<NodeId>,
    },
    For {
        targets: Vec<MlhsItem>,
        iterable: NodeId,
        body: Option<NodeId>,
    },
    CaseWhen {
        subject: Option<NodeId>,
        clauses: Vec<WhenClause>,
        else_body: Option<NodeId>,
    },
    CaseIn {
        subject: NodeId,
        clauses: Vec<InClause>,
        else_body: Option<NodeId>,
    },
    Break(Option<NodeId>),
    Next(Option<NodeId>),
    Return(Option<NodeId>),
    Redo,
    Retry,
    Begin {
        body: Option<NodeId>,
        rescues: Vec<RescueClause>,
        else_body: Option<NodeId>,
        ensure_body: Option<NodeId>,
    },
    /// `expr rescue fallback`
    RescueMod {
        body: NodeId,
        fallback: NodeId,
    },
    Yield(Vec<Arg>),
    SuperCall {
        args: Vec<Arg>,
    },
    ZSuper,
    Defined(NodeId),

    // --- Definitions (scoped bodies) ---
    MethodDef {
        name: Atom,
        /// `def recv.name` singleton receiver.
        singleton: Option<NodeId>,
        params: Params,
        body: Option<NodeId>,
    },
    Lambda {
        params: Params,
        body: Option<NodeId>,
    },
    ClassDef {
        name: Atom,
        superclass: Option<NodeId>,
        body: Option<NodeId>,
    },
    ModuleDef {
        name: Atom,
        body: Option<NodeId>,
    },
    SingletonClassDef {
        expr: NodeId,
        body: Option<NodeId>,
    },

    // --- Forward compatibility ---
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_identity() {
        let mut arena = NodeArena::new();
        let a = arena.push(Node::Nil);
        let b = arena.push(Node::Nil);
        assert_ne!(a, b);
        assert!(matches!(arena.get(a), Some(Node::Nil)));
        assert!(matches!(arena.get(b), Some(Node::Nil)));
    }

    #[test]
    fn dangling_id_is_none() {
        let arena = NodeArena::new();
        assert!(arena.get(NodeId(3)).is_none());
    }
}
