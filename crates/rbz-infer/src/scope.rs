//! Frame-chain environment with speculative branch overlays.
//!
//! The scope is a chain of frames. Scoped frames correspond to real
//! runtime boundaries (method body, block body, loop, rescue region);
//! overlay frames are speculative: they capture every write made while
//! a branch is explored so [`Branches::finish`] can merge the branches'
//! effects back into the base environment as unions.
//!
//! Jump slots (`break`/`next`/`return`/raise) live on frames. A jump
//! records into the current frame and marks it terminated; when a frame
//! is discarded its unconsumed slots fold upward to the nearest
//! enclosing frame that catches the kind.

use bitflags::bitflags;
use indexmap::{IndexMap, IndexSet};
use rbz_common::Atom;
use rbz_syntax::VarKind;
use rbz_types::Ty;

bitflags! {
    /// Variable namespaces a frame lets through to its parent.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct PassKinds: u8 {
        const LOCAL = 1 << 0;
        const INSTANCE = 1 << 1;
        const CLASS_VAR = 1 << 2;
        const GLOBAL = 1 << 3;
        const CONST = 1 << 4;
    }
}

bitflags! {
    /// Jump kinds a frame catches.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Catches: u8 {
        const BREAK = 1 << 0;
        const NEXT = 1 << 1;
        const RETURN = 1 << 2;
        const RAISE = 1 << 3;
        const PATTERN = 1 << 4;
    }
}

/// Non-local jump kinds the simulator records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JumpKind {
    Break,
    Next,
    Return,
    Raise,
    /// Pattern-match early stop: a decisive binding was made and the
    /// remaining sub-patterns of the clause are skipped.
    Pattern,
}

impl JumpKind {
    fn flag(self) -> Catches {
        match self {
            JumpKind::Break => Catches::BREAK,
            JumpKind::Next => Catches::NEXT,
            JumpKind::Return => Catches::RETURN,
            JumpKind::Raise => Catches::RAISE,
            JumpKind::Pattern => Catches::PATTERN,
        }
    }
}

fn kind_flag(kind: VarKind) -> PassKinds {
    match kind {
        VarKind::Local => PassKinds::LOCAL,
        VarKind::Instance => PassKinds::INSTANCE,
        VarKind::ClassVar => PassKinds::CLASS_VAR,
        VarKind::Global => PassKinds::GLOBAL,
        VarKind::Const => PassKinds::CONST,
    }
}

/// Spec for pushing a scoped frame.
pub struct FrameSpec {
    pub pass: PassKinds,
    pub catches: Catches,
    /// `self` inside the frame; `None` inherits the enclosing `self`.
    pub self_type: Option<Ty>,
}

impl FrameSpec {
    /// Method body: locals stop at the boundary, everything else
    /// passes through.
    pub fn method(self_type: Ty) -> FrameSpec {
        FrameSpec {
            pass: PassKinds::INSTANCE | PassKinds::CLASS_VAR | PassKinds::GLOBAL | PassKinds::CONST,
            catches: Catches::BREAK | Catches::NEXT | Catches::RETURN,
            self_type: Some(self_type),
        }
    }

    /// Block body: closes over locals.
    pub fn block(self_type: Option<Ty>) -> FrameSpec {
        FrameSpec {
            pass: PassKinds::all(),
            catches: Catches::BREAK | Catches::NEXT,
            self_type,
        }
    }

    /// Lambda body: closes over locals but also catches `return`.
    pub fn lambda() -> FrameSpec {
        FrameSpec {
            pass: PassKinds::all(),
            catches: Catches::BREAK | Catches::NEXT | Catches::RETURN,
            self_type: None,
        }
    }

    /// Loop body region: catches `break`.
    pub fn breakable() -> FrameSpec {
        FrameSpec {
            pass: PassKinds::all(),
            catches: Catches::BREAK,
            self_type: None,
        }
    }

    /// Rescue-guarded region: catches raises.
    pub fn rescue() -> FrameSpec {
        FrameSpec {
            pass: PassKinds::all(),
            catches: Catches::RAISE,
            self_type: None,
        }
    }

    /// One `in` clause of a pattern match.
    pub fn pattern_clause() -> FrameSpec {
        FrameSpec {
            pass: PassKinds::all(),
            catches: Catches::PATTERN,
            self_type: None,
        }
    }

    /// Class/module body: only globals and constants pass through.
    pub fn definition(self_type: Ty) -> FrameSpec {
        FrameSpec {
            pass: PassKinds::GLOBAL | PassKinds::CONST,
            catches: Catches::BREAK | Catches::NEXT | Catches::RETURN,
            self_type: Some(self_type),
        }
    }
}

/// Accumulated jump slots of a popped frame, for the construct that
/// pushed it to consume.
#[derive(Debug, Default)]
pub struct FrameJumps {
    pub break_value: Option<Ty>,
    pub next_value: Option<Ty>,
    pub return_value: Option<Ty>,
    pub raised: bool,
    pub terminated: bool,
}

#[derive(Debug, Default)]
struct Frame {
    parent: Option<usize>,
    pass: PassKinds,
    catches: Catches,
    overlay: bool,
    vars: IndexMap<(VarKind, Atom), Ty>,
    self_type: Option<Ty>,
    break_value: Option<Ty>,
    next_value: Option<Ty>,
    return_value: Option<Ty>,
    raise_value: Option<Ty>,
    pattern_value: Option<Ty>,
    terminated: bool,
}

impl Frame {
    fn slot_mut(&mut self, kind: JumpKind) -> &mut Option<Ty> {
        match kind {
            JumpKind::Break => &mut self.break_value,
            JumpKind::Next => &mut self.next_value,
            JumpKind::Return => &mut self.return_value,
            JumpKind::Raise => &mut self.raise_value,
            JumpKind::Pattern => &mut self.pattern_value,
        }
    }
}

/// Variable bindings visible at one program point, in first-seen order.
#[derive(Clone, Debug, Default)]
pub struct ScopeSnapshot {
    pub variables: Vec<(VarKind, Atom, Ty)>,
    pub self_type: Ty,
}

impl ScopeSnapshot {
    /// The recorded type of one name, if visible.
    pub fn get(&self, kind: VarKind, name: Atom) -> Option<&Ty> {
        self.variables
            .iter()
            .find(|(k, n, _)| *k == kind && *n == name)
            .map(|(_, _, ty)| ty)
    }
}

/// The simulator's environment: a frame arena plus a cursor.
pub struct Scope {
    frames: Vec<Frame>,
    current: usize,
}

impl Default for Scope {
    fn default() -> Self {
        Scope::new()
    }
}

impl Scope {
    /// A scope with an empty root frame. The root owns every namespace.
    pub fn new() -> Scope {
        Scope {
            frames: vec![Frame::default()],
            current: 0,
        }
    }

    /// Seed a binding into the root frame.
    pub fn seed(&mut self, kind: VarKind, name: Atom, ty: Ty) {
        self.frames[0].vars.insert((kind, name), ty);
    }

    /// Set `self` for the root frame.
    pub fn seed_self(&mut self, ty: Ty) {
        self.frames[0].self_type = Some(ty);
    }

    // --- variable access ---

    /// Read a variable, walking outward. Non-overlay frames that do not
    /// pass the variable's kind stop the walk.
    pub fn read(&self, kind: VarKind, name: Atom) -> Option<Ty> {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let frame = &self.frames[i];
            if let Some(ty) = frame.vars.get(&(kind, name)) {
                return Some(ty.clone());
            }
            if !frame.overlay && !frame.pass.contains(kind_flag(kind)) {
                return None;
            }
            idx = frame.parent;
        }
        None
    }

    /// Write a variable. The nearest overlay captures the write; below
    /// any overlay, an existing binding is updated in place and a new
    /// name is defined at the innermost frame that owns its namespace.
    /// Writes after termination are discarded.
    pub fn write(&mut self, kind: VarKind, name: Atom, ty: Ty) {
        if self.is_terminated() {
            return;
        }
        let mut i = self.current;
        loop {
            let frame = &self.frames[i];
            if frame.overlay || frame.vars.contains_key(&(kind, name)) {
                break;
            }
            match frame.parent {
                Some(parent) if frame.pass.contains(kind_flag(kind)) => i = parent,
                _ => break,
            }
        }
        self.frames[i].vars.insert((kind, name), ty);
    }

    /// `self` at the current point.
    pub fn self_type(&self) -> Ty {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let frame = &self.frames[i];
            if let Some(ty) = &frame.self_type {
                return ty.clone();
            }
            idx = frame.parent;
        }
        Ty::object()
    }

    /// Every binding visible from the current frame, outermost names
    /// shadowed by inner ones, namespace gating applied.
    pub fn snapshot(&self) -> ScopeSnapshot {
        let mut seen: IndexSet<(VarKind, Atom)> = IndexSet::new();
        let mut variables = Vec::new();
        let mut visible = PassKinds::all();
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            let frame = &self.frames[i];
            for ((kind, name), ty) in &frame.vars {
                if visible.contains(kind_flag(*kind)) && seen.insert((*kind, *name)) {
                    variables.push((*kind, *name, ty.clone()));
                }
            }
            if !frame.overlay {
                visible &= frame.pass;
            }
            idx = frame.parent;
        }
        ScopeSnapshot {
            variables,
            self_type: self.self_type(),
        }
    }

    // --- termination and jumps ---

    /// Has control already left this point?
    pub fn is_terminated(&self) -> bool {
        let mut idx = Some(self.current);
        while let Some(i) = idx {
            if self.frames[i].terminated {
                return true;
            }
            idx = self.frames[i].parent;
        }
        false
    }

    /// Record a jump: union the value into the current frame's slot for
    /// the kind and mark the frame terminated. Jumps after termination
    /// are discarded.
    pub fn terminate_with(&mut self, kind: JumpKind, value: Ty) {
        if self.is_terminated() {
            return;
        }
        let frame = &mut self.frames[self.current];
        let slot = frame.slot_mut(kind);
        *slot = Some(match slot.take() {
            Some(prev) => prev.or(&value),
            None => value,
        });
        frame.terminated = true;
    }

    /// Mark the current frame terminated with no jump value (`redo`,
    /// `retry`).
    pub fn terminate(&mut self) {
        self.frames[self.current].terminated = true;
    }

    // --- scoped frames ---

    /// Push a scoped frame and make it current.
    pub fn push_frame(&mut self, spec: FrameSpec) {
        self.frames.push(Frame {
            parent: Some(self.current),
            pass: spec.pass,
            catches: spec.catches,
            self_type: spec.self_type,
            ..Frame::default()
        });
        self.current = self.frames.len() - 1;
    }

    /// Pop the current scoped frame, returning its jump slots. Slots
    /// for kinds the frame does not catch fold upward to the nearest
    /// catching ancestor instead of being returned.
    pub fn pop_frame(&mut self) -> FrameJumps {
        let idx = self.current;
        let parent = self.frames[idx].parent.unwrap_or(0);
        self.current = parent;
        self.fold_jumps(idx)
    }

    /// Fold the frame's recorded jumps: caught kinds are consumed into
    /// the returned [`FrameJumps`], uncaught kinds merge upward.
    fn fold_jumps(&mut self, idx: usize) -> FrameJumps {
        let catches = self.frames[idx].catches;
        let parent = self.frames[idx].parent;
        let mut jumps = FrameJumps {
            terminated: self.frames[idx].terminated,
            ..FrameJumps::default()
        };
        const KINDS: [JumpKind; 5] = [
            JumpKind::Break,
            JumpKind::Next,
            JumpKind::Return,
            JumpKind::Raise,
            JumpKind::Pattern,
        ];
        for kind in KINDS {
            let Some(value) = self.frames[idx].slot_mut(kind).take() else {
                continue;
            };
            if catches.contains(kind.flag()) {
                match kind {
                    JumpKind::Break => jumps.break_value = Some(value),
                    JumpKind::Next => jumps.next_value = Some(value),
                    JumpKind::Return => jumps.return_value = Some(value),
                    JumpKind::Raise => jumps.raised = true,
                    JumpKind::Pattern => {}
                }
            } else {
                self.fold_one(parent, kind, value);
            }
        }
        jumps
    }

    /// Union a jump value into the nearest ancestor that catches its
    /// kind. No catcher means the jump escapes the fragment and is
    /// dropped.
    fn fold_one(&mut self, from: Option<usize>, kind: JumpKind, value: Ty) {
        let mut idx = from;
        while let Some(i) = idx {
            if self.frames[i].catches.contains(kind.flag()) {
                let slot = self.frames[i].slot_mut(kind);
                *slot = Some(match slot.take() {
                    Some(prev) => prev.or(&value),
                    None => value,
                });
                return;
            }
            idx = self.frames[i].parent;
        }
    }

    // --- overlays ---

    fn push_overlay(&mut self) -> usize {
        self.frames.push(Frame {
            parent: Some(self.current),
            pass: PassKinds::all(),
            overlay: true,
            ..Frame::default()
        });
        self.current = self.frames.len() - 1;
        self.current
    }

    fn pop_overlay(&mut self) -> (IndexMap<(VarKind, Atom), Ty>, bool) {
        let idx = self.current;
        debug_assert!(self.frames[idx].overlay);
        self.current = self.frames[idx].parent.unwrap_or(0);
        let _ = self.fold_jumps(idx);
        let terminated = self.frames[idx].terminated;
        let vars = std::mem::take(&mut self.frames[idx].vars);
        (vars, terminated)
    }

    /// Start a branch group over the current environment.
    pub fn branches(&mut self) -> Branches {
        Branches {
            outcomes: Vec::new(),
            open: false,
        }
    }
}

struct BranchOutcome {
    vars: IndexMap<(VarKind, Atom), Ty>,
    terminated: bool,
    result: Ty,
}

/// A group of speculative branches evaluated against the same base
/// environment.
///
/// Each branch is bracketed by [`Branches::enter`] / [`Branches::exit`]
/// (strictly sequential; never two live overlays for one group), and
/// [`Branches::finish`] merges all surviving branches' writes back as
/// per-name unions. A name some branch did not touch contributes its
/// pre-branch value, or nil when it did not exist yet. Branches that
/// terminated contribute neither writes nor a result.
pub struct Branches {
    outcomes: Vec<BranchOutcome>,
    open: bool,
}

impl Branches {
    /// Begin the next branch: pushes a fresh overlay.
    pub fn enter(&mut self, scope: &mut Scope) {
        debug_assert!(!self.open);
        self.open = true;
        scope.push_overlay();
    }

    /// End the current branch with its result value.
    pub fn exit(&mut self, scope: &mut Scope, result: Ty) {
        debug_assert!(self.open);
        self.open = false;
        let (vars, terminated) = scope.pop_overlay();
        self.outcomes.push(BranchOutcome {
            vars,
            terminated,
            result,
        });
    }

    /// Merge every branch's writes into the base environment and return
    /// the surviving branches' results, `None` for terminated ones.
    /// When every branch terminated the base itself terminates.
    pub fn finish(self, scope: &mut Scope) -> Vec<Option<Ty>> {
        debug_assert!(!self.open);
        let alive: Vec<&BranchOutcome> = self.outcomes.iter().filter(|o| !o.terminated).collect();
        let mut touched: IndexSet<(VarKind, Atom)> = IndexSet::new();
        for outcome in &alive {
            for key in outcome.vars.keys() {
                touched.insert(*key);
            }
        }
        for (kind, name) in touched {
            let pre = scope.read(kind, name).unwrap_or_else(Ty::nil);
            let merged = Ty::union(alive.iter().map(|o| {
                o.vars
                    .get(&(kind, name))
                    .cloned()
                    .unwrap_or_else(|| pre.clone())
            }));
            scope.write(kind, name, merged);
        }
        if !self.outcomes.is_empty() && alive.is_empty() {
            scope.terminate();
        }
        self.outcomes
            .into_iter()
            .map(|o| if o.terminated { None } else { Some(o.result) })
            .collect()
    }
}
