//! The evaluation dispatcher: one rule per node kind.

use crate::calls::BlockRef;
use crate::dig::{DigTarget, EvalResult, Resolution};
use crate::scope::{FrameSpec, JumpKind, Scope};
use rbz_common::limits::MAX_EVAL_DEPTH;
use rbz_common::{Atom, Interner};
use rbz_syntax::{Arg, AssignTarget, Node, NodeArena, NodeId, Pattern, VarKind};
use rbz_types::{ClassId, ClassRegistry, MethodTable, Shape, Ty};

/// Atoms the simulator consults by identity. All of them are preseeded
/// by the interner, so construction never grows the pool.
pub(crate) struct KnownNames {
    pub to_s: Atom,
    pub to_str: Atom,
    pub to_a: Atom,
    pub to_ary: Atom,
    pub to_h: Atom,
    pub to_hash: Atom,
    pub to_i: Atom,
    pub to_int: Atom,
    pub to_f: Atom,
    pub new: Atom,
    pub raise: Atom,
    pub first: Atom,
    pub index: Atom,
}

impl KnownNames {
    fn new(interner: &mut Interner) -> KnownNames {
        KnownNames {
            to_s: interner.intern("to_s"),
            to_str: interner.intern("to_str"),
            to_a: interner.intern("to_a"),
            to_ary: interner.intern("to_ary"),
            to_h: interner.intern("to_h"),
            to_hash: interner.intern("to_hash"),
            to_i: interner.intern("to_i"),
            to_int: interner.intern("to_int"),
            to_f: interner.intern("to_f"),
            new: interner.intern("new"),
            raise: interner.intern("raise"),
            first: interner.intern("first"),
            index: interner.intern("[]"),
        }
    }
}

/// One evaluation walk over a fragment.
///
/// The simulator never executes anything; it pushes abstract values
/// through the tree until the dig target produces its type, then
/// unwinds through the [`EvalResult`] error arm.
pub struct Simulator<'a> {
    pub(crate) arena: &'a NodeArena,
    pub(crate) dig: &'a DigTarget,
    pub(crate) registry: &'a ClassRegistry,
    pub(crate) table: &'a MethodTable,
    pub(crate) interner: &'a Interner,
    pub(crate) names: KnownNames,
    depth: u32,
}

impl<'a> Simulator<'a> {
    pub fn new(
        arena: &'a NodeArena,
        dig: &'a DigTarget,
        registry: &'a ClassRegistry,
        table: &'a MethodTable,
        interner: &'a mut Interner,
    ) -> Simulator<'a> {
        let names = KnownNames::new(interner);
        Simulator {
            arena,
            dig,
            registry,
            table,
            interner,
            names,
            depth: 0,
        }
    }

    /// Evaluate one node. If the node is the dig target its result
    /// becomes the resolution and unwinds the whole walk.
    pub fn evaluate(&mut self, id: NodeId, scope: &mut Scope) -> EvalResult<Ty> {
        if self.depth >= MAX_EVAL_DEPTH {
            tracing::warn!(depth = self.depth, "evaluation depth limit hit");
            return Ok(Ty::object());
        }
        self.depth += 1;
        let result = self.evaluate_inner(id, scope);
        self.depth -= 1;
        let ty = result?;
        if self.dig.is_target(id) {
            return Err(Resolution {
                ty,
                scope: scope.snapshot(),
            });
        }
        Ok(ty)
    }

    pub(crate) fn eval_opt(&mut self, id: Option<NodeId>, scope: &mut Scope) -> EvalResult<Ty> {
        match id {
            Some(id) => self.evaluate(id, scope),
            None => Ok(Ty::nil()),
        }
    }

    /// A branch that may or may not run: evaluate `f` speculatively and
    /// merge its writes as one arm against an untouched arm.
    pub(crate) fn conditional<F>(&mut self, scope: &mut Scope, f: F) -> EvalResult<Ty>
    where
        F: FnOnce(&mut Simulator<'a>, &mut Scope) -> EvalResult<Ty>,
    {
        let mut branches = scope.branches();
        branches.enter(scope);
        match f(self, scope) {
            Ok(ty) => branches.exit(scope, ty),
            Err(resolution) => return Err(resolution),
        }
        branches.enter(scope);
        branches.exit(scope, Ty::nil());
        let mut results = branches.finish(scope);
        Ok(results
            .swap_remove(0)
            .unwrap_or_else(Ty::never))
    }

    fn evaluate_inner(&mut self, id: NodeId, scope: &mut Scope) -> EvalResult<Ty> {
        let Some(node) = self.arena.get(id) else {
            tracing::warn!(node = id.index(), "dangling node id");
            return Ok(Ty::nil());
        };
        match node {
            // --- literals ---
            Node::Nil => Ok(Ty::nil()),
            Node::True => Ok(Ty::instance(ClassId::TRUE)),
            Node::False => Ok(Ty::instance(ClassId::FALSE)),
            Node::SelfExpr => Ok(scope.self_type()),
            Node::IntLit => Ok(Ty::instance(ClassId::INTEGER)),
            Node::FloatLit => Ok(Ty::instance(ClassId::FLOAT)),
            Node::StrLit => Ok(Ty::instance(ClassId::STRING)),
            Node::SymLit => Ok(Ty::instance(ClassId::SYMBOL)),
            Node::RegexpLit => Ok(Ty::instance(ClassId::REGEXP)),
            Node::RangeLit { start, end } => {
                let mut endpoints = Vec::new();
                if let Some(s) = start {
                    endpoints.push(self.evaluate(*s, scope)?);
                }
                if let Some(e) = end {
                    endpoints.push(self.evaluate(*e, scope)?);
                }
                let elem = Ty::union(endpoints).nonnillable();
                Ok(Ty::instance_with(ClassId::RANGE, vec![elem]))
            }
            Node::StrInterp { parts } => {
                self.eval_all(parts, scope)?;
                Ok(Ty::instance(ClassId::STRING))
            }
            Node::SymInterp { parts } => {
                self.eval_all(parts, scope)?;
                Ok(Ty::instance(ClassId::SYMBOL))
            }
            Node::RegexpInterp { parts } => {
                self.eval_all(parts, scope)?;
                Ok(Ty::instance(ClassId::REGEXP))
            }
            Node::BackRef => Ok(Ty::union([Ty::instance(ClassId::STRING), Ty::nil()])),

            // --- sequencing ---
            Node::Statements(stmts) => {
                let mut last = Ty::nil();
                for stmt in stmts {
                    last = self.evaluate(*stmt, scope)?;
                }
                Ok(last)
            }

            // --- reads ---
            Node::VarRead { kind, name } => Ok(self.read_var(scope, *kind, *name)),
            Node::ConstPath { parent, name } => {
                self.evaluate(*parent, scope)?;
                match self.registry.lookup(*name) {
                    Some(class) => Ok(Ty::singleton(class)),
                    None => Ok(Ty::nil()),
                }
            }

            // --- collections ---
            Node::ArrayLit { elements } => {
                let mut elems = Vec::new();
                for element in elements {
                    match element {
                        Arg::Positional(n) => elems.push(self.evaluate(*n, scope)?),
                        Arg::Splat(n) => {
                            let ty = self.evaluate(*n, scope)?;
                            let (arr, other) =
                                self.splat_parts(&ty.nonnillable(), self.names.to_a);
                            if let Some(a) = arr {
                                elems.push(a);
                            }
                            if let Some(o) = other {
                                elems.push(o);
                            }
                        }
                    }
                }
                if elems.is_empty() {
                    Ok(Ty::instance(ClassId::ARRAY))
                } else {
                    Ok(Ty::array_of(Ty::union(elems)))
                }
            }
            Node::HashLit { entries } => self.eval_hash_entries(entries, scope),

            // --- assignment ---
            Node::Assign { target, value } => {
                self.eval_target_receiver(scope, target)?;
                let ty = self.evaluate(*value, scope)?;
                if let AssignTarget::Var(kind, name) = target {
                    scope.write(*kind, *name, ty.clone());
                }
                Ok(ty)
            }
            Node::OpAssign { target, op, value } => {
                let current = self.read_assign_target(scope, target)?;
                let rhs = self.evaluate(*value, scope)?;
                let result =
                    self.simulate_call(scope, &current, *op, &[rhs], None, &BlockRef::None)?;
                if let AssignTarget::Var(kind, name) = target {
                    scope.write(*kind, *name, result.clone());
                }
                Ok(result)
            }
            Node::OrAssign { target, value } => {
                let prev = self.read_assign_target(scope, target)?;
                let value = *value;
                let rhs = self.conditional(scope, move |sim, s| sim.evaluate(value, s))?;
                let stored = prev.or(&rhs);
                if let AssignTarget::Var(kind, name) = target {
                    scope.write(*kind, *name, stored.clone());
                }
                Ok(stored)
            }
            Node::AndAssign { target, value } => {
                let _prev = self.read_assign_target(scope, target)?;
                let value = *value;
                let rhs = self.conditional(scope, move |sim, s| sim.evaluate(value, s))?;
                // the assignment only happens on a truthy previous
                // value, so the falsy forms survive
                let stored = Ty::union([rhs, Ty::nil(), Ty::instance(ClassId::FALSE)]);
                if let AssignTarget::Var(kind, name) = target {
                    scope.write(*kind, *name, stored.clone());
                }
                Ok(stored)
            }
            Node::MultiAssign { targets, value } => {
                // a plain array literal distributes element-wise; any
                // other source goes through the sized splat
                let plain: Option<Vec<NodeId>> = match self.arena.get(*value) {
                    Some(Node::ArrayLit { elements })
                        if elements.iter().all(|e| matches!(e, Arg::Positional(_))) =>
                    {
                        Some(
                            elements
                                .iter()
                                .filter_map(|e| match e {
                                    Arg::Positional(n) => Some(*n),
                                    Arg::Splat(_) => None,
                                })
                                .collect(),
                        )
                    }
                    _ => None,
                };
                let (values, result) = match plain {
                    Some(items) => {
                        let mut vs = Vec::with_capacity(items.len());
                        for item in &items {
                            vs.push(self.evaluate(*item, scope)?);
                        }
                        let whole = if vs.is_empty() {
                            Ty::instance(ClassId::ARRAY)
                        } else {
                            Ty::array_of(Ty::union(vs.clone()))
                        };
                        if self.dig.is_target(*value) {
                            return Err(Resolution {
                                ty: whole,
                                scope: scope.snapshot(),
                            });
                        }
                        (vs, whole)
                    }
                    None => {
                        let whole = self.evaluate(*value, scope)?;
                        let vs = self.sized_splat(&whole, self.names.to_ary, targets.len());
                        (vs, whole)
                    }
                };
                self.assign_mlhs(scope, targets, &values)?;
                Ok(result)
            }

            // --- operators ---
            Node::And { lhs, rhs } => {
                let left = self.evaluate(*lhs, scope)?;
                let rhs = *rhs;
                let right = self.conditional(scope, move |sim, s| sim.evaluate(rhs, s))?;
                let falsy = falsy_part(&left);
                Ok(if falsy.is_never() {
                    right
                } else {
                    right.or(&falsy)
                })
            }
            Node::Or { lhs, rhs } => {
                let left = self.evaluate(*lhs, scope)?;
                let rhs = *rhs;
                let right = self.conditional(scope, move |sim, s| sim.evaluate(rhs, s))?;
                Ok(truthy_part(&left).or(&right))
            }
            Node::Not(inner) => {
                self.evaluate(*inner, scope)?;
                Ok(Ty::boolean())
            }
            Node::Index { receiver, args } => {
                let recv = self.evaluate(*receiver, scope)?;
                let (pos, kw) = self.eval_args(scope, args, &[])?;
                self.simulate_call(scope, &recv, self.names.index, &pos, kw.as_ref(), &BlockRef::None)
            }
            Node::Call {
                receiver,
                safe,
                name,
                args,
                kwargs,
                block,
            } => self.evaluate_call(scope, *receiver, *safe, *name, args, kwargs, block.as_ref()),

            // --- control flow ---
            Node::If {
                cond,
                then_body,
                else_body,
            } => {
                self.evaluate(*cond, scope)?;
                let mut branches = scope.branches();
                branches.enter(scope);
                let then_ty = match self.eval_opt(*then_body, scope) {
                    Ok(ty) => ty,
                    Err(resolution) => return Err(resolution),
                };
                branches.exit(scope, then_ty);
                branches.enter(scope);
                let else_ty = match self.eval_opt(*else_body, scope) {
                    Ok(ty) => ty,
                    Err(resolution) => return Err(resolution),
                };
                branches.exit(scope, else_ty);
                Ok(branch_union(branches.finish(scope)))
            }
            Node::While { cond, body } => {
                scope.push_frame(FrameSpec::breakable());
                self.evaluate(*cond, scope)?;
                let body = *body;
                self.conditional(scope, move |sim, s| sim.eval_opt(body, s))?;
                let jumps = scope.pop_frame();
                Ok(match jumps.break_value {
                    Some(breaks) => breaks.or(&Ty::nil()),
                    None => Ty::nil(),
                })
            }
            Node::For {
                targets,
                iterable,
                body,
            } => {
                let enum_ty = self.evaluate(*iterable, scope)?;
                let element =
                    self.simulate_call(scope, &enum_ty, self.names.first, &[], None, &BlockRef::None)?;
                let values = self.sized_splat(&element, self.names.to_ary, targets.len());
                self.assign_mlhs(scope, targets, &values)?;
                scope.push_frame(FrameSpec::breakable());
                let body = *body;
                self.conditional(scope, move |sim, s| sim.eval_opt(body, s))?;
                let jumps = scope.pop_frame();
                Ok(match jumps.break_value {
                    Some(breaks) => breaks.or(&enum_ty),
                    None => enum_ty,
                })
            }
            Node::CaseWhen {
                subject,
                clauses,
                else_body,
            } => {
                if let Some(s) = subject {
                    self.evaluate(*s, scope)?;
                }
                let mut branches = scope.branches();
                for clause in clauses {
                    branches.enter(scope);
                    match self.eval_when_clause(clause, scope) {
                        Ok(ty) => branches.exit(scope, ty),
                        Err(resolution) => return Err(resolution),
                    }
                }
                branches.enter(scope);
                match self.eval_opt(*else_body, scope) {
                    Ok(ty) => branches.exit(scope, ty),
                    Err(resolution) => return Err(resolution),
                }
                Ok(branch_union(branches.finish(scope)))
            }
            Node::CaseIn {
                subject,
                clauses,
                else_body,
            } => self.eval_case_in(scope, *subject, clauses, *else_body),
            Node::Break(value) => {
                let ty = self.eval_opt(*value, scope)?;
                scope.terminate_with(JumpKind::Break, ty);
                Ok(Ty::nil())
            }
            Node::Next(value) => {
                let ty = self.eval_opt(*value, scope)?;
                scope.terminate_with(JumpKind::Next, ty);
                Ok(Ty::nil())
            }
            Node::Return(value) => {
                let ty = self.eval_opt(*value, scope)?;
                scope.terminate_with(JumpKind::Return, ty);
                Ok(Ty::nil())
            }
            Node::Redo | Node::Retry => {
                scope.terminate();
                Ok(Ty::nil())
            }
            Node::Begin {
                body,
                rescues,
                else_body,
                ensure_body,
            } => {
                let body_ty = if rescues.is_empty() {
                    self.eval_opt(*body, scope)?
                } else {
                    scope.push_frame(FrameSpec::rescue());
                    let ty = self.eval_opt(*body, scope)?;
                    scope.pop_frame();
                    ty
                };
                let mut parts = vec![body_ty];
                if let Some(else_body) = else_body {
                    let else_body = *else_body;
                    parts.push(self.conditional(scope, move |sim, s| sim.evaluate(else_body, s))?);
                }
                for clause in rescues {
                    parts.push(self.conditional(scope, |sim, s| sim.eval_rescue_clause(clause, s))?);
                }
                if let Some(ensure_body) = ensure_body {
                    self.evaluate(*ensure_body, scope)?;
                }
                Ok(Ty::union(parts))
            }
            Node::RescueMod { body, fallback } => {
                scope.push_frame(FrameSpec::rescue());
                let body_ty = self.evaluate(*body, scope)?;
                scope.pop_frame();
                let fallback = *fallback;
                let fallback_ty =
                    self.conditional(scope, move |sim, s| sim.evaluate(fallback, s))?;
                Ok(body_ty.or(&fallback_ty))
            }
            Node::Yield(args) => {
                let (_pos, _kw) = self.eval_args(scope, args, &[])?;
                Ok(Ty::object())
            }
            Node::SuperCall { args } => {
                let (_pos, _kw) = self.eval_args(scope, args, &[])?;
                Ok(Ty::object())
            }
            Node::ZSuper => Ok(Ty::object()),
            Node::Defined(inner) => {
                let inner = *inner;
                self.conditional(scope, move |sim, s| sim.evaluate(inner, s))?;
                Ok(Ty::union([Ty::instance(ClassId::STRING), Ty::nil()]))
            }

            // --- definitions ---
            Node::MethodDef {
                singleton,
                params,
                body,
                ..
            } => {
                if self.dig.on_path(id) {
                    let self_ty = match singleton {
                        Some(expr) => self.evaluate(*expr, scope)?,
                        None => instance_form(&scope.self_type()),
                    };
                    scope.push_frame(FrameSpec::method(self_ty));
                    self.prebind_params(scope, params);
                    self.assign_params(scope, params, Vec::new())?;
                    self.conditional(scope, |sim, s| {
                        sim.eval_param_defaults(params, s)?;
                        Ok(Ty::nil())
                    })?;
                    self.eval_opt(*body, scope)?;
                    scope.pop_frame();
                }
                Ok(Ty::instance(ClassId::SYMBOL))
            }
            Node::Lambda { params, body } => {
                if self.dig.on_path(id) {
                    scope.push_frame(FrameSpec::lambda());
                    self.prebind_params(scope, params);
                    self.assign_params(scope, params, Vec::new())?;
                    self.conditional(scope, |sim, s| {
                        sim.eval_param_defaults(params, s)?;
                        Ok(Ty::nil())
                    })?;
                    let body = *body;
                    self.conditional(scope, move |sim, s| sim.eval_opt(body, s))?;
                    scope.pop_frame();
                }
                Ok(Ty::proc_value())
            }
            Node::ClassDef {
                name,
                superclass,
                body,
            } => {
                if let Some(superclass) = superclass {
                    self.evaluate(*superclass, scope)?;
                }
                let self_ty = match self.registry.lookup(*name) {
                    Some(class) => Ty::singleton(class),
                    None => Ty::instance(ClassId::CLASS),
                };
                self.eval_definition_body(scope, id, self_ty, *body)
            }
            Node::ModuleDef { name, body } => {
                let self_ty = match self.registry.lookup(*name) {
                    Some(class) => Ty::singleton(class),
                    None => Ty::instance(ClassId::MODULE),
                };
                self.eval_definition_body(scope, id, self_ty, *body)
            }
            Node::SingletonClassDef { expr, body } => {
                let target = self.evaluate(*expr, scope)?;
                let singletons: Vec<Ty> = target
                    .shapes()
                    .iter()
                    .filter_map(Shape::instance_class)
                    .map(Ty::singleton)
                    .collect();
                let self_ty = if singletons.is_empty() {
                    Ty::instance(ClassId::CLASS)
                } else {
                    Ty::union(singletons)
                };
                self.eval_definition_body(scope, id, self_ty, *body)
            }

            Node::Unknown => {
                tracing::warn!(node = id.index(), "unknown node kind");
                Ok(Ty::nil())
            }
        }
    }

    fn eval_all(&mut self, ids: &[NodeId], scope: &mut Scope) -> EvalResult<()> {
        for id in ids {
            self.evaluate(*id, scope)?;
        }
        Ok(())
    }

    fn read_var(&self, scope: &Scope, kind: VarKind, name: Atom) -> Ty {
        if let Some(ty) = scope.read(kind, name) {
            return ty;
        }
        if kind == VarKind::Const {
            if let Some(class) = self.registry.lookup(name) {
                return Ty::singleton(class);
            }
        }
        Ty::nil()
    }

    /// Attr/index targets evaluate their receiver (and index args) for
    /// effects before the right-hand side runs.
    fn eval_target_receiver(&mut self, scope: &mut Scope, target: &AssignTarget) -> EvalResult<()> {
        match target {
            AssignTarget::Var(..) => {}
            AssignTarget::Attr { receiver, .. } => {
                self.evaluate(*receiver, scope)?;
            }
            AssignTarget::Index { receiver, args } => {
                self.evaluate(*receiver, scope)?;
                for arg in args {
                    let (Arg::Positional(n) | Arg::Splat(n)) = arg;
                    self.evaluate(*n, scope)?;
                }
            }
        }
        Ok(())
    }

    /// Current value of an assignment target, for compound assignment.
    fn read_assign_target(&mut self, scope: &mut Scope, target: &AssignTarget) -> EvalResult<Ty> {
        match target {
            AssignTarget::Var(kind, name) => Ok(self.read_var(scope, *kind, *name)),
            AssignTarget::Attr {
                receiver,
                safe,
                name,
            } => {
                let recv = self.evaluate(*receiver, scope)?;
                let recv = if *safe { recv.nonnillable() } else { recv };
                self.simulate_call(scope, &recv, *name, &[], None, &BlockRef::None)
            }
            AssignTarget::Index { receiver, args } => {
                let recv = self.evaluate(*receiver, scope)?;
                let (pos, kw) = self.eval_args(scope, args, &[])?;
                self.simulate_call(scope, &recv, self.names.index, &pos, kw.as_ref(), &BlockRef::None)
            }
        }
    }

    /// `when` tests are evaluated for effects only; the clause result
    /// is its body's.
    fn eval_when_clause(
        &mut self,
        clause: &rbz_syntax::WhenClause,
        scope: &mut Scope,
    ) -> EvalResult<Ty> {
        for test in &clause.tests {
            let (Arg::Positional(n) | Arg::Splat(n)) = test;
            self.evaluate(*n, scope)?;
        }
        self.eval_opt(clause.body, scope)
    }

    /// Pattern guards are evaluated for effects only.
    fn eval_guarded_body(
        &mut self,
        guard: Option<NodeId>,
        body: Option<NodeId>,
        scope: &mut Scope,
    ) -> EvalResult<Ty> {
        if let Some(guard) = guard {
            self.evaluate(guard, scope)?;
        }
        self.eval_opt(body, scope)
    }

    fn eval_rescue_clause(
        &mut self,
        clause: &rbz_syntax::RescueClause,
        scope: &mut Scope,
    ) -> EvalResult<Ty> {
        let mut error_tys = Vec::new();
        for class_expr in &clause.classes {
            let ty = self.evaluate(*class_expr, scope)?;
            for class in ty.singleton_classes() {
                error_tys.push(Ty::instance(class));
            }
        }
        if let Some(var) = clause.var {
            let bound = if error_tys.is_empty() {
                Ty::instance(ClassId::STANDARD_ERROR)
            } else {
                Ty::union(error_tys)
            };
            scope.write(VarKind::Local, var, bound);
        }
        self.eval_opt(clause.body, scope)
    }

    fn eval_case_in(
        &mut self,
        scope: &mut Scope,
        subject: NodeId,
        clauses: &[rbz_syntax::InClause],
        else_body: Option<NodeId>,
    ) -> EvalResult<Ty> {
        let target = self.evaluate(subject, scope)?;
        let mut branches = scope.branches();
        // a bare-name clause matches everything: it binds for real and
        // makes the clauses after it unreachable
        let mut unreachable = false;
        for clause in clauses {
            if !unreachable {
                if let Pattern::Bind(name) = &clause.pattern {
                    scope.write(VarKind::Local, *name, target.clone());
                    unreachable = true;
                    branches.enter(scope);
                    match self.eval_guarded_body(clause.guard, clause.body, scope) {
                        Ok(ty) => branches.exit(scope, ty),
                        Err(resolution) => return Err(resolution),
                    }
                    continue;
                }
            }
            branches.enter(scope);
            if unreachable {
                scope.terminate();
            }
            scope.push_frame(FrameSpec::pattern_clause());
            let ty = match self
                .match_pattern(scope, &target, &clause.pattern)
                .and_then(|()| self.eval_guarded_body(clause.guard, clause.body, scope))
            {
                Ok(ty) => ty,
                Err(resolution) => return Err(resolution),
            };
            scope.pop_frame();
            branches.exit(scope, ty);
        }
        branches.enter(scope);
        if unreachable {
            scope.terminate();
        }
        match self.eval_opt(else_body, scope) {
            Ok(ty) => branches.exit(scope, ty),
            Err(resolution) => return Err(resolution),
        }
        Ok(branch_union(branches.finish(scope)))
    }

    fn eval_definition_body(
        &mut self,
        scope: &mut Scope,
        id: NodeId,
        self_ty: Ty,
        body: Option<NodeId>,
    ) -> EvalResult<Ty> {
        if !self.dig.on_path(id) {
            return Ok(Ty::nil());
        }
        scope.push_frame(FrameSpec::definition(self_ty));
        let result = self.eval_opt(body, scope)?;
        scope.pop_frame();
        Ok(result)
    }
}

/// Union of the surviving branch results; nil when every branch
/// terminated (the value is unreachable anyway).
fn branch_union(results: Vec<Option<Ty>>) -> Ty {
    let union = Ty::union(results.into_iter().flatten());
    if union.is_never() {
        Ty::nil()
    } else {
        union
    }
}

/// The candidates of `ty` that are falsy at runtime (nil and false).
fn falsy_part(ty: &Ty) -> Ty {
    Ty::union(
        ty.shapes()
            .iter()
            .filter(|s| {
                matches!(
                    s.instance_class(),
                    Some(ClassId::NIL) | Some(ClassId::FALSE)
                )
            })
            .cloned()
            .map(Ty::from_shape),
    )
}

/// The candidates of `ty` that are truthy at runtime.
fn truthy_part(ty: &Ty) -> Ty {
    Ty::union(
        ty.shapes()
            .iter()
            .filter(|s| {
                !matches!(
                    s.instance_class(),
                    Some(ClassId::NIL) | Some(ClassId::FALSE)
                )
            })
            .cloned()
            .map(Ty::from_shape),
    )
}

/// Map class-object candidates to their instance form; `def` bodies
/// see an instance of the class being defined.
fn instance_form(ty: &Ty) -> Ty {
    Ty::union(ty.shapes().iter().map(|s| match s {
        Shape::Singleton(class) => Ty::instance(*class),
        other => Ty::from_shape(other.clone()),
    }))
}
