//! Call evaluation: receiver shapes, signature unification, block
//! callbacks, splat normalization, and parameter binding.

use crate::dig::EvalResult;
use crate::eval::Simulator;
use crate::scope::{FrameSpec, JumpKind, Scope};
use rbz_common::limits::MAX_MASSIGN_TARGETS;
use rbz_common::Atom;
use rbz_syntax::{Arg, BlockArg, KwArg, KwKey, MlhsItem, NodeId, ParamDecl, Params, VarKind};
use rbz_types::{match_free_vars, receiver_bindings, resolve_ty_expr, ClassId, Shape, Ty};
use rustc_hash::FxHashSet;

/// The block at a call site, reduced to what the evaluator needs.
pub(crate) enum BlockRef<'n> {
    None,
    Literal {
        params: &'n Params,
        body: Option<NodeId>,
    },
    /// `&:sym` shorthand: calls `sym` on the first yielded value.
    SymbolProc(Atom),
    /// `&expr`: a proc we cannot see inside.
    Opaque,
}

impl<'a> Simulator<'a> {
    /// Evaluate a call node: receiver, arguments, block wiring, safe
    /// navigation.
    pub(crate) fn evaluate_call(
        &mut self,
        scope: &mut Scope,
        receiver: Option<NodeId>,
        safe: bool,
        name: Atom,
        args: &'a [Arg],
        kwargs: &'a [KwArg],
        block: Option<&'a BlockArg>,
    ) -> EvalResult<Ty> {
        // a receiverless `raise` aborts the surrounding region
        if receiver.is_none() && name == self.names.raise {
            self.eval_args(scope, args, kwargs)?;
            scope.terminate_with(JumpKind::Raise, Ty::nil());
            return Ok(Ty::nil());
        }
        let receiver_ty = match receiver {
            Some(r) => self.evaluate(r, scope)?,
            None => scope.self_type(),
        };
        let (pos, kw) = self.eval_args(scope, args, kwargs)?;
        let block_ref = match block {
            Some(BlockArg::Literal { params, body }) => BlockRef::Literal {
                params,
                body: *body,
            },
            Some(BlockArg::Pass(expr)) => {
                self.evaluate(*expr, scope)?;
                BlockRef::Opaque
            }
            Some(BlockArg::SymbolPass(sym)) => BlockRef::SymbolProc(*sym),
            None => BlockRef::None,
        };

        if !safe {
            return self.simulate_call(scope, &receiver_ty, name, &pos, kw.as_ref(), &block_ref);
        }
        // safe navigation: an exactly-nil receiver skips the call; a
        // possibly-nil receiver makes the call conditional and unions
        // nil back in
        if receiver_ty.is_nil() {
            return Ok(Ty::nil());
        }
        let stripped = receiver_ty.nonnillable();
        let result = self.conditional(scope, |sim, s| {
            sim.simulate_call(s, &stripped, name, &pos, kw.as_ref(), &block_ref)
        })?;
        Ok(if receiver_ty.nillable() {
            result.or(&Ty::nil())
        } else {
            result
        })
    }

    /// Evaluate positional arguments (splats become splat-marked types)
    /// and fold keyword arguments into one hash type.
    pub(crate) fn eval_args(
        &mut self,
        scope: &mut Scope,
        args: &[Arg],
        kwargs: &[KwArg],
    ) -> EvalResult<(Vec<Ty>, Option<Ty>)> {
        let mut pos = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Arg::Positional(n) => pos.push(self.evaluate(*n, scope)?),
                Arg::Splat(n) => {
                    let ty = self.evaluate(*n, scope)?;
                    pos.push(Ty::splat(ty));
                }
            }
        }
        let kw = if kwargs.is_empty() {
            None
        } else {
            Some(self.eval_hash_entries(kwargs, scope)?)
        };
        Ok((pos, kw))
    }

    /// Hash-literal / keyword-argument entries folded into one
    /// `Hash[K, V]`.
    pub(crate) fn eval_hash_entries(
        &mut self,
        entries: &[KwArg],
        scope: &mut Scope,
    ) -> EvalResult<Ty> {
        let mut keys = Vec::new();
        let mut values = Vec::new();
        for entry in entries {
            match entry {
                KwArg::Pair { key, value } => {
                    match key {
                        KwKey::Label(_) => keys.push(Ty::instance(ClassId::SYMBOL)),
                        KwKey::Expr(n) => keys.push(self.evaluate(*n, scope)?),
                    }
                    values.push(self.evaluate(*value, scope)?);
                }
                KwArg::DoubleSplat(n) => {
                    let ty = self.evaluate(*n, scope)?;
                    let hashish = if ty.has_hash_shape() {
                        ty
                    } else {
                        self.coerce_union(&ty.nonnillable(), self.names.to_hash)
                    };
                    if let Some((k, v)) = hashish.hash_key_value() {
                        keys.push(k);
                        values.push(v);
                    }
                }
            }
        }
        if keys.is_empty() && values.is_empty() {
            Ok(Ty::instance(ClassId::HASH))
        } else {
            Ok(Ty::hash_of(Ty::union(keys), Ty::union(values)))
        }
    }

    /// The call protocol over an already-evaluated receiver.
    ///
    /// Per receiver shape: query signatures, seed unification from the
    /// receiver's generic bindings, match free variables structurally
    /// against the arguments, run the block callback, resolve the
    /// declared return. Break values escaping the block union into the
    /// call result. The duck conversion protocol and `new`
    /// instantiation always contribute additional candidates on top of
    /// whatever the signatures declared; a call with no candidates at
    /// all degrades to nil.
    pub(crate) fn simulate_call(
        &mut self,
        scope: &mut Scope,
        receiver: &Ty,
        name: Atom,
        pos_args: &[Ty],
        kw_args: Option<&Ty>,
        block: &BlockRef<'a>,
    ) -> EvalResult<Ty> {
        let mut candidates: Vec<Ty> = Vec::new();
        let mut breaks: Vec<Ty> = Vec::new();
        let mut block_called = false;
        let has_block = !matches!(block, BlockRef::None);

        let shapes: Vec<Shape> = receiver.shapes().to_vec();
        for shape in &shapes {
            let sigs: Vec<&rbz_types::MethodSig> =
                self.table
                    .query(self.registry, shape, name, pos_args, kw_args, has_block);
            for sig in sigs {
                let mut vars = receiver_bindings(self.registry, shape);
                let free: FxHashSet<Atom> = sig
                    .type_params
                    .iter()
                    .copied()
                    .filter(|p| !vars.contains_key(p))
                    .collect();
                let aligned = sig.aligned_params(pos_args);
                match_free_vars(&free, &aligned, pos_args, &mut vars);
                if let Some(spec) = &sig.block {
                    if has_block {
                        let block_params: Vec<Ty> = spec
                            .params
                            .iter()
                            .map(|p| resolve_ty_expr(p, shape, &vars))
                            .collect();
                        let block_self = spec
                            .self_type
                            .as_ref()
                            .map(|s| resolve_ty_expr(s, shape, &vars));
                        let (block_ret, brk) =
                            self.call_block(scope, block, &block_params, block_self)?;
                        block_called = true;
                        if let Some(b) = brk {
                            breaks.push(b);
                        }
                        // free variables in return position resolve
                        // from the block body's actual result
                        let ret_free: FxHashSet<Atom> = free
                            .iter()
                            .copied()
                            .filter(|v| !vars.contains_key(v))
                            .collect();
                        match_free_vars(
                            &ret_free,
                            std::slice::from_ref(&spec.ret),
                            std::slice::from_ref(&block_ret),
                            &mut vars,
                        );
                    }
                }
                candidates.push(resolve_ty_expr(&sig.ret, shape, &vars));
            }
        }

        // a literal block is still explored once even when no matched
        // signature consumed it, so targets inside it resolve
        if has_block && !block_called {
            let (_ret, brk) = self.call_block(scope, block, &[], None)?;
            if let Some(b) = brk {
                breaks.push(b);
            }
        }

        // conversion names and `new` contribute alongside any declared
        // signatures, not only when resolution came up empty
        if let Some(duck) = self.duck_response(name) {
            candidates.push(duck);
        }
        if name == self.names.new {
            for class in receiver.singleton_classes() {
                if self.registry.is_class(class) {
                    candidates.push(Ty::instance(class));
                }
            }
        }

        candidates.extend(breaks);
        let result = Ty::union(candidates);
        if result.is_never() {
            tracing::debug!(method = self.interner.resolve(name), "no call candidates");
            return Ok(Ty::nil());
        }
        Ok(result)
    }

    /// Run the call-site block with the given argument types. Returns
    /// the block's result type and any break value that escaped it.
    fn call_block(
        &mut self,
        scope: &mut Scope,
        block: &BlockRef<'a>,
        arg_tys: &[Ty],
        block_self: Option<Ty>,
    ) -> EvalResult<(Ty, Option<Ty>)> {
        match block {
            BlockRef::None | BlockRef::Opaque => Ok((Ty::object(), None)),
            BlockRef::SymbolProc(sym) => match arg_tys.first() {
                Some(recv) => {
                    let recv = recv.clone();
                    let ret = self.simulate_call(scope, &recv, *sym, &[], None, &BlockRef::None)?;
                    Ok((ret, None))
                }
                None => Ok((Ty::object(), None)),
            },
            BlockRef::Literal { params, body } => {
                let params: &'a Params = *params;
                let body = *body;
                let args = arg_tys.to_vec();
                let mut break_value: Option<Ty> = None;
                // the block may never run, so its effects are one
                // branch of a conditional
                let result = self.conditional(scope, |sim, s| {
                    s.push_frame(FrameSpec::block(block_self));
                    sim.prebind_params(s, params);
                    sim.assign_params(s, params, args)?;
                    sim.conditional(s, |sim, s| {
                        sim.eval_param_defaults(params, s)?;
                        Ok(Ty::nil())
                    })?;
                    let body_ty = match body {
                        Some(b) => sim.evaluate(b, s)?,
                        None => Ty::nil(),
                    };
                    let jumps = s.pop_frame();
                    break_value = jumps.break_value;
                    let mut parts = Vec::new();
                    if !jumps.terminated {
                        parts.push(body_ty);
                    }
                    if let Some(next) = jumps.next_value {
                        parts.push(next);
                    }
                    Ok(if parts.is_empty() {
                        Ty::nil()
                    } else {
                        Ty::union(parts)
                    })
                })?;
                Ok((result, break_value))
            }
        }
    }

    /// Duck-typed conversion protocol: the conversion name itself pins
    /// a fixed result class, contributed on every call to that name.
    fn duck_response(&self, name: Atom) -> Option<Ty> {
        let n = &self.names;
        let class = if name == n.to_s || name == n.to_str {
            ClassId::STRING
        } else if name == n.to_a || name == n.to_ary {
            ClassId::ARRAY
        } else if name == n.to_h || name == n.to_hash {
            ClassId::HASH
        } else if name == n.to_i || name == n.to_int {
            ClassId::INTEGER
        } else if name == n.to_f {
            ClassId::FLOAT
        } else {
            return None;
        };
        Some(Ty::instance(class))
    }

    /// Declared response of `method` on each shape, without duck
    /// fallbacks or blocks. Used for coercions the engine performs
    /// itself.
    fn coerce_response(&self, shape: &Shape, method: Atom) -> Option<Ty> {
        let sigs = self.table.query(self.registry, shape, method, &[], None, false);
        if sigs.is_empty() {
            return None;
        }
        let vars = receiver_bindings(self.registry, shape);
        Some(Ty::union(
            sigs.iter()
                .map(|sig| resolve_ty_expr(&sig.ret, shape, &vars))
                .collect::<Vec<_>>(),
        ))
    }

    fn coerce_union(&self, value: &Ty, method: Atom) -> Ty {
        Ty::union(
            value
                .shapes()
                .iter()
                .filter_map(|s| self.coerce_response(s, method))
                .collect::<Vec<_>>(),
        )
    }

    /// Split a splatted value into (array element union, non-array
    /// remainder). Non-array shapes first try the coercion `method`;
    /// shapes with no declared array form contribute themselves.
    pub(crate) fn splat_parts(&self, value: &Ty, method: Atom) -> (Option<Ty>, Option<Ty>) {
        let mut elems = Vec::new();
        let mut others = Vec::new();
        for shape in value.shapes() {
            if let Shape::Instance {
                class: ClassId::ARRAY,
                args,
            } = shape
            {
                elems.push(args.first().cloned().unwrap_or_else(Ty::object));
                continue;
            }
            match self.coerce_response(shape, method) {
                Some(coerced) if coerced.has_array_shape() => {
                    elems.push(coerced.array_element().unwrap_or_else(Ty::object));
                }
                _ => others.push(Ty::from_shape(shape.clone())),
            }
        }
        let elems = if elems.is_empty() {
            None
        } else {
            Some(Ty::union(elems))
        };
        let others = if others.is_empty() {
            None
        } else {
            Some(Ty::union(others))
        };
        (elems, others)
    }

    /// Distribute one value over `size` destructuring slots: slot 0 is
    /// the union of everything the value could yield, the remaining
    /// slots repeat the array element.
    pub(crate) fn sized_splat(&self, value: &Ty, method: Atom, size: usize) -> Vec<Ty> {
        let size = size.min(MAX_MASSIGN_TARGETS);
        let (arr, other) = self.splat_parts(value, method);
        let first = match (&arr, &other) {
            (Some(a), Some(o)) => a.or(o),
            (Some(a), None) => a.clone(),
            (None, Some(o)) => o.clone(),
            (None, None) => Ty::nil(),
        };
        let mut out = vec![first];
        if let Some(elem) = arr {
            for _ in 1..size {
                out.push(elem.clone());
            }
        }
        out
    }

    /// Distribute `values` over multi-assignment targets, honoring one
    /// rest slot. Missing values bind nil.
    pub(crate) fn assign_mlhs(
        &mut self,
        scope: &mut Scope,
        targets: &[MlhsItem],
        values: &[Ty],
    ) -> EvalResult<()> {
        let rest_pos = targets
            .iter()
            .position(|t| matches!(t, MlhsItem::Rest(_)));
        match rest_pos {
            Some(pos) => {
                let post_count = targets.len() - pos - 1;
                for (i, target) in targets[..pos].iter().enumerate() {
                    let value = values.get(i).cloned().unwrap_or_else(Ty::nil);
                    self.assign_mlhs_item(scope, target, value)?;
                }
                if let MlhsItem::Rest(Some((kind, name))) = &targets[pos] {
                    let hi = values.len().saturating_sub(post_count).max(pos);
                    let middle = &values[pos.min(values.len())..hi.min(values.len())];
                    let rest_ty = if middle.is_empty() {
                        Ty::instance(ClassId::ARRAY)
                    } else {
                        Ty::array_of(Ty::union(middle.to_vec()))
                    };
                    scope.write(*kind, *name, rest_ty);
                }
                for (j, target) in targets[pos + 1..].iter().enumerate() {
                    let idx = values.len().saturating_sub(post_count) + j;
                    let value = values.get(idx).cloned().unwrap_or_else(Ty::nil);
                    self.assign_mlhs_item(scope, target, value)?;
                }
            }
            None => {
                for (i, target) in targets.iter().enumerate() {
                    let value = values.get(i).cloned().unwrap_or_else(Ty::nil);
                    self.assign_mlhs_item(scope, target, value)?;
                }
            }
        }
        Ok(())
    }

    fn assign_mlhs_item(
        &mut self,
        scope: &mut Scope,
        target: &MlhsItem,
        value: Ty,
    ) -> EvalResult<()> {
        match target {
            MlhsItem::Target(kind, name) => scope.write(*kind, *name, value),
            MlhsItem::Rest(_) => {} // handled positionally by assign_mlhs
            MlhsItem::Nested(items) => {
                let values = self.sized_splat(&value, self.names.to_ary, items.len());
                self.assign_mlhs(scope, items, &values)?;
            }
            MlhsItem::AttrField { receiver, .. } => {
                self.evaluate(*receiver, scope)?;
            }
            MlhsItem::IndexField { receiver, args } => {
                self.evaluate(*receiver, scope)?;
                for arg in args {
                    let (Arg::Positional(n) | Arg::Splat(n)) = arg;
                    self.evaluate(*n, scope)?;
                }
            }
        }
        Ok(())
    }

    // --- parameter binding ---

    /// Every declared parameter name exists from the first statement
    /// on, as nil until bound.
    pub(crate) fn prebind_params(&self, scope: &mut Scope, params: &Params) {
        let mut names = Vec::new();
        collect_param_names(params, &mut names);
        for name in names {
            scope.write(VarKind::Local, name, Ty::nil());
        }
    }

    /// Bind call values to declared parameters. A single value feeding
    /// a multi-parameter list auto-splats through `to_ary` first.
    pub(crate) fn assign_params(
        &mut self,
        scope: &mut Scope,
        params: &Params,
        mut values: Vec<Ty>,
    ) -> EvalResult<()> {
        let positional = params.required.len()
            + params.optional.len()
            + params.post.len()
            + usize::from(params.rest.is_some());
        if values.len() == 1 && positional >= 2 {
            values = self.sized_splat(&values[0], self.names.to_ary, positional);
        }
        let mut front = 0usize;
        let mut back = values.len();
        for decl in &params.required {
            let value = if front < back {
                front += 1;
                values[front - 1].clone()
            } else {
                Ty::object()
            };
            self.assign_param_decl(scope, decl, value)?;
        }
        for decl in params.post.iter().rev() {
            let value = if back > front {
                back -= 1;
                values[back].clone()
            } else {
                Ty::object()
            };
            self.assign_param_decl(scope, decl, value)?;
        }
        for (name, _default) in &params.optional {
            if front < back {
                front += 1;
                scope.write(VarKind::Local, *name, values[front - 1].clone());
            }
        }
        if let Some(Some(rest)) = params.rest {
            let middle = &values[front.min(back)..back];
            let rest_ty = if middle.is_empty() {
                Ty::instance(ClassId::ARRAY)
            } else {
                Ty::array_of(Ty::union(middle.to_vec()))
            };
            scope.write(VarKind::Local, rest, rest_ty);
        }
        // keyword values are not inferred from call sites; defaults
        // cover them
        if let Some(Some(kwrest)) = params.kwrest {
            scope.write(
                VarKind::Local,
                kwrest,
                Ty::hash_of(Ty::instance(ClassId::SYMBOL), Ty::object()),
            );
        }
        if let Some(block) = params.block {
            scope.write(VarKind::Local, block, Ty::proc_value());
        }
        Ok(())
    }

    fn assign_param_decl(
        &mut self,
        scope: &mut Scope,
        decl: &ParamDecl,
        value: Ty,
    ) -> EvalResult<()> {
        match decl {
            ParamDecl::Name(name) => scope.write(VarKind::Local, *name, value),
            ParamDecl::Destructure(items) => {
                let values = self.sized_splat(&value, self.names.to_ary, items.len());
                self.assign_mlhs(scope, items, &values)?;
            }
        }
        Ok(())
    }

    /// Default expressions, evaluated speculatively by the caller:
    /// optional parameters union their default with whatever was bound,
    /// keywords take their default or the unconstrained type.
    pub(crate) fn eval_param_defaults(
        &mut self,
        params: &Params,
        scope: &mut Scope,
    ) -> EvalResult<()> {
        for (name, default) in &params.optional {
            let ty = self.evaluate(*default, scope)?;
            scope.write(VarKind::Local, *name, ty);
        }
        for (name, default) in &params.keywords {
            let ty = match default {
                Some(d) => self.evaluate(*d, scope)?,
                None => Ty::object(),
            };
            scope.write(VarKind::Local, *name, ty);
        }
        Ok(())
    }
}

fn collect_param_names(params: &Params, out: &mut Vec<Atom>) {
    for decl in &params.required {
        collect_decl_names(decl, out);
    }
    for (name, _) in &params.optional {
        out.push(*name);
    }
    if let Some(Some(name)) = params.rest {
        out.push(name);
    }
    for decl in &params.post {
        collect_decl_names(decl, out);
    }
    for (name, _) in &params.keywords {
        out.push(*name);
    }
    if let Some(Some(name)) = params.kwrest {
        out.push(name);
    }
    if let Some(name) = params.block {
        out.push(name);
    }
}

fn collect_decl_names(decl: &ParamDecl, out: &mut Vec<Atom>) {
    match decl {
        ParamDecl::Name(name) => out.push(*name),
        ParamDecl::Destructure(items) => collect_mlhs_names(items, out),
    }
}

fn collect_mlhs_names(items: &[MlhsItem], out: &mut Vec<Atom>) {
    for item in items {
        match item {
            MlhsItem::Target(VarKind::Local, name) => out.push(*name),
            MlhsItem::Rest(Some((VarKind::Local, name))) => out.push(*name),
            MlhsItem::Nested(nested) => collect_mlhs_names(nested, out),
            _ => {}
        }
    }
}
