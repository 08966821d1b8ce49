//! Structural pattern simulation for `case/in`.
//!
//! Matching never tests anything; it binds names to the types the
//! pattern would see if it matched. A decisive binding (splat, hash
//! shorthand, alternation, constant capture) records a pattern break
//! so the rest of the clause's bindings stay speculative.

use crate::dig::EvalResult;
use crate::eval::Simulator;
use crate::scope::{JumpKind, Scope};
use rbz_syntax::{Pattern, VarKind};
use rbz_types::Ty;

impl<'a> Simulator<'a> {
    pub(crate) fn match_pattern(
        &mut self,
        scope: &mut Scope,
        target: &Ty,
        pattern: &Pattern,
    ) -> EvalResult<()> {
        match pattern {
            Pattern::Bind(name) => {
                scope.write(VarKind::Local, *name, target.clone());
            }
            Pattern::Value(node) => {
                self.evaluate(*node, scope)?;
            }
            Pattern::Alt(left, right) => {
                self.match_pattern(scope, target, left)?;
                let right: &Pattern = right;
                self.conditional(scope, |sim, s| {
                    sim.match_pattern(s, target, right)?;
                    Ok(Ty::nil())
                })?;
                scope.terminate_with(JumpKind::Pattern, Ty::nil());
            }
            Pattern::Capture { pattern, name } => {
                if let Pattern::Value(node) = pattern.as_ref() {
                    // `Const => name` binds an instance of the constant
                    let value = self.evaluate(*node, scope)?;
                    let instances: Vec<Ty> =
                        value.singleton_classes().map(Ty::instance).collect();
                    let bound = if instances.is_empty() {
                        Ty::object()
                    } else {
                        Ty::union(instances)
                    };
                    scope.write(VarKind::Local, *name, bound);
                    scope.terminate_with(JumpKind::Pattern, Ty::nil());
                } else {
                    self.match_pattern(scope, target, pattern)?;
                    scope.write(VarKind::Local, *name, target.clone());
                }
            }
            Pattern::Array { pre, rest, post } => {
                let elem = target.array_element().unwrap_or_else(Ty::never);
                for sub in pre {
                    self.match_pattern(scope, &elem, sub)?;
                }
                if let Some(Some(name)) = rest {
                    scope.write(VarKind::Local, *name, Ty::array_of(elem.clone()));
                    scope.terminate_with(JumpKind::Pattern, Ty::nil());
                }
                for sub in post {
                    self.match_pattern(scope, &elem, sub)?;
                }
            }
            Pattern::Hash { pairs, rest } => {
                let (key, value) = target
                    .hash_key_value()
                    .unwrap_or_else(|| (Ty::never(), Ty::never()));
                for (label, sub) in pairs {
                    match sub {
                        // `{k:}` shorthand binds k to the value type
                        None => {
                            scope.write(VarKind::Local, *label, value.clone());
                            scope.terminate_with(JumpKind::Pattern, Ty::nil());
                        }
                        Some(sub) => self.match_pattern(scope, &value, sub)?,
                    }
                }
                if let Some(Some(name)) = rest {
                    scope.write(VarKind::Local, *name, Ty::hash_of(key.clone(), value.clone()));
                    scope.terminate_with(JumpKind::Pattern, Ty::nil());
                }
            }
            Pattern::Unknown => {
                tracing::warn!("unclassified pattern form");
            }
        }
        Ok(())
    }
}
