use crate::subst::{AttrRef, Subst};
use crate::term::{Term, Var};
use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// Unify two terms under `subst`.
///
/// Returns the extended substitution, or `None` if the terms cannot be made
/// equal. Uses an explicit worklist, so long lists do not grow the stack.
/// Attributes on the variables involved are consolidated or validated as
/// bindings are made.
pub fn unify(left: &Term, right: &Term, subst: Subst) -> Option<Subst> {
    let mut subst = subst;
    let mut worklist: SmallVec<[(Term, Term); 16]> = smallvec![(left.clone(), right.clone())];

    while let Some((a, b)) = worklist.pop() {
        let a = subst.walk(&a);
        let b = subst.walk(&b);

        if a.same(&b) {
            continue;
        }

        match (&a, &b) {
            (Term::Var(x), Term::Var(y)) => {
                subst = bind_vars(*x, *y, subst)?;
            }
            (Term::Var(x), _) => {
                subst = instantiate(*x, &b, subst)?;
            }
            (_, Term::Var(y)) => {
                subst = instantiate(*y, &a, subst)?;
            }
            (Term::Pair(p), Term::Pair(q)) => {
                worklist.push((p.tail().clone(), q.tail().clone()));
                worklist.push((p.head().clone(), q.head().clone()));
            }
            _ => {
                #[cfg(feature = "tracing")]
                trace!(left = %a, right = %b, "unify_mismatch");
                return None;
            }
        }
    }

    Some(subst)
}

/// Alias two unbound variables. The higher index is bound to the lower one,
/// and the retired variable's attributes move onto the survivor.
fn bind_vars(a: Var, b: Var, mut subst: Subst) -> Option<Subst> {
    let (keep, retire) = if a < b { (a, b) } else { (b, a) };

    let moved = subst.take_attrs(retire);
    subst.bind(retire, Term::Var(keep));
    let mut joined: SmallVec<[AttrRef; 2]> = SmallVec::new();

    for attr in moved {
        let name = attr.domain_name();
        match subst.walk(&Term::Var(keep)) {
            Term::Var(rep) => match subst.get_attr(rep, name).cloned() {
                None => {
                    if subst.has_attrs(rep) {
                        joined.push(Arc::clone(&attr));
                    }
                    subst.set_attr(rep, attr);
                }
                Some(existing) => {
                    let (merged, next) = match existing.combine(rep, &attr, subst) {
                        Some(r) => r,
                        None => {
                            #[cfg(feature = "tracing")]
                            trace!(var = %rep, domain = name, "unify_combine_failed");
                            return None;
                        }
                    };
                    subst = next;
                    // Combining may already have solved the survivor.
                    if subst.walk_var(rep) == Some(rep) {
                        match merged {
                            Some(m) => subst.set_attr(rep, m),
                            None => subst.remove_attr(rep, name),
                        }
                    }
                }
            },
            value => {
                subst = attr.validate(keep, &value, subst)?;
            }
        }
    }

    // A copied attribute now sits next to attributes it has never been
    // checked against.
    for attr in joined {
        if let Term::Var(rep) = subst.walk(&Term::Var(keep)) {
            subst = attr.settle(rep, subst)?;
        }
    }

    Some(subst)
}

/// Bind an unbound variable to a non-variable term.
fn instantiate(var: Var, value: &Term, mut subst: Subst) -> Option<Subst> {
    if subst.occurs(var, value) {
        #[cfg(feature = "tracing")]
        trace!(var = %var, "unify_occurs_check_failed");
        return None;
    }

    if let Some(delegate) = subst.attrs(var).into_iter().find(|a| a.delegating()) {
        return delegate.validate(var, value, subst);
    }

    let attrs = subst.take_attrs(var);
    subst.bind(var, value.clone());
    for attr in attrs {
        subst = attr.validate(var, value, subst)?;
    }
    Some(subst)
}
