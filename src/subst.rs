use crate::term::{ListBuilder, Term, Var};
use im::OrdMap;
use smallvec::{smallvec, SmallVec};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Shared handle to an attribute value.
pub type AttrRef = Arc<dyn Attribute>;

/// Symbolic view of a constraint, used for introspection only.
pub trait Constraint: Send + Sync + fmt::Debug {
    /// Variables the constraint mentions.
    fn vars(&self) -> SmallVec<[Var; 4]>;

    /// Render the constraint as a term, e.g. `["+", x, y, z]`.
    fn to_term(&self) -> Term;
}

/// Per-domain metadata attached to a variable.
///
/// The unifier consults attributes whenever their variable is bound:
/// `validate` when it meets a non-variable value, `combine` when it is
/// aliased to another variable carrying an attribute of the same domain.
pub trait Attribute: Send + Sync + fmt::Debug {
    /// Key this attribute is stored under.
    fn domain_name(&self) -> &'static str;

    /// A delegating attribute takes over instantiation of its variable:
    /// the unifier calls its `validate` instead of binding the variable
    /// itself, and skips every other attribute on that variable.
    fn delegating(&self) -> bool {
        false
    }

    /// Check (and propagate) `var := value`. For a non-delegating attribute
    /// the binding is already in `subst`; a delegating one must make it.
    fn validate(&self, var: Var, value: &Term, subst: Subst) -> Option<Subst>;

    fn constraints(&self) -> Vec<Arc<dyn Constraint>>;

    /// Merge `other` (from a variable being aliased to `var`) into `self`.
    /// `Some((None, s))` drops the domain from `var` entirely.
    fn combine(&self, var: Var, other: &AttrRef, subst: Subst) -> Option<(Option<AttrRef>, Subst)>;

    /// Called once aliasing has moved this attribute onto `var`, which
    /// already carried attributes of other domains.
    fn settle(&self, _var: Var, subst: Subst) -> Option<Subst> {
        Some(subst)
    }

    fn as_any(&self) -> &dyn Any;
}

/// A persistent substitution.
///
/// Holds variable bindings, per-variable attribute maps, and the variable
/// counter. Cloning is cheap: both maps share structure between versions.
#[derive(Clone, Default)]
pub struct Subst {
    bindings: OrdMap<Var, Term>,
    attrs: OrdMap<Var, OrdMap<&'static str, AttrRef>>,
    next_var: u32,
}

impl Subst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a variable unique within this substitution's lineage.
    pub fn fresh_var(&mut self) -> Var {
        let v = Var::new(self.next_var);
        self.next_var += 1;
        v
    }

    /// Number of variables allocated so far.
    pub fn var_count(&self) -> u32 {
        self.next_var
    }

    pub fn get(&self, var: Var) -> Option<&Term> {
        self.bindings.get(&var)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.bindings.contains_key(&var)
    }

    /// Bind a variable without any checks. Callers go through `unify`.
    pub(crate) fn bind(&mut self, var: Var, term: Term) {
        self.bindings.insert(var, term);
    }

    /// Number of bound variables.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Follow variable bindings until a non-variable or an unbound variable.
    pub fn walk(&self, term: &Term) -> Term {
        let mut current = term.clone();
        while let Term::Var(v) = current {
            match self.bindings.get(&v) {
                Some(bound) => current = bound.clone(),
                None => break,
            }
        }
        current
    }

    /// Representative variable of `var`, or `None` if it is bound to a value.
    pub fn walk_var(&self, var: Var) -> Option<Var> {
        self.walk(&Term::Var(var)).as_var()
    }

    /// Replace every variable in `term` by its current value.
    ///
    /// The list spine is handled iteratively; only nested heads recurse.
    pub fn walk_deep(&self, term: &Term) -> Term {
        let mut builder = ListBuilder::new();
        let mut current = self.walk(term);
        loop {
            match current {
                Term::Pair(p) => {
                    builder.push(self.walk_deep(p.head()));
                    current = self.walk(p.tail());
                }
                other => {
                    if builder.is_empty() {
                        return other;
                    }
                    return builder.build_with_tail(other);
                }
            }
        }
    }

    /// Does `var` occur in `term` under this substitution?
    pub fn occurs(&self, var: Var, term: &Term) -> bool {
        let mut stack: SmallVec<[Term; 16]> = smallvec![term.clone()];
        while let Some(t) = stack.pop() {
            match self.walk(&t) {
                Term::Var(v) if v == var => return true,
                Term::Pair(p) => {
                    stack.push(p.tail().clone());
                    stack.push(p.head().clone());
                }
                _ => {}
            }
        }
        false
    }

    pub fn get_attr(&self, var: Var, domain: &str) -> Option<&AttrRef> {
        self.attrs.get(&var).and_then(|m| m.get(domain))
    }

    /// Attach `attr` to `var` under its own domain name.
    pub fn set_attr(&mut self, var: Var, attr: AttrRef) {
        let name = attr.domain_name();
        let mut map = self.attrs.get(&var).cloned().unwrap_or_default();
        map.insert(name, attr);
        self.attrs.insert(var, map);
    }

    pub fn remove_attr(&mut self, var: Var, domain: &str) {
        if let Some(map) = self.attrs.get(&var) {
            let mut map = map.clone();
            map.remove(domain);
            if map.is_empty() {
                self.attrs.remove(&var);
            } else {
                self.attrs.insert(var, map);
            }
        }
    }

    /// Detach and return every attribute of `var`, in domain-name order.
    pub fn take_attrs(&mut self, var: Var) -> Vec<AttrRef> {
        match self.attrs.remove(&var) {
            Some(map) => map.values().cloned().collect(),
            None => Vec::new(),
        }
    }

    /// Attributes of `var`, in domain-name order.
    pub fn attrs(&self, var: Var) -> Vec<AttrRef> {
        self.attrs
            .get(&var)
            .map(|m| m.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_attrs(&self, var: Var) -> bool {
        self.attrs.contains_key(&var)
    }

    /// Variables carrying at least one attribute, in index order.
    pub fn attributed_vars(&self) -> Vec<Var> {
        self.attrs.keys().copied().collect()
    }
}

impl PartialEq for Subst {
    fn eq(&self, other: &Self) -> bool {
        if self.next_var != other.next_var || self.bindings != other.bindings {
            return false;
        }
        if self.attrs.len() != other.attrs.len() {
            return false;
        }
        self.attrs.iter().zip(other.attrs.iter()).all(|((va, ma), (vb, mb))| {
            va == vb
                && ma.len() == mb.len()
                && ma
                    .iter()
                    .zip(mb.iter())
                    .all(|((ka, a), (kb, b))| ka == kb && Arc::ptr_eq(a, b))
        })
    }
}

impl fmt::Debug for Subst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (v, t) in self.bindings.iter() {
            map.entry(v, t);
        }
        for (v, attrs) in self.attrs.iter() {
            for attr in attrs.values() {
                map.entry(&format_args!("{}:{}", v, attr.domain_name()), attr);
            }
        }
        map.finish()
    }
}

#[cfg(test)]
#[path = "tests/subst.rs"]
mod tests;
