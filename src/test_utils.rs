use crate::subst::{AttrRef, Attribute, Constraint, Subst};
use crate::term::{Term, Var};
use std::any::Any;
use std::sync::Arc;

/// A substitution with `n` fresh variables allocated.
pub(crate) fn setup(n: usize) -> (Subst, Vec<Var>) {
    let mut subst = Subst::new();
    let vars = (0..n).map(|_| subst.fresh_var()).collect();
    (subst, vars)
}

/// Non-delegating attribute restricting a variable to a set of integers.
#[derive(Debug)]
pub(crate) struct Allowed(pub Vec<i64>);

impl Allowed {
    pub(crate) fn attr(values: &[i64]) -> AttrRef {
        Arc::new(Allowed(values.to_vec()))
    }
}

impl Attribute for Allowed {
    fn domain_name(&self) -> &'static str {
        "allowed"
    }

    fn validate(&self, _var: Var, value: &Term, subst: Subst) -> Option<Subst> {
        let n = value.as_int()?;
        self.0.contains(&n).then_some(subst)
    }

    fn constraints(&self) -> Vec<Arc<dyn Constraint>> {
        Vec::new()
    }

    fn combine(&self, _var: Var, other: &AttrRef, subst: Subst) -> Option<(Option<AttrRef>, Subst)> {
        let other = other.as_any().downcast_ref::<Allowed>()?;
        let both: Vec<i64> = self.0.iter().copied().filter(|v| other.0.contains(v)).collect();
        if both.is_empty() {
            return None;
        }
        Some((Some(Arc::new(Allowed(both))), subst))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Attribute that vanishes when two tagged variables meet.
#[derive(Debug)]
pub(crate) struct Tag;

impl Attribute for Tag {
    fn domain_name(&self) -> &'static str {
        "tag"
    }

    fn validate(&self, _var: Var, _value: &Term, subst: Subst) -> Option<Subst> {
        Some(subst)
    }

    fn constraints(&self) -> Vec<Arc<dyn Constraint>> {
        Vec::new()
    }

    fn combine(&self, _var: Var, _other: &AttrRef, subst: Subst) -> Option<(Option<AttrRef>, Subst)> {
        Some((None, subst))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Delegating attribute: the variable may only become `0`, and binds itself
/// to `Term::str("zero")` instead.
#[derive(Debug)]
pub(crate) struct Zero;

impl Attribute for Zero {
    fn domain_name(&self) -> &'static str {
        "zero"
    }

    fn delegating(&self) -> bool {
        true
    }

    fn validate(&self, var: Var, value: &Term, mut subst: Subst) -> Option<Subst> {
        if value.as_int() != Some(0) {
            return None;
        }
        subst.take_attrs(var);
        subst.bind(var, Term::str("zero"));
        Some(subst)
    }

    fn constraints(&self) -> Vec<Arc<dyn Constraint>> {
        Vec::new()
    }

    fn combine(&self, _var: Var, _other: &AttrRef, subst: Subst) -> Option<(Option<AttrRef>, Subst)> {
        Some((Some(Arc::new(Zero)), subst))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
