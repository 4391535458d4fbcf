use super::domain::Domain;
use super::propagators::Propagator;
use super::solver::Solver;
use super::{FD_CONSTRAINTS, FD_DOMAIN};
use crate::subst::{AttrRef, Attribute, Constraint, Subst};
use crate::term::{Term, Var};
use smallvec::{smallvec, SmallVec};
use std::any::Any;
use std::sync::Arc;

/// The finite domain of one variable.
///
/// Delegating: binding the variable runs propagation, so its watchers see
/// the new value before anything else does.
#[derive(Debug, Clone)]
pub struct DomainAttr {
    var: Var,
    domain: Domain,
}

impl DomainAttr {
    pub fn new(var: Var, domain: Domain) -> Self {
        Self { var, domain }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }
}

impl Attribute for DomainAttr {
    fn domain_name(&self) -> &'static str {
        FD_DOMAIN
    }

    fn delegating(&self) -> bool {
        true
    }

    fn validate(&self, var: Var, value: &Term, subst: Subst) -> Option<Subst> {
        let n = value.as_int()?;
        if !self.domain.contains(n) {
            return None;
        }
        let mut solver = Solver::new(subst);
        if !solver.reduce_domain(var, &Domain::singleton(n)) {
            return None;
        }
        solver.solve()
    }

    fn constraints(&self) -> Vec<Arc<dyn Constraint>> {
        vec![Arc::new(DomainConstraint(self.clone()))]
    }

    fn combine(&self, var: Var, other: &AttrRef, subst: Subst) -> Option<(Option<AttrRef>, Subst)> {
        let other = other.as_any().downcast_ref::<DomainAttr>()?;
        let mut solver = Solver::new(subst);
        if !solver.reduce_domain(var, &other.domain) {
            return None;
        }
        let subst = solver.solve()?;
        let merged = subst.get_attr(var, FD_DOMAIN).cloned();
        Some((merged, subst))
    }

    fn settle(&self, var: Var, subst: Subst) -> Option<Subst> {
        recheck(var, subst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// `["in", x, lb, ub]` for an interval, `["in", x, [v...]]` otherwise.
#[derive(Debug)]
struct DomainConstraint(DomainAttr);

impl Constraint for DomainConstraint {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        smallvec![self.0.var]
    }

    fn to_term(&self) -> Term {
        let DomainAttr { var, domain } = &self.0;
        match domain {
            Domain::Bounded { lb, ub } => {
                Term::list([Term::str("in"), Term::from(*var), Term::int(*lb), Term::int(*ub)])
            }
            Domain::Enumerated(vals) => Term::list([
                Term::str("in"),
                Term::from(*var),
                Term::list(vals.iter().copied()),
            ]),
            Domain::Unbounded => Term::list([Term::str("in"), Term::from(*var), Term::str("unbounded")]),
        }
    }
}

/// Propagators that watch a variable.
#[derive(Debug, Clone)]
pub struct ConstraintsAttr {
    props: Vec<Arc<dyn Propagator>>,
}

impl ConstraintsAttr {
    pub fn new(props: Vec<Arc<dyn Propagator>>) -> Self {
        Self { props }
    }

    pub fn propagators(&self) -> &[Arc<dyn Propagator>] {
        &self.props
    }

    fn solve_with(props: &[Arc<dyn Propagator>], subst: Subst) -> Option<Subst> {
        let mut solver = Solver::new(subst);
        for p in props {
            solver.post(Arc::clone(p));
        }
        solver.solve()
    }
}

impl Attribute for ConstraintsAttr {
    fn domain_name(&self) -> &'static str {
        FD_CONSTRAINTS
    }

    fn validate(&self, _var: Var, value: &Term, subst: Subst) -> Option<Subst> {
        value.as_int()?;
        Self::solve_with(&self.props, subst)
    }

    fn constraints(&self) -> Vec<Arc<dyn Constraint>> {
        self.props
            .iter()
            .map(|p| Arc::new(PropagatorConstraint(Arc::clone(p))) as Arc<dyn Constraint>)
            .collect()
    }

    fn combine(&self, var: Var, other: &AttrRef, mut subst: Subst) -> Option<(Option<AttrRef>, Subst)> {
        let other = other.as_any().downcast_ref::<ConstraintsAttr>()?;
        let mut union = self.props.clone();
        for p in &other.props {
            if !union.iter().any(|q| Arc::ptr_eq(p, q)) {
                union.push(Arc::clone(p));
            }
        }
        subst.set_attr(var, Arc::new(ConstraintsAttr::new(union.clone())));
        let subst = Self::solve_with(&union, subst)?;
        let merged = subst.get_attr(var, FD_CONSTRAINTS).cloned();
        Some((merged, subst))
    }

    fn settle(&self, var: Var, subst: Subst) -> Option<Subst> {
        recheck(var, subst)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Run the watchers of `var` against its domain, once both are present.
fn recheck(var: Var, subst: Subst) -> Option<Subst> {
    if subst.get_attr(var, FD_DOMAIN).is_none() {
        return Some(subst);
    }
    let props = match subst
        .get_attr(var, FD_CONSTRAINTS)
        .and_then(|a| a.as_any().downcast_ref::<ConstraintsAttr>())
    {
        Some(attr) => attr.props.clone(),
        None => return Some(subst),
    };
    ConstraintsAttr::solve_with(&props, subst)
}

#[derive(Debug)]
struct PropagatorConstraint(Arc<dyn Propagator>);

impl Constraint for PropagatorConstraint {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        self.0.vars()
    }

    fn to_term(&self) -> Term {
        self.0.to_term()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fd::propagators::{AllDifferent, PlusConst};
    use crate::test_utils::setup;
    use crate::unify::unify;

    fn with_domain(mut subst: Subst, v: Var, d: Domain) -> Subst {
        subst.set_attr(v, Arc::new(DomainAttr::new(v, d)));
        subst
    }

    fn domain_of(subst: &Subst, v: Var) -> Option<Domain> {
        subst
            .get_attr(v, FD_DOMAIN)
            .and_then(|a| a.as_any().downcast_ref::<DomainAttr>())
            .map(|a| a.domain().clone())
    }

    #[test]
    fn binding_checks_domain() {
        let (s, v) = setup(1);
        let s = with_domain(s, v[0], Domain::range(1, 3));
        assert!(unify(&Term::from(v[0]), &Term::int(2), s.clone()).is_some());
        assert!(unify(&Term::from(v[0]), &Term::int(7), s.clone()).is_none());
        assert!(unify(&Term::from(v[0]), &Term::str("x"), s).is_none());
    }

    #[test]
    fn binding_strips_fd_attrs() {
        let (s, v) = setup(1);
        let s = with_domain(s, v[0], Domain::range(1, 3));
        let s = unify(&Term::from(v[0]), &Term::int(2), s).unwrap();
        assert_eq!(s.walk(&Term::from(v[0])), Term::int(2));
        assert!(!s.has_attrs(v[0]));
    }

    #[test]
    fn aliasing_intersects_domains() {
        let (s, v) = setup(2);
        let s = with_domain(s, v[0], Domain::values([1, 2, 3]));
        let s = with_domain(s, v[1], Domain::values([2, 3, 4]));
        let s = unify(&Term::from(v[0]), &Term::from(v[1]), s).unwrap();
        assert_eq!(domain_of(&s, v[0]), Some(Domain::range(2, 3)));
    }

    #[test]
    fn aliasing_to_one_value_binds() {
        let (s, v) = setup(2);
        let s = with_domain(s, v[0], Domain::values([1, 2]));
        let s = with_domain(s, v[1], Domain::values([2, 5]));
        let s = unify(&Term::from(v[0]), &Term::from(v[1]), s).unwrap();
        assert_eq!(s.walk(&Term::from(v[1])), Term::int(2));
    }

    #[test]
    fn aliasing_disjoint_domains_fails() {
        let (s, v) = setup(2);
        let s = with_domain(s, v[0], Domain::range(0, 1));
        let s = with_domain(s, v[1], Domain::range(5, 6));
        assert!(unify(&Term::from(v[0]), &Term::from(v[1]), s).is_none());
    }

    #[test]
    fn binding_wakes_watchers() {
        let (s, v) = setup(2);
        let p: Arc<dyn Propagator> = Arc::new(PlusConst { x: v[0], c: 10, z: v[1] });
        let mut solver = Solver::new(s);
        solver.post(p);
        assert!(solver.reduce_domain(v[0], &Domain::range(0, 5)));
        let s = solver.solve().unwrap();
        assert_eq!(domain_of(&s, v[1]), Some(Domain::range(10, 15)));

        let s = unify(&Term::from(v[0]), &Term::int(3), s).unwrap();
        assert_eq!(s.walk(&Term::from(v[1])), Term::int(13));
    }

    fn excluding(v: Var, values: &[i64]) -> AttrRef {
        let props: Vec<Arc<dyn Propagator>> = values
            .iter()
            .map(|&n| Arc::new(AllDifferent { vars: smallvec![v], consts: smallvec![n] }) as Arc<dyn Propagator>)
            .collect();
        Arc::new(ConstraintsAttr::new(props))
    }

    #[test]
    fn aliasing_runs_copied_watchers() {
        let (s, v) = setup(2);
        let s = with_domain(s, v[0], Domain::values([1, 2]));
        let mut s2 = s.clone();
        s2.set_attr(v[1], excluding(v[1], &[1, 2]));
        assert!(unify(&Term::from(v[0]), &Term::from(v[1]), s2).is_none());

        let mut s3 = s;
        s3.set_attr(v[1], excluding(v[1], &[1]));
        let s3 = unify(&Term::from(v[1]), &Term::from(v[0]), s3).unwrap();
        assert_eq!(s3.walk(&Term::from(v[0])), Term::int(2));
    }

    #[test]
    fn aliasing_runs_watchers_against_copied_domain() {
        let (mut s, v) = setup(2);
        s.set_attr(v[0], excluding(v[0], &[1, 2]));
        let s = with_domain(s, v[1], Domain::values([1, 2]));
        assert!(unify(&Term::from(v[0]), &Term::from(v[1]), s).is_none());
    }

    #[test]
    fn combine_unions_constraint_lists() {
        let (s, v) = setup(3);
        let p: Arc<dyn Propagator> = Arc::new(PlusConst { x: v[0], c: 1, z: v[2] });
        let q: Arc<dyn Propagator> = Arc::new(PlusConst { x: v[0], c: 2, z: v[1] });
        let a = ConstraintsAttr::new(vec![p.clone()]);
        let b: AttrRef = Arc::new(ConstraintsAttr::new(vec![p, q]));
        let (merged, _) = a.combine(v[0], &b, s).unwrap();
        let merged = merged.unwrap();
        let merged = merged.as_any().downcast_ref::<ConstraintsAttr>().unwrap();
        assert_eq!(merged.propagators().len(), 2);
    }

    #[test]
    fn domain_constraint_terms() {
        let (_, v) = setup(1);
        let a = DomainAttr::new(v[0], Domain::range(1, 4));
        assert_eq!(a.constraints()[0].to_term().to_string(), "[\"in\", _0, 1, 4]");
        let b = DomainAttr::new(v[0], Domain::values([1, 4]));
        assert_eq!(b.constraints()[0].to_term().to_string(), "[\"in\", _0, [1, 4]]");
    }
}
