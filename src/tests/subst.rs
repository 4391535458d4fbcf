use super::*;
use crate::test_utils::{setup, Allowed, Tag};

// ========== VARIABLE ALLOCATION ==========

#[test]
fn new_subst_is_empty() {
    let subst = Subst::new();
    assert!(subst.is_empty());
    assert_eq!(subst.len(), 0);
    assert_eq!(subst.var_count(), 0);
}

#[test]
fn fresh_vars_are_sequential() {
    let (subst, vars) = setup(3);
    assert_eq!(vars.iter().map(|v| v.index()).collect::<Vec<_>>(), vec![0, 1, 2]);
    assert_eq!(subst.var_count(), 3);
    assert!(subst.is_empty(), "allocation does not bind");
}

#[test]
fn clones_allocate_independently() {
    let (subst, _) = setup(2);
    let mut a = subst.clone();
    let mut b = subst;
    assert_eq!(a.fresh_var(), b.fresh_var(), "branches share the counter snapshot");
}

// ========== WALK ==========

#[test]
fn walk_unbound_var_is_itself() {
    let (subst, vars) = setup(1);
    assert_eq!(subst.walk(&Term::Var(vars[0])), Term::Var(vars[0]));
}

#[test]
fn walk_follows_chain() {
    let (mut subst, vars) = setup(3);
    subst.bind(vars[2], Term::Var(vars[1]));
    subst.bind(vars[1], Term::Var(vars[0]));
    assert_eq!(subst.walk(&Term::Var(vars[2])), Term::Var(vars[0]));

    subst.bind(vars[0], Term::int(7));
    assert_eq!(subst.walk(&Term::Var(vars[2])), Term::int(7));
    assert_eq!(subst.walk_var(vars[2]), None);
}

#[test]
fn walk_is_shallow() {
    let (mut subst, vars) = setup(2);
    subst.bind(vars[1], Term::int(1));
    let t = Term::list([Term::Var(vars[1])]);
    subst.bind(vars[0], t.clone());
    assert_eq!(subst.walk(&Term::Var(vars[0])), t);
}

#[test]
fn walk_deep_resolves_nested() {
    let (mut subst, vars) = setup(3);
    subst.bind(vars[1], Term::int(1));
    subst.bind(vars[2], Term::list([Term::Var(vars[1]), Term::int(2)]));
    subst.bind(vars[0], Term::cons(Term::Var(vars[2]), Term::Var(vars[2])));

    let expected = Term::cons(Term::list([1, 2]), Term::list([1, 2]));
    assert_eq!(subst.walk_deep(&Term::Var(vars[0])), expected);
}

#[test]
fn walk_deep_keeps_unbound_tail() {
    let (mut subst, vars) = setup(2);
    subst.bind(vars[0], Term::cons(1, vars[1]));
    assert_eq!(subst.walk_deep(&Term::Var(vars[0])).to_string(), "[1 | _1]");
}

#[test]
fn walk_deep_long_list() {
    let (mut subst, vars) = setup(1);
    subst.bind(vars[0], Term::int(9));
    let items: Vec<Term> = (0..100_000).map(|_| Term::Var(vars[0])).collect();
    let walked = subst.walk_deep(&Term::list(items));
    let out = walked.to_vec().unwrap();
    assert_eq!(out.len(), 100_000);
    assert!(out.iter().all(|t| t.as_int() == Some(9)));
}

// ========== OCCURS ==========

#[test]
fn occurs_through_bindings() {
    let (mut subst, vars) = setup(3);
    subst.bind(vars[1], Term::list([Term::Var(vars[0])]));
    let t = Term::cons(2, vars[1]);
    assert!(subst.occurs(vars[0], &t));
    assert!(!subst.occurs(vars[2], &t));
}

// ========== ATTRIBUTES ==========

#[test]
fn set_get_remove_attr() {
    let (mut subst, vars) = setup(1);
    let v = vars[0];
    assert!(subst.get_attr(v, "allowed").is_none());

    subst.set_attr(v, Allowed::attr(&[1, 2]));
    subst.set_attr(v, Arc::new(Tag));
    assert!(subst.get_attr(v, "allowed").is_some());
    assert_eq!(subst.attrs(v).len(), 2);
    assert_eq!(subst.attributed_vars(), vec![v]);

    subst.remove_attr(v, "allowed");
    assert!(subst.get_attr(v, "allowed").is_none());
    assert!(subst.has_attrs(v));

    subst.remove_attr(v, "tag");
    assert!(!subst.has_attrs(v), "empty attribute maps are dropped");
}

#[test]
fn attrs_are_in_domain_name_order() {
    let (mut subst, vars) = setup(1);
    subst.set_attr(vars[0], Arc::new(Tag));
    subst.set_attr(vars[0], Allowed::attr(&[1]));
    let names: Vec<_> = subst.attrs(vars[0]).iter().map(|a| a.domain_name()).collect();
    assert_eq!(names, vec!["allowed", "tag"]);
}

#[test]
fn take_attrs_detaches() {
    let (mut subst, vars) = setup(1);
    subst.set_attr(vars[0], Arc::new(Tag));
    let taken = subst.take_attrs(vars[0]);
    assert_eq!(taken.len(), 1);
    assert!(!subst.has_attrs(vars[0]));
}

#[test]
fn versions_are_independent() {
    let (mut before, vars) = setup(1);
    before.set_attr(vars[0], Arc::new(Tag));
    let mut after = before.clone();
    after.bind(vars[0], Term::int(3));
    after.remove_attr(vars[0], "tag");

    assert!(before.get(vars[0]).is_none());
    assert!(before.has_attrs(vars[0]));
    assert_eq!(after.get(vars[0]), Some(&Term::int(3)));
    assert_ne!(before, after);
}

#[test]
fn equality_compares_attr_identity() {
    let (mut a, vars) = setup(1);
    let attr = Allowed::attr(&[1]);
    a.set_attr(vars[0], attr.clone());
    let mut b = a.clone();
    assert_eq!(a, b);
    b.set_attr(vars[0], Allowed::attr(&[1]));
    assert_ne!(a, b, "a fresh attribute is not the same attribute");
}
