use fdlog::unify::unify;
use fdlog::{Subst, Term, Var};
use proptest::prelude::*;

const VAR_COUNT: usize = 5;

#[derive(Clone, Debug)]
enum RawTerm {
    Var(usize),
    Int(i64),
    Str(&'static str),
    Nil,
    Pair(Box<RawTerm>, Box<RawTerm>),
}

fn raw_term_strategy() -> impl Strategy<Value = RawTerm> {
    let leaf = prop_oneof![
        (0..VAR_COUNT).prop_map(RawTerm::Var),
        (0i64..3).prop_map(RawTerm::Int),
        prop_oneof![Just("a"), Just("b")].prop_map(RawTerm::Str),
        Just(RawTerm::Nil),
    ];

    leaf.prop_recursive(3, 16, 2, |inner| {
        (inner.clone(), inner).prop_map(|(h, t)| RawTerm::Pair(Box::new(h), Box::new(t)))
    })
}

fn build(raw: &RawTerm, vars: &[Var]) -> Term {
    match raw {
        RawTerm::Var(i) => Term::from(vars[*i]),
        RawTerm::Int(n) => Term::int(*n),
        RawTerm::Str(s) => Term::str(s),
        RawTerm::Nil => Term::Nil,
        RawTerm::Pair(h, t) => Term::cons(build(h, vars), build(t, vars)),
    }
}

fn setup() -> (Subst, Vec<Var>) {
    let mut subst = Subst::new();
    let vars = (0..VAR_COUNT).map(|_| subst.fresh_var()).collect();
    (subst, vars)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn unify_is_reflexive(raw in raw_term_strategy()) {
        let (subst, vars) = setup();
        let t = build(&raw, &vars);
        prop_assert_eq!(unify(&t, &t, subst.clone()), Some(subst));
    }

    #[test]
    fn unify_is_symmetric(a in raw_term_strategy(), b in raw_term_strategy()) {
        let (subst, vars) = setup();
        let (a, b) = (build(&a, &vars), build(&b, &vars));
        let ab = unify(&a, &b, subst.clone());
        let ba = unify(&b, &a, subst);
        prop_assert_eq!(ab.is_some(), ba.is_some());
        if let (Some(s1), Some(s2)) = (ab, ba) {
            prop_assert_eq!(s1.walk_deep(&a), s1.walk_deep(&b));
            prop_assert_eq!(s1.walk_deep(&a), s2.walk_deep(&a));
            for v in &vars {
                prop_assert_eq!(s1.walk_deep(&Term::from(*v)), s2.walk_deep(&Term::from(*v)));
            }
        }
    }

    #[test]
    fn unify_with_own_image_is_idempotent(a in raw_term_strategy(), b in raw_term_strategy()) {
        let (subst, vars) = setup();
        let (a, b) = (build(&a, &vars), build(&b, &vars));
        if let Some(s) = unify(&a, &b, subst) {
            let image = s.walk_deep(&a);
            prop_assert_eq!(unify(&a, &image, s.clone()), Some(s));
        }
    }

    #[test]
    fn bindings_never_cycle(a in raw_term_strategy(), b in raw_term_strategy()) {
        let (subst, vars) = setup();
        let (a, b) = (build(&a, &vars), build(&b, &vars));
        if let Some(s) = unify(&a, &b, subst) {
            for v in &vars {
                let value = s.walk_deep(&Term::from(*v));
                if let Some(rep) = value.as_var() {
                    prop_assert!(!s.is_bound(rep));
                } else {
                    prop_assert!(!value.vars().iter().any(|w| s.is_bound(*w)));
                }
            }
        }
    }
}
