use super::*;
use crate::fd::{distinct, in_range, in_set, neq, plus, Domain};
use crate::goal::{alwayso, conj_all, eq, fail, fresh, fresh2, ifte, par_disj};
use crate::lists::appendo;

fn ints(mut terms: Vec<Term>) -> Vec<i64> {
    terms.sort_by_key(|t| t.as_int());
    terms.iter().filter_map(Term::as_int).collect()
}

// ========== STEPPING ==========

#[test]
fn single_answer() {
    assert_eq!(run(|q| eq(q, "World")), vec![Term::str("World")]);
}

#[test]
fn failing_query_has_no_answers() {
    let mut engine = Engine::new(|_| fail());
    assert_eq!(engine.next(), None);
    assert!(engine.is_exhausted());
}

#[test]
fn first_var_is_the_query() {
    let engine = Engine::new(|_| fail());
    assert_eq!(engine.query_var().index(), 0);
}

#[test]
fn limit_stops_infinite_stream() {
    assert_eq!(run_n(3, |q| alwayso().and(eq(q, 1))).len(), 3);
}

#[test]
fn run_first_takes_one() {
    assert_eq!(run_first(|q| alwayso().and(eq(q, 7))), Some(Term::int(7)));
    assert_eq!(run_first(|_| fail()), None);
}

#[test]
fn count_and_collect() {
    let mut engine = Engine::new(|q| eq(q, 1).or(eq(q, 2)));
    assert_eq!(engine.count_answers(), 2);
    assert!(engine.is_exhausted());

    let mut engine = Engine::new(|q| eq(q, 1).or(eq(q, 2)));
    assert_eq!(ints(engine.collect_answers()), vec![1, 2]);
}

#[test]
fn parallel_branches_are_awaited() {
    let got = run(|q| par_disj(eq(q, 1), par_disj(eq(q, 2), eq(q, 3))));
    assert_eq!(ints(got), vec![1, 2, 3]);
}

#[test]
fn lists_are_reified() {
    let got = run(|q| appendo(Term::list([1]), Term::list([2, 3]), q));
    assert_eq!(got, vec![Term::list([1, 2, 3])]);
}

// ========== LABELING ==========

#[test]
fn answers_are_labeled_by_default() {
    let got = run(|q| in_set(q, [1, 2, 3]).and(in_set(q, [2, 3, 4])));
    assert_eq!(ints(got), vec![2, 3]);
}

#[test]
fn labeling_can_be_turned_off() {
    let config = QueryConfig {
        label_answers: false,
        limit: None,
    };
    let got: Vec<Term> = Engine::with_config(config, |q| in_range(q, 1, 3)).collect();
    assert_eq!(got.len(), 1);
    assert!(got[0].is_var());
}

// ========== CONSTRAINTS ==========

#[test]
fn residual_domain_is_reported() {
    let answers = run_with_constraints(5, |q| in_range(q, 1, 3));
    assert_eq!(answers.len(), 1);
    let fd = &answers[0].constraints["fd"];
    assert_eq!(fd, &vec![Term::list([Term::str("in"), answers[0].term.clone(), Term::int(1), Term::int(3)])]);
}

#[test]
fn constraints_reachable_through_peers() {
    let answers = run_with_constraints(5, |q| {
        fresh(move |x| conj_all([in_range(x, 0, 1000), plus(x, 1, q), eq(q, Term::list([x]))]).or(
            fresh2(move |a, b| {
                conj_all([
                    in_range(a, 0, 1000),
                    in_range(b, 0, 1000),
                    plus(a, 5, b),
                    eq(q, Term::list([a])),
                ])
            }),
        ))
    });
    // First branch: q cannot be both a list and an integer.
    assert_eq!(answers.len(), 1);
    let fda = &answers[0].constraints["fda"];
    assert_eq!(fda.len(), 1);
    // The peer `b` is reached through the shared constraint.
    assert_eq!(answers[0].constraints["fd"].len(), 2);
}

#[test]
fn solved_answers_have_no_constraints() {
    let answers = run_with_constraints(5, |q| {
        fresh(move |x| conj_all([in_range(x, 0, 5), plus(x, 2, 7), eq(q, x)]))
    });
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].term, Term::int(5));
    assert!(answers[0].constraints.is_empty());
}

#[test]
fn distinct_constraint_is_rendered() {
    let answers = run_with_constraints(1, |q| {
        fresh(move |x| {
            conj_all([
                crate::fd::dom(x, Domain::range(1, 5)),
                crate::fd::dom(q, Domain::range(1, 5)),
                distinct([x, q]),
            ])
        })
    });
    let fda = &answers[0].constraints["fda"];
    assert_eq!(fda.len(), 1);
    assert!(fda[0].to_string().starts_with("[\"distinct\""));
}

#[test]
fn aliasing_checks_watchers_against_domain() {
    // Every value left for q is excluded by the constraints on y.
    let answers = run_with_constraints(5, |q| {
        fresh(move |y| conj_all([neq(y, 1), neq(y, 2), in_set(q, [1, 2]), eq(q, y)]))
    });
    assert!(answers.is_empty());

    let answers = run_with_constraints(5, |q| {
        fresh(move |y| conj_all([neq(q, 1), neq(q, 2), in_set(y, [1, 2]), eq(q, y)]))
    });
    assert!(answers.is_empty());
}

#[test]
fn aliasing_narrows_through_copied_watchers() {
    let answers = run_with_constraints(5, |q| {
        fresh(move |y| conj_all([neq(y, 1), in_set(q, [1, 2]), eq(q, y)]))
    });
    assert_eq!(answers.len(), 1);
    assert_eq!(answers[0].term, Term::int(2));
    assert!(answers[0].constraints.is_empty());
}

#[test]
fn guard_sees_aliasing_contradiction() {
    let got = run(|q| {
        fresh2(move |x, y| {
            conj_all([
                neq(y, 1),
                neq(y, 2),
                in_set(x, [1, 2]),
                ifte(eq(x, y), eq(q, "sat"), eq(q, "unsat")),
            ])
        })
    });
    assert!(!got.is_empty());
    assert!(got.iter().all(|t| *t == Term::str("unsat")));
}
