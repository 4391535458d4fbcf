//! Standard list relations.

use crate::goal::{conde, conj_all, delay, eq, fresh, fresh3, Goal};
use crate::term::Term;

/// `l` is the empty list.
pub fn nullo(l: impl Into<Term>) -> Goal {
    eq(l, Term::Nil)
}

/// `l` is the pair `(head . tail)`.
pub fn conso(head: impl Into<Term>, tail: impl Into<Term>, l: impl Into<Term>) -> Goal {
    eq(Term::cons(head, tail), l)
}

pub fn firsto(l: impl Into<Term>, head: impl Into<Term>) -> Goal {
    let l = l.into();
    let head = head.into();
    fresh(move |tail| conso(head.clone(), tail, l.clone()))
}

pub fn resto(l: impl Into<Term>, tail: impl Into<Term>) -> Goal {
    let l = l.into();
    let tail = tail.into();
    fresh(move |head| conso(head, tail.clone(), l.clone()))
}

/// `out` is `l` followed by `s`.
pub fn appendo(l: impl Into<Term>, s: impl Into<Term>, out: impl Into<Term>) -> Goal {
    let l = l.into();
    let s = s.into();
    let out = out.into();
    delay(move || {
        let (l2, s2, out2) = (l.clone(), s.clone(), out.clone());
        conde([
            vec![nullo(l.clone()), eq(s.clone(), out.clone())],
            vec![fresh3(move |a, d, res| {
                conj_all([
                    conso(a, d, l2.clone()),
                    conso(a, res, out2.clone()),
                    appendo(d, s2.clone(), res),
                ])
            })],
        ])
    })
}

/// `x` is an element of `l`.
pub fn membero(x: impl Into<Term>, l: impl Into<Term>) -> Goal {
    let x = x.into();
    let l = l.into();
    delay(move || {
        let (x2, l2) = (x.clone(), l.clone());
        conde([
            vec![firsto(l.clone(), x.clone())],
            vec![fresh(move |tail| resto(l2.clone(), tail).and(membero(x2.clone(), tail)))],
        ])
    })
}
