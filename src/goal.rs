//! Goals and the combinators that build them.
//!
//! A [`Goal`] maps a substitution to the [`Series`] of substitutions under
//! which it holds. Combinators compose goals without running them; nothing
//! happens until a query pulls on the resulting series.

use crate::executor::Executor;
use crate::stream::{Bind, Pending, Series};
use crate::subst::Subst;
use crate::term::{Term, Var};
use crate::unify::unify;
use crossbeam_channel::bounded;
use std::fmt;
use std::sync::Arc;

#[derive(Clone)]
pub struct Goal(Bind<Subst>);

impl Goal {
    pub fn new(f: impl Fn(Subst) -> Series<Subst> + Send + Sync + 'static) -> Self {
        Goal(Arc::new(f))
    }

    /// Run the goal against `subst`.
    pub fn apply(&self, subst: Subst) -> Series<Subst> {
        (self.0)(subst)
    }

    pub fn and(self, other: Goal) -> Goal {
        conj(self, other)
    }

    pub fn or(self, other: Goal) -> Goal {
        disj(self, other)
    }
}

impl fmt::Debug for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Goal(..)")
    }
}

pub fn succeed() -> Goal {
    Goal::new(Series::unit)
}

pub fn fail() -> Goal {
    Goal::new(|_| Series::Empty)
}

/// Unify two terms.
pub fn eq(left: impl Into<Term>, right: impl Into<Term>) -> Goal {
    let left = left.into();
    let right = right.into();
    Goal::new(move |s| Series::from_option(unify(&left, &right, s)))
}

/// Both goals hold. Results of `a` are fed to `b` with fair interleaving.
pub fn conj(a: Goal, b: Goal) -> Goal {
    Goal::new(move |s| a.apply(s).append_map_inf(Arc::clone(&b.0)))
}

/// Either goal holds. The two result streams are interleaved fairly.
///
/// Both branches are applied immediately; wrap recursive branches in
/// [`delay`].
pub fn disj(a: Goal, b: Goal) -> Goal {
    Goal::new(move |s| a.apply(s.clone()).append_inf(b.apply(s)))
}

/// Conjunction of any number of goals; empty is [`succeed`].
pub fn conj_all(goals: impl IntoIterator<Item = Goal>) -> Goal {
    let mut goals: Vec<Goal> = goals.into_iter().collect();
    match goals.len() {
        0 => succeed(),
        1 => goals.remove(0),
        _ => {
            let last = goals.pop().unwrap_or_else(succeed);
            goals.into_iter().rev().fold(last, |acc, g| conj(g, acc))
        }
    }
}

/// Disjunction of any number of goals; empty is [`fail`].
pub fn disj_all(goals: impl IntoIterator<Item = Goal>) -> Goal {
    let mut goals: Vec<Goal> = goals.into_iter().collect();
    match goals.len() {
        0 => fail(),
        1 => goals.remove(0),
        _ => {
            let last = goals.pop().unwrap_or_else(fail);
            goals.into_iter().rev().fold(last, |acc, g| disj(g, acc))
        }
    }
}

/// Disjunction of conjunctive clauses, each clause suspended before it runs.
pub fn conde(clauses: impl IntoIterator<Item = Vec<Goal>>) -> Goal {
    disj_all(clauses.into_iter().map(|clause| suspended(conj_all(clause))))
}

fn suspended(goal: Goal) -> Goal {
    Goal::new(move |s| {
        let goal = goal.clone();
        Series::suspend(move || goal.apply(s))
    })
}

/// Build the goal only when it runs, and run it in a suspension.
///
/// This is how recursive relations terminate construction and stay off the
/// call stack.
pub fn delay(f: impl Fn() -> Goal + Send + Sync + 'static) -> Goal {
    Goal::new(move |s| {
        let goal = f();
        Series::suspend(move || goal.apply(s))
    })
}

/// Introduce one fresh variable.
pub fn fresh(f: impl Fn(Var) -> Goal + Send + Sync + 'static) -> Goal {
    Goal::new(move |mut s| {
        let x = s.fresh_var();
        f(x).apply(s)
    })
}

pub fn fresh2(f: impl Fn(Var, Var) -> Goal + Send + Sync + 'static) -> Goal {
    Goal::new(move |mut s| {
        let x = s.fresh_var();
        let y = s.fresh_var();
        f(x, y).apply(s)
    })
}

pub fn fresh3(f: impl Fn(Var, Var, Var) -> Goal + Send + Sync + 'static) -> Goal {
    Goal::new(move |mut s| {
        let x = s.fresh_var();
        let y = s.fresh_var();
        let z = s.fresh_var();
        f(x, y, z).apply(s)
    })
}

/// Introduce `n` fresh variables.
pub fn fresh_n(n: usize, f: impl Fn(&[Var]) -> Goal + Send + Sync + 'static) -> Goal {
    Goal::new(move |mut s| {
        let vars: Vec<Var> = (0..n).map(|_| s.fresh_var()).collect();
        f(&vars).apply(s)
    })
}

/// Negation as failure. `goal` must be finite.
pub fn not(goal: Goal) -> Goal {
    Goal::new(move |s| match goal.apply(s.clone()).force_deep() {
        Series::Empty => Series::unit(s),
        _ => Series::Empty,
    })
}

/// If `cond` has any solution, run `then` on all of them; otherwise run
/// `otherwise` on the input.
pub fn ifte(cond: Goal, then: Goal, otherwise: Goal) -> Goal {
    Goal::new(move |s| match cond.apply(s.clone()).force_deep() {
        Series::Empty => otherwise.apply(s),
        found => found.append_map_inf(Arc::clone(&then.0)),
    })
}

/// Keep only the first solution of `goal`.
pub fn once(goal: Goal) -> Goal {
    Goal::new(move |s| match goal.apply(s).force_deep() {
        Series::Cons(first, _) => Series::unit(first),
        _ => Series::Empty,
    })
}

/// Disjunction whose right branch is computed on the default executor.
pub fn par_disj(a: Goal, b: Goal) -> Goal {
    par_disj_with(Executor::global(), a, b)
}

/// Disjunction whose right branch is computed on `executor`.
///
/// The branch job runs until its first answer (or exhaustion) and hands the
/// rest of its series back lazily. Jobs are never cancelled.
pub fn par_disj_with(executor: Arc<Executor>, a: Goal, b: Goal) -> Goal {
    Goal::new(move |s| {
        let (tx, rx) = bounded(1);
        let branch = b.clone();
        let input = s.clone();
        executor.spawn(move || {
            let _ = tx.send(branch.apply(input).force_ready());
        });
        a.apply(s).append_inf(Series::Pending(Pending::new(rx)))
    })
}

/// Succeeds no times, forever.
pub fn nevero() -> Goal {
    Goal::new(|s| Series::suspend(move || nevero().apply(s)))
}

/// Succeeds infinitely many times.
pub fn alwayso() -> Goal {
    Goal::new(|s| {
        let rest = s.clone();
        Series::Cons(s, Box::new(Series::suspend(move || alwayso().apply(rest))))
    })
}
