//! Labeling: enumerate concrete values by splitting domains.

use super::domain::Domain;
use super::solver::{Resolved, Solver};
use super::FD_DOMAIN;
use crate::fd::attr::DomainAttr;
use crate::goal::Goal;
use crate::stream::Series;
use crate::subst::Subst;
use crate::term::Var;
use std::cmp::Reverse;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::trace::trace;

/// Enumerate values for `vars`.
///
/// Variables with an unbounded domain are left alone. Answers come out as
/// a lazy stream, interleaving the two halves of every split.
pub fn label(vars: impl IntoIterator<Item = Var>) -> Goal {
    let vars: Arc<[Var]> = vars.into_iter().collect();
    Goal::new(move |s| {
        let mut solver = Solver::new(s);
        if vars.iter().any(|v| solver.domain(*v).is_empty()) {
            return Series::Empty;
        }
        solver.wake_all();
        if !solver.fixpoint() {
            return Series::Empty;
        }
        search(solver, Arc::clone(&vars))
    })
}

/// Label every variable that currently has a finite domain.
pub fn label_all() -> Goal {
    Goal::new(|s: Subst| {
        let vars: Vec<Var> = s
            .attributed_vars()
            .into_iter()
            .filter(|v| {
                s.get_attr(*v, FD_DOMAIN)
                    .and_then(|a| a.as_any().downcast_ref::<DomainAttr>())
                    .is_some_and(|a| a.domain().size().is_some())
            })
            .collect();
        if vars.is_empty() {
            return Series::unit(s);
        }
        label(vars).apply(s)
    })
}

/// Smallest finite domain first; ties go to the variable with the most
/// watchers, then the oldest.
fn choose(solver: &mut Solver, vars: &[Var]) -> Option<Var> {
    let mut best: Option<((u64, Reverse<usize>, u32), Var)> = None;
    for &v in vars {
        let Resolved::Free(r) = solver.resolve(v) else {
            continue;
        };
        let Some(size) = solver.domain(r).size() else {
            continue;
        };
        if size < 2 {
            continue;
        }
        let key = (size, Reverse(solver.subscriber_count(r)), r.index());
        if best.as_ref().map_or(true, |(k, _)| key < *k) {
            best = Some((key, r));
        }
    }
    best.map(|(_, v)| v)
}

fn search(mut solver: Solver, vars: Arc<[Var]>) -> Series<Subst> {
    let Some(var) = choose(&mut solver, &vars) else {
        return Series::from_option(solver.into_subst());
    };
    let (left, right) = solver.domain(var).bisect();

    #[cfg(feature = "tracing")]
    trace!(var = %var, left = %left, right = %right, "fd_label_split");

    let other = solver.clone();
    let other_vars = Arc::clone(&vars);
    let first = Series::suspend(move || branch(solver, var, &left, vars));
    let second = Series::suspend(move || branch(other, var, &right, other_vars));
    first.append_inf(second)
}

fn branch(mut solver: Solver, var: Var, half: &Domain, vars: Arc<[Var]>) -> Series<Subst> {
    if !solver.reduce_domain(var, half) || !solver.fixpoint() {
        return Series::Empty;
    }
    search(solver, vars)
}
