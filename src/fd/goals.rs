//! Goals that post finite-domain constraints.
//!
//! Every operand may be a constant or a variable. Fully ground relations
//! are checked on the spot, a relation with a single unknown narrows it
//! directly, and anything else posts a propagator.

use super::domain::Domain;
use super::propagators::{AllDifferent, PlusConst, Propagator, Scale, Sum, SumConst};
use super::solver::Solver;
use crate::goal::{fail, succeed, Goal};
use crate::stream::Series;
use crate::term::Var;
use smallvec::SmallVec;
use std::sync::Arc;

/// An integer constant or a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Const(i64),
    Var(Var),
}

impl From<i64> for Operand {
    fn from(n: i64) -> Self {
        Operand::Const(n)
    }
}

impl From<i32> for Operand {
    fn from(n: i32) -> Self {
        Operand::Const(n as i64)
    }
}

impl From<Var> for Operand {
    fn from(v: Var) -> Self {
        Operand::Var(v)
    }
}

/// Run `f` on a solver over the current substitution, then propagate.
fn fd_goal(f: impl Fn(&mut Solver) -> bool + Send + Sync + 'static) -> Goal {
    Goal::new(move |s| {
        let mut solver = Solver::new(s);
        if !f(&mut solver) {
            return Series::Empty;
        }
        Series::from_option(solver.solve())
    })
}

fn post(p: impl Propagator + 'static) -> Goal {
    let p: Arc<dyn Propagator> = Arc::new(p);
    fd_goal(move |solver| {
        solver.post(Arc::clone(&p));
        true
    })
}

fn fix(x: Var, value: Option<i64>) -> Goal {
    match value {
        Some(n) => fd_goal(move |solver| solver.reduce_domain(x, &Domain::singleton(n))),
        None => fail(),
    }
}

fn check(holds: bool) -> Goal {
    if holds {
        succeed()
    } else {
        fail()
    }
}

/// `x` takes a value in `domain`.
pub fn dom(x: impl Into<Operand>, domain: Domain) -> Goal {
    match x.into() {
        Operand::Const(n) => check(domain.contains(n)),
        Operand::Var(_) if domain.is_empty() => fail(),
        Operand::Var(v) => fd_goal(move |solver| solver.reduce_domain(v, &domain)),
    }
}

/// `lb <= x <= ub`
pub fn in_range(x: impl Into<Operand>, lb: i64, ub: i64) -> Goal {
    dom(x, Domain::range(lb, ub))
}

pub fn in_set(x: impl Into<Operand>, values: impl IntoIterator<Item = i64>) -> Goal {
    dom(x, Domain::values(values))
}

/// `x + y = z`
pub fn plus(x: impl Into<Operand>, y: impl Into<Operand>, z: impl Into<Operand>) -> Goal {
    use Operand::{Const, Var};
    match (x.into(), y.into(), z.into()) {
        (Const(a), Const(b), Const(c)) => check(a.checked_add(b) == Some(c)),
        (Const(a), Const(b), Var(z)) => fix(z, a.checked_add(b)),
        (Const(a), Var(y), Const(c)) => fix(y, c.checked_sub(a)),
        (Var(x), Const(b), Const(c)) => fix(x, c.checked_sub(b)),
        (Var(x), Const(b), Var(z)) => post(PlusConst { x, c: b, z }),
        (Const(a), Var(y), Var(z)) => post(PlusConst { x: y, c: a, z }),
        (Var(x), Var(y), Const(c)) => post(SumConst { x, y, c }),
        (Var(x), Var(y), Var(z)) => post(Sum { x, y, z }),
    }
}

/// `x - y = z`
pub fn minus(x: impl Into<Operand>, y: impl Into<Operand>, z: impl Into<Operand>) -> Goal {
    plus(y, z, x)
}

/// `c * x = z`
pub fn times(c: i64, x: impl Into<Operand>, z: impl Into<Operand>) -> Goal {
    use Operand::{Const, Var};
    match (x.into(), z.into()) {
        (Const(a), Const(b)) => check(c.checked_mul(a) == Some(b)),
        (Const(a), Var(z)) => fix(z, c.checked_mul(a)),
        (Var(_), Const(b)) if c == 0 => check(b == 0),
        (Var(x), Const(b)) => fix(x, b.checked_rem(c).filter(|r| *r == 0).and_then(|_| b.checked_div(c))),
        (Var(x), Var(z)) => post(Scale { c, x, z }),
    }
}

/// `x != y`
pub fn neq(x: impl Into<Operand>, y: impl Into<Operand>) -> Goal {
    distinct([x.into(), y.into()])
}

/// All operands take pairwise different values.
pub fn distinct<T: Into<Operand>>(operands: impl IntoIterator<Item = T>) -> Goal {
    let mut vars: SmallVec<[Var; 4]> = SmallVec::new();
    let mut consts: SmallVec<[i64; 4]> = SmallVec::new();
    for op in operands {
        match op.into() {
            Operand::Var(v) => vars.push(v),
            Operand::Const(n) => consts.push(n),
        }
    }
    if vars.is_empty() {
        let mut sorted = consts.to_vec();
        sorted.sort_unstable();
        return check(sorted.windows(2).all(|w| w[0] != w[1]));
    }
    post(AllDifferent { vars, consts })
}
