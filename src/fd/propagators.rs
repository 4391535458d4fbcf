//! Arithmetic and structural propagators.
//!
//! Each propagator narrows the domains of its variables through the
//! [`Solver`] and then re-subscribes to whichever of them are still open.
//! A propagator that does not re-subscribe is entailed and disappears.

use super::domain::Domain;
use super::solver::{PropId, Resolved, Solver};
use crate::term::{Term, Var};
use smallvec::{smallvec, SmallVec};
use std::fmt;
use std::sync::Arc;

/// Largest number of operand combinations a propagator will cache as an
/// explicit [`Table`].
pub const TABLE_THRESHOLD: u64 = 256;

pub trait Propagator: Send + Sync + fmt::Debug {
    fn vars(&self) -> SmallVec<[Var; 4]>;

    /// Agenda weight; cheaper propagators run first.
    fn priority(&self) -> u32;

    /// Narrow domains. Returns false on a contradiction.
    fn propagate(&self, id: PropId, solver: &mut Solver) -> bool;

    fn to_term(&self) -> Term;
}

fn small_product(a: &Domain, b: &Domain) -> bool {
    match (a.size(), b.size()) {
        (Some(x), Some(y)) => x.saturating_mul(y) <= TABLE_THRESHOLD,
        _ => false,
    }
}

/// Hand `id` over to `next` and run it right away.
fn specialize(id: PropId, solver: &mut Solver, next: Arc<dyn Propagator>) -> bool {
    solver.replace(id, Arc::clone(&next));
    next.propagate(id, solver)
}

fn relation(op: &str, args: impl IntoIterator<Item = Term>) -> Term {
    let mut items = vec![Term::str(op)];
    items.extend(args);
    Term::list(items)
}

// ---------------------------------------------------------------------------

/// `x + c = z`
#[derive(Debug, Clone)]
pub struct PlusConst {
    pub x: Var,
    pub c: i64,
    pub z: Var,
}

impl Propagator for PlusConst {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        smallvec![self.x, self.z]
    }

    fn priority(&self) -> u32 {
        1
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        if s.same_var(self.x, self.z) {
            return self.c == 0;
        }
        let dx = s.domain(self.x);
        if !s.reduce_domain(self.z, &dx.shift(self.c)) {
            return false;
        }
        let dz = s.domain(self.z);
        if !s.reduce_domain(self.x, &dz.shift(-self.c)) {
            return false;
        }
        s.resubscribe(id, &[self.x, self.z]);
        true
    }

    fn to_term(&self) -> Term {
        relation("+", [Term::from(self.x), Term::int(self.c), Term::from(self.z)])
    }
}

/// `x + y = c`
#[derive(Debug, Clone)]
pub struct SumConst {
    pub x: Var,
    pub y: Var,
    pub c: i64,
}

impl Propagator for SumConst {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        smallvec![self.x, self.y]
    }

    fn priority(&self) -> u32 {
        2
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        if s.same_var(self.x, self.y) {
            return self.c % 2 == 0 && s.reduce_domain(self.x, &Domain::singleton(self.c / 2));
        }
        let dx = s.domain(self.x);
        let dy = s.domain(self.y);
        if small_product(&dx, &dy) {
            let c = self.c;
            let tuples = dx
                .iter()
                .filter_map(|a| c.checked_sub(a).filter(|b| dy.contains(*b)).map(|b| smallvec![a, b]))
                .collect();
            return specialize(id, s, Table::new(smallvec![self.x, self.y], tuples, self.to_term()));
        }
        if !s.reduce_domain(self.x, &dy.subtract_from(self.c)) {
            return false;
        }
        let dx = s.domain(self.x);
        if !s.reduce_domain(self.y, &dx.subtract_from(self.c)) {
            return false;
        }
        s.resubscribe(id, &[self.x, self.y]);
        true
    }

    fn to_term(&self) -> Term {
        relation("+", [Term::from(self.x), Term::from(self.y), Term::int(self.c)])
    }
}

/// `x + y = z`
#[derive(Debug, Clone)]
pub struct Sum {
    pub x: Var,
    pub y: Var,
    pub z: Var,
}

impl Sum {
    /// Interval reasoning; loops until no bound moves.
    fn narrow_bounds(&self, s: &mut Solver) -> bool {
        loop {
            let before = (s.domain(self.x), s.domain(self.y), s.domain(self.z));
            let (dx, dy) = (&before.0, &before.1);
            if let (Some(x0), Some(x1), Some(y0), Some(y1)) = (dx.min(), dx.max(), dy.min(), dy.max()) {
                if !s.reduce_domain(self.z, &Domain::range_i128(x0 as i128 + y0 as i128, x1 as i128 + y1 as i128)) {
                    return false;
                }
            }
            let dz = s.domain(self.z);
            if let (Some(z0), Some(z1), Some(y0), Some(y1)) = (dz.min(), dz.max(), dy.min(), dy.max()) {
                if !s.reduce_domain(self.x, &Domain::range_i128(z0 as i128 - y1 as i128, z1 as i128 - y0 as i128)) {
                    return false;
                }
            }
            let dx = s.domain(self.x);
            if let (Some(z0), Some(z1), Some(x0), Some(x1)) = (dz.min(), dz.max(), dx.min(), dx.max()) {
                if !s.reduce_domain(self.y, &Domain::range_i128(z0 as i128 - x1 as i128, z1 as i128 - x0 as i128)) {
                    return false;
                }
            }
            let after = (s.domain(self.x), s.domain(self.y), s.domain(self.z));
            if after == before {
                return true;
            }
        }
    }
}

impl Propagator for Sum {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        smallvec![self.x, self.y, self.z]
    }

    fn priority(&self) -> u32 {
        3
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        let xy = s.same_var(self.x, self.y);
        let xz = s.same_var(self.x, self.z);
        let yz = s.same_var(self.y, self.z);
        if xy && xz {
            return s.reduce_domain(self.x, &Domain::singleton(0));
        }
        if xy {
            return specialize(id, s, Arc::new(Scale { c: 2, x: self.x, z: self.z }));
        }
        if xz {
            return s.reduce_domain(self.y, &Domain::singleton(0));
        }
        if yz {
            return s.reduce_domain(self.x, &Domain::singleton(0));
        }

        let (dx, dy, dz) = (s.domain(self.x), s.domain(self.y), s.domain(self.z));
        if let Some(a) = dx.solution() {
            return specialize(id, s, Arc::new(PlusConst { x: self.y, c: a, z: self.z }));
        }
        if let Some(b) = dy.solution() {
            return specialize(id, s, Arc::new(PlusConst { x: self.x, c: b, z: self.z }));
        }
        if let Some(c) = dz.solution() {
            return specialize(id, s, Arc::new(SumConst { x: self.x, y: self.y, c }));
        }

        if small_product(&dx, &dy) && dz.size().is_some() {
            let mut tuples = Vec::new();
            for a in dx.iter() {
                for b in dy.iter() {
                    if let Some(c) = a.checked_add(b).filter(|c| dz.contains(*c)) {
                        tuples.push(smallvec![a, b, c]);
                    }
                }
            }
            return specialize(
                id,
                s,
                Table::new(smallvec![self.x, self.y, self.z], tuples, self.to_term()),
            );
        }

        if !self.narrow_bounds(s) {
            return false;
        }
        s.resubscribe(id, &[self.x, self.y, self.z]);
        true
    }

    fn to_term(&self) -> Term {
        relation("+", [Term::from(self.x), Term::from(self.y), Term::from(self.z)])
    }
}

/// `c * x = z`
#[derive(Debug, Clone)]
pub struct Scale {
    pub c: i64,
    pub x: Var,
    pub z: Var,
}

impl Propagator for Scale {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        smallvec![self.x, self.z]
    }

    fn priority(&self) -> u32 {
        2
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        if self.c == 0 {
            return s.reduce_domain(self.z, &Domain::singleton(0));
        }
        if s.same_var(self.x, self.z) {
            return self.c == 1 || s.reduce_domain(self.x, &Domain::singleton(0));
        }
        let dx = s.domain(self.x);
        let dz = s.domain(self.z);
        if dx.size().is_some_and(|n| n <= TABLE_THRESHOLD) {
            let c = self.c;
            let tuples = dx
                .iter()
                .filter_map(|a| a.checked_mul(c).filter(|b| dz.contains(*b)).map(|b| smallvec![a, b]))
                .collect();
            return specialize(id, s, Table::new(smallvec![self.x, self.z], tuples, self.to_term()));
        }
        if !s.reduce_domain(self.z, &dx.scale(self.c)) {
            return false;
        }
        let dz = s.domain(self.z);
        if !s.reduce_domain(self.x, &dz.divide_exact(self.c)) {
            return false;
        }
        s.resubscribe(id, &[self.x, self.z]);
        true
    }

    fn to_term(&self) -> Term {
        relation("*", [Term::int(self.c), Term::from(self.x), Term::from(self.z)])
    }
}

/// Explicit list of admissible value tuples for its variables.
#[derive(Debug, Clone)]
pub struct Table {
    vars: SmallVec<[Var; 3]>,
    tuples: Arc<[SmallVec<[i64; 3]>]>,
    origin: Term,
}

impl Table {
    /// `origin` is the relation the table was built from, for display.
    pub fn new(vars: SmallVec<[Var; 3]>, tuples: Vec<SmallVec<[i64; 3]>>, origin: Term) -> Arc<dyn Propagator> {
        Arc::new(Table {
            vars,
            tuples: tuples.into(),
            origin,
        })
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }
}

impl Propagator for Table {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        self.vars.iter().copied().collect()
    }

    fn priority(&self) -> u32 {
        1
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        let n = self.vars.len();
        let domains: SmallVec<[Domain; 3]> = self.vars.iter().map(|v| s.domain(*v)).collect();
        let mut aliases: SmallVec<[(usize, usize); 3]> = SmallVec::new();
        for i in 0..n {
            for j in (i + 1)..n {
                if s.same_var(self.vars[i], self.vars[j]) {
                    aliases.push((i, j));
                }
            }
        }

        let live: Vec<SmallVec<[i64; 3]>> = self
            .tuples
            .iter()
            .filter(|t| (0..n).all(|k| domains[k].contains(t[k])))
            .filter(|t| aliases.iter().all(|&(i, j)| t[i] == t[j]))
            .cloned()
            .collect();
        if live.is_empty() {
            return false;
        }

        for k in 0..n {
            let projected = Domain::values(live.iter().map(|t| t[k]));
            if !s.reduce_domain(self.vars[k], &projected) {
                return false;
            }
        }

        if live.len() < self.tuples.len() {
            let shrunk = Table::new(self.vars.clone(), live, self.origin.clone());
            s.replace(id, shrunk);
        }
        s.resubscribe(id, &self.vars);
        true
    }

    fn to_term(&self) -> Term {
        self.origin.clone()
    }
}

/// Pairwise distinct variables, also distinct from a set of constants.
#[derive(Debug, Clone)]
pub struct AllDifferent {
    pub vars: SmallVec<[Var; 4]>,
    pub consts: SmallVec<[i64; 4]>,
}

impl AllDifferent {
    /// Fail if the open variables cannot all get distinct values.
    fn pigeonhole(open: &[Var], s: &mut Solver) -> bool {
        if open.len() < 2 {
            return true;
        }
        let mut seen = std::collections::BTreeSet::new();
        let mut budget = super::domain::MATERIALIZE_LIMIT;
        for &v in open {
            let d = s.domain(v);
            match d.size() {
                Some(n) if n <= budget => {
                    budget -= n;
                    seen.extend(d.iter());
                }
                _ => return true,
            }
        }
        seen.len() >= open.len()
    }
}

impl Propagator for AllDifferent {
    fn vars(&self) -> SmallVec<[Var; 4]> {
        self.vars.clone()
    }

    fn priority(&self) -> u32 {
        4
    }

    fn propagate(&self, id: PropId, s: &mut Solver) -> bool {
        let mut fixed: SmallVec<[i64; 8]> = SmallVec::new();
        for &c in &self.consts {
            if fixed.contains(&c) {
                return false;
            }
            fixed.push(c);
        }

        let mut open: SmallVec<[Var; 4]> = SmallVec::new();
        for &v in &self.vars {
            match s.resolve(v) {
                Resolved::Free(r) => {
                    if open.contains(&r) {
                        return false;
                    }
                    open.push(r);
                }
                Resolved::Value(n) => {
                    if fixed.contains(&n) {
                        return false;
                    }
                    fixed.push(n);
                }
                Resolved::Other => return false,
            }
        }

        // Removing a value may fix another variable, whose value must then
        // be removed from the rest.
        loop {
            let mut newly_fixed = false;
            let mut still_open: SmallVec<[Var; 4]> = SmallVec::new();
            for &v in &open {
                let current = s.domain(v);
                let narrowed = fixed.iter().fold(current.clone(), |d, f| d.remove(*f));
                if narrowed != current && !s.reduce_domain(v, &narrowed) {
                    return false;
                }
                match s.domain(v).solution() {
                    Some(n) => {
                        if fixed.contains(&n) {
                            return false;
                        }
                        fixed.push(n);
                        newly_fixed = true;
                    }
                    None => still_open.push(v),
                }
            }
            open = still_open;
            if !newly_fixed {
                break;
            }
        }

        if !Self::pigeonhole(&open, s) {
            return false;
        }

        match open.len() {
            0 => return true,
            1 => {
                let d = s.domain(open[0]);
                if fixed.iter().all(|f| !d.contains(*f)) {
                    return true;
                }
            }
            _ => {}
        }

        if open.len() < self.vars.len() {
            let consts: SmallVec<[i64; 4]> = fixed.iter().copied().collect();
            s.replace(id, Arc::new(AllDifferent { vars: open.clone(), consts }));
        }
        s.resubscribe(id, &open);
        true
    }

    fn to_term(&self) -> Term {
        let items = self
            .vars
            .iter()
            .map(|v| Term::from(*v))
            .chain(self.consts.iter().map(|c| Term::int(*c)));
        relation("distinct", [Term::list(items)])
    }
}

#[cfg(test)]
#[path = "tests/propagators.rs"]
mod tests;
