//! Engine - top-level driver for relational queries.
//!
//! The Engine owns the answer stream of a goal and steps it:
//! 1. Apply the goal to a substitution holding only the query variable
//! 2. Force suspensions and wait on parallel branches one step at a time
//! 3. Yield the query variable, deep-walked, for every answer

use crate::fd::label_all;
use crate::goal::Goal;
use crate::stream::Series;
use crate::subst::Subst;
use crate::term::{Term, Var};
use rustc_hash::FxHashSet;
use std::collections::{BTreeMap, VecDeque};

/// Result of a single step in the Engine.
#[derive(Debug)]
pub enum StepResult {
    /// Produced an answer substitution
    Emit(Subst),
    /// No more answers (exhausted)
    Exhausted,
    /// A suspension was forced, continue stepping
    Continue,
}

/// Per-query options.
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Label every variable with a finite domain before reporting an answer.
    pub label_answers: bool,
    /// Stop after this many answers.
    pub limit: Option<usize>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            label_answers: true,
            limit: None,
        }
    }
}

/// An answer together with the residual constraints that mention it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub term: Term,
    /// Constraint terms grouped by attribute domain name.
    pub constraints: BTreeMap<&'static str, Vec<Term>>,
}

/// Evaluation engine for a query.
///
/// Iterating yields the query variable's value in each answer.
pub struct Engine {
    stream: Series<Subst>,
    query: Var,
    limit: Option<usize>,
    emitted: usize,
}

impl Engine {
    /// Create an engine for the goal built by `f` from the query variable.
    pub fn new(f: impl FnOnce(Var) -> Goal) -> Self {
        Self::with_config(QueryConfig::default(), f)
    }

    pub fn with_config(config: QueryConfig, f: impl FnOnce(Var) -> Goal) -> Self {
        let mut subst = Subst::new();
        let query = subst.fresh_var();
        let mut goal = f(query);
        if config.label_answers {
            goal = goal.and(label_all());
        }
        Self {
            stream: goal.apply(subst),
            query,
            limit: config.limit,
            emitted: 0,
        }
    }

    pub fn query_var(&self) -> Var {
        self.query
    }

    /// Take a single step in the evaluation.
    fn step(&mut self) -> StepResult {
        if self.limit.is_some_and(|n| self.emitted >= n) {
            self.stream = Series::Empty;
            return StepResult::Exhausted;
        }
        match std::mem::replace(&mut self.stream, Series::Empty) {
            Series::Empty => StepResult::Exhausted,
            Series::Cons(subst, rest) => {
                self.stream = *rest;
                self.emitted += 1;
                StepResult::Emit(subst)
            }
            Series::Suspend(thunk) => {
                self.stream = thunk();
                StepResult::Continue
            }
            Series::Pending(pending) => {
                self.stream = pending.wait();
                StepResult::Continue
            }
        }
    }

    /// Next answer substitution, unreified.
    pub fn next_subst(&mut self) -> Option<Subst> {
        loop {
            match self.step() {
                StepResult::Emit(subst) => return Some(subst),
                StepResult::Exhausted => return None,
                StepResult::Continue => continue,
            }
        }
    }

    /// Next answer plus every residual constraint reachable from it.
    pub fn next_with_constraints(&mut self) -> Option<Answer> {
        let subst = self.next_subst()?;
        let term = subst.walk_deep(&Term::Var(self.query));
        let constraints = residual_constraints(&subst, &term);
        Some(Answer { term, constraints })
    }

    /// Check if the engine is exhausted.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.stream, Series::Empty)
    }

    /// Collect all answers into a vector.
    ///
    /// This consumes all answers from the query.
    pub fn collect_answers(&mut self) -> Vec<Term> {
        self.by_ref().collect()
    }

    /// Count the number of answers (consumes them).
    pub fn count_answers(&mut self) -> usize {
        self.by_ref().count()
    }
}

impl Iterator for Engine {
    type Item = Term;

    fn next(&mut self) -> Option<Term> {
        let subst = self.next_subst()?;
        Some(subst.walk_deep(&Term::Var(self.query)))
    }
}

/// Walk outward from the variables of `term` through shared constraints,
/// collecting each constraint once.
fn residual_constraints(subst: &Subst, term: &Term) -> BTreeMap<&'static str, Vec<Term>> {
    let mut out: BTreeMap<&'static str, Vec<Term>> = BTreeMap::new();
    let mut seen: FxHashSet<Var> = FxHashSet::default();
    let mut queue: VecDeque<Var> = term.vars().into_iter().collect();

    while let Some(v) = queue.pop_front() {
        let Some(v) = subst.walk_var(v) else {
            continue;
        };
        if !seen.insert(v) {
            continue;
        }
        for attr in subst.attrs(v) {
            let group = out.entry(attr.domain_name()).or_default();
            for c in attr.constraints() {
                let rendered = subst.walk_deep(&c.to_term());
                if !group.contains(&rendered) {
                    group.push(rendered);
                }
                queue.extend(c.vars());
            }
        }
    }
    out
}

/// All answers of the query built by `f`.
pub fn run(f: impl FnOnce(Var) -> Goal) -> Vec<Term> {
    Engine::new(f).collect()
}

/// At most `n` answers.
pub fn run_n(n: usize, f: impl FnOnce(Var) -> Goal) -> Vec<Term> {
    let config = QueryConfig {
        limit: Some(n),
        ..QueryConfig::default()
    };
    Engine::with_config(config, f).collect()
}

pub fn run_first(f: impl FnOnce(Var) -> Goal) -> Option<Term> {
    Engine::new(f).next()
}

/// Answers with residual constraints; answers are not labeled.
pub fn run_with_constraints(n: usize, f: impl FnOnce(Var) -> Goal) -> Vec<Answer> {
    let config = QueryConfig {
        label_answers: false,
        limit: Some(n),
    };
    let mut engine = Engine::with_config(config, f);
    std::iter::from_fn(|| engine.next_with_constraints()).collect()
}

#[cfg(test)]
#[path = "tests/engine.rs"]
mod tests;
