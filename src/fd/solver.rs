use super::attr::{ConstraintsAttr, DomainAttr};
use super::domain::Domain;
use super::propagators::Propagator;
use super::{FD_CONSTRAINTS, FD_DOMAIN};
use crate::subst::Subst;
use crate::term::{Term, Var};
use crate::unify::unify;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use std::collections::BTreeSet;
use std::sync::Arc;

#[cfg(feature = "tracing")]
use crate::trace::{debug, debug_span};

type FxMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;

/// Index of a propagator within one solver run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropId(u32);

/// What a variable currently stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    Free(Var),
    Value(i64),
    /// Bound to something that is not an integer.
    Other,
}

/// Propagator queue ordered by weight, then arrival. A propagator is queued
/// at most once; re-queueing at a lower weight moves it forward.
#[derive(Debug, Clone, Default)]
struct Agenda {
    queue: BTreeSet<(u32, u64, PropId)>,
    queued: FxMap<PropId, (u32, u64)>,
    seq: u64,
}

impl Agenda {
    fn push(&mut self, id: PropId, weight: u32) {
        if let Some(&(w, s)) = self.queued.get(&id) {
            if weight >= w {
                return;
            }
            self.queue.remove(&(w, s, id));
        }
        self.seq += 1;
        self.queue.insert((weight, self.seq, id));
        self.queued.insert(id, (weight, self.seq));
    }

    fn pop(&mut self) -> Option<PropId> {
        let (_, _, id) = self.queue.pop_first()?;
        self.queued.remove(&id);
        Some(id)
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Constraint propagation over one substitution snapshot.
///
/// Domains and constraint lists are pulled lazily from variable attributes
/// the first time a variable is touched; loading a variable also loads every
/// variable connected to it through a stored propagator. [`Solver::solve`]
/// writes the narrowed state back as a new substitution.
///
/// A solver is confined to one goal invocation; cloning it forks the search
/// state for labeling.
#[derive(Debug, Clone)]
pub struct Solver {
    subst: Subst,
    domains: FxMap<Var, Domain>,
    subscribers: FxMap<Var, SmallVec<[PropId; 4]>>,
    props: Vec<Option<Arc<dyn Propagator>>>,
    interned: FxMap<usize, PropId>,
    agenda: Agenda,
}

fn key_of(p: &Arc<dyn Propagator>) -> usize {
    Arc::as_ptr(p) as *const () as usize
}

impl Solver {
    pub fn new(subst: Subst) -> Self {
        Self {
            subst,
            domains: FxMap::default(),
            subscribers: FxMap::default(),
            props: Vec::new(),
            interned: FxMap::default(),
            agenda: Agenda::default(),
        }
    }

    pub fn subst(&self) -> &Subst {
        &self.subst
    }

    pub fn resolve(&self, var: Var) -> Resolved {
        match self.subst.walk(&Term::Var(var)) {
            Term::Var(v) => Resolved::Free(v),
            t => match t.as_int() {
                Some(n) => Resolved::Value(n),
                None => Resolved::Other,
            },
        }
    }

    /// Whether two variables are (aliases of) the same unbound variable.
    pub fn same_var(&self, a: Var, b: Var) -> bool {
        match (self.resolve(a), self.resolve(b)) {
            (Resolved::Free(x), Resolved::Free(y)) => x == y,
            _ => false,
        }
    }

    /// Current domain of `var`. A variable bound to a non-integer has the
    /// empty domain.
    pub fn domain(&mut self, var: Var) -> Domain {
        match self.resolve(var) {
            Resolved::Free(v) => {
                self.ensure_loaded(v);
                self.domains.get(&v).cloned().unwrap_or(Domain::Unbounded)
            }
            Resolved::Value(n) => Domain::singleton(n),
            Resolved::Other => Domain::EMPTY,
        }
    }

    pub fn value(&mut self, var: Var) -> Option<i64> {
        self.domain(var).solution()
    }

    /// Number of propagators currently watching `var`.
    pub fn subscriber_count(&self, var: Var) -> usize {
        match self.resolve(var) {
            Resolved::Free(v) => self.subscribers.get(&v).map_or(0, |s| s.len()),
            _ => 0,
        }
    }

    fn ensure_loaded(&mut self, var: Var) {
        if self.domains.contains_key(&var) {
            return;
        }
        let mut pending: SmallVec<[Var; 8]> = SmallVec::new();
        pending.push(var);

        while let Some(v) = pending.pop() {
            if self.domains.contains_key(&v) {
                continue;
            }
            let domain = self
                .subst
                .get_attr(v, FD_DOMAIN)
                .and_then(|a| a.as_any().downcast_ref::<DomainAttr>())
                .map(|a| a.domain().clone())
                .unwrap_or(Domain::Unbounded);
            self.domains.insert(v, domain);

            let stored = self
                .subst
                .get_attr(v, FD_CONSTRAINTS)
                .and_then(|a| a.as_any().downcast_ref::<ConstraintsAttr>())
                .map(|a| a.propagators().to_vec())
                .unwrap_or_default();
            for p in stored {
                let (id, fresh) = self.intern(p.clone());
                if !fresh {
                    continue;
                }
                for w in p.vars() {
                    if let Resolved::Free(w) = self.resolve(w) {
                        self.add_subscriber(id, w);
                        pending.push(w);
                    }
                }
            }
        }
    }

    fn intern(&mut self, p: Arc<dyn Propagator>) -> (PropId, bool) {
        let key = key_of(&p);
        if let Some(&id) = self.interned.get(&key) {
            return (id, false);
        }
        let id = PropId(self.props.len() as u32);
        self.props.push(Some(p));
        self.interned.insert(key, id);
        (id, true)
    }

    fn add_subscriber(&mut self, id: PropId, var: Var) {
        let subs = self.subscribers.entry(var).or_default();
        if !subs.contains(&id) {
            subs.push(id);
        }
    }

    /// Add a propagator and queue it.
    pub fn post(&mut self, p: Arc<dyn Propagator>) -> PropId {
        let (id, _) = self.intern(p.clone());
        for v in p.vars() {
            self.subscribe(id, v);
        }
        self.enqueue(id);
        id
    }

    fn enqueue(&mut self, id: PropId) {
        if let Some(Some(p)) = self.props.get(id.0 as usize) {
            let weight = p.priority();
            self.agenda.push(id, weight);
        }
    }

    /// Queue every loaded propagator. Aliasing copies constraint lists
    /// between variables without propagating, so a search re-checks them.
    pub fn wake_all(&mut self) {
        for i in 0..self.props.len() {
            self.enqueue(PropId(i as u32));
        }
    }

    pub fn subscribe(&mut self, id: PropId, var: Var) {
        if let Resolved::Free(v) = self.resolve(var) {
            self.ensure_loaded(v);
            self.add_subscriber(id, v);
        }
    }

    /// Watch every listed variable that still has more than one value.
    pub fn resubscribe(&mut self, id: PropId, vars: &[Var]) {
        for &v in vars {
            if !self.domain(v).has_solution() {
                self.subscribe(id, v);
            }
        }
    }

    fn unsubscribe(&mut self, id: PropId) {
        let Some(Some(p)) = self.props.get(id.0 as usize) else {
            return;
        };
        for v in p.vars() {
            if let Resolved::Free(v) = self.resolve(v) {
                if let Some(subs) = self.subscribers.get_mut(&v) {
                    subs.retain(|s| *s != id);
                }
            }
        }
    }

    /// Swap the propagator behind `id` for a specialized equivalent.
    pub fn replace(&mut self, id: PropId, p: Arc<dyn Propagator>) {
        if let Some(slot) = self.props.get_mut(id.0 as usize) {
            if let Some(old) = slot.take() {
                self.interned.remove(&key_of(&old));
            }
            self.interned.insert(key_of(&p), id);
            *slot = Some(p);
        }
    }

    /// Narrow `var` to its intersection with `domain`, waking its watchers
    /// if anything changed. Returns false on an empty result.
    pub fn reduce_domain(&mut self, var: Var, domain: &Domain) -> bool {
        match self.resolve(var) {
            Resolved::Value(n) => domain.contains(n),
            Resolved::Other => false,
            Resolved::Free(v) => {
                let current = self.domain(v);
                let next = current.intersect(domain);
                if next.is_empty() {
                    #[cfg(feature = "tracing")]
                    debug!(var = %v, from = %current, with = %domain, "fd_domain_wipeout");
                    return false;
                }
                if next == current {
                    return true;
                }
                self.domains.insert(v, next);
                self.excite(v);
                true
            }
        }
    }

    fn excite(&mut self, var: Var) {
        let ids = self.subscribers.get(&var).cloned().unwrap_or_default();
        for id in ids {
            self.enqueue(id);
        }
    }

    /// Run queued propagators until none is left. Returns false on a
    /// contradiction.
    pub fn fixpoint(&mut self) -> bool {
        #[cfg(feature = "tracing")]
        let _span = debug_span!("fd_fixpoint", queued = self.agenda.len()).entered();

        while let Some(id) = self.agenda.pop() {
            let Some(Some(p)) = self.props.get(id.0 as usize).cloned() else {
                continue;
            };
            self.unsubscribe(id);
            if !p.propagate(id, self) {
                #[cfg(feature = "tracing")]
                debug!(constraint = %p.to_term(), "fd_contradiction");
                return false;
            }
        }
        true
    }

    pub fn is_quiescent(&self) -> bool {
        self.agenda.len() == 0
    }

    /// Write the solver state back into a substitution.
    ///
    /// Variables narrowed to one value are bound to it; the rest get their
    /// domain and remaining watchers re-attached. `None` if binding a
    /// solved variable is rejected by some other attribute.
    pub fn into_subst(self) -> Option<Subst> {
        let mut subst = self.subst;
        let mut vars: Vec<Var> = self.domains.keys().copied().collect();
        vars.sort_unstable();

        for &v in &vars {
            subst.remove_attr(v, FD_DOMAIN);
            subst.remove_attr(v, FD_CONSTRAINTS);
        }

        let mut solved = Vec::new();
        for &v in &vars {
            let domain = &self.domains[&v];
            if let Some(n) = domain.solution() {
                solved.push((v, n));
                continue;
            }
            if !domain.is_unbounded() {
                subst.set_attr(v, Arc::new(DomainAttr::new(v, domain.clone())));
            }
            let watchers: Vec<Arc<dyn Propagator>> = self
                .subscribers
                .get(&v)
                .into_iter()
                .flatten()
                .filter_map(|id| self.props[id.0 as usize].clone())
                .collect();
            if !watchers.is_empty() {
                subst.set_attr(v, Arc::new(ConstraintsAttr::new(watchers)));
            }
        }

        for (v, n) in solved {
            subst = unify(&Term::Var(v), &Term::int(n), subst)?;
        }
        Some(subst)
    }

    /// Propagate to a fixpoint and write the result back.
    pub fn solve(mut self) -> Option<Subst> {
        if !self.fixpoint() {
            return None;
        }
        self.into_subst()
    }
}

#[cfg(test)]
#[path = "tests/solver.rs"]
mod tests;
