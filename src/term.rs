use smallvec::{smallvec, SmallVec};
use std::collections::VecDeque;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A logic variable.
///
/// Variables are plain indices handed out by [`crate::subst::Subst::fresh_var`].
/// Two variables are the same variable exactly when their indices match, so a
/// `Var` is only meaningful relative to the substitution lineage it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

impl Var {
    pub(crate) fn new(index: u32) -> Self {
        Var(index)
    }

    /// Get the raw index (allocation order).
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_{}", self.0)
    }
}

/// An atomic value. Opaque to unification apart from equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Atom {
    Int(i64),
    Str(Arc<str>),
    Bool(bool),
}

/// A term is the empty list, an atom, a variable, or a pair.
///
/// Pairs chain into (possibly improper) lists terminated by [`Term::Nil`].
/// Equality and hashing are structural and iterative along both the list
/// spine and nested heads, so very long lists never exhaust the call stack.
#[derive(Clone)]
pub enum Term {
    Nil,
    Atom(Atom),
    Var(Var),
    Pair(Arc<Pair>),
}

/// An immutable cons cell.
pub struct Pair {
    head: Term,
    tail: Term,
}

impl Pair {
    pub fn head(&self) -> &Term {
        &self.head
    }

    pub fn tail(&self) -> &Term {
        &self.tail
    }
}

impl Drop for Pair {
    // Unlink the spine one cell at a time; the default recursive drop
    // overflows the stack on long lists.
    fn drop(&mut self) {
        let mut tail = std::mem::replace(&mut self.tail, Term::Nil);
        while let Term::Pair(next) = tail {
            match Arc::try_unwrap(next) {
                Ok(mut pair) => tail = std::mem::replace(&mut pair.tail, Term::Nil),
                Err(_) => break,
            }
        }
    }
}

impl Term {
    pub fn nil() -> Term {
        Term::Nil
    }

    pub fn int(value: i64) -> Term {
        Term::Atom(Atom::Int(value))
    }

    pub fn str(value: &str) -> Term {
        Term::Atom(Atom::Str(Arc::from(value)))
    }

    pub fn bool(value: bool) -> Term {
        Term::Atom(Atom::Bool(value))
    }

    pub fn cons(head: impl Into<Term>, tail: impl Into<Term>) -> Term {
        Term::Pair(Arc::new(Pair {
            head: head.into(),
            tail: tail.into(),
        }))
    }

    /// Build a proper list from the given items.
    pub fn list<T: Into<Term>>(items: impl IntoIterator<Item = T>) -> Term {
        let mut builder = ListBuilder::new();
        for item in items {
            builder.push(item);
        }
        builder.build()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Term::Nil)
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Term::Var(_))
    }

    pub fn as_var(&self) -> Option<Var> {
        match self {
            Term::Var(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Term::Atom(Atom::Int(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn as_pair(&self) -> Option<(&Term, &Term)> {
        match self {
            Term::Pair(p) => Some((&p.head, &p.tail)),
            _ => None,
        }
    }

    /// Shallow identity: same variable, equal atoms, or the very same pair
    /// cell. Never descends into pairs.
    pub fn same(&self, other: &Term) -> bool {
        match (self, other) {
            (Term::Nil, Term::Nil) => true,
            (Term::Atom(a), Term::Atom(b)) => a == b,
            (Term::Var(a), Term::Var(b)) => a == b,
            (Term::Pair(a), Term::Pair(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Collect the elements of a proper list.
    pub fn to_vec(&self) -> Result<Vec<Term>, String> {
        let mut out = Vec::new();
        let mut current = self;
        loop {
            match current {
                Term::Nil => return Ok(out),
                Term::Pair(p) => {
                    out.push(p.head.clone());
                    current = &p.tail;
                }
                other => return Err(format!("improper list tail: {}", other)),
            }
        }
    }

    /// Variables occurring in the term, in first-occurrence order.
    pub fn vars(&self) -> Vec<Var> {
        let mut out = Vec::new();
        let mut stack: SmallVec<[&Term; 16]> = smallvec![self];
        while let Some(t) = stack.pop() {
            match t {
                Term::Var(v) => {
                    if !out.contains(v) {
                        out.push(*v);
                    }
                }
                Term::Pair(p) => {
                    stack.push(&p.tail);
                    stack.push(&p.head);
                }
                Term::Nil | Term::Atom(_) => {}
            }
        }
        out
    }
}

impl PartialEq for Term {
    fn eq(&self, other: &Self) -> bool {
        let mut stack: SmallVec<[(&Term, &Term); 16]> = smallvec![(self, other)];
        while let Some((a, b)) = stack.pop() {
            match (a, b) {
                (Term::Pair(p), Term::Pair(q)) => {
                    if Arc::ptr_eq(p, q) {
                        continue;
                    }
                    stack.push((&p.tail, &q.tail));
                    stack.push((&p.head, &q.head));
                }
                _ => {
                    if !a.same(b) {
                        return false;
                    }
                }
            }
        }
        true
    }
}

impl Eq for Term {}

impl Hash for Term {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let mut stack: SmallVec<[&Term; 16]> = smallvec![self];
        while let Some(t) = stack.pop() {
            match t {
                Term::Nil => state.write_u8(0),
                Term::Atom(a) => {
                    state.write_u8(1);
                    a.hash(state);
                }
                Term::Var(v) => {
                    state.write_u8(2);
                    v.hash(state);
                }
                Term::Pair(p) => {
                    state.write_u8(3);
                    stack.push(&p.tail);
                    stack.push(&p.head);
                }
            }
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Int(n) => write!(f, "{}", n),
            Atom::Str(s) => write!(f, "{:?}", s),
            Atom::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Nil => f.write_str("[]"),
            Term::Atom(a) => write!(f, "{}", a),
            Term::Var(v) => write!(f, "{}", v),
            Term::Pair(p) => {
                write!(f, "[{}", p.head)?;
                let mut tail = &p.tail;
                loop {
                    match tail {
                        Term::Nil => break,
                        Term::Pair(next) => {
                            write!(f, ", {}", next.head)?;
                            tail = &next.tail;
                        }
                        other => {
                            write!(f, " | {}", other)?;
                            break;
                        }
                    }
                }
                f.write_str("]")
            }
        }
    }
}

impl fmt::Debug for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl From<Var> for Term {
    fn from(v: Var) -> Self {
        Term::Var(v)
    }
}

impl From<&Var> for Term {
    fn from(v: &Var) -> Self {
        Term::Var(*v)
    }
}

impl From<Atom> for Term {
    fn from(a: Atom) -> Self {
        Term::Atom(a)
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::int(n)
    }
}

impl From<i32> for Term {
    fn from(n: i32) -> Self {
        Term::int(i64::from(n))
    }
}

impl From<bool> for Term {
    fn from(b: bool) -> Self {
        Term::bool(b)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::str(s)
    }
}

impl From<&Term> for Term {
    fn from(t: &Term) -> Self {
        t.clone()
    }
}

/// Builder for lists with O(1) push at either end.
///
/// Items stay private to the builder until [`ListBuilder::build`] links them
/// into immutable pairs, so no partially built cell is ever observable.
#[derive(Debug, Default)]
pub struct ListBuilder {
    items: VecDeque<Term>,
}

impl ListBuilder {
    pub fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    /// Append an item at the end.
    pub fn push(&mut self, item: impl Into<Term>) {
        self.items.push_back(item.into());
    }

    /// Prepend an item at the front.
    pub fn push_front(&mut self, item: impl Into<Term>) {
        self.items.push_front(item.into());
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Publish a proper (nil-terminated) list.
    pub fn build(self) -> Term {
        self.build_with_tail(Term::Nil)
    }

    /// Publish a list ending in `tail` (improper unless `tail` is a list).
    pub fn build_with_tail(self, tail: impl Into<Term>) -> Term {
        self.items
            .into_iter()
            .rev()
            .fold(tail.into(), |acc, head| Term::cons(head, acc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(t: &Term) -> u64 {
        let mut h = DefaultHasher::new();
        t.hash(&mut h);
        h.finish()
    }

    #[test]
    fn list_builds_proper_list() {
        let t = Term::list([1, 2, 3]);
        assert_eq!(t.to_vec().unwrap(), vec![Term::int(1), Term::int(2), Term::int(3)]);
        assert_eq!(t.to_string(), "[1, 2, 3]");
    }

    #[test]
    fn empty_list_is_nil() {
        let t = Term::list(Vec::<Term>::new());
        assert!(t.is_nil());
        assert_eq!(t.to_string(), "[]");
    }

    #[test]
    fn improper_list_displays_tail() {
        let v = Var::new(4);
        let t = Term::cons(1, Term::cons(2, v));
        assert_eq!(t.to_string(), "[1, 2 | _4]");
        assert!(t.to_vec().is_err());
    }

    #[test]
    fn builder_push_front_and_back() {
        let mut b = ListBuilder::new();
        b.push(2);
        b.push(3);
        b.push_front(1);
        assert_eq!(b.len(), 3);
        assert_eq!(b.build(), Term::list([1, 2, 3]));
    }

    #[test]
    fn builder_with_tail() {
        let v = Var::new(0);
        let mut b = ListBuilder::new();
        b.push("a");
        let t = b.build_with_tail(v);
        assert_eq!(t, Term::cons("a", v));
    }

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = Term::list([Term::list([1, 2]), Term::str("x")]);
        let b = Term::list([Term::list([1, 2]), Term::str("x")]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        assert!(!a.same(&b), "distinct cells are not shallowly identical");
    }

    #[test]
    fn different_shapes_are_unequal() {
        assert_ne!(Term::list([1, 2]), Term::list([1, 2, 3]));
        assert_ne!(Term::int(1), Term::str("1"));
        assert_ne!(Term::Nil, Term::int(0));
        assert_ne!(Term::Var(Var::new(0)), Term::Var(Var::new(1)));
    }

    #[test]
    fn vars_in_first_occurrence_order() {
        let x = Var::new(3);
        let y = Var::new(1);
        let t = Term::list([Term::from(x), Term::list([Term::from(y), Term::from(x)])]);
        assert_eq!(t.vars(), vec![x, y]);
    }

    #[test]
    fn long_list_eq_hash_and_drop() {
        let n = 200_000;
        let a = Term::list(0..n as i64);
        let b = Term::list(0..n as i64);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
        drop(a);
        drop(b);
    }

    #[test]
    fn string_atoms_display_quoted() {
        assert_eq!(Term::str("World").to_string(), "\"World\"");
        assert_eq!(Term::bool(true).to_string(), "true");
    }
}
