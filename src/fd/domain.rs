use std::fmt;
use std::sync::Arc;

/// Largest interval that may be expanded into an explicit value set.
pub const MATERIALIZE_LIMIT: u64 = 4096;

/// A set of admissible integers.
///
/// Values are kept canonical: an empty set is always [`Domain::EMPTY`], a
/// contiguous set is always `Bounded`, and `Enumerated` holds at least two
/// sorted, distinct, non-contiguous values. Structural equality is therefore
/// set equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Domain {
    Unbounded,
    Bounded { lb: i64, ub: i64 },
    Enumerated(Arc<[i64]>),
}

impl Domain {
    pub const EMPTY: Domain = Domain::Bounded { lb: 1, ub: 0 };

    /// The closed interval `[lb, ub]`.
    pub fn range(lb: i64, ub: i64) -> Domain {
        if ub < lb {
            Domain::EMPTY
        } else {
            Domain::Bounded { lb, ub }
        }
    }

    pub fn singleton(value: i64) -> Domain {
        Domain::Bounded { lb: value, ub: value }
    }

    /// The set of the given values (any order, duplicates allowed).
    pub fn values(values: impl IntoIterator<Item = i64>) -> Domain {
        let mut v: Vec<i64> = values.into_iter().collect();
        v.sort_unstable();
        v.dedup();
        Self::from_sorted(v)
    }

    fn from_sorted(v: Vec<i64>) -> Domain {
        match (v.first(), v.last()) {
            (None, _) | (_, None) => Domain::EMPTY,
            (Some(&lo), Some(&hi)) => {
                if (hi as i128 - lo as i128 + 1) == v.len() as i128 {
                    Domain::Bounded { lb: lo, ub: hi }
                } else {
                    Domain::Enumerated(v.into())
                }
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Domain::Bounded { lb, ub } if ub < lb)
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, Domain::Unbounded)
    }

    /// Number of values; `None` when unbounded.
    pub fn size(&self) -> Option<u64> {
        match self {
            Domain::Unbounded => None,
            Domain::Bounded { lb, ub } => {
                let n = (*ub as i128 - *lb as i128 + 1).max(0);
                Some(u64::try_from(n).unwrap_or(u64::MAX))
            }
            Domain::Enumerated(v) => Some(v.len() as u64),
        }
    }

    pub fn contains(&self, value: i64) -> bool {
        match self {
            Domain::Unbounded => true,
            Domain::Bounded { lb, ub } => *lb <= value && value <= *ub,
            Domain::Enumerated(v) => v.binary_search(&value).is_ok(),
        }
    }

    /// The only admissible value, if exactly one remains.
    pub fn solution(&self) -> Option<i64> {
        match self {
            Domain::Bounded { lb, ub } if lb == ub => Some(*lb),
            _ => None,
        }
    }

    pub fn has_solution(&self) -> bool {
        self.solution().is_some()
    }

    pub fn min(&self) -> Option<i64> {
        match self {
            Domain::Unbounded => None,
            Domain::Bounded { lb, ub } => (lb <= ub).then_some(*lb),
            Domain::Enumerated(v) => v.first().copied(),
        }
    }

    pub fn max(&self) -> Option<i64> {
        match self {
            Domain::Unbounded => None,
            Domain::Bounded { lb, ub } => (lb <= ub).then_some(*ub),
            Domain::Enumerated(v) => v.last().copied(),
        }
    }

    /// # Panics
    ///
    /// On an unbounded or empty domain.
    pub fn lower_bound(&self) -> i64 {
        match self.min() {
            Some(v) => v,
            None => panic!("lower_bound of {} domain", self),
        }
    }

    /// # Panics
    ///
    /// On an unbounded or empty domain.
    pub fn upper_bound(&self) -> i64 {
        match self.max() {
            Some(v) => v,
            None => panic!("upper_bound of {} domain", self),
        }
    }

    pub fn intersect(&self, other: &Domain) -> Domain {
        match (self, other) {
            (Domain::Unbounded, d) | (d, Domain::Unbounded) => d.clone(),
            (Domain::Bounded { lb: a, ub: b }, Domain::Bounded { lb: c, ub: d }) => {
                Domain::range(*a.max(c), *b.min(d))
            }
            (Domain::Enumerated(v), d) | (d, Domain::Enumerated(v)) => {
                Self::from_sorted(v.iter().copied().filter(|x| d.contains(*x)).collect())
            }
        }
    }

    pub fn is_subset_of(&self, other: &Domain) -> bool {
        if self.is_empty() {
            return true;
        }
        match (self, other) {
            (_, Domain::Unbounded) => true,
            (Domain::Unbounded, _) => false,
            (Domain::Bounded { lb, ub }, Domain::Bounded { lb: c, ub: d }) => c <= lb && ub <= d,
            (Domain::Bounded { lb, ub }, Domain::Enumerated(v)) => {
                self.size().is_some_and(|n| n <= v.len() as u64)
                    && (*lb..=*ub).all(|x| v.binary_search(&x).is_ok())
            }
            (Domain::Enumerated(v), d) => v.iter().all(|x| d.contains(*x)),
        }
    }

    /// Split into two disjoint, non-empty halves whose union is `self`.
    ///
    /// # Panics
    ///
    /// If the domain is unbounded or has fewer than two values.
    pub fn bisect(&self) -> (Domain, Domain) {
        match self {
            Domain::Bounded { lb, ub } if lb < ub => {
                let mid = (*lb as i128 + (*ub as i128 - *lb as i128) / 2) as i64;
                (Domain::range(*lb, mid), Domain::range(mid + 1, *ub))
            }
            Domain::Enumerated(v) => {
                let (left, right) = v.split_at(v.len() / 2);
                (Self::from_sorted(left.to_vec()), Self::from_sorted(right.to_vec()))
            }
            _ => panic!("bisect of {} domain: need at least two values", self),
        }
    }

    /// Remove one value. Holes in very large intervals are not represented,
    /// in which case the domain is returned unchanged.
    pub fn remove(&self, value: i64) -> Domain {
        if !self.contains(value) {
            return self.clone();
        }
        match self {
            Domain::Unbounded => Domain::Unbounded,
            Domain::Bounded { lb, ub } => {
                if value == *lb {
                    Domain::range(lb + 1, *ub)
                } else if value == *ub {
                    Domain::range(*lb, ub - 1)
                } else if self.size().is_some_and(|n| n <= MATERIALIZE_LIMIT) {
                    Self::from_sorted((*lb..=*ub).filter(|x| *x != value).collect())
                } else {
                    self.clone()
                }
            }
            Domain::Enumerated(v) => {
                Self::from_sorted(v.iter().copied().filter(|x| *x != value).collect())
            }
        }
    }

    /// Interval from bounds computed in wider arithmetic. Only the part
    /// that fits in an `i64` is kept.
    pub fn range_i128(lb: i128, ub: i128) -> Domain {
        if ub < lb || ub < i64::MIN as i128 || lb > i64::MAX as i128 {
            return Domain::EMPTY;
        }
        let clamp = |v: i128| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64;
        Domain::range(clamp(lb), clamp(ub))
    }

    /// `{sign * x + c | x in self}` for `sign` of 1 or -1, dropping results
    /// that overflow.
    fn affine(&self, sign: i128, c: i64) -> Domain {
        let map = |x: i64| sign * x as i128 + c as i128;
        match self {
            Domain::Unbounded => Domain::Unbounded,
            Domain::Bounded { lb, ub } if lb <= ub => {
                let (a, b) = (map(*lb), map(*ub));
                Self::range_i128(a.min(b), a.max(b))
            }
            Domain::Bounded { .. } => Domain::EMPTY,
            Domain::Enumerated(v) => {
                Self::values(v.iter().filter_map(|x| i64::try_from(map(*x)).ok()))
            }
        }
    }

    /// `{x + c | x in self}`
    pub fn shift(&self, c: i64) -> Domain {
        self.affine(1, c)
    }

    /// `{-x | x in self}`
    pub fn negate(&self) -> Domain {
        self.affine(-1, 0)
    }

    /// `{c - x | x in self}`
    pub fn subtract_from(&self, c: i64) -> Domain {
        self.affine(-1, c)
    }

    /// `{c * x | x in self}`, exact for small domains and bounded otherwise.
    pub fn scale(&self, c: i64) -> Domain {
        if self.is_empty() {
            return Domain::EMPTY;
        }
        match (c, self) {
            (0, _) => Domain::singleton(0),
            (1, d) => d.clone(),
            (-1, d) => d.negate(),
            (_, Domain::Unbounded) => Domain::Unbounded,
            (_, Domain::Bounded { lb, ub }) => {
                if self.size().is_some_and(|n| n <= MATERIALIZE_LIMIT) {
                    Self::values((*lb..=*ub).filter_map(|x| x.checked_mul(c)))
                } else {
                    let a = *lb as i128 * c as i128;
                    let b = *ub as i128 * c as i128;
                    Self::range_i128(a.min(b), a.max(b))
                }
            }
            (_, Domain::Enumerated(v)) => Self::values(v.iter().filter_map(|x| x.checked_mul(c))),
        }
    }

    /// `{x | c * x in self}`
    pub fn divide_exact(&self, c: i64) -> Domain {
        if c == 0 {
            return if self.contains(0) {
                Domain::Unbounded
            } else {
                Domain::EMPTY
            };
        }
        match self {
            Domain::Unbounded => Domain::Unbounded,
            Domain::Bounded { lb, ub } if lb <= ub => {
                let (lb, ub, c) = (*lb as i128, *ub as i128, c as i128);
                if c > 0 {
                    Self::range_i128(div_ceil(lb, c), div_floor(ub, c))
                } else {
                    Self::range_i128(div_ceil(ub, c), div_floor(lb, c))
                }
            }
            Domain::Bounded { .. } => Domain::EMPTY,
            Domain::Enumerated(v) => Self::values(
                v.iter()
                    .filter(|x| x.checked_rem(c) == Some(0))
                    .filter_map(|x| x.checked_div(c)),
            ),
        }
    }

    /// Values in ascending order.
    ///
    /// # Panics
    ///
    /// On an unbounded domain.
    pub fn iter(&self) -> Iter<'_> {
        match self {
            Domain::Unbounded => panic!("cannot enumerate an unbounded domain"),
            Domain::Bounded { lb, ub } => Iter::Range(*lb..=*ub),
            Domain::Enumerated(v) => Iter::Slice(v.iter()),
        }
    }
}

pub enum Iter<'a> {
    Range(std::ops::RangeInclusive<i64>),
    Slice(std::slice::Iter<'a, i64>),
}

impl Iterator for Iter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        match self {
            Iter::Range(r) => r.next(),
            Iter::Slice(s) => s.next().copied(),
        }
    }
}

fn div_floor(a: i128, b: i128) -> i128 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) != (b < 0)) {
        q - 1
    } else {
        q
    }
}

fn div_ceil(a: i128, b: i128) -> i128 {
    let q = a / b;
    if (a % b != 0) && ((a < 0) == (b < 0)) {
        q + 1
    } else {
        q
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Unbounded => f.write_str("unbounded"),
            d if d.is_empty() => f.write_str("empty"),
            Domain::Bounded { lb, ub } => write!(f, "{}..{}", lb, ub),
            Domain::Enumerated(v) => {
                f.write_str("{")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", x)?;
                }
                f.write_str("}")
            }
        }
    }
}
