//! Lazy solution streams.
//!
//! A [`Series`] is the search space of a goal: a possibly infinite sequence
//! whose tail is produced on demand. Suspensions keep recursion off the call
//! stack, and pending nodes stand for branches being computed on another
//! thread.

use crate::executor;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

const HELP_POLL: Duration = Duration::from_millis(1);

type Thunk<T> = Box<dyn FnOnce() -> Series<T> + Send>;

/// Continuation applied to every element by [`Series::append_map_inf`].
pub type Bind<T> = Arc<dyn Fn(T) -> Series<T> + Send + Sync>;

pub enum Series<T> {
    Empty,
    Cons(T, Box<Series<T>>),
    Suspend(Thunk<T>),
    Pending(Pending<T>),
}

/// A series being computed asynchronously, plus the work still to be done
/// once it arrives.
pub struct Pending<T> {
    rx: Receiver<Series<T>>,
    then: Box<dyn FnOnce(Series<T>) -> Series<T> + Send>,
}

impl<T: Send + 'static> Pending<T> {
    pub fn new(rx: Receiver<Series<T>>) -> Self {
        Self {
            rx,
            then: Box::new(|s| s),
        }
    }

    /// Block until the branch has produced its series.
    ///
    /// On a pool worker the wait runs other queued jobs instead of parking,
    /// since the branch may be queued behind this very call.
    ///
    /// # Panics
    ///
    /// If the producing job died without sending a result (it panicked).
    pub fn wait(self) -> Series<T> {
        let received = if executor::on_worker() {
            loop {
                match self.rx.try_recv() {
                    Ok(series) => break Some(series),
                    Err(TryRecvError::Disconnected) => break None,
                    Err(TryRecvError::Empty) => {
                        if !executor::help_one() {
                            match self.rx.recv_timeout(HELP_POLL) {
                                Ok(series) => break Some(series),
                                Err(RecvTimeoutError::Disconnected) => break None,
                                Err(RecvTimeoutError::Timeout) => {}
                            }
                        }
                    }
                }
            }
        } else {
            self.rx.recv().ok()
        };
        match received {
            Some(series) => (self.then)(series),
            None => panic!("parallel branch terminated without producing a result"),
        }
    }

    fn map(self, f: impl FnOnce(Series<T>) -> Series<T> + Send + 'static) -> Self {
        let then = self.then;
        Self {
            rx: self.rx,
            then: Box::new(move |s| f(then(s))),
        }
    }

    /// Merge two pending branches; the left one is awaited first.
    fn join(self, other: Pending<T>) -> Self {
        self.map(move |s| s.append_inf(Series::Pending(other)))
    }
}

impl<T: Send + 'static> Series<T> {
    pub fn unit(value: T) -> Self {
        Series::Cons(value, Box::new(Series::Empty))
    }

    pub fn suspend(f: impl FnOnce() -> Series<T> + Send + 'static) -> Self {
        Series::Suspend(Box::new(f))
    }

    pub fn from_option(value: Option<T>) -> Self {
        match value {
            Some(v) => Series::unit(v),
            None => Series::Empty,
        }
    }

    /// Fair interleaving of two series.
    ///
    /// A suspended left side swaps places with the right side, so neither
    /// branch can starve the other.
    pub fn append_inf(self, other: Series<T>) -> Series<T> {
        match self {
            Series::Empty => other,
            Series::Cons(head, tail) => Series::Cons(
                head,
                Box::new(Series::suspend(move || tail.append_inf(other))),
            ),
            Series::Suspend(f) => Series::suspend(move || other.append_inf(f())),
            Series::Pending(p) => match other {
                Series::Pending(q) => Series::Pending(p.join(q)),
                Series::Empty => Series::Pending(p),
                ready => Series::Pending(p.map(move |s| s.append_inf(ready))),
            },
        }
    }

    /// Feed every element through `f` and interleave the results.
    pub fn append_map_inf(self, f: Bind<T>) -> Series<T> {
        match self {
            Series::Empty => Series::Empty,
            Series::Cons(head, tail) => {
                let first = f(head);
                first.append_inf(Series::suspend(move || tail.append_map_inf(f)))
            }
            Series::Suspend(thunk) => Series::suspend(move || thunk().append_map_inf(f)),
            Series::Pending(p) => Series::Pending(p.map(move |s| s.append_map_inf(f))),
        }
    }

    /// Force suspensions until the head is empty, a value, or pending.
    pub fn force_ready(self) -> Series<T> {
        let mut current = self;
        loop {
            match current {
                Series::Suspend(f) => current = f(),
                other => return other,
            }
        }
    }

    /// Force suspensions and wait on pending nodes until the head is either
    /// empty or a value. Diverges on a series that never yields.
    pub fn force_deep(self) -> Series<T> {
        let mut current = self;
        loop {
            match current {
                Series::Suspend(f) => current = f(),
                Series::Pending(p) => current = p.wait(),
                other => return other,
            }
        }
    }

    /// First element, if any.
    pub fn first(self) -> Option<T> {
        match self.force_deep() {
            Series::Cons(head, _) => Some(head),
            _ => None,
        }
    }

    /// Realize at most `n` elements.
    pub fn take(self, n: usize) -> Vec<T> {
        self.into_iter().take(n).collect()
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Series::Empty)
    }
}

impl<T: Send + 'static> IntoIterator for Series<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> IntoIter<T> {
        IntoIter { rest: Some(self) }
    }
}

/// Pulls elements out of a series, forcing as needed.
pub struct IntoIter<T> {
    rest: Option<Series<T>>,
}

impl<T: Send + 'static> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        match self.rest.take()?.force_deep() {
            Series::Cons(head, tail) => {
                self.rest = Some(*tail);
                Some(head)
            }
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for Series<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Series::Empty => f.write_str("Empty"),
            Series::Cons(..) => f.write_str("Cons(..)"),
            Series::Suspend(_) => f.write_str("Suspend(..)"),
            Series::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

#[cfg(test)]
#[path = "tests/stream.rs"]
mod tests;
