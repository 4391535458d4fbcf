//! Finite-domain constraints over integers.
//!
//! Domains and constraint lists ride on variables as attributes, so they
//! survive unification and backtracking like any other binding. Every FD
//! goal builds a [`Solver`] over the current substitution, propagates to a
//! fixpoint, and writes the narrowed state back.

pub mod attr;
pub mod domain;
pub mod goals;
pub mod label;
pub mod propagators;
pub mod solver;

pub use attr::{ConstraintsAttr, DomainAttr};
pub use domain::{Domain, MATERIALIZE_LIMIT};
pub use goals::{distinct, dom, in_range, in_set, minus, neq, plus, times, Operand};
pub use label::{label, label_all};
pub use propagators::{Propagator, TABLE_THRESHOLD};
pub use solver::{PropId, Solver};

/// Attribute key of a variable's domain.
pub const FD_DOMAIN: &str = "fd";

/// Attribute key of the propagators watching a variable.
pub const FD_CONSTRAINTS: &str = "fda";
