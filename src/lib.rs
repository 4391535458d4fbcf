pub mod engine;
pub mod executor;
pub mod fd;
pub mod goal;
pub mod lists;
pub mod stream;
pub mod subst;
pub mod term;
pub mod trace;
pub mod unify;

pub use engine::{run, run_first, run_n, run_with_constraints, Answer, Engine, QueryConfig};
pub use goal::Goal;
pub use subst::Subst;
pub use term::{Term, Var};

#[cfg(test)]
pub(crate) mod test_utils;
