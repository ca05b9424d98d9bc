//! Command implementations.

mod run;
mod simulate;
mod validate;

pub use run::run_node;
pub use simulate::run_simulation;
pub use validate::run_validate;
