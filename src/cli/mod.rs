pub mod args;
pub mod run;

pub use args::TailArgs;
pub use run::{enable_managed_logging, run, run_tail, RunError};
