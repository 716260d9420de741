pub mod output;
pub mod reorder;

pub use output::run_output_loop;
pub use reorder::{FlushTimer, ReorderBuffer};
