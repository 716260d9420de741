pub mod cli;
pub mod config;
pub mod fetch;
pub mod logs;
pub mod pipeline;
pub mod printer;
pub mod sequencer;
