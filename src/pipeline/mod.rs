pub mod channel;

pub use channel::{create_channel, FetchWiring, OutputWiring, Receiver, Sender, TailContext};
