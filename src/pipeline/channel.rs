use crate::logs::Batch;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub type Sender<T> = mpsc::Sender<T>;
pub type Receiver<T> = mpsc::Receiver<T>;

/// Default capacity of the batch channel between the fetch and output loops
pub const DEFAULT_BATCH_BUFFER: usize = 32;

/// Create a bounded channel with the specified buffer size
pub fn create_channel<T>(buffer_size: usize) -> (Sender<T>, Receiver<T>) {
    mpsc::channel(buffer_size)
}

/// Wiring shared by the fetch loop and the output loop.
///
/// Owns the batch channel and the die signal. The orchestrator keeps a
/// clone of the die signal and hands each loop its half via [`split`].
/// The batch channel closing (the fetcher dropped its sender) is the
/// completion signal.
///
/// [`split`]: TailContext::split
pub struct TailContext {
    die: CancellationToken,
    fetch: FetchWiring,
    output: OutputWiring,
}

/// The fetch loop's half: where batches go, and when to stop
pub struct FetchWiring {
    pub batch_tx: Sender<Batch>,
    pub die: CancellationToken,
}

/// The output loop's half
pub struct OutputWiring {
    pub batch_rx: Receiver<Batch>,
    pub die: CancellationToken,
}

impl TailContext {
    pub fn new(buffer_size: usize) -> Self {
        let die = CancellationToken::new();
        let (batch_tx, batch_rx) = create_channel(buffer_size);
        Self {
            fetch: FetchWiring {
                batch_tx,
                die: die.clone(),
            },
            output: OutputWiring {
                batch_rx,
                die: die.clone(),
            },
            die,
        }
    }

    pub fn die(&self) -> &CancellationToken {
        &self.die
    }

    pub fn split(self) -> (FetchWiring, OutputWiring) {
        (self.fetch, self.output)
    }
}

impl Default for TailContext {
    fn default() -> Self {
        Self::new(DEFAULT_BATCH_BUFFER)
    }
}
