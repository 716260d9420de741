use crate::pipeline::channel::OutputWiring;
use crate::printer::Printer;
use crate::sequencer::reorder::{FlushTimer, ReorderBuffer};
use std::io::Write;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Sent by a timer task back into the output loop when its delay elapses
#[derive(Debug)]
struct Expired {
    request_id: String,
    seq: u64,
}

/// Run the output loop.
///
/// Consumes batches from the fetch loop, reorders them per request through a
/// [`ReorderBuffer`], and prints them as their timers expire. All table
/// state lives in this one task: timer tasks only post [`Expired`] messages
/// back into it.
///
/// Returns the printer when the die signal fires (buffered logs are
/// dropped) or once the batch channel has closed and every buffered log
/// has been printed.
pub async fn run_output_loop<W: Write>(
    wiring: OutputWiring,
    sort_buffer: Duration,
    mut printer: Printer<W>,
) -> Printer<W> {
    let OutputWiring { mut batch_rx, die } = wiring;
    let (timer_tx, mut timer_rx) = mpsc::unbounded_channel::<Expired>();
    let mut buffer = ReorderBuffer::new(sort_buffer);
    let mut fetching = true;

    loop {
        tokio::select! {
            biased;

            _ = die.cancelled() => {
                debug!(
                    buffered = buffer.buffered_count(),
                    requests = buffer.pending_requests(),
                    "Output loop stopping, dropping buffered logs"
                );
                return printer;
            }

            batch = batch_rx.recv(), if fetching => match batch {
                Some(batch) => {
                    trace!(batch_id = %batch.id, logs = batch.logs.len(), "Buffering batch");
                    for timer in buffer.push_batch(batch, Instant::now()) {
                        arm_timer(timer, &timer_tx, &die);
                    }
                }
                None => {
                    debug!(
                        buffered = buffer.buffered_count(),
                        "Batch channel closed, draining buffered logs"
                    );
                    fetching = false;
                }
            },

            Some(expired) = timer_rx.recv() => {
                let (logs, next) = buffer.expire(&expired.request_id, expired.seq, Instant::now());
                trace!(
                    request_id = %expired.request_id,
                    seq = expired.seq,
                    flushed = logs.len(),
                    "Flush timer expired"
                );
                printer.print(&logs);
                if let Some(timer) = next {
                    arm_timer(timer, &timer_tx, &die);
                }
            }
        }

        if !fetching && buffer.is_empty() {
            debug!("Output drained");
            return printer;
        }
    }
}

/// Spawn a task that sleeps for the timer's delay and then notifies the
/// output loop. The task never touches the table itself.
fn arm_timer(timer: FlushTimer, tx: &mpsc::UnboundedSender<Expired>, die: &CancellationToken) {
    let tx = tx.clone();
    let die = die.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = die.cancelled() => {}
            _ = tokio::time::sleep(timer.delay) => {
                // Loop gone means we're shutting down
                let _ = tx.send(Expired {
                    request_id: timer.request_id,
                    seq: timer.seq,
                });
            }
        }
    });
}
