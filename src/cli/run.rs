use crate::config::types::TailConfig;
use crate::fetch::client::{ClientError, LogStreamClient};
use crate::fetch::fetcher::{FetchError, Fetcher};
use crate::pipeline::channel::{TailContext, DEFAULT_BATCH_BUFFER};
use crate::printer::Printer;
use crate::sequencer::output::run_output_loop;
use std::future::pending;
use std::io::{self, Write};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("unable to write output: {0}")]
    Output(#[from] io::Error),
}

/// Tail logs to stdout until the `to` bound is reached, a fatal error
/// occurs, or the process receives SIGINT, SIGTERM or SIGHUP.
pub async fn run(config: TailConfig) -> Result<(), RunError> {
    if config.verbose {
        println!("Service ID: {}", config.service_id);
    }
    enable_managed_logging(&config, &mut io::stdout()).await?;
    info!(service_id = %config.service_id, "Tailing logs");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let signal_task = tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handlers");
                // Keep the sender alive so the run isn't mistaken as shut down
                pending::<()>().await;
            }
        }
    });

    let printer = Printer::new(io::stdout(), config.stream, config.timestamps);
    let result = run_tail(&config, printer, Some(shutdown_rx)).await;
    signal_task.abort();

    result.map(|_| ())
}

/// Turn on managed logging for the service before tailing it. A service
/// that already has it on is fine.
pub async fn enable_managed_logging<W: Write>(
    config: &TailConfig,
    out: &mut W,
) -> Result<(), RunError> {
    let client = LogStreamClient::new(config)?;
    let newly_enabled = client.enable_managed_logging().await?;
    info!(service_id = %config.service_id, newly_enabled, "Managed logging enabled");

    writeln!(out, "Managed logging enabled on service {}\n", config.service_id)?;
    Ok(())
}

/// Wire the fetch loop and the output loop together and run them to
/// completion.
///
/// * a fatal fetch error fires the die signal and is returned
/// * a shutdown request fires the die signal; buffered logs are dropped
/// * natural completion (the `to` bound) lets the output loop drain first
///
/// Returns the printer so callers can get at what was written.
pub async fn run_tail<W>(
    config: &TailConfig,
    printer: Printer<W>,
    shutdown_rx: Option<watch::Receiver<bool>>,
) -> Result<Printer<W>, RunError>
where
    W: Write + Send + 'static,
{
    let client = LogStreamClient::new(config)?;
    debug!(url = %client.base_url(), "Created log stream client");

    let ctx = TailContext::new(DEFAULT_BATCH_BUFFER);
    let die = ctx.die().clone();
    let (fetch_wiring, output_wiring) = ctx.split();

    let mut output_handle = tokio::spawn(run_output_loop(
        output_wiring,
        config.sort_buffer,
        printer,
    ));
    let mut fetch_handle = tokio::spawn(Fetcher::new(client, config, fetch_wiring).run());
    let mut fetch_done = false;

    let shutdown = wait_for_shutdown(shutdown_rx);
    tokio::pin!(shutdown);

    tokio::select! {
        result = &mut fetch_handle => {
            fetch_done = true;
            match result {
                Ok(Ok(())) => info!("Fetch loop finished, draining buffered logs"),
                Ok(Err(e)) => {
                    error!(error = %e, "Fetch loop failed");
                    die.cancel();
                    let _ = output_handle.await;
                    return Err(e.into());
                }
                Err(e) => {
                    die.cancel();
                    let _ = output_handle.await;
                    return Err(e.into());
                }
            }
        }
        _ = &mut shutdown => {
            info!("Shutdown signal received");
            die.cancel();
        }
    }

    let printer = tokio::select! {
        result = &mut output_handle => result?,
        _ = &mut shutdown, if !die.is_cancelled() => {
            info!("Shutdown signal received while draining");
            die.cancel();
            (&mut output_handle).await?
        }
    };

    if !fetch_done {
        // Cancelled: the fetch loop exits at its next suspension point
        if let Ok(Err(e)) = fetch_handle.await {
            debug!(error = %e, "Fetch loop error after shutdown");
        }
    }

    info!("Tail complete");
    Ok(printer)
}

/// Resolves once a shutdown has been requested. Without a receiver (or once
/// the sender is gone) it never resolves.
async fn wait_for_shutdown(shutdown_rx: Option<watch::Receiver<bool>>) {
    if let Some(mut rx) = shutdown_rx {
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
    pending::<()>().await;
}

#[cfg(unix)]
async fn wait_for_signal() -> io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    let mut hangup = signal(SignalKind::hangup())?;

    tokio::select! {
        _ = interrupt.recv() => debug!("Received SIGINT"),
        _ = terminate.recv() => debug!("Received SIGTERM"),
        _ = hangup.recv() => debug!("Received SIGHUP"),
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
