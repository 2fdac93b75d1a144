//! The protocol adapter and request loop
//!
//! One `tokio::select!` loop owns the dispatcher and processes exactly one
//! client record to completion before accepting the next. Control events
//! (wire STOP/CLEAR records and Unix signals) travel through the same loop
//! as ordinary messages, so nothing ever mutates queue state concurrently
//! with a request.
//!
//! Clients whose jobs have to wait keep their connection parked here; the
//! release path that later starts the job sends the deferred assignment
//! record down that connection.

use anyhow::Context as _;
use devlb_net::{recv_record, send_record, Message, Record};
use devlb_sched::{AssignOutcome, ClientId, Dispatcher, KernelFeatures, ResourceAlloc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::{UnixListener, UnixStream};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, info, warn};

/// How long a freshly accepted connection gets to produce its record
const READ_TIMEOUT: Duration = Duration::from_secs(5);

enum Flow {
    Continue,
    Stop,
}

enum Event {
    Accepted(std::io::Result<UnixStream>),
    Exit(&'static str),
    Clear,
}

/// The daemon's request loop and connection bookkeeping
pub struct Server {
    dispatcher: Dispatcher,
    listener: UnixListener,
    socket_path: PathBuf,
    /// Parked connections of clients whose jobs are waiting for a device
    pending: HashMap<ClientId, UnixStream>,
    server_id: ClientId,
    requests_served: u64,
}

impl Server {
    /// Bind the daemon socket
    ///
    /// A leftover socket file from a previous run is removed first. Failure
    /// to bind is fatal: the daemon must not start half-initialized.
    pub fn bind(socket_path: &Path, dispatcher: Dispatcher) -> anyhow::Result<Self> {
        if let Err(e) = std::fs::remove_file(socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                return Err(e).with_context(|| {
                    format!("removing stale socket {}", socket_path.display())
                });
            }
        }
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("binding control socket {}", socket_path.display()))?;
        Ok(Self {
            dispatcher,
            listener,
            socket_path: socket_path.to_path_buf(),
            pending: HashMap::new(),
            server_id: ClientId::new(std::process::id()),
            requests_served: 0,
        })
    }

    /// Serve requests until a stop record or an exit signal arrives
    pub async fn run(&mut self) -> anyhow::Result<()> {
        let mut term = signal(SignalKind::terminate()).context("installing SIGTERM handler")?;
        let mut int = signal(SignalKind::interrupt()).context("installing SIGINT handler")?;
        let mut hup = signal(SignalKind::hangup()).context("installing SIGHUP handler")?;

        info!(socket = %self.socket_path.display(), "serving requests");
        loop {
            // Signals become loop events here, never handler-side mutation:
            // the borrow of the listener ends with the select expression, so
            // every handler below runs with exclusive access to the queues.
            let event = tokio::select! {
                accepted = self.listener.accept() => {
                    Event::Accepted(accepted.map(|(stream, _)| stream))
                }
                _ = term.recv() => Event::Exit("exit signal received"),
                _ = int.recv() => Event::Exit("interrupt received"),
                _ = hup.recv() => Event::Clear,
            };
            match event {
                Event::Accepted(Ok(stream)) => {
                    if matches!(self.serve(stream).await, Flow::Stop) {
                        break;
                    }
                }
                Event::Accepted(Err(e)) => warn!(error = %e, "accept failed"),
                Event::Exit(reason) => {
                    info!("{reason}");
                    break;
                }
                Event::Clear => {
                    info!("clear signal received");
                    self.clear();
                }
            }
        }
        self.report_stats();
        Ok(())
    }

    /// Read and handle one record from a fresh connection
    async fn serve(&mut self, mut stream: UnixStream) -> Flow {
        let record = match tokio::time::timeout(READ_TIMEOUT, recv_record(&mut stream)).await {
            Ok(Ok(record)) => record,
            Ok(Err(e)) => {
                warn!(error = %e, "rejecting malformed request");
                return Flow::Continue;
            }
            Err(_) => {
                warn!("connection produced no record in time");
                return Flow::Continue;
            }
        };
        self.requests_served += 1;

        let client = record.sender;
        match record.message {
            Message::Request(features) => self.handle_request(stream, client, features).await,
            Message::Notify(alloc) => self.handle_notify(stream, client, alloc).await,
            Message::Finish => self.handle_finish(client).await,
            Message::GetQueueSizes => {
                let sizes = self.dispatcher.queue_sizes();
                self.reply(&mut stream, Message::QueueSizes(sizes)).await;
            }
            Message::ClearQueues => {
                debug!(%client, "clear requested");
                self.clear();
            }
            Message::Stop => {
                info!(%client, "stop requested");
                return Flow::Stop;
            }
            Message::Assign(_) | Message::QueueSizes(_) => {
                warn!(%client, "client sent a server-only message type");
            }
        }
        Flow::Continue
    }

    async fn handle_request(
        &mut self,
        mut stream: UnixStream,
        client: ClientId,
        features: KernelFeatures,
    ) {
        match self.dispatcher.assign(client, features) {
            Ok(AssignOutcome::Started(alloc)) => {
                self.reply(&mut stream, Message::Assign(alloc)).await;
            }
            Ok(AssignOutcome::Queued) => {
                // The reply waits until a freed queue picks the job up.
                if self.pending.insert(client, stream).is_some() {
                    warn!(%client, "replaced a parked connection for the same client");
                }
            }
            // Dropping the connection unanswered is the rejection: the
            // protocol has no error record.
            Err(e) => warn!(%client, error = %e, "assignment rejected"),
        }
    }

    async fn handle_notify(&mut self, mut stream: UnixStream, client: ClientId, alloc: ResourceAlloc) {
        match self.dispatcher.notify(client, alloc) {
            Ok(granted) => self.reply(&mut stream, Message::Assign(granted)).await,
            Err(e) => warn!(%client, error = %e, "notification rejected"),
        }
    }

    async fn handle_finish(&mut self, client: ClientId) {
        match self.dispatcher.release(client) {
            Ok(Some(started)) => match self.pending.remove(&started.client) {
                Some(mut parked) => {
                    self.reply(&mut parked, Message::Assign(started.alloc)).await;
                }
                None => warn!(client = %started.client, "dispatched job has no parked connection"),
            },
            Ok(None) => {}
            Err(e) => warn!(%client, error = %e, "release failed"),
        }
    }

    /// Drop all queue state and the parked connections tied to it
    ///
    /// Dropping a parked connection closes it, so the waiting client
    /// observes EOF instead of hanging forever.
    fn clear(&mut self) {
        for client in self.dispatcher.clear() {
            self.pending.remove(&client);
        }
    }

    async fn reply(&self, stream: &mut UnixStream, message: Message) {
        let record = Record::new(self.server_id, message);
        if let Err(e) = send_record(stream, &record).await {
            warn!(error = %e, "failed to send reply");
        }
    }

    fn report_stats(&self) {
        let stats = self.dispatcher.stats();
        info!(
            requests = self.requests_served,
            notifies = stats.notifies,
            assigns = stats.assigns,
            releases = stats.releases,
            queue_queries = stats.queue_queries,
            clears = stats.clears,
            assign_time_us = stats.assign_time.as_micros() as u64,
            release_time_us = stats.release_time.as_micros() as u64,
            "serving statistics"
        );
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.socket_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(socket = %self.socket_path.display(), error = %e, "failed to remove socket");
            }
        }
    }
}
