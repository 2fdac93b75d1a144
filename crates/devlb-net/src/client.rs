//! Client-side calls against the daemon socket
//!
//! Each call opens a fresh connection, sends one record, and (for calls
//! that expect one) awaits one reply record; the daemon closes the
//! connection afterwards. A `request` blocks until the assignment record
//! arrives, which may be long after submission when the job has to wait
//! for a device.

use crate::record::{Message, Record};
use crate::transport::{recv_record, send_record};
use crate::{Error, Result};
use devlb_sched::{ClientId, KernelFeatures, ResourceAlloc, MAX_QUEUES};
use std::path::PathBuf;
use tokio::net::UnixStream;

/// Handle for talking to a devlb daemon
#[derive(Debug, Clone)]
pub struct Client {
    socket: PathBuf,
    id: ClientId,
}

impl Client {
    /// Client for the daemon at `socket`, identified by this process's id
    #[must_use]
    pub fn new(socket: impl Into<PathBuf>) -> Self {
        Self::with_id(socket, ClientId::new(std::process::id()))
    }

    /// Client with an explicit id (tests, or one id per worker)
    #[must_use]
    pub fn with_id(socket: impl Into<PathBuf>, id: ClientId) -> Self {
        Self {
            socket: socket.into(),
            id,
        }
    }

    /// The id this client stamps on outgoing records
    #[must_use]
    pub const fn id(&self) -> ClientId {
        self.id
    }

    /// Request a device for the described kernel
    ///
    /// Resolves once the daemon grants an allocation, immediately or after
    /// queueing. The granted device may differ from the best-predicted one.
    pub async fn request(&self, features: KernelFeatures) -> Result<ResourceAlloc> {
        let mut stream = self.send(Message::Request(features)).await?;
        self.expect_assign(&mut stream).await
    }

    /// Tell the daemon about a placement this client already made
    ///
    /// The daemon acknowledges by echoing the allocation back.
    pub async fn notify(&self, alloc: ResourceAlloc) -> Result<ResourceAlloc> {
        let mut stream = self.send(Message::Notify(alloc)).await?;
        self.expect_assign(&mut stream).await
    }

    /// Report that this client's kernel finished running
    pub async fn finish(&self) -> Result<()> {
        self.send(Message::Finish).await?;
        Ok(())
    }

    /// Fetch per-queue running-job counts (`-1` marks unconfigured slots)
    pub async fn queue_sizes(&self) -> Result<[i32; MAX_QUEUES]> {
        let mut stream = self.send(Message::GetQueueSizes).await?;
        let record = recv_record(&mut stream).await?;
        match record.message {
            Message::QueueSizes(sizes) => Ok(sizes),
            other => Err(Error::Protocol(format!(
                "expected queue sizes, got message type {}",
                other.tag()
            ))),
        }
    }

    /// Drop all daemon queue state (test/recovery use only)
    pub async fn clear_queues(&self) -> Result<()> {
        self.send(Message::ClearQueues).await?;
        Ok(())
    }

    /// Ask the daemon to shut down
    pub async fn stop(&self) -> Result<()> {
        self.send(Message::Stop).await?;
        Ok(())
    }

    async fn send(&self, message: Message) -> Result<UnixStream> {
        let mut stream = UnixStream::connect(&self.socket).await?;
        send_record(&mut stream, &Record::new(self.id, message)).await?;
        Ok(stream)
    }

    async fn expect_assign(&self, stream: &mut UnixStream) -> Result<ResourceAlloc> {
        let record = recv_record(stream).await?;
        match record.message {
            Message::Assign(alloc) => Ok(alloc),
            other => Err(Error::Protocol(format!(
                "expected assignment, got message type {}",
                other.tag()
            ))),
        }
    }
}
