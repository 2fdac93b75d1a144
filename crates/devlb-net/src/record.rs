//! Record layout and codec
//!
//! Every message occupies exactly [`RECORD_SIZE`] bytes: a sender id, a
//! type tag, and a body sized for the largest payload variant (the kernel
//! feature vector), zero-padded for the smaller ones. All fields are
//! little-endian.

use crate::{Error, Result};
use bytes::{Buf, BufMut, BytesMut};
use devlb_sched::{ClientId, KernelFeatures, ResourceAlloc, MAX_QUEUES, NUM_FEATURES};

/// Record type identifiers
pub mod msg_type {
    /// Resource request carrying kernel features (client to daemon)
    pub const REQUEST: u32 = 0;
    /// Advisory notification of a client-chosen allocation
    pub const NOTIFY: u32 = 1;
    /// Resource assignment (daemon to client only)
    pub const ASSIGN: u32 = 2;
    /// Kernel completed
    pub const FINISH: u32 = 3;
    /// Queue-occupancy query
    pub const GET_QUEUE_SIZES: u32 = 4;
    /// Queue-occupancy reply (daemon to client only)
    pub const RETURN_QUEUE_SIZES: u32 = 5;
    /// Drop every running and waiting job
    pub const CLEAR_QUEUES: u32 = 6;
    /// Shut the daemon down
    pub const STOP: u32 = 7;
}

/// Body size in bytes: the feature-vector payload is the largest variant
const BODY_SIZE: usize = 4 + NUM_FEATURES * 8;

/// Exact size of every record on the wire
pub const RECORD_SIZE: usize = 8 + BODY_SIZE;

/// Type-dependent message payload
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Request a device for the described kernel
    Request(KernelFeatures),
    /// Inform the daemon of a placement the client already made
    Notify(ResourceAlloc),
    /// Grant an allocation (daemon to client)
    Assign(ResourceAlloc),
    /// The client's kernel finished running
    Finish,
    /// Ask for per-queue running-job counts
    GetQueueSizes,
    /// Per-queue running-job counts, `-1` for unconfigured slots
    QueueSizes([i32; MAX_QUEUES]),
    /// Drop all queue state
    ClearQueues,
    /// Stop the daemon
    Stop,
}

impl Message {
    /// Wire type tag for this message
    #[must_use]
    pub const fn tag(&self) -> u32 {
        match self {
            Self::Request(_) => msg_type::REQUEST,
            Self::Notify(_) => msg_type::NOTIFY,
            Self::Assign(_) => msg_type::ASSIGN,
            Self::Finish => msg_type::FINISH,
            Self::GetQueueSizes => msg_type::GET_QUEUE_SIZES,
            Self::QueueSizes(_) => msg_type::RETURN_QUEUE_SIZES,
            Self::ClearQueues => msg_type::CLEAR_QUEUES,
            Self::Stop => msg_type::STOP,
        }
    }
}

/// One wire record: sender plus message
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Process identifier of the sending side
    pub sender: ClientId,
    /// Message payload
    pub message: Message,
}

impl Record {
    /// Create a record
    #[must_use]
    pub const fn new(sender: ClientId, message: Message) -> Self {
        Self { sender, message }
    }

    /// Encode to exactly [`RECORD_SIZE`] bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        let start = buf.len();
        buf.reserve(RECORD_SIZE);
        buf.put_u32_le(self.sender.get());
        buf.put_u32_le(self.message.tag());

        match &self.message {
            Message::Request(features) => {
                buf.put_u32_le(features.kernel);
                for value in &features.values {
                    buf.put_f64_le(*value);
                }
            }
            Message::Notify(alloc) | Message::Assign(alloc) => {
                put_alloc(buf, alloc);
            }
            Message::QueueSizes(sizes) => {
                for size in sizes {
                    buf.put_i32_le(*size);
                }
            }
            Message::Finish | Message::GetQueueSizes | Message::ClearQueues | Message::Stop => {}
        }

        // Pad every variant out to the fixed record size.
        buf.resize(start + RECORD_SIZE, 0);
    }

    /// Decode from exactly one record's worth of bytes
    pub fn decode(mut buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_SIZE {
            return Err(Error::Protocol(format!(
                "short record: {} of {} bytes",
                buf.len(),
                RECORD_SIZE
            )));
        }

        let sender = ClientId::new(buf.get_u32_le());
        let tag = buf.get_u32_le();

        let message = match tag {
            msg_type::REQUEST => {
                let kernel = buf.get_u32_le();
                let mut values = [0.0; NUM_FEATURES];
                for value in &mut values {
                    *value = buf.get_f64_le();
                }
                Message::Request(KernelFeatures::new(kernel, values))
            }
            msg_type::NOTIFY => Message::Notify(get_alloc(&mut buf)),
            msg_type::ASSIGN => Message::Assign(get_alloc(&mut buf)),
            msg_type::FINISH => Message::Finish,
            msg_type::GET_QUEUE_SIZES => Message::GetQueueSizes,
            msg_type::RETURN_QUEUE_SIZES => {
                let mut sizes = [0i32; MAX_QUEUES];
                for size in &mut sizes {
                    *size = buf.get_i32_le();
                }
                Message::QueueSizes(sizes)
            }
            msg_type::CLEAR_QUEUES => Message::ClearQueues,
            msg_type::STOP => Message::Stop,
            other => {
                return Err(Error::Protocol(format!("unknown message type {other}")));
            }
        };

        Ok(Self { sender, message })
    }
}

fn put_alloc(buf: &mut BytesMut, alloc: &ResourceAlloc) {
    buf.put_u8(alloc.platform);
    buf.put_u8(alloc.device);
    buf.put_u16_le(alloc.compute_units);
}

fn get_alloc(buf: &mut &[u8]) -> ResourceAlloc {
    let platform = buf.get_u8();
    let device = buf.get_u8();
    let compute_units = buf.get_u16_le();
    ResourceAlloc::new(platform, device, compute_units)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(record: Record) -> Record {
        let mut buf = BytesMut::new();
        record.encode(&mut buf);
        assert_eq!(buf.len(), RECORD_SIZE);
        Record::decode(&buf).unwrap()
    }

    #[test]
    fn record_size_is_fixed() {
        assert_eq!(RECORD_SIZE, 140);
    }

    #[test]
    fn request_roundtrip() {
        let mut values = [0.0; NUM_FEATURES];
        for (i, value) in values.iter_mut().enumerate() {
            *value = i as f64 * 1.5;
        }
        let record = Record::new(
            ClientId::new(4321),
            Message::Request(KernelFeatures::new(7, values)),
        );
        assert_eq!(roundtrip(record.clone()), record);
    }

    #[test]
    fn alloc_roundtrips() {
        let alloc = ResourceAlloc::new(1, 0, 14);
        for message in [Message::Notify(alloc), Message::Assign(alloc)] {
            let record = Record::new(ClientId::new(9), message);
            assert_eq!(roundtrip(record.clone()), record);
        }
    }

    #[test]
    fn queue_sizes_roundtrip() {
        let mut sizes = [-1i32; MAX_QUEUES];
        sizes[0] = 3;
        sizes[1] = 0;
        let record = Record::new(ClientId::new(1), Message::QueueSizes(sizes));
        assert_eq!(roundtrip(record.clone()), record);
    }

    #[test]
    fn bodyless_messages_roundtrip() {
        for message in [
            Message::Finish,
            Message::GetQueueSizes,
            Message::ClearQueues,
            Message::Stop,
        ] {
            let record = Record::new(ClientId::new(2), message);
            assert_eq!(roundtrip(record.clone()), record);
        }
    }

    #[test]
    fn short_buffer_is_protocol_error() {
        let record = Record::new(ClientId::new(1), Message::Finish);
        let mut buf = BytesMut::new();
        record.encode(&mut buf);

        let err = Record::decode(&buf[..RECORD_SIZE - 1]).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn unknown_tag_is_protocol_error() {
        let mut buf = BytesMut::new();
        buf.put_u32_le(1);
        buf.put_u32_le(99);
        buf.resize(RECORD_SIZE, 0);

        let err = Record::decode(&buf).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn every_variant_encodes_to_record_size() {
        let alloc = ResourceAlloc::new(0, 0, 12);
        let messages = [
            Message::Request(KernelFeatures::default()),
            Message::Notify(alloc),
            Message::Assign(alloc),
            Message::Finish,
            Message::GetQueueSizes,
            Message::QueueSizes([-1; MAX_QUEUES]),
            Message::ClearQueues,
            Message::Stop,
        ];
        for message in messages {
            let mut buf = BytesMut::new();
            Record::new(ClientId::new(1), message).encode(&mut buf);
            assert_eq!(buf.len(), RECORD_SIZE);
        }
    }
}
