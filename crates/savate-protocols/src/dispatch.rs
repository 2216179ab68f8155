//! Inbound dispatch and outbound routing.

use std::fmt;

use savate_session::now_millis;
use tracing::{debug, warn};

use crate::error::Error;
use crate::message::{Delivery, Envelope, Message};

/// Where an outgoing message goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<P> {
    Unicast(P),
    Broadcast,
}

/// A message a core wants sent. Stamping happens at send time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound<P> {
    pub target: Target<P>,
    pub message: Message,
}

impl<P> Outbound<P> {
    pub fn to(peer: P, message: Message) -> Self {
        Self {
            target: Target::Unicast(peer),
            message,
        }
    }

    pub fn broadcast(message: Message) -> Self {
        debug_assert_eq!(message.kind().delivery(), Delivery::Broadcast);
        Self {
            target: Target::Broadcast,
            message,
        }
    }
}

/// Something that reacts to decoded messages, one at a time.
pub trait Handler<P> {
    fn handle(&mut self, from: &P, envelope: Envelope) -> Vec<Outbound<P>>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub received: u64,
    pub unknown: u64,
    pub malformed: u64,
}

/// Decodes inbound lines and hands them to a [`Handler`].
///
/// Bad frames never reach the handler: unknown types and malformed payloads
/// are logged and dropped. Every received line counts as sync activity.
#[derive(Debug, Default)]
pub struct Dispatcher {
    last_sync: Option<u64>,
    stats: DispatchStats,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_sync(&self) -> Option<u64> {
        self.last_sync
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    /// Decode one line, recording receipt. `None` if it was dropped.
    pub fn receive<P: fmt::Display>(&mut self, from: &P, line: &str) -> Option<Envelope> {
        self.last_sync = Some(now_millis());
        self.stats.received += 1;

        match Envelope::decode(line) {
            Ok(envelope) => {
                debug!(%from, kind = %envelope.message.kind(), "message received");
                Some(envelope)
            }
            Err(Error::UnknownMessageType(kind)) => {
                self.stats.unknown += 1;
                warn!(%from, %kind, "ignoring unknown message type");
                None
            }
            Err(e) => {
                self.stats.malformed += 1;
                warn!(%from, error = %e, "dropping malformed message");
                None
            }
        }
    }

    pub fn dispatch<P, H>(&mut self, handler: &mut H, from: &P, line: &str) -> Vec<Outbound<P>>
    where
        P: fmt::Display,
        H: Handler<P>,
    {
        match self.receive(from, line) {
            Some(envelope) => handler.handle(from, envelope),
            None => Vec::new(),
        }
    }
}
