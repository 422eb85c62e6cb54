use std::future::Future;
use std::pin::Pin;

use site_api::Record;

use crate::error::TransportError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The client side of a live connection, as seen by a topic session.
///
/// Implemented by the WebSocket layer; tests use in-memory channels.
pub trait Transport: Send {
    /// Write one record as one message.
    fn send<'a>(&'a mut self, record: &'a Record) -> BoxFuture<'a, Result<(), TransportError>>;

    /// Resolve once the peer is gone (close frame, read error, EOF).
    ///
    /// Inbound messages carry no meaning and are discarded. Must be safe to
    /// drop and call again.
    fn closed(&mut self) -> BoxFuture<'_, ()>;

    /// Best-effort close of the connection.
    fn close(&mut self) -> BoxFuture<'_, ()>;
}
