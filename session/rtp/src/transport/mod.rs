use std::{io, net::SocketAddr, sync::Arc};

use futures::future::BoxFuture;
use tokio_util::bytes::Bytes;

pub mod mem;
pub mod udp;

mod dispatch;

/// Receives inbound datagrams for one bound channel. Transports call this
/// from one worker task per remote origin: datagrams from a single origin
/// arrive in order, while different origins may be handled concurrently,
/// so implementations must be safe to enter from several tasks at once.
pub trait DatagramHandler: Send + Sync {
    fn on_datagram(&self, origin: SocketAddr, datagram: Bytes);
}

/// One bound endpoint. `send` is best-effort and non-blocking; a failure
/// is the caller's to log, never a reason to tear the session down.
pub trait DatagramChannel: Send + Sync {
    fn local_addr(&self) -> SocketAddr;
    fn send(&self, datagram: Bytes, remote: SocketAddr) -> io::Result<()>;
    /// Stops the read task. Idempotent.
    fn close(&self);
}

/// The socket layer the session engine runs on. The engine only ever sees
/// this trait; concrete transports own the I/O reactor.
pub trait DatagramTransport: Send + Sync {
    fn bind(
        &self,
        local: SocketAddr,
        handler: Arc<dyn DatagramHandler>,
    ) -> BoxFuture<'_, io::Result<Arc<dyn DatagramChannel>>>;
}
