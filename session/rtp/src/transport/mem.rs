use std::{
    collections::HashMap,
    io,
    net::SocketAddr,
    sync::{Arc, RwLock},
};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tokio_util::{bytes::Bytes, sync::CancellationToken};

use super::{DatagramChannel, DatagramHandler, DatagramTransport, dispatch::OriginDispatcher};
use crate::sync::{read_lock, write_lock};

type Datagram = (SocketAddr, Bytes);

/// In-process datagram fabric: every endpoint bound through one transport
/// instance can reach every other by address. Used by the tests and for
/// wiring sessions together without sockets.
#[derive(Clone)]
pub struct MemoryTransport {
    endpoints: Arc<RwLock<HashMap<SocketAddr, mpsc::Sender<Datagram>>>>,
    capacity: usize,
}

impl MemoryTransport {
    /// `capacity` bounds each endpoint's inbound queue and each
    /// per-origin dispatch queue, standing in for a socket's receive
    /// buffer.
    pub fn new(capacity: usize) -> Self {
        Self {
            endpoints: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }
}

impl DatagramTransport for MemoryTransport {
    fn bind(
        &self,
        local: SocketAddr,
        handler: Arc<dyn DatagramHandler>,
    ) -> BoxFuture<'_, io::Result<Arc<dyn DatagramChannel>>> {
        Box::pin(async move {
            let (sender, mut receiver) = mpsc::channel::<Datagram>(self.capacity);
            {
                let mut endpoints = write_lock(&self.endpoints);
                if endpoints.contains_key(&local) {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrInUse,
                        format!("{} already bound", local),
                    ));
                }
                endpoints.insert(local, sender);
            }

            let token = CancellationToken::new();
            let dispatcher = OriginDispatcher::new(handler, self.capacity, token.child_token());
            tokio::spawn(async move {
                while let Some((origin, datagram)) = receiver.recv().await {
                    dispatcher.dispatch(origin, datagram);
                }
                tracing::debug!("memory channel read task for {} stopped", local);
            });

            Ok(Arc::new(MemoryChannel {
                local_addr: local,
                endpoints: self.endpoints.clone(),
                token,
            }) as Arc<dyn DatagramChannel>)
        })
    }
}

struct MemoryChannel {
    local_addr: SocketAddr,
    endpoints: Arc<RwLock<HashMap<SocketAddr, mpsc::Sender<Datagram>>>>,
    token: CancellationToken,
}

impl DatagramChannel for MemoryChannel {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send(&self, datagram: Bytes, remote: SocketAddr) -> io::Result<()> {
        let Some(sender) = read_lock(&self.endpoints).get(&remote).cloned() else {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no endpoint bound on {}", remote),
            ));
        };
        sender
            .try_send((self.local_addr, datagram))
            .map_err(|_| io::Error::other(format!("endpoint {} not accepting datagrams", remote)))
    }

    fn close(&self) {
        write_lock(&self.endpoints).remove(&self.local_addr);
        self.token.cancel();
    }
}
