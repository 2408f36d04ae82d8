use std::{io, net::SocketAddr, sync::Arc};

use futures::future::BoxFuture;
use tokio::net::UdpSocket;
use tokio_util::{bytes::Bytes, sync::CancellationToken};

use super::{DatagramChannel, DatagramHandler, DatagramTransport, dispatch::OriginDispatcher};

const RECV_BUFFER_SIZE: usize = 4096;
const DISPATCH_QUEUE_CAPACITY: usize = 1000;

/// Plain tokio UDP. Each bind spawns one read task that feeds the
/// per-origin dispatcher; handler work for distinct remote peers runs on
/// their own worker tasks.
#[derive(Debug, Default, Clone, Copy)]
pub struct UdpTransport;

impl DatagramTransport for UdpTransport {
    fn bind(
        &self,
        local: SocketAddr,
        handler: Arc<dyn DatagramHandler>,
    ) -> BoxFuture<'_, io::Result<Arc<dyn DatagramChannel>>> {
        Box::pin(async move {
            let socket = Arc::new(UdpSocket::bind(local).await?);
            let local_addr = socket.local_addr()?;
            let token = CancellationToken::new();
            let dispatcher =
                OriginDispatcher::new(handler, DISPATCH_QUEUE_CAPACITY, token.child_token());

            let read_socket = socket.clone();
            let read_token = token.clone();
            tokio::spawn(async move {
                let mut buffer = vec![0_u8; RECV_BUFFER_SIZE];
                loop {
                    tokio::select! {
                        _ = read_token.cancelled() => break,
                        received = read_socket.recv_from(&mut buffer) => match received {
                            Ok((length, origin)) => {
                                dispatcher.dispatch(origin, Bytes::copy_from_slice(&buffer[..length]));
                            }
                            Err(err) => {
                                tracing::warn!("udp receive on {} failed: {}", local_addr, err);
                            }
                        }
                    }
                }
                tracing::debug!("udp read task for {} stopped", local_addr);
            });

            Ok(Arc::new(UdpChannel {
                socket,
                local_addr,
                token,
            }) as Arc<dyn DatagramChannel>)
        })
    }
}

struct UdpChannel {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    token: CancellationToken,
}

impl DatagramChannel for UdpChannel {
    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn send(&self, datagram: Bytes, remote: SocketAddr) -> io::Result<()> {
        self.socket.try_send_to(&datagram, remote).map(|_| ())
    }

    fn close(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod test {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        datagrams: Mutex<Vec<(SocketAddr, Bytes)>>,
    }

    impl DatagramHandler for Recorder {
        fn on_datagram(&self, origin: SocketAddr, datagram: Bytes) {
            self.datagrams.lock().unwrap().push((origin, datagram));
        }
    }

    #[tokio::test]
    async fn test_loopback_datagram_exchange() {
        let transport = UdpTransport;
        let left_recorder = Arc::new(Recorder::default());
        let right_recorder = Arc::new(Recorder::default());

        let left = transport
            .bind("127.0.0.1:0".parse().unwrap(), left_recorder.clone())
            .await
            .unwrap();
        let right = transport
            .bind("127.0.0.1:0".parse().unwrap(), right_recorder.clone())
            .await
            .unwrap();

        left.send(Bytes::from_static(b"ping"), right.local_addr())
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let received = right_recorder.datagrams.lock().unwrap().clone();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, left.local_addr());
        assert_eq!(received[0].1.as_ref(), b"ping");

        right.close();
    }
}
