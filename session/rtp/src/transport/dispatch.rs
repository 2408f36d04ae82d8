use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{Arc, Mutex},
};

use tokio::sync::mpsc;
use tokio_util::{bytes::Bytes, sync::CancellationToken};

use super::DatagramHandler;
use crate::sync::lock_mutex;

/// Fans a socket's inbound datagrams out to one queue per remote origin.
///
/// Each origin gets its own worker task, so datagrams from a single
/// origin reach the handler in arrival order while different origins are
/// processed concurrently. Queues are bounded; overflow drops the
/// datagram, which is the same promise the network makes.
pub(crate) struct OriginDispatcher {
    handler: Arc<dyn DatagramHandler>,
    queues: Mutex<HashMap<SocketAddr, mpsc::Sender<Bytes>>>,
    queue_capacity: usize,
    token: CancellationToken,
}

impl OriginDispatcher {
    pub(crate) fn new(
        handler: Arc<dyn DatagramHandler>,
        queue_capacity: usize,
        token: CancellationToken,
    ) -> Self {
        Self {
            handler,
            queues: Mutex::new(HashMap::new()),
            queue_capacity: queue_capacity.max(1),
            token,
        }
    }

    pub(crate) fn dispatch(&self, origin: SocketAddr, datagram: Bytes) {
        if self.token.is_cancelled() {
            return;
        }
        let sender = {
            let mut queues = lock_mutex(&self.queues);
            match queues.get(&origin) {
                Some(sender) if !sender.is_closed() => sender.clone(),
                _ => {
                    let (sender, receiver) = mpsc::channel(self.queue_capacity);
                    queues.insert(origin, sender.clone());
                    self.spawn_worker(origin, receiver);
                    sender
                }
            }
        };
        if sender.try_send(datagram).is_err() {
            tracing::warn!("dispatch queue for {} full, dropping datagram", origin);
        }
    }

    fn spawn_worker(&self, origin: SocketAddr, mut receiver: mpsc::Receiver<Bytes>) {
        let handler = self.handler.clone();
        let token = self.token.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    datagram = receiver.recv() => match datagram {
                        Some(datagram) => handler.on_datagram(origin, datagram),
                        None => break,
                    }
                }
            }
            tracing::debug!("dispatch worker for {} stopped", origin);
        });
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(SocketAddr, Bytes)>>);

    impl DatagramHandler for Recorder {
        fn on_datagram(&self, origin: SocketAddr, datagram: Bytes) {
            self.0.lock().unwrap().push((origin, datagram));
        }
    }

    #[tokio::test]
    async fn test_per_origin_order_is_preserved() {
        let recorder = Arc::new(Recorder::default());
        let dispatcher = OriginDispatcher::new(recorder.clone(), 64, CancellationToken::new());
        let left: SocketAddr = "10.0.0.1:1000".parse().unwrap();
        let right: SocketAddr = "10.0.0.2:2000".parse().unwrap();

        for index in 0..8_u8 {
            let origin = if index % 2 == 0 { left } else { right };
            dispatcher.dispatch(origin, Bytes::copy_from_slice(&[index]));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;

        let received = recorder.0.lock().unwrap().clone();
        assert_eq!(received.len(), 8);
        let of_origin = |origin: SocketAddr| -> Vec<u8> {
            received
                .iter()
                .filter(|(from, _)| *from == origin)
                .map(|(_, datagram)| datagram[0])
                .collect()
        };
        // interleaving across origins is free, order within one is not
        assert_eq!(of_origin(left), vec![0, 2, 4, 6]);
        assert_eq!(of_origin(right), vec![1, 3, 5, 7]);
    }

    #[tokio::test]
    async fn test_cancelled_dispatcher_drops_datagrams() {
        let recorder = Arc::new(Recorder::default());
        let token = CancellationToken::new();
        let dispatcher = OriginDispatcher::new(recorder.clone(), 64, token.clone());
        let origin: SocketAddr = "10.0.0.1:1000".parse().unwrap();

        token.cancel();
        dispatcher.dispatch(origin, Bytes::from_static(&[1]));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(recorder.0.lock().unwrap().is_empty());
    }
}
