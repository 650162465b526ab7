//! TCP tap: downstream consumers connect, send one subscription line,
//! then receive length-prefixed payloads.
//!
//! Subscription lines: `firehose` or `app:<app-id>`.
//!
//! The connection's read side is watched after subscribing; EOF or a read
//! error unsubscribes the consumer immediately.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, instrument, warn};

use contracts::{AppId, ConsumerSink, ContractError, Envelope};

use crate::fanout::StreamFanout;

const SUBSCRIBE_TIMEOUT: Duration = Duration::from_secs(5);

/// What a tap connection asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Firehose,
    App(AppId),
}

impl Subscription {
    /// Parse a subscription line (surrounding whitespace ignored)
    pub fn parse(line: &str) -> Result<Self, ContractError> {
        let line = line.trim();
        if line == "firehose" {
            return Ok(Self::Firehose);
        }
        match line.strip_prefix("app:") {
            Some(app_id) if !app_id.is_empty() => Ok(Self::App(AppId::from(app_id))),
            _ => Err(ContractError::Other(format!("invalid subscription line '{line}'"))),
        }
    }
}

/// Consumer sink writing `u32` big-endian length + payload frames
pub struct TcpConsumerSink {
    name: String,
    stream: OwnedWriteHalf,
}

impl TcpConsumerSink {
    pub fn new(peer: SocketAddr, stream: OwnedWriteHalf) -> Self {
        Self {
            name: format!("tap-{peer}"),
            stream,
        }
    }
}

impl ConsumerSink for TcpConsumerSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
        let len = u32::try_from(envelope.payload.len())
            .map_err(|_| ContractError::Other("payload exceeds frame limit".into()))?;
        self.stream.write_u32(len).await?;
        self.stream.write_all(&envelope.payload).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.stream.shutdown().await?;
        Ok(())
    }
}

/// Accept tap connections until `shutdown` resolves
#[instrument(name = "stream_tap_serve", skip_all)]
pub async fn serve_tap(
    listener: TcpListener,
    fanout: Arc<StreamFanout>,
    shutdown: impl Future<Output = ()>,
) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "stream tap listening");
    }
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let fanout = Arc::clone(&fanout);
                    tokio::spawn(async move {
                        if let Err(e) = attach(stream, peer, &fanout).await {
                            warn!(peer = %peer, error = %e, "tap subscription rejected");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "tap accept failed"),
            },
        }
    }

    info!("stream tap stopped");
}

async fn attach(stream: TcpStream, peer: SocketAddr, fanout: &StreamFanout) -> Result<(), ContractError> {
    let (read_half, write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    let read = tokio::time::timeout(SUBSCRIBE_TIMEOUT, reader.read_line(&mut line))
        .await
        .map_err(|_| ContractError::Other("no subscription line before timeout".into()))??;
    if read == 0 {
        return Err(ContractError::Other("connection closed before subscribing".into()));
    }

    let subscription = Subscription::parse(&line)?;
    let sink = TcpConsumerSink::new(peer, write_half);
    let id = match &subscription {
        Subscription::Firehose => fanout.subscribe_firehose(sink),
        Subscription::App(app_id) => fanout.subscribe_app(app_id.clone(), sink),
    };
    debug!(peer = %peer, consumer = %id, subscription = ?subscription, "tap consumer attached");

    wait_for_disconnect(&mut reader).await;
    if fanout.unsubscribe(id).await {
        info!(peer = %peer, consumer = %id, "tap consumer disconnected");
    }
    Ok(())
}

/// Read and discard until EOF or error
async fn wait_for_disconnect<R: AsyncRead + Unpin>(reader: &mut R) {
    let mut buf = [0u8; 512];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StreamHealthRegistry;
    use contracts::StreamHealthSnapshot;
    use tokio::sync::oneshot;
    use tokio::time::sleep;

    #[test]
    fn test_parse_subscription() {
        assert_eq!(Subscription::parse("firehose\n").unwrap(), Subscription::Firehose);
        assert_eq!(
            Subscription::parse("app:billing\r\n").unwrap(),
            Subscription::App(AppId::from("billing"))
        );
        assert!(Subscription::parse("app:").is_err());
        assert!(Subscription::parse("everything").is_err());
    }

    async fn wait_for_subscribers(fanout: &StreamFanout, n: usize) {
        for _ in 0..100 {
            if fanout.subscriber_count() == n {
                return;
            }
            sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {n} subscribers, have {}", fanout.subscriber_count());
    }

    #[tokio::test]
    async fn test_tap_delivers_framed_payloads() {
        let fanout = Arc::new(StreamFanout::new(Arc::new(StreamHealthRegistry::new()), 8));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_tap(listener, fanout.clone(), async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"app:billing\n").await.unwrap();
        wait_for_subscribers(&fanout, 1).await;
        assert_eq!(fanout.registry().snapshot().app_count, 1);

        fanout.publish(&Envelope::for_app("other", &b"skip"[..]));
        fanout.publish(&Envelope::for_app("billing", &b"invoice"[..]));

        let len = client.read_u32().await.unwrap() as usize;
        let mut buf = vec![0u8; len];
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, b"invoice");

        let _ = stop_tx.send(());
        server.await.unwrap();
        fanout.shutdown().await;
    }

    #[tokio::test]
    async fn test_bad_subscription_is_not_registered() {
        let fanout = Arc::new(StreamFanout::new(Arc::new(StreamHealthRegistry::new()), 8));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_tap(listener, fanout.clone(), async move {
            let _ = stop_rx.await;
        }));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"everything please\n").await.unwrap();
        sleep(Duration::from_millis(50)).await;

        assert_eq!(fanout.subscriber_count(), 0);
        assert_eq!(fanout.registry().len(), 0);

        let _ = stop_tx.send(());
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_disconnect_unregisters_without_traffic() {
        let fanout = Arc::new(StreamFanout::new(Arc::new(StreamHealthRegistry::new()), 8));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let server = tokio::spawn(serve_tap(listener, fanout.clone(), async move {
            let _ = stop_rx.await;
        }));

        let mut app = TcpStream::connect(addr).await.unwrap();
        app.write_all(b"app:billing\n").await.unwrap();
        let mut firehose = TcpStream::connect(addr).await.unwrap();
        firehose.write_all(b"firehose\n").await.unwrap();
        wait_for_subscribers(&fanout, 2).await;
        assert_eq!(
            fanout.registry().snapshot(),
            StreamHealthSnapshot {
                firehose_count: 1,
                app_count: 1,
                slow_count: 0
            }
        );

        drop(app);
        drop(firehose);
        wait_for_subscribers(&fanout, 0).await;
        assert_eq!(fanout.registry().snapshot(), StreamHealthSnapshot::default());

        let _ = stop_tx.send(());
        server.await.unwrap();
    }
}
