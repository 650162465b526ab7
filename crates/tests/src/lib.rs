//! # Integration Tests
//!
//! 跨 crate 的端到端测试，全部运行在回环地址上。
//!
//! 覆盖：
//! - 配置文本到运行中的引擎，经真实 UDP/TCP 传输
//! - 对不可达目标的有界重试
//! - 带卡住消费者的 fan-out，通过 `GET /health` 观察

#[cfg(test)]
mod forwarding_tests {
    use std::net::SocketAddr;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::ForwardOutcome;
    use forwarder::ForwarderBuilder;
    use tokio::io::AsyncReadExt;
    use tokio::net::{TcpListener, UdpSocket};

    fn config_for(transport: &str, destinations: &[SocketAddr], retry: bool) -> String {
        let list = destinations
            .iter()
            .map(|d| format!("\"{d}\""))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"
[forwarder]
name = "doppler"
transport = "{transport}"
destinations = [{list}]

[forwarder.retry]
enabled = {retry}
max_attempts = 3
initial_delay_ms = 1
max_delay_ms = 5
jitter = 0.0
"#
        )
    }

    /// Config text -> builder -> engine -> UDP datagram at the destination
    #[tokio::test]
    async fn test_udp_forwarding_from_config() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let dest = receiver.local_addr().unwrap();

        let blueprint =
            ConfigLoader::load_from_str(&config_for("udp", &[dest], false), ConfigFormat::Toml).unwrap();
        let engine = ForwarderBuilder::new(blueprint.forwarder).build().await.unwrap();

        assert_eq!(engine.write(b"metric:1").await, ForwardOutcome::Sent);

        let mut buf = [0u8; 64];
        let (len, _) = tokio::time::timeout(Duration::from_secs(2), receiver.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf[..len], b"metric:1");
        assert_eq!(engine.metrics().sent_messages(), 1);
    }

    /// TCP transport frames each payload with a u32 big-endian length
    #[tokio::test]
    async fn test_tcp_forwarding_frames_payloads() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dest = listener.local_addr().unwrap();

        let blueprint =
            ConfigLoader::load_from_str(&config_for("tcp", &[dest], false), ConfigFormat::Toml).unwrap();
        let engine = ForwarderBuilder::new(blueprint.forwarder).build().await.unwrap();

        let accept = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut frames = Vec::new();
            for _ in 0..2 {
                let len = stream.read_u32().await.unwrap() as usize;
                let mut payload = vec![0u8; len];
                stream.read_exact(&mut payload).await.unwrap();
                frames.push(payload);
            }
            frames
        });

        assert_eq!(engine.write(b"first").await, ForwardOutcome::Sent);
        assert_eq!(engine.write(b"second").await, ForwardOutcome::Sent);

        let frames = tokio::time::timeout(Duration::from_secs(2), accept)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(frames, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    /// A refused TCP destination exhausts the retry budget and is counted
    #[tokio::test]
    async fn test_retry_exhausted_against_dead_destination() {
        // 绑定后立即释放，得到一个无人监听的端口
        let dead = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap()
        };

        let blueprint =
            ConfigLoader::load_from_str(&config_for("tcp", &[dead], true), ConfigFormat::Toml).unwrap();
        let engine = ForwarderBuilder::new(blueprint.forwarder).build().await.unwrap();

        assert_eq!(engine.write(b"lost").await, ForwardOutcome::RetryExhausted);

        let stats = engine.metrics().snapshot();
        assert_eq!(stats.sent_messages, 0);
        assert_eq!(stats.write_failures, 1);
        assert_eq!(stats.retry_failures, 1);
    }

    /// Empty pool: select failure, nothing else moves
    #[tokio::test]
    async fn test_empty_pool_is_select_failure() {
        let blueprint =
            ConfigLoader::load_from_str(&config_for("log", &[], true), ConfigFormat::Toml).unwrap();
        let engine = ForwarderBuilder::new(blueprint.forwarder).build().await.unwrap();

        assert_eq!(engine.write(b"x").await, ForwardOutcome::SelectFailed);
        let stats = engine.metrics().snapshot();
        assert_eq!(stats.select_failures, 1);
        assert_eq!(stats.write_failures, 0);
        assert_eq!(stats.retry_count, 0);
    }
}

#[cfg(test)]
mod stream_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use contracts::{ConsumerSink, ContractError, Envelope};
    use health_endpoint::{HealthServer, HealthState};
    use stream_health::{StreamFanout, StreamHealthRegistry};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;
    use tokio::sync::{mpsc, oneshot};

    /// Sink that never completes a delivery
    struct StuckSink;

    impl ConsumerSink for StuckSink {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn deliver(&mut self, _envelope: &Envelope) -> Result<(), ContractError> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    /// Sink that forwards every payload to a channel
    struct ChannelSink(mpsc::UnboundedSender<Bytes>);

    impl ConsumerSink for ChannelSink {
        fn name(&self) -> &str {
            "channel"
        }

        async fn deliver(&mut self, envelope: &Envelope) -> Result<(), ContractError> {
            self.0
                .send(envelope.payload.clone())
                .map_err(|_| ContractError::Other("receiver gone".into()))
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    async fn get_health(addr: std::net::SocketAddr) -> serde_json::Value {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"), "got: {response}");
        let body = response.split("\r\n\r\n").nth(1).unwrap();
        serde_json::from_str(body).unwrap()
    }

    /// Stuck firehose consumer gets flagged slow while an app consumer keeps up
    #[tokio::test]
    async fn test_slow_consumer_visible_on_health() {
        let registry = Arc::new(StreamHealthRegistry::new());
        let fanout = StreamFanout::new(Arc::clone(&registry), 2);

        let (tx, mut rx) = mpsc::unbounded_channel();
        fanout.subscribe_firehose(StuckSink);
        fanout.subscribe_app("billing", ChannelSink(tx));

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (addr, server) = HealthServer::start(
            "127.0.0.1:0".parse().unwrap(),
            HealthState::new(Arc::clone(&registry)),
            async move {
                let _ = stop_rx.await;
            },
        )
        .await
        .unwrap();

        let mut dropped = 0;
        for i in 0..10u8 {
            let envelope = Envelope::for_app("billing", Bytes::from(vec![i]));
            let report = fanout.publish(&envelope);
            dropped += report.dropped;
            // Let the app consumer drain between publishes
            let got = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(got.as_ref(), &[i]);
        }
        assert!(dropped > 0);

        let body = get_health(addr).await;
        assert_eq!(body["firehoseStreamCount"], 1);
        assert_eq!(body["appStreamCount"], 1);
        assert_eq!(body["slowConsumerCount"], 1);
        assert_eq!(body["forwarders"], serde_json::json!([]));

        let _ = stop_tx.send(());
        server.await.unwrap();
    }
}
