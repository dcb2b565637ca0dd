//! # Integration Tests
//!
//! Cross-crate end-to-end scenarios.
//!
//! Covers:
//! - Canonical forward plus fan-out through the relay engine
//! - Sink failure isolation as seen by the caller
//! - Bulk-index replication from a loaded configuration
//! - The HTTP surface on a real listener

#[cfg(test)]
mod contract_tests {
    use contracts::HeaderClass;

    #[test]
    fn test_header_classification_is_total() {
        for name in ["Host", "connection", "Content-Type", "content-encoding", "X-Custom", ""] {
            let class = HeaderClass::classify(name);
            let matches = [
                HeaderClass::HostSpecific,
                HeaderClass::ContentSpecific,
                HeaderClass::PassThrough,
            ]
            .iter()
            .filter(|c| **c == class)
            .count();
            assert_eq!(matches, 1, "{name}");
        }
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use bytes::Bytes;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ContractError, HeaderSet, ReplicationSink, TelemetryBatch};
    use dispatcher::Dispatcher;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use relay::{RelayOptions, TelemetryRelay};
    use wiremock::matchers::{body_bytes, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const TWO_RECORDS: &str = concat!(
        r#"{"name":"Microsoft.ApplicationInsights.Request","iKey":"k1","data":{"baseData":{"id":"r1"}}}"#,
        "\n",
        r#"{"name":"Microsoft.ApplicationInsights.Event","iKey":"k1","data":{"baseData":{"id":"e1","properties":{"user.name":"ada"}}}}"#,
        "\n",
    );

    /// Received batches, shared with the test body
    type Seen = Arc<Mutex<Vec<(TelemetryBatch, HeaderSet)>>>;

    /// Captures every batch it is handed
    struct CaptureSink {
        name: String,
        seen: Seen,
    }

    impl CaptureSink {
        fn new(name: &str) -> (Self, Seen) {
            let seen = Seen::default();
            (
                Self {
                    name: name.to_string(),
                    seen: Arc::clone(&seen),
                },
                seen,
            )
        }
    }

    impl ReplicationSink for CaptureSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn replicate(
            &self,
            batch: &TelemetryBatch,
            headers: &HeaderSet,
        ) -> Result<(), ContractError> {
            self.seen
                .lock()
                .unwrap()
                .push((batch.clone(), headers.clone()));
            Ok(())
        }
    }

    struct FailingSink;

    impl ReplicationSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn replicate(
            &self,
            _batch: &TelemetryBatch,
            _headers: &HeaderSet,
        ) -> Result<(), ContractError> {
            Err(ContractError::sink_connection("failing", "connection refused"))
        }
    }

    struct PanickingSink;

    impl ReplicationSink for PanickingSink {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn replicate(
            &self,
            _batch: &TelemetryBatch,
            _headers: &HeaderSet,
        ) -> Result<(), ContractError> {
            panic!("sink bug")
        }
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    async fn destination(status: u16, body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/track"))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&server)
            .await;
        server
    }

    fn relay_for(server: &MockServer, dispatcher: Dispatcher) -> TelemetryRelay {
        let options = RelayOptions {
            destination: format!("{}/v2/track", server.uri()),
            destination_timeout: Duration::from_secs(5),
            await_completion: true,
            ..Default::default()
        };
        TelemetryRelay::new(options, dispatcher).unwrap()
    }

    /// Gzip two-record batch with host and connection headers
    #[tokio::test]
    async fn test_e2e_forward_and_fan_out() {
        let compressed = gzip(TWO_RECORDS.as_bytes());

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/track"))
            .and(body_bytes(compressed.clone()))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"itemsAccepted\":2}"))
            .expect(1)
            .mount(&server)
            .await;

        let (sink_a, seen_a) = CaptureSink::new("a");
        let (sink_b, seen_b) = CaptureSink::new("b");
        let relay = relay_for(
            &server,
            Dispatcher::builder().sink(sink_a).sink(sink_b).build(),
        );

        let headers = HeaderSet::new()
            .with("Content-Length", compressed.len().to_string())
            .with("Content-Encoding", "gzip")
            .with("Host", "x")
            .with("Connection", "keep-alive")
            .with("Content-Type", "application/x-json-stream");

        let response = relay
            .process(Some(compressed.as_slice()), Some(&headers))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"{\"itemsAccepted\":2}");

        let received = &server.received_requests().await.unwrap()[0];
        assert_ne!(received.headers.get("host").unwrap(), "x");
        assert!(received
            .headers
            .get("connection")
            .map_or(true, |v| v != "keep-alive"));
        assert_eq!(received.headers.get("content-encoding").unwrap(), "gzip");
        assert_eq!(
            received.headers.get("content-type").unwrap(),
            "application/x-json-stream"
        );

        for seen in [seen_a, seen_b] {
            let seen = seen.lock().unwrap();
            assert_eq!(seen.len(), 1);
            let (batch, headers) = &seen[0];
            assert_eq!(batch.len(), 2);
            assert_eq!(
                batch.records()[0]["name"],
                "Microsoft.ApplicationInsights.Request"
            );
            assert!(!headers.contains("host"));
            assert!(!headers.contains("connection"));
            assert_eq!(headers.first("content-type"), Some("application/x-json-stream"));
        }
    }

    #[tokio::test]
    async fn test_e2e_sink_failures_do_not_change_response() {
        let server = destination(200, "ok").await;
        let (healthy, seen) = CaptureSink::new("healthy");
        let dispatcher = Dispatcher::builder()
            .sink(FailingSink)
            .sink(PanickingSink)
            .sink(healthy)
            .build();
        let relay = relay_for(&server, dispatcher);

        let body = TWO_RECORDS.as_bytes();
        let headers = HeaderSet::new().with("Content-Length", body.len().to_string());
        let response = relay.process(Some(body), Some(&headers)).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"ok");
        assert_eq!(seen.lock().unwrap().len(), 1);

        let metrics = relay.dispatcher().metrics();
        let failures: u64 = metrics.iter().map(|(_, m)| m.failure_count).sum();
        assert_eq!(failures, 2);
        assert!(metrics.iter().all(|(_, m)| m.in_flight == 0));
    }

    #[tokio::test]
    async fn test_e2e_zero_sinks_returns_exact_response() {
        let server = destination(207, "{\"itemsReceived\":2,\"itemsAccepted\":1}").await;
        let relay = relay_for(&server, Dispatcher::default());

        let body = TWO_RECORDS.as_bytes();
        let headers = HeaderSet::new().with("Content-Length", body.len().to_string());
        let response = relay.process(Some(body), Some(&headers)).await.unwrap();

        assert_eq!(response.status, 207);
        assert_eq!(
            &response.body[..],
            b"{\"itemsReceived\":2,\"itemsAccepted\":1}"
        );
        assert_eq!(relay.metrics().batches_decoded, 0);
    }

    #[tokio::test]
    async fn test_e2e_corrupt_gzip_still_forwarded() {
        let server = destination(200, "ok").await;
        let (sink, seen) = CaptureSink::new("capture");
        let relay = relay_for(&server, Dispatcher::builder().sink(sink).build());

        let body = b"definitely not gzip".as_slice();
        let headers = HeaderSet::new()
            .with("Content-Length", body.len().to_string())
            .with("Content-Encoding", "gzip");
        let response = relay.process(Some(body), Some(&headers)).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
        assert_eq!(relay.metrics().decode_failures, 1);
    }

    #[tokio::test]
    async fn test_e2e_bulk_index_from_config() {
        let server = destination(200, "ok").await;
        let bulk = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_bulk"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"errors\":false}"))
            .expect(1)
            .mount(&bulk)
            .await;

        let config = format!(
            r#"
[destination]
uri = "{destination}/v2/track"

[replication]
await_completion = true

[[sinks]]
name = "elastic"
sink_type = "bulk_index"
[sinks.params]
endpoint = "{bulk}/_bulk"
index = "ai"
type = "telemetry"
id_pointer = "/data/baseData/id"
"#,
            destination = server.uri(),
            bulk = bulk.uri(),
        );
        let blueprint = ConfigLoader::load_from_str(&config, ConfigFormat::Toml).unwrap();
        let relay = TelemetryRelay::from_blueprint(&blueprint).unwrap();

        let body = TWO_RECORDS.as_bytes();
        let headers = HeaderSet::new().with("Content-Length", body.len().to_string());
        let response = relay.process(Some(body), Some(&headers)).await.unwrap();
        assert_eq!(response.status, 200);

        let requests = bulk.received_requests().await.unwrap();
        let payload = String::from_utf8(requests[0].body.clone()).unwrap();
        let lines: Vec<&str> = payload.lines().collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(
            lines[0],
            r#"{"index":{"_index":"ai","_type":"telemetry","_id":"r1"}}"#
        );
        assert_eq!(
            lines[2],
            r#"{"index":{"_index":"ai","_type":"telemetry","_id":"e1"}}"#
        );
        assert!(lines[3].contains(r#""user_name":"ada""#));
        assert!(!lines[3].contains("user.name"));
    }

    #[tokio::test]
    async fn test_e2e_http_surface() {
        let server = destination(200, "{\"itemsAccepted\":2}").await;
        let (sink, seen) = CaptureSink::new("capture");
        let relay = relay_for(&server, Dispatcher::builder().sink(sink).build());
        let app = relay::server::router(relay.clone(), "/v2/track", 1024 * 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(relay::server::serve(listener, app, async {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::new();
        let response = client
            .post(format!("http://{addr}/v2/track"))
            .header("content-encoding", "gzip")
            .header("content-type", "application/x-json-stream")
            .body(Bytes::from(gzip(TWO_RECORDS.as_bytes())))
            .send()
            .await
            .unwrap();

        assert_eq!(response.status().as_u16(), 200);
        assert_eq!(response.text().await.unwrap(), "{\"itemsAccepted\":2}");

        let health = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap();
        assert_eq!(health.status().as_u16(), 200);

        stop_tx.send(()).unwrap();
        serving.await.unwrap().unwrap();
        relay.shutdown().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0.len(), 2);
    }

    #[tokio::test]
    async fn test_e2e_http_rejects_empty_body() {
        let server = destination(200, "ok").await;
        let relay = relay_for(&server, Dispatcher::default());
        let app = relay::server::router(relay, "/v2/track", 1024);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let serving = tokio::spawn(relay::server::serve(listener, app, async {
            let _ = stop_rx.await;
        }));

        let response = reqwest::Client::new()
            .post(format!("http://{addr}/v2/track"))
            .body("")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        assert!(server.received_requests().await.unwrap().is_empty());

        stop_tx.send(()).unwrap();
        serving.await.unwrap().unwrap();
    }
}
