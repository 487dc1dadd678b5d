//! Per-connection provider session
//!
//! One task owns the whole pipeline for a consumer connection: wire bytes
//! run through the frame receiver, reassembled payloads through the
//! incremental decoder, decoded roots into the router. Committed device
//! changes arrive on the broadcast channel and go back out as update
//! roots, so the session multiplexes reads, updates and keep-alives over
//! a single stream.

use std::sync::Arc;
use std::time::Duration;

use ember_ber::{AsyncBerReader, EmberNode};
use ember_s101::{
    encode_frame, encode_message, keep_alive_request, FramingEvent, FramingReader, WriterConfig,
    DTD_GLOW, GLOW_DTD_VERSION,
};
use ember_transport::ByteStream;
use tokio::sync::broadcast;

use crate::error::EmberResult;
use crate::provider::{event_root, Router};

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub slot: u8,
    /// Upper bound on one outgoing package, header included
    pub max_package_length: usize,
    /// Emit non-escaping length-prefixed frames
    pub non_escaping: bool,
    /// Interval between keep-alive requests to the peer
    pub keep_alive_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            slot: 0,
            max_package_length: 1024,
            non_escaping: false,
            keep_alive_interval: Duration::from_secs(60),
        }
    }
}

impl SessionConfig {
    fn writer_config(&self) -> WriterConfig {
        WriterConfig {
            slot: self.slot,
            dtd: DTD_GLOW,
            app_bytes: GLOW_DTD_VERSION.to_vec(),
            max_package_length: self.max_package_length,
            non_escaping: self.non_escaping,
        }
    }
}

/// Drive one consumer connection until the peer goes away.
///
/// Framing and decoding errors are logged and skipped; the connection only
/// ends on EOF, a transport error, or the router shutting down.
pub async fn run_session<S: ByteStream>(
    router: Arc<Router>,
    mut stream: S,
    config: SessionConfig,
) -> EmberResult<()> {
    let writer_config = config.writer_config();
    let mut framing = FramingReader::new();
    let mut decoder = AsyncBerReader::new();
    let mut events = router.subscribe();
    let mut keep_alive = tokio::time::interval(config.keep_alive_interval);
    let mut buf = vec![0u8; 4096];

    // liveness comes from keep-alives, not from read deadlines
    stream.set_timeout(None).await?;

    loop {
        tokio::select! {
            result = stream.read(&mut buf) => {
                let n = result?;
                if n == 0 {
                    log::info!("peer closed the connection");
                    break;
                }
                for &byte in &buf[..n] {
                    match framing.feed(byte) {
                        Ok(Some(event)) => {
                            on_framing_event(
                                &router,
                                &mut stream,
                                &writer_config,
                                &mut decoder,
                                event,
                            )
                            .await?;
                        }
                        Ok(None) => {}
                        Err(err) => log::warn!("framing error: {}", err),
                    }
                }
            }
            event = events.recv() => match event {
                Ok(event) => {
                    let root = event_root(&event)?;
                    send_root(&mut stream, &writer_config, &root).await?;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    log::warn!("session fell behind, {} updates dropped", missed);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = keep_alive.tick() => {
                let frame = encode_frame(&keep_alive_request(config.slot));
                stream.write_all(&frame).await?;
                stream.flush().await?;
            }
        }
    }
    stream.close().await
}

async fn on_framing_event<S: ByteStream>(
    router: &Router,
    stream: &mut S,
    writer_config: &WriterConfig,
    decoder: &mut AsyncBerReader,
    event: FramingEvent,
) -> EmberResult<()> {
    match event {
        FramingEvent::EmberPayload(payload) => {
            for &byte in &payload {
                match decoder.feed(byte) {
                    Ok(Some(root)) => {
                        match router.handle_root(&root).await {
                            Ok(Some(response)) => {
                                send_root(stream, writer_config, &response).await?;
                            }
                            Ok(None) => {}
                            Err(err) => log::warn!("request not handled: {}", err),
                        }
                    }
                    Ok(None) => {}
                    // the decoder resets itself, later roots still decode
                    Err(err) => log::warn!("decode error: {}", err),
                }
            }
            Ok(())
        }
        FramingEvent::KeepAliveRequest { slot, reply } => {
            log::trace!("keep-alive request on slot {}", slot);
            stream.write_all(&reply).await?;
            stream.flush().await
        }
        FramingEvent::KeepAliveResponse { slot } => {
            log::trace!("keep-alive response on slot {}", slot);
            Ok(())
        }
    }
}

/// Frame and send one root over the stream
async fn send_root<S: ByteStream>(
    stream: &mut S,
    config: &WriterConfig,
    root: &EmberNode,
) -> EmberResult<()> {
    for frame in encode_message(config, &root.to_bytes())? {
        stream.write_all(&frame).await?;
    }
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DeviceTree, ElementKind, ParameterState};
    use async_trait::async_trait;
    use ember_ber::Value;
    use ember_glow::{
        root_elements, root_of, GlowCommand, GlowElement, GlowQualifiedParameter,
    };
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    struct PipeStream(tokio::io::DuplexStream);

    #[async_trait]
    impl ByteStream for PipeStream {
        async fn set_timeout(&mut self, _timeout: Option<Duration>) -> EmberResult<()> {
            Ok(())
        }

        async fn read(&mut self, buf: &mut [u8]) -> EmberResult<usize> {
            Ok(self.0.read(buf).await?)
        }

        async fn write(&mut self, buf: &[u8]) -> EmberResult<usize> {
            Ok(self.0.write(buf).await?)
        }

        async fn flush(&mut self) -> EmberResult<()> {
            Ok(self.0.flush().await?)
        }

        fn is_closed(&self) -> bool {
            false
        }

        async fn close(&mut self) -> EmberResult<()> {
            Ok(self.0.shutdown().await?)
        }
    }

    fn sample_router() -> Arc<Router> {
        let mut tree = DeviceTree::new();
        let device = tree.add_root(1, "device", ElementKind::Node).unwrap();
        tree.add_child(
            device,
            4,
            "gain",
            ElementKind::Parameter(ParameterState::writable(Value::Integer(0))),
        )
        .unwrap();
        Arc::new(Router::new(tree))
    }

    fn long_keep_alive() -> SessionConfig {
        SessionConfig {
            keep_alive_interval: Duration::from_secs(3600),
            ..SessionConfig::default()
        }
    }

    async fn send_request(client: &mut tokio::io::DuplexStream, root: &EmberNode) {
        let config = SessionConfig::default().writer_config();
        for frame in encode_message(&config, &root.to_bytes()).unwrap() {
            client.write_all(&frame).await.unwrap();
        }
    }

    /// Read from the client side until one root arrives, skipping
    /// keep-alive traffic
    async fn receive_root(client: &mut tokio::io::DuplexStream) -> EmberNode {
        let mut framing = FramingReader::new();
        let mut decoder = AsyncBerReader::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed before a root arrived");
            for &byte in &buf[..n] {
                if let Some(FramingEvent::EmberPayload(payload)) = framing.feed(byte).unwrap() {
                    if let Some(root) = decoder.feed_all(&payload).unwrap().pop() {
                        return root;
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_get_directory_over_the_wire() {
        let router = sample_router();
        let (server_io, mut client) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(
            router,
            PipeStream(server_io),
            long_keep_alive(),
        ));

        let request = root_of(vec![GlowElement::Command(GlowCommand::get_directory())]).unwrap();
        send_request(&mut client, &request).await;

        let root = receive_root(&mut client).await;
        let elements = root_elements(&root).unwrap();
        let GlowElement::QualifiedNode(node) = &elements[0] else {
            panic!("expected a qualified node");
        };
        assert_eq!(node.path(), Some(&[1u32][..]));
        assert_eq!(node.identifier(), Some("device"));

        drop(client);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_write_comes_back_as_update() {
        let router = sample_router();
        let (server_io, mut client) = tokio::io::duplex(4096);
        let session = tokio::spawn(run_session(
            router,
            PipeStream(server_io),
            long_keep_alive(),
        ));

        let mut parameter = GlowQualifiedParameter::new(&[1, 4]);
        parameter.set_value(Value::Integer(7));
        let request = root_of(vec![GlowElement::QualifiedParameter(parameter)]).unwrap();
        send_request(&mut client, &request).await;

        // the originating session receives the committed change as an
        // update root like every other session
        let root = receive_root(&mut client).await;
        let elements = root_elements(&root).unwrap();
        let GlowElement::QualifiedParameter(parameter) = &elements[0] else {
            panic!("expected a qualified parameter");
        };
        assert_eq!(parameter.path(), Some(&[1u32, 4][..]));
        assert_eq!(parameter.value(), Some(&Value::Integer(7)));

        drop(client);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_keep_alive_request_answered() {
        let router = sample_router();
        let (server_io, mut client) = tokio::io::duplex(4096);
        tokio::spawn(run_session(
            router,
            PipeStream(server_io),
            long_keep_alive(),
        ));

        let frame = encode_frame(&keep_alive_request(0));
        client.write_all(&frame).await.unwrap();

        let mut framing = FramingReader::new();
        let mut buf = [0u8; 256];
        'outer: loop {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0);
            for &byte in &buf[..n] {
                match framing.feed(byte).unwrap() {
                    Some(FramingEvent::KeepAliveResponse { slot }) => {
                        assert_eq!(slot, 0);
                        break 'outer;
                    }
                    Some(FramingEvent::KeepAliveRequest { .. }) => {}
                    _ => {}
                }
            }
        }
    }
}
