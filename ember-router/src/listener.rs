//! TCP listener for the provider
//!
//! Accepts consumer connections and spawns one session task per
//! connection. The router is shared across sessions; an accept failure is
//! logged and the listener keeps serving.

use std::net::SocketAddr;
use std::sync::Arc;

use ember_transport::TcpTransport;
use tokio::net::TcpListener;

use crate::error::EmberResult;
use crate::provider::Router;
use crate::session::{run_session, SessionConfig};

pub struct RouterListener {
    router: Arc<Router>,
    address: SocketAddr,
    session_config: SessionConfig,
}

impl RouterListener {
    pub fn new(router: Arc<Router>, address: SocketAddr) -> Self {
        Self {
            router,
            address,
            session_config: SessionConfig::default(),
        }
    }

    pub fn with_session_config(mut self, session_config: SessionConfig) -> Self {
        self.session_config = session_config;
        self
    }

    /// Bind and serve until the task is dropped
    pub async fn start(&self) -> EmberResult<()> {
        let listener = TcpListener::bind(self.address).await?;
        log::info!("Ember+ provider listening on {}", self.address);

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    log::info!("accepted consumer connection from {}", peer);
                    let transport = TcpTransport::from_connected_stream(stream, None);
                    let router = Arc::clone(&self.router);
                    let config = self.session_config.clone();
                    tokio::spawn(async move {
                        match run_session(router, transport, config).await {
                            Ok(()) => log::info!("session with {} closed", peer),
                            Err(err) => log::error!("session with {} failed: {}", peer, err),
                        }
                    });
                }
                Err(err) => {
                    log::error!("failed to accept connection: {}", err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{DeviceTree, ElementKind};
    use ember_ber::AsyncBerReader;
    use ember_glow::{root_elements, root_of, GlowCommand, GlowElement};
    use ember_s101::{encode_message, FramingEvent, FramingReader, WriterConfig};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_listener_serves_tcp_consumers() {
        let mut tree = DeviceTree::new();
        tree.add_root(1, "device", ElementKind::Node).unwrap();
        let router = Arc::new(Router::new(tree));

        let bind = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = bind.local_addr().unwrap();
        drop(bind);

        let listener = RouterListener::new(router, address);
        tokio::spawn(async move {
            let _ = listener.start().await;
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let mut client = tokio::net::TcpStream::connect(address).await.unwrap();
        let request = root_of(vec![GlowElement::Command(GlowCommand::get_directory())]).unwrap();
        for frame in encode_message(&WriterConfig::default(), &request.to_bytes()).unwrap() {
            client.write_all(&frame).await.unwrap();
        }

        let mut framing = FramingReader::new();
        let mut decoder = AsyncBerReader::new();
        let mut buf = [0u8; 1024];
        let root = 'outer: loop {
            let n = client.read(&mut buf).await.unwrap();
            assert!(n > 0, "connection closed before a response arrived");
            for &byte in &buf[..n] {
                if let Some(FramingEvent::EmberPayload(payload)) = framing.feed(byte).unwrap() {
                    if let Some(root) = decoder.feed_all(&payload).unwrap().pop() {
                        break 'outer root;
                    }
                }
            }
        };

        let elements = root_elements(&root).unwrap();
        let GlowElement::QualifiedNode(node) = &elements[0] else {
            panic!("expected a qualified node");
        };
        assert_eq!(node.path(), Some(&[1u32][..]));
    }
}
