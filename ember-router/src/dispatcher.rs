//! Device event fan-out
//!
//! Mutations commit under the tree lock first; the resulting events go out
//! through a broadcast channel afterwards, so subscribers only ever see
//! state that is already in place.

use ember_ber::Value;
use tokio::sync::broadcast;

/// A committed change to the device tree
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    ParameterChanged {
        path: Vec<u32>,
        value: Value,
    },
    ConnectionChanged {
        matrix_path: Vec<u32>,
        target: u32,
        sources: Vec<u32>,
    },
}

#[derive(Debug)]
pub struct Dispatcher {
    sender: broadcast::Sender<DeviceEvent>,
}

impl Dispatcher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.sender.subscribe()
    }

    /// Publish a committed change; a send with no live subscribers is not
    /// an error
    pub fn notify(&self, event: DeviceEvent) {
        let receivers = self.sender.receiver_count();
        if receivers == 0 {
            return;
        }
        if let Err(err) = self.sender.send(event) {
            log::debug!("event dropped, all subscribers gone: {}", err);
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
