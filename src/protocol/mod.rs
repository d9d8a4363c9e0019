//! # Protocol Registry
//!
//! Decoders for raw radio payloads, tried in registration order. The first
//! protocol that accepts a payload wins, so narrower protocols must be
//! registered before permissive ones.

pub mod ook;
pub mod openthings;

use crate::error::MiHomeError;
use crate::message::Message;
use bytes::Bytes;
use log::debug;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub use ook::OokProtocol;
pub use openthings::OpenThingsProtocol;

/// A named decoder for one wire encoding.
pub trait Protocol: Send + Sync {
    /// Unique protocol name
    fn name(&self) -> &str;

    /// Decodes a raw payload into a message.
    ///
    /// Any error means "not mine or malformed"; the registry moves on to the
    /// next protocol.
    fn decode(&self, payload: &Bytes) -> Result<Message, MiHomeError>;
}

/// Ordered, shareable list of protocols.
///
/// Clones share the same list, so protocols added through one handle are
/// visible to a receive loop holding another.
#[derive(Clone, Default)]
pub struct ProtocolRegistry {
    inner: Arc<RwLock<Vec<Arc<dyn Protocol>>>>,
}

impl ProtocolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding OpenThings followed by OOK.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let mut inner = registry.write();
        inner.push(Arc::new(OpenThingsProtocol::new()));
        inner.push(Arc::new(OokProtocol::new()));
        drop(inner);
        registry
    }

    /// Appends a protocol; names must be unique.
    pub fn add_proto(&self, protocol: Arc<dyn Protocol>) -> Result<(), MiHomeError> {
        let mut inner = self.write();
        if inner.iter().any(|p| p.name() == protocol.name()) {
            return Err(MiHomeError::DuplicateProtocolError(
                protocol.name().to_string(),
            ));
        }
        inner.push(protocol);
        Ok(())
    }

    /// Registered protocol names, in registration order
    pub fn protos(&self) -> Vec<String> {
        self.read().iter().map(|p| p.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Returns the first successful decode in registration order.
    pub fn decode(&self, payload: &Bytes) -> Result<Message, MiHomeError> {
        let protocols: Vec<Arc<dyn Protocol>> = self.read().clone();
        for protocol in protocols {
            match protocol.decode(payload) {
                Ok(message) => return Ok(message),
                Err(e) => debug!("{} rejected payload: {}", protocol.name(), e),
            }
        }
        Err(MiHomeError::NoMatchingProtocolError)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<dyn Protocol>>> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Protocol>>> {
        self.inner
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for ProtocolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProtocolRegistry")
            .field("protos", &self.protos())
            .finish()
    }
}
