//! Gateway Registry
//!
//! R/W-locked map of gateway id to its connection manager. Sessions refer
//! to their gateway by id; anything needing the live manager resolves it
//! here. In production a process hosts one gateway, but in-process
//! multi-gateway setups (and the tests) register several.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::manager::ConnectionManager;

/// Registry of connection managers indexed by gateway id.
#[derive(Default)]
pub struct GatewayRegistry {
    inner: RwLock<HashMap<String, Arc<ConnectionManager>>>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, manager: Arc<ConnectionManager>) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.insert(manager.gateway_id().to_string(), manager);
    }

    pub fn get(&self, gateway_id: &str) -> Option<Arc<ConnectionManager>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner.get(gateway_id).cloned()
    }

    pub fn unregister(&self, gateway_id: &str) -> Option<Arc<ConnectionManager>> {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.remove(gateway_id)
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
