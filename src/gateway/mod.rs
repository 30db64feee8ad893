//! Gateway Layer
//!
//! Everything a single gateway node does with live sockets: the local
//! connection manager, the websocket upgrade handler and its pumps, the
//! producer-side router, the partition consumer, and the orchestrator that
//! ties a submitted frame to persistence and fan-out.

pub mod client;
pub mod consumer;
pub mod handler;
pub mod http;
pub mod manager;
pub mod orchestrator;
pub mod registry;
pub mod router;

pub use client::ClientSession;
pub use consumer::PartitionConsumer;
pub use manager::{ConnectionManager, LocalSend};
pub use orchestrator::MessageOrchestrator;
pub use registry::GatewayRegistry;
pub use router::{MessageRouter, OfflineFallback, PartitionMap};
