//! # Chat Gateway
//!
//! The message-routing core of a horizontally-scaled chat service:
//! - WebSocket gateway nodes terminating long-lived client connections
//! - A TTL-based presence directory mapping users to gateways
//! - Deterministic cross-gateway routing over partitioned streams
//! - A hot/cold two-tier message store with per-user offline queues
//!
//! ## Module Structure
//!
//! ```text
//! chat_gateway/
//! +-- config/         Configuration management
//! +-- domain/         Wire records, conversation ids, service traits
//! +-- infrastructure/ Redis, Postgres, transport, and metrics implementations
//! +-- gateway/        Connection manager, router, consumer, orchestrator
//! +-- shared/         Common utilities (errors, message ids)
//! ```

// Configuration module
pub mod config;

// Domain layer - wire records and service traits
pub mod domain;

// Infrastructure layer - external implementations
pub mod infrastructure;

// Gateway layer - sockets, routing, orchestration
pub mod gateway;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
