//! Application Startup
//!
//! Builds every service explicitly and threads them through `AppState`; no
//! component reaches for process-global handles.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Settings;
use crate::domain::{GroupMembership, MessageStore, MessageTransport, OfflineQueue, PresenceDirectory};
use crate::gateway::{
    http, ConnectionManager, GatewayRegistry, MessageOrchestrator, MessageRouter,
    PartitionConsumer, PartitionMap,
};
use crate::infrastructure::archive::Archiver;
use crate::infrastructure::cold_store::{self, PgColdStore};
use crate::infrastructure::hot_store::RedisHotStore;
use crate::infrastructure::membership::HttpGroupMembership;
use crate::infrastructure::offline::RedisOfflineQueue;
use crate::infrastructure::presence::RedisPresenceDirectory;
use crate::infrastructure::transport::RedisStreamTransport;
use crate::shared::msgid::MessageIdGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub manager: Arc<ConnectionManager>,
    pub presence: Arc<dyn PresenceDirectory>,
    pub offline: Arc<dyn OfflineQueue>,
    pub orchestrator: Arc<MessageOrchestrator>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
    consumer: PartitionConsumer,
    archiver: Archiver,
    registry: Arc<GatewayRegistry>,
    cancel: CancellationToken,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        let gateway_id = settings.gateway.id.clone();

        // Cold store pool and schema
        let db = cold_store::create_pool(&settings.database)
            .await
            .context("cold store connection failed")?;
        cold_store::run_migrations(&db)
            .await
            .context("cold store migration failed")?;
        tracing::info!("Cold store connection pool created");

        // Redis backs presence, the hot store, offline queues, and transport
        let redis = crate::infrastructure::create_redis_client(&settings.redis)
            .await
            .context("redis connection failed")?;

        let presence: Arc<dyn PresenceDirectory> = Arc::new(RedisPresenceDirectory::new(
            redis.clone(),
            settings.redis.presence_ttl_secs,
        ));
        let hot_store = Arc::new(RedisHotStore::new(
            redis.clone(),
            settings.storage.hot_ttl_secs,
            settings.storage.idempotency_ttl_secs,
        ));
        let offline: Arc<dyn OfflineQueue> = Arc::new(RedisOfflineQueue::new(
            redis.clone(),
            settings.storage.offline_ttl_secs,
        ));
        let transport = RedisStreamTransport::new(redis.clone(), settings.transport.topic.clone());
        let membership: Arc<dyn GroupMembership> =
            Arc::new(HttpGroupMembership::new(&settings.membership)?);

        let cold_store = PgColdStore::new(db.clone(), settings.storage.archive_batch_size);
        let archiver = Archiver::new(hot_store.clone(), cold_store, &settings.storage);

        // Gateway-local state
        let manager = Arc::new(ConnectionManager::new(gateway_id.clone()));
        let registry = Arc::new(GatewayRegistry::new());
        registry.register(manager.clone());

        let partitions = PartitionMap::new(settings.transport.partitions.clone());
        // This gateway must own a partition before it can accept traffic.
        let partition = partitions.partition_for(&gateway_id)?;

        let router = Arc::new(MessageRouter::new(
            gateway_id.clone(),
            partitions,
            presence.clone(),
            Arc::new(transport.clone()) as Arc<dyn MessageTransport>,
            offline.clone(),
            manager.clone(),
        ));
        let orchestrator = Arc::new(MessageOrchestrator::new(
            Arc::new(MessageIdGenerator::new()),
            hot_store.clone() as Arc<dyn MessageStore>,
            router,
            membership,
        ));

        let consumer = PartitionConsumer::new(
            gateway_id.clone(),
            partition,
            transport,
            presence.clone(),
            manager.clone(),
            Duration::from_secs(settings.transport.commit_interval_secs),
        );

        let state = AppState {
            settings: Arc::new(settings.clone()),
            manager,
            presence,
            offline,
            orchestrator,
        };

        let router = http::create_router(state);

        let addr: SocketAddr = settings
            .listen_addr()
            .parse()
            .context("invalid listener address")?;
        let listener = TcpListener::bind(addr).await?;
        info!(gateway = %gateway_id, partition, "Listening on {}", addr);

        Ok(Self {
            listener,
            router,
            consumer,
            archiver,
            registry,
            cancel: CancellationToken::new(),
        })
    }

    /// Run the server until stopped; consumer and archiver drain in-flight
    /// work when the shutdown signal cancels them.
    pub async fn run_until_stopped(self) -> Result<()> {
        let consumer_task = tokio::spawn(self.consumer.run(self.cancel.child_token()));
        let archiver_task = tokio::spawn(self.archiver.run(self.cancel.child_token()));

        let cancel = self.cancel.clone();
        let shutdown = async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            cancel.cancel();
        };

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        self.cancel.cancel();
        let _ = consumer_task.await;
        let _ = archiver_task.await;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Registry of in-process gateways (one, outside test setups).
    pub fn registry(&self) -> Arc<GatewayRegistry> {
        self.registry.clone()
    }
}
