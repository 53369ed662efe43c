//! # Platform Wiring
//!
//! Startup order: connect the broker (bounded retry, exhaustion is fatal),
//! open the store, start the RPC clients, bind every consumer queue, then
//! start the reaper. Consumers come up before any command can be issued, so
//! no lifecycle event is published into a void.

use crate::config::{PlatformConfig, StorageBackend, StorageConfig};
use adoption_saga::{spawn_reaper, AdoptionSaga, PaymentEventsHandler, SystemClock};
use anyhow::{Context, Result};
use pet_registry::{
    AvailabilityProjection, BusinessRegistry, BusinessValidationResponder, PetRegistry,
    PetValidationResponder,
};
use shared_bus::{
    connect, keys, spawn_consumer, BindingPattern, EventHandler, InMemoryBroker, InMemoryDialer,
    RpcClient,
};
use shared_store::{DocumentStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use wallet_ledger::{PaymentProcessor, WalletLedger};

/// The running platform: every service wired onto one broker and store.
pub struct Platform {
    broker: Arc<InMemoryBroker>,
    pets: PetRegistry,
    businesses: BusinessRegistry,
    ledger: WalletLedger,
    processor: Arc<PaymentProcessor>,
    saga: Arc<AdoptionSaga>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl Platform {
    /// Connect, wire, and start everything.
    pub async fn start(config: &PlatformConfig) -> Result<Self> {
        let broker = Arc::new(InMemoryBroker::with_capacity(config.bus.queue_capacity));
        let dialer = InMemoryDialer::new(Arc::clone(&broker));
        let broker = connect(&dialer, config.bus.reconnect_policy())
            .await
            .context("broker connection failed")?;

        let store = open_store(&config.storage)?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        // RPC clients: one per calling service, each with its own response
        // queue so correlation-suffixed replies land with their caller.
        let registry_rpc = RpcClient::start(
            Arc::clone(&broker),
            "pet-registry.rpc-responses",
            vec![BindingPattern::parse(keys::BUSINESS_VALIDATION_RESPONSE_PATTERN)?],
            config.rpc.request_timeout(),
            config.rpc.sweep_interval(),
            shutdown_rx.clone(),
        )?;
        let saga_rpc = RpcClient::start(
            Arc::clone(&broker),
            "adoption-saga.rpc-responses",
            vec![BindingPattern::parse(keys::PET_VALIDATION_RESPONSE_PATTERN)?],
            config.rpc.request_timeout(),
            config.rpc.sweep_interval(),
            shutdown_rx.clone(),
        )?;

        let pets = PetRegistry::new(Arc::clone(&store));
        let businesses = BusinessRegistry::new(Arc::clone(&store));
        let ledger = WalletLedger::new(Arc::clone(&store), broker.clone());
        let processor = Arc::new(PaymentProcessor::new(
            Arc::clone(&store),
            ledger.clone(),
            broker.clone(),
        ));
        let saga = Arc::new(AdoptionSaga::new(
            Arc::clone(&store),
            saga_rpc,
            broker.clone(),
            Arc::new(SystemClock),
        ));

        // Validation responders.
        tasks.push(spawn_consumer(
            broker.subscribe(
                "business-registry.validation",
                vec![BindingPattern::parse(keys::BUSINESS_VALIDATION_REQUEST)?],
            )?,
            Arc::new(BusinessValidationResponder::new(
                businesses.clone(),
                broker.clone(),
            )),
            shutdown_rx.clone(),
        ));
        tasks.push(spawn_consumer(
            broker.subscribe(
                "pet-registry.validation",
                vec![BindingPattern::parse(keys::PET_VALIDATION_REQUEST)?],
            )?,
            Arc::new(PetValidationResponder::new(
                pets.clone(),
                registry_rpc,
                broker.clone(),
            )),
            shutdown_rx.clone(),
        ));

        // Availability projection over the saga lifecycle.
        tasks.push(spawn_consumer(
            broker.subscribe(
                "pet-registry.availability",
                vec![BindingPattern::parse(keys::ADOPTION_EVENTS_PATTERN)?],
            )?,
            Arc::new(AvailabilityProjection::new(Arc::clone(&store))),
            shutdown_rx.clone(),
        ));

        // Payment processor: approvals, hold requests, rejections.
        tasks.push(spawn_consumer(
            broker.subscribe(
                "wallet-ledger.payments",
                vec![
                    BindingPattern::parse(keys::ADOPTION_APPROVED)?,
                    BindingPattern::parse(keys::PAYMENT_HOLD_REQUEST)?,
                    BindingPattern::parse(keys::ADOPTION_REJECTED)?,
                ],
            )?,
            Arc::clone(&processor) as Arc<dyn EventHandler>,
            shutdown_rx.clone(),
        ));

        // Saga's inbound edge: settlements and hold failures.
        tasks.push(spawn_consumer(
            broker.subscribe(
                "adoption-saga.payment-events",
                vec![
                    BindingPattern::parse(keys::PAYMENT_COMPLETED)?,
                    BindingPattern::parse(keys::PAYMENT_HOLD_FAILED)?,
                ],
            )?,
            Arc::new(PaymentEventsHandler::new(Arc::clone(&saga))),
            shutdown_rx.clone(),
        ));

        tasks.push(spawn_reaper(
            Arc::clone(&saga),
            config.payment.window(),
            config.payment.reaper_interval(),
            shutdown_rx,
        ));

        info!(
            queues = broker.queue_count(),
            payment_window_secs = config.payment.window_secs,
            "platform started"
        );
        Ok(Self {
            broker,
            pets,
            businesses,
            ledger,
            processor,
            saga,
            shutdown_tx,
            tasks,
        })
    }

    /// Stop every consumer and wait briefly for them to drain.
    pub async fn shutdown(mut self) {
        info!("shutting down");
        self.shutdown_tx.send(true).ok();
        for task in self.tasks.drain(..) {
            match tokio::time::timeout(Duration::from_secs(2), task).await {
                Ok(_) => {}
                Err(_) => warn!("a consumer did not stop within the grace period"),
            }
        }
        info!("shutdown complete");
    }

    #[must_use]
    pub fn broker(&self) -> &Arc<InMemoryBroker> {
        &self.broker
    }

    #[must_use]
    pub fn pets(&self) -> &PetRegistry {
        &self.pets
    }

    #[must_use]
    pub fn businesses(&self) -> &BusinessRegistry {
        &self.businesses
    }

    #[must_use]
    pub fn ledger(&self) -> &WalletLedger {
        &self.ledger
    }

    #[must_use]
    pub fn processor(&self) -> &Arc<PaymentProcessor> {
        &self.processor
    }

    #[must_use]
    pub fn saga(&self) -> &Arc<AdoptionSaga> {
        &self.saga
    }
}

fn open_store(config: &StorageConfig) -> Result<Arc<dyn DocumentStore>> {
    match config.backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        #[cfg(feature = "rocksdb")]
        StorageBackend::RocksDb => {
            let store = shared_store::RocksDbStore::open_default(&config.data_dir)
                .with_context(|| format!("failed to open RocksDB at {}", config.data_dir))?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "rocksdb"))]
        StorageBackend::RocksDb => anyhow::bail!(
            "storage backend is rocksdb but the binary was built without the `rocksdb` feature"
        ),
    }
}
