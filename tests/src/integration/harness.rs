//! # Integration Harness
//!
//! Wires the registries, the ledger, and the saga onto one in-process
//! broker and one in-memory store, the same topology the runtime builds,
//! but with a [`ManualClock`] and a short RPC deadline. Must be constructed
//! inside a tokio runtime; consumers stop when the harness shuts down.

use adoption_saga::{AdoptionSaga, ManualClock, PaymentEventsHandler};
use chrono::{TimeZone, Utc};
use pet_registry::{
    AvailabilityProjection, BusinessRegistry, BusinessValidationResponder, PetRegistry,
    PetValidationResponder,
};
use shared_bus::{
    keys, spawn_consumer, BindingPattern, EventHandler, InMemoryBroker, RpcClient, Subscription,
};
use shared_store::{DocumentStore, MemoryStore};
use shared_types::{Business, Money, OwnerId, Pet, TransactionId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use wallet_ledger::{PaymentProcessor, WalletLedger};

/// How long a pet-validation call may wait for the registry's answer.
pub const RPC_TIMEOUT: Duration = Duration::from_millis(300);

pub struct Harness {
    pub broker: Arc<InMemoryBroker>,
    pub store: Arc<dyn DocumentStore>,
    pub pets: PetRegistry,
    pub businesses: BusinessRegistry,
    pub ledger: WalletLedger,
    pub processor: Arc<PaymentProcessor>,
    pub saga: Arc<AdoptionSaga>,
    pub clock: Arc<ManualClock>,
    shutdown_tx: watch::Sender<bool>,
}

impl Harness {
    /// Full platform: every consumer queue bound.
    pub fn start() -> Self {
        Self::build(true)
    }

    /// Platform with the pet-validation responder left unbound, so every
    /// validation call runs into its deadline.
    pub fn start_without_pet_registry() -> Self {
        Self::build(false)
    }

    fn build(with_pet_responder: bool) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().unwrap(),
        ));

        let registry_rpc = RpcClient::start(
            Arc::clone(&broker),
            "pet-registry.rpc-responses",
            vec![BindingPattern::parse(keys::BUSINESS_VALIDATION_RESPONSE_PATTERN).unwrap()],
            RPC_TIMEOUT,
            Duration::from_millis(50),
            shutdown_rx.clone(),
        )
        .unwrap();
        let saga_rpc = RpcClient::start(
            Arc::clone(&broker),
            "adoption-saga.rpc-responses",
            vec![BindingPattern::parse(keys::PET_VALIDATION_RESPONSE_PATTERN).unwrap()],
            RPC_TIMEOUT,
            Duration::from_millis(50),
            shutdown_rx.clone(),
        )
        .unwrap();

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
            clock.clone(),
        ));

        spawn_consumer(
            broker
                .subscribe(
                    "business-registry.validation",
                    vec![BindingPattern::parse(keys::BUSINESS_VALIDATION_REQUEST).unwrap()],
                )
                .unwrap(),
            Arc::new(BusinessValidationResponder::new(
                businesses.clone(),
                broker.clone(),
            )),
            shutdown_rx.clone(),
        );
        if with_pet_responder {
            spawn_consumer(
                broker
                    .subscribe(
                        "pet-registry.validation",
                        vec![BindingPattern::parse(keys::PET_VALIDATION_REQUEST).unwrap()],
                    )
                    .unwrap(),
                Arc::new(PetValidationResponder::new(
                    pets.clone(),
                    registry_rpc,
                    broker.clone(),
                )),
                shutdown_rx.clone(),
            );
        }
        spawn_consumer(
            broker
                .subscribe(
                    "pet-registry.availability",
                    vec![BindingPattern::parse(keys::ADOPTION_EVENTS_PATTERN).unwrap()],
                )
                .unwrap(),
            Arc::new(AvailabilityProjection::new(Arc::clone(&store))),
            shutdown_rx.clone(),
        );
        spawn_consumer(
            broker
                .subscribe(
                    "wallet-ledger.payments",
                    vec![
                        BindingPattern::parse(keys::ADOPTION_APPROVED).unwrap(),
                        BindingPattern::parse(keys::PAYMENT_HOLD_REQUEST).unwrap(),
                        BindingPattern::parse(keys::ADOPTION_REJECTED).unwrap(),
                    ],
                )
                .unwrap(),
            Arc::clone(&processor) as Arc<dyn EventHandler>,
            shutdown_rx.clone(),
        );
        spawn_consumer(
            broker
                .subscribe(
                    "adoption-saga.payment-events",
                    vec![
                        BindingPattern::parse(keys::PAYMENT_COMPLETED).unwrap(),
                        BindingPattern::parse(keys::PAYMENT_HOLD_FAILED).unwrap(),
                    ],
                )
                .unwrap(),
            Arc::new(PaymentEventsHandler::new(Arc::clone(&saga))),
            shutdown_rx,
        );

        Self {
            broker,
            store,
            pets,
            businesses,
            ledger,
            processor,
            saga,
            clock,
            shutdown_tx,
        }
    }

    /// A shelter with one pet on offer at the given fee.
    pub fn shelter_with_pet(&self, fee_minor: u64) -> (Business, Pet) {
        let shelter = self.businesses.register("Oakwood Shelter").unwrap();
        let pet = self
            .pets
            .register("Biscuit", shelter.id, Money::from_minor(fee_minor))
            .unwrap();
        (shelter, pet)
    }

    /// Top up a user's wallet, creating it on first use.
    pub fn fund(&self, user: UserId, minor: u64) {
        self.ledger
            .credit(
                OwnerId::from(user),
                TransactionId::new(),
                Money::from_minor(minor),
                "top-up",
            )
            .unwrap();
    }

    /// Observation queue bound to one routing pattern.
    pub fn tap(&self, queue: &str, pattern: &str) -> Subscription {
        self.broker
            .subscribe(queue, vec![BindingPattern::parse(pattern).unwrap()])
            .unwrap()
    }

    pub fn shutdown(&self) {
        self.shutdown_tx.send(true).ok();
    }
}

/// Poll until `check` passes or two seconds elapse.
pub async fn eventually(what: &str, mut check: impl FnMut() -> bool) {
    let outcome = tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    if outcome.is_err() {
        panic!("timed out waiting for {what}");
    }
}
