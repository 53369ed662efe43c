//! # Payment Event Consumers
//!
//! The saga's inbound edge: settlement and hold-failure events advance the
//! application. Hold confirmations are deliberately not consumed here; the
//! application already sits in `PaymentPending` and only real settlement
//! moves it forward.

use crate::coordinator::AdoptionSaga;
use async_trait::async_trait;
use shared_bus::{EventHandler, EventPayload, HandlerError, Message};
use std::sync::Arc;
use tracing::debug;

/// Consumes `payment.completed` and `payment.hold.failed`.
pub struct PaymentEventsHandler {
    saga: Arc<AdoptionSaga>,
}

impl PaymentEventsHandler {
    #[must_use]
    pub fn new(saga: Arc<AdoptionSaga>) -> Self {
        Self { saga }
    }
}

#[async_trait]
impl EventHandler for PaymentEventsHandler {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        match &message.payload {
            EventPayload::PaymentCompleted { payment } => {
                debug!(
                    adoption_id = %payment.adoption_id,
                    payment_id = %payment.id,
                    "settlement received"
                );
                self.saga
                    .mark_paid(payment.adoption_id, payment.id, payment.completed_at)
                    .await?;
                Ok(())
            }
            EventPayload::PaymentHoldFailed {
                adoption_id,
                reason,
                ..
            } => {
                self.saga
                    .fail_payment(*adoption_id, &format!("payment hold failed: {reason}"))
                    .await?;
                Ok(())
            }
            _ => Err(HandlerError::new(format!(
                "unexpected payload on {}",
                message.routing_key
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::Utc;
    use shared_bus::{
        keys, BindingPattern, EventPublisher, InMemoryBroker, PetValidationOutcome, RpcClient,
    };
    use shared_store::{DocumentStore, MemoryStore};
    use shared_types::{
        AdoptionId, ApplicationStatus, BusinessId, Money, Payment, PaymentId, PaymentMethod,
        PaymentStatus, PetId, PetSummary, TransactionId, UserId,
    };
    use std::time::Duration;
    use tokio::sync::watch;

    struct Harness {
        saga: Arc<AdoptionSaga>,
        handler: PaymentEventsHandler,
        shelter: BusinessId,
        _shutdown: watch::Sender<bool>,
    }

    fn harness() -> Harness {
        let broker = Arc::new(InMemoryBroker::new());
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shelter = BusinessId::new();

        let responder_broker = Arc::clone(&broker);
        // Bind the queue before spawning so no request is published ahead
        // of the subscription.
        let mut sub = responder_broker
            .subscribe(
                "pet-responder",
                vec![BindingPattern::parse(keys::PET_VALIDATION_REQUEST).unwrap()],
            )
            .unwrap();
        tokio::spawn(async move {
            while let Some(message) = sub.recv().await {
                if let EventPayload::PetValidationRequest {
                    pet_id,
                    correlation_id,
                } = message.payload
                {
                    responder_broker
                        .publish(EventPayload::PetValidationResponse {
                            correlation_id,
                            outcome: PetValidationOutcome::Available {
                                pet: PetSummary {
                                    pet_id,
                                    name: "Whiskers".to_string(),
                                    adoption_fee: Money::from_minor(500),
                                },
                                business_id: shelter,
                            },
                        })
                        .await;
                }
                sub.ack(&message);
            }
        });

        let rpc = RpcClient::start(
            Arc::clone(&broker),
            "saga.rpc-responses",
            vec![BindingPattern::parse(keys::PET_VALIDATION_RESPONSE_PATTERN).unwrap()],
            Duration::from_secs(2),
            Duration::from_secs(5),
            shutdown_rx,
        )
        .unwrap();

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let saga = Arc::new(AdoptionSaga::new(store, rpc, broker, clock));
        Harness {
            handler: PaymentEventsHandler::new(Arc::clone(&saga)),
            saga,
            shelter,
            _shutdown: shutdown_tx,
        }
    }

    fn settled_payment(adoption_id: AdoptionId, user_id: UserId) -> Payment {
        Payment {
            id: PaymentId::new(),
            user_id,
            business_id: BusinessId::new(),
            adoption_id,
            pet_id: PetId::new(),
            amount: Money::from_minor(500),
            status: PaymentStatus::Completed,
            transaction_id: TransactionId::new(),
            payment_method: PaymentMethod::Wallet,
            completed_at: Some(Utc::now()),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn settlement_completes_the_application() {
        let h = harness();
        let app = h.saga.apply(UserId::new(), PetId::new()).await.unwrap();
        h.saga.approve(h.shelter, app.id).await.unwrap();

        let message = Message::new(EventPayload::PaymentCompleted {
            payment: settled_payment(app.id, app.user_id),
        });
        h.handler.handle(&message).await.unwrap();
        // Redelivery of the same settlement.
        h.handler.handle(&message).await.unwrap();

        assert_eq!(
            h.saga.get(app.id).unwrap().unwrap().status,
            ApplicationStatus::Completed
        );
    }

    #[tokio::test]
    async fn hold_failure_rejects_the_application() {
        let h = harness();
        let app = h.saga.apply(UserId::new(), PetId::new()).await.unwrap();
        h.saga.approve(h.shelter, app.id).await.unwrap();

        let message = Message::new(EventPayload::PaymentHoldFailed {
            user_id: app.user_id,
            adoption_id: app.id,
            amount: Money::from_minor(500),
            reason: "insufficient funds".to_string(),
        });
        h.handler.handle(&message).await.unwrap();

        let stored = h.saga.get(app.id).unwrap().unwrap();
        assert_eq!(stored.status, ApplicationStatus::Rejected);
        assert_eq!(
            stored.rejection_reason.as_deref(),
            Some("payment hold failed: insufficient funds")
        );
    }

    #[tokio::test]
    async fn settlement_for_an_unknown_application_is_rejected() {
        let h = harness();
        let message = Message::new(EventPayload::PaymentCompleted {
            payment: settled_payment(AdoptionId::new(), UserId::new()),
        });
        assert!(h.handler.handle(&message).await.is_err());
    }
}
