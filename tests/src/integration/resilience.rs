//! # Failure Modes
//!
//! What the platform does when a dependency is absent, slow, or handed a
//! message it cannot process.

#[cfg(test)]
mod tests {
    use crate::integration::harness::{eventually, Harness};
    use async_trait::async_trait;
    use chrono::Utc;
    use shared_bus::{connect, BrokerDialer, BusError, EventPayload, EventPublisher, ReconnectPolicy};
    use shared_types::{
        AdoptionId, ApplicationStatus, BusinessId, DomainError, Money, OwnerId, Payment, PaymentId,
        PaymentMethod, PaymentStatus, PetAvailability, PetId, TransactionId, UserId,
    };
    use std::time::Duration;

    /// With no registry bound to the validation queue, the correlation RPC
    /// runs into its deadline and surfaces as a domain error.
    #[tokio::test(flavor = "multi_thread")]
    async fn pet_validation_times_out_without_a_registry() {
        let harness = Harness::start_without_pet_registry();
        let err = harness.saga.apply(UserId::new(), PetId::new()).await.unwrap_err();
        assert!(matches!(
            err,
            adoption_saga::SagaError::Domain(DomainError::ValidationTimeout { .. })
        ));
        assert_eq!(err.to_string(), "validation timed out waiting for pet validation");
        harness.shutdown();
    }

    /// An application stuck in `PaymentPending` past the payment window is
    /// rejected, its hold freed, and its pet relisted.
    #[tokio::test(flavor = "multi_thread")]
    async fn stale_payment_pending_is_reaped_and_compensated() {
        let harness = Harness::start();
        let (shelter, pet) = harness.shelter_with_pet(500);
        let user = UserId::new();
        harness.fund(user, 800);

        let app = harness.saga.apply(user, pet.id).await.unwrap();
        harness.saga.approve(shelter.id, app.id).await.unwrap();
        eventually("the fee hold", || {
            harness
                .ledger
                .wallet(OwnerId::from(user))
                .unwrap()
                .is_some_and(|w| w.find_hold(app.id).is_some())
        })
        .await;

        harness.clock.advance(chrono::Duration::hours(25));
        let expired = harness
            .saga
            .expire_stuck_payments(Duration::from_secs(24 * 60 * 60))
            .await
            .unwrap();
        assert_eq!(expired, 1);

        let rejected = harness.saga.get(app.id).unwrap().unwrap();
        assert_eq!(rejected.status, ApplicationStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("payment window elapsed"));
        eventually("the hold to be released", || {
            harness
                .ledger
                .wallet(OwnerId::from(user))
                .unwrap()
                .is_some_and(|w| w.held_total() == Money::ZERO)
        })
        .await;
        eventually("the pet to be relisted", || {
            harness
                .pets
                .get(pet.id)
                .unwrap()
                .is_some_and(|p| p.availability == PetAvailability::Available)
        })
        .await;

        harness.shutdown();
    }

    /// A settlement for an application nobody has ever seen cannot be
    /// processed; the broker dead-letters it instead of looping.
    #[tokio::test(flavor = "multi_thread")]
    async fn unprocessable_settlement_is_dead_lettered() {
        let harness = Harness::start();
        let now = Utc::now();
        let payment = Payment {
            id: PaymentId::new(),
            user_id: UserId::new(),
            business_id: BusinessId::new(),
            adoption_id: AdoptionId::new(),
            pet_id: PetId::new(),
            amount: Money::from_minor(500),
            status: PaymentStatus::Completed,
            transaction_id: TransactionId::new(),
            payment_method: PaymentMethod::Wallet,
            completed_at: Some(now),
            created_at: now,
        };
        harness
            .broker
            .publish(EventPayload::PaymentCompleted { payment })
            .await;

        eventually("the dead letter", || harness.broker.dead_letter_count() >= 1).await;
        harness.shutdown();
    }

    struct RefusingDialer;

    #[async_trait]
    impl BrokerDialer for RefusingDialer {
        type Conn = ();

        async fn dial(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Err("connection refused".into())
        }
    }

    /// A broker that never answers exhausts the dial budget; the runtime
    /// treats that as fatal rather than running without messaging.
    #[tokio::test]
    async fn unreachable_broker_exhausts_the_dial_budget() {
        let policy = ReconnectPolicy::new(3, Duration::from_millis(1));
        let err = connect(&RefusingDialer, policy).await.unwrap_err();
        assert_eq!(err, BusError::BrokerUnavailable { attempts: 3 });
    }
}
