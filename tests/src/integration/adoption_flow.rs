//! # Adoption Flow
//!
//! The full choreography, end to end:
//!
//! ```text
//! [Saga] ──adoption.approved──→ [Ledger] ──payment.hold.confirmed──→
//! [User pays] ──payment.completed──→ [Saga] ──adoption.completed──→ [Registry]
//! ```

#[cfg(test)]
mod tests {
    use crate::integration::harness::{eventually, Harness};
    use shared_bus::{keys, EventPayload, EventPublisher};
    use shared_types::{
        ApplicationStatus, DomainError, Money, OwnerId, PaymentStatus, PetAvailability, UserId,
    };
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread")]
    async fn fee_flows_from_applicant_to_shelter() {
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

        let payment = harness.processor.complete_payment(user, app.id).await.unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.amount, Money::from_minor(500));

        eventually("settlement to converge", || {
            let completed = harness
                .saga
                .get(app.id)
                .unwrap()
                .is_some_and(|a| a.status == ApplicationStatus::Completed);
            let adopted = harness
                .pets
                .get(pet.id)
                .unwrap()
                .is_some_and(|p| p.availability == PetAvailability::Adopted);
            completed && adopted
        })
        .await;

        let payer = harness.ledger.wallet(OwnerId::from(user)).unwrap().unwrap();
        assert_eq!(payer.balance, Money::from_minor(300));
        assert_eq!(payer.held_total(), Money::ZERO);
        let payee = harness
            .ledger
            .wallet(OwnerId::from(shelter.id))
            .unwrap()
            .unwrap();
        assert_eq!(payee.balance, Money::from_minor(500));

        harness.shutdown();
    }

    /// Redelivering `adoption.approved` must confirm the hold again without
    /// reserving the fee twice.
    #[tokio::test(flavor = "multi_thread")]
    async fn redelivered_approval_reserves_the_fee_once() {
        let harness = Harness::start();
        let (shelter, pet) = harness.shelter_with_pet(500);
        let user = UserId::new();
        harness.fund(user, 800);
        let mut confirmations = harness.tap("tap.confirmed", keys::PAYMENT_HOLD_CONFIRMED);

        let app = harness.saga.apply(user, pet.id).await.unwrap();
        harness.saga.approve(shelter.id, app.id).await.unwrap();
        tokio::time::timeout(Duration::from_secs(2), confirmations.recv())
            .await
            .expect("first confirmation never arrived");

        harness
            .broker
            .publish(EventPayload::AdoptionApproved {
                adoption_id: app.id,
                user_id: user,
                pet_id: pet.id,
                business_id: shelter.id,
                adoption_fee: Money::from_minor(500),
            })
            .await;
        tokio::time::timeout(Duration::from_secs(2), confirmations.recv())
            .await
            .expect("redelivery was not re-confirmed");

        let wallet = harness.ledger.wallet(OwnerId::from(user)).unwrap().unwrap();
        assert_eq!(wallet.held_total(), Money::from_minor(500));
        assert_eq!(wallet.available(), Money::from_minor(300));

        harness.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn approving_twice_reports_the_current_state() {
        let harness = Harness::start();
        let (shelter, pet) = harness.shelter_with_pet(500);
        let user = UserId::new();
        harness.fund(user, 800);

        let app = harness.saga.apply(user, pet.id).await.unwrap();
        harness.saga.approve(shelter.id, app.id).await.unwrap();
        let err = harness.saga.approve(shelter.id, app.id).await.unwrap_err();
        assert_eq!(err.to_string(), "already payment_pending");

        harness.shutdown();
    }

    /// An applicant who cannot cover the fee: the hold fails, the saga
    /// compensates, and the pet goes back on offer.
    #[tokio::test(flavor = "multi_thread")]
    async fn insufficient_funds_reject_and_relist_the_pet() {
        let harness = Harness::start();
        let (shelter, pet) = harness.shelter_with_pet(500);
        let user = UserId::new();
        harness.fund(user, 100);

        let app = harness.saga.apply(user, pet.id).await.unwrap();
        harness.saga.approve(shelter.id, app.id).await.unwrap();

        eventually("the compensating rejection", || {
            harness
                .saga
                .get(app.id)
                .unwrap()
                .is_some_and(|a| a.status == ApplicationStatus::Rejected)
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
        eventually("the payment record to fail", || {
            harness
                .ledger
                .payment(app.id)
                .unwrap()
                .is_some_and(|p| p.status == PaymentStatus::Failed)
        })
        .await;
        let wallet = harness.ledger.wallet(OwnerId::from(user)).unwrap().unwrap();
        assert_eq!(wallet.held_total(), Money::ZERO);
        assert_eq!(wallet.balance, Money::from_minor(100));

        harness.shutdown();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn a_rejected_applicant_may_apply_again() {
        let harness = Harness::start();
        let (shelter, pet) = harness.shelter_with_pet(500);
        let user = UserId::new();

        let first = harness.saga.apply(user, pet.id).await.unwrap();
        let err = harness.saga.apply(user, pet.id).await.unwrap_err();
        assert!(matches!(
            err,
            adoption_saga::SagaError::Domain(DomainError::DuplicateApplication { .. })
        ));

        harness
            .saga
            .reject(shelter.id, first.id, "home visit declined")
            .await
            .unwrap();
        let second = harness.saga.apply(user, pet.id).await.unwrap();
        assert_ne!(second.id, first.id);
        assert_eq!(second.status, ApplicationStatus::Pending);

        harness.shutdown();
    }
}
