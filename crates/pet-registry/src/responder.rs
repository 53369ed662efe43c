//! # Validation Responders
//!
//! The server side of the correlation RPC protocol: consume a validation
//! request from the well-known request key, evaluate it against the
//! catalog, and publish the response on the correlation-suffixed key so
//! only the waiting caller's queue matches.
//!
//! Pet validation chains a business validation call of its own: a pet
//! whose shelter is suspended is not adoptable, whatever its availability
//! field says.

use crate::registry::{BusinessRegistry, PetRegistry};
use async_trait::async_trait;
use shared_bus::{
    BusinessValidationOutcome, EventHandler, EventPayload, EventPublisher, HandlerError, Message,
    PetValidationOutcome, RpcClient,
};
use shared_types::{BusinessStatus, PetAvailability, PetId, PetSummary};
use std::sync::Arc;
use tracing::debug;

/// Answers `pet.validation.request`.
pub struct PetValidationResponder {
    registry: PetRegistry,
    rpc: Arc<RpcClient>,
    publisher: Arc<dyn EventPublisher>,
}

impl PetValidationResponder {
    pub fn new(
        registry: PetRegistry,
        rpc: Arc<RpcClient>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            registry,
            rpc,
            publisher,
        }
    }

    async fn evaluate(&self, pet_id: PetId) -> Result<PetValidationOutcome, HandlerError> {
        let Some(pet) = self.registry.get(pet_id)? else {
            return Ok(PetValidationOutcome::Unavailable {
                reason: format!("pet {pet_id} not found"),
            });
        };
        if pet.availability != PetAvailability::Available {
            return Ok(PetValidationOutcome::Unavailable {
                reason: format!("pet is {}", pet.availability),
            });
        }

        let response = self
            .rpc
            .call("validate_business", None, |correlation_id| {
                EventPayload::BusinessValidationRequest {
                    business_id: pet.business_id,
                    correlation_id,
                }
            })
            .await?;
        match response {
            EventPayload::BusinessValidationResponse {
                outcome: BusinessValidationOutcome::Active,
                ..
            } => Ok(PetValidationOutcome::Available {
                pet: PetSummary::from(&pet),
                business_id: pet.business_id,
            }),
            EventPayload::BusinessValidationResponse {
                outcome: BusinessValidationOutcome::Inactive { reason },
                ..
            } => Ok(PetValidationOutcome::Unavailable {
                reason: format!("business inactive: {reason}"),
            }),
            _ => Err(HandlerError::new(
                "unexpected business validation response payload",
            )),
        }
    }
}

#[async_trait]
impl EventHandler for PetValidationResponder {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let EventPayload::PetValidationRequest {
            pet_id,
            correlation_id,
        } = &message.payload
        else {
            return Err(HandlerError::new(format!(
                "unexpected payload on {}",
                message.routing_key
            )));
        };

        let outcome = self.evaluate(*pet_id).await?;
        debug!(
            pet_id = %pet_id,
            correlation_id = %correlation_id,
            outcome = ?outcome,
            "pet validation answered"
        );
        self.publisher
            .publish(EventPayload::PetValidationResponse {
                correlation_id: *correlation_id,
                outcome,
            })
            .await;
        Ok(())
    }
}

/// Answers `business.validation.request`.
pub struct BusinessValidationResponder {
    registry: BusinessRegistry,
    publisher: Arc<dyn EventPublisher>,
}

impl BusinessValidationResponder {
    pub fn new(registry: BusinessRegistry, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            registry,
            publisher,
        }
    }
}

#[async_trait]
impl EventHandler for BusinessValidationResponder {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let EventPayload::BusinessValidationRequest {
            business_id,
            correlation_id,
        } = &message.payload
        else {
            return Err(HandlerError::new(format!(
                "unexpected payload on {}",
                message.routing_key
            )));
        };

        let outcome = match self.registry.get(*business_id)? {
            None => BusinessValidationOutcome::Inactive {
                reason: format!("business {business_id} not found"),
            },
            Some(business) if business.status == BusinessStatus::Active => {
                BusinessValidationOutcome::Active
            }
            Some(_) => BusinessValidationOutcome::Inactive {
                reason: "business is suspended".to_string(),
            },
        };
        debug!(
            business_id = %business_id,
            correlation_id = %correlation_id,
            outcome = ?outcome,
            "business validation answered"
        );
        self.publisher
            .publish(EventPayload::BusinessValidationResponse {
                correlation_id: *correlation_id,
                outcome,
            })
            .await;
        Ok(())
    }
}
