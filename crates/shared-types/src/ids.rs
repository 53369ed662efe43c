//! # Identifiers
//!
//! Newtype wrappers over UUIDv4 for every entity that crosses a service
//! boundary. The wrappers exist so a `PetId` can never be passed where a
//! `UserId` is expected; the cost is a little ceremony here.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// A pet in the catalog.
    PetId
);
uuid_id!(
    /// An end user (adopter).
    UserId
);
uuid_id!(
    /// A business or shelter that owns pets.
    BusinessId
);
uuid_id!(
    /// An adoption application, the saga's identity.
    AdoptionId
);
uuid_id!(
    /// A payment record.
    PaymentId
);
uuid_id!(
    /// A ledger transaction. Generated by the caller *before* the mutating
    /// call so retries after a crash can be detected as duplicates.
    TransactionId
);
uuid_id!(
    /// Links an async request to its eventual response.
    CorrelationId
);

/// The two kinds of wallet owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerRole {
    User,
    Business,
}

impl fmt::Display for OwnerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Business => write!(f, "business"),
        }
    }
}

/// Identifies the single party that owns a wallet.
///
/// Users and businesses live in disjoint id spaces, so the owner id carries
/// its role. The [`OwnerId::storage_key`] form is what wallet documents are
/// keyed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum OwnerId {
    User(UserId),
    Business(BusinessId),
}

impl OwnerId {
    #[must_use]
    pub fn role(&self) -> OwnerRole {
        match self {
            Self::User(_) => OwnerRole::User,
            Self::Business(_) => OwnerRole::Business,
        }
    }

    /// Stable key for the owner's wallet document, e.g. `user:<uuid>`.
    #[must_use]
    pub fn storage_key(&self) -> String {
        match self {
            Self::User(id) => format!("user:{id}"),
            Self::Business(id) => format!("business:{id}"),
        }
    }
}

impl From<UserId> for OwnerId {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<BusinessId> for OwnerId {
    fn from(id: BusinessId) -> Self {
        Self::Business(id)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}
