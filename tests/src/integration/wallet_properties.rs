//! # Ledger Invariants
//!
//! The journal's guarantees exercised through the full [`WalletLedger`]
//! rather than wallet-by-wallet unit fixtures: available funds never go
//! negative, and a transaction id lands at most once no matter how the
//! traffic interleaves.

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use shared_bus::InMemoryBroker;
    use shared_store::MemoryStore;
    use shared_types::{AdoptionId, Money, OwnerId, TransactionId, UserId};
    use std::sync::Arc;
    use wallet_ledger::{Applied, WalletLedger};

    fn ledger() -> WalletLedger {
        WalletLedger::new(Arc::new(MemoryStore::new()), Arc::new(InMemoryBroker::new()))
    }

    /// Random credit/debit/hold/release traffic against one wallet. Failed
    /// operations are fine; a wallet whose holds exceed its balance is not.
    #[test]
    fn available_funds_never_go_negative_under_random_traffic() {
        let ledger = ledger();
        let owner = OwnerId::from(UserId::new());
        let mut rng = StdRng::seed_from_u64(7);
        let mut open_refs: Vec<AdoptionId> = Vec::new();

        for _ in 0..200 {
            let amount = Money::from_minor(rng.gen_range(1..=500));
            match rng.gen_range(0..4u8) {
                0 => {
                    ledger
                        .credit(owner, TransactionId::new(), amount, "top-up")
                        .unwrap();
                }
                1 => {
                    let _ = ledger.debit(owner, TransactionId::new(), amount, "withdrawal");
                }
                2 => {
                    let reference = AdoptionId::new();
                    if ledger
                        .hold(owner, TransactionId::new(), reference, amount)
                        .is_ok()
                    {
                        open_refs.push(reference);
                    }
                }
                _ => {
                    if !open_refs.is_empty() {
                        let reference = open_refs.remove(rng.gen_range(0..open_refs.len()));
                        ledger.release(owner, TransactionId::new(), reference).unwrap();
                    }
                }
            }

            if let Some(wallet) = ledger.wallet(owner).unwrap() {
                assert!(
                    wallet.held_total() <= wallet.balance,
                    "holds {} exceed balance {}",
                    wallet.held_total(),
                    wallet.balance
                );
                assert_eq!(
                    wallet.available(),
                    wallet.balance.saturating_sub(wallet.held_total())
                );
            }
        }
    }

    #[test]
    fn a_transaction_id_lands_at_most_once() {
        let ledger = ledger();
        let owner = OwnerId::from(UserId::new());
        let txn = TransactionId::new();

        assert_eq!(
            ledger
                .credit(owner, txn, Money::from_minor(1_000), "top-up")
                .unwrap(),
            Applied::Fresh
        );
        assert_eq!(
            ledger
                .credit(owner, txn, Money::from_minor(1_000), "top-up")
                .unwrap(),
            Applied::Duplicate
        );

        let wallet = ledger.wallet(owner).unwrap().unwrap();
        assert_eq!(wallet.balance, Money::from_minor(1_000));
        assert_eq!(wallet.transactions.len(), 1);
    }

    #[test]
    fn releasing_twice_frees_the_funds_once() {
        let ledger = ledger();
        let owner = OwnerId::from(UserId::new());
        let reference = AdoptionId::new();
        ledger
            .credit(owner, TransactionId::new(), Money::from_minor(1_000), "top-up")
            .unwrap();
        ledger
            .hold(owner, TransactionId::new(), reference, Money::from_minor(400))
            .unwrap();

        assert_eq!(
            ledger.release(owner, TransactionId::new(), reference).unwrap(),
            Applied::Fresh
        );
        assert_eq!(
            ledger.release(owner, TransactionId::new(), reference).unwrap(),
            Applied::Duplicate
        );
        let wallet = ledger.wallet(owner).unwrap().unwrap();
        assert_eq!(wallet.available(), Money::from_minor(1_000));
    }

    /// Holds are keyed by the adoption they back: re-requesting the same
    /// reservation is absorbed, a different adoption stacks a second hold.
    #[test]
    fn one_hold_per_adoption_reference() {
        let ledger = ledger();
        let owner = OwnerId::from(UserId::new());
        let reference = AdoptionId::new();
        ledger
            .credit(owner, TransactionId::new(), Money::from_minor(1_000), "top-up")
            .unwrap();

        assert_eq!(
            ledger
                .hold(owner, TransactionId::new(), reference, Money::from_minor(300))
                .unwrap(),
            Applied::Fresh
        );
        assert_eq!(
            ledger
                .hold(owner, TransactionId::new(), reference, Money::from_minor(300))
                .unwrap(),
            Applied::Duplicate
        );
        assert_eq!(
            ledger
                .hold(
                    owner,
                    TransactionId::new(),
                    AdoptionId::new(),
                    Money::from_minor(300)
                )
                .unwrap(),
            Applied::Fresh
        );

        let wallet = ledger.wallet(owner).unwrap().unwrap();
        assert_eq!(wallet.held_total(), Money::from_minor(600));
        assert_eq!(wallet.available(), Money::from_minor(400));
    }
}
