//! UtxoManager: the leaf contract queried by the selector and fee engine,
//! mutated during submit/confirm.
//!
//! Modeled on `BlockchainState::utxo_set`
//! (`core/src/state.rs`, a `HashMap<OutPoint, TxOutput>`), generalized from
//! raw insert/remove to an explicit AVAILABLE/REFERENCED/SPENT status
//! machine, so a `reference` can fail instead of silently
//! overwriting an already-locked entry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::tx::{OutPoint, TxOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtxoCategory {
    Asset,
    Resource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtxoStatus {
    Available,
    Referenced,
    Spent,
}

/// Either the output content is cached alongside the UTXO record, or only
/// its existence is tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentStrategy {
    CachedOutput(TxOutput),
    ReferenceOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utxo {
    pub outpoint: OutPoint,
    pub category: UtxoCategory,
    pub status: UtxoStatus,
    pub content_strategy: ContentStrategy,
    pub creation_block_height: u64,
}

impl Utxo {
    /// The underlying `TxOutput`, when the content strategy caches it.
    pub fn output(&self) -> Option<&TxOutput> {
        match &self.content_strategy {
            ContentStrategy::CachedOutput(output) => Some(output),
            ContentStrategy::ReferenceOnly => None,
        }
    }
}

/// Filter applied to `list_by_owner`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListFilter {
    pub category: Option<UtxoCategory>,
    pub include_locked: bool,
}

impl ListFilter {
    pub fn assets_available_only() -> Self {
        ListFilter {
            category: Some(UtxoCategory::Asset),
            include_locked: false,
        }
    }
}

#[async_trait]
pub trait UtxoManager: Send + Sync {
    async fn get(&self, outpoint: &OutPoint) -> Result<Option<Utxo>, CoreError>;

    /// Stable within a call; different calls may observe a different order.
    async fn list_by_owner(
        &self,
        owner: &crate::address::Address,
        filter: ListFilter,
    ) -> Result<Vec<Utxo>, CoreError>;

    /// Atomically transitions AVAILABLE -> REFERENCED; fails with
    /// `LockConflict` if the UTXO is not currently AVAILABLE.
    async fn reference(&self, outpoint: &OutPoint) -> Result<(), CoreError>;

    /// Reverses `reference`.
    async fn unreference(&self, outpoint: &OutPoint) -> Result<(), CoreError>;
}

/// In-process reference implementation backing tests and any embedding
/// binary that has not wired a real store.
#[derive(Default)]
pub struct InMemoryUtxoManager {
    entries: RwLock<HashMap<OutPoint, Utxo>>,
}

impl InMemoryUtxoManager {
    pub fn new() -> Self {
        InMemoryUtxoManager {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Test/bootstrap helper: insert an AVAILABLE asset UTXO directly.
    pub async fn seed_available(&self, outpoint: OutPoint, output: TxOutput, creation_block_height: u64) {
        let utxo = Utxo {
            outpoint,
            category: UtxoCategory::Asset,
            status: UtxoStatus::Available,
            content_strategy: ContentStrategy::CachedOutput(output),
            creation_block_height,
        };
        self.entries.write().await.insert(outpoint, utxo);
    }
}

#[async_trait]
impl UtxoManager for InMemoryUtxoManager {
    async fn get(&self, outpoint: &OutPoint) -> Result<Option<Utxo>, CoreError> {
        Ok(self.entries.read().await.get(outpoint).cloned())
    }

    async fn list_by_owner(
        &self,
        owner: &crate::address::Address,
        filter: ListFilter,
    ) -> Result<Vec<Utxo>, CoreError> {
        let entries = self.entries.read().await;
        let mut matches: Vec<Utxo> = entries
            .values()
            .filter(|utxo| {
                let owner_matches = utxo.output().map(|o| &o.owner == owner).unwrap_or(false);
                let category_matches = filter
                    .category
                    .map(|cat| cat == utxo.category)
                    .unwrap_or(true);
                let status_matches = filter.include_locked || utxo.status == UtxoStatus::Available;
                owner_matches && category_matches && status_matches
            })
            .cloned()
            .collect();
        // Deterministic within-call ordering; the map's own iteration order
        // is not stable across calls, so we sort by outpoint.
        matches.sort_by_key(|utxo| (utxo.outpoint.tx_id, utxo.outpoint.output_index));
        Ok(matches)
    }

    async fn reference(&self, outpoint: &OutPoint) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(outpoint) {
            Some(utxo) if utxo.status == UtxoStatus::Available => {
                utxo.status = UtxoStatus::Referenced;
                Ok(())
            }
            Some(_) => Err(CoreError::LockConflict(*outpoint)),
            None => Err(CoreError::NotFound(format!("{outpoint:?}"))),
        }
    }

    async fn unreference(&self, outpoint: &OutPoint) -> Result<(), CoreError> {
        let mut entries = self.entries.write().await;
        match entries.get_mut(outpoint) {
            Some(utxo) if utxo.status == UtxoStatus::Referenced => {
                utxo.status = UtxoStatus::Available;
                Ok(())
            }
            Some(_) => Err(CoreError::LockConflict(*outpoint)),
            None => Err(CoreError::NotFound(format!("{outpoint:?}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Address;
    use crate::tx::AssetContent;

    fn sample_output(owner: Address) -> TxOutput {
        TxOutput::asset(owner, AssetContent::NativeCoin { amount: "10".into() })
    }

    #[tokio::test]
    async fn double_reference_fails_with_lock_conflict() {
        let manager = InMemoryUtxoManager::new();
        let outpoint = OutPoint::new([9u8; 32], 0);
        manager.seed_available(outpoint, sample_output(Address::from_bytes([1; 20])), 0).await;

        manager.reference(&outpoint).await.unwrap();
        let second = manager.reference(&outpoint).await;
        assert!(matches!(second, Err(CoreError::LockConflict(_))));
    }

    #[tokio::test]
    async fn unreference_restores_availability() {
        let manager = InMemoryUtxoManager::new();
        let outpoint = OutPoint::new([3u8; 32], 1);
        manager.seed_available(outpoint, sample_output(Address::from_bytes([1; 20])), 0).await;

        manager.reference(&outpoint).await.unwrap();
        manager.unreference(&outpoint).await.unwrap();
        assert!(manager.reference(&outpoint).await.is_ok());
    }

    #[tokio::test]
    async fn list_by_owner_is_stable_and_filters_locked() {
        let manager = InMemoryUtxoManager::new();
        let owner = Address::from_bytes([2; 20]);
        for i in 0..3u8 {
            manager
                .seed_available(OutPoint::new([i; 32], 0), sample_output(owner), 0)
                .await;
        }
        let first = manager
            .list_by_owner(&owner, ListFilter::assets_available_only())
            .await
            .unwrap();
        let second = manager
            .list_by_owner(&owner, ListFilter::assets_available_only())
            .await
            .unwrap();
        assert_eq!(
            first.iter().map(|u| u.outpoint).collect::<Vec<_>>(),
            second.iter().map(|u| u.outpoint).collect::<Vec<_>>()
        );
        assert_eq!(first.len(), 3);
    }
}
