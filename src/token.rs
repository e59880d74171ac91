//! `TokenKey`: the canonical string identity used to bucket fees and
//! outputs across native coin and contract-token kinds.
//!
//! Two outputs aggregate into the same fee bucket iff their `TokenKey`s are
//! byte-equal, and coinbase outputs are ordered by byte-lexicographic
//! `TokenKey` order — so the canonical form here is a thin wrapper around
//! `String` rather than a struct, since `String`/`str` ordering in Rust is
//! already byte-lexicographic and gives us both properties for free.

use std::fmt;
use std::str::FromStr;

use num_bigint::BigUint;
use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::CoreError;
use crate::tx::{AssetContent, TokenIdentifier};

/// The three contract-token kinds a `TokenKey` can name, matching the
/// `ft|nft|sft` tag in the canonical string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Fungible,
    NonFungible,
    SemiFungible,
}

impl TokenKind {
    fn as_str(self) -> &'static str {
        match self {
            TokenKind::Fungible => "ft",
            TokenKind::NonFungible => "nft",
            TokenKind::SemiFungible => "sft",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "ft" => Some(TokenKind::Fungible),
            "nft" => Some(TokenKind::NonFungible),
            "sft" => Some(TokenKind::SemiFungible),
            _ => None,
        }
    }
}

/// Canonical identity of a token kind for fee/value bucketing.
///
/// `"native"` for the chain's native coin; `"<ft|nft|sft>|<contract_hex>|<token_info>"`
/// for contract tokens, where `token_info` is `<class_id>` for fungible,
/// `<nft_id>` for non-fungible, and `<batch_id>:<instance_id>` for
/// semi-fungible tokens. The inner `String` is always the fully rendered
/// canonical form — constructors normalize eagerly so `Ord`/`Eq`/`Hash` can
/// just delegate to the wrapped string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenKey(String);

impl TokenKey {
    pub const NATIVE: &'static str = "native";

    /// The chain's native coin.
    pub fn native() -> Self {
        TokenKey(Self::NATIVE.to_string())
    }

    pub fn is_native(&self) -> bool {
        self.0 == Self::NATIVE
    }

    /// A fungible contract token, identified by contract address and class id.
    pub fn fungible(contract_hex: &str, class_id: &str) -> Self {
        TokenKey(format!("ft|{contract_hex}|{class_id}"))
    }

    /// A non-fungible contract token, identified by contract address and nft id.
    pub fn non_fungible(contract_hex: &str, nft_id: &str) -> Self {
        TokenKey(format!("nft|{contract_hex}|{nft_id}"))
    }

    /// A semi-fungible contract token, identified by contract address, batch
    /// id and instance id within the batch.
    pub fn semi_fungible(contract_hex: &str, batch_id: &str, instance_id: &str) -> Self {
        TokenKey(format!("sft|{contract_hex}|{batch_id}:{instance_id}"))
    }

    /// The raw canonical string, e.g. for use as a cache key or wire value.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decompose a contract-token key back into its kind, contract address
    /// and token-info parts, the way `CoinbaseBuilder` must when it
    /// reconstructs output content from an aggregated fee bucket.
    pub fn parts(&self) -> Option<(TokenKind, &str, &str)> {
        let mut segments = self.0.splitn(3, '|');
        let kind = TokenKind::from_str(segments.next()?)?;
        let contract_hex = segments.next()?;
        let token_info = segments.next()?;
        Some((kind, contract_hex, token_info))
    }

    /// Reconstruct the `AssetContent` an output carrying `amount` of this
    /// token would hold, the way `CoinbaseBuilder` does when it rebuilds
    /// reward outputs from an aggregated fee bucket.
    pub fn to_asset_content(&self, amount: &BigUint) -> Result<AssetContent, CoreError> {
        if self.is_native() {
            return Ok(AssetContent::NativeCoin {
                amount: amount.to_string(),
            });
        }
        let (kind, contract_hex, token_info) = self
            .parts()
            .ok_or_else(|| CoreError::Internal(format!("malformed token key: {self}")))?;
        let contract_bytes = hex::decode(contract_hex)
            .map_err(|e| CoreError::Internal(format!("invalid contract hex in token key: {e}")))?;
        let contract_array: [u8; 20] = contract_bytes
            .try_into()
            .map_err(|_| CoreError::Internal("contract address must be 20 bytes".to_string()))?;
        let contract_address = Address::from_bytes(contract_array);
        let token_identifier = match kind {
            TokenKind::Fungible => TokenIdentifier::FungibleClassId(token_info.to_string()),
            TokenKind::NonFungible => TokenIdentifier::NftUniqueId(token_info.to_string()),
            TokenKind::SemiFungible => {
                let (batch_id, instance_id) = token_info
                    .split_once(':')
                    .ok_or_else(|| CoreError::Internal(format!("malformed sft token key: {self}")))?;
                TokenIdentifier::SemiFungibleId {
                    batch_id: batch_id.to_string(),
                    instance_id: instance_id.to_string(),
                }
            }
        };
        Ok(AssetContent::ContractToken {
            contract_address,
            token_identifier,
            amount: amount.to_string(),
        })
    }
}

impl fmt::Display for TokenKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::NATIVE {
            return Ok(TokenKey::native());
        }
        let mut segments = s.splitn(3, '|');
        let kind = segments
            .next()
            .and_then(TokenKind::from_str)
            .ok_or_else(|| CoreError::FormatInvalid(format!("malformed token key: {s}")))?;
        let contract_hex = segments
            .next()
            .ok_or_else(|| CoreError::FormatInvalid(format!("malformed token key: {s}")))?;
        let token_info = segments
            .next()
            .ok_or_else(|| CoreError::FormatInvalid(format!("malformed token key: {s}")))?;
        Ok(match kind {
            TokenKind::Fungible => TokenKey::fungible(contract_hex, token_info),
            TokenKind::NonFungible => TokenKey::non_fungible(contract_hex, token_info),
            TokenKind::SemiFungible => {
                let (batch_id, instance_id) = token_info
                    .split_once(':')
                    .ok_or_else(|| CoreError::FormatInvalid(format!("malformed sft token key: {s}")))?;
                TokenKey::semi_fungible(contract_hex, batch_id, instance_id)
            }
        })
    }
}
