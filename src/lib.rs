//! weisyn-core — the EUTXO transaction construction, validation, and
//! fee-accounting engine. Assembles unsigned transactions for
//! every flow, enforces fee closure across heterogeneous token kinds,
//! aggregates coinbases deterministically, and bridges the async
//! sign/submit lifecycle through a TTL'd pending-transaction cache.
//!
//! Module layout follows a leaf-first dependency order:
//! `hasher` and `utxo` have no internal dependencies; `fee` depends on
//! both; `selector` wraps `utxo`; `assembler` depends on `selector`,
//! `fee`, `hasher` and `cache`; `coinbase` depends on `fee`;
//! `lifecycle`/`validation` sit above and orchestrate everything else.

pub mod address;
pub mod assembler;
pub mod cache;
pub mod capabilities;
pub mod coinbase;
pub mod config;
pub mod context;
pub mod digest;
pub mod error;
pub mod fee;
pub mod hasher;
pub mod lifecycle;
pub mod selector;
pub mod token;
pub mod tx;
pub mod utxo;
pub mod validation;

pub use address::Address;
pub use error::{CoreError, CoreResult, FeeError};
pub use tx::{OutPoint, Transaction, TxInput, TxOutput};
