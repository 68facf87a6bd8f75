//! Shared data model for deckhand playbooks.
//!
//! This crate holds the types that both the engine and the command line
//! front end speak: the dynamic [`Value`] carried through playbook state,
//! compiled contract artifacts and their ABI entries, and the output
//! destination forms an instruction can declare.

pub mod abi;
pub mod output;
pub mod value;

pub use abi::{AbiEntryKind, AbiParam, ContractArtifact, MethodSignature};
pub use output::{OutputSpec, OutputTargets};
pub use value::{ContractHandle, Map, Value, ValueShape};
