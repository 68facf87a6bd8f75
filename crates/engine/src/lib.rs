//! # Deckhand Engine
//!
//! The Deckhand engine validates and runs contract playbooks: ordered lists of
//! declarative instructions that deploy contracts, link libraries and call
//! contract methods, threading results through a shared state store.
//!
//! ## Key Features
//!
//! - **Playbook Parsing**: YAML/JSON playbooks with file includes
//! - **State References**: `$inputs`, `$outputs`, `$deployed` and `$contracts` lookups
//! - **Argument Binding**: keyed arguments sorted into ABI order and coerced per Solidity type
//! - **Loops**: `for`/`each` templates expanded against live state
//! - **Pluggable Invocation**: any [`ContractInvoker`] can execute the bound calls
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use deckhand_engine::{
//!     ArtifactCache, DryRunInvoker, InMemoryArtifacts, Namespace, Sequencer, StateStore, count_instructions,
//!     parse_playbook_str,
//! };
//! use deckhand_types::{AbiParam, ContractArtifact, MethodSignature};
//!
//! let entries = parse_playbook_str(r#"
//! - contract: Token
//!   run: new
//!   inputs: [{ supply: 1000 }]
//!   outputs: $deployed.token
//! "#)?;
//!
//! let mut state = StateStore::new();
//! assert_eq!(count_instructions(&entries, &state)?, 1);
//!
//! let artifacts = InMemoryArtifacts::new().with_artifact(ContractArtifact::new(
//!     "Token",
//!     vec![MethodSignature::constructor(vec![AbiParam::new("_supply", "uint256")])],
//! ));
//! let sequencer = Sequencer::new(Arc::new(DryRunInvoker::new()), ArtifactCache::new(Arc::new(artifacts)));
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! runtime.block_on(sequencer.run(&entries, &mut state))?;
//! assert!(state.get(Namespace::Deployed, "token.address").is_some());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - **`state`** / **`path`** / **`resolve`**: the state store and reference lookup
//! - **`instruction`** / **`expand`** / **`playbook`**: validated playbook entries
//! - **`binder`** / **`coerce`**: argument ordering and type conversion
//! - **`outputs`**: writing call results back into state
//! - **`sequencer`** / **`invoker`** / **`artifacts`**: execution and its collaborators
//! - **`document`**: loading playbooks, inputs and state from files

pub mod artifacts;
pub mod binder;
pub mod coerce;
pub mod document;
pub mod error;
pub mod expand;
pub mod instruction;
pub mod invoker;
pub mod options;
pub mod outputs;
pub mod path;
pub mod playbook;
pub mod resolve;
pub mod sequencer;
pub mod state;

pub use artifacts::{ArtifactCache, ArtifactProvider, InMemoryArtifacts};
pub use binder::{CALL_OPTION_KEYS, sort_inputs};
pub use coerce::{Coercer, SolidityType, TypeOverrides};
pub use document::{parse_inputs_file, parse_playbook_file, parse_playbook_str, parse_state_file};
pub use error::{ErrorKind, PlaybookError};
pub use expand::LoopDefinition;
pub use instruction::{CallKind, Instruction, STATIC_METHODS};
pub use invoker::{CallRecord, ContractCall, ContractInvoker, DryRunInvoker};
pub use options::RunOptions;
pub use outputs::write_outputs;
pub use playbook::{PlaybookEntry, build_playbook, count_instructions};
pub use sequencer::Sequencer;
pub use state::{Namespace, StateStore};
