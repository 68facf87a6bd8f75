//! Sequential playbook execution.
//!
//! Entries run strictly in order. Each instruction is resolved against state
//! as it stands when the instruction is reached, so later instructions and
//! loops observe everything earlier ones wrote. A failure stops the run;
//! writes made before it remain in state.

use std::sync::Arc;

use deckhand_types::{ContractHandle, MethodSignature, Value};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, info, warn};

use crate::artifacts::ArtifactCache;
use crate::binder::sort_inputs;
use crate::coerce::Coercer;
use crate::error::PlaybookError;
use crate::instruction::{CallKind, Instruction};
use crate::invoker::{CallRecord, ContractCall, ContractInvoker};
use crate::options::RunOptions;
use crate::playbook::PlaybookEntry;
use crate::state::{Namespace, StateStore};

#[derive(Debug, Default)]
struct RunProgress {
    executed: usize,
}

/// Runs playbook entries against an invoker and artifact source.
pub struct Sequencer {
    invoker: Arc<dyn ContractInvoker>,
    artifacts: ArtifactCache,
    coercer: Coercer,
    options: RunOptions,
}

impl Sequencer {
    pub fn new(invoker: Arc<dyn ContractInvoker>, artifacts: ArtifactCache) -> Self {
        Self {
            invoker,
            artifacts,
            coercer: Coercer::default(),
            options: RunOptions::default(),
        }
    }

    pub fn with_coercer(mut self, coercer: Coercer) -> Self {
        self.coercer = coercer;
        self
    }

    pub fn with_options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Runs `entries` in order against `state`.
    ///
    /// # Arguments
    /// - `entries`: Validated playbook entries.
    /// - `state`: The run's state; every write is visible to later entries.
    ///
    /// # Returns
    /// The results with the same nesting as `entries`: one value per
    /// instruction, a list per loop or nested list.
    ///
    /// # Errors
    /// The first failing instruction stops the run. Its error carries the
    /// instruction summary, and writes made before it stay in `state`.
    pub async fn run(&self, entries: &[PlaybookEntry], state: &mut StateStore) -> Result<Value, PlaybookError> {
        let mut progress = RunProgress::default();
        info!(entries = entries.len(), "playbook run started");
        let outcome = self.run_entries(entries, state, &mut progress).await;
        match &outcome {
            Ok(_) => info!(executed = progress.executed, "playbook run finished"),
            Err(error) => warn!(executed = progress.executed, error = %error, "playbook run failed"),
        }
        outcome
    }

    /// Runs a single entry.
    pub async fn run_entry(&self, entry: &PlaybookEntry, state: &mut StateStore) -> Result<Value, PlaybookError> {
        let mut progress = RunProgress::default();
        self.run_one(entry, state, &mut progress).await
    }

    fn run_entries<'a>(
        &'a self,
        entries: &'a [PlaybookEntry],
        state: &'a mut StateStore,
        progress: &'a mut RunProgress,
    ) -> BoxFuture<'a, Result<Value, PlaybookError>> {
        async move {
            let mut results = Vec::with_capacity(entries.len());
            for entry in entries {
                results.push(self.run_one(entry, state, progress).await?);
            }
            Ok(Value::Array(results))
        }
        .boxed()
    }

    fn run_one<'a>(
        &'a self,
        entry: &'a PlaybookEntry,
        state: &'a mut StateStore,
        progress: &'a mut RunProgress,
    ) -> BoxFuture<'a, Result<Value, PlaybookError>> {
        async move {
            match entry {
                PlaybookEntry::Instruction(instruction) => self.execute(instruction, state, progress).await,
                PlaybookEntry::Loop(definition) => {
                    let expanded = definition
                        .expand(state)
                        .map_err(|error| error.within_step(definition.summary()))?;
                    let entries: Vec<PlaybookEntry> = expanded.into_iter().map(PlaybookEntry::Instruction).collect();
                    self.run_entries(&entries, state, progress).await
                }
                PlaybookEntry::Nested(entries) => self.run_entries(entries, state, progress).await,
            }
        }
        .boxed()
    }

    async fn execute(
        &self,
        instruction: &Instruction,
        state: &mut StateStore,
        progress: &mut RunProgress,
    ) -> Result<Value, PlaybookError> {
        if progress.executed > 0
            && let Some(delay) = self.options.step_delay()
        {
            tokio::time::sleep(delay).await;
        }
        progress.executed += 1;

        let summary = instruction.summary();
        debug!(step = progress.executed, summary = %summary, "instruction started");
        let result = self
            .invoke(instruction, state)
            .await
            .map_err(|error| error.within_step(&summary))?;

        let record = CallRecord::from_result(&result);
        info!(
            step = progress.executed,
            summary = %summary,
            address = record.address.as_deref().unwrap_or("-"),
            tx = record.transaction.as_deref().unwrap_or("-"),
            "instruction executed"
        );
        Ok(result)
    }

    async fn invoke(&self, instruction: &Instruction, state: &mut StateStore) -> Result<Value, PlaybookError> {
        ensure_contract_handle(instruction.contract(), state)?;

        let address = match instruction.kind() {
            CallKind::Instance => instruction.resolve_address(state)?,
            CallKind::Static => None,
        };
        let signature = self.signature_for(instruction)?;
        let arguments = sort_inputs(instruction.get_inputs(state), signature.as_ref(), &self.coercer)?;

        let call = ContractCall {
            contract: instruction.contract().to_string(),
            address,
            method: instruction.run().to_string(),
            arguments,
            kind: instruction.kind(),
        };
        let result = self
            .invoker
            .invoke(&call)
            .await
            .map_err(|source| PlaybookError::Invocation {
                contract: call.contract.clone(),
                method: call.method.clone(),
                source,
            })?;

        instruction.write_outputs(&result, state, None)?;
        Ok(result)
    }

    fn signature_for(&self, instruction: &Instruction) -> Result<Option<MethodSignature>, PlaybookError> {
        let run = instruction.run();
        if matches!(run, "link" | "at") {
            return Ok(None);
        }
        let artifact = self
            .artifacts
            .artifact(instruction.contract())
            .map_err(|source| PlaybookError::Artifact {
                contract: instruction.contract().to_string(),
                source,
            })?;
        match artifact.signature_for(run) {
            Some(signature) => Ok(Some(signature)),
            None => Err(PlaybookError::resolution(format!(
                "contract {} has no method `{run}`",
                instruction.contract()
            ))),
        }
    }
}

/// Populates `contracts.<name>` with an unbound handle the first time a
/// contract is used.
fn ensure_contract_handle(contract: &str, state: &mut StateStore) -> Result<(), PlaybookError> {
    if state.get(Namespace::Contracts, contract).is_some() {
        return Ok(());
    }
    debug!(contract, "registering contract handle");
    state.set(Namespace::Contracts, contract, Value::Handle(ContractHandle::new(contract)))
}
