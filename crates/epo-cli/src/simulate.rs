//! Concurrent creation simulator
//!
//! Fires N study creations under one program at once against in-memory
//! backends with artificial storage latency, then reports which codes were
//! assigned and how many requests lost a code collision.

use anyhow::Context;
use epo_backend::memory::InMemoryStorageBackend;
use epo_codegen::CodeStrategy;
use epo_core::{
    InMemoryEntityStore, OrchestratorConfig, ProvisionError, ProvisioningOrchestrator,
};
use epo_model::{Program, ProvisioningOptions, StorageDrive, StorageDriveType, Study};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub(crate) struct SimulationConfig {
    pub(crate) studies: usize,
    pub(crate) strategy: CodeStrategy,
    pub(crate) latency: Duration,
    pub(crate) program_code: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SimulationReport {
    pub(crate) strategy: CodeStrategy,
    pub(crate) requested: usize,
    pub(crate) created: usize,
    pub(crate) conflicts: usize,
    pub(crate) other_failures: usize,
    /// Remote folders left without a local record
    pub(crate) orphaned: usize,
    pub(crate) codes: Vec<String>,
    /// Codes persisted more than once; must stay empty
    pub(crate) duplicates: Vec<String>,
    pub(crate) elapsed_ms: u64,
}

impl SimulationReport {
    pub(crate) fn passed(&self) -> bool {
        self.duplicates.is_empty()
    }

    pub(crate) fn generate_text(&self) -> String {
        let mut out = String::new();
        out.push_str("Simulation Report:\n");
        out.push_str(&format!("  Strategy: {:?}\n", self.strategy));
        out.push_str(&format!("  Requested: {}\n", self.requested));
        out.push_str(&format!("  Created: {}\n", self.created));
        out.push_str(&format!("  Code conflicts: {}\n", self.conflicts));
        out.push_str(&format!("  Other failures: {}\n", self.other_failures));
        out.push_str(&format!("  Orphaned folders: {}\n", self.orphaned));
        out.push_str(&format!("  Codes: {}\n", self.codes.join(", ")));
        out.push_str(&format!("  Duplicate codes persisted: {}\n", self.duplicates.len()));
        out.push_str(&format!("  Elapsed: {}ms\n", self.elapsed_ms));
        out.push_str(&format!(
            "  Status: {}\n",
            if self.passed() { "PASSED" } else { "FAILED" }
        ));
        out
    }
}

pub(crate) async fn run_simulation(config: SimulationConfig) -> anyhow::Result<SimulationReport> {
    let drive = StorageDrive::new("sim", StorageDriveType::LocalFileSystem, "/sim");
    let orchestrator_config = OrchestratorConfig::default()
        .with_drive(drive)
        .with_program_root_folder("programs")
        .with_code_strategy(config.strategy);

    let storage = Arc::new(InMemoryStorageBackend::new("sim"));
    let mut builder = orchestrator_config.backends_builder()?;
    builder.register_storage(StorageDriveType::LocalFileSystem, storage.clone())?;

    let store = Arc::new(InMemoryEntityStore::new());
    let orchestrator =
        ProvisioningOrchestrator::new(orchestrator_config, Arc::new(builder.build()), store.clone());

    let program = orchestrator
        .create_program(
            Program::new(&config.program_code, "Simulation"),
            ProvisioningOptions::new(),
        )
        .await
        .context("seeding simulation program")?
        .entity;
    let program_id = program.id.context("seeded program has no id")?;

    storage.faults().set_latency(config.latency);
    tracing::info!(
        studies = config.studies,
        strategy = ?config.strategy,
        latency_ms = u64::try_from(config.latency.as_millis()).unwrap_or(u64::MAX),
        "starting simulation"
    );

    let started = Instant::now();
    let results = join_all((0..config.studies).map(|i| {
        orchestrator.create_study(
            Study::new(program_id, format!("Simulated study {i}")),
            ProvisioningOptions::new(),
        )
    }))
    .await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let mut created = 0;
    let mut conflicts = 0;
    let mut other_failures = 0;
    let mut orphaned = 0;
    for result in results {
        match result {
            Ok(_) => created += 1,
            Err(ProvisionError::PersistenceConflict { orphaned: o, .. }) => {
                conflicts += 1;
                orphaned += o.len();
            }
            Err(err) => {
                tracing::warn!(error = %err, "simulated creation failed");
                other_failures += 1;
            }
        }
    }

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for study in store.studies() {
        if let Some(code) = study.code {
            *counts.entry(code).or_default() += 1;
        }
    }
    let duplicates = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(code, _)| code.clone())
        .collect();

    Ok(SimulationReport {
        strategy: config.strategy,
        requested: config.studies,
        created,
        conflicts,
        other_failures,
        orphaned,
        codes: counts.into_keys().collect(),
        duplicates,
        elapsed_ms,
    })
}
