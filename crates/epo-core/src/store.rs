//! Local persistence
//!
//! [`EntityStore`] is the orchestrator's only local side effect. Each `save_*`
//! call is one transaction: uniqueness checks and the write happen atomically
//! and no remote call runs inside it.
//!
//! [`InMemoryEntityStore`] is the reference implementation. It also serves as
//! the [`CodeCounter`] for code generation and keeps the code sequences next
//! to its tables, so they live exactly as long as the records they number.

use crate::error::StoreError;
use async_trait::async_trait;
use epo_codegen::{code_suffix, CodeCounter, CounterError, SequenceScope, SequenceStore};
use epo_model::{Assay, EntityId, EntityKind, EntityRef, ExternalLink, Program, Study};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Persistence for programs, studies and assays
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_program(&self, id: EntityId) -> Result<Option<Program>, StoreError>;

    async fn get_study(&self, id: EntityId) -> Result<Option<Study>, StoreError>;

    async fn get_assay(&self, id: EntityId) -> Result<Option<Assay>, StoreError>;

    async fn find_program_by_name(&self, name: &str) -> Result<Option<Program>, StoreError>;

    async fn find_study_by_code(&self, code: &str) -> Result<Option<Study>, StoreError>;

    async fn find_assay_by_code(&self, code: &str) -> Result<Option<Assay>, StoreError>;

    /// Insert (no id) or update (with id); returns the stored record
    ///
    /// Program names are unique.
    async fn save_program(&self, program: Program) -> Result<Program, StoreError>;

    /// Insert or update; study codes are unique
    async fn save_study(&self, study: Study) -> Result<Study, StoreError>;

    /// Insert or update; assay codes are unique
    async fn save_assay(&self, assay: Assay) -> Result<Assay, StoreError>;

    /// Append a link to a persisted entity
    async fn append_link(&self, entity: EntityRef, link: ExternalLink) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    programs: BTreeMap<EntityId, Program>,
    studies: BTreeMap<EntityId, Study>,
    assays: BTreeMap<EntityId, Assay>,
}

impl Tables {
    fn allocate(&mut self) -> EntityId {
        self.next_id += 1;
        EntityId(self.next_id)
    }
}

/// In-memory store with failure injection
#[derive(Debug, Default)]
pub struct InMemoryEntityStore {
    tables: Mutex<Tables>,
    sequences: SequenceStore,
    failing_saves: AtomicUsize,
    failing_links: AtomicBool,
}

impl InMemoryEntityStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` saves with `StoreError::Unavailable`
    pub fn fail_next_save(&self, n: usize) {
        self.failing_saves.store(n, Ordering::SeqCst);
    }

    /// Fail every link append until switched off
    pub fn fail_link_appends(&self, on: bool) {
        self.failing_links.store(on, Ordering::SeqCst);
    }

    #[must_use]
    pub fn program_count(&self) -> usize {
        self.tables.lock().programs.len()
    }

    #[must_use]
    pub fn study_count(&self) -> usize {
        self.tables.lock().studies.len()
    }

    #[must_use]
    pub fn assay_count(&self) -> usize {
        self.tables.lock().assays.len()
    }

    /// All studies in id order
    #[must_use]
    pub fn studies(&self) -> Vec<Study> {
        self.tables.lock().studies.values().cloned().collect()
    }

    /// All assays in id order
    #[must_use]
    pub fn assays(&self) -> Vec<Assay> {
        self.tables.lock().assays.values().cloned().collect()
    }

    fn injected_save_failure(&self) -> Result<(), StoreError> {
        let armed = self
            .failing_saves
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if armed {
            return Err(StoreError::Unavailable("injected save failure".into()));
        }
        Ok(())
    }
}

fn resolve_id<T>(
    table: &BTreeMap<EntityId, T>,
    id: Option<EntityId>,
    wrap: fn(EntityId) -> EntityRef,
) -> Result<Option<EntityId>, StoreError> {
    match id {
        Some(id) if !table.contains_key(&id) => Err(StoreError::Missing(wrap(id))),
        other => Ok(other),
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn get_program(&self, id: EntityId) -> Result<Option<Program>, StoreError> {
        Ok(self.tables.lock().programs.get(&id).cloned())
    }

    async fn get_study(&self, id: EntityId) -> Result<Option<Study>, StoreError> {
        Ok(self.tables.lock().studies.get(&id).cloned())
    }

    async fn get_assay(&self, id: EntityId) -> Result<Option<Assay>, StoreError> {
        Ok(self.tables.lock().assays.get(&id).cloned())
    }

    async fn find_program_by_name(&self, name: &str) -> Result<Option<Program>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables.programs.values().find(|p| p.name == name).cloned())
    }

    async fn find_study_by_code(&self, code: &str) -> Result<Option<Study>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .studies
            .values()
            .find(|s| s.code.as_deref() == Some(code))
            .cloned())
    }

    async fn find_assay_by_code(&self, code: &str) -> Result<Option<Assay>, StoreError> {
        let tables = self.tables.lock();
        Ok(tables
            .assays
            .values()
            .find(|a| a.code.as_deref() == Some(code))
            .cloned())
    }

    async fn save_program(&self, mut program: Program) -> Result<Program, StoreError> {
        self.injected_save_failure()?;
        let mut tables = self.tables.lock();
        let existing = resolve_id(&tables.programs, program.id, EntityRef::Program)?;
        if tables
            .programs
            .values()
            .any(|p| p.name == program.name && p.id != existing)
        {
            return Err(StoreError::DuplicateName {
                kind: EntityKind::Program,
                name: program.name,
            });
        }
        let id = existing.unwrap_or_else(|| tables.allocate());
        program.id = Some(id);
        tables.programs.insert(id, program.clone());
        Ok(program)
    }

    async fn save_study(&self, mut study: Study) -> Result<Study, StoreError> {
        self.injected_save_failure()?;
        let mut tables = self.tables.lock();
        let existing = resolve_id(&tables.studies, study.id, EntityRef::Study)?;
        if let Some(code) = study.code.as_deref() {
            if tables
                .studies
                .values()
                .any(|s| s.code.as_deref() == Some(code) && s.id != existing)
            {
                return Err(StoreError::DuplicateCode {
                    kind: EntityKind::Study,
                    code: code.to_string(),
                });
            }
        }
        let id = existing.unwrap_or_else(|| tables.allocate());
        study.id = Some(id);
        tables.studies.insert(id, study.clone());
        Ok(study)
    }

    async fn save_assay(&self, mut assay: Assay) -> Result<Assay, StoreError> {
        self.injected_save_failure()?;
        let mut tables = self.tables.lock();
        let existing = resolve_id(&tables.assays, assay.id, EntityRef::Assay)?;
        if let Some(code) = assay.code.as_deref() {
            if tables
                .assays
                .values()
                .any(|a| a.code.as_deref() == Some(code) && a.id != existing)
            {
                return Err(StoreError::DuplicateCode {
                    kind: EntityKind::Assay,
                    code: code.to_string(),
                });
            }
        }
        let id = existing.unwrap_or_else(|| tables.allocate());
        assay.id = Some(id);
        tables.assays.insert(id, assay.clone());
        Ok(assay)
    }

    async fn append_link(&self, entity: EntityRef, link: ExternalLink) -> Result<(), StoreError> {
        if self.failing_links.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected link failure".into()));
        }
        let mut tables = self.tables.lock();
        let links = match entity {
            EntityRef::Program(id) => tables.programs.get_mut(&id).map(|p| &mut p.links),
            EntityRef::Study(id) => tables.studies.get_mut(&id).map(|s| &mut s.links),
            EntityRef::Assay(id) => tables.assays.get_mut(&id).map(|a| &mut a.links),
        };
        links.ok_or(StoreError::Missing(entity))?.push(link);
        Ok(())
    }
}

#[async_trait]
impl CodeCounter for InMemoryEntityStore {
    async fn count_studies_for_program_code(
        &self,
        program_code: &str,
    ) -> Result<u64, CounterError> {
        let tables = self.tables.lock();
        let programs: HashSet<EntityId> = tables
            .programs
            .values()
            .filter(|p| p.code == program_code)
            .filter_map(|p| p.id)
            .collect();
        let n = tables
            .studies
            .values()
            .filter(|s| s.active && programs.contains(&s.program_id))
            .count();
        Ok(n as u64)
    }

    async fn count_assays_for_study_code(&self, study_code: &str) -> Result<u64, CounterError> {
        let prefix = format!("{study_code}-");
        let tables = self.tables.lock();
        let n = tables
            .assays
            .values()
            .filter(|a| a.code.as_deref().is_some_and(|c| c.starts_with(&prefix)))
            .count();
        Ok(n as u64)
    }

    async fn count_external_studies(&self, collaborator_code: &str) -> Result<u64, CounterError> {
        let tables = self.tables.lock();
        let n = tables
            .studies
            .values()
            .filter(|s| s.external_code.is_some())
            .filter(|s| {
                s.collaborator
                    .as_ref()
                    .is_some_and(|c| c.code == collaborator_code)
            })
            .count();
        Ok(n as u64)
    }

    async fn highest_code_suffix(
        &self,
        scope: SequenceScope,
        prefix: &str,
    ) -> Result<Option<u64>, CounterError> {
        let suffix = |code: Option<&String>| code.and_then(|c| code_suffix(c, prefix));
        let tables = self.tables.lock();
        let highest = match scope {
            SequenceScope::Study => tables
                .studies
                .values()
                .filter_map(|s| suffix(s.code.as_ref()))
                .max(),
            SequenceScope::Assay => tables
                .assays
                .values()
                .filter_map(|a| suffix(a.code.as_ref()))
                .max(),
            SequenceScope::External => tables
                .studies
                .values()
                .filter_map(|s| suffix(s.external_code.as_ref()))
                .max(),
        };
        Ok(highest)
    }

    async fn next_sequence(
        &self,
        scope: SequenceScope,
        prefix: &str,
        floor: u64,
    ) -> Result<u64, CounterError> {
        Ok(self.sequences.next(scope, prefix, floor))
    }
}
