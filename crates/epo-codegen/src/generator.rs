//! Code generator
//!
//! Provides [`CodeGenerator`], which turns a parent code plus an ordinal into
//! a study, assay or external code according to [`CodeSettings`].

use crate::error::{CodeError, CounterError};
use crate::format::format_code;
use crate::sequence::SequenceScope;
use async_trait::async_trait;
use epo_model::{Assay, EntityKind, Program, Study};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Existing-record counts and the persisted code sequences
#[async_trait]
pub trait CodeCounter: Send + Sync {
    /// Active studies belonging to programs whose code is `program_code`
    async fn count_studies_for_program_code(&self, program_code: &str)
        -> Result<u64, CounterError>;

    /// Assays whose code starts with `"{study_code}-"`
    async fn count_assays_for_study_code(&self, study_code: &str) -> Result<u64, CounterError>;

    /// Studies carrying an external code for `collaborator_code`
    async fn count_external_studies(&self, collaborator_code: &str) -> Result<u64, CounterError>;

    /// Largest `n` among existing codes `"{prefix}-{n}"` in `scope`, inactive
    /// and legacy records included
    async fn highest_code_suffix(
        &self,
        scope: SequenceScope,
        prefix: &str,
    ) -> Result<Option<u64>, CounterError>;

    /// Raise the stored counter for `(scope, prefix)` to at least `floor`,
    /// increment it and return the new value, as one atomic step
    async fn next_sequence(
        &self,
        scope: SequenceScope,
        prefix: &str,
        floor: u64,
    ) -> Result<u64, CounterError>;
}

/// How ordinals are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeStrategy {
    /// Count existing records at call time (racy under concurrency)
    DerivedCount,
    /// Per-prefix counter kept by the store, never below the highest
    /// existing code
    #[default]
    Sequence,
}

/// Counter starts and minimum digit widths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeSettings {
    pub study_counter_start: u64,
    pub study_min_digits: usize,
    pub assay_counter_start: u64,
    pub assay_min_digits: usize,
    pub external_counter_start: u64,
    pub external_min_digits: usize,
}

impl Default for CodeSettings {
    fn default() -> Self {
        Self {
            study_counter_start: 10000,
            study_min_digits: 5,
            assay_counter_start: 0,
            assay_min_digits: 3,
            external_counter_start: 0,
            external_min_digits: 5,
        }
    }
}

/// Generates study, assay and external codes
pub struct CodeGenerator {
    settings: CodeSettings,
    strategy: CodeStrategy,
    counter: Arc<dyn CodeCounter>,
}

impl std::fmt::Debug for CodeGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodeGenerator")
            .field("settings", &self.settings)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl CodeGenerator {
    #[must_use]
    pub fn new(
        settings: CodeSettings,
        strategy: CodeStrategy,
        counter: Arc<dyn CodeCounter>,
    ) -> Self {
        Self {
            settings,
            strategy,
            counter,
        }
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &CodeSettings {
        &self.settings
    }

    #[inline]
    #[must_use]
    pub fn strategy(&self) -> CodeStrategy {
        self.strategy
    }

    /// Code for a new study under `program`
    ///
    /// # Errors
    /// - `CodeError::LegacyEntity` for legacy studies
    /// - `CodeError::Counter` if existing studies cannot be counted
    pub async fn generate_study_code(
        &self,
        program: &Program,
        study: &Study,
    ) -> Result<String, CodeError> {
        if study.legacy {
            return Err(CodeError::LegacyEntity {
                kind: EntityKind::Study,
            });
        }
        let ordinal = self.next_ordinal(SequenceScope::Study, &program.code).await?;
        let code = format_code(
            &program.code,
            self.settings.study_counter_start + ordinal,
            self.settings.study_min_digits,
        );
        tracing::debug!(program = %program.code, %code, "generated study code");
        Ok(code)
    }

    /// Code for a new assay under `study`
    ///
    /// # Errors
    /// - `CodeError::LegacyEntity` for legacy assays
    /// - `CodeError::MissingParentCode` if the study has no code
    /// - `CodeError::Counter` if existing assays cannot be counted
    pub async fn generate_assay_code(
        &self,
        study: &Study,
        assay: &Assay,
    ) -> Result<String, CodeError> {
        if assay.legacy {
            return Err(CodeError::LegacyEntity {
                kind: EntityKind::Assay,
            });
        }
        let study_code = study.code.as_deref().ok_or(CodeError::MissingParentCode {
            kind: EntityKind::Study,
        })?;
        let ordinal = self.next_ordinal(SequenceScope::Assay, study_code).await?;
        let code = format_code(
            study_code,
            self.settings.assay_counter_start + ordinal,
            self.settings.assay_min_digits,
        );
        tracing::debug!(study = %study_code, %code, "generated assay code");
        Ok(code)
    }

    /// External code for a collaborator-linked study; `None` when the study
    /// has no collaborator
    ///
    /// # Errors
    /// - `CodeError::LegacyEntity` for legacy studies
    /// - `CodeError::Counter` if existing external studies cannot be counted
    pub async fn generate_external_code(&self, study: &Study) -> Result<Option<String>, CodeError> {
        let Some(collaborator) = study.collaborator.as_ref() else {
            return Ok(None);
        };
        if study.legacy {
            return Err(CodeError::LegacyEntity {
                kind: EntityKind::Study,
            });
        }
        let ordinal = self
            .next_ordinal(SequenceScope::External, &collaborator.code)
            .await?;
        Ok(Some(format_code(
            &collaborator.code,
            self.settings.external_counter_start + ordinal,
            self.settings.external_min_digits,
        )))
    }

    /// 1-based ordinal for the next record under `prefix`
    async fn next_ordinal(&self, scope: SequenceScope, prefix: &str) -> Result<u64, CodeError> {
        match self.strategy {
            CodeStrategy::DerivedCount => Ok(self.count(scope, prefix).await? + 1),
            CodeStrategy::Sequence => {
                let start = self.counter_start(scope);
                let floor = self
                    .counter
                    .highest_code_suffix(scope, prefix)
                    .await?
                    .map_or(0, |n| n.saturating_sub(start));
                Ok(self.counter.next_sequence(scope, prefix, floor).await?)
            }
        }
    }

    fn counter_start(&self, scope: SequenceScope) -> u64 {
        match scope {
            SequenceScope::Study => self.settings.study_counter_start,
            SequenceScope::Assay => self.settings.assay_counter_start,
            SequenceScope::External => self.settings.external_counter_start,
        }
    }

    async fn count(&self, scope: SequenceScope, prefix: &str) -> Result<u64, CounterError> {
        match scope {
            SequenceScope::Study => self.counter.count_studies_for_program_code(prefix).await,
            SequenceScope::Assay => self.counter.count_assays_for_study_code(prefix).await,
            SequenceScope::External => self.counter.count_external_studies(prefix).await,
        }
    }
}
