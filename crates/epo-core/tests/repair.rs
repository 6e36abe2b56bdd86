//! Repair reconciles local folder records with the remote systems and is
//! safe to run repeatedly.

use epo_backend::BackendError;
use epo_core::prelude::*;
use epo_core::RepairReport;
use epo_model::FolderSet;
use epo_test_utils::TestHarness;
use pretty_assertions::assert_eq;

const STUDY_FOLDER: &str = "/data/programs/CPA - Alpha/CPA-10001 - Dose_response";

async fn study_without_resources(h: &TestHarness) -> Study {
    let program = h.seed_program("CPA", "Alpha").await;
    h.orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::new().without_storage(),
        )
        .await
        .unwrap()
        .entity
}

/// Running repair twice creates one remote folder and one local record.
#[tokio::test]
async fn storage_repair_is_idempotent() {
    let h = TestHarness::new();
    let study = study_without_resources(&h).await;
    let entity = EntityRef::Study(study.id.unwrap());
    let created = h.storage.folders_created();

    let first = h.orchestrator.repair_storage_folder(entity).await.unwrap();
    assert_eq!(
        first,
        RepairReport {
            entity,
            action: RepairAction::Created,
            location: STUDY_FOLDER.into(),
        }
    );

    let second = h.orchestrator.repair_storage_folder(entity).await.unwrap();
    assert_eq!(second.action, RepairAction::Unchanged);

    assert_eq!(h.storage.folders_created(), created + 1);
    let stored = h.store.studies().pop().unwrap();
    assert_eq!(stored.folders.len(), 1);
    assert_eq!(
        stored.folders.primary().map(|f| f.path.as_str()),
        Some(STUDY_FOLDER)
    );
    assert_eq!(stored.audit.modified_by, "repair");
}

/// A folder deleted remotely is recreated and the stale local record is
/// rewritten.
#[tokio::test]
async fn storage_repair_corrects_drift() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let study = h.seed_study(&program, "Dose response").await;
    let before = study.folders.primary().cloned().unwrap();

    assert!(h.storage.remove_folder(STUDY_FOLDER));
    let report = h
        .orchestrator
        .repair_storage_folder(EntityRef::Study(study.id.unwrap()))
        .await
        .unwrap();

    assert_eq!(report.action, RepairAction::Corrected);
    assert!(h.storage.contains_folder(STUDY_FOLDER));
    let after = h.store.studies().pop().unwrap();
    let primary = after.folders.primary().unwrap();
    assert_eq!(primary.path, before.path);
    assert_ne!(primary.external_id, before.external_id);
    assert_eq!(after.folders.len(), 1);
}

/// Renaming changes the derived folder name, but the folder that is still
/// linked stays the entity's folder.
#[tokio::test]
async fn storage_repair_after_rename_keeps_linked_folder() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let study = h.seed_study(&program, "Dose response").await;
    let mut renamed = study.clone();
    renamed.name = "Dose response v2".into();
    h.orchestrator.update_study(renamed, "bob").await.unwrap();
    let created = h.storage.folders_created();

    let report = h
        .orchestrator
        .repair_storage_folder(EntityRef::Study(study.id.unwrap()))
        .await
        .unwrap();

    assert_eq!(report.action, RepairAction::Unchanged);
    assert_eq!(report.location, STUDY_FOLDER);
    assert_eq!(h.storage.folders_created(), created);
    assert!(!h.storage.contains_folder(&format!("{STUDY_FOLDER}_v2")));
    assert_eq!(h.store.studies().pop().unwrap().folders, study.folders);
}

#[tokio::test]
async fn notebook_repair_after_rename_keeps_linked_folder() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let study = h.seed_study(&program, "Dose response").await;
    let mut renamed = study.clone();
    renamed.name = "Dose response v2".into();
    h.orchestrator.update_study(renamed, "bob").await.unwrap();
    let created = h.notebook.folders_created();

    let report = h
        .orchestrator
        .repair_notebook_folder(EntityRef::Study(study.id.unwrap()))
        .await
        .unwrap();

    assert_eq!(report.action, RepairAction::Unchanged);
    assert_eq!(report.location, "CPA: Alpha/CPA-10001: Dose response");
    assert_eq!(h.notebook.folders_created(), created);
    assert_eq!(h.store.studies().pop().unwrap().eln_folder, study.eln_folder);
}

/// Orphans from a failed save are adopted by repair instead of duplicated.
#[tokio::test]
async fn repair_adopts_existing_remote_folder() {
    let h = TestHarness::new();
    let study = study_without_resources(&h).await;
    let entity = EntityRef::Study(study.id.unwrap());

    h.orchestrator.repair_storage_folder(entity).await.unwrap();
    let created = h.storage.folders_created();

    let mut stale = h.store.studies().pop().unwrap();
    stale.folders = FolderSet::new();
    h.store.save_study(stale).await.unwrap();

    let report = h.orchestrator.repair_storage_folder(entity).await.unwrap();
    assert_eq!(report.action, RepairAction::Created);
    assert_eq!(h.storage.folders_created(), created);
}

#[tokio::test]
async fn program_repair_uses_program_root() {
    let h = TestHarness::new();
    let program = h
        .orchestrator
        .create_program(
            Program::new("CPA", "Alpha"),
            ProvisioningOptions::new().without_storage(),
        )
        .await
        .unwrap()
        .entity;

    let report = h
        .orchestrator
        .repair_storage_folder(EntityRef::Program(program.id.unwrap()))
        .await
        .unwrap();
    assert_eq!(report.action, RepairAction::Created);
    assert_eq!(report.location, "/data/programs/CPA - Alpha");
}

#[tokio::test]
async fn notebook_repair_is_idempotent() {
    let h = TestHarness::new();
    let study = study_without_resources(&h).await;
    let entity = EntityRef::Study(study.id.unwrap());
    let created = h.notebook.folders_created();

    let first = h.orchestrator.repair_notebook_folder(entity).await.unwrap();
    assert_eq!(first.action, RepairAction::Created);
    assert_eq!(first.location, "CPA: Alpha/CPA-10001: Dose response");

    let second = h.orchestrator.repair_notebook_folder(entity).await.unwrap();
    assert_eq!(second.action, RepairAction::Unchanged);
    assert_eq!(h.notebook.folders_created(), created + 1);
}

#[tokio::test]
async fn notebook_repair_needs_parent_folder() {
    let h = TestHarness::new();
    let program = h
        .orchestrator
        .create_program(Program::new("CPA", "Alpha"), ProvisioningOptions::new())
        .await
        .unwrap()
        .entity;
    let study = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::new(),
        )
        .await
        .unwrap()
        .entity;

    let err = h
        .orchestrator
        .repair_notebook_folder(EntityRef::Study(study.id.unwrap()))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ProvisionError::RepairFailed {
            source: BackendError::NotFound(_),
            ..
        }
    ));
}

#[tokio::test]
async fn notebook_repair_without_integration() {
    let h = TestHarness::builder().without_notebook().build();
    let program = h.seed_program("CPA", "Alpha").await;

    let err = h
        .orchestrator
        .repair_notebook_folder(EntityRef::Program(program.id.unwrap()))
        .await
        .unwrap_err();
    let ProvisionError::RepairFailed { source, .. } = err else {
        panic!("expected repair failure");
    };
    assert!(source.is_not_configured());
}

#[tokio::test]
async fn repair_of_unknown_entity() {
    let h = TestHarness::new();
    let entity = EntityRef::Assay(EntityId(99));
    assert_eq!(
        h.orchestrator.repair_storage_folder(entity).await,
        Err(ProvisionError::NotFound(entity))
    );
}

#[tokio::test]
async fn storage_outage_during_repair_is_retryable() {
    let h = TestHarness::new();
    let study = study_without_resources(&h).await;

    h.storage.faults().fail_next(1);
    let err = h
        .orchestrator
        .repair_storage_folder(EntityRef::Study(study.id.unwrap()))
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(h.store.studies().pop().unwrap().folders.is_empty());
}
