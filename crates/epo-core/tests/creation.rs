//! Creation paths through the orchestrator against in-memory backends.
//!
//! Every test builds its own [`TestHarness`], so backend counters start at
//! zero and codes start at the configured counter start.

use epo_core::prelude::*;
use epo_core::{OptionalStep, ProvisioningState};
use epo_model::{AdditionalFolder, Collaborator, FileRef};
use epo_test_utils::{
    binding_assay_type, imaging_assay_type, init_test_logging, TestHarness, SUMMARY_TEMPLATE_ID,
};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn program_gets_folder_notebook_and_repository() {
    init_test_logging();
    let h = TestHarness::new();

    let outcome = h
        .orchestrator
        .create_program(Program::new("CPA", "Alpha"), ProvisioningOptions::all())
        .await
        .unwrap();

    let program = &outcome.entity;
    assert!(program.id.is_some());
    assert_eq!(
        program.folders.primary().map(|f| f.path.as_str()),
        Some("/data/programs/CPA - Alpha")
    );
    assert_eq!(
        program.eln_folder.as_ref().map(|f| f.path.as_str()),
        Some("CPA: Alpha")
    );
    assert_eq!(
        program.git_repository.as_ref().map(|r| r.web_url.as_str()),
        Some("https://git.example.com/cpa")
    );
    assert!(outcome.is_clean());
    assert_eq!(
        outcome.states,
        vec![
            ProvisioningState::Validating,
            ProvisioningState::CodeAssigned,
            ProvisioningState::StorageProvisioned,
            ProvisioningState::NotebookProvisioned,
            ProvisioningState::RepositoryProvisioned,
            ProvisioningState::Persisted,
            ProvisioningState::LinksAttached,
        ]
    );
}

/// Study codes are the program code plus a five-digit ordinal starting at
/// 10001.
#[tokio::test]
async fn study_codes_follow_program_code() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let id = program.id.unwrap();

    let first = h
        .orchestrator
        .create_study(Study::new(id, "Dose response"), ProvisioningOptions::new())
        .await
        .unwrap()
        .entity;
    let second = h
        .orchestrator
        .create_study(Study::new(id, "Tox screen"), ProvisioningOptions::new())
        .await
        .unwrap()
        .entity;

    assert_eq!(first.code.as_deref(), Some("CPA-10001"));
    assert_eq!(second.code.as_deref(), Some("CPA-10002"));
}

#[tokio::test]
async fn assay_code_nests_under_study_code() {
    let h = TestHarness::new();
    let program = h.seed_program("PPB", "Plasma").await;
    let study = h.seed_study(&program, "Binding panel").await;
    assert_eq!(study.code.as_deref(), Some("PPB-10001"));

    let assay = Assay::new(study.id.unwrap(), "Plasma binding", binding_assay_type())
        .with_field("target", FieldValue::String("albumin".into()));
    let outcome = h
        .orchestrator
        .create_assay(assay, ProvisioningOptions::all())
        .await
        .unwrap();

    let assay = outcome.entity;
    assert_eq!(assay.code.as_deref(), Some("PPB-10001-001"));
    assert_eq!(
        assay.folders.primary().map(|f| f.path.as_str()),
        Some("/data/programs/PPB - Plasma/PPB-10001 - Binding_panel/PPB-10001-001 - Plasma_binding")
    );
    assert_eq!(
        assay.eln_folder.as_ref().map(|f| f.path.as_str()),
        Some("PPB: Plasma/PPB-10001: Binding panel/PPB-10001-001: Plasma binding")
    );
    assert_eq!(
        assay.git_repository.as_ref().map(|r| r.web_url.as_str()),
        Some("https://git.example.com/ppb-10001/ppb-10001-001-plasma-binding")
    );
}

#[tokio::test]
async fn links_are_attached_and_stored() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let study = h.seed_study(&program, "Dose response").await;

    let labels: Vec<_> = study.links.iter().map(|l| l.label.as_str()).collect();
    assert_eq!(labels, vec!["Summary ELN Entry", "Git Repository"]);

    let stored = h.store.studies().pop().unwrap();
    assert_eq!(stored.links, study.links);
    assert_eq!(
        stored.eln_folder.and_then(|f| f.summary_entry).map(|e| e.name),
        Some("CPA-10001 Summary".to_string())
    );
}

#[tokio::test]
async fn summary_entry_uses_requested_template() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let study = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::all().with_template(SUMMARY_TEMPLATE_ID),
        )
        .await
        .unwrap()
        .entity;

    let entry = study.eln_folder.and_then(|f| f.summary_entry).unwrap();
    assert_eq!(entry.name, "CPA-10001 Study Summary");
}

/// An unknown template id fails the notebook step before any notebook
/// folder is created; the study itself still succeeds.
#[tokio::test]
async fn unknown_template_skips_notebook_folder() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let folders_before = h.notebook.folders_created();

    let outcome = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::all().with_template("tmpl_missing"),
        )
        .await
        .unwrap();

    assert_eq!(h.notebook.folders_created(), folders_before);
    assert!(outcome.entity.eln_folder.is_none());
    assert!(outcome.entity.git_repository.is_some());
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].step(), Some(OptionalStep::NotebookFolder));
}

/// With no notebook integration configured, asking for a notebook folder is
/// a silent no-op rather than a failure.
#[tokio::test]
async fn notebook_not_configured_still_creates_assay() {
    let h = TestHarness::builder().without_notebook().build();
    let program = h.seed_program("PPB", "Plasma").await;
    let study = h.seed_study(&program, "Binding panel").await;

    let assay = Assay::new(study.id.unwrap(), "Plasma binding", binding_assay_type())
        .with_field("target", FieldValue::String("albumin".into()));
    let outcome = h
        .orchestrator
        .create_assay(assay, ProvisioningOptions::all())
        .await
        .unwrap();

    assert_eq!(outcome.entity.code.as_deref(), Some("PPB-10001-001"));
    assert!(outcome.entity.eln_folder.is_none());
    assert!(outcome.is_clean());
    assert!(!outcome.visited(ProvisioningState::NotebookProvisioned));
    assert!(outcome.visited(ProvisioningState::RepositoryProvisioned));
    assert_eq!(h.notebook.folders_created(), 0);
    assert_eq!(h.store.assay_count(), 1);
}

#[tokio::test]
async fn storage_only_by_default() {
    let h = TestHarness::new();
    let program = h
        .orchestrator
        .create_program(Program::new("CPA", "Alpha"), ProvisioningOptions::new())
        .await
        .unwrap();

    assert!(program.entity.folders.primary().is_some());
    assert!(program.entity.eln_folder.is_none());
    assert!(program.entity.git_repository.is_none());
    assert!(program.entity.links.is_empty());
    assert_eq!(h.notebook.folders_created(), 0);
    assert_eq!(h.git.repositories_created(), 0);
}

#[tokio::test]
async fn storage_can_be_skipped() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let created = h.storage.folders_created();

    let outcome = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Desk study"),
            ProvisioningOptions::new().without_storage(),
        )
        .await
        .unwrap();

    assert!(outcome.entity.folders.is_empty());
    assert!(!outcome.visited(ProvisioningState::StorageProvisioned));
    assert!(outcome.visited(ProvisioningState::LinksAttached));
    assert_eq!(h.storage.folders_created(), created);
}

#[tokio::test]
async fn collaborator_study_gets_external_code() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let study = Study::new(program.id.unwrap(), "Partner screen")
        .with_collaborator(Collaborator::new("ACME", "Acme Labs"));
    let study = h
        .orchestrator
        .create_study(study, ProvisioningOptions::new())
        .await
        .unwrap()
        .entity;

    assert_eq!(study.code.as_deref(), Some("CPA-10001"));
    assert_eq!(study.external_code.as_deref(), Some("ACME-00001"));
}

#[tokio::test]
async fn legacy_study_keeps_its_code() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let study = Study::new(program.id.unwrap(), "Migrated")
        .with_code("CPA-00042")
        .with_collaborator(Collaborator::new("ACME", "Acme Labs"))
        .legacy();
    let study = h
        .orchestrator
        .create_study(study, ProvisioningOptions::new())
        .await
        .unwrap()
        .entity;

    assert_eq!(study.code.as_deref(), Some("CPA-00042"));
    assert!(study.external_code.is_none());
    assert_eq!(
        study.folders.primary().map(|f| f.name.as_str()),
        Some("CPA-00042 - Migrated")
    );
}

#[tokio::test]
async fn uploaded_files_move_into_assay_folder() {
    let h = TestHarness::new();
    let program = h.seed_program("IMG", "Imaging").await;
    let study = h.seed_study(&program, "Cell morphology").await;
    h.storage.stage_upload("/tmp/uploads/protocol.pdf");

    let assay = Assay::new(study.id.unwrap(), "Confocal", imaging_assay_type()).with_field(
        "protocol",
        FieldValue::File(FileRef {
            path: "/tmp/uploads/protocol.pdf".into(),
        }),
    );
    let outcome = h
        .orchestrator
        .create_assay(assay, ProvisioningOptions::new())
        .await
        .unwrap();

    let expected =
        "/data/programs/IMG - Imaging/IMG-10001 - Cell_morphology/IMG-10001-001 - Confocal/protocol.pdf";
    assert_eq!(
        outcome.entity.fields.get("protocol"),
        Some(&FieldValue::File(FileRef {
            path: expected.into()
        }))
    );
    assert!(h.storage.has_file(expected));
    assert!(!h.storage.has_file("/tmp/uploads/protocol.pdf"));
    assert!(outcome.is_clean());
}

#[tokio::test]
async fn missing_upload_is_a_warning() {
    let h = TestHarness::new();
    let program = h.seed_program("IMG", "Imaging").await;
    let study = h.seed_study(&program, "Cell morphology").await;

    let assay = Assay::new(study.id.unwrap(), "Confocal", imaging_assay_type()).with_field(
        "protocol",
        FieldValue::File(FileRef {
            path: "/tmp/uploads/gone.pdf".into(),
        }),
    );
    let outcome = h
        .orchestrator
        .create_assay(assay, ProvisioningOptions::new())
        .await
        .unwrap();

    assert!(matches!(
        outcome.warnings.as_slice(),
        [ProvisioningWarning::FileMoveFailure { field, .. }] if field == "protocol"
    ));
    assert_eq!(
        outcome.entity.fields.get("protocol"),
        Some(&FieldValue::File(FileRef {
            path: "/tmp/uploads/gone.pdf".into()
        }))
    );
    assert_eq!(h.store.assay_count(), 1);
}

#[tokio::test]
async fn additional_folder_on_second_drive() {
    let h = TestHarness::builder().with_archive_drive().build();
    let program = h.seed_program("CPA", "Alpha").await;

    let outcome = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::new()
                .with_additional_folder(AdditionalFolder::new("archive", "/archive/studies")),
        )
        .await
        .unwrap();

    let study = outcome.entity;
    assert_eq!(study.folders.len(), 2);
    let extra: Vec<_> = study.folders.secondary().map(|f| f.path.clone()).collect();
    assert_eq!(extra, vec!["/archive/studies/CPA-10001 - Dose_response".to_string()]);
    assert_eq!(h.archive.folders_created(), 1);
}

#[tokio::test]
async fn unknown_additional_drive_is_a_warning() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let outcome = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::new()
                .with_additional_folder(AdditionalFolder::new("nowhere", "/x")),
        )
        .await
        .unwrap();

    assert_eq!(outcome.entity.folders.len(), 1);
    assert_eq!(outcome.warnings.len(), 1);
    assert_eq!(outcome.warnings[0].step(), Some(OptionalStep::AdditionalFolder));
}

#[tokio::test]
async fn explicit_parent_folder_overrides_program_folder() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let parent = epo_test_utils::local_drive().folder("shared", "/data/shared");

    let study = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Dose response"),
            ProvisioningOptions::new().with_parent_folder(parent),
        )
        .await
        .unwrap()
        .entity;

    assert_eq!(
        study.folders.primary().map(|f| f.path.as_str()),
        Some("/data/shared/CPA-10001 - Dose_response")
    );
}
