//! Requests rejected before any side effect.
//!
//! Each test checks the error and that no remote folder was created.

use epo_core::prelude::*;
use epo_core::{FieldViolation, ValidationError};
use epo_model::EntityKind;
use epo_test_utils::{binding_assay_type, TestHarness};
use pretty_assertions::assert_eq;

fn validation(err: ProvisionError) -> ValidationError {
    match err {
        ProvisionError::Validation(v) => v,
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn blank_program_name() {
    let h = TestHarness::new();
    let err = h
        .orchestrator
        .create_program(Program::new("CPA", "  "), ProvisioningOptions::new())
        .await
        .unwrap_err();

    assert_eq!(
        validation(err),
        ValidationError::BlankName {
            kind: EntityKind::Program
        }
    );
    assert_eq!(h.storage.folders_created(), 0);
}

#[tokio::test]
async fn duplicate_program_name() {
    let h = TestHarness::new();
    h.seed_program("CPA", "Alpha").await;
    let created = h.storage.folders_created();

    let err = h
        .orchestrator
        .create_program(Program::new("CPB", "Alpha"), ProvisioningOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        validation(err),
        ValidationError::DuplicateName { name, .. } if name == "Alpha"
    ));
    assert_eq!(h.storage.folders_created(), created);
    assert_eq!(h.store.program_count(), 1);
}

#[tokio::test]
async fn already_persisted_record_is_rejected() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let err = h
        .orchestrator
        .create_program(program, ProvisioningOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        validation(err),
        ValidationError::AlreadyPersisted {
            kind: EntityKind::Program,
            ..
        }
    ));
}

#[tokio::test]
async fn study_under_missing_program() {
    let h = TestHarness::new();
    let err = h
        .orchestrator
        .create_study(Study::new(EntityId(404), "Orphan"), ProvisioningOptions::new())
        .await
        .unwrap_err();

    assert!(matches!(
        validation(err),
        ValidationError::InvalidParent {
            kind: EntityKind::Study,
            ..
        }
    ));
    assert_eq!(h.storage.folders_created(), 0);
}

#[tokio::test]
async fn study_under_deprecated_program() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    let id = program.id.unwrap();
    h.orchestrator
        .update_status(EntityRef::Program(id), Status::Deprecated, "alice")
        .await
        .unwrap();
    let created = h.storage.folders_created();

    let err = h
        .orchestrator
        .create_study(Study::new(id, "Late study"), ProvisioningOptions::new())
        .await
        .unwrap_err();

    let ValidationError::InvalidParent { reason, .. } = validation(err) else {
        panic!("expected invalid parent");
    };
    assert!(reason.contains("inactive"));
    assert_eq!(h.storage.folders_created(), created);
}

#[tokio::test]
async fn legacy_study_needs_code() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;

    let err = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Migrated").legacy(),
            ProvisioningOptions::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(
        validation(err),
        ValidationError::LegacyWithoutCode {
            kind: EntityKind::Study
        }
    );
}

#[tokio::test]
async fn explicit_study_code_must_be_unique() {
    let h = TestHarness::new();
    let program = h.seed_program("CPA", "Alpha").await;
    h.seed_study(&program, "Dose response").await;

    let err = h
        .orchestrator
        .create_study(
            Study::new(program.id.unwrap(), "Copy").with_code("CPA-10001"),
            ProvisioningOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(
        validation(err),
        ValidationError::DuplicateCode { code, .. } if code == "CPA-10001"
    ));
    assert_eq!(h.store.study_count(), 1);
}

#[tokio::test]
async fn assay_fields_are_checked_against_type() {
    let h = TestHarness::new();
    let program = h.seed_program("PPB", "Plasma").await;
    let study = h.seed_study(&program, "Binding panel").await;
    let created = h.storage.folders_created();

    let assay = Assay::new(study.id.unwrap(), "Plasma binding", binding_assay_type())
        .with_field("replicates", FieldValue::String("three".into()))
        .with_field("readout", FieldValue::Dropdown("NMR".into()));
    let err = h
        .orchestrator
        .create_assay(assay, ProvisioningOptions::all())
        .await
        .unwrap_err();

    let ValidationError::FieldSchema(violations) = validation(err) else {
        panic!("expected field schema violations");
    };
    assert_eq!(
        violations,
        vec![
            FieldViolation::MissingRequired {
                field: "target".into()
            },
            FieldViolation::TypeMismatch {
                field: "replicates".into(),
                expected: FieldType::Integer,
                actual: FieldType::String,
            },
            FieldViolation::InvalidOption {
                field: "readout".into(),
                value: "NMR".into(),
            },
        ]
    );
    assert_eq!(h.storage.folders_created(), created);
    assert_eq!(h.store.assay_count(), 0);
}

#[tokio::test]
async fn assay_under_missing_study() {
    let h = TestHarness::new();
    let err = h
        .orchestrator
        .create_assay(
            Assay::new(EntityId(7), "Lost", binding_assay_type()),
            ProvisioningOptions::new(),
        )
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert!(matches!(
        validation(err),
        ValidationError::InvalidParent {
            kind: EntityKind::Assay,
            ..
        }
    ));
}
