//! Request validation that needs no store access

use crate::error::{FieldViolation, ValidationError};
use epo_model::{AssayType, EntityId, EntityKind, FieldType, FieldValue};

/// Reject blank display names
///
/// # Errors
/// `ValidationError::BlankName`
pub fn require_name(kind: EntityKind, name: &str) -> Result<(), ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::BlankName { kind });
    }
    Ok(())
}

/// Reject records that already carry an id
///
/// # Errors
/// `ValidationError::AlreadyPersisted`
pub fn require_new(kind: EntityKind, id: Option<EntityId>) -> Result<(), ValidationError> {
    match id {
        Some(id) => Err(ValidationError::AlreadyPersisted { kind, id }),
        None => Ok(()),
    }
}

/// Explicit codes must be non-blank; legacy records must supply one
///
/// # Errors
/// `ValidationError::BlankCode` or `ValidationError::LegacyWithoutCode`
pub fn check_explicit_code(
    kind: EntityKind,
    code: Option<&str>,
    legacy: bool,
) -> Result<(), ValidationError> {
    match code {
        Some(code) if code.trim().is_empty() => Err(ValidationError::BlankCode { kind }),
        None if legacy => Err(ValidationError::LegacyWithoutCode { kind }),
        _ => Ok(()),
    }
}

/// Check custom field values against the assay type's schema
///
/// Collects every violation rather than stopping at the first.
///
/// # Errors
/// `ValidationError::FieldSchema` listing all violations
pub fn validate_fields<'a, I>(assay_type: &AssayType, fields: I) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = (&'a String, &'a FieldValue)> + Clone,
{
    let mut violations = Vec::new();

    for def in assay_type.fields.iter().filter(|d| d.required) {
        if !fields.clone().into_iter().any(|(name, _)| name == &def.name) {
            violations.push(FieldViolation::MissingRequired {
                field: def.name.clone(),
            });
        }
    }

    for (name, value) in fields {
        let Some(def) = assay_type.field(name) else {
            violations.push(FieldViolation::UnknownField {
                field: name.clone(),
            });
            continue;
        };
        if !value.conforms_to(def.field_type) {
            violations.push(FieldViolation::TypeMismatch {
                field: name.clone(),
                expected: def.field_type,
                actual: value.field_type(),
            });
            continue;
        }
        if def.field_type == FieldType::Dropdown {
            if let Some(s) = value.as_str() {
                if !def.dropdown_options.iter().any(|o| o == s) {
                    violations.push(FieldViolation::InvalidOption {
                        field: name.clone(),
                        value: s.to_string(),
                    });
                }
            }
        }
    }

    if violations.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::FieldSchema(violations))
    }
}
