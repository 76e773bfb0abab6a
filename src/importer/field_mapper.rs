// ==========================================
// Product Feed Import - field mapper (Mapping Engine)
// ==========================================
// apply(raw record, mappings) -> (NormalizedRecord, [FieldError])
// Pure: same record + same mappings always give the same output.
//
// Per mapping:
//   1. value = source value, or transform_value for `default`
//   2. blank -> default_value -> MissingRequired (if required) / absent
//   3. transform, then coerce to the target field's value kind
// Several mappings on one target: the last one with a value wins.
// ==========================================

use crate::domain::feed::FieldMapping;
use crate::domain::record::{FieldError, FieldErrorKind, NormalizedRecord, RawRecord};
use crate::domain::target_schema::TargetField;
use crate::domain::types::TransformType;
use crate::importer::data_cleaner::DataCleaner;
use crate::importer::error::{ImportError, ImportResult};

pub struct FieldMapper;

impl FieldMapper {
    pub fn apply(record: &RawRecord, mappings: &[FieldMapping]) -> (NormalizedRecord, Vec<FieldError>) {
        let mut normalized = NormalizedRecord::new();
        let mut errors = Vec::new();
        let mut missing: Vec<&FieldMapping> = Vec::new();

        for mapping in mappings {
            let source = DataCleaner::normalize_null(
                record.get(&mapping.source_field).map(String::as_str),
            );
            let chosen = match mapping.transform_type {
                TransformType::Default => {
                    DataCleaner::normalize_null(Some(mapping.transform_value.as_str()))
                }
                _ => source,
            }
            .or_else(|| mapping.default_value());

            let Some(value) = chosen else {
                if mapping.is_required || mapping.target_field.is_required() {
                    missing.push(mapping);
                }
                continue;
            };

            match DataCleaner::convert(
                value,
                mapping.transform_type,
                &mapping.transform_value,
                mapping.target_field.kind(),
            ) {
                Ok(converted) => normalized.set(mapping.target_field, converted),
                Err(kind) => errors.push(FieldError {
                    target_field: mapping.target_field,
                    source_field: mapping.source_field.clone(),
                    kind,
                }),
            }
        }

        // another mapping may still have filled the target
        for mapping in missing {
            if !normalized.contains(mapping.target_field)
                && !errors.iter().any(|e| e.target_field == mapping.target_field)
            {
                errors.push(FieldError {
                    target_field: mapping.target_field,
                    source_field: mapping.source_field.clone(),
                    kind: FieldErrorKind::MissingRequired,
                });
            }
        }

        (normalized, errors)
    }

    /// Required schema targets with no mapping at all.
    pub fn missing_required_targets(mappings: &[FieldMapping]) -> Vec<TargetField> {
        TargetField::required_fields()
            .filter(|target| !mappings.iter().any(|m| m.target_field == *target))
            .collect()
    }

    /// Checks a mapping list before it is saved or run.
    ///
    /// # Errors
    /// - `MissingRequiredMappings` naming every unmapped required target
    /// - `InvalidMapping` for a blank source field or a `default` transform
    ///   without a value
    pub fn validate_mappings(mappings: &[FieldMapping]) -> ImportResult<()> {
        for (idx, mapping) in mappings.iter().enumerate() {
            if mapping.source_field.trim().is_empty() {
                return Err(ImportError::InvalidMapping(format!(
                    "mapping #{} ({}) has no source field",
                    idx + 1,
                    mapping.target_field
                )));
            }
            if mapping.transform_type == TransformType::Default
                && mapping.transform_value.trim().is_empty()
            {
                return Err(ImportError::InvalidMapping(format!(
                    "mapping #{} ({}) uses the default transform without a value",
                    idx + 1,
                    mapping.target_field
                )));
            }
        }

        let missing = Self::missing_required_targets(mappings);
        if !missing.is_empty() {
            return Err(ImportError::MissingRequiredMappings { missing });
        }
        Ok(())
    }
}
