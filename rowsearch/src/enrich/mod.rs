// Schema enrichment: synthesizes a virtual `"<link>.<column>"` field for
// every visible column of every visible relationship field.

use crate::schema::{FieldSchema, FieldType, RelatedColumn, TableSchema};

/// Display type used when many related values collapse into one cell.
/// `None` means the column keeps its own type.
pub fn many_type_override(field_type: FieldType) -> Option<FieldType> {
    match field_type {
        FieldType::Datetime => Some(FieldType::String),
        FieldType::Boolean => Some(FieldType::String),
        FieldType::SignatureSingle => Some(FieldType::Attachments),
        FieldType::String
        | FieldType::Longform
        | FieldType::Options
        | FieldType::Array
        | FieldType::Number
        | FieldType::Bigint
        | FieldType::Attachments
        | FieldType::AttachmentSingle
        | FieldType::Link
        | FieldType::Formula
        | FieldType::Auto
        | FieldType::Json
        | FieldType::Internal
        | FieldType::BarcodeQr
        | FieldType::BbReference
        | FieldType::BbReferenceSingle => None,
    }
}

/// Expand a table schema with the related columns reachable through its
/// relationship fields.
///
/// Original fields keep their definition and position; each owner's
/// synthetic columns follow it in sub-schema order. A synthetic name seen
/// twice keeps its first position and the last definition. Returns `None`
/// when there is no schema to enrich.
pub fn enrich_schema(schema: Option<&TableSchema>) -> Option<TableSchema> {
    let schema = schema?;
    let mut result = TableSchema::with_capacity(schema.len());

    for (field_name, field) in schema {
        result.insert(field_name.clone(), field.clone());

        if !field.is_shown() || !field.is_relationship() {
            continue;
        }
        let Some(columns) = field.columns.as_ref() else {
            continue;
        };
        let from_single = field.is_single_related();

        for (rel_column, rel_field) in columns {
            if !rel_field.is_shown_as_sub_field() {
                continue;
            }
            let name = format!("{}.{}", field.name, rel_column);
            let cell_render_type = if from_single {
                rel_field.field_type
            } else {
                many_type_override(rel_field.field_type).unwrap_or(rel_field.field_type)
            };
            let synthetic = FieldSchema {
                name: name.clone(),
                related: Some(RelatedColumn {
                    field: field_name.clone(),
                    sub_field: rel_column.clone(),
                }),
                cell_render_type: Some(cell_render_type),
                ..rel_field.clone()
            };
            result.insert(name, synthetic);
        }
    }

    Some(result)
}
