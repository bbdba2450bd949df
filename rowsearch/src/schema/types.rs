use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Insertion-ordered mapping of field name to field definition.
/// Order is significant: it drives export column order.
pub type TableSchema = IndexMap<String, FieldSchema>;

/// Field type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "longform")]
    Longform,
    #[serde(rename = "options")]
    Options,
    #[serde(rename = "array")]
    Array,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "bigint")]
    Bigint,
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "datetime")]
    Datetime,
    #[serde(rename = "attachment")]
    Attachments,
    #[serde(rename = "attachment_single")]
    AttachmentSingle,
    #[serde(rename = "signature_single")]
    SignatureSingle,
    #[serde(rename = "link")]
    Link,
    #[serde(rename = "formula")]
    Formula,
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "internal")]
    Internal,
    #[serde(rename = "barcodeqr")]
    BarcodeQr,
    #[serde(rename = "bb_reference")]
    BbReference,
    #[serde(rename = "bb_reference_single")]
    BbReferenceSingle,
}

impl FieldType {
    pub fn is_relationship(self) -> bool {
        self == FieldType::Link
    }

    /// Types whose cells may hold structured JSON rather than a scalar.
    pub fn holds_json(self) -> bool {
        matches!(
            self,
            FieldType::Link
                | FieldType::Array
                | FieldType::Json
                | FieldType::Attachments
                | FieldType::AttachmentSingle
                | FieldType::SignatureSingle
                | FieldType::BbReference
                | FieldType::BbReferenceSingle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationshipType {
    #[serde(rename = "one-to-many")]
    OneToMany,
    #[serde(rename = "many-to-one")]
    ManyToOne,
    #[serde(rename = "many-to-many")]
    ManyToMany,
}

/// Back-reference from a synthetic column to the relationship it reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedColumn {
    pub field: String,
    pub sub_field: String,
}

/// Definition of a single field in a table schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationship_type: Option<RelationshipType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Sub-schema of the related table, only meaningful on link fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<TableSchema>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub time_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub date_only: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub ignore_timezones: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related: Option<RelatedColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cell_render_type: Option<FieldType>,
}

impl FieldSchema {
    pub fn new(name: &str, field_type: FieldType) -> Self {
        FieldSchema {
            name: name.to_string(),
            field_type,
            visible: None,
            relationship_type: None,
            table_id: None,
            field_name: None,
            columns: None,
            time_only: false,
            date_only: false,
            ignore_timezones: false,
            related: None,
            cell_render_type: None,
        }
    }

    /// Top-level fields are shown unless explicitly hidden.
    pub fn is_shown(&self) -> bool {
        self.visible != Some(false)
    }

    /// Related sub-fields are hidden unless explicitly shown.
    pub fn is_shown_as_sub_field(&self) -> bool {
        self.visible == Some(true)
    }

    pub fn is_relationship(&self) -> bool {
        self.field_type.is_relationship()
    }

    /// The "one" side of a one-to-many link reads a single related row.
    pub fn is_single_related(&self) -> bool {
        self.is_relationship() && self.relationship_type == Some(RelationshipType::OneToMany)
    }
}

/// Where a table's rows live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableSourceType {
    /// Schemaless document store
    #[default]
    Internal,
    /// Relational (SQL) store
    External,
}

/// Definition of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source_type: TableSourceType,
    /// Name of the backing SQL table for external tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_table: Option<String>,
    #[serde(default)]
    pub schema: TableSchema,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub views: IndexMap<String, ViewMeta>,
}

impl Table {
    pub fn sql_table_name(&self) -> &str {
        self.sql_table.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Calculation {
    Stats,
    Count,
    Sum,
}

/// Stored metadata of a saved view
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewMeta {
    #[serde(default)]
    pub table_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<TableSchema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculation: Option<Calculation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

/// A saved view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct View {
    pub name: String,
    pub meta: ViewMeta,
}
