//! Table schema: column constants, versioned Arrow schema builders, and
//! encoding-tolerant column readers.
//!
//! Version history:
//! - v1: `tool_name` plain Utf8; `routing_keywords`/`intents` delimited Utf8
//! - v2: `tool_name` Dictionary<Int32, Utf8>; list fields still delimited Utf8
//! - v3 (current): `routing_keywords`/`intents` native List<Utf8>

use std::sync::Arc;

use lance::deps::arrow_array::array::ArrayAccessor;
use lance::deps::arrow_array::types::Int32Type;
use lance::deps::arrow_array::{Array, DictionaryArray, ListArray, StringArray};
use lance::deps::arrow_schema::{DataType, Field, Schema};

/// ID column name (unique within a table)
pub const ID_COLUMN: &str = "id";
/// Embedding vector column name
pub const VECTOR_COLUMN: &str = "vector";
/// Free-text content / description column name
pub const CONTENT_COLUMN: &str = "content";
/// Parent skill column (scalar index / filtering)
pub const SKILL_NAME_COLUMN: &str = "skill_name";
/// Category column (scalar index / filtering; stored, not query-scored)
pub const CATEGORY_COLUMN: &str = "category";
/// Tool identifier column (`skill.command`), Arrow-native
pub const TOOL_NAME_COLUMN: &str = "tool_name";
/// Source file path column
pub const FILE_PATH_COLUMN: &str = "file_path";
/// Routing keywords column
pub const ROUTING_KEYWORDS_COLUMN: &str = "routing_keywords";
/// Intent labels column
pub const INTENTS_COLUMN: &str = "intents";
/// Free-form JSON metadata column
pub const METADATA_COLUMN: &str = "metadata";

/// Default embedding dimension when none is configured.
pub const DEFAULT_DIMENSION: usize = 384;

/// Current target schema version. New tables are created at this version.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Columns that the engine owns and refuses to alter or drop.
pub fn is_reserved_column(column: &str) -> bool {
    matches!(
        column,
        ID_COLUMN
            | VECTOR_COLUMN
            | CONTENT_COLUMN
            | SKILL_NAME_COLUMN
            | CATEGORY_COLUMN
            | TOOL_NAME_COLUMN
            | FILE_PATH_COLUMN
            | ROUTING_KEYWORDS_COLUMN
            | INTENTS_COLUMN
            | METADATA_COLUMN
    )
}

fn vector_field(dimension: usize) -> Field {
    Field::new(
        VECTOR_COLUMN,
        DataType::FixedSizeList(
            Arc::new(Field::new("item", DataType::Float32, true)),
            i32::try_from(dimension).unwrap_or(i32::MAX),
        ),
        false,
    )
}

fn string_list_field(name: &str) -> Field {
    Field::new(
        name,
        DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
        true,
    )
}

/// Current (v3) table schema for the given embedding dimension.
pub fn table_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new(ID_COLUMN, DataType::Utf8, false),
        vector_field(dimension),
        Field::new(CONTENT_COLUMN, DataType::Utf8, false),
        Field::new_dictionary(SKILL_NAME_COLUMN, DataType::Int32, DataType::Utf8, true),
        Field::new_dictionary(CATEGORY_COLUMN, DataType::Int32, DataType::Utf8, true),
        Field::new_dictionary(TOOL_NAME_COLUMN, DataType::Int32, DataType::Utf8, true),
        Field::new(FILE_PATH_COLUMN, DataType::Utf8, true),
        string_list_field(ROUTING_KEYWORDS_COLUMN),
        string_list_field(INTENTS_COLUMN),
        Field::new(METADATA_COLUMN, DataType::Utf8, true),
    ]))
}

/// Infer schema version from a table's Arrow schema.
///
/// Tables without a `tool_name` column predate versioning and read as v1.
pub fn schema_version_of(schema: &Schema) -> u32 {
    let Ok(tool_field) = schema.field_with_name(TOOL_NAME_COLUMN) else {
        return 1;
    };
    if !matches!(tool_field.data_type(), DataType::Dictionary(_, _)) {
        return 1;
    }
    match schema.field_with_name(ROUTING_KEYWORDS_COLUMN) {
        Ok(f) if matches!(f.data_type(), DataType::List(_)) => 3,
        _ => 2,
    }
}

/// String at row `i` for a column that may be Utf8 or Dictionary<Int32, Utf8>.
/// Returns empty string for nulls or unsupported encodings.
#[inline]
pub fn utf8_at(array: &dyn Array, i: usize) -> String {
    if let Some(s) = array.as_any().downcast_ref::<StringArray>() {
        if s.is_null(i) {
            return String::new();
        }
        return s.value(i).to_string();
    }
    if let Some(d) = array.as_any().downcast_ref::<DictionaryArray<Int32Type>>() {
        if let Some(typed) = d.downcast_dict::<StringArray>() {
            if typed.is_null(i) {
                return String::new();
            }
            return typed.value(i).to_string();
        }
    }
    String::new()
}

#[inline]
fn string_list_at_impl(
    array: &dyn Array,
    i: usize,
    legacy_split: fn(&str) -> Vec<String>,
) -> Vec<String> {
    if let Some(list) = array.as_any().downcast_ref::<ListArray>() {
        if list.is_null(i) {
            return Vec::new();
        }
        let slice = list.value(i);
        let Some(items) = slice.as_any().downcast_ref::<StringArray>() else {
            return Vec::new();
        };
        return (0..items.len())
            .filter(|&j| !items.is_null(j))
            .map(|j| items.value(j).to_string())
            .collect();
    }
    if let Some(s) = array.as_any().downcast_ref::<StringArray>() {
        if s.is_null(i) {
            return Vec::new();
        }
        return legacy_split(s.value(i));
    }
    Vec::new()
}

/// Routing keywords at row `i`. Supports List<Utf8> (v3) and legacy
/// space-separated Utf8 (v1/v2).
#[inline]
pub fn routing_keywords_at(array: &dyn Array, i: usize) -> Vec<String> {
    string_list_at_impl(array, i, |s| {
        s.split_whitespace().map(String::from).collect()
    })
}

/// Intents at row `i`. Supports List<Utf8> (v3) and legacy pipe-separated
/// Utf8 (v1/v2).
#[inline]
pub fn intents_at(array: &dyn Array, i: usize) -> Vec<String> {
    string_list_at_impl(array, i, |s| {
        s.split('|')
            .map(|x| x.trim().to_string())
            .filter(|x| !x.is_empty())
            .collect()
    })
}
