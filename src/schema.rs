use serde::{Deserialize, Serialize};

/// Stored data type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Int,
    Long,
    Float,
    Double,
    Boolean,
    Timestamp,
    String,
    Json,
    Bytes,
}

impl DataType {
    /// Returns true for types that support arithmetic merges.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            DataType::Int | DataType::Long | DataType::Float | DataType::Double
        )
    }
}

/// Declaration of a single column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub data_type: DataType,
    #[serde(default = "default_single_value")]
    pub single_value: bool,
    /// Virtual columns are computed at query time and never stored.
    #[serde(default)]
    pub virtual_column: bool,
}

fn default_single_value() -> bool {
    true
}

/// Table schema: columns, primary key and time column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub primary_key_columns: Vec<String>,
    /// Main time column, used as the upsert comparison column when none is configured.
    #[serde(default)]
    pub time_column: Option<String>,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                name: name.into(),
                ..Default::default()
            },
        }
    }

    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of all stored (non-virtual) columns, in declaration order.
    pub fn physical_column_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| !f.virtual_column)
            .map(|f| f.name.as_str())
            .collect()
    }

    pub fn primary_key_columns(&self) -> &[String] {
        &self.primary_key_columns
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key_columns.iter().any(|c| c == column)
    }

    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }
}

pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    pub fn add_single_value(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.schema.fields.push(FieldSpec {
            name: name.into(),
            data_type,
            single_value: true,
            virtual_column: false,
        });
        self
    }

    pub fn add_multi_value(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.schema.fields.push(FieldSpec {
            name: name.into(),
            data_type,
            single_value: false,
            virtual_column: false,
        });
        self
    }

    pub fn add_virtual(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.schema.fields.push(FieldSpec {
            name: name.into(),
            data_type,
            single_value: true,
            virtual_column: true,
        });
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.schema.primary_key_columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn time_column(mut self, name: impl Into<String>) -> Self {
        self.schema.time_column = Some(name.into());
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_columns_skip_virtual() {
        let schema = Schema::builder("orders")
            .add_single_value("id", DataType::String)
            .add_multi_value("tags", DataType::String)
            .add_virtual("$docId", DataType::Int)
            .primary_key(&["id"])
            .build();

        assert_eq!(schema.physical_column_names(), vec!["id", "tags"]);
        assert!(schema.is_primary_key("id"));
        assert!(!schema.field_spec("tags").unwrap().single_value);
    }

    #[test]
    fn test_schema_from_json() {
        let json = r#"{
            "name": "events",
            "fields": [
                {"name": "id", "data_type": "STRING"},
                {"name": "clicks", "data_type": "LONG"}
            ],
            "primary_key_columns": ["id"],
            "time_column": "ts"
        }"#;
        let schema: Schema = serde_json::from_str(json).unwrap();
        assert_eq!(schema.time_column(), Some("ts"));
        assert!(schema.field_spec("clicks").unwrap().single_value);
        assert!(schema.field_spec("clicks").unwrap().data_type.is_numeric());
    }
}
