//! Data Source Adapter.
//!
//! Resolves a logical dataset (`type` + [`Origin`]) from the read-only
//! [`DataCatalog`] built at startup, picks the text and label fields, and
//! validates that every record carries both. Records are ordered field maps
//! rather than fixed structs, so any field can serve as text or label.

pub mod loader;

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One item (article, movie, ...) as an ordered field-name → value mapping.
pub type Record = Map<String, Value>;

/// Where a dataset comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    /// JSON files bundled in the data directory.
    Builtin,
    /// Remotely fetched catalog.
    External,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Builtin => "builtin",
            Self::External => "external",
        }
    }
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Origin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "builtin" | "dummy" => Ok(Self::Builtin),
            "external" | "huggingface" | "hf" => Ok(Self::External),
            _ => Err(format!(
                "unknown origin: {s}. Supported: builtin (dummy), external (huggingface)"
            )),
        }
    }
}

/// Which role a field plays in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    Text,
    Title,
}

impl std::fmt::Display for FieldRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text_field"),
            Self::Title => f.write_str("title_field"),
        }
    }
}

/// The requested field does not exist on (every record of) the dataset.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} '{field}' not found in {data_type} ({origin}) data. Available fields: {}", .available.join(", "))]
pub struct FieldNotFoundError {
    pub role: FieldRole,
    pub field: String,
    pub data_type: String,
    pub origin: Origin,
    /// Field names of the first record missing `field`, in source order.
    pub available: Vec<String>,
    /// Position of the first record missing `field`.
    pub record_index: usize,
}

/// Text and label field names actually used for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldSelection {
    pub text: String,
    pub title: String,
}

impl FieldSelection {
    /// Default field names for a dataset type.
    pub fn defaults_for(data_type: &str) -> Self {
        let (text, title) = match data_type {
            "articles" => ("content", "title"),
            "movies" => ("plot", "title"),
            _ => ("text", "title"),
        };
        Self {
            text: text.into(),
            title: title.into(),
        }
    }

    pub fn is_default_for(&self, data_type: &str) -> bool {
        *self == Self::defaults_for(data_type)
    }
}

/// A validated, non-empty dataset ready for embedding.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub data_type: String,
    pub origin: Origin,
    pub fields: FieldSelection,
    pub records: Vec<Record>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Text values to embed, in record order.
    pub fn texts(&self) -> Vec<String> {
        self.column(&self.fields.text)
    }

    /// Label values used to annotate the chart, in record order.
    pub fn titles(&self) -> Vec<String> {
        self.column(&self.fields.title)
    }

    fn column(&self, field: &str) -> Vec<String> {
        self.records
            .iter()
            .map(|r| r.get(field).map(value_to_text).unwrap_or_default())
            .collect()
    }
}

/// Outcome of [`DataCatalog::resolve`].
#[derive(Debug, Clone)]
pub enum Resolved {
    Records(Dataset),
    /// Nothing to process: the dataset is missing, unavailable, or has no records.
    Empty {
        data_type: String,
        origin: Origin,
        fields: FieldSelection,
    },
}

/// Summary of one loaded dataset, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetInfo {
    #[serde(rename = "type")]
    pub data_type: String,
    pub origin: Origin,
    pub count: usize,
    pub fields: Vec<String>,
    pub default_fields: FieldSelection,
}

/// Read-only collection of every dataset loaded at startup.
#[derive(Debug, Clone, Default)]
pub struct DataCatalog {
    datasets: BTreeMap<(String, Origin), Vec<Record>>,
}

impl DataCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register records under `(data_type, origin)`, replacing any previous set.
    pub fn insert(&mut self, data_type: impl Into<String>, origin: Origin, records: Vec<Record>) {
        self.datasets.insert((data_type.into(), origin), records);
    }

    pub fn with_dataset(
        mut self,
        data_type: impl Into<String>,
        origin: Origin,
        records: Vec<Record>,
    ) -> Self {
        self.insert(data_type, origin, records);
        self
    }

    pub fn get(&self, data_type: &str, origin: Origin) -> Option<&[Record]> {
        self.datasets
            .get(&(data_type.to_string(), origin))
            .map(Vec::as_slice)
    }

    /// Resolve a dataset and validate the chosen fields on every record.
    ///
    /// Field overrides replace the type-specific defaults. A missing or empty
    /// dataset yields [`Resolved::Empty`] so callers can skip embedding.
    pub fn resolve(
        &self,
        data_type: &str,
        origin: Origin,
        text_field: Option<&str>,
        title_field: Option<&str>,
    ) -> Result<Resolved, FieldNotFoundError> {
        let mut fields = FieldSelection::defaults_for(data_type);
        if let Some(text) = text_field {
            fields.text = text.to_string();
        }
        if let Some(title) = title_field {
            fields.title = title.to_string();
        }

        let records = match self.get(data_type, origin) {
            Some(records) if !records.is_empty() => records,
            _ => {
                return Ok(Resolved::Empty {
                    data_type: data_type.to_string(),
                    origin,
                    fields,
                })
            }
        };

        for (role, field) in [(FieldRole::Text, &fields.text), (FieldRole::Title, &fields.title)] {
            if let Some((record_index, record)) = records
                .iter()
                .enumerate()
                .find(|(_, r)| !has_field(r, field))
            {
                return Err(FieldNotFoundError {
                    role,
                    field: field.clone(),
                    data_type: data_type.to_string(),
                    origin,
                    available: record.keys().cloned().collect(),
                    record_index,
                });
            }
        }

        Ok(Resolved::Records(Dataset {
            data_type: data_type.to_string(),
            origin,
            fields,
            records: records.to_vec(),
        }))
    }

    /// Describe every loaded dataset (record count and field names of the first record).
    pub fn describe(&self) -> Vec<DatasetInfo> {
        self.datasets
            .iter()
            .map(|((data_type, origin), records)| DatasetInfo {
                data_type: data_type.clone(),
                origin: *origin,
                count: records.len(),
                fields: records
                    .first()
                    .map(|r| r.keys().cloned().collect())
                    .unwrap_or_default(),
                default_fields: FieldSelection::defaults_for(data_type),
            })
            .collect()
    }
}

/// A field counts as present when it exists with a non-null value.
fn has_field(record: &Record, field: &str) -> bool {
    matches!(record.get(field), Some(v) if !v.is_null())
}

/// Render a JSON value as plain text for embedding or annotation.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap()
    }

    fn movies() -> Vec<Record> {
        vec![
            record(json!({"id": 1, "title": "Alien", "plot": "A crew meets a creature.", "year": 1979})),
            record(json!({"id": 2, "title": "Heat", "plot": "A detective hunts a thief.", "year": 1995})),
        ]
    }

    fn catalog() -> DataCatalog {
        DataCatalog::new().with_dataset("movies", Origin::Builtin, movies())
    }

    #[test]
    fn origin_parses_aliases() {
        assert_eq!("builtin".parse::<Origin>().unwrap(), Origin::Builtin);
        assert_eq!("dummy".parse::<Origin>().unwrap(), Origin::Builtin);
        assert_eq!("huggingface".parse::<Origin>().unwrap(), Origin::External);
        assert_eq!("External".parse::<Origin>().unwrap(), Origin::External);
        assert!("ftp".parse::<Origin>().is_err());
    }

    #[test]
    fn defaults_are_type_specific() {
        assert_eq!(FieldSelection::defaults_for("articles").text, "content");
        assert_eq!(FieldSelection::defaults_for("movies").text, "plot");
        assert_eq!(FieldSelection::defaults_for("recipes").text, "text");
        assert_eq!(FieldSelection::defaults_for("movies").title, "title");
    }

    #[test]
    fn resolve_uses_defaults() {
        let Resolved::Records(ds) = catalog().resolve("movies", Origin::Builtin, None, None).unwrap()
        else {
            panic!("expected records");
        };
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.fields.text, "plot");
        assert_eq!(ds.titles(), vec!["Alien", "Heat"]);
    }

    #[test]
    fn resolve_honors_overrides() {
        let Resolved::Records(ds) = catalog()
            .resolve("movies", Origin::Builtin, Some("title"), Some("year"))
            .unwrap()
        else {
            panic!("expected records");
        };
        assert_eq!(ds.texts(), vec!["Alien", "Heat"]);
        assert_eq!(ds.titles(), vec!["1979", "1995"]);
        assert!(!ds.fields.is_default_for("movies"));
    }

    #[test]
    fn unknown_field_lists_available_fields() {
        let err = catalog()
            .resolve("movies", Origin::Builtin, Some("nonexistent"), None)
            .unwrap_err();
        assert_eq!(err.role, FieldRole::Text);
        assert_eq!(err.field, "nonexistent");
        assert_eq!(err.available, vec!["id", "title", "plot", "year"]);
        assert!(err.to_string().contains("Available fields: id, title, plot, year"));
    }

    #[test]
    fn field_missing_on_one_record_fails() {
        let mut records = movies();
        records.push(record(json!({"id": 3, "title": "Up"})));
        let catalog = DataCatalog::new().with_dataset("movies", Origin::Builtin, records);
        let err = catalog.resolve("movies", Origin::Builtin, None, None).unwrap_err();
        assert_eq!(err.field, "plot");
        assert_eq!(err.record_index, 2);
        assert_eq!(err.available, vec!["id", "title"]);
    }

    #[test]
    fn null_value_counts_as_missing() {
        let records = vec![record(json!({"title": "X", "plot": null}))];
        let catalog = DataCatalog::new().with_dataset("movies", Origin::Builtin, records);
        assert!(catalog.resolve("movies", Origin::Builtin, None, None).is_err());
    }

    #[test]
    fn missing_dataset_is_empty_not_error() {
        let resolved = catalog()
            .resolve("movies", Origin::External, Some("anything"), None)
            .unwrap();
        assert!(matches!(resolved, Resolved::Empty { origin: Origin::External, .. }));

        let empty = DataCatalog::new().with_dataset("articles", Origin::Builtin, vec![]);
        assert!(matches!(
            empty.resolve("articles", Origin::Builtin, None, None).unwrap(),
            Resolved::Empty { .. }
        ));
    }

    #[test]
    fn describe_reports_counts_and_fields() {
        let info = catalog().describe();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].count, 2);
        assert_eq!(info[0].fields, vec!["id", "title", "plot", "year"]);
    }
}
