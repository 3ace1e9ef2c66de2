//! Snapshot model shared by providers and the screen.
//!
//! A [`Snapshot`] is one complete poll result: an aggregate `environment` row
//! plus an ordered row collection. Rows are loosely typed maps because the
//! tables address fields by key (display key and sort key may differ).

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use serde::ser::{SerializeMap, Serializer};

/// A single cell value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Field {
    Text(String),
    Int(i64),
    Float(f64),
    Time(DateTime<Utc>),
    List(Vec<String>),
    Bool(bool),
}

impl Field {
    /// Rank used when comparing values of different kinds.
    fn rank(&self) -> u8 {
        match self {
            Field::Bool(_) => 0,
            Field::Int(_) | Field::Float(_) => 1,
            Field::Time(_) => 2,
            Field::Text(_) => 3,
            Field::List(_) => 4,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Field::Int(v) => Some(*v as f64),
            Field::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Total ordering used by column sorting.
    ///
    /// Numbers compare numerically regardless of int/float representation;
    /// values of different kinds order by kind.
    pub fn sort_cmp(&self, other: &Field) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b).unwrap_or(Ordering::Equal);
        }
        match (self, other) {
            (Field::Text(a), Field::Text(b)) => a.cmp(b),
            (Field::Time(a), Field::Time(b)) => a.cmp(b),
            (Field::List(a), Field::List(b)) => a.cmp(b),
            (Field::Bool(a), Field::Bool(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Text(s) => f.write_str(s),
            Field::Int(v) => write!(f, "{}", v),
            Field::Float(v) if v.fract() == 0.0 && v.is_finite() => write!(f, "{:.1}", v),
            Field::Float(v) => write!(f, "{}", v),
            Field::Time(t) => write!(f, "{}", t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S")),
            Field::List(items) => f.write_str(&items.join(", ")),
            Field::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<u64> for Field {
    fn from(value: u64) -> Self {
        Field::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Field {
    fn from(value: usize) -> Self {
        Field::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float(value)
    }
}

impl From<DateTime<Utc>> for Field {
    fn from(value: DateTime<Utc>) -> Self {
        Field::Time(value)
    }
}

impl From<Vec<String>> for Field {
    fn from(value: Vec<String>) -> Self {
        Field::List(value)
    }
}

impl From<bool> for Field {
    fn from(value: bool) -> Self {
        Field::Bool(value)
    }
}

/// One row of a table: field name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(BTreeMap<String, Field>);

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Field> {
        self.0.get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Field>) {
        self.0.insert(key.into(), value.into());
    }

    /// Sets the field only when a value is present.
    pub fn set_opt<V: Into<Field>>(&mut self, key: &str, value: Option<V>) {
        if let Some(value) = value {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Field> {
        self.0.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Display text for a field, `-` when absent.
    pub fn display(&self, key: &str) -> String {
        self.get(key)
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string())
    }

    pub fn display_or(&self, key: &str, default: &str) -> String {
        self.get(key)
            .map(|f| f.to_string())
            .unwrap_or_else(|| default.to_string())
    }

    /// Text value of a field, if it is text.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.get(key) {
            Some(Field::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn int(&self, key: &str) -> Option<i64> {
        match self.get(key) {
            Some(Field::Int(v)) => Some(*v),
            Some(Field::Float(v)) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key) {
            Some(Field::Time(t)) => Some(*t),
            _ => None,
        }
    }

    pub fn list(&self, key: &str) -> &[String] {
        match self.get(key) {
            Some(Field::List(items)) => items,
            _ => &[],
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some(Field::Bool(true)))
    }

    /// Compares two rows on one key. Missing values sort as the text `-`.
    pub fn cmp_by(&self, other: &Row, key: &str) -> Ordering {
        let dash = Field::Text("-".to_string());
        let a = self.get(key).unwrap_or(&dash);
        let b = other.get(key).unwrap_or(&dash);
        a.sort_cmp(b)
    }
}

impl<K: Into<String>, V: Into<Field>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Row(iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect())
    }
}

/// Which row collection a snapshot carries; doubles as its JSON key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collection {
    #[default]
    Instances,
    AppVersions,
    Environments,
}

impl Collection {
    pub fn key(&self) -> &'static str {
        match self {
            Collection::Instances => "instances",
            Collection::AppVersions => "app_versions",
            Collection::Environments => "environments",
        }
    }
}

/// One complete poll result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub environment: Row,
    pub collection: Collection,
    pub rows: Vec<Row>,
}

impl Snapshot {
    pub fn new(collection: Collection, environment: Row, rows: Vec<Row>) -> Self {
        Self {
            environment,
            collection,
            rows,
        }
    }

    /// The stop sentinel: nothing left to show.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.environment.is_empty() && self.rows.is_empty()
    }

    /// Server-side refresh time of the aggregate data, if reported.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.environment.time("RefreshedAt")
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_empty() {
            return serializer.serialize_map(Some(0))?.end();
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("environment", &self.environment)?;
        map.serialize_entry(self.collection.key(), &self.rows)?;
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_compare_across_representations() {
        assert_eq!(Field::Int(2).sort_cmp(&Field::Float(2.5)), Ordering::Less);
        assert_eq!(Field::Float(3.0).sort_cmp(&Field::Int(3)), Ordering::Equal);
        assert_eq!(
            Field::Int(10).sort_cmp(&Field::Text("-".into())),
            Ordering::Less
        );
    }

    #[test]
    fn test_missing_field_sorts_as_dash() {
        let a: Row = [("name", "a")].into_iter().collect();
        let b = Row::new();
        assert_eq!(a.cmp_by(&b, "name"), "a".cmp("-"));
        assert_eq!(b.display("name"), "-");
    }

    #[test]
    fn test_float_display() {
        assert_eq!(Field::Float(12.0).to_string(), "12.0");
        assert_eq!(Field::Float(0.25).to_string(), "0.25");
    }

    #[test]
    fn test_snapshot_serializes_collection_key() {
        let env: Row = [("EnvironmentName", "prod")].into_iter().collect();
        let row: Row = [("VersionLabel", "v1")].into_iter().collect();
        let snapshot = Snapshot::new(Collection::AppVersions, env, vec![row]);
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["environment"]["EnvironmentName"], "prod");
        assert_eq!(value["app_versions"][0]["VersionLabel"], "v1");
        assert!(value.get("instances").is_none());
    }

    #[test]
    fn test_empty_snapshot_is_sentinel() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(serde_json::to_string(&snapshot).unwrap(), "{}");
    }
}
