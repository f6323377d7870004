use crate::dataset::{Dataset, Record};
use crate::error::Error;
use crate::value::Value;
use crate::Result;
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};
use serde_json::Map;
use std::str::FromStr;

/// Wire form of a stats response. Tables are kept as raw JSON here so each one
/// can be decoded on its own and reported with its position.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    #[serde(default)]
    resource: String,
    parameters: Option<Map<String, serde_json::Value>>,
    result_sets: Option<serde_json::Value>,
    result_set: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTable {
    name: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    headers: Vec<String>,
    /// A `null` row stays in place as an empty row.
    #[serde(default, deserialize_with = "null_as_empty")]
    row_set: Vec<Option<Vec<serde_json::Value>>>,
}

/// `null` and a missing key both mean "nothing here", as for `parameters`.
fn null_as_empty<'de, D, T>(de: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(de)?.unwrap_or_default())
}

/// Parse one JSON document with no nesting limit. The stack grows on demand,
/// so deeply nested cells cannot overflow it.
fn parse_unbounded<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> serde_json::Result<T> {
    let mut de = serde_json::Deserializer::from_slice(bytes);
    de.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

fn from_tree<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> serde_json::Result<T> {
    T::deserialize(serde_stacker::Deserializer::new(value))
}

/// One named result set: column headers plus rows.
///
/// Header count and row length are independent; see [`Dataset::to_map`].
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    fn decode(raw: serde_json::Value, path: &str) -> Result<Self> {
        if !raw.is_object() {
            return Err(Error::shape(path, "result set is not an object"));
        }
        let wire: WireTable =
            from_tree(raw).map_err(|e| Error::UnexpectedShape {
                path: path.to_string(),
                reason: e.to_string(),
                source: Some(e),
            })?;
        Ok(Self {
            name: wire.name,
            headers: wire.headers,
            rows: wire
                .row_set
                .into_iter()
                .map(|row| row.unwrap_or_default().into_iter().map(Value::from).collect())
                .collect(),
        })
    }
}

/// A decoded stats response.
///
/// Built once from the transport's bytes and never mutated afterwards, so it
/// can be shared across threads and queried any number of times.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    resource: String,
    parameters: Map<String, serde_json::Value>,
    tables: Vec<Table>,
}

/// True iff `bytes` is exactly one UTF-8 JSON document. No shape checks and
/// no nesting limit; escapes are checked for syntax only, so a lone surrogate
/// such as `"\ud800"` is accepted.
pub fn is_valid_json(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok() && parse_unbounded::<IgnoredAny>(bytes).is_ok()
}

impl Envelope {
    pub fn new(
        resource: impl Into<String>,
        parameters: Map<String, serde_json::Value>,
        tables: Vec<Table>,
    ) -> Self {
        Self {
            resource: resource.into(),
            parameters,
            tables,
        }
    }

    /// Decode a raw response body.
    ///
    /// Accepts both `resultSets` (array) and the singular `resultSet` used by
    /// a few endpoints (object or array); `resultSets` wins when both exist.
    /// Missing `parameters` and missing or empty result sets are not errors.
    ///
    /// Valid JSON that has no `serde_json::Value` form (a lone surrogate
    /// escape, a number beyond f64) is reported as `UnexpectedShape`, not
    /// `MalformedPayload`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let root: serde_json::Value = parse_unbounded(bytes).map_err(|source| {
            if is_valid_json(bytes) {
                Error::UnexpectedShape {
                    path: "$".to_string(),
                    reason: format!("valid JSON but not representable: {}", source),
                    source: Some(source),
                }
            } else {
                Error::MalformedPayload { source }
            }
        })?;

        if !root.is_object() {
            return Err(Error::shape("$", "top level is not an object"));
        }
        let wire: WireEnvelope =
            from_tree(root).map_err(|e| Error::UnexpectedShape {
                path: "$".to_string(),
                reason: e.to_string(),
                source: Some(e),
            })?;

        let result_sets = wire.result_sets.filter(|v| !v.is_null());
        let result_set = wire.result_set.filter(|v| !v.is_null());
        let tables = match (result_sets, result_set) {
            (Some(serde_json::Value::Array(sets)), _) => decode_tables(sets, "resultSets")?,
            (Some(_), _) => return Err(Error::shape("resultSets", "expected an array")),
            (None, Some(serde_json::Value::Array(sets))) => decode_tables(sets, "resultSet")?,
            (None, Some(single @ serde_json::Value::Object(_))) => {
                vec![Table::decode(single, "resultSet")?]
            }
            (None, Some(_)) => {
                return Err(Error::shape("resultSet", "expected an object or an array"))
            }
            (None, None) => Vec::new(),
        };

        tracing::debug!(
            "Decoded {} with {} result set(s)",
            wire.resource,
            tables.len()
        );

        Ok(Self {
            resource: wire.resource,
            parameters: wire.parameters.unwrap_or_default(),
            tables,
        })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Request parameters echoed by the upstream. Never interpreted here.
    pub fn parameters(&self) -> &Map<String, serde_json::Value> {
        &self.parameters
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    /// Look up a result set by exact, case-sensitive name.
    ///
    /// Names are not guaranteed unique upstream; the first table in response
    /// order wins.
    pub fn get_dataset(&self, name: &str) -> Result<Dataset<'_>> {
        self.get_dataset_opt(name)
            .ok_or_else(|| Error::DatasetNotFound {
                name: name.to_string(),
            })
    }

    pub fn get_dataset_opt(&self, name: &str) -> Option<Dataset<'_>> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .map(Dataset::new)
    }

    pub fn contains_dataset(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name == name)
    }

    /// Table names in response order, duplicates included.
    pub fn dataset_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn datasets(&self) -> impl Iterator<Item = Dataset<'_>> {
        self.tables.iter().map(Dataset::new)
    }

    /// Every dataset materialized, keyed by name. Duplicate names keep the
    /// first table, matching [`Envelope::get_dataset`].
    pub fn to_normalized(&self) -> IndexMap<String, Vec<Record>> {
        let mut out = IndexMap::with_capacity(self.tables.len());
        for ds in self.datasets() {
            if !out.contains_key(ds.name()) {
                out.insert(ds.name().to_string(), ds.to_map());
            }
        }
        out
    }
}

impl FromStr for Envelope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s.as_bytes())
    }
}

fn decode_tables(sets: Vec<serde_json::Value>, key: &str) -> Result<Vec<Table>> {
    sets.into_iter()
        .enumerate()
        .map(|(i, raw)| Table::decode(raw, &format!("{}[{}]", key, i)))
        .collect()
}
