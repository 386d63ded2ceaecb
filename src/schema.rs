//! The ordered column schema shared by training and inference.
//!
//! A [`ColumnSchema`] is built once (at training time or at artifact load)
//! and owns a name -> index map, so every [`EncodedVector`] is a fixed-size
//! buffer laid out in schema order.

use serde::{ser::SerializeMap, Deserialize, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap};

use crate::error::{PriceError, Result};

pub const YEAR_COLUMN: &str = "year";
pub const MILEAGE_COLUMN: &str = "mileage";

/// Categorical dimensions expanded into indicator columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Brand,
    Fuel,
    Transmission,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [Dimension::Brand, Dimension::Fuel, Dimension::Transmission];

    pub fn prefix(self) -> &'static str {
        match self {
            Dimension::Brand => "brand_",
            Dimension::Fuel => "fuel_",
            Dimension::Transmission => "transmission_",
        }
    }

    pub fn column(self, value: &str) -> String {
        format!("{}{}", self.prefix(), value)
    }

    /// `value` itself when it already carries this dimension's prefix.
    pub fn canonical_column(self, value: &str) -> String {
        if value.starts_with(self.prefix()) {
            value.to_string()
        } else {
            self.column(value)
        }
    }

    pub fn strip<'a>(self, column: &'a str) -> &'a str {
        column.strip_prefix(self.prefix()).unwrap_or(column)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct ColumnSchema {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    year: usize,
    mileage: usize,
}

impl ColumnSchema {
    pub fn new(columns: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                return Err(PriceError::SchemaMismatch(format!("duplicate column '{}'", name)));
            }
        }
        let year = *index
            .get(YEAR_COLUMN)
            .ok_or_else(|| PriceError::SchemaMismatch("schema has no 'year' column".into()))?;
        let mileage = *index
            .get(MILEAGE_COLUMN)
            .ok_or_else(|| PriceError::SchemaMismatch("schema has no 'mileage' column".into()))?;
        Ok(Self { columns, index, year, mileage })
    }

    /// Numeric columns first, then one indicator per observed value of each
    /// dimension, each group sorted.
    pub fn from_categories(
        brands: &BTreeSet<String>,
        fuels: &BTreeSet<String>,
        transmissions: &BTreeSet<String>,
    ) -> Result<Self> {
        let mut columns = vec![YEAR_COLUMN.to_string(), MILEAGE_COLUMN.to_string()];
        for (dim, values) in [
            (Dimension::Brand, brands),
            (Dimension::Fuel, fuels),
            (Dimension::Transmission, transmissions),
        ] {
            columns.extend(values.iter().map(|v| dim.column(v)));
        }
        Self::new(columns)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index_of(&self, column: &str) -> Option<usize> {
        self.index.get(column).copied()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    pub fn year_index(&self) -> usize {
        self.year
    }

    pub fn mileage_index(&self) -> usize {
        self.mileage
    }

    /// Category values of one dimension, in schema order.
    pub fn values(&self, dim: Dimension) -> impl Iterator<Item = &str> + '_ {
        self.columns
            .iter()
            .filter_map(move |c| c.strip_prefix(dim.prefix()))
    }

    /// Column indices belonging to one dimension.
    pub fn indices(&self, dim: Dimension) -> impl Iterator<Item = usize> + '_ {
        self.columns
            .iter()
            .enumerate()
            .filter(move |(_, c)| c.starts_with(dim.prefix()))
            .map(|(i, _)| i)
    }

    /// SHA-256 over the ordered column names; identifies a schema version.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for c in &self.columns {
            hasher.update(c.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }

    /// All-zero vector laid out for this schema.
    pub fn zeroed(&self) -> EncodedVector<'_> {
        EncodedVector {
            schema: self,
            values: vec![0.0; self.columns.len()].into_boxed_slice(),
        }
    }
}

impl PartialEq for ColumnSchema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

impl TryFrom<Vec<String>> for ColumnSchema {
    type Error = PriceError;

    fn try_from(columns: Vec<String>) -> Result<Self> {
        Self::new(columns)
    }
}

impl From<ColumnSchema> for Vec<String> {
    fn from(schema: ColumnSchema) -> Self {
        schema.columns
    }
}

/// Feature values bound to the schema they were laid out for.
#[derive(Debug, Clone)]
pub struct EncodedVector<'s> {
    schema: &'s ColumnSchema,
    values: Box<[f64]>,
}

impl<'s> EncodedVector<'s> {
    pub fn schema(&self) -> &'s ColumnSchema {
        self.schema
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, column: &str) -> Option<f64> {
        self.schema.index_of(column).map(|i| self.values[i])
    }

    pub(crate) fn set(&mut self, index: usize, value: f64) {
        self.values[index] = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'s str, f64)> + '_ {
        self.schema
            .columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    /// Number of indicators set within one dimension.
    pub fn active(&self, dim: Dimension) -> usize {
        self.schema
            .indices(dim)
            .filter(|&i| self.values[i] != 0.0)
            .count()
    }
}

impl Serialize for EncodedVector<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}
