//! Rebuilds a training-compatible feature vector from a live query.

use std::sync::Arc;

use crate::config::LabelMappings;
use crate::schema::{ColumnSchema, Dimension, EncodedVector};
use crate::types::PredictionQuery;

/// Column name the manual indicator had before labels were translated.
pub const LEGACY_MANUAL_COLUMN: &str = "transmission_Manual";
const LEGACY_MANUAL_LABEL: &str = "Manual";

/// Outcome of resolving a category to a schema column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLookup {
    Known { column: String, index: usize },
    /// Nothing in the schema matched; the dimension stays at baseline zero.
    Unknown { tried: Vec<String> },
}

impl ColumnLookup {
    pub fn is_known(&self) -> bool {
        matches!(self, ColumnLookup::Known { .. })
    }

    pub fn index(&self) -> Option<usize> {
        match self {
            ColumnLookup::Known { index, .. } => Some(*index),
            ColumnLookup::Unknown { .. } => None,
        }
    }
}

/// A vector plus how each categorical dimension was resolved.
#[derive(Debug, Clone)]
pub struct Encoding<'s> {
    pub vector: EncodedVector<'s>,
    pub brand: ColumnLookup,
    pub fuel: ColumnLookup,
    pub transmission: ColumnLookup,
}

impl Encoding<'_> {
    pub fn unknown_dimensions(&self) -> Vec<Dimension> {
        [
            (Dimension::Brand, &self.brand),
            (Dimension::Fuel, &self.fuel),
            (Dimension::Transmission, &self.transmission),
        ]
        .into_iter()
        .filter(|(_, l)| !l.is_known())
        .map(|(d, _)| d)
        .collect()
    }
}

#[derive(Debug, Clone)]
pub struct InferenceEncoder {
    schema: Arc<ColumnSchema>,
    labels: LabelMappings,
}

impl InferenceEncoder {
    pub fn new(schema: Arc<ColumnSchema>, labels: LabelMappings) -> Self {
        Self { schema, labels }
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn lookup_brand(&self, brand: &str) -> ColumnLookup {
        self.first_known(vec![Dimension::Brand.column(brand)])
    }

    /// Mapped column when the table knows the label, else the raw label
    /// taken as canonical.
    pub fn lookup_fuel(&self, label: &str) -> ColumnLookup {
        let candidate = match self.labels.fuel_column(label) {
            Some(column) => column.to_string(),
            None => Dimension::Fuel.canonical_column(label),
        };
        self.first_known(vec![candidate])
    }

    /// Same lookup as fuel. An unmapped "Manual" goes to the column
    /// bundles trained before translation used.
    pub fn lookup_transmission(&self, label: &str) -> ColumnLookup {
        let candidate = match self.labels.transmission_column(label) {
            Some(column) => column.to_string(),
            None if label == LEGACY_MANUAL_LABEL => LEGACY_MANUAL_COLUMN.to_string(),
            None => Dimension::Transmission.canonical_column(label),
        };
        self.first_known(vec![candidate])
    }

    fn first_known(&self, tried: Vec<String>) -> ColumnLookup {
        for column in &tried {
            if let Some(index) = self.schema.index_of(column) {
                return ColumnLookup::Known { column: column.clone(), index };
            }
        }
        ColumnLookup::Unknown { tried }
    }

    pub fn encode(&self, query: &PredictionQuery) -> Encoding<'_> {
        let mut vector = self.schema.zeroed();
        vector.set(self.schema.year_index(), f64::from(query.year));
        vector.set(self.schema.mileage_index(), query.mileage as f64);

        let brand = self.lookup_brand(&query.brand);
        let fuel = self.lookup_fuel(&query.fuel);
        let transmission = self.lookup_transmission(&query.transmission);
        for lookup in [&brand, &fuel, &transmission] {
            if let Some(i) = lookup.index() {
                vector.set(i, 1.0);
            }
        }

        Encoding { vector, brand, fuel, transmission }
    }
}
