use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, sync::Arc};

use crate::config::LabelMappings;
use crate::error::ValidationError;
use crate::schema::Dimension;
use crate::types::PredictionQuery;

/// Category combinations observed for one brand in the training data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrandMetadata {
    pub fuels: Vec<String>,
    pub transmissions: Vec<String>,
    pub min_year: i32,
    pub max_year: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetadataRegistry {
    brands: BTreeMap<String, BrandMetadata>,
}

impl MetadataRegistry {
    pub fn new(brands: BTreeMap<String, BrandMetadata>) -> Self {
        Self { brands }
    }

    pub fn get(&self, brand: &str) -> Option<&BrandMetadata> {
        self.brands.get(brand)
    }

    /// Exact key first, then a case-insensitive match.
    pub fn resolve(&self, brand: &str) -> Option<(&str, &BrandMetadata)> {
        if let Some((k, v)) = self.brands.get_key_value(brand) {
            return Some((k.as_str(), v));
        }
        let wanted = brand.to_lowercase();
        self.brands
            .iter()
            .find(|(k, _)| k.to_lowercase() == wanted)
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn brands(&self) -> impl Iterator<Item = &str> {
        self.brands.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.brands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.brands.is_empty()
    }
}

/// Checks a query against the brand registry before it is encoded.
#[derive(Debug, Clone)]
pub struct MetadataValidator {
    registry: Option<Arc<MetadataRegistry>>,
    labels: LabelMappings,
}

impl MetadataValidator {
    pub fn new(registry: Option<Arc<MetadataRegistry>>, labels: LabelMappings) -> Self {
        if registry.is_none() {
            tracing::warn!("no metadata registry loaded; queries will not be validated");
        }
        Self { registry, labels }
    }

    pub fn is_enabled(&self) -> bool {
        self.registry.is_some()
    }

    /// Returns the brand spelled as the registry records it. Without a
    /// registry every query passes and the brand comes back unchanged.
    pub fn validate(&self, query: &PredictionQuery) -> Result<String, ValidationError> {
        let Some(registry) = &self.registry else {
            return Ok(query.brand.clone());
        };

        let (brand, meta) = registry
            .resolve(&query.brand)
            .ok_or_else(|| ValidationError::UnknownBrand { brand: query.brand.clone() })?;

        let fuel = self.check_label(&query.fuel, self.labels.fuel_column(&query.fuel), Dimension::Fuel);
        let fuel = fuel.to_lowercase();
        let fuel_ok = meta.fuels.iter().any(|valid| {
            let valid = valid.to_lowercase();
            valid.contains(&fuel) || fuel.contains(&valid)
        });
        if !fuel_ok {
            return Err(ValidationError::FuelNotObserved {
                brand: brand.to_string(),
                fuel: query.fuel.clone(),
                available: meta.fuels.clone(),
            });
        }

        let transmission = self.check_label(
            &query.transmission,
            self.labels.transmission_column(&query.transmission),
            Dimension::Transmission,
        );
        if !meta.transmissions.iter().any(|t| t == transmission) {
            return Err(ValidationError::TransmissionNotObserved {
                brand: brand.to_string(),
                transmission: query.transmission.clone(),
                available: meta.transmissions.clone(),
            });
        }

        if query.year < meta.min_year || query.year > meta.max_year {
            tracing::warn!(
                "{} {} is outside the observed years {}..={}",
                brand,
                query.year,
                meta.min_year,
                meta.max_year
            );
        }
        Ok(brand.to_string())
    }

    /// Category value to compare against the registry: the mapped column,
    /// or the raw label when the table has no entry, without its prefix.
    fn check_label<'a>(&self, label: &'a str, mapped: Option<&'a str>, dim: Dimension) -> &'a str {
        dim.strip(mapped.unwrap_or(label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Arc<MetadataRegistry> {
        let mut brands = BTreeMap::new();
        brands.insert(
            "BMW".to_string(),
            BrandMetadata {
                fuels: vec!["Benzín".into(), "Nafta".into()],
                transmissions: vec!["Automatická".into(), "Manuální".into()],
                min_year: 2005,
                max_year: 2023,
            },
        );
        brands.insert(
            "Tesla".to_string(),
            BrandMetadata {
                fuels: vec!["Elektro".into()],
                transmissions: vec!["Automatická".into()],
                min_year: 2016,
                max_year: 2023,
            },
        );
        Arc::new(MetadataRegistry::new(brands))
    }

    fn validator() -> MetadataValidator {
        MetadataValidator::new(Some(registry()), LabelMappings::default())
    }

    #[test]
    fn test_brand_case_insensitive() {
        let q = PredictionQuery::new(2020, 50_000, "bmw", "Petrol", "Automatic");
        assert_eq!(validator().validate(&q).unwrap(), "BMW");
    }

    #[test]
    fn test_unknown_brand_named() {
        let q = PredictionQuery::new(2020, 50_000, "Trabant", "Petrol", "Manual");
        let err = validator().validate(&q).unwrap_err();
        assert_eq!(err, ValidationError::UnknownBrand { brand: "Trabant".into() });
        assert!(err.to_string().contains("Trabant"));
    }

    #[test]
    fn test_fuel_without_overlap_lists_all_fuels() {
        let q = PredictionQuery::new(2020, 50_000, "Tesla", "Diesel", "Automatic");
        let err = validator().validate(&q).unwrap_err();
        match &err {
            ValidationError::FuelNotObserved { available, .. } => {
                assert_eq!(available, &vec!["Elektro".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(err.to_string().contains("Available: Elektro"));
    }

    #[test]
    fn test_fuel_substring_overlap_accepted() {
        // Unmapped label is compared raw and matches by substring.
        let q = PredictionQuery::new(2020, 50_000, "Tesla", "elektr", "Automatic");
        assert!(validator().validate(&q).is_ok());
        let q = PredictionQuery::new(2020, 50_000, "BMW", "Benzín + LPG", "Manual");
        assert!(validator().validate(&q).is_ok());
    }

    #[test]
    fn test_prefixed_labels_compared_without_prefix() {
        let q = PredictionQuery::new(2020, 50_000, "BMW", "fuel_Benzín", "transmission_Manuální");
        assert_eq!(validator().validate(&q).unwrap(), "BMW");

        let q = PredictionQuery::new(2020, 50_000, "Tesla", "fuel_Elektro", "transmission_Manuální");
        let err = validator().validate(&q).unwrap_err();
        assert!(matches!(err, ValidationError::TransmissionNotObserved { .. }));
        println!("✓ column-style labels agree with the encoder");
    }

    #[test]
    fn test_transmission_requires_exact_match() {
        let q = PredictionQuery::new(2020, 50_000, "Tesla", "Electric", "Manual");
        let err = validator().validate(&q).unwrap_err();
        match err {
            ValidationError::TransmissionNotObserved { available, transmission, .. } => {
                assert_eq!(transmission, "Manual");
                assert_eq!(available, vec!["Automatická".to_string()]);
            }
            other => panic!("unexpected {:?}", other),
        }
        let q = PredictionQuery::new(2020, 50_000, "Tesla", "Electric", "automatická");
        assert!(validator().validate(&q).is_err());
    }

    #[test]
    fn test_missing_registry_passes_everything() {
        let v = MetadataValidator::new(None, LabelMappings::default());
        let q = PredictionQuery::new(1900, 1, "Whatever", "Steam", "Sail");
        assert!(!v.is_enabled());
        assert_eq!(v.validate(&q).unwrap(), "Whatever");
    }

    #[test]
    fn test_registry_json_keyed_by_brand() {
        let json = serde_json::to_string(registry().as_ref()).unwrap();
        assert!(json.starts_with("{\"BMW\":{\"fuels\":[\"Benzín\",\"Nafta\"]"));
        let back: MetadataRegistry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back.get("Tesla").unwrap().min_year, 2016);
    }
}
