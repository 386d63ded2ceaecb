//! Offline side: listings in, schema + metadata + fitted model out.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ModelConfig;
use crate::error::{PriceError, Result};
use crate::model::RidgeModel;
use crate::parser::{parse_listing, parse_price};
use crate::schema::{ColumnSchema, Dimension};
use crate::types::{RawListing, TrainingRow};
use crate::validator::{BrandMetadata, MetadataRegistry};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    pub top_brands: usize,
    pub min_price: i64,
    pub ridge_lambda: f64,
}

impl BuildOptions {
    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self {
            top_brands: cfg.top_brands,
            min_price: cfg.min_price,
            ridge_lambda: cfg.ridge_lambda,
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

/// Row accounting for one training run. Missing-field counts are
/// per column, so one row can appear in several of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleaningReport {
    pub total: usize,
    pub missing_year: usize,
    pub missing_mileage: usize,
    pub missing_price: usize,
    pub missing_brand: usize,
    pub below_min_price: usize,
    pub outside_top_brands: usize,
    pub retained: usize,
    pub top_brands: Vec<String>,
}

/// Everything a training run produces; persisted as one unit.
#[derive(Debug, Clone)]
pub struct TrainedBundle {
    pub model: RidgeModel,
    pub schema: ColumnSchema,
    pub metadata: MetadataRegistry,
    pub report: CleaningReport,
}

/// Parses listings and keeps complete rows priced above `min_price`.
pub fn clean_listings(listings: &[RawListing], min_price: i64) -> (Vec<TrainingRow>, CleaningReport) {
    let mut report = CleaningReport { total: listings.len(), ..Default::default() };
    let mut rows = Vec::with_capacity(listings.len());

    for listing in listings {
        let parsed = parse_listing(listing);
        let price = parse_price(&listing.raw_price);
        report.missing_year += parsed.year.is_none() as usize;
        report.missing_mileage += parsed.mileage.is_none() as usize;
        report.missing_brand += parsed.brand.is_none() as usize;
        report.missing_price += price.is_none() as usize;

        let Some(row) = parsed.into_training_row(price) else {
            continue;
        };
        if row.price <= min_price {
            report.below_min_price += 1;
            continue;
        }
        rows.push(row);
    }
    (rows, report)
}

/// The `k` most frequent brands; ties go to the brand seen first.
pub fn top_brands(rows: &[TrainingRow], k: usize) -> Vec<String> {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        counts.entry(row.brand.as_str()).or_insert((0, i)).0 += 1;
    }
    let mut ranked: Vec<(&str, usize, usize)> =
        counts.into_iter().map(|(b, (n, first))| (b, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(k).map(|(b, _, _)| b.to_string()).collect()
}

pub fn aggregate_metadata(rows: &[TrainingRow]) -> MetadataRegistry {
    struct Acc {
        fuels: BTreeSet<String>,
        transmissions: BTreeSet<String>,
        min_year: i32,
        max_year: i32,
    }

    let mut acc: BTreeMap<&str, Acc> = BTreeMap::new();
    for row in rows {
        let a = acc.entry(row.brand.as_str()).or_insert_with(|| Acc {
            fuels: BTreeSet::new(),
            transmissions: BTreeSet::new(),
            min_year: row.year,
            max_year: row.year,
        });
        a.fuels.insert(row.fuel.as_str().to_string());
        a.transmissions.insert(row.transmission.as_str().to_string());
        a.min_year = a.min_year.min(row.year);
        a.max_year = a.max_year.max(row.year);
    }

    MetadataRegistry::new(
        acc.into_iter()
            .map(|(brand, a)| {
                (
                    brand.to_string(),
                    BrandMetadata {
                        fuels: a.fuels.into_iter().collect(),
                        transmissions: a.transmissions.into_iter().collect(),
                        min_year: a.min_year,
                        max_year: a.max_year,
                    },
                )
            })
            .collect(),
    )
}

/// Schema with one indicator per observed category value.
pub fn schema_for(rows: &[TrainingRow]) -> Result<ColumnSchema> {
    let brands: BTreeSet<String> = rows.iter().map(|r| r.brand.clone()).collect();
    let fuels: BTreeSet<String> = rows.iter().map(|r| r.fuel.as_str().to_string()).collect();
    let transmissions: BTreeSet<String> =
        rows.iter().map(|r| r.transmission.as_str().to_string()).collect();
    ColumnSchema::from_categories(&brands, &fuels, &transmissions)
}

/// Lays a training row out in schema order.
pub fn encode_row(schema: &ColumnSchema, row: &TrainingRow) -> Result<Vec<f64>> {
    let mut v = schema.zeroed();
    v.set(schema.year_index(), f64::from(row.year));
    v.set(schema.mileage_index(), row.mileage as f64);
    for (dim, value) in [
        (Dimension::Brand, row.brand.as_str()),
        (Dimension::Fuel, row.fuel.as_str()),
        (Dimension::Transmission, row.transmission.as_str()),
    ] {
        let column = dim.column(value);
        let i = schema
            .index_of(&column)
            .ok_or_else(|| PriceError::SchemaMismatch(format!("no column '{}' for training row", column)))?;
        v.set(i, 1.0);
    }
    Ok(v.as_slice().to_vec())
}

pub fn build(listings: &[RawListing], opts: &BuildOptions) -> Result<TrainedBundle> {
    let (rows, mut report) = clean_listings(listings, opts.min_price);
    tracing::info!(
        "missing values: year={} mileage={} price={} brand={}",
        report.missing_year,
        report.missing_mileage,
        report.missing_price,
        report.missing_brand
    );

    let top = top_brands(&rows, opts.top_brands);
    let keep: BTreeSet<&str> = top.iter().map(String::as_str).collect();
    let before = rows.len();
    let rows: Vec<TrainingRow> = rows.into_iter().filter(|r| keep.contains(r.brand.as_str())).collect();
    report.outside_top_brands = before - rows.len();
    report.retained = rows.len();
    report.top_brands = top;

    if rows.is_empty() {
        return Err(PriceError::EmptyTrainingSet);
    }
    tracing::info!("data after cleaning: {} of {} rows", report.retained, report.total);
    tracing::info!("top brands: {:?}", report.top_brands);

    let schema = schema_for(&rows)?;
    let metadata = aggregate_metadata(&rows);
    log_average_prices(&rows);

    let matrix = rows
        .iter()
        .map(|r| encode_row(&schema, r))
        .collect::<Result<Vec<_>>>()?;
    let targets: Vec<f64> = rows.iter().map(|r| r.price as f64).collect();

    tracing::info!("fitting ridge regression on {} rows x {} columns", matrix.len(), schema.len());
    let model = RidgeModel::fit(&matrix, &targets, opts.ridge_lambda, schema.fingerprint())?;

    Ok(TrainedBundle { model, schema, metadata, report })
}

fn log_average_prices(rows: &[TrainingRow]) {
    let mut sums: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in rows {
        let e = sums.entry(r.brand.as_str()).or_insert((0.0, 0));
        e.0 += r.price as f64;
        e.1 += 1;
    }
    for (brand, (sum, n)) in sums.into_iter().take(5) {
        tracing::info!("average price {}: {:.0}", brand, sum / n as f64);
    }
}
