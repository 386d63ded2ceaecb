use std::{collections::HashSet, io::Read, path::Path};

use crate::error::{PriceError, Result};
use crate::types::RawListing;

/// Reads the crawler's CSV (`url,title,raw_price,description`).
pub fn load_listings(path: impl AsRef<Path>) -> Result<Vec<RawListing>> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(PriceError::ArtifactMissing { path: path.to_path_buf() });
    }
    let file = std::fs::File::open(path)?;
    let listings = read_listings(file)?;
    tracing::info!("loaded {} listings from {}", listings.len(), path.display());
    Ok(listings)
}

/// Parses listings from any reader, keeping the first occurrence of each URL.
pub fn read_listings<R: Read>(reader: R) -> Result<Vec<RawListing>> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    let mut duplicates = 0usize;

    for record in rdr.deserialize::<RawListing>() {
        let listing = record?;
        if listing.url.is_empty() || !seen.insert(listing.url.clone()) {
            duplicates += 1;
            continue;
        }
        out.push(listing);
    }
    if duplicates > 0 {
        tracing::warn!("skipped {} duplicate or url-less listings", duplicates);
    }
    Ok(out)
}
