use crate::url::normalize::normalize_seed;
use crate::HarvestError;
use std::collections::HashSet;
use std::path::Path;
use url::Url;

/// Loads the seed list: a JSON array of post URLs (absolute or site-relative)
///
/// Any failure here is fatal to the run. Seeds that fail to normalize are
/// reported and skipped; duplicates are dropped keeping the first occurrence.
pub fn load_seeds(path: &Path, base: &Url) -> Result<Vec<Url>, HarvestError> {
    let content = std::fs::read_to_string(path).map_err(|e| HarvestError::SeedList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let raw: Vec<String> = serde_json::from_str(&content).map_err(|e| HarvestError::SeedList {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(normalize_seeds(&raw, base))
}

/// Normalizes and de-duplicates raw seed strings
pub fn normalize_seeds(raw: &[String], base: &Url) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut seeds = Vec::with_capacity(raw.len());

    for entry in raw {
        match normalize_seed(entry, base) {
            Ok(url) => {
                if seen.insert(url.as_str().to_string()) {
                    seeds.push(url);
                }
            }
            Err(e) => tracing::warn!(seed = %entry, error = %e, "Skipping invalid seed URL"),
        }
    }

    seeds
}
