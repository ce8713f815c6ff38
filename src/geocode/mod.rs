mod error;
pub mod providers;

use std::sync::OnceLock;

use futures_util::future::BoxFuture;
use regex::Regex;
use serde::Serialize;

pub use error::{GeocodeError, GeocodeResult};

use crate::entities::Coordinate;
use crate::utils::fold_width;

/// One external geocoding service
pub trait GeocodeProvider: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when the service answered but knows no such place
    fn lookup<'a>(&'a self, query: &'a str) -> BoxFuture<'a, GeocodeResult<Option<Coordinate>>>;
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GeocodeHit {
    pub coordinate: Coordinate,
    /// Name of the provider that answered
    pub source: String,
    /// The query text that matched, which may be the address without house numbers
    pub query: String,
}

pub struct Geocoder {
    providers: Vec<Box<dyn GeocodeProvider>>,
}

fn house_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:[-‐−ー]\d+)*").unwrap())
}

pub fn normalize_address(address: &str) -> String {
    fold_width(address)
}

/// The normalised address, then the same address without house numbers so a
/// neighbourhood-level match is still possible
pub fn query_candidates(address: &str) -> Vec<String> {
    let normalized = normalize_address(address);
    if normalized.is_empty() {
        return vec![];
    }

    let stripped = house_number_re().replace_all(&normalized, "");
    let stripped = stripped
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    let mut candidates = vec![normalized];
    if !stripped.is_empty() && !candidates.contains(&stripped) {
        candidates.push(stripped);
    }
    candidates
}

impl Geocoder {
    /// `providers` are asked in order
    pub fn new(providers: Vec<Box<dyn GeocodeProvider>>) -> Self {
        Geocoder { providers }
    }

    /// First coordinate any provider returns for any candidate query.
    ///
    /// A provider that errors is skipped; there are no retries. `None` means
    /// nothing matched and the user should adjust the address.
    pub async fn geocode(&self, address: &str) -> Option<GeocodeHit> {
        for query in query_candidates(address) {
            for provider in &self.providers {
                match provider.lookup(&query).await {
                    Ok(Some(coordinate)) => {
                        log::info!("Geocoded '{}' with {}", query, provider.name());
                        return Some(GeocodeHit {
                            coordinate,
                            source: provider.name().to_string(),
                            query,
                        });
                    }
                    Ok(None) => {
                        log::debug!("{} has no match for '{}'", provider.name(), query);
                    }
                    Err(e) => {
                        log::warn!("{} failed for '{}': {}", provider.name(), query, e);
                    }
                }
            }
        }

        log::info!("No geocoding match for '{}'", address);
        None
    }
}
