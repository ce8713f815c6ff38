use std::sync::OnceLock;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use geojson::GeoJson;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use super::error::{GeocodeError, GeocodeResult};
use super::GeocodeProvider;
use crate::entities::Coordinate;

/// The geocoding services, each with its own response shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// GSI address search, a JSON array of GeoJSON-like features
    Gsi,
    /// Nominatim, asked for a GeoJSON FeatureCollection object
    Nominatim,
    /// geocoding.jp, an XML document
    GeocodingJp,
}

impl Endpoint {
    /// Order they are tried in
    pub const PRIORITY: [Endpoint; 3] = [Endpoint::Gsi, Endpoint::Nominatim, Endpoint::GeocodingJp];

    pub fn name(&self) -> &'static str {
        match self {
            Endpoint::Gsi => "gsi",
            Endpoint::Nominatim => "nominatim",
            Endpoint::GeocodingJp => "geocoding.jp",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Endpoint::Gsi => "https://msearch.gsi.go.jp/address-search/AddressSearch",
            Endpoint::Nominatim => "https://nominatim.openstreetmap.org/search",
            Endpoint::GeocodingJp => "https://www.geocoding.jp/api/",
        }
    }

    fn url(&self, base_url: &str, query: &str) -> GeocodeResult<Url> {
        let url = match self {
            Endpoint::Nominatim => Url::parse_with_params(
                base_url,
                &[("q", query), ("format", "geojson"), ("limit", "1"), ("countrycodes", "jp")],
            )?,
            Endpoint::Gsi | Endpoint::GeocodingJp => Url::parse_with_params(base_url, &[("q", query)])?,
        };
        Ok(url)
    }

    pub fn parse(&self, body: &str) -> GeocodeResult<Option<Coordinate>> {
        match self {
            Endpoint::Gsi => parse_gsi(body),
            Endpoint::Nominatim => parse_nominatim(body),
            Endpoint::GeocodingJp => parse_geocoding_jp(body),
        }
    }
}

#[derive(Deserialize)]
struct GsiFeature {
    geometry: GsiGeometry,
}

#[derive(Deserialize)]
struct GsiGeometry {
    /// longitude, latitude
    coordinates: [f64; 2],
}

fn parse_gsi(body: &str) -> GeocodeResult<Option<Coordinate>> {
    let features: Vec<GsiFeature> = serde_json::from_str(body)?;
    Ok(features
        .first()
        .and_then(|f| Coordinate::new(f.geometry.coordinates[1], f.geometry.coordinates[0])))
}

fn parse_nominatim(body: &str) -> GeocodeResult<Option<Coordinate>> {
    let collection = match body.parse::<GeoJson>()? {
        GeoJson::FeatureCollection(collection) => collection,
        other => {
            return Err(GeocodeError::Malformed(format!(
                "expected a FeatureCollection, got {}",
                other
            )))
        }
    };

    let coordinate = collection
        .features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .find_map(|g| match &g.value {
            geojson::Value::Point(position) if position.len() >= 2 => {
                Coordinate::new(position[1], position[0])
            }
            _ => None,
        });
    Ok(coordinate)
}

fn parse_geocoding_jp(body: &str) -> GeocodeResult<Option<Coordinate>> {
    static LAT: OnceLock<Regex> = OnceLock::new();
    static LNG: OnceLock<Regex> = OnceLock::new();
    let lat_re = LAT.get_or_init(|| Regex::new(r"<lat>\s*(-?[0-9.]+)\s*</lat>").unwrap());
    let lng_re = LNG.get_or_init(|| Regex::new(r"<lng>\s*(-?[0-9.]+)\s*</lng>").unwrap());

    if !body.contains("<result") {
        return Err(GeocodeError::Malformed("no <result> element".to_string()));
    }
    // the service answers unknown addresses with an <error> element
    if body.contains("<error>") {
        return Ok(None);
    }

    let value = |re: &Regex| -> GeocodeResult<Option<f64>> {
        match re.captures(body).and_then(|c| c.get(1)) {
            Some(m) => m
                .as_str()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| GeocodeError::Malformed(e.to_string())),
            None => Ok(None),
        }
    };

    match (value(lat_re)?, value(lng_re)?) {
        (Some(lat), Some(lng)) => Ok(Coordinate::new(lat, lng)),
        _ => Ok(None),
    }
}

/// One [`Endpoint`] over HTTP
pub struct HttpProvider {
    client: reqwest::Client,
    endpoint: Endpoint,
    base_url: String,
    timeout: Duration,
}

impl HttpProvider {
    pub fn new(client: reqwest::Client, endpoint: Endpoint, timeout: Duration) -> Self {
        HttpProvider {
            client,
            endpoint,
            base_url: endpoint.base_url().to_string(),
            timeout,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Every endpoint, in priority order, sharing one client
    pub fn all(client: &reqwest::Client, timeout: Duration) -> Vec<Box<dyn GeocodeProvider>> {
        Endpoint::PRIORITY
            .into_iter()
            .map(|endpoint| {
                Box::new(HttpProvider::new(client.clone(), endpoint, timeout)) as Box<dyn GeocodeProvider>
            })
            .collect()
    }

    async fn request(&self, query: &str) -> GeocodeResult<Option<Coordinate>> {
        let url = self.endpoint.url(&self.base_url, query)?;
        log::debug!("Requesting {}", url);

        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let body = response.text().await?;
        log::trace!("Response: {}", body);
        self.endpoint.parse(&body)
    }
}

impl GeocodeProvider for HttpProvider {
    fn name(&self) -> &str {
        self.endpoint.name()
    }

    fn lookup<'a>(&'a self, query: &'a str) -> BoxFuture<'a, GeocodeResult<Option<Coordinate>>> {
        self.request(query).boxed()
    }
}
