#[derive(thiserror::Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Deserialize error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

pub type GeocodeResult<T> = Result<T, GeocodeError>;
