use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use derive_builder::Builder;

use crate::data::SheetRanges;
use crate::sheets::client::SheetsAuth;
use crate::stops::EmptyStudents;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },

    #[error("Config error: {0}")]
    Builder(#[from] ConfigBuilderError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, Builder)]
#[builder(default, setter(into))]
pub struct Config {
    pub listen_address: String,
    pub allow_origin: Option<String>,
    pub spreadsheet_id: Option<String>,
    pub sheets_api_key: Option<String>,
    pub sheets_access_token: Option<String>,
    pub sheet_ranges: SheetRanges,
    pub stops_csv_path: PathBuf,
    pub students_csv_path: PathBuf,
    pub routes_geojson_path: Option<PathBuf>,
    pub cache_ttl: Duration,
    pub fetch_timeout: Duration,
    pub geocode_timeout: Duration,
    pub empty_students: EmptyStudents,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_address: "127.0.0.1:8080".to_string(),
            allow_origin: None,
            spreadsheet_id: None,
            sheets_api_key: None,
            sheets_access_token: None,
            sheet_ranges: SheetRanges::default(),
            stops_csv_path: PathBuf::from("data/bus_stops.csv"),
            students_csv_path: PathBuf::from("data/students.csv"),
            routes_geojson_path: None,
            cache_ttl: Duration::from_secs(600),
            fetch_timeout: Duration::from_secs(15),
            geocode_timeout: Duration::from_secs(5),
            empty_students: EmptyStudents::Blank,
        }
    }
}

fn parse<T: FromStr>(name: &'static str, value: String) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

fn parse_bool(name: &'static str, value: String) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid { name, value }),
    }
}

impl Config {
    pub fn from_env() -> ConfigResult<Config> {
        Config::from_vars(|name| env::var(name).ok())
    }

    /// Builds the config from a variable lookup; blank values count as unset
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Config> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut builder = ConfigBuilder::default();
        let mut ranges = SheetRanges::default();

        if let Some(v) = var("LISTEN_ADDRESS") {
            builder.listen_address(v);
        }
        if let Some(v) = var("ALLOW_ORIGIN") {
            builder.allow_origin(Some(v));
        }
        if let Some(v) = var("SPREADSHEET_ID") {
            builder.spreadsheet_id(Some(v));
        }
        if let Some(v) = var("SHEETS_API_KEY") {
            builder.sheets_api_key(Some(v));
        }
        if let Some(v) = var("SHEETS_ACCESS_TOKEN") {
            builder.sheets_access_token(Some(v));
        }
        if let Some(v) = var("STOPS_HEADER_RANGE") {
            ranges.stops_header = v;
        }
        if let Some(v) = var("STOPS_ROWS_RANGE") {
            ranges.stops_rows = v;
        }
        if let Some(v) = var("STUDENTS_HEADER_RANGE") {
            ranges.students_header = v;
        }
        if let Some(v) = var("STUDENTS_ROWS_RANGE") {
            ranges.students_rows = v;
        }
        builder.sheet_ranges(ranges);
        if let Some(v) = var("STOPS_CSV_PATH") {
            builder.stops_csv_path(v);
        }
        if let Some(v) = var("STUDENTS_CSV_PATH") {
            builder.students_csv_path(v);
        }
        if let Some(v) = var("ROUTES_GEOJSON_PATH") {
            builder.routes_geojson_path(Some(PathBuf::from(v)));
        }
        if let Some(v) = var("CACHE_TTL_SECS") {
            builder.cache_ttl(Duration::from_secs(parse("CACHE_TTL_SECS", v)?));
        }
        if let Some(v) = var("FETCH_TIMEOUT_SECS") {
            builder.fetch_timeout(Duration::from_secs(parse("FETCH_TIMEOUT_SECS", v)?));
        }
        if let Some(v) = var("GEOCODE_TIMEOUT_SECS") {
            builder.geocode_timeout(Duration::from_secs(parse("GEOCODE_TIMEOUT_SECS", v)?));
        }
        if let Some(v) = var("EMPTY_STUDENTS_PLACEHOLDER") {
            if parse_bool("EMPTY_STUDENTS_PLACEHOLDER", v)? {
                builder.empty_students(EmptyStudents::Placeholder);
            }
        }

        Ok(builder.build()?)
    }

    /// The spreadsheet id and credential, when both are configured
    pub fn sheets(&self) -> Option<(&str, SheetsAuth)> {
        let id = self.spreadsheet_id.as_deref()?;
        let auth = match (&self.sheets_access_token, &self.sheets_api_key) {
            (Some(token), _) => SheetsAuth::AccessToken(token.clone()),
            (None, Some(key)) => SheetsAuth::ApiKey(key.clone()),
            (None, None) => return None,
        };
        Some((id, auth))
    }
}
