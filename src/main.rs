mod config;
mod data;
mod entities;
mod error;
mod geo;
mod geocode;
mod map;
mod sheets;
mod stops;
mod utils;

#[cfg(test)]
mod test_utils;

use std::env;
use std::sync::Arc;

use actix_web::{get, middleware::Logger, post, web, App, HttpResponse, HttpServer, Responder};
use serde::Deserialize;
use serde_json::json;

use config::Config;
use data::{CsvSource, DataLoader, SheetsSource, TableSource};
use entities::{Coordinate, DirectionFilter, RouteSelection};
use error::{AppError, AppResult};
use geocode::{providers::HttpProvider, Geocoder};
use map::{build_map, RouteLines};
use sheets::client::SheetsClient;
use stops::{EmptyStudents, JoinOptions};

use crate::geo::{rank_nearest, viewport};

const USER_AGENT: &str = concat!("busstop-finder/", env!("CARGO_PKG_VERSION"));

#[derive(Clone)]
pub struct ContextData {
    loader: Arc<DataLoader>,
    geocoder: Arc<Geocoder>,
    route_lines: Option<Arc<RouteLines>>,
    empty_students: EmptyStudents,
}

impl ContextData {
    fn from_config(config: &Config) -> AppResult<ContextData> {
        let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

        let mut sources: Vec<Box<dyn TableSource>> = vec![];
        match config.sheets() {
            Some((spreadsheet_id, auth)) => {
                let sheets =
                    SheetsClient::new(client.clone(), spreadsheet_id, auth)?.with_timeout(config.fetch_timeout);
                sources.push(Box::new(SheetsSource::new(sheets, config.sheet_ranges.clone())));
            }
            None => log::info!("Spreadsheet not configured, only local CSV files will be read"),
        }
        sources.push(Box::new(CsvSource::new(
            config.stops_csv_path.clone(),
            config.students_csv_path.clone(),
        )));

        let route_lines = match &config.routes_geojson_path {
            Some(path) => match RouteLines::load(path) {
                Ok(lines) => Some(Arc::new(lines)),
                Err(e) => {
                    log::warn!("Could not load route lines from {}: {}", path.display(), e);
                    None
                }
            },
            None => None,
        };

        Ok(ContextData {
            loader: Arc::new(DataLoader::new(sources, config.cache_ttl, config.fetch_timeout)),
            geocoder: Arc::new(Geocoder::new(HttpProvider::all(&client, config.geocode_timeout))),
            route_lines,
            empty_students: config.empty_students,
        })
    }
}

#[derive(Deserialize)]
struct StopsQuery {
    route: Option<String>,
    direction: Option<String>,
    focus: Option<String>,
}

#[derive(Deserialize)]
struct NearestQuery {
    lat: Option<f64>,
    lon: Option<f64>,
    address: Option<String>,
}

#[derive(Deserialize)]
struct StudentsQuery {
    name: String,
}

#[derive(Deserialize)]
struct MapQuery {
    route: Option<String>,
}

#[get("/ok")]
async fn ok() -> AppResult<impl Responder> {
    Ok(HttpResponse::Ok().finish())
}

#[get("/routes")]
async fn get_routes(ctx: web::Data<ContextData>) -> AppResult<impl Responder> {
    let snapshot = ctx.loader.load_data().await?;

    let response = web::Json(json!({
        "source": snapshot.source,
        "loaded_at": snapshot.loaded_at,
        "routes": stops::routes(&snapshot),
    }));
    Ok(response)
}

#[get("/stops")]
async fn get_stops(
    query: web::Query<StopsQuery>,
    ctx: web::Data<ContextData>,
) -> AppResult<impl Responder> {
    let direction = query
        .direction
        .as_deref()
        .unwrap_or_default()
        .parse::<DirectionFilter>()?;
    let selection = RouteSelection::from_query(query.route.as_deref());
    let options = JoinOptions {
        empty: ctx.empty_students,
        focus: query.focus.clone(),
    };

    let snapshot = ctx.loader.load_data().await?;
    let rows = stops::stops_with_students(&snapshot, &selection, direction, &options);

    let response = web::Json(json!({
        "source": snapshot.source,
        "stops": rows,
    }));
    Ok(response)
}

#[get("/stops/nearest")]
async fn get_nearest_stops(
    query: web::Query<NearestQuery>,
    ctx: web::Data<ContextData>,
) -> AppResult<impl Responder> {
    let (origin, geocoded) = match (query.lat, query.lon, query.address.as_deref()) {
        (Some(lat), Some(lon), _) => {
            let origin = Coordinate::new(lat, lon)
                .ok_or_else(|| AppError::Response(400, format!("Invalid coordinate: {}, {}", lat, lon)))?;
            (origin, None)
        }
        (_, _, Some(address)) if !address.trim().is_empty() => {
            let hit = ctx
                .geocoder
                .geocode(address)
                .await
                .ok_or_else(|| AppError::Response(404, format!("Address not found: {}", address)))?;
            (hit.coordinate, Some(hit))
        }
        _ => {
            return Err(AppError::Response(
                400,
                "Either lat and lon, or address, is required".to_string(),
            ))
        }
    };

    let snapshot = ctx.loader.load_data().await?;
    let nearest = rank_nearest(origin, &snapshot.stops);
    let view = viewport(origin, &nearest);

    let response = web::Json(json!({
        "origin": origin,
        "geocoded": geocoded,
        "stops": nearest,
        "viewport": [view.min().x, view.min().y, view.max().x, view.max().y],
    }));
    Ok(response)
}

#[get("/students")]
async fn get_students(
    query: web::Query<StudentsQuery>,
    ctx: web::Data<ContextData>,
) -> AppResult<impl Responder> {
    let snapshot = ctx.loader.load_data().await?;
    let matches = stops::find_students(&snapshot, &query.name);

    let response = web::Json(json!({
        "students": matches,
    }));
    Ok(response)
}

#[get("/map")]
async fn get_map(query: web::Query<MapQuery>, ctx: web::Data<ContextData>) -> AppResult<impl Responder> {
    let selection = RouteSelection::from_query(query.route.as_deref());

    let snapshot = ctx.loader.load_data().await?;
    let collection = build_map(&snapshot, ctx.route_lines.as_deref(), &selection);

    let response = HttpResponse::Ok()
        .content_type("application/geo+json")
        .json(collection);
    Ok(response)
}

#[post("/management/reload")]
async fn reload_data(ctx: web::Data<ContextData>) -> AppResult<impl Responder> {
    let snapshot = ctx.loader.reload().await?;

    let response = web::Json(json!({
        "source": snapshot.source,
        "loaded_at": snapshot.loaded_at,
        "stops": snapshot.stops.len(),
        "students": snapshot.students.len(),
    }));
    Ok(response)
}

fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(ok)
        .service(get_routes)
        .service(get_nearest_stops)
        .service(get_stops)
        .service(get_students)
        .service(get_map)
        .service(reload_data);
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::from_filename(".env").ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    env_logger::try_init().ok();

    log::debug!("Debug logging enabled");

    let config = Config::from_env().map_err(AppError::from)?;
    let ctx = ContextData::from_config(&config)?;

    // Without any data there is nothing to serve
    log::info!("Loading stop and student data");
    ctx.loader.load_data().await.map_err(AppError::from)?;

    let listen_address = config.listen_address.clone();
    let allow_origin = config.allow_origin.clone();

    log::info!("Starting server at {}", listen_address);

    HttpServer::new(move || {
        let logger = Logger::default();

        let mut cors = actix_cors::Cors::default()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec!["accept"]);

        if let Some(allowed_origin) = &allow_origin {
            if allowed_origin == "*" {
                cors = cors.allow_any_origin();
            } else {
                cors = cors.allowed_origin(allowed_origin);
            }
        }

        App::new()
            .wrap(logger)
            .wrap(cors)
            .app_data(web::Data::new(ctx.clone()))
            .configure(configure)
    })
    .bind(listen_address)?
    .run()
    .await
}
