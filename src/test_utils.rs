use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::Utc;
use futures_util::future::{self, BoxFuture, FutureExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use crate::data::{DataError, DataResult, RawTable, RawTables, TableSource};
use crate::entities::{BusStop, Coordinate, DataSource, Snapshot, Student};
use crate::geocode::{GeocodeError, GeocodeProvider, GeocodeResult};

pub fn init() {
    dotenvy::from_filename(".dev.vars").ok();
    env_logger::builder().is_test(true).try_init().ok();
}

pub fn stop(route: &str, stop_name: &str, lat: Option<f64>, lng: Option<f64>) -> BusStop {
    BusStop {
        route: route.to_string(),
        stop_name: stop_name.to_string(),
        sequence: None,
        lat,
        lng,
        time_to: "7:30".to_string(),
        time_from: "15:10".to_string(),
        schedule_type: None,
    }
}

pub fn stop_seq(route: &str, stop_name: &str, sequence: Option<u32>) -> BusStop {
    BusStop {
        sequence,
        ..stop(route, stop_name, Some(35.0), Some(139.0))
    }
}

pub fn student(name: &str, route: &str, stop_name: &str, direction: &str) -> Student {
    Student {
        name: name.to_string(),
        route: route.to_string(),
        stop_name: stop_name.to_string(),
        direction: direction.to_string(),
        department: None,
    }
}

pub fn snapshot(stops: Vec<BusStop>, students: Vec<Student>) -> Snapshot {
    Snapshot {
        stops,
        students,
        source: DataSource::LocalCsv,
        loaded_at: Utc::now(),
    }
}

pub fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
    RawTable {
        headers: headers.iter().map(|h| h.to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|c| c.to_string()).collect())
            .collect(),
    }
}

/// Table source returning canned tables, counting how often it is asked
pub struct FakeSource {
    source: DataSource,
    tables: RawTables,
    healthy: Arc<AtomicBool>,
    stalled: bool,
    fetches: Arc<AtomicUsize>,
}

impl FakeSource {
    pub fn ok(source: DataSource, tables: RawTables) -> Self {
        FakeSource {
            source,
            tables,
            healthy: Arc::new(AtomicBool::new(true)),
            stalled: false,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing(source: DataSource) -> Self {
        let fake = FakeSource::ok(source, RawTables::default());
        fake.healthy.store(false, Ordering::SeqCst);
        fake
    }

    /// Never answers, like a server that accepts the connection and goes quiet
    pub fn stalled(source: DataSource) -> Self {
        FakeSource {
            stalled: true,
            ..FakeSource::ok(source, RawTables::default())
        }
    }

    pub fn fetch_counter(&self) -> Arc<AtomicUsize> {
        self.fetches.clone()
    }

    pub fn health(&self) -> Arc<AtomicBool> {
        self.healthy.clone()
    }
}

impl TableSource for FakeSource {
    fn source(&self) -> DataSource {
        self.source
    }

    fn fetch(&self) -> BoxFuture<'_, DataResult<RawTables>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            return future::pending().boxed();
        }
        let result = if self.healthy.load(Ordering::SeqCst) {
            Ok(self.tables.clone())
        } else {
            Err(DataError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "source unavailable",
            )))
        };
        future::ready(result).boxed()
    }
}

/// Geocoding endpoint that only knows a fixed set of queries
pub struct FakeProvider {
    name: String,
    known: HashMap<String, Coordinate>,
    broken: bool,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeProvider {
    pub fn new(name: &str, known: &[(&str, f64, f64)]) -> Self {
        FakeProvider {
            name: name.to_string(),
            known: known
                .iter()
                .filter_map(|(q, lat, lng)| Some((q.to_string(), Coordinate::new(*lat, *lng)?)))
                .collect(),
            broken: false,
            calls: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Fails every lookup, like an endpoint that times out
    pub fn broken(name: &str) -> Self {
        FakeProvider {
            broken: true,
            ..FakeProvider::new(name, &[])
        }
    }

    pub fn calls(&self) -> Arc<Mutex<Vec<String>>> {
        self.calls.clone()
    }
}

impl GeocodeProvider for FakeProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup<'a>(&'a self, query: &'a str) -> BoxFuture<'a, GeocodeResult<Option<Coordinate>>> {
        self.calls.lock().unwrap().push(query.to_string());
        let result = if self.broken {
            Err(GeocodeError::Malformed(format!("{} is down", self.name)))
        } else {
            Ok(self.known.get(query).copied())
        };
        future::ready(result).boxed()
    }
}

/// Local HTTP server for a single connection. With `None` the request is
/// read and never answered.
pub async fn serve_once(response: Option<&'static str>) -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = vec![0u8; 8192];
        stream.read(&mut buf).await.ok();
        match response {
            Some(response) => {
                stream.write_all(response.as_bytes()).await.ok();
                stream.shutdown().await.ok();
            }
            None => {
                tokio::time::sleep(std::time::Duration::from_secs(60)).await;
                drop(stream);
            }
        }
    });

    Url::parse(&format!("http://{}/", addr)).unwrap()
}
