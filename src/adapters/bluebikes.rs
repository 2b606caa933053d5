//! Bluebikes station and trip exports.
//!
//! Stations come as JSON, either a bare array or the GBFS envelope
//! `{"data": {"stations": [...]}}`. Trips come as the monthly CSV export, plain,
//! gzipped, or as the first `.csv` inside a zip archive.

use std::{
    collections::HashSet,
    fs::File,
    io::{BufReader, Cursor, Read},
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDateTime};
use flate2::read::GzDecoder;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::{
    adapters::TrafficAdapter,
    traffic::{MinuteOfDay, Station, StationId, Trip},
};

const ID_KEYS: &[&str] = &["short_name", "Number", "id"];
const NAME_KEYS: &[&str] = &["name", "NAME"];
const LAT_KEYS: &[&str] = &["lat", "Lat"];
const LON_KEYS: &[&str] = &["lon", "Long", "lng"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M",
];

pub struct BluebikesAdapter {
    stations_path: PathBuf,
    trips_path: PathBuf,
}

impl BluebikesAdapter {
    pub fn new(stations_path: impl Into<PathBuf>, trips_path: impl Into<PathBuf>) -> Self {
        Self {
            stations_path: stations_path.into(),
            trips_path: trips_path.into(),
        }
    }
}

impl TrafficAdapter for BluebikesAdapter {
    type Error = anyhow::Error;

    fn stations(&self) -> Result<Vec<Station>> {
        let file = File::open(&self.stations_path)
            .with_context(|| format!("opening {:?}", self.stations_path))?;
        let stations = parse_stations(BufReader::new(file))
            .with_context(|| format!("reading stations from {:?}", self.stations_path))?;
        info!(count = stations.len(), "loaded stations");
        Ok(stations)
    }

    fn trips(&self) -> Result<Vec<Trip>> {
        let reader = open_trips(&self.trips_path)?;
        let trips = parse_trips(reader)
            .with_context(|| format!("reading trips from {:?}", self.trips_path))?;
        info!(count = trips.len(), "loaded trips");
        Ok(trips)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StationDocument {
    Envelope { data: StationList },
    Bare(Vec<Map<String, Value>>),
}

#[derive(Deserialize)]
struct StationList {
    stations: Vec<Map<String, Value>>,
}

pub fn parse_stations<R: Read>(reader: R) -> Result<Vec<Station>> {
    let document: StationDocument =
        serde_json::from_reader(reader).context("invalid station document")?;
    let records = match document {
        StationDocument::Envelope { data } => data.stations,
        StationDocument::Bare(records) => records,
    };

    let mut seen = HashSet::new();
    let mut stations = Vec::with_capacity(records.len());
    for (i, record) in records.iter().enumerate() {
        let station = match station_from_record(record) {
            Ok(station) => station,
            Err(err) => {
                warn!("skipping station record {i}: {err:#}");
                continue;
            }
        };

        if !seen.insert(station.id.clone()) {
            warn!(id = %station.id, "duplicate station id, keeping the first record");
            continue;
        }
        stations.push(station);
    }

    Ok(stations)
}

fn field<'a>(record: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|&k| record.get(k))
        .find(|v| !v.is_null())
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn coordinate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn station_from_record(record: &Map<String, Value>) -> Result<Station> {
    let id = field(record, ID_KEYS)
        .and_then(text)
        .context("missing station id")?;
    let name = field(record, NAME_KEYS).and_then(text);
    let lat = field(record, LAT_KEYS)
        .and_then(coordinate)
        .with_context(|| format!("missing latitude for station {id}"))?;
    let lon = field(record, LON_KEYS)
        .and_then(coordinate)
        .with_context(|| format!("missing longitude for station {id}"))?;

    Ok(Station::new(StationId::new(id), name, lat, lon))
}

/// Opens a trip export, unpacking `.zip` and `.gz` sources.
pub fn open_trips(path: &Path) -> Result<Box<dyn Read>> {
    let file = File::open(path).with_context(|| format!("opening {path:?}"))?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("zip") => {
            let mut archive = ZipArchive::new(file)?;
            for i in 0..archive.len() {
                let mut entry = archive.by_index(i)?;
                let name = entry.name().to_ascii_lowercase();
                if name.ends_with(".csv") && !name.starts_with("__macosx") {
                    debug!(entry = entry.name(), "reading trips from archive");
                    let mut bytes = Vec::with_capacity(entry.size() as usize);
                    entry.read_to_end(&mut bytes)?;
                    return Ok(Box::new(Cursor::new(bytes)));
                }
            }
            bail!("no CSV file in {path:?}")
        }
        Some("gz") => Ok(Box::new(GzDecoder::new(BufReader::new(file)))),
        _ => Ok(Box::new(BufReader::new(file))),
    }
}

#[derive(Debug, Deserialize)]
struct TripRecord {
    started_at: String,
    ended_at: String,
    #[serde(default)]
    start_station_id: String,
    #[serde(default)]
    end_station_id: String,
}

/// Shares one allocation per distinct station id across all trips.
#[derive(Default)]
struct Interner(HashSet<Arc<str>>);

impl Interner {
    fn intern(&mut self, id: &str) -> StationId {
        let id = id.trim();
        if let Some(existing) = self.0.get(id) {
            return StationId::from(existing.clone());
        }
        let shared: Arc<str> = id.into();
        self.0.insert(shared.clone());
        StationId::from(shared)
    }
}

/// Parses a trip CSV with a header row. Rows with unusable timestamps are skipped.
pub fn parse_trips<R: Read>(reader: R) -> Result<Vec<Trip>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let mut interner = Interner::default();
    let mut trips = vec![];
    let mut skipped = 0usize;

    for (i, row) in reader.deserialize::<TripRecord>().enumerate() {
        let record = match row {
            Ok(record) => record,
            Err(err) if err.is_io_error() => return Err(err.into()),
            Err(err) => {
                debug!("skipping trip row {}: {err}", i + 1);
                skipped += 1;
                continue;
            }
        };

        let minutes = parse_minute(&record.started_at).and_then(|start| {
            parse_minute(&record.ended_at).map(|end| (start, end))
        });
        let (start_minute, end_minute) = match minutes {
            Ok(minutes) => minutes,
            Err(err) => {
                debug!("skipping trip row {}: {err}", i + 1);
                skipped += 1;
                continue;
            }
        };

        trips.push(Trip::new(
            interner.intern(&record.start_station_id),
            interner.intern(&record.end_station_id),
            start_minute,
            end_minute,
        ));
    }

    if skipped > 0 {
        warn!(skipped, kept = trips.len(), "skipped malformed trip rows");
    }

    Ok(trips)
}

/// Minute of day of a timestamp, read in the timestamp's own offset.
pub fn parse_minute(s: &str) -> Result<MinuteOfDay> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(MinuteOfDay::from_time(&dt.naive_local()));
    }

    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|dt| MinuteOfDay::from_time(&dt))
        .with_context(|| format!("invalid timestamp: {s:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minute_formats() {
        let expect = MinuteOfDay::new(8 * 60 + 5).unwrap();
        assert_eq!(parse_minute("2024-03-01 08:05:59").unwrap(), expect);
        assert_eq!(parse_minute("2024-03-01 08:05:59.123").unwrap(), expect);
        assert_eq!(parse_minute("2024-03-01T08:05:00").unwrap(), expect);
        assert_eq!(parse_minute("2024-03-01T08:05:00-05:00").unwrap(), expect);
        assert_eq!(parse_minute(" 2024-03-01 08:05 ").unwrap(), expect);
        assert!(parse_minute("yesterday").is_err());
        assert!(parse_minute("").is_err());
    }

    #[test]
    fn test_parse_trips_skips_bad_rows() {
        let csv = "\
ride_id,rideable_type,started_at,ended_at,start_station_id,end_station_id,member_casual
1,classic_bike,2024-03-01 08:05:10,2024-03-01 08:25:00,A32000,M32006,member
2,electric_bike,not a time,2024-03-01 08:25:00,A32000,M32006,member
3,classic_bike,2024-03-01 23:50:00,2024-03-02 00:10:00,M32006,,casual
";
        let trips = parse_trips(csv.as_bytes()).unwrap();

        assert_eq!(trips.len(), 2);
        assert_eq!(trips[0].start_station_id.as_str(), "A32000");
        assert_eq!(trips[0].start_minute.get(), 485);
        assert_eq!(trips[0].end_minute.get(), 505);
        assert_eq!(trips[1].start_minute.get(), 1430);
        assert_eq!(trips[1].end_minute.get(), 10);
        assert_eq!(trips[1].end_station_id.as_str(), "");
        assert_eq!(trips[0].end_station_id, trips[1].start_station_id);
    }

    #[test]
    fn test_parse_trips_missing_column() {
        let csv = "started_at,start_station_id\n2024-03-01 08:05:10,A32000\n";
        assert!(parse_trips(csv.as_bytes()).unwrap().is_empty());
    }

    #[test]
    fn test_parse_stations_envelope() {
        let json = r#"{"data": {"stations": [
            {"short_name": "A32000", "name": "Kendall T", "lat": 42.3625, "lon": -71.0843},
            {"short_name": "A32000", "name": "Duplicate", "lat": 0.0, "lon": 0.0},
            {"short_name": "B32001", "lat": 42.35},
            {"short_name": "C32002", "lat": "42.34", "lon": "-71.1"}
        ]}}"#;
        let stations = parse_stations(json.as_bytes()).unwrap();

        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].id.as_str(), "A32000");
        assert_eq!(stations[0].name.as_deref(), Some("Kendall T"));
        assert_eq!(stations[1].id.as_str(), "C32002");
        assert!((stations[1].lon + 71.1).abs() < 1e-9);
    }

    #[test]
    fn test_parse_stations_bare_array() {
        let json = r#"[{"Number": "D32003", "NAME": "MIT at Mass Ave", "Lat": 42.358, "Long": -71.093}]"#;
        let stations = parse_stations(json.as_bytes()).unwrap();

        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id.as_str(), "D32003");
        assert_eq!(stations[0].name.as_deref(), Some("MIT at Mass Ave"));
    }

    #[test]
    fn test_parse_stations_rejects_garbage() {
        assert!(parse_stations("{\"stations\": 3}".as_bytes()).is_err());
    }
}
