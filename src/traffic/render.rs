//! What the map layer receives after each recompute.

use geojson::{Feature, FeatureCollection, JsonObject, JsonValue, ser::serialize_geometry};
use serde::Serialize;
use tracing::warn;

use crate::traffic::{Station, StationId, TimeFilter, scale::RadiusScale};

/// Departure share bins used to colour markers: mostly arrivals, balanced, mostly departures.
const FLOW_BINS: [f64; 3] = [0.0, 0.5, 1.0];

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StationMarker {
    pub id: StationId,
    pub name: Option<String>,
    pub departures: usize,
    pub arrivals: usize,
    pub total_traffic: usize,
    pub radius: f64,
    pub tooltip: String,
    pub departure_ratio: f64,
    #[serde(serialize_with = "serialize_geometry")]
    pub geometry: geo_types::Point<f64>,
}

impl StationMarker {
    pub fn new(station: &Station, scale: &RadiusScale) -> Self {
        Self {
            id: station.id.clone(),
            name: station.name.clone(),
            departures: station.departures(),
            arrivals: station.arrivals(),
            total_traffic: station.total_traffic(),
            radius: scale.radius(station.total_traffic()),
            tooltip: tooltip(station),
            departure_ratio: departure_ratio(station.departures(), station.total_traffic()),
            geometry: geo_types::Point::new(station.lon, station.lat),
        }
    }
}

pub fn tooltip(station: &Station) -> String {
    format!(
        "{} trips ({} departures, {} arrivals)",
        station.total_traffic(),
        station.departures(),
        station.arrivals()
    )
}

/// Share of traffic that departed, quantized into [`FLOW_BINS`]. A station with no
/// traffic counts as balanced.
pub fn departure_ratio(departures: usize, total_traffic: usize) -> f64 {
    if total_traffic == 0 {
        return FLOW_BINS[1];
    }
    let share = departures as f64 / total_traffic as f64;
    let bin = ((share * FLOW_BINS.len() as f64).floor() as usize).min(FLOW_BINS.len() - 1);
    FLOW_BINS[bin]
}

/// Receives a consistent snapshot of every station after each recompute.
pub trait Renderer {
    fn render(&mut self, filter: TimeFilter, markers: &[StationMarker]);
}

impl Renderer for Vec<StationMarker> {
    fn render(&mut self, _filter: TimeFilter, markers: &[StationMarker]) {
        self.clear();
        self.extend_from_slice(markers);
    }
}

pub fn to_feature_collection(
    filter: TimeFilter,
    markers: &[StationMarker],
) -> anyhow::Result<FeatureCollection> {
    let features = markers
        .iter()
        .map(geojson::ser::to_feature)
        .collect::<Result<Vec<Feature>, geojson::Error>>()?;

    let mut foreign_members = JsonObject::new();
    foreign_members.insert(
        "timeFilter".to_string(),
        JsonValue::String(filter.to_string()),
    );

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

/// Keeps the latest snapshot as GeoJSON for the HTTP layer.
#[derive(Debug, Default)]
pub struct GeoJsonRenderer {
    latest: Option<FeatureCollection>,
}

impl GeoJsonRenderer {
    pub fn latest(&self) -> Option<&FeatureCollection> {
        self.latest.as_ref()
    }
}

impl Renderer for GeoJsonRenderer {
    fn render(&mut self, filter: TimeFilter, markers: &[StationMarker]) {
        match to_feature_collection(filter, markers) {
            Ok(collection) => self.latest = Some(collection),
            Err(err) => warn!(%filter, "failed to build station features: {err}"),
        }
    }
}
