//! Time-windowed aggregation of bicycle trips onto docking stations.

use std::{fmt, str::FromStr, sync::Arc};

use anyhow::{Context, Result, bail};
use chrono::{NaiveTime, Timelike};
use serde::{Serialize, Serializer};

use crate::adapters::TrafficAdapter;

pub mod aggregate;
pub mod controller;
pub mod render;
pub mod scale;
pub mod time_index;
pub mod window;

pub const MINUTES_PER_DAY: u16 = 1440;

/// External station key, shared between a station and the trips that reference it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StationId(Arc<str>);

impl StationId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(id.as_ref().into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for StationId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<Arc<str>> for StationId {
    fn from(id: Arc<str>) -> Self {
        Self(id)
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl Serialize for StationId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

/// Minute of the day, always in `0..1440`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct MinuteOfDay(u16);

impl MinuteOfDay {
    pub const MIDNIGHT: Self = Self(0);
    pub const LAST: Self = Self(MINUTES_PER_DAY - 1);

    pub fn new(minute: u16) -> Option<Self> {
        (minute < MINUTES_PER_DAY).then_some(Self(minute))
    }

    /// Drops seconds: 08:30:59 is minute 510.
    pub fn from_time<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Shortest distance around the clock face, so 23:50 and 00:10 are 20 minutes apart.
    pub fn circular_distance(self, other: Self) -> u16 {
        let d = self.0.abs_diff(other.0);
        d.min(MINUTES_PER_DAY - d)
    }

    /// Slider-style label, e.g. `8:05 AM`.
    pub fn label_12h(self) -> String {
        let (hour, minute) = (self.0 / 60, self.0 % 60);
        let (hour, suffix) = match hour {
            0 => (12, "AM"),
            1..=11 => (hour, "AM"),
            12 => (12, "PM"),
            _ => (hour - 12, "PM"),
        };
        format!("{hour}:{minute:02} {suffix}")
    }
}

impl fmt::Display for MinuteOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

impl FromStr for MinuteOfDay {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.contains(':') {
            let time = NaiveTime::parse_from_str(s, "%H:%M")
                .with_context(|| format!("invalid time (HH:MM): {s}"))?;
            return Ok(Self::from_time(&time));
        }

        let minute: u16 = s
            .parse()
            .with_context(|| format!("invalid minute of day: {s}"))?;
        Self::new(minute).with_context(|| format!("minute of day out of range: {minute}"))
    }
}

/// The time-of-day filter driven by the UI slider.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimeFilter {
    #[default]
    Any,
    At(MinuteOfDay),
}

impl TimeFilter {
    pub fn minute(self) -> Option<MinuteOfDay> {
        match self {
            TimeFilter::Any => None,
            TimeFilter::At(minute) => Some(minute),
        }
    }
}

impl From<MinuteOfDay> for TimeFilter {
    fn from(minute: MinuteOfDay) -> Self {
        TimeFilter::At(minute)
    }
}

impl FromStr for TimeFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() || s == "-1" || s.eq_ignore_ascii_case("any") {
            return Ok(TimeFilter::Any);
        }
        if s.starts_with('-') {
            bail!("invalid time filter: {s}");
        }
        Ok(TimeFilter::At(s.parse()?))
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeFilter::Any => f.write_str("any time"),
            TimeFilter::At(minute) => minute.fmt(f),
        }
    }
}

/// One bike rental, reduced to what the time filter and aggregation need.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trip {
    pub start_station_id: StationId,
    pub end_station_id: StationId,
    pub start_minute: MinuteOfDay,
    pub end_minute: MinuteOfDay,
}

impl Trip {
    pub fn new(
        start_station_id: StationId,
        end_station_id: StationId,
        start_minute: MinuteOfDay,
        end_minute: MinuteOfDay,
    ) -> Self {
        Self {
            start_station_id,
            end_station_id,
            start_minute,
            end_minute,
        }
    }
}

/// A docking station. Traffic counts are only written by aggregation, which keeps
/// `total_traffic == arrivals + departures`.
#[derive(Clone, Debug)]
pub struct Station {
    pub id: StationId,
    pub name: Option<String>,
    pub lat: f64,
    pub lon: f64,
    arrivals: usize,
    departures: usize,
    total_traffic: usize,
}

impl Station {
    pub fn new(id: StationId, name: Option<String>, lat: f64, lon: f64) -> Self {
        Self {
            id,
            name,
            lat,
            lon,
            arrivals: 0,
            departures: 0,
            total_traffic: 0,
        }
    }

    pub fn arrivals(&self) -> usize {
        self.arrivals
    }

    pub fn departures(&self) -> usize {
        self.departures
    }

    pub fn total_traffic(&self) -> usize {
        self.total_traffic
    }

    pub(crate) fn set_traffic(&mut self, departures: usize, arrivals: usize) {
        self.departures = departures;
        self.arrivals = arrivals;
        self.total_traffic = departures + arrivals;
    }
}

/// Parsed station and trip collections, handed to the controller once.
#[derive(Clone, Debug, Default)]
pub struct Dataset {
    pub stations: Vec<Station>,
    pub trips: Vec<Trip>,
}

impl Dataset {
    pub fn new(stations: Vec<Station>, trips: Vec<Trip>) -> Self {
        Self { stations, trips }
    }

    pub fn from_adapter<A: TrafficAdapter>(adapter: &A) -> Result<Self, A::Error> {
        let stations = adapter.stations()?;
        let trips = adapter.trips()?;

        Ok(Self { stations, trips })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minute_parsing() {
        assert_eq!("08:30".parse::<MinuteOfDay>().unwrap().get(), 510);
        assert_eq!("0".parse::<MinuteOfDay>().unwrap(), MinuteOfDay::MIDNIGHT);
        assert_eq!("1439".parse::<MinuteOfDay>().unwrap(), MinuteOfDay::LAST);
        assert!("1440".parse::<MinuteOfDay>().is_err());
        assert!("25:00".parse::<MinuteOfDay>().is_err());
        assert!("noon".parse::<MinuteOfDay>().is_err());
    }

    #[test]
    fn test_time_filter_parsing() {
        assert_eq!("any".parse::<TimeFilter>().unwrap(), TimeFilter::Any);
        assert_eq!("-1".parse::<TimeFilter>().unwrap(), TimeFilter::Any);
        assert_eq!("".parse::<TimeFilter>().unwrap(), TimeFilter::Any);
        assert_eq!(
            "17:45".parse::<TimeFilter>().unwrap(),
            TimeFilter::At(MinuteOfDay::new(1065).unwrap())
        );
        assert!("-5".parse::<TimeFilter>().is_err());
    }

    #[test]
    fn test_minute_display() {
        let m = MinuteOfDay::new(65).unwrap();
        assert_eq!(m.to_string(), "01:05");
        assert_eq!(m.label_12h(), "1:05 AM");
        assert_eq!(MinuteOfDay::MIDNIGHT.label_12h(), "12:00 AM");
        assert_eq!(MinuteOfDay::new(720).unwrap().label_12h(), "12:00 PM");
        assert_eq!(MinuteOfDay::LAST.label_12h(), "11:59 PM");
        assert_eq!(TimeFilter::Any.to_string(), "any time");
    }

    #[test]
    fn test_circular_distance() {
        let ten = MinuteOfDay::new(10).unwrap();
        assert_eq!(ten.circular_distance(MinuteOfDay::new(1430).unwrap()), 20);
        assert_eq!(ten.circular_distance(MinuteOfDay::new(1200).unwrap()), 250);
        assert_eq!(ten.circular_distance(ten), 0);
    }

    #[test]
    fn test_station_traffic_totals() {
        let mut station = Station::new("A".into(), None, 42.36, -71.09);
        assert_eq!(station.total_traffic(), 0);

        station.set_traffic(3, 4);
        assert_eq!(station.departures(), 3);
        assert_eq!(station.arrivals(), 4);
        assert_eq!(station.total_traffic(), 7);
    }
}
