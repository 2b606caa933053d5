use itertools::Itertools;

use crate::traffic::{Station, Trip};

/// Overwrites every station's departures and arrivals with its counts in `trips`.
///
/// Trips naming a station that is not in `stations` are not counted anywhere.
pub fn aggregate(trips: &[&Trip], stations: &mut [Station]) {
    let departures = trips.iter().counts_by(|t| &t.start_station_id);
    let arrivals = trips.iter().counts_by(|t| &t.end_station_id);

    for station in stations.iter_mut() {
        let departed = departures.get(&station.id).copied().unwrap_or(0);
        let arrived = arrivals.get(&station.id).copied().unwrap_or(0);
        station.set_traffic(departed, arrived);
    }
}
