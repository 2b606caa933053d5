use crate::traffic::Station;

/// Radius, in screen units, of the busiest station's marker.
pub const DEFAULT_MAX_RADIUS: f64 = 25.0;

/// Square-root scale from total traffic to marker radius, so marker area grows
/// linearly with trip count. The domain is `0..=max traffic` at fit time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadiusScale {
    domain_max: usize,
    range_max: f64,
}

impl RadiusScale {
    pub fn fit(stations: &[Station], range_max: f64) -> Self {
        let domain_max = stations
            .iter()
            .map(Station::total_traffic)
            .max()
            .unwrap_or(0);

        Self {
            domain_max,
            range_max,
        }
    }

    pub fn domain_max(&self) -> usize {
        self.domain_max
    }

    pub fn range_max(&self) -> f64 {
        self.range_max
    }

    /// Zero for every value when no station saw any traffic.
    pub fn radius(&self, total_traffic: usize) -> f64 {
        if self.domain_max == 0 {
            return 0.0;
        }
        self.range_max * (total_traffic as f64 / self.domain_max as f64).sqrt()
    }
}

impl Default for RadiusScale {
    fn default() -> Self {
        Self {
            domain_max: 0,
            range_max: DEFAULT_MAX_RADIUS,
        }
    }
}
