use std::time::Instant;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::traffic::{
    Dataset, Station, TimeFilter, aggregate,
    render::{Renderer, StationMarker},
    scale::RadiusScale,
    time_index::TimeIndex,
    window,
};

struct Loaded {
    index: TimeIndex,
    stations: Vec<Station>,
}

/// Owns the stations, trip index and time filter, and is their only writer.
///
/// Every trigger runs query, aggregation and scale fitting to completion before the
/// renderer sees the stations, so a snapshot is never observed mid-update. Callers that
/// share a controller across tasks must serialize access (see [`crate::server`]).
pub struct RecomputeController<R> {
    renderer: R,
    max_radius: f64,
    filter: TimeFilter,
    scale: RadiusScale,
    loaded: Option<Loaded>,
}

impl<R: Renderer> RecomputeController<R> {
    pub fn new(renderer: R, max_radius: f64) -> Self {
        Self {
            renderer,
            max_radius,
            filter: TimeFilter::Any,
            scale: RadiusScale::default(),
            loaded: None,
        }
    }

    /// One-time data-ready trigger. Indexes the trips and renders with the current filter.
    pub fn load(&mut self, dataset: Dataset) -> Result<()> {
        if self.loaded.is_some() {
            bail!("dataset already loaded");
        }

        let now = Instant::now();
        let stations = dataset.stations;
        let index = TimeIndex::build(dataset.trips);
        info!(
            stations = stations.len(),
            trips = index.len(),
            "indexed trips in {:?}",
            now.elapsed()
        );

        self.loaded = Some(Loaded { index, stations });
        self.recompute();
        Ok(())
    }

    /// UI trigger. Before [`load`](Self::load) this only records the filter.
    pub fn on_time_filter_changed(&mut self, filter: TimeFilter) {
        self.filter = filter;
        self.recompute();
    }

    fn recompute(&mut self) {
        let Some(loaded) = self.loaded.as_mut() else {
            debug!(filter = %self.filter, "no data loaded yet, skipping recompute");
            return;
        };

        let now = Instant::now();
        let selected = window::query(&loaded.index, self.filter);
        aggregate::aggregate(&selected, &mut loaded.stations);
        self.scale = RadiusScale::fit(&loaded.stations, self.max_radius);

        let markers: Vec<StationMarker> = loaded
            .stations
            .iter()
            .map(|s| StationMarker::new(s, &self.scale))
            .collect();
        self.renderer.render(self.filter, &markers);

        debug!(
            filter = %self.filter,
            trips = selected.len(),
            max_traffic = self.scale.domain_max(),
            "recomputed station traffic in {:?}",
            now.elapsed()
        );
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn filter(&self) -> TimeFilter {
        self.filter
    }

    pub fn scale(&self) -> &RadiusScale {
        &self.scale
    }

    pub fn stations(&self) -> &[Station] {
        match &self.loaded {
            Some(loaded) => &loaded.stations,
            None => &[],
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }
}
