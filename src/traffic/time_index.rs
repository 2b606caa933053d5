use crate::traffic::{MINUTES_PER_DAY, MinuteOfDay, Trip};

const BUCKETS: usize = MINUTES_PER_DAY as usize;

/// Trips bucketed by minute of day, once by departure minute and once by arrival minute.
///
/// Each trip sits in exactly one departure bucket and one arrival bucket. Buckets are
/// stored back to back, so any run of consecutive minutes is a single slice.
#[derive(Debug)]
pub struct TimeIndex {
    trips: Vec<Trip>,
    by_start: MinuteBuckets,
    by_end: MinuteBuckets,
}

impl TimeIndex {
    pub fn build(trips: Vec<Trip>) -> Self {
        let by_start = MinuteBuckets::build(&trips, |t| t.start_minute);
        let by_end = MinuteBuckets::build(&trips, |t| t.end_minute);

        Self {
            trips,
            by_start,
            by_end,
        }
    }

    pub fn trips(&self) -> &[Trip] {
        &self.trips
    }

    pub fn len(&self) -> usize {
        self.trips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }

    pub fn departures_at(&self, minute: MinuteOfDay) -> impl Iterator<Item = &Trip> {
        self.departures_between(minute, minute)
    }

    pub fn arrivals_at(&self, minute: MinuteOfDay) -> impl Iterator<Item = &Trip> {
        self.arrivals_between(minute, minute)
    }

    /// Trips leaving in `first..=last`. Does not wrap: `first` must not be after `last`.
    pub fn departures_between(
        &self,
        first: MinuteOfDay,
        last: MinuteOfDay,
    ) -> impl Iterator<Item = &Trip> {
        self.by_start
            .span(first, last)
            .iter()
            .map(|&i| &self.trips[i])
    }

    /// Trips arriving in `first..=last`. Does not wrap: `first` must not be after `last`.
    pub fn arrivals_between(
        &self,
        first: MinuteOfDay,
        last: MinuteOfDay,
    ) -> impl Iterator<Item = &Trip> {
        self.by_end
            .span(first, last)
            .iter()
            .map(|&i| &self.trips[i])
    }
}

/// Trip positions grouped by minute; bucket `m` is `order[offsets[m]..offsets[m + 1]]`.
#[derive(Debug)]
struct MinuteBuckets {
    order: Vec<usize>,
    offsets: Vec<usize>,
}

impl MinuteBuckets {
    fn build(trips: &[Trip], minute_of: impl Fn(&Trip) -> MinuteOfDay) -> Self {
        let mut offsets = vec![0; BUCKETS + 1];
        for trip in trips {
            offsets[minute_of(trip).index() + 1] += 1;
        }
        for m in 0..BUCKETS {
            offsets[m + 1] += offsets[m];
        }

        // counting sort, stable within a bucket
        let mut cursor = offsets.clone();
        let mut order = vec![0; trips.len()];
        for (i, trip) in trips.iter().enumerate() {
            let slot = &mut cursor[minute_of(trip).index()];
            order[*slot] = i;
            *slot += 1;
        }

        Self { order, offsets }
    }

    fn span(&self, first: MinuteOfDay, last: MinuteOfDay) -> &[usize] {
        if first > last {
            return &[];
        }
        &self.order[self.offsets[first.index()]..self.offsets[last.index() + 1]]
    }
}
