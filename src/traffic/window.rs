use crate::traffic::{MINUTES_PER_DAY, MinuteOfDay, TimeFilter, Trip, time_index::TimeIndex};

/// Minutes either side of the selected time that still count as "around" it.
pub const WINDOW_RADIUS_MINUTES: u16 = 60;

/// An inclusive range of minutes on the clock face, wrapping past midnight when `lo > hi`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CircularWindow {
    lo: MinuteOfDay,
    hi: MinuteOfDay,
}

impl CircularWindow {
    /// Window of `2 * radius + 1` minutes centred on `center`.
    pub fn around(center: MinuteOfDay, radius: u16) -> Self {
        let radius = radius.min(MINUTES_PER_DAY / 2 - 1);
        let c = center.get();

        Self {
            lo: MinuteOfDay((c + MINUTES_PER_DAY - radius) % MINUTES_PER_DAY),
            hi: MinuteOfDay((c + radius) % MINUTES_PER_DAY),
        }
    }

    pub fn lo(self) -> MinuteOfDay {
        self.lo
    }

    pub fn hi(self) -> MinuteOfDay {
        self.hi
    }

    pub fn wraps(self) -> bool {
        self.lo > self.hi
    }

    pub fn width(self) -> u16 {
        (self.hi.get() + MINUTES_PER_DAY - self.lo.get()) % MINUTES_PER_DAY + 1
    }

    pub fn contains(self, minute: MinuteOfDay) -> bool {
        if self.wraps() {
            minute >= self.lo || minute <= self.hi
        } else {
            self.lo <= minute && minute <= self.hi
        }
    }

    /// The window as one or two non-wrapping inclusive spans.
    pub fn spans(self) -> impl Iterator<Item = (MinuteOfDay, MinuteOfDay)> {
        let spans = if self.wraps() {
            [
                Some((self.lo, MinuteOfDay::LAST)),
                Some((MinuteOfDay::MIDNIGHT, self.hi)),
            ]
        } else {
            [Some((self.lo, self.hi)), None]
        };

        spans.into_iter().flatten()
    }
}

/// Trips relevant to `filter`: every trip for [`TimeFilter::Any`], otherwise the trips
/// that start or end within [`WINDOW_RADIUS_MINUTES`] of the selected minute.
pub fn query(index: &TimeIndex, filter: TimeFilter) -> Vec<&Trip> {
    match filter {
        TimeFilter::Any => index.trips().iter().collect(),
        TimeFilter::At(center) => {
            query_window(index, CircularWindow::around(center, WINDOW_RADIUS_MINUTES))
        }
    }
}

/// Every trip starting or ending inside `window`, each returned once.
pub fn query_window(index: &TimeIndex, window: CircularWindow) -> Vec<&Trip> {
    let mut selected = Vec::new();

    for (first, last) in window.spans() {
        selected.extend(index.departures_between(first, last));
    }

    // trips that also started inside the window were taken above
    for (first, last) in window.spans() {
        selected.extend(
            index
                .arrivals_between(first, last)
                .filter(|t| !window.contains(t.start_minute)),
        );
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minute(m: u16) -> MinuteOfDay {
        MinuteOfDay::new(m).unwrap()
    }

    fn trip(start: u16, end: u16) -> Trip {
        Trip::new("A".into(), "B".into(), minute(start), minute(end))
    }

    #[test]
    fn test_window_bounds() {
        let w = CircularWindow::around(minute(500), WINDOW_RADIUS_MINUTES);
        assert_eq!((w.lo().get(), w.hi().get()), (440, 560));
        assert!(!w.wraps());
        assert_eq!(w.width(), 121);

        let w = CircularWindow::around(minute(10), WINDOW_RADIUS_MINUTES);
        assert_eq!((w.lo().get(), w.hi().get()), (1390, 70));
        assert!(w.wraps());
        assert_eq!(w.width(), 121);
        assert_eq!(w.spans().count(), 2);

        let w = CircularWindow::around(minute(1400), WINDOW_RADIUS_MINUTES);
        assert_eq!((w.lo().get(), w.hi().get()), (1340, 20));
        assert_eq!(w.width(), 121);
    }

    #[test]
    fn test_window_contains() {
        let w = CircularWindow::around(minute(10), WINDOW_RADIUS_MINUTES);
        assert!(w.contains(minute(1430)));
        assert!(w.contains(minute(1390)));
        assert!(w.contains(minute(70)));
        assert!(!w.contains(minute(71)));
        assert!(!w.contains(minute(1389)));
        assert!(!w.contains(minute(1200)));
    }

    #[test]
    fn test_query_any_returns_everything() {
        let index = TimeIndex::build(vec![trip(0, 10), trip(600, 620), trip(1439, 2)]);
        assert_eq!(query(&index, TimeFilter::Any).len(), 3);
    }

    #[test]
    fn test_query_wraps_midnight() {
        let index = TimeIndex::build(vec![trip(1430, 1435), trip(1200, 1210)]);
        let selected = query(&index, TimeFilter::At(minute(10)));

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].start_minute.get(), 1430);
    }

    #[test]
    fn test_query_deduplicates_trips_inside_window() {
        let index = TimeIndex::build(vec![trip(100, 130)]);
        assert_eq!(query(&index, TimeFilter::At(minute(110))).len(), 1);
    }

    #[test]
    fn test_query_matches_linear_scan() {
        let trips: Vec<Trip> = (0..MINUTES_PER_DAY)
            .step_by(7)
            .map(|s| trip(s, (s * 13 + 400) % MINUTES_PER_DAY))
            .collect();
        let index = TimeIndex::build(trips.clone());

        for center in [0, 10, 59, 60, 61, 500, 1379, 1380, 1420, 1439] {
            let center = minute(center);
            let mut expected: Vec<&Trip> = trips
                .iter()
                .filter(|t| {
                    t.start_minute.circular_distance(center) <= WINDOW_RADIUS_MINUTES
                        || t.end_minute.circular_distance(center) <= WINDOW_RADIUS_MINUTES
                })
                .collect();
            let mut actual = query(&index, TimeFilter::At(center));

            expected.sort_by_key(|t| t.start_minute);
            actual.sort_by_key(|t| t.start_minute);
            assert_eq!(actual, expected, "center {center}");
        }
    }
}
