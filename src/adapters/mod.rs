pub mod bluebikes;

use crate::traffic::{Station, Trip};

pub trait TrafficAdapter {
    type Error;

    /// Returns stations in display order, unique by id.
    fn stations(&self) -> Result<Vec<Station>, Self::Error>;

    /// Returns every trip with usable timestamps (any order).
    fn trips(&self) -> Result<Vec<Trip>, Self::Error>;
}
