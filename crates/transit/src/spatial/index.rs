//! Geohash bucketing of stop coordinates.
//!
//! Every stop is encoded at [`HASH_PRECISION`] and the (hash, stop) pairs are
//! kept sorted, so all stops sharing a geohash prefix sit in one contiguous
//! run. A radius query hashes the query point, picks a prefix length from the
//! radius, and only measures distances for that run.
//!
//! Stops in a neighbouring cell with a different prefix are never
//! candidates, even when they are within the radius, so queries near a cell
//! boundary can miss stops.

use geo::Point;
use geohash::Coord;
use tracing::warn;

use crate::identifiers::StopId;
use crate::models::traits::StopCoordinate;
use crate::models::types::{Result, TransitError};
use crate::spatial::queries::haversine_distance;

/// Characters per stop hash (cells of a few centimeters)
pub const HASH_PRECISION: usize = 12;

/// Prefix compared for radii up to [`FINE_RADIUS_LIMIT_M`] (~4.9km cells)
pub const FINE_PREFIX: usize = 5;

/// Prefix compared for larger radii (~156km cells)
pub const COARSE_PREFIX: usize = 3;

pub const FINE_RADIUS_LIMIT_M: f64 = 2000.0;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct GeohashEntry {
    pub hash: String,
    pub stop_id: StopId,
}

/// Sorted geohash array over every stop
#[derive(Clone, Debug, Default)]
pub struct GeohashIndex {
    entries: Vec<GeohashEntry>,
}

pub fn encode(point: Point) -> Result<String> {
    geohash::encode(
        Coord {
            x: point.x(),
            y: point.y(),
        },
        HASH_PRECISION,
    )
    .map_err(|e| TransitError::InvalidInput(format!("cannot geohash {:?}: {e}", point)))
}

/// Center of the cell a hash names
pub fn decode_center(hash: &str) -> Result<Point> {
    let (center, _, _) = geohash::decode(hash)
        .map_err(|e| TransitError::InvalidData(format!("bad geohash {hash:?}: {e}")))?;
    Ok(Point::new(center.x, center.y))
}

/// Number of leading hash characters a query of this radius compares
pub fn prefix_len(radius_m: f64) -> usize {
    if radius_m <= FINE_RADIUS_LIMIT_M {
        FINE_PREFIX
    } else {
        COARSE_PREFIX
    }
}

impl GeohashIndex {
    /// Build from a coordinate scan. Coordinates that cannot be encoded are
    /// logged and left out.
    pub fn build(coordinates: &[StopCoordinate]) -> Self {
        let mut entries: Vec<GeohashEntry> = coordinates
            .iter()
            .filter_map(|c| match encode(Point::new(c.lon, c.lat)) {
                Ok(hash) => Some(GeohashEntry {
                    hash,
                    stop_id: c.id,
                }),
                Err(e) => {
                    warn!(stop_id = %c.id, error = %e, "skipping stop with unusable coordinates");
                    None
                }
            })
            .collect();

        entries.sort();

        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[GeohashEntry] {
        &self.entries
    }

    /// Contiguous run of entries whose first `prefix_len` characters equal
    /// those of `query_hash`
    pub fn candidate_range(&self, query_hash: &str, prefix_len: usize) -> &[GeohashEntry] {
        fn head(hash: &str, len: usize) -> &str {
            hash.get(..len).unwrap_or(hash)
        }

        let prefix = head(query_hash, prefix_len);
        let start = self
            .entries
            .partition_point(|entry| head(&entry.hash, prefix_len) < prefix);
        let len = self.entries[start..]
            .iter()
            .take_while(|entry| head(&entry.hash, prefix_len) == prefix)
            .count();

        &self.entries[start..start + len]
    }

    /// Stops whose cell center lies within `radius_m` of `point`, with their
    /// distances, nearest first
    pub fn within(&self, point: Point, radius_m: f64) -> Result<Vec<(StopId, f64)>> {
        let query_hash = encode(point)?;
        let candidates = self.candidate_range(&query_hash, prefix_len(radius_m));

        let mut found = Vec::with_capacity(candidates.len());
        for entry in candidates {
            let center = decode_center(&entry.hash)?;
            let distance = haversine_distance(point, center);
            if distance <= radius_m {
                found.push((entry.stop_id, distance));
            }
        }

        found.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(found)
    }
}
