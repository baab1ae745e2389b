//! Restricted-zone polygons and point containment.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Error, Result};

/// A simple polygon given as an ordered list of vertices.
///
/// Construction enforces the minimum of three vertices; nothing else about
/// the shape is validated. Containment uses ray casting; behaviour for
/// points exactly on an edge is implementation-defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Zone {
    points: Vec<[f64; 2]>,
}

impl<'de> Deserialize<'de> for Zone {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let points = Vec::<[f64; 2]>::deserialize(deserializer)?;
        Zone::new(points).map_err(serde::de::Error::custom)
    }
}

impl Zone {
    pub fn new(points: Vec<[f64; 2]>) -> Result<Self> {
        if points.len() < 3 {
            return Err(Error::InvalidZone {
                points: points.len(),
            });
        }
        Ok(Self { points })
    }

    pub fn points(&self) -> &[[f64; 2]] {
        &self.points
    }

    /// Ray-casting containment test.
    ///
    /// For each edge the crossing counts when the point's `y` lies strictly
    /// above the edge's lower end and at or below its upper end, and the
    /// edge's x-intercept at that height is at or right of the point.
    /// Vertical edges always qualify once the y-window and the x-extent
    /// guard pass.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let n = self.points.len();
        let mut inside = false;

        let [mut p1x, mut p1y] = self.points[0];
        for i in 1..=n {
            let [p2x, p2y] = self.points[i % n];
            if y > p1y.min(p2y) && y <= p1y.max(p2y) && x <= p1x.max(p2x) {
                let crosses = if p1x == p2x {
                    true
                } else if p1y != p2y {
                    let x_intercept = (y - p1y) * (p2x - p1x) / (p2y - p1y) + p1x;
                    x <= x_intercept
                } else {
                    false
                };
                if crosses {
                    inside = !inside;
                }
            }
            p1x = p2x;
            p1y = p2y;
        }

        inside
    }
}

/// An ordered, index-addressable collection of restricted zones.
///
/// Round-trips losslessly through its serde representation
/// (`Vec<Vec<[f64; 2]>>`), which is the persistence format of the
/// configuration surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneSet {
    zones: Vec<Zone>,
}

impl ZoneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a zone. Fewer than three vertices is rejected with an error the
    /// caller is expected to log and skip; it is not fatal.
    pub fn add(&mut self, points: Vec<[f64; 2]>) -> Result<()> {
        let zone = Zone::new(points)?;
        info!(vertices = zone.points().len(), "added restricted zone");
        self.zones.push(zone);
        Ok(())
    }

    pub fn remove(&mut self, index: usize) -> Option<Zone> {
        if index < self.zones.len() {
            info!(index, "removed restricted zone");
            Some(self.zones.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.zones.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.iter()
    }

    /// Indices of all zones containing the point.
    pub fn containing(&self, x: f64, y: f64) -> Vec<usize> {
        self.zones
            .iter()
            .enumerate()
            .filter(|(_, z)| z.contains(x, y))
            .map(|(i, _)| i)
            .collect()
    }
}
