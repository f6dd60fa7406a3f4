use std::fmt;

use geo::{Distance, Euclidean, Haversine};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::define_index_newtype;

define_index_newtype!(NodeIdx, Node);

/// External identifier of a node. Road network exports use either numeric ids or
/// string labels, both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum NodeKey {
    Id(i64),
    Name(String),
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Id(id) => write!(f, "{id}"),
            NodeKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<i64> for NodeKey {
    fn from(value: i64) -> Self {
        NodeKey::Id(value)
    }
}

impl From<i32> for NodeKey {
    fn from(value: i32) -> Self {
        NodeKey::Id(i64::from(value))
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey::Name(value.to_owned())
    }
}

impl From<String> for NodeKey {
    fn from(value: String) -> Self {
        NodeKey::Name(value)
    }
}

impl From<&NodeKey> for NodeKey {
    fn from(value: &NodeKey) -> Self {
        value.clone()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMethod {
    /// Great-circle distance in meters, coordinates are `[lon, lat]`.
    #[default]
    Haversine,
    /// Planar distance in coordinate units.
    Euclidean,
}

/// A 2-D position, `x` is the longitude for geographic data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    point: geo::Point,
}

impl Coordinate {
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            point: geo::Point::new(x, y),
        }
    }

    pub fn from_lat_lon(lat: f64, lon: f64) -> Self {
        Self::new(lon, lat)
    }

    pub fn x(&self) -> f64 {
        self.point.x()
    }

    pub fn y(&self) -> f64 {
        self.point.y()
    }

    pub fn is_finite(&self) -> bool {
        self.x().is_finite() && self.y().is_finite()
    }

    pub fn distance(&self, to: &Coordinate, method: DistanceMethod) -> f64 {
        match method {
            DistanceMethod::Haversine => Haversine.distance(self.point, to.point),
            DistanceMethod::Euclidean => Euclidean.distance(self.point, to.point),
        }
    }

    pub fn to_array(&self) -> [f64; 2] {
        [self.x(), self.y()]
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from(value: [f64; 2]) -> Self {
        Coordinate::new(value[0], value[1])
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    key: NodeKey,
    coordinate: Option<Coordinate>,
}

impl Node {
    pub(crate) fn new(key: NodeKey, coordinate: Option<Coordinate>) -> Self {
        Node { key, coordinate }
    }

    pub fn key(&self) -> &NodeKey {
        &self.key
    }

    pub fn coordinate(&self) -> Option<&Coordinate> {
        self.coordinate.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_key_untagged_serde() {
        let keys: Vec<NodeKey> = serde_json::from_str(r#"[1, "depot", -4]"#).unwrap();
        assert_eq!(
            keys,
            vec![NodeKey::Id(1), NodeKey::from("depot"), NodeKey::Id(-4)]
        );
        assert_eq!(keys[1].to_string(), "depot");
    }

    #[test]
    fn test_haversine_distance() {
        // San Francisco to Oakland, roughly 13.4km
        let sf = Coordinate::from_lat_lon(37.7749, -122.4194);
        let oakland = Coordinate::from_lat_lon(37.8044, -122.2712);

        let distance = sf.distance(&oakland, DistanceMethod::Haversine);
        assert!((distance - 13_400.0).abs() < 200.0, "{distance}");
    }

    #[test]
    fn test_euclidean_distance() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(3.0, 4.0);
        assert_eq!(a.distance(&b, DistanceMethod::Euclidean), 5.0);
    }
}
