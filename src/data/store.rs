//! Working set of geotagged photos.
//!
//! The store owns every [`GeoPoint`] the engine knows about. Items come from
//! the upstream feed as [`RawItem`]s; anything without a usable location is
//! dropped on the way in because the feed legitimately carries photos that
//! were never geotagged. A load always replaces the whole set.

use crate::{
    core::geo::LatLng,
    prelude::HashMap,
    Result,
};
use serde::{Deserialize, Deserializer, Serialize};

pub type PointId = u64;

/// Opaque reference the thumbnail fetcher understands (usually a URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThumbnailRef(String);

impl ThumbnailRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointMetadata {
    pub name: Option<String>,
    pub captured_at: Option<String>,
    /// Remaining feed fields, kept verbatim for the host
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A geotagged item as it arrives from the point data source
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    pub id: PointId,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lng: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub captured_at: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawItem {
    pub fn new(id: PointId, lng: f64, lat: f64) -> Self {
        Self {
            id,
            lng: Some(lng),
            lat: Some(lat),
            ..Self::default()
        }
    }

    pub fn with_thumbnail(mut self, url: impl Into<String>) -> Self {
        self.thumbnail_url = Some(url.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    fn into_point(self) -> Option<GeoPoint> {
        let position = LatLng::new(self.lat?, self.lng?);
        if !position.is_valid() {
            return None;
        }

        Some(GeoPoint {
            id: self.id,
            position,
            thumbnail: ThumbnailRef(self.thumbnail_url.unwrap_or_default()),
            metadata: PointMetadata {
                name: self.name,
                captured_at: self.captured_at,
                extra: self.extra,
            },
        })
    }
}

/// Anything that is not a JSON number (null, strings, objects) counts as missing
fn lenient_coordinate<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64())
}

/// An ingested point. Immutable for as long as its point set is current.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    pub id: PointId,
    pub position: LatLng,
    pub thumbnail: ThumbnailRef,
    pub metadata: PointMetadata,
}

impl GeoPoint {
    pub fn lng(&self) -> f64 {
        self.position.lng
    }

    pub fn lat(&self) -> f64 {
        self.position.lat
    }
}

#[derive(Debug, Default)]
pub struct GeoPointStore {
    points: Vec<GeoPoint>,
    index: HashMap<PointId, usize>,
    /// Bumped on every load so asynchronous work can tell point sets apart
    generation: u64,
}

impl GeoPointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the working set with the valid subset of `raw_items`.
    ///
    /// Items with missing or out-of-range coordinates are skipped. When an id
    /// repeats, the first occurrence wins.
    pub fn load<I>(&mut self, raw_items: I) -> &[GeoPoint]
    where
        I: IntoIterator<Item = RawItem>,
    {
        let mut points = Vec::new();
        let mut index = HashMap::default();
        let mut dropped = 0usize;
        let mut duplicates = 0usize;

        for raw in raw_items {
            let Some(point) = raw.into_point() else {
                dropped += 1;
                continue;
            };
            if index.contains_key(&point.id) {
                duplicates += 1;
                continue;
            }
            index.insert(point.id, points.len());
            points.push(point);
        }

        self.points = points;
        self.index = index;
        self.generation += 1;

        log::debug!(
            "point set #{} loaded: {} kept, {} without location, {} duplicate ids",
            self.generation,
            self.points.len(),
            dropped,
            duplicates
        );

        &self.points
    }

    /// Parses an API response (a JSON array of items) and loads it
    pub fn load_json(&mut self, source: &str) -> Result<&[GeoPoint]> {
        let raw: Vec<RawItem> = serde_json::from_str(source)?;
        Ok(self.load(raw))
    }

    /// O(1) lookup through the id index
    pub fn find_by_id(&self, id: PointId) -> Option<&GeoPoint> {
        self.index.get(&id).map(|&slot| &self.points[slot])
    }

    /// Dense slot of a point; the marker pool uses the same numbering
    pub fn index_of(&self, id: PointId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn points(&self) -> &[GeoPoint] {
        &self.points
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_coordinates_are_dropped() {
        let mut store = GeoPointStore::new();
        let raw = vec![
            RawItem::new(1, 2.35, 48.85),
            RawItem::new(2, 181.0, 10.0),
            RawItem::new(3, 10.0, -90.5),
            RawItem {
                id: 4,
                lng: None,
                lat: Some(3.0),
                ..RawItem::default()
            },
            RawItem::new(5, -180.0, 90.0),
        ];

        let points = store.load(raw);
        let ids: Vec<_> = points.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 5]);
        assert!(store.find_by_id(2).is_none());
        assert_eq!(store.find_by_id(5).unwrap().lat(), 90.0);
    }

    #[test]
    fn test_load_replaces_previous_set() {
        let mut store = GeoPointStore::new();
        store.load(vec![RawItem::new(1, 0.0, 0.0), RawItem::new(2, 1.0, 1.0)]);
        assert_eq!(store.generation(), 1);

        store.load(vec![RawItem::new(3, 5.0, 5.0)]);
        assert_eq!(store.len(), 1);
        assert!(store.find_by_id(1).is_none());
        assert_eq!(store.index_of(3), Some(0));
        assert_eq!(store.generation(), 2);
    }

    #[test]
    fn test_duplicate_ids_keep_first() {
        let mut store = GeoPointStore::new();
        store.load(vec![
            RawItem::new(7, 1.0, 1.0).with_name("first"),
            RawItem::new(7, 2.0, 2.0).with_name("second"),
        ]);
        assert_eq!(store.len(), 1);
        assert_eq!(
            store.find_by_id(7).unwrap().metadata.name.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn test_load_json_feed() {
        let mut store = GeoPointStore::new();
        let json = r#"[
            {"id": 1, "lng": 139.69, "lat": 35.68, "thumbnailUrl": "https://img/1.jpg",
             "name": "Shibuya", "capturedAt": "2024-04-01T10:00:00Z", "likes": 12},
            {"id": 2, "thumbnailUrl": "https://img/2.jpg"},
            {"id": 3, "lng": "n/a", "lat": 10.0},
            {"id": 4, "lng": null, "lat": null}
        ]"#;

        let points = store.load_json(json).unwrap();
        assert_eq!(points.len(), 1);

        let shibuya = &points[0];
        assert_eq!(shibuya.thumbnail.as_str(), "https://img/1.jpg");
        assert_eq!(shibuya.metadata.name.as_deref(), Some("Shibuya"));
        assert_eq!(
            shibuya.metadata.captured_at.as_deref(),
            Some("2024-04-01T10:00:00Z")
        );
        assert_eq!(shibuya.metadata.extra["likes"], 12);
    }

    #[test]
    fn test_load_json_rejects_malformed_feed() {
        let mut store = GeoPointStore::new();
        assert!(store.load_json("{\"id\": 1}").is_err());
        assert_eq!(store.generation(), 0);
    }
}
