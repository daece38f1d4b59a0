use crate::{
    core::{
        geo::{LatLng, Point},
        viewport::Viewport,
    },
    data::store::{GeoPoint, PointId},
    prelude::{BTreeMap, BTreeSet, Instant},
};

/// Represents a cluster of points
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    /// Grid cell that seeded the cluster
    pub cell: (i64, i64),
    /// Arithmetic mean of the members' geographic coordinates
    pub centroid: LatLng,
    /// Member ids, ordered
    pub member_ids: BTreeSet<PointId>,
}

impl Cluster {
    /// Get the number of points in the cluster
    pub fn member_count(&self) -> usize {
        self.member_ids.len()
    }

    /// Check if this is a single-point cluster
    pub fn is_single(&self) -> bool {
        self.member_ids.len() == 1
    }
}

#[derive(Debug, Clone, Copy)]
struct Member {
    id: PointId,
    position: LatLng,
    pixel: Point,
}

#[derive(Debug, Default)]
struct Cell {
    members: Vec<Member>,
}

impl Cell {
    /// Pixel centroid of the cell's members
    fn pixel_center(&self) -> Point {
        let n = self.members.len() as f64;
        let (sx, sy) = self
            .members
            .iter()
            .fold((0.0, 0.0), |(sx, sy), m| (sx + m.pixel.x, sy + m.pixel.y));
        Point::new(sx / n, sy / n)
    }
}

/// Progress of a resumable pass
#[derive(Debug, Clone, PartialEq)]
pub enum PassProgress {
    /// More points remain; call `advance` again on a later turn
    Pending { processed: usize, total: usize },
    Ready(Vec<Cluster>),
}

/// A clustering pass that can be advanced in bounded chunks.
///
/// Points are projected into world pixels (independent of the map center, so
/// a pan never reshuffles the grid) and bucketed into square cells of
/// `pixel_radius`. Once every point is bucketed, a single neighbour-expansion
/// sweep merges adjacent cells whose pixel centroids are within
/// `pixel_radius` of the seeding cell. The sweep is not transitive.
///
/// The pass does not borrow the points between steps; the caller hands the
/// same slice to every `advance` call and drops the pass when the point set is
/// replaced.
#[derive(Debug)]
pub struct ClusterPass {
    viewport: Viewport,
    pixel_radius: f64,
    cursor: usize,
    cells: BTreeMap<(i64, i64), Cell>,
    started: Instant,
}

impl ClusterPass {
    pub fn new(viewport: Viewport, pixel_radius: f64) -> Self {
        Self {
            viewport,
            pixel_radius: pixel_radius.max(1.0),
            cursor: 0,
            cells: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Buckets up to `budget` more points; returns the clusters once all
    /// points are in.
    pub fn advance(&mut self, points: &[GeoPoint], budget: usize) -> PassProgress {
        let end = self.cursor.saturating_add(budget.max(1)).min(points.len());

        for point in &points[self.cursor.min(end)..end] {
            let pixel = self.viewport.project(&point.position, None);
            let key = (
                (pixel.x / self.pixel_radius).floor() as i64,
                (pixel.y / self.pixel_radius).floor() as i64,
            );
            self.cells.entry(key).or_default().members.push(Member {
                id: point.id,
                position: point.position,
                pixel,
            });
        }
        self.cursor = end;

        if self.cursor < points.len() {
            return PassProgress::Pending {
                processed: self.cursor,
                total: points.len(),
            };
        }

        PassProgress::Ready(self.merge())
    }

    /// Runs the pass to completion in one go
    pub fn run(mut self, points: &[GeoPoint]) -> Vec<Cluster> {
        loop {
            if let PassProgress::Ready(clusters) = self.advance(points, usize::MAX) {
                return clusters;
            }
        }
    }

    fn merge(&mut self) -> Vec<Cluster> {
        let mut cells = std::mem::take(&mut self.cells);
        // Members arrive in feed order; the merge sweep compares float sums
        for cell in cells.values_mut() {
            cell.members.sort_by_key(|m| m.id);
        }
        let centers: BTreeMap<(i64, i64), Point> = cells
            .iter()
            .map(|(key, cell)| (*key, cell.pixel_center()))
            .collect();

        let mut consumed: BTreeSet<(i64, i64)> = BTreeSet::new();
        let mut groups: Vec<((i64, i64), Vec<(i64, i64)>)> = Vec::new();

        for (&key, anchor) in &centers {
            if !consumed.insert(key) {
                continue;
            }
            let mut group = vec![key];
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let neighbour = (key.0 + dx, key.1 + dy);
                    if neighbour == key || consumed.contains(&neighbour) {
                        continue;
                    }
                    let Some(center) = centers.get(&neighbour) else {
                        continue;
                    };
                    if anchor.distance_to(center) <= self.pixel_radius {
                        consumed.insert(neighbour);
                        group.push(neighbour);
                    }
                }
            }
            groups.push((key, group));
        }

        let clusters: Vec<Cluster> = groups
            .into_iter()
            .map(|(seed, keys)| {
                let mut members: Vec<Member> = keys
                    .iter()
                    .filter_map(|k| cells.get(k))
                    .flat_map(|cell| cell.members.iter().copied())
                    .collect();
                // Sum in id order so the centroid does not depend on feed order
                members.sort_by_key(|m| m.id);
                build_cluster(seed, &members)
            })
            .collect();

        log::debug!(
            "cluster pass at zoom {:.2}: {} points -> {} clusters in {:?}",
            self.viewport.zoom,
            self.cursor,
            clusters.len(),
            self.started.elapsed()
        );

        clusters
    }
}

fn build_cluster(seed: (i64, i64), members: &[Member]) -> Cluster {
    let n = members.len() as f64;
    let (sum_lat, sum_lng) = members.iter().fold((0.0, 0.0), |(lat, lng), m| {
        (lat + m.position.lat, lng + m.position.lng)
    });

    Cluster {
        cell: seed,
        centroid: LatLng::new(sum_lat / n, sum_lng / n),
        member_ids: members.iter().map(|m| m.id).collect(),
    }
}

/// Clusters `points` for `viewport` in a single pass
pub fn cluster(points: &[GeoPoint], viewport: &Viewport, pixel_radius: f64) -> Vec<Cluster> {
    ClusterPass::new(viewport.clone(), pixel_radius).run(points)
}
