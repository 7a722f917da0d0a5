//! Test data builders for entities and graphs

use satmesh_rs::{Entity, GeoCoords, Metric};

/// Flat metric treating `lng` as x and `lat` as y, in km
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarMetric;

impl Metric for PlanarMetric {
    fn distance(&self, a: &GeoCoords, b: &GeoCoords) -> f64 {
        ((a.lng - b.lng).powi(2) + (a.lat - b.lat).powi(2)).sqrt()
    }
}

/// Point at planar coordinates `(x, y)`
pub fn planar(x: f64, y: f64) -> GeoCoords {
    GeoCoords::new(y, x, 0.0)
}

/// Builder for a rectangular grid of position-only entities
pub struct GridBuilder {
    columns: usize,
    rows: usize,
    spacing: f64,
    origin: (f64, f64),
    first_id: u32,
}

impl GridBuilder {
    pub fn new(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            spacing: 10.0,
            origin: (1.0, 1.0),
            first_id: 0,
        }
    }

    pub fn spacing(mut self, spacing: f64) -> Self {
        self.spacing = spacing;
        self
    }

    pub fn origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }

    pub fn first_id(mut self, id: u32) -> Self {
        self.first_id = id;
        self
    }

    /// Entities in row-major order
    pub fn build(self) -> Vec<Entity> {
        let mut entities = Vec::with_capacity(self.columns * self.rows);
        let mut id = self.first_id;
        for row in 0..self.rows {
            for column in 0..self.columns {
                let x = self.origin.0 + column as f64 * self.spacing;
                let y = self.origin.1 + row as f64 * self.spacing;
                entities.push(Entity::at(id, planar(x, y)));
                id += 1;
            }
        }
        entities
    }
}

/// Brute-force adjacency: every other entity strictly closer than `threshold`
pub fn expected_adjacency<M: Metric>(entities: &[Entity], metric: &M, threshold: f64) -> Vec<Vec<usize>> {
    (0..entities.len())
        .map(|i| {
            (0..entities.len())
                .filter(|&j| {
                    j != i && metric.distance(&entities[i].position, &entities[j].position) < threshold
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_builder() {
        let grid = GridBuilder::new(3, 2).spacing(5.0).first_id(10).build();
        assert_eq!(grid.len(), 6);
        assert_eq!(grid[0].id.0, 10);
        assert_eq!(grid[4].position, planar(6.0, 6.0));
    }

    #[test]
    fn test_expected_adjacency_on_grid() {
        let grid = GridBuilder::new(3, 1).build();
        let adjacency = expected_adjacency(&grid, &PlanarMetric, 15.0);
        assert_eq!(adjacency, vec![vec![1], vec![0, 2], vec![1]]);
    }
}
