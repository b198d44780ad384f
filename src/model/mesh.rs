//! Indexed triangle mesh used by the model volumes.
//!
//! The container stores one indexed triangle set per object; volumes slice
//! facets out of it and rebuild their own shared-vertex meshes. `repair`
//! performs the lightweight normalization the importer relies on: welding
//! bit-identical vertices and dropping degenerate triangles.

use std::collections::HashMap;

/// A triangle mesh with shared vertices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriangleMesh {
    /// Vertex positions.
    pub vertices: Vec<[f32; 3]>,
    /// Vertex indices, three per triangle.
    pub indices: Vec<[u32; 3]>,
    /// Set once `repair` has run; exporting requires it.
    pub repaired: bool,
}

impl TriangleMesh {
    /// Create an empty mesh.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an unwelded mesh from raw facets (three vertices per triangle).
    ///
    /// The result is not repaired; call [`TriangleMesh::repair`] to weld
    /// shared vertices.
    pub fn from_facets(facets: &[[[f32; 3]; 3]]) -> Self {
        let mut mesh = Self {
            vertices: Vec::with_capacity(facets.len() * 3),
            indices: Vec::with_capacity(facets.len()),
            repaired: false,
        };
        for facet in facets {
            let base = mesh.vertices.len() as u32;
            mesh.vertices.extend_from_slice(facet);
            mesh.indices.push([base, base + 1, base + 2]);
        }
        mesh
    }

    /// Number of triangles.
    pub fn facet_count(&self) -> usize {
        self.indices.len()
    }

    /// True when the mesh has no vertices or no triangles.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.is_empty()
    }

    /// Weld bit-identical vertices and drop triangles that collapse onto a
    /// point or an edge afterwards.
    ///
    /// Welding keys on the exact bit pattern of the coordinates, so vertices
    /// that round-tripped through text identically merge back together.
    /// Vertex order follows first use, which keeps repeated repair calls
    /// stable.
    pub fn repair(&mut self) {
        let mut remap = Vec::with_capacity(self.vertices.len());
        let mut welded: Vec<[f32; 3]> = Vec::with_capacity(self.vertices.len());
        let mut seen: HashMap<[u32; 3], u32> = HashMap::with_capacity(self.vertices.len());

        for vertex in &self.vertices {
            let key = [
                vertex[0].to_bits(),
                vertex[1].to_bits(),
                vertex[2].to_bits(),
            ];
            let index = *seen.entry(key).or_insert_with(|| {
                welded.push(*vertex);
                (welded.len() - 1) as u32
            });
            remap.push(index);
        }

        let mut indices = Vec::with_capacity(self.indices.len());
        for triangle in &self.indices {
            let mapped = [
                remap[triangle[0] as usize],
                remap[triangle[1] as usize],
                remap[triangle[2] as usize],
            ];
            if mapped[0] == mapped[1] || mapped[1] == mapped[2] || mapped[0] == mapped[2] {
                continue;
            }
            indices.push(mapped);
        }

        self.vertices = welded;
        self.indices = indices;
        self.repaired = true;
    }

    /// Smallest Z coordinate over all vertices, if the mesh has any.
    pub fn min_z(&self) -> Option<f32> {
        self.vertices
            .iter()
            .map(|v| v[2])
            .min_by(|a, b| a.total_cmp(b))
    }
}

/// 2D convex hull of a point set (Andrew's monotone chain).
///
/// Returns the hull vertices in counter-clockwise order without repeating the
/// first point. Inputs with fewer than three distinct points come back as-is.
pub fn convex_hull_2d(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut sorted: Vec<[f64; 2]> = points.to_vec();
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
        (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
    }

    fn half_hull<'a>(points: impl Iterator<Item = &'a [f64; 2]>) -> Vec<[f64; 2]> {
        let mut hull: Vec<[f64; 2]> = Vec::new();
        for &p in points {
            while hull.len() >= 2 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        // the last point of each half is the first point of the other
        hull.pop();
        hull
    }

    let mut hull = half_hull(sorted.iter());
    hull.extend(half_hull(sorted.iter().rev()));
    hull
}
