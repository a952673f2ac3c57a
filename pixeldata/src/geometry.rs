//! Spatial description of an image volume:
//! origin per slice, size, spacing, and orientation.

use std::fmt;

/// A point or direction in patient space, in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Create a point from its coordinates.
    pub fn new(x: f64, y: f64, z: f64) -> Point3 {
        Point3 { x, y, z }
    }

    /// The component-wise difference `self - other`.
    pub fn minus(&self, other: &Point3) -> Point3 {
        Point3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    /// The dot product with another vector.
    pub fn dot(&self, other: &Point3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// The cross product with another vector.
    pub fn cross(&self, other: &Point3) -> Point3 {
        Point3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// The Euclidean distance to another point.
    pub fn distance(&self, other: &Point3) -> f64 {
        let d = self.minus(other);
        d.dot(&d).sqrt()
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Pixel and slice spacing in millimeters. Defaults to unit spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing {
    /// Spacing between the centers of adjacent columns.
    pub column: f64,
    /// Spacing between the centers of adjacent rows.
    pub row: f64,
    /// Spacing between the centers of adjacent slices.
    pub slice: f64,
}

impl Spacing {
    /// Create a spacing from its components.
    pub fn new(column: f64, row: f64, slice: f64) -> Spacing {
        Spacing { column, row, slice }
    }
}

impl Default for Spacing {
    fn default() -> Spacing {
        Spacing::new(1.0, 1.0, 1.0)
    }
}

/// The extent of the image volume in voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub columns: u32,
    pub rows: u32,
    pub slices: u32,
}

impl Size {
    /// Create a size from its components.
    pub fn new(columns: u32, rows: u32, slices: u32) -> Size {
        Size {
            columns,
            rows,
            slices,
        }
    }

    /// The number of voxels in one slice.
    pub fn slice_len(&self) -> usize {
        self.columns as usize * self.rows as usize
    }

    /// The number of voxels in the whole volume.
    pub fn total_len(&self) -> usize {
        self.slice_len() * self.slices as usize
    }
}

/// A 3x3 direction cosine matrix. The three rows are the row
/// direction, the column direction, and their cross product
/// (the slice normal). Defaults to the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Orientation {
    rows: [Point3; 3],
}

impl Orientation {
    /// Build an orientation from the row and column direction
    /// cosines; the normal is their cross product.
    pub fn from_cosines(row: Point3, column: Point3) -> Orientation {
        let normal = row.cross(&column);
        Orientation {
            rows: [row, column, normal],
        }
    }

    /// The i-th row of the matrix (0 = row direction,
    /// 1 = column direction, 2 = normal).
    pub fn row(&self, index: usize) -> Point3 {
        self.rows[index]
    }

    /// The slice normal.
    pub fn normal(&self) -> Point3 {
        self.rows[2]
    }
}

impl Default for Orientation {
    fn default() -> Orientation {
        Orientation {
            rows: [
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
        }
    }
}

/// The spatial description of an image volume: one origin per slice,
/// the voxel extent, the spacing, and the orientation.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    origins: Vec<Point3>,
    size: Size,
    spacing: Spacing,
    orientation: Orientation,
}

impl Geometry {
    /// Create a geometry with a single slice origin.
    pub fn new(origin: Point3, size: Size, spacing: Spacing, orientation: Orientation) -> Geometry {
        Geometry {
            origins: vec![origin],
            size,
            spacing,
            orientation,
        }
    }

    /// The origin of the first slice.
    pub fn origin(&self) -> Point3 {
        self.origins[0]
    }

    /// The per-slice origins, in slice order.
    pub fn origins(&self) -> &[Point3] {
        &self.origins
    }

    /// The voxel extent.
    pub fn size(&self) -> Size {
        self.size
    }

    /// The voxel spacing.
    pub fn spacing(&self) -> Spacing {
        self.spacing
    }

    /// The orientation matrix.
    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    /// Find the slice position of a point along the volume normal:
    /// locate the closest known origin, then place the point before
    /// or after it depending on the sign of the projection of the
    /// difference onto the normal.
    pub fn slice_index(&self, point: &Point3) -> usize {
        let mut closest = 0;
        let mut best = f64::INFINITY;
        for (k, origin) in self.origins.iter().enumerate() {
            let distance = point.distance(origin);
            if distance < best {
                best = distance;
                closest = k;
            }
        }
        let normal = self.orientation.normal();
        let offset = point.minus(&self.origins[closest]);
        if normal.dot(&offset) > 0.0 {
            closest + 1
        } else {
            closest
        }
    }

    /// Map voxel indices (column, row, slice) to a point in patient
    /// space. The exact inverse of [`world_to_index`](Self::world_to_index).
    pub fn index_to_world(&self, i: f64, j: f64, k: f64) -> Point3 {
        let o = self.origins[0];
        let row = self.orientation.row(0);
        let column = self.orientation.row(1);
        let normal = self.orientation.row(2);
        let ci = i * self.spacing.column;
        let cj = j * self.spacing.row;
        let ck = k * self.spacing.slice;
        Point3::new(
            o.x + ci * row.x + cj * column.x + ck * normal.x,
            o.y + ci * row.y + cj * column.y + ck * normal.y,
            o.z + ci * row.z + cj * column.z + ck * normal.z,
        )
    }

    /// Map a point in patient space back to voxel indices.
    /// The exact inverse of [`index_to_world`](Self::index_to_world):
    /// the offset from the origin is projected onto the direction
    /// cosines, then divided by the spacing.
    pub fn world_to_index(&self, point: &Point3) -> (f64, f64, f64) {
        let offset = point.minus(&self.origins[0]);
        (
            offset.dot(&self.orientation.row(0)) / self.spacing.column,
            offset.dot(&self.orientation.row(1)) / self.spacing.row,
            offset.dot(&self.orientation.row(2)) / self.spacing.slice,
        )
    }

    /// Insert a slice origin at the given position,
    /// growing the volume by one slice.
    pub fn insert_origin(&mut self, index: usize, origin: Point3) {
        self.origins.insert(index, origin);
        self.size.slices += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn volume() -> Geometry {
        let mut geometry = Geometry::new(
            Point3::new(0.0, 0.0, 0.0),
            Size::new(4, 4, 1),
            Spacing::new(0.5, 0.5, 2.0),
            Orientation::default(),
        );
        geometry.insert_origin(1, Point3::new(0.0, 0.0, 2.0));
        geometry.insert_origin(2, Point3::new(0.0, 0.0, 4.0));
        geometry
    }

    #[test]
    fn orientation_normal_is_the_cross_product() {
        let orientation = Orientation::from_cosines(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        );
        assert_eq!(orientation.normal(), Point3::new(0.0, 0.0, 1.0));

        // axial with flipped column direction flips the normal
        let orientation = Orientation::from_cosines(
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
        );
        assert_eq!(orientation.normal(), Point3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn slice_index_orders_along_the_normal() {
        let geometry = volume();
        // before the first slice
        assert_eq!(geometry.slice_index(&Point3::new(0.0, 0.0, -1.0)), 0);
        // between the first and second slices
        assert_eq!(geometry.slice_index(&Point3::new(0.0, 0.0, 1.2)), 1);
        // between the second and third slices
        assert_eq!(geometry.slice_index(&Point3::new(0.0, 0.0, 3.0)), 2);
        // past the last slice
        assert_eq!(geometry.slice_index(&Point3::new(0.0, 0.0, 5.0)), 3);
    }

    #[test]
    fn world_to_index_is_the_inverse_of_index_to_world() {
        let geometry = volume();
        let world = geometry.index_to_world(3.0, 1.0, 2.0);
        assert_eq!(world, Point3::new(1.5, 0.5, 4.0));
        let (i, j, k) = geometry.world_to_index(&world);
        assert!((i - 3.0).abs() < 1e-9);
        assert!((j - 1.0).abs() < 1e-9);
        assert!((k - 2.0).abs() < 1e-9);
    }

    #[test]
    fn transforms_respect_the_orientation() {
        let geometry = Geometry::new(
            Point3::new(10.0, 20.0, 30.0),
            Size::new(2, 2, 1),
            Spacing::new(2.0, 3.0, 4.0),
            Orientation::from_cosines(
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, -1.0),
            ),
        );
        let world = geometry.index_to_world(1.0, 1.0, 1.0);
        let (i, j, k) = geometry.world_to_index(&world);
        assert!((i - 1.0).abs() < 1e-9);
        assert!((j - 1.0).abs() < 1e-9);
        assert!((k - 1.0).abs() < 1e-9);
    }
}
