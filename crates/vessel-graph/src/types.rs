//! Shared types for skeleton graph construction and adjustment.

use serde::{Deserialize, Serialize};

/// Maximum number of image axes supported (2D and 3D images).
pub const MAX_DIMS: usize = 3;

/// A pixel (or voxel) coordinate in a 2D or 3D image.
///
/// Unused trailing axes are always zero, so derived equality and hashing
/// only ever compare meaningful coordinates. Serialized as a plain
/// sequence of integers (`[row, col]` or `[plane, row, col]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "Vec<i64>", try_from = "Vec<i64>")]
pub struct Pixel {
    coords: [i64; MAX_DIMS],
    ndim: u8,
}

impl Pixel {
    /// Create a 2D pixel coordinate.
    #[must_use]
    pub const fn new_2d(row: i64, col: i64) -> Self {
        Self {
            coords: [row, col, 0],
            ndim: 2,
        }
    }

    /// Create a 3D voxel coordinate.
    #[must_use]
    pub const fn new_3d(plane: i64, row: i64, col: i64) -> Self {
        Self {
            coords: [plane, row, col],
            ndim: 3,
        }
    }

    /// Build a coordinate from a slice of 2 or 3 values.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnsupportedDimension`] for any other length.
    pub fn from_slice(coords: &[i64]) -> Result<Self, GraphError> {
        match *coords {
            [r, c] => Ok(Self::new_2d(r, c)),
            [p, r, c] => Ok(Self::new_3d(p, r, c)),
            _ => Err(GraphError::UnsupportedDimension(coords.len())),
        }
    }

    /// Number of axes of this coordinate.
    #[must_use]
    pub const fn ndim(&self) -> usize {
        self.ndim as usize
    }

    /// The meaningful coordinates, one per axis.
    #[must_use]
    pub fn coords(&self) -> &[i64] {
        &self.coords[..self.ndim()]
    }

    /// Coordinate-wise sum with an offset of the same dimensionality.
    ///
    /// Axes beyond `self.ndim()` in `offset` are ignored.
    #[must_use]
    pub fn offset(self, offset: &[i64]) -> Self {
        let mut coords = self.coords;
        for (c, d) in coords.iter_mut().zip(offset).take(self.ndim()) {
            *c += d;
        }
        Self {
            coords,
            ndim: self.ndim,
        }
    }

    /// Subtract the same value from every axis (used to undo image padding).
    #[must_use]
    pub fn shifted(self, amount: i64) -> Self {
        let mut coords = self.coords;
        for c in coords.iter_mut().take(self.ndim()) {
            *c -= amount;
        }
        Self {
            coords,
            ndim: self.ndim,
        }
    }

    /// Returns `true` if the two pixels are distinct and touch under
    /// 8-connectivity (2D) or 26-connectivity (3D).
    #[must_use]
    pub fn is_adjacent(&self, other: &Self) -> bool {
        self.ndim == other.ndim
            && self != other
            && self
                .coords()
                .iter()
                .zip(other.coords())
                .all(|(a, b)| (a - b).abs() <= 1)
    }
}

impl From<Pixel> for Vec<i64> {
    fn from(p: Pixel) -> Self {
        p.coords().to_vec()
    }
}

impl TryFrom<Vec<i64>> for Pixel {
    type Error = GraphError;

    fn try_from(value: Vec<i64>) -> Result<Self, Self::Error> {
        Self::from_slice(&value)
    }
}

/// Kind of interest point a graph node was created from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointType {
    /// A connected region of pixels with three or more skeleton neighbors.
    Bifurcation,
    /// A single pixel with exactly one skeleton neighbor.
    Termination,
}

/// Graph-level metadata carried through construction and adjustment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetadata {
    /// Opaque provenance string (usually the source image path).
    pub source: String,
    /// Physical size of a pixel along each axis.
    pub pixel_size: Vec<f64>,
    /// Image dimensionality (2 or 3).
    pub ndim: usize,
    /// Shape of the source image (unpadded).
    pub shape: Vec<usize>,
}

impl GraphMetadata {
    /// Metadata for an unnamed image with unit pixel size.
    #[must_use]
    pub fn unit(shape: &[usize]) -> Self {
        Self {
            source: String::new(),
            pixel_size: vec![1.0; shape.len()],
            ndim: shape.len(),
            shape: shape.to_vec(),
        }
    }
}

/// Configuration for [`adjust_graph`](crate::adjust::adjust_graph).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustConfig {
    /// Branches shorter than this (in physical units) are pruned.
    ///
    /// Multi-edge reduction and small-component removal use twice this
    /// value.
    pub length_threshold: f64,

    /// Keep nodes whose degree dropped to zero.
    pub keep_nodes: bool,

    /// Renumber surviving nodes to a dense `0..N` range, recording the
    /// previous id in [`Node::old_id`](crate::graph::Node::old_id). Only
    /// applies when `keep_nodes` is `false`.
    pub collapse_indices: bool,
}

impl AdjustConfig {
    /// Default branch length threshold.
    pub const DEFAULT_LENGTH_THRESHOLD: f64 = 10.0;

    /// Config with the given threshold and default flags.
    #[must_use]
    pub fn with_threshold(length_threshold: f64) -> Self {
        Self {
            length_threshold,
            ..Self::default()
        }
    }

    /// Check the config for values the adjustment cannot work with.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConfig`] if the threshold is negative,
    /// NaN or infinite.
    pub fn validate(&self) -> Result<(), GraphError> {
        if !self.length_threshold.is_finite() || self.length_threshold < 0.0 {
            return Err(GraphError::InvalidConfig(format!(
                "length_threshold must be finite and non-negative, got {}",
                self.length_threshold
            )));
        }
        Ok(())
    }
}

impl Default for AdjustConfig {
    fn default() -> Self {
        Self {
            length_threshold: Self::DEFAULT_LENGTH_THRESHOLD,
            keep_nodes: false,
            collapse_indices: true,
        }
    }
}

/// Errors raised while building or adjusting a skeleton graph.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    /// The skeleton image holds a value other than 0 or 1.
    #[error("skeleton image must only contain values 0 and 1, found {value}")]
    NonBinarySkeleton {
        /// First offending value.
        value: u8,
    },

    /// Data length does not match the product of the shape.
    #[error("image data has {actual} elements but shape {shape:?} needs {expected}")]
    ShapeMismatch {
        /// Declared shape.
        shape: Vec<usize>,
        /// Number of elements implied by the shape.
        expected: usize,
        /// Number of elements supplied.
        actual: usize,
    },

    /// Only 2D and 3D images are supported.
    #[error("unsupported image dimensionality {0}, expected 2 or 3")]
    UnsupportedDimension(usize),

    /// An interest point and the neighbor grid disagree on dimensionality.
    #[error("dimension mismatch between interest point ({point}) and neighbor grid ({grid})")]
    DimensionMismatch {
        /// Dimensionality of the interest point.
        point: usize,
        /// Dimensionality of the grid.
        grid: usize,
    },

    /// A neighbor-count grid value below the background sentinel.
    #[error("neighbor count {value} is below the background sentinel -1")]
    InvalidNeighborCount {
        /// Offending value.
        value: i8,
    },

    /// Pixel size does not provide one value per axis.
    #[error("pixel size has {actual} axes, image has {expected}")]
    PixelSizeMismatch {
        /// Image dimensionality.
        expected: usize,
        /// Number of pixel size values.
        actual: usize,
    },

    /// A degree-two node with a single self-loop cannot be eliminated.
    #[error("cannot eliminate node {node}: its two edge endpoints form a self-loop")]
    SelfLoopElimination {
        /// The offending node.
        node: usize,
    },

    /// Requested a branch index beyond what the interest point has.
    #[error("branch index {index} out of range, interest point has {available} branches")]
    BranchIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of branches the point has.
        available: usize,
    },

    /// A tracked path ended on a pixel that is no interest point's branch.
    #[error("tracked path ends at {pixel:?}, which is not a branch of any interest point")]
    UnknownBranchEndpoint {
        /// Last pixel of the tracked path.
        pixel: Vec<i64>,
    },

    /// Lookup of a node id that is not in the graph.
    #[error("node {0} not found")]
    NodeNotFound(usize),

    /// Lookup of an edge id that is not in the graph.
    #[error("edge {0} not found")]
    EdgeNotFound(usize),

    /// Configuration is invalid.
    #[error("invalid adjustment configuration: {0}")]
    InvalidConfig(String),

    /// Graph invariants do not hold.
    #[error("inconsistent graph: {0}")]
    Inconsistent(String),
}
