//! Binary skeleton images and the neighbor-count grid derived from them.
//!
//! The [`NeighborGrid`] is the only image representation the graph
//! builder consumes: every skeleton pixel stores the number of skeleton
//! pixels among its 8 (2D) or 26 (3D) neighbors, and every background
//! pixel stores [`BACKGROUND`].

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::{GraphError, GraphMetadata, MAX_DIMS, Pixel};

/// Neighbor-count value marking a background (non-skeleton) pixel.
pub const BACKGROUND: i8 = -1;

/// Width of the background border added around a skeleton before
/// counting neighbors. Coordinates in the padded grid are shifted by
/// this amount and must be shifted back once the graph is built.
pub const PADDING: i64 = 1;

/// Enumerate the neighbor offsets of an `ndim`-dimensional pixel in
/// lexicographic order, the first axis varying slowest.
#[allow(clippy::cast_possible_wrap)]
const fn lexicographic_offsets<const N: usize>(ndim: usize) -> [[i64; MAX_DIMS]; N] {
    let mut out = [[0_i64; MAX_DIMS]; N];
    let total = if ndim == 2 { 9 } else { 27 };
    let mut k = 0;
    let mut n = 0;
    while k < total {
        let mut offset = [0_i64; MAX_DIMS];
        let mut rem = k;
        let mut axis = ndim;
        while axis > 0 {
            axis -= 1;
            offset[axis] = (rem % 3) as i64 - 1;
            rem /= 3;
        }
        if offset[0] != 0 || offset[1] != 0 || offset[2] != 0 {
            out[n] = offset;
            n += 1;
        }
        k += 1;
    }
    out
}

const OFFSETS_2D: [[i64; MAX_DIMS]; 8] = lexicographic_offsets(2);
const OFFSETS_3D: [[i64; MAX_DIMS]; 26] = lexicographic_offsets(3);

/// Neighbor offsets for the given dimensionality (8 in 2D, 26 in 3D).
///
/// The order is fixed and is the scanning order used whenever a
/// neighbor has to be chosen among several candidates.
#[must_use]
pub fn neighbor_offsets(ndim: usize) -> &'static [[i64; MAX_DIMS]] {
    if ndim == 3 { &OFFSETS_3D } else { &OFFSETS_2D }
}

/// Iterate over the grid neighbors of a pixel, in [`neighbor_offsets`] order.
pub fn neighbors(pixel: Pixel) -> impl Iterator<Item = Pixel> {
    neighbor_offsets(pixel.ndim())
        .iter()
        .map(move |offset| pixel.offset(offset))
}

/// Unchecked raw form used to validate deserialized skeletons.
#[derive(Deserialize)]
struct RawSkeleton {
    shape: Vec<usize>,
    data: Vec<u8>,
    pixel_size: Option<Vec<f64>>,
    #[serde(default)]
    source: String,
}

/// A 2D or 3D binary skeleton image stored in row-major order.
///
/// The image is expected to contain only `0` (background) and `1`
/// (skeleton); this is checked by [`validate_binary`](Self::validate_binary)
/// when a graph is created rather than at construction, so callers can
/// still inspect malformed inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSkeleton")]
pub struct Skeleton {
    shape: Vec<usize>,
    data: Vec<u8>,
    pixel_size: Vec<f64>,
    source: String,
}

impl TryFrom<RawSkeleton> for Skeleton {
    type Error = GraphError;

    fn try_from(raw: RawSkeleton) -> Result<Self, Self::Error> {
        let skeleton = Self::new(raw.shape, raw.data)?.with_source(raw.source);
        match raw.pixel_size {
            Some(size) => skeleton.with_pixel_size(size),
            None => Ok(skeleton),
        }
    }
}

impl Skeleton {
    /// Create a skeleton from its shape and row-major data.
    ///
    /// Pixel size defaults to `1.0` along every axis.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnsupportedDimension`] unless the shape has 2
    /// or 3 axes, and [`GraphError::ShapeMismatch`] if `data` does not hold
    /// exactly one value per pixel.
    pub fn new(shape: Vec<usize>, data: Vec<u8>) -> Result<Self, GraphError> {
        if !(2..=MAX_DIMS).contains(&shape.len()) {
            return Err(GraphError::UnsupportedDimension(shape.len()));
        }
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(GraphError::ShapeMismatch {
                shape,
                expected,
                actual: data.len(),
            });
        }
        let pixel_size = vec![1.0; shape.len()];
        Ok(Self {
            shape,
            data,
            pixel_size,
            source: String::new(),
        })
    }

    /// Binarize a grayscale image: any non-zero value becomes skeleton.
    ///
    /// The resulting shape is `[height, width]` and pixel coordinates are
    /// `(row, col)`.
    #[must_use]
    pub fn from_gray_image(img: &GrayImage) -> Self {
        let data = img.as_raw().iter().map(|&v| u8::from(v > 0)).collect();
        Self {
            shape: vec![img.height() as usize, img.width() as usize],
            data,
            pixel_size: vec![1.0; 2],
            source: String::new(),
        }
    }

    /// Set the physical pixel size, one value per axis.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::PixelSizeMismatch`] if the number of values
    /// differs from the image dimensionality.
    pub fn with_pixel_size(mut self, pixel_size: Vec<f64>) -> Result<Self, GraphError> {
        if pixel_size.len() != self.ndim() {
            return Err(GraphError::PixelSizeMismatch {
                expected: self.ndim(),
                actual: pixel_size.len(),
            });
        }
        self.pixel_size = pixel_size;
        Ok(self)
    }

    /// Set the provenance string carried into the graph metadata.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Image shape, one entry per axis.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Row-major pixel values.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Physical pixel size along each axis.
    #[must_use]
    pub fn pixel_size(&self) -> &[f64] {
        &self.pixel_size
    }

    /// Provenance string.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Number of skeleton (value 1) pixels.
    #[must_use]
    pub fn skeleton_pixel_count(&self) -> usize {
        self.data.iter().filter(|&&v| v == 1).count()
    }

    /// Check that every value is 0 or 1.
    ///
    /// An image without any skeleton pixel is accepted and yields an
    /// empty graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NonBinarySkeleton`] with the first offending
    /// value.
    pub fn validate_binary(&self) -> Result<(), GraphError> {
        match self.data.iter().find(|&&v| v > 1) {
            Some(&value) => Err(GraphError::NonBinarySkeleton { value }),
            None => Ok(()),
        }
    }

    /// Graph metadata describing this image.
    #[must_use]
    pub fn metadata(&self) -> GraphMetadata {
        GraphMetadata {
            source: self.source.clone(),
            pixel_size: self.pixel_size.clone(),
            ndim: self.ndim(),
            shape: self.shape.clone(),
        }
    }
}

/// Per-pixel neighbor counts of a skeleton image.
///
/// Skeleton pixels hold their number of skeleton neighbors (0..=26);
/// background pixels hold [`BACKGROUND`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborGrid {
    shape: Vec<usize>,
    strides: Vec<usize>,
    counts: Vec<i8>,
}

impl NeighborGrid {
    /// Wrap precomputed neighbor counts.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnsupportedDimension`] or
    /// [`GraphError::ShapeMismatch`] for malformed shapes, and
    /// [`GraphError::InvalidNeighborCount`] for values below
    /// [`BACKGROUND`].
    pub fn from_counts(shape: Vec<usize>, counts: Vec<i8>) -> Result<Self, GraphError> {
        if !(2..=MAX_DIMS).contains(&shape.len()) {
            return Err(GraphError::UnsupportedDimension(shape.len()));
        }
        let expected: usize = shape.iter().product();
        if expected != counts.len() {
            return Err(GraphError::ShapeMismatch {
                shape,
                expected,
                actual: counts.len(),
            });
        }
        if let Some(&value) = counts.iter().find(|&&v| v < BACKGROUND) {
            return Err(GraphError::InvalidNeighborCount { value });
        }
        let strides = row_major_strides(&shape);
        Ok(Self {
            shape,
            strides,
            counts,
        })
    }

    /// Count neighbors of a skeleton, after padding it with a
    /// [`PADDING`]-wide background border and deleting isolated pixels.
    ///
    /// The returned grid is larger than the skeleton by `2 * PADDING`
    /// along every axis; pixel `p` of the skeleton is pixel
    /// `p + PADDING` of the grid.
    #[must_use]
    pub fn from_skeleton(skeleton: &Skeleton) -> Self {
        let pad = PADDING.unsigned_abs() as usize;
        let shape: Vec<usize> = skeleton.shape().iter().map(|s| s + 2 * pad).collect();
        let strides = row_major_strides(&shape);
        let src_strides = row_major_strides(skeleton.shape());
        let total: usize = shape.iter().product();

        let mut occupied = vec![false; total];
        for (src_idx, _) in skeleton.data().iter().enumerate().filter(|(_, v)| **v == 1) {
            let mut rem = src_idx;
            let mut dst_idx = 0;
            for (axis, stride) in src_strides.iter().enumerate() {
                let coord = rem / stride;
                rem %= stride;
                dst_idx += (coord + pad) * strides[axis];
            }
            occupied[dst_idx] = true;
        }

        let mut grid = Self {
            shape,
            strides,
            counts: vec![BACKGROUND; total],
        };

        for idx in (0..total).filter(|&i| occupied[i]) {
            let pixel = grid.pixel_at(idx);
            let count = neighbors(pixel)
                .filter_map(|n| grid.index_of(&n))
                .filter(|&n| occupied[n])
                .count();
            // Isolated pixels form single-pixel components and are dropped.
            if count > 0 {
                grid.counts[idx] = i8::try_from(count).unwrap_or(i8::MAX);
            }
        }

        grid
    }

    /// Grid shape.
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Returns `true` if the pixel lies inside the grid.
    #[must_use]
    pub fn contains(&self, pixel: &Pixel) -> bool {
        self.index_of(pixel).is_some()
    }

    /// Neighbor count at a pixel, or `None` outside the grid.
    #[must_use]
    pub fn get(&self, pixel: &Pixel) -> Option<i8> {
        self.index_of(pixel).map(|i| self.counts[i])
    }

    /// Returns `true` if the pixel is inside the grid and has exactly
    /// `count` skeleton neighbors.
    #[must_use]
    pub fn has_count(&self, pixel: &Pixel, count: i8) -> bool {
        self.get(pixel) == Some(count)
    }

    /// Iterate over every grid pixel with its count, in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (Pixel, i8)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, &c)| (self.pixel_at(i), c))
    }

    /// Row-major index of a pixel, or `None` outside the grid.
    #[must_use]
    pub fn index_of(&self, pixel: &Pixel) -> Option<usize> {
        if pixel.ndim() != self.ndim() {
            return None;
        }
        let mut idx = 0;
        for ((&c, &size), &stride) in pixel.coords().iter().zip(&self.shape).zip(&self.strides) {
            let c = usize::try_from(c).ok()?;
            if c >= size {
                return None;
            }
            idx += c * stride;
        }
        Some(idx)
    }

    /// Pixel at a row-major index.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn pixel_at(&self, index: usize) -> Pixel {
        let mut coords = [0_i64; MAX_DIMS];
        let mut rem = index;
        for (axis, stride) in self.strides.iter().enumerate() {
            coords[axis] = (rem / stride) as i64;
            rem %= stride;
        }
        if self.ndim() == 3 {
            Pixel::new_3d(coords[0], coords[1], coords[2])
        } else {
            Pixel::new_2d(coords[0], coords[1])
        }
    }
}

fn row_major_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }
    strides
}
