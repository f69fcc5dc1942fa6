// src/planes.rs

use crate::error::{AdaptError, Result};
use crate::frame::VideoFormat;
use std::fmt;

/// Set of plane indices (0 = luma/first plane).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Planes(u8);

impl Planes {
    pub const MAX_PLANES: usize = 8;
    pub const LUMA: Planes = Planes(0b001);
    pub const CHROMA: Planes = Planes(0b110);
    pub const ALL: Planes = Planes(0b111);

    pub fn empty() -> Self {
        Planes(0)
    }

    /// First `count` planes.
    pub fn first(count: usize) -> Self {
        (0..count.min(Self::MAX_PLANES)).collect()
    }

    pub fn contains(&self, index: usize) -> bool {
        index < Self::MAX_PLANES && self.0 & (1 << index) != 0
    }

    pub fn insert(&mut self, index: usize) {
        if index < Self::MAX_PLANES {
            self.0 |= 1 << index;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        (0..Self::MAX_PLANES).filter(move |&i| self.contains(i))
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }

    pub fn luma(&self) -> bool {
        self.contains(0)
    }

    pub fn luma_only(&self) -> bool {
        *self == Self::LUMA
    }

    pub fn chroma(&self) -> bool {
        self.contains(1) || self.contains(2)
    }

    pub fn chroma_only(&self) -> bool {
        *self == Self::CHROMA
    }
}

impl FromIterator<usize> for Planes {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut planes = Planes::empty();
        for index in iter {
            planes.insert(index);
        }
        planes
    }
}

impl fmt::Debug for Planes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

/// Caller-side plane request before it is checked against a format.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PlanesArg {
    #[default]
    All,
    One(usize),
    Many(Vec<usize>),
}

impl From<usize> for PlanesArg {
    fn from(index: usize) -> Self {
        PlanesArg::One(index)
    }
}

impl From<Vec<usize>> for PlanesArg {
    fn from(indices: Vec<usize>) -> Self {
        PlanesArg::Many(indices)
    }
}

impl From<&[usize]> for PlanesArg {
    fn from(indices: &[usize]) -> Self {
        PlanesArg::Many(indices.to_vec())
    }
}

impl From<Planes> for PlanesArg {
    fn from(planes: Planes) -> Self {
        PlanesArg::Many(planes.to_vec())
    }
}

impl From<Option<usize>> for PlanesArg {
    fn from(index: Option<usize>) -> Self {
        index.map_or(PlanesArg::All, PlanesArg::One)
    }
}

/// Resolves a plane request against a format, dropping indices the format lacks.
pub fn normalize_planes(format: &VideoFormat, planes: &PlanesArg) -> Planes {
    let count = format.num_planes();
    match planes {
        PlanesArg::All => Planes::first(count),
        PlanesArg::One(index) => [*index].into_iter().filter(|&i| i < count).collect(),
        PlanesArg::Many(indices) => indices.iter().copied().filter(|&i| i < count).collect(),
    }
}

/// Stretches `values` to `length` entries by repeating the last one, or truncates.
/// A scalar is passed as a one-element slice.
pub fn normalize_seq<T: Clone>(values: &[T], length: usize) -> Result<Vec<T>> {
    let last = values
        .last()
        .ok_or_else(|| AdaptError::Input("Cannot normalize an empty sequence".to_string()))?;
    Ok(values
        .iter()
        .chain(std::iter::repeat(last))
        .take(length)
        .cloned()
        .collect())
}
