use bevy::prelude::*;
use serde::{Deserialize, Serialize};

/// Discrete quarter-turn rotation of an item shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    DegNeg90,
}

impl Rotation {
    /// Order in which placement falls back after the preferred rotation.
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::DegNeg90,
    ];

    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 90,
            Rotation::Deg180 => 180,
            Rotation::DegNeg90 => -90,
        }
    }

    /// Maps a raw angle onto the closed rotation set. 270 is accepted as an
    /// alias of -90; anything else is not a grid rotation.
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            -90 | 270 => Some(Rotation::DegNeg90),
            _ => None,
        }
    }

    /// Next rotation a quarter turn clockwise (the "R" key in the grid UI).
    pub fn next(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg90,
            Rotation::Deg90 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::DegNeg90,
            Rotation::DegNeg90 => Rotation::Deg0,
        }
    }
}

pub fn rotate_point(point: IVec2, rotation: Rotation) -> IVec2 {
    match rotation {
        Rotation::Deg0 => point,
        // (x, y) -> (-y, x)
        Rotation::Deg90 => IVec2::new(-point.y, point.x),
        Rotation::Deg180 => IVec2::new(-point.x, -point.y),
        Rotation::DegNeg90 => IVec2::new(point.y, -point.x),
    }
}

/// Raw-angle variant of [`rotate_point`]. Angles outside the rotation set
/// leave the point unchanged.
pub fn rotate_point_degrees(point: IVec2, degrees: i32) -> IVec2 {
    match Rotation::from_degrees(degrees) {
        Some(rotation) => rotate_point(point, rotation),
        None => point,
    }
}

/// Rotates every cell of `shape` and its `root`, then translates both so the
/// rotated shape's minimum row and column sit at zero again.
///
/// `Rotation::Deg0` returns the input untouched, without normalization.
pub fn rotate_shape_with_root(
    shape: &[IVec2],
    rotation: Rotation,
    root: IVec2,
) -> (Vec<IVec2>, IVec2) {
    if rotation == Rotation::Deg0 {
        return (shape.to_vec(), root);
    }

    let mut rotated: Vec<IVec2> = shape.iter().map(|p| rotate_point(*p, rotation)).collect();
    let mut rotated_root = rotate_point(root, rotation);

    if let Some(min) = rotated.iter().copied().reduce(IVec2::min) {
        if min != IVec2::ZERO {
            for point in rotated.iter_mut() {
                *point -= min;
            }
            rotated_root -= min;
        }
    }

    (rotated, rotated_root)
}

/// Grid cells a shape covers when anchored at `anchor`, plus the grid
/// coordinate of its root cell.
pub fn compute_occupied_coordinates(
    anchor: IVec2,
    shape: &[IVec2],
    shape_root: IVec2,
    rotation: Rotation,
) -> (Vec<IVec2>, IVec2) {
    let (rotated, rotated_root) = rotate_shape_with_root(shape, rotation, shape_root);
    let occupied = rotated.into_iter().map(|p| p + anchor).collect();
    (occupied, rotated_root + anchor)
}

// Returns (min corner, size in slots) of the rotated shape.
pub fn bounding_box(shape: &[IVec2], rotation: Rotation) -> (IVec2, IVec2) {
    let (rotated, _) = rotate_shape_with_root(shape, rotation, IVec2::ZERO);
    let Some(first) = rotated.first().copied() else {
        return (IVec2::ZERO, IVec2::ONE);
    };

    let (min, max) = rotated
        .iter()
        .fold((first, first), |(min, max), p| (min.min(*p), max.max(*p)));

    (min, max - min + IVec2::ONE)
}
