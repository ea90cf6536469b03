//! Collision and orientation primitives for placing cartons in a truck.
//!
//! All boxes are axis aligned. Two boxes do NOT overlap when they are separated
//! along at least one axis; touching faces are allowed.

use serde::Serialize;

use crate::model::CartonSpec;
use crate::types::{BoundingBox, Vec3};

/// A rotation of a carton's (length, width, height).
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Orientation {
    /// Index of the permutation, 0 is the carton as given.
    pub index: u8,
    /// Extents along x, y and z after rotation.
    pub dims: Vec3,
}

impl Orientation {
    pub fn volume(&self) -> f64 {
        self.dims.volume()
    }
}

/// Checks that all three extents fit inside the truck extents.
///
/// # Parameters
/// * `orientation` - The rotated carton
/// * `truck_dims` - Inner extents of the truck body
/// * `tolerance` - Numerical tolerance
pub fn fits(orientation: &Orientation, truck_dims: &Vec3, tolerance: f64) -> bool {
    orientation.dims.fits_within(truck_dims, tolerance)
}

/// Checks whether two placed boxes overlap.
///
/// # Parameters
/// * `pos_a`, `ori_a` - Position (lower left front corner) and orientation of the first box
/// * `pos_b`, `ori_b` - Position and orientation of the second box
///
/// # Example
/// ```
/// use fleet_pack::geometry::{overlaps, Orientation};
/// use fleet_pack::types::Vec3;
///
/// let cube = Orientation { index: 0, dims: Vec3::new(10.0, 10.0, 10.0) };
/// assert!(overlaps(Vec3::zero(), &cube, Vec3::new(5.0, 0.0, 0.0), &cube));
/// assert!(!overlaps(Vec3::zero(), &cube, Vec3::new(10.0, 0.0, 0.0), &cube));
/// ```
pub fn overlaps(pos_a: Vec3, ori_a: &Orientation, pos_b: Vec3, ori_b: &Orientation) -> bool {
    BoundingBox::from_position_and_dims(pos_a, ori_a.dims)
        .intersects(&BoundingBox::from_position_and_dims(pos_b, ori_b.dims))
}

/// Enumerates the orientations a carton may take.
///
/// Rotatable cartons get up to six permutations; permutations with identical
/// extents collapse to the first one. Upright rotations come first.
pub fn orientations(carton: &CartonSpec) -> Vec<Orientation> {
    let (l, w, h) = (carton.length, carton.width, carton.height);
    if !carton.can_rotate {
        return vec![Orientation {
            index: 0,
            dims: Vec3::new(l, w, h),
        }];
    }

    let permutations = [
        (l, w, h),
        (w, l, h),
        (l, h, w),
        (h, l, w),
        (w, h, l),
        (h, w, l),
    ];

    let mut result: Vec<Orientation> = Vec::with_capacity(permutations.len());
    for (index, dims) in permutations.into_iter().enumerate() {
        let dims = Vec3::from(dims);
        if result.iter().any(|o| o.dims == dims) {
            continue;
        }
        result.push(Orientation {
            index: index as u8,
            dims,
        });
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;

    fn carton(dims: (f64, f64, f64), can_rotate: bool) -> CartonSpec {
        CartonSpec::new("c", dims, 1.0, 1)
            .unwrap()
            .with_rotation(can_rotate)
    }

    #[test]
    fn rotatable_carton_has_six_orientations() {
        let all = orientations(&carton((10.0, 20.0, 30.0), true));
        assert_eq!(all.len(), 6);
        assert_eq!(all[0].dims, Vec3::new(10.0, 20.0, 30.0));
        assert!(all.iter().all(|o| (o.volume() - 6000.0).abs() < EPSILON_GENERAL));
    }

    #[test]
    fn fixed_carton_has_one_orientation() {
        let all = orientations(&carton((10.0, 20.0, 30.0), false));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].index, 0);
    }

    #[test]
    fn identical_permutations_collapse() {
        assert_eq!(orientations(&carton((10.0, 10.0, 10.0), true)).len(), 1);
        assert_eq!(orientations(&carton((10.0, 10.0, 20.0), true)).len(), 3);
    }

    #[test]
    fn long_carton_never_fits_short_truck() {
        let truck = Vec3::new(400.0, 200.0, 200.0);
        let long = carton((500.0, 50.0, 50.0), true);
        assert!(orientations(&long).iter().all(|o| !fits(o, &truck, EPSILON_GENERAL)));
    }

    #[test]
    fn rotation_makes_carton_fit() {
        let truck = Vec3::new(100.0, 50.0, 50.0);
        let tall = carton((40.0, 40.0, 90.0), true);
        let fitting: Vec<_> = orientations(&tall)
            .into_iter()
            .filter(|o| fits(o, &truck, EPSILON_GENERAL))
            .collect();
        assert!(!fitting.is_empty());
        assert!(fitting.iter().all(|o| o.dims.x == 90.0));
    }

    #[test]
    fn separated_boxes_do_not_overlap() {
        let a = Orientation {
            index: 0,
            dims: Vec3::new(10.0, 10.0, 10.0),
        };
        let b = Orientation {
            index: 0,
            dims: Vec3::new(5.0, 5.0, 5.0),
        };
        assert!(overlaps(Vec3::zero(), &a, Vec3::new(9.0, 9.0, 9.0), &b));
        assert!(!overlaps(Vec3::zero(), &a, Vec3::new(0.0, 0.0, 10.0), &b));
        assert!(!overlaps(Vec3::zero(), &a, Vec3::new(0.0, 12.0, 0.0), &b));
    }
}
