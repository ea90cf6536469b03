//! Single-truck placement engine.
//!
//! Places an ordered list of items into one empty truck using a bottom-left-fill
//! scan with goal-specific scoring:
//! - x and y on a fixed grid, z on the resting levels (floor and top faces)
//! - collision, bounds and cumulative weight checks
//! - optional stacking rules (non-stackable, fragile, column height)
//!
//! Items that find no position are reported as unfit and never retried.

use std::cmp::Ordering;
use std::fmt;

use serde::Serialize;

use crate::geometry::{Orientation, fits, orientations};
use crate::model::{CartonItem, TruckInstance};
use crate::ordering::GoalStrategy;
use crate::types::{BoundingBox, Dimensional, EPSILON_GENERAL, EPSILON_HEIGHT, Vec3, Weighted, overlap_1d};

/// Configuration of the placement engine and the packing driver.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PackingConfig {
    /// Step of the x/y position grid (smaller = tighter, but slower)
    pub grid_step: f64,
    /// Tolerance for height comparisons
    pub height_epsilon: f64,
    /// General numeric tolerance
    pub general_epsilon: f64,
    /// Enforce resting contact, non-stackable, fragile and column height rules
    pub respect_stacking: bool,
    /// Item count above which the driver switches to parallel batches
    pub parallel_threshold: usize,
    /// Worker count, also the batch size in parallel mode
    pub worker_count: usize,
}

impl PackingConfig {
    pub const DEFAULT_GRID_STEP: f64 = 5.0;
    pub const DEFAULT_HEIGHT_EPSILON: f64 = EPSILON_HEIGHT;
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_RESPECT_STACKING: bool = true;
    pub const DEFAULT_PARALLEL_THRESHOLD: usize = 500;
    pub const DEFAULT_WORKER_COUNT: usize = 4;

    /// Creates a builder for a custom configuration.
    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            grid_step: Self::DEFAULT_GRID_STEP,
            height_epsilon: Self::DEFAULT_HEIGHT_EPSILON,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            respect_stacking: Self::DEFAULT_RESPECT_STACKING,
            parallel_threshold: Self::DEFAULT_PARALLEL_THRESHOLD,
            worker_count: Self::DEFAULT_WORKER_COUNT,
        }
    }
}

/// Builder for [`PackingConfig`].
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn height_epsilon(mut self, epsilon: f64) -> Self {
        self.config.height_epsilon = epsilon;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn respect_stacking(mut self, enabled: bool) -> Self {
        self.config.respect_stacking = enabled;
        self
    }

    pub fn parallel_threshold(mut self, threshold: usize) -> Self {
        self.config.parallel_threshold = threshold;
        self
    }

    /// Sets the worker count; values below 1 are raised to 1.
    pub fn worker_count(mut self, workers: usize) -> Self {
        self.config.worker_count = workers.max(1);
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// A committed item inside one truck.
#[derive(Clone, Debug, Serialize)]
pub struct Placement {
    pub item: CartonItem,
    pub orientation: Orientation,
    /// Lower left front corner.
    pub position: Vec3,
    /// 1 on the floor, +1 per carton underneath.
    pub stack_level: u32,
}

impl Placement {
    #[inline]
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position, self.orientation.dims)
    }

    #[inline]
    pub fn top_z(&self) -> f64 {
        self.position.z + self.orientation.dims.z
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Vec3 {
        self.orientation.dims
    }
}

impl Weighted for Placement {
    fn weight(&self) -> f64 {
        self.item.spec.weight
    }
}

/// Reasons why an item could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnplacedReason {
    TooHeavyForTruck,
    DimensionsExceedTruck,
    WeightLimitReached,
    NoFreePosition,
}

impl UnplacedReason {
    pub fn code(&self) -> &'static str {
        match self {
            UnplacedReason::TooHeavyForTruck => "too_heavy_for_truck",
            UnplacedReason::DimensionsExceedTruck => "dimensions_exceed_truck",
            UnplacedReason::WeightLimitReached => "weight_limit_reached",
            UnplacedReason::NoFreePosition => "no_free_position",
        }
    }
}

impl fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnplacedReason::TooHeavyForTruck => {
                write!(f, "Item alone exceeds the truck's weight limit")
            }
            UnplacedReason::DimensionsExceedTruck => {
                write!(f, "Item does not fit the truck body in any orientation")
            }
            UnplacedReason::WeightLimitReached => {
                write!(f, "Truck weight limit reached before the item could be loaded")
            }
            UnplacedReason::NoFreePosition => {
                write!(f, "No free position left inside the truck")
            }
        }
    }
}

/// Item that could not be placed, with the reason.
#[derive(Clone, Debug, Serialize)]
pub struct UnfitItem {
    pub item: CartonItem,
    pub reason: UnplacedReason,
}

/// Outcome of packing one truck.
#[derive(Clone, Debug, Serialize)]
pub struct TruckLoad {
    pub truck: TruckInstance,
    pub placements: Vec<Placement>,
    pub unfit: Vec<UnfitItem>,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
}

impl TruckLoad {
    pub fn placed_weight(&self) -> f64 {
        self.placements.iter().map(Weighted::weight).sum()
    }

    pub fn placed_volume(&self) -> f64 {
        self.placements.iter().map(Dimensional::volume).sum()
    }
}

/// Input to a position scoring function.
#[derive(Clone, Copy, Debug)]
pub struct ScoreInput {
    pub position: Vec3,
    pub dims: Vec3,
    pub weight: f64,
    pub priority: u8,
    pub truck_dims: Vec3,
    pub max_weight: f64,
}

/// Score of a candidate position. Lower is better: `value` first, then `tie`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementScore {
    pub value: f64,
    pub tie: f64,
}

/// A goal's position scoring.
///
/// `level_floor` is the lowest `value` any candidate resting at height `z` can
/// reach; the scan stops once it exceeds the best value found so far.
#[derive(Clone, Copy)]
pub struct PositionScorer {
    pub score: fn(&ScoreInput) -> PlacementScore,
    pub level_floor: fn(f64, &ScoreInput) -> f64,
}

fn space_score(input: &ScoreInput) -> PlacementScore {
    PlacementScore {
        value: input.position.z,
        tie: input.position.x + input.position.y,
    }
}

fn space_level_floor(z: f64, _input: &ScoreInput) -> f64 {
    z
}

fn weight_score(input: &ScoreInput) -> PlacementScore {
    PlacementScore {
        value: input.position.z * input.weight,
        tie: input.position.x + input.position.y,
    }
}

fn weight_level_floor(z: f64, input: &ScoreInput) -> f64 {
    z * input.weight
}

const BALANCED_HEIGHT_WEIGHT: f64 = 0.5;
const BALANCED_CORNER_WEIGHT: f64 = 0.3;
const BALANCED_LOAD_WEIGHT: f64 = 0.2;
const BALANCED_PRIORITY_WEIGHT: f64 = 0.1;

fn balanced_level_term(z: f64, input: &ScoreInput) -> f64 {
    let height_ratio = z / input.truck_dims.z;
    let weight_ratio = if input.max_weight > 0.0 {
        input.weight / input.max_weight
    } else {
        0.0
    };
    BALANCED_HEIGHT_WEIGHT * height_ratio + BALANCED_LOAD_WEIGHT * height_ratio * weight_ratio
}

fn priority_ratio(input: &ScoreInput) -> f64 {
    f64::from(input.priority.min(5)) / 5.0
}

fn balanced_score(input: &ScoreInput) -> PlacementScore {
    let corner = (input.position.x + input.position.y) / (input.truck_dims.x + input.truck_dims.y);
    let door = input.position.x / input.truck_dims.x;
    PlacementScore {
        value: balanced_level_term(input.position.z, input) + BALANCED_CORNER_WEIGHT * corner
            - BALANCED_PRIORITY_WEIGHT * priority_ratio(input) * door,
        tie: input.position.z,
    }
}

fn balanced_level_floor(z: f64, input: &ScoreInput) -> f64 {
    balanced_level_term(z, input) - BALANCED_PRIORITY_WEIGHT * priority_ratio(input)
}

/// Lowest z, then closest to the back corner.
pub const SPACE_SCORER: PositionScorer = PositionScorer {
    score: space_score,
    level_floor: space_level_floor,
};

/// Heavy items settle low: lowest z × weight, then closest to the back corner.
pub const WEIGHT_SCORER: PositionScorer = PositionScorer {
    score: weight_score,
    level_floor: weight_level_floor,
};

/// Blend of low height, corner preference, heavy-low and priority near the door.
pub const BALANCED_SCORER: PositionScorer = PositionScorer {
    score: balanced_score,
    level_floor: balanced_level_floor,
};

/// Places items, in the given order, into one empty truck.
///
/// Deterministic: identical input yields identical placements.
///
/// # Parameters
/// * `items` - Items in packing order
/// * `truck` - The empty truck to fill
/// * `strategy` - Goal strategy providing the position scorer
/// * `config` - Grid and tolerance settings
pub fn pack_truck(
    items: &[CartonItem],
    truck: &TruckInstance,
    strategy: &GoalStrategy,
    config: &PackingConfig,
) -> TruckLoad {
    let truck_dims = truck.dimensions();
    let max_weight = truck.max_weight();
    let mut state = LoadState::default();
    let mut unfit = Vec::new();

    for item in items {
        let fitting: Vec<Orientation> = orientations(&item.spec)
            .into_iter()
            .filter(|o| fits(o, &truck_dims, config.general_epsilon))
            .collect();

        // Oversized and overweight items skip the grid search entirely
        if fitting.is_empty() {
            unfit.push(UnfitItem {
                item: item.clone(),
                reason: UnplacedReason::DimensionsExceedTruck,
            });
            continue;
        }
        if item.weight() > max_weight + config.general_epsilon {
            unfit.push(UnfitItem {
                item: item.clone(),
                reason: UnplacedReason::TooHeavyForTruck,
            });
            continue;
        }
        if state.total_weight + item.weight() > max_weight + config.general_epsilon {
            unfit.push(UnfitItem {
                item: item.clone(),
                reason: UnplacedReason::WeightLimitReached,
            });
            continue;
        }

        match find_position(item, &fitting, &state, truck_dims, max_weight, strategy, config) {
            Some(candidate) => state.commit(item, candidate, config),
            None => unfit.push(UnfitItem {
                item: item.clone(),
                reason: UnplacedReason::NoFreePosition,
            }),
        }
    }

    let truck_volume = truck.volume();
    let mut placed_volume: f64 = state.placed.iter().map(Dimensional::volume).sum();
    if placed_volume > truck_volume * (1.0 + config.general_epsilon) {
        log::warn!(
            "placed volume {:.1} exceeds volume {:.1} of truck {}; capping utilization",
            placed_volume,
            truck_volume,
            truck.id
        );
        placed_volume = truck_volume * 0.95;
    }
    let volume_utilization = utilization(placed_volume, truck_volume);
    let weight_utilization = utilization(state.total_weight, max_weight);

    log::debug!(
        "truck {}: placed {} of {} items, volume {:.3}, weight {:.3}",
        truck.id,
        state.placed.len(),
        items.len(),
        volume_utilization,
        weight_utilization
    );

    TruckLoad {
        truck: truck.clone(),
        placements: state.placed,
        unfit,
        volume_utilization,
        weight_utilization,
    }
}

/// Mutable state of one truck while it is being filled.
#[derive(Default)]
struct LoadState {
    placed: Vec<Placement>,
    bounds: Vec<BoundingBox>,
    total_weight: f64,
    /// Floor plus every top face, ascending and deduplicated.
    levels: Vec<f64>,
}

impl LoadState {
    fn resting_levels(&self) -> Vec<f64> {
        if self.levels.is_empty() {
            vec![0.0]
        } else {
            self.levels.clone()
        }
    }

    fn commit(&mut self, item: &CartonItem, candidate: Candidate, config: &PackingConfig) {
        let placement = Placement {
            item: item.clone(),
            orientation: candidate.orientation,
            position: candidate.position,
            stack_level: candidate.stack_level,
        };
        if self.levels.is_empty() {
            self.levels.push(0.0);
        }
        let top = placement.top_z();
        if !self
            .levels
            .iter()
            .any(|level| (level - top).abs() < config.height_epsilon)
        {
            self.levels.push(top);
            self.levels
                .sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        }
        self.total_weight += placement.weight();
        self.bounds.push(placement.bounding_box());
        self.placed.push(placement);
    }
}

#[derive(Clone, Copy)]
struct Candidate {
    orientation: Orientation,
    position: Vec3,
    stack_level: u32,
    score: PlacementScore,
}

/// Share of `capacity` taken by `used`; 0 for a degenerate capacity.
fn utilization(used: f64, capacity: f64) -> f64 {
    if capacity > 0.0 {
        (used / capacity).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Finds the best-scoring valid position for an item.
///
/// Scan order: resting level, orientation, y, x. Only a strictly better score
/// replaces the current best, so ties keep the earlier candidate.
fn find_position(
    item: &CartonItem,
    fitting: &[Orientation],
    state: &LoadState,
    truck_dims: Vec3,
    max_weight: f64,
    strategy: &GoalStrategy,
    config: &PackingConfig,
) -> Option<Candidate> {
    let scorer = strategy.scorer;
    let mut best: Option<Candidate> = None;

    let template = ScoreInput {
        position: Vec3::zero(),
        dims: Vec3::zero(),
        weight: item.weight(),
        priority: item.spec.priority,
        truck_dims,
        max_weight,
    };

    for z in state.resting_levels() {
        if let Some(current) = &best {
            if (scorer.level_floor)(z, &template) > current.score.value + config.general_epsilon {
                break;
            }
        }

        for orientation in fitting {
            let dims = orientation.dims;
            if z + dims.z > truck_dims.z + config.general_epsilon {
                continue;
            }
            let xs = axis_positions(truck_dims.x, dims.x, config.grid_step, config.general_epsilon);
            let ys = axis_positions(truck_dims.y, dims.y, config.grid_step, config.general_epsilon);

            for &y in &ys {
                let mut xi = 0;
                while xi < xs.len() {
                    let position = Vec3::new(xs[xi], y, z);
                    let candidate_box = BoundingBox::from_position_and_dims(position, dims);

                    // Every x before the blocker's far face collides with it too
                    if let Some(blocker) = state.bounds.iter().find(|b| b.intersects(&candidate_box)) {
                        let skip_to = blocker.max.x - config.general_epsilon;
                        xi += 1;
                        while xi < xs.len() && xs[xi] < skip_to {
                            xi += 1;
                        }
                        continue;
                    }
                    xi += 1;

                    let stack_level = if config.respect_stacking {
                        match stacking_level(item, &candidate_box, state, config) {
                            Some(level) => level,
                            None => continue,
                        }
                    } else {
                        column_level(&candidate_box, state, config)
                    };

                    let score = (scorer.score)(&ScoreInput {
                        position,
                        dims,
                        ..template
                    });
                    let candidate = Candidate {
                        orientation: *orientation,
                        position,
                        stack_level,
                        score,
                    };
                    update_best(&mut best, candidate, config);
                }
            }
        }
    }

    best
}

/// Generates grid positions along one axis, always including the far wall.
///
/// # Parameters
/// * `truck_len` - Inner length of the truck along this axis
/// * `item_len` - Item extent along this axis
/// * `step` - Grid step
/// * `epsilon` - Numerical tolerance
fn axis_positions(truck_len: f64, item_len: f64, step: f64, epsilon: f64) -> Vec<f64> {
    let max_pos = (truck_len - item_len).max(0.0);
    let mut positions = Vec::new();

    if max_pos <= epsilon || step <= 0.0 {
        positions.push(0.0);
        if max_pos > epsilon {
            positions.push(max_pos);
        }
        return positions;
    }

    let mut pos = 0.0;
    while pos <= max_pos + epsilon {
        positions.push(pos.min(max_pos));
        pos += step;
    }

    if let Some(&last) = positions.last() {
        if (last - max_pos).abs() > epsilon {
            positions.push(max_pos);
        }
    }

    positions.dedup_by(|a, b| (*a - *b).abs() < epsilon);
    positions
}

/// Placements whose top face carries the candidate's bottom face.
fn supports<'a>(
    candidate: &'a BoundingBox,
    state: &'a LoadState,
    config: &'a PackingConfig,
) -> impl Iterator<Item = &'a Placement> + 'a {
    state
        .placed
        .iter()
        .zip(state.bounds.iter())
        .filter(move |(_, b)| {
            (b.top_z() - candidate.min.z).abs() < config.height_epsilon
                && overlap_1d(candidate.min.x, candidate.max.x, b.min.x, b.max.x) > 0.0
                && overlap_1d(candidate.min.y, candidate.max.y, b.min.y, b.max.y) > 0.0
        })
        .map(|(p, _)| p)
}

/// Column level of a candidate without enforcing any rule.
fn column_level(candidate: &BoundingBox, state: &LoadState, config: &PackingConfig) -> u32 {
    if candidate.min.z <= config.height_epsilon {
        return 1;
    }
    supports(candidate, state, config)
        .map(|p| p.stack_level + 1)
        .max()
        .unwrap_or(1)
}

/// Checks stacking rules and returns the resulting column level.
///
/// Above the floor the item must rest on at least one placement; no support may
/// be non-stackable, fragile and lighter than the item, or already at its
/// column limit.
fn stacking_level(
    item: &CartonItem,
    candidate: &BoundingBox,
    state: &LoadState,
    config: &PackingConfig,
) -> Option<u32> {
    if candidate.min.z <= config.height_epsilon {
        return Some(1);
    }

    let mut level = 0;
    for support in supports(candidate, state, config) {
        let spec = &support.item.spec;
        if !spec.stackable {
            return None;
        }
        if spec.fragile && spec.weight + config.general_epsilon < item.weight() {
            return None;
        }
        let new_level = support.stack_level + 1;
        if spec.max_stack_height > 0 && new_level > spec.max_stack_height {
            return None;
        }
        level = level.max(new_level);
    }

    if level == 0 {
        return None;
    }
    let own_limit = item.spec.max_stack_height;
    if own_limit > 0 && level > own_limit {
        return None;
    }
    Some(level)
}

/// Replaces the best candidate when the new one scores strictly better.
fn update_best(best: &mut Option<Candidate>, candidate: Candidate, config: &PackingConfig) {
    match best {
        None => *best = Some(candidate),
        Some(current) => {
            if is_better_score(candidate.score, current.score, config) {
                *best = Some(candidate);
            }
        }
    }
}

fn is_better_score(new: PlacementScore, current: PlacementScore, config: &PackingConfig) -> bool {
    match compare_with_epsilon(new.value, current.value, config.general_epsilon) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }
    compare_with_epsilon(new.tie, current.tie, config.general_epsilon) == Ordering::Less
}

/// Compares two values with a tolerance.
fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::{CartonSpec, TruckTypeSpec};
    use crate::ordering::{OptimizationGoal, ordered_items};

    fn truck(dims: (f64, f64, f64), max_weight: f64) -> TruckInstance {
        let spec = TruckTypeSpec::new("t", dims, max_weight).unwrap();
        TruckInstance::new(Arc::new(spec), 1, 0)
    }

    fn cube(id: &str, side: f64, weight: f64, quantity: u32) -> CartonSpec {
        CartonSpec::new(id, (side, side, side), weight, quantity).unwrap()
    }

    fn pack(cartons: &[CartonSpec], truck: &TruckInstance, goal: OptimizationGoal) -> TruckLoad {
        let items = ordered_items(cartons, goal);
        pack_truck(&items, truck, &goal.strategy(), &PackingConfig::default())
    }

    fn assert_valid_load(load: &TruckLoad, requested: usize) {
        let dims = load.truck.dimensions();
        let eps = PackingConfig::DEFAULT_GENERAL_EPSILON;
        for (i, a) in load.placements.iter().enumerate() {
            let far = a.position + a.orientation.dims;
            assert!(a.position.x >= -eps && a.position.y >= -eps && a.position.z >= -eps);
            assert!(far.fits_within(&dims, eps), "placement out of bounds: {:?}", a.position);
            for b in &load.placements[i + 1..] {
                assert!(
                    !a.bounding_box().intersects(&b.bounding_box()),
                    "items {} and {} overlap",
                    a.item.instance_id,
                    b.item.instance_id
                );
            }
        }
        assert!(load.placed_weight() <= load.truck.max_weight() + eps);
        assert!((0.0..=1.0).contains(&load.volume_utilization));
        assert!((0.0..=1.0).contains(&load.weight_utilization));
        assert_eq!(load.placements.len() + load.unfit.len(), requested);
    }

    #[test]
    fn ten_cubes_fill_floor_of_large_truck() {
        let load = pack(
            &[cube("c", 50.0, 20.0, 10)],
            &truck((400.0, 200.0, 200.0), 5000.0),
            OptimizationGoal::Space,
        );

        assert_valid_load(&load, 10);
        assert_eq!(load.placements.len(), 10);
        assert!(load.unfit.is_empty());
        assert!((load.weight_utilization - 0.04).abs() < 1e-12);
        assert!((load.volume_utilization - 1_250_000.0 / 16_000_000.0).abs() < 1e-12);
        assert!(load.placements.iter().all(|p| p.position.z == 0.0));
    }

    #[test]
    fn overlong_carton_is_unfit() {
        let long = CartonSpec::new("long", (500.0, 50.0, 50.0), 10.0, 1).unwrap();
        let load = pack(&[long], &truck((400.0, 200.0, 200.0), 5000.0), OptimizationGoal::Space);

        assert!(load.placements.is_empty());
        assert_eq!(load.unfit.len(), 1);
        assert_eq!(load.unfit[0].reason, UnplacedReason::DimensionsExceedTruck);
        assert_eq!(load.volume_utilization, 0.0);
    }

    #[test]
    fn single_box_snaps_to_corner() {
        let load = pack(&[cube("c", 10.0, 1.0, 1)], &truck((20.0, 20.0, 20.0), 100.0), OptimizationGoal::Space);
        assert_eq!(load.placements[0].position, Vec3::zero());
    }

    #[test]
    fn weight_limit_stops_loading() {
        let load = pack(
            &[cube("c", 10.0, 300.0, 3)],
            &truck((100.0, 100.0, 100.0), 700.0),
            OptimizationGoal::Balanced,
        );
        assert_valid_load(&load, 3);
        assert_eq!(load.placements.len(), 2);
        assert_eq!(load.unfit[0].reason, UnplacedReason::WeightLimitReached);
    }

    #[test]
    fn item_heavier_than_truck_is_rejected_up_front() {
        let load = pack(&[cube("c", 5.0, 25.0, 1)], &truck((10.0, 10.0, 10.0), 10.0), OptimizationGoal::Weight);
        assert_eq!(load.unfit[0].reason, UnplacedReason::TooHeavyForTruck);
    }

    #[test]
    fn weightless_truck_reports_zero_utilization() {
        let mut spec = TruckTypeSpec::new("t", (10.0, 10.0, 10.0), 10.0).unwrap();
        spec.max_weight = 0.0;
        let truck = TruckInstance::new(Arc::new(spec), 1, 0);
        let load = pack(&[cube("c", 5.0, 1.0, 2)], &truck, OptimizationGoal::Balanced);

        assert_valid_load(&load, 2);
        assert!(load.placements.is_empty());
        assert_eq!(load.unfit[0].reason, UnplacedReason::TooHeavyForTruck);
        assert_eq!(load.volume_utilization, 0.0);
        assert_eq!(load.weight_utilization, 0.0);
    }

    #[test]
    fn full_truck_reports_no_free_position() {
        let load = pack(&[cube("c", 10.0, 1.0, 9)], &truck((20.0, 20.0, 20.0), 100.0), OptimizationGoal::Space);
        assert_valid_load(&load, 9);
        assert_eq!(load.placements.len(), 8);
        assert_eq!(load.unfit[0].reason, UnplacedReason::NoFreePosition);
        assert!((load.volume_utilization - 1.0).abs() < 1e-12);
    }

    #[test]
    fn mixed_cargo_never_overlaps() {
        let cartons = vec![
            CartonSpec::new("a", (60.0, 40.0, 30.0), 25.0, 12).unwrap(),
            CartonSpec::new("b", (35.0, 35.0, 35.0), 15.0, 10).unwrap().with_priority(5),
            CartonSpec::new("c", (120.0, 20.0, 20.0), 8.0, 6).unwrap().with_rotation(false),
            CartonSpec::new("d", (45.0, 30.0, 25.0), 40.0, 8).unwrap().with_value(300.0),
        ];
        let t = truck((240.0, 120.0, 120.0), 900.0);
        for goal in OptimizationGoal::ALL {
            let load = pack(&cartons, &t, goal);
            assert_valid_load(&load, 36);
            assert!(!load.placements.is_empty(), "goal {} placed nothing", goal);
        }
    }

    #[test]
    fn packing_is_deterministic() {
        let cartons = vec![
            CartonSpec::new("a", (60.0, 40.0, 30.0), 25.0, 10).unwrap(),
            CartonSpec::new("b", (35.0, 25.0, 15.0), 5.0, 15).unwrap(),
        ];
        let t = truck((200.0, 100.0, 100.0), 1000.0);
        let first = pack(&cartons, &t, OptimizationGoal::Balanced);
        let second = pack(&cartons, &t, OptimizationGoal::Balanced);

        let layout = |load: &TruckLoad| -> Vec<(usize, u8, Vec3)> {
            load.placements
                .iter()
                .map(|p| (p.item.instance_id, p.orientation.index, p.position))
                .collect()
        };
        assert_eq!(layout(&first), layout(&second));
    }

    #[test]
    fn rotation_is_used_when_needed() {
        let tall = CartonSpec::new("tall", (40.0, 40.0, 90.0), 5.0, 1).unwrap();
        let load = pack(&[tall], &truck((100.0, 50.0, 50.0), 100.0), OptimizationGoal::Space);
        assert_eq!(load.placements.len(), 1);
        assert_eq!(load.placements[0].orientation.dims.x, 90.0);
    }

    #[test]
    fn fixed_orientation_blocks_rotation() {
        let tall = CartonSpec::new("tall", (40.0, 40.0, 90.0), 5.0, 1)
            .unwrap()
            .with_rotation(false);
        let load = pack(&[tall], &truck((100.0, 50.0, 50.0), 100.0), OptimizationGoal::Space);
        assert_eq!(load.unfit[0].reason, UnplacedReason::DimensionsExceedTruck);
    }

    #[test]
    fn nothing_lands_on_non_stackable_cartons() {
        let cartons = vec![
            cube("flat", 10.0, 5.0, 1).with_stacking(false, 0),
            cube("other", 10.0, 1.0, 1),
        ];
        let load = pack(&cartons, &truck((10.0, 10.0, 30.0), 100.0), OptimizationGoal::Space);
        assert_eq!(load.placements.len(), 1);
        assert_eq!(load.unfit[0].item.carton_id(), "other");
    }

    #[test]
    fn heavier_items_do_not_rest_on_fragile_ones() {
        let cartons = vec![
            cube("glass", 10.0, 2.0, 1).with_fragile(true).with_priority(5),
            cube("brick", 10.0, 9.0, 1),
            cube("feather", 10.0, 1.0, 1),
        ];
        let load = pack(&cartons, &truck((10.0, 10.0, 30.0), 100.0), OptimizationGoal::Balanced);
        let ids: Vec<&str> = load.placements.iter().map(|p| p.item.carton_id()).collect();
        assert_eq!(ids, vec!["glass", "feather"]);
        assert_eq!(load.unfit[0].item.carton_id(), "brick");
    }

    #[test]
    fn column_height_is_limited() {
        let load = pack(
            &[cube("c", 10.0, 1.0, 4).with_stacking(true, 2)],
            &truck((10.0, 10.0, 40.0), 100.0),
            OptimizationGoal::Space,
        );
        assert_eq!(load.placements.len(), 2);
        assert_eq!(load.placements[1].stack_level, 2);
        assert_eq!(load.unfit.len(), 2);
    }

    #[test]
    fn stacking_rules_can_be_disabled() {
        let cartons = vec![cube("flat", 10.0, 5.0, 2).with_stacking(false, 0)];
        let config = PackingConfig::builder().respect_stacking(false).build();
        let items = ordered_items(&cartons, OptimizationGoal::Space);
        let load = pack_truck(
            &items,
            &truck((10.0, 10.0, 30.0), 100.0),
            &OptimizationGoal::Space.strategy(),
            &config,
        );
        assert_eq!(load.placements.len(), 2);
    }

    #[test]
    fn weight_goal_keeps_heavy_items_low() {
        let cartons = vec![cube("heavy", 10.0, 50.0, 4), cube("light", 10.0, 1.0, 4)];
        let load = pack(&cartons, &truck((20.0, 20.0, 20.0), 1000.0), OptimizationGoal::Weight);
        assert_valid_load(&load, 8);
        for p in &load.placements {
            if p.item.carton_id() == "heavy" {
                assert_eq!(p.position.z, 0.0);
            } else {
                assert_eq!(p.position.z, 10.0);
            }
        }
    }

    #[test]
    fn axis_positions_include_far_wall() {
        let positions = axis_positions(23.0, 10.0, 5.0, 1e-6);
        assert_eq!(positions, vec![0.0, 5.0, 10.0, 13.0]);
        assert_eq!(axis_positions(10.0, 10.0, 5.0, 1e-6), vec![0.0]);
    }

    #[test]
    fn balanced_scorer_pulls_priority_items_to_the_door() {
        let input = ScoreInput {
            position: Vec3::zero(),
            dims: Vec3::new(10.0, 10.0, 10.0),
            weight: 1.0,
            priority: 5,
            truck_dims: Vec3::new(100.0, 10.0, 10.0),
            max_weight: 100.0,
        };
        let back = (BALANCED_SCORER.score)(&input);
        let door = (BALANCED_SCORER.score)(&ScoreInput {
            position: Vec3::new(90.0, 0.0, 0.0),
            ..input
        });
        let low_priority_door = (BALANCED_SCORER.score)(&ScoreInput {
            position: Vec3::new(90.0, 0.0, 0.0),
            priority: 1,
            ..input
        });
        assert!(door.value < low_priority_door.value);
        assert!(back.value < low_priority_door.value);
        assert!((BALANCED_SCORER.level_floor)(0.0, &input) <= door.value);
    }
}
