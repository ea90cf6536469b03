//! Multi-truck packing driver.
//!
//! Runs the placement engine over a pool of truck instances until every item is
//! loaded or the pool is exhausted. Small inputs are processed one truck at a
//! time; above the configured item threshold trucks are packed in parallel
//! batches and only the best result of each batch is kept.

use std::cmp::Ordering;
use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::cost::{CostBreakdown, compute_cost};
use crate::error::{IssueCollector, Result};
use crate::model::{CartonItem, CartonSpec, RouteInfo, TruckInstance, TruckTypeSpec, validate_request};
use crate::ordering::{GoalStrategy, OptimizationGoal, ordered_items};
use crate::placement::{Placement, TruckLoad, UnfitItem, UnplacedReason, pack_truck};
use crate::types::{Dimensional, Weighted};

/// Requested number of units of one truck type.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TruckAllocation {
    pub truck: TruckTypeSpec,
    pub quantity: usize,
}

impl TruckAllocation {
    pub fn new(truck: TruckTypeSpec, quantity: usize) -> Self {
        Self { truck, quantity }
    }
}

/// How the driver walked the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingMode {
    Sequential,
    Parallel,
}

/// Loaded truck with its trip cost.
#[derive(Clone, Debug, Serialize)]
pub struct PackingResult {
    pub truck: TruckInstance,
    pub placements: Vec<Placement>,
    /// Items offered to this truck that it could not take.
    pub unfit: Vec<UnfitItem>,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub cost: CostBreakdown,
}

impl PackingResult {
    fn priced(load: TruckLoad, cost: CostBreakdown) -> Self {
        Self {
            truck: load.truck,
            placements: load.placements,
            unfit: load.unfit,
            volume_utilization: load.volume_utilization,
            weight_utilization: load.weight_utilization,
            cost,
        }
    }

    pub fn placed_volume(&self) -> f64 {
        self.placements.iter().map(Dimensional::volume).sum()
    }

    pub fn placed_weight(&self) -> f64 {
        self.placements.iter().map(Weighted::weight).sum()
    }

    /// Number of items offered to this truck.
    pub fn requested_count(&self) -> usize {
        self.placements.len() + self.unfit.len()
    }
}

/// Outcome of a multi-truck packing run.
#[derive(Clone, Debug, Serialize)]
pub struct FleetPacking {
    /// One entry per truck that took at least one item, in commit order.
    pub results: Vec<PackingResult>,
    /// Items left over once the pool was exhausted.
    pub unfit: Vec<UnfitItem>,
    pub mode: PackingMode,
}

impl FleetPacking {
    pub fn is_complete(&self) -> bool {
        self.unfit.is_empty()
    }

    pub fn truck_count(&self) -> usize {
        self.results.len()
    }

    pub fn placed_count(&self) -> usize {
        self.results.iter().map(|r| r.placements.len()).sum()
    }

    pub fn placed_volume(&self) -> f64 {
        self.results.iter().map(PackingResult::placed_volume).sum()
    }

    pub fn placed_weight(&self) -> f64 {
        self.results.iter().map(PackingResult::placed_weight).sum()
    }

    /// Summed cost of all loaded trucks.
    pub fn total_cost(&self) -> CostBreakdown {
        let mut total = CostBreakdown::default();
        for result in &self.results {
            total.accumulate(&result.cost);
        }
        total
    }

    pub fn average_volume_utilization(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.volume_utilization).sum::<f64>() / self.results.len() as f64
    }

    pub fn average_weight_utilization(&self) -> f64 {
        if self.results.is_empty() {
            return 0.0;
        }
        self.results.iter().map(|r| r.weight_utilization).sum::<f64>() / self.results.len() as f64
    }
}

/// Events reported while packing, e.g. for live progress displays.
///
/// Always emitted on the calling thread.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum FleetEvent {
    /// A truck is about to be packed (sequential mode).
    TruckStarted {
        truck_id: String,
        pool_index: usize,
        remaining_items: usize,
    },
    /// A truck's load was committed.
    TruckLoaded {
        truck_id: String,
        placed: usize,
        unfit: usize,
        volume_utilization: f64,
        weight_utilization: f64,
    },
    /// A parallel batch finished; `committed` is the kept truck, if any.
    BatchCommitted {
        batch: usize,
        trucks: Vec<String>,
        committed: Option<String>,
    },
    /// Items left once the pool was exhausted.
    ItemsUnfit { count: usize },
    /// Packing finished.
    Finished { trucks: usize, placed: usize, unfit: usize },
}

/// Packs cartons into the given truck pool with the default configuration.
///
/// # Parameters
/// * `cartons` - Carton templates, expanded by their quantities
/// * `pool` - Truck types and how many units of each may be used
/// * `goal` - Optimization goal driving item order, scoring and pool order
/// * `route` - Route used to price every loaded truck
pub fn pack_fleet(
    cartons: &[CartonSpec],
    pool: &[TruckAllocation],
    goal: OptimizationGoal,
    route: &RouteInfo,
) -> Result<FleetPacking> {
    pack_fleet_with_config(cartons, pool, goal, route, &OptimizerConfig::default())
}

/// Like [`pack_fleet`], with a custom configuration.
pub fn pack_fleet_with_config(
    cartons: &[CartonSpec],
    pool: &[TruckAllocation],
    goal: OptimizationGoal,
    route: &RouteInfo,
    config: &OptimizerConfig,
) -> Result<FleetPacking> {
    pack_fleet_with_progress(cartons, pool, goal, route, config, |_| {})
}

/// Like [`pack_fleet_with_config`], reporting progress through a callback.
pub fn pack_fleet_with_progress(
    cartons: &[CartonSpec],
    pool: &[TruckAllocation],
    goal: OptimizationGoal,
    route: &RouteInfo,
    config: &OptimizerConfig,
    on_event: impl FnMut(&FleetEvent),
) -> Result<FleetPacking> {
    config.validate()?;
    let trucks: Vec<TruckTypeSpec> = pool.iter().map(|a| a.truck.clone()).collect();
    let mut collector = IssueCollector::new();
    if let Err(err) = validate_request(cartons, &trucks, route) {
        collector.extend(err.issues().to_vec());
    }
    for (idx, allocation) in pool.iter().enumerate() {
        if allocation.quantity == 0 {
            collector.push(format!("pool[{}].quantity", idx), "quantity must be at least 1");
        }
    }
    collector.finish()?;

    let strategy = goal.strategy();
    let items = ordered_items(cartons, goal);
    let instances = build_pool(pool, &strategy);
    Ok(pack_items(items, instances, &strategy, route, config, on_event))
}

/// Materializes truck instances, ordered for the goal.
///
/// The sort is stable, so equal types keep their allocation order.
pub fn build_pool(pool: &[TruckAllocation], strategy: &GoalStrategy) -> Vec<TruckInstance> {
    let mut allocations: Vec<&TruckAllocation> = pool.iter().collect();
    let compare = strategy.compare_trucks;
    allocations.sort_by(|a, b| compare(&a.truck, &b.truck));

    let mut instances = Vec::with_capacity(allocations.iter().map(|a| a.quantity).sum());
    for allocation in allocations {
        let spec = Arc::new(allocation.truck.clone());
        for ordinal in 1..=allocation.quantity {
            let pool_index = instances.len();
            instances.push(TruckInstance::new(Arc::clone(&spec), ordinal, pool_index));
        }
    }
    instances
}

/// Runs the driver on already ordered items and a built pool.
pub(crate) fn pack_items(
    items: Vec<CartonItem>,
    pool: Vec<TruckInstance>,
    strategy: &GoalStrategy,
    route: &RouteInfo,
    config: &OptimizerConfig,
    mut on_event: impl FnMut(&FleetEvent),
) -> FleetPacking {
    let parallel = items.len() > config.packing.parallel_threshold && pool.len() > 1;
    let (results, remaining, mode) = if parallel {
        let (results, remaining) = pack_parallel(items, &pool, strategy, route, config, &mut on_event);
        (results, remaining, PackingMode::Parallel)
    } else {
        let (results, remaining) = pack_sequential(items, &pool, strategy, route, config, &mut on_event);
        (results, remaining, PackingMode::Sequential)
    };

    let unfit: Vec<UnfitItem> = remaining
        .into_iter()
        .map(|item| {
            let reason = determine_unfit_reason_across_pool(&pool, &item, config);
            UnfitItem { item, reason }
        })
        .collect();
    if !unfit.is_empty() {
        on_event(&FleetEvent::ItemsUnfit { count: unfit.len() });
    }

    let packing = FleetPacking {
        results,
        unfit,
        mode,
    };
    on_event(&FleetEvent::Finished {
        trucks: packing.truck_count(),
        placed: packing.placed_count(),
        unfit: packing.unfit.len(),
    });
    log::debug!(
        "{:?} packing finished: {} trucks, {} placed, {} unfit",
        packing.mode,
        packing.truck_count(),
        packing.placed_count(),
        packing.unfit.len()
    );
    packing
}

fn pack_sequential(
    mut remaining: Vec<CartonItem>,
    pool: &[TruckInstance],
    strategy: &GoalStrategy,
    route: &RouteInfo,
    config: &OptimizerConfig,
    on_event: &mut impl FnMut(&FleetEvent),
) -> (Vec<PackingResult>, Vec<CartonItem>) {
    let mut results = Vec::new();
    for truck in pool {
        if remaining.is_empty() {
            break;
        }
        on_event(&FleetEvent::TruckStarted {
            truck_id: truck.id.clone(),
            pool_index: truck.pool_index,
            remaining_items: remaining.len(),
        });
        let load = pack_truck(&remaining, truck, strategy, &config.packing);
        if load.placements.is_empty() {
            continue;
        }
        remaining = commit(load, route, config, &mut results, on_event);
    }
    (results, remaining)
}

fn pack_parallel(
    mut remaining: Vec<CartonItem>,
    pool: &[TruckInstance],
    strategy: &GoalStrategy,
    route: &RouteInfo,
    config: &OptimizerConfig,
    on_event: &mut impl FnMut(&FleetEvent),
) -> (Vec<PackingResult>, Vec<CartonItem>) {
    let workers = config.packing.worker_count.max(1);
    let thread_pool = build_thread_pool(workers);
    let mut results = Vec::new();

    for (batch_index, batch) in pool.chunks(workers).enumerate() {
        if remaining.is_empty() {
            break;
        }

        // every worker reads the same snapshot; nothing is shared mutably
        let snapshot = &remaining;
        let run = || -> Vec<TruckLoad> {
            batch
                .par_iter()
                .map(|truck| pack_truck(snapshot, truck, strategy, &config.packing))
                .collect()
        };
        let loads = match &thread_pool {
            Some(threads) => threads.install(run),
            None => batch
                .iter()
                .map(|truck| pack_truck(snapshot, truck, strategy, &config.packing))
                .collect(),
        };

        let trucks = batch.iter().map(|t| t.id.clone()).collect();
        let best = select_best_of_batch(loads);
        on_event(&FleetEvent::BatchCommitted {
            batch: batch_index,
            trucks,
            committed: best.as_ref().map(|load| load.truck.id.clone()),
        });

        if let Some(load) = best {
            remaining = commit(load, route, config, &mut results, on_event);
        }
    }
    (results, remaining)
}

fn build_thread_pool(workers: usize) -> Option<ThreadPool> {
    match ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => Some(pool),
        Err(err) => {
            log::warn!(
                "cannot build a thread pool with {} workers ({}), packing batches on the calling thread",
                workers,
                err
            );
            None
        }
    }
}

/// Keeps the batch result with the highest volume utilization.
///
/// Ties go to the lower pool index; results that placed nothing are dropped.
fn select_best_of_batch(loads: Vec<TruckLoad>) -> Option<TruckLoad> {
    loads
        .into_iter()
        .filter(|load| !load.placements.is_empty())
        .max_by(|a, b| {
            a.volume_utilization
                .partial_cmp(&b.volume_utilization)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.truck.pool_index.cmp(&a.truck.pool_index))
        })
}

/// Records a load and returns the items it could not take.
fn commit(
    load: TruckLoad,
    route: &RouteInfo,
    config: &OptimizerConfig,
    results: &mut Vec<PackingResult>,
    on_event: &mut impl FnMut(&FleetEvent),
) -> Vec<CartonItem> {
    on_event(&FleetEvent::TruckLoaded {
        truck_id: load.truck.id.clone(),
        placed: load.placements.len(),
        unfit: load.unfit.len(),
        volume_utilization: load.volume_utilization,
        weight_utilization: load.weight_utilization,
    });
    let remaining = load.unfit.iter().map(|u| u.item.clone()).collect();
    let cost = compute_cost(&load.truck.spec, route, &config.cost);
    results.push(PackingResult::priced(load, cost));
    remaining
}

fn determine_unfit_reason_across_pool(
    pool: &[TruckInstance],
    item: &CartonItem,
    config: &OptimizerConfig,
) -> UnplacedReason {
    let eps = config.packing.general_epsilon;
    if pool.is_empty() {
        return UnplacedReason::DimensionsExceedTruck;
    }
    if pool.iter().all(|t| item.weight() > t.max_weight() + eps) {
        return UnplacedReason::TooHeavyForTruck;
    }
    if pool.iter().all(|t| !t.spec.can_carry(&item.spec, eps)) {
        return UnplacedReason::DimensionsExceedTruck;
    }
    UnplacedReason::NoFreePosition
}
