//! Request-scoped search state shared by the recommendation and consolidation
//! searches: a memo of packing evaluations plus an evaluation and time budget.
//!
//! A context lives for exactly one public call and is dropped with it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::config::OptimizerConfig;
use crate::cost::{CostBreakdown, compute_cost};
use crate::model::{CartonSpec, RouteInfo, TruckTypeSpec};
use crate::ordering::{OptimizationGoal, ordered_items};
use crate::packer::{TruckAllocation, build_pool, pack_items};

/// Limits and knobs of the outer searches.
#[derive(Clone, Debug, PartialEq)]
pub struct SearchConfig {
    /// Truck types evaluated by the recommendation search after ordering.
    pub candidate_types: usize,
    /// Upper bound of the quantity range tried per truck type.
    pub max_quantity_per_type: usize,
    /// Number of recommendations returned.
    pub max_recommendations: usize,
    /// Types whose volume and weight capacity are both below this share of the
    /// cargo totals are skipped.
    pub min_capacity_share: f64,
    /// Reference cost of shipping one order alone, used for reported savings.
    pub baseline_cost_per_order: f64,
    /// Largest order group tested together by the consolidation search.
    pub max_group_size: usize,
    /// Packing evaluations allowed per call (memo hits are free).
    pub max_evaluations: usize,
    /// Optional wall-clock budget per call.
    pub time_budget: Option<Duration>,
}

impl SearchConfig {
    pub const DEFAULT_CANDIDATE_TYPES: usize = 5;
    pub const DEFAULT_MAX_QUANTITY_PER_TYPE: usize = 3;
    pub const DEFAULT_MAX_RECOMMENDATIONS: usize = 5;
    pub const DEFAULT_MIN_CAPACITY_SHARE: f64 = 0.2;
    pub const DEFAULT_BASELINE_COST_PER_ORDER: f64 = 5000.0;
    pub const DEFAULT_MAX_GROUP_SIZE: usize = 3;
    pub const DEFAULT_MAX_EVALUATIONS: usize = 2000;

    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::default()
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            candidate_types: Self::DEFAULT_CANDIDATE_TYPES,
            max_quantity_per_type: Self::DEFAULT_MAX_QUANTITY_PER_TYPE,
            max_recommendations: Self::DEFAULT_MAX_RECOMMENDATIONS,
            min_capacity_share: Self::DEFAULT_MIN_CAPACITY_SHARE,
            baseline_cost_per_order: Self::DEFAULT_BASELINE_COST_PER_ORDER,
            max_group_size: Self::DEFAULT_MAX_GROUP_SIZE,
            max_evaluations: Self::DEFAULT_MAX_EVALUATIONS,
            time_budget: None,
        }
    }
}

/// Builder for [`SearchConfig`].
#[derive(Clone, Debug, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn candidate_types(mut self, count: usize) -> Self {
        self.config.candidate_types = count.max(1);
        self
    }

    pub fn max_quantity_per_type(mut self, quantity: usize) -> Self {
        self.config.max_quantity_per_type = quantity.max(1);
        self
    }

    pub fn max_recommendations(mut self, count: usize) -> Self {
        self.config.max_recommendations = count;
        self
    }

    pub fn min_capacity_share(mut self, share: f64) -> Self {
        self.config.min_capacity_share = share;
        self
    }

    pub fn baseline_cost_per_order(mut self, cost: f64) -> Self {
        self.config.baseline_cost_per_order = cost;
        self
    }

    pub fn max_group_size(mut self, size: usize) -> Self {
        self.config.max_group_size = size.max(1);
        self
    }

    pub fn max_evaluations(mut self, evaluations: usize) -> Self {
        self.config.max_evaluations = evaluations;
        self
    }

    pub fn time_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.time_budget = budget;
        self
    }

    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// What the searches need to know about one packing run.
#[derive(Clone, Debug, PartialEq)]
pub struct PackingSummary {
    pub total_items: usize,
    pub placed_items: usize,
    pub unfit_items: usize,
    /// Trucks that took at least one item.
    pub trucks_used: usize,
    pub placed_volume: f64,
    pub placed_weight: f64,
    /// Mean over the used trucks.
    pub volume_utilization: f64,
    /// Mean over the used trucks.
    pub weight_utilization: f64,
    /// Cost of the used trucks.
    pub fleet_cost: CostBreakdown,
    /// Cost of a single truck of the evaluated type.
    pub unit_cost: CostBreakdown,
}

impl PackingSummary {
    pub fn fits_completely(&self) -> bool {
        self.unfit_items == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_items == 0 {
            return 1.0;
        }
        self.placed_items as f64 / self.total_items as f64
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct EvaluationKey {
    cargo: String,
    truck_type: String,
    quantity: usize,
    goal: OptimizationGoal,
}

/// Memo and budget guard for one search call.
pub struct SearchContext<'a> {
    config: &'a OptimizerConfig,
    route: &'a RouteInfo,
    memo: FxHashMap<EvaluationKey, Arc<PackingSummary>>,
    evaluations: usize,
    deadline: Option<Instant>,
    truncated: bool,
}

impl<'a> SearchContext<'a> {
    pub fn new(config: &'a OptimizerConfig, route: &'a RouteInfo) -> Self {
        Self {
            config,
            route,
            memo: FxHashMap::default(),
            evaluations: 0,
            deadline: config.search.time_budget.map(|budget| Instant::now() + budget),
            truncated: false,
        }
    }

    /// Packing runs actually performed (memo hits excluded).
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }

    /// True once the evaluation cap or the deadline stopped an evaluation.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Packs `cartons` into `quantity` units of `truck`.
    ///
    /// `cargo_key` identifies the carton set inside this call (e.g. sorted order
    /// ids); identical keys must describe identical cartons. Returns `None` when
    /// the budget is exhausted and the result is not memoized yet.
    pub fn evaluate(
        &mut self,
        cargo_key: &str,
        cartons: &[CartonSpec],
        truck: &TruckTypeSpec,
        quantity: usize,
        goal: OptimizationGoal,
    ) -> Option<Arc<PackingSummary>> {
        let key = EvaluationKey {
            cargo: cargo_key.to_string(),
            truck_type: truck.id.clone(),
            quantity,
            goal,
        };
        if let Some(summary) = self.memo.get(&key) {
            return Some(Arc::clone(summary));
        }
        if self.budget_exhausted() {
            return None;
        }
        Some(self.run_and_remember(key, cartons, truck, quantity, goal))
    }

    /// Like [`SearchContext::evaluate`], but ignores the budget.
    ///
    /// Reserved for fallback allocations that must exist even after the
    /// search was truncated.
    pub fn evaluate_unbounded(
        &mut self,
        cargo_key: &str,
        cartons: &[CartonSpec],
        truck: &TruckTypeSpec,
        quantity: usize,
        goal: OptimizationGoal,
    ) -> Arc<PackingSummary> {
        let key = EvaluationKey {
            cargo: cargo_key.to_string(),
            truck_type: truck.id.clone(),
            quantity,
            goal,
        };
        if let Some(summary) = self.memo.get(&key) {
            return Arc::clone(summary);
        }
        self.run_and_remember(key, cartons, truck, quantity, goal)
    }

    fn run_and_remember(
        &mut self,
        key: EvaluationKey,
        cartons: &[CartonSpec],
        truck: &TruckTypeSpec,
        quantity: usize,
        goal: OptimizationGoal,
    ) -> Arc<PackingSummary> {
        self.evaluations += 1;
        let summary = Arc::new(self.run(cartons, truck, quantity, goal));
        self.memo.insert(key, Arc::clone(&summary));
        summary
    }

    fn budget_exhausted(&mut self) -> bool {
        if self.truncated {
            return true;
        }
        let over_cap = self.evaluations >= self.config.search.max_evaluations;
        let over_time = self.deadline.is_some_and(|deadline| Instant::now() >= deadline);
        if over_cap || over_time {
            self.truncated = true;
            log::warn!(
                "search budget exhausted after {} evaluations ({}), returning best found so far",
                self.evaluations,
                if over_cap { "evaluation cap" } else { "time budget" }
            );
        }
        self.truncated
    }

    fn run(
        &self,
        cartons: &[CartonSpec],
        truck: &TruckTypeSpec,
        quantity: usize,
        goal: OptimizationGoal,
    ) -> PackingSummary {
        let strategy = goal.strategy();
        let items = ordered_items(cartons, goal);
        let pool = build_pool(&[TruckAllocation::new(truck.clone(), quantity)], &strategy);
        let packing = pack_items(items, pool, &strategy, self.route, self.config, |_| {});

        PackingSummary {
            total_items: packing.placed_count() + packing.unfit.len(),
            placed_items: packing.placed_count(),
            unfit_items: packing.unfit.len(),
            trucks_used: packing.truck_count(),
            placed_volume: packing.placed_volume(),
            placed_weight: packing.placed_weight(),
            volume_utilization: packing.average_volume_utilization(),
            weight_utilization: packing.average_weight_utilization(),
            fleet_cost: packing.total_cost(),
            unit_cost: compute_cost(truck, self.route, &self.config.cost),
        }
    }
}
