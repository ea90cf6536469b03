//! Multi-order consolidation.
//!
//! Orders are partitioned by destination and never merged across partitions.
//! Inside a partition three kinds of plans compete:
//! - `SingleTruck`: every order in one truck, smallest fitting type
//! - `MultiTruck`: orders grouped greedily, each group in its cheapest truck
//! - `Individual`: every order in its own cheapest truck (always available)

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::OptimizerConfig;
use crate::cost::CostBreakdown;
use crate::error::{EngineError, FieldIssue, IssueCollector, Result};
use crate::model::{CartonSpec, Order, RouteInfo, TruckTypeSpec, ValidationError, validate_orders};
use crate::ordering::OptimizationGoal;
use crate::search::{PackingSummary, SearchContext};
use crate::types::{Dimensional, EPSILON_GENERAL};

/// What the consolidation optimizer selects plans by.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationObjective {
    CostSaving,
    SpaceUtilization,
    #[default]
    Balanced,
}

impl ConsolidationObjective {
    pub fn code(&self) -> &'static str {
        match self {
            ConsolidationObjective::CostSaving => "cost_saving",
            ConsolidationObjective::SpaceUtilization => "space_utilization",
            ConsolidationObjective::Balanced => "balanced",
        }
    }

    /// Goal used when packing candidate groups.
    pub fn packing_goal(&self) -> OptimizationGoal {
        match self {
            ConsolidationObjective::CostSaving => OptimizationGoal::Cost,
            ConsolidationObjective::SpaceUtilization => OptimizationGoal::Space,
            ConsolidationObjective::Balanced => OptimizationGoal::Balanced,
        }
    }
}

impl fmt::Display for ConsolidationObjective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ConsolidationObjective {
    type Err = ValidationError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "cost_saving" | "cost" => Ok(ConsolidationObjective::CostSaving),
            "space_utilization" | "space" => Ok(ConsolidationObjective::SpaceUtilization),
            "balanced" | "" => Ok(ConsolidationObjective::Balanced),
            other => Err(ValidationError::InvalidValue(format!(
                "unknown consolidation objective '{}'",
                other
            ))),
        }
    }
}

/// Orders travelling together on one or more trucks of the same type.
#[derive(Clone, Debug, Serialize)]
pub struct Shipment {
    pub order_ids: Vec<String>,
    pub truck_type_id: String,
    pub truck_name: String,
    /// Trucks that received cargo.
    pub trucks: usize,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    pub cost: CostBreakdown,
    pub fits_completely: bool,
    pub unfit_items: usize,
}

impl Shipment {
    fn from_summary(orders: &[&Order], truck: &TruckTypeSpec, summary: &PackingSummary) -> Self {
        Self {
            order_ids: orders.iter().map(|o| o.id.clone()).collect(),
            truck_type_id: truck.id.clone(),
            truck_name: truck.display_name().to_string(),
            trucks: summary.trucks_used,
            volume_utilization: summary.volume_utilization,
            weight_utilization: summary.weight_utilization,
            cost: summary.fleet_cost,
            fits_completely: summary.fits_completely(),
            unfit_items: summary.unfit_items,
        }
    }
}

/// Kind of a consolidation plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanKind {
    SingleTruck,
    MultiTruck,
    Individual,
}

impl PlanKind {
    pub fn code(&self) -> &'static str {
        match self {
            PlanKind::SingleTruck => "single_truck",
            PlanKind::MultiTruck => "multi_truck",
            PlanKind::Individual => "individual",
        }
    }
}

/// One way of shipping all orders of a partition.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConsolidationPlan {
    SingleTruck { shipment: Shipment },
    MultiTruck { shipments: Vec<Shipment> },
    Individual { shipments: Vec<Shipment> },
}

impl ConsolidationPlan {
    pub fn kind(&self) -> PlanKind {
        match self {
            ConsolidationPlan::SingleTruck { .. } => PlanKind::SingleTruck,
            ConsolidationPlan::MultiTruck { .. } => PlanKind::MultiTruck,
            ConsolidationPlan::Individual { .. } => PlanKind::Individual,
        }
    }

    pub fn shipments(&self) -> &[Shipment] {
        match self {
            ConsolidationPlan::SingleTruck { shipment } => std::slice::from_ref(shipment),
            ConsolidationPlan::MultiTruck { shipments } | ConsolidationPlan::Individual { shipments } => {
                shipments
            }
        }
    }

    pub fn order_ids(&self) -> Vec<&str> {
        self.shipments()
            .iter()
            .flat_map(|s| s.order_ids.iter().map(String::as_str))
            .collect()
    }

    pub fn cost(&self) -> CostBreakdown {
        let mut total = CostBreakdown::default();
        for shipment in self.shipments() {
            total.accumulate(&shipment.cost);
        }
        total
    }

    pub fn total_cost(&self) -> f64 {
        self.cost().total_cost
    }

    pub fn cost_unavailable(&self) -> bool {
        self.shipments().iter().any(|s| s.cost.cost_unavailable)
    }

    pub fn truck_count(&self) -> usize {
        self.shipments().iter().map(|s| s.trucks).sum()
    }

    /// Volume utilization averaged over all trucks of the plan.
    pub fn average_utilization(&self) -> f64 {
        let trucks = self.truck_count();
        if trucks == 0 {
            return 0.0;
        }
        self.shipments()
            .iter()
            .map(|s| s.volume_utilization * s.trucks as f64)
            .sum::<f64>()
            / trucks as f64
    }

    pub fn fits_completely(&self) -> bool {
        self.shipments().iter().all(|s| s.fits_completely)
    }
}

/// Selected plan of one destination partition.
#[derive(Clone, Debug, Serialize)]
pub struct PartitionPlan {
    pub destination: String,
    pub plan: ConsolidationPlan,
    /// `baseline_cost_per_order × orders − plan cost`; 0 when the cost is unknown.
    pub savings: f64,
    /// Every candidate considered, in preference order.
    pub candidates: Vec<ConsolidationPlan>,
}

/// Result of a consolidation call.
#[derive(Clone, Debug, Serialize)]
pub struct ConsolidationReport {
    /// One entry per destination, in key order.
    pub partitions: Vec<PartitionPlan>,
    pub total_cost: f64,
    pub total_savings: f64,
    pub search_truncated: bool,
    pub evaluated_combinations: usize,
}

/// Consolidates orders with the default configuration.
pub fn consolidate_orders(
    orders: &[Order],
    catalog: &[TruckTypeSpec],
    objective: ConsolidationObjective,
    route: &RouteInfo,
) -> Result<ConsolidationReport> {
    consolidate_orders_with_config(orders, catalog, objective, route, &OptimizerConfig::default())
}

/// Like [`consolidate_orders`], with a custom configuration.
pub fn consolidate_orders_with_config(
    orders: &[Order],
    catalog: &[TruckTypeSpec],
    objective: ConsolidationObjective,
    route: &RouteInfo,
    config: &OptimizerConfig,
) -> Result<ConsolidationReport> {
    config.validate()?;
    let mut collector = IssueCollector::new();
    if let Err(err) = validate_orders(orders, catalog, route) {
        collector.extend(err.issues().to_vec());
    }
    for (idx, order) in orders.iter().enumerate() {
        if orders[..idx].iter().any(|other| other.id == order.id) {
            collector.push(format!("orders[{}].id", idx), format!("duplicate order id '{}'", order.id));
        }
    }
    let mut types: Vec<&TruckTypeSpec> = catalog.iter().filter(|t| t.available).collect();
    if !catalog.is_empty() && types.is_empty() {
        collector.push("trucks", "no truck type is available");
    }
    collector.finish()?;

    types.sort_by(|a, b| a.volume().partial_cmp(&b.volume()).unwrap_or(Ordering::Equal));
    let Some(largest) = largest_type(&types) else {
        return Err(EngineError::InvalidInput {
            issues: vec![FieldIssue::new("trucks", "no truck type is available")],
        });
    };

    let mut partitions: BTreeMap<&str, Vec<&Order>> = BTreeMap::new();
    for order in orders {
        partitions.entry(order.destination.as_str()).or_default().push(order);
    }

    let goal = objective.packing_goal();
    let mut ctx = SearchContext::new(config, route);
    let planner = Planner {
        types: &types,
        largest,
        goal,
        max_group_size: config.search.max_group_size.max(1),
    };

    let mut plans = Vec::with_capacity(partitions.len());
    for (destination, members) in partitions {
        let mut candidates = Vec::new();
        candidates.extend(planner.single_truck(&mut ctx, &members));
        candidates.extend(planner.multi_truck(&mut ctx, &members));
        candidates.push(planner.individual(&mut ctx, &members));

        let selected = select_plan(&candidates, objective);
        let plan = candidates[selected].clone();
        let savings = if plan.cost_unavailable() {
            0.0
        } else {
            config.search.baseline_cost_per_order * members.len() as f64 - plan.total_cost()
        };
        log::debug!(
            "destination {}: {} candidates, selected {} at {:.2}",
            destination,
            candidates.len(),
            plan.kind().code(),
            plan.total_cost()
        );
        plans.push(PartitionPlan {
            destination: destination.to_string(),
            plan,
            savings,
            candidates,
        });
    }

    let report = ConsolidationReport {
        total_cost: plans.iter().map(|p| p.plan.total_cost()).sum(),
        total_savings: plans.iter().map(|p| p.savings).sum(),
        partitions: plans,
        search_truncated: ctx.is_truncated(),
        evaluated_combinations: ctx.evaluations(),
    };
    log::info!(
        "consolidated {} orders in {} partitions: cost {:.2}, savings {:.2}{}",
        orders.len(),
        report.partitions.len(),
        report.total_cost,
        report.total_savings,
        if report.search_truncated { " (truncated)" } else { "" }
    );
    Ok(report)
}

fn largest_type<'a>(types: &[&'a TruckTypeSpec]) -> Option<&'a TruckTypeSpec> {
    types.iter().copied().max_by(|a, b| {
        a.volume()
            .partial_cmp(&b.volume())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.max_weight.partial_cmp(&b.max_weight).unwrap_or(Ordering::Equal))
    })
}

/// Memo key of a group: sorted order ids, each prefixed with its length so
/// no id can spell out a different group.
fn group_key(orders: &[&Order]) -> String {
    let mut ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
    ids.sort_unstable();
    ids.iter().map(|id| format!("{}:{}", id.len(), id)).collect()
}

fn merged_cartons(orders: &[&Order]) -> Vec<CartonSpec> {
    orders.iter().flat_map(|o| o.cartons.iter().cloned()).collect()
}

/// Priced shipments beat unpriced ones, then the lower cost wins.
fn is_cheaper(a: &Shipment, b: &Shipment) -> bool {
    match (a.cost.cost_unavailable, b.cost.cost_unavailable) {
        (false, true) => true,
        (true, false) => false,
        _ => a.cost.total_cost + EPSILON_GENERAL < b.cost.total_cost,
    }
}

/// Lexicographic index combinations of size `k` out of `n`, produced one at
/// a time.
fn combinations(n: usize, k: usize) -> Combinations {
    Combinations {
        n,
        current: (k > 0 && k <= n).then(|| (0..k).collect()),
    }
}

struct Combinations {
    n: usize,
    /// Next combination to yield; `None` once exhausted.
    current: Option<Vec<usize>>,
}

impl Iterator for Combinations {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        let current = self.current.as_mut()?;
        let combo = current.clone();
        let k = current.len();
        match (0..k).rev().find(|&i| current[i] != i + self.n - k) {
            Some(pos) => {
                current[pos] += 1;
                for i in pos + 1..k {
                    current[i] = current[i - 1] + 1;
                }
            }
            None => self.current = None,
        }
        Some(combo)
    }
}

struct Planner<'a> {
    /// Available types, smallest volume first.
    types: &'a [&'a TruckTypeSpec],
    largest: &'a TruckTypeSpec,
    goal: OptimizationGoal,
    max_group_size: usize,
}

impl Planner<'_> {
    /// All orders in one truck: the smallest type that holds everything.
    fn single_truck(&self, ctx: &mut SearchContext<'_>, orders: &[&Order]) -> Option<ConsolidationPlan> {
        let key = group_key(orders);
        let cartons = merged_cartons(orders);
        for truck in self.types {
            let summary = ctx.evaluate(&key, &cartons, truck, 1, self.goal)?;
            if summary.fits_completely() {
                return Some(ConsolidationPlan::SingleTruck {
                    shipment: Shipment::from_summary(orders, truck, &summary),
                });
            }
        }
        None
    }

    fn multi_truck(&self, ctx: &mut SearchContext<'_>, orders: &[&Order]) -> Option<ConsolidationPlan> {
        match orders.len() {
            0 | 1 => None,
            2 => self
                .cheapest_full_fit(ctx, orders)
                .map(|shipment| ConsolidationPlan::MultiTruck {
                    shipments: vec![shipment],
                }),
            _ => self.greedy_groups(ctx, orders),
        }
    }

    /// Repeatedly commits the best-scoring group of up to `max_group_size`
    /// orders that fits one truck.
    fn greedy_groups(&self, ctx: &mut SearchContext<'_>, orders: &[&Order]) -> Option<ConsolidationPlan> {
        let mut remaining: Vec<&Order> = orders.to_vec();
        let mut shipments = Vec::new();

        while !remaining.is_empty() {
            let mut best: Option<(f64, Vec<usize>, Shipment)> = None;
            'sizes: for size in 1..=self.max_group_size.min(remaining.len()) {
                for combo in combinations(remaining.len(), size) {
                    if ctx.is_truncated() {
                        break 'sizes;
                    }
                    let group: Vec<&Order> = combo.iter().map(|&i| remaining[i]).collect();
                    if let Some(shipment) = self.cheapest_full_fit(ctx, &group) {
                        let score = shipment.volume_utilization * 100.0 - shipment.cost.total_cost / size as f64;
                        if best.as_ref().is_none_or(|(top, _, _)| score > top + EPSILON_GENERAL) {
                            best = Some((score, combo, shipment));
                        }
                    }
                }
            }

            let Some((_, combo, shipment)) = best else {
                break;
            };
            shipments.push(shipment);
            for &i in combo.iter().rev() {
                remaining.remove(i);
            }
        }

        if !shipments.iter().any(|s| s.order_ids.len() > 1) {
            return None;
        }
        for order in remaining {
            shipments.push(self.individual_shipment(ctx, order));
        }
        Some(ConsolidationPlan::MultiTruck { shipments })
    }

    fn individual(&self, ctx: &mut SearchContext<'_>, orders: &[&Order]) -> ConsolidationPlan {
        let shipments = orders
            .iter()
            .map(|order| self.individual_shipment(ctx, order))
            .collect();
        ConsolidationPlan::Individual { shipments }
    }

    /// Cheapest single truck holding the order, or several units of the
    /// largest type when none does.
    fn individual_shipment(&self, ctx: &mut SearchContext<'_>, order: &Order) -> Shipment {
        let group = [order];
        if let Some(shipment) = self.cheapest_full_fit(ctx, &group) {
            return shipment;
        }

        let truck = self.largest;
        let by_volume = (order.total_volume() / truck.volume()).ceil();
        let by_volume = if by_volume.is_finite() { (by_volume as usize).saturating_add(1) } else { 1 };
        let quantity = by_volume.min(order.item_count()).max(1);
        let summary = ctx.evaluate_unbounded(&group_key(&group), &order.cartons, truck, quantity, self.goal);
        if !summary.fits_completely() {
            log::warn!(
                "order {} overflows {} units of {}: {} items left",
                order.id,
                quantity,
                truck.id,
                summary.unfit_items
            );
        }
        Shipment::from_summary(&group, truck, &summary)
    }

    /// The cheapest type that holds the whole group in one truck.
    fn cheapest_full_fit(&self, ctx: &mut SearchContext<'_>, orders: &[&Order]) -> Option<Shipment> {
        let key = group_key(orders);
        let cartons = merged_cartons(orders);
        let mut best: Option<Shipment> = None;
        for truck in self.types {
            let Some(summary) = ctx.evaluate(&key, &cartons, truck, 1, self.goal) else {
                break;
            };
            if !summary.fits_completely() {
                continue;
            }
            let shipment = Shipment::from_summary(orders, truck, &summary);
            if best.as_ref().is_none_or(|current| is_cheaper(&shipment, current)) {
                best = Some(shipment);
            }
        }
        best
    }
}

/// Picks the plan for the objective among complete candidates (all
/// candidates when none is complete). Earlier candidates win ties.
fn select_plan(candidates: &[ConsolidationPlan], objective: ConsolidationObjective) -> usize {
    let complete: Vec<usize> = (0..candidates.len())
        .filter(|&i| candidates[i].fits_completely())
        .collect();
    let pool: Vec<usize> = if complete.is_empty() {
        (0..candidates.len()).collect()
    } else {
        complete
    };

    let mut best = pool[0];
    for &i in &pool[1..] {
        if is_better_plan(&candidates[i], &candidates[best], objective) {
            best = i;
        }
    }
    best
}

fn is_better_plan(a: &ConsolidationPlan, b: &ConsolidationPlan, objective: ConsolidationObjective) -> bool {
    let balanced = |p: &ConsolidationPlan| p.average_utilization() * 100.0 - p.total_cost() / 100.0;
    match objective {
        ConsolidationObjective::SpaceUtilization => {
            a.average_utilization() > b.average_utilization() + EPSILON_GENERAL
        }
        ConsolidationObjective::CostSaving | ConsolidationObjective::Balanced => {
            match (a.cost_unavailable(), b.cost_unavailable()) {
                (false, true) => return true,
                (true, false) => return false,
                _ => {}
            }
            if objective == ConsolidationObjective::CostSaving {
                a.total_cost() + EPSILON_GENERAL < b.total_cost()
            } else {
                balanced(a) > balanced(b) + EPSILON_GENERAL
            }
        }
    }
}
