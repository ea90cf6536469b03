//! Truck-combination recommendation search.
//!
//! Evaluates "quantity × truck type" combinations for one cargo set and ranks
//! them by a blended efficiency score. Every evaluation goes through the
//! multi-truck packing driver, memoized in a [`SearchContext`].

use std::cmp::Ordering;

use rustc_hash::FxHashSet;
use serde::Serialize;

use crate::config::OptimizerConfig;
use crate::cost::CostBreakdown;
use crate::error::{IssueCollector, Result};
use crate::model::{CartonSpec, RouteInfo, TruckTypeSpec, validate_request};
use crate::ordering::OptimizationGoal;
use crate::search::{PackingSummary, SearchContext};
use crate::types::Dimensional;

const SPACE_WEIGHT: f64 = 0.3;
const COST_WEIGHT: f64 = 0.3;
const FLEET_SIZE_WEIGHT: f64 = 0.2;
const SUCCESS_WEIGHT: f64 = 0.2;

/// Neutral cost efficiency for combinations without cost data.
const UNKNOWN_COST_EFFICIENCY: f64 = 0.5;

const EARLY_EXIT_SUCCESS: f64 = 0.99;
const EARLY_EXIT_SPACE: f64 = 0.8;

/// Cargo key used for the memo; one cargo set per call.
const CARGO_KEY: &str = "cargo";

/// One ranked "quantity × truck type" option.
#[derive(Clone, Debug, Serialize)]
pub struct Recommendation {
    pub truck_type_id: String,
    pub truck_name: String,
    pub quantity: usize,
    /// Trucks that actually received cargo.
    pub trucks_used: usize,
    pub volume_utilization: f64,
    pub weight_utilization: f64,
    /// Cost of dispatching all `quantity` trucks.
    pub total_cost: f64,
    pub cost: CostBreakdown,
    pub space_efficiency: f64,
    pub cost_efficiency: f64,
    pub packing_success_rate: f64,
    pub efficiency_score: f64,
    pub fits_completely: bool,
    pub overflow_items: usize,
    pub cost_unavailable: bool,
}

/// Ranked recommendations of one call.
#[derive(Clone, Debug, Serialize)]
pub struct RecommendationReport {
    pub recommendations: Vec<Recommendation>,
    /// Set when the evaluation cap or time budget cut the search short.
    pub search_truncated: bool,
    pub evaluated_combinations: usize,
}

impl RecommendationReport {
    pub fn best(&self) -> Option<&Recommendation> {
        self.recommendations.first()
    }
}

/// Recommends truck combinations with the default configuration.
///
/// # Parameters
/// * `cartons` - Cargo to ship
/// * `catalog` - Available truck types; unavailable ones are ignored
/// * `max_trucks` - Upper bound for the quantity of a single type
/// * `goal` - Optimization goal used for packing and type ordering
/// * `route` - Route used for pricing
pub fn recommend_trucks(
    cartons: &[CartonSpec],
    catalog: &[TruckTypeSpec],
    max_trucks: usize,
    goal: OptimizationGoal,
    route: &RouteInfo,
) -> Result<RecommendationReport> {
    recommend_trucks_with_config(cartons, catalog, max_trucks, goal, route, &OptimizerConfig::default())
}

/// Like [`recommend_trucks`], with a custom configuration.
pub fn recommend_trucks_with_config(
    cartons: &[CartonSpec],
    catalog: &[TruckTypeSpec],
    max_trucks: usize,
    goal: OptimizationGoal,
    route: &RouteInfo,
    config: &OptimizerConfig,
) -> Result<RecommendationReport> {
    config.validate()?;
    let mut collector = IssueCollector::new();
    if let Err(err) = validate_request(cartons, catalog, route) {
        collector.extend(err.issues().to_vec());
    }
    if max_trucks == 0 {
        collector.push("max_trucks", "must be at least 1");
    }
    if !catalog.is_empty() && !catalog.iter().any(|t| t.available) {
        collector.push("trucks", "no truck type is available");
    }
    collector.finish()?;

    let total_volume: f64 = cartons.iter().map(CartonSpec::total_volume).sum();
    let total_weight: f64 = cartons.iter().map(CartonSpec::total_weight).sum();
    let total_items: usize = cartons.iter().map(|c| c.quantity as usize).sum();

    let search = &config.search;
    let mut candidates = prefilter(catalog, total_volume, total_weight, search.min_capacity_share);
    order_candidates(&mut candidates, goal);
    candidates.truncate(search.candidate_types);

    let mut ctx = SearchContext::new(config, route);
    let mut gathered: Vec<Recommendation> = Vec::new();

    'types: for truck in candidates {
        let upper = quantity_upper_bound(truck, total_volume, search.max_quantity_per_type, max_trucks);
        for quantity in 1..=upper {
            let Some(summary) = ctx.evaluate(CARGO_KEY, cartons, truck, quantity, goal) else {
                break 'types;
            };
            let recommendation = describe(truck, quantity, &summary);
            log::debug!(
                "{} x {}: success {:.3}, space {:.3}, cost {:.2}",
                quantity,
                truck.id,
                recommendation.packing_success_rate,
                recommendation.space_efficiency,
                recommendation.total_cost
            );
            let early_exit = recommendation.packing_success_rate >= EARLY_EXIT_SUCCESS
                && recommendation.space_efficiency >= EARLY_EXIT_SPACE;
            gathered.push(recommendation);
            if early_exit {
                break 'types;
            }
        }
    }

    score(&mut gathered);
    gathered.sort_by(compare_recommendations);

    let mut seen = FxHashSet::default();
    gathered.retain(|r| seen.insert((r.truck_type_id.clone(), r.quantity)));
    gathered.truncate(search.max_recommendations);

    log::info!(
        "recommendation search for {} items: {} options from {} evaluations{}",
        total_items,
        gathered.len(),
        ctx.evaluations(),
        if ctx.is_truncated() { " (truncated)" } else { "" }
    );

    Ok(RecommendationReport {
        recommendations: gathered,
        search_truncated: ctx.is_truncated(),
        evaluated_combinations: ctx.evaluations(),
    })
}

/// Drops types whose volume and weight capacity are both below the share of
/// the cargo totals. Falls back to every available type if nothing is left.
fn prefilter(
    catalog: &[TruckTypeSpec],
    total_volume: f64,
    total_weight: f64,
    min_share: f64,
) -> Vec<&TruckTypeSpec> {
    let available: Vec<&TruckTypeSpec> = catalog.iter().filter(|t| t.available).collect();
    let kept: Vec<&TruckTypeSpec> = available
        .iter()
        .copied()
        .filter(|t| !(t.volume() < min_share * total_volume && t.max_weight < min_share * total_weight))
        .collect();
    if kept.is_empty() {
        log::info!(
            "no truck type holds {:.0}% of the cargo, searching all {} available types",
            min_share * 100.0,
            available.len()
        );
        available
    } else {
        kept
    }
}

fn order_candidates(candidates: &mut [&TruckTypeSpec], goal: OptimizationGoal) {
    let cmp = |a: f64, b: f64| a.partial_cmp(&b).unwrap_or(Ordering::Equal);
    match goal {
        OptimizationGoal::Space => candidates.sort_by(|a, b| cmp(a.volume(), b.volume())),
        OptimizationGoal::Cost => candidates.sort_by(|a, b| cmp(a.cost_per_km, b.cost_per_km)),
        OptimizationGoal::Weight => candidates.sort_by(|a, b| cmp(b.max_weight, a.max_weight)),
        OptimizationGoal::MinTrucks => candidates.sort_by(|a, b| cmp(b.volume(), a.volume())),
        OptimizationGoal::Balanced => {
            let max_volume = candidates.iter().map(|t| t.volume()).fold(0.0, f64::max);
            let max_rate = candidates.iter().map(|t| t.cost_per_km).fold(0.0, f64::max);
            let blend = |t: &TruckTypeSpec| {
                let volume = if max_volume > 0.0 { t.volume() / max_volume } else { 0.0 };
                let rate = if max_rate > 0.0 { t.cost_per_km / max_rate } else { 0.0 };
                0.5 * volume + 0.5 * rate
            };
            candidates.sort_by(|a, b| cmp(blend(*a), blend(*b)));
        }
    }
}

/// `min(cap, ceil(cargo / type volume) + 1, max_trucks)`, at least 1.
fn quantity_upper_bound(truck: &TruckTypeSpec, total_volume: f64, cap: usize, max_trucks: usize) -> usize {
    let by_volume = (total_volume / truck.volume()).ceil();
    let by_volume = if by_volume.is_finite() && by_volume >= 0.0 {
        (by_volume as usize).saturating_add(1)
    } else {
        cap
    };
    cap.min(by_volume).min(max_trucks).max(1)
}

fn describe(truck: &TruckTypeSpec, quantity: usize, summary: &PackingSummary) -> Recommendation {
    let mut cost = CostBreakdown::default();
    for _ in 0..quantity {
        cost.accumulate(&summary.unit_cost);
    }
    let capacity = quantity as f64 * truck.volume();
    Recommendation {
        truck_type_id: truck.id.clone(),
        truck_name: truck.display_name().to_string(),
        quantity,
        trucks_used: summary.trucks_used,
        volume_utilization: summary.volume_utilization,
        weight_utilization: summary.weight_utilization,
        total_cost: cost.total_cost,
        cost,
        space_efficiency: if capacity > 0.0 {
            (summary.placed_volume / capacity).clamp(0.0, 1.0)
        } else {
            0.0
        },
        cost_efficiency: 0.0,
        packing_success_rate: summary.success_rate(),
        efficiency_score: 0.0,
        fits_completely: summary.fits_completely(),
        overflow_items: summary.unfit_items,
        cost_unavailable: cost.cost_unavailable,
    }
}

/// Fills in cost efficiency (relative to the cheapest priced option) and the
/// blended score.
fn score(recommendations: &mut [Recommendation]) {
    let cheapest = recommendations
        .iter()
        .filter(|r| !r.cost_unavailable && r.total_cost > 0.0)
        .map(|r| r.total_cost)
        .fold(None, |min: Option<f64>, cost| Some(min.map_or(cost, |m| m.min(cost))));

    for r in recommendations.iter_mut() {
        r.cost_efficiency = if r.cost_unavailable {
            UNKNOWN_COST_EFFICIENCY
        } else {
            match cheapest {
                Some(min) if r.total_cost > 0.0 => (min / r.total_cost).clamp(0.0, 1.0),
                _ => 1.0,
            }
        };
        r.efficiency_score = SPACE_WEIGHT * r.space_efficiency
            + COST_WEIGHT * r.cost_efficiency
            + FLEET_SIZE_WEIGHT / r.quantity as f64
            + SUCCESS_WEIGHT * r.packing_success_rate;
    }
}

fn compare_recommendations(a: &Recommendation, b: &Recommendation) -> Ordering {
    b.efficiency_score
        .partial_cmp(&a.efficiency_score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.quantity.cmp(&b.quantity))
        .then_with(|| a.truck_type_id.cmp(&b.truck_type_id))
}
