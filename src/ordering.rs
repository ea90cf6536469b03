//! Optimization goals and carton ordering.
//!
//! Each goal resolves once per call to a [`GoalStrategy`]: the comparator used
//! to order cartons, the scoring function used to rank positions, and the
//! comparator used to order the truck pool.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::model::{CartonItem, CartonSpec, TruckTypeSpec, ValidationError};
use crate::placement::{self, PositionScorer};
use crate::types::Dimensional;

/// What a packing call optimizes for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationGoal {
    Space,
    Weight,
    Cost,
    #[default]
    Balanced,
    MinTrucks,
}

impl OptimizationGoal {
    pub const ALL: [OptimizationGoal; 5] = [
        OptimizationGoal::Space,
        OptimizationGoal::Weight,
        OptimizationGoal::Cost,
        OptimizationGoal::Balanced,
        OptimizationGoal::MinTrucks,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            OptimizationGoal::Space => "space",
            OptimizationGoal::Weight => "weight",
            OptimizationGoal::Cost => "cost",
            OptimizationGoal::Balanced => "balanced",
            OptimizationGoal::MinTrucks => "min_trucks",
        }
    }

    /// Resolves the goal to its strategy record.
    pub fn strategy(self) -> GoalStrategy {
        match self {
            OptimizationGoal::Space => GoalStrategy {
                goal: self,
                compare_cartons: compare_for_space,
                scorer: placement::SPACE_SCORER,
                compare_trucks: largest_volume_first,
            },
            OptimizationGoal::Weight => GoalStrategy {
                goal: self,
                compare_cartons: compare_for_weight,
                scorer: placement::WEIGHT_SCORER,
                compare_trucks: highest_capacity_first,
            },
            OptimizationGoal::Cost => GoalStrategy {
                goal: self,
                compare_cartons: compare_for_cost,
                scorer: placement::BALANCED_SCORER,
                compare_trucks: cheapest_per_km_first,
            },
            OptimizationGoal::Balanced => GoalStrategy {
                goal: self,
                compare_cartons: compare_balanced,
                scorer: placement::BALANCED_SCORER,
                compare_trucks: largest_volume_first,
            },
            OptimizationGoal::MinTrucks => GoalStrategy {
                goal: self,
                compare_cartons: compare_balanced,
                scorer: placement::SPACE_SCORER,
                compare_trucks: largest_volume_first,
            },
        }
    }
}

impl fmt::Display for OptimizationGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for OptimizationGoal {
    type Err = ValidationError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "space" => Ok(OptimizationGoal::Space),
            "weight" => Ok(OptimizationGoal::Weight),
            "cost" => Ok(OptimizationGoal::Cost),
            "balanced" | "" => Ok(OptimizationGoal::Balanced),
            "min_trucks" | "mintrucks" => Ok(OptimizationGoal::MinTrucks),
            other => Err(ValidationError::InvalidValue(format!(
                "unknown optimization goal '{}'",
                other
            ))),
        }
    }
}

type CartonComparator = fn(&CartonSpec, &CartonSpec) -> Ordering;
type TruckComparator = fn(&TruckTypeSpec, &TruckTypeSpec) -> Ordering;

/// Behaviour bundle selected by an [`OptimizationGoal`].
#[derive(Clone, Copy)]
pub struct GoalStrategy {
    pub goal: OptimizationGoal,
    pub compare_cartons: CartonComparator,
    pub scorer: PositionScorer,
    pub compare_trucks: TruckComparator,
}

impl fmt::Debug for GoalStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GoalStrategy").field("goal", &self.goal).finish()
    }
}

fn desc(a: f64, b: f64) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

fn asc(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

fn compare_for_space(a: &CartonSpec, b: &CartonSpec) -> Ordering {
    // non-stackable cartons first, they must go where nothing lands on them
    (!b.stackable)
        .cmp(&!a.stackable)
        .then_with(|| b.priority.cmp(&a.priority))
        .then_with(|| desc(a.value, b.value))
}

fn compare_for_weight(a: &CartonSpec, b: &CartonSpec) -> Ordering {
    desc(a.weight, b.weight)
}

fn compare_for_cost(a: &CartonSpec, b: &CartonSpec) -> Ordering {
    desc(a.value, b.value)
}

fn compare_balanced(a: &CartonSpec, b: &CartonSpec) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| desc(a.value, b.value))
        .then_with(|| desc(a.weight, b.weight))
}

fn largest_volume_first(a: &TruckTypeSpec, b: &TruckTypeSpec) -> Ordering {
    desc(a.volume(), b.volume())
}

fn highest_capacity_first(a: &TruckTypeSpec, b: &TruckTypeSpec) -> Ordering {
    desc(a.max_weight, b.max_weight)
}

fn cheapest_per_km_first(a: &TruckTypeSpec, b: &TruckTypeSpec) -> Ordering {
    asc(a.cost_per_km, b.cost_per_km)
}

/// Expands cartons into one item per unit, in source order.
///
/// Instance ids are assigned sequentially from 0.
pub fn expand_items(cartons: &[CartonSpec]) -> Vec<CartonItem> {
    let mut items = Vec::with_capacity(cartons.iter().map(|c| c.quantity as usize).sum());
    for carton in cartons {
        let spec = Arc::new(carton.clone());
        for _ in 0..carton.quantity {
            items.push(CartonItem::new(items.len(), Arc::clone(&spec)));
        }
    }
    items
}

/// Sorts items in place for the goal. The sort is stable.
pub fn sort_items(items: &mut [CartonItem], strategy: &GoalStrategy) {
    let compare = strategy.compare_cartons;
    items.sort_by(|a, b| compare(&a.spec, &b.spec));
}

/// Expands and sorts cartons for the goal in one step.
pub fn ordered_items(cartons: &[CartonSpec], goal: OptimizationGoal) -> Vec<CartonItem> {
    let mut items = expand_items(cartons);
    sort_items(&mut items, &goal.strategy());
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn carton(id: &str, weight: f64, priority: u8, value: f64) -> CartonSpec {
        CartonSpec::new(id, (10.0, 10.0, 10.0), weight, 1)
            .unwrap()
            .with_priority(priority)
            .with_value(value)
    }

    fn ids(items: &[CartonItem]) -> Vec<&str> {
        items.iter().map(|i| i.carton_id()).collect()
    }

    #[test]
    fn expansion_creates_one_item_per_unit() {
        let cartons = vec![
            carton("a", 1.0, 3, 0.0).with_quantity(3),
            carton("b", 1.0, 3, 0.0).with_quantity(2),
        ];
        let items = expand_items(&cartons);
        assert_eq!(items.len(), 5);
        assert_eq!(ids(&items), vec!["a", "a", "a", "b", "b"]);
        let instance_ids: Vec<usize> = items.iter().map(|i| i.instance_id).collect();
        assert_eq!(instance_ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn weight_goal_puts_heavy_items_first() {
        let cartons = vec![
            carton("light", 1.0, 3, 0.0),
            carton("heavy", 9.0, 3, 0.0),
            carton("mid", 5.0, 3, 0.0),
        ];
        let items = ordered_items(&cartons, OptimizationGoal::Weight);
        assert_eq!(ids(&items), vec!["heavy", "mid", "light"]);
    }

    #[test]
    fn space_goal_puts_non_stackable_first() {
        let cartons = vec![
            carton("stack-high", 1.0, 5, 10.0),
            carton("flat", 1.0, 1, 0.0).with_stacking(false, 0),
            carton("stack-low", 1.0, 2, 50.0),
        ];
        let items = ordered_items(&cartons, OptimizationGoal::Space);
        assert_eq!(ids(&items), vec!["flat", "stack-high", "stack-low"]);
    }

    #[test]
    fn cost_goal_orders_by_value() {
        let cartons = vec![
            carton("cheap", 1.0, 5, 1.0),
            carton("pricey", 1.0, 1, 100.0),
        ];
        let items = ordered_items(&cartons, OptimizationGoal::Cost);
        assert_eq!(ids(&items), vec!["pricey", "cheap"]);
    }

    #[test]
    fn balanced_goal_uses_priority_value_weight() {
        let cartons = vec![
            carton("p3-light", 1.0, 3, 10.0),
            carton("p3-heavy", 8.0, 3, 10.0),
            carton("p5", 1.0, 5, 0.0),
            carton("p3-valuable", 1.0, 3, 99.0),
        ];
        let items = ordered_items(&cartons, OptimizationGoal::Balanced);
        assert_eq!(
            ids(&items),
            vec!["p5", "p3-valuable", "p3-heavy", "p3-light"]
        );
    }

    #[test]
    fn equal_keys_keep_insertion_order() {
        let cartons = vec![
            carton("first", 4.0, 3, 0.0).with_quantity(2),
            carton("second", 4.0, 3, 0.0).with_quantity(2),
        ];
        for goal in OptimizationGoal::ALL {
            let items = ordered_items(&cartons, goal);
            let instance_ids: Vec<usize> = items.iter().map(|i| i.instance_id).collect();
            assert_eq!(instance_ids, vec![0, 1, 2, 3], "goal {}", goal);
        }
    }

    #[test]
    fn goals_parse_from_text() {
        assert_eq!("SPACE".parse::<OptimizationGoal>().unwrap(), OptimizationGoal::Space);
        assert_eq!(
            "min-trucks".parse::<OptimizationGoal>().unwrap(),
            OptimizationGoal::MinTrucks
        );
        assert_eq!("".parse::<OptimizationGoal>().unwrap(), OptimizationGoal::Balanced);
        assert!("fastest".parse::<OptimizationGoal>().is_err());
    }

    #[test]
    fn pool_ordering_depends_on_goal() {
        let small_cheap = TruckTypeSpec::new("small", (100.0, 100.0, 100.0), 9000.0)
            .unwrap()
            .with_costs(1.0, 10.0, 100.0, 1.0);
        let large_pricey = TruckTypeSpec::new("large", (400.0, 200.0, 200.0), 3000.0)
            .unwrap()
            .with_costs(5.0, 10.0, 100.0, 1.0);

        let space = OptimizationGoal::Space.strategy();
        assert_eq!((space.compare_trucks)(&large_pricey, &small_cheap), Ordering::Less);

        let cost = OptimizationGoal::Cost.strategy();
        assert_eq!((cost.compare_trucks)(&small_cheap, &large_pricey), Ordering::Less);

        let weight = OptimizationGoal::Weight.strategy();
        assert_eq!((weight.compare_trucks)(&small_cheap, &large_pricey), Ordering::Less);
    }
}
