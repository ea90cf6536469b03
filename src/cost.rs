//! Trip cost model.
//!
//! A pure function from (truck type, route) to a cost breakdown. Used to score
//! packing results, truck recommendations and consolidation plans.

use serde::Serialize;

use crate::model::{RouteInfo, RouteType, TruckTypeSpec};

/// Tunable inputs of the cost model that are not part of the truck or route.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CostSettings {
    /// Fuel price per litre.
    pub fuel_price_per_liter: f64,
    /// Average travel speed used to derive travel time.
    pub assumed_speed_kmh: f64,
    /// Driving hours billed as one driver day.
    pub driving_hours_per_day: f64,
}

impl CostSettings {
    pub const DEFAULT_FUEL_PRICE_PER_LITER: f64 = 90.0;
    pub const DEFAULT_ASSUMED_SPEED_KMH: f64 = 50.0;
    pub const DEFAULT_DRIVING_HOURS_PER_DAY: f64 = 8.0;

    /// Hours of travel covered before rest increments start.
    const REST_FREE_HOURS: f64 = 4.0;
    /// Every full block of this many hours beyond the free hours adds a rest increment.
    const REST_BLOCK_HOURS: f64 = 4.0;
    const REST_INCREMENT_DAYS: f64 = 0.5;
    /// Vehicles older than this get a maintenance surcharge.
    const AGE_FREE_YEARS: f64 = 3.0;
    const AGE_SURCHARGE_PER_YEAR: f64 = 0.1;
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            fuel_price_per_liter: Self::DEFAULT_FUEL_PRICE_PER_LITER,
            assumed_speed_kmh: Self::DEFAULT_ASSUMED_SPEED_KMH,
            driving_hours_per_day: Self::DEFAULT_DRIVING_HOURS_PER_DAY,
        }
    }
}

/// Itemised trip cost for one truck.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub fuel_cost: f64,
    pub toll_cost: f64,
    pub maintenance_cost: f64,
    pub driver_cost: f64,
    pub truck_flat_cost: f64,
    pub total_cost: f64,
    /// Set when the truck has no cost data; all amounts are then 0 and must
    /// not be read as "free".
    pub cost_unavailable: bool,
}

impl CostBreakdown {
    fn unavailable() -> Self {
        Self {
            cost_unavailable: true,
            ..Self::default()
        }
    }

    /// Adds another breakdown, e.g. to total several trucks.
    ///
    /// The sum is unavailable as soon as one part is.
    pub fn accumulate(&mut self, other: &CostBreakdown) {
        self.fuel_cost += other.fuel_cost;
        self.toll_cost += other.toll_cost;
        self.maintenance_cost += other.maintenance_cost;
        self.driver_cost += other.driver_cost;
        self.truck_flat_cost += other.truck_flat_cost;
        self.total_cost = self.component_sum();
        self.cost_unavailable |= other.cost_unavailable;
    }

    fn component_sum(&self) -> f64 {
        self.fuel_cost + self.toll_cost + self.maintenance_cost + self.driver_cost + self.truck_flat_cost
    }
}

/// Toll rate per km for a road class.
pub fn toll_rate(route_type: RouteType) -> f64 {
    match route_type {
        RouteType::City => 0.0,
        RouteType::Rural => 0.5,
        RouteType::Highway => 2.5,
        RouteType::Expressway => 4.0,
    }
}

/// Maintenance multiplier for the vehicle age (1.0 up to three years).
pub fn age_multiplier(age_years: Option<f64>) -> f64 {
    match age_years {
        Some(age) if age > CostSettings::AGE_FREE_YEARS => {
            1.0 + CostSettings::AGE_SURCHARGE_PER_YEAR * (age - CostSettings::AGE_FREE_YEARS)
        }
        _ => 1.0,
    }
}

/// Billable driver days for a given travel time.
///
/// Travel days are rounded up to the next half day with a minimum of one day,
/// then half a day of rest is added per full 4 hours beyond the first 4.
pub fn billable_driver_days(travel_hours: f64, settings: &CostSettings) -> f64 {
    if travel_hours <= 0.0 || !travel_hours.is_finite() {
        return 0.0;
    }
    let hours_per_day = if settings.driving_hours_per_day > 0.0 {
        settings.driving_hours_per_day
    } else {
        CostSettings::DEFAULT_DRIVING_HOURS_PER_DAY
    };
    let travel_days = ceil_half(travel_hours / hours_per_day).max(1.0);
    let rest_blocks = ((travel_hours - CostSettings::REST_FREE_HOURS).max(0.0)
        / CostSettings::REST_BLOCK_HOURS)
        .floor();
    travel_days + rest_blocks * CostSettings::REST_INCREMENT_DAYS
}

fn ceil_half(days: f64) -> f64 {
    (days * 2.0).ceil() / 2.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

/// Computes the trip cost of one truck on a route.
///
/// # Example
/// ```
/// use fleet_pack::cost::{compute_cost, CostSettings};
/// use fleet_pack::model::{RouteInfo, RouteType, TruckTypeSpec};
///
/// let truck = TruckTypeSpec::new("t", (400.0, 200.0, 200.0), 5000.0)
///     .unwrap()
///     .with_costs(1.0, 10.0, 800.0, 2.0);
/// let cost = compute_cost(&truck, &RouteInfo::new(100.0, RouteType::Highway), &CostSettings::default());
/// assert_eq!(cost.total_cost, 2250.0);
/// ```
pub fn compute_cost(truck: &TruckTypeSpec, route: &RouteInfo, settings: &CostSettings) -> CostBreakdown {
    if truck.lacks_cost_data() {
        return CostBreakdown::unavailable();
    }

    let distance = non_negative(route.distance_km);

    let fuel_cost = if truck.fuel_efficiency > 0.0 {
        non_negative(distance / truck.fuel_efficiency * settings.fuel_price_per_liter)
    } else {
        0.0
    };
    let toll_cost = non_negative(distance * toll_rate(route.route_type));
    let maintenance_cost =
        non_negative(distance * truck.maintenance_cost_per_km * age_multiplier(truck.age_years));

    let travel_hours = if settings.assumed_speed_kmh > 0.0 {
        distance / settings.assumed_speed_kmh
    } else {
        distance / CostSettings::DEFAULT_ASSUMED_SPEED_KMH
    };
    let driver_cost =
        non_negative(truck.driver_cost_per_day * billable_driver_days(travel_hours, settings));
    let truck_flat_cost = non_negative(truck.cost_per_km * distance);

    let mut breakdown = CostBreakdown {
        fuel_cost,
        toll_cost,
        maintenance_cost,
        driver_cost,
        truck_flat_cost,
        total_cost: 0.0,
        cost_unavailable: false,
    };
    breakdown.total_cost = breakdown.component_sum();
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priced_truck() -> TruckTypeSpec {
        TruckTypeSpec::new("t", (400.0, 200.0, 200.0), 5000.0)
            .unwrap()
            .with_costs(1.0, 10.0, 800.0, 2.0)
    }

    #[test]
    fn short_highway_trip_matches_reference_breakdown() {
        let cost = compute_cost(
            &priced_truck(),
            &RouteInfo::new(100.0, RouteType::Highway),
            &CostSettings::default(),
        );

        assert_eq!(cost.fuel_cost, 900.0);
        assert_eq!(cost.toll_cost, 250.0);
        assert_eq!(cost.maintenance_cost, 200.0);
        assert_eq!(cost.driver_cost, 800.0);
        assert_eq!(cost.truck_flat_cost, 100.0);
        assert_eq!(cost.total_cost, 2250.0);
        assert!(!cost.cost_unavailable);
    }

    #[test]
    fn components_sum_to_total() {
        let settings = CostSettings::default();
        for (distance, route_type) in [
            (12.5, RouteType::City),
            (333.3, RouteType::Rural),
            (1234.0, RouteType::Expressway),
        ] {
            let cost = compute_cost(&priced_truck(), &RouteInfo::new(distance, route_type), &settings);
            let sum = cost.fuel_cost
                + cost.toll_cost
                + cost.maintenance_cost
                + cost.driver_cost
                + cost.truck_flat_cost;
            assert_eq!(sum, cost.total_cost);
            assert!(cost.fuel_cost >= 0.0 && cost.toll_cost >= 0.0);
            assert!(cost.maintenance_cost >= 0.0 && cost.driver_cost >= 0.0);
        }
    }

    #[test]
    fn missing_cost_data_is_flagged_not_free() {
        let truck = TruckTypeSpec::new("bare", (10.0, 10.0, 10.0), 10.0).unwrap();
        let cost = compute_cost(&truck, &RouteInfo::default(), &CostSettings::default());
        assert!(cost.cost_unavailable);
        assert_eq!(cost.total_cost, 0.0);
        assert_eq!(cost.toll_cost, 0.0);
    }

    #[test]
    fn zero_fuel_efficiency_means_no_fuel_cost() {
        let truck = priced_truck().with_costs(1.0, 0.0, 800.0, 2.0);
        let cost = compute_cost(&truck, &RouteInfo::default(), &CostSettings::default());
        assert_eq!(cost.fuel_cost, 0.0);
        assert!(!cost.cost_unavailable);
    }

    #[test]
    fn city_routes_have_no_toll() {
        let cost = compute_cost(
            &priced_truck(),
            &RouteInfo::new(80.0, RouteType::City),
            &CostSettings::default(),
        );
        assert_eq!(cost.toll_cost, 0.0);
    }

    #[test]
    fn older_trucks_cost_more_to_maintain() {
        assert_eq!(age_multiplier(None), 1.0);
        assert_eq!(age_multiplier(Some(3.0)), 1.0);
        assert!((age_multiplier(Some(5.0)) - 1.2).abs() < 1e-12);

        let old = priced_truck().with_age(5.0);
        let cost = compute_cost(&old, &RouteInfo::default(), &CostSettings::default());
        assert!((cost.maintenance_cost - 240.0).abs() < 1e-9);
    }

    #[test]
    fn long_trips_add_rest_days() {
        let settings = CostSettings::default();
        assert_eq!(billable_driver_days(2.0, &settings), 1.0);
        assert_eq!(billable_driver_days(4.0, &settings), 1.0);
        // 8h: one travel day plus one rest block
        assert_eq!(billable_driver_days(8.0, &settings), 1.5);
        // 10h: 1.25 days rounded up to 1.5, plus one rest block
        assert_eq!(billable_driver_days(10.0, &settings), 2.0);
        // 12h: 1.5 days plus two rest blocks
        assert_eq!(billable_driver_days(12.0, &settings), 2.5);
    }

    #[test]
    fn accumulate_tracks_unavailability() {
        let settings = CostSettings::default();
        let mut total = CostBreakdown::default();
        total.accumulate(&compute_cost(&priced_truck(), &RouteInfo::default(), &settings));
        total.accumulate(&compute_cost(&priced_truck(), &RouteInfo::default(), &settings));
        assert_eq!(total.total_cost, 4500.0);
        assert!(!total.cost_unavailable);

        let bare = TruckTypeSpec::new("bare", (10.0, 10.0, 10.0), 10.0).unwrap();
        total.accumulate(&compute_cost(&bare, &RouteInfo::default(), &settings));
        assert!(total.cost_unavailable);
    }
}
