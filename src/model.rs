//! Data model for truck loading.
//!
//! - `CartonSpec`: a cargo template with dimensions, weight and handling flags
//! - `CartonItem`: one physical unit of a carton, created per packing run
//! - `TruckTypeSpec`: a vehicle model with capacity and cost rates
//! - `TruckInstance`: one concrete vehicle of a type inside a packing pool
//! - `RouteInfo`: trip data consumed by the cost model
//! - `Order`: an independent shipment order used by consolidation
//!
//! Specs are owned by the caller. Items and instances only live for one call.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{FieldIssue, IssueCollector, Result};
use crate::types::{Dimensional, Vec3, Weighted};

/// Validation error for a single value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    InvalidDimension(String),
    InvalidWeight(String),
    InvalidQuantity(String),
    InvalidValue(String),
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidDimension(msg) => write!(f, "Invalid dimension: {}", msg),
            ValidationError::InvalidWeight(msg) => write!(f, "Invalid weight: {}", msg),
            ValidationError::InvalidQuantity(msg) => write!(f, "Invalid quantity: {}", msg),
            ValidationError::InvalidValue(msg) => write!(f, "Invalid value: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

fn validate_positive(value: f64, name: &str) -> std::result::Result<(), String> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(format!("{} must be positive, got: {}", name, value));
    }
    Ok(())
}

fn validate_non_negative(value: f64, name: &str) -> std::result::Result<(), String> {
    if value < 0.0 || value.is_nan() || value.is_infinite() {
        return Err(format!("{} must not be negative, got: {}", name, value));
    }
    Ok(())
}

/// Checks length, width and height, one issue per offending axis.
fn dimension_issues(prefix: &str, dims: Vec3) -> Vec<FieldIssue> {
    [("length", dims.x), ("width", dims.y), ("height", dims.z)]
        .into_iter()
        .filter_map(|(axis, value)| {
            validate_positive(value, axis)
                .err()
                .map(|msg| FieldIssue::new(format!("{}.{}", prefix, axis), msg))
        })
        .collect()
}

fn default_true() -> bool {
    true
}

fn default_priority() -> u8 {
    3
}

/// Template for a kind of carton.
///
/// Immutable for the duration of a call; expanded into `quantity` items.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartonSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub weight: f64,
    pub quantity: u32,
    #[serde(default)]
    pub fragile: bool,
    #[serde(default = "default_true")]
    pub stackable: bool,
    /// Maximum column height of identical cartons, 0 = unlimited.
    #[serde(default)]
    pub max_stack_height: u32,
    /// 1 (lowest) to 5 (highest).
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "default_true")]
    pub can_rotate: bool,
}

impl CartonSpec {
    /// Creates a rotatable, stackable carton with default handling flags.
    ///
    /// # Examples
    /// ```
    /// use fleet_pack::model::CartonSpec;
    ///
    /// let ok = CartonSpec::new("c1", (50.0, 40.0, 30.0), 12.0, 4);
    /// assert!(ok.is_ok());
    ///
    /// let invalid = CartonSpec::new("c2", (-1.0, 40.0, 30.0), 12.0, 4);
    /// assert!(invalid.is_err());
    /// ```
    pub fn new(
        id: impl Into<String>,
        dims: (f64, f64, f64),
        weight: f64,
        quantity: u32,
    ) -> std::result::Result<Self, ValidationError> {
        validate_positive(dims.0, "Length").map_err(ValidationError::InvalidDimension)?;
        validate_positive(dims.1, "Width").map_err(ValidationError::InvalidDimension)?;
        validate_positive(dims.2, "Height").map_err(ValidationError::InvalidDimension)?;
        validate_positive(weight, "Weight").map_err(ValidationError::InvalidWeight)?;
        if quantity == 0 {
            return Err(ValidationError::InvalidQuantity(
                "Quantity must be at least 1".to_string(),
            ));
        }
        let id = id.into();
        Ok(Self {
            name: id.clone(),
            id,
            length: dims.0,
            width: dims.1,
            height: dims.2,
            weight,
            quantity,
            fragile: false,
            stackable: true,
            max_stack_height: 0,
            priority: default_priority(),
            value: 0.0,
            can_rotate: true,
        })
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = value;
        self
    }

    pub fn with_rotation(mut self, can_rotate: bool) -> Self {
        self.can_rotate = can_rotate;
        self
    }

    pub fn with_stacking(mut self, stackable: bool, max_stack_height: u32) -> Self {
        self.stackable = stackable;
        self.max_stack_height = max_stack_height;
        self
    }

    pub fn with_fragile(mut self, fragile: bool) -> Self {
        self.fragile = fragile;
        self
    }

    pub fn with_quantity(mut self, quantity: u32) -> Self {
        self.quantity = quantity;
        self
    }

    /// Volume of all units of this carton.
    pub fn total_volume(&self) -> f64 {
        self.volume() * f64::from(self.quantity)
    }

    /// Weight of all units of this carton.
    pub fn total_weight(&self) -> f64 {
        self.weight * f64::from(self.quantity)
    }

    /// Field issues for this carton, prefixed with its request path.
    pub fn issues(&self, prefix: &str) -> Vec<FieldIssue> {
        let mut issues = dimension_issues(prefix, self.dimensions());
        if let Err(msg) = validate_positive(self.weight, "weight") {
            issues.push(FieldIssue::new(format!("{}.weight", prefix), msg));
        }
        if self.quantity == 0 {
            issues.push(FieldIssue::new(
                format!("{}.quantity", prefix),
                "quantity must be at least 1",
            ));
        }
        if !(1..=5).contains(&self.priority) {
            issues.push(FieldIssue::new(
                format!("{}.priority", prefix),
                format!("priority must be between 1 and 5, got: {}", self.priority),
            ));
        }
        if let Err(msg) = validate_non_negative(self.value, "value") {
            issues.push(FieldIssue::new(format!("{}.value", prefix), msg));
        }
        issues
    }
}

impl Dimensional for CartonSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

impl Weighted for CartonSpec {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// One physical unit of a carton during a packing run.
///
/// Items share their template through an `Arc`; equality is by instance id.
#[derive(Clone, Debug, Serialize)]
pub struct CartonItem {
    pub instance_id: usize,
    pub spec: Arc<CartonSpec>,
}

impl CartonItem {
    pub fn new(instance_id: usize, spec: Arc<CartonSpec>) -> Self {
        Self { instance_id, spec }
    }

    #[inline]
    pub fn carton_id(&self) -> &str {
        &self.spec.id
    }
}

impl PartialEq for CartonItem {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for CartonItem {}

impl Dimensional for CartonItem {
    fn dimensions(&self) -> Vec3 {
        self.spec.dimensions()
    }
}

impl Weighted for CartonItem {
    fn weight(&self) -> f64 {
        self.spec.weight
    }
}

/// Vehicle size class.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TruckCategory {
    Light,
    #[default]
    Medium,
    Heavy,
}

/// Template for a vehicle model.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TruckTypeSpec {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub length: f64,
    pub width: f64,
    pub height: f64,
    pub max_weight: f64,
    #[serde(default)]
    pub cost_per_km: f64,
    /// Kilometres per litre.
    #[serde(default)]
    pub fuel_efficiency: f64,
    #[serde(default)]
    pub driver_cost_per_day: f64,
    #[serde(default)]
    pub maintenance_cost_per_km: f64,
    #[serde(default)]
    pub category: TruckCategory,
    #[serde(default = "default_true")]
    pub available: bool,
    /// Vehicle age in years; unknown ages are priced as new.
    #[serde(default)]
    pub age_years: Option<f64>,
}

impl TruckTypeSpec {
    /// Creates an available truck type without cost data.
    ///
    /// Cost rates are set through [`TruckTypeSpec::with_costs`].
    pub fn new(
        id: impl Into<String>,
        dims: (f64, f64, f64),
        max_weight: f64,
    ) -> std::result::Result<Self, ValidationError> {
        validate_positive(dims.0, "Truck length").map_err(ValidationError::InvalidDimension)?;
        validate_positive(dims.1, "Truck width").map_err(ValidationError::InvalidDimension)?;
        validate_positive(dims.2, "Truck height").map_err(ValidationError::InvalidDimension)?;
        validate_positive(max_weight, "Max weight").map_err(ValidationError::InvalidWeight)?;
        let id = id.into();
        Ok(Self {
            name: id.clone(),
            id,
            length: dims.0,
            width: dims.1,
            height: dims.2,
            max_weight,
            cost_per_km: 0.0,
            fuel_efficiency: 0.0,
            driver_cost_per_day: 0.0,
            maintenance_cost_per_km: 0.0,
            category: TruckCategory::default(),
            available: true,
            age_years: None,
        })
    }

    /// Sets cost rates (builder style).
    pub fn with_costs(
        mut self,
        cost_per_km: f64,
        fuel_efficiency: f64,
        driver_cost_per_day: f64,
        maintenance_cost_per_km: f64,
    ) -> Self {
        self.cost_per_km = cost_per_km;
        self.fuel_efficiency = fuel_efficiency;
        self.driver_cost_per_day = driver_cost_per_day;
        self.maintenance_cost_per_km = maintenance_cost_per_km;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_category(mut self, category: TruckCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    pub fn with_age(mut self, age_years: f64) -> Self {
        self.age_years = Some(age_years);
        self
    }

    /// Label used for instance ids; falls back to the id when no name is set.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// True when none of the cost rates are known.
    pub fn lacks_cost_data(&self) -> bool {
        self.cost_per_km == 0.0
            && self.fuel_efficiency == 0.0
            && self.driver_cost_per_day == 0.0
            && self.maintenance_cost_per_km == 0.0
    }

    /// Checks if a single carton could fit by weight and in some orientation.
    pub fn can_carry(&self, carton: &CartonSpec, tolerance: f64) -> bool {
        carton.weight <= self.max_weight + tolerance
            && crate::geometry::orientations(carton)
                .iter()
                .any(|o| crate::geometry::fits(o, &self.dimensions(), tolerance))
    }

    /// Field issues for this truck type, prefixed with its request path.
    pub fn issues(&self, prefix: &str) -> Vec<FieldIssue> {
        let mut issues = dimension_issues(prefix, self.dimensions());
        if let Err(msg) = validate_positive(self.max_weight, "max_weight") {
            issues.push(FieldIssue::new(format!("{}.max_weight", prefix), msg));
        }
        for (field, value) in [
            ("cost_per_km", self.cost_per_km),
            ("fuel_efficiency", self.fuel_efficiency),
            ("driver_cost_per_day", self.driver_cost_per_day),
            ("maintenance_cost_per_km", self.maintenance_cost_per_km),
        ] {
            if let Err(msg) = validate_non_negative(value, field) {
                issues.push(FieldIssue::new(format!("{}.{}", prefix, field), msg));
            }
        }
        if let Some(age) = self.age_years {
            if let Err(msg) = validate_non_negative(age, "age_years") {
                issues.push(FieldIssue::new(format!("{}.age_years", prefix), msg));
            }
        }
        issues
    }
}

impl Dimensional for TruckTypeSpec {
    fn dimensions(&self) -> Vec3 {
        Vec3::new(self.length, self.width, self.height)
    }
}

/// One concrete vehicle inside a packing pool.
#[derive(Clone, Debug, Serialize)]
pub struct TruckInstance {
    /// Label such as `Box Truck_#2`.
    pub id: String,
    /// Position in the goal-ordered pool; used to break ties deterministically.
    pub pool_index: usize,
    pub spec: Arc<TruckTypeSpec>,
}

impl TruckInstance {
    pub fn new(spec: Arc<TruckTypeSpec>, ordinal: usize, pool_index: usize) -> Self {
        Self {
            id: format!("{}_#{}", spec.display_name(), ordinal),
            pool_index,
            spec,
        }
    }

    #[inline]
    pub fn max_weight(&self) -> f64 {
        self.spec.max_weight
    }
}

impl Dimensional for TruckInstance {
    fn dimensions(&self) -> Vec3 {
        self.spec.dimensions()
    }
}

/// Road class of a route, selecting the toll rate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    City,
    Rural,
    #[default]
    Highway,
    Expressway,
}

impl FromStr for RouteType {
    type Err = ValidationError;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "city" | "urban" => Ok(RouteType::City),
            "rural" => Ok(RouteType::Rural),
            "highway" => Ok(RouteType::Highway),
            "expressway" => Ok(RouteType::Expressway),
            other => Err(ValidationError::InvalidValue(format!(
                "unknown route type '{}'",
                other
            ))),
        }
    }
}

fn default_distance() -> f64 {
    RouteInfo::DEFAULT_DISTANCE_KM
}

/// Trip data consumed by the cost model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteInfo {
    #[serde(default = "default_distance")]
    pub distance_km: f64,
    #[serde(default)]
    pub route_type: RouteType,
    #[serde(default)]
    pub location: Option<String>,
}

impl RouteInfo {
    pub const DEFAULT_DISTANCE_KM: f64 = 100.0;

    pub fn new(distance_km: f64, route_type: RouteType) -> Self {
        Self {
            distance_km,
            route_type,
            location: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn issues(&self, prefix: &str) -> Vec<FieldIssue> {
        validate_positive(self.distance_km, "distance_km")
            .err()
            .map(|msg| vec![FieldIssue::new(format!("{}.distance_km", prefix), msg)])
            .unwrap_or_default()
    }
}

impl Default for RouteInfo {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DISTANCE_KM, RouteType::Highway)
    }
}

/// An independent shipment order.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// Partition key; orders are only consolidated within the same destination.
    pub destination: String,
    pub cartons: Vec<CartonSpec>,
}

impl Order {
    pub fn new(
        id: impl Into<String>,
        destination: impl Into<String>,
        cartons: Vec<CartonSpec>,
    ) -> Self {
        Self {
            id: id.into(),
            destination: destination.into(),
            cartons,
        }
    }

    pub fn total_volume(&self) -> f64 {
        self.cartons.iter().map(CartonSpec::total_volume).sum()
    }

    pub fn total_weight(&self) -> f64 {
        self.cartons.iter().map(CartonSpec::total_weight).sum()
    }

    pub fn item_count(&self) -> usize {
        self.cartons.iter().map(|c| c.quantity as usize).sum()
    }
}

/// Validates cartons and trucks of a packing or recommendation request.
///
/// Every offending field is reported; nothing is computed on failure.
pub fn validate_request(
    cartons: &[CartonSpec],
    trucks: &[TruckTypeSpec],
    route: &RouteInfo,
) -> Result<()> {
    let mut collector = IssueCollector::new();
    collect_carton_issues(&mut collector, "cartons", cartons);
    collect_truck_issues(&mut collector, trucks);
    collector.extend(route.issues("route"));
    collector.finish()
}

/// Validates a consolidation request.
pub fn validate_orders(orders: &[Order], trucks: &[TruckTypeSpec], route: &RouteInfo) -> Result<()> {
    let mut collector = IssueCollector::new();
    if orders.is_empty() {
        collector.push("orders", "must not be empty");
    }
    for (idx, order) in orders.iter().enumerate() {
        let prefix = format!("orders[{}]", idx);
        if order.id.trim().is_empty() {
            collector.push(format!("{}.id", prefix), "must not be empty");
        }
        if order.destination.trim().is_empty() {
            collector.push(format!("{}.destination", prefix), "must not be empty");
        }
        collect_carton_issues(&mut collector, &format!("{}.cartons", prefix), &order.cartons);
    }
    collect_truck_issues(&mut collector, trucks);
    collector.extend(route.issues("route"));
    collector.finish()
}

fn collect_carton_issues(collector: &mut IssueCollector, prefix: &str, cartons: &[CartonSpec]) {
    if cartons.is_empty() {
        collector.push(prefix, "must not be empty");
    }
    for (idx, carton) in cartons.iter().enumerate() {
        collector.extend(carton.issues(&format!("{}[{}]", prefix, idx)));
    }
}

fn collect_truck_issues(collector: &mut IssueCollector, trucks: &[TruckTypeSpec]) {
    if trucks.is_empty() {
        collector.push("trucks", "must not be empty");
    }
    for (idx, truck) in trucks.iter().enumerate() {
        let prefix = format!("trucks[{}]", idx);
        if trucks[..idx].iter().any(|other| other.id == truck.id) {
            collector.push(format!("{}.id", prefix), format!("duplicate truck type id '{}'", truck.id));
        }
        collector.extend(truck.issues(&prefix));
    }
}
