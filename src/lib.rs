//! Fleet loading optimization engine.
//!
//! Loads boxed cargo into trucks and helps choose the fleet:
//! - [`packer::pack_fleet`] packs cartons into a given pool of trucks
//! - [`recommend::recommend_trucks`] ranks "quantity × truck type" options
//! - [`consolidation::consolidate_orders`] decides which orders share a truck
//!
//! All entry points are synchronous, validate their input up front and keep no
//! state between calls. Log records are emitted through the `log` facade.

pub mod config;
pub mod consolidation;
pub mod cost;
pub mod error;
pub mod geometry;
pub mod model;
pub mod ordering;
pub mod packer;
pub mod placement;
pub mod recommend;
pub mod search;
pub mod types;

pub use config::OptimizerConfig;
pub use consolidation::{
    ConsolidationObjective, ConsolidationPlan, ConsolidationReport, consolidate_orders,
    consolidate_orders_with_config,
};
pub use cost::{CostBreakdown, CostSettings, compute_cost};
pub use error::{EngineError, FieldIssue, Result};
pub use model::{CartonSpec, Order, RouteInfo, RouteType, TruckCategory, TruckTypeSpec};
pub use ordering::OptimizationGoal;
pub use packer::{
    FleetEvent, FleetPacking, PackingResult, TruckAllocation, pack_fleet, pack_fleet_with_config,
    pack_fleet_with_progress,
};
pub use placement::{PackingConfig, UnplacedReason};
pub use recommend::{Recommendation, RecommendationReport, recommend_trucks, recommend_trucks_with_config};
pub use search::SearchConfig;
