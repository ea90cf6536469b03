use std::env;
use std::time::Duration;

use crate::cost::CostSettings;
use crate::error::{EngineError, Result};
use crate::placement::PackingConfig;
use crate::search::SearchConfig;

/// Complete engine configuration, loaded from environment variables or default values.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OptimizerConfig {
    pub packing: PackingConfig,
    pub cost: CostSettings,
    pub search: SearchConfig,
}

impl OptimizerConfig {
    const GRID_STEP_VAR: &'static str = "FLEET_PACK_GRID_STEP";
    const HEIGHT_EPSILON_VAR: &'static str = "FLEET_PACK_HEIGHT_EPSILON";
    const GENERAL_EPSILON_VAR: &'static str = "FLEET_PACK_GENERAL_EPSILON";
    const RESPECT_STACKING_VAR: &'static str = "FLEET_PACK_RESPECT_STACKING";
    const PARALLEL_THRESHOLD_VAR: &'static str = "FLEET_PACK_PARALLEL_THRESHOLD";
    const WORKER_COUNT_VAR: &'static str = "FLEET_PACK_WORKERS";
    const FUEL_PRICE_VAR: &'static str = "FLEET_PACK_FUEL_PRICE";
    const SPEED_VAR: &'static str = "FLEET_PACK_ASSUMED_SPEED_KMH";
    const DRIVING_HOURS_VAR: &'static str = "FLEET_PACK_DRIVING_HOURS_PER_DAY";
    const CANDIDATE_TYPES_VAR: &'static str = "FLEET_PACK_CANDIDATE_TYPES";
    const MAX_QUANTITY_VAR: &'static str = "FLEET_PACK_MAX_QUANTITY_PER_TYPE";
    const MAX_RECOMMENDATIONS_VAR: &'static str = "FLEET_PACK_MAX_RECOMMENDATIONS";
    const MIN_CAPACITY_SHARE_VAR: &'static str = "FLEET_PACK_MIN_CAPACITY_SHARE";
    const BASELINE_COST_VAR: &'static str = "FLEET_PACK_BASELINE_COST_PER_ORDER";
    const MAX_EVALUATIONS_VAR: &'static str = "FLEET_PACK_MAX_EVALUATIONS";
    const TIME_BUDGET_VAR: &'static str = "FLEET_PACK_TIME_BUDGET_MS";

    /// Creates a configuration from the currently available environment variables.
    ///
    /// Invalid values are reported through `log` and replaced by the defaults.
    pub fn from_env() -> Self {
        Self {
            packing: Self::packing_from_env(),
            cost: Self::cost_from_env(),
            search: Self::search_from_env(),
        }
    }

    /// Loads a `.env` file from the working directory (if any), then reads the environment.
    pub fn from_dotenv() -> Self {
        if let Err(err) = dotenvy::dotenv() {
            if !matches!(err, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
            {
                log::warn!("Could not load .env: {}", err);
            }
        }
        Self::from_env()
    }

    /// Rejects settings the engine cannot run with, e.g. a zero grid step.
    ///
    /// Configurations built through [`OptimizerConfig::from_env`] always pass.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            (
                "packing.grid_step",
                self.packing.grid_step.is_finite() && self.packing.grid_step > 0.0,
            ),
            (
                "packing.height_epsilon",
                self.packing.height_epsilon.is_finite() && self.packing.height_epsilon > 0.0,
            ),
            (
                "packing.general_epsilon",
                self.packing.general_epsilon.is_finite() && self.packing.general_epsilon > 0.0,
            ),
            ("packing.worker_count", self.packing.worker_count > 0),
            (
                "cost.fuel_price_per_liter",
                self.cost.fuel_price_per_liter.is_finite() && self.cost.fuel_price_per_liter >= 0.0,
            ),
            (
                "cost.assumed_speed_kmh",
                self.cost.assumed_speed_kmh.is_finite() && self.cost.assumed_speed_kmh > 0.0,
            ),
            (
                "cost.driving_hours_per_day",
                self.cost.driving_hours_per_day > 0.0 && self.cost.driving_hours_per_day <= 24.0,
            ),
            ("search.candidate_types", self.search.candidate_types > 0),
            ("search.max_quantity_per_type", self.search.max_quantity_per_type > 0),
            ("search.max_group_size", self.search.max_group_size > 0),
            (
                "search.min_capacity_share",
                (0.0..=1.0).contains(&self.search.min_capacity_share),
            ),
        ];

        match checks.iter().find(|(_, valid)| !valid) {
            Some((field, _)) => Err(EngineError::InvalidConfiguration(format!(
                "{} is out of range",
                field
            ))),
            None => Ok(()),
        }
    }

    fn packing_from_env() -> PackingConfig {
        let grid_step = load_f64_with_warning(
            Self::GRID_STEP_VAR,
            PackingConfig::DEFAULT_GRID_STEP,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted grid step changes packing density and runtime",
        );

        let height_epsilon = load_f64_with_warning(
            Self::HEIGHT_EPSILON_VAR,
            PackingConfig::DEFAULT_HEIGHT_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted height tolerance may cause unexpected resting levels",
        );

        let general_epsilon = load_f64_with_warning(
            Self::GENERAL_EPSILON_VAR,
            PackingConfig::DEFAULT_GENERAL_EPSILON,
            |value| value > 0.0,
            "must be greater than 0",
            "Adjusted tolerances may cause numerical instabilities",
        );

        let respect_stacking = env_string(Self::RESPECT_STACKING_VAR)
            .and_then(|raw| parse_bool(&raw, Self::RESPECT_STACKING_VAR))
            .unwrap_or(PackingConfig::DEFAULT_RESPECT_STACKING);

        let parallel_threshold = load_usize_with_warning(
            Self::PARALLEL_THRESHOLD_VAR,
            PackingConfig::DEFAULT_PARALLEL_THRESHOLD,
            |_| true,
            "must be a non-negative integer",
        );

        let worker_count = load_usize_with_warning(
            Self::WORKER_COUNT_VAR,
            PackingConfig::DEFAULT_WORKER_COUNT,
            |value| value > 0,
            "must be at least 1",
        );

        PackingConfig::builder()
            .grid_step(grid_step)
            .height_epsilon(height_epsilon)
            .general_epsilon(general_epsilon)
            .respect_stacking(respect_stacking)
            .parallel_threshold(parallel_threshold)
            .worker_count(worker_count)
            .build()
    }

    fn cost_from_env() -> CostSettings {
        CostSettings {
            fuel_price_per_liter: load_f64_with_warning(
                Self::FUEL_PRICE_VAR,
                CostSettings::DEFAULT_FUEL_PRICE_PER_LITER,
                |value| value >= 0.0,
                "must not be negative",
                "Adjusted fuel price changes every cost estimate",
            ),
            assumed_speed_kmh: load_f64_with_warning(
                Self::SPEED_VAR,
                CostSettings::DEFAULT_ASSUMED_SPEED_KMH,
                |value| value > 0.0,
                "must be greater than 0",
                "Adjusted travel speed changes billed driver days",
            ),
            driving_hours_per_day: load_f64_with_warning(
                Self::DRIVING_HOURS_VAR,
                CostSettings::DEFAULT_DRIVING_HOURS_PER_DAY,
                |value| value > 0.0 && value <= 24.0,
                "must be between 0 and 24",
                "Adjusted driving hours change billed driver days",
            ),
        }
    }

    fn search_from_env() -> SearchConfig {
        let time_budget = load_usize_with_warning(
            Self::TIME_BUDGET_VAR,
            0,
            |_| true,
            "must be a non-negative number of milliseconds",
        );

        SearchConfig::builder()
            .candidate_types(load_usize_with_warning(
                Self::CANDIDATE_TYPES_VAR,
                SearchConfig::DEFAULT_CANDIDATE_TYPES,
                |value| value > 0,
                "must be at least 1",
            ))
            .max_quantity_per_type(load_usize_with_warning(
                Self::MAX_QUANTITY_VAR,
                SearchConfig::DEFAULT_MAX_QUANTITY_PER_TYPE,
                |value| value > 0,
                "must be at least 1",
            ))
            .max_recommendations(load_usize_with_warning(
                Self::MAX_RECOMMENDATIONS_VAR,
                SearchConfig::DEFAULT_MAX_RECOMMENDATIONS,
                |value| value > 0,
                "must be at least 1",
            ))
            .min_capacity_share(load_f64_with_warning(
                Self::MIN_CAPACITY_SHARE_VAR,
                SearchConfig::DEFAULT_MIN_CAPACITY_SHARE,
                |value| (0.0..=1.0).contains(&value),
                "must be between 0 and 1",
                "Adjusted capacity share changes which truck types are searched",
            ))
            .baseline_cost_per_order(load_f64_with_warning(
                Self::BASELINE_COST_VAR,
                SearchConfig::DEFAULT_BASELINE_COST_PER_ORDER,
                |value| value >= 0.0,
                "must not be negative",
                "Adjusted baseline cost changes reported savings",
            ))
            .max_evaluations(load_usize_with_warning(
                Self::MAX_EVALUATIONS_VAR,
                SearchConfig::DEFAULT_MAX_EVALUATIONS,
                |value| value > 0,
                "must be at least 1",
            ))
            .time_budget((time_budget > 0).then(|| Duration::from_millis(time_budget as u64)))
            .build()
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            log::warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            log::warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name,
                other
            );
            None
        }
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    warning: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => {
                if !validator(value) {
                    log::warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name,
                        raw,
                        invalid_hint,
                        default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        log::warn!("{} ({} = {}).", warning, var_name, value);
                    }
                    value
                }
            }
            Ok(_) => {
                log::warn!("{} ('{}') is not finite. Using {}.", var_name, raw, default);
                default
            }
            Err(err) => {
                log::warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

fn load_usize_with_warning(
    var_name: &str,
    default: usize,
    validator: impl Fn(usize) -> bool,
    invalid_hint: &str,
) -> usize {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if validator(value) => value,
            Ok(_) => {
                log::warn!(
                    "{} contains invalid value '{}': {}. Using {}.",
                    var_name,
                    raw,
                    invalid_hint,
                    default
                );
                default
            }
            Err(err) => {
                log::warn!(
                    "Could not parse {} ('{}') as integer: {}. Using {}.",
                    var_name,
                    raw,
                    err,
                    default
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bool_true_values() {
        assert_eq!(parse_bool("1", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("true", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("yes", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("y", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("on", "TEST_VAR"), Some(true));

        // Test case insensitivity
        assert_eq!(parse_bool("TRUE", "TEST_VAR"), Some(true));
        assert_eq!(parse_bool("ON", "TEST_VAR"), Some(true));

        // Test with whitespace
        assert_eq!(parse_bool(" true ", "TEST_VAR"), Some(true));
    }

    #[test]
    fn test_parse_bool_false_values() {
        assert_eq!(parse_bool("0", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("false", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("no", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool("off", "TEST_VAR"), Some(false));
        assert_eq!(parse_bool(" FALSE ", "TEST_VAR"), Some(false));
    }

    #[test]
    fn test_parse_bool_invalid_values() {
        assert_eq!(parse_bool("invalid", "TEST_VAR"), None);
        assert_eq!(parse_bool("2", "TEST_VAR"), None);
        assert_eq!(parse_bool("", "TEST_VAR"), None);
    }

    #[test]
    fn unset_variables_fall_back_to_defaults() {
        assert_eq!(
            load_f64_with_warning("FLEET_PACK_TEST_UNSET_F64", 5.0, |v| v > 0.0, "", ""),
            5.0
        );
        assert_eq!(
            load_usize_with_warning("FLEET_PACK_TEST_UNSET_USIZE", 4, |v| v > 0, ""),
            4
        );
    }

    #[test]
    fn accepted_environment_values_are_applied() {
        // SAFETY: no other test touches these variables.
        unsafe {
            env::set_var("FLEET_PACK_WORKERS", " 8 ");
            env::set_var("FLEET_PACK_TIME_BUDGET_MS", "250");
            env::set_var("FLEET_PACK_TEST_ACCEPTED_F64", "7.5");
        }
        let config = OptimizerConfig::from_env();
        let step = load_f64_with_warning("FLEET_PACK_TEST_ACCEPTED_F64", 5.0, |v| v > 0.0, "", "");
        unsafe {
            env::remove_var("FLEET_PACK_WORKERS");
            env::remove_var("FLEET_PACK_TIME_BUDGET_MS");
            env::remove_var("FLEET_PACK_TEST_ACCEPTED_F64");
        }

        assert_eq!(config.packing.worker_count, 8);
        assert_eq!(config.search.time_budget, Some(Duration::from_millis(250)));
        assert_eq!(step, 7.5);
    }

    #[test]
    fn rejected_environment_values_fall_back_to_defaults() {
        // SAFETY: no other test touches these variables.
        unsafe {
            env::set_var("FLEET_PACK_GRID_STEP", "-3");
            env::set_var("FLEET_PACK_MIN_CAPACITY_SHARE", "not-a-number");
            env::set_var("FLEET_PACK_TEST_REJECTED_F64", "inf");
            env::set_var("FLEET_PACK_TEST_REJECTED_USIZE", "0");
        }
        let config = OptimizerConfig::from_env();
        let infinite = load_f64_with_warning("FLEET_PACK_TEST_REJECTED_F64", 5.0, |v| v > 0.0, "", "");
        let zero = load_usize_with_warning("FLEET_PACK_TEST_REJECTED_USIZE", 4, |v| v > 0, "must be at least 1");
        unsafe {
            env::remove_var("FLEET_PACK_GRID_STEP");
            env::remove_var("FLEET_PACK_MIN_CAPACITY_SHARE");
            env::remove_var("FLEET_PACK_TEST_REJECTED_F64");
            env::remove_var("FLEET_PACK_TEST_REJECTED_USIZE");
        }

        assert_eq!(config.packing.grid_step, PackingConfig::DEFAULT_GRID_STEP);
        assert_eq!(config.search.min_capacity_share, SearchConfig::DEFAULT_MIN_CAPACITY_SHARE);
        assert_eq!(infinite, 5.0);
        assert_eq!(zero, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn default_config_uses_documented_defaults() {
        let config = OptimizerConfig::default();
        assert_eq!(config.packing.grid_step, PackingConfig::DEFAULT_GRID_STEP);
        assert_eq!(config.packing.worker_count, 4);
        assert_eq!(config.cost.fuel_price_per_liter, 90.0);
        assert_eq!(config.search.candidate_types, 5);
        assert_eq!(config.search.time_budget, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_names_the_broken_setting() {
        let mut config = OptimizerConfig::default();
        config.packing.grid_step = 0.0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfiguration(_)));
        assert!(err.to_string().contains("packing.grid_step"));

        let mut config = OptimizerConfig::default();
        config.search.min_capacity_share = 1.5;
        assert!(config.validate().is_err());
    }
}
