// mrcbf_sim/src/simulation/config/mod.rs

//! This module handles loading and validating the scenario configuration
//! from disk. Every field has a built-in default, so a scenario file only
//! needs to name what it changes.

pub mod structs;

use std::path::Path;

use figment::{
    providers::{Format, Toml},
    Figment,
};

pub use structs::{
    ControllerKind, MatrixConfig, MultirateConfig, ObstacleConfig, ObstacleList, PdConfig,
    ScenarioConfig, SimulationSettings, TimeGrid, VehicleConfig,
};

/// Loads a scenario, layering the TOML file (if any) over the defaults.
pub fn load_scenario(path: Option<&Path>) -> Result<ScenarioConfig, figment::Error> {
    let mut figment = Figment::new();
    if let Some(path) = path {
        log::info!("Loading scenario from: {}", path.display());
        figment = figment.merge(Toml::file(path));
    } else {
        log::info!("No scenario file given, using built-in defaults");
    }
    figment.extract()
}

/// Parses a scenario from TOML text.
pub fn parse_scenario(toml_text: &str) -> Result<ScenarioConfig, figment::Error> {
    Figment::new().merge(Toml::string(toml_text)).extract()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::presets::{DisturbancePreset, ReferencePreset};
    use mrcbf_core::control::barrier::ClassK;
    use mrcbf_core::control::multirate::MultirateSettings;
    use mrcbf_core::control::planner::TerminalCost;
    use mrcbf_core::error::ConfigError;
    use mrcbf_core::models::vehicle::VehicleParameters;
    use mrcbf_core::utils::integrators::IntegratorKind;

    #[test]
    fn empty_scenario_yields_defaults() {
        let config = parse_scenario("").unwrap();
        assert_eq!(config, ScenarioConfig::default());

        assert_eq!(config.controller, ControllerKind::Multirate);
        assert_eq!(config.vehicle.mass, 1.0);
        assert_eq!(config.vehicle.arm_length, 0.1);
        assert_eq!(config.multirate.slow_rate, 10.0);
        assert_eq!(config.multirate.fast_rate, 100.0);
        assert_eq!(config.multirate.class_k, ClassK::Linear { gain: 0.0001 });
        assert_eq!((config.multirate.c1, config.multirate.c2), (6.0, 5.0));
        assert_eq!(config.multirate.horizon, 5);
        assert_eq!(config.pd.kp_xyz, 0.02);
        assert_eq!(config.simulation.query_times.times().unwrap().len(), 51);
        assert_eq!(config.obstacles.0.len(), 1);
    }

    #[test]
    fn default_sections_convert_to_valid_settings() {
        let config = ScenarioConfig::default();
        assert!(VehicleParameters::try_from(&config.vehicle).is_ok());

        let settings = MultirateSettings::try_from(&config.multirate).unwrap();
        assert_eq!(settings.terminal, TerminalCost::Dare);
        assert_eq!(settings.weights.q()[(0, 0)], 5.0);
        assert_eq!(settings.weights.q()[(3, 3)], 1.0);
        assert_eq!(settings.weights.r()[(2, 2)], 0.01);
        assert_eq!(settings.filter.gains.fast_pole(), 3.0);

        assert_eq!(config.obstacles.build().unwrap().len(), 1);
        assert_eq!(config.simulation.initial_state().unwrap().len(), 12);
        assert!(config.simulation.bounds().unwrap().is_some());
    }

    #[test]
    fn partial_sections_override_single_fields() {
        let config = parse_scenario(
            r#"
            controller = "pd"

            [simulation]
            dt = 0.005
            integrator = "rk2"
            query_times = { start = 0.0, stop = 2.0, count = 21 }

            [multirate]
            slow_rate = 20.0
            class_k = { kind = "cubic", gain = 0.5 }
            p = [5.0, 5.0, 5.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]

            [pd.reference]
            type = "hover"
            position = [0.0, 0.0, 1.0]

            [disturbance]
            type = "constant_wind"
            acceleration = [0.05, 0.0, 0.0]
            "#,
        )
        .unwrap();

        assert_eq!(config.controller, ControllerKind::Pd);
        assert_eq!(config.simulation.dt, 0.005);
        assert_eq!(config.simulation.integrator, IntegratorKind::Rk2);
        assert_eq!(config.simulation.query_times.count, 21);
        assert_eq!(config.multirate.slow_rate, 20.0);
        assert_eq!(config.multirate.fast_rate, 100.0);
        assert_eq!(config.multirate.class_k, ClassK::Cubic { gain: 0.5 });
        assert_eq!(
            config.pd.reference,
            ReferencePreset::Hover {
                position: [0.0, 0.0, 1.0],
                yaw: 0.0
            }
        );
        assert!(matches!(config.disturbance, DisturbancePreset::ConstantWind { .. }));

        let settings = MultirateSettings::try_from(&config.multirate).unwrap();
        assert!(matches!(settings.terminal, TerminalCost::Fixed(_)));
    }

    #[test]
    fn obstacle_list_replaces_the_default() {
        let config = parse_scenario(
            r#"
            [[obstacles]]
            type = "sphere"
            center = [1.0, 0.0, 0.5]
            radius = 0.2

            [[obstacles]]
            type = "sphere"
            center = [-1.0, 0.0, 0.5]
            radius = 0.3
            "#,
        )
        .unwrap();
        assert_eq!(config.obstacles.0.len(), 2);

        let cleared = parse_scenario("obstacles = []").unwrap();
        assert!(cleared.obstacles.build().unwrap().is_empty());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(parse_scenario("[vehicle]\nmas = 2.0").is_err());
        assert!(parse_scenario("[simulation]\nseed = 3").is_err());
        assert!(parse_scenario("controller = \"lqr\"").is_err());
    }

    #[test]
    fn invalid_values_fail_conversion() {
        let config = parse_scenario(
            r#"
            [vehicle]
            mass = -1.0

            [multirate]
            fast_rate = 25.0
            q = [1.0, 2.0]

            [[obstacles]]
            type = "sphere"
            center = [0.0, 0.0, 0.0]
            radius = 0.0
            "#,
        )
        .unwrap();

        assert!(matches!(
            VehicleParameters::try_from(&config.vehicle),
            Err(ConfigError::NonPositiveParameter { name: "mass", .. })
        ));
        assert!(matches!(
            MultirateSettings::try_from(&config.multirate),
            Err(ConfigError::DimensionMismatch { name: "mpc_Q", .. })
        ));
        assert!(config.obstacles.build().is_err());

        // s^2 + 0.01 s + 0.005 has complex roots.
        let oscillating = parse_scenario("[multirate]\nc1 = 0.005\nc2 = 0.01").unwrap();
        assert!(matches!(
            MultirateSettings::try_from(&oscillating.multirate),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "c2"
        ));
    }

    #[test]
    fn matrices_accept_diagonal_or_full_form() {
        let diagonal = MatrixConfig::Diagonal(vec![1.0, 2.0]);
        let m = diagonal.to_matrix("m", 2).unwrap();
        assert_eq!(m[(1, 1)], 2.0);
        assert_eq!(m[(0, 1)], 0.0);

        let full = MatrixConfig::Full(vec![vec![1.0, 0.5], vec![0.5, 2.0]]);
        let m = full.to_matrix("m", 2).unwrap();
        assert_eq!(m[(0, 1)], 0.5);
        assert_eq!(m[(1, 0)], 0.5);

        let ragged = MatrixConfig::Full(vec![vec![1.0, 0.5], vec![0.5]]);
        assert!(matches!(
            ragged.to_matrix("m", 2),
            Err(ConfigError::MatrixShape { name: "m", .. })
        ));
    }

    #[test]
    fn bundled_scenarios_parse() {
        for text in [
            include_str!("../../../assets/scenarios/head_on.toml"),
            include_str!("../../../assets/scenarios/pd_circle.toml"),
        ] {
            let config = parse_scenario(text).unwrap();
            assert!(MultirateSettings::try_from(&config.multirate).is_ok());
            assert!(config.obstacles.build().is_ok());
            assert!(config.simulation.query_times.times().is_ok());
        }
    }

    #[test]
    fn time_grid_is_validated() {
        let grid = TimeGrid {
            start: 1.0,
            stop: 0.0,
            count: 5,
        };
        assert!(grid.times().is_err());
        let single = TimeGrid {
            start: 0.0,
            stop: 0.0,
            count: 1,
        };
        assert_eq!(single.times().unwrap(), vec![0.0]);
    }
}
