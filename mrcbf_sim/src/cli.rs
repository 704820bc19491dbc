// mrcbf_sim/src/cli.rs

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::simulation::config::{ControllerKind, ObstacleList, ScenarioConfig};

/// mrcbf_sim: closed-loop simulation of a safety-filtered quadrotor.
///
/// Runs a scenario with either the multirate planner/filter controller or the
/// PD baseline and prints a summary of the run.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the scenario TOML file to run. Built-in defaults apply when omitted.
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,

    /// Override the controller named in the scenario.
    #[arg(short, long, value_enum)]
    pub controller: Option<ControllerArg>,

    /// Drop every obstacle from the scenario.
    #[arg(long, default_value_t = false)]
    pub no_obstacles: bool,

    /// Write the controller telemetry as CSV to this path ("-" for stdout).
    #[arg(long, value_name = "PATH")]
    pub dump_log: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerArg {
    Multirate,
    Pd,
}

impl From<ControllerArg> for ControllerKind {
    fn from(arg: ControllerArg) -> Self {
        match arg {
            ControllerArg::Multirate => ControllerKind::Multirate,
            ControllerArg::Pd => ControllerKind::Pd,
        }
    }
}

impl Cli {
    /// Applies the command-line overrides on top of a loaded scenario.
    pub fn apply_overrides(&self, config: &mut ScenarioConfig) {
        if let Some(controller) = self.controller {
            config.controller = controller.into();
        }
        if self.no_obstacles {
            config.obstacles = ObstacleList(Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_controller_and_obstacles() {
        let cli = Cli::parse_from(["mrcbf_sim", "--controller", "pd", "--no-obstacles"]);
        let mut config = ScenarioConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.controller, ControllerKind::Pd);
        assert!(config.obstacles.0.is_empty());
        assert!(cli.scenario.is_none());
    }

    #[test]
    fn no_flags_leave_the_scenario_untouched() {
        let cli = Cli::parse_from(["mrcbf_sim", "--dump-log", "-"]);
        let mut config = ScenarioConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config, ScenarioConfig::default());
        assert_eq!(cli.dump_log, Some(PathBuf::from("-")));
    }
}
