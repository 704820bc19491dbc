// mrcbf_core/src/control/multirate.rs

use std::fmt;
use std::sync::Arc;

use crate::control::planner::{HorizonPlanner, MpcWeights, PlanPacket, PlannerSettings, TerminalCost};
use crate::control::safety_filter::{SafetyFilter, SafetyFilterSettings};
use crate::control::telemetry::{DebugEntry, DebugLog};
use crate::control::Controller;
use crate::error::{require_positive, ConfigError, ControlError};
use crate::models::dynamics::quadrotor::RigidBodyModel;
use crate::obstacles::ObstacleSet;
use crate::types::{Control, ReferenceFn, State};

/// Relative tolerance on `fast_rate / slow_rate` being an integer.
pub const RATE_RATIO_TOL: f64 = 1e-9;
/// Slack when deciding whether a call falls on a fast tick.
const TICK_EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq)]
pub struct MultirateSettings {
    pub slow_rate: f64,
    pub fast_rate: f64,
    pub horizon: usize,
    pub weights: MpcWeights,
    pub terminal: TerminalCost,
    pub filter: SafetyFilterSettings,
}

/// Number of fast ticks per slow tick, `N = fast_rate / slow_rate`.
pub fn ticks_per_plan(slow_rate: f64, fast_rate: f64) -> Result<usize, ConfigError> {
    let slow = require_positive("slow_rate", slow_rate)?;
    let fast = require_positive("fast_rate", fast_rate)?;

    let ratio = fast / slow;
    let rounded = ratio.round();
    if rounded < 1.0 || (ratio - rounded).abs() > RATE_RATIO_TOL * ratio {
        return Err(ConfigError::InvalidRateRatio { slow, fast });
    }
    Ok(rounded as usize)
}

/// Hand-off between the planning and filtering stages.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanState {
    /// No plan has been issued yet.
    AwaitingPlan,
    /// A plan is cached; `step_index` counts fast ticks since it was issued.
    Armed {
        plan: Arc<PlanPacket>,
        step_index: usize,
    },
}

/// Slow horizon planner feeding a fast safety filter.
///
/// Fast tick `k` falls at `t0 + k / fast_rate`, where `t0` is the time of the
/// first call. Every `N`th fast tick (starting with tick 0) first replans.
/// Each fast tick takes the first input of the cached plan, passes it through
/// the safety filter and logs the result. A plan step lasts one slow period and
/// the plan is replaced every slow period, so only step 0 is ever applied.
/// Calls that fall between ticks return the last filtered input.
///
/// The first call also checks that the safety filter can hold the initial state.
pub struct MultirateController {
    planner: HorizonPlanner,
    filter: SafetyFilter,
    fast_period: f64,
    ticks_per_plan: usize,
    plan_state: PlanState,
    last_input: Control,
    start_time: Option<f64>,
    fast_ticks: u64,
    plans_issued: u64,
    log: DebugLog,
}

impl fmt::Debug for MultirateController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultirateController")
            .field("fast_period", &self.fast_period)
            .field("ticks_per_plan", &self.ticks_per_plan)
            .field("fast_ticks", &self.fast_ticks)
            .field("plans_issued", &self.plans_issued)
            .finish_non_exhaustive()
    }
}

impl MultirateController {
    pub fn new(
        model: RigidBodyModel,
        obstacles: Arc<ObstacleSet>,
        reference: ReferenceFn,
        settings: MultirateSettings,
    ) -> Result<Self, ControlError> {
        let ticks_per_plan = ticks_per_plan(settings.slow_rate, settings.fast_rate)?;
        settings.filter.class_k.validate()?;

        let last_input = model.hover_input();
        let planner = HorizonPlanner::new(
            model.clone(),
            reference,
            PlannerSettings {
                slow_rate: settings.slow_rate,
                horizon: settings.horizon,
                weights: settings.weights,
                terminal: settings.terminal,
            },
        )?;
        let filter = SafetyFilter::new(model, obstacles, settings.filter);

        log::info!(
            "Multirate controller: plan every {} fast ticks ({} Hz / {} Hz), horizon {}, {} obstacles",
            ticks_per_plan,
            settings.fast_rate,
            settings.slow_rate,
            planner.horizon(),
            filter.obstacles().len()
        );

        Ok(Self {
            planner,
            filter,
            fast_period: 1.0 / settings.fast_rate,
            ticks_per_plan,
            plan_state: PlanState::AwaitingPlan,
            last_input,
            start_time: None,
            fast_ticks: 0,
            plans_issued: 0,
            log: DebugLog::new(),
        })
    }

    pub fn plans_issued(&self) -> u64 {
        self.plans_issued
    }

    pub fn fast_ticks(&self) -> u64 {
        self.fast_ticks
    }

    pub fn ticks_per_plan(&self) -> usize {
        self.ticks_per_plan
    }

    pub fn plan_state(&self) -> &PlanState {
        &self.plan_state
    }

    /// Fast ticks since the cached plan was issued.
    pub fn step_index(&self) -> Option<usize> {
        match &self.plan_state {
            PlanState::AwaitingPlan => None,
            PlanState::Armed { step_index, .. } => Some(*step_index),
        }
    }

    pub fn current_plan(&self) -> Option<&Arc<PlanPacket>> {
        match &self.plan_state {
            PlanState::AwaitingPlan => None,
            PlanState::Armed { plan, .. } => Some(plan),
        }
    }

    /// The input currently held. Hover before the first tick.
    pub fn last_input(&self) -> &Control {
        &self.last_input
    }

    pub fn planner(&self) -> &HorizonPlanner {
        &self.planner
    }

    pub fn filter(&self) -> &SafetyFilter {
        &self.filter
    }

    fn tick_is_due(&self, t: f64) -> bool {
        match self.start_time {
            None => true,
            Some(t0) => t >= t0 + self.fast_ticks as f64 * self.fast_period - TICK_EPS,
        }
    }

    /// Planned input for the current fast tick, advancing the step index.
    fn next_planned_input(&mut self) -> Control {
        match &mut self.plan_state {
            PlanState::AwaitingPlan => self.last_input.clone(),
            PlanState::Armed { plan, step_index } => {
                *step_index += 1;
                plan.input(0).clone()
            }
        }
    }
}

impl Controller for MultirateController {
    fn compute_input(&mut self, state: &State, t: f64) -> Result<Control, ControlError> {
        if !self.tick_is_due(t) {
            return Ok(self.last_input.clone());
        }
        if self.start_time.is_none() {
            self.filter.check_recoverable(state)?;
            self.start_time = Some(t);
        }

        // 1. Slow tick: replace the cached plan whole.
        if self.fast_ticks % self.ticks_per_plan as u64 == 0 {
            let plan = self.planner.plan(state, t)?;
            self.plans_issued += 1;
            self.plan_state = PlanState::Armed {
                plan: Arc::new(plan),
                step_index: 0,
            };
        }

        // 2. Fast tick: certify the planned input.
        let planned = self.next_planned_input();
        let outcome = self.filter.filter(state, &planned)?;
        if !outcome.active.is_empty() {
            log::trace!(
                "t={t:.3}: active constraints {}",
                outcome
                    .active
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        // 3. Record and hold.
        self.log.push(DebugEntry {
            time: t,
            true_state: state.clone(),
            ref_state: (self.planner.reference())(t),
            input: outcome.input.clone(),
            input_fast: Some(&outcome.input - &planned),
            input_slow: Some(planned),
        });
        self.fast_ticks += 1;
        self.last_input = outcome.input;

        Ok(self.last_input.clone())
    }

    fn debug_log(&self) -> &DebugLog {
        &self.log
    }

    fn control_period(&self) -> Option<f64> {
        Some(self.fast_period)
    }
}
