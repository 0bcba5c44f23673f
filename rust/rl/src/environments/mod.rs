pub mod frozen_lake;
pub mod grid;
pub mod gym_adapter;

use crate::error::Result;
use crate::mdps::action::Action;
use gymnasium::{Continous, Discrete, Transitions};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub next_state: Discrete,
    pub reward: Continous,
    pub terminated: bool,
    pub truncated: bool,
}

impl StepOutcome {
    pub fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

/// An episodic environment with discrete observations and actions.
pub trait DiscreteEnv {
    fn n_s(&self) -> usize;

    fn n_a(&self) -> usize;

    /// Starts a new episode and returns the start state.
    fn reset(&mut self, seed: Option<u64>) -> Result<Discrete>;

    fn step(&mut self, action: Action) -> Result<StepOutcome>;

    /// Actions that keep the agent on the grid from `s`.
    fn legal_actions(&self, s: Discrete) -> Vec<Action>;

    /// True dynamics, when the environment is able to report them.
    fn ground_truth(&self) -> Option<Transitions> {
        None
    }
}
