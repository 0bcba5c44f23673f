use super::MdpSolver;
use crate::environments::grid::GridTopology;
use crate::mdps::action::Action;
use gymnasium::{Continous, Discrete};
use serde::{Deserialize, Serialize};

pub trait Policy {
    /// Action for `s`, or `None` when the policy has no preference there.
    fn policy(&self, s: Discrete) -> Option<Action>;
}

/// How a greedy policy is read off a value table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyMode {
    /// Compare the values of the deterministic grid neighbours.
    #[default]
    Topology,
    /// Compare the action values under the learned transition model.
    Model,
}

/// One optional action per state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GreedyPolicy {
    actions: Vec<Option<Action>>,
}

impl GreedyPolicy {
    pub fn new(actions: Vec<Option<Action>>) -> Self {
        Self { actions }
    }

    /// A policy with no action anywhere.
    pub fn empty(n_s: usize) -> Self {
        Self::new(vec![None; n_s])
    }

    /// For every state, the legal move whose neighbour has the highest value
    /// above zero. States with no such neighbour get no action.
    pub fn from_topology(values: &[Continous], topology: &GridTopology) -> Self {
        let actions = (0..values.len() as Discrete)
            .map(|s| {
                let mut best = None;
                let mut best_value = 0.;
                for a in topology.legal_actions(s) {
                    let v = values[topology.destination(s, a) as usize];
                    if v > best_value {
                        best = Some(a);
                        best_value = v;
                    }
                }
                best
            })
            .collect();

        Self::new(actions)
    }

    /// Argmax of the solver's action values under its model.
    pub fn from_solver<S: MdpSolver + ?Sized>(solver: &S, n_s: usize) -> Self {
        let actions = (0..n_s as Discrete)
            .map(|s| solver.pi_star(s).and_then(|a| Action::try_from(a).ok()))
            .collect();

        Self::new(actions)
    }

    pub fn actions(&self) -> &[Option<Action>] {
        &self.actions
    }

    pub fn n_s(&self) -> usize {
        self.actions.len()
    }
}

impl Policy for GreedyPolicy {
    fn policy(&self, s: Discrete) -> Option<Action> {
        self.actions.get(s as usize).copied().flatten()
    }
}
