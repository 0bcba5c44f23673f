use super::{grid::GridTopology, DiscreteEnv, StepOutcome};
use crate::error::{check_state, AgentError, Result};
use crate::mdps::action::Action;
use gymnasium::*;
use serde_json::Value;

/// A remote Gymnasium environment with discrete observations and actions.
pub struct GymAdapter {
    name: String,
    env: Environment,
    topology: GridTopology,
    n_s: usize,
    n_a: usize,
}

impl GymAdapter {
    pub fn new(env: Environment, name: &str) -> Result<Self> {
        let n_s = discrete_n(env.observation_space(), name, "observation")?;
        let n_a = discrete_n(env.action_space(), name, "action")?;
        if n_a != Action::ALL.len() {
            return Err(AgentError::EnvironmentProtocolViolation(format!(
                "'{name}' has {n_a} actions, grid moves need {}",
                Action::ALL.len()
            )));
        }
        let topology = GridTopology::square(n_s).ok_or_else(|| {
            AgentError::EnvironmentProtocolViolation(format!(
                "'{name}' has {n_s} states, which is not a square grid"
            ))
        })?;

        Ok(Self {
            name: name.to_string(),
            env,
            topology,
            n_s,
            n_a,
        })
    }

    /// Creates a FrozenLake instance on the server at `url`.
    pub fn frozen_lake(
        url: &str,
        env_id: &str,
        map_name: &str,
        is_slippery: bool,
        max_episode_steps: usize,
    ) -> Result<Self> {
        let env = Environment::new(
            url,
            env_id,
            Some(max_episode_steps as Discrete),
            Some(false),
            Some(true),
            &[
                ("map_name", Value::from(map_name)),
                ("is_slippery", Value::from(is_slippery)),
            ],
        )?;
        tracing::info!(env_id, instance_id = env.instance_id(), "connected to gymnasium server");

        Self::new(env, env_id)
    }

    pub fn topology(&self) -> GridTopology {
        self.topology
    }

    fn single_state(&self, obs: &[ObsActSpaceItem]) -> Result<Discrete> {
        match obs {
            [item] => {
                let s = item.discrete_value().ok_or_else(|| {
                    AgentError::EnvironmentProtocolViolation(format!(
                        "'{}' returned a non-discrete observation {item:?}",
                        self.name
                    ))
                })?;
                check_state(s, self.n_s)
            }
            _ => Err(AgentError::EnvironmentProtocolViolation(format!(
                "'{}' returned {} observation items, expected 1",
                self.name,
                obs.len()
            ))),
        }
    }
}

fn discrete_n(space: &ObsActSpace, name: &str, what: &str) -> Result<usize> {
    match space.n() {
        Some(n) if n > 0 => Ok(n as usize),
        _ => Err(AgentError::EnvironmentProtocolViolation(format!(
            "'{name}' {what} space {space:?} is not a non-empty Discrete space"
        ))),
    }
}

impl DiscreteEnv for GymAdapter {
    fn n_s(&self) -> usize {
        self.n_s
    }

    fn n_a(&self) -> usize {
        self.n_a
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Discrete> {
        let obs = self.env.reset(seed)?;
        self.single_state(&obs)
    }

    fn step(&mut self, action: Action) -> Result<StepOutcome> {
        let si = self.env.step(&[ObsActSpaceItem::Discrete(action.code())])?;

        Ok(StepOutcome {
            next_state: self.single_state(&si.observation)?,
            reward: si.reward,
            terminated: si.terminated,
            truncated: si.truncated,
        })
    }

    fn legal_actions(&self, s: Discrete) -> Vec<Action> {
        self.topology.legal_actions(s)
    }

    fn ground_truth(&self) -> Option<Transitions> {
        self.env
            .transitions()
            .map_err(|e| tracing::warn!(error = %e, "cannot fetch transitions"))
            .ok()
    }
}
