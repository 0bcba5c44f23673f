use crate::environments::frozen_lake::MAP_4X4;
use crate::error::{AgentError, Result};
use crate::mdps::{empirical::RewardShaping, solvers::policy::PolicyMode};
use gymnasium::Continous;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    /// Learn a model from random steps, then plan on it.
    #[default]
    ValueIteration,
    /// Update action values straight from random steps.
    QLearning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnvironmentConfig {
    /// In-process FrozenLake.
    Local {
        #[serde(default = "default_map")]
        map: Vec<String>,
        #[serde(default)]
        is_slippery: bool,
    },
    /// FrozenLake served by a Gymnasium HTTP API server.
    Gym {
        url: String,
        #[serde(default = "default_env_id")]
        env_id: String,
        #[serde(default = "default_map_name")]
        map_name: String,
        #[serde(default)]
        is_slippery: bool,
    },
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        EnvironmentConfig::Local {
            map: default_map(),
            is_slippery: false,
        }
    }
}

impl EnvironmentConfig {
    pub fn is_slippery(&self) -> bool {
        match self {
            EnvironmentConfig::Local { is_slippery, .. } | EnvironmentConfig::Gym { is_slippery, .. } => {
                *is_slippery
            }
        }
    }
}

fn default_map() -> Vec<String> {
    MAP_4X4.iter().map(|r| r.to_string()).collect()
}

fn default_env_id() -> String {
    "FrozenLake-v1".into()
}

fn default_map_name() -> String {
    "4x4".into()
}

/// Run settings. Every field may be omitted from the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gamma: Continous,
    /// Bellman sweeps per solve.
    pub sweep_count: usize,
    /// Stop a solve early once a sweep changes no value by more than this.
    pub theta: Option<Continous>,
    /// Random steps per collection phase.
    pub batch_size: usize,
    pub eval_episodes: usize,
    pub success_threshold: Continous,
    pub hole_penalty: Continous,
    pub goal_reward: Continous,
    pub move_reward: Continous,
    pub seed: u64,
    /// Collection/solve/evaluate rounds before giving up.
    pub max_iterations: usize,
    pub max_episode_steps: usize,
    pub policy_mode: PolicyMode,
    pub algorithm: Algorithm,
    /// Q-learning step size.
    pub alpha: Continous,
    pub environment: EnvironmentConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gamma: 0.9,
            sweep_count: 100,
            theta: None,
            batch_size: 100,
            eval_episodes: 20,
            success_threshold: 0.8,
            hole_penalty: -1.,
            goal_reward: 1.,
            move_reward: 0.,
            seed: 42,
            max_iterations: 10_000,
            max_episode_steps: 100,
            policy_mode: PolicyMode::default(),
            algorithm: Algorithm::default(),
            alpha: 0.2,
            environment: EnvironmentConfig::default(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: Config = serde_json::from_str(text)?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(AgentError::InvalidConfig(msg.to_string()));

        if !(self.gamma > 0. && self.gamma < 1.) {
            return invalid("gamma must lie in (0, 1)");
        }
        if !(0. ..=1.).contains(&self.success_threshold) {
            return invalid("success_threshold must lie in [0, 1]");
        }
        if !(self.alpha > 0. && self.alpha <= 1.) {
            return invalid("alpha must lie in (0, 1]");
        }
        if self.theta.is_some_and(|t| t.is_nan() || t < 0.) {
            return invalid("theta must not be negative");
        }
        if self.sweep_count == 0
            || self.batch_size == 0
            || self.eval_episodes == 0
            || self.max_iterations == 0
            || self.max_episode_steps == 0
        {
            return invalid("counts must be positive");
        }
        if self.goal_reward <= self.move_reward {
            return invalid("goal_reward must exceed move_reward");
        }

        Ok(())
    }

    /// Settings that are valid but unlikely to ever reach the success threshold.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.environment.is_slippery()
            && self.algorithm == Algorithm::ValueIteration
            && self.policy_mode == PolicyMode::Topology
        {
            warnings.push(
                "topology policies ignore slipping and rarely solve a slippery lake, consider policy_mode \"model\""
                    .to_string(),
            );
        }

        warnings
    }

    pub fn shaping(&self) -> RewardShaping {
        RewardShaping {
            goal_reward: self.goal_reward,
            hole_penalty: self.hole_penalty,
            move_reward: self.move_reward,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn partial_file_overrides_some_fields() {
        let cfg = Config::from_json(
            r#"{
                "gamma": 0.95,
                "hole_penalty": -10,
                "goal_reward": 10,
                "policy_mode": "model",
                "algorithm": "q_learning",
                "environment": {"kind": "gym", "url": "http://127.0.0.1:40004", "is_slippery": true}
            }"#,
        )
        .unwrap();

        assert_eq!(cfg.gamma, 0.95);
        assert_eq!(cfg.shaping().hole_penalty, -10.);
        assert_eq!(cfg.policy_mode, PolicyMode::Model);
        assert_eq!(cfg.algorithm, Algorithm::QLearning);
        assert_eq!(cfg.sweep_count, 100);
        assert_eq!(
            cfg.environment,
            EnvironmentConfig::Gym {
                url: "http://127.0.0.1:40004".into(),
                env_id: "FrozenLake-v1".into(),
                map_name: "4x4".into(),
                is_slippery: true,
            }
        );
    }

    #[rstest]
    #[case(r#"{"gamma": 1.0}"#)]
    #[case(r#"{"gamma": 0}"#)]
    #[case(r#"{"success_threshold": 1.5}"#)]
    #[case(r#"{"eval_episodes": 0}"#)]
    #[case(r#"{"theta": -1e-3}"#)]
    #[case(r#"{"goal_reward": 0}"#)]
    fn out_of_range_values_are_rejected(#[case] text: &str) {
        assert!(matches!(
            Config::from_json(text),
            Err(AgentError::InvalidConfig(_))
        ));
    }

    #[rstest]
    #[case(r#"{"environment": {"kind": "local", "is_slippery": true}}"#, 1)]
    #[case(r#"{"environment": {"kind": "local", "is_slippery": true}, "policy_mode": "model"}"#, 0)]
    #[case(r#"{"environment": {"kind": "local", "is_slippery": true}, "algorithm": "q_learning"}"#, 0)]
    #[case(r#"{"environment": {"kind": "gym", "url": "http://127.0.0.1:40004", "is_slippery": true}}"#, 1)]
    #[case(r#"{}"#, 0)]
    fn topology_policy_on_a_slippery_lake_is_flagged(#[case] text: &str, #[case] n: usize) {
        assert_eq!(Config::from_json(text).unwrap().warnings().len(), n);
    }

    #[test]
    fn unknown_policy_mode_is_a_parse_error() {
        assert!(matches!(
            Config::from_json(r#"{"policy_mode": "psychic"}"#),
            Err(AgentError::Json(_))
        ));
    }
}
