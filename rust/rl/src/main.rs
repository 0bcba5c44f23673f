use model_based_vi::{
    config::{Config, EnvironmentConfig},
    environments::{frozen_lake::FrozenLake, grid::GridTopology, gym_adapter::GymAdapter, DiscreteEnv},
    error::Result,
    experiment::{Experiment, ExperimentReport},
    report::{summary, PolicyGrid, QGrid, ValueGrid},
};

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = match std::env::args().nth(1) {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    cfg.validate()?;
    for warning in cfg.warnings() {
        tracing::warn!("{warning}");
    }
    tracing::info!(algorithm = ?cfg.algorithm, policy_mode = ?cfg.policy_mode, gamma = cfg.gamma, "starting");

    let (report, topology) = match &cfg.environment {
        EnvironmentConfig::Local { map, is_slippery } => {
            let make = || FrozenLake::new(map.as_slice(), *is_slippery, Some(cfg.max_episode_steps));
            let env = make()?;
            let topology = env.topology();
            (run(cfg.clone(), env, make()?, topology)?, topology)
        }
        EnvironmentConfig::Gym {
            url,
            env_id,
            map_name,
            is_slippery,
        } => {
            let make = || GymAdapter::frozen_lake(url, env_id, map_name, *is_slippery, cfg.max_episode_steps);
            let env = make()?;
            let topology = env.topology();
            (run(cfg.clone(), env, make()?, topology)?, topology)
        }
    };

    println!("{}", summary(&report));
    println!("Values:");
    print!(
        "{}",
        ValueGrid {
            values: &report.values,
            topology,
        }
    );
    println!("Policy:");
    print!(
        "{}",
        PolicyGrid {
            policy: &report.policy,
            topology,
        }
    );

    if let Some(q) = &report.q_table {
        println!("Action values:");
        print!("{}", QGrid { q });
    }

    Ok(())
}

fn run<E: DiscreteEnv>(cfg: Config, env: E, eval_env: E, topology: GridTopology) -> Result<ExperimentReport> {
    Experiment::new(cfg, env, eval_env, topology)?.run()
}
