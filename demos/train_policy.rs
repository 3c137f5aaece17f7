use traffic_gym::{
    AccelEnv, EnvParams, Episode, Reinforce, RingParams, RingRoad, SimParams, TrainingConfig,
    VehicleEnvParams,
};

fn worker() -> Episode<AccelEnv<RingRoad>> {
    let ring = RingParams { num_vehicles: 10, num_rl_vehicles: 2, ..RingParams::default() };
    Episode::new(
        AccelEnv::new(
            RingRoad::new(ring, None),
            SimParams::default(),
            EnvParams { horizon: 100, warmup_steps: 20, ..EnvParams::default() },
            VehicleEnvParams::default(),
        )
        .expect("ring env should build"),
    )
}

fn main() {
    env_logger::init();

    let config = TrainingConfig {
        num_workers: 4,
        training_iterations: 25,
        learning_rate: 1e-3,
        seed: 1,
        ..TrainingConfig::default()
    };
    let trainer = Reinforce::new(config).expect("config should validate");
    let (_policy, report) = trainer.train(worker).expect("training should run");

    for s in &report.iterations {
        println!(
            "iteration {:>3}: mean_return={:8.3} mean_len={:5.1}",
            s.iteration, s.mean_return, s.mean_episode_len
        );
    }
}
