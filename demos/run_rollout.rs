use traffic_gym::{Experiment, KwArgs, RandomPolicy, make, register_defaults};

fn main() {
    env_logger::init();
    register_defaults().expect("default environments should register");

    let kwargs: KwArgs = [
        ("max_accel", "3"),
        ("max_decel", "3"),
        ("horizon", "300"),
        ("warmup_steps", "50"),
        ("num_vehicles", "22"),
        ("num_rl_vehicles", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let env = make("ring-accel-v0", &kwargs).expect("ring-accel-v0 should build");
    let mut experiment = Experiment::new(env);
    let stats = experiment
        .run(&mut RandomPolicy, 3, Some(0))
        .expect("rollouts should run");

    for (i, s) in stats.iter().enumerate() {
        println!(
            "rollout {}: steps={} return={:.2} mean_reward={:.2}",
            i + 1,
            s.steps,
            s.episode_return,
            s.mean_reward
        );
    }
}
