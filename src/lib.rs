pub mod core;
pub mod envs;
pub mod experiment;
pub mod params;
pub mod registry;
pub mod sim;
pub mod spaces;
pub mod train;
pub mod utils;
pub mod vector;

pub use crate::core::{Env, Info, InfoValue, Result, Step, TrafficError};
pub use crate::envs::{AccelEnv, DesiredVelocityEnv, Episode, RlEnv};
pub use crate::experiment::{ConstantPolicy, Experiment, Policy, RandomPolicy, RolloutStats};
pub use crate::params::{
    EnvParams, InflowParams, KwArgs, OpenRoadParams, RingParams, SimParams, VehicleEnvParams,
};
pub use crate::registry::{EnvDyn, EnvSpec, get_spec, make, register, register_defaults};
pub use crate::sim::{Kernel, OpenRoad, RingRoad, Vehicle, VehicleId, VehicleKind};
pub use crate::spaces::{BoxSpace, Space};
pub use crate::train::{LinearGaussianPolicy, Reinforce, TrainingConfig, TrainingReport};
pub use crate::vector::SyncVectorEnv;
