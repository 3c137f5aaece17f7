//! Registration and construction of environments by id.
//!
//! Training setups refer to environments by name; the registry maps an id
//! plus string-keyed kwargs to a ready-to-step episode. Every environment
//! in the crate shares `Vec<f32>` observations and actions, so the dynamic
//! surface is a plain object-safe trait rather than type-erased payloads.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::core::{Env, Info, Result, Step, TrafficError};
use crate::envs::{AccelEnv, DesiredVelocityEnv, Episode, RlEnv};
use crate::params::{EnvParams, KwArgs, OpenRoadParams, RingParams, SimParams, VehicleEnvParams};
use crate::sim::{OpenRoad, RingRoad};
use crate::spaces::BoxSpace;

/// Environment specification metadata.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EnvSpec {
    /// Unique identifier like "ring-accel-v0".
    pub id: String,
    /// Default episode horizon, for callers that size batches up front.
    pub horizon: Option<u32>,
    /// Target reward for a "solved" score, if defined.
    pub reward_threshold: Option<f32>,
    /// Free-form version string.
    pub version: Option<String>,
}

impl EnvSpec {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self { id: id.into(), horizon: None, reward_threshold: None, version: None }
    }
}

/// Object-safe episode surface returned by [`make`].
pub trait EnvDyn: Send {
    fn reset(&mut self, seed: Option<u64>) -> (Vec<f32>, Info);
    fn step(&mut self, action: Vec<f32>) -> Step<Vec<f32>>;
    fn action_space(&self) -> Result<BoxSpace>;
    fn observation_space(&self) -> Result<BoxSpace>;
    fn close(&mut self);
}

impl<E> EnvDyn for Episode<E>
where
    E: RlEnv + Send,
{
    fn reset(&mut self, seed: Option<u64>) -> (Vec<f32>, Info) {
        Env::reset(self, seed)
    }

    fn step(&mut self, action: Vec<f32>) -> Step<Vec<f32>> {
        Env::step(self, action)
    }

    fn action_space(&self) -> Result<BoxSpace> {
        self.env().action_space()
    }

    fn observation_space(&self) -> Result<BoxSpace> {
        self.env().observation_space()
    }

    fn close(&mut self) {
        Env::close(self)
    }
}

impl std::fmt::Debug for dyn EnvDyn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn EnvDyn")
    }
}

impl<T: EnvDyn + ?Sized> EnvDyn for Box<T> {
    fn reset(&mut self, seed: Option<u64>) -> (Vec<f32>, Info) {
        (**self).reset(seed)
    }

    fn step(&mut self, action: Vec<f32>) -> Step<Vec<f32>> {
        (**self).step(action)
    }

    fn action_space(&self) -> Result<BoxSpace> {
        (**self).action_space()
    }

    fn observation_space(&self) -> Result<BoxSpace> {
        (**self).observation_space()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Factory closure type for constructing environments from kwargs.
pub type FactoryFn = Box<dyn Fn(&KwArgs) -> Result<Box<dyn EnvDyn>> + Send + Sync>;

#[derive(Default)]
struct RegistryInner {
    specs: HashMap<String, EnvSpec>,
    factories: HashMap<String, FactoryFn>,
}

struct Registry {
    inner: RwLock<RegistryInner>,
}

impl Registry {
    fn new() -> Self {
        Self { inner: RwLock::new(RegistryInner::default()) }
    }

    fn register(&self, spec: EnvSpec, factory: FactoryFn) -> Result<()> {
        let mut g = self
            .inner
            .write()
            .map_err(|_| TrafficError::Registry("registry poisoned".into()))?;
        if g.specs.contains_key(&spec.id) {
            return Err(TrafficError::Registry(format!("env id already registered: {}", spec.id)));
        }
        g.factories.insert(spec.id.clone(), factory);
        g.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    /// Register unless the id is already taken; check and insert happen
    /// under one write lock so concurrent callers cannot collide.
    fn register_if_absent(&self, spec: EnvSpec, factory: FactoryFn) -> Result<()> {
        let mut g = self
            .inner
            .write()
            .map_err(|_| TrafficError::Registry("registry poisoned".into()))?;
        if g.specs.contains_key(&spec.id) {
            return Ok(());
        }
        g.factories.insert(spec.id.clone(), factory);
        g.specs.insert(spec.id.clone(), spec);
        Ok(())
    }

    fn get_spec(&self, id: &str) -> Option<EnvSpec> {
        let g = self.inner.read().ok()?;
        g.specs.get(id).cloned()
    }

    fn make(&self, id: &str, kwargs: &KwArgs) -> Result<Box<dyn EnvDyn>> {
        let g = self
            .inner
            .read()
            .map_err(|_| TrafficError::Registry("registry poisoned".into()))?;
        match g.factories.get(id) {
            Some(f) => f(kwargs),
            None => Err(TrafficError::UnknownEnv(id.to_string())),
        }
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Register an environment spec and its factory globally. Fails on a
/// duplicate id.
pub fn register(spec: EnvSpec, factory: FactoryFn) -> Result<()> {
    registry().register(spec, factory)
}

/// Fetch a registered EnvSpec by id.
pub fn get_spec(id: &str) -> Option<EnvSpec> {
    registry().get_spec(id)
}

/// Construct an environment by id. Parameter parsing happens here, eagerly:
/// missing or malformed kwargs fail the construction, not the first step.
pub fn make<S: AsRef<str>>(id: S, kwargs: &KwArgs) -> Result<Box<dyn EnvDyn>> {
    registry().make(id.as_ref(), kwargs)
}

fn ring_kernel(kwargs: &KwArgs) -> Result<(RingRoad, SimParams)> {
    let sim = SimParams::from_kwargs(kwargs)?;
    let ring = RingParams::from_kwargs(kwargs)?;
    Ok((RingRoad::new(ring, sim.seed), sim))
}

/// Register the built-in environment ids. Ids that are already present are
/// left untouched, so this is safe to call more than once.
pub fn register_defaults() -> Result<()> {
    let defaults = EnvParams::default();

    registry().register_if_absent(
        EnvSpec { horizon: Some(defaults.horizon), ..EnvSpec::new("ring-accel-v0") },
        Box::new(|kwargs| {
            let (kernel, sim) = ring_kernel(kwargs)?;
            let env = AccelEnv::new(
                kernel,
                sim,
                EnvParams::from_kwargs(kwargs)?,
                VehicleEnvParams::from_kwargs(kwargs)?,
            )?;
            Ok(Box::new(Episode::new(env)) as Box<dyn EnvDyn>)
        }),
    )?;

    registry().register_if_absent(
        EnvSpec {
            horizon: Some(defaults.horizon),
            reward_threshold: Some(0.9),
            ..EnvSpec::new("ring-velocity-v0")
        },
        Box::new(|kwargs| {
            let (kernel, sim) = ring_kernel(kwargs)?;
            let env = DesiredVelocityEnv::new(
                kernel,
                sim,
                EnvParams::from_kwargs(kwargs)?,
                VehicleEnvParams::from_kwargs(kwargs)?,
            )?;
            Ok(Box::new(Episode::new(env)) as Box<dyn EnvDyn>)
        }),
    )?;

    registry().register_if_absent(
        EnvSpec { horizon: Some(defaults.horizon), ..EnvSpec::new("open-accel-v0") },
        Box::new(|kwargs| {
            let sim = SimParams::from_kwargs(kwargs)?;
            let road = OpenRoadParams::from_kwargs(kwargs)?;
            let env = AccelEnv::new(
                OpenRoad::new(road, sim.seed),
                sim,
                EnvParams::from_kwargs(kwargs)?,
                VehicleEnvParams::from_kwargs(kwargs)?,
            )?;
            Ok(Box::new(Episode::new(env)) as Box<dyn EnvDyn>)
        }),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_kwargs() -> KwArgs {
        [("max_accel", "3"), ("max_decel", "3"), ("horizon", "10"), ("warmup_steps", "2")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn make_builds_a_steppable_ring_env() {
        register_defaults().unwrap();
        let mut env = make("ring-accel-v0", &base_kwargs()).unwrap();
        let (obs, _info) = env.reset(Some(0));
        assert_eq!(obs.len(), 2 * 22);
        let act = env.action_space().unwrap();
        assert_eq!(act.dim(), 1);
        let step = env.step(vec![1.0]);
        assert_eq!(step.observation.len(), obs.len());
    }

    #[test]
    fn missing_required_kwargs_fail_construction() {
        register_defaults().unwrap();
        let err = make("ring-accel-v0", &KwArgs::new()).unwrap_err();
        assert!(matches!(err, TrafficError::MissingParam(_)));
    }

    #[test]
    fn unknown_id_is_reported_as_such() {
        register_defaults().unwrap();
        let err = make("no-such-env-v9", &base_kwargs()).unwrap_err();
        assert!(matches!(err, TrafficError::UnknownEnv(_)));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        register_defaults().unwrap();
        let err = register(
            EnvSpec::new("ring-accel-v0"),
            Box::new(|_| Err(TrafficError::Registry("unreachable".into()))),
        )
        .unwrap_err();
        assert!(matches!(err, TrafficError::Registry(_)));
    }

    #[test]
    fn specs_carry_the_default_horizon() {
        register_defaults().unwrap();
        let spec = get_spec("ring-velocity-v0").unwrap();
        assert_eq!(spec.horizon, Some(EnvParams::default().horizon));
    }
}
