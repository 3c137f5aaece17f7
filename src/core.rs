// Core trait and types shared by every environment in the crate.

/// A small ordered key-value map carried alongside observations.
/// Environments put auxiliary per-step scalars here (e.g. mean speed);
/// callers that don't care can ignore it entirely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Create an empty Info map.
    pub fn new() -> Self { Self { entries: Vec::new() } }

    /// Insert or replace a key with the given value.
    pub fn insert<K: Into<String>>(&mut self, key: K, value: InfoValue) {
        let k = key.into();
        if let Some((_, v)) = self.entries.iter_mut().find(|(kk, _)| kk == &k) {
            *v = value;
        } else {
            self.entries.push((k, value));
        }
    }

    /// Get a reference to a value by key.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn len(&self) -> usize { self.entries.len() }
}

/// Value types commonly stored in info maps.
#[derive(Clone, Debug, PartialEq)]
pub enum InfoValue {
    Bool(bool),
    I64(i64),
    F64(f64),
    Str(String),
}

impl From<bool> for InfoValue { fn from(v: bool) -> Self { InfoValue::Bool(v) } }
impl From<i64> for InfoValue { fn from(v: i64) -> Self { InfoValue::I64(v) } }
impl From<usize> for InfoValue { fn from(v: usize) -> Self { InfoValue::I64(v as i64) } }
impl From<f64> for InfoValue { fn from(v: f64) -> Self { InfoValue::F64(v) } }
impl From<f32> for InfoValue { fn from(v: f32) -> Self { InfoValue::F64(v as f64) } }
impl From<&str> for InfoValue { fn from(v: &str) -> Self { InfoValue::Str(v.to_string()) } }
impl From<String> for InfoValue { fn from(v: String) -> Self { InfoValue::Str(v) } }

/// A step result from the environment.
#[derive(Clone, Debug, PartialEq)]
pub struct Step<Obs> {
    pub observation: Obs,
    pub reward: f32,
    /// The episode reached a terminal state (a collision, here).
    pub terminated: bool,
    /// The episode was cut off by the configured horizon.
    pub truncated: bool,
    pub info: Info,
}

impl<Obs> Step<Obs> {
    pub fn new(observation: Obs, reward: f32, terminated: bool, truncated: bool, info: Info) -> Self {
        Self { observation, reward, terminated, truncated, info }
    }

    /// Whether the episode is over for either reason.
    pub fn done(&self) -> bool { self.terminated || self.truncated }
}

/// Recoverable errors across the crate.
///
/// Everything here is a configuration or caller error surfaced synchronously;
/// there are no retries and no recovery paths.
#[derive(thiserror::Error, Debug)]
pub enum TrafficError {
    #[error("missing required parameter: {0}")]
    MissingParam(String),
    #[error("invalid parameter {name}: {reason}")]
    InvalidParam { name: String, reason: String },
    #[error("invalid space bounds: {0}")]
    InvalidSpace(String),
    #[error("invalid action: {0}")]
    InvalidAction(String),
    #[error("unknown environment id: {0}")]
    UnknownEnv(String),
    #[error("registry error: {0}")]
    Registry(String),
    #[error("training error: {0}")]
    Training(String),
}

/// Convenience alias for results using TrafficError.
pub type Result<T> = std::result::Result<T, TrafficError>;

/// Core environment trait: the reset/step cycle a rollout driver or trainer
/// runs against. Environments are single-threaded and synchronous; anything
/// parallel holds one independent instance per worker.
pub trait Env {
    type Obs;
    type Act;

    /// Reset to an initial state. Implementations re-seed internal RNGs when
    /// `seed` is provided.
    fn reset(&mut self, seed: Option<u64>) -> (Self::Obs, Info);

    /// Apply an action and advance the environment by one step.
    fn step(&mut self, action: Self::Act) -> Step<Self::Obs>;

    /// Release any external resources.
    fn close(&mut self) {}
}
