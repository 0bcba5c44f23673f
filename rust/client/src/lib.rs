extern crate reqwest;
extern crate serde;
extern crate serde_json;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::ser::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;
use value_extensions::*;

pub type Discrete = i32;
pub type Continous = f64;

pub type GymResult<T> = Result<T, GymError>;

#[derive(Debug, Error)]
pub enum GymError {
    #[error("request to '{url}' failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response is missing field '{0}'")]
    MissingField(String),

    #[error("field '{field}' has an unexpected value: {value}")]
    UnexpectedValue { field: String, value: Value },

    #[error("unsupported space: {0}")]
    UnsupportedSpace(String),

    #[error("action {action:?} does not fit the action space {space:?}")]
    InvalidAction {
        action: Vec<ObsActSpaceItem>,
        space: ObsActSpace,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ObsActSpaceItem {
    Discrete(Discrete),
    Continous(Continous),
}

impl ObsActSpaceItem {
    pub fn discrete_value(&self) -> Option<Discrete> {
        if let Self::Discrete(n) = self {
            Some(*n)
        } else {
            None
        }
    }

    pub fn box_value(&self) -> Option<Continous> {
        if let Self::Continous(n) = self {
            Some(*n)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObsActSpace {
    /// Refer: https://www.gymlibrary.dev/api/spaces/#discrete
    Discrete { n: Discrete },

    /// Refer: https://www.gymlibrary.dev/api/spaces/#box
    Box {
        shape: Vec<Discrete>,
        high: Vec<Continous>,
        low: Vec<Continous>,
    },
}

impl ObsActSpace {
    pub fn from_json(info: &Map<String, Value>) -> GymResult<Self> {
        let name = info
            .get("name")
            .ok_or_else(|| GymError::MissingField("name".into()))?;
        match name.as_str() {
            Some("Discrete") => Ok(ObsActSpace::Discrete {
                n: as_discrete(info, "n")?,
            }),
            Some("Box") => Ok(ObsActSpace::Box {
                shape: as_discrete_item_vec(info, "shape")?,
                high: as_continous_item_vec(info, "high")?,
                low: as_continous_item_vec(info, "low")?,
            }),
            Some(e) => Err(GymError::UnsupportedSpace(e.to_string())),
            None => Err(unexpected("name", name)),
        }
    }

    /// Number of elements for a Discrete space.
    pub fn n(&self) -> Option<Discrete> {
        match self {
            ObsActSpace::Discrete { n } => Some(*n),
            _ => None,
        }
    }

    pub fn items_from_json(&self, vals: &[Value]) -> GymResult<Vec<ObsActSpaceItem>> {
        match self {
            ObsActSpace::Discrete { .. } => vals
                .iter()
                .map(|v| {
                    v.as_i64()
                        .map(|n| ObsActSpaceItem::Discrete(n as Discrete))
                        .ok_or_else(|| unexpected("observation", v))
                })
                .collect(),

            ObsActSpace::Box { .. } => vals
                .iter()
                .map(|v| {
                    v.as_f64()
                        .map(ObsActSpaceItem::Continous)
                        .ok_or_else(|| unexpected("observation", v))
                })
                .collect(),
        }
    }

    /// Wire form of an action for the `step/` endpoint.
    pub fn action_to_json(&self, action: &[ObsActSpaceItem]) -> GymResult<Value> {
        let invalid = || GymError::InvalidAction {
            action: action.to_vec(),
            space: self.clone(),
        };

        match self {
            ObsActSpace::Discrete { n } => match action {
                [ObsActSpaceItem::Discrete(a)] if (0..*n).contains(a) => Ok(Value::from(*a)),
                _ => Err(invalid()),
            },

            ObsActSpace::Box { shape, .. } => {
                if shape.first().map(|&s| s as usize) != Some(action.len()) {
                    return Err(invalid());
                }
                let vals = action
                    .iter()
                    .map(|a| a.box_value().ok_or_else(invalid))
                    .collect::<GymResult<Vec<_>>>()?;
                Ok(Value::from(vals))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub next_state: Discrete,
    pub probability: Continous,
    pub reward: Continous,
    pub done: bool,
}

pub type Transitions = HashMap<(Discrete, Discrete), Vec<Transition>>;

#[derive(Debug)]
pub struct StepInfo {
    pub observation: Vec<ObsActSpaceItem>,
    pub reward: f64,
    pub truncated: bool,
    pub terminated: bool,
    pub info: Value,
}

impl StepInfo {
    pub fn from_json(obj: &Value, obs_space: &ObsActSpace) -> GymResult<Self> {
        let observation = field(obj, "observation")?;
        let observation = observation
            .as_array()
            .ok_or_else(|| unexpected("observation", observation))?;

        Ok(StepInfo {
            observation: obs_space.items_from_json(observation)?,
            reward: as_f64(obj, "reward")?,
            truncated: as_bool(obj, "truncated")?,
            terminated: as_bool(obj, "terminated")?,
            info: obj.get("info").cloned().unwrap_or(Value::Null),
        })
    }
}

/// Parses the `action` of an `action_space/sample` reply, a scalar or an array.
pub fn sampled_action_from_json(obj: &Value, space: &ObsActSpace) -> GymResult<Vec<ObsActSpaceItem>> {
    let action = field(obj, "action")?;
    match action.as_array() {
        Some(vals) => space.items_from_json(vals),
        None => space.items_from_json(std::slice::from_ref(action)),
    }
}

/// Parses the `transitions/` payload: `{"s": {"a": [[p, s', r, done], ..]}}`.
pub fn transitions_from_json(obj: &Value, n_s: Discrete, n_a: Discrete) -> GymResult<Transitions> {
    let mut transitions: Transitions = HashMap::new();
    for s in 0..n_s {
        let s_trans = field(obj, &s.to_string())?;
        for a in 0..n_a {
            let a_trans = field(s_trans, &a.to_string())?;
            let a_trans = a_trans
                .as_array()
                .ok_or_else(|| unexpected("transitions", a_trans))?;
            let ts = a_trans
                .iter()
                .map(|t| match t.as_array().map(|t| t.as_slice()) {
                    Some([p, s1, r, d]) => Ok(Transition {
                        probability: p.as_f64().ok_or_else(|| unexpected("probability", p))?,
                        next_state: s1.as_i64().ok_or_else(|| unexpected("next_state", s1))?
                            as Discrete,
                        reward: r.as_f64().ok_or_else(|| unexpected("reward", r))?,
                        done: d.as_bool().ok_or_else(|| unexpected("done", d))?,
                    }),
                    _ => Err(unexpected("transition", t)),
                })
                .collect::<GymResult<Vec<_>>>()?;

            transitions.insert((s, a), ts);
        }
    }

    Ok(transitions)
}

/// Create a gymnasium environment or get reference to an existing one.
/// NOTE: All APIs are sync for now as the server is expected to be local.
#[derive(Debug)]
pub struct Environment {
    client: Client,
    api_url: String,
    instance_id: String,
    obs_space: ObsActSpace,
    act_space: ObsActSpace,
}

impl Environment {
    pub fn new(
        api_url: &str,
        env_name: &str,
        max_episode_steps: Option<Discrete>,
        auto_reset: Option<bool>,
        disable_env_checker: Option<bool>,
        kwargs: &[(&str, Value)],
    ) -> GymResult<Self> {
        let mut body = HashMap::from([("env_id", Value::from(env_name))]);

        if let Some(max_episode_steps) = max_episode_steps {
            body.insert("max_episode_steps", Value::from(max_episode_steps));
        }

        if let Some(auto_reset) = auto_reset {
            body.insert("auto_reset", Value::from(auto_reset));
        }

        if let Some(disable_env_checker) = disable_env_checker {
            body.insert("disable_env_checker", Value::from(disable_env_checker));
        }

        let kwargs = kwargs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect::<Map<String, Value>>();
        body.insert("kwargs", Value::Object(kwargs));

        let c = Client::new(api_url)?;
        let base_url = c.make_api_url("");
        let obj = c.http_post(&base_url, &body)?;
        let inst_id = as_str(&obj, "instance_id")?;
        tracing::debug!(env_name, instance_id = inst_id, "created environment");

        Self::reference(api_url, inst_id)
    }

    pub fn reference(api_url: &str, instance_id: &str) -> GymResult<Self> {
        let client = Client::new(api_url)?;

        let url = client.make_api_url(&format!("{instance_id}/observation_space/"));
        let obs_space = ObsActSpace::from_json(as_object(&client.http_get(&url)?, "info")?)?;

        let url = client.make_api_url(&format!("{instance_id}/action_space/"));
        let act_space = ObsActSpace::from_json(as_object(&client.http_get(&url)?, "info")?)?;

        let env_api_url = client.make_api_url(&format!("{instance_id}/"));
        Ok(Self {
            client,
            api_url: env_api_url,
            instance_id: instance_id.to_string(),
            obs_space,
            act_space,
        })
    }

    pub fn name(&self) -> GymResult<String> {
        let obj = self.client.http_get(&self.api_url)?;

        Ok(as_str(&obj, "id")?.to_string())
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// The Space object corresponding to valid actions, all valid actions should be contained with the space.
    /// For example, if the action space is of type Discrete and gives the value Discrete(2), this means there
    /// are two valid discrete actions: 0 & 1.
    /// Refer: https://gymnasium.farama.org/api/env/#gymnasium.Env.action_space
    pub fn action_space(&self) -> &ObsActSpace {
        &self.act_space
    }

    /// The Space object corresponding to valid observations, all valid observations should be contained with
    /// the space.
    /// Refer: https://gymnasium.farama.org/api/env/#gymnasium.Env.observation_space
    pub fn observation_space(&self) -> &ObsActSpace {
        &self.obs_space
    }

    pub fn action_space_sample(&self) -> GymResult<Vec<ObsActSpaceItem>> {
        let url = self.make_api_url("action_space/sample/");
        let obj = self.client.http_get(&url)?;

        sampled_action_from_json(&obj, &self.act_space)
    }

    pub fn reset(&self, seed: Option<u64>) -> GymResult<Vec<ObsActSpaceItem>> {
        let mut body = HashMap::new();
        if let Some(seed) = seed {
            let _ = body.insert("seed", seed.to_string());
        }

        let url = self.make_api_url("reset/");
        let obj = self.client.http_post(&url, &body)?;
        let obs = field(&obj, "observation")?;
        let obs = obs.as_array().ok_or_else(|| unexpected("observation", obs))?;
        self.obs_space.items_from_json(obs)
    }

    pub fn step(&self, action: &[ObsActSpaceItem]) -> GymResult<StepInfo> {
        let req = HashMap::from([("action", self.act_space.action_to_json(action)?)]);

        let url = self.make_api_url("step/");
        let obj = self.client.http_post(&url, &req)?;
        StepInfo::from_json(&obj, &self.obs_space)
    }

    pub fn transitions(&self) -> GymResult<Transitions> {
        let (Some(n_s), Some(n_a)) = (self.obs_space.n(), self.act_space.n()) else {
            return Err(GymError::UnsupportedSpace(
                "transition probabilities need discrete observation and action spaces".into(),
            ));
        };

        let url = self.make_api_url("transitions/");
        let obj = self.client.http_get(&url)?;
        transitions_from_json(field(&obj, "transitions")?, n_s, n_a)
    }

    fn make_api_url(&self, path: &str) -> String {
        format!("{}{path}", self.api_url)
    }
}

#[derive(Debug)]
pub struct Client {
    api_url: String,
    client: reqwest::blocking::Client,
}

impl Client {
    pub fn new(base_url: &str) -> GymResult<Self> {
        let mut base_url = base_url.replace("//localhost:", "//127.0.0.1:");
        if base_url.ends_with('/') {
            _ = base_url.remove(base_url.len() - 1);
        }

        let api_url = format!("{base_url}/v1/envs/");
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|source| GymError::Http {
                url: base_url.clone(),
                source,
            })?;

        Ok(Self { api_url, client })
    }

    pub fn make_api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    fn http_get(&self, url: &str) -> GymResult<Value> {
        tracing::trace!(url, "GET");
        self.client
            .get(url)
            .headers(Self::construct_common_headers())
            .send()
            .and_then(|res| res.error_for_status())
            .and_then(|res| res.json::<Value>())
            .map_err(|source| GymError::Http {
                url: url.to_string(),
                source,
            })
    }

    fn http_post<T: Serialize>(&self, url: &str, body: &HashMap<&str, T>) -> GymResult<Value> {
        tracing::trace!(url, "POST");
        self.client
            .post(url)
            .headers(Self::construct_common_headers())
            .json(body)
            .send()
            .and_then(|res| res.error_for_status())
            .and_then(|res| res.json::<Value>())
            .map_err(|source| GymError::Http {
                url: url.to_string(),
                source,
            })
    }

    fn construct_common_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }
}

mod value_extensions {
    use super::*;

    pub fn unexpected(field: &str, value: &Value) -> GymError {
        GymError::UnexpectedValue {
            field: field.to_string(),
            value: value.clone(),
        }
    }

    pub fn field<'a>(obj: &'a Value, name: &str) -> GymResult<&'a Value> {
        obj.get(name)
            .ok_or_else(|| GymError::MissingField(name.to_string()))
    }

    pub fn as_str<'a>(obj: &'a Value, name: &str) -> GymResult<&'a str> {
        let v = field(obj, name)?;
        v.as_str().ok_or_else(|| unexpected(name, v))
    }

    pub fn as_f64(obj: &Value, name: &str) -> GymResult<f64> {
        let v = field(obj, name)?;
        v.as_f64().ok_or_else(|| unexpected(name, v))
    }

    pub fn as_bool(obj: &Value, name: &str) -> GymResult<bool> {
        let v = field(obj, name)?;
        v.as_bool().ok_or_else(|| unexpected(name, v))
    }

    pub fn as_object<'a>(obj: &'a Value, name: &str) -> GymResult<&'a Map<String, Value>> {
        let v = field(obj, name)?;
        v.as_object().ok_or_else(|| unexpected(name, v))
    }

    pub fn as_discrete(info: &Map<String, Value>, name: &str) -> GymResult<Discrete> {
        let v = info
            .get(name)
            .ok_or_else(|| GymError::MissingField(name.to_string()))?;
        v.as_i64()
            .map(|x| x as Discrete)
            .ok_or_else(|| unexpected(name, v))
    }

    pub fn as_discrete_item_vec(info: &Map<String, Value>, name: &str) -> GymResult<Vec<Discrete>> {
        let v = info
            .get(name)
            .ok_or_else(|| GymError::MissingField(name.to_string()))?;
        v.as_array()
            .ok_or_else(|| unexpected(name, v))?
            .iter()
            .map(|x| {
                x.as_i64()
                    .map(|x| x as Discrete)
                    .ok_or_else(|| unexpected(name, x))
            })
            .collect()
    }

    pub fn as_continous_item_vec(
        info: &Map<String, Value>,
        name: &str,
    ) -> GymResult<Vec<Continous>> {
        let v = info
            .get(name)
            .ok_or_else(|| GymError::MissingField(name.to_string()))?;
        v.as_array()
            .ok_or_else(|| unexpected(name, v))?
            .iter()
            .map(|x| x.as_f64().ok_or_else(|| unexpected(name, x)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assertor::*;
    use float_eq::*;
    use rstest::*;
    use serde_json::json;

    #[test]
    fn discrete_space_from_json() {
        let info = json!({"name": "Discrete", "n": 16});
        let space = ObsActSpace::from_json(info.as_object().unwrap()).unwrap();

        assert_eq!(space, ObsActSpace::Discrete { n: 16 });
        assert_that!(space.n()).is_equal_to(Some(16));
    }

    #[test]
    fn box_space_from_json() {
        let info = json!({"name": "Box", "shape": [2], "high": [0.6, 0.07], "low": [-1.2, -0.07]});
        let space = ObsActSpace::from_json(info.as_object().unwrap()).unwrap();

        match space {
            ObsActSpace::Box { shape, high, low } => {
                assert_eq!(shape, vec![2]);
                assert_float_eq!(high, vec![0.6, 0.07], rmax_all <= 1e-7);
                assert_float_eq!(low, vec![-1.2, -0.07], rmax_all <= 1e-7);
            }
            s => panic!("{s:?} is not ObsActSpace::Box."),
        }
    }

    #[rstest]
    #[case(json!({"name": "Tuple", "spaces": []}))]
    #[case(json!({"n": 4}))]
    #[case(json!({"name": "Discrete", "n": "four"}))]
    fn unusable_space_descriptions_are_rejected(#[case] info: Value) {
        assert!(ObsActSpace::from_json(info.as_object().unwrap()).is_err());
    }

    #[test]
    fn step_info_from_json() {
        let obj = json!({
            "observation": [9],
            "reward": 1.0,
            "truncated": false,
            "terminated": true,
            "info": {"prob": 1.0}
        });
        let si = StepInfo::from_json(&obj, &ObsActSpace::Discrete { n: 16 }).unwrap();

        assert_eq!(si.observation, vec![ObsActSpaceItem::Discrete(9)]);
        assert_float_eq!(si.reward, 1., rmax <= 1e-16);
        assert!(si.terminated);
        assert!(!si.truncated);
    }

    #[test]
    fn step_info_without_reward_is_an_error() {
        let obj = json!({"observation": [9], "truncated": false, "terminated": true});
        let err = StepInfo::from_json(&obj, &ObsActSpace::Discrete { n: 16 }).unwrap_err();

        assert!(matches!(err, GymError::MissingField(f) if f == "reward"));
    }

    #[rstest]
    #[case(&[ObsActSpaceItem::Discrete(4)])]
    #[case(&[ObsActSpaceItem::Discrete(-1)])]
    #[case(&[ObsActSpaceItem::Continous(1.0)])]
    #[case(&[ObsActSpaceItem::Discrete(0), ObsActSpaceItem::Discrete(1)])]
    fn discrete_action_out_of_space_is_rejected(#[case] action: &[ObsActSpaceItem]) {
        let space = ObsActSpace::Discrete { n: 4 };

        assert!(space.action_to_json(action).is_err());
    }

    #[test]
    fn discrete_action_to_json() {
        let space = ObsActSpace::Discrete { n: 4 };

        assert_eq!(
            space.action_to_json(&[ObsActSpaceItem::Discrete(2)]).unwrap(),
            json!(2)
        );
    }

    #[test]
    fn transitions_from_json_reads_every_pair() {
        let obj = json!({
            "0": {"0": [[1.0, 0, 0.0, false]], "1": [[0.5, 1, 1.0, true], [0.5, 0, 0.0, false]]},
            "1": {"0": [[1.0, 1, 0.0, true]], "1": [[1.0, 1, 0.0, true]]}
        });
        let ts = transitions_from_json(&obj, 2, 2).unwrap();

        assert_eq!(ts.len(), 4);
        assert_eq!(
            ts[&(0, 1)][0],
            Transition {
                next_state: 1,
                probability: 0.5,
                reward: 1.0,
                done: true
            }
        );
    }

    #[rstest]
    #[case(json!({"action": 3}))]
    #[case(json!({"action": [3]}))]
    fn sampled_discrete_action_from_json(#[case] obj: Value) {
        let action = sampled_action_from_json(&obj, &ObsActSpace::Discrete { n: 4 }).unwrap();

        assert_eq!(action, vec![ObsActSpaceItem::Discrete(3)]);
    }

    #[test]
    fn sampled_action_without_action_field_is_an_error() {
        let obj = json!({"sample": 3});

        assert!(matches!(
            sampled_action_from_json(&obj, &ObsActSpace::Discrete { n: 4 }),
            Err(GymError::MissingField(f)) if f == "action"
        ));
    }

    #[test]
    fn transitions_from_json_missing_state() {
        let obj = json!({"0": {"0": [[1.0, 0, 0.0, false]]}});

        assert!(transitions_from_json(&obj, 2, 1).is_err());
    }
}
