use std::env;
use std::fs;
use std::path::PathBuf;

use crate::error::ConfigError;
use crate::memory::{Fixture, ResultShape};
use crate::models::SessionId;

const DEFAULT_EMAIL: &str = "user@example.com";
const DEFAULT_PASSWORD: &str = "password";

/// A vote requested on the command line environment: `<sessionId>:<option>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CastRequest {
    pub session_id: SessionId,
    pub option: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub fixture_path: Option<PathBuf>,
    pub email: String,
    pub password: String,
    pub cast: Option<CastRequest>,
    pub result_shape: ResultShape,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let cast = non_empty("BALLOT_CAST")
            .map(|raw| parse_cast(&raw))
            .transpose()?;
        let result_shape = match non_empty("BALLOT_RESULT_SHAPE") {
            Some(raw) => raw.parse().map_err(|reason| ConfigError::Invalid {
                key: "BALLOT_RESULT_SHAPE",
                reason,
            })?,
            None => ResultShape::default(),
        };

        Ok(Self {
            fixture_path: non_empty("BALLOT_FIXTURE").map(PathBuf::from),
            email: non_empty("BALLOT_EMAIL").unwrap_or_else(|| DEFAULT_EMAIL.to_string()),
            password: lookup("BALLOT_PASSWORD").unwrap_or_else(|| DEFAULT_PASSWORD.to_string()),
            cast,
            result_shape,
        })
    }

    /// Fixture file if configured, otherwise `None`.
    pub fn load_fixture(&self) -> Result<Option<Fixture>, ConfigError> {
        let Some(path) = &self.fixture_path else {
            return Ok(None);
        };
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Fixture {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(Fixture::from_json(&json)?))
    }
}

fn parse_cast(raw: &str) -> Result<CastRequest, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        key: "BALLOT_CAST",
        reason: reason.to_string(),
    };
    let (id, option) = raw
        .split_once(':')
        .ok_or_else(|| invalid("expected <sessionId>:<option>"))?;
    let session_id = id
        .trim()
        .parse::<SessionId>()
        .map_err(|_| invalid("session id must be a number"))?;
    let option = option.trim();
    if option.is_empty() {
        return Err(invalid("option is empty"));
    }
    Ok(CastRequest {
        session_id,
        option: option.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.email, DEFAULT_EMAIL);
        assert_eq!(cfg.password, DEFAULT_PASSWORD);
        assert_eq!(cfg.cast, None);
        assert_eq!(cfg.fixture_path, None);
        assert_eq!(cfg.result_shape, ResultShape::Nested);
        assert!(cfg.load_fixture().unwrap().is_none());
    }

    #[test]
    fn parses_cast_and_shape() {
        let cfg = config(&[("BALLOT_CAST", "2: Não"), ("BALLOT_RESULT_SHAPE", "flat")]).unwrap();
        assert_eq!(
            cfg.cast,
            Some(CastRequest { session_id: 2, option: "Não".into() })
        );
        assert_eq!(cfg.result_shape, ResultShape::Flat);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(matches!(
            config(&[("BALLOT_CAST", "two:Sim")]),
            Err(ConfigError::Invalid { key: "BALLOT_CAST", .. })
        ));
        assert!(matches!(
            config(&[("BALLOT_CAST", "2")]),
            Err(ConfigError::Invalid { key: "BALLOT_CAST", .. })
        ));
        assert!(matches!(
            config(&[("BALLOT_RESULT_SHAPE", "tree")]),
            Err(ConfigError::Invalid { key: "BALLOT_RESULT_SHAPE", .. })
        ));
    }

    #[test]
    fn missing_fixture_file_is_an_error() {
        let cfg = config(&[("BALLOT_FIXTURE", "/definitely/not/here.json")]).unwrap();
        assert!(matches!(cfg.load_fixture(), Err(ConfigError::Fixture { .. })));
    }
}
