//! Value types for a parsed Selenium IDE project.
//!
//! A [`Project`] is immutable once loaded: the loader builds the whole
//! tree in one pass and callers only ever read it back.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub default_url: Option<String>,
    pub tests: HashMap<String, Test>,
    pub suites: Vec<Suite>,
}

impl Project {
    /// Looks up a test by exact, case-sensitive name.
    pub fn test_by_name(&self, name: &str) -> Option<&Test> {
        self.tests.values().find(|t| t.name == name)
    }

    /// Looks up a suite by exact, case-sensitive name.
    pub fn suite_by_name(&self, name: &str) -> Option<&Suite> {
        self.suites.iter().find(|s| s.name == name)
    }

    /// Resolves a suite's test ids to their `Test` values, in order.
    ///
    /// Panics are not possible here: [`super::loader::ScriptLoader`]
    /// rejects any project whose suites reference an unknown test id,
    /// so by the time a `Project` exists this lookup cannot miss.
    pub fn tests_for_suite(&self, suite: &Suite) -> Vec<&Test> {
        suite.test_ids.iter().filter_map(|id| self.tests.get(id)).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: String,
    pub name: String,
    pub commands: Vec<Command>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub id: String,
    pub name: String,
    pub test_ids: Vec<String>,
    #[serde(default)]
    pub persist_session: bool,
    /// Advisory only — the dispatcher always runs suites sequentially.
    /// See the "suite parallel flag" open question in DESIGN.md.
    #[serde(default)]
    pub parallel: bool,
    #[serde(default, with = "duration_seconds_opt")]
    pub test_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub id: String,
    pub command: String,
    #[serde(default)]
    pub target: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub comment: Option<String>,
}

mod duration_seconds_opt {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, ser: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => ser.serialize_some(&d.as_secs()),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Option<Duration>, D::Error> {
        let secs: Option<u64> = Option::deserialize(de)?;
        Ok(secs.map(Duration::from_secs))
    }
}
