//! Parses an already-template-rendered `.side` JSON document into a
//! [`Project`]. Parsing is total over the Selenium IDE schema: every
//! top-level key is either mapped or ignored, and unknown command
//! names are accepted here — they only fail at execution time.

use crate::error::{CoreError, Result};
use crate::script::{Command, Project, Suite, Test};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RawProject {
    id: String,
    name: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    tests: Vec<RawTest>,
    #[serde(default)]
    suites: Vec<RawSuite>,
}

#[derive(Debug, Deserialize)]
struct RawTest {
    id: String,
    name: String,
    #[serde(default)]
    commands: Vec<RawCommand>,
}

#[derive(Debug, Deserialize)]
struct RawCommand {
    id: String,
    command: String,
    #[serde(default)]
    target: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSuite {
    id: String,
    name: String,
    #[serde(default, rename = "tests")]
    test_ids: Vec<String>,
    #[serde(default, rename = "persistSession")]
    persist_session: bool,
    #[serde(default)]
    parallel: bool,
    #[serde(default)]
    timeout: Option<u64>,
}

pub struct ScriptLoader;

impl ScriptLoader {
    /// Parses `text` (already template-rendered) into a validated
    /// [`Project`].
    pub fn load(text: &str) -> Result<Project> {
        let raw: RawProject = serde_json::from_str(text)
            .map_err(|e| CoreError::MalformedScript(e.to_string()))?;

        if raw.suites.is_empty() {
            return Err(CoreError::MalformedScript(
                "project must declare at least one suite".to_string(),
            ));
        }

        let tests: HashMap<String, Test> = raw
            .tests
            .into_iter()
            .map(|t| {
                let commands = t
                    .commands
                    .into_iter()
                    .map(|c| Command {
                        id: c.id,
                        command: c.command,
                        target: c.target,
                        value: c.value,
                        comment: c.comment,
                    })
                    .collect();
                (
                    t.id.clone(),
                    Test {
                        id: t.id,
                        name: t.name,
                        commands,
                    },
                )
            })
            .collect();

        let suites = raw
            .suites
            .into_iter()
            .map(|s| {
                for test_id in &s.test_ids {
                    if !tests.contains_key(test_id) {
                        return Err(CoreError::InvalidReference(test_id.clone()));
                    }
                }
                Ok(Suite {
                    id: s.id,
                    name: s.name,
                    test_ids: s.test_ids,
                    persist_session: s.persist_session,
                    parallel: s.parallel,
                    test_timeout: s.timeout.map(Duration::from_secs),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Project {
            id: raw.id,
            name: raw.name,
            default_url: raw.url,
            tests,
            suites,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_a_minimal_valid_project() {
        let doc = r#"{
            "id": "proj-1",
            "name": "Demo",
            "url": "https://example.test/",
            "tests": [
                {"id": "t1", "name": "Login", "commands": [
                    {"id": "c1", "command": "open", "target": "/", "value": ""}
                ]}
            ],
            "suites": [
                {"id": "s1", "name": "Default", "tests": ["t1"], "persistSession": false, "parallel": false}
            ]
        }"#;
        let project = ScriptLoader::load(doc).unwrap();
        assert_eq!(project.suites.len(), 1);
        assert_eq!(project.tests.len(), 1);
        assert_eq!(project.default_url.as_deref(), Some("https://example.test/"));
    }

    #[test]
    fn persist_session_is_read_from_its_camel_case_key() {
        let doc = r#"{
            "id": "p", "name": "n", "tests": [],
            "suites": [{"id": "s1", "name": "Default", "tests": [], "persistSession": true}]
        }"#;
        let project = ScriptLoader::load(doc).unwrap();
        assert!(project.suites[0].persist_session);
    }

    #[test]
    fn rejects_malformed_json() {
        let err = ScriptLoader::load("not json").unwrap_err();
        assert!(matches!(err, CoreError::MalformedScript(_)));
    }

    #[test]
    fn rejects_a_project_with_no_suites() {
        let doc = r#"{"id": "p", "name": "n", "tests": [], "suites": []}"#;
        let err = ScriptLoader::load(doc).unwrap_err();
        assert!(matches!(err, CoreError::MalformedScript(_)));
    }

    #[test]
    fn rejects_a_suite_referencing_an_unknown_test() {
        let doc = r#"{
            "id": "p", "name": "n", "tests": [],
            "suites": [{"id": "s1", "name": "Default", "tests": ["ghost"]}]
        }"#;
        let err = ScriptLoader::load(doc).unwrap_err();
        assert!(matches!(err, CoreError::InvalidReference(id) if id == "ghost"));
    }

    #[test]
    fn unknown_command_names_parse_fine() {
        let doc = r#"{
            "id": "p", "name": "n",
            "tests": [{"id": "t1", "name": "T", "commands": [
                {"id": "c1", "command": "doSomethingWeird", "target": "", "value": ""}
            ]}],
            "suites": [{"id": "s1", "name": "Default", "tests": ["t1"]}]
        }"#;
        let project = ScriptLoader::load(doc).unwrap();
        assert_eq!(project.tests["t1"].commands[0].command, "doSomethingWeird");
    }
}
