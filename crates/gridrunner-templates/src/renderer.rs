//! Expands a raw `.side` document as a template before it is handed to
//! [`gridrunner_core::ScriptLoader`].

use crate::error::{Result, TemplateError};
use crate::helpers::{read_js_file, today, Rng32};
use minijinja::{Environment, Error as MiniError, ErrorKind, UndefinedBehavior, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub struct Renderer {
    env: Environment<'static>,
    rng: Rng32,
}

impl Renderer {
    /// Builds a renderer whose stochastic helpers draw from OS entropy.
    pub fn new(js_dir: impl Into<PathBuf>) -> Self {
        Self::build(js_dir.into(), Rng32::from_entropy())
    }

    /// Builds a renderer with a pinned seed, so `randomInt`,
    /// `randomString`, and `faker` are reproducible across calls —
    /// the "stochastic helpers receive a seed parameter at
    /// construction" design note, applied literally.
    pub fn with_seed(js_dir: impl Into<PathBuf>, seed: u64) -> Self {
        Self::build(js_dir.into(), Rng32::from_seed(seed))
    }

    fn build(js_dir: PathBuf, rng: Rng32) -> Self {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);

        env.add_function("today", |format: String| today(&format));

        {
            let rng = rng.clone();
            env.add_function("randomInt", move |min: i64, max: i64| rng.random_int(min, max));
        }
        {
            let rng = rng.clone();
            env.add_function("randomString", move |n: usize| rng.random_string(n));
        }
        {
            let rng = rng.clone();
            env.add_function("faker", move || Value::from_serialize(&rng.faker()));
        }
        {
            let js_dir = Arc::new(js_dir);
            env.add_function("jsFile", move |name: String| -> std::result::Result<String, MiniError> {
                read_js_file(&js_dir, &name)
                    .map_err(|e| MiniError::new(ErrorKind::InvalidOperation, e.to_string()))
            });
        }

        Self { env, rng }
    }

    /// Renders `text` against `params`, exposed as `param.<name>` in
    /// the template environment.
    pub fn render(&self, text: &str, params: &HashMap<String, serde_json::Value>) -> Result<String> {
        let template = self
            .env
            .template_from_str(text)
            .map_err(|e| render_error(&e))?;
        let ctx = minijinja::context! { param => Value::from_serialize(params) };
        let result = template.render(ctx).map_err(|e| render_error(&e));
        match &result {
            Ok(_) => debug!("template rendered"),
            Err(err) => debug!(error = %err, "template render failed"),
        }
        result
    }

    /// Exposes the renderer's RNG so a dispatcher-level test harness
    /// can assert on the exact stochastic values a run will produce.
    pub fn rng(&self) -> &Rng32 {
        &self.rng
    }
}

fn render_error(err: &MiniError) -> TemplateError {
    let location = match err.line() {
        Some(line) => format!("line {line}"),
        None => "unknown location".to_string(),
    };
    TemplateError::Render {
        message: err.to_string(),
        location,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_params_into_the_document() {
        let renderer = Renderer::with_seed(std::env::temp_dir(), 1);
        let mut params = HashMap::new();
        params.insert("name".to_string(), serde_json::json!("Bob"));
        let out = renderer.render(r#"{"value": "{{ param.name }}"}"#, &params).unwrap();
        assert_eq!(out, r#"{"value": "Bob"}"#);
    }

    #[test]
    fn deterministic_for_scripts_using_no_stochastic_helpers() {
        let renderer = Renderer::with_seed(std::env::temp_dir(), 7);
        let params = HashMap::new();
        let a = renderer.render(r#"{"id": "{{ param }}-fixed"}"#, &params).unwrap();
        let b = renderer.render(r#"{"id": "{{ param }}-fixed"}"#, &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn same_seed_yields_same_stochastic_output() {
        let r1 = Renderer::with_seed(std::env::temp_dir(), 123);
        let r2 = Renderer::with_seed(std::env::temp_dir(), 123);
        let params = HashMap::new();
        let a = r1.render("{{ randomInt(0, 1000000) }}", &params).unwrap();
        let b = r2.render("{{ randomInt(0, 1000000) }}", &params).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn undefined_variable_raises_template_render() {
        let renderer = Renderer::with_seed(std::env::temp_dir(), 1);
        let params = HashMap::new();
        let err = renderer.render("{{ undefined_thing.missing }}", &params).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }

    #[test]
    fn js_file_outside_directory_fails_with_resource_error() {
        let renderer = Renderer::with_seed(std::env::temp_dir(), 1);
        let params = HashMap::new();
        let err = renderer.render(r#"{{ jsFile("../escape.js") }}"#, &params).unwrap_err();
        assert!(matches!(err, TemplateError::Render { .. }));
    }
}
