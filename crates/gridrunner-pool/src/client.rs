//! The boundary the session pool lends handles across.
//!
//! `GridClient` is the capability-typed surface the pool and executor talk
//! to. It is implemented once for real by wrapping `fantoccini::Client`
//! (itself cheap to clone — an `Arc`-backed handle onto a long-running
//! session task), and once as `FakeClient`, an in-memory double used in
//! tests that have no Selenium Grid to talk to. Both are `Clone`, so the
//! pool can hand out as many concurrent handles to the same session as
//! callers ask for; keeping two callers from stepping on the same browser
//! tab is the Lock Repository's job, not the pool's.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::error::{PoolError, Result};
use crate::locator::ScriptLocator;

#[async_trait]
pub trait GridClient: Send {
    async fn goto(&mut self, url: &str) -> Result<()>;
    async fn current_url(&mut self) -> Result<String>;
    async fn page_source(&mut self) -> Result<String>;
    async fn find_text(&mut self, locator: &ScriptLocator) -> Result<String>;
    async fn find_present(&mut self, locator: &ScriptLocator) -> Result<bool>;
    async fn click(&mut self, locator: &ScriptLocator) -> Result<()>;
    async fn type_text(&mut self, locator: &ScriptLocator, text: &str) -> Result<()>;
    async fn send_keys_raw(&mut self, locator: &ScriptLocator, text: &str) -> Result<()>;
    async fn mouse_over(&mut self, locator: &ScriptLocator) -> Result<()>;
    async fn set_window_size(&mut self, width: i32, height: i32) -> Result<()>;
    async fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value>;
    async fn close(&mut self) -> Result<()>;

    /// Produces an independent handle onto the same underlying session.
    /// `GridClient` can't require `Clone` directly and stay object-safe, so
    /// implementors provide this instead.
    fn clone_box(&self) -> Box<dyn GridClient>;
}

/// Wraps a live `fantoccini::Client`, translating every call into the wire
/// protocol fantoccini already knows how to speak.
#[derive(Clone)]
pub struct FantocciniClient {
    inner: fantoccini::Client,
}

impl FantocciniClient {
    pub fn new(inner: fantoccini::Client) -> Self {
        FantocciniClient { inner }
    }
}

#[async_trait]
impl GridClient for FantocciniClient {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.inner.goto(url).await?;
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.inner.current_url().await?.to_string())
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.inner.source().await?)
    }

    async fn find_text(&mut self, locator: &ScriptLocator) -> Result<String> {
        let mut el = self.inner.find(locator.resolve()).await?;
        Ok(el.text().await?)
    }

    async fn find_present(&mut self, locator: &ScriptLocator) -> Result<bool> {
        Ok(self.inner.find(locator.resolve()).await.is_ok())
    }

    async fn click(&mut self, locator: &ScriptLocator) -> Result<()> {
        let el = self.inner.find(locator.resolve()).await?;
        el.click().await?;
        Ok(())
    }

    async fn type_text(&mut self, locator: &ScriptLocator, text: &str) -> Result<()> {
        let mut el = self.inner.find(locator.resolve()).await?;
        el.clear().await?;
        el.send_keys(text).await?;
        Ok(())
    }

    async fn send_keys_raw(&mut self, locator: &ScriptLocator, text: &str) -> Result<()> {
        let mut el = self.inner.find(locator.resolve()).await?;
        el.send_keys(text).await?;
        Ok(())
    }

    async fn mouse_over(&mut self, locator: &ScriptLocator) -> Result<()> {
        // fantoccini has no native hover action. Resolving the element and
        // touching its html is the closest equivalent available without
        // dropping to the raw WebDriver actions API.
        let el = self.inner.find(locator.resolve()).await?;
        el.html(false).await?;
        Ok(())
    }

    async fn set_window_size(&mut self, width: i32, height: i32) -> Result<()> {
        self.inner.set_window_size(width, height).await?;
        Ok(())
    }

    async fn execute_script(&mut self, script: &str, args: Vec<Value>) -> Result<Value> {
        Ok(self.inner.execute(script, args).await?)
    }

    async fn close(&mut self) -> Result<()> {
        self.inner.close().await?;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn GridClient> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    current_url: String,
    page_source: String,
    element_text: HashMap<String, String>,
    present: HashSet<String>,
    clicks: Vec<String>,
    typed: Vec<(String, String)>,
    closed: bool,
    broken: bool,
}

/// An in-memory stand-in for a browser session, used by tests that exercise
/// the pool and dispatcher without a live Selenium Grid. Clones share the
/// same underlying state, mirroring how cloning a real `fantoccini::Client`
/// yields another handle onto the same session rather than a fork of it.
#[derive(Clone, Default)]
pub struct FakeClient {
    state: Arc<Mutex<FakeState>>,
}

/// A point-in-time copy of a `FakeClient`'s state, for test assertions.
#[derive(Debug, Clone, Default)]
pub struct FakeSnapshot {
    pub current_url: String,
    pub page_source: String,
    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub closed: bool,
}

impl FakeClient {
    pub fn new() -> Self {
        FakeClient::default()
    }

    pub fn with_element_text(self, locator: &str, text: impl Into<String>) -> Self {
        self.state.lock().unwrap().element_text.insert(locator.to_string(), text.into());
        self
    }

    pub fn with_present(self, locator: &str) -> Self {
        self.state.lock().unwrap().present.insert(locator.to_string());
        self
    }

    pub fn with_page_source(self, source: impl Into<String>) -> Self {
        self.state.lock().unwrap().page_source = source.into();
        self
    }

    /// Makes the liveness probe (`current_url`) fail, for tests exercising
    /// the pool's probe-and-replace path.
    pub fn with_broken_probe(self) -> Self {
        self.state.lock().unwrap().broken = true;
        self
    }

    pub fn snapshot(&self) -> FakeSnapshot {
        let state = self.state.lock().unwrap();
        FakeSnapshot {
            current_url: state.current_url.clone(),
            page_source: state.page_source.clone(),
            clicks: state.clicks.clone(),
            typed: state.typed.clone(),
            closed: state.closed,
        }
    }
}

#[async_trait]
impl GridClient for FakeClient {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.state.lock().unwrap().current_url = url.to_string();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        let state = self.state.lock().unwrap();
        if state.broken {
            return Err(PoolError::WebDriver(fantoccini::error::CmdError::NotW3C(Value::Null)));
        }
        Ok(state.current_url.clone())
    }

    async fn page_source(&mut self) -> Result<String> {
        Ok(self.state.lock().unwrap().page_source.clone())
    }

    async fn find_text(&mut self, locator: &ScriptLocator) -> Result<String> {
        self.state
            .lock()
            .unwrap()
            .element_text
            .get(locator.original())
            .cloned()
            .ok_or_else(|| PoolError::BadLocator(locator.original().to_string()))
    }

    async fn find_present(&mut self, locator: &ScriptLocator) -> Result<bool> {
        Ok(self.state.lock().unwrap().present.contains(locator.original()))
    }

    async fn click(&mut self, locator: &ScriptLocator) -> Result<()> {
        self.state.lock().unwrap().clicks.push(locator.original().to_string());
        Ok(())
    }

    async fn type_text(&mut self, locator: &ScriptLocator, text: &str) -> Result<()> {
        self.state.lock().unwrap().typed.push((locator.original().to_string(), text.to_string()));
        Ok(())
    }

    async fn send_keys_raw(&mut self, locator: &ScriptLocator, text: &str) -> Result<()> {
        self.state.lock().unwrap().typed.push((locator.original().to_string(), text.to_string()));
        Ok(())
    }

    async fn mouse_over(&mut self, _locator: &ScriptLocator) -> Result<()> {
        Ok(())
    }

    async fn set_window_size(&mut self, _width: i32, _height: i32) -> Result<()> {
        Ok(())
    }

    async fn execute_script(&mut self, _script: &str, _args: Vec<Value>) -> Result<Value> {
        Ok(Value::Null)
    }

    async fn close(&mut self) -> Result<()> {
        self.state.lock().unwrap().closed = true;
        Ok(())
    }

    fn clone_box(&self) -> Box<dyn GridClient> {
        Box::new(self.clone())
    }
}
