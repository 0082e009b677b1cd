//! Page capability trait and mock implementation.
//!
//! The `Page` trait abstracts one leased browser tab: the page accepts
//! self-contained scripts and returns structured data, hands out opaque
//! element handles, and drives the keyboard. `MockPage` records calls for
//! tests without a real Chrome instance.

use crate::error::BrowserError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

/// Opaque reference to a DOM element living inside the page.
///
/// Handles pin remote objects in the browser and must be passed back to
/// [`Page::release`] once the caller is done with them.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ElementHandle(String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The backend identifier (a CDP remote object id for Chromium).
    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Keys the audit engine presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Tab,
    Shift,
}

impl Key {
    pub fn as_str(&self) -> &'static str {
        match self {
            Key::Tab => "Tab",
            Key::Shift => "Shift",
        }
    }
}

/// Paper and margin settings for PDF export, in inches.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfOptions {
    pub paper_width: f64,
    pub paper_height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
    pub print_background: bool,
}

const MM_PER_INCH: f64 = 25.4;

impl PdfOptions {
    /// A4 with 18mm vertical and 14mm horizontal margins, backgrounds printed.
    pub fn a4() -> Self {
        Self {
            paper_width: 210.0 / MM_PER_INCH,
            paper_height: 297.0 / MM_PER_INCH,
            margin_top: 18.0 / MM_PER_INCH,
            margin_right: 14.0 / MM_PER_INCH,
            margin_bottom: 18.0 / MM_PER_INCH,
            margin_left: 14.0 / MM_PER_INCH,
            print_background: true,
        }
    }
}

impl Default for PdfOptions {
    fn default() -> Self {
        Self::a4()
    }
}

/// Trait abstracting a single browser page.
///
/// Implementors include `MockPage` (for tests) and `ChromiumPage`
/// (wrapping chromiumoxide) for production.
#[async_trait]
pub trait Page: Send + Sync {
    /// Navigate to the given URL and wait for the load to finish.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// Replace the page's document with the given HTML.
    async fn set_content(&self, html: &str) -> Result<(), BrowserError>;

    /// Evaluate a self-contained expression and return its JSON value.
    /// Promises are awaited. A thrown exception is `JsEvalFailed`.
    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError>;

    /// First element in the document matching `selector`.
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError>;

    /// All elements inside `scope` matching `selector`, in document order.
    async fn query_selector_all(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError>;

    /// Call a JavaScript function declaration with the element bound to `this`
    /// and return its JSON value.
    async fn call_on(&self, element: &ElementHandle, function: &str)
        -> Result<Value, BrowserError>;

    /// Move keyboard focus to the element.
    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError>;

    /// Hold a key down.
    async fn key_down(&self, key: Key) -> Result<(), BrowserError>;

    /// Release a held key.
    async fn key_up(&self, key: Key) -> Result<(), BrowserError>;

    /// Press and release a key.
    async fn press(&self, key: Key) -> Result<(), BrowserError> {
        self.key_down(key).await?;
        self.key_up(key).await
    }

    /// Drop the page-side reference behind a handle.
    async fn release(&self, element: ElementHandle) -> Result<(), BrowserError>;

    /// Print the current document to PDF and return the bytes.
    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError>;

    /// Close the page.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// A mock page for testing. Records all calls and returns configurable results.
pub struct MockPage {
    /// Current URL (set by goto).
    pub current_url: Mutex<String>,
    /// Document set through set_content().
    pub content: Mutex<String>,
    /// JavaScript results keyed by script.
    pub js_results: Mutex<HashMap<String, Value>>,
    /// Number of elements matching each selector.
    pub selector_matches: Mutex<HashMap<String, usize>>,
    /// Handles handed out and not yet released.
    pub live_handles: Mutex<HashSet<String>>,
    /// PDF bytes to return.
    pub pdf_bytes: Mutex<Vec<u8>>,
    /// Record of all method calls for assertion: (method, args).
    pub call_log: Mutex<Vec<(String, Vec<String>)>>,
    /// If set, goto will return this error.
    pub goto_error: Mutex<Option<BrowserError>>,
    /// If set, goto sleeps this long before returning.
    pub goto_delay: Mutex<Option<Duration>>,
    /// If set, evaluate will return this error.
    pub evaluate_error: Mutex<Option<BrowserError>>,
    /// If set, pdf will return this error.
    pub pdf_error: Mutex<Option<BrowserError>>,
    /// Whether the page is "closed".
    pub closed: Mutex<bool>,
    handle_counter: Mutex<u32>,
}

impl Default for MockPage {
    fn default() -> Self {
        Self {
            current_url: Mutex::new("about:blank".to_string()),
            content: Mutex::new(String::new()),
            js_results: Mutex::new(HashMap::new()),
            selector_matches: Mutex::new(HashMap::new()),
            live_handles: Mutex::new(HashSet::new()),
            pdf_bytes: Mutex::new(b"%PDF-1.7\n%mock\n".to_vec()),
            call_log: Mutex::new(Vec::new()),
            goto_error: Mutex::new(None),
            goto_delay: Mutex::new(None),
            evaluate_error: Mutex::new(None),
            pdf_error: Mutex::new(None),
            closed: Mutex::new(false),
            handle_counter: Mutex::new(0),
        }
    }
}

impl MockPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a JavaScript result for a given script.
    pub fn add_js_result(&self, script: impl Into<String>, result: Value) {
        self.js_results
            .lock()
            .unwrap()
            .insert(script.into(), result);
    }

    /// Declare how many elements match a selector.
    pub fn set_selector_matches(&self, selector: impl Into<String>, count: usize) {
        self.selector_matches
            .lock()
            .unwrap()
            .insert(selector.into(), count);
    }

    /// Set an error that goto() will return.
    pub fn set_goto_error(&self, err: BrowserError) {
        *self.goto_error.lock().unwrap() = Some(err);
    }

    /// Make goto() take this long.
    pub fn set_goto_delay(&self, delay: Duration) {
        *self.goto_delay.lock().unwrap() = Some(delay);
    }

    /// Set an error that evaluate() will return.
    pub fn set_evaluate_error(&self, err: BrowserError) {
        *self.evaluate_error.lock().unwrap() = Some(err);
    }

    /// Set an error that pdf() will return.
    pub fn set_pdf_error(&self, err: BrowserError) {
        *self.pdf_error.lock().unwrap() = Some(err);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }

    /// Number of handles handed out and not released.
    pub fn live_handle_count(&self) -> usize {
        self.live_handles.lock().unwrap().len()
    }

    fn log_call(&self, method: &str, args: Vec<String>) {
        self.call_log
            .lock()
            .unwrap()
            .push((method.to_string(), args));
    }

    fn next_handle(&self) -> ElementHandle {
        let mut counter = self.handle_counter.lock().unwrap();
        *counter += 1;
        let id = format!("mock-{}", *counter);
        self.live_handles.lock().unwrap().insert(id.clone());
        ElementHandle::new(id)
    }

    /// Get the number of calls to a given method.
    pub fn call_count(&self, method: &str) -> usize {
        self.call_log
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    /// Get all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.call_log.lock().unwrap().clone()
    }
}

#[async_trait]
impl Page for MockPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        self.log_call("goto", vec![url.to_string()]);
        let delay = *self.goto_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(err) = self.goto_error.lock().unwrap().take() {
            return Err(err);
        }
        *self.current_url.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<(), BrowserError> {
        self.log_call("set_content", vec![html.len().to_string()]);
        *self.content.lock().unwrap() = html.to_string();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        self.log_call("evaluate", vec![script.to_string()]);
        if let Some(err) = self.evaluate_error.lock().unwrap().take() {
            return Err(err);
        }
        let results = self.js_results.lock().unwrap();
        match results.get(script) {
            Some(val) => Ok(val.clone()),
            None => Ok(Value::Null),
        }
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        self.log_call("query_selector", vec![selector.to_string()]);
        let matches = self
            .selector_matches
            .lock()
            .unwrap()
            .get(selector)
            .copied()
            .unwrap_or(0);
        if matches == 0 {
            return Ok(None);
        }
        Ok(Some(self.next_handle()))
    }

    async fn query_selector_all(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        self.log_call(
            "query_selector_all",
            vec![scope.id().to_string(), selector.to_string()],
        );
        let matches = self
            .selector_matches
            .lock()
            .unwrap()
            .get(selector)
            .copied()
            .unwrap_or(0);
        Ok((0..matches).map(|_| self.next_handle()).collect())
    }

    async fn call_on(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<Value, BrowserError> {
        self.log_call(
            "call_on",
            vec![element.id().to_string(), function.to_string()],
        );
        Ok(Value::Null)
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.log_call("focus", vec![element.id().to_string()]);
        Ok(())
    }

    async fn key_down(&self, key: Key) -> Result<(), BrowserError> {
        self.log_call("key_down", vec![key.as_str().to_string()]);
        Ok(())
    }

    async fn key_up(&self, key: Key) -> Result<(), BrowserError> {
        self.log_call("key_up", vec![key.as_str().to_string()]);
        Ok(())
    }

    async fn release(&self, element: ElementHandle) -> Result<(), BrowserError> {
        self.log_call("release", vec![element.id().to_string()]);
        self.live_handles.lock().unwrap().remove(element.id());
        Ok(())
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError> {
        self.log_call(
            "pdf",
            vec![
                format!("{:.2}x{:.2}", options.paper_width, options.paper_height),
                options.print_background.to_string(),
            ],
        );
        if let Some(err) = self.pdf_error.lock().unwrap().take() {
            return Err(err);
        }
        Ok(self.pdf_bytes.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.log_call("close", vec![]);
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}
