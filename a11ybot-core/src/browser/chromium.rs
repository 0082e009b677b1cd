//! Real browser implementation using chromiumoxide.
//!
//! This module provides `ChromiumLauncher`, `ChromiumBrowser` and
//! `ChromiumPage`, which implement the session traits by driving an actual
//! Chrome/Chromium browser via the DevTools Protocol.
//!
//! Requires the `browser` feature flag:
//! ```toml
//! a11ybot-core = { path = "a11ybot-core", features = ["browser"] }
//! ```

use crate::browser::page::{ElementHandle, Key, Page, PdfOptions};
use crate::browser::session::{Browser, BrowserLauncher};
use crate::config::BrowserConfig;
use crate::error::BrowserError;
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::input::{DispatchKeyEventParams, DispatchKeyEventType};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::{
    CallFunctionOnParams, EvaluateParams, ExceptionDetails, GetPropertiesParams,
    ReleaseObjectParams, RemoteObject, RemoteObjectId,
};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

/// CDP modifier bit for Shift.
const SHIFT_MODIFIER: i64 = 8;

/// Launches Chrome/Chromium with settings from `BrowserConfig`.
pub struct ChromiumLauncher {
    config: BrowserConfig,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        let browser = ChromiumBrowser::launch(&self.config).await?;
        Ok(Arc::new(browser))
    }
}

/// A Chrome/Chromium process plus its CDP event handler task.
pub struct ChromiumBrowser {
    browser: Mutex<chromiumoxide::Browser>,
    handler: tokio::task::JoinHandle<()>,
    request_timeout_ms: u64,
}

impl ChromiumBrowser {
    /// Launch a new Chrome/Chromium browser.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let mut builder = chromiumoxide::BrowserConfig::builder()
            .window_size(config.viewport_width, config.viewport_height)
            .request_timeout(request_timeout(config));

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }
        if !config.headless {
            builder = builder.with_head();
        }

        // Use a unique temporary user-data-dir to allow parallel instances
        let user_data_dir = std::env::temp_dir().join(format!(
            "a11ybot-chrome-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
        ));
        builder = builder.user_data_dir(user_data_dir);

        builder = builder
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-gpu")
            .arg("--disable-extensions");
        for arg in &config.args {
            builder = builder.arg(arg.as_str());
        }

        let browser_config = builder.build().map_err(|e| BrowserError::LaunchFailed {
            message: format!("Failed to build browser config: {}", e),
        })?;

        let launch = chromiumoxide::Browser::launch(browser_config);
        let (browser, mut handler) =
            tokio::time::timeout(Duration::from_secs(config.launch_timeout_secs), launch)
                .await
                .map_err(|_| BrowserError::LaunchFailed {
                    message: format!(
                        "Chrome did not start within {}s",
                        config.launch_timeout_secs
                    ),
                })?
                .map_err(|e| BrowserError::LaunchFailed {
                    message: format!("Failed to launch Chrome: {}", e),
                })?;

        // Spawn the CDP event handler in the background
        let handler_task = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self {
            browser: Mutex::new(browser),
            handler: handler_task,
            request_timeout_ms: config.request_timeout_ms,
        })
    }
}

#[async_trait]
impl Browser for ChromiumBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        let browser = self.browser.lock().await;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed {
                message: format!("{}", e),
            })?;
        Ok(Arc::new(ChromiumPage::new(page, self.request_timeout_ms)))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut browser = self.browser.lock().await;
        browser.close().await.map_err(|e| BrowserError::CdpError {
            message: format!("Failed to close browser: {}", e),
        })?;
        self.handler.abort();
        Ok(())
    }
}

/// One Chrome tab.
pub struct ChromiumPage {
    page: chromiumoxide::Page,
    modifiers: AtomicI64,
    request_timeout_ms: u64,
}

impl ChromiumPage {
    pub fn new(page: chromiumoxide::Page, request_timeout_ms: u64) -> Self {
        Self {
            page,
            modifiers: AtomicI64::new(0),
            request_timeout_ms,
        }
    }

    /// Run `Runtime.evaluate` and return the raw remote object.
    async fn evaluate_raw(
        &self,
        expression: &str,
        by_value: bool,
    ) -> Result<RemoteObject, BrowserError> {
        let params = EvaluateParams::builder()
            .expression(expression)
            .await_promise(true)
            .return_by_value(by_value)
            .build()
            .map_err(|e| BrowserError::CdpError { message: e })?;
        let resp = self
            .page
            .execute(params)
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("Runtime.evaluate: {}", e),
            })?;
        if let Some(ref details) = resp.result.exception_details {
            return Err(BrowserError::JsEvalFailed {
                message: exception_message(details),
            });
        }
        Ok(resp.result.result.clone())
    }

    /// Run `Runtime.callFunctionOn` with `this` bound to the element.
    async fn call_raw(
        &self,
        element: &ElementHandle,
        function: &str,
        by_value: bool,
    ) -> Result<RemoteObject, BrowserError> {
        let params = CallFunctionOnParams::builder()
            .function_declaration(function)
            .object_id(RemoteObjectId::new(element.id()))
            .await_promise(true)
            .return_by_value(by_value)
            .build()
            .map_err(|e| BrowserError::CdpError { message: e })?;
        let resp = self
            .page
            .execute(params)
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("Runtime.callFunctionOn: {}", e),
            })?;
        if let Some(ref details) = resp.result.exception_details {
            return Err(BrowserError::JsEvalFailed {
                message: exception_message(details),
            });
        }
        Ok(resp.result.result.clone())
    }

    /// Split a remote array into one handle per element, releasing the array.
    async fn array_handles(&self, array: RemoteObject) -> Result<Vec<ElementHandle>, BrowserError> {
        let Some(array_id) = array.object_id else {
            return Ok(Vec::new());
        };
        let mut params = GetPropertiesParams::new(array_id.clone());
        params.own_properties = Some(true);
        let props = self.page.execute(params).await;
        self.release_object(array_id).await;
        let props = props.map_err(|e| BrowserError::CdpError {
            message: format!("Runtime.getProperties: {}", e),
        })?;

        let mut indexed: Vec<(usize, ElementHandle)> = props
            .result
            .result
            .iter()
            .filter_map(|p| {
                let index = p.name.parse::<usize>().ok()?;
                let id = p.value.as_ref()?.object_id.as_ref()?;
                Some((index, ElementHandle::new(id.inner().clone())))
            })
            .collect();
        indexed.sort_by_key(|(i, _)| *i);
        Ok(indexed.into_iter().map(|(_, h)| h).collect())
    }

    async fn release_object(&self, id: RemoteObjectId) {
        if let Err(e) = self.page.execute(ReleaseObjectParams::new(id)).await {
            debug!(error = %e, "Runtime.releaseObject failed");
        }
    }

    async fn dispatch_key(&self, key: Key, kind: DispatchKeyEventType) -> Result<(), BrowserError> {
        let (name, code, key_code) = key_definition(key);
        let params = DispatchKeyEventParams::builder()
            .r#type(kind)
            .key(name)
            .code(code)
            .windows_virtual_key_code(key_code)
            .native_virtual_key_code(key_code)
            .modifiers(self.modifiers.load(Ordering::SeqCst))
            .build()
            .map_err(|e| BrowserError::CdpError { message: e })?;
        self.page
            .execute(params)
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("Input.dispatchKeyEvent {}: {}", name, e),
            })?;
        Ok(())
    }
}

#[async_trait]
impl Page for ChromiumPage {
    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let timeout_ms = self.request_timeout_ms;
        self.page
            .goto(url)
            .await
            .map_err(|e| navigation_error(e, timeout_ms))?;
        self.page
            .wait_for_navigation()
            .await
            .map_err(|e| navigation_error(e, timeout_ms))?;
        Ok(())
    }

    async fn set_content(&self, html: &str) -> Result<(), BrowserError> {
        let literal = serde_json::to_string(html).map_err(|e| BrowserError::CdpError {
            message: format!("set_content: {}", e),
        })?;
        let script = format!(
            "(() => {{ document.open(); document.write({literal}); document.close(); return true; }})()"
        );
        self.evaluate_raw(&script, true).await?;
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let object = self.evaluate_raw(script, true).await?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>, BrowserError> {
        let literal = selector_literal(selector)?;
        let object = self
            .evaluate_raw(&format!("document.querySelector({literal})"), false)
            .await?;
        Ok(object
            .object_id
            .map(|id| ElementHandle::new(id.inner().clone())))
    }

    async fn query_selector_all(
        &self,
        scope: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, BrowserError> {
        let literal = selector_literal(selector)?;
        let function =
            format!("function() {{ return Array.from(this.querySelectorAll({literal})); }}");
        let array = self.call_raw(scope, &function, false).await?;
        self.array_handles(array).await
    }

    async fn call_on(
        &self,
        element: &ElementHandle,
        function: &str,
    ) -> Result<Value, BrowserError> {
        let object = self.call_raw(element, function, true).await?;
        Ok(object.value.unwrap_or(Value::Null))
    }

    async fn focus(&self, element: &ElementHandle) -> Result<(), BrowserError> {
        self.call_raw(element, "function() { this.focus(); }", true)
            .await?;
        Ok(())
    }

    async fn key_down(&self, key: Key) -> Result<(), BrowserError> {
        if key == Key::Shift {
            self.modifiers.fetch_or(SHIFT_MODIFIER, Ordering::SeqCst);
        }
        self.dispatch_key(key, DispatchKeyEventType::RawKeyDown)
            .await
    }

    async fn key_up(&self, key: Key) -> Result<(), BrowserError> {
        if key == Key::Shift {
            self.modifiers.fetch_and(!SHIFT_MODIFIER, Ordering::SeqCst);
        }
        self.dispatch_key(key, DispatchKeyEventType::KeyUp).await
    }

    async fn release(&self, element: ElementHandle) -> Result<(), BrowserError> {
        self.page
            .execute(ReleaseObjectParams::new(RemoteObjectId::new(element.id())))
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("Runtime.releaseObject: {}", e),
            })?;
        Ok(())
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>, BrowserError> {
        let mut params = PrintToPdfParams::default();
        params.paper_width = Some(options.paper_width);
        params.paper_height = Some(options.paper_height);
        params.margin_top = Some(options.margin_top);
        params.margin_right = Some(options.margin_right);
        params.margin_bottom = Some(options.margin_bottom);
        params.margin_left = Some(options.margin_left);
        params.print_background = Some(options.print_background);
        self.page
            .pdf(params)
            .await
            .map_err(|e| BrowserError::PdfFailed {
                message: format!("{}", e),
            })
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| BrowserError::CdpError {
                message: format!("Failed to close page: {}", e),
            })
    }
}

/// Timeout applied by the DevTools client to every command.
fn request_timeout(config: &BrowserConfig) -> Duration {
    Duration::from_millis(config.request_timeout_ms)
}

/// A command the DevTools client gave up on is a navigation timeout.
fn navigation_error(err: CdpError, timeout_ms: u64) -> BrowserError {
    match err {
        CdpError::Timeout => BrowserError::NavigationTimeout { timeout_ms },
        other => BrowserError::NavigationFailed {
            message: other.to_string(),
        },
    }
}

/// DOM key name, physical code, and virtual key code.
fn key_definition(key: Key) -> (&'static str, &'static str, i64) {
    match key {
        Key::Tab => ("Tab", "Tab", 9),
        Key::Shift => ("Shift", "ShiftLeft", 16),
    }
}

fn selector_literal(selector: &str) -> Result<String, BrowserError> {
    serde_json::to_string(selector).map_err(|e| BrowserError::CdpError {
        message: format!("invalid selector: {}", e),
    })
}

fn exception_message(details: &ExceptionDetails) -> String {
    details
        .exception
        .as_ref()
        .and_then(|e| e.description.clone())
        .unwrap_or_else(|| details.text.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_definitions() {
        assert_eq!(key_definition(Key::Tab), ("Tab", "Tab", 9));
        assert_eq!(key_definition(Key::Shift).2, 16);
    }

    #[test]
    fn test_request_timeout_follows_config() {
        let config = BrowserConfig::default();
        let audit = crate::config::AuditConfig::default();
        assert_eq!(request_timeout(&config), Duration::from_millis(90_000));
        assert!(request_timeout(&config) > Duration::from_millis(audit.navigation_timeout_ms));

        let config = BrowserConfig {
            request_timeout_ms: 150_000,
            ..BrowserConfig::default()
        };
        assert_eq!(request_timeout(&config), Duration::from_secs(150));
    }

    #[test]
    fn test_cdp_timeout_is_navigation_timeout() {
        assert!(matches!(
            navigation_error(CdpError::Timeout, 90_000),
            BrowserError::NavigationTimeout { timeout_ms: 90_000 }
        ));
        assert!(matches!(
            navigation_error(CdpError::ChromeMessage("net::ERR_NAME_NOT_RESOLVED".into()), 90_000),
            BrowserError::NavigationFailed { .. }
        ));
    }

    #[test]
    fn test_selector_literal_escapes_quotes() {
        let lit = selector_literal(r#"[role="dialog"]"#).unwrap();
        assert_eq!(lit, r#""[role=\"dialog\"]""#);
    }
}
