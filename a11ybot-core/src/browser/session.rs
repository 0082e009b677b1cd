//! Browser session management: lazy single-flight launch, page leasing
//! and shutdown.

use crate::browser::page::{MockPage, Page};
use crate::error::{AuditError, BrowserError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A running browser process that can open pages.
#[async_trait]
pub trait Browser: Send + Sync {
    /// Open a fresh, isolated page.
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError>;

    /// Close the browser and every page it still owns.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Starts browser processes. Injected into [`BrowserSession`] so tests can
/// substitute a fake.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError>;
}

/// Owns at most one browser process, launched on first use.
///
/// The launch slot is guarded by an async mutex that stays locked for the
/// whole launch, so concurrent first callers share one launch instead of
/// racing. A failed launch leaves the slot empty and the next call retries.
pub struct BrowserSession {
    launcher: Arc<dyn BrowserLauncher>,
    browser: tokio::sync::Mutex<Option<Arc<dyn Browser>>>,
    closed: AtomicBool,
}

impl BrowserSession {
    /// Create a session. Nothing is launched until the first page is needed.
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            browser: tokio::sync::Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Get the shared browser, launching it if this is the first use.
    pub async fn browser(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionClosed);
        }
        let mut slot = self.browser.lock().await;
        // Shutdown may have run while we waited for the lock.
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionClosed);
        }
        if let Some(browser) = slot.as_ref() {
            return Ok(browser.clone());
        }

        info!("Launching browser");
        let browser = self.launcher.launch().await.inspect_err(|e| {
            warn!(error = %e, "Browser launch failed");
        })?;
        *slot = Some(browser.clone());
        Ok(browser)
    }

    /// Whether a browser is currently running.
    pub async fn is_launched(&self) -> bool {
        self.browser.lock().await.is_some()
    }

    /// Lease a fresh page, run `f` with it, and close the page afterwards.
    ///
    /// The page is closed whether `f` succeeds or fails. If the returned
    /// future is dropped before completion (or `f` panics), the close is
    /// scheduled on the runtime instead. A close failure is logged and never
    /// replaces the result of `f`.
    pub async fn with_page<T, F, Fut>(&self, f: F) -> Result<T, AuditError>
    where
        F: FnOnce(Arc<dyn Page>) -> Fut,
        Fut: Future<Output = Result<T, AuditError>>,
    {
        let browser = self.browser().await?;
        let page = browser.new_page().await?;
        debug!("Leased page");
        let lease = PageLease::new(page.clone());
        let result = f(page).await;
        lease.release().await;
        result
    }

    /// Close the browser if one was launched.
    ///
    /// Waits for an in-flight launch to finish first, so a browser that is
    /// still starting is not orphaned. Safe to call repeatedly and returns
    /// immediately when nothing was ever launched.
    pub async fn shutdown(&self) -> Result<(), BrowserError> {
        self.closed.store(true, Ordering::SeqCst);
        let mut slot = self.browser.lock().await;
        if let Some(browser) = slot.take() {
            info!("Closing browser");
            browser.close().await?;
        }
        Ok(())
    }

    /// Whether shutdown has been requested.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Closes a leased page when released or dropped.
struct PageLease {
    page: Option<Arc<dyn Page>>,
}

impl PageLease {
    fn new(page: Arc<dyn Page>) -> Self {
        Self { page: Some(page) }
    }

    async fn release(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!(error = %e, "Failed to close page");
            }
        }
    }
}

impl Drop for PageLease {
    fn drop(&mut self) {
        let Some(page) = self.page.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = page.close().await {
                        warn!(error = %e, "Failed to close abandoned page");
                    }
                });
            }
            Err(_) => warn!("Page lease dropped outside a runtime; page closes with the browser"),
        }
    }
}

static SHUTDOWN_HOOK_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Install a process-wide handler that shuts the session down on Ctrl+C or
/// SIGTERM and then exits.
///
/// Installs at most once per process; later calls return `false` and do
/// nothing. Must be called from within a tokio runtime.
pub fn install_shutdown_hook(session: Arc<BrowserSession>) -> bool {
    if SHUTDOWN_HOOK_INSTALLED.swap(true, Ordering::SeqCst) {
        return false;
    }
    tokio::spawn(async move {
        wait_for_termination().await;
        info!("Termination signal received, shutting down browser");
        if let Err(e) = session.shutdown().await {
            warn!(error = %e, "Browser shutdown failed");
        }
        std::process::exit(0);
    });
    true
}

async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// A mock browser for testing. Hands out prepared `MockPage`s in order,
/// falling back to fresh defaults.
#[derive(Default)]
pub struct MockBrowser {
    /// Pages queued for the next `new_page` calls.
    pub prepared: Mutex<VecDeque<Arc<MockPage>>>,
    /// Every page handed out so far.
    pub opened: Mutex<Vec<Arc<MockPage>>>,
    /// If set, new_page will return this error.
    pub page_error: Mutex<Option<BrowserError>>,
    /// Whether the browser is "closed".
    pub closed: Mutex<bool>,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a page for the next `new_page` call.
    pub fn push_page(&self, page: Arc<MockPage>) {
        self.prepared.lock().unwrap().push_back(page);
    }

    /// Set an error that new_page() will return.
    pub fn set_page_error(&self, err: BrowserError) {
        *self.page_error.lock().unwrap() = Some(err);
    }

    /// Pages handed out so far.
    pub fn opened_pages(&self) -> Vec<Arc<MockPage>> {
        self.opened.lock().unwrap().clone()
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

#[async_trait]
impl Browser for MockBrowser {
    async fn new_page(&self) -> Result<Arc<dyn Page>, BrowserError> {
        if let Some(err) = self.page_error.lock().unwrap().take() {
            return Err(err);
        }
        let page = self
            .prepared
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Arc::new(MockPage::new()));
        self.opened.lock().unwrap().push(page.clone());
        Ok(page)
    }

    async fn close(&self) -> Result<(), BrowserError> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

/// A mock launcher that counts launches and can be told to fail.
pub struct MockLauncher {
    pub browser: Arc<MockBrowser>,
    launches: AtomicUsize,
    failures_remaining: AtomicUsize,
    delay: Option<Duration>,
}

impl MockLauncher {
    pub fn new(browser: Arc<MockBrowser>) -> Self {
        Self {
            browser,
            launches: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Make each launch take this long, to widen race windows in tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail the next `count` launches.
    pub fn fail_next(&self, count: usize) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Number of launch attempts so far.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self) -> Result<Arc<dyn Browser>, BrowserError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(BrowserError::LaunchFailed {
                message: "mock launch failure".to_string(),
            });
        }
        Ok(self.browser.clone())
    }
}
