//! Browser layer for the audit engine.
//!
//! Provides a trait-based page abstraction over the Chrome DevTools Protocol,
//! a session that owns one lazily launched browser and leases pages with
//! guaranteed cleanup, and mock implementations for tests.

pub mod page;
pub mod session;

#[cfg(feature = "browser")]
pub mod chromium;

pub use page::{ElementHandle, Key, MockPage, Page, PdfOptions};
pub use session::{
    install_shutdown_hook, Browser, BrowserLauncher, BrowserSession, MockBrowser, MockLauncher,
};

#[cfg(feature = "browser")]
pub use chromium::{ChromiumBrowser, ChromiumLauncher, ChromiumPage};
