//! Clusterix - a resilient client for DX cluster telnet services.
//!
//! This crate provides:
//! - An async client that logs in to a cluster node, survives connection
//!   loss, and redials in persistent mode
//! - A nom-based parser that extracts DX spots from raw node output
//! - Observer-based dispatch of connection state and decoded spots
//! - Statistics tracking with HDR histograms
//!
//! # Example
//!
//! ```rust,no_run
//! use clusterix::{Client, ClientConfig, Observer, SpotListener, SpotRecord};
//! use std::sync::Arc;
//!
//! struct Printer;
//!
//! impl SpotListener for Printer {
//!     fn on_spot(&self, spot: &SpotRecord) {
//!         println!("{spot}");
//!     }
//! }
//!
//! impl Observer for Printer {
//!     fn as_spot_listener(&self) -> Option<&dyn SpotListener> {
//!         Some(self)
//!     }
//! }
//!
//! # async fn run() -> Result<(), clusterix::ClientError> {
//! let config = ClientConfig::new("dxc.example.net").with_credentials("DL1ABC", "");
//! let client = Client::new(config);
//! client.register(Arc::new(Printer));
//! client.connect().await?;
//! client.disconnected().await;
//! # Ok(())
//! # }
//! ```

pub mod callsign;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod locator;
pub mod login;
pub mod metrics;
pub mod parser;
pub mod reader;
pub mod signal;
pub mod spot;
pub mod stats;

pub use callsign::{Callsign, CallsignError};
pub use client::{Client, ClientConfig, ClientError, DEFAULT_PORT};
pub use config::Config;
pub use dispatch::{
    ConnectionListener, Dispatcher, Observer, SpotListener, TextListener, WwvListener,
};
pub use locator::{Locator, LocatorError};
pub use login::{Credentials, Login, LoginConfig, LoginStep};
pub use parser::{ParseError, extract_spots, looks_like_spot};
pub use reader::{ChunkReader, ReadError};
pub use signal::Signal;
pub use spot::{SpotRecord, TextRecord, WwvRecord};
pub use stats::{SpotStats, StatsSummary};
