// Allow missing docs for internal items
#![allow(missing_docs)]

//! MTB Daemon - TCP/JSON server in front of an MTBbus of addressable modules.
//!
//! Clients connect over TCP, send newline-delimited JSON requests and
//! receive responses plus asynchronous events about the modules they
//! subscribed to.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          MTB DAEMON                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │ Connection 1 │  │ Connection 2 │  │ Connection N │  server/  │
//! │  │   Session    │  │   Session    │  │   Session    │  ipc/     │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │  requests       │     ▲ events    │                   │
//! │  ┌──────┴─────────────────┴─────┴───────────┴──────┐            │
//! │  │                   DaemonCore                    │ service.rs │
//! │  │  ModuleRegistry  TopologyStore  EventDispatcher │            │
//! │  │  OutputSetters                                  │            │
//! │  └──────────┬───────────────────────────▲──────────┘            │
//! │             │ write_outputs, identify   │ BusNotification       │
//! │  ┌──────────┴───────────────────────────┴──────────┐            │
//! │  │            BusDriver (LoopbackBus)              │ adapters/  │
//! │  └─────────────────────────────────────────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use mtb_daemon::{DaemonConfig, DaemonRuntime};
//!
//! let runtime = DaemonRuntime::start(DaemonConfig::default()).await?;
//! println!("listening on {}", runtime.local_addr());
//! runtime.shutdown().await;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ipc;
pub mod ports;
pub mod runtime;
pub mod server;
pub mod service;

pub use adapters::LoopbackBus;
pub use domain::{ConfigError, DaemonConfig, DaemonError};
pub use ipc::{Access, Session};
pub use runtime::DaemonRuntime;
pub use server::DaemonServer;
pub use service::DaemonCore;
