//! Faultline: typed failure handling for app backends.
//!
//! Converts heterogeneous failures (network, storage, validation,
//! authentication) into one [`ErrorModel`], classifies how serious each is,
//! recovers locally where that is safe, and surfaces what remains exactly
//! once through a central [`Dispatcher`](dispatch::Dispatcher).
//!
//! # Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use faultline::prelude::*;
//!
//! # async fn fetch_lists() -> std::result::Result<Vec<String>, std::io::Error> { Ok(vec![]) }
//! # async fn example() {
//! let resilience = Resilience::default();
//! let dispatcher = Dispatcher::default();
//! let context = LogContext::from_operation("lists", "fetch");
//!
//! let result = resilience
//!     .protected("lists-api", Duration::from_secs(10))
//!     .execute(|| faultline::mapper::normalize(&context, fetch_lists()))
//!     .await;
//!
//! if let Err(error) = result {
//!     dispatcher.handle(&error, Some(context.clone().into()), None);
//! }
//! # }
//! ```

pub mod classify;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod mapper;
pub mod prelude;
pub mod recovery;

pub use error::{ErrorModel, Result};
