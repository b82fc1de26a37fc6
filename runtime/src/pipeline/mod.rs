// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Message-driven pipeline: broker, stage runner, stages and scheduler.
//!
//! ```text
//! scheduler → scraping-requests → scraper → scraping-data → transformer
//!           → product-scraping-data → loader → store
//! ```
//!
//! Any stage failure goes to the shared dead-letter topic.

pub mod broker;
pub mod memory;
pub mod runner;
pub mod scheduler;
pub mod shutdown;
pub mod sqlite;
pub mod stages;

pub use broker::{Delivery, MessageBroker, PayloadTooLarge};
pub use memory::MemoryBroker;
pub use runner::{Outbound, Outcome, RunnerSettings, StageHandler, StageRunner};
pub use scheduler::Scheduler;
pub use sqlite::SqliteBroker;
pub use stages::{LoadStage, ScrapeStage, TransformStage};
