// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pricewatch runtime library: a resilient scrape, transform and load pipeline.
//!
//! Stages exchange JSON messages over a [`pipeline::broker::MessageBroker`].
//! The scraper stage picks among ordered per-site strategies
//! ([`strategy`]), falling back to a stealth Chromium session
//! ([`navigation`]) when cheaper strategies fail. Every stage dead-letters
//! failures and records stage-state telemetry ([`telemetry`]).

#![allow(clippy::new_without_default)]

pub mod acquisition;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod navigation;
pub mod pipeline;
pub mod renderer;
pub mod store;
pub mod strategy;
pub mod telemetry;
