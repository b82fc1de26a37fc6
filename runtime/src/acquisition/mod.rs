// Copyright 2026 Pricewatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! HTTP-level acquisition used by the non-browser strategies.

pub mod graphql;
pub mod http_client;
