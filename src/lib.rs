// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

pub mod bus;
pub mod cfg;
pub mod client;
pub mod commands;
pub mod link;
pub mod models;
pub mod utils;
