// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod cursor;
pub mod engine;
pub mod scheduler;
pub mod service;
pub mod streams;
pub mod timestamps;
pub mod writer;
