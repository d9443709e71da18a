// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Policy model, matcher evaluation and role graphs.
//!
//! An [`Enforcer`] holds a parsed [`Model`] and its rules, and answers
//! `(subject, object, action)` style requests. Request values may be plain
//! strings or [`Record`]s whose fields the matcher reads as `r.obj.Field`.

pub mod adapter;
pub mod effect;
pub mod enforcer;
pub mod error;
pub mod functions;
pub mod matcher;
pub mod model;
pub mod rbac;
pub mod value;

pub use adapter::{Adapter, PolicyLine};
pub use effect::Effect;
pub use enforcer::Enforcer;
pub use error::{AdapterError, EvalError, ModelError};
pub use model::{Model, Section};
pub use rbac::RoleManager;
pub use value::{Record, RequestValue};
