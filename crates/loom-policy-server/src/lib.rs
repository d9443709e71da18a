// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Handle-addressed policy decision service.
//!
//! Callers create adapters and enforcers, receive integer handles, and then
//! issue decisions and rule changes against those handles. Request parameters
//! tagged `ABAC::` carry a JSON attribute object that is mapped onto positional
//! slots for the duration of one decision.

pub mod abac;
pub mod deadline;
pub mod error;
pub mod factory;
pub mod instance;
pub mod liveness;
pub mod pipeline;
pub mod registry;
pub mod routes;
pub mod rpc;
pub mod service;

pub use abac::{AbacResolver, AttributeBundle, MatcherRewriter, TextualRewriter, ABAC_TAG};
pub use error::{HandleKind, PolicyError};
pub use factory::{AdapterFactory, AdapterRequest};
pub use instance::EnforcerInstance;
pub use liveness::LivenessFile;
pub use pipeline::EnforcementPipeline;
pub use registry::{Handle, HandleRegistry, NO_HANDLE};
pub use routes::{create_router, AppState};
pub use service::PolicyService;
