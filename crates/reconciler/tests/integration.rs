#![allow(unused_crate_dependencies)]

#[path = "integration/common/mod.rs"]
mod common;

#[path = "integration/render.rs"]
mod render;

#[path = "integration/scheduling.rs"]
mod scheduling;

#[path = "integration/suspense.rs"]
mod suspense;

#[path = "integration/errors.rs"]
mod errors;

#[path = "integration/reflection.rs"]
mod reflection;

#[path = "integration/invariants.rs"]
mod invariants;
