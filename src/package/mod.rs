//! Package manifest model: the strongly-typed `no3.json` entity, its schema
//! validation, and the built-in SPDX identifier table.

mod manifest;
mod schema;
pub mod spdx;

pub use manifest::{
    Category, Contact, ContactRole, Dependency, EncodedManifest, Manifest, Optimization,
    OptimizationSwitch, Platforms, Requirements, Version,
};
pub use schema::verify_manifest_json;
