//! Asynchronous ray-tracing acceleration-structure pipeline (spec §4.6, §4.7)

mod bvh_builder;
mod layer;
mod raytracing_core;
mod sbt;

pub use bvh_builder::{
    BlasResult, BvhBuilder, BvhCompletionHandler, BvhCompletionResult, BvhError, GeometryData,
    InstanceData, Priority, TlasResult,
};
pub use layer::RaytracingLayer;
pub use raytracing_core::{
    BlasHandle, ByteEqualityComparator, RaytracingCompletionHandler, RaytracingCore, SceneDigest,
    SceneDigestComparator,
};
pub use sbt::ShaderBindingTable;
