//! Types module

pub mod type_system;

pub use type_system::{primitive_size, PrimitiveType, TypeDescriptor};
