//! Math type aliases
//!
//! Thin layer over `nalgebra` giving the crate short, `f32`-fixed names.

#![allow(dead_code)]

pub use nalgebra::{Matrix4 as Mat4, Point3, Vector3 as Vec3, Vector4 as Vec4};

pub type Vector3 = Vec3<f32>;
pub type Vector4 = Vec4<f32>;
pub type Matrix4 = Mat4<f32>;
