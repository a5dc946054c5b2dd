//! Builders for the Kubernetes objects that are created alongside the templated resources.
pub mod owner_reference;
pub mod pdb;
