pub mod pod_spec;
pub mod requirement;
pub mod resource_spec;
