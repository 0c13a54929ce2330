pub mod cleanup_stage;
pub mod evaluation_utils;
pub mod evaluator;
pub mod executor_stage;
pub mod launch_stage;
pub mod outcome;
pub mod pipeline;
pub mod placement_stage;
pub mod pod_info_builder;
pub mod port_lookup;
pub mod port_stage;
pub mod resource_mapper;
pub mod resource_stage;
pub mod stage;
pub mod tls_stage;
pub mod volume_stage;
