pub mod evaluate;
pub mod offer;
pub mod operation;
pub mod resource;
pub mod resource_builder;
pub mod resource_pool;
pub mod value;
