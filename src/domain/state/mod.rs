pub mod state_store;
pub mod task;
