pub mod offer;
pub mod placement;
pub mod scenario;
pub mod specification;
pub mod state;
pub mod utils;
