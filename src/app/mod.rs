pub mod model;
pub mod router;
pub mod runner;
pub mod scheduler;
pub mod tag_store;
