pub mod accumulator;
pub mod archive;
pub mod config;
pub mod deadline;
pub mod extract;
pub mod scheduler;
pub mod summary;
pub mod transport;
pub mod worker;
