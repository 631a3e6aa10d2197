pub mod batch;
pub mod routes;
pub mod simulator;
