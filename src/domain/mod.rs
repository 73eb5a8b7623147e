// Domain layer: host-facing models and the ports (traits) adapters and vendor clients implement.

pub mod model;
pub mod ports;
