// Domain layer: export model types and collaborator ports.

pub mod model;
pub mod ports;
