// Domain layer: core models and ports. Adapters live under config/ and adapters/.

pub mod model;
pub mod ports;
