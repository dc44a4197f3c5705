mod params;

pub use params::{ConnectParams, ConnectParamsBuilder, SecurityMechanism};
