//! Configuration loading, environment overrides and validation

mod presence;
mod traits;
mod validation;

pub use presence::{
    AnchorConfig, GatewayConfig, HandshakeConfig, PresenceConfig, ProofConfig, RoutesConfig,
};
pub use traits::Configuration;
pub use validation::{ConfigValidator, ValidationError, ValidationResult};
