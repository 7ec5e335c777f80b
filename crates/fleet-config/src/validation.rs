//! Configuration validation utilities

use crate::config::FleetConfig;
use secrecy::ExposeSecret;
use thiserror::Error;
use validator::{Validate, ValidationErrors};

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationErrors),

    #[error("Security validation failed: {message}")]
    SecurityValidationFailed { message: String },

    #[error("Compliance validation failed: {message}")]
    ComplianceValidationFailed { message: String },

    #[error("Distributor validation failed: {message}")]
    DistributorValidationFailed { message: String },
}

pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate_config(config: &FleetConfig) -> Result<(), ConfigValidationError> {
        config.validate()?;

        Self::validate_security_config(config)?;
        Self::validate_compliance_config(config)?;
        Self::validate_distributor_config(config)?;

        Ok(())
    }

    fn validate_security_config(config: &FleetConfig) -> Result<(), ConfigValidationError> {
        let jwt = &config.jwt;

        if jwt.secret.expose_secret().len() < 32 {
            return Err(ConfigValidationError::SecurityValidationFailed {
                message: "JWT secret must be at least 32 characters long".to_string(),
            });
        }

        if jwt.access_ttl_seconds >= jwt.refresh_ttl_seconds {
            return Err(ConfigValidationError::SecurityValidationFailed {
                message: "Access token TTL must be shorter than refresh token TTL".to_string(),
            });
        }

        Ok(())
    }

    fn validate_compliance_config(config: &FleetConfig) -> Result<(), ConfigValidationError> {
        if !config.compliance.weights_sum_to_one() {
            return Err(ConfigValidationError::ComplianceValidationFailed {
                message: "Compliance score weights must sum to 1.0".to_string(),
            });
        }
        Ok(())
    }

    fn validate_distributor_config(config: &FleetConfig) -> Result<(), ConfigValidationError> {
        let d = &config.distributor;
        if d.minimum_success_rate < 0.0 || d.minimum_success_rate > 100.0 {
            return Err(ConfigValidationError::DistributorValidationFailed {
                message: "minimum_success_rate must be a percentage between 0 and 100"
                    .to_string(),
            });
        }
        Ok(())
    }
}
