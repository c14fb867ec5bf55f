//! Optional build integration
//!
//! A cluster may layer an image-build step on top of its broker image. The
//! build itself is handled elsewhere; this module only carries its settings
//! and the closed classification of how they changed between two states.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// Build-integration settings for a cluster
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BuildIntegrationConfig {
    /// Image the build starts from
    #[validate(length(min = 1, max = 255, message = "baseImage must be 1-255 characters"))]
    #[validate(custom(function = "validate_image_reference"))]
    pub base_image: String,

    /// Tag applied to the built image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 128, message = "outputTag must be 1-128 characters"))]
    pub output_tag: Option<String>,
}

/// Reject image references that cannot name a registry image
pub(crate) fn validate_image_reference(value: &str) -> Result<(), ValidationError> {
    if value.contains("..")
        || value.starts_with('/')
        || value.starts_with('-')
        || value.chars().any(char::is_whitespace)
    {
        return Err(ValidationError::new("invalid_image")
            .with_message(format!("'{}' is not a valid container image", value).into()));
    }
    Ok(())
}

/// How the build integration changed between the current and desired state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuildIntegrationDiff {
    /// Absent on both sides, or unchanged
    #[default]
    None,
    /// Absent now, requested by the desired state
    Create,
    /// Present on both sides with different settings
    Update,
    /// Present now, no longer requested
    Delete,
}

/// Classifies build-integration changes
///
/// Injected into the diff engine so the feature's own notion of equality
/// decides what counts as a change.
pub trait BuildIntegrationComparator {
    fn compare(
        &self,
        current: Option<&BuildIntegrationConfig>,
        desired: Option<&BuildIntegrationConfig>,
    ) -> BuildIntegrationDiff;
}

/// Compares build-integration settings field by field
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralComparator;

impl BuildIntegrationComparator for StructuralComparator {
    fn compare(
        &self,
        current: Option<&BuildIntegrationConfig>,
        desired: Option<&BuildIntegrationConfig>,
    ) -> BuildIntegrationDiff {
        match (current, desired) {
            (None, None) => BuildIntegrationDiff::None,
            (None, Some(_)) => BuildIntegrationDiff::Create,
            (Some(_), None) => BuildIntegrationDiff::Delete,
            (Some(current), Some(desired)) if current == desired => BuildIntegrationDiff::None,
            (Some(_), Some(_)) => BuildIntegrationDiff::Update,
        }
    }
}
