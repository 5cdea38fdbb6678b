//! Service catalog: the transformations a user can run.
//!
//! Each service maps to a pinned model version at the inference provider
//! and to a credit cost charged per invocation.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Credit cost of one upscale invocation.
pub const UPSCALE_CREDIT_COST: u32 = 10;

/// Credit cost of one generation invocation.
pub const GENERATE_CREDIT_COST: u32 = 5;

/// Kind of image transformation offered to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    /// Resolution upscaling of an existing image
    Upscale,
    /// Colorization of a black-and-white image
    Colorize,
    /// Text-to-image generation
    Generate,
}

impl ServiceKind {
    /// Returns the service name as stored in usage records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upscale => "upscale",
            Self::Colorize => "colorize",
            Self::Generate => "generate",
        }
    }

    /// Returns a human-readable label for the service.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Upscale => "Upscale",
            Self::Colorize => "Colorize",
            Self::Generate => "Generate",
        }
    }

    /// Parse from the stored string form.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "upscale" => Some(Self::Upscale),
            "colorize" => Some(Self::Colorize),
            "generate" => Some(Self::Generate),
            _ => None,
        }
    }

    /// Pinned provider model version for this service.
    pub fn model_version(&self) -> &'static str {
        match self {
            Self::Upscale => "f121d640bd286e1fdc67f9799164c1d5be36ff74576ee11c803ae5b665dd46aa",
            Self::Colorize => "0da600fab0c45a66211339f1c16b71345d22f26ef5fea3dca1bb90bb5711e950",
            Self::Generate => "39ed52f2a78e934b3ba6e2a89f5b1c712de7dfea535525255b1aa35c5565e08b",
        }
    }

    /// Default number of credits charged for this service.
    ///
    /// Colorize is currently free; it still produces a usage record with
    /// zero tokens deducted.
    pub fn credit_cost(&self) -> u32 {
        match self {
            Self::Upscale => UPSCALE_CREDIT_COST,
            Self::Colorize => 0,
            Self::Generate => GENERATE_CREDIT_COST,
        }
    }

    /// Whether this service consumes a source image.
    pub fn has_source_image(&self) -> bool {
        !matches!(self, Self::Generate)
    }
}

impl std::fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_round_trip() {
        for kind in [ServiceKind::Upscale, ServiceKind::Colorize, ServiceKind::Generate] {
            assert_eq!(ServiceKind::from_str(kind.as_str()), Some(kind));
        }
        assert_eq!(ServiceKind::from_str("resize"), None);
    }

    #[test]
    fn test_service_costs() {
        assert_eq!(ServiceKind::Upscale.credit_cost(), 10);
        assert_eq!(ServiceKind::Colorize.credit_cost(), 0);
        assert_eq!(ServiceKind::Generate.credit_cost(), 5);
    }

    #[test]
    fn test_source_image_requirement() {
        assert!(ServiceKind::Upscale.has_source_image());
        assert!(ServiceKind::Colorize.has_source_image());
        assert!(!ServiceKind::Generate.has_source_image());
    }

    #[test]
    fn test_serde_tags() {
        let json = serde_json::to_string(&ServiceKind::Upscale).unwrap();
        assert_eq!(json, "\"upscale\"");
    }
}
