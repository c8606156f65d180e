//! Profile model for the single stored student profile.

use serde::{Deserialize, Serialize};

/// An achievement listed on a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub title: String,
    pub year: String,
    pub description: String,
}

/// The student profile. Field names follow the frontend's camelCase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub gender: String,
    #[serde(default)]
    pub birth_date: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub school: String,
    #[serde(default)]
    pub major: String,
    #[serde(default)]
    pub gpa: String,
    #[serde(default)]
    pub portfolio: String,
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    #[serde(default)]
    pub notes: String,
    /// Whether the profile may be shown to others.
    #[serde(default)]
    pub share_profile: bool,
    #[serde(default)]
    pub profile_image_url: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default)]
    pub created_at: String,
}
