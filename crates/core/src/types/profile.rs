//! User profile as stored by the identity provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::Uid;
use super::phone::PhoneNumber;

/// A user profile document owned by the identity provider.
///
/// Created incomplete on first successful phone verification, then completed
/// once the user supplies a full name and email. Subsequent sign-ins only
/// refresh `last_login_at`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: Uid,
    /// Empty until the profile is completed.
    pub full_name: String,
    /// Empty until the profile is completed, unless the identity provider
    /// already knew an email for this account.
    pub email: String,
    pub phone_number: PhoneNumber,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    pub profile_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<SavedAddress>,
}

impl UserProfile {
    /// Build the incomplete profile created on first verification.
    #[must_use]
    pub fn incomplete(
        uid: Uid,
        phone_number: PhoneNumber,
        email: Option<&Email>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            uid,
            full_name: String::new(),
            email: email.map(Email::as_str).unwrap_or_default().to_owned(),
            phone_number,
            created_at: now,
            updated_at: now,
            last_login_at: Some(now),
            profile_completed: false,
            avatar: None,
            addresses: Vec::new(),
        }
    }

    /// Mark the profile complete with the supplied name and email.
    pub fn complete(&mut self, full_name: &str, email: &Email, now: DateTime<Utc>) {
        self.full_name = full_name.to_owned();
        self.email = email.as_str().to_owned();
        self.updated_at = now;
        self.profile_completed = true;
    }

    /// Record a sign-in by an already-known user.
    pub const fn touch_last_login(&mut self, now: DateTime<Utc>) {
        self.last_login_at = Some(now);
    }
}

/// A saved shipping address attached to a profile.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SavedAddress {
    pub id: String,
    /// Address label, e.g. "home" or "work".
    #[serde(rename = "type")]
    pub kind: String,
    pub full_name: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub pincode: String,
    pub is_default: bool,
}
