use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::{
    avatar::StorageRef, credential::HashedPassword, draft::LocationGrant,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);
impl UserId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Registered user as the dashboard sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    id: UserId,
    email: String,
    full_name: String,
    avatar_ref: Option<StorageRef>,
    location: LocationGrant,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn reconstruct(
        id: UserId,
        email: String,
        full_name: String,
        avatar_ref: Option<StorageRef>,
        location: LocationGrant,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            email,
            full_name,
            avatar_ref,
            location,
            created_at,
            updated_at,
        }
    }

    /// Apply a partial update and stamp `updated_at`.
    pub fn apply(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
        if let Some(full_name) = update.full_name {
            self.full_name = full_name;
        }
        if let Some(avatar_ref) = update.avatar_ref {
            self.avatar_ref = Some(avatar_ref);
        }
        if let Some(location) = update.location {
            self.location = location;
        }
        self.updated_at = now;
    }

    pub fn id(&self) -> UserId {
        self.id
    }
    pub fn email(&self) -> &str {
        &self.email
    }
    pub fn full_name(&self) -> &str {
        &self.full_name
    }
    pub fn avatar_ref(&self) -> Option<&StorageRef> {
        self.avatar_ref.as_ref()
    }
    pub fn location(&self) -> LocationGrant {
        self.location
    }
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Everything needed to create a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub password_hash: HashedPassword,
    pub avatar_ref: Option<StorageRef>,
    pub location: LocationGrant,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name: Option<String>,
    pub avatar_ref: Option<StorageRef>,
    pub location: Option<LocationGrant>,
}

/// A stored user together with its credential.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub profile: Profile,
    pub password_hash: HashedPassword,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserId,
    pub email: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}
