//! Row types for the three persisted entities.
//!
//! IDs, foreign keys, and timestamps are stored as SQLite TEXT columns (no
//! native UUID/timestamp types), so every row type keeps them as `String`
//! and exposes typed accessors (`id()`, `created_at()`, …) that parse on
//! demand — the corpus's Postgres-native models (e.g. `Schedule`) bind
//! `Uuid`/`DateTime<Utc>` fields directly because Postgres has those types;
//! SQLite doesn't, so this is the idiomatic adaptation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn parse_uuid(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::nil())
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// A workspace's subscription agreement, including seat counts and plan.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct License {
    pub id: String,
    pub license_key: String,
    pub instance_id: String,
    pub workspace_id: String,
    pub workspace_slug: String,
    pub product: String,
    pub product_type: String,
    pub seats: i64,
    pub free_seats: i64,
    pub interval: String,
    pub is_offline_payment: bool,
    pub is_cancelled: bool,
    pub subscription: String,
    pub current_period_end_date: Option<String>,
    pub trial_end_date: Option<String>,
    pub has_added_payment_method: bool,
    pub has_activated_free_trial: bool,
    pub last_verified_at: Option<String>,
    pub last_payment_failed_date: Option<String>,
    pub last_payment_failed_count: i64,
    pub is_airgapped: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl License {
    pub fn id(&self) -> Uuid {
        parse_uuid(&self.id)
    }

    pub fn workspace_id(&self) -> Uuid {
        parse_uuid(&self.workspace_id)
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        parse_timestamp(&self.created_at)
    }

    /// `true` when this is the default fallback plan created for a
    /// workspace with no paid subscription.
    pub fn is_free(&self) -> bool {
        self.product_type.eq_ignore_ascii_case("FREE")
    }
}

/// A user's membership in a license.
///
/// `role > 10` denotes a billed seat, `role <= 10` a free seat — this split
/// drives the seat reconciliation invariants in the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct UserLicense {
    pub id: String,
    pub license_id: String,
    pub user_id: String,
    pub role: i64,
    pub is_active: bool,
    pub synced: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl UserLicense {
    pub fn id(&self) -> Uuid {
        parse_uuid(&self.id)
    }

    pub fn user_id(&self) -> Uuid {
        parse_uuid(&self.user_id)
    }

    /// Billed seats are role > 10; everything else draws from the free pool.
    pub fn is_billed_seat(&self) -> bool {
        self.role > 10
    }
}

/// An encrypted feature-flag payload bound to one license version.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Flags {
    pub id: String,
    pub license_id: String,
    pub version: String,
    pub aes_key: String,
    pub nonce: String,
    pub cipher_text: String,
    pub tag: String,
    pub created_at: String,
    pub updated_at: String,
}

impl Flags {
    pub fn id(&self) -> Uuid {
        parse_uuid(&self.id)
    }

    pub fn into_envelope(&self) -> crate::crypto::EncryptedEnvelope {
        crate::crypto::EncryptedEnvelope {
            aes_key: self.aes_key.clone(),
            nonce: self.nonce.clone(),
            cipher_text: self.cipher_text.clone(),
            tag: self.tag.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billed_seat_threshold_matches_role_gt_10() {
        let mut ul = UserLicense {
            id: Uuid::new_v4().to_string(),
            license_id: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
            role: 10,
            is_active: true,
            synced: true,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        };
        assert!(!ul.is_billed_seat());
        ul.role = 11;
        assert!(ul.is_billed_seat());
        ul.role = 15;
        assert!(ul.is_billed_seat());
    }
}
