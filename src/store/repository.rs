//! CRUD and transactional operations over the three entities.
//!
//! Method shape follows the teacher's model-bound-to-pool convention
//! (`Schedule::find_by_id(id, pool)` etc.), collected here behind a `Store`
//! handle instead of scattering pool parameters through every call site —
//! the synchronizer and HTTP handlers both hold one `Store` for their
//! lifetime.

use chrono::Utc;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::crypto::EncryptedEnvelope;
use crate::error::{MonitorError, MonitorResult};

use super::models::{Flags, License, UserLicense};

/// Fields needed to create a brand-new License row (e.g. the default FREE
/// plan, or a freshly activated paid plan).
#[derive(Debug, Clone)]
pub struct NewLicense {
    pub license_key: String,
    pub instance_id: Uuid,
    pub workspace_id: Uuid,
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
    pub is_airgapped: bool,
}

impl NewLicense {
    /// The default plan created for a workspace with no upstream License
    /// yet: FREE product, zero billed seats, the standard 12-seat free
    /// pool, matching the downgrade invariants in §4.4.
    pub fn free(instance_id: Uuid, workspace_id: Uuid, workspace_slug: impl Into<String>) -> Self {
        Self {
            license_key: String::new(),
            instance_id,
            workspace_id,
            workspace_slug: workspace_slug.into(),
            product: "Plane Free".to_string(),
            product_type: "FREE".to_string(),
            seats: 0,
            free_seats: 12,
            interval: "MONTHLY".to_string(),
            is_offline_payment: false,
            is_cancelled: false,
            subscription: String::new(),
            current_period_end_date: None,
            trial_end_date: None,
            has_added_payment_method: false,
            has_activated_free_trial: false,
            is_airgapped: false,
        }
    }
}

/// One member entry used when replacing a License's UserLicenses.
#[derive(Debug, Clone, Copy)]
pub struct MemberInput {
    pub user_id: Uuid,
    pub role: i64,
}

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn list_licenses(&self) -> MonitorResult<Vec<License>> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses")
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_license_by_workspace_slug(
        &self,
        slug: &str,
    ) -> MonitorResult<Option<License>> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE workspace_slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_license_by_workspace_id(
        &self,
        workspace_id: Uuid,
    ) -> MonitorResult<Option<License>> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE workspace_id = ?1")
            .bind(workspace_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn find_license_by_id(&self, id: Uuid) -> MonitorResult<Option<License>> {
        sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    /// Create a License row, replacing any existing row for the same
    /// workspace_slug first (enforces "exactly one non-FREE License per
    /// workspace_id" by construction: only one row ever exists per slug).
    pub async fn create_license(&self, input: NewLicense) -> MonitorResult<License> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM licenses WHERE workspace_slug = ?1")
            .bind(&input.workspace_slug)
            .execute(&mut *tx)
            .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO licenses (
                id, license_key, instance_id, workspace_id, workspace_slug,
                product, product_type, seats, free_seats, interval,
                is_offline_payment, is_cancelled, subscription,
                current_period_end_date, trial_end_date,
                has_added_payment_method, has_activated_free_trial,
                last_verified_at, last_payment_failed_date,
                last_payment_failed_count, is_airgapped, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, NULL, NULL, 0, ?18, ?19, ?20
            )
            "#,
        )
        .bind(&id)
        .bind(&input.license_key)
        .bind(input.instance_id.to_string())
        .bind(input.workspace_id.to_string())
        .bind(&input.workspace_slug)
        .bind(&input.product)
        .bind(&input.product_type)
        .bind(input.seats)
        .bind(input.free_seats)
        .bind(&input.interval)
        .bind(input.is_offline_payment)
        .bind(input.is_cancelled)
        .bind(&input.subscription)
        .bind(input.current_period_end_date.as_deref())
        .bind(input.trial_end_date.as_deref())
        .bind(input.has_added_payment_method)
        .bind(input.has_activated_free_trial)
        .bind(input.is_airgapped)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let license = sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE id = ?1")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(license)
    }

    /// Rewrite an existing License's mutable fields in place (used by the
    /// refresh cycle and by downgrade). `last_verified_at` is always
    /// bumped to now.
    #[allow(clippy::too_many_arguments)]
    pub async fn update_license(
        &self,
        id: Uuid,
        product: &str,
        product_type: &str,
        seats: i64,
        free_seats: i64,
        interval: &str,
        is_offline_payment: bool,
        is_cancelled: bool,
        subscription: &str,
        current_period_end_date: Option<&str>,
        trial_end_date: Option<&str>,
        has_added_payment_method: bool,
        has_activated_free_trial: bool,
    ) -> MonitorResult<License> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE licenses SET
                product = ?2, product_type = ?3, seats = ?4, free_seats = ?5,
                interval = ?6, is_offline_payment = ?7, is_cancelled = ?8,
                subscription = ?9, current_period_end_date = ?10,
                trial_end_date = ?11, has_added_payment_method = ?12,
                has_activated_free_trial = ?13, last_verified_at = ?14,
                updated_at = ?14
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(product)
        .bind(product_type)
        .bind(seats)
        .bind(free_seats)
        .bind(interval)
        .bind(is_offline_payment)
        .bind(is_cancelled)
        .bind(subscription)
        .bind(current_period_end_date)
        .bind(trial_end_date)
        .bind(has_added_payment_method)
        .bind(has_activated_free_trial)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_license_by_id(id).await?.ok_or_else(|| {
            crate::error::MonitorError::configuration(format!("license {id} vanished after update"))
        })
    }

    /// Record a failed upstream payment attempt against a License.
    pub async fn record_payment_failure(&self, id: Uuid) -> MonitorResult<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE licenses SET
                last_payment_failed_date = ?2,
                last_payment_failed_count = last_payment_failed_count + 1,
                updated_at = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(&now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete a License row; foreign keys cascade to its UserLicenses and
    /// Flags.
    pub async fn delete_license(&self, id: Uuid) -> MonitorResult<()> {
        sqlx::query("DELETE FROM licenses WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Populate the store from a decrypted air-gapped activation file in one
    /// transaction, enforcing §4.5's three exit-case validations in order
    /// before any write, matching `PopulateDatabaseWithFilePayload`
    /// (`airgapped_activation.go`).
    pub async fn create_airgapped_license(
        &self,
        input: NewLicense,
        flags_version: &str,
        envelope: &EncryptedEnvelope,
        members: &[MemberInput],
    ) -> MonitorResult<License> {
        const ADMIN_ROLE: i64 = 15;
        const OWNER_ROLE: i64 = 20;

        let mut tx = self.pool.begin().await?;

        if let Some(existing) =
            sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE license_key = ?1")
                .bind(&input.license_key)
                .fetch_optional(&mut *tx)
                .await?
        {
            if existing.workspace_id != input.workspace_id.to_string() {
                return Err(MonitorError::validation(
                    "license already exists for another workspace",
                ));
            }
        }

        if let Some(existing) = sqlx::query_as::<_, License>(
            "SELECT * FROM licenses WHERE workspace_id = ?1 AND workspace_slug = ?2",
        )
        .bind(input.workspace_id.to_string())
        .bind(&input.workspace_slug)
        .fetch_optional(&mut *tx)
        .await?
        {
            if !existing.product_type.eq_ignore_ascii_case("FREE")
                && existing.license_key != input.license_key
            {
                return Err(MonitorError::validation(
                    "workspace is already associated with a different license, please deactivate the existing license first",
                ));
            }
        }

        let billed_members = members
            .iter()
            .filter(|m| m.role == ADMIN_ROLE || m.role == OWNER_ROLE)
            .count() as i64;
        if input.seats < billed_members {
            return Err(MonitorError::validation(format!(
                "license has fewer seats ({}) than billed members ({billed_members})",
                input.seats
            )));
        }

        sqlx::query(
            "DELETE FROM flags WHERE license_id IN (SELECT id FROM licenses WHERE license_key = ?1)",
        )
        .bind(&input.license_key)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "DELETE FROM user_licenses WHERE license_id IN (SELECT id FROM licenses WHERE license_key = ?1)",
        )
        .bind(&input.license_key)
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM licenses WHERE license_key = ?1")
            .bind(&input.license_key)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "DELETE FROM licenses WHERE workspace_id = ?1 AND workspace_slug = ?2 AND license_key != ?3",
        )
        .bind(input.workspace_id.to_string())
        .bind(&input.workspace_slug)
        .bind(&input.license_key)
        .execute(&mut *tx)
        .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO licenses (
                id, license_key, instance_id, workspace_id, workspace_slug,
                product, product_type, seats, free_seats, interval,
                is_offline_payment, is_cancelled, subscription,
                current_period_end_date, trial_end_date,
                has_added_payment_method, has_activated_free_trial,
                last_verified_at, last_payment_failed_date,
                last_payment_failed_count, is_airgapped, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
                ?15, ?16, ?17, NULL, NULL, 0, 1, ?18, ?19
            )
            "#,
        )
        .bind(&id)
        .bind(&input.license_key)
        .bind(input.instance_id.to_string())
        .bind(input.workspace_id.to_string())
        .bind(&input.workspace_slug)
        .bind(&input.product)
        .bind(&input.product_type)
        .bind(input.seats)
        .bind(input.free_seats)
        .bind(&input.interval)
        .bind(input.is_offline_payment)
        .bind(input.is_cancelled)
        .bind(&input.subscription)
        .bind(input.current_period_end_date.as_deref())
        .bind(input.trial_end_date.as_deref())
        .bind(input.has_added_payment_method)
        .bind(input.has_activated_free_trial)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let flags_id = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO flags
                (id, license_id, version, aes_key, nonce, cipher_text, tag, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&flags_id)
        .bind(&id)
        .bind(flags_version)
        .bind(&envelope.aes_key)
        .bind(&envelope.nonce)
        .bind(&envelope.cipher_text)
        .bind(&envelope.tag)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        for member in members {
            let member_id = Uuid::new_v4().to_string();
            sqlx::query(
                r#"
                INSERT INTO user_licenses
                    (id, license_id, user_id, role, is_active, synced, created_at, updated_at)
                VALUES (?1, ?2, ?3, ?4, 1, 1, ?5, ?5)
                "#,
            )
            .bind(&member_id)
            .bind(&id)
            .bind(member.user_id.to_string())
            .bind(member.role)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }

        let license = sqlx::query_as::<_, License>("SELECT * FROM licenses WHERE id = ?1")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(license)
    }

    pub async fn user_licenses_for_license(&self, license_id: Uuid) -> MonitorResult<Vec<UserLicense>> {
        sqlx::query_as::<_, UserLicense>("SELECT * FROM user_licenses WHERE license_id = ?1")
            .bind(license_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn user_license_for_user(
        &self,
        license_id: Uuid,
        user_id: Uuid,
    ) -> MonitorResult<Option<UserLicense>> {
        sqlx::query_as::<_, UserLicense>(
            "SELECT * FROM user_licenses WHERE license_id = ?1 AND user_id = ?2",
        )
        .bind(license_id.to_string())
        .bind(user_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Replace a License's membership list: delete members no longer
    /// present, upsert the rest with their (possibly updated) role and
    /// active flag, within one transaction — matches §4.4.1's "delete
    /// removed UserLicenses" + upsert-the-rest ordering.
    pub async fn replace_user_licenses(
        &self,
        license_id: Uuid,
        members: &[(MemberInput, bool)],
    ) -> MonitorResult<Vec<UserLicense>> {
        let mut tx = self.pool.begin().await?;

        let keep_ids: Vec<String> = members.iter().map(|(m, _)| m.user_id.to_string()).collect();

        if keep_ids.is_empty() {
            sqlx::query("DELETE FROM user_licenses WHERE license_id = ?1")
                .bind(license_id.to_string())
                .execute(&mut *tx)
                .await?;
        } else {
            let placeholders = keep_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
            let sql = format!(
                "DELETE FROM user_licenses WHERE license_id = ? AND user_id NOT IN ({placeholders})"
            );
            let mut query = sqlx::query(&sql).bind(license_id.to_string());
            for id in &keep_ids {
                query = query.bind(id.as_str());
            }
            query.execute(&mut *tx).await?;
        }

        let now = Utc::now().to_rfc3339();
        for (member, is_active) in members {
            let existing = sqlx::query_as::<_, UserLicense>(
                "SELECT * FROM user_licenses WHERE license_id = ?1 AND user_id = ?2",
            )
            .bind(license_id.to_string())
            .bind(member.user_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

            match existing {
                Some(row) => {
                    sqlx::query(
                        "UPDATE user_licenses SET role = ?3, is_active = ?4, synced = 1, updated_at = ?5 WHERE id = ?1 AND license_id = ?2",
                    )
                    .bind(&row.id)
                    .bind(license_id.to_string())
                    .bind(member.role)
                    .bind(*is_active)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    sqlx::query(
                        r#"
                        INSERT INTO user_licenses
                            (id, license_id, user_id, role, is_active, synced, created_at, updated_at)
                        VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6, ?6)
                        "#,
                    )
                    .bind(&id)
                    .bind(license_id.to_string())
                    .bind(member.user_id.to_string())
                    .bind(member.role)
                    .bind(*is_active)
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        let rows = sqlx::query_as::<_, UserLicense>("SELECT * FROM user_licenses WHERE license_id = ?1")
            .bind(license_id.to_string())
            .fetch_all(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(rows)
    }

    pub async fn flags_for_license(
        &self,
        license_id: Uuid,
        version: &str,
    ) -> MonitorResult<Option<Flags>> {
        sqlx::query_as::<_, Flags>("SELECT * FROM flags WHERE license_id = ?1 AND version = ?2")
            .bind(license_id.to_string())
            .bind(version)
            .fetch_optional(&self.pool)
            .await
            .map_err(Into::into)
    }

    pub async fn latest_flags_for_license(&self, license_id: Uuid) -> MonitorResult<Option<Flags>> {
        sqlx::query_as::<_, Flags>(
            "SELECT * FROM flags WHERE license_id = ?1 ORDER BY updated_at DESC LIMIT 1",
        )
        .bind(license_id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(Into::into)
    }

    /// Overwrite the Flags row for (license_id, version), matching §4.4's
    /// "at most one row per (license_id, version)".
    pub async fn upsert_flags(
        &self,
        license_id: Uuid,
        version: &str,
        envelope: &EncryptedEnvelope,
    ) -> MonitorResult<Flags> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM flags WHERE license_id = ?1 AND version = ?2")
            .bind(license_id.to_string())
            .bind(version)
            .execute(&mut *tx)
            .await?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO flags
                (id, license_id, version, aes_key, nonce, cipher_text, tag, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
        )
        .bind(&id)
        .bind(license_id.to_string())
        .bind(version)
        .bind(&envelope.aes_key)
        .bind(&envelope.nonce)
        .bind(&envelope.cipher_text)
        .bind(&envelope.tag)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        let flags = sqlx::query_as::<_, Flags>("SELECT * FROM flags WHERE id = ?1")
            .bind(&id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(flags)
    }

    pub async fn delete_flags_for_license(&self, license_id: Uuid) -> MonitorResult<()> {
        sqlx::query("DELETE FROM flags WHERE license_id = ?1")
            .bind(license_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::pool::init_pool;

    async fn test_store() -> Store {
        let pool = init_pool(":memory:").await.unwrap();
        Store::new(pool)
    }

    #[tokio::test]
    async fn create_license_replaces_existing_row_for_same_workspace() {
        let store = test_store().await;
        let instance_id = Uuid::new_v4();
        let workspace_id = Uuid::new_v4();

        let first = store
            .create_license(NewLicense::free(instance_id, workspace_id, "acme"))
            .await
            .unwrap();

        let mut second_input = NewLicense::free(instance_id, workspace_id, "acme");
        second_input.product_type = "PRO".to_string();
        let second = store.create_license(second_input).await.unwrap();

        assert_ne!(first.id, second.id);
        let all = store.list_licenses().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].product_type, "PRO");
    }

    #[tokio::test]
    async fn deleting_license_cascades_to_children() {
        let store = test_store().await;
        let license = store
            .create_license(NewLicense::free(Uuid::new_v4(), Uuid::new_v4(), "beta"))
            .await
            .unwrap();

        store
            .replace_user_licenses(
                license.id(),
                &[(
                    MemberInput {
                        user_id: Uuid::new_v4(),
                        role: 15,
                    },
                    true,
                )],
            )
            .await
            .unwrap();

        store
            .upsert_flags(
                license.id(),
                "v1",
                &EncryptedEnvelope {
                    aes_key: "a".into(),
                    nonce: "b".into(),
                    cipher_text: "c".into(),
                    tag: "d".into(),
                },
            )
            .await
            .unwrap();

        store.delete_license(license.id()).await.unwrap();

        assert!(store.user_licenses_for_license(license.id()).await.unwrap().is_empty());
        assert!(store.flags_for_license(license.id(), "v1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn replace_user_licenses_drops_members_no_longer_present() {
        let store = test_store().await;
        let license = store
            .create_license(NewLicense::free(Uuid::new_v4(), Uuid::new_v4(), "gamma"))
            .await
            .unwrap();

        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();

        store
            .replace_user_licenses(
                license.id(),
                &[
                    (MemberInput { user_id: u1, role: 15 }, true),
                    (MemberInput { user_id: u2, role: 15 }, true),
                ],
            )
            .await
            .unwrap();

        store
            .replace_user_licenses(license.id(), &[(MemberInput { user_id: u1, role: 15 }, true)])
            .await
            .unwrap();

        let remaining = store.user_licenses_for_license(license.id()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id(), u1);
    }

    fn airgapped_input(license_key: &str, workspace_id: Uuid, seats: i64) -> NewLicense {
        NewLicense {
            license_key: license_key.to_string(),
            instance_id: Uuid::new_v4(),
            workspace_id,
            workspace_slug: "delta".to_string(),
            product: "Plane Business".to_string(),
            product_type: "BUSINESS".to_string(),
            seats,
            free_seats: seats * 5,
            interval: "MONTHLY".to_string(),
            is_offline_payment: true,
            is_cancelled: false,
            subscription: String::new(),
            current_period_end_date: None,
            trial_end_date: None,
            has_added_payment_method: false,
            has_activated_free_trial: false,
            is_airgapped: true,
        }
    }

    fn empty_envelope() -> EncryptedEnvelope {
        EncryptedEnvelope {
            aes_key: "a".into(),
            nonce: "b".into(),
            cipher_text: "c".into(),
            tag: "d".into(),
        }
    }

    #[tokio::test]
    async fn create_airgapped_license_rejects_seat_shortfall() {
        let store = test_store().await;
        let workspace_id = Uuid::new_v4();
        let members = vec![
            MemberInput { user_id: Uuid::new_v4(), role: 15 },
            MemberInput { user_id: Uuid::new_v4(), role: 20 },
        ];

        let result = store
            .create_airgapped_license(
                airgapped_input("key-1", workspace_id, 1),
                "v1",
                &empty_envelope(),
                &members,
            )
            .await;

        assert!(result.is_err());
        assert!(store.list_licenses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_airgapped_license_rejects_license_key_bound_to_other_workspace() {
        let store = test_store().await;
        let first_workspace = Uuid::new_v4();
        let second_workspace = Uuid::new_v4();

        store
            .create_airgapped_license(
                airgapped_input("shared-key", first_workspace, 5),
                "v1",
                &empty_envelope(),
                &[],
            )
            .await
            .unwrap();

        let mut conflicting = airgapped_input("shared-key", second_workspace, 5);
        conflicting.workspace_slug = "epsilon".to_string();
        let result = store
            .create_airgapped_license(conflicting, "v1", &empty_envelope(), &[])
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_airgapped_license_creates_license_flags_and_members() {
        let store = test_store().await;
        let workspace_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let license = store
            .create_airgapped_license(
                airgapped_input("key-ok", workspace_id, 5),
                "v1",
                &empty_envelope(),
                &[MemberInput { user_id, role: 15 }],
            )
            .await
            .unwrap();

        assert!(license.is_airgapped);
        let members = store.user_licenses_for_license(license.id()).await.unwrap();
        assert_eq!(members.len(), 1);
        assert!(members[0].is_active);
        let flags = store.flags_for_license(license.id(), "v1").await.unwrap();
        assert!(flags.is_some());
    }
}
