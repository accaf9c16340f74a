//! Seat-pool reconciliation (§4.4.1): billed and free seat ceilings,
//! computed fresh on every sync so a later request to relax the ceiling
//! (more seats purchased) can reactivate previously-starved members.
//!
//! Supersedes the original's `RefreshLicenseUsers`, which replaced members
//! verbatim with no capacity accounting; see the design notes for why this
//! crate's behavior diverges deliberately.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::remote::types::MemberPayload;
use crate::store::{License, UserLicense};

/// The resolved role and activation state for one member, after
/// reconciliation — this is the exact row set `replace_user_licenses`
/// should write; anything not present here is deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberDecision {
    pub user_id: Uuid,
    pub role: i64,
    pub is_active: bool,
}

/// Compute the post-sync membership for a license given its current
/// members and the upstream-reported member list.
///
/// - **FREE**: no UserLicenses are kept or created.
/// - **ONE**: every added member becomes active unconditionally; kept
///   members retain their current activation state.
/// - **PRO/BUSINESS/ENTERPRISE**: capacity-gated. Billed seats (`role >
///   10`) draw from `seats`; free seats draw from `seats * 5`. Added
///   members are admitted while capacity remains; once all additions are
///   processed, previously-inactive kept members are activated while
///   capacity remains (a seat increase can reactivate starved members on
///   the next sync).
pub fn reconcile_seats(
    license: &License,
    existing: &[UserLicense],
    new_members: &[MemberPayload],
) -> Vec<MemberDecision> {
    let product_type = license.product_type.to_uppercase();

    if product_type == "FREE" {
        return Vec::new();
    }

    let new_roles: HashMap<Uuid, i64> = new_members
        .iter()
        .filter_map(|m| Uuid::parse_str(&m.user_id).ok().map(|id| (id, m.user_role)))
        .collect();
    let existing_ids: HashSet<Uuid> = existing.iter().map(|e| e.user_id()).collect();

    let kept: Vec<&UserLicense> = existing
        .iter()
        .filter(|e| new_roles.contains_key(&e.user_id()))
        .collect();

    let added: Vec<(Uuid, i64)> = new_roles
        .iter()
        .filter(|(id, _)| !existing_ids.contains(id))
        .map(|(id, role)| (*id, *role))
        .collect();

    if product_type == "ONE" {
        let mut decisions: Vec<MemberDecision> = kept
            .iter()
            .map(|e| MemberDecision {
                user_id: e.user_id(),
                role: new_roles[&e.user_id()],
                is_active: e.is_active,
            })
            .collect();
        decisions.extend(added.into_iter().map(|(user_id, role)| MemberDecision {
            user_id,
            role,
            is_active: true,
        }));
        return decisions;
    }

    let billed_capacity = license.seats;
    let free_capacity = license.seats * 5;

    let kept_active_billed = kept.iter().filter(|e| e.is_active && e.is_billed_seat()).count() as i64;
    let kept_active_free = kept.iter().filter(|e| e.is_active && !e.is_billed_seat()).count() as i64;

    let mut remaining_billed = billed_capacity - kept_active_billed;
    let mut remaining_free = free_capacity - kept_active_free;

    let mut decisions: Vec<MemberDecision> = kept
        .iter()
        .map(|e| MemberDecision {
            user_id: e.user_id(),
            role: new_roles[&e.user_id()],
            is_active: e.is_active,
        })
        .collect();

    for (user_id, role) in added {
        let is_billed = role > 10;
        let is_active = if is_billed {
            admit(&mut remaining_billed)
        } else {
            admit(&mut remaining_free)
        };
        decisions.push(MemberDecision {
            user_id,
            role,
            is_active,
        });
    }

    for decision in decisions.iter_mut() {
        if decision.is_active {
            continue;
        }
        let is_billed = decision.role > 10;
        let activated = if is_billed {
            admit(&mut remaining_billed)
        } else {
            admit(&mut remaining_free)
        };
        if activated {
            decision.is_active = true;
        }
    }

    decisions
}

fn admit(remaining: &mut i64) -> bool {
    if *remaining > 0 {
        *remaining -= 1;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn license(product_type: &str, seats: i64) -> License {
        License {
            id: Uuid::new_v4().to_string(),
            license_key: "key".to_string(),
            instance_id: Uuid::new_v4().to_string(),
            workspace_id: Uuid::new_v4().to_string(),
            workspace_slug: "acme".to_string(),
            product: "Plane Pro".to_string(),
            product_type: product_type.to_string(),
            seats,
            free_seats: seats * 5,
            interval: "MONTHLY".to_string(),
            is_offline_payment: false,
            is_cancelled: false,
            subscription: "".to_string(),
            current_period_end_date: None,
            trial_end_date: None,
            has_added_payment_method: false,
            has_activated_free_trial: false,
            last_verified_at: None,
            last_payment_failed_date: None,
            last_payment_failed_count: 0,
            is_airgapped: false,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    fn member(license_id: &str, user_id: Uuid, role: i64, is_active: bool) -> UserLicense {
        UserLicense {
            id: Uuid::new_v4().to_string(),
            license_id: license_id.to_string(),
            user_id: user_id.to_string(),
            role,
            is_active,
            synced: true,
            created_at: Utc::now().to_rfc3339(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn free_plan_keeps_no_members() {
        let lic = license("FREE", 0);
        let u1 = Uuid::new_v4();
        let decisions = reconcile_seats(
            &lic,
            &[],
            &[MemberPayload {
                user_id: u1.to_string(),
                user_role: 15,
            }],
        );
        assert!(decisions.is_empty());
    }

    #[test]
    fn seat_starvation_marks_overflow_inactive() {
        let lic = license("PRO", 1);
        let u1 = Uuid::new_v4();
        let existing = vec![member(&lic.id, u1, 15, true)];
        let u2 = Uuid::new_v4();
        let new_members = vec![
            MemberPayload {
                user_id: u1.to_string(),
                user_role: 15,
            },
            MemberPayload {
                user_id: u2.to_string(),
                user_role: 15,
            },
        ];

        let decisions = reconcile_seats(&lic, &existing, &new_members);
        let u1_decision = decisions.iter().find(|d| d.user_id == u1).unwrap();
        let u2_decision = decisions.iter().find(|d| d.user_id == u2).unwrap();
        assert!(u1_decision.is_active);
        assert!(!u2_decision.is_active);
    }

    #[test]
    fn removed_member_frees_capacity_for_reactivation() {
        let lic = license("PRO", 1);
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        // u1 active, u2 inactive (starved) from a prior sync.
        let existing = vec![member(&lic.id, u1, 15, true), member(&lic.id, u2, 15, false)];
        // u1 is removed upstream; u2 remains and should now fit.
        let new_members = vec![MemberPayload {
            user_id: u2.to_string(),
            user_role: 15,
        }];

        let decisions = reconcile_seats(&lic, &existing, &new_members);
        assert_eq!(decisions.len(), 1);
        assert!(decisions[0].is_active);
        assert_eq!(decisions[0].user_id, u2);
    }

    #[test]
    fn one_plan_activates_every_added_member_unconditionally() {
        let lic = license("ONE", 1);
        let added_ids: Vec<Uuid> = (0..5).map(|_| Uuid::new_v4()).collect();
        let new_members: Vec<MemberPayload> = added_ids
            .iter()
            .map(|id| MemberPayload {
                user_id: id.to_string(),
                user_role: 15,
            })
            .collect();

        let decisions = reconcile_seats(&lic, &[], &new_members);
        assert_eq!(decisions.len(), 5);
        assert!(decisions.iter().all(|d| d.is_active));
    }
}
