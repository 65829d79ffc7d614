//! Profile derivation and updates.
//!
//! A [`Profile`] is derived, not authoritative: when the account provider
//! has no richer data, the resolver fabricates defaults from the principal
//! itself. Derivation is deterministic for a given principal snapshot.

use parley_shared::{Presence, Principal, Profile, ProfileUpdate};

/// Derive a display profile from an authenticated principal.
///
/// The local user is assumed online once the session is active, so the
/// resolved profile starts in `Online`.
pub fn resolve(principal: &Principal) -> Profile {
    Profile {
        id: principal.id.clone(),
        display_name: display_name_for(&principal.email),
        email: principal.email.clone(),
        avatar_ref: avatar_ref_for(&principal.email),
        status: Presence::Online,
        bio: None,
        location: None,
        joined_at: None,
    }
}

/// Merge a partial update over a profile. Last write wins; absent fields
/// are retained (single writer, the local user).
pub fn apply_update(profile: &mut Profile, update: ProfileUpdate) {
    if let Some(display_name) = update.display_name {
        profile.display_name = display_name;
    }
    if let Some(avatar_ref) = update.avatar_ref {
        profile.avatar_ref = avatar_ref;
    }
    if let Some(bio) = update.bio {
        profile.bio = Some(bio);
    }
    if let Some(location) = update.location {
        profile.location = Some(location);
    }
}

/// Display name fallback chain: email local-part, then `"User"`.
fn display_name_for(email: &str) -> String {
    match email.split('@').next() {
        Some(local) if !local.is_empty() => local.to_string(),
        _ => "User".to_string(),
    }
}

/// Deterministic avatar reference keyed by email: same email, same avatar.
fn avatar_ref_for(email: &str) -> String {
    let hash = blake3::hash(email.trim().to_lowercase().as_bytes());
    format!("avatar:{}", hex::encode(hash.as_bytes()))
}
