//! Helpers for building backend URLs that respect the deployment's API base.
///
/// When `DOWNTIME_API_URL` is set at compile time (e.g.
/// `https://campaign.example/api`), endpoint paths are appended to it. Builds
/// without it talk to the same origin under `/api`.
const DEFAULT_API_BASE: &str = "/api";

#[must_use]
pub fn api_url(relative: &str) -> String {
    api_url_with_base(relative, option_env!("DOWNTIME_API_URL").unwrap_or(DEFAULT_API_BASE))
}

/// Board read for one character.
#[must_use]
pub fn board_url(character_id: u64) -> String {
    api_url(&format!("downtime/board/?character_id={character_id}"))
}

fn api_url_with_base(relative: &str, base: &str) -> String {
    let base = base.trim().trim_end_matches('/');
    let rel = relative.trim_start_matches('/');

    if base.is_empty() {
        format!("/{rel}")
    } else {
        format!("{base}/{rel}")
    }
}
