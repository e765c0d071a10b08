//! Session timezone resolution.
//!
//! The user's calendar timezone is queried once from the settings
//! endpoint and cached for the process lifetime. A failed query caches
//! "UTC"; the cache is never invalidated afterwards, so whatever the
//! first resolution produced stays authoritative for the session.

use tokio::sync::OnceCell;

use crate::gcal::CalendarApi;

pub const FALLBACK_TIMEZONE: &str = "UTC";

/// Once-initialized cache for the session timezone.
#[derive(Debug, Default)]
pub struct TimezoneCache {
    cell: OnceCell<String>,
}

impl TimezoneCache {
    pub fn new() -> Self {
        TimezoneCache {
            cell: OnceCell::new(),
        }
    }

    /// Resolve the effective timezone. Queries the remote settings
    /// endpoint on first use; concurrent first calls initialize the
    /// cache exactly once. Never fails.
    pub async fn resolve(&self, api: &dyn CalendarApi) -> String {
        self.cell
            .get_or_init(|| async {
                match api.get_setting("timezone").await {
                    Ok(timezone) => {
                        tracing::info!(%timezone, "detected user timezone");
                        timezone
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = format!("{:#}", e),
                            "could not get timezone from Google Calendar, falling back to UTC"
                        );
                        FALLBACK_TIMEZONE.to_string()
                    }
                }
            })
            .await
            .clone()
    }
}
