//! Target discovery and resolution
//!
//! Decides whether to adopt an existing debuggable page or create a new one.
//! Creation endpoints are inconsistently available across Chrome versions and
//! deployments (newer builds reject GET /json/new, some reject POST too), so
//! resolution degrades to reusing an existing page rather than hard-failing.

use reqwest::StatusCode;
use tracing::{debug, info, warn};
use url::Url;

use super::types::TargetEntry;
use crate::{Error, Result};

/// Outcome of target resolution
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    /// WebSocket address of the target's debug channel
    pub ws_url: String,
    /// Target id
    pub target_id: String,
    /// True when an existing target was adopted instead of created
    pub reused: bool,
}

/// Resolve a usable target for `initial_url` against the discovery endpoints
/// at `base_url`.
///
/// Existing pages matching the reuse policy win; otherwise a target is
/// created via `/json/new` (GET, falling back to POST on 405). If creation is
/// blocked and any page exists at all, that page is adopted in a logged
/// degraded mode.
pub async fn resolve(
    http: &reqwest::Client,
    base_url: &str,
    initial_url: &str,
) -> Result<ResolvedTarget> {
    let list_url = format!("{}/json/list", base_url);
    let entries: Vec<TargetEntry> = http
        .get(&list_url)
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    let allowed_host = derive_host(initial_url);
    let choice = choose_existing(&entries, allowed_host.as_deref());

    if let Some(entry) = choice.reuse {
        info!("Reusing existing target {} ({})", entry.id, entry.url);
        return Ok(resolved_from(entry, true));
    }

    match create_target(http, base_url, initial_url).await {
        Ok(target) => Ok(target),
        Err(CreateError::Blocked) => match choice.fallback {
            Some(entry) => {
                warn!(
                    "Target creation blocked (405); reusing existing target {} ({})",
                    entry.id,
                    if entry.title.is_empty() {
                        &entry.url
                    } else {
                        &entry.title
                    }
                );
                Ok(resolved_from(entry, true))
            }
            None => Err(Error::discovery(
                "Browser refused to create a new target and no existing page is available. \
                 Open a page manually in the debugged profile and retry.",
            )),
        },
        Err(CreateError::Other(e)) => Err(e),
    }
}

fn resolved_from(entry: &TargetEntry, reused: bool) -> ResolvedTarget {
    ResolvedTarget {
        ws_url: entry
            .web_socket_debugger_url
            .clone()
            .unwrap_or_default(),
        target_id: entry.id.clone(),
        reused,
    }
}

/// Selection over the `/json/list` entries: an entry satisfying the reuse
/// policy, and the first page with a usable channel as a degraded fallback.
struct Choice<'a> {
    reuse: Option<&'a TargetEntry>,
    fallback: Option<&'a TargetEntry>,
}

fn choose_existing<'a>(entries: &'a [TargetEntry], allowed_host: Option<&str>) -> Choice<'a> {
    let mut fallback = None;
    for entry in entries {
        if entry.target_type != "page" || entry.web_socket_debugger_url.is_none() {
            continue;
        }
        if fallback.is_none() {
            fallback = Some(entry);
        }
        if can_reuse(&entry.url, allowed_host) {
            return Choice {
                reuse: Some(entry),
                fallback,
            };
        }
    }
    Choice {
        reuse: None,
        fallback,
    }
}

enum CreateError {
    /// The endpoint rejected both creation methods with 405
    Blocked,
    Other(Error),
}

impl From<Error> for CreateError {
    fn from(e: Error) -> Self {
        CreateError::Other(e)
    }
}

impl From<reqwest::Error> for CreateError {
    fn from(e: reqwest::Error) -> Self {
        CreateError::Other(e.into())
    }
}

async fn create_target(
    http: &reqwest::Client,
    base_url: &str,
    initial_url: &str,
) -> std::result::Result<ResolvedTarget, CreateError> {
    let timeout = std::time::Duration::from_secs(5);
    let get_url = format!(
        "{}/json/new?{}",
        base_url,
        urlencoding::encode(initial_url)
    );

    let mut response = http.get(&get_url).timeout(timeout).send().await?;

    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        debug!("GET /json/new rejected (405), retrying as POST");
        response = http
            .post(format!("{}/json/new", base_url))
            .timeout(timeout)
            .json(&serde_json::json!({ "url": initial_url }))
            .send()
            .await?;
    }

    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return Err(CreateError::Blocked);
    }

    let entry: TargetEntry = response.error_for_status()?.json().await?;
    let ws_url = entry.web_socket_debugger_url.clone().ok_or_else(|| {
        Error::discovery("Created target carries no webSocketDebuggerUrl")
    })?;

    info!("Created new target {}", entry.id);
    Ok(ResolvedTarget {
        ws_url,
        target_id: entry.id,
        reused: false,
    })
}

/// Host parsed from the initial navigation URL; `None` for about: URLs and
/// anything without a hostname.
pub fn derive_host(url: &str) -> Option<String> {
    if url.is_empty() || url.starts_with("about:") {
        return None;
    }
    let parsed = Url::parse(url).ok()?;
    parsed.host_str().map(|h| h.to_ascii_lowercase())
}

/// Reuse policy: exact host match or dot-suffix subdomain match against the
/// allowed host; `about:blank` is always reusable; an empty or unparseable
/// host never is.
pub fn can_reuse(target_url: &str, allowed_host: Option<&str>) -> bool {
    if target_url.is_empty() {
        return false;
    }
    if target_url.starts_with("about:blank") {
        return true;
    }
    let Some(allowed) = allowed_host else {
        return false;
    };
    let Some(host) = Url::parse(target_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
    else {
        return false;
    };
    host == allowed || host.ends_with(&format!(".{}", allowed))
}
