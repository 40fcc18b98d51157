//! Context-aware error suggestions.
//!
//! Complements the static suggestions in the `codes` module. The writer's
//! critical-key alert reuses these so the user sees the same remediation
//! text in logs and in robot output.

use serde_json::Value;

use super::codes::ErrorCode;

/// Generate a context-aware suggestion for an error.
pub fn suggest_for_error(code: ErrorCode, context: Option<&Value>) -> String {
    match code {
        ErrorCode::WriteVerificationFailed | ErrorCode::WriteFailed => {
            suggest_write_failed(code, context)
        }
        ErrorCode::QuotaExceeded => suggest_quota_exceeded(context),
        ErrorCode::TierUnavailable => suggest_tier_unavailable(context),
        ErrorCode::NamespaceViolation => suggest_namespace(context),
        _ => code.suggestion().to_string(),
    }
}

fn context_str<'a>(context: Option<&'a Value>, field: &str) -> Option<&'a str> {
    context.and_then(|c| c.get(field)).and_then(Value::as_str)
}

fn suggest_write_failed(code: ErrorCode, context: Option<&Value>) -> String {
    let Some(key) = context_str(context, "key") else {
        return code.suggestion().to_string();
    };
    let attempts = context
        .and_then(|c| c.get("attempts"))
        .and_then(Value::as_u64)
        .unwrap_or(0);

    format!(
        "Saving '{key}' did not persist after {attempts} attempt(s). Try:\n  \
         - `tierkv export --output backup.json` to keep a copy of your data\n  \
         - `tierkv probe` to check which storage tiers are reachable\n  \
         - `tierkv health` to look for a full quota"
    )
}

fn suggest_quota_exceeded(context: Option<&Value>) -> String {
    match context_str(context, "key") {
        Some(key) => format!(
            "Storage is full while saving '{key}'. Disposable caches were already purged. \
             Remove old log archives with `tierkv hard-clear <key>` or raise `tiers.page_quota_bytes`"
        ),
        None => ErrorCode::QuotaExceeded.suggestion().to_string(),
    }
}

fn suggest_tier_unavailable(context: Option<&Value>) -> String {
    match context_str(context, "tier") {
        Some(tier) => format!(
            "The {tier} tier is not usable. Values are routed to the next tier. \
             Check `tiers.*` in `tierkv config` if this tier should be enabled"
        ),
        None => ErrorCode::TierUnavailable.suggestion().to_string(),
    }
}

fn suggest_namespace(context: Option<&Value>) -> String {
    match context_str(context, "prefix") {
        Some(prefix) => format!("Prefix the key with '{prefix}'"),
        None => ErrorCode::NamespaceViolation.suggestion().to_string(),
    }
}
