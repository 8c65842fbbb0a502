//! Correlation resolution
//!
//! Determines which external-system record corresponds to an internal
//! asset. Pure function of its inputs plus one piece of caller-supplied
//! state (the asset's last successful correlation id); no network, no
//! I/O, never fails.
//!
//! Priority order is strict:
//! 1. Manual override: always wins, even over a recorded success.
//! 2. Previously successful id: a manual fix that succeeded becomes the
//!    default for all future runs.
//! 3. Asset filename with its final extension stripped.

use std::path::Path;
use tracing::debug;

use crate::types::{CorrelationDecision, CorrelationOrigin};

/// Resolve the external correlation id for one asset
///
/// `previous_success` is the id recorded by the last successful run, read
/// by the caller from the record store and injected here so the resolver
/// stays pure and testable.
pub fn resolve(
    override_id: Option<&str>,
    previous_success: Option<&str>,
    filename: &str,
) -> CorrelationDecision {
    if let Some(id) = override_id {
        let trimmed = id.trim();
        if !trimmed.is_empty() {
            debug!(correlation_id = %trimmed, "Correlation resolved from override");
            return CorrelationDecision {
                resolved_id: trimmed.to_string(),
                origin: CorrelationOrigin::Override,
            };
        }
    }

    if let Some(id) = previous_success {
        if !id.trim().is_empty() {
            debug!(correlation_id = %id, "Correlation reused from previous success");
            return CorrelationDecision {
                resolved_id: id.trim().to_string(),
                origin: CorrelationOrigin::PreviousSuccess,
            };
        }
    }

    let derived = strip_extension(filename);
    debug!(correlation_id = %derived, filename = %filename, "Correlation derived from filename");
    CorrelationDecision {
        resolved_id: derived,
        origin: CorrelationOrigin::FilenameDerived,
    }
}

/// Strip the final extension only; `a.b.mov` becomes `a.b`
fn strip_extension(filename: &str) -> String {
    Path::new(filename)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_always_wins() {
        let decision = resolve(Some("OVR-1"), Some("PREV-1"), "asset.mov");
        assert_eq!(decision.resolved_id, "OVR-1");
        assert_eq!(decision.origin, CorrelationOrigin::Override);
    }

    #[test]
    fn test_empty_override_is_ignored() {
        let decision = resolve(Some("   "), Some("PREV-1"), "asset.mov");
        assert_eq!(decision.resolved_id, "PREV-1");
        assert_eq!(decision.origin, CorrelationOrigin::PreviousSuccess);
    }

    #[test]
    fn test_previous_success_beats_filename() {
        let decision = resolve(None, Some("PREV-1"), "asset.mov");
        assert_eq!(decision.resolved_id, "PREV-1");
        assert_eq!(decision.origin, CorrelationOrigin::PreviousSuccess);
    }

    #[test]
    fn test_filename_fallback_strips_final_extension_only() {
        let decision = resolve(None, None, "promo.v2.mov");
        assert_eq!(decision.resolved_id, "promo.v2");
        assert_eq!(decision.origin, CorrelationOrigin::FilenameDerived);
    }

    #[test]
    fn test_filename_without_extension_used_verbatim() {
        let decision = resolve(None, None, "MASTER_0042");
        assert_eq!(decision.resolved_id, "MASTER_0042");
        assert_eq!(decision.origin, CorrelationOrigin::FilenameDerived);
    }
}
