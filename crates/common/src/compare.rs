//! The comparison engine: pure delta computation between two snapshot sets,
//! plus the link-set variant used by the generic page scraper.
//!
//! Both entry points share the same skeleton: join current entries to a
//! previous baseline by key, compute deltas, and guard every percentage
//! against a zero or missing base. No I/O, no mutation of inputs; the only
//! non-determinism is the report's own generation timestamp.

use chrono::Utc;

use crate::types::{
    AddressComparison, Changes, ComparisonReport, DiffChanges, DiffSummary, PageDiff,
    ProjectChange, ScrapedPage, SnapshotSet,
};

/// Percentage change of `delta` against `base`. A missing or zero base is
/// reported as exactly 0 (never NaN or infinity), regardless of the delta's
/// sign. A previous-zero baseline showing 0% is documented behavior.
fn percent_of(delta: f64, base: Option<f64>) -> f64 {
    match base {
        Some(b) if b > 0.0 => (delta / b) * 100.0,
        _ => 0.0,
    }
}

/// Compares the current snapshot set against an optional baseline.
///
/// `previous = None` means "no prior baseline" (first run) and is equivalent
/// to comparing against an empty set. The report lists one entry per address
/// in `current`, in insertion order; addresses present only in the baseline
/// are not emitted, but they still count toward the aggregate previous total
/// so the aggregate change reflects whole-portfolio drift.
pub fn compare(current: &SnapshotSet, previous: Option<&SnapshotSet>) -> ComparisonReport {
    let current_total = current.total_usd();
    let previous_total = previous.map_or(0.0, SnapshotSet::total_usd);

    let total_value_change = current_total - previous_total;
    let total_value_change_percent = percent_of(
        total_value_change,
        (previous_total > 0.0).then_some(previous_total),
    );

    let addresses = current
        .iter()
        .map(|curr| {
            let prev = previous.and_then(|p| p.get(&curr.address));

            let previous_value = prev.map_or(0.0, |p| p.total_balance_usd);
            let total_balance_change = curr.total_balance_usd - previous_value;
            let total_balance_change_percent = percent_of(
                total_balance_change,
                prev.map(|p| p.total_balance_usd).filter(|v| *v > 0.0),
            );

            let wallet_change = curr.wallet.as_ref().map_or(0.0, |w| w.amount_usd)
                - prev
                    .and_then(|p| p.wallet.as_ref())
                    .map_or(0.0, |w| w.amount_usd);

            // Join by project name, first match only. Previous-only projects
            // are not emitted: the output has exactly the cardinality of the
            // current project list.
            let project_changes = curr
                .projects
                .iter()
                .map(|proj| {
                    let matched = prev.and_then(|p| p.projects.iter().find(|q| q.name == proj.name));
                    let change = proj.amount_usd - matched.map_or(0.0, |m| m.amount_usd);
                    let change_percent =
                        percent_of(change, matched.map(|m| m.amount_usd).filter(|v| *v > 0.0));
                    ProjectChange {
                        name: proj.name.clone(),
                        change,
                        change_percent,
                    }
                })
                .collect();

            AddressComparison {
                address: curr.address.clone(),
                current: curr.clone(),
                previous: prev.cloned(),
                changes: Changes {
                    total_balance_change,
                    total_balance_change_percent,
                    wallet_change,
                    project_changes,
                },
            }
        })
        .collect();

    ComparisonReport {
        timestamp: Utc::now(),
        total_value: current_total,
        total_value_change,
        total_value_change_percent,
        addresses,
    }
}

/// Diffs two page captures by link `href`.
///
/// Membership is "exists any": entries sharing an href can under- or
/// over-count, which is accepted. `modified` holds current entries whose
/// href matched but whose text differs from the first previous match.
pub fn diff_links(previous: Option<&ScrapedPage>, current: &ScrapedPage) -> PageDiff {
    let Some(previous) = previous else {
        return PageDiff::Initial {
            message: "This is the first scraping, no comparison available".to_string(),
            current_count: current.links.len(),
        };
    };

    let new: Vec<_> = current
        .links
        .iter()
        .filter(|curr| !previous.links.iter().any(|prev| prev.href == curr.href))
        .cloned()
        .collect();

    let removed: Vec<_> = previous
        .links
        .iter()
        .filter(|prev| !current.links.iter().any(|curr| curr.href == prev.href))
        .cloned()
        .collect();

    let modified: Vec<_> = current
        .links
        .iter()
        .filter(|curr| {
            previous
                .links
                .iter()
                .find(|prev| prev.href == curr.href)
                .is_some_and(|prev| prev.text != curr.text)
        })
        .cloned()
        .collect();

    PageDiff::Comparison {
        summary: DiffSummary {
            previous_count: previous.links.len(),
            current_count: current.links.len(),
            new_count: new.len(),
            removed_count: removed.len(),
            modified_count: modified.len(),
        },
        changes: DiffChanges {
            new,
            removed,
            modified,
        },
        title_changed: previous.title != current.title,
        description_changed: previous.description != current.description,
    }
}
