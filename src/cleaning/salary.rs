use super::NormalizedPosting;
use tracing::trace;

/// What a unit rule does once its cue matches.
#[derive(Debug, Clone, Copy)]
pub enum RuleAction {
    /// Multiply both salary bounds to annualize them
    Scale(f64),
    /// Remove the record entirely (piecework pay is not comparable)
    Drop,
}

/// One entry in the ordered unit-inference chain. `min_below` is the
/// plausibility guard: a Scale rule only fires when `salary_min` is present
/// and implausibly small for its unit, so already-annual values are never
/// double-scaled.
#[derive(Debug)]
pub struct UnitRule {
    pub name: &'static str,
    pub cues: &'static [&'static str],
    pub min_below: Option<f64>,
    pub action: RuleAction,
}

/// Applied in this fixed order: k-notation must run before the rate rules so
/// a "$100k a year" posting is not mistaken for an hourly figure.
pub const UNIT_RULES: &[UnitRule] = &[
    UnitRule {
        name: "k_notation",
        cues: &["k"],
        min_below: Some(1_000.0),
        action: RuleAction::Scale(1_000.0),
    },
    UnitRule {
        name: "hourly",
        cues: &["per hour", "/hour", "an hour"],
        min_below: Some(200.0),
        // 40 hours x 52 weeks
        action: RuleAction::Scale(2_080.0),
    },
    UnitRule {
        name: "monthly",
        cues: &["per month", "/month", "a month"],
        min_below: Some(20_000.0),
        action: RuleAction::Scale(12.0),
    },
    UnitRule {
        name: "weekly",
        cues: &["per week", "/week", "a week"],
        min_below: Some(5_000.0),
        action: RuleAction::Scale(52.0),
    },
    UnitRule {
        name: "per_unit",
        cues: &["per unit"],
        min_below: None,
        action: RuleAction::Drop,
    },
];

/// Run the full unit-correction chain over one posting. Every rule's guard is
/// evaluated independently in sequence. Returns false when the record must be
/// dropped.
pub fn apply_unit_rules(posting: &mut NormalizedPosting) -> bool {
    let text_lower = match &posting.salary_text {
        Some(text) => text.to_lowercase(),
        None => return true,
    };

    for rule in UNIT_RULES {
        if !rule.cues.iter().any(|cue| text_lower.contains(cue)) {
            continue;
        }

        match rule.action {
            RuleAction::Drop => {
                trace!(job_id = %posting.job_id, rule = rule.name, "dropping record");
                return false;
            }
            RuleAction::Scale(factor) => {
                let fires = match (rule.min_below, posting.salary_min) {
                    (Some(limit), Some(min)) => min < limit,
                    _ => false,
                };
                if fires {
                    trace!(job_id = %posting.job_id, rule = rule.name, factor, "rescaling salary");
                    posting.salary_min = posting.salary_min.map(|v| v * factor);
                    posting.salary_max = posting.salary_max.map(|v| v * factor);
                }
            }
        }
    }

    true
}
