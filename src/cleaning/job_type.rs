use crate::types::JobCategory;

/// Ordered category-to-pattern table for job-type canonicalization. The first
/// category with a matching pattern wins, so broader categories come first.
/// New categories are additive configuration here, not new branching code.
pub const JOB_TYPE_PATTERNS: &[(JobCategory, &[&str])] = &[
    (
        JobCategory::FullTime,
        &["full-time", "full time", "fulltime", "ft", "permanent"],
    ),
    (JobCategory::PartTime, &["part-time", "part time", "parttime", "pt"]),
    (JobCategory::Contract, &["contract", "contractor", "contractual"]),
    (JobCategory::Temporary, &["temporary", "temp"]),
    (JobCategory::Internship, &["internship", "intern"]),
];

/// Case-insensitive substring match of free job-type text against the
/// pattern table. No match means the category stays absent.
pub fn canonicalize(value: &str) -> Option<JobCategory> {
    let value_lower = value.to_lowercase();
    for (category, patterns) in JOB_TYPE_PATTERNS {
        if patterns.iter().any(|p| value_lower.contains(p)) {
            return Some(*category);
        }
    }
    None
}
