use once_cell::sync::Lazy;
use std::collections::{HashMap, HashSet};

/// Full US state names (plus DC) to their 2-letter postal codes.
/// Lookup is case-sensitive on purpose: only properly-cased names count.
pub static STATE_NAME_TO_CODE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    HashMap::from([
        ("Alabama", "AL"),
        ("Alaska", "AK"),
        ("Arizona", "AZ"),
        ("Arkansas", "AR"),
        ("California", "CA"),
        ("Colorado", "CO"),
        ("Connecticut", "CT"),
        ("Delaware", "DE"),
        ("Florida", "FL"),
        ("Georgia", "GA"),
        ("Hawaii", "HI"),
        ("Idaho", "ID"),
        ("Illinois", "IL"),
        ("Indiana", "IN"),
        ("Iowa", "IA"),
        ("Kansas", "KS"),
        ("Kentucky", "KY"),
        ("Louisiana", "LA"),
        ("Maine", "ME"),
        ("Maryland", "MD"),
        ("Massachusetts", "MA"),
        ("Michigan", "MI"),
        ("Minnesota", "MN"),
        ("Mississippi", "MS"),
        ("Missouri", "MO"),
        ("Montana", "MT"),
        ("Nebraska", "NE"),
        ("Nevada", "NV"),
        ("New Hampshire", "NH"),
        ("New Jersey", "NJ"),
        ("New Mexico", "NM"),
        ("New York", "NY"),
        ("North Carolina", "NC"),
        ("North Dakota", "ND"),
        ("Ohio", "OH"),
        ("Oklahoma", "OK"),
        ("Oregon", "OR"),
        ("Pennsylvania", "PA"),
        ("Rhode Island", "RI"),
        ("South Carolina", "SC"),
        ("South Dakota", "SD"),
        ("Tennessee", "TN"),
        ("Texas", "TX"),
        ("Utah", "UT"),
        ("Vermont", "VT"),
        ("Virginia", "VA"),
        ("Washington", "WA"),
        ("West Virginia", "WV"),
        ("Wisconsin", "WI"),
        ("Wyoming", "WY"),
        ("District of Columbia", "DC"),
    ])
});

pub static STATE_CODES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| STATE_NAME_TO_CODE.values().copied().collect());

/// Resolve a free-text location into (city, 2-letter state code).
///
/// Ordered fallback, first match wins:
/// 1. split on the first comma; the remainder upper-cased is a known code
/// 2. the remainder (no ',' or '|') is a full state name, exact match
/// 3. the originating search's declared location is itself a known code
/// 4. otherwise the state stays unresolved and the finalizer drops the record
pub fn resolve(
    location: Option<&str>,
    search_location: Option<&str>,
) -> (Option<String>, Option<String>) {
    let (city, remainder) = match location {
        Some(loc) => match loc.split_once(',') {
            Some((before, after)) => (Some(before), Some(after)),
            None => (Some(loc), None),
        },
        None => (None, None),
    };

    let mut state: Option<String> = None;

    if let Some(rest) = remainder {
        let rest = rest.trim();
        let upper = rest.to_uppercase();
        if STATE_CODES.contains(upper.as_str()) {
            state = Some(upper);
        } else if !rest.contains(',') && !rest.contains('|') {
            state = STATE_NAME_TO_CODE.get(rest).map(|code| code.to_string());
        }
    }

    if state.is_none() {
        if let Some(search) = search_location {
            let upper = search.trim().to_uppercase();
            if STATE_CODES.contains(upper.as_str()) {
                state = Some(upper);
            }
        }
    }

    let city = city
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string);

    (city, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn city_comma_code() {
        let (city, state) = resolve(Some("Houston, TX"), None);
        assert_eq!(city.as_deref(), Some("Houston"));
        assert_eq!(state.as_deref(), Some("TX"));
    }

    #[test]
    fn lowercase_code_is_uppercased() {
        let (_, state) = resolve(Some("Austin, tx"), None);
        assert_eq!(state.as_deref(), Some("TX"));
    }

    #[test]
    fn full_state_name_maps_to_code() {
        let (city, state) = resolve(Some("Seattle, Washington"), None);
        assert_eq!(city.as_deref(), Some("Seattle"));
        assert_eq!(state.as_deref(), Some("WA"));
    }

    #[test]
    fn full_state_name_is_case_sensitive() {
        let (_, state) = resolve(Some("Seattle, washington"), None);
        assert_eq!(state, None);
    }

    #[test]
    fn bare_state_name_without_comma_does_not_resolve() {
        // Full-name matching only applies to the post-comma remainder
        let (city, state) = resolve(Some("Texas"), None);
        assert_eq!(city.as_deref(), Some("Texas"));
        assert_eq!(state, None);
    }

    #[test]
    fn search_location_fallback() {
        let (city, state) = resolve(Some("Remote"), Some("CA"));
        assert_eq!(city.as_deref(), Some("Remote"));
        assert_eq!(state.as_deref(), Some("CA"));
    }

    #[test]
    fn unresolvable_remainder_stays_absent() {
        let (_, state) = resolve(Some("Somewhere Else, Foo"), None);
        assert_eq!(state, None);
    }

    #[test]
    fn piped_remainder_never_matches_full_names() {
        let (_, state) = resolve(Some("A, Texas | Oklahoma"), None);
        assert_eq!(state, None);
    }

    #[test]
    fn missing_location_still_uses_search_fallback() {
        let (city, state) = resolve(None, Some(" wa "));
        assert_eq!(city, None);
        assert_eq!(state.as_deref(), Some("WA"));
    }

    #[test]
    fn search_location_that_is_not_a_code_is_ignored() {
        let (_, state) = resolve(Some("Remote"), Some("Houston, TX"));
        assert_eq!(state, None);
    }
}
