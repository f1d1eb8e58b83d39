//! Location Parser Totality
//!
//! The decoder must accept any byte soup the upstream platform (or a
//! truncated cache) can produce: never panic, always return a record with
//! a tier from the closed set.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use proptest::prelude::*;

use lookout_client::{AccessTier, Region, parse};

const ALL_TIERS: [AccessTier; 10] = [
    AccessTier::Public,
    AccessTier::Friends,
    AccessTier::FriendsPlus,
    AccessTier::Invite,
    AccessTier::InvitePlus,
    AccessTier::Group,
    AccessTier::GroupPublic,
    AccessTier::GroupPlus,
    AccessTier::Private,
    AccessTier::Traveling,
];

/// Strings that look like real locations, mutated and truncated.
fn location_like() -> impl Strategy<Value = String> {
    let valid = prop_oneof![
        Just("wrld_abc:12345~friends(usr_9)~region(eu)".to_string()),
        Just("wrld_abc:12345~group(grp_7)~groupAccessType(public)~region(jp)".to_string()),
        Just("wrld_abc:99999~private(usr_9)~canRequestInvite~region(use)".to_string()),
        Just("wrld_abc:1~hidden(usr_2)".to_string()),
        Just("offline".to_string()),
        Just("private".to_string()),
        Just("traveling".to_string()),
    ];

    prop_oneof![
        // Truncations of valid strings.
        (valid.clone(), 0usize..48).prop_map(|(s, n)| {
            let cut = s.len().min(n);
            // Stay on a char boundary; these strings are ASCII anyway.
            s[..cut].to_string()
        }),
        // Valid strings with random suffix noise.
        (valid, "[~():a-z_0-9]{0,24}").prop_map(|(s, noise)| format!("{s}{noise}")),
        // Arbitrary printable soup.
        "[ -~]{0,64}",
        // Arbitrary unicode.
        ".{0,32}",
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn parser_is_total(location in location_like()) {
        let parsed = parse(&location);
        prop_assert!(ALL_TIERS.contains(&parsed.access_tier));
        prop_assert!(!parsed.access_tier.label().is_empty());
        prop_assert!(!parsed.region.label().is_empty());
    }

    #[test]
    fn parser_is_deterministic(location in location_like()) {
        prop_assert_eq!(parse(&location), parse(&location));
    }

    #[test]
    fn unknown_region_codes_default_to_us(code in "[a-z]{0,8}") {
        let parsed = parse(&format!("wrld_a:1~region({code})"));
        let known = ["jp", "eu", "use", "usw"];
        if !known.contains(&code.as_str()) {
            prop_assert_eq!(parsed.region, Region::Us);
        }
    }
}
