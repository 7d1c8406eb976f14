use accord_core::{Version, VersionConstraint};

fn c(text: &str) -> VersionConstraint {
    VersionConstraint::parse(text).unwrap()
}

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

#[test]
fn python_style_union_renders_canonically() {
    let constraint = c("~2.7 || ^3.6");
    assert_eq!(constraint.to_string(), ">=2.7,<2.8 || >=3.6,<4.0");
}

#[test]
fn intersection_and_union_are_commutative() {
    let pairs = [
        ("^1.2", "^1.4"),
        (">=1.0,<3.0", "!=2.0"),
        ("~2.7 || ^3.6", ">=3.0"),
        ("*", "^0.3"),
    ];
    for (left, right) in pairs {
        let a = c(left);
        let b = c(right);
        assert_eq!(a.intersect(&b), b.intersect(&a), "{left} ∩ {right}");
        assert_eq!(a.union(&b), b.union(&a), "{left} ∪ {right}");
    }
}

#[test]
fn intersection_distributes_over_membership() {
    let a = c("^1.0");
    let b = c(">=1.4,<1.8");
    let both = a.intersect(&b);
    for version in ["1.0.0", "1.4.0", "1.5.9", "1.8.0", "2.0.0"] {
        let version = v(version);
        assert_eq!(
            both.allows(&version),
            a.allows(&version) && b.allows(&version),
            "{version}"
        );
    }
}

#[test]
fn complement_partitions_the_version_line() {
    for text in ["^1.2", "~0.9", "!=1.5", ">=2.0 || <1.0", "1.4.*"] {
        let constraint = c(text);
        let complement = constraint.complement();
        assert!(constraint.union(&complement).is_any(), "{text}");
        assert!(constraint.intersect(&complement).is_empty(), "{text}");
    }
}

#[test]
fn empty_constraint_is_not_an_error_by_itself() {
    let empty = c("^1.2").intersect(&c("^2.0"));
    assert!(empty.is_empty());
    assert!(!empty.allows(&v("1.5.0")));
    assert_eq!(empty.to_string(), "<empty>");
    // And it stays absorbing under further algebra.
    assert!(empty.intersect(&c("*")).is_empty());
    assert_eq!(empty.union(&c("^1.2")), c("^1.2"));
}

#[test]
fn exact_prerelease_pins_match_themselves() {
    let pinned = c("==1.4.0-rc.2");
    assert!(pinned.allows(&v("1.4.0-rc.2")));
    assert!(!pinned.allows(&v("1.4.0")));

    let range = c(">=1.0");
    assert!(!range.allows(&v("1.4.0-rc.2")));
    assert!(range.allows_unrestricted(&v("1.4.0-rc.2")));
}

#[test]
fn constraints_serialize_as_their_canonical_text() {
    let value = serde_json::to_value(c("^1.2 || ~3.0")).unwrap();
    assert_eq!(value, serde_json::json!(">=1.2,<2.0 || >=3.0,<3.1"));
    let version = serde_json::to_value(v("1.2.3-rc.1")).unwrap();
    assert_eq!(version, serde_json::json!("1.2.3-rc.1"));
}

#[test]
fn parse_failures_carry_position_and_text() {
    let err = VersionConstraint::parse("^1.2, >=x").unwrap_err();
    assert_eq!(err.text, "^1.2, >=x");
    assert_eq!(err.position, 8);

    let err = VersionConstraint::parse("").unwrap_err();
    assert_eq!(err.position, 0);
}
