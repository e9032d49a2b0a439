//! Integration tests for project boundary containment.

use glimpse_core::PathBoundary;
use proptest::prelude::*;
use std::path::{Path, PathBuf};

fn boundary(roots: &[&str]) -> PathBoundary {
    PathBoundary::new(roots.iter().map(PathBuf::from))
}

#[test]
fn test_empty_roots_fail_closed() {
    let boundary = boundary(&[]);
    assert!(!boundary.is_inside_project(Path::new("/proj"), Path::new("/proj/a.js")));
}

#[test]
fn test_entry_outside_roots_fails_closed() {
    let boundary = boundary(&["/proj"]);
    assert!(!boundary.is_inside_project(Path::new("/elsewhere"), Path::new("/proj/a.js")));
}

#[test]
fn test_narrowest_root_wins() {
    let boundary = boundary(&["/work", "/work/site"]);
    assert_eq!(boundary.root_for(Path::new("/work/site/docs")), Some(PathBuf::from("/work/site")));
    // The narrower root confines the document even though /work also contains the target.
    assert!(!boundary.is_inside_project(Path::new("/work/site/docs"), Path::new("/work/other/a.js")));
}

#[test]
fn test_root_change_invalidates_cache() {
    let boundary = boundary(&["/work"]);
    assert_eq!(boundary.root_for(Path::new("/work/site")), Some(PathBuf::from("/work")));
    boundary.set_roots(vec![PathBuf::from("/work/site")]);
    assert_eq!(boundary.root_for(Path::new("/work/site")), Some(PathBuf::from("/work/site")));
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,6}",
        1 => Just("..".to_string()),
        1 => Just(".".to_string()),
    ]
}

/// Lexical model: walk the segments, fail if `..` ever climbs above `/proj`.
fn stays_below_root(segments: &[String]) -> bool {
    let mut depth: usize = 0;
    for segment in segments {
        match segment.as_str() {
            "." => {}
            ".." => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            _ => depth += 1,
        }
    }
    depth > 0
}

proptest! {
    #[test]
    fn prop_containment_matches_lexical_model(segments in prop::collection::vec(segment(), 1..8)) {
        let boundary = boundary(&["/proj"]);
        let candidate = PathBuf::from("/proj").join(segments.join("/"));
        let inside = boundary.is_inside_project(Path::new("/proj"), &candidate);
        // Once a `..` escapes, cleaning can re-enter only via a literal "proj"
        // segment, which the model does not track; restrict to models that agree.
        if !segments.iter().any(|s| s == "proj") {
            prop_assert_eq!(inside, stays_below_root(&segments));
        }
    }

    #[test]
    fn prop_prefix_siblings_never_conflated(suffix in "[a-z0-9]{1,5}", file in "[a-z]{1,8}") {
        let boundary = boundary(&["/projects/a"]);
        let sibling = PathBuf::from(format!("/projects/a{suffix}/{file}.js"));
        prop_assert!(!boundary.is_inside_project(Path::new("/projects/a"), &sibling));
    }
}
