// tests/path_filter_props.rs

use std::path::{Path, PathBuf};

use proptest::prelude::*;

use rewatch::watch::PathFilter;

fn segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,7}"
}

fn segments(max: usize) -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(segment(), 1..=max)
}

fn join(parts: &[String]) -> PathBuf {
    parts.iter().collect()
}

proptest! {
    #[test]
    fn everything_under_an_excluded_dir_is_excluded(
        excluded in segments(3),
        tail in prop::collection::vec(segment(), 0..4),
    ) {
        let excluded_rel = join(&excluded);
        let excluded_str = excluded.join("/");
        let filter = PathFilter::new(Path::new("/proj"), &[], &[excluded_str.as_str()]);

        let mut relative = excluded_rel.clone();
        relative.extend(&tail);
        let absolute = Path::new("/proj").join(&relative);

        prop_assert!(filter.matches_excluded(&relative));
        prop_assert!(filter.matches_excluded(&absolute));
    }

    #[test]
    fn siblings_of_an_excluded_dir_are_kept(
        excluded in segment(),
        sibling in segment(),
        tail in prop::collection::vec(segment(), 0..4),
    ) {
        prop_assume!(excluded != sibling);
        let filter = PathFilter::new(Path::new("/proj"), &[], &[excluded.as_str()]);

        let mut path = PathBuf::from(&sibling);
        path.extend(&tail);
        prop_assert!(!filter.matches_excluded(&path));

        // A name that merely starts with the excluded one is a different entry.
        let prefixed = format!("{excluded}{sibling}");
        prop_assert!(!filter.matches_excluded(Path::new(&prefixed)));
    }

    #[test]
    fn empty_allow_list_accepts_any_file(parts in segments(4), ext in "[a-z]{0,4}") {
        let filter = PathFilter::new::<&str>(Path::new("."), &[], &[]);
        let mut path = join(&parts);
        if !ext.is_empty() {
            path.set_extension(&ext);
        }
        prop_assert!(filter.matches_extension(&path));
    }

    #[test]
    fn allow_list_matches_exactly_its_extensions(
        stem in segment(),
        ext in "[a-z]{1,4}",
        allowed in prop::collection::vec("[a-z]{1,4}", 1..4),
    ) {
        let allowed: Vec<String> = allowed.iter().map(|e| format!(".{e}")).collect();
        let filter = PathFilter::new(Path::new("."), allowed.as_slice(), &[]);
        let file = PathBuf::from(format!("{stem}.{ext}"));

        let expected = allowed.contains(&format!(".{ext}"));
        prop_assert_eq!(filter.matches_extension(&file), expected);
    }
}
