//! Grouping of kept packages by declared category

use crate::selection::catalog::PackageRecord;
use std::collections::BTreeMap;

/// Package id → record, ordered by package id
pub type PackageMap = BTreeMap<String, PackageRecord>;

/// Category name → packages declaring it
pub type CategoryBuckets = BTreeMap<String, PackageMap>;

/// Drop excluded categories from the catalog's category list
pub fn selectable_categories(categories: Vec<String>, excluded: &[String]) -> Vec<String> {
    categories
        .into_iter()
        .filter(|category| !excluded.contains(category))
        .collect()
}

/// Build one bucket per category. Categories nobody declares get an empty bucket.
pub fn index_by_category(categories: &[String], packages: &PackageMap) -> CategoryBuckets {
    categories
        .iter()
        .map(|category| {
            let members = packages
                .iter()
                .filter(|(_, record)| record.categories.contains(category))
                .map(|(package, record)| (package.clone(), record.clone()))
                .collect();
            (category.clone(), members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(package: &str, categories: &[&str]) -> PackageRecord {
        PackageRecord {
            name: package.to_string(),
            target_sdk_version: Some(28),
            min_sdk_version: Some(21),
            package: package.to_string(),
            source: None,
            categories: categories.iter().map(|c| c.to_string()).collect(),
            url: None,
            last_updated: None,
            version_code: Some(1),
        }
    }

    #[test]
    fn test_selectable_categories_drops_excluded() {
        let categories = vec!["Games".to_string(), "Tools".to_string()];
        assert_eq!(
            selectable_categories(categories, &["Games".to_string()]),
            vec!["Tools".to_string()]
        );
    }

    #[test]
    fn test_package_in_several_buckets() {
        let mut packages = PackageMap::new();
        packages.insert("a".to_string(), record("a", &["Tools", "Internet"]));
        packages.insert("b".to_string(), record("b", &["Tools"]));

        let categories = vec!["Internet".to_string(), "Tools".to_string(), "Money".to_string()];
        let buckets = index_by_category(&categories, &packages);

        assert_eq!(buckets["Internet"].len(), 1);
        assert_eq!(buckets["Tools"].len(), 2);
        assert!(buckets["Money"].is_empty());
        assert_eq!(
            buckets["Tools"].keys().cloned().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string()]
        );
    }
}
