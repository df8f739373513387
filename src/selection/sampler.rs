//! Reproducible one-app-per-category selection
//!
//! Each category slot gets its own seed. The seed fixes the start of a
//! `StdRng` stream; when a draw hits an app already picked for an earlier
//! category, the same stream keeps advancing until it yields a new app.
//! A different PRNG algorithm (or a changed catalog) yields different picks.

use crate::naming::title_case;
use crate::selection::catalog::PackageRecord;
use crate::selection::category::{CategoryBuckets, PackageMap};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, HashSet};

/// One category's pick
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub category: String,
    /// 1-based position of the pick in its bucket
    pub position: usize,
    /// Bucket size at draw time
    pub available: usize,
    pub record: PackageRecord,
}

/// Seeded draw over category buckets
#[derive(Debug, Clone)]
pub struct DeterministicSampler {
    seeds: Vec<u64>,
}

impl DeterministicSampler {
    pub fn new(seeds: Vec<u64>) -> Self {
        Self { seeds }
    }

    /// Draw from `bucket` with `seed`, skipping packages in `taken`.
    ///
    /// Returns the 1-based position and package id, or `None` when every
    /// member is already taken.
    pub fn draw(seed: u64, bucket: &PackageMap, taken: &HashSet<String>) -> Option<(usize, String)> {
        let members: Vec<&String> = bucket.keys().collect();
        if members.iter().all(|package| taken.contains(*package)) {
            return None;
        }

        let mut rng = StdRng::seed_from_u64(seed);
        loop {
            let position = rng.gen_range(1..=members.len());
            let package = members[position - 1];
            if !taken.contains(package) {
                return Some((position, package.clone()));
            }
        }
    }

    /// Pick one app per category, visiting buckets in key order.
    ///
    /// Empty buckets are skipped without consuming a seed.
    pub fn select(&self, buckets: &CategoryBuckets) -> Vec<Pick> {
        let mut picks = Vec::new();
        let mut taken = HashSet::new();
        let mut seeds = self.seeds.iter();

        for (category, bucket) in buckets {
            if bucket.is_empty() {
                tracing::error!("No packages with category {}", category);
                continue;
            }

            let Some(&seed) = seeds.next() else {
                tracing::error!("No seed value left for category {}", category);
                continue;
            };

            let Some((position, package)) = Self::draw(seed, bucket, &taken) else {
                tracing::error!(
                    "Every package with category {} was already selected",
                    category
                );
                continue;
            };

            let record = bucket[&package].clone();
            tracing::info!(
                "Selected '{}', app {} from {} available.",
                title_case(&record.name),
                position,
                bucket.len()
            );
            taken.insert(package);
            picks.push(Pick {
                category: category.clone(),
                position,
                available: bucket.len(),
                record,
            });
        }

        picks
    }
}

/// Category → record, the shape written to the selection output
pub fn picks_by_category(picks: &[Pick]) -> BTreeMap<String, PackageRecord> {
    picks
        .iter()
        .map(|pick| (pick.category.clone(), pick.record.clone()))
        .collect()
}

/// Kept packages named in `wanted`, in package id order
pub fn manual_selection(packages: &PackageMap, wanted: &[String]) -> Vec<PackageRecord> {
    packages
        .iter()
        .filter(|(package, _)| wanted.contains(package))
        .map(|(_, record)| {
            tracing::info!(
                "Manually selected '{}', used in previous publication.",
                title_case(&record.name)
            );
            record.clone()
        })
        .collect()
}
