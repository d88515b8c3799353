//! The enumerated set of packages, versions and files a run works through.

use std::collections::HashSet;

pub use ghmpkg_config::config::VersionOrder;
use serde::{Deserialize, Serialize};

use crate::PackageType;

/// One file of one version of one package, as enumerated from the source organization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageRecord {
    pub organization: String,
    pub repository: String,
    pub package_type: PackageType,
    pub package_name: String,
    pub package_version: String,
    pub filename: String,
}

impl PackageRecord {
    pub fn new(
        organization: impl Into<String>,
        repository: impl Into<String>,
        package_type: PackageType,
        package_name: impl Into<String>,
        package_version: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            organization: organization.into(),
            repository: repository.into(),
            package_type,
            package_name: package_name.into(),
            package_version: package_version.into(),
            filename: filename.into(),
        }
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            organization: self.organization.clone(),
            repository: self.repository.clone(),
            package_type: self.package_type,
            package_name: self.package_name.clone(),
        }
    }

    fn belongs_to(&self, group: &GroupKey) -> bool {
        self.package_type == group.package_type
            && self.package_name == group.package_name
            && self.organization == group.organization
            && self.repository == group.repository
    }
}

/// Identity of a package within the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub organization: String,
    pub repository: String,
    pub package_type: PackageType,
    pub package_name: String,
}

/// Ordered catalog rows together with the order their versions were listed in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    records: Vec<PackageRecord>,
    order: VersionOrder,
}

impl Catalog {
    pub fn new(records: Vec<PackageRecord>, order: VersionOrder) -> Self {
        Self {
            records,
            order,
        }
    }

    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn order(&self) -> VersionOrder {
        self.order
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = PackageRecord>) {
        self.records.extend(records);
    }

    /// Distinct packages in encounter order.
    pub fn groups(&self) -> Vec<GroupKey> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| seen.insert((&r.organization, &r.repository, r.package_type, &r.package_name)))
            .map(PackageRecord::group_key)
            .collect()
    }

    /// Distinct versions of `group`, oldest first.
    ///
    /// Versions are reversed when the catalog declares them newest first, so the last
    /// version handed to the target registry is always the newest one.
    pub fn versions(&self, group: &GroupKey) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut versions: Vec<String> = self
            .records
            .iter()
            .filter(|r| r.belongs_to(group))
            .filter(|r| seen.insert(r.package_version.as_str()))
            .map(|r| r.package_version.clone())
            .collect();

        if self.order == VersionOrder::NewestFirst {
            versions.reverse();
        }
        versions
    }

    /// Distinct filenames of one version of `group`, in insertion order.
    pub fn filenames(&self, group: &GroupKey, version: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.records
            .iter()
            .filter(|r| r.belongs_to(group) && r.package_version == version)
            .filter(|r| seen.insert(r.filename.as_str()))
            .map(|r| r.filename.clone())
            .collect()
    }

    /// Number of distinct packages of `package_type`.
    pub fn package_count(&self, package_type: PackageType) -> usize {
        self.groups()
            .iter()
            .filter(|g| g.package_type == package_type)
            .count()
    }
}
