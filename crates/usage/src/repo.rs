//! Reference units, features, usages and the feature closure.
//!
//! Every row operation is atomic and idempotent on its own: inserts ignore
//! existing rows and deletes ignore missing ones. Bulk operations are not
//! atomic as a whole; a failed run is simply repeated.

use crate::catalog::FeatureCatalog;
use crate::db::UsageDatabase;
use crate::error::{Result, raise};
use crate::models::{Feature, FeatureRow, FeatureUsage, ReferenceUnit, ReferenceUnitRow, UsageRow};
use apicat_model::Fingerprint;
use sqlx::SqlitePool;
use std::collections::HashSet;
use tracing::{debug, instrument};

/// Operations on the usage ledger.
///
/// Created from an open [`UsageDatabase`]; recreate it after the database was
/// closed and reopened.
#[derive(Debug, Clone)]
pub struct UsageRepository {
    pool: SqlitePool,
}
impl From<&UsageDatabase> for UsageRepository {
    fn from(db: &UsageDatabase) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl UsageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn version(version: u32) -> i64 {
        i64::from(version)
    }

    // =========================================================================
    // Reference units
    // =========================================================================

    /// Records a reference unit. Returns `false` if it was already recorded,
    /// in which case its version is left untouched.
    pub async fn add_reference_unit(&self, unit: &ReferenceUnit) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/insert_reference_unit.sql"))
            .bind(&unit.identifier)
            .bind(Self::version(unit.version))
            .execute(&self.pool)
            .await;
        Ok(raise(result)?.rows_affected() > 0)
    }

    /// Deletes reference units together with all of their usages. Returns how
    /// many were deleted.
    #[instrument(skip_all, fields(units = identifiers.len()))]
    pub async fn delete_reference_units<S: AsRef<str>>(&self, identifiers: &[S]) -> Result<u64> {
        let mut deleted = 0;
        for identifier in identifiers {
            let result = sqlx::query(include_str!("../queries/delete_reference_unit.sql"))
                .bind(identifier.as_ref())
                .execute(&self.pool)
                .await;
            deleted += raise(result)?.rows_affected();
        }
        debug!(deleted, "reference units deleted");
        Ok(deleted)
    }

    pub async fn list_reference_units(&self) -> Result<Vec<ReferenceUnit>> {
        let rows: Vec<ReferenceUnitRow> = raise(
            sqlx::query_as(include_str!("../queries/list_reference_units.sql")).fetch_all(&self.pool).await,
        )?;
        rows.into_iter().map(ReferenceUnit::try_from).collect()
    }

    // =========================================================================
    // Features
    // =========================================================================

    /// Registers a feature. Returns `false` if the id is already known.
    pub async fn try_add_feature(&self, feature: Fingerprint, version: u32) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/insert_feature.sql"))
            .bind(feature.to_string())
            .bind(Self::version(version))
            .execute(&self.pool)
            .await;
        Ok(raise(result)?.rows_affected() > 0)
    }

    pub async fn list_features(&self) -> Result<Vec<Feature>> {
        let rows: Vec<FeatureRow> =
            raise(sqlx::query_as(include_str!("../queries/list_features.sql")).fetch_all(&self.pool).await)?;
        rows.into_iter().map(Feature::try_from).collect()
    }

    /// Deletes every feature `catalog` no longer contains, with its usages and
    /// closure edges. Returns how many were deleted.
    #[instrument(skip_all)]
    pub async fn delete_irrelevant_features(&self, catalog: &impl FeatureCatalog) -> Result<u64> {
        let mut deleted = 0;
        for feature in self.list_features().await? {
            if catalog.contains_feature(feature.id) {
                continue;
            }
            let result = sqlx::query(include_str!("../queries/delete_feature.sql"))
                .bind(feature.id.to_string())
                .execute(&self.pool)
                .await;
            deleted += raise(result)?.rows_affected();
        }
        debug!(deleted, "irrelevant features deleted");
        Ok(deleted)
    }

    // =========================================================================
    // Usages
    // =========================================================================

    /// Records that `unit` used `feature`. Both must already be recorded.
    pub async fn add_usage(&self, unit: &str, feature: Fingerprint) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/insert_usage.sql"))
            .bind(unit)
            .bind(feature.to_string())
            .execute(&self.pool)
            .await;
        raise(result)?;
        Ok(())
    }

    pub async fn count_usages(&self) -> Result<u64> {
        let row: (i64,) =
            raise(sqlx::query_as(include_str!("../queries/count_usages.sql")).fetch_one(&self.pool).await)?;
        Ok(u64::try_from(row.0).unwrap_or(0))
    }

    /// Adoption of every used feature.
    ///
    /// A reference unit counts towards a feature when it used the feature
    /// itself or any descendant recorded in the closure, and only when both
    /// share a version. Features nobody used are left out.
    pub async fn get_usages(&self) -> Result<Vec<FeatureUsage>> {
        let rows: Vec<UsageRow> =
            raise(sqlx::query_as(include_str!("../queries/get_usages.sql")).fetch_all(&self.pool).await)?;
        rows.into_iter().map(FeatureUsage::try_from).collect()
    }

    // =========================================================================
    // Closure
    // =========================================================================

    /// Records that `ancestor` is `child` or one of its ancestors. The store
    /// does not derive transitive edges; callers supply the full closure.
    pub async fn add_parent_feature(&self, child: Fingerprint, ancestor: Fingerprint) -> Result<()> {
        let result = sqlx::query(include_str!("../queries/insert_parent_feature.sql"))
            .bind(child.to_string())
            .bind(ancestor.to_string())
            .execute(&self.pool)
            .await;
        raise(result)?;
        Ok(())
    }

    /// Derives the closure of every recorded feature from the parent chain in
    /// `catalog`: one edge to itself and one to each ancestor that is also a
    /// recorded feature. Returns how many new edges were inserted.
    #[instrument(skip_all)]
    pub async fn insert_parent_features(&self, catalog: &impl FeatureCatalog) -> Result<u64> {
        let mut inserted = 0;
        for feature in self.list_features().await? {
            if !catalog.contains_feature(feature.id) {
                continue;
            }
            let mut seen = HashSet::from([feature.id]);
            let mut ancestor = Some(feature.id);
            while let Some(current) = ancestor {
                let result = sqlx::query(include_str!("../queries/insert_known_parent_feature.sql"))
                    .bind(feature.id.to_string())
                    .bind(current.to_string())
                    .execute(&self.pool)
                    .await;
                inserted += raise(result)?.rows_affected();
                ancestor = catalog.parent_feature(current).filter(|parent| seen.insert(*parent));
            }
        }
        debug!(inserted, "parent features inserted");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use apicat_build::CatalogBuilder;
    use apicat_model::ApiKind;
    use apicat_store::{Catalog, Compression, encode};
    use std::collections::HashMap;

    fn feature(name: &str) -> Fingerprint {
        Fingerprint::of_api(name)
    }

    async fn repository() -> UsageRepository {
        UsageRepository::from(&UsageDatabase::connect_in_memory().await.unwrap())
    }

    async fn percentages(repo: &UsageRepository) -> HashMap<Fingerprint, f64> {
        repo.get_usages().await.unwrap().into_iter().map(|usage| (usage.feature, usage.percentage)).collect()
    }

    /// Parent links only, no catalog file.
    struct Tree(HashMap<Fingerprint, Option<Fingerprint>>);

    impl FeatureCatalog for Tree {
        fn contains_feature(&self, feature: Fingerprint) -> bool {
            self.0.contains_key(&feature)
        }

        fn parent_feature(&self, feature: Fingerprint) -> Option<Fingerprint> {
            self.0.get(&feature).copied().flatten()
        }
    }

    #[tokio::test]
    async fn features_are_append_only() {
        let repo = repository().await;
        assert!(repo.try_add_feature(feature("F"), 1).await.unwrap());
        assert!(!repo.try_add_feature(feature("F"), 2).await.unwrap());
        assert_eq!(repo.list_features().await.unwrap(), vec![Feature { id: feature("F"), version: 1 }]);
    }

    #[tokio::test]
    async fn percentage_is_used_over_total() {
        let repo = repository().await;
        repo.try_add_feature(feature("F"), 1).await.unwrap();
        repo.try_add_feature(feature("Unused"), 1).await.unwrap();
        for unit in ["a", "b", "c", "d"] {
            repo.add_reference_unit(&ReferenceUnit::new(unit, 1)).await.unwrap();
        }
        for unit in ["a", "b", "c"] {
            repo.add_usage(unit, feature("F")).await.unwrap();
        }
        repo.add_usage("a", feature("F")).await.unwrap();

        let usages = percentages(&repo).await;
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[&feature("F")], 0.75);
        assert_eq!(repo.count_usages().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn versions_are_counted_separately() {
        let repo = repository().await;
        repo.try_add_feature(feature("F1"), 1).await.unwrap();
        repo.try_add_feature(feature("F2"), 2).await.unwrap();
        repo.add_reference_unit(&ReferenceUnit::new("one", 1)).await.unwrap();
        repo.add_reference_unit(&ReferenceUnit::new("two", 2)).await.unwrap();
        repo.add_usage("one", feature("F1")).await.unwrap();
        repo.add_usage("two", feature("F2")).await.unwrap();

        let usages = percentages(&repo).await;
        assert_eq!(usages[&feature("F1")], 1.0);
        assert_eq!(usages[&feature("F2")], 1.0);
    }

    #[tokio::test]
    async fn usage_rolls_up_to_ancestors() {
        let repo = repository().await;
        let (root, a, ab) = (feature("Root"), feature("A"), feature("A.B"));
        for id in [root, a, ab] {
            repo.try_add_feature(id, 1).await.unwrap();
        }
        for (child, ancestor) in [(ab, ab), (ab, a), (ab, root), (a, a), (a, root), (root, root)] {
            repo.add_parent_feature(child, ancestor).await.unwrap();
        }
        repo.add_reference_unit(&ReferenceUnit::new("unit", 1)).await.unwrap();
        repo.add_reference_unit(&ReferenceUnit::new("idle", 1)).await.unwrap();
        repo.add_usage("unit", ab).await.unwrap();

        let usages = percentages(&repo).await;
        assert_eq!(usages.len(), 3);
        for id in [root, a, ab] {
            assert_eq!(usages[&id], 0.5);
        }
    }

    #[tokio::test]
    async fn reference_unit_refresh() {
        let repo = repository().await;
        repo.try_add_feature(feature("F"), 1).await.unwrap();
        let unit = ReferenceUnit::new("pkg/1.0.0", 1);
        assert!(repo.add_reference_unit(&unit).await.unwrap());
        assert!(!repo.add_reference_unit(&unit).await.unwrap());
        repo.add_usage(&unit.identifier, feature("F")).await.unwrap();

        assert_eq!(repo.delete_reference_units(&[unit.identifier.as_str(), "missing"]).await.unwrap(), 1);
        assert!(repo.add_reference_unit(&unit).await.unwrap());
        assert_eq!(repo.list_reference_units().await.unwrap(), vec![unit]);
        assert_eq!(repo.count_usages().await.unwrap(), 0);
        assert!(repo.get_usages().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_feature_drops_its_usages() {
        let repo = repository().await;
        let (kept, dropped) = (feature("Kept"), feature("Dropped"));
        for id in [kept, dropped] {
            repo.try_add_feature(id, 1).await.unwrap();
            repo.add_parent_feature(id, id).await.unwrap();
        }
        repo.add_parent_feature(dropped, kept).await.unwrap();
        repo.add_reference_unit(&ReferenceUnit::new("unit", 1)).await.unwrap();
        repo.add_usage("unit", kept).await.unwrap();
        repo.add_usage("unit", dropped).await.unwrap();

        let tree = Tree(HashMap::from([(kept, None)]));
        assert_eq!(repo.delete_irrelevant_features(&tree).await.unwrap(), 1);
        assert_eq!(repo.count_usages().await.unwrap(), 1);
        let edges: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM parent_features").fetch_one(&repo.pool).await.unwrap();
        assert_eq!(edges.0, 1);
        let usages = percentages(&repo).await;
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[&kept], 1.0);
    }

    #[tokio::test]
    async fn usages_need_known_rows() {
        let repo = repository().await;
        repo.add_reference_unit(&ReferenceUnit::new("unit", 1)).await.unwrap();
        let err = repo.add_usage("unit", feature("F")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownReference);
        let err = repo.add_parent_feature(feature("F"), feature("F")).await.unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownReference);
    }

    #[tokio::test]
    async fn closure_follows_the_parent_chain() {
        let repo = repository().await;
        let (root, a, ab, orphan) = (feature("Root"), feature("A"), feature("A.B"), feature("Orphan"));
        let tree = Tree(HashMap::from([(root, None), (a, Some(root)), (ab, Some(a)), (orphan, Some(feature("Gone")))]));
        for id in [root, a, ab, orphan, feature("Stale")] {
            repo.try_add_feature(id, 1).await.unwrap();
        }

        assert_eq!(repo.delete_irrelevant_features(&tree).await.unwrap(), 1);
        // Root 1, A 2, A.B 3, Orphan 1 (its parent is not a feature).
        assert_eq!(repo.insert_parent_features(&tree).await.unwrap(), 7);
        assert_eq!(repo.insert_parent_features(&tree).await.unwrap(), 0);

        repo.add_reference_unit(&ReferenceUnit::new("unit", 1)).await.unwrap();
        repo.add_usage("unit", ab).await.unwrap();
        let usages = percentages(&repo).await;
        assert_eq!(usages.len(), 3);
        assert!(!usages.contains_key(&orphan));
    }

    #[tokio::test]
    async fn loaded_catalog_drives_the_closure() {
        let mut builder = CatalogBuilder::new();
        builder.define_api(feature("N:N"), ApiKind::Namespace.ordinal(), None, "N");
        builder.define_api(feature("T:N.T"), ApiKind::Class.ordinal(), Some(feature("N:N")), "T");
        builder.define_api(feature("M:N.T.M"), ApiKind::Method.ordinal(), Some(feature("T:N.T")), "M()");
        let model = builder.commit().model;
        let catalog = Catalog::from_bytes(&encode(&model, Compression::None).unwrap()).unwrap();

        let repo = repository().await;
        for id in ["N:N", "T:N.T", "M:N.T.M", "M:N.T.Removed"] {
            repo.try_add_feature(feature(id), 1).await.unwrap();
        }
        assert_eq!(repo.delete_irrelevant_features(&catalog).await.unwrap(), 1);
        assert_eq!(repo.insert_parent_features(&catalog).await.unwrap(), 6);

        repo.add_reference_unit(&ReferenceUnit::new("unit", 1)).await.unwrap();
        repo.add_usage("unit", feature("M:N.T.M")).await.unwrap();
        let usages = percentages(&repo).await;
        assert_eq!(usages.len(), 3);
        assert_eq!(usages[&feature("N:N")], 1.0);
    }

    #[tokio::test]
    async fn survives_close_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = UsageDatabase::open(dir.path().join("usage.db")).await.unwrap();
        let repo = UsageRepository::from(&db);
        repo.try_add_feature(feature("F"), 3).await.unwrap();
        db.close().await;

        db.reopen().await.unwrap();
        let repo = UsageRepository::from(&db);
        assert_eq!(repo.list_features().await.unwrap(), vec![Feature { id: feature("F"), version: 3 }]);
        db.close().await;
    }
}
