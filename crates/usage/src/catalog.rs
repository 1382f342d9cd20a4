//! What the usage store needs to know about the current catalog.

use apicat_model::Fingerprint;
use apicat_store::Catalog;

/// Membership and parent lookup of features.
pub trait FeatureCatalog {
    /// Whether `feature` still resolves.
    fn contains_feature(&self, feature: Fingerprint) -> bool;

    /// The direct parent of `feature`, if it has one.
    fn parent_feature(&self, feature: Fingerprint) -> Option<Fingerprint>;
}

/// Every api of a loaded catalog is a feature; its parent api is the parent
/// feature.
impl FeatureCatalog for Catalog {
    fn contains_feature(&self, feature: Fingerprint) -> bool {
        self.api_by_fingerprint(feature).is_some()
    }

    fn parent_feature(&self, feature: Fingerprint) -> Option<Fingerprint> {
        self.api_by_fingerprint(feature)?.parent().map(|parent| parent.fingerprint())
    }
}
