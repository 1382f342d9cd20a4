use crate::error::{Error, ErrorKind};
use apicat_model::Fingerprint;
use exn::ResultExt;

/// A package or telemetry submission whose feature usage was recorded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferenceUnit {
    pub identifier: String,
    /// Only compared against features of the same version.
    pub version: u32,
}

impl ReferenceUnit {
    pub fn new(identifier: impl Into<String>, version: u32) -> Self {
        Self { identifier: identifier.into(), version }
    }
}

/// An api, or a pattern of api use, that reference units can exercise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Feature {
    pub id: Fingerprint,
    pub version: u32,
}

/// Adoption of one feature among the reference units of its version.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureUsage {
    pub feature: Fingerprint,
    /// Fraction of same-version reference units, in `(0, 1]`.
    pub percentage: f64,
}

#[derive(sqlx::FromRow)]
pub(crate) struct ReferenceUnitRow {
    pub(crate) identifier: String,
    pub(crate) version: i64,
}
impl TryFrom<ReferenceUnitRow> for ReferenceUnit {
    type Error = Error;
    fn try_from(row: ReferenceUnitRow) -> Result<Self, Self::Error> {
        Ok(Self {
            identifier: row.identifier,
            version: u32::try_from(row.version).or_raise(|| ErrorKind::InvalidData("reference unit version"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct FeatureRow {
    pub(crate) guid: String,
    pub(crate) version: i64,
}
impl TryFrom<FeatureRow> for Feature {
    type Error = Error;
    fn try_from(row: FeatureRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.guid.parse::<Fingerprint>().or_raise(|| ErrorKind::InvalidData("feature id"))?,
            version: u32::try_from(row.version).or_raise(|| ErrorKind::InvalidData("feature version"))?,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct UsageRow {
    pub(crate) feature: String,
    pub(crate) percentage: f64,
}
impl TryFrom<UsageRow> for FeatureUsage {
    type Error = Error;
    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        Ok(Self {
            feature: row.feature.parse::<Fingerprint>().or_raise(|| ErrorKind::InvalidData("feature id"))?,
            percentage: row.percentage,
        })
    }
}
