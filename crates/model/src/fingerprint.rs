//! Content-addressed 128-bit identities.
//!
//! Fingerprints are the only identity that is stable across independently
//! built catalogs. They are BLAKE3 digests truncated to 128 bits; accidental
//! collisions over the size of a package ecosystem are not a practical
//! concern, adversarial ones are out of scope.

use crate::error::{Error, ErrorKind};
use crate::identity::AssemblyIdentity;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::str::FromStr;

const LENGTH: usize = 16;

/// A 128-bit content hash identifying a package, an assembly or an API.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; LENGTH]);

impl Fingerprint {
    /// The sentinel for symbols without a stable canonical id (the global
    /// namespace, type parameters). Never a hyperlink target.
    pub const EMPTY: Self = Self([0; LENGTH]);

    pub const fn from_bytes(bytes: [u8; LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; LENGTH] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == [0; LENGTH]
    }

    fn digest(hasher: &blake3::Hasher) -> Self {
        let hash = hasher.finalize();
        let mut bytes = [0; LENGTH];
        bytes.copy_from_slice(&hash.as_bytes()[..LENGTH]);
        Self(bytes)
    }

    /// Fingerprint of an API from its documentation-comment style id
    /// (`T:System.String`, `M:System.String.Trim`, ...).
    ///
    /// The global namespace (`N:` or an empty id) and type parameters
    /// (`!:T`) have no stable id and map to [`EMPTY`](Self::EMPTY).
    pub fn of_api(canonical_id: &str) -> Self {
        match canonical_id {
            "" | "N:" => Self::EMPTY,
            id if id.starts_with("!:") => Self::EMPTY,
            id => {
                let mut hasher = blake3::Hasher::new();
                hasher.update(id.as_bytes());
                Self::digest(&hasher)
            },
        }
    }

    /// Fingerprint of a package: the hash of `"{id}/{version}"`.
    pub fn of_package(id: &str, version: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(id.as_bytes());
        hasher.update(b"/");
        hasher.update(version.as_bytes());
        Self::digest(&hasher)
    }

    /// Fingerprint of an assembly: the identity string followed by the
    /// serialized syntax of every API it declares, in the order given. Each
    /// part is prefixed with its length, so no two part lists hash alike.
    ///
    /// The caller is responsible for a deterministic order; see
    /// [`AssemblyRecord::compute_fingerprint`](crate::AssemblyRecord::compute_fingerprint).
    pub fn of_assembly<I, S>(identity: &AssemblyIdentity, syntax: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fn part(hasher: &mut blake3::Hasher, bytes: &[u8]) {
            hasher.update(&(bytes.len() as u64).to_le_bytes());
            hasher.update(bytes);
        }
        let mut hasher = blake3::Hasher::new();
        part(&mut hasher, identity.to_string().as_bytes());
        for declaration in syntax {
            part(&mut hasher, declaration.as_ref().as_bytes());
        }
        Self::digest(&hasher)
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Debug for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Fingerprint({self})")
    }
}

impl FromStr for Fingerprint {
    type Err = Error;
    /// Accepts 32 hex digits, or the hyphenated/braced GUID spelling of them.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches('{').trim_end_matches('}').replace('-', "");
        if digits.is_empty() {
            return Ok(Self::EMPTY);
        }
        if digits.len() != LENGTH * 2 || !digits.is_ascii() {
            exn::bail!(ErrorKind::InvalidFingerprint(s.to_string()));
        }
        let mut bytes = [0; LENGTH];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = match u8::from_str_radix(&digits[i * 2..i * 2 + 2], 16) {
                Ok(b) => b,
                Err(_) => exn::bail!(ErrorKind::InvalidFingerprint(s.to_string())),
            };
        }
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(|_| D::Error::custom(format!("invalid fingerprint: {text}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn api_fingerprints_are_deterministic() {
        let a = Fingerprint::of_api("T:System.String");
        let b = Fingerprint::of_api("T:System.String");
        assert_eq!(a, b);
        assert_ne!(a, Fingerprint::of_api("T:System.Object"));
        assert!(!a.is_empty());
    }

    #[rstest]
    #[case("")]
    #[case("N:")]
    #[case("!:T")]
    fn sentinel_ids(#[case] id: &str) {
        assert_eq!(Fingerprint::of_api(id), Fingerprint::EMPTY);
    }

    #[test]
    fn package_fingerprint_uses_id_and_version() {
        let a = Fingerprint::of_package("Newtonsoft.Json", "13.0.1");
        assert_eq!(a, Fingerprint::of_package("Newtonsoft.Json", "13.0.1"));
        assert_ne!(a, Fingerprint::of_package("Newtonsoft.Json", "13.0.2"));
    }

    #[test]
    fn assembly_fingerprint_covers_every_declaration() {
        let identity = AssemblyIdentity::new("System.Runtime", "4.0.0.0", "b03f5f7f11d50a3a");
        let a = Fingerprint::of_assembly(&identity, ["namespace System", "public class Object"]);
        let b = Fingerprint::of_assembly(&identity, ["namespace System", "public class Object"]);
        let c = Fingerprint::of_assembly(&identity, ["namespace System", "public sealed class Object"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn assembly_fingerprint_keeps_part_boundaries() {
        let identity = AssemblyIdentity::new("A", "1.0.0.0", "");
        let split = Fingerprint::of_assembly(&identity, ["<syntax><k>a</k></syntax>", "<syntax/>"]);
        let joined = Fingerprint::of_assembly(&identity, ["<syntax><k>a</k></syntax><syntax/>"]);
        assert_ne!(split, joined);
        assert_ne!(Fingerprint::of_assembly(&identity, ["ab", "c"]), Fingerprint::of_assembly(&identity, ["a", "bc"]));
        assert_ne!(Fingerprint::of_assembly(&identity, ["x"]), Fingerprint::of_assembly(&identity, ["x", ""]));
    }

    #[rstest]
    #[case("000102030405060708090a0b0c0d0e0f")]
    #[case("00010203-0405-0607-0809-0a0b0c0d0e0f")]
    #[case("{00010203-0405-0607-0809-0A0B0C0D0E0F}")]
    fn parse_forms(#[case] text: &str) {
        let fingerprint: Fingerprint = text.parse().unwrap();
        assert_eq!(fingerprint.as_bytes(), &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(fingerprint.to_string(), "000102030405060708090a0b0c0d0e0f");
    }

    #[rstest]
    #[case("xyz")]
    #[case("000102030405060708090a0b0c0d0e")]
    #[case("zz0102030405060708090a0b0c0d0e0f")]
    fn parse_invalid(#[case] text: &str) {
        assert!(text.parse::<Fingerprint>().is_err());
    }

    #[test]
    fn serde_as_string() {
        let fingerprint = Fingerprint::of_api("T:N.T");
        let json = serde_json::to_string(&fingerprint).unwrap();
        assert_eq!(json, format!("\"{fingerprint}\""));
        assert_eq!(serde_json::from_str::<Fingerprint>(&json).unwrap(), fingerprint);
    }
}
