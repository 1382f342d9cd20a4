//! Configuration files name the codec; serialise it by that name.

use crate::Compression;
use serde::de::{Deserialize, Deserializer, Error as DeError};
use serde::ser::{Serialize, Serializer};

impl Serialize for Compression {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Compression {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(|err: crate::error::Error| D::Error::custom(&*err))
    }
}

#[cfg(test)]
mod tests {
    use crate::Compression;

    #[test]
    fn test_serde_by_name() {
        assert_eq!(serde_json::to_string(&Compression::Deflate).unwrap(), "\"deflate\"");
        assert_eq!(serde_json::from_str::<Compression>("\"none\"").unwrap(), Compression::None);
        assert!(serde_json::from_str::<Compression>("\"lz4\"").is_err());
    }
}
