use std::fmt::{Display, Formatter, Result as FmtResult};

/// The identity of an assembly: name, version and public key token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    pub name: String,
    pub version: String,
    /// Lowercase hex, or empty for unsigned assemblies.
    pub public_key_token: String,
}

impl AssemblyIdentity {
    pub fn new(name: impl Into<String>, version: impl Into<String>, public_key_token: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            public_key_token: public_key_token.into(),
        }
    }
}

impl Display for AssemblyIdentity {
    /// Renders the identity the way the assembly-qualified name spells it.
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let token = if self.public_key_token.is_empty() { "null" } else { self.public_key_token.as_str() };
        write!(f, "{}, Version={}, PublicKeyToken={}", self.name, self.version, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let identity = AssemblyIdentity::new("System.Runtime", "8.0.0.0", "b03f5f7f11d50a3a");
        assert_eq!(identity.to_string(), "System.Runtime, Version=8.0.0.0, PublicKeyToken=b03f5f7f11d50a3a");
        let unsigned = AssemblyIdentity::new("Foo", "1.0.0.0", "");
        assert_eq!(unsigned.to_string(), "Foo, Version=1.0.0.0, PublicKeyToken=null");
    }
}
