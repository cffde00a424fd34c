//! Internal → external port remapping.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{NatError, NatResult};

/// Maps a unit's internal port to the port exposed on the gateway.
/// Ports without an entry are exposed unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortMap {
    entries: BTreeMap<u16, u16>,
}

impl PortMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `INTERNAL:EXTERNAL[,INTERNAL:EXTERNAL,...]`. An empty string
    /// yields an empty map.
    pub fn parse(s: &str) -> NatResult<Self> {
        let mut map = PortMap::new();
        if s.trim().is_empty() {
            return Ok(map);
        }
        for entry in s.split(',') {
            let (internal, external) = parse_entry(entry)?;
            if map.entries.insert(internal, external).is_some() {
                return Err(NatError::InvalidPortMap(
                    entry.to_string(),
                    format!("internal port {internal} mapped more than once"),
                ));
            }
        }
        Ok(map)
    }

    pub fn insert(&mut self, internal: u16, external: u16) -> Option<u16> {
        self.entries.insert(internal, external)
    }

    /// External port for `internal`, defaulting to identity.
    pub fn external(&self, internal: u16) -> u16 {
        self.entries.get(&internal).copied().unwrap_or(internal)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

fn parse_entry(entry: &str) -> NatResult<(u16, u16)> {
    let invalid = |reason: String| NatError::InvalidPortMap(entry.to_string(), reason);
    let (internal, external) = entry
        .split_once(':')
        .ok_or_else(|| invalid("expected INTERNAL:EXTERNAL".to_string()))?;
    let parse = |s: &str| {
        s.trim()
            .parse::<u16>()
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| invalid(format!("{s:?} is not a valid port number")))
    };
    Ok((parse(internal)?, parse(external)?))
}

impl fmt::Display for PortMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (internal, external) in &self.entries {
            if !first {
                f.write_str(",")?;
            }
            write!(f, "{internal}:{external}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_mappings() {
        let map = PortMap::parse("80:8080,443:8443").unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.external(80), 8080);
        assert_eq!(map.external(443), 8443);
        assert_eq!(map.to_string(), "80:8080,443:8443");
    }

    #[test]
    fn missing_key_is_identity() {
        let map = PortMap::parse("80:8080").unwrap();
        assert_eq!(map.external(22), 22);
        assert_eq!(PortMap::new().external(3306), 3306);
    }

    #[test]
    fn empty_string_is_empty_map() {
        assert!(PortMap::parse("").unwrap().is_empty());
    }

    #[test]
    fn invalid_mappings() {
        for bad in ["80", "80:", ":80", "http:80", "80:99999", "0:80", "80:8080,"] {
            let err = PortMap::parse(bad).unwrap_err();
            assert!(matches!(err, NatError::InvalidPortMap(..)), "{bad}: {err}");
        }
    }

    #[test]
    fn duplicate_internal_port_rejected() {
        assert!(PortMap::parse("80:8080,80:9090").is_err());
    }
}
