//! Font identity.

use std::{fmt, str::FromStr};

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A random (version 4) uuid in its hyphenated lowercase form.
///
/// Ids name files on disk so parsing only accepts exactly that shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FontId(String);

const GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

impl FontId {
    pub fn generate() -> FontId {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        bytes[6] = (bytes[6] & 0x0f) | 0x40;
        bytes[8] = (bytes[8] & 0x3f) | 0x80;
        let hex = bytes
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<String>();
        let mut id = String::with_capacity(36);
        let mut start = 0;
        for (i, len) in GROUPS.iter().enumerate() {
            if i > 0 {
                id.push('-');
            }
            id.push_str(&hex[start..start + len]);
            start += len;
        }
        FontId(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for FontId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let groups = s.split('-').collect::<Vec<_>>();
        let well_formed = groups.len() == GROUPS.len()
            && groups.iter().zip(GROUPS).all(|(group, len)| {
                group.len() == len
                    && group
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            });
        if !well_formed {
            return Err(Error::InvalidId(s.to_string()));
        }
        Ok(FontId(s.to_string()))
    }
}

impl TryFrom<String> for FontId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FontId> for String {
    fn from(value: FontId) -> Self {
        value.0
    }
}

impl fmt::Display for FontId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn generated_ids_parse() {
        let id = FontId::generate();
        assert_eq!(36, id.as_str().len());
        assert_eq!(Some('4'), id.as_str().chars().nth(14));
        assert_eq!(id, id.as_str().parse::<FontId>().unwrap());
    }

    #[test]
    fn generated_ids_differ() {
        assert_ne!(FontId::generate(), FontId::generate());
    }

    #[test]
    fn path_like_ids_are_rejected() {
        for bad in [
            "",
            "../../etc/passwd",
            "0b6cfd52-3a6c-4d7c-9ea1-1a0c4a5e2f1",
            "0B6CFD52-3A6C-4D7C-9EA1-1A0C4A5E2F1B",
            "0b6cfd52-3a6c-4d7c-9ea1-1a0c4a5e2f1b/",
        ] {
            assert!(
                matches!(bad.parse::<FontId>(), Err(Error::InvalidId(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn serializes_as_a_string() {
        let id: FontId = "0b6cfd52-3a6c-4d7c-9ea1-1a0c4a5e2f1b".parse().unwrap();
        assert_eq!(
            "\"0b6cfd52-3a6c-4d7c-9ea1-1a0c4a5e2f1b\"",
            serde_json::to_string(&id).unwrap()
        );
    }
}
