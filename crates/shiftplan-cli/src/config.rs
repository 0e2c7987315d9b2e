//! Bounds / run configuration file (TOML)
//!
//! ```toml
//! name = "Lab shifts"
//! max_shifts_per_day = 1
//! utc_offset_minutes = 60
//!
//! [people.alice]
//! min = 1
//! max = 4
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use shiftplan_core::{BoundsInput, LoadBound, PersonId};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Problem name, replaces the poll title
    pub name: Option<String>,
    pub max_shifts_per_day: Option<i64>,
    /// Offset for epoch-millisecond slots, minutes east of UTC
    pub utc_offset_minutes: Option<i32>,
    #[serde(default)]
    pub people: BTreeMap<PersonId, LoadBound>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read bounds file: {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid bounds file: {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn bounds(&self) -> BoundsInput {
        BoundsInput {
            people: self.people.clone(),
            max_shifts_per_day: self.max_shifts_per_day,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file() {
        let config = RunConfig::parse(
            r#"
name = "Lab shifts"
max_shifts_per_day = 2
utc_offset_minutes = 60

[people.alice]
min = 1
max = 4

[people.bob]
max = 2
"#,
        )
        .unwrap();

        assert_eq!(config.name.as_deref(), Some("Lab shifts"));
        assert_eq!(config.utc_offset_minutes, Some(60));
        let bounds = config.bounds();
        assert_eq!(bounds.max_shifts_per_day, Some(2));
        assert_eq!(bounds.people["alice"], LoadBound::range(1, 4));
        assert_eq!(bounds.people["bob"], LoadBound::new().max(2));
    }

    #[test]
    fn empty_file_is_default() {
        assert_eq!(RunConfig::parse("").unwrap(), RunConfig::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(RunConfig::parse("max_shift_per_day = 2").is_err());
    }
}
