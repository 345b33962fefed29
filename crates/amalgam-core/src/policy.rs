//! Internalization policy
//!
//! Decides whether the configuration wants a secondary type hidden when
//! nothing else forces it to stay public. The exposure analysis overrides this
//! verdict; primary types never consult it.

use std::fmt;

use regex::Regex;

use crate::error::OptionsError;
use crate::options::MergeOptions;

#[derive(Debug, Clone)]
pub enum InternalizePolicy {
    /// Internalization switched off; every type keeps its visibility
    Disabled,
    /// Internalize everything the analysis does not expose
    All,
    /// Internalize everything except names matching one of the patterns
    AllExcept(Vec<Regex>),
}

impl InternalizePolicy {
    /// Build the policy, compiling every exclusion pattern up front so a bad
    /// pattern fails configuration loading instead of the merge.
    pub fn from_options(options: &MergeOptions) -> Result<Self, OptionsError> {
        if !options.internalize {
            return Ok(InternalizePolicy::Disabled);
        }

        let patterns = options.exclusion_patterns()?;
        if patterns.is_empty() {
            return Ok(InternalizePolicy::All);
        }

        let compiled = patterns
            .into_iter()
            .map(|pattern| {
                Regex::new(&pattern).map_err(|source| OptionsError::InvalidPattern { pattern, source })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(InternalizePolicy::AllExcept(compiled))
    }

    pub fn should_internalize(&self, full_name: &str) -> bool {
        match self {
            InternalizePolicy::Disabled => false,
            InternalizePolicy::All => true,
            InternalizePolicy::AllExcept(exclusions) => {
                // Exclusions are often written against assembly-qualified names,
                // where type names appear in brackets.
                let bracketed = format!("[{}]", full_name);
                !exclusions
                    .iter()
                    .any(|re| re.is_match(full_name) || re.is_match(&bracketed))
            }
        }
    }
}

impl fmt::Display for InternalizePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalizePolicy::Disabled => write!(f, "internalize disabled"),
            InternalizePolicy::All => write!(f, "internalize all"),
            InternalizePolicy::AllExcept(exclusions) => {
                write!(f, "internalize all except ")?;
                for (i, re) in exclusions.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "/{}/", re.as_str())?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(options: MergeOptions) -> InternalizePolicy {
        InternalizePolicy::from_options(&options).expect("valid options")
    }

    #[test]
    fn test_disabled_never_internalizes() {
        let p = policy(MergeOptions::new(false).exclude("^Never$"));
        assert!(matches!(p, InternalizePolicy::Disabled));
        assert!(!p.should_internalize("Lib.Anything"));
        assert!(!p.should_internalize("Never"));
    }

    #[test]
    fn test_no_exclusions_internalizes_everything() {
        let p = policy(MergeOptions::new(true));
        assert!(matches!(p, InternalizePolicy::All));
        assert!(p.should_internalize("Lib.Anything"));
        assert!(p.should_internalize(""));
    }

    #[test]
    fn test_exclusion_keeps_type_public() {
        let p = policy(MergeOptions::new(true).exclude(r"^MyLib\.Public\..*$"));
        assert!(!p.should_internalize("MyLib.Public.Foo"));
        assert!(p.should_internalize("MyLib.Internal.Foo"));
    }

    #[test]
    fn test_bracketed_form_matches() {
        // Authored against "Namespace.Type, Assembly" style names
        let p = policy(MergeOptions::new(true).exclude(r"\[MyLib\.Api\]"));
        assert!(!p.should_internalize("MyLib.Api"));
        assert!(p.should_internalize("MyLib.Api2"));
    }

    #[test]
    fn test_any_exclusion_in_order() {
        let p = policy(MergeOptions::new(true).exclude("^A\\.").exclude("^B\\."));
        assert!(!p.should_internalize("A.One"));
        assert!(!p.should_internalize("B.Two"));
        assert!(p.should_internalize("C.Three"));
    }

    #[test]
    fn test_invalid_pattern_fails_at_load() {
        let err = InternalizePolicy::from_options(&MergeOptions::new(true).exclude("(unclosed")).unwrap_err();
        match err {
            OptionsError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_pattern_ignored_when_disabled() {
        let p = policy(MergeOptions::new(false).exclude("(unclosed"));
        assert!(matches!(p, InternalizePolicy::Disabled));
    }

    #[test]
    fn test_display() {
        let p = policy(MergeOptions::new(true).exclude("^A$").exclude("^B$"));
        assert_eq!(p.to_string(), "internalize all except /^A$/, /^B$/");
    }
}
