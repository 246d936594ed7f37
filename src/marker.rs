//! # Optimization Tier Markers
//!
//! Rappresentazione interna dei marker di idempotenza embedded nei file.
//!
//! I marker formano una catena ordinata `None → Optimized → Aggressive`:
//! ogni stadio della pipeline prende in carico i file del tier precedente.
//! Le costanti stringa scritte nel campo Comment dai tool esterni vivono
//! SOLO qui, al confine di serializzazione; il resto del codice ragiona
//! sull'enum tipizzato.

/// Tag value stamped for files that completed normal optimization.
const TAG_OPTIMIZED: &str = "philoassets-optimized";

/// Tag value stamped for files that completed the aggressive WebP pass.
const TAG_AGGRESSIVE: &str = "philoassets-aggressive";

/// Optimization stage already applied to a file, as recorded in its
/// embedded metadata. Ordered: a higher tier implies the lower ones ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Tier {
    /// No marker present (or marker unreadable, which degrades to this).
    #[default]
    None,
    /// Normal-mode optimization completed.
    Optimized,
    /// Aggressive WebP re-encoding completed.
    Aggressive,
}

impl Tier {
    /// Serialize the tier to the free-text tag written by the metadata tool.
    /// `None` has no tag representation and is never written.
    pub fn as_tag(&self) -> Option<&'static str> {
        match self {
            Tier::None => None,
            Tier::Optimized => Some(TAG_OPTIMIZED),
            Tier::Aggressive => Some(TAG_AGGRESSIVE),
        }
    }

    /// Deserialize a comment field read back from a file. Unknown or
    /// unrelated comment content maps to `None`: foreign comments must not
    /// make a file look processed.
    pub fn from_tag(comment: Option<&str>) -> Self {
        match comment.map(str::trim) {
            Some(TAG_OPTIMIZED) => Tier::Optimized,
            Some(TAG_AGGRESSIVE) => Tier::Aggressive,
            _ => Tier::None,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Tier::None => "none",
            Tier::Optimized => "optimized",
            Tier::Aggressive => "aggressive",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_ordering() {
        assert!(Tier::None < Tier::Optimized);
        assert!(Tier::Optimized < Tier::Aggressive);
    }

    #[test]
    fn test_tag_round_trip() {
        for tier in [Tier::Optimized, Tier::Aggressive] {
            let tag = tier.as_tag().unwrap();
            assert_eq!(Tier::from_tag(Some(tag)), tier);
        }
        assert_eq!(Tier::None.as_tag(), None);
    }

    #[test]
    fn test_foreign_comments_map_to_none() {
        assert_eq!(Tier::from_tag(None), Tier::None);
        assert_eq!(Tier::from_tag(Some("")), Tier::None);
        assert_eq!(Tier::from_tag(Some("shot on holiday")), Tier::None);
        assert_eq!(Tier::from_tag(Some("philoassets-unknown")), Tier::None);
    }

    #[test]
    fn test_whitespace_tolerant_parse() {
        assert_eq!(Tier::from_tag(Some(" philoassets-optimized ")), Tier::Optimized);
    }
}
