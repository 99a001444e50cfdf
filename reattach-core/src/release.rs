//! # Release Classification
//!
//! Maps a Darwin release string (what `uname -r` prints) to the reattach
//! variant that knows how to move the bootstrap namespace handle on that
//! release. The mapping is an ordered band table plus a clamping rule, so
//! every input lands on exactly one variant.

use crate::errors::ClassifyWarning;
use std::fmt;
use std::ops::RangeInclusive;

/// Oldest Darwin major with a working mechanism (Mac OS X 10.5).
pub const OLDEST_SUPPORTED_DARWIN: u32 = 9;

/// Newest Darwin major we have seen (macOS 26).
pub const NEWEST_KNOWN_DARWIN: u32 = 25;

/// The `uname` sysname we expect to run on.
pub const EXPECTED_SYSNAME: &str = "Darwin";

/// A release parsed from a platform identifier string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsVersion {
    /// A Darwin kernel release.
    Darwin {
        /// The Darwin major number.
        major: u32,
        /// The minor number, if one was present.
        minor: Option<u32>,
    },
    /// The leading component could not be parsed.
    Unknown,
}

impl OsVersion {
    /// Parses a release string.
    ///
    /// Darwin kernels print `major.minor.patch`. A two-part `10.N` with `N >= 9`
    /// cannot be a Darwin 10 kernel (those stopped at 10.8), so it is read as
    /// a marketing version and converted to its Darwin major. A `10.N` too
    /// large to convert maps to `u32::MAX`, which classifies as a new OS.
    ///
    /// Every other string is read as a kernel release. Marketing versions
    /// from 11 on collide with Darwin majors, so `11.0` means Darwin 11
    /// (Mac OS X 10.7), not Big Sur; pass `uname -r` output for those hosts.
    pub fn parse(release: &str) -> Self {
        let mut parts = release.trim().split('.');
        let Some(major) = parts.next().and_then(|p| p.parse::<u32>().ok()) else {
            return OsVersion::Unknown;
        };
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        let is_marketing = major == 10 && parts.next().is_none() && minor.is_some_and(|m| m >= 9);

        match (is_marketing, minor) {
            (true, Some(minor)) => OsVersion::Darwin {
                major: minor.checked_add(4).unwrap_or(u32::MAX),
                minor: None,
            },
            _ => OsVersion::Darwin { major, minor },
        }
    }

    /// The Darwin major number, if known.
    pub fn darwin_major(&self) -> Option<u32> {
        match self {
            OsVersion::Darwin { major, .. } => Some(*major),
            OsVersion::Unknown => None,
        }
    }

    /// The macOS marketing version matching this release, e.g. `10.9` or `13`.
    pub fn marketing_name(&self) -> Option<String> {
        self.darwin_major().map(marketing_name)
    }
}

fn marketing_name(darwin_major: u32) -> String {
    match darwin_major {
        0..=3 => "10.0".to_string(),
        4..=19 => format!("10.{}", darwin_major - 4),
        _ => format!("{}", darwin_major - 9),
    }
}

/// How the modern mechanism finds the per-user namespace.
///
/// No release band selects [`ModernLookup::ManagerCheck`]; it is only used
/// when asked for explicitly.
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModernLookup {
    /// Check the launchd manager name first; look up the per-user namespace
    /// under the root one when running in the system session, otherwise
    /// detach from the console session.
    ManagerCheck,
    /// Ask launchd for the per-user namespace directly.
    Direct,
}

/// The strategy used to move the bootstrap namespace handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReattachVariant {
    /// Two-argument `_vprocmgr_move_subset_to_user` (10.5).
    Legacy,
    /// Three-argument `_vprocmgr_move_subset_to_user` (10.6 to 10.9).
    Mid,
    /// Namespace lookup instead of a single library call (10.10 and later).
    Modern(ModernLookup),
}

impl ReattachVariant {
    /// Short, stable name of the variant family.
    pub fn name(&self) -> &'static str {
        match self {
            ReattachVariant::Legacy => "legacy",
            ReattachVariant::Mid => "mid",
            ReattachVariant::Modern(_) => "modern",
        }
    }

    /// A release string in this variant's family that classifies without
    /// warnings. Modern releases classify as direct lookup.
    pub fn representative_release(&self) -> &'static str {
        match self {
            ReattachVariant::Legacy => "9.8.0",
            ReattachVariant::Mid => "13.4.0",
            ReattachVariant::Modern(_) => "19.6.0",
        }
    }

    /// Swaps the lookup of a modern variant; other variants are unchanged.
    pub fn with_modern_lookup(self, lookup: ModernLookup) -> Self {
        match self {
            ReattachVariant::Modern(_) => ReattachVariant::Modern(lookup),
            other => other,
        }
    }
}

impl fmt::Display for ReattachVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReattachVariant::Modern(ModernLookup::ManagerCheck) => {
                write!(f, "modern (manager check)")
            }
            ReattachVariant::Modern(ModernLookup::Direct) => write!(f, "modern (direct lookup)"),
            other => f.write_str(other.name()),
        }
    }
}

/// Ordered, contiguous band table of Darwin majors.
const BANDS: &[(RangeInclusive<u32>, ReattachVariant)] = &[
    (OLDEST_SUPPORTED_DARWIN..=9, ReattachVariant::Legacy),
    (10..=13, ReattachVariant::Mid),
    (
        14..=NEWEST_KNOWN_DARWIN,
        ReattachVariant::Modern(ModernLookup::Direct),
    ),
];

/// The result of classifying a release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    /// The parsed release.
    pub version: OsVersion,
    /// The chosen variant.
    pub variant: ReattachVariant,
    /// Everything that made the choice less certain.
    pub warnings: Vec<ClassifyWarning>,
}

/// Classifies a release string.
pub fn classify(release: &str) -> Classification {
    let version = OsVersion::parse(release);
    let mut warnings = Vec::new();

    let variant = match version.darwin_major() {
        None => {
            warnings.push(ClassifyWarning::Unparsable {
                release: release.to_string(),
            });
            ReattachVariant::Legacy
        }
        Some(major) if major < OLDEST_SUPPORTED_DARWIN => {
            warnings.push(ClassifyWarning::OldOs { assumed: "10.5" });
            ReattachVariant::Legacy
        }
        Some(major) if major > NEWEST_KNOWN_DARWIN => {
            warnings.push(ClassifyWarning::NewOs { assumed: "macOS 26" });
            ReattachVariant::Modern(ModernLookup::Direct)
        }
        Some(major) => BANDS
            .iter()
            .find(|(band, _)| band.contains(&major))
            .map(|(_, variant)| *variant)
            .unwrap_or(ReattachVariant::Modern(ModernLookup::Direct)),
    };

    Classification {
        version,
        variant,
        warnings,
    }
}

/// Classifies a release, also checking that it came from a Darwin host.
///
/// A foreign sysname only adds a warning; classification still runs.
pub fn classify_platform(sysname: &str, release: &str) -> Classification {
    let mut classification = classify(release);
    if sysname != EXPECTED_SYSNAME {
        classification.warnings.insert(
            0,
            ClassifyWarning::ForeignSysname {
                sysname: sysname.to_string(),
            },
        );
    }
    classification
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rank(variant: ReattachVariant) -> usize {
        BANDS
            .iter()
            .position(|(_, v)| *v == variant)
            .expect("every variant has a band")
    }

    #[test]
    fn kernel_release_is_read_by_major() {
        assert_eq!(
            OsVersion::parse("13.2.0"),
            OsVersion::Darwin {
                major: 13,
                minor: Some(2)
            }
        );
        assert_eq!(OsVersion::parse("garbage"), OsVersion::Unknown);
        assert_eq!(OsVersion::parse(""), OsVersion::Unknown);
        assert_eq!(OsVersion::parse(".5"), OsVersion::Unknown);
    }

    #[test]
    fn two_part_ten_dot_release_reads_as_marketing_version() {
        assert_eq!(OsVersion::parse("10.9").darwin_major(), Some(13));
        assert_eq!(OsVersion::parse("10.15").darwin_major(), Some(19));
        // Snow Leopard kernels stay Darwin 10.
        assert_eq!(OsVersion::parse("10.8.0").darwin_major(), Some(10));
        assert_eq!(OsVersion::parse("10.9.0").darwin_major(), Some(10));
    }

    #[test]
    fn ten_dot_release_too_large_to_convert_clamps_to_new_os() {
        assert_eq!(OsVersion::parse("10.4294967295").darwin_major(), Some(u32::MAX));

        let c = classify("10.4294967295");
        assert_eq!(c.variant, ReattachVariant::Modern(ModernLookup::Direct));
        assert_eq!(c.warnings, vec![ClassifyWarning::NewOs { assumed: "macOS 26" }]);
    }

    #[test]
    fn later_marketing_versions_read_as_kernel_releases() {
        // Big Sur and later collide with Darwin 11..=13 kernels.
        assert_eq!(OsVersion::parse("11.0").darwin_major(), Some(11));
        assert_eq!(classify("11.0").variant, ReattachVariant::Mid);
        assert_eq!(classify("13.2").variant, ReattachVariant::Mid);
        assert!(classify("11.0").warnings.is_empty());
    }

    #[test]
    fn marketing_names() {
        assert_eq!(OsVersion::parse("9.8.0").marketing_name().as_deref(), Some("10.5"));
        assert_eq!(OsVersion::parse("19.6.0").marketing_name().as_deref(), Some("10.15"));
        assert_eq!(OsVersion::parse("22.3.0").marketing_name().as_deref(), Some("13"));
        assert_eq!(OsVersion::Unknown.marketing_name(), None);
    }

    #[test]
    fn bands_pick_expected_variants() {
        assert_eq!(classify("9.8.0").variant, ReattachVariant::Legacy);
        assert_eq!(classify("10.8.0").variant, ReattachVariant::Mid);
        assert_eq!(classify("13.4.0").variant, ReattachVariant::Mid);
        assert_eq!(
            classify("14.0.0").variant,
            ReattachVariant::Modern(ModernLookup::Direct)
        );
        assert!(classify("14.0.0").warnings.is_empty());
        assert_eq!(
            classify("23.1.0").variant,
            ReattachVariant::Modern(ModernLookup::Direct)
        );
        assert!(classify("23.1.0").warnings.is_empty());
    }

    #[test]
    fn scenario_releases() {
        let mid = classify("10.9");
        assert_eq!(mid.variant.name(), "mid");
        assert!(mid.warnings.is_empty());

        let modern = classify("10.15");
        assert_eq!(modern.variant.name(), "modern");
        assert!(modern.warnings.is_empty());
    }

    #[test]
    fn unparsable_release_is_legacy_with_one_warning() {
        let c = classify("garbage");
        assert_eq!(c.variant, ReattachVariant::Legacy);
        assert_eq!(
            c.warnings,
            vec![ClassifyWarning::Unparsable {
                release: "garbage".into()
            }]
        );
    }

    #[test]
    fn old_release_clamps_to_legacy_with_one_warning() {
        for release in ["0", "5.0", "8.11.1"] {
            let c = classify(release);
            assert_eq!(c.variant, ReattachVariant::Legacy, "{release}");
            assert_eq!(c.warnings.len(), 1, "{release}");
            assert!(matches!(c.warnings[0], ClassifyWarning::OldOs { .. }));
        }
    }

    #[test]
    fn new_release_clamps_to_modern_with_one_warning() {
        for release in ["26.0.0", "99.1", "4000000000"] {
            let c = classify(release);
            assert_eq!(c.variant, ReattachVariant::Modern(ModernLookup::Direct));
            assert_eq!(c.warnings.len(), 1, "{release}");
            assert!(matches!(c.warnings[0], ClassifyWarning::NewOs { .. }));
        }
    }

    #[test]
    fn classification_is_monotonic() {
        let mut last = 0;
        for major in OLDEST_SUPPORTED_DARWIN..=NEWEST_KNOWN_DARWIN + 5 {
            let r = rank(classify(&format!("{major}.0.0")).variant);
            assert!(r >= last, "rank dropped at darwin {major}");
            last = r;
        }
    }

    #[test]
    fn representative_release_is_a_fixed_point() {
        for major in 0..=NEWEST_KNOWN_DARWIN + 5 {
            let variant = classify(&format!("{major}.1.0")).variant;
            let again = classify(variant.representative_release());
            assert_eq!(again.variant, variant);
            assert!(again.warnings.is_empty());
        }
    }

    #[test]
    fn manager_check_is_only_chosen_on_request() {
        for major in 0..=NEWEST_KNOWN_DARWIN + 5 {
            assert_ne!(
                classify(&format!("{major}.0.0")).variant,
                ReattachVariant::Modern(ModernLookup::ManagerCheck)
            );
        }

        let modern = classify("14.0.0").variant;
        assert_eq!(
            modern.with_modern_lookup(ModernLookup::ManagerCheck),
            ReattachVariant::Modern(ModernLookup::ManagerCheck)
        );
        assert_eq!(
            ReattachVariant::Mid.with_modern_lookup(ModernLookup::ManagerCheck),
            ReattachVariant::Mid
        );
    }

    #[test]
    fn foreign_sysname_warns_but_still_classifies() {
        let c = classify_platform("Linux", "6.1.0");
        assert_eq!(c.variant, ReattachVariant::Legacy);
        assert_eq!(
            c.warnings[0],
            ClassifyWarning::ForeignSysname {
                sysname: "Linux".into()
            }
        );
        assert_eq!(c.warnings.len(), 2);

        assert!(classify_platform("Darwin", "13.0.0").warnings.is_empty());
    }
}
