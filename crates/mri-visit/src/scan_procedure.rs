//! Scan procedure inference from visit directory paths.
//!
//! Archive layout encodes the study a visit belongs to; the rules below
//! map known path fragments to canonical study codenames. Inference can
//! never fail, unrecognized paths get the sentinel codename and are
//! sorted out by hand later.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Codename assigned when no rule matches the visit path.
pub const UNKNOWN_SCAN_PROCEDURE: &str = "unknown.scan_procedure";

/// Ordered rule table; the first matching pattern wins, so the specific
/// visit-number rules of each study family must precede its catch-all.
static RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"alz_2000.*_2$", "johnson.alz.visit2"),
        (r"alz_2000.*_3$", "johnson.alz.visit3"),
        (r"alz_2000.alz...$", "johnson.alz.visit1"),
        (r"alz_2000", "johnson.alz.unk.visit"),
        (r"tbi_1000.*_2$", "johnson.tbi-1000.visit2"),
        (r"tbi_1000.*_3$", "johnson.tbi-1000.visit3"),
        (r"tbi_1000.tbi...$", "johnson.tbi-1000.visit1"),
        (r"tbi_1000", "johnson.tbi-1000.unk.visit"),
        (r"tbi_aware.*_2$", "johnson.tbi-aware.visit2"),
        (r"tbi_aware.*_3$", "johnson.tbi-aware.visit3"),
        (r"tbi_aware.tbi...$", "johnson.tbi-aware.visit1"),
        (r"tbi_aware", "johnson.tbi-aware.unk.visit"),
        (r"johnson\.tbi-va\.visit1", "johnson.tbi-va.visit1"),
        (r"pib_pilot_mri", "johnson.pibmripilot.visit1.uwmr"),
        (r"wrap140", "johnson.wrap140.visit1"),
        (r"cms.uwmr", "johnson.cms.visit1.uwmr"),
        (r"cms.wais", "johnson.cms.visit1.wais"),
        (r"esprit.9month", "carlsson.esprit.visit2.9month"),
        (r"esprit.baseline", "carlsson.esprit.visit1.baseline"),
        (r"gallagher_pd", "gallagher.pd.visit1"),
        (r"pc_4000", "johnson.pc4000.visit1"),
        (r"ries\.aware\.visit1", "ries.aware.visit1"),
        (r"carlson\.sharp\.visit1", "carlson.sharp.visit1"),
    ]
    .into_iter()
    .map(|(pattern, codename)| {
        (
            Regex::new(pattern).expect("valid scan procedure pattern"),
            codename,
        )
    })
    .collect()
});

/// Infers the study codename a visit path belongs to.
pub fn infer(visit_directory: &Path) -> &'static str {
    let path = visit_directory.to_string_lossy();
    RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(&path))
        .map(|(_, codename)| *codename)
        .unwrap_or(UNKNOWN_SCAN_PROCEDURE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_fragments_map_to_codenames() {
        let cases = [
            ("/archive/alz_2000/alz001_2", "johnson.alz.visit2"),
            ("/archive/alz_2000/alz042", "johnson.alz.visit1"),
            ("/archive/alz_2000/misc", "johnson.alz.unk.visit"),
            ("/archive/tbi_1000/tbi015", "johnson.tbi-1000.visit1"),
            ("/archive/tbi_aware/tbi200_3", "johnson.tbi-aware.visit3"),
            ("/archive/wrap140/wrp004", "johnson.wrap140.visit1"),
            ("/archive/cms/uwmr/cms021", "johnson.cms.visit1.uwmr"),
            ("/archive/esprit/baseline/esp07", "carlsson.esprit.visit1.baseline"),
            ("/archive/gallagher_pd/pd017", "gallagher.pd.visit1"),
            ("/archive/pc_4000/pc0119", "johnson.pc4000.visit1"),
            ("/archive/carlson.sharp.visit1/shp003", "carlson.sharp.visit1"),
        ];
        for (path, expected) in cases {
            assert_eq!(infer(Path::new(path)), expected, "for {path}");
        }
    }

    #[test]
    fn specific_visit_rules_win_over_family_catch_all() {
        assert_eq!(
            infer(Path::new("/archive/tbi_1000/tbi015_2")),
            "johnson.tbi-1000.visit2"
        );
    }

    #[test]
    fn unrelated_paths_get_the_sentinel() {
        assert_eq!(
            infer(Path::new("/tmp/some/visit")),
            UNKNOWN_SCAN_PROCEDURE
        );
    }
}
