//! Manufacturer model-section scoring
//!
//! Which sections list printer models is a heuristic: vendors name them after
//! themselves, after a `Models` convention, or only via a `.NT<arch>`
//! decoration. Each rule that fires contributes a [`MatchReason`]; a section
//! with at least one reason is treated as a model section. The rules over- and
//! under-match in known ways, see the tests below.

use super::parser::{ParsedDescriptor, Section};
use crate::defaults::UNKNOWN_MANUFACTURER;
use crate::utils::strip_quotes;
use std::collections::HashSet;

/// Characters of the manufacturer name used for prefix matching
const MANUFACTURER_PREFIX_LEN: usize = 5;

/// Sections that never hold model lines
const NON_MODEL_SECTIONS: &[&str] = &[
    "version",
    "strings",
    "manufacturer",
    "destinationdirs",
    "controlflags",
    "classinstall32",
    "printerdriverattributes",
];

const NON_MODEL_PREFIXES: &[&str] = &["sourcedisksnames", "sourcedisksfiles", "defaultinstall", "strings."];

/// Install directives that can share a section with model-like lines
const INSTALL_DIRECTIVES: &[&str] = &[
    "copyfiles",
    "delfiles",
    "renfiles",
    "addreg",
    "delreg",
    "addservice",
    "delservice",
    "addproperty",
    "addinterface",
    "include",
    "needs",
    "datafile",
    "driverfile",
    "configfile",
    "helpfile",
    "datasection",
    "languagemonitor",
    "printprocessor",
    "vendorsetup",
    "vendorinstaller",
    "copyinf",
    "featurescore",
    "driverver",
    "driverisolation",
    "driverpackagetype",
    "characteristics",
    "bustype",
];

const ARCHITECTURES: &[&str] = &["x86", "amd64", "arm64", "ia64", "arm"];

/// Why a section was taken for a model section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchReason {
    /// Name contains the first characters of the manufacturer
    ManufacturerPrefix,
    /// Name contains `models`
    ModelsKeyword,
    /// Name carries a `.NT<arch>[.major[.minor]]` decoration
    ArchitectureSuffix,
    /// Name is referenced from a `[Manufacturer]` entry
    ManufacturerReference,
}

/// A section with the rules that matched it
#[derive(Debug, Clone)]
pub struct ScoredSection<'a> {
    pub section: &'a Section,
    pub reasons: Vec<MatchReason>,
}

impl ScoredSection<'_> {
    pub fn score(&self) -> usize {
        self.reasons.len()
    }
}

/// Parsed `.NT<arch>.<major>.<minor>` decoration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NtDecoration {
    pub architecture: Option<String>,
    pub os_version: Option<(u32, u32)>,
}

/// Find a platform decoration in a section name such as `HP.NTamd64.6.1`
pub fn parse_nt_decoration(name: &str) -> Option<NtDecoration> {
    let lower = name.to_ascii_lowercase();
    lower.match_indices(".nt").find_map(|(pos, _)| {
        let mut parts = lower[pos + 3..].split('.');
        let arch = parts.next().unwrap_or_default();
        if !arch.is_empty() && !ARCHITECTURES.contains(&arch) {
            return None;
        }

        let major = parts.next().and_then(|p| p.parse::<u32>().ok());
        let minor = parts.next().and_then(|p| p.parse::<u32>().ok());
        Some(NtDecoration {
            architecture: (!arch.is_empty()).then(|| arch.to_string()),
            os_version: major.map(|m| (m, minor.unwrap_or(0))),
        })
    })
}

/// Section names referenced from `[Manufacturer]`, with decorations applied.
///
/// `%HP% = HP, NTamd64.6.1` references `HP` and `HP.NTamd64.6.1`.
pub fn manufacturer_references(descriptor: &ParsedDescriptor) -> HashSet<String> {
    let mut references = HashSet::new();
    for section in descriptor.sections_named("Manufacturer") {
        for entry in &section.entries {
            let fields = entry.fields();
            let Some(base) = fields.first().filter(|b| !b.is_empty()) else {
                continue;
            };
            references.insert(base.to_ascii_lowercase());
            for decoration in fields.iter().skip(1).filter(|d| !d.is_empty()) {
                references.insert(format!("{base}.{decoration}").to_ascii_lowercase());
            }
        }
    }
    references
}

/// Rules that match a section name
pub fn score_section_name(
    name: &str,
    manufacturer: &str,
    references: &HashSet<String>,
) -> Vec<MatchReason> {
    let lower = name.to_ascii_lowercase();
    if is_excluded(&lower) {
        return Vec::new();
    }

    let mut reasons = Vec::new();
    let prefix: String = strip_quotes(manufacturer)
        .chars()
        .take(MANUFACTURER_PREFIX_LEN)
        .collect::<String>()
        .to_ascii_lowercase();
    if !prefix.trim().is_empty()
        && !manufacturer.eq_ignore_ascii_case(UNKNOWN_MANUFACTURER)
        && lower.contains(&prefix)
    {
        reasons.push(MatchReason::ManufacturerPrefix);
    }
    if lower.contains("models") {
        reasons.push(MatchReason::ModelsKeyword);
    }
    if parse_nt_decoration(&lower).is_some() {
        reasons.push(MatchReason::ArchitectureSuffix);
    }
    if references.contains(&lower) {
        reasons.push(MatchReason::ManufacturerReference);
    }
    reasons
}

fn is_excluded(lower: &str) -> bool {
    NON_MODEL_SECTIONS.contains(&lower) || NON_MODEL_PREFIXES.iter().any(|p| lower.starts_with(p))
}

/// Score every section; sections with no matching rule are omitted
pub fn score_sections<'a>(descriptor: &'a ParsedDescriptor, manufacturer: &str) -> Vec<ScoredSection<'a>> {
    let references = manufacturer_references(descriptor);
    descriptor
        .sections
        .iter()
        .filter_map(|section| {
            let reasons = score_section_name(&section.name, manufacturer, &references);
            (!reasons.is_empty()).then_some(ScoredSection { section, reasons })
        })
        .collect()
}

/// Sections believed to list models, in document order
pub fn find_manufacturer_model_sections<'a>(
    descriptor: &'a ParsedDescriptor,
    manufacturer: &str,
) -> Vec<&'a Section> {
    score_sections(descriptor, manufacturer)
        .into_iter()
        .map(|scored| scored.section)
        .collect()
}

/// True for keys that are install directives rather than model names
pub fn is_install_directive(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    INSTALL_DIRECTIVES.contains(&lower.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inf::parser::parse;
    use crate::inf::strings::resolve;

    const TEXT: &str = r#"[Version]
Class=Printer
[Manufacturer]
%HP% = HPInc, NTamd64.6.1, NTx86
[HPInc]
"HP Laser" = Install, USBPRINT\HPLaser
[HPInc.NTamd64.6.1]
"HP Laser" = Install, USBPRINT\HPLaser
[Install.NTamd64]
CopyFiles=Core
[Core]
unidrv.dll
[Contoso_Models]
"Contoso 1" = Install, WSDPRINT\Contoso1
[SourceDisksFiles.amd64]
unidrv.dll=1
[Strings]
HP = "Hewlett-Packard"
"#;

    fn descriptor() -> ParsedDescriptor {
        let mut d = parse(TEXT, "hp.inf").descriptor;
        resolve(&mut d);
        d
    }

    fn reasons_for(d: &ParsedDescriptor, manufacturer: &str, name: &str) -> Vec<MatchReason> {
        score_sections(d, manufacturer)
            .into_iter()
            .find(|s| s.section.name == name)
            .map(|s| s.reasons)
            .unwrap_or_default()
    }

    #[test]
    fn test_decoration_parsing() {
        assert_eq!(
            parse_nt_decoration("HP.NTamd64.6.1"),
            Some(NtDecoration {
                architecture: Some("amd64".into()),
                os_version: Some((6, 1)),
            })
        );
        assert_eq!(
            parse_nt_decoration("Install.NT"),
            Some(NtDecoration {
                architecture: None,
                os_version: None,
            })
        );
        assert_eq!(parse_nt_decoration("HP.NT.10.0").unwrap().os_version, Some((10, 0)));
        assert_eq!(parse_nt_decoration("Printer.Ntfs"), None);
        assert_eq!(parse_nt_decoration("HPInc"), None);
    }

    #[test]
    fn test_manufacturer_references() {
        let refs = manufacturer_references(&descriptor());
        assert!(refs.contains("hpinc"));
        assert!(refs.contains("hpinc.ntamd64.6.1"));
        assert!(refs.contains("hpinc.ntx86"));
    }

    #[test]
    fn test_scoring_rules() {
        let d = descriptor();
        assert_eq!(
            reasons_for(&d, "Hewlett-Packard", "HPInc.NTamd64.6.1"),
            vec![MatchReason::ArchitectureSuffix, MatchReason::ManufacturerReference]
        );
        assert_eq!(
            reasons_for(&d, "HPInc", "HPInc"),
            vec![MatchReason::ManufacturerPrefix, MatchReason::ManufacturerReference]
        );
        assert_eq!(reasons_for(&d, "HP", "Contoso_Models"), vec![MatchReason::ModelsKeyword]);
        assert!(reasons_for(&d, "HP", "SourceDisksFiles.amd64").is_empty());
        assert!(reasons_for(&d, "HP", "Strings").is_empty());
    }

    #[test]
    fn test_install_sections_over_match() {
        // Decorated install sections score too; their directives are filtered
        // at the line level instead.
        let d = descriptor();
        assert_eq!(
            reasons_for(&d, "HP", "Install.NTamd64"),
            vec![MatchReason::ArchitectureSuffix]
        );
        assert!(is_install_directive("CopyFiles"));
        assert!(!is_install_directive("HP Laser"));
    }

    #[test]
    fn test_unknown_manufacturer_has_no_prefix_rule() {
        let d = descriptor();
        let names: Vec<&str> = find_manufacturer_model_sections(&d, "Unknown")
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["HPInc", "HPInc.NTamd64.6.1", "Install.NTamd64", "Contoso_Models"]
        );
    }
}
