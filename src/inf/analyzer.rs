//! Driver metadata extraction
//!
//! Every rule is a standalone function over a resolved descriptor and never
//! fails; missing information falls back to the defaults in
//! [`crate::defaults`], so [`extract`] always yields a complete record.

use super::parser::{Entry, ParsedDescriptor};
use super::scoring::{self, find_manufacturer_model_sections};
use crate::defaults::{
    DEFAULT_DRIVER_VERSION, DEFAULT_SUPPORTED_OS, UNKNOWN_DRIVER, UNKNOWN_HARDWARE_ID,
    UNKNOWN_MANUFACTURER, UNKNOWN_MODEL,
};
use crate::utils::strip_quotes;
use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

/// Modules whose presence marks a driver as able to run isolated
const ISOLATION_AWARE_MODULES: &[&str] = &["unidrv.dll", "pscript5.dll", "mxdwdrv.dll", "xpssvcs.dll"];

/// NT version → marketing name
const OS_NAMES: &[((u32, u32), &str)] = &[
    ((5, 1), "Windows XP"),
    ((6, 0), "Windows Vista"),
    ((6, 1), "Windows 7"),
    ((6, 2), "Windows 8"),
    ((6, 3), "Windows 8.1"),
    ((10, 0), "Windows 10"),
];

/// Printer driver model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverClass {
    #[default]
    V3,
    V4,
    Universal,
}

impl fmt::Display for DriverClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverClass::V3 => write!(f, "v3"),
            DriverClass::V4 => write!(f, "v4"),
            DriverClass::Universal => write!(f, "universal"),
        }
    }
}

/// Print spooler isolation level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Isolation {
    High,
    Medium,
    None,
    #[default]
    Unknown,
}

/// Everything extracted from one descriptor
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DriverMetadata {
    pub display_name: String,
    pub version: String,
    pub vendor: String,
    pub architecture: BTreeSet<String>,
    /// Document order, deduplicated
    pub hardware_ids: Vec<String>,
    /// Document order, deduplicated
    pub models: Vec<String>,
    pub driver_class: DriverClass,
    pub isolation: Isolation,
    pub driver_date: Option<NaiveDate>,
    pub supported_os: Vec<String>,
}

/// Run every rule against a resolved descriptor
pub fn extract(descriptor: &ParsedDescriptor) -> DriverMetadata {
    let vendor = extract_manufacturer(descriptor);
    let (models, hardware_ids) = extract_models_and_hardware_ids(descriptor, &vendor);
    let driver_class = extract_driver_class(descriptor);

    let metadata = DriverMetadata {
        display_name: extract_display_name(descriptor, &models),
        version: extract_version(descriptor),
        architecture: extract_architecture(descriptor),
        isolation: extract_isolation(descriptor, driver_class),
        driver_date: extract_driver_date(descriptor),
        supported_os: extract_supported_os(descriptor),
        vendor,
        hardware_ids,
        models,
        driver_class,
    };

    debug!(
        "🔍 {}: '{}' {} by {} ({}, {} models)",
        descriptor.file_name,
        metadata.display_name,
        metadata.version,
        metadata.vendor,
        metadata.driver_class,
        metadata.models.len()
    );
    metadata
}

fn driver_ver_fields(descriptor: &ParsedDescriptor) -> Option<Vec<&str>> {
    descriptor
        .value("Version", "DriverVer")
        .map(|v| v.split(',').map(strip_quotes).collect())
}

/// `DriverVer = date,version` → version
pub fn extract_version(descriptor: &ParsedDescriptor) -> String {
    driver_ver_fields(descriptor)
        .and_then(|fields| fields.get(1).map(|v| v.to_string()))
        .filter(|v| !v.is_empty() && !v.contains('%'))
        .unwrap_or_else(|| DEFAULT_DRIVER_VERSION.to_string())
}

/// `DriverVer = MM/DD/YYYY,...` → date
pub fn extract_driver_date(descriptor: &ParsedDescriptor) -> Option<NaiveDate> {
    let fields = driver_ver_fields(descriptor)?;
    NaiveDate::parse_from_str(fields.first()?, "%m/%d/%Y").ok()
}

/// `[Version].Provider`, else the first `[Manufacturer]` entry, else unknown
pub fn extract_manufacturer(descriptor: &ParsedDescriptor) -> String {
    if let Some(provider) = descriptor
        .value("Version", "Provider")
        .map(strip_quotes)
        .filter(|p| !p.is_empty())
    {
        return provider.to_string();
    }

    descriptor
        .section("Manufacturer")
        .and_then(|s| s.entries.first())
        .map(|e| strip_quotes(e.key_or_value()).to_string())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| UNKNOWN_MANUFACTURER.to_string())
}

/// Platform tags from section-name substrings; `{x64}` when nothing matches
pub fn extract_architecture(descriptor: &ParsedDescriptor) -> BTreeSet<String> {
    let mut arch = BTreeSet::new();
    for section in &descriptor.sections {
        let name = section.name.to_ascii_lowercase();
        let mut matched = false;
        if name.contains("amd64") {
            arch.insert("amd64".to_string());
            matched = true;
        }
        if name.contains("x86") {
            arch.insert("x86".to_string());
            matched = true;
        }
        if name.contains("arm64") {
            arch.insert("arm64".to_string());
            matched = true;
        }
        if !matched && name.contains(".nt") {
            arch.insert("x64".to_string());
        }
    }
    if arch.is_empty() {
        arch.insert("x64".to_string());
    }
    arch
}

/// Model name and hardware id of one model line, if it is one
fn model_line(entry: &Entry) -> Option<(Option<String>, Option<String>)> {
    if !entry.key.is_empty() && scoring::is_install_directive(&entry.key) {
        return None;
    }
    let fields = entry.fields();
    if entry.key.is_empty() && fields.len() < 2 {
        // Keyless single-field lines are file lists
        return None;
    }

    let named_key = entry.key_is_quoted() || entry.raw_key.contains('%');
    let model = if named_key {
        Some(entry.key.as_str())
    } else {
        fields.first().copied()
    };
    let hardware_id = fields.get(1).copied();

    let clean = |s: Option<&str>| {
        s.map(str::trim)
            .filter(|s| !s.is_empty() && !s.contains('%'))
            .map(str::to_string)
    };
    Some((clean(model), clean(hardware_id)))
}

/// Models and hardware ids from the manufacturer model sections
pub fn extract_models_and_hardware_ids(
    descriptor: &ParsedDescriptor,
    manufacturer: &str,
) -> (Vec<String>, Vec<String>) {
    let mut models = Vec::new();
    let mut hardware_ids = Vec::new();

    for section in find_manufacturer_model_sections(descriptor, manufacturer) {
        for entry in &section.entries {
            let Some((model, hardware_id)) = model_line(entry) else {
                continue;
            };
            if let Some(model) = model.filter(|m| !models.contains(m)) {
                models.push(model);
            }
            if let Some(id) = hardware_id.filter(|h| !hardware_ids.contains(h)) {
                hardware_ids.push(id);
            }
        }
    }

    if models.is_empty() {
        models.push(UNKNOWN_MODEL.to_string());
    }
    if hardware_ids.is_empty() {
        hardware_ids.push(UNKNOWN_HARDWARE_ID.to_string());
    }
    (models, hardware_ids)
}

/// v3 unless a printer descriptor says otherwise
pub fn extract_driver_class(descriptor: &ParsedDescriptor) -> DriverClass {
    let is_printer = descriptor
        .value("Version", "Class")
        .map(strip_quotes)
        .is_some_and(|c| c.eq_ignore_ascii_case("Printer"));
    if !is_printer {
        return DriverClass::V3;
    }

    let package_type = descriptor
        .value("Version", "DriverPackageType")
        .or_else(|| {
            descriptor
                .sections
                .iter()
                .find_map(|s| s.value("DriverPackageType"))
        })
        .map(|v| strip_quotes(v).to_ascii_lowercase());
    match package_type.as_deref() {
        Some(t) if t.contains("plugandplay") => return DriverClass::V4,
        Some(t) if t.contains("universal") => return DriverClass::Universal,
        _ => {}
    }

    if descriptor
        .sections
        .iter()
        .any(|s| s.name.to_ascii_lowercase().contains("driverattributes"))
    {
        return DriverClass::V4;
    }
    DriverClass::V3
}

/// Isolation level from the class, `DriverIsolation`, or module names
pub fn extract_isolation(descriptor: &ParsedDescriptor, class: DriverClass) -> Isolation {
    if matches!(class, DriverClass::V4 | DriverClass::Universal) {
        return Isolation::High;
    }

    let declared = descriptor
        .sections
        .iter()
        .find_map(|s| s.value("DriverIsolation"))
        .map(strip_quotes);
    match declared {
        Some("2") => return Isolation::High,
        Some("1") => return Isolation::Medium,
        Some("0") => return Isolation::None,
        _ => {}
    }

    let raw = descriptor.raw_text.to_ascii_lowercase();
    if ISOLATION_AWARE_MODULES.iter().any(|m| raw.contains(m)) {
        return Isolation::Medium;
    }
    Isolation::Unknown
}

/// Marketing names for the NT versions in section decorations
pub fn extract_supported_os(descriptor: &ParsedDescriptor) -> Vec<String> {
    let versions: BTreeSet<(u32, u32)> = descriptor
        .sections
        .iter()
        .filter_map(|s| scoring::parse_nt_decoration(&s.name))
        .filter_map(|d| d.os_version)
        .collect();

    let names: Vec<String> = OS_NAMES
        .iter()
        .filter(|(v, _)| versions.contains(v))
        .map(|(_, name)| name.to_string())
        .collect();
    if names.is_empty() {
        vec![DEFAULT_SUPPORTED_OS.to_string()]
    } else {
        names
    }
}

/// First real model, else the descriptor file stem, else unknown
pub fn extract_display_name(descriptor: &ParsedDescriptor, models: &[String]) -> String {
    if let Some(model) = models.first().filter(|m| m.as_str() != UNKNOWN_MODEL) {
        return model.clone();
    }
    Path::new(&descriptor.file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN_DRIVER.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inf::parser::parse;
    use crate::inf::strings::resolve;

    const HP: &str = r#"[Version]
Signature="$Windows NT$"
Class=Printer
Provider=%HP%
DriverVer=06/21/2006,10.0.19041.1

[Manufacturer]
%HP%=HP,NTamd64.6.1,NTx86.6.0

[HP.NTamd64.6.1]
%Model1% = Install, USBPRINT\HPLaserJet_Pro, WSDPRINT\HPLJ
"HP Color Laser" = Install, USBPRINT\HPColor

[HP.NTx86.6.0]
%Model1% = Install, USBPRINT\HPLaserJet_Pro

[Install]
CopyFiles=Core
DataFile=HPLJ.GPD
DriverIsolation=2

[Core]
unidrv.dll

[Strings]
HP = "HP"
Model1 = "HP LaserJet Pro"
"#;

    fn descriptor(text: &str, file_name: &str) -> ParsedDescriptor {
        let mut d = parse(text, file_name).descriptor;
        resolve(&mut d);
        d
    }

    #[test]
    fn test_extract_full_descriptor() {
        let m = extract(&descriptor(HP, "hpcu.inf"));
        assert_eq!(m.display_name, "HP LaserJet Pro");
        assert_eq!(m.version, "10.0.19041.1");
        assert_eq!(m.vendor, "HP");
        assert_eq!(m.models, vec!["HP LaserJet Pro", "HP Color Laser"]);
        assert_eq!(m.hardware_ids, vec!["USBPRINT\\HPLaserJet_Pro", "USBPRINT\\HPColor"]);
        assert_eq!(m.driver_class, DriverClass::V3);
        assert_eq!(m.isolation, Isolation::High);
        assert_eq!(m.driver_date, NaiveDate::from_ymd_opt(2006, 6, 21));
        assert_eq!(m.supported_os, vec!["Windows Vista", "Windows 7"]);
        assert!(m.architecture.contains("amd64"));
        assert!(m.architecture.contains("x86"));
    }

    #[test]
    fn test_architecture_rules() {
        let d = descriptor("[HP.NTamd64.6.1]\n[Install.NT]\n", "a.inf");
        let arch = extract_architecture(&d);
        let names: Vec<&str> = arch.iter().map(String::as_str).collect();
        assert_eq!(names, vec!["amd64", "x64"]);

        let d = descriptor("[Version]\n", "b.inf");
        assert_eq!(extract_architecture(&d).into_iter().collect::<Vec<_>>(), vec!["x64"]);

        let d = descriptor("[Models.NTarm64]\n", "c.inf");
        assert!(extract_architecture(&d).contains("arm64"));
    }

    #[test]
    fn test_defaults_never_empty() {
        let m = extract(&descriptor("[Version]\nClass=Image\n", "scanner.inf"));
        assert_eq!(m.version, DEFAULT_DRIVER_VERSION);
        assert_eq!(m.vendor, UNKNOWN_MANUFACTURER);
        assert_eq!(m.models, vec![UNKNOWN_MODEL]);
        assert_eq!(m.hardware_ids, vec![UNKNOWN_HARDWARE_ID]);
        assert_eq!(m.display_name, "scanner");
        assert_eq!(m.supported_os, vec![DEFAULT_SUPPORTED_OS]);
        assert_eq!(m.driver_date, None);

        let empty = descriptor("", "");
        assert_eq!(extract(&empty).display_name, UNKNOWN_DRIVER);
    }

    #[test]
    fn test_version_unparsable_falls_back() {
        let d = descriptor("[Version]\nDriverVer=06/21/2006\n", "v.inf");
        assert_eq!(extract_version(&d), DEFAULT_DRIVER_VERSION);
        assert_eq!(extract_driver_date(&d), NaiveDate::from_ymd_opt(2006, 6, 21));
    }

    #[test]
    fn test_manufacturer_from_manufacturer_section() {
        let d = descriptor("[Manufacturer]\n\"Contoso\"=Contoso,NTamd64\n", "m.inf");
        assert_eq!(extract_manufacturer(&d), "Contoso");
    }

    #[test]
    fn test_driver_class_rules() {
        let v4 = descriptor("[Version]\nClass=Printer\nDriverPackageType=PlugAndPlay\n", "a.inf");
        assert_eq!(extract_driver_class(&v4), DriverClass::V4);

        let universal = descriptor("[Version]\nClass=Printer\nDriverPackageType=Universal\n", "a.inf");
        assert_eq!(extract_driver_class(&universal), DriverClass::Universal);

        let attrs = descriptor("[Version]\nClass=Printer\n[PrinterDriverAttributes]\nx=1\n", "a.inf");
        assert_eq!(extract_driver_class(&attrs), DriverClass::V4);

        let non_printer = descriptor("[Version]\nClass=Image\nDriverPackageType=PlugAndPlay\n", "a.inf");
        assert_eq!(extract_driver_class(&non_printer), DriverClass::V3);
    }

    #[test]
    fn test_isolation_rules() {
        let d = descriptor("[Install]\nDriverIsolation=0\n", "a.inf");
        assert_eq!(extract_isolation(&d, DriverClass::V3), Isolation::None);
        assert_eq!(extract_isolation(&d, DriverClass::V4), Isolation::High);

        let d = descriptor("[Core]\nUNIDRV.DLL\n", "a.inf");
        assert_eq!(extract_isolation(&d, DriverClass::V3), Isolation::Medium);

        let d = descriptor("[Core]\nvendor.dll\n", "a.inf");
        assert_eq!(extract_isolation(&d, DriverClass::V3), Isolation::Unknown);
    }

    #[test]
    fn test_serialized_enums() {
        assert_eq!(serde_json::to_string(&DriverClass::Universal).unwrap(), "\"universal\"");
        assert_eq!(serde_json::to_string(&Isolation::Medium).unwrap(), "\"Medium\"");
    }
}
