/// Editing restrictions stored in the settings part.
///
/// A restriction is a `w:documentProtection` element with `w:enforcement="1"`.
/// It does not encrypt anything; it tells the editor which kinds of change
/// are allowed, optionally behind a password hash.
use super::Package;
use crate::common::error::{Error, Result};
use crate::common::xml::XmlElement;
use crate::ooxml::crypto::{fill_random, password_to_utf16le};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_ENGINE;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use tracing::{debug, info};

const PROTECTION: &str = "w:documentProtection";
const ALGORITHM_NAME: &str = "SHA-512";

/// Largest `w:spinCount` accepted, from a file or from the caller.
pub const MAX_SPIN_COUNT: u32 = 10_000_000;

/// `w:settings` children that come before `w:documentProtection`.
const PRECEDING: &[&str] = &[
    "w:writeProtection",
    "w:view",
    "w:zoom",
    "w:removePersonalInformation",
    "w:removeDateAndTime",
    "w:doNotDisplayPageBoundaries",
    "w:displayBackgroundShape",
    "w:printPostScriptOverText",
    "w:printFractionalCharacterWidth",
    "w:printFormsData",
    "w:embedTrueTypeFonts",
    "w:embedSystemFonts",
    "w:saveSubsetFonts",
    "w:saveFormsData",
    "w:mirrorMargins",
    "w:alignBordersAndEdges",
    "w:bordersDoNotSurroundHeader",
    "w:bordersDoNotSurroundFooter",
    "w:gutterAtTop",
    "w:hideSpellingErrors",
    "w:hideGrammaticalErrors",
    "w:activeWritingStyle",
    "w:proofState",
    "w:formsDesign",
    "w:attachedTemplate",
    "w:linkStyles",
    "w:stylePaneFormatFilter",
    "w:stylePaneSortMethod",
    "w:documentType",
    "w:mailMerge",
    "w:revisionView",
    "w:trackRevisions",
    "w:doNotTrackMoves",
    "w:doNotTrackFormatting",
];

/// Type of document protection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProtectionType {
    /// No editing allowed
    ReadOnly,
    /// Only comments allowed
    Comments,
    /// Only tracked changes allowed
    TrackedChanges,
    /// Only form fields allowed
    Forms,
}

impl ProtectionType {
    /// Parse protection type from XML value.
    pub fn from_xml(s: &str) -> Option<Self> {
        match s {
            "readOnly" => Some(Self::ReadOnly),
            "comments" => Some(Self::Comments),
            "trackedChanges" => Some(Self::TrackedChanges),
            "forms" => Some(Self::Forms),
            _ => None,
        }
    }

    pub const fn as_xml(self) -> &'static str {
        match self {
            Self::ReadOnly => "readOnly",
            Self::Comments => "comments",
            Self::TrackedChanges => "trackedChanges",
            Self::Forms => "forms",
        }
    }
}

/// Current editing restriction of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditingRestriction {
    pub kind: ProtectionType,
    pub enforced: bool,
    pub has_password: bool,
}

/// SHA-512 password hash: `H(salt || password)`, then `H(hash || i)` for each spin.
///
/// The password is hashed as UTF-16LE, the iteration counter as a little-endian u32.
pub fn hash_password(password: &str, salt: &[u8], spin_count: u32) -> Vec<u8> {
    let mut hasher = Sha512::new();
    hasher.update(salt);
    hasher.update(password_to_utf16le(password));
    let mut hash = hasher.finalize().to_vec();

    for i in 0..spin_count {
        let mut hasher = Sha512::new();
        hasher.update(&hash);
        hasher.update(i.to_le_bytes());
        hash = hasher.finalize().to_vec();
    }
    hash
}

fn read_restriction(el: &XmlElement) -> Option<EditingRestriction> {
    let kind = ProtectionType::from_xml(el.attr("w:edit")?)?;
    let enforced = matches!(el.attr("w:enforcement"), Some("1" | "true" | "on"));
    Some(EditingRestriction {
        kind,
        enforced,
        has_password: el.attr("w:hashValue").is_some(),
    })
}

/// Read the document's editing restriction, if any.
pub fn editing_restriction(package: &Package) -> Result<Option<EditingRestriction>> {
    let Some(name) = package.settings_part()? else {
        return Ok(None);
    };
    let settings = &package.opc().xml(&name)?.root;
    Ok(settings.child(PROTECTION).and_then(read_restriction))
}

fn protection_element(kind: ProtectionType, password: Option<&str>, spin_count: u32) -> Result<XmlElement> {
    let mut el = XmlElement::new(PROTECTION)
        .with_attr("w:edit", kind.as_xml())
        .with_attr("w:enforcement", "1");
    if let Some(password) = password {
        let mut salt = [0u8; 16];
        fill_random(&mut salt, "restriction salt")?;
        let hash = hash_password(password, &salt, spin_count);
        let mut buf = itoa::Buffer::new();
        el = el
            .with_attr("w:algorithmName", ALGORITHM_NAME)
            .with_attr("w:hashValue", BASE64_ENGINE.encode(&hash))
            .with_attr("w:saltValue", BASE64_ENGINE.encode(salt))
            .with_attr("w:spinCount", buf.format(spin_count));
    }
    Ok(el)
}

/// Write or replace the editing restriction.
pub fn set_editing_restriction(
    package: &mut Package,
    kind: ProtectionType,
    password: Option<&str>,
    spin_count: u32,
) -> Result<()> {
    if password.is_some_and(str::is_empty) {
        return Err(Error::InvalidArgument("restriction password is empty".to_string()));
    }
    if spin_count > MAX_SPIN_COUNT {
        return Err(Error::InvalidArgument(format!(
            "spin count {spin_count} exceeds {MAX_SPIN_COUNT}"
        )));
    }
    let el = protection_element(kind, password, spin_count)?;

    let name = package.ensure_settings_part()?;
    let settings = &mut package.opc_mut().xml_mut(&name)?.root;
    let replaced = settings.remove_elements(|el| el.is(PROTECTION)) > 0;
    let at = settings
        .children
        .iter()
        .rposition(|node| {
            node.as_element()
                .is_some_and(|el| PRECEDING.contains(&el.name.as_str()))
        })
        .map_or(0, |i| i + 1);
    settings.insert(at, el);

    debug!(replaced, position = at, "wrote documentProtection");
    info!(kind = kind.as_xml(), password = password.is_some(), "set editing restriction");
    Ok(())
}

fn verify(el: &XmlElement, password: Option<&str>) -> Result<()> {
    let Some(stored) = el.attr("w:hashValue") else {
        return Ok(());
    };
    let password = password.ok_or(Error::BadPassword)?;
    let corrupt = |what: &str| Error::CorruptPackage(format!("documentProtection has a malformed {what}"));
    let stored = BASE64_ENGINE.decode(stored).map_err(|_| corrupt("hash"))?;
    let salt = el
        .attr("w:saltValue")
        .map(|s| BASE64_ENGINE.decode(s))
        .transpose()
        .map_err(|_| corrupt("salt"))?
        .unwrap_or_default();
    let spin_count = match el.attr("w:spinCount") {
        Some(v) => atoi_simd::parse::<u32>(v.trim().as_bytes()).map_err(|_| corrupt("spin count"))?,
        None => 0,
    };
    if spin_count > MAX_SPIN_COUNT {
        return Err(Error::CorruptPackage(format!(
            "documentProtection spin count {spin_count} exceeds {MAX_SPIN_COUNT}"
        )));
    }
    if el
        .attr("w:algorithmName")
        .is_some_and(|a| !a.eq_ignore_ascii_case(ALGORITHM_NAME))
    {
        return Err(Error::InvalidArgument(format!(
            "unsupported restriction hash algorithm {}",
            el.attr("w:algorithmName").unwrap_or_default()
        )));
    }
    if hash_password(password, &salt, spin_count) != stored {
        return Err(Error::BadPassword);
    }
    Ok(())
}

/// Remove the editing restriction after checking its password.
pub fn clear_editing_restriction(package: &mut Package, password: Option<&str>) -> Result<()> {
    let not_protected = || Error::NotProtected("document has no editing restriction".to_string());
    let name = package.settings_part()?.ok_or_else(not_protected)?;
    {
        let settings = &package.opc().xml(&name)?.root;
        let el = settings
            .child(PROTECTION)
            .filter(|el| read_restriction(el).is_some_and(|r| r.enforced))
            .ok_or_else(not_protected)?;
        verify(el, password)?;
    }
    let settings = &mut package.opc_mut().xml_mut(&name)?.root;
    settings.remove_elements(|el| el.is(PROTECTION));
    info!("cleared editing restriction");
    Ok(())
}
