//! Run formatting (`w:rPr`) as a typed value.
use crate::common::error::{Error, Result};
use crate::common::xml::XmlElement;
use serde::{Deserialize, Serialize};

/// Underline styles for text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UnderlineStyle {
    Single,
    Double,
    Thick,
    Dotted,
    Dash,
    DotDash,
    DotDotDash,
    Wave,
    None,
}

impl UnderlineStyle {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
            Self::Thick => "thick",
            Self::Dotted => "dotted",
            Self::Dash => "dash",
            Self::DotDash => "dotDash",
            Self::DotDotDash => "dotDotDash",
            Self::Wave => "wave",
            Self::None => "none",
        }
    }

    fn from_xml(s: &str) -> Option<Self> {
        Some(match s {
            "single" => Self::Single,
            "double" => Self::Double,
            "thick" => Self::Thick,
            "dotted" => Self::Dotted,
            "dash" => Self::Dash,
            "dotDash" => Self::DotDash,
            "dotDotDash" => Self::DotDotDash,
            "wave" => Self::Wave,
            "none" => Self::None,
            _ => return None,
        })
    }
}

/// Vertical alignment of run text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VerticalAlign {
    Baseline,
    Superscript,
    Subscript,
}

impl VerticalAlign {
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Baseline => "baseline",
            Self::Superscript => "superscript",
            Self::Subscript => "subscript",
        }
    }

    fn from_xml(s: &str) -> Option<Self> {
        match s {
            "baseline" => Some(Self::Baseline),
            "superscript" => Some(Self::Superscript),
            "subscript" => Some(Self::Subscript),
            _ => None,
        }
    }
}

const HIGHLIGHT_COLORS: &[&str] = &[
    "black",
    "blue",
    "cyan",
    "green",
    "magenta",
    "red",
    "yellow",
    "white",
    "darkBlue",
    "darkCyan",
    "darkGreen",
    "darkMagenta",
    "darkRed",
    "darkYellow",
    "darkGray",
    "lightGray",
    "none",
];

/// Direct formatting of a run.
///
/// Unset fields are omitted from the generated `w:rPr`, so a default value
/// produces an empty (inheriting) run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunFormat {
    /// Character style id (`w:rStyle`)
    pub style: Option<String>,
    /// Font applied to all scripts (`w:rFonts`)
    pub font_name: Option<String>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub strike: Option<bool>,
    /// Hex RGB without `#`, e.g. `FF0000`
    pub color: Option<String>,
    /// Size in points
    pub font_size: Option<f32>,
    /// Highlight color name, e.g. `yellow`
    pub highlight: Option<String>,
    pub underline: Option<UnderlineStyle>,
    pub vert_align: Option<VerticalAlign>,
}

impl RunFormat {
    /// Check values before they reach the document.
    pub fn validate(&self) -> Result<()> {
        if let Some(color) = &self.color
            && !(color.len() == 6 && color.bytes().all(|b| b.is_ascii_hexdigit()))
        {
            return Err(Error::InvalidArgument(format!(
                "color must be 6 hex digits without '#', got '{color}'"
            )));
        }
        if let Some(highlight) = &self.highlight
            && !HIGHLIGHT_COLORS.contains(&highlight.as_str())
        {
            return Err(Error::InvalidArgument(format!(
                "unknown highlight color '{highlight}'"
            )));
        }
        if let Some(size) = self.font_size
            && !(size > 0.0 && size <= 1638.0)
        {
            return Err(Error::InvalidArgument(format!(
                "font size {size} is out of range"
            )));
        }
        Ok(())
    }

    /// Whether no property is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Build a `w:rPr` element with children in schema order.
    pub fn to_rpr(&self) -> XmlElement {
        let mut rpr = XmlElement::new("w:rPr");
        if let Some(style) = &self.style {
            rpr.push(val("w:rStyle", style));
        }
        if let Some(font) = &self.font_name {
            rpr.push(
                XmlElement::new("w:rFonts")
                    .with_attr("w:ascii", font.as_str())
                    .with_attr("w:hAnsi", font.as_str())
                    .with_attr("w:eastAsia", font.as_str())
                    .with_attr("w:cs", font.as_str()),
            );
        }
        if let Some(b) = self.bold {
            rpr.push(toggle("w:b", b));
        }
        if let Some(i) = self.italic {
            rpr.push(toggle("w:i", i));
        }
        if let Some(s) = self.strike {
            rpr.push(toggle("w:strike", s));
        }
        if let Some(color) = &self.color {
            rpr.push(val("w:color", &color.to_ascii_uppercase()));
        }
        if let Some(size) = self.font_size {
            let half_points = (size * 2.0).round() as u32;
            let mut buf = itoa::Buffer::new();
            rpr.push(val("w:sz", buf.format(half_points)));
        }
        if let Some(highlight) = &self.highlight {
            rpr.push(val("w:highlight", highlight));
        }
        if let Some(u) = self.underline {
            rpr.push(val("w:u", u.as_str()));
        }
        if let Some(v) = self.vert_align {
            rpr.push(val("w:vertAlign", v.as_str()));
        }
        rpr
    }

    /// Read the properties this type knows about from a `w:rPr`.
    pub fn from_rpr(rpr: &XmlElement) -> Self {
        let mut format = Self::default();
        for el in rpr.elements() {
            let v = el.attr("w:val");
            match el.name.as_str() {
                "w:rStyle" => format.style = v.map(str::to_string),
                "w:rFonts" => {
                    format.font_name = el.attr("w:ascii").or(el.attr("w:hAnsi")).map(str::to_string)
                },
                "w:b" => format.bold = Some(toggle_value(v)),
                "w:i" => format.italic = Some(toggle_value(v)),
                "w:strike" => format.strike = Some(toggle_value(v)),
                "w:color" => format.color = v.map(str::to_string),
                "w:sz" => {
                    format.font_size = v
                        .and_then(|s| atoi_simd::parse::<u32>(s.as_bytes()).ok())
                        .map(|hp| hp as f32 / 2.0)
                },
                "w:highlight" => format.highlight = v.map(str::to_string),
                "w:u" => format.underline = v.and_then(UnderlineStyle::from_xml),
                "w:vertAlign" => format.vert_align = v.and_then(VerticalAlign::from_xml),
                _ => {},
            }
        }
        format
    }
}

fn val(name: &str, value: &str) -> XmlElement {
    XmlElement::new(name).with_attr("w:val", value)
}

fn toggle(name: &str, on: bool) -> XmlElement {
    if on {
        XmlElement::new(name)
    } else {
        val(name, "0")
    }
}

fn toggle_value(v: Option<&str>) -> bool {
    !matches!(v, Some("0" | "false" | "off"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_schema_order() {
        let format = RunFormat {
            bold: Some(true),
            style: Some("Emphasis".into()),
            vert_align: Some(VerticalAlign::Superscript),
            color: Some("ff0000".into()),
            ..Default::default()
        };
        let names: Vec<_> = format.to_rpr().elements().map(|e| e.name.clone()).collect();
        assert_eq!(names, ["w:rStyle", "w:b", "w:color", "w:vertAlign"]);
    }

    #[test]
    fn test_validation() {
        let bad = RunFormat {
            color: Some("#FF0000".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let bad = RunFormat {
            highlight: Some("chartreuse".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        assert!(RunFormat::default().validate().is_ok());
    }

    #[test]
    fn test_toggle_off() {
        let rpr = XmlElement::new("w:rPr").with_child(val("w:b", "0"));
        assert_eq!(RunFormat::from_rpr(&rpr).bold, Some(false));
    }

    proptest! {
        #[test]
        fn prop_rpr_reads_back(
            bold in proptest::option::of(any::<bool>()),
            italic in proptest::option::of(any::<bool>()),
            half_points in proptest::option::of(2u32..400),
            color in proptest::option::of("[0-9A-F]{6}"),
        ) {
            let format = RunFormat {
                bold,
                italic,
                font_size: half_points.map(|hp| hp as f32 / 2.0),
                color,
                ..Default::default()
            };
            prop_assert_eq!(RunFormat::from_rpr(&format.to_rpr()), format);
        }
    }
}
