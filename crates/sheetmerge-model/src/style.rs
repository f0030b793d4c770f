use std::collections::HashMap;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Deserializer, Serialize};

/// A SpreadsheetML color reference.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Color {
    /// Literal `AARRGGBB` color.
    Argb { argb: u32 },
    /// Theme palette slot with an optional tint in `-1.0..=1.0`.
    Theme {
        theme: u16,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tint: Option<OrderedFloat<f64>>,
    },
    /// Legacy indexed palette entry.
    Indexed { index: u16 },
    /// System "automatic" color.
    Auto,
}

impl Color {
    pub const fn argb(argb: u32) -> Self {
        Color::Argb { argb }
    }
}

/// Parse an `RRGGBB` / `AARRGGBB` hex string (optionally `#`-prefixed).
pub fn parse_argb_hex_color(value: &str) -> Option<u32> {
    let hex = value.trim();
    let hex = hex.strip_prefix('#').unwrap_or(hex);
    match hex.len() {
        8 => u32::from_str_radix(hex, 16).ok(),
        6 => u32::from_str_radix(hex, 16)
            .ok()
            .map(|rgb| 0xFF00_0000 | rgb),
        _ => None,
    }
}

ooxml_enum! {
    /// Font underline style.
    pub enum Underline {
        Single => "single",
        Double => "double",
        SingleAccounting => "singleAccounting",
        DoubleAccounting => "doubleAccounting",
    }
}

ooxml_enum! {
    /// Superscript / subscript positioning.
    pub enum VerticalTextAlignment {
        Baseline => "baseline",
        Superscript => "superscript",
        Subscript => "subscript",
    }
}

ooxml_enum! {
    /// Border line style.
    pub enum BorderStyle {
        None => "none",
        Thin => "thin",
        Medium => "medium",
        Dashed => "dashed",
        Dotted => "dotted",
        Thick => "thick",
        Double => "double",
        Hair => "hair",
        MediumDashed => "mediumDashed",
        DashDot => "dashDot",
        MediumDashDot => "mediumDashDot",
        DashDotDot => "dashDotDot",
        MediumDashDotDot => "mediumDashDotDot",
        SlantDashDot => "slantDashDot",
    }
}

impl Default for BorderStyle {
    fn default() -> Self {
        BorderStyle::None
    }
}

ooxml_enum! {
    pub enum HorizontalAlignment {
        General => "general",
        Left => "left",
        Center => "center",
        Right => "right",
        Fill => "fill",
        Justify => "justify",
        CenterContinuous => "centerContinuous",
        Distributed => "distributed",
    }
}

ooxml_enum! {
    pub enum VerticalAlignment {
        Top => "top",
        Center => "center",
        Bottom => "bottom",
        Justify => "justify",
        Distributed => "distributed",
    }
}

/// Font formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Font {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Size in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<Underline>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub strike: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vert_align: Option<VerticalTextAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub charset: Option<u8>,
    /// Theme font scheme (`minor` / `major`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
}

impl Font {
    /// Excel's default body font for new workbooks.
    pub fn calibri_11() -> Self {
        Font {
            name: Some("Calibri".to_string()),
            size: Some(OrderedFloat(11.0)),
            color: Some(Color::Theme {
                theme: 1,
                tint: None,
            }),
            family: Some(2),
            scheme: Some("minor".to_string()),
            ..Font::default()
        }
    }
}

/// Pattern fill type.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FillPattern {
    #[default]
    None,
    Gray125,
    Solid,
    /// Any other `patternType` (e.g. `darkGrid`, `lightTrellis`), kept verbatim.
    Other(String),
}

impl FillPattern {
    pub fn from_ooxml(value: &str) -> Self {
        match value {
            "none" => FillPattern::None,
            "gray125" => FillPattern::Gray125,
            "solid" => FillPattern::Solid,
            other => FillPattern::Other(other.to_string()),
        }
    }

    pub fn as_ooxml(&self) -> &str {
        match self {
            FillPattern::None => "none",
            FillPattern::Gray125 => "gray125",
            FillPattern::Solid => "solid",
            FillPattern::Other(value) => value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GradientStop {
    pub position: OrderedFloat<f64>,
    pub color: Color,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct GradientFill {
    /// `linear` (default) or `path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<OrderedFloat<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bottom: Option<OrderedFloat<f64>>,
    #[serde(default)]
    pub stops: Vec<GradientStop>,
}

/// Fill (background) formatting.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Fill {
    #[serde(default)]
    pub pattern: FillPattern,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fg_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bg_color: Option<Color>,
    /// When set, the fill is a gradient and the pattern fields are ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gradient: Option<GradientFill>,
}

impl Fill {
    pub fn solid(color: Color) -> Self {
        Fill {
            pattern: FillPattern::Solid,
            fg_color: Some(color),
            ..Fill::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct BorderEdge {
    #[serde(default)]
    pub style: BorderStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Border {
    #[serde(default)]
    pub left: BorderEdge,
    #[serde(default)]
    pub right: BorderEdge,
    #[serde(default)]
    pub top: BorderEdge,
    #[serde(default)]
    pub bottom: BorderEdge,
    #[serde(default)]
    pub diagonal: BorderEdge,
    #[serde(default, skip_serializing_if = "is_false")]
    pub diagonal_up: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub diagonal_down: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Alignment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal: Option<HorizontalAlignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vertical: Option<VerticalAlignment>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub wrap_text: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub shrink_to_fit: bool,
    /// Excel text rotation in degrees (`0..=180`, or `255` for stacked text).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indent: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reading_order: Option<u8>,
}

/// Cell protection flags. Only enforced when the sheet itself is protected.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Protection {
    #[serde(default = "default_true")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

impl Default for Protection {
    fn default() -> Self {
        Self {
            locked: true,
            hidden: false,
        }
    }
}

/// Complete cell style.
///
/// `font: None` means "the workbook's base font" (see [`StyleTable::base_font`]).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<Fill>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border: Option<Border>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alignment: Option<Alignment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protection: Option<Protection>,
    /// Number format code (e.g. `0.00%`). `None` is the `General` format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub number_format: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_true() -> bool {
    true
}

/// Deduplicated table of styles.
///
/// Cells store a `style_id` referencing this table. Style `0` is always the
/// default (empty) style.
#[derive(Clone, Debug, Serialize)]
pub struct StyleTable {
    pub styles: Vec<Style>,
    /// The workbook's default font (font `0` in `styles.xml`).
    pub base_font: Font,
    #[serde(skip)]
    index: HashMap<Style, u32>,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for StyleTable {
    fn eq(&self, other: &Self) -> bool {
        self.styles == other.styles && self.base_font == other.base_font
    }
}

impl StyleTable {
    pub fn new() -> Self {
        Self::with_base_font(Font::calibri_11())
    }

    pub fn with_base_font(base_font: Font) -> Self {
        let mut table = Self {
            styles: vec![Style::default()],
            base_font,
            index: HashMap::new(),
        };
        table.rebuild_index();
        table
    }

    /// Insert (or reuse) a style, returning its ID.
    ///
    /// An explicit font equal to the base font is folded into `None` so both
    /// spellings intern to the same entry.
    pub fn intern(&mut self, mut style: Style) -> u32 {
        if style.font.as_ref() == Some(&self.base_font) {
            style.font = None;
        }
        if let Some(id) = self.index.get(&style) {
            return *id;
        }
        let id = self.styles.len() as u32;
        self.styles.push(style.clone());
        self.index.insert(style, id);
        id
    }

    pub fn get(&self, style_id: u32) -> Option<&Style> {
        self.styles.get(style_id as usize)
    }

    pub fn len(&self) -> usize {
        self.styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.styles.len() <= 1
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, style) in self.styles.iter().cloned().enumerate() {
            self.index.entry(style).or_insert(i as u32);
        }
    }
}

impl<'de> Deserialize<'de> for StyleTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Helper {
            #[serde(default)]
            styles: Vec<Style>,
            #[serde(default = "Font::calibri_11")]
            base_font: Font,
        }

        let mut helper = Helper::deserialize(deserializer)?;
        if helper.styles.is_empty() {
            helper.styles.push(Style::default());
        }

        let mut table = StyleTable {
            styles: helper.styles,
            base_font: helper.base_font,
            index: HashMap::new(),
        };
        table.rebuild_index();
        Ok(table)
    }
}
