use std::collections::HashMap;

use sheetmerge_model::{
    parse_argb_hex_color, Alignment, Border, BorderEdge, BorderStyle, Color, DifferentialFormat,
    Fill, FillPattern, Font, GradientFill, GradientStop, HorizontalAlignment, OrderedFloat,
    Protection, Style, StyleTable, Underline, VerticalAlignment, VerticalTextAlignment,
};
use thiserror::Error;

use super::number_formats::builtin_format_code;
use crate::xml::{XmlDomError, XmlElement};

#[derive(Debug, Error)]
pub enum StylesPartError {
    #[error("styles.xml: {0}")]
    Xml(#[from] XmlDomError),
    #[error("styles.xml: unexpected root element <{0}>")]
    UnexpectedRoot(String),
}

/// A decoded `styles.xml`: every cell `xf` interned into a fresh [`StyleTable`].
#[derive(Clone, Debug)]
pub struct StylesPart {
    pub table: StyleTable,
    xf_style_ids: Vec<u32>,
    dxfs: Vec<DifferentialFormat>,
}

impl Default for StylesPart {
    fn default() -> Self {
        Self {
            table: StyleTable::new(),
            xf_style_ids: vec![0],
            dxfs: Vec::new(),
        }
    }
}

impl StylesPart {
    pub fn parse(bytes: &[u8]) -> Result<Self, StylesPartError> {
        let root = XmlElement::parse(bytes)?;
        if root.local_name() != "styleSheet" {
            return Err(StylesPartError::UnexpectedRoot(root.name));
        }

        let num_fmts = parse_num_fmts(&root);
        let fonts = parse_fonts(&root);
        let fills = parse_fills(&root);
        let borders = parse_borders(&root);

        let base_font = fonts.first().cloned().unwrap_or_else(Font::calibri_11);
        let mut table = StyleTable::with_base_font(base_font);

        let mut xf_style_ids = Vec::new();
        if let Some(cell_xfs) = root.child("cellXfs") {
            for xf in cell_xfs.children_by_local("xf") {
                let style = parse_xf(xf, &fonts, &fills, &borders, &num_fmts);
                xf_style_ids.push(table.intern(style));
            }
        }
        if xf_style_ids.is_empty() {
            xf_style_ids.push(0);
        }

        let dxfs = root
            .child("dxfs")
            .map(|dxfs| {
                dxfs.children_by_local("dxf")
                    .map(|dxf| DifferentialFormat {
                        xml: dxf.to_xml_string(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            table,
            xf_style_ids,
            dxfs,
        })
    }

    /// Model style id for a cell's `s` attribute. Out-of-range indices fall back
    /// to the default style, as spreadsheet applications do.
    pub fn style_id_for_xf(&self, xf_index: u32) -> u32 {
        self.xf_style_ids
            .get(xf_index as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn cell_xfs_count(&self) -> usize {
        self.xf_style_ids.len()
    }

    pub fn dxf(&self, index: usize) -> Option<&DifferentialFormat> {
        self.dxfs.get(index)
    }
}

fn parse_num_fmts(root: &XmlElement) -> HashMap<u16, String> {
    let mut out = HashMap::new();
    let Some(num_fmts) = root.child("numFmts") else {
        return out;
    };
    for num_fmt in num_fmts.children_by_local("numFmt") {
        let id = num_fmt.attr_parse::<u16>("numFmtId");
        let code = num_fmt.attr("formatCode").map(str::to_string);
        if let (Some(id), Some(code)) = (id, code) {
            out.insert(id, code);
        }
    }
    out
}

fn parse_fonts(root: &XmlElement) -> Vec<Font> {
    root.child("fonts")
        .map(|fonts| fonts.children_by_local("font").map(parse_font).collect())
        .unwrap_or_default()
}

fn parse_font(el: &XmlElement) -> Font {
    let val = |local: &str| el.child(local).and_then(|c| c.attr("val"));
    let flag = |local: &str| {
        el.child(local)
            .is_some_and(|c| c.attr("val").map_or(true, |v| v != "0" && v != "false"))
    };

    let underline = el.child("u").and_then(|u| match u.attr("val") {
        None => Some(Underline::Single),
        Some(v) => Underline::from_ooxml(v),
    });

    Font {
        name: val("name").or_else(|| val("rFont")).map(str::to_string),
        size: val("sz")
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(OrderedFloat),
        bold: flag("b"),
        italic: flag("i"),
        underline,
        strike: flag("strike"),
        color: el.child("color").and_then(parse_color),
        vert_align: val("vertAlign").and_then(VerticalTextAlignment::from_ooxml),
        family: val("family").and_then(|v| v.parse().ok()),
        charset: val("charset").and_then(|v| v.parse().ok()),
        scheme: val("scheme").map(str::to_string),
    }
}

fn parse_fills(root: &XmlElement) -> Vec<Fill> {
    root.child("fills")
        .map(|fills| fills.children_by_local("fill").map(parse_fill).collect())
        .unwrap_or_default()
}

fn parse_fill(el: &XmlElement) -> Fill {
    if let Some(gradient) = el.child("gradientFill") {
        return Fill {
            gradient: Some(parse_gradient(gradient)),
            ..Fill::default()
        };
    }
    let Some(pattern_fill) = el.child("patternFill") else {
        return Fill::default();
    };
    Fill {
        pattern: FillPattern::from_ooxml(pattern_fill.attr("patternType").unwrap_or("none")),
        fg_color: pattern_fill.child("fgColor").and_then(parse_color),
        bg_color: pattern_fill.child("bgColor").and_then(parse_color),
        gradient: None,
    }
}

fn parse_gradient(el: &XmlElement) -> GradientFill {
    let num = |name: &str| el.attr_parse::<f64>(name).map(OrderedFloat);
    GradientFill {
        kind: el.attr("type").map(str::to_string),
        degree: num("degree"),
        left: num("left"),
        right: num("right"),
        top: num("top"),
        bottom: num("bottom"),
        stops: el
            .children_by_local("stop")
            .filter_map(|stop| {
                let position = stop.attr_parse::<f64>("position")?;
                let color = stop.child("color").and_then(parse_color)?;
                Some(GradientStop {
                    position: OrderedFloat(position),
                    color,
                })
            })
            .collect(),
    }
}

fn parse_borders(root: &XmlElement) -> Vec<Border> {
    root.child("borders")
        .map(|borders| borders.children_by_local("border").map(parse_border).collect())
        .unwrap_or_default()
}

fn parse_border(el: &XmlElement) -> Border {
    // `start`/`end` are the bidi-aware spellings of left/right.
    let edge = |a: &str, b: &str| parse_border_edge(el.child(a).or_else(|| el.child(b)));
    Border {
        left: edge("left", "start"),
        right: edge("right", "end"),
        top: edge("top", "top"),
        bottom: edge("bottom", "bottom"),
        diagonal: edge("diagonal", "diagonal"),
        diagonal_up: el.attr_bool("diagonalUp").unwrap_or(false),
        diagonal_down: el.attr_bool("diagonalDown").unwrap_or(false),
    }
}

fn parse_border_edge(edge: Option<&XmlElement>) -> BorderEdge {
    let Some(edge) = edge else {
        return BorderEdge::default();
    };
    let style = edge
        .attr("style")
        .and_then(BorderStyle::from_ooxml)
        .unwrap_or_default();
    if style == BorderStyle::None {
        // A color on an invisible edge carries no meaning.
        return BorderEdge::default();
    }
    BorderEdge {
        style,
        color: edge.child("color").and_then(parse_color),
    }
}

fn parse_xf(
    xf: &XmlElement,
    fonts: &[Font],
    fills: &[Fill],
    borders: &[Border],
    num_fmts: &HashMap<u16, String>,
) -> Style {
    let font_id = xf.attr_parse::<usize>("fontId").unwrap_or(0);
    let fill_id = xf.attr_parse::<usize>("fillId").unwrap_or(0);
    let border_id = xf.attr_parse::<usize>("borderId").unwrap_or(0);

    let font = if font_id == 0 {
        None
    } else {
        fonts.get(font_id).cloned()
    };
    let fill = fills
        .get(fill_id)
        .cloned()
        .filter(|f| !(f.pattern == FillPattern::None && f.gradient.is_none()));
    let border = borders
        .get(border_id)
        .cloned()
        .filter(|b| b != &Border::default());

    let num_fmt_id = xf.attr_parse::<u16>("numFmtId").unwrap_or(0);
    let number_format = match num_fmt_id {
        0 => None,
        id => num_fmts
            .get(&id)
            .cloned()
            .or_else(|| builtin_format_code(id).map(str::to_string)),
    }
    .filter(|code| code != "General");

    Style {
        font,
        fill,
        border,
        alignment: xf.child("alignment").and_then(parse_alignment),
        protection: xf.child("protection").and_then(parse_protection),
        number_format,
    }
}

fn parse_alignment(el: &XmlElement) -> Option<Alignment> {
    let alignment = Alignment {
        horizontal: el.attr("horizontal").and_then(HorizontalAlignment::from_ooxml),
        vertical: el.attr("vertical").and_then(VerticalAlignment::from_ooxml),
        wrap_text: el.attr_bool("wrapText").unwrap_or(false),
        shrink_to_fit: el.attr_bool("shrinkToFit").unwrap_or(false),
        rotation: el.attr_parse::<u16>("textRotation").filter(|r| *r != 0),
        indent: el.attr_parse::<u16>("indent").filter(|i| *i != 0),
        reading_order: el.attr_parse::<u8>("readingOrder").filter(|o| *o != 0),
    };
    (alignment != Alignment::default()).then_some(alignment)
}

fn parse_protection(el: &XmlElement) -> Option<Protection> {
    let protection = Protection {
        locked: el.attr_bool("locked").unwrap_or(true),
        hidden: el.attr_bool("hidden").unwrap_or(false),
    };
    (protection != Protection::default()).then_some(protection)
}

pub(crate) fn parse_color(el: &XmlElement) -> Option<Color> {
    if el.attr_bool("auto") == Some(true) {
        return Some(Color::Auto);
    }
    if let Some(rgb) = el.attr("rgb") {
        return parse_argb_hex_color(rgb).map(Color::argb);
    }
    if let Some(theme) = el.attr_parse::<u16>("theme") {
        let tint = el
            .attr_parse::<f64>("tint")
            .filter(|t| *t != 0.0)
            .map(|t| OrderedFloat(t.clamp(-1.0, 1.0)));
        return Some(Color::Theme { theme, tint });
    }
    el.attr_parse::<u16>("indexed")
        .map(|index| Color::Indexed { index })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <numFmts count="1"><numFmt numFmtId="164" formatCode="yyyy-mm-dd"/></numFmts>
  <fonts count="2">
    <font><sz val="11"/><color theme="1"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font>
    <font><b/><sz val="11"/><color rgb="FFFF0000"/><name val="Calibri"/><family val="2"/><scheme val="minor"/></font>
  </fonts>
  <fills count="3">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
    <fill><patternFill patternType="solid"><fgColor theme="4" tint="0.39997558519241921"/><bgColor indexed="64"/></patternFill></fill>
  </fills>
  <borders count="2">
    <border><left/><right/><top/><bottom/><diagonal/></border>
    <border><left style="thin"><color auto="1"/></left><right/><top/><bottom style="double"/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs>
  <cellXfs count="5">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0" applyNumberFormat="1"/>
    <xf numFmtId="10" fontId="0" fillId="0" borderId="0" xfId="0"><alignment horizontal="center" wrapText="1"/><protection locked="0"/></xf>
    <xf numFmtId="164" fontId="1" fillId="2" borderId="1" xfId="0"/>
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"><alignment/></xf>
  </cellXfs>
  <dxfs count="1"><dxf><font><b/></font></dxf></dxfs>
</styleSheet>"#;

    #[test]
    fn interns_every_xf_by_value() {
        let part = StylesPart::parse(STYLES.as_bytes()).unwrap();
        assert_eq!(part.cell_xfs_count(), 5);
        // Duplicate xfs and xfs equivalent to the default collapse.
        assert_eq!(part.style_id_for_xf(3), part.style_id_for_xf(1));
        assert_eq!(part.style_id_for_xf(4), 0);
        assert_eq!(part.style_id_for_xf(99), 0);
        assert_eq!(part.table.len(), 3);

        let styled = part.table.get(part.style_id_for_xf(1)).unwrap();
        assert_eq!(styled.number_format.as_deref(), Some("yyyy-mm-dd"));
        let font = styled.font.as_ref().unwrap();
        assert!(font.bold);
        assert_eq!(font.color, Some(Color::argb(0xFFFF0000)));
        let fill = styled.fill.as_ref().unwrap();
        assert_eq!(fill.pattern, FillPattern::Solid);
        assert!(matches!(fill.fg_color, Some(Color::Theme { theme: 4, tint: Some(_) })));
        let border = styled.border.as_ref().unwrap();
        assert_eq!(border.left.style, BorderStyle::Thin);
        assert_eq!(border.left.color, Some(Color::Auto));
        assert_eq!(border.bottom.style, BorderStyle::Double);

        let centered = part.table.get(part.style_id_for_xf(2)).unwrap();
        assert_eq!(centered.number_format.as_deref(), Some("0.00%"));
        assert_eq!(
            centered.alignment.as_ref().unwrap().horizontal,
            Some(HorizontalAlignment::Center)
        );
        assert!(!centered.protection.as_ref().unwrap().locked);

        assert_eq!(part.table.base_font, Font::calibri_11());
        assert_eq!(part.dxf(0).unwrap().xml, "<dxf><font><b/></font></dxf>");
    }

    #[test]
    fn rejects_foreign_root() {
        assert!(matches!(
            StylesPart::parse(b"<worksheet/>"),
            Err(StylesPartError::UnexpectedRoot(_))
        ));
    }
}
