use std::collections::HashMap;
use std::hash::Hash;

use sheetmerge_model::{
    Alignment, Border, BorderEdge, Color, DifferentialFormat, Fill, FillPattern, Font,
    Protection, Style, StyleTable,
};

use super::number_formats::{builtin_format_id, FIRST_CUSTOM_NUM_FMT_ID};
use crate::xml::{XmlElement, XML_DECLARATION};

const NS_MAIN: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Insertion-ordered set that hands out dense indices.
#[derive(Clone, Debug)]
struct Interner<T: Eq + Hash + Clone> {
    items: Vec<T>,
    index: HashMap<T, u32>,
}

impl<T: Eq + Hash + Clone> Default for Interner<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<T: Eq + Hash + Clone> Interner<T> {
    fn intern(&mut self, item: &T) -> u32 {
        if let Some(idx) = self.index.get(item) {
            return *idx;
        }
        let idx = self.items.len() as u32;
        self.items.push(item.clone());
        self.index.insert(item.clone(), idx);
        idx
    }
}

/// Differential formats collected from conditional-formatting rules across all
/// sheets, deduplicated by payload.
#[derive(Clone, Debug, Default)]
pub struct DxfTable {
    inner: Interner<DifferentialFormat>,
}

impl DxfTable {
    pub fn intern(&mut self, dxf: &DifferentialFormat) -> u32 {
        self.inner.intern(dxf)
    }

    pub fn len(&self) -> usize {
        self.inner.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.is_empty()
    }
}

/// Render `styles.xml` for `table`. Cell `xf` index `i` is model style id `i`.
///
/// Font 0 is the table's base font; fills 0 and 1 are the two reserved pattern fills.
pub fn write_styles_xml(table: &StyleTable, dxfs: &DxfTable) -> String {
    let mut fonts: Interner<Font> = Interner::default();
    let mut fills: Interner<Fill> = Interner::default();
    let mut borders: Interner<Border> = Interner::default();
    let mut num_fmts: Vec<(u16, String)> = Vec::new();
    let mut num_fmt_ids: HashMap<String, u16> = HashMap::new();

    fonts.intern(&table.base_font);
    fills.intern(&Fill::default());
    fills.intern(&Fill {
        pattern: FillPattern::Gray125,
        ..Fill::default()
    });
    borders.intern(&Border::default());

    let mut xfs = Vec::with_capacity(table.len());
    for style in &table.styles {
        let font_id = style.font.as_ref().map_or(0, |f| fonts.intern(f));
        let fill_id = style.fill.as_ref().map_or(0, |f| fills.intern(f));
        let border_id = style.border.as_ref().map_or(0, |b| borders.intern(b));
        let num_fmt_id = match style.number_format.as_deref() {
            None => 0,
            Some(code) => builtin_format_id(code).unwrap_or_else(|| {
                *num_fmt_ids.entry(code.to_string()).or_insert_with(|| {
                    let id = FIRST_CUSTOM_NUM_FMT_ID + num_fmts.len() as u16;
                    num_fmts.push((id, code.to_string()));
                    id
                })
            }),
        };
        xfs.push(build_xf_element(num_fmt_id, font_id, fill_id, border_id, style));
    }

    let mut root = XmlElement::new("styleSheet").with_attr("xmlns", NS_MAIN);

    if !num_fmts.is_empty() {
        let mut el = XmlElement::new("numFmts").with_attr("count", num_fmts.len().to_string());
        for (id, code) in &num_fmts {
            el.push_child(
                XmlElement::new("numFmt")
                    .with_attr("numFmtId", id.to_string())
                    .with_attr("formatCode", code.clone()),
            );
        }
        root.push_child(el);
    }
    root.push_child(collection("fonts", fonts.items.iter().map(build_font_element)));
    root.push_child(collection("fills", fills.items.iter().map(build_fill_element)));
    root.push_child(collection("borders", borders.items.iter().map(build_border_element)));
    root.push_child(collection(
        "cellStyleXfs",
        std::iter::once(
            XmlElement::new("xf")
                .with_attr("numFmtId", "0")
                .with_attr("fontId", "0")
                .with_attr("fillId", "0")
                .with_attr("borderId", "0"),
        ),
    ));
    root.push_child(collection("cellXfs", xfs));
    root.push_child(collection(
        "cellStyles",
        std::iter::once(
            XmlElement::new("cellStyle")
                .with_attr("name", "Normal")
                .with_attr("xfId", "0")
                .with_attr("builtinId", "0"),
        ),
    ));

    // dxfs are stored pre-serialized; splice them in after the DOM is rendered.
    const DXFS_MARKER: &str = "<dxfs-placeholder/>";
    root.push_child(XmlElement::new("dxfs-placeholder"));
    root.push_child(
        XmlElement::new("tableStyles")
            .with_attr("count", "0")
            .with_attr("defaultTableStyle", "TableStyleMedium2")
            .with_attr("defaultPivotStyle", "PivotStyleLight16"),
    );

    let mut dxfs_xml = format!(r#"<dxfs count="{}">"#, dxfs.len());
    for dxf in &dxfs.inner.items {
        dxfs_xml.push_str(&dxf.xml);
    }
    dxfs_xml.push_str("</dxfs>");

    let body = root.to_xml_string().replacen(DXFS_MARKER, &dxfs_xml, 1);
    format!("{XML_DECLARATION}\n{body}")
}

fn collection(name: &str, items: impl IntoIterator<Item = XmlElement>) -> XmlElement {
    let mut el = XmlElement::new(name);
    let mut count = 0usize;
    for item in items {
        el.push_child(item);
        count += 1;
    }
    el.set_attr("count", count.to_string());
    el
}

fn build_xf_element(
    num_fmt_id: u16,
    font_id: u32,
    fill_id: u32,
    border_id: u32,
    style: &Style,
) -> XmlElement {
    let mut xf = XmlElement::new("xf")
        .with_attr("numFmtId", num_fmt_id.to_string())
        .with_attr("fontId", font_id.to_string())
        .with_attr("fillId", fill_id.to_string())
        .with_attr("borderId", border_id.to_string())
        .with_attr("xfId", "0");

    if num_fmt_id != 0 {
        xf.set_attr("applyNumberFormat", "1");
    }
    if font_id != 0 {
        xf.set_attr("applyFont", "1");
    }
    if fill_id != 0 {
        xf.set_attr("applyFill", "1");
    }
    if border_id != 0 {
        xf.set_attr("applyBorder", "1");
    }
    if let Some(alignment) = &style.alignment {
        xf.set_attr("applyAlignment", "1");
        xf.push_child(build_alignment_element(alignment));
    }
    if let Some(protection) = &style.protection {
        xf.set_attr("applyProtection", "1");
        xf.push_child(build_protection_element(protection));
    }
    xf
}

fn val_element(name: &str, val: impl Into<String>) -> XmlElement {
    XmlElement::new(name).with_attr("val", val)
}

fn build_font_element(font: &Font) -> XmlElement {
    let mut el = XmlElement::new("font");
    if font.bold {
        el.push_child(XmlElement::new("b"));
    }
    if font.italic {
        el.push_child(XmlElement::new("i"));
    }
    if font.strike {
        el.push_child(XmlElement::new("strike"));
    }
    if let Some(underline) = font.underline {
        let mut u = XmlElement::new("u");
        if underline != sheetmerge_model::Underline::Single {
            u.set_attr("val", underline.as_ooxml());
        }
        el.push_child(u);
    }
    if let Some(vert_align) = font.vert_align {
        el.push_child(val_element("vertAlign", vert_align.as_ooxml()));
    }
    if let Some(size) = font.size {
        el.push_child(val_element("sz", size.0.to_string()));
    }
    if let Some(color) = font.color {
        el.push_child(build_color_element("color", color));
    }
    if let Some(name) = &font.name {
        el.push_child(val_element("name", name.clone()));
    }
    if let Some(family) = font.family {
        el.push_child(val_element("family", family.to_string()));
    }
    if let Some(charset) = font.charset {
        el.push_child(val_element("charset", charset.to_string()));
    }
    if let Some(scheme) = &font.scheme {
        el.push_child(val_element("scheme", scheme.clone()));
    }
    el
}

fn build_fill_element(fill: &Fill) -> XmlElement {
    let mut el = XmlElement::new("fill");
    if let Some(gradient) = &fill.gradient {
        let mut g = XmlElement::new("gradientFill");
        if let Some(kind) = &gradient.kind {
            g.set_attr("type", kind.clone());
        }
        for (name, value) in [
            ("degree", gradient.degree),
            ("left", gradient.left),
            ("right", gradient.right),
            ("top", gradient.top),
            ("bottom", gradient.bottom),
        ] {
            if let Some(value) = value {
                g.set_attr(name, value.0.to_string());
            }
        }
        for stop in &gradient.stops {
            let mut s = XmlElement::new("stop").with_attr("position", stop.position.0.to_string());
            s.push_child(build_color_element("color", stop.color));
            g.push_child(s);
        }
        el.push_child(g);
        return el;
    }

    let mut pattern_fill =
        XmlElement::new("patternFill").with_attr("patternType", fill.pattern.as_ooxml());
    if let Some(color) = fill.fg_color {
        pattern_fill.push_child(build_color_element("fgColor", color));
    }
    if let Some(color) = fill.bg_color {
        pattern_fill.push_child(build_color_element("bgColor", color));
    }
    el.push_child(pattern_fill);
    el
}

fn build_border_element(border: &Border) -> XmlElement {
    let mut el = XmlElement::new("border");
    if border.diagonal_up {
        el.set_attr("diagonalUp", "1");
    }
    if border.diagonal_down {
        el.set_attr("diagonalDown", "1");
    }
    for (name, edge) in [
        ("left", &border.left),
        ("right", &border.right),
        ("top", &border.top),
        ("bottom", &border.bottom),
        ("diagonal", &border.diagonal),
    ] {
        el.push_child(build_border_edge_element(name, edge));
    }
    el
}

fn build_border_edge_element(name: &str, edge: &BorderEdge) -> XmlElement {
    let mut el = XmlElement::new(name);
    if edge.style != sheetmerge_model::BorderStyle::None {
        el.set_attr("style", edge.style.as_ooxml());
        if let Some(color) = edge.color {
            el.push_child(build_color_element("color", color));
        }
    }
    el
}

fn build_alignment_element(alignment: &Alignment) -> XmlElement {
    let mut el = XmlElement::new("alignment");
    if let Some(horizontal) = alignment.horizontal {
        el.set_attr("horizontal", horizontal.as_ooxml());
    }
    if let Some(vertical) = alignment.vertical {
        el.set_attr("vertical", vertical.as_ooxml());
    }
    if let Some(rotation) = alignment.rotation {
        el.set_attr("textRotation", rotation.to_string());
    }
    if alignment.wrap_text {
        el.set_attr("wrapText", "1");
    }
    if let Some(indent) = alignment.indent {
        el.set_attr("indent", indent.to_string());
    }
    if alignment.shrink_to_fit {
        el.set_attr("shrinkToFit", "1");
    }
    if let Some(order) = alignment.reading_order {
        el.set_attr("readingOrder", order.to_string());
    }
    el
}

fn build_protection_element(protection: &Protection) -> XmlElement {
    let mut el = XmlElement::new("protection");
    if !protection.locked {
        el.set_attr("locked", "0");
    }
    if protection.hidden {
        el.set_attr("hidden", "1");
    }
    el
}

pub(crate) fn build_color_element(name: &str, color: Color) -> XmlElement {
    let el = XmlElement::new(name);
    match color {
        Color::Argb { argb } => el.with_attr("rgb", format!("{argb:08X}")),
        Color::Theme { theme, tint } => {
            let el = el.with_attr("theme", theme.to_string());
            match tint {
                Some(tint) => el.with_attr("tint", tint.0.to_string()),
                None => el,
            }
        }
        Color::Indexed { index } => el.with_attr("indexed", index.to_string()),
        Color::Auto => el.with_attr("auto", "1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::styles::StylesPart;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::{BorderStyle, HorizontalAlignment, OrderedFloat};

    fn sample_table() -> StyleTable {
        let mut table = StyleTable::new();
        table.intern(Style {
            font: Some(Font {
                bold: true,
                ..Font::calibri_11()
            }),
            fill: Some(Fill::solid(Color::Theme {
                theme: 4,
                tint: Some(OrderedFloat(0.4)),
            })),
            number_format: Some("yyyy-mm-dd".to_string()),
            ..Style::default()
        });
        table.intern(Style {
            border: Some(Border {
                bottom: BorderEdge {
                    style: BorderStyle::Thin,
                    color: Some(Color::Auto),
                },
                ..Border::default()
            }),
            alignment: Some(Alignment {
                horizontal: Some(HorizontalAlignment::Center),
                ..Alignment::default()
            }),
            protection: Some(Protection {
                locked: false,
                hidden: false,
            }),
            number_format: Some("0.00%".to_string()),
            ..Style::default()
        });
        table
    }

    #[test]
    fn written_styles_read_back_to_the_same_table() {
        let table = sample_table();
        let xml = write_styles_xml(&table, &DxfTable::default());
        let part = StylesPart::parse(xml.as_bytes()).unwrap();
        assert_eq!(part.table, table);
        for id in 0..table.len() as u32 {
            assert_eq!(part.style_id_for_xf(id), id);
        }
    }

    #[test]
    fn builtin_formats_have_no_num_fmt_entry() {
        let xml = write_styles_xml(&sample_table(), &DxfTable::default());
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let num_fmts: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("numFmt"))
            .map(|n| {
                (
                    n.attribute("numFmtId").unwrap().to_string(),
                    n.attribute("formatCode").unwrap().to_string(),
                )
            })
            .collect();
        assert_eq!(num_fmts, vec![("164".to_string(), "yyyy-mm-dd".to_string())]);

        let xf_fmt_ids: Vec<_> = doc
            .descendants()
            .filter(|n| n.has_tag_name("cellXfs"))
            .flat_map(|n| n.children().filter(|c| c.is_element()))
            .map(|xf| xf.attribute("numFmtId").unwrap().to_string())
            .collect();
        assert_eq!(xf_fmt_ids, vec!["0", "164", "10"]);
    }

    #[test]
    fn dxfs_are_deduplicated_and_spliced_in_order() {
        let mut dxfs = DxfTable::default();
        let bold = DifferentialFormat {
            xml: "<dxf><font><b/></font></dxf>".to_string(),
        };
        let red = DifferentialFormat {
            xml: r#"<dxf><font><color rgb="FFFF0000"/></font></dxf>"#.to_string(),
        };
        assert_eq!(dxfs.intern(&bold), 0);
        assert_eq!(dxfs.intern(&red), 1);
        assert_eq!(dxfs.intern(&bold), 0);

        let xml = write_styles_xml(&StyleTable::new(), &dxfs);
        let part = StylesPart::parse(xml.as_bytes()).unwrap();
        assert_eq!(part.dxf(0), Some(&bold));
        assert_eq!(part.dxf(1), Some(&red));

        let doc = roxmltree::Document::parse(&xml).unwrap();
        let order: Vec<_> = doc
            .root_element()
            .children()
            .filter(|n| n.is_element())
            .map(|n| n.tag_name().name().to_string())
            .collect();
        assert_eq!(
            order,
            vec!["fonts", "fills", "borders", "cellStyleXfs", "cellXfs", "cellStyles", "dxfs", "tableStyles"]
        );
    }
}
