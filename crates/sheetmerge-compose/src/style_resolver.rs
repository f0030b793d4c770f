use std::collections::HashMap;

use sheetmerge_model::{Style, StyleTable};

/// Maps style ids of one source table onto a target table by value.
///
/// Target entries are created through [`StyleTable::intern`], so a structurally equal
/// style is reused no matter how many sheets or compositions pull it in. A resolver
/// caches its mappings and must therefore only be used with a single target table.
#[derive(Debug)]
pub struct StyleResolver<'a> {
    source: &'a StyleTable,
    cache: HashMap<u32, u32>,
}

impl<'a> StyleResolver<'a> {
    pub fn new(source: &'a StyleTable) -> Self {
        Self {
            source,
            cache: HashMap::new(),
        }
    }

    /// Target id for `source_id`. Unknown ids resolve to the source default style.
    ///
    /// The default style maps to target id 0 only when both tables share a base
    /// font; otherwise it becomes an entry carrying the source base font.
    pub fn resolve(&mut self, source_id: u32, target: &mut StyleTable) -> u32 {
        if source_id == 0 && self.source.base_font == target.base_font {
            return 0;
        }
        if let Some(id) = self.cache.get(&source_id) {
            return *id;
        }
        let id = match self.source.get(source_id) {
            Some(style) => self.resolve_style(style, target),
            None => {
                log::debug!("unknown source style id {source_id}, using the default style");
                self.resolve_style(&Style::default(), target)
            }
        };
        self.cache.insert(source_id, id);
        id
    }

    /// Intern a style taken from the source table into `target`.
    ///
    /// A style relying on the base font gets the source base font spelled out when
    /// the target's base font differs, so the text renders unchanged.
    pub fn resolve_style(&self, style: &Style, target: &mut StyleTable) -> u32 {
        let mut style = style.clone();
        if style.font.is_none() && self.source.base_font != target.base_font {
            style.font = Some(self.source.base_font.clone());
        }
        target.intern(style)
    }

    /// The source table's style for `source_id`, if any.
    pub fn source_style(&self, source_id: u32) -> Option<&'a Style> {
        self.source.get(source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sheetmerge_model::{Color, Fill, Font, OrderedFloat};

    fn yellow() -> Style {
        Style {
            fill: Some(Fill::solid(Color::argb(0xFFFFFF00))),
            ..Style::default()
        }
    }

    #[test]
    fn equal_styles_share_one_target_entry() {
        let mut source = StyleTable::new();
        let a = source.intern(yellow());
        let b = source.intern(Style {
            number_format: Some("0.0%".to_string()),
            ..Style::default()
        });

        let mut target = StyleTable::new();
        let existing = target.intern(yellow());

        let mut resolver = StyleResolver::new(&source);
        assert_eq!(resolver.resolve(a, &mut target), existing);
        let b_id = resolver.resolve(b, &mut target);
        assert_eq!(resolver.resolve(b, &mut target), b_id);
        assert_eq!(resolver.resolve(0, &mut target), 0);
        assert_eq!(resolver.resolve(99, &mut target), 0);
        assert_eq!(target.len(), 3);

        // A fresh resolver over the same tables adds nothing.
        let mut again = StyleResolver::new(&source);
        again.resolve(a, &mut target);
        again.resolve(b, &mut target);
        assert_eq!(target.len(), 3);
    }

    #[test]
    fn base_font_is_materialized_when_tables_disagree() {
        let arial = Font {
            name: Some("Arial".to_string()),
            size: Some(OrderedFloat(10.0)),
            ..Font::default()
        };
        let mut source = StyleTable::with_base_font(arial.clone());
        let id = source.intern(yellow());

        let mut target = StyleTable::new();
        let resolved = StyleResolver::new(&source).resolve(id, &mut target);
        assert_eq!(target.get(resolved).unwrap().font, Some(arial));

        let calibri_source = StyleTable::new();
        let resolved = StyleResolver::new(&calibri_source).resolve_style(&yellow(), &mut target);
        assert_eq!(target.get(resolved).unwrap().font, None);
    }

    #[test]
    fn default_style_keeps_the_source_base_font() {
        let arial = Font {
            name: Some("Arial".to_string()),
            size: Some(OrderedFloat(10.0)),
            ..Font::default()
        };
        let source = StyleTable::with_base_font(arial.clone());
        let mut target = StyleTable::new();
        let mut resolver = StyleResolver::new(&source);

        let id = resolver.resolve(0, &mut target);
        assert_eq!(target.get(id).unwrap().font, Some(arial));
        assert_eq!(resolver.resolve(0, &mut target), id);
        assert_eq!(resolver.resolve(42, &mut target), id);
        assert_eq!(target.len(), 2);
    }
}
