//! `xl/styles.xml`: decode into the model [`sheetmerge_model::StyleTable`] and
//! regenerate it deterministically on encode.

mod number_formats;
mod read;
mod write;

pub use number_formats::{
    builtin_format_code, builtin_format_id, is_date_format, FIRST_CUSTOM_NUM_FMT_ID,
};
pub use read::{StylesPart, StylesPartError};
pub use write::{write_styles_xml, DxfTable};

pub(crate) use read::parse_color;
pub(crate) use write::build_color_element;
