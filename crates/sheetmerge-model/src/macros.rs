/// Declares a fieldless enum that maps one-to-one onto SpreadsheetML attribute values.
macro_rules! ooxml_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, ::serde::Serialize, ::serde::Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// Attribute value used in SpreadsheetML.
            pub const fn as_ooxml(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            /// Parse a SpreadsheetML attribute value.
            pub fn from_ooxml(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }
    };
}
