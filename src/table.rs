//! Bidirectional byte/name tables.
//!
//! Every protocol byte the unit understands maps to a typed value and a
//! symbolic name. Anything not in a table decodes to `Unknown`, which
//! displays as [`UNKNOWN`] and has no wire byte.

/// Name reported for bytes and names missing from a table.
pub const UNKNOWN: &str = "UNKNOWN";

/// Declares an enum backed by a fixed `(variant, byte, name)` table.
///
/// The generated enum gets an extra `Unknown` variant (the default) plus
/// `from_byte`, `to_byte`, `as_str` and `from_name` lookups. Serde uses the
/// symbolic name.
macro_rules! byte_table {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $byte:literal => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            #[default]
            Unknown,
        }

        impl $name {
            const TABLE: &'static [($name, u8, &'static str)] = &[
                $( ($name::$variant, $byte, $label), )+
            ];

            /// Every value with a wire byte, in table order.
            pub const KNOWN: &'static [$name] = &[ $( $name::$variant, )+ ];

            pub fn from_byte(byte: u8) -> Self {
                Self::TABLE
                    .iter()
                    .find(|(_, b, _)| *b == byte)
                    .map_or(Self::Unknown, |(v, _, _)| *v)
            }

            pub fn to_byte(self) -> Option<u8> {
                Self::TABLE
                    .iter()
                    .find(|(v, _, _)| *v == self)
                    .map(|(_, b, _)| *b)
            }

            pub fn as_str(self) -> &'static str {
                Self::TABLE
                    .iter()
                    .find(|(v, _, _)| *v == self)
                    .map_or($crate::table::UNKNOWN, |(_, _, n)| *n)
            }

            /// Case-insensitive reverse lookup.
            pub fn from_name(name: &str) -> Self {
                Self::TABLE
                    .iter()
                    .find(|(_, _, n)| n.eq_ignore_ascii_case(name))
                    .map_or(Self::Unknown, |(v, _, _)| *v)
            }

            pub fn is_known(self) -> bool {
                self != Self::Unknown
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let name = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Ok(Self::from_name(&name))
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::UNKNOWN;

    byte_table! {
        pub enum Fruit {
            Apple = 1 => "apple",
            Pear = 7 => "PEAR",
        }
    }

    #[test]
    fn byte_lookup_falls_back_to_unknown() {
        assert_eq!(Fruit::from_byte(7), Fruit::Pear);
        assert_eq!(Fruit::from_byte(2), Fruit::Unknown);
        assert_eq!(Fruit::from_byte(255), Fruit::Unknown);
        assert_eq!(Fruit::Unknown.as_str(), UNKNOWN);
        assert_eq!(Fruit::Unknown.to_byte(), None);
    }

    #[test]
    fn name_lookup_ignores_case() {
        assert_eq!(Fruit::from_name("pear"), Fruit::Pear);
        assert_eq!(Fruit::from_name("APPLE"), Fruit::Apple);
        assert_eq!(Fruit::from_name("banana"), Fruit::Unknown);
        assert_eq!(Fruit::from_name(UNKNOWN), Fruit::Unknown);
    }

    #[test]
    fn known_excludes_sentinel() {
        assert_eq!(Fruit::KNOWN, &[Fruit::Apple, Fruit::Pear]);
        assert!(Fruit::KNOWN.iter().all(|f| f.is_known()));
        assert_eq!(Fruit::default(), Fruit::Unknown);
    }

    #[test]
    fn serde_uses_names() {
        assert_eq!(serde_json::to_string(&Fruit::Pear).unwrap(), "\"PEAR\"");
        let parsed: Fruit = serde_json::from_str("\"apple\"").unwrap();
        assert_eq!(parsed, Fruit::Apple);
        let parsed: Fruit = serde_json::from_str("\"kiwi\"").unwrap();
        assert_eq!(parsed, Fruit::Unknown);
    }
}
