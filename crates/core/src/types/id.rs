//! Newtype IDs for type-safe entity references.
//!
//! The remote API is inconsistent about id encoding: some endpoints return
//! `"id": "p1"`, others `"id": 42`. Every id is therefore stored as an opaque
//! string and deserialized from either form.
//!
//! Use the `define_id!` macro to create type-safe ID wrappers that prevent
//! accidentally mixing IDs from different entity types.

use serde::{Deserialize, Deserializer};

/// Macro to define a type-safe ID wrapper.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` as a plain string, `Deserialize` from a string or an integer
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - Conversion methods: `new()`, `as_str()`, `into_inner()`
/// - `From<&str>`, `From<String>` and `Display` implementations
///
/// # Example
///
/// ```rust
/// # use perfumeria_core::define_id;
/// define_id!(WidgetId);
/// define_id!(GadgetId);
///
/// let widget = WidgetId::new("w-1");
/// let gadget = GadgetId::new("w-1");
///
/// // These are different types, so this won't compile:
/// // let _: WidgetId = gadget;
/// assert_eq!(widget.as_str(), gadget.as_str());
///
/// // The API sends ids as strings or integers.
/// let from_int: WidgetId = serde_json::from_str("42").unwrap();
/// let from_str: WidgetId = serde_json::from_str("\"p1\"").unwrap();
/// assert_eq!(from_int.as_str(), "42");
/// assert_eq!(from_str.as_str(), "p1");
/// assert_eq!(serde_json::to_string(&from_int).unwrap(), "\"42\"");
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl ::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: ::serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                $crate::types::id::deserialize_string_or_int(deserializer).map(Self)
            }
        }

        impl $name {
            /// Create a new ID from any string-like value.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Get the underlying string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID and return the inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

/// Deserialize an id that may be encoded as a JSON string or integer.
///
/// # Errors
///
/// Returns an error if the value is neither a string nor an integer.
pub fn deserialize_string_or_int<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

define_id!(ProductId);
define_id!(UserId);
define_id!(OrderId);
define_id!(SubscriptionId);
define_id!(CategoryId);
define_id!(BrandId);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_from_string() {
        let id: ProductId = serde_json::from_str("\"p1\"").unwrap();
        assert_eq!(id.as_str(), "p1");
    }

    #[test]
    fn test_deserialize_from_integer() {
        let id: UserId = serde_json::from_str("42").unwrap();
        assert_eq!(id, UserId::new("42"));
    }

    #[test]
    fn test_deserialize_as_struct_field() {
        #[derive(serde::Deserialize)]
        struct Line {
            product_id: ProductId,
            order_id: OrderId,
        }

        let line: Line =
            serde_json::from_str(r#"{ "product_id": 12, "order_id": "o-3" }"#).unwrap();
        assert_eq!(line.product_id.as_str(), "12");
        assert_eq!(line.order_id.as_str(), "o-3");
    }

    #[test]
    fn test_deserialize_rejects_other_types() {
        assert!(serde_json::from_str::<OrderId>("true").is_err());
        assert!(serde_json::from_str::<OrderId>("null").is_err());
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = SubscriptionId::new("sub_9");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sub_9\"");
    }

    #[test]
    fn test_display() {
        assert_eq!(ProductId::from("p-7").to_string(), "p-7");
    }
}
