//! Newtype IDs for type-safe entity references.
//!
//! Orders, shipments and profiles are all keyed by `SERIAL` integers in
//! storage. The migration compares profile references by identity, so mixing a
//! shipment id into a profile comparison must not compile.

use thiserror::Error;

/// An id typed on the command line that is not a positive integer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {kind} id {input:?}: expected a positive integer")]
pub struct IdParseError {
    pub kind: &'static str,
    pub input: String,
}

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident => $kind:literal) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            serde::Serialize,
            serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Record kind, as used in messages.
            pub const KIND: &'static str = $kind;

            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().parse::<i32>() {
                    Ok(id) if id > 0 => Ok(Self(id)),
                    _ => Err(IdParseError {
                        kind: $kind,
                        input: s.to_owned(),
                    }),
                }
            }
        }
    };
}

entity_id! {
    /// An order. Orders own shipments and reference one billing profile.
    OrderId => "order"
}

entity_id! {
    /// A shipment, which ships to at most one profile.
    ShipmentId => "shipment"
}

entity_id! {
    /// A customer profile.
    ProfileId => "profile"
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_parse_from_cli_input() {
        let id: OrderId = " 42 ".parse().unwrap();
        assert_eq!(id, OrderId::new(42));
        assert_eq!(id.get(), 42);
    }

    #[test]
    fn test_parse_error_names_the_kind() {
        let err = "forty-two".parse::<OrderId>().unwrap_err();
        assert_eq!(err.kind, OrderId::KIND);
        assert_eq!(
            err.to_string(),
            "invalid order id \"forty-two\": expected a positive integer"
        );

        let err = "0".parse::<ShipmentId>().unwrap_err();
        assert_eq!(err.kind, "shipment");
        assert!("-3".parse::<ProfileId>().is_err());
    }

    #[test]
    fn test_ids_order_numerically() {
        let mut ids = vec![ProfileId::new(10), ProfileId::new(2), ProfileId::new(7)];
        ids.sort();
        assert_eq!(
            ids,
            vec![ProfileId::new(2), ProfileId::new(7), ProfileId::new(10)]
        );
    }

    #[test]
    fn test_id_serializes_transparently() {
        let json = serde_json::to_string(&ShipmentId::new(9)).unwrap();
        assert_eq!(json, "9");
        let back: ShipmentId = serde_json::from_str("9").unwrap();
        assert_eq!(back, ShipmentId::new(9));
    }
}
