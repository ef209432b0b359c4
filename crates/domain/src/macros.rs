//! Macro for implementing Display and FromStr for string-backed enums
//!
//! Environments, auth phases and event names all have a canonical lowercase
//! spelling (used in logs, config files and wire bodies) and occasionally a
//! few accepted aliases (`dev` for `development`).
//!
//! # Example
//!
//! ```rust
//! use chatlab_domain::impl_domain_enum_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Tier {
//!     Free,
//!     Paid,
//! }
//!
//! impl_domain_enum_conversions!(Tier {
//!     Free => "free",
//!     Paid => "paid" | "pro",
//! });
//!
//! assert_eq!(Tier::Paid.to_string(), "paid");
//! assert_eq!("PRO".parse::<Tier>(), Ok(Tier::Paid));
//! ```

/// Implements `as_str`, `Display` and `FromStr` for a fieldless enum
///
/// The first string of each arm is canonical; any `| "alias"` strings are
/// accepted by `FromStr` only. Parsing ignores ASCII case and surrounding
/// whitespace.
#[macro_export]
macro_rules! impl_domain_enum_conversions {
    ($enum_name:ident { $($variant:ident => $canonical:literal $(| $alias:literal)*),+ $(,)? }) => {
        impl $enum_name {
            /// Canonical lowercase spelling
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $canonical,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($canonical $(| $alias)* => Ok(Self::$variant),)+
                    _ => Err(format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}
