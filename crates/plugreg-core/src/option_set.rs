//! Platform option-set enumerations.
//!
//! Each enumeration maps to the integer code the platform stores and accepts
//! its variant name (case-insensitive), a few short aliases, or the raw code
//! when read from a mapping document.

use crate::error::CoreError;

macro_rules! option_set {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal $(| $alias:literal)* ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Option-set code stored by the platform.
            pub const fn code(self) -> i32 {
                match self {
                    $( Self::$variant => $code ),+
                }
            }

            /// Resolves an option-set code back to its variant.
            pub fn from_code(code: i64) -> Option<Self> {
                $(
                    if code == $code {
                        return Some(Self::$variant);
                    }
                )+
                None
            }

            pub const fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant) ),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim();
                $(
                    if needle.eq_ignore_ascii_case(stringify!($variant))
                        $( || needle.eq_ignore_ascii_case($alias) )*
                    {
                        return Ok(Self::$variant);
                    }
                )+
                Err(CoreError::invalid_value(stringify!($name), s))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                struct OptionSetVisitor;

                impl serde::de::Visitor<'_> for OptionSetVisitor {
                    type Value = $name;

                    fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                        write!(f, "a {} name or option-set code", stringify!($name))
                    }

                    fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<$name, E> {
                        v.parse()
                            .map_err(|_| E::invalid_value(serde::de::Unexpected::Str(v), &self))
                    }

                    fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<$name, E> {
                        $name::from_code(v)
                            .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Signed(v), &self))
                    }

                    fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<$name, E> {
                        i64::try_from(v)
                            .ok()
                            .and_then($name::from_code)
                            .ok_or_else(|| E::invalid_value(serde::de::Unexpected::Unsigned(v), &self))
                    }
                }

                deserializer.deserialize_any(OptionSetVisitor)
            }
        }
    };
}

option_set! {
    /// Pipeline stage a step is registered in.
    Stage {
        PreValidation = 10 | "pre-validation",
        PreOperation = 20 | "pre-operation",
        PostOperation = 40 | "post-operation",
    }
}

option_set! {
    /// Whether a step runs inside the triggering transaction.
    ExecutionMode {
        Synchronous = 0 | "sync",
        Asynchronous = 1 | "async",
    }
}

option_set! {
    /// Snapshot kind captured for a step image.
    ImageType {
        PreImage = 0 | "pre",
        PostImage = 1 | "post",
        Both = 2,
    }
}

option_set! {
    /// Sandboxing of a registered assembly.
    IsolationMode {
        None = 1,
        Sandbox = 2,
    }
}

option_set! {
    /// Where the platform loads the assembly from.
    SourceType {
        Database = 0,
        Disk = 1,
        Normal = 2 | "gac",
    }
}

option_set! {
    /// Deployment targets a step is available on.
    SupportedDeployment {
        ServerOnly = 0 | "server",
        Offline = 1 | "client",
        Both = 2,
    }
}

impl Default for IsolationMode {
    fn default() -> Self {
        Self::Sandbox
    }
}

impl Default for SourceType {
    fn default() -> Self {
        Self::Database
    }
}

impl Default for SupportedDeployment {
    fn default() -> Self {
        Self::ServerOnly
    }
}
