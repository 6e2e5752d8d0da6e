// Copyright (C) 2026 Mudskipper Project
//
// MIT License

//! Boilerplate for ARM debug register value newtypes.

/// Generate the standard conversions and `Display` for a `u32` register
/// value newtype.
#[macro_export]
macro_rules! register_data {
    ($name:ident) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }

        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
}
