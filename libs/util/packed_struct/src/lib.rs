// This file is part of the extern-traces agent.
//
// Licensed under the GNU General Public License, version 3 or later.
// See the LICENSE file distributed with this crate for details.

//! Overlays a `#[repr(C, packed)]` struct onto a raw byte slice.
//!
//! The agent spends most of its parsing time walking fixed-layout binary
//! structures (SELF headers, ELF headers, program headers, dynamic tags).
//! `packed_struct!` generates the struct, typed accessors for fields whose
//! on-disk representation needs a widening cast, a `Debug` impl, and an
//! `overlay` constructor that bounds-checks the buffer before casting a
//! pointer into it.

#[derive(Debug, thiserror::Error)]
pub enum OverlayError {
    #[error("buffer too short to overlay {name}: need {need} bytes, have {have}")]
    TooShort {
        name: &'static str,
        need: usize,
        have: usize,
    },
}

#[macro_export]
macro_rules! _make_packed_struct_accessor {
    ($field:ident, $field_name:ident, $field_ty:ty, $output_ty:ty) => {
        pub fn $field_name(&self) -> $output_ty {
            self.$field as $output_ty
        }
    };

    ($field:ident, $field_name:ident, $field_ty:ty, ) => {
        pub fn $field_name(&self) -> $field_ty {
            self.$field as $field_ty
        }
    };
}

#[macro_export]
macro_rules! packed_struct {
    ($name:ident {
        $( $field:ident => $field_name:ident : $field_ty:ty $(as $field_name_ty:ty),* ),+ $(,)?
    }) => {
        #[repr(C, packed)]
        #[derive(Clone, Copy)]
        pub struct $name {
            $(
                $field: $field_ty
            ),+
        }

        impl $name {
            $(
                $crate::_make_packed_struct_accessor!($field, $field_name, $field_ty, $($field_name_ty),*);
            )+

            pub fn overlay(buf: &[u8]) -> Result<&$name, $crate::OverlayError> {
                if buf.len() < std::mem::size_of::<$name>() {
                    return Err($crate::OverlayError::TooShort {
                        name: stringify!($name),
                        need: std::mem::size_of::<$name>(),
                        have: buf.len(),
                    });
                }
                let ptr: *const $name = buf.as_ptr() as *const _;
                Ok(unsafe { &*ptr })
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field_name), &self.$field_name()))*
                    .finish()
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    packed_struct!(TestStruct {
        _0 => foo: u8 as usize,
        _1 => bar: u32,
        _2 => baz: u16 as u8
    });

    #[test]
    fn it_has_accessors() {
        let buf: &[u8] = &[42, 1, 0, 0, 0, 0, 1];
        let ts = TestStruct::overlay(buf).unwrap();
        assert_eq!(ts.foo(), 42usize);
        assert_eq!(ts.bar(), 1u32);
        assert_eq!(ts.baz(), 0u8);
    }

    #[test]
    fn it_can_debug() {
        let buf: &[u8] = &[42, 1, 0, 0, 0, 0, 1];
        let ts = TestStruct::overlay(buf).unwrap();
        format!("{:?}", ts);
    }

    #[test]
    fn it_rejects_short_buffers() {
        let buf: &[u8] = &[1, 2, 3];
        assert!(TestStruct::overlay(buf).is_err());
    }
}
