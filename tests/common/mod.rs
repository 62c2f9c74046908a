//! Shared fixtures for integration tests
#![allow(dead_code, unused_imports)]

pub mod form_builder;

pub use form_builder::FormBuilder;

/// A one-page form with one field of each supported kind plus a second
/// page holding a comments field.
pub fn sample_form() -> Vec<u8> {
    FormBuilder::with_pages(2)
        .text_field("fullName", 0, [72, 700, 300, 720], None)
        .text_field_with_max_len("zip", 0, [320, 702, 400, 722], None, 5)
        .checkbox("agree", 0, [72, 650, 92, 670], false)
        .radio_group(
            "gender",
            0,
            &[("male", [72, 600, 92, 620]), ("female", [120, 600, 140, 620])],
            None,
        )
        .dropdown(
            "country",
            0,
            [72, 550, 300, 570],
            &["USA", "Canada", "Mexico"],
            None,
        )
        .text_field("comments", 1, [72, 700, 500, 760], None)
        .build()
}
