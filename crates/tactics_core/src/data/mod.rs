//! Content definitions and the template registry.
//!
//! Item and mob templates are pure data deserialized from RON. The
//! [`TemplateRegistry`] owns the immutable templates and hands out fresh
//! instances; nothing in a live unit points back at a template.
//!
//! **Note:** This module contains no IO. Callers read files and pass the
//! text in.

mod mob_data;
mod registry;

pub use mob_data::MobTemplate;
pub use registry::{parse_item_catalog, parse_mob_catalog, TemplateRegistry, FALLBACK_ITEM, FALLBACK_MOB};
