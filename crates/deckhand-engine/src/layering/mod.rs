//! Hierarchical document layering.
//!
//! Layering is controlled in two places: the revision's single
//! `LayeringPolicy` control document, which fixes the total ordering of
//! layers, and each document's `metadata.layeringDefinition`, which names
//! the document's layer, its parent selector, and the ordered actions
//! applied atop the parent's already-layered data.
//!
//! The parent relation forms a forest (acyclic by construction, since the
//! layer index strictly decreases toward the root); the engine walks it
//! root-first so every document is layered exactly once.

mod engine;
mod parent;
mod policy;

pub use engine::{Layered, apply_actions, layer_documents};
pub use parent::{ParentSelection, select_parents};
pub use policy::LayerOrder;
