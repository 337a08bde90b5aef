//! Layering policy resolution.

use std::collections::BTreeMap;

use tracing::debug;

use crate::document::{ControlDocument, Document};
use crate::error::RenderError;

/// The total ordering of layers, most abstract first.
///
/// An empty order (no `LayeringPolicy` and no layered documents) makes
/// every document a root.
#[derive(Debug, Clone, Default)]
pub struct LayerOrder {
    layers: Vec<String>,
    index: BTreeMap<String, usize>,
}

impl LayerOrder {
    /// Resolves the revision's layering policy.
    ///
    /// # Errors
    ///
    /// - [`RenderError::MultipleLayeringPolicies`] if more than one policy
    ///   is present.
    /// - [`RenderError::LayeringPolicyNotFound`] if no policy exists while
    ///   some document declares a layer.
    /// - [`RenderError::InvalidDocumentFormat`] if `layerOrder` repeats a
    ///   layer name.
    pub fn resolve(
        controls: &[ControlDocument],
        documents: &[Document],
    ) -> Result<Self, RenderError> {
        let policies: Vec<_> = controls
            .iter()
            .filter_map(|control| match control {
                ControlDocument::LayeringPolicy(policy) => Some(policy),
                _ => None,
            })
            .collect();

        match policies.as_slice() {
            [] => {
                if let Some(layered) = documents.iter().find(|doc| doc.layer().is_some()) {
                    debug!(document = %layered.id(), "document declares a layer without a policy");
                    return Err(RenderError::LayeringPolicyNotFound);
                }
                Ok(Self::default())
            },
            [policy] => Self::from_order(policy.layer_order.clone()),
            _ => Err(RenderError::MultipleLayeringPolicies {
                count: policies.len(),
            }),
        }
    }

    fn from_order(layers: Vec<String>) -> Result<Self, RenderError> {
        let mut index = BTreeMap::new();
        for (position, layer) in layers.iter().enumerate() {
            if index.insert(layer.clone(), position).is_some() {
                return Err(RenderError::InvalidDocumentFormat {
                    detail: format!("layerOrder repeats layer {layer:?}"),
                });
            }
        }
        Ok(Self { layers, index })
    }

    /// The ordered layer names.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// True when no layering policy is in force.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// True if `layer` appears in the order.
    #[must_use]
    pub fn contains(&self, layer: &str) -> bool {
        self.index.contains_key(layer)
    }

    /// The position of `layer` in the order.
    #[must_use]
    pub fn index_of(&self, layer: &str) -> Option<usize> {
        self.index.get(layer).copied()
    }

    /// The layer immediately preceding `layer`, or `None` at the top.
    #[must_use]
    pub fn parent_layer_of(&self, layer: &str) -> Option<&str> {
        let position = self.index_of(layer)?;
        position
            .checked_sub(1)
            .map(|parent| self.layers[parent].as_str())
    }

    /// True if `layer` is the first (most abstract) layer.
    #[must_use]
    pub fn is_top(&self, layer: &str) -> bool {
        self.index_of(layer) == Some(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::LayeringPolicyDoc;

    fn policy(layers: &[&str]) -> ControlDocument {
        ControlDocument::LayeringPolicy(LayeringPolicyDoc {
            name: "layering-policy".to_string(),
            layer_order: layers.iter().map(ToString::to_string).collect(),
        })
    }

    fn layered_doc(layer: &str) -> Document {
        serde_yaml::from_str(&format!(
            "schema: a/B/v1\nmetadata:\n  schema: metadata/Document/v1\n  name: d\n  \
             layeringDefinition:\n    layer: {layer}\ndata: {{}}\n"
        ))
        .unwrap()
    }

    #[test]
    fn resolves_the_single_policy() {
        let order = LayerOrder::resolve(&[policy(&["global", "region", "site"])], &[]).unwrap();
        assert_eq!(order.layers(), ["global", "region", "site"]);
        assert_eq!(order.parent_layer_of("site"), Some("region"));
        assert_eq!(order.parent_layer_of("global"), None);
        assert!(order.is_top("global"));
    }

    #[test]
    fn multiple_policies_are_fatal() {
        let controls = [policy(&["global"]), policy(&["site"])];
        assert!(matches!(
            LayerOrder::resolve(&controls, &[]),
            Err(RenderError::MultipleLayeringPolicies { count: 2 })
        ));
    }

    #[test]
    fn missing_policy_with_layered_documents_is_fatal() {
        assert!(matches!(
            LayerOrder::resolve(&[], &[layered_doc("site")]),
            Err(RenderError::LayeringPolicyNotFound)
        ));
    }

    #[test]
    fn missing_policy_without_layered_documents_is_empty() {
        let order = LayerOrder::resolve(&[], &[]).unwrap();
        assert!(order.is_empty());
        assert!(!order.contains("site"));
    }

    #[test]
    fn repeated_layers_are_rejected() {
        assert!(matches!(
            LayerOrder::resolve(&[policy(&["global", "global"])], &[]),
            Err(RenderError::InvalidDocumentFormat { .. })
        ));
    }
}
