use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{DeviceError, DeviceResult};
use crate::geometry::Bounds;

/// A node of the UI tree dumped by `uitest dumpLayout`.
///
/// The dump is a JSON object with an `attributes` map of string values and a `children` array of
/// the same shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct UiNode {
    #[serde(default)]
    pub attributes: HashMap<String, String>,
    #[serde(default)]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn parse(json: &str) -> DeviceResult<Self> {
        serde_json::from_str(json).map_err(|e| DeviceError::Layout(e.to_string()))
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn text(&self) -> Option<&str> {
        self.attr("text").filter(|t| !t.is_empty())
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id").filter(|t| !t.is_empty())
    }

    pub fn key(&self) -> Option<&str> {
        self.attr("key").filter(|t| !t.is_empty())
    }

    pub fn node_type(&self) -> Option<&str> {
        self.attr("type")
    }

    pub fn is_clickable(&self) -> bool {
        self.attr("clickable") == Some("true")
    }

    /// Bounds of this node, if present and well formed.
    pub fn bounds(&self) -> Option<Bounds> {
        self.attr("bounds").and_then(|b| b.parse().ok())
    }

    /// Depth-first, pre-order iteration over this node and all descendants.
    pub fn iter(&self) -> UiNodeIter<'_> {
        UiNodeIter { stack: vec![self] }
    }
}

pub struct UiNodeIter<'a> {
    stack: Vec<&'a UiNode>,
}

impl<'a> Iterator for UiNodeIter<'a> {
    type Item = &'a UiNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const LAYOUT: &str = r#"{
        "attributes": {"type": "root", "bounds": "[0,0][1080,2340]"},
        "children": [
            {
                "attributes": {"type": "Column", "bounds": "[0,0][1080,2340]", "id": "home"},
                "children": [
                    {"attributes": {"type": "Text", "text": "Recommended", "bounds": "[40,200][400,260]", "clickable": "true"}, "children": []},
                    {"attributes": {"type": "TextInput", "key": "search_box", "bounds": "[40,100][1040,180]", "text": ""}, "children": []}
                ]
            },
            {"attributes": {"type": "Button", "text": "Cart", "bounds": "[800,2200][1000,2300]"}}
        ]
    }"#;

    #[test]
    fn parse_and_iterate_in_order() {
        let root = UiNode::parse(LAYOUT).unwrap();
        let types = root
            .iter()
            .filter_map(UiNode::node_type)
            .collect::<Vec<_>>();

        assert_eq!(vec!["root", "Column", "Text", "TextInput", "Button"], types);
    }

    #[test]
    fn empty_text_is_absent() {
        let root = UiNode::parse(LAYOUT).unwrap();
        let input = root
            .iter()
            .find(|n| n.key() == Some("search_box"))
            .unwrap();

        assert_eq!(None, input.text());
        assert!(input.bounds().is_some());
    }

    #[test]
    fn invalid_layout_is_an_error() {
        assert!(matches!(
            UiNode::parse("not json"),
            Err(DeviceError::Layout(_))
        ));
    }
}
