use std::fmt;
use std::sync::Arc;

use crate::ui_tree::UiNode;

/// Locates an element in the UI tree.
///
/// Selectors compose with [Selector::and]. Elements without usable bounds never match, since
/// nothing can be done with them.
#[derive(Clone)]
pub enum Selector {
    Text(String),
    TextContains(String),
    Id(String),
    Key(String),
    Type(String),
    All(Vec<Selector>),
    Custom {
        description: String,
        predicate: Arc<dyn Fn(&UiNode) -> bool + Send + Sync>,
    },
}

impl Selector {
    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text(text.into())
    }

    pub fn text_contains(text: impl Into<String>) -> Self {
        Selector::TextContains(text.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }

    pub fn key(key: impl Into<String>) -> Self {
        Selector::Key(key.into())
    }

    pub fn node_type(node_type: impl Into<String>) -> Self {
        Selector::Type(node_type.into())
    }

    pub fn custom<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&UiNode) -> bool + Send + Sync + 'static,
    {
        Selector::Custom {
            description: description.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn and(self, other: Selector) -> Self {
        match self {
            Selector::All(mut all) => {
                all.push(other);
                Selector::All(all)
            }
            this => Selector::All(vec![this, other]),
        }
    }

    pub fn matches(&self, node: &UiNode) -> bool {
        match node.bounds() {
            Some(bounds) if !bounds.is_empty() => self.matches_attributes(node),
            _ => false,
        }
    }

    fn matches_attributes(&self, node: &UiNode) -> bool {
        match self {
            Selector::Text(text) => node.text() == Some(text.as_str()),
            Selector::TextContains(text) => node.text().is_some_and(|t| t.contains(text.as_str())),
            Selector::Id(id) => node.id() == Some(id.as_str()),
            Selector::Key(key) => node.key() == Some(key.as_str()),
            Selector::Type(node_type) => node.node_type() == Some(node_type.as_str()),
            Selector::All(all) => all.iter().all(|s| s.matches_attributes(node)),
            Selector::Custom { predicate, .. } => predicate(node),
        }
    }

    /// The first matching node in depth-first order.
    pub fn find_first<'a>(&self, root: &'a UiNode) -> Option<&'a UiNode> {
        root.iter().find(|node| self.matches(node))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Text(text) => write!(f, "text == {text:?}"),
            Selector::TextContains(text) => write!(f, "text contains {text:?}"),
            Selector::Id(id) => write!(f, "id == {id:?}"),
            Selector::Key(key) => write!(f, "key == {key:?}"),
            Selector::Type(node_type) => write!(f, "type == {node_type:?}"),
            Selector::All(all) => {
                let parts = all.iter().map(ToString::to_string).collect::<Vec<_>>();
                write!(f, "[{}]", parts.join(" && "))
            }
            Selector::Custom { description, .. } => write!(f, "{description}"),
        }
    }
}

impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Selector({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_tree::tests::LAYOUT;

    #[test]
    fn find_by_text() {
        let root = UiNode::parse(LAYOUT).unwrap();
        let node = Selector::text("Cart").find_first(&root).unwrap();
        assert_eq!(Some("Button"), node.node_type());
    }

    #[test]
    fn combined_selector_requires_all() {
        let root = UiNode::parse(LAYOUT).unwrap();

        let hit = Selector::text_contains("Recommend").and(Selector::node_type("Text"));
        assert!(hit.find_first(&root).is_some());

        let miss = Selector::text_contains("Recommend").and(Selector::node_type("Button"));
        assert!(miss.find_first(&root).is_none());
    }

    #[test]
    fn custom_predicate() {
        let root = UiNode::parse(LAYOUT).unwrap();
        let clickable = Selector::custom("clickable", UiNode::is_clickable);

        let node = clickable.find_first(&root).unwrap();
        assert_eq!(Some("Recommended"), node.text());
        assert_eq!("clickable", clickable.to_string());
    }

    #[test]
    fn display_is_readable() {
        let selector = Selector::id("home").and(Selector::text("Go"));
        assert_eq!(r#"[id == "home" && text == "Go"]"#, selector.to_string());
    }
}
