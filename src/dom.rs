//! Permissive HTML fragment trees built with html5ever.
//!
//! A [`Fragment`] is always rebuilt from the authoritative HTML string and
//! thrown away after serialization; nothing here outlives one mutation.
//!
//! rcdom empties every descendant's child list when the document node is
//! dropped, so a [`Fragment`] owns its [`RcDom`] and [`Element`] handles are
//! only meaningful while the fragment they came from is alive.

use html5ever::serialize::{serialize, SerializeOpts, TraversalScope};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_fragment, Attribute, LocalName, Namespace, ParseOpts, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};

use crate::error::{MockupError, MockupResult};

const HTML_NAMESPACE: &str = "http://www.w3.org/1999/xhtml";

/// A parsed HTML fragment, as if it were the inner HTML of a `<body>`.
pub struct Fragment {
    _dom: RcDom,
    root: Handle,
}

impl Fragment {
    /// Parse `html` with browser-grade error recovery. Never fails: garbage in,
    /// best-effort tree out.
    pub fn parse(html: &str) -> Self {
        let context = QualName::new(
            None,
            Namespace::from(HTML_NAMESPACE),
            LocalName::from("body"),
        );
        let dom = parse_fragment(RcDom::default(), ParseOpts::default(), context, Vec::new())
            .one(html);

        // Fragment parsing puts the parsed nodes under a synthetic <html> element.
        let root = dom
            .document
            .children
            .borrow()
            .first()
            .cloned()
            .unwrap_or_else(|| dom.document.clone());
        Self { _dom: dom, root }
    }

    /// All elements carrying `attribute`, depth-first in source order.
    pub fn elements_with_attribute(&self, attribute: &str) -> Vec<Element> {
        let mut found = Vec::new();
        collect_elements(&self.root, &mut |el: &Element| el.has_attribute(attribute), &mut found);
        found
    }

    /// First element whose `id` attribute equals `id`.
    pub fn element_by_id(&self, id: &str) -> Option<Element> {
        let mut found = Vec::new();
        collect_elements(
            &self.root,
            &mut |el: &Element| el.attribute("id").as_deref() == Some(id),
            &mut found,
        );
        found.into_iter().next()
    }

    /// First top-level element, skipping text and comments.
    pub fn first_element(&self) -> Option<Element> {
        self.root
            .children
            .borrow()
            .iter()
            .find(|c| matches!(c.data, NodeData::Element { .. }))
            .map(|c| Element(c.clone()))
    }

    /// Serialize the fragment back to an HTML string.
    pub fn to_html(&self) -> MockupResult<String> {
        serialize_handle(&self.root, TraversalScope::ChildrenOnly(None))
    }
}

fn collect_elements(
    node: &Handle,
    matches: &mut dyn FnMut(&Element) -> bool,
    out: &mut Vec<Element>,
) {
    for child in node.children.borrow().iter() {
        if let NodeData::Element { .. } = child.data {
            let element = Element(child.clone());
            if matches(&element) {
                out.push(element);
            }
        }
        collect_elements(child, matches, out);
    }
}

fn serialize_handle(handle: &Handle, scope: TraversalScope) -> MockupResult<String> {
    let mut bytes = Vec::new();
    let serializable: SerializableHandle = handle.clone().into();
    let opts = SerializeOpts {
        traversal_scope: scope,
        ..Default::default()
    };
    serialize(&mut bytes, &serializable, opts)
        .map_err(|e| MockupError::Serialize(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| MockupError::Serialize(e.to_string()))
}

/// Handle to one element node inside a [`Fragment`]. Mutations go straight
/// into the shared tree.
#[derive(Clone)]
pub struct Element(Handle);

impl Element {
    pub fn tag_name(&self) -> String {
        match &self.0.data {
            NodeData::Element { name, .. } => name.local.to_string(),
            _ => String::new(),
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.0.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|a| &*a.name.local == name)
                .map(|a| a.value.to_string()),
            _ => None,
        }
    }

    pub fn set_attribute(&self, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &self.0.data {
            let mut attrs = attrs.borrow_mut();
            match attrs.iter_mut().find(|a| &*a.name.local == name) {
                Some(attr) => attr.value = StrTendril::from(value),
                None => attrs.push(Attribute {
                    name: QualName::new(None, Namespace::from(""), LocalName::from(name)),
                    value: StrTendril::from(value),
                }),
            }
        }
    }

    pub fn remove_attribute(&self, name: &str) {
        if let NodeData::Element { attrs, .. } = &self.0.data {
            attrs.borrow_mut().retain(|a| &*a.name.local != name);
        }
    }

    /// Class tokens in attribute order.
    pub fn classes(&self) -> Vec<String> {
        self.attribute("class")
            .map(|value| value.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Replace the class list. An empty list drops the attribute.
    pub fn set_classes(&self, classes: &[String]) {
        if classes.is_empty() {
            self.remove_attribute("class");
        } else {
            self.set_attribute("class", &classes.join(" "));
        }
    }

    /// Value of one inline style property, if declared.
    pub fn style_property(&self, property: &str) -> Option<String> {
        let style = self.attribute("style")?;
        parse_declarations(&style)
            .into_iter()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value)
    }

    /// Set one inline style property, keeping the other declarations in place.
    pub fn set_style_property(&self, property: &str, value: &str) {
        let mut declarations = self
            .attribute("style")
            .map(|s| parse_declarations(&s))
            .unwrap_or_default();
        match declarations.iter_mut().find(|(name, _)| name == property) {
            Some(decl) => decl.1 = value.to_string(),
            None => declarations.push((property.to_string(), value.to_string())),
        }
        self.set_attribute("style", &render_declarations(&declarations));
    }

    /// Every element below this one, depth-first in source order.
    pub fn descendants(&self) -> Vec<Element> {
        let mut found = Vec::new();
        collect_elements(&self.0, &mut |_: &Element| true, &mut found);
        found
    }

    /// The element itself serialized, including its own tag.
    pub fn outer_html(&self) -> MockupResult<String> {
        serialize_handle(&self.0, TraversalScope::IncludeNode)
    }
}

/// Split an inline style into `(property, value)` pairs.
///
/// Semicolons inside parentheses or quotes do not end a declaration, so
/// `url(data:image/png;base64,...)` survives intact.
pub fn parse_declarations(style: &str) -> Vec<(String, String)> {
    let mut declarations = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, ch) in style.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                push_declaration(&style[start..i], &mut declarations);
                start = i + 1;
            }
            _ => {}
        }
    }
    push_declaration(&style[start..], &mut declarations);
    declarations
}

fn push_declaration(raw: &str, out: &mut Vec<(String, String)>) {
    let Some((name, value)) = raw.split_once(':') else {
        return;
    };
    let name = name.trim().to_ascii_lowercase();
    let value = value.trim();
    if !name.is_empty() {
        out.push((name, value.to_string()));
    }
}

fn render_declarations(declarations: &[(String, String)]) -> String {
    declarations
        .iter()
        .map(|(name, value)| format!("{}: {};", name, value))
        .collect::<Vec<_>>()
        .join(" ")
}
