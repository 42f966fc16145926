//! Just enough of a style sheet to size boxes and paint their backgrounds.
//!
//! Rules are kept in source order. A selector is a comma list of compound
//! selectors (`div`, `.card`, `#logo`, `div.card.front`); anything with a
//! combinator, pseudo-class or attribute test is skipped. Later rules win
//! over earlier ones regardless of specificity, and inline `style` wins over
//! every rule.

use image::Rgba;
use regex::Regex;
use std::sync::OnceLock;

use crate::dom::{parse_declarations, Element};

/// One parsed rule, e.g. `.pattern-0 { background: red; }`
#[derive(Debug, Clone, PartialEq)]
pub struct CssRule {
    /// Selector text as written
    pub selector: String,
    pub declarations: Vec<(String, String)>,
    compounds: Vec<Compound>,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
}

impl Compound {
    fn parse(selector: &str) -> Option<Self> {
        static COMPOUND_REGEX: OnceLock<Regex> = OnceLock::new();
        let re = COMPOUND_REGEX
            .get_or_init(|| Regex::new(r"^([A-Za-z][A-Za-z0-9-]*|\*)?((?:[.#][A-Za-z0-9_-]+)*)$").unwrap());

        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        let caps = re.captures(selector)?;
        let mut compound = Compound {
            tag: caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .filter(|t| t != "*"),
            ..Default::default()
        };

        let simple = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let mut rest = simple;
        while let Some(prefix) = rest.chars().next() {
            let body = &rest[1..];
            let end = body.find(['.', '#']).unwrap_or(body.len());
            let name = body[..end].to_string();
            match prefix {
                '.' => compound.classes.push(name),
                _ => compound.id = Some(name),
            }
            rest = &body[end..];
        }
        Some(compound)
    }

    fn matches(&self, element: &Element) -> bool {
        if let Some(tag) = &self.tag {
            if !element.tag_name().eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if element.attribute("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        let classes = element.classes();
        self.classes.iter().all(|c| classes.contains(c))
    }
}

impl CssRule {
    fn new(selector: &str, body: &str) -> Option<Self> {
        let compounds: Vec<Compound> = selector.split(',').filter_map(Compound::parse).collect();
        if compounds.is_empty() {
            log::trace!("ignoring unsupported selector '{}'", selector.trim());
            return None;
        }
        let declarations = parse_declarations(body)
            .into_iter()
            .map(|(name, value)| (name, strip_important(&value)))
            .collect();
        Some(Self {
            selector: selector.trim().to_string(),
            declarations,
            compounds,
        })
    }

    pub fn matches(&self, element: &Element) -> bool {
        self.compounds.iter().any(|c| c.matches(element))
    }
}

fn strip_important(value: &str) -> String {
    let trimmed = value.trim();
    match trimmed.len().checked_sub("!important".len()) {
        Some(at) if trimmed.is_char_boundary(at) && trimmed[at..].eq_ignore_ascii_case("!important") => {
            trimmed[..at].trim_end().to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Stylesheet {
    rules: Vec<CssRule>,
}

impl Stylesheet {
    /// Parse `css` leniently. At-rule blocks and unbalanced tails are dropped.
    pub fn parse(css: &str) -> Self {
        static COMMENT_REGEX: OnceLock<Regex> = OnceLock::new();
        let comments = COMMENT_REGEX.get_or_init(|| Regex::new(r"(?s)/\*.*?\*/").unwrap());
        let css = comments.replace_all(css, "");

        let mut rules = Vec::new();
        let mut rest: &str = &css;
        while let Some(open) = rest.find('{') {
            let prelude = rest[..open].trim();
            let Some(close) = matching_brace(rest, open) else {
                break;
            };
            if prelude.starts_with('@') {
                log::trace!("skipping at-rule '{}'", prelude);
            } else if let Some(rule) = CssRule::new(prelude, &rest[open + 1..close]) {
                rules.push(rule);
            }
            rest = &rest[close + 1..];
        }
        Self { rules }
    }

    pub fn rules(&self) -> &[CssRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Declarations reaching `element`, lowest priority first.
    pub fn computed(&self, element: &Element) -> ComputedStyle {
        let mut declarations: Vec<(String, String)> = self
            .rules
            .iter()
            .filter(|rule| rule.matches(element))
            .flat_map(|rule| rule.declarations.iter().cloned())
            .collect();
        if let Some(style) = element.attribute("style") {
            declarations.extend(parse_declarations(&style));
        }
        ComputedStyle { declarations }
    }
}

/// Byte offset of the `}` closing the block opened at `open`
fn matching_brace(css: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    for (i, ch) in css[open..].char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '{') => depth += 1,
            (None, '}') => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + i);
                }
            }
            _ => {}
        }
    }
    None
}

/// The cascaded declarations of one element
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComputedStyle {
    declarations: Vec<(String, String)>,
}

impl ComputedStyle {
    pub fn get(&self, property: &str) -> Option<&str> {
        self.declarations
            .iter()
            .rev()
            .find(|(name, _)| name == property)
            .map(|(_, value)| value.as_str())
    }

    /// A length in CSS pixels
    pub fn px(&self, property: &str) -> Option<f64> {
        self.get(property).and_then(parse_px)
    }

    /// `background-color`, or the colour inside a later `background` shorthand.
    pub fn background_color(&self) -> Option<Rgba<u8>> {
        for (name, value) in self.declarations.iter().rev() {
            match name.as_str() {
                "background-color" => return parse_color(value),
                "background" => return shorthand_tokens(value).into_iter().find_map(parse_color),
                _ => {}
            }
        }
        None
    }

    /// The `url(...)` of `background-image` or of a later `background` shorthand.
    pub fn background_image(&self) -> Option<&str> {
        for (name, value) in self.declarations.iter().rev() {
            match name.as_str() {
                "background-image" | "background" => {
                    return shorthand_tokens(value).into_iter().find(|t| t.starts_with("url("));
                }
                _ => {}
            }
        }
        None
    }
}

/// Whitespace-separated tokens, keeping `url(...)` and `rgb(...)` whole
fn shorthand_tokens(value: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = None;
    for (i, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    tokens.push(&value[s..i]);
                }
                continue;
            }
            _ => {}
        }
        if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&value[s..]);
    }
    tokens
}

/// `12px`, `12.5px` or a bare `0`
pub fn parse_px(value: &str) -> Option<f64> {
    static PX_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = PX_REGEX.get_or_init(|| Regex::new(r"^\s*(-?\d+(?:\.\d+)?)px\s*$").unwrap());
    if value.trim() == "0" {
        return Some(0.0);
    }
    re.captures(value)?.get(1)?.as_str().parse().ok()
}

/// Hex colours and a handful of keywords
pub fn parse_color(value: &str) -> Option<Rgba<u8>> {
    static HEX_COLOR_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = HEX_COLOR_REGEX.get_or_init(|| {
        Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6}|[0-9a-fA-F]{8})$").unwrap()
    });

    let value = value.trim();
    let named = match value.to_ascii_lowercase().as_str() {
        "white" => Some(Rgba([255, 255, 255, 255])),
        "black" => Some(Rgba([0, 0, 0, 255])),
        "red" => Some(Rgba([255, 0, 0, 255])),
        "green" => Some(Rgba([0, 128, 0, 255])),
        "lime" => Some(Rgba([0, 255, 0, 255])),
        "blue" => Some(Rgba([0, 0, 255, 255])),
        "gray" | "grey" => Some(Rgba([128, 128, 128, 255])),
        "transparent" => Some(Rgba([0, 0, 0, 0])),
        _ => None,
    };
    if named.is_some() {
        return named;
    }

    let hex = re.captures(value)?.get(1)?.as_str();
    let expanded: String = if hex.len() == 3 {
        hex.chars().flat_map(|c| [c, c]).collect()
    } else {
        hex.to_string()
    };
    let byte = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).ok();
    let alpha = if expanded.len() == 8 { byte(6)? } else { 255 };
    Some(Rgba([byte(0)?, byte(2)?, byte(4)?, alpha]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Fragment;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_color() {
        assert_eq!(parse_color("#fff"), Some(Rgba([255, 255, 255, 255])));
        assert_eq!(parse_color("#ff000080"), Some(Rgba([255, 0, 0, 128])));
        assert_eq!(parse_color("Blue"), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(parse_color("rgb(1,2,3)"), None);
    }

    #[test]
    fn test_parse_px() {
        assert_eq!(parse_px("12px"), Some(12.0));
        assert_eq!(parse_px(" -4.5px "), Some(-4.5));
        assert_eq!(parse_px("0"), Some(0.0));
        assert_eq!(parse_px("50%"), None);
    }

    #[test]
    fn test_rules_in_source_order() {
        let sheet = Stylesheet::parse(
            "/* card */ .card, #front { width: 200px; }\n@media print { .card { width: 1px; } }\n.card .inner { color: red; }\ndiv.card { height: 100px !important; }",
        );
        let selectors: Vec<_> = sheet.rules().iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(selectors, vec![".card, #front", "div.card"]);
        assert_eq!(
            sheet.rules()[1].declarations,
            vec![("height".to_string(), "100px".to_string())]
        );
    }

    #[test]
    fn test_inline_style_beats_rules() {
        let fragment = Fragment::parse(r#"<div class="card" id="front" style="height: 40px"></div>"#);
        let element = fragment.first_element().unwrap();
        let sheet = Stylesheet::parse(".card { width: 200px; height: 100px; } #front { width: 150px; }");

        let style = sheet.computed(&element);
        assert_eq!(style.px("width"), Some(150.0));
        assert_eq!(style.px("height"), Some(40.0));
        assert_eq!(style.px("left"), None);
    }

    #[test]
    fn test_unmatched_rules_do_not_apply() {
        let fragment = Fragment::parse(r#"<span class="card-alt"></span>"#);
        let element = fragment.first_element().unwrap();
        let sheet = Stylesheet::parse(".card { width: 200px; } div { height: 5px; }");
        assert_eq!(sheet.computed(&element), ComputedStyle::default());
    }

    #[test]
    fn test_background_shorthand() {
        let fragment = Fragment::parse(r#"<div class="pattern-0"></div>"#);
        let element = fragment.first_element().unwrap();

        let sheet = Stylesheet::parse(".pattern-0 { background-color: red; } .pattern-0 { background: #00ff00 url(data:image/png;base64,AAAA) repeat; }");
        let style = sheet.computed(&element);
        assert_eq!(style.background_color(), Some(Rgba([0, 255, 0, 255])));
        assert_eq!(style.background_image(), Some("url(data:image/png;base64,AAAA)"));

        let sheet = Stylesheet::parse(".pattern-0 { background: red; background-color: blue; }");
        assert_eq!(sheet.computed(&element).background_color(), Some(Rgba([0, 0, 255, 255])));
        assert_eq!(sheet.computed(&element).background_image(), None);
    }
}
