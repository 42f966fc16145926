use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::binder::SlotBinder;
use crate::locator::{find_slots_with_config, slot_style_id, SlotKind};
use crate::registry::Pattern;

/// The authoritative editor state: one HTML fragment and one stylesheet.
///
/// Only ever replaced wholesale; every change goes through [`Document::apply`]
/// and produces a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub html: String,
    pub css: String,
}

/// One change to a [`Document`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    ReplaceHtml(String),
    ReplaceCss(String),
    BindImage { index: usize, data_url: String },
    ApplyPattern { index: usize, pattern: Pattern },
    RemovePattern { index: usize },
}

/// Live-style change that has to accompany a document change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StyleEffect {
    Publish { style_id: String, css: String },
    Retract { style_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub document: Document,
    pub effect: Option<StyleEffect>,
}

impl Transition {
    fn unchanged(document: &Document) -> Self {
        Self {
            document: document.clone(),
            effect: None,
        }
    }

    /// Whether the mutation changed anything
    pub fn is_noop(&self, before: &Document) -> bool {
        self.effect.is_none() && &self.document == before
    }
}

impl Document {
    pub fn new(html: impl Into<String>, css: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            css: css.into(),
        }
    }

    /// Pure `(Document, Mutation) -> Document`. Out-of-range slot indices
    /// yield the document unchanged and no style effect.
    pub fn apply(&self, mutation: &Mutation, binder: &SlotBinder) -> Transition {
        match mutation {
            Mutation::ReplaceHtml(html) => Transition {
                document: Document::new(html.clone(), self.css.clone()),
                effect: None,
            },
            Mutation::ReplaceCss(css) => Transition {
                document: Document::new(self.html.clone(), css.clone()),
                effect: None,
            },
            Mutation::BindImage { index, data_url } => Transition {
                document: Document::new(binder.bind_image(&self.html, *index, data_url), self.css.clone()),
                effect: None,
            },
            Mutation::ApplyPattern { index, pattern } => {
                let applied = binder.apply_pattern(&self.html, *index, pattern);
                match applied.scoped_css {
                    Some(css) => Transition {
                        document: Document::new(applied.html, self.css.clone()),
                        effect: Some(StyleEffect::Publish {
                            style_id: slot_style_id(SlotKind::Pattern, *index),
                            css,
                        }),
                    },
                    None => Transition::unchanged(self),
                }
            }
            Mutation::RemovePattern { index } => {
                if *index >= self.slot_count(SlotKind::Pattern, binder) {
                    return Transition::unchanged(self);
                }
                Transition {
                    document: Document::new(binder.remove_pattern(&self.html, *index), self.css.clone()),
                    effect: Some(StyleEffect::Retract {
                        style_id: slot_style_id(SlotKind::Pattern, *index),
                    }),
                }
            }
        }
    }

    pub fn slot_count(&self, kind: SlotKind, binder: &SlotBinder) -> usize {
        find_slots_with_config(&self.html, kind, binder.config()).len()
    }
}

/// Bounded undo/redo stacks of whole snapshots
#[derive(Debug, Clone)]
pub struct History<T> {
    undo: VecDeque<T>,
    redo: Vec<T>,
    limit: usize,
}

impl<T> History<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            undo: VecDeque::new(),
            redo: Vec::new(),
            limit,
        }
    }

    /// Remember the state a change is about to replace. Clears the redo stack.
    pub fn record(&mut self, previous: T) {
        if self.limit == 0 {
            return;
        }
        if self.undo.len() == self.limit {
            self.undo.pop_front();
        }
        self.undo.push_back(previous);
        self.redo.clear();
    }

    /// Step back: `current` moves onto the redo stack.
    pub fn undo(&mut self, current: T) -> Option<T> {
        let previous = self.undo.pop_back()?;
        self.redo.push(current);
        Some(previous)
    }

    pub fn redo(&mut self, current: T) -> Option<T> {
        let next = self.redo.pop()?;
        self.undo.push_back(current);
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn clear(&mut self) {
        self.undo.clear();
        self.redo.clear();
    }
}
