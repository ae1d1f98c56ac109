//! The presentation surface a director drives, and the input keys it reacts to.

use serde::Serialize;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ArrowVisibility {
    pub back: bool,
    pub forward: bool,
}

/// Slide container seam; a browser host maps this onto its slide elements.
pub trait SlideDeck {
    fn num_slides(&self) -> usize;
    fn set_slide_visible(&mut self, index: usize, visible: bool);
    fn set_arrows(&mut self, arrows: ArrowVisibility);

    /// Shows `index` and hides every other slide.
    fn show_slide(&mut self, index: usize) {
        for i in 0..self.num_slides() {
            self.set_slide_visible(i, i == index);
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeckEvent {
    SlideVisible { index: usize, visible: bool },
    Arrows(ArrowVisibility),
}

/// In-memory deck that records every change; used by tests and the CLI.
#[derive(Clone, Debug, Default)]
pub struct HeadlessDeck {
    visible: Vec<bool>,
    arrows: ArrowVisibility,
    events: Vec<DeckEvent>,
}

impl HeadlessDeck {
    pub fn new(num_slides: usize) -> Self {
        Self {
            visible: vec![false; num_slides],
            ..Self::default()
        }
    }

    /// The single visible slide, if exactly one is shown.
    pub fn visible_slide(&self) -> Option<usize> {
        let mut shown = self.visible.iter().enumerate().filter(|(_, v)| **v);
        match (shown.next(), shown.next()) {
            (Some((i, _)), None) => Some(i),
            _ => None,
        }
    }

    pub fn arrows(&self) -> ArrowVisibility {
        self.arrows
    }

    pub fn events(&self) -> &[DeckEvent] {
        &self.events
    }
}

impl SlideDeck for HeadlessDeck {
    fn num_slides(&self) -> usize {
        self.visible.len()
    }

    fn set_slide_visible(&mut self, index: usize, visible: bool) {
        let Some(slot) = self.visible.get_mut(index) else {
            tracing::warn!(index, "no such slide");
            return;
        };
        if *slot != visible {
            *slot = visible;
            self.events.push(DeckEvent::SlideVisible { index, visible });
        }
    }

    fn set_arrows(&mut self, arrows: ArrowVisibility) {
        if self.arrows != arrows {
            self.arrows = arrows;
            self.events.push(DeckEvent::Arrows(arrows));
        }
    }
}

/// Navigation keys understood by a director.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavKey {
    Right,
    Down,
    PageDown,
    Left,
    Up,
    PageUp,
}

impl NavKey {
    /// DOM `keyCode`s: 33/34 page up/down, 37..=40 arrows.
    pub fn from_key_code(code: u32) -> Option<Self> {
        Some(match code {
            33 => Self::PageUp,
            34 => Self::PageDown,
            37 => Self::Left,
            38 => Self::Up,
            39 => Self::Right,
            40 => Self::Down,
            _ => return None,
        })
    }

    pub fn is_forward(self) -> bool {
        matches!(self, Self::Right | Self::Down | Self::PageDown)
    }
}
