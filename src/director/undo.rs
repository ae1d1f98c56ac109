use std::{fmt, time::Duration};

use crate::anim::{AnimTarget, AnimationOptions, Values};

/// One recorded step of a presentation, replayable in either direction.
#[derive(Clone)]
pub enum UndoItem {
    NewSlide {
        slide_index: usize,
    },
    Delay {
        wait: Duration,
    },
    Transition {
        target: AnimTarget,
        to_values: Values,
        from_values: Values,
        duration: Duration,
        options: AnimationOptions,
    },
    Instant {
        target: AnimTarget,
        to_values: Values,
        from_values: Values,
    },
}

impl UndoItem {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NewSlide { .. } => "new_slide",
            Self::Delay { .. } => "delay",
            Self::Transition { .. } => "transition",
            Self::Instant { .. } => "instant",
        }
    }

    pub fn is_new_slide(&self) -> bool {
        matches!(self, Self::NewSlide { .. })
    }
}

impl fmt::Debug for UndoItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NewSlide { slide_index } => {
                f.debug_struct("NewSlide").field("slide_index", slide_index).finish()
            }
            Self::Delay { wait } => f.debug_struct("Delay").field("wait", wait).finish(),
            Self::Transition {
                to_values,
                duration,
                ..
            } => f
                .debug_struct("Transition")
                .field("props", &to_values.keys().collect::<Vec<_>>())
                .field("duration", duration)
                .finish(),
            Self::Instant { to_values, .. } => f
                .debug_struct("Instant")
                .field("props", &to_values.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}
