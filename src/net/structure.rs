//! P/T 网静态结构元素：库所、变迁、守卫、弧与标识。
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::ids::{PlaceId, TransitionId};
use crate::net::index_vec::IndexVec;

pub type Weight = u64;

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Place {
    pub name: String,
    pub tokens: Weight,
}

impl Place {
    pub fn new(name: impl Into<String>, tokens: Weight) -> Self {
        Self {
            name: name.into(),
            tokens,
        }
    }
}

/// Two independent scheduling attributes a monitor reads off a transition.
#[derive(Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct TransitionLabel {
    pub automatic: bool,
    pub informed: bool,
}

impl TransitionLabel {
    pub fn new(automatic: bool, informed: bool) -> Self {
        Self {
            automatic,
            informed,
        }
    }
}

/// A named boolean that must hold the declared value for the transition to
/// be enabled.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Debug)]
pub struct Guard {
    pub name: String,
    pub enable_when: bool,
}

impl Guard {
    pub fn new(name: impl Into<String>, enable_when: bool) -> Self {
        Self {
            name: name.into(),
            enable_when,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Transition {
    pub name: String,
    pub label: TransitionLabel,
    pub guard: Option<Guard>,
}

impl Transition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: TransitionLabel::default(),
            guard: None,
        }
    }

    pub fn with_label(mut self, label: TransitionLabel) -> Self {
        self.label = label;
        self
    }

    pub fn with_guard(mut self, guard: Guard) -> Self {
        self.guard = Some(guard);
        self
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Transition").field(&self.name).finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcKind {
    Normal,
    Inhibitor,
    Reset,
    Reader,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    PlaceToTransition,
    TransitionToPlace,
}

/// Arc descriptor kept for introspection; execution only consults the
/// derived matrices. Inhibitor, reset and reader arcs always run from the
/// place to the transition.
#[derive(Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Arc {
    pub place: PlaceId,
    pub transition: TransitionId,
    pub weight: Weight,
    pub kind: ArcKind,
    pub direction: ArcDirection,
}

impl Arc {
    pub fn input(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self {
            place,
            transition,
            weight,
            kind: ArcKind::Normal,
            direction: ArcDirection::PlaceToTransition,
        }
    }

    pub fn output(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self {
            place,
            transition,
            weight,
            kind: ArcKind::Normal,
            direction: ArcDirection::TransitionToPlace,
        }
    }

    pub fn inhibitor(place: PlaceId, transition: TransitionId) -> Self {
        Self {
            place,
            transition,
            weight: 1,
            kind: ArcKind::Inhibitor,
            direction: ArcDirection::PlaceToTransition,
        }
    }

    pub fn reset(place: PlaceId, transition: TransitionId) -> Self {
        Self {
            place,
            transition,
            weight: 1,
            kind: ArcKind::Reset,
            direction: ArcDirection::PlaceToTransition,
        }
    }

    pub fn reader(place: PlaceId, transition: TransitionId, weight: Weight) -> Self {
        Self {
            place,
            transition,
            weight,
            kind: ArcKind::Reader,
            direction: ArcDirection::PlaceToTransition,
        }
    }
}

impl fmt::Debug for Arc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arc")
            .field("place", &self.place)
            .field("transition", &self.transition)
            .field("weight", &self.weight)
            .field("kind", &self.kind)
            .field("direction", &self.direction)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Marking(pub IndexVec<PlaceId, Weight>);

impl Marking {
    pub fn new(tokens: IndexVec<PlaceId, Weight>) -> Self {
        Self(tokens)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PlaceId, &Weight)> {
        self.0.iter_enumerated()
    }

    pub fn tokens(&self, place: PlaceId) -> Weight {
        self.0[place]
    }

    pub fn tokens_mut(&mut self, place: PlaceId) -> &mut Weight {
        &mut self.0[place]
    }

    pub fn total(&self) -> Weight {
        self.0.iter().sum()
    }

    pub fn into_inner(self) -> IndexVec<PlaceId, Weight> {
        self.0
    }
}

impl fmt::Debug for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(&place, tokens);
        }
        map.finish()
    }
}
