//! Bodies, their properties, and the hooks that drive them
//!
//! All body state is public and readable at any time; the stepper only
//! guarantees consistency at phase boundaries. Behavior is attached
//! through [`Controller`] and [`StateWatcher`] boxes invoked at their
//! documented points in the step, never in between.

use std::any::Any;
use std::fmt;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::geom::Rect;

/// How a body participates in the simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BodyType {
    /// Never integrated, never displaced. Level geometry normally
    /// enters through tile bodies instead; a static registry body is
    /// inert.
    Static,
    /// Accelerated by gravity and controllers, resolved against tiles
    /// and kinetic bodies
    #[default]
    Dynamic,
    /// Moves under its own velocity and carries overlapping dynamic
    /// bodies for a step, but is never itself resolved
    Kinetic,
}

/// Stable handle to a body within one world
///
/// Ids are never reused. Looking up a removed body yields `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BodyId(pub(crate) u32);

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "body#{}", self.0)
    }
}

/// Configuration copied into a body at creation time
///
/// One `BodyProps` value can seed any number of bodies; each body gets
/// its own copy, so later edits to a shared template never leak.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BodyProps {
    /// Read once at creation; the body's type is immutable afterwards
    pub body_type: BodyType,
    /// Whether world gravity accelerates this body
    pub gravitational: bool,
    /// Per-body scale applied to world gravity
    pub gravity_modifier: f32,
    /// Whether this body participates in collision resolution at all
    pub collides: bool,
    /// Whether conflicting resolutions deactivate the body instead of
    /// fighting over it
    pub crushable: bool,
    /// Whether this body emits contact started/ended notifications
    pub fires_contact_events: bool,
}

impl Default for BodyProps {
    fn default() -> Self {
        Self {
            body_type: BodyType::Dynamic,
            gravitational: true,
            gravity_modifier: 1.0,
            collides: true,
            crushable: true,
            fires_contact_events: true,
        }
    }
}

impl BodyProps {
    /// Default properties with the given body type
    pub fn of(body_type: BodyType) -> Self {
        Self {
            body_type,
            ..Self::default()
        }
    }
}

/// Drives a body's velocity and behavior
///
/// Invoked once per fixed step, after gravity and before integration.
/// Controllers run in unspecified order (and concurrently under the
/// `parallel` feature) and see only their own body.
pub trait Controller: Send {
    fn update(&mut self, dt: f32, body: &mut Body);
}

/// Observes a body's post-resolution state
///
/// Invoked once per fixed step after resolution, with the body's final
/// position, velocity, grounded flag, and last resolution. Used to
/// drive animation or logical state outside the simulation.
pub trait StateWatcher: Send {
    fn update(&mut self, body: &Body);
}

/// A simulated axis-aligned body
pub struct Body {
    pub(crate) id: BodyId,
    body_type: BodyType,
    /// Current bounds, origin at the bottom-left corner
    pub aabb: Rect,
    pub velocity: Vec2,
    /// Inactive bodies are skipped by every phase. Cleared by crushing.
    pub active: bool,
    /// True when the last resolution opposed gravity; recomputed every
    /// step, false while airborne
    pub grounded: bool,
    pub props: BodyProps,
    /// What the resolution phase last did to this body
    pub last_resolution: Vec2,
    /// The displacement the body last attempted, carry included
    pub last_attempt: Vec2,
    pub(crate) controller: Option<Box<dyn Controller>>,
    pub(crate) state_watcher: Option<Box<dyn StateWatcher>>,
    pub(crate) parent: Option<BodyId>,
    pub(crate) children: Vec<BodyId>,
    /// Free-form payload for the embedding application
    pub user_data: Option<Box<dyn Any + Send>>,
}

impl Body {
    pub(crate) fn new(id: BodyId, aabb: Rect, props: BodyProps) -> Self {
        Self {
            id,
            body_type: props.body_type,
            aabb,
            velocity: Vec2::ZERO,
            active: true,
            grounded: false,
            props,
            last_resolution: Vec2::ZERO,
            last_attempt: Vec2::ZERO,
            controller: None,
            state_watcher: None,
            parent: None,
            children: Vec::new(),
            user_data: None,
        }
    }

    #[inline]
    pub fn id(&self) -> BodyId {
        self.id
    }

    /// Fixed at creation from `props.body_type`; later edits to
    /// [`Body::props`] do not change it
    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Kinetic body currently carrying this one, if any. Transient:
    /// set during resolution, cleared when the carry is applied the
    /// following step.
    #[inline]
    pub fn parent(&self) -> Option<BodyId> {
        self.parent
    }

    pub fn set_controller(&mut self, controller: impl Controller + 'static) {
        self.controller = Some(Box::new(controller));
    }

    pub fn clear_controller(&mut self) {
        self.controller = None;
    }

    pub fn set_state_watcher(&mut self, watcher: impl StateWatcher + 'static) {
        self.state_watcher = Some(Box::new(watcher));
    }

    pub fn clear_state_watcher(&mut self) {
        self.state_watcher = None;
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Body")
            .field("id", &self.id)
            .field("body_type", &self.body_type)
            .field("aabb", &self.aabb)
            .field("velocity", &self.velocity)
            .field("active", &self.active)
            .field("grounded", &self.grounded)
            .finish_non_exhaustive()
    }
}
