//! Component Runtime
//!
//! This module implements the protocol every component instance follows:
//! dirty-key accumulation, batched flushing, lifecycle hooks and binding
//! callbacks.
//!
//! # Concepts
//!
//! ## Dirty tracking
//!
//! Each instance records which of its declared fields changed since its last
//! update. Setting a field on a clean instance hands it to the scheduler;
//! further changes before the flush only grow the dirty set.
//!
//! ## Scheduling
//!
//! The [`Scheduler`] holds the pending-instance queue and the after-render
//! callback list. A flush updates pending instances in enqueue order, then
//! runs after-render callbacks newest first.
//!
//! ## Lifecycle
//!
//! A [`Component`] is created from a [`ComponentDef`], optionally mounted
//! immediately, updated by the scheduler, and eventually destroyed. Its
//! rendered output is a [`Fragment`].
//!
//! ## Strict mode
//!
//! [`StrictComponent`] is a thin wrapper that adds developer-time checks
//! without changing the state machine.

mod component;
mod dirty;
mod events;
mod fragment;
mod scheduler;
mod state;
mod strict;
mod trigger;

pub use component::{
    BindingCallback, Component, ComponentDef, Hook, InstanceId, MountHook, Options, Setup,
    Teardown, WeakComponent,
};
pub use dirty::{DirtyTracker, FieldId, FieldSet, MAX_FIELDS};
pub use events::{Event, Listener, ListenerId, Unsubscribe};
pub use fragment::{Anchor, EmptyFragment, Fragment, HostNode, OutroCallback, Target};
pub use scheduler::{AfterRender, Scheduler};
pub use state::{Props, Schema, State, Value};
pub use strict::StrictComponent;
pub use trigger::{FlushDriver, FlushTrigger, ManualTrigger, TokioTrigger};
