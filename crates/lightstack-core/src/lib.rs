//! Client-side engine for a LightStack alert server.
//!
//! [`AlertStackController`] keeps a local mirror of the server's active
//! alerts, resolves which one should be displayed, and publishes an
//! [`StackSnapshot`] after every change. Decoding of the compact LED
//! encodings lives in [`codec`].

pub mod codec;
pub mod command;
pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod resolver;
pub mod store;
pub mod stream;

pub use codec::CodecError;
pub use command::TriggerAlert;
pub use config::ControllerConfig;
pub use controller::{AlertStackController, ConnectionState, ListenerId, StackSnapshot};
pub use error::CoreError;
pub use model::{Alert, ColorName, DurationUnit, LedDuration, LedEffect, LedSettings, Priority};
pub use resolver::{ALL_CLEAR, AlertAttributes, EffectiveAlertSnapshot};
pub use store::{AlertEvent, AlertStore};
pub use stream::{SnapshotStream, SnapshotWatchStream};

pub use lightstack_api::ReconnectConfig;
