//! Chat notifications for CI runs.
//!
//! A run decides whether to post at all ([`gate`]), renders the payload from a
//! built-in or custom template ([`template`], [`message`]), gates delivery on
//! branch and tag patterns ([`branch_filter`]) and hands the payload to a
//! [`dispatch::Dispatcher`]. [`delivery::Notifier`] ties the steps together.

pub mod branch_filter;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod interpolate;
pub mod json_format;
pub mod logging;
pub mod message;
pub mod template;

pub use branch_filter::{FilterTarget, PatternList, filter_by, filter_by_with};
pub use config::NotifyConfig;
pub use delivery::{Delivery, DeliveryStatus, Notifier, RunOutcome, SkipReason};
pub use dispatch::{DispatchOutcome, Dispatcher, SlackApiDispatcher};
pub use error::{NotifyError, Result};
pub use gate::{BuildStatus, should_post};
pub use interpolate::{EnvironmentMap, expand_vars};
pub use message::build_message_body;
pub use template::{BuiltinTemplate, modify_custom_template};
