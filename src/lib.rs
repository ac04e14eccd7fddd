//! Renders prometheus alertmanager alerts through per-language templates and
//! dispatches them to chat platforms.
//!
//! Features:
//! - templates in native tera syntax or the jinja-like dialect, picked by file extension
//! - full and minimal format profiles with per-request overrides
//! - platform specific markup for telegram, slack and discord
//! - message splitting and destination resolution by channel, chat id or level
//! - a built-in fallback message when a template fails to render

pub mod alert;
pub mod fallback;
pub mod log;
pub mod notification;
pub mod settings;
pub mod template;
