#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::items_after_statements,
    clippy::manual_let_else,
    clippy::map_unwrap_or,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::needless_pass_by_value,
    clippy::return_self_not_must_use,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::too_many_lines,
    clippy::uninlined_format_args,
    clippy::unnecessary_lazy_evaluations,
    clippy::unused_self
)]

pub mod config;
pub mod cooldown;
pub mod daemon;
pub mod delivery;
pub mod error;
pub mod events;
pub mod gateway;
pub mod health;
pub mod intake;
pub mod panel;
pub mod promo;
pub mod relay;
pub mod resolver;
pub mod store;

pub use config::Config;
