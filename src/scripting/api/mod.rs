//! Script-facing APIs
//!
//! - `E` - the capability surface (`surface`)
//! - `commands` - the command registry (`commands`)
//! - `easel::config::*` - persisted settings and triggers (`config`)

pub mod commands;
pub mod config;
pub mod surface;
