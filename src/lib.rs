//! Webforge - front-end asset pipeline
//!
//! This library wires third-party tooling into two ordered task graphs:
//! - development: build styles, scripts, images, and markup once, then
//!   watch the source tree and serve a live-reloading preview
//! - production: clean the output tree, then build everything, fail-fast
//!
//! Every transformation is delegated: `grass` compiles Sass, `lightningcss`
//! post-processes for the browser matrix, `oxc` transpiles scripts, `image`
//! / `oxipng` / `webp` handle image assets. Webforge supplies the wiring.

pub mod cli;
pub mod config;
pub mod notifier;
pub mod pipeline;
pub mod serve;
pub mod tasks;
pub mod watch;
