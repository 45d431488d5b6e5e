//! Kestrel: provider-agnostic streaming agent loop.
//!
//! Sends a conversation to a model, assembles the streamed reply (text,
//! thoughts and tool calls in either structured or inline-XML form) and
//! surfaces it as a stream of [`agent::StreamEvent`]s. Tool execution stays
//! with the caller.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use futures::{pin_mut, StreamExt};
//! use kestrel::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> kestrel::error::Result<()> {
//! let config = KestrelConfig::from_env();
//! let generator = create_content_generator(&ContentGeneratorConfig::resolve(&config, None))?;
//! let chat = Arc::new(ChatSession::new(generator, config.model(), GenerateContentConfig::default()));
//!
//! let mut turn = Turn::new(chat, "prompt-1");
//! let events = turn.run(vec![Part::text("Hello!")], CancellationToken::new());
//! pin_mut!(events);
//! while let Some(event) = events.next().await {
//!     if let StreamEvent::Content(text) = event? {
//!         print!("{text}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod models;
pub mod prelude;
pub mod provider;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
#[cfg(feature = "cli")]
pub mod logging;
