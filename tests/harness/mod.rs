//! Integration Test Harness
//!
//! Test infrastructure for driving whole fights:
//! - `RecordingSink` - Renderer double that timestamps every dispatch and ack
//! - `Arena` - A combat machine wired to recording sinks and scripted input
//! - `content` - Standard catalog and combatants
//!
//! # Example
//!
//! ```rust,ignore
//! use harness::{content, Arena};
//!
//! #[tokio::test]
//! async fn test_quick_fight() {
//!     let mut arena = Arena::builder(vec![content::fighter("hero"), content::goblin("gob")])
//!         .faces([20, 1])
//!         .build();
//!     arena.players.push("hero", [Intent::attack("gob")]);
//!     assert_eq!(arena.run_to_end().await, Outcome::Victory);
//! }
//! ```

#![allow(dead_code)]

pub mod content;
mod arena;
mod sink;

pub use arena::{Arena, ArenaBuilder};
pub use sink::{Record, RecordingSink};
