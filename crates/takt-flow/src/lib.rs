//! takt-flow - dataflow primitives for the takt real-time stack.
//!
//! This crate provides the [`Node`] step model (start / send / close), a
//! small set of composition operators, and the keyed z-ordered
//! [`Scheduler`] that the audio mixer, knock detector, and screen renderer
//! are built on.
//!
//! # Example
//!
//! ```rust
//! use takt_flow::{Node, NodeExt, Step, from_iter, map};
//!
//! let mut pipeline = from_iter(vec![1, 2, 3]).pipe(map(|x: i32| x * x));
//! pipeline.start().unwrap();
//! assert_eq!(pipeline.send(()).unwrap(), Step::Yield(1));
//! assert_eq!(pipeline.send(()).unwrap(), Step::Yield(4));
//! assert_eq!(pipeline.send(()).unwrap(), Step::Yield(9));
//! assert!(pipeline.send(()).unwrap().is_done());
//! pipeline.close().unwrap();
//! ```

mod combine;
mod node;
mod schedule;

pub use combine::{Branch, Chain, Merge, NodeExt, Pair, Pipe, Slice, branch, chain, merge, pair, slice};
pub use node::{BoxNode, FlowError, FlowResult, FromIter, Lifecycle, Map, Node, Step, from_iter, map};
pub use schedule::{Key, Scheduler, SchedulerHandle, ZIndex};
