//! Keyed, z-ordered sets of nodes mutated through a thread-safe queue.
//!
//! A [`Scheduler`] owns a set of child nodes and is itself a node over
//! `T → T`: each tick drains pending mutations, then threads the input
//! through every child in ascending z order. The audio mixer, the knock
//! detector's listener set, and the screen renderer are all schedulers
//! over their respective tick payloads.
//!
//! Mutations may be submitted from any thread via the cloneable
//! [`SchedulerHandle`]; they take effect no later than the next tick, in
//! submission order. Z ties are broken by insertion order. Inserting with
//! an existing key replaces (and closes) the previous child; removing an
//! absent key is a no-op.

use std::cmp::Ordering;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::mpsc::{Receiver, Sender, channel};

use crate::node::{BoxNode, FlowResult, Lifecycle, Node, Step};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// A process-unique handle identifying a scheduler child.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(u64);

impl Key {
    /// Allocate a fresh key.
    pub fn fresh() -> Self {
        Key(NEXT_KEY.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

/// Draw/mix ordering for scheduler children.
///
/// Z indices are lexicographic tuples; a shorter tuple sorts before any
/// extension of it. `Dynamic` indices are re-evaluated every tick so a
/// child's layer can depend on its current state.
pub enum ZIndex {
    /// A constant tuple.
    Fixed(Vec<f64>),
    /// Re-evaluated at every tick.
    Dynamic(Box<dyn Fn() -> Vec<f64> + Send>),
}

impl ZIndex {
    /// A single-level constant index.
    pub fn flat(z: f64) -> Self {
        ZIndex::Fixed(vec![z])
    }

    /// A constant tuple index.
    pub fn of(zs: &[f64]) -> Self {
        ZIndex::Fixed(zs.to_vec())
    }

    /// The empty tuple, sorting below every non-empty index.
    pub fn bottom() -> Self {
        ZIndex::Fixed(Vec::new())
    }

    /// An index re-evaluated at each tick.
    pub fn dynamic(f: impl Fn() -> Vec<f64> + Send + 'static) -> Self {
        ZIndex::Dynamic(Box::new(f))
    }

    fn eval(&self) -> Vec<f64> {
        match self {
            ZIndex::Fixed(zs) => zs.clone(),
            ZIndex::Dynamic(f) => f(),
        }
    }
}

/// Lexicographic tuple comparison; a shorter tuple precedes its extensions.
fn z_cmp(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b.iter()) {
        match x.total_cmp(y) {
            Ordering::Equal => {}
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

enum Mutation<T> {
    Insert(Key, BoxNode<T, T>, ZIndex),
    Remove(Key),
}

/// Cloneable submission side of a scheduler's mutation queue.
pub struct SchedulerHandle<T> {
    tx: Sender<Mutation<T>>,
}

impl<T> Clone for SchedulerHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> SchedulerHandle<T> {
    /// Schedule `node` for insertion under `key` at `zindex`.
    ///
    /// Returns the key for later removal. If the scheduler is gone the
    /// request is silently dropped.
    pub fn insert(&self, key: Key, node: BoxNode<T, T>, zindex: ZIndex) -> Key {
        let _ = self.tx.send(Mutation::Insert(key, node, zindex));
        key
    }

    /// Schedule removal of `key`. Removing twice, or removing a key that
    /// was never inserted, is a no-op.
    pub fn remove(&self, key: Key) {
        let _ = self.tx.send(Mutation::Remove(key));
    }
}

struct Child<T> {
    key: Key,
    node: BoxNode<T, T>,
    zindex: ZIndex,
    seq: u64,
}

/// A keyed set of `T → T` nodes composed at every tick.
pub struct Scheduler<T> {
    rx: Receiver<Mutation<T>>,
    children: Vec<Child<T>>,
    seq: u64,
    life: Lifecycle,
}

impl<T: Clone + Send + 'static> Scheduler<T> {
    /// Create an empty scheduler and its mutation handle.
    pub fn new() -> (Self, SchedulerHandle<T>) {
        let (tx, rx) = channel();
        (
            Scheduler {
                rx,
                children: Vec::new(),
                seq: 0,
                life: Lifecycle::new(),
            },
            SchedulerHandle { tx },
        )
    }

    /// Number of live children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    /// True if no children are registered.
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn apply_mutations(&mut self) -> FlowResult<()> {
        while let Ok(mutation) = self.rx.try_recv() {
            match mutation {
                Mutation::Insert(key, mut node, zindex) => {
                    self.remove_child(key)?;
                    node.start()?;
                    self.seq += 1;
                    self.children.push(Child {
                        key,
                        node,
                        zindex,
                        seq: self.seq,
                    });
                }
                Mutation::Remove(key) => self.remove_child(key)?,
            }
        }
        Ok(())
    }

    fn remove_child(&mut self, key: Key) -> FlowResult<()> {
        if let Some(at) = self.children.iter().position(|c| c.key == key) {
            let mut child = self.children.remove(at);
            child.node.close()?;
        }
        Ok(())
    }
}

impl<T: Clone + Send + 'static> Node for Scheduler<T> {
    type In = T;
    type Out = T;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()
    }

    fn send(&mut self, input: T) -> FlowResult<Step<T>> {
        self.life.running()?;
        self.apply_mutations()?;

        let mut order: Vec<(Vec<f64>, u64, usize)> = self
            .children
            .iter()
            .enumerate()
            .map(|(at, child)| (child.zindex.eval(), child.seq, at))
            .collect();
        order.sort_by(|a, b| z_cmp(&a.0, &b.0).then(a.1.cmp(&b.1)));

        let mut value = input;
        let mut finished = Vec::new();
        for (_, _, at) in order {
            match self.children[at].node.send(value.clone())? {
                Step::Yield(next) => value = next,
                Step::Done => finished.push(self.children[at].key),
            }
        }
        for key in finished {
            self.remove_child(key)?;
        }
        Ok(Step::Yield(value))
    }

    fn close(&mut self) -> FlowResult<()> {
        if !self.life.close() {
            return Ok(());
        }
        // Pending inserts are dropped unstarted.
        while self.rx.try_recv().is_ok() {}
        let mut result = Ok(());
        for child in self.children.iter_mut().rev() {
            let closed = child.node.close();
            if result.is_ok() {
                result = closed;
            }
        }
        self.children.clear();
        result
    }
}
