//! The frame-ticked drawer scheduler.

use takt_flow::{
    BoxNode, FlowResult, Key, Lifecycle, Node, Scheduler, SchedulerHandle, Step, ZIndex,
};

use crate::screen::Screen;

/// One render tick: the frame's display time and the line being drawn.
pub type Frame = (f64, Screen);

/// Something that draws into the line each tick.
///
/// Returning `false` ends the drawer; the renderer removes it. Implemented
/// for closures of the same shape.
pub trait Drawer: Send {
    /// Draw at `time` into `screen`; return `false` when finished.
    fn draw(&mut self, time: f64, screen: &mut Screen) -> bool;
}

impl<F> Drawer for F
where
    F: FnMut(f64, &mut Screen) -> bool + Send,
{
    fn draw(&mut self, time: f64, screen: &mut Screen) -> bool {
        self(time, screen)
    }
}

/// Adapter turning a [`Drawer`] into a frame-stream node.
pub struct DrawerNode<D> {
    inner: D,
}

/// Wrap a drawer as a scheduler child.
pub fn drawer<D: Drawer>(inner: D) -> DrawerNode<D> {
    DrawerNode { inner }
}

impl<D: Drawer> Node for DrawerNode<D> {
    type In = Frame;
    type Out = Frame;

    fn send(&mut self, (time, mut screen): Frame) -> FlowResult<Step<Frame>> {
        if self.inner.draw(time, &mut screen) {
            Ok(Step::Yield((time, screen)))
        } else {
            Ok(Step::Done)
        }
    }
}

/// Control handle of the renderer.
#[derive(Clone)]
pub struct Renderer {
    handle: SchedulerHandle<Frame>,
}

impl Renderer {
    /// Create the renderer for `width`-cell lines at `framerate` frames
    /// per second, with `delay` added to every frame time.
    pub fn new(width: usize, framerate: f64, delay: f64) -> (Renderer, RendererNode) {
        let (sched, handle) = Scheduler::new();
        (
            Renderer { handle },
            RendererNode {
                sched,
                width,
                framerate,
                delay,
                index: 0,
                life: Lifecycle::new(),
            },
        )
    }

    /// Add a drawer node at `zindex` under `key` (fresh if `None`).
    pub fn add_drawer(&self, node: BoxNode<Frame, Frame>, zindex: ZIndex, key: Option<Key>) -> Key {
        let key = key.unwrap_or_else(Key::fresh);
        self.handle.insert(key, node, zindex)
    }

    /// Remove a drawer. Idempotent.
    pub fn remove_drawer(&self, key: Key) {
        self.handle.remove(key);
    }
}

/// The pull node producing one composed line per tick.
pub struct RendererNode {
    sched: Scheduler<Frame>,
    width: usize,
    framerate: f64,
    delay: f64,
    index: u64,
    life: Lifecycle,
}

impl RendererNode {
    /// The configured frame rate.
    pub fn framerate(&self) -> f64 {
        self.framerate
    }
}

impl Node for RendererNode {
    type In = ();
    type Out = String;

    fn start(&mut self) -> FlowResult<()> {
        self.life.start()?;
        self.sched.start()
    }

    fn send(&mut self, (): ()) -> FlowResult<Step<String>> {
        self.life.running()?;
        let time = self.index as f64 / self.framerate + self.delay;
        self.index += 1;
        let screen = Screen::new(self.width);
        let step = self.sched.send((time, screen))?;
        Ok(step.map(|(_, screen)| screen.display()))
    }

    fn close(&mut self) -> FlowResult<()> {
        if self.life.close() {
            self.sched.close()?;
        }
        Ok(())
    }
}
