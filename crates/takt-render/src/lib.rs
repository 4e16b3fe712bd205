//! takt-render - the one-line terminal renderer.
//!
//! A [`Screen`] is a fixed-width cell line; a [`Renderer`] is a keyed,
//! z-ordered scheduler of [`Drawer`]s invoked once per display tick; a
//! [`RenderHost`] owns stdout and paces the renderer on its own thread,
//! emitting each composed frame as `\r LINE \r` so redraws overwrite in
//! place.

mod host;
mod renderer;
mod screen;

pub use host::RenderHost;
pub use renderer::{Drawer, DrawerNode, Frame, Renderer, RendererNode, drawer};
pub use screen::Screen;
