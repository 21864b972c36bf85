mod decorations;
mod geometry;
mod render;
#[cfg(test)]
mod tests;

pub use decorations::{DecorationSource, Decorations, StaticDecorations};
pub use geometry::{contain_rect, cover_rect, DrawRect};
pub use render::{CameraFrame, Composite, CompositeLayout, EncodedImage, FrameCompositor};
