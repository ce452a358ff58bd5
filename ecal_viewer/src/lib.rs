// THEORY:
// The viewer turns one run of the trigger-logic pipeline into a picture. It
// replaces an interactive window: instead of polling keys, the caller hands
// in a `ViewState` and gets back an image that can be saved as PNG.

pub mod canvas;
pub mod render;
pub mod view_state;

pub use crate::render::{RenderOptions, Scene, render};
pub use crate::view_state::{ViewState, ViewToggle};
