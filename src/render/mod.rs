//! Newsletter rendering.
//!
//! Renderers consume the article contract (ordered segments with heading,
//! prose, and citations) and nothing else; the synthesis core never assumes
//! a rendering target.

mod html;
mod text;

pub use html::render_html;
pub use text::{render_text, split_message};
