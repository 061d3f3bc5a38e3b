//! Video layer: background rendering and ffmpeg composition

pub mod background;
pub mod composer;

pub use background::{render_background, write_background};
pub use composer::{
    build_args, build_filter_graph, CompositionRequest, FfmpegComposer, MediaComposer,
};
