//! Charts module - Static chart rendering

mod config;
mod renderer;

pub use config::{
    parse_color, ChartSpec, FigureSize, Palette, PlotConfig, ValueFormat, MAX_FIGURE_SIDE,
    MIN_FIGURE_SIDE,
};
pub use renderer::{ChartRenderer, RenderError};
