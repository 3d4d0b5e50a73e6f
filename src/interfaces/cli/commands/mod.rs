mod aggregate;
mod config_gen;
mod content;

pub use aggregate::run_aggregate;
pub use config_gen::config_generate;
pub use content::{add_content, set_visibility, show_content};
